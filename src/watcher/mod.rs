pub mod event;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc as tokio_mpsc;
use tokio::task::JoinHandle;

use crate::error::WatchSessionError;
use crate::walker::{PathFilter, TreeFilter};
use event::{WatchEvent, WatchEventKind};

/// What the bridge delivers: an event, or the fatal error that ended the watch.
pub type WatchMessage = Result<WatchEvent, WatchSessionError>;

/// Handle to a running watcher. Dropping it stops watching and closes the
/// event channel.
pub struct WatcherHandle {
    /// Keep alive: dropping the watcher stops the OS watch.
    _watcher: RecommendedWatcher,
    /// The bridge task forwarding events from the std channel to tokio.
    _bridge_task: JoinHandle<()>,
}

/// Start a recursive watch on `source_root`.
///
/// The subscription is live when this returns: anything that happens in the
/// tree afterwards is buffered in the returned receiver until the caller
/// drains it, so no event is lost while the caller is still setting up.
///
/// Events are delivered in OS order. A watcher failure is delivered as an
/// `Err` message, after which the channel closes.
pub fn start_watcher(
    source_root: &Path,
    filter: PathFilter,
) -> Result<(WatcherHandle, tokio_mpsc::Receiver<WatchMessage>), WatchSessionError> {
    let (std_tx, std_rx) = std::sync::mpsc::channel::<notify::Result<notify::Event>>();

    let mut watcher = notify::recommended_watcher(move |res| {
        let _ = std_tx.send(res);
    })?;
    watcher.watch(source_root, RecursiveMode::Recursive)?;

    let mut translator = Translator::new(source_root, filter);

    let (tokio_tx, tokio_rx) = tokio_mpsc::channel::<WatchMessage>(256);

    let bridge_task = tokio::task::spawn_blocking(move || {
        while let Ok(result) = std_rx.recv() {
            match result {
                Ok(raw) => {
                    for watch_event in translator.translate(&raw) {
                        if tokio_tx.blocking_send(Ok(watch_event)).is_err() {
                            return; // receiver dropped, shutdown
                        }
                    }
                }
                Err(err) if matches!(err.kind, notify::ErrorKind::PathNotFound) => {
                    // A directory vanished while its watch was being added.
                    tracing::debug!("[watcher] {err}");
                }
                Err(err) => {
                    let _ = tokio_tx.blocking_send(Err(WatchSessionError::Watcher(err)));
                    return;
                }
            }
        }
    });

    Ok((
        WatcherHandle {
            _watcher: watcher,
            _bridge_task: bridge_task,
        },
        tokio_rx,
    ))
}

/// Turns raw notify events into [`WatchEvent`]s.
///
/// Remembers which paths are directories so removals reported without a
/// file/folder distinction still map to the right kind.
struct Translator {
    filter: TreeFilter,
    known_dirs: HashSet<PathBuf>,
}

impl Translator {
    fn new(root: &Path, filter: PathFilter) -> Self {
        let filter = TreeFilter::new(root, filter);
        let known_dirs = filter
            .walk(root)
            .into_iter()
            .filter(|e| e.is_dir)
            .map(|e| e.path)
            .collect();
        Self { filter, known_dirs }
    }

    fn translate(&mut self, raw: &notify::Event) -> Vec<WatchEvent> {
        let mut out = Vec::new();
        match raw.kind {
            EventKind::Create(CreateKind::Folder) => {
                for path in &raw.paths {
                    self.dir_added(path, &mut out);
                }
            }
            EventKind::Create(CreateKind::File) => {
                for path in &raw.paths {
                    self.push(WatchEventKind::UnitAdded, path, &mut out);
                }
            }
            EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                for path in &raw.paths {
                    self.added(path, &mut out);
                }
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
                for path in &raw.paths {
                    self.removed(path, &mut out);
                }
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                if let [from, to] = raw.paths.as_slice() {
                    self.removed(from, &mut out);
                    self.added(to, &mut out);
                }
            }
            EventKind::Modify(ModifyKind::Name(_)) => {
                for path in &raw.paths {
                    if path.exists() {
                        self.added(path, &mut out);
                    } else {
                        self.removed(path, &mut out);
                    }
                }
            }
            EventKind::Modify(ModifyKind::Metadata(_)) => {}
            EventKind::Modify(_) => {
                for path in &raw.paths {
                    if path.is_file() {
                        self.push(WatchEventKind::UnitChanged, path, &mut out);
                    }
                }
            }
            EventKind::Remove(RemoveKind::Folder) => {
                for path in &raw.paths {
                    self.push(WatchEventKind::DirRemoved, path, &mut out);
                }
            }
            EventKind::Remove(RemoveKind::File) => {
                for path in &raw.paths {
                    self.push(WatchEventKind::UnitRemoved, path, &mut out);
                }
            }
            EventKind::Remove(_) => {
                for path in &raw.paths {
                    self.removed(path, &mut out);
                }
            }
            EventKind::Access(_) | EventKind::Any | EventKind::Other => {}
        }
        out
    }

    fn added(&mut self, path: &Path, out: &mut Vec<WatchEvent>) {
        if path.is_dir() {
            self.dir_added(path, out);
        } else {
            self.push(WatchEventKind::UnitAdded, path, out);
        }
    }

    /// A new directory may already hold files created before its watch was
    /// registered (`mkdir -p` + write, or a directory moved in). Report them.
    fn dir_added(&mut self, path: &Path, out: &mut Vec<WatchEvent>) {
        if !self.push(WatchEventKind::DirAdded, path, out) {
            return;
        }
        for entry in self.filter.walk(path) {
            let kind = if entry.is_dir {
                WatchEventKind::DirAdded
            } else {
                WatchEventKind::UnitAdded
            };
            self.push(kind, &entry.path, out);
        }
    }

    fn removed(&mut self, path: &Path, out: &mut Vec<WatchEvent>) {
        if self.known_dirs.contains(path) {
            self.push(WatchEventKind::DirRemoved, path, out);
        } else {
            self.push(WatchEventKind::UnitRemoved, path, out);
        }
    }

    /// Filter, track directory membership, and emit. Returns false if the
    /// path was filtered out.
    fn push(&mut self, kind: WatchEventKind, path: &Path, out: &mut Vec<WatchEvent>) -> bool {
        if !self.accepts(kind, path) {
            return false;
        }
        match kind {
            WatchEventKind::DirAdded => {
                self.known_dirs.insert(path.to_path_buf());
            }
            WatchEventKind::DirRemoved => {
                self.known_dirs.retain(|d| !d.starts_with(path));
            }
            _ => {}
        }
        out.push(WatchEvent::new(kind, path));
        true
    }

    fn accepts(&self, kind: WatchEventKind, path: &Path) -> bool {
        let is_dir = matches!(kind, WatchEventKind::DirAdded | WatchEventKind::DirRemoved);
        self.filter.accepts(path, is_dir)
    }
}
