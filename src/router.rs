//! The watch event router.
//!
//! Drains the watch stream on a single task. Each event is handled to
//! completion (build awaited, output tree mirrored) before the next one is
//! looked at, which keeps the output tree consistent: a directory removal can
//! never overtake the file removals inside it.
//!
//! | event                      | action                                        |
//! |----------------------------|-----------------------------------------------|
//! | unit-added / unit-changed  | build the unit                                |
//! | dir-added                  | create the mirrored directory if absent       |
//! | unit-removed               | delete the mirrored artifact if present       |
//! | dir-removed                | delete the mirrored directory recursively     |
//!
//! After every event the path is fed to the debounced reload decision:
//! privileged paths restart the target, everything else reloads in place.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::builder::{BuildInvoker, BuildOutcome, Compiler};
use crate::debounce::{DEFAULT_DELAY, Debounced};
use crate::error::{MirrorError, MirrorOp, WatchSessionError};
use crate::paths::OutputLayout;
use crate::target::ReloadTarget;
use crate::walker::TreeEntry;
use crate::watcher::WatchMessage;
use crate::watcher::event::{WatchEvent, WatchEventKind};

/// Observability hook, called synchronously before each event is dispatched.
pub type WatchCallback = Arc<dyn Fn(WatchEventKind, &Path) + Send + Sync>;

#[derive(Clone)]
pub struct RouterOptions {
    /// Mirror and build, but never signal the target.
    pub disable_reload_trigger: bool,
    /// Quiescence window of the reload decision.
    pub debounce: Duration,
    pub on_watch_event: Option<WatchCallback>,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            disable_reload_trigger: false,
            debounce: DEFAULT_DELAY,
            on_watch_event: None,
        }
    }
}

impl fmt::Debug for RouterOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterOptions")
            .field("disable_reload_trigger", &self.disable_reload_trigger)
            .field("debounce", &self.debounce)
            .field("on_watch_event", &self.on_watch_event.is_some())
            .finish()
    }
}

pub struct Router<C, T> {
    invoker: BuildInvoker<C>,
    target: Arc<T>,
    trigger: Debounced<PathBuf>,
    options: RouterOptions,
}

impl<C: Compiler, T: ReloadTarget> Router<C, T> {
    /// Must be called from within a tokio runtime.
    pub fn new(invoker: BuildInvoker<C>, target: T, options: RouterOptions) -> Self {
        let target = Arc::new(target);
        let classifier = invoker.classifier().clone();
        let signal = Arc::clone(&target);

        let trigger = Debounced::new(options.debounce, move |path: PathBuf| {
            if classifier.classify(&path).is_privileged {
                tracing::info!("{} changed, restarting target", path.display());
                signal.request_full_restart();
            } else {
                tracing::info!("{} changed, reloading", path.display());
                signal.request_in_place_reload();
            }
        });

        Self {
            invoker,
            target,
            trigger,
            options,
        }
    }

    pub fn layout(&self) -> &OutputLayout {
        self.invoker.layout()
    }

    /// Returns true while a reload decision is waiting for quiescence.
    pub fn has_pending_reload(&self) -> bool {
        self.trigger.is_pending()
    }

    /// Drain `events` until `shutdown` resolves or the stream fails.
    ///
    /// A watcher error, or the stream closing on its own, ends the session
    /// with an error. A build in progress when `shutdown` resolves still runs
    /// to completion. Any pending reload decision is dropped on return.
    pub async fn run<S>(
        mut self,
        mut events: mpsc::Receiver<WatchMessage>,
        shutdown: S,
    ) -> Result<(), WatchSessionError>
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let result = loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    tracing::info!("watch session stopped");
                    break Ok(());
                }
                message = events.recv() => match message {
                    Some(Ok(event)) => self.dispatch(event).await,
                    Some(Err(err)) => break Err(err),
                    None => break Err(WatchSessionError::Closed),
                },
            }
        };

        self.trigger.cancel();
        result
    }

    /// Handle one event, then schedule the reload decision for its path.
    pub async fn dispatch(&mut self, event: WatchEvent) {
        if let Some(callback) = &self.options.on_watch_event {
            callback(event.kind, &event.path);
        }
        tracing::debug!(kind = %event.kind, path = %event.path.display(), "dispatch");

        if !self.handle(&event).await {
            return;
        }

        if !self.options.disable_reload_trigger {
            self.trigger.call(event.path);
        }
    }

    /// Build every file and mirror every directory of `entries` (a walk of
    /// the source tree), then start the target once.
    ///
    /// No per-entry reload decisions are scheduled.
    pub async fn initial_build(&mut self, entries: &[TreeEntry]) -> usize {
        let mut failed = 0;
        for entry in entries {
            if entry.is_dir {
                self.handle(&WatchEvent::new(WatchEventKind::DirAdded, &entry.path))
                    .await;
            } else if self.invoker.build(&entry.path).await == BuildOutcome::Failed {
                failed += 1;
            }
        }

        if failed > 0 {
            tracing::warn!("initial build finished with {failed} failed unit(s)");
        } else {
            tracing::info!("initial build finished");
        }

        if !self.options.disable_reload_trigger {
            self.trigger.cancel();
            self.target.request_full_restart();
        }
        failed
    }

    /// Returns false if the event was outside the source tree.
    async fn handle(&self, event: &WatchEvent) -> bool {
        let layout = self.invoker.layout();
        if !event.path.starts_with(&layout.source_root) {
            tracing::warn!(
                path = %event.path.display(),
                root = %layout.source_root.display(),
                "event outside source root, ignoring"
            );
            return false;
        }

        let mirrored = match event.kind {
            WatchEventKind::UnitAdded | WatchEventKind::UnitChanged => {
                self.invoker.build(&event.path).await;
                return true;
            }
            WatchEventKind::DirAdded => self.mirror_dir_added(&event.path).await,
            WatchEventKind::UnitRemoved => self.mirror_unit_removed(&event.path).await,
            WatchEventKind::DirRemoved => self.mirror_dir_removed(&event.path).await,
        };

        if let Err(err) = mirrored {
            tracing::warn!("{err}");
        }
        true
    }

    async fn mirror_dir_added(&self, path: &Path) -> Result<(), MirrorError> {
        let Some(out) = self.layout().mirror(path) else {
            return Ok(());
        };
        if is_dir(&out).await {
            return Ok(());
        }
        tokio::fs::create_dir_all(&out)
            .await
            .map_err(|source| MirrorError {
                op: MirrorOp::CreateDir,
                path: out,
                source,
            })
    }

    async fn mirror_unit_removed(&self, path: &Path) -> Result<(), MirrorError> {
        let classification = self.invoker.classifier().classify(path);
        let Some(out) = self.layout().artifact_path(path, classification) else {
            return Ok(());
        };
        match tokio::fs::symlink_metadata(&out).await {
            Ok(meta) if meta.is_dir() => {
                // Reported as a file removal by a backend that could not tell.
                self.remove_dir(out).await
            }
            Ok(_) => tokio::fs::remove_file(&out)
                .await
                .map_err(|source| MirrorError {
                    op: MirrorOp::RemoveFile,
                    path: out,
                    source,
                }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(MirrorError {
                op: MirrorOp::RemoveFile,
                path: out,
                source,
            }),
        }
    }

    async fn mirror_dir_removed(&self, path: &Path) -> Result<(), MirrorError> {
        let Some(out) = self.layout().mirror(path) else {
            return Ok(());
        };
        if !is_dir(&out).await {
            return Ok(());
        }
        self.remove_dir(out).await
    }

    async fn remove_dir(&self, out: PathBuf) -> Result<(), MirrorError> {
        match tokio::fs::remove_dir_all(&out).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(MirrorError {
                op: MirrorOp::RemoveDir,
                path: out,
                source,
            }),
        }
    }
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}
