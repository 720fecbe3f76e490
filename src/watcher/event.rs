use std::fmt;
use std::path::PathBuf;

/// What happened to a path in the source tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchEventKind {
    /// A file appeared.
    UnitAdded,
    /// A file's contents changed.
    UnitChanged,
    /// A directory appeared.
    DirAdded,
    /// A file disappeared.
    UnitRemoved,
    /// A directory disappeared.
    DirRemoved,
}

impl WatchEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WatchEventKind::UnitAdded => "unit-added",
            WatchEventKind::UnitChanged => "unit-changed",
            WatchEventKind::DirAdded => "dir-added",
            WatchEventKind::UnitRemoved => "unit-removed",
            WatchEventKind::DirRemoved => "dir-removed",
        }
    }
}

impl fmt::Display for WatchEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified filesystem event, consumed exactly once by the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: WatchEventKind,
    pub path: PathBuf,
}

impl WatchEvent {
    pub fn new(kind: WatchEventKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}
