use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// A single unit failed to build. Recovered by the router: logged, never fatal.
#[derive(Error, Debug)]
pub enum BuildError {
    /// The compiler process could not be started at all.
    #[error("failed to start compiler for {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The compiler ran and exited unsuccessfully.
    #[error("build failed for {path} ({status}){}", format_stderr(.stderr))]
    Failed {
        path: PathBuf,
        status: ExitStatus,
        stderr: String,
    },

    /// Preparing the artifact location or copying a static asset failed.
    #[error("i/o error while building {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn format_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("\n{trimmed}")
    }
}

/// The output-tree operation that a [`MirrorError`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorOp {
    CreateDir,
    RemoveFile,
    RemoveDir,
}

impl std::fmt::Display for MirrorOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            MirrorOp::CreateDir => "create directory",
            MirrorOp::RemoveFile => "remove file",
            MirrorOp::RemoveDir => "remove directory",
        })
    }
}

/// Creating or deleting a mirrored output entry failed. Logged, never fatal.
#[derive(Error, Debug)]
#[error("failed to {op} {path}: {source}")]
pub struct MirrorError {
    pub op: MirrorOp,
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// The filesystem watch itself failed. Fatal to the session.
#[derive(Error, Debug)]
pub enum WatchSessionError {
    #[error("filesystem watcher error: {0}")]
    Watcher(#[from] notify::Error),

    #[error("watch event stream closed unexpectedly")]
    Closed,

    #[error("i/o error while arming watch session: {0}")]
    Io(#[from] std::io::Error),
}

/// Crate-level error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Mirror(#[from] MirrorError),

    #[error(transparent)]
    WatchSession(#[from] WatchSessionError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mirror_error_message_names_operation_and_path() {
        let err = MirrorError {
            op: MirrorOp::RemoveDir,
            path: PathBuf::from("/dist/assets"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("failed to remove directory /dist/assets"), "got: {msg}");
    }

    #[test]
    fn test_build_error_io_mentions_path() {
        let err = BuildError::Io {
            path: PathBuf::from("/src/main.ts"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.to_string().contains("/src/main.ts"));
    }

    #[test]
    fn test_watch_session_error_wraps_into_crate_error() {
        let err: Error = WatchSessionError::Closed.into();
        assert!(matches!(err, Error::WatchSession(WatchSessionError::Closed)));
        assert_eq!(err.to_string(), "watch event stream closed unexpectedly");
    }

    #[test]
    fn test_format_stderr_skips_blank_output() {
        assert_eq!(format_stderr("  \n"), "");
        assert_eq!(format_stderr("boom\n"), "\nboom");
    }
}
