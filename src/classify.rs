use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use glob::{MatchOptions, Pattern};

/// Extensions handed to the compiler.
pub const BUILD_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx"];

/// Type-declaration files share a build extension but produce no artifact.
pub const DECLARATION_SUFFIX: &str = ".d.ts";

/// Extensions copied verbatim into the output tree.
pub const STATIC_EXTENSIONS: &[&str] = &["json", "node", "wasm"];

/// Decides whether a path is a privileged entry point (restart, not reload).
pub type PrivilegedPredicate = Arc<dyn Fn(&Path) -> bool + Send + Sync>;

/// What a path is, as far as the build pipeline cares.
///
/// `is_build_unit` and `is_static_asset` are never both true.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Classification {
    pub is_build_unit: bool,
    pub is_static_asset: bool,
    pub is_privileged: bool,
}

impl Classification {
    /// Neither built nor copied.
    pub fn is_ignored(&self) -> bool {
        !self.is_build_unit && !self.is_static_asset
    }
}

/// Returns true for source-code files that go through the compiler.
pub fn is_build_unit(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if name.ends_with(DECLARATION_SUFFIX) {
        return false;
    }
    extension_in(path, BUILD_EXTENSIONS)
}

/// Returns true for passthrough assets (data, native addons, wasm blobs).
pub fn is_static_asset(path: &Path) -> bool {
    extension_in(path, STATIC_EXTENSIONS)
}

fn extension_in(path: &Path, set: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| set.contains(&ext))
        .unwrap_or(false)
}

/// Path classifier carrying the session's privileged-path predicate.
#[derive(Clone)]
pub struct Classifier {
    privileged: PrivilegedPredicate,
}

impl fmt::Debug for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Classifier").finish_non_exhaustive()
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(Arc::new(|_: &Path| false))
    }
}

impl Classifier {
    pub fn new(privileged: PrivilegedPredicate) -> Self {
        Self { privileged }
    }

    pub fn classify(&self, path: &Path) -> Classification {
        let is_build_unit = is_build_unit(path);
        Classification {
            is_build_unit,
            // Build units never count as static assets.
            is_static_asset: !is_build_unit && is_static_asset(path),
            is_privileged: (self.privileged)(path),
        }
    }
}

/// Build a privileged predicate from glob patterns relative to `source_root`.
///
/// A pattern without a `/` is matched against the file name, so `preload.ts`
/// matches a preload script at any depth. Patterns containing `/` are matched
/// against the whole path relative to `source_root`.
pub fn privileged_globs(
    source_root: &Path,
    patterns: &[String],
) -> Result<PrivilegedPredicate, glob::PatternError> {
    let compiled = patterns
        .iter()
        .map(|p| Ok((Pattern::new(p)?, p.contains('/'))))
        .collect::<Result<Vec<_>, glob::PatternError>>()?;
    let root: PathBuf = source_root.to_path_buf();

    Ok(Arc::new(move |path: &Path| {
        let relative = path.strip_prefix(&root).unwrap_or(path);
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };
        compiled.iter().any(|(pattern, anchored)| {
            if *anchored {
                pattern.matches_path_with(relative, options)
            } else {
                relative
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|name| pattern.matches_with(name, options))
                    .unwrap_or(false)
            }
        })
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_units() {
        for p in ["/src/main.ts", "/src/a/b.tsx", "/src/c.js", "/src/d.jsx"] {
            assert!(is_build_unit(Path::new(p)), "{p}");
        }
    }

    #[test]
    fn test_declaration_files_are_not_build_units() {
        assert!(!is_build_unit(Path::new("/src/types/env.d.ts")));
        let c = Classifier::default().classify(Path::new("/src/global.d.ts"));
        assert!(c.is_ignored());
    }

    #[test]
    fn test_static_assets() {
        for p in ["/src/data.json", "/src/addon.node", "/src/lib.wasm"] {
            let c = Classifier::default().classify(Path::new(p));
            assert!(c.is_static_asset, "{p}");
            assert!(!c.is_build_unit, "{p}");
        }
    }

    #[test]
    fn test_other_files_are_ignored() {
        for p in ["/src/readme.md", "/src/style.css", "/src/Makefile", "/src/dir"] {
            assert!(Classifier::default().classify(Path::new(p)).is_ignored(), "{p}");
        }
    }

    #[test]
    fn test_build_unit_and_static_asset_are_mutually_exclusive() {
        let classifier = Classifier::default();
        for p in [
            "a.ts", "a.tsx", "a.js", "a.jsx", "a.d.ts", "a.json", "a.node", "a.wasm", "a.txt",
            "a", ".ts", "a.json.ts", "a.ts.json",
        ] {
            let c = classifier.classify(Path::new(p));
            assert!(!(c.is_build_unit && c.is_static_asset), "{p}");
        }
    }

    #[test]
    fn test_privileged_predicate_is_consulted() {
        let classifier = Classifier::new(Arc::new(|p: &Path| p.ends_with("preload.ts")));
        assert!(classifier.classify(Path::new("/src/preload.ts")).is_privileged);
        assert!(!classifier.classify(Path::new("/src/main.ts")).is_privileged);
    }

    #[test]
    fn test_privileged_globs_file_name_pattern_matches_any_depth() {
        let pred = privileged_globs(Path::new("/src"), &["preload.*".to_string()]).unwrap();
        assert!(pred(Path::new("/src/preload.ts")));
        assert!(pred(Path::new("/src/electron/preload.js")));
        assert!(!pred(Path::new("/src/main.ts")));
    }

    #[test]
    fn test_privileged_globs_anchored_pattern() {
        let pred = privileged_globs(Path::new("/src"), &["preload/**/*.ts".to_string()]).unwrap();
        assert!(pred(Path::new("/src/preload/index.ts")));
        assert!(pred(Path::new("/src/preload/bridge/ipc.ts")));
        assert!(!pred(Path::new("/src/main/preload/index.ts")));
    }

    #[test]
    fn test_privileged_globs_rejects_bad_pattern() {
        assert!(privileged_globs(Path::new("/src"), &["[".to_string()]).is_err());
    }
}
