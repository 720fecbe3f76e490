use std::path::{Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};

/// One entry of the source tree, in walk order (parents before children).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub path: PathBuf,
    pub is_dir: bool,
}

/// Filters shared by the tree walk and the live watcher.
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    /// Dropped entirely, e.g. an output tree nested inside the source tree.
    pub output_root: Option<PathBuf>,
    /// Extra glob patterns from `devloop.toml`'s `exclude`.
    pub exclude: Vec<String>,
}

impl PathFilter {
    /// Returns true if `path` should never reach the router.
    pub fn is_excluded(&self, path: &Path) -> bool {
        if path_contains_skipped_dir(path) {
            return true;
        }
        if let Some(output_root) = &self.output_root
            && path.starts_with(output_root)
        {
            return true;
        }
        is_excluded_by_patterns(path, &self.exclude)
    }
}

/// Build a Gitignore matcher from the source root's .gitignore file.
/// If no .gitignore exists, returns an empty matcher that matches nothing.
fn build_gitignore_matcher(source_root: &Path) -> Gitignore {
    let mut builder = GitignoreBuilder::new(source_root);
    let gitignore_path = source_root.join(".gitignore");
    if gitignore_path.exists()
        && let Some(err) = builder.add(&gitignore_path)
    {
        tracing::warn!("{}: {err}", gitignore_path.display());
    }
    builder.build().unwrap_or_else(|_| Gitignore::empty())
}

/// The single decision of which paths under the source root exist as far as
/// the router is concerned. The initial walk and the live watcher both go
/// through it, so they never disagree about a path.
///
/// Only the source root's own `.gitignore` applies. Hidden files are kept,
/// and ignore files above the source root are not consulted.
#[derive(Debug, Clone)]
pub struct TreeFilter {
    root: PathBuf,
    paths: PathFilter,
    gitignore: Gitignore,
}

impl TreeFilter {
    pub fn new(root: &Path, paths: PathFilter) -> Self {
        Self {
            root: root.to_path_buf(),
            gitignore: build_gitignore_matcher(root),
            paths,
        }
    }

    /// Returns true if `path` is strictly below the root and not filtered out.
    pub fn accepts(&self, path: &Path, is_dir: bool) -> bool {
        if path == self.root || !path.starts_with(&self.root) {
            return false;
        }
        if self.paths.is_excluded(path) {
            return false;
        }
        !self
            .gitignore
            .matched_path_or_any_parents(path, is_dir)
            .is_ignore()
    }

    /// Walk everything below `start` (excluding `start` itself), which must
    /// lie inside the root. Rejected directories are not descended into.
    pub fn walk(&self, start: &Path) -> Vec<TreeEntry> {
        let start = start.to_path_buf();
        let filter = self.clone();
        let top = start.clone();

        let mut builder = ignore::WalkBuilder::new(&start);
        builder
            .standard_filters(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
                entry.path() == top || filter.accepts(entry.path(), is_dir)
            });

        let mut entries = Vec::new();
        for result in builder.build() {
            let entry = match result {
                Ok(e) => e,
                Err(err) => {
                    tracing::warn!("{err}");
                    continue;
                }
            };

            let path = entry.path();
            if path == start {
                continue;
            }

            entries.push(TreeEntry {
                path: path.to_path_buf(),
                is_dir: entry.file_type().is_some_and(|ft| ft.is_dir()),
            });
        }
        entries
    }
}

/// Walk the source tree below `root` (excluding `root` itself) through a
/// [`TreeFilter`] rooted there.
pub fn walk_source_tree(root: &Path, filter: &PathFilter) -> Vec<TreeEntry> {
    TreeFilter::new(root, filter.clone()).walk(root)
}

/// Directory names that are never part of the source tree.
const SKIPPED_DIRS: &[&str] = &["node_modules", ".git"];

/// Returns true if any component of `path` is a skipped directory.
fn path_contains_skipped_dir(path: &Path) -> bool {
    path.components().any(|c| {
        c.as_os_str()
            .to_str()
            .is_some_and(|s| SKIPPED_DIRS.contains(&s))
    })
}

/// Returns true if `path`, or any of its components, matches a pattern.
fn is_excluded_by_patterns(path: &Path, patterns: &[String]) -> bool {
    if patterns.is_empty() {
        return false;
    }
    let path_str = path.to_string_lossy();

    for pattern in patterns {
        let Ok(matcher) = glob::Pattern::new(pattern) else {
            continue;
        };
        if matcher.matches(&path_str) {
            return true;
        }
        for component in path.components() {
            if let Some(s) = component.as_os_str().to_str()
                && matcher.matches(s)
            {
                return true;
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn tmp() -> TempDir {
        tempfile::tempdir().expect("tempdir")
    }

    fn relative(root: &Path, entries: &[TreeEntry]) -> Vec<(String, bool)> {
        entries
            .iter()
            .map(|e| {
                (
                    e.path.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"),
                    e.is_dir,
                )
            })
            .collect()
    }

    #[test]
    fn test_walk_lists_directories_before_their_children() {
        let dir = tmp();
        fs::create_dir_all(dir.path().join("main/windows")).unwrap();
        fs::write(dir.path().join("main/windows/app.ts"), "").unwrap();
        fs::write(dir.path().join("index.ts"), "").unwrap();

        let entries = walk_source_tree(dir.path(), &PathFilter::default());
        assert_eq!(
            relative(dir.path(), &entries),
            vec![
                ("index.ts".to_string(), false),
                ("main".to_string(), true),
                ("main/windows".to_string(), true),
                ("main/windows/app.ts".to_string(), false),
            ]
        );
    }

    #[test]
    fn test_walk_excludes_node_modules_and_output_root() {
        let dir = tmp();
        fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        fs::write(dir.path().join("node_modules/pkg/index.js"), "").unwrap();
        fs::create_dir_all(dir.path().join("dist")).unwrap();
        fs::write(dir.path().join("dist/main.js"), "").unwrap();
        fs::write(dir.path().join("main.ts"), "").unwrap();

        let filter = PathFilter {
            output_root: Some(dir.path().join("dist")),
            exclude: Vec::new(),
        };
        let entries = walk_source_tree(dir.path(), &filter);
        assert_eq!(relative(dir.path(), &entries), vec![("main.ts".to_string(), false)]);
    }

    #[test]
    fn test_walk_respects_gitignore_without_git_repo() {
        let dir = tmp();
        fs::write(dir.path().join(".gitignore"), "generated.ts\n").unwrap();
        fs::write(dir.path().join("generated.ts"), "").unwrap();
        fs::write(dir.path().join("main.ts"), "").unwrap();

        let entries = walk_source_tree(dir.path(), &PathFilter::default());
        let names = relative(dir.path(), &entries);
        assert!(names.contains(&("main.ts".to_string(), false)));
        assert!(!names.iter().any(|(n, _)| n == "generated.ts"));
    }

    #[test]
    fn test_exclude_patterns_match_components() {
        let filter = PathFilter {
            output_root: None,
            exclude: vec!["__tests__".to_string(), "*.spec.ts".to_string()],
        };
        assert!(filter.is_excluded(Path::new("/src/__tests__/a.ts")));
        assert!(filter.is_excluded(Path::new("/src/a.spec.ts")));
        assert!(!filter.is_excluded(Path::new("/src/a.ts")));
    }
}
