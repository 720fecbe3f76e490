use std::path::{Path, PathBuf};

use crate::classify::Classification;

/// Re-root `source_path` from `source_root` under `output_root`, keeping the
/// relative directory structure exactly.
///
/// # Panics
///
/// Panics if `source_path` is not inside `source_root`. Callers that receive
/// paths from outside (watch events) should use [`try_to_output_path`].
pub fn to_output_path(source_root: &Path, output_root: &Path, source_path: &Path) -> PathBuf {
    match try_to_output_path(source_root, output_root, source_path) {
        Some(path) => path,
        None => panic!(
            "path {} is outside source root {}",
            source_path.display(),
            source_root.display()
        ),
    }
}

/// Like [`to_output_path`], but returns `None` for paths outside `source_root`.
pub fn try_to_output_path(
    source_root: &Path,
    output_root: &Path,
    source_path: &Path,
) -> Option<PathBuf> {
    let relative = source_path.strip_prefix(source_root).ok()?;
    if relative.as_os_str().is_empty() {
        return Some(output_root.to_path_buf());
    }
    Some(output_root.join(relative))
}

/// The source and output trees of one session, plus the extension build
/// artifacts are written with.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    pub source_root: PathBuf,
    pub output_root: PathBuf,
    pub artifact_extension: String,
}

impl OutputLayout {
    pub fn new(
        source_root: impl Into<PathBuf>,
        output_root: impl Into<PathBuf>,
        artifact_extension: impl Into<String>,
    ) -> Self {
        Self {
            source_root: source_root.into(),
            output_root: output_root.into(),
            artifact_extension: artifact_extension.into(),
        }
    }

    /// Plain mirror of a source path (directories, static assets).
    pub fn mirror(&self, source_path: &Path) -> Option<PathBuf> {
        try_to_output_path(&self.source_root, &self.output_root, source_path)
    }

    /// Where the artifact for `source_path` lives: the mirrored path, with the
    /// extension normalized when the path is a build unit.
    pub fn artifact_path(
        &self,
        source_path: &Path,
        classification: Classification,
    ) -> Option<PathBuf> {
        let mirrored = self.mirror(source_path)?;
        if classification.is_build_unit {
            Some(mirrored.with_extension(&self.artifact_extension))
        } else {
            Some(mirrored)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> Classification {
        Classification {
            is_build_unit: true,
            is_static_asset: false,
            is_privileged: false,
        }
    }

    fn asset() -> Classification {
        Classification {
            is_build_unit: false,
            is_static_asset: true,
            is_privileged: false,
        }
    }

    #[test]
    fn test_to_output_path_preserves_nested_structure() {
        let out = to_output_path(
            Path::new("/src"),
            Path::new("/dist"),
            Path::new("/src/main/windows/app.ts"),
        );
        assert_eq!(out, PathBuf::from("/dist/main/windows/app.ts"));
    }

    #[test]
    fn test_to_output_path_of_root_is_output_root() {
        let out = to_output_path(Path::new("/src"), Path::new("/dist"), Path::new("/src"));
        assert_eq!(out, PathBuf::from("/dist"));
    }

    #[test]
    #[should_panic(expected = "outside source root")]
    fn test_to_output_path_outside_root_panics() {
        to_output_path(Path::new("/src"), Path::new("/dist"), Path::new("/other/main.ts"));
    }

    #[test]
    fn test_try_to_output_path_rejects_sibling_prefix() {
        // `/srcfoo` shares a string prefix with `/src` but is not inside it.
        assert!(
            try_to_output_path(Path::new("/src"), Path::new("/dist"), Path::new("/srcfoo/a.ts"))
                .is_none()
        );
    }

    #[test]
    fn test_artifact_path_normalizes_build_unit_extension() {
        let layout = OutputLayout::new("/src", "/dist", "js");
        for (input, expected) in [
            ("/src/main.ts", "/dist/main.js"),
            ("/src/ui/view.tsx", "/dist/ui/view.js"),
            ("/src/legacy.jsx", "/dist/legacy.js"),
            ("/src/plain.js", "/dist/plain.js"),
        ] {
            assert_eq!(
                layout.artifact_path(Path::new(input), unit()),
                Some(PathBuf::from(expected)),
                "{input}"
            );
        }
    }

    #[test]
    fn test_artifact_path_keeps_static_asset_extension() {
        let layout = OutputLayout::new("/src", "/dist", "js");
        assert_eq!(
            layout.artifact_path(Path::new("/src/data/config.json"), asset()),
            Some(PathBuf::from("/dist/data/config.json"))
        );
    }

    #[test]
    fn test_artifact_path_honours_custom_extension() {
        let layout = OutputLayout::new("/src", "/dist", "cjs");
        assert_eq!(
            layout.artifact_path(Path::new("/src/main.ts"), unit()),
            Some(PathBuf::from("/dist/main.cjs"))
        );
    }
}
