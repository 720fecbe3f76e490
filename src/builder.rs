use std::future::Future;
use std::path::{Path, PathBuf};

use tokio::process::Command;

use crate::classify::Classifier;
use crate::error::BuildError;
use crate::paths::OutputLayout;

/// The external source-to-artifact compiler.
///
/// Implementations must be safe to call concurrently for different paths.
pub trait Compiler: Send + Sync + 'static {
    /// Compile `input` into the artifact at `output`. The parent directory of
    /// `output` already exists when this is called.
    fn compile(
        &self,
        input: &Path,
        output: &Path,
    ) -> impl Future<Output = Result<(), BuildError>> + Send;
}

/// Runs a configured command per unit. `{input}` and `{output}` in any
/// argument are replaced with the unit's source and artifact paths.
#[derive(Debug, Clone)]
pub struct CommandCompiler {
    argv: Vec<String>,
}

impl CommandCompiler {
    /// Returns `None` for an empty command line.
    pub fn new(argv: Vec<String>) -> Option<Self> {
        if argv.is_empty() {
            None
        } else {
            Some(Self { argv })
        }
    }

    fn render(&self, input: &Path, output: &Path) -> Vec<String> {
        let input = input.to_string_lossy();
        let output = output.to_string_lossy();
        self.argv
            .iter()
            .map(|arg| arg.replace("{input}", &input).replace("{output}", &output))
            .collect()
    }
}

impl Compiler for CommandCompiler {
    async fn compile(&self, input: &Path, output: &Path) -> Result<(), BuildError> {
        let argv = self.render(input, output);
        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..]).kill_on_drop(true);
        crate::env::apply(&mut cmd);

        let result = cmd.output().await.map_err(|source| BuildError::Spawn {
            path: input.to_path_buf(),
            source,
        })?;

        if result.status.success() {
            Ok(())
        } else {
            Err(BuildError::Failed {
                path: input.to_path_buf(),
                status: result.status,
                stderr: String::from_utf8_lossy(&result.stderr).into_owned(),
            })
        }
    }
}

/// What happened to a unit handed to [`BuildInvoker::build`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// Compiled into the artifact at the given path.
    Built(PathBuf),
    /// Static asset copied to the given path.
    Copied(PathBuf),
    /// Neither a build unit nor a static asset.
    Skipped,
    /// The build failed; the error has been logged.
    Failed,
}

/// Builds a single unit, turning failures into log lines.
pub struct BuildInvoker<C> {
    layout: OutputLayout,
    classifier: Classifier,
    compiler: C,
}

impl<C: Compiler> BuildInvoker<C> {
    pub fn new(layout: OutputLayout, classifier: Classifier, compiler: C) -> Self {
        Self {
            layout,
            classifier,
            compiler,
        }
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Build `source_path`. Never fails: a broken unit is logged and its
    /// previous artifact is left in place until the next successful build.
    pub async fn build(&self, source_path: &Path) -> BuildOutcome {
        match self.try_build(source_path).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!("{err}");
                BuildOutcome::Failed
            }
        }
    }

    /// Build `source_path`, returning the error instead of logging it.
    pub async fn try_build(&self, source_path: &Path) -> Result<BuildOutcome, BuildError> {
        let classification = self.classifier.classify(source_path);
        if classification.is_ignored() {
            tracing::debug!(path = %source_path.display(), "not a build unit or asset, skipping");
            return Ok(BuildOutcome::Skipped);
        }

        let Some(output) = self.layout.artifact_path(source_path, classification) else {
            tracing::warn!(
                path = %source_path.display(),
                root = %self.layout.source_root.display(),
                "path is outside the source root, skipping"
            );
            return Ok(BuildOutcome::Skipped);
        };

        ensure_parent_dir(&output).await.map_err(|source| BuildError::Io {
            path: source_path.to_path_buf(),
            source,
        })?;

        if classification.is_build_unit {
            self.compiler.compile(source_path, &output).await?;
            tracing::info!("built {} -> {}", source_path.display(), output.display());
            Ok(BuildOutcome::Built(output))
        } else {
            tokio::fs::copy(source_path, &output)
                .await
                .map_err(|source| BuildError::Io {
                    path: source_path.to_path_buf(),
                    source,
                })?;
            tracing::info!("copied {} -> {}", source_path.display(), output.display());
            Ok(BuildOutcome::Copied(output))
        }
    }
}

async fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => tokio::fs::create_dir_all(dir).await,
        _ => Ok(()),
    }
}
