use std::future::Future;
use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::builder::{BuildInvoker, BuildOutcome, Compiler};
use crate::classify::{Classifier, PrivilegedPredicate, privileged_globs};
use crate::config::DevloopConfig;
use crate::error::{Error, Result, WatchSessionError};
use crate::paths::OutputLayout;
use crate::resolve;
use crate::router::{Router, RouterOptions, WatchCallback};
use crate::target::ReloadTarget;
use crate::walker::{PathFilter, TreeEntry, walk_source_tree};
use crate::watcher::{WatchMessage, WatcherHandle, start_watcher};

/// Per-session overrides on top of `devloop.toml`.
#[derive(Clone, Default)]
pub struct SessionOptions {
    /// Replaces the `privileged` globs from the config file.
    pub privileged: Option<PrivilegedPredicate>,
    pub on_watch_event: Option<WatchCallback>,
    /// Overrides `initial_build` from the config file.
    pub initial_build: Option<bool>,
}

/// Roots and matchers resolved once per session.
struct Resolved {
    layout: OutputLayout,
    classifier: Classifier,
    filter: PathFilter,
}

fn resolve_paths(
    config: &DevloopConfig,
    project_root: &Path,
    privileged: Option<PrivilegedPredicate>,
) -> Result<Resolved> {
    let source_dir = config.source_dir(project_root);
    let source_root = source_dir.canonicalize().map_err(|err| {
        Error::Config(format!(
            "source root {} is not accessible: {err}",
            source_dir.display()
        ))
    })?;

    let output_dir = config.output_dir(project_root);
    std::fs::create_dir_all(&output_dir)?;
    let output_root = output_dir.canonicalize()?;

    if source_root.starts_with(&output_root) {
        return Err(Error::Config(format!(
            "source root {} lies inside output root {}",
            source_root.display(),
            output_root.display()
        )));
    }

    let privileged = match privileged {
        Some(predicate) => predicate,
        None => privileged_globs(&source_root, &config.privileged)
            .map_err(|err| Error::Config(format!("invalid privileged pattern: {err}")))?,
    };

    let filter = PathFilter {
        output_root: output_root
            .starts_with(&source_root)
            .then(|| output_root.clone()),
        exclude: config.exclude.clone(),
    };

    Ok(Resolved {
        layout: OutputLayout::new(source_root, output_root, config.artifact_extension.clone()),
        classifier: Classifier::new(privileged),
        filter,
    })
}

/// Publish the dev-server URL for collaborator processes. Write-once: later
/// sessions in the same process keep the first URL.
fn seed_environment(config: &DevloopConfig) {
    let bound = config.server.bound_address();
    match resolve::resolve(bound.as_ref(), &config.server.url_options()) {
        Some(url) => {
            if crate::env::publish_dev_server_url(&url) {
                tracing::info!("dev server url: {}", url.url);
            }
        }
        None => tracing::debug!("no dev server address configured, not publishing a url"),
    }
}

/// A live watch session: the armed watcher, its event stream, and the router
/// that drains it.
pub struct Session<C, T> {
    router: Router<C, T>,
    events: mpsc::Receiver<WatchMessage>,
    _watcher: WatcherHandle,
}

impl<C: Compiler, T: ReloadTarget> Session<C, T> {
    /// Arm a session.
    ///
    /// The watch subscription is established before anything else touches
    /// the tree, so changes made while the initial build pass runs are
    /// buffered and dispatched afterwards instead of being missed.
    pub async fn start(
        config: &DevloopConfig,
        project_root: &Path,
        options: SessionOptions,
        compiler: C,
        target: T,
    ) -> Result<Self> {
        seed_environment(config);

        let resolved = resolve_paths(config, project_root, options.privileged)?;
        let source_root = resolved.layout.source_root.clone();

        let (watcher, events) = arm_watcher(&source_root, &resolved.filter).await?;
        tracing::info!(
            "watching {} -> {}",
            source_root.display(),
            resolved.layout.output_root.display()
        );

        let invoker = BuildInvoker::new(resolved.layout, resolved.classifier, compiler);
        let mut router = Router::new(
            invoker,
            target,
            RouterOptions {
                disable_reload_trigger: config.disable_reload_trigger,
                debounce: Duration::from_millis(config.debounce_ms),
                on_watch_event: options.on_watch_event,
            },
        );

        if options.initial_build.unwrap_or(config.initial_build) {
            let entries = walk(&source_root, &resolved.filter).await?;
            router.initial_build(&entries).await;
        }

        Ok(Self {
            router,
            events,
            _watcher: watcher,
        })
    }

    /// Drain watch events until `shutdown` resolves. A watcher failure ends
    /// the session with an error. The watcher is released on return.
    pub async fn run<S>(self, shutdown: S) -> std::result::Result<(), WatchSessionError>
    where
        S: Future<Output = ()>,
    {
        let Session {
            router,
            events,
            _watcher: watcher,
            ..
        } = self;
        let result = router.run(events, shutdown).await;
        drop(watcher);
        result
    }
}

/// Registering a recursive watch and indexing the tree's directories both
/// touch every directory, so this runs on the blocking pool.
async fn arm_watcher(
    root: &Path,
    filter: &PathFilter,
) -> Result<(WatcherHandle, mpsc::Receiver<WatchMessage>)> {
    let root = root.to_path_buf();
    let filter = filter.clone();
    let armed = tokio::task::spawn_blocking(move || start_watcher(&root, filter))
        .await
        .map_err(|err| Error::Io(std::io::Error::other(err)))?;
    Ok(armed?)
}

async fn walk(root: &Path, filter: &PathFilter) -> Result<Vec<TreeEntry>> {
    let root = root.to_path_buf();
    let filter = filter.clone();
    tokio::task::spawn_blocking(move || walk_source_tree(&root, &filter))
        .await
        .map_err(|err| Error::Io(std::io::Error::other(err)))
}

/// Totals of a one-shot build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildSummary {
    pub built: usize,
    pub copied: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Build the whole source tree once, without watching or signalling.
pub async fn build_tree<C: Compiler>(
    config: &DevloopConfig,
    project_root: &Path,
    compiler: C,
) -> Result<BuildSummary> {
    seed_environment(config);
    let resolved = resolve_paths(config, project_root, None)?;
    let entries = walk(&resolved.layout.source_root, &resolved.filter).await?;
    let invoker = BuildInvoker::new(resolved.layout, resolved.classifier, compiler);

    let mut summary = BuildSummary::default();
    for entry in &entries {
        if entry.is_dir {
            continue;
        }
        match invoker.build(&entry.path).await {
            BuildOutcome::Built(_) => summary.built += 1,
            BuildOutcome::Copied(_) => summary.copied += 1,
            BuildOutcome::Skipped => summary.skipped += 1,
            BuildOutcome::Failed => summary.failed += 1,
        }
    }
    Ok(summary)
}
