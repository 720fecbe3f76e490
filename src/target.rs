use std::path::PathBuf;
use std::sync::Arc;

use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// The running target the orchestrator signals after a rebuild.
///
/// Both signals are fire-and-forget: implementations must not block.
pub trait ReloadTarget: Send + Sync + 'static {
    /// The change only takes effect in a fresh process.
    fn request_full_restart(&self);
    /// The change can be hot-swapped into the running process.
    fn request_in_place_reload(&self);
}

impl<T: ReloadTarget> ReloadTarget for Arc<T> {
    fn request_full_restart(&self) {
        (**self).request_full_restart();
    }

    fn request_in_place_reload(&self) {
        (**self).request_in_place_reload();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Restart,
    Reload,
}

/// Supervises the target as a child process.
///
/// A restart kills the running child and spawns `run` again. A reload runs
/// the optional `reload` hook command; if nothing is running yet the target
/// is started instead. Dropping the handle stops the child.
pub struct ProcessTarget {
    tx: mpsc::UnboundedSender<Signal>,
    _supervisor: JoinHandle<()>,
}

impl ProcessTarget {
    pub fn spawn(run: Option<Vec<String>>, reload: Option<Vec<String>>, cwd: PathBuf) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let supervisor = tokio::spawn(supervise(rx, Commands { run, reload, cwd }));
        Self {
            tx,
            _supervisor: supervisor,
        }
    }

    fn send(&self, signal: Signal) {
        if self.tx.send(signal).is_err() {
            tracing::warn!("target supervisor has stopped, dropping {signal:?}");
        }
    }
}

impl ReloadTarget for ProcessTarget {
    fn request_full_restart(&self) {
        self.send(Signal::Restart);
    }

    fn request_in_place_reload(&self) {
        self.send(Signal::Reload);
    }
}

struct Commands {
    run: Option<Vec<String>>,
    reload: Option<Vec<String>>,
    cwd: PathBuf,
}

impl Commands {
    fn command(&self, argv: &[String]) -> Option<Command> {
        let (program, args) = argv.split_first()?;
        let mut cmd = Command::new(program);
        cmd.args(args).current_dir(&self.cwd).kill_on_drop(true);
        crate::env::apply(&mut cmd);
        Some(cmd)
    }

    fn start(&self) -> Option<Child> {
        let argv = self.run.as_deref()?;
        let mut cmd = self.command(argv)?;
        match cmd.spawn() {
            Ok(child) => {
                tracing::info!("started target: {}", argv.join(" "));
                Some(child)
            }
            Err(err) => {
                tracing::error!("failed to start target `{}`: {err}", argv.join(" "));
                None
            }
        }
    }

    async fn run_reload_hook(&self, argv: &[String]) {
        let Some(mut cmd) = self.command(argv) else {
            return;
        };
        match cmd.status().await {
            Ok(status) if status.success() => tracing::info!("reload signalled"),
            Ok(status) => tracing::warn!("reload hook exited with {status}"),
            Err(err) => tracing::warn!("failed to run reload hook: {err}"),
        }
    }
}

async fn stop(mut child: Child) {
    match child.try_wait() {
        Ok(Some(status)) => tracing::debug!("target had already exited with {status}"),
        _ => {
            if let Err(err) = child.kill().await {
                tracing::warn!("failed to stop target: {err}");
            }
        }
    }
}

async fn supervise(mut rx: mpsc::UnboundedReceiver<Signal>, commands: Commands) {
    let mut child: Option<Child> = None;

    while let Some(signal) = rx.recv().await {
        match signal {
            Signal::Restart => {
                if let Some(running) = child.take() {
                    stop(running).await;
                }
                if commands.run.is_none() {
                    tracing::info!("restart requested (no run command configured)");
                }
                child = commands.start();
            }
            Signal::Reload => {
                let alive = match child.as_mut() {
                    Some(c) => matches!(c.try_wait(), Ok(None)),
                    None => false,
                };
                if !alive && commands.run.is_some() {
                    child = commands.start();
                } else if let Some(hook) = &commands.reload {
                    commands.run_reload_hook(hook).await;
                } else {
                    tracing::info!("reload requested (no reload command configured)");
                }
            }
        }
    }

    if let Some(running) = child.take() {
        stop(running).await;
    }
}
