mod cli;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use devloop::builder::CommandCompiler;
use devloop::config::{CONFIG_FILE, DevloopConfig};
use devloop::resolve::{BoundAddress, UrlOptions, resolve};
use devloop::session::{Session, SessionOptions, build_tree};
use devloop::target::ProcessTarget;
use devloop::watcher::event::WatchEventKind;

fn compiler_for(config: &DevloopConfig) -> Result<CommandCompiler> {
    config
        .build
        .argv()
        .and_then(CommandCompiler::new)
        .with_context(|| format!("no [build] command configured in {CONFIG_FILE}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays clean for --json output.
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Watch {
            path,
            no_initial_build,
        } => {
            let config = DevloopConfig::load(&path);
            let compiler = compiler_for(&config)?;
            let target = ProcessTarget::spawn(config.run.argv(), config.reload.argv(), path.clone());

            let options = SessionOptions {
                initial_build: no_initial_build.then_some(false),
                on_watch_event: Some(Arc::new(|kind: WatchEventKind, file: &Path| {
                    tracing::debug!("{kind} {}", file.display());
                })),
                ..SessionOptions::default()
            };

            let session = Session::start(&config, &path, options, compiler, target).await?;
            session
                .run(async {
                    if let Err(err) = tokio::signal::ctrl_c().await {
                        tracing::error!("failed to listen for Ctrl+C: {err}");
                        std::future::pending::<()>().await;
                    }
                })
                .await?;
        }

        Commands::Build { path, json } => {
            let config = DevloopConfig::load(&path);
            let compiler = compiler_for(&config)?;
            let summary = build_tree(&config, &path, compiler).await?;

            if json {
                println!("{}", serde_json::to_string(&summary)?);
            } else {
                println!(
                    "Built {} unit(s), copied {} asset(s), skipped {} file(s).",
                    summary.built, summary.copied, summary.skipped
                );
            }
            if summary.failed > 0 {
                bail!("{} unit(s) failed to build", summary.failed);
            }
        }

        Commands::ResolveUrl {
            addr,
            https,
            base,
            open,
            json,
        } => {
            let bound = BoundAddress::parse(&addr)
                .with_context(|| format!("invalid address `{addr}`, expected HOST:PORT"))?;
            let options = UrlOptions { https, base, open };
            let Some(resolved) = resolve(Some(&bound), &options) else {
                bail!("could not resolve a url for {addr}");
            };

            if json {
                println!("{}", serde_json::to_string(&resolved)?);
            } else {
                println!("{}", resolved.url);
            }
        }
    }

    Ok(())
}
