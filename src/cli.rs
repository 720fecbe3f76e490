use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Incremental build-and-reload orchestrator.
///
/// devloop watches a source tree, rebuilds only the file that changed into a
/// mirrored output tree, and then either hot-reloads the running target or
/// restarts it when a privileged entry point (e.g. a preload script) changed.
#[derive(Parser, Debug)]
#[command(
    name = "devloop",
    version,
    about,
    long_about = None,
    propagate_version = true,
)]
pub struct Cli {
    /// Log at debug level (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch the project's source tree and rebuild, reload or restart on change.
    ///
    /// Reads `devloop.toml` from the project root. Runs until Ctrl+C.
    Watch {
        /// Path to the project root.
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Skip the initial full build pass.
        #[arg(long)]
        no_initial_build: bool,
    },

    /// Build every unit and asset of the source tree once, then exit.
    ///
    /// Exits with a non-zero status if any unit failed to build.
    Build {
        /// Path to the project root.
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Output results as JSON instead of human-readable text.
        #[arg(long)]
        json: bool,
    },

    /// Print the URL a client should use for a dev server bound to ADDR.
    ResolveUrl {
        /// Bound address, e.g. 127.0.0.1:5173 or [::]:3000.
        addr: String,

        /// Use https instead of http.
        #[arg(long)]
        https: bool,

        /// Base path appended to the URL.
        #[arg(long, default_value = "/")]
        base: String,

        /// Path (or absolute URL) overriding --base.
        #[arg(long)]
        open: Option<String>,

        /// Output results as JSON instead of human-readable text.
        #[arg(long)]
        json: bool,
    },
}
