use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::debounce::DEFAULT_DELAY;
use crate::resolve::{BoundAddress, UrlOptions};

/// Name of the configuration file looked up at the project root.
pub const CONFIG_FILE: &str = "devloop.toml";

/// Configuration loaded from `devloop.toml` at the project root.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DevloopConfig {
    /// Source tree to watch, relative to the project root.
    pub source_root: PathBuf,
    /// Output tree mirroring the source tree, relative to the project root.
    pub output_root: PathBuf,
    /// Glob patterns (relative to `source_root`) of entry points whose change
    /// requires a full restart of the target.
    pub privileged: Vec<String>,
    /// Build and mirror, but never signal the target.
    pub disable_reload_trigger: bool,
    /// Quiescence window before the reload decision, in milliseconds.
    pub debounce_ms: u64,
    /// Build the whole source tree once before watching.
    pub initial_build: bool,
    /// Extension build artifacts are written with.
    pub artifact_extension: String,
    /// Additional path patterns to exclude (beyond .gitignore and node_modules).
    pub exclude: Vec<String>,
    pub build: CommandConfig,
    pub run: CommandConfig,
    pub reload: CommandConfig,
    pub server: ServerConfig,
}

impl Default for DevloopConfig {
    fn default() -> Self {
        Self {
            source_root: PathBuf::from("src"),
            output_root: PathBuf::from("dist"),
            privileged: Vec::new(),
            disable_reload_trigger: false,
            debounce_ms: DEFAULT_DELAY.as_millis() as u64,
            initial_build: true,
            artifact_extension: "js".to_string(),
            exclude: Vec::new(),
            build: CommandConfig::default(),
            run: CommandConfig::default(),
            reload: CommandConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

/// An external command, as an argv list.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    pub command: Option<Vec<String>>,
}

impl CommandConfig {
    /// The configured command, if it is non-empty.
    pub fn argv(&self) -> Option<Vec<String>> {
        self.command.clone().filter(|argv| !argv.is_empty())
    }
}

/// The dev server whose URL is published to collaborator processes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bound address, e.g. `127.0.0.1:5173`. Unset means "not listening".
    pub address: Option<String>,
    pub https: bool,
    pub base: String,
    pub open: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: None,
            https: false,
            base: "/".to_string(),
            open: None,
        }
    }
}

impl ServerConfig {
    pub fn bound_address(&self) -> Option<BoundAddress> {
        self.address.as_deref().and_then(BoundAddress::parse)
    }

    pub fn url_options(&self) -> UrlOptions {
        UrlOptions {
            https: self.https,
            base: self.base.clone(),
            open: self.open.clone(),
        }
    }
}

impl DevloopConfig {
    /// Load configuration from `devloop.toml` in the given root directory.
    ///
    /// Returns a default configuration if the file does not exist or cannot be parsed.
    pub fn load(root: &Path) -> Self {
        let config_path = root.join(CONFIG_FILE);

        if !config_path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match toml::from_str::<Self>(&contents) {
                Ok(config) => config,
                Err(err) => {
                    tracing::warn!("failed to parse {CONFIG_FILE}: {err}. Using defaults.");
                    Self::default()
                }
            },
            Err(err) => {
                tracing::warn!("failed to read {CONFIG_FILE}: {err}. Using defaults.");
                Self::default()
            }
        }
    }

    pub fn source_dir(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.source_root)
    }

    pub fn output_dir(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.output_root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = DevloopConfig::load(dir.path());
        assert_eq!(config.source_root, PathBuf::from("src"));
        assert_eq!(config.output_root, PathBuf::from("dist"));
        assert_eq!(config.debounce_ms, 300);
        assert!(config.initial_build);
        assert!(!config.disable_reload_trigger);
        assert!(config.build.argv().is_none());
    }

    #[test]
    fn test_full_file_is_parsed() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"
source_root = "electron"
output_root = "dist-electron"
privileged = ["preload.ts"]
disable_reload_trigger = true
debounce_ms = 150
artifact_extension = "cjs"

[build]
command = ["esbuild", "{input}", "--outfile={output}"]

[run]
command = ["electron", "."]

[server]
address = "127.0.0.1:5173"
https = true
"#,
        )
        .unwrap();

        let config = DevloopConfig::load(dir.path());
        assert_eq!(config.source_dir(dir.path()), dir.path().join("electron"));
        assert_eq!(config.output_dir(dir.path()), dir.path().join("dist-electron"));
        assert_eq!(config.privileged, vec!["preload.ts"]);
        assert!(config.disable_reload_trigger);
        assert_eq!(config.debounce_ms, 150);
        assert_eq!(config.artifact_extension, "cjs");
        assert_eq!(config.build.argv().unwrap()[0], "esbuild");
        assert_eq!(config.run.argv().unwrap(), vec!["electron", "."]);
        assert!(config.reload.argv().is_none());
        assert_eq!(
            config.server.bound_address(),
            Some(BoundAddress::new("127.0.0.1", 5173))
        );
        assert!(config.server.url_options().https);
        assert_eq!(config.server.base, "/");
    }

    #[test]
    fn test_malformed_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "debounce_ms = \"soon\"").unwrap();
        let config = DevloopConfig::load(dir.path());
        assert_eq!(config.debounce_ms, 300);
    }

    #[test]
    fn test_empty_command_counts_as_unset() {
        let cmd = CommandConfig {
            command: Some(Vec::new()),
        };
        assert!(cmd.argv().is_none());
    }
}
