//! Process-wide, write-once environment seeding for collaborator processes.

use std::sync::OnceLock;

use tokio::process::Command;

use crate::resolve::DevServerUrl;

/// Variable collaborator subprocesses read the dev-server URL from.
pub const DEV_SERVER_URL_VAR: &str = "DEV_SERVER_URL";

static DEV_SERVER_URL: OnceLock<String> = OnceLock::new();

/// Publish the resolved URL. Only the first publication in a process wins;
/// returns false if a URL was already published.
pub fn publish_dev_server_url(url: &DevServerUrl) -> bool {
    DEV_SERVER_URL.set(url.url.clone()).is_ok()
}

/// The published URL, if any.
pub fn dev_server_url() -> Option<&'static str> {
    DEV_SERVER_URL.get().map(String::as_str)
}

/// Pass the published environment to a collaborator subprocess.
pub fn apply(cmd: &mut Command) {
    if let Some(url) = dev_server_url() {
        cmd.env(DEV_SERVER_URL_VAR, url);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publication_is_write_once() {
        let first = DevServerUrl {
            url: "http://localhost:5173/".to_string(),
            hostname: "localhost".to_string(),
            port: 5173,
        };
        let second = DevServerUrl {
            url: "http://localhost:9999/".to_string(),
            hostname: "localhost".to_string(),
            port: 9999,
        };

        publish_dev_server_url(&first);
        assert!(!publish_dev_server_url(&second));
        assert_eq!(dev_server_url(), Some("http://localhost:5173/"));
    }
}
