use std::{io::ErrorKind, path::Path, time::Duration};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs::read_to_string;

/// Long enough for a manual copy/paste round trip.
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_STUN_SERVER: &str = "stun:stun.l.google.com:19302";
pub const DEFAULT_PAGE_URL: &str = "https://duet.invalid/";

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    pub ice_servers: Vec<String>,
    pub connection_timeout_secs: u64,
    pub ice_disconnected_timeout_secs: u64,
    pub ice_failed_timeout_secs: u64,
    /// Base of every shareable link.
    pub page_url: String,
    pub audio: bool,
    pub video: bool,
    pub log_dir: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ice_servers: vec![DEFAULT_STUN_SERVER.to_owned()],
            connection_timeout_secs: DEFAULT_CONNECTION_TIMEOUT_SECS,
            ice_disconnected_timeout_secs: 5,
            ice_failed_timeout_secs: 25,
            page_url: DEFAULT_PAGE_URL.to_owned(),
            audio: true,
            video: true,
            log_dir: None,
        }
    }
}

impl Config {
    /// A missing file yields the defaults; a malformed one is an error.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = match read_to_string(path).await {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => {
                return Err(err).with_context(|| format!("Failed to read {}", path.display()))
            }
        };
        Self::parse(&text).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    pub fn ice_disconnected_timeout(&self) -> Duration {
        Duration::from_secs(self.ice_disconnected_timeout_secs)
    }

    pub fn ice_failed_timeout(&self) -> Duration {
        Duration::from_secs(self.ice_failed_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = Config::parse(
            r#"
                connection-timeout-secs = 30
                ice-servers = ["stun:stun.example.com:3478"]
                video = false
            "#,
        )
        .unwrap();
        assert_eq!(config.connection_timeout(), Duration::from_secs(30));
        assert_eq!(config.ice_servers, vec!["stun:stun.example.com:3478"]);
        assert!(!config.video);
        assert!(config.audio);
        assert_eq!(config.page_url, DEFAULT_PAGE_URL);
    }

    #[test]
    fn default_timeout_is_ten_minutes() {
        assert_eq!(
            Config::default().connection_timeout(),
            Duration::from_secs(600)
        );
    }

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path().join("duet.toml")).await.unwrap();
        assert_eq!(config, Config::default());
    }

    #[tokio::test]
    async fn loads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"page-url = "https://example.com/call""#).unwrap();
        let config = Config::load(file.path()).await.unwrap();
        assert_eq!(config.page_url, "https://example.com/call");
    }

    #[tokio::test]
    async fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "connection-timeout-secs = \"soon\"").unwrap();
        assert!(Config::load(file.path()).await.is_err());
    }
}
