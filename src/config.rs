//! Runtime configuration loaded from `contentpipe.toml`.
//!
//! Every field has a default, so a missing file or a partial file is fine.
//! `CONTENTPIPE_NOTIFY_URL` takes precedence over the file's `notify_url`.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{PipeError, Result};

pub const DEFAULT_CONFIG_FILE: &str = "contentpipe.toml";
pub const NOTIFY_URL_ENV: &str = "CONTENTPIPE_NOTIFY_URL";

#[derive(Debug, Clone, Deserialize)]
pub struct PipeConfig {
    /// Interval between runner ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Endpoint for `notify` stages that do not name their own URL.
    #[serde(default)]
    pub notify_url: Option<String>,

    /// Request timeout for deploy notices.
    #[serde(default = "default_notify_timeout_secs")]
    pub notify_timeout_secs: u64,
}

fn default_tick_interval_ms() -> u64 {
    50
}

fn default_notify_timeout_secs() -> u64 {
    30
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            notify_url: None,
            notify_timeout_secs: default_notify_timeout_secs(),
        }
    }
}

impl PipeConfig {
    /// Loads `path`, or `contentpipe.toml` in the working directory.
    ///
    /// An explicitly given path must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(path) => (path, true),
            None => (Path::new(DEFAULT_CONFIG_FILE), false),
        };

        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path).map_err(|e| PipeError::io(path, e))?;
            Self::from_toml(&contents)?
        } else if required {
            return Err(PipeError::Config(format!(
                "config file {} does not exist",
                path.display()
            )));
        } else {
            Self::default()
        };

        if let Ok(url) = std::env::var(NOTIFY_URL_ENV) {
            if !url.is_empty() {
                config.notify_url = Some(url);
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            return Err(PipeError::Config(
                "tick_interval_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.notify_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = PipeConfig::default();
        assert_eq!(config.tick_interval_ms, 50);
        assert_eq!(config.tick_interval(), Duration::from_millis(50));
        assert_eq!(config.notify_timeout_secs, 30);
        assert!(config.notify_url.is_none());
    }

    #[test]
    fn deserialize_partial_toml() {
        let config = PipeConfig::from_toml(
            r#"
            notify_url = "http://localhost:9000/hooks"
        "#,
        )
        .unwrap();
        assert_eq!(config.notify_url.as_deref(), Some("http://localhost:9000/hooks"));
        assert_eq!(config.tick_interval_ms, 50);
    }

    #[test]
    fn zero_tick_interval_is_rejected() {
        let config = PipeConfig::from_toml("tick_interval_ms = 0").unwrap();
        assert!(matches!(config.validate(), Err(PipeError::Config(_))));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = PipeConfig::load(Some(&dir.path().join("nope.toml")));
        assert!(matches!(result, Err(PipeError::Config(_))));
    }

    #[test]
    fn load_reads_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipe.toml");
        std::fs::write(&path, "tick_interval_ms = 20\nnotify_timeout_secs = 5\n").unwrap();

        let config = PipeConfig::load(Some(&path)).unwrap();
        assert_eq!(config.tick_interval_ms, 20);
        assert_eq!(config.notify_timeout(), Duration::from_secs(5));
    }
}
