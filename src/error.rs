use std::path::PathBuf;

use thiserror::Error;

use crate::notify::NotifyError;

#[derive(Debug, Error)]
pub enum PipeError {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid pipeline: {0}")]
    Pipeline(String),

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("notify error: {0}")]
    Notify(#[from] NotifyError),
}

pub type Result<T> = std::result::Result<T, PipeError>;

impl PipeError {
    pub fn pipeline(msg: impl Into<String>) -> Self {
        Self::Pipeline(msg.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_error_display() {
        let err = PipeError::pipeline("stage 2 has no target");
        assert_eq!(err.to_string(), "invalid pipeline: stage 2 has no target");
    }

    #[test]
    fn io_error_names_path() {
        let err = PipeError::io(
            "pipelines/missing.toml",
            std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        );
        assert!(err.to_string().contains("pipelines/missing.toml"));
    }
}
