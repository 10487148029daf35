use std::path::PathBuf;

use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum SdoError {
    #[error("invalid source: {0}")]
    #[diagnostic(help("run `sdo-fetch sources` to list the available source keys"))]
    InvalidSource(String),

    #[error("invalid preset: {0}")]
    InvalidPreset(String),

    #[error("invalid interval: {0}")]
    InvalidInterval(String),

    #[error("invalid image scale: {0}")]
    InvalidScale(String),

    #[error("Helioviewer request failed: {0}")]
    HelioviewerHttp(String),

    #[error("Helioviewer returned status {status}: {message}")]
    HelioviewerStatus { status: u16, message: String },

    #[error("unexpected response from {endpoint}: {message}")]
    UnexpectedResponse { endpoint: String, message: String },

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

/// Tag attached to a failed source in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureReason {
    InvalidArgument,
    Network,
    Status,
    UnexpectedResponse,
    Filesystem,
}

impl SdoError {
    pub fn failure_reason(&self) -> FailureReason {
        match self {
            SdoError::InvalidSource(_)
            | SdoError::InvalidPreset(_)
            | SdoError::InvalidInterval(_)
            | SdoError::InvalidScale(_)
            | SdoError::ConfigRead(_)
            | SdoError::ConfigParse(_) => FailureReason::InvalidArgument,
            SdoError::HelioviewerHttp(_) => FailureReason::Network,
            SdoError::HelioviewerStatus { .. } => FailureReason::Status,
            SdoError::UnexpectedResponse { .. } => FailureReason::UnexpectedResponse,
            SdoError::Filesystem(_) => FailureReason::Filesystem,
        }
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self.failure_reason(), FailureReason::InvalidArgument)
    }
}
