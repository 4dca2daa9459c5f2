use std::path::PathBuf;

use thiserror::Error;
use tonic::Code;

use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum SdkError {
    /// Contradictory or incomplete arguments, rejected before any remote call.
    #[error("usage error: {0}")]
    Usage(String),

    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("remote service error ({code:?}): {message}")]
    Remote { code: Code, message: String },

    #[error("gRPC transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("download failed: {0}")]
    Download(#[from] reqwest::Error),

    /// The HTTP client used for signed-URL transfers could not be set up.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl SdkError {
    pub fn is_usage(&self) -> bool {
        matches!(self, SdkError::Usage(_))
    }

    /// True for both remote NotFound and a missing local file.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SdkError::NotFound(_) | SdkError::FileNotFound(_))
    }
}

impl From<tonic::Status> for SdkError {
    fn from(status: tonic::Status) -> Self {
        let message = status.message().to_string();
        match status.code() {
            Code::NotFound => SdkError::NotFound(message),
            Code::PermissionDenied => SdkError::PermissionDenied(message),
            Code::InvalidArgument => SdkError::InvalidArgument(message),
            Code::Unauthenticated => SdkError::Unauthenticated(message),
            Code::Unavailable => SdkError::Unavailable(message),
            code => SdkError::Remote { code, message },
        }
    }
}

pub type Result<T> = std::result::Result<T, SdkError>;
