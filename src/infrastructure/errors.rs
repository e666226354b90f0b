use crate::domain::errors::DomainError;
use thiserror::Error;

/// Errores de infraestructura.
#[derive(Error, Debug)]
pub enum InfrastructureError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Instance registry unavailable: {0}")]
    RegistryUnavailable(String),

    #[error("Cannot reach instance {0}")]
    InstanceUnreachable(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Download error: {0}")]
    DownloadError(String),

    #[error("Cannot open {0}")]
    OpenFailed(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
