use thiserror::Error;

/// Errores del dominio.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid media URL: {0}")]
    InvalidMediaUrl(String),

    #[error("Invalid instance URL: {0}")]
    InvalidInstanceUrl(String),

    #[error("Invalid {kind}: {value}")]
    InvalidOption { kind: &'static str, value: String },

    #[error("{url} is invalid - {code}")]
    LinkError { url: String, code: String },

    #[error("cannot get content of {url} - {code}")]
    ContentError { url: String, code: String },

    #[error("Request body is invalid - {code}")]
    InvalidBodyError { code: String },

    #[error("Authentication failed - {code}")]
    AuthError { code: String },

    #[error("{code} - {message}")]
    UnrecognizedApiError { code: String, message: String },

    #[error("No available cobalt instance")]
    NoAvailableInstance,

    #[error("Operation cancelled")]
    Cancelled,
}
