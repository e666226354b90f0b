use crate::domain::errors::DomainError;
use crate::domain::models::extraction::ApiErrorBody;
use crate::domain::value_objects::MediaUrl;

/// Categoria de un codigo de error de la API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiErrorKind {
    Link,
    Content,
    InvalidBody,
    AuthMissing,
    AuthOther,
    Youtube,
    Fetch,
    Unknown(String),
}

impl ApiErrorKind {
    /// Clasifica por el tercer segmento del codigo (`error.api.<categoria>...`).
    pub fn classify(code: &str) -> Self {
        let segmentos: Vec<&str> = code.split('.').collect();

        match segmentos.get(2).copied() {
            Some("link") => Self::Link,
            Some("content") => Self::Content,
            Some("invalid_body") => Self::InvalidBody,
            Some("auth") => match segmentos.last().copied() {
                Some("missing") | Some("not_found") => Self::AuthMissing,
                _ => Self::AuthOther,
            },
            Some("youtube") => Self::Youtube,
            Some("fetch") => Self::Fetch,
            _ => Self::Unknown(code.to_string()),
        }
    }
}

/// Que hacer ante un error de la API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Saltar la instancia actual y reenviar la misma solicitud en otra.
    Retry,
    Terminal(DomainError),
}

/// Decide entre rotar de instancia o fallar.
pub fn retry_policy(error: &ApiErrorBody, source_url: &MediaUrl) -> RetryDecision {
    let code = error.code.clone();

    match ApiErrorKind::classify(&error.code) {
        ApiErrorKind::AuthMissing | ApiErrorKind::Youtube | ApiErrorKind::Fetch => {
            RetryDecision::Retry
        }
        ApiErrorKind::Link => RetryDecision::Terminal(DomainError::LinkError {
            url: source_url.to_string(),
            code,
        }),
        ApiErrorKind::Content => RetryDecision::Terminal(DomainError::ContentError {
            url: source_url.to_string(),
            code,
        }),
        ApiErrorKind::InvalidBody => {
            RetryDecision::Terminal(DomainError::InvalidBodyError { code })
        }
        ApiErrorKind::AuthOther => RetryDecision::Terminal(DomainError::AuthError { code }),
        ApiErrorKind::Unknown(_) => RetryDecision::Terminal(DomainError::UnrecognizedApiError {
            code,
            message: error.message(),
        }),
    }
}
