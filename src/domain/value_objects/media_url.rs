use crate::domain::errors::DomainError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static PLAYLIST_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"[&?]list=([^&]+)").ok());

/// URL de origen saneada (sin comillas ni barras invertidas).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaUrl(String);

impl MediaUrl {
    /// Crea una URL de medio saneada.
    /// # Arguments
    /// - `url`: URL cruda ingresada por el usuario.
    /// # Errors
    /// - `DomainError::InvalidMediaUrl` si queda vacia tras sanear.
    pub fn new(url: impl Into<String>) -> Result<Self, DomainError> {
        let url = sanear(&url.into());

        if url.is_empty() {
            return Err(DomainError::InvalidMediaUrl(
                "URL cannot be empty".to_string(),
            ));
        }

        Ok(Self(url))
    }

    /// Devuelve la URL como `&str`.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Identificador de playlist (`list=`) si la URL apunta a una.
    pub fn playlist_id(&self) -> Option<&str> {
        let patron = PLAYLIST_PATTERN.as_ref()?;
        patron
            .captures(&self.0)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    }

    /// Forma corta para mensajes de consola.
    pub fn abreviada(&self, max: usize) -> String {
        if self.0.chars().count() <= max {
            return self.0.clone();
        }
        let corte: String = self.0.chars().take(max).collect();
        format!("{}...", corte)
    }
}

fn sanear(url: &str) -> String {
    url.trim()
        .chars()
        .filter(|c| !matches!(c, '\'' | '"' | '\\'))
        .collect()
}

impl TryFrom<&str> for MediaUrl {
    type Error = DomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<String> for MediaUrl {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for MediaUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
