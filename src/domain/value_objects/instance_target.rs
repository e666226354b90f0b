use crate::domain::errors::DomainError;
use std::fmt;

/// Sinonimos que piden seleccion automatica de instancia.
const AUTO_SENTINELS: [&str; 3] = ["f", "fetch", "get"];

/// Instancia configurada: fija o seleccionada automaticamente.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceTarget {
    Auto,
    Fixed(String),
}

impl InstanceTarget {
    /// Interpreta el valor configurado para la instancia.
    /// # Arguments
    /// - `raw`: URL, host o sentinela (`f`, `fetch`, `get`).
    /// # Errors
    /// - `DomainError::InvalidInstanceUrl` si contiene espacios.
    pub fn parse(raw: Option<&str>) -> Result<Self, DomainError> {
        let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
            return Ok(Self::Auto);
        };

        let sin_esquema = raw
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/')
            .to_lowercase();
        if AUTO_SENTINELS.contains(&sin_esquema.as_str()) {
            return Ok(Self::Auto);
        }

        if raw.chars().any(char::is_whitespace) {
            return Err(DomainError::InvalidInstanceUrl(raw.to_string()));
        }

        let url = if raw.contains("http") {
            raw.to_string()
        } else {
            format!("https://{}", raw)
        };
        Ok(Self::Fixed(url))
    }

    pub fn is_auto(&self) -> bool {
        matches!(self, Self::Auto)
    }

    pub fn fixed_url(&self) -> Option<&str> {
        match self {
            Self::Auto => None,
            Self::Fixed(url) => Some(url),
        }
    }
}

impl fmt::Display for InstanceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Fixed(url) => write!(f, "{}", url),
        }
    }
}
