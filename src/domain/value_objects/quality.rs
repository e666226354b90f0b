use serde::{Serialize, Serializer};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

const CANONICAL: [&str; 10] = [
    "max", "3840", "2160", "1440", "1080", "720", "480", "360", "240", "144",
];

const ALIASES: [(&str, &str); 9] = [
    ("8k", "3840"),
    ("4k", "2160"),
    ("2k", "1440"),
    ("1080p", "1080"),
    ("720p", "720"),
    ("480p", "480"),
    ("360p", "360"),
    ("240p", "240"),
    ("144p", "144"),
];

const FALLBACK: &str = "1080";

/// Calidad de video normalizada al vocabulario de la API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VideoQuality(&'static str);

impl VideoQuality {
    /// Normaliza una calidad; valores desconocidos caen a `1080`.
    pub fn normalize(raw: &str) -> Self {
        let raw = raw.trim().to_lowercase();

        if let Some(token) = CANONICAL.iter().find(|token| **token == raw) {
            return Self(token);
        }

        match ALIASES.iter().find(|(alias, _)| *alias == raw) {
            Some((_, token)) => Self(token),
            None => Self(FALLBACK),
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl Default for VideoQuality {
    fn default() -> Self {
        Self(FALLBACK)
    }
}

impl FromStr for VideoQuality {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::normalize(s))
    }
}

impl fmt::Display for VideoQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for VideoQuality {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_tokens_pass_through() {
        for token in CANONICAL {
            assert_eq!(VideoQuality::normalize(token).as_str(), token);
        }
    }

    #[test]
    fn test_aliases() {
        assert_eq!(VideoQuality::normalize("4k").as_str(), "2160");
        assert_eq!(VideoQuality::normalize("8K").as_str(), "3840");
        assert_eq!(VideoQuality::normalize("2k").as_str(), "1440");
        assert_eq!(VideoQuality::normalize("720p").as_str(), "720");
        assert_eq!(VideoQuality::normalize("144p").as_str(), "144");
    }

    #[test]
    fn test_unknown_falls_back_to_1080() {
        assert_eq!(VideoQuality::normalize("best").as_str(), "1080");
        assert_eq!(VideoQuality::normalize("").as_str(), "1080");
        assert_eq!(VideoQuality::normalize("999").as_str(), "1080");
    }

    #[test]
    fn test_parse_never_fails() {
        let quality: VideoQuality = "whatever".parse().unwrap();
        assert_eq!(quality, VideoQuality::default());
    }
}
