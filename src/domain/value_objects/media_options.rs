use crate::domain::errors::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Declara un enum de opciones con su representacion textual para la API.
macro_rules! media_option {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal, default = $default:ident,
        { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::$default
            }
        }

        impl FromStr for $name {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(DomainError::InvalidOption {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }
    };
}

media_option!(
    /// Modo de descarga: video con audio, solo audio o video sin audio.
    DownloadMode, "download mode", default = Auto, {
        Auto => "auto",
        Audio => "audio",
        Mute => "mute",
    }
);

media_option!(
    /// Estilo del nombre de archivo generado por la instancia.
    FilenameStyle, "filename style", default = Pretty, {
        Classic => "classic",
        Pretty => "pretty",
        Basic => "basic",
        Nerdy => "nerdy",
    }
);

media_option!(
    AudioFormat, "audio format", default = Best, {
        Best => "best",
        Mp3 => "mp3",
        Ogg => "ogg",
        Wav => "wav",
        Opus => "opus",
    }
);

media_option!(
    /// Codec preferido para videos de YouTube.
    VideoCodec, "video codec", default = H264, {
        H264 => "h264",
        Vp9 => "vp9",
        Av1 => "av1",
    }
);
