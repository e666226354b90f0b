use crate::domain::value_objects::{
    AudioFormat, DownloadMode, FilenameStyle, MediaUrl, VideoCodec, VideoQuality,
};
use serde::Serialize;
use serde_json::Value;

/// Parametros de una solicitud de extraccion.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionRequest {
    pub source_url: MediaUrl,
    pub quality: VideoQuality,
    pub download_mode: DownloadMode,
    pub filename_style: FilenameStyle,
    pub audio_format: Option<AudioFormat>,
    pub video_codec: Option<VideoCodec>,
}

impl ExtractionRequest {
    pub fn new(source_url: MediaUrl) -> Self {
        Self {
            source_url,
            quality: VideoQuality::default(),
            download_mode: DownloadMode::default(),
            filename_style: FilenameStyle::default(),
            audio_format: None,
            video_codec: None,
        }
    }

    /// Cuerpo JSON enviado a la instancia.
    pub fn body(&self) -> RequestBody<'_> {
        RequestBody {
            url: self.source_url.as_str(),
            video_quality: self.quality.as_str(),
            youtube_video_codec: self.video_codec.unwrap_or_default().as_str(),
            filename_style: self.filename_style.as_str(),
            audio_format: self.audio_format.map(|f| f.as_str()),
            download_mode: (self.download_mode != DownloadMode::Auto)
                .then(|| self.download_mode.as_str()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestBody<'a> {
    pub url: &'a str,
    pub video_quality: &'a str,
    pub youtube_video_codec: &'a str,
    pub filename_style: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_format: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_mode: Option<&'a str>,
}

/// Error estructurado devuelto por la API (`error.api.<categoria>.<detalle>`).
#[derive(Debug, Clone, PartialEq)]
pub struct ApiErrorBody {
    pub code: String,
    pub context: Option<Value>,
}

impl ApiErrorBody {
    /// Mensaje legible con el objeto de error completo.
    pub fn message(&self) -> String {
        match &self.context {
            Some(context) => format!("{{code: {}, context: {}}}", self.code, context),
            None => format!("{{code: {}}}", self.code),
        }
    }
}

/// Respuesta de la API ya interpretada.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionResponse {
    Tunnel {
        status: String,
        url: String,
        filename: String,
    },
    Error(ApiErrorBody),
}

/// Descriptor del archivo listo para descargar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionResult {
    pub status: String,
    pub source_url: MediaUrl,
    pub tunnel_url: String,
    pub filename: String,
}

impl ExtractionResult {
    pub fn extension(&self) -> Option<&str> {
        self.filename
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.is_empty())
    }
}
