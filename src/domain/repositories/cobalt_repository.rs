use crate::domain::errors::DomainError;
use crate::domain::models::{ExtractionRequest, ExtractionResponse, ExtractionResult, Instance};
use crate::domain::value_objects::MediaUrl;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Contrato para hablar con el registro y las instancias de Cobalt.
#[async_trait]
pub trait CobaltRepository: Send + Sync {
    type Error: std::error::Error + From<DomainError> + Send + Sync + 'static;

    /// Obtiene la lista completa de instancias publicas, sin filtrar.
    /// # Errors
    /// - `Self::Error` si el registro no responde o el cuerpo es invalido.
    async fn fetch_instances(&self) -> Result<Vec<Instance>, Self::Error>;

    /// Verifica que la instancia responde.
    /// # Arguments
    /// - `api_url`: URL base de la instancia.
    /// # Returns
    /// - URL canonica que la instancia reporta de si misma.
    /// # Errors
    /// - `Self::Error` si no responde o el cuerpo es invalido.
    async fn probe_instance(&self, api_url: &str) -> Result<String, Self::Error>;

    /// Envia una solicitud de extraccion a la instancia.
    /// # Returns
    /// - Tunel listo o error estructurado de la API.
    /// # Errors
    /// - `Self::Error` si la instancia no es alcanzable.
    async fn request_extraction(
        &self,
        api_url: &str,
        request: &ExtractionRequest,
    ) -> Result<ExtractionResponse, Self::Error>;

    /// Descarga el tunel en `destination`.
    /// # Arguments
    /// - `file`: resultado de la extraccion.
    /// - `destination`: ruta final del archivo.
    /// - `progress`: receptor del avance.
    /// # Errors
    /// - `Self::Error` si falla la red o el disco. La cancelacion no es error.
    async fn download_tunnel(
        &self,
        file: &ExtractionResult,
        destination: &Path,
        progress: &dyn TransferProgress,
    ) -> Result<DownloadOutcome, Self::Error>;
}

/// Contrato para expandir una playlist en URLs individuales.
#[async_trait]
pub trait PlaylistRepository: Send + Sync {
    type Error: std::error::Error + From<DomainError> + Send + Sync + 'static;

    /// Devuelve las URLs de la playlist en orden.
    async fn expand(&self, playlist_url: &MediaUrl) -> Result<Vec<MediaUrl>, Self::Error>;
}

/// Resultado de una descarga.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Completed { path: PathBuf, bytes: u64 },
    Cancelled { path: PathBuf, bytes: u64 },
}

impl DownloadOutcome {
    pub fn path(&self) -> &Path {
        match self {
            Self::Completed { path, .. } | Self::Cancelled { path, .. } => path,
        }
    }

    pub fn bytes(&self) -> u64 {
        match self {
            Self::Completed { bytes, .. } | Self::Cancelled { bytes, .. } => *bytes,
        }
    }
}

/// Receptor del avance de una transferencia.
pub trait TransferProgress: Send + Sync {
    fn start(&self, filename: &str, total: Option<u64>);

    /// `rate` llega solo cuando se cerro una ventana de medicion.
    fn advance(&self, bytes: u64, rate: Option<f64>);

    fn finish(&self, bytes: u64, elapsed: Duration);

    fn abort(&self) {}
}

/// Ignora el avance.
pub struct NoProgress;

impl TransferProgress for NoProgress {
    fn start(&self, _filename: &str, _total: Option<u64>) {}

    fn advance(&self, _bytes: u64, _rate: Option<f64>) {}

    fn finish(&self, _bytes: u64, _elapsed: Duration) {}
}
