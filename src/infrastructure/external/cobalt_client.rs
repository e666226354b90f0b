use crate::domain::errors::DomainError;
use crate::domain::models::{
    ApiErrorBody, ExtractionRequest, ExtractionResponse, ExtractionResult, Instance, RateMeter,
};
use crate::domain::repositories::{CobaltRepository, DownloadOutcome, TransferProgress};
use crate::infrastructure::config::ApiConfig;
use crate::infrastructure::InfrastructureError;
use async_trait::async_trait;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT,
};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::time::Instant;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use tokio::time::{sleep, Duration};

const REGISTRY_USER_AGENT: &str = concat!(
    "cobaltdl/",
    env!("CARGO_PKG_VERSION"),
    " (instance discovery; cobalt CLI client)"
);
const CHUNK_SIZE: usize = 1024 * 1024;
const HTTP_RETRY_BASE_MS: u64 = 200;

#[derive(Debug, Deserialize)]
struct ProbeResponse {
    cobalt: ProbeInfo,
}

#[derive(Debug, Deserialize)]
struct ProbeInfo {
    url: String,
}

#[derive(Debug, Deserialize)]
struct RawExtraction {
    status: Option<String>,
    url: Option<String>,
    filename: Option<String>,
    error: Option<RawApiError>,
}

#[derive(Debug, Deserialize)]
struct RawApiError {
    code: String,
    #[serde(default)]
    context: Option<Value>,
}

/// Cliente HTTP para el registro de instancias y la API de Cobalt.
#[derive(Clone)]
pub struct CobaltClient {
    client: Client,
    registry_client: Client,
    registry_url: String,
    /// Solo viaja en las solicitudes de extraccion.
    authorization: Option<HeaderValue>,
    request_timeout: Duration,
    stream_idle_timeout: Duration,
    probe_retries: usize,
    cancel_rx: Option<watch::Receiver<bool>>,
}

impl CobaltClient {
    /// Crea un cliente con las cabeceras y tiempos de la configuracion.
    /// # Errors
    /// - `InfrastructureError::Configuration` si alguna cabecera es invalida.
    /// - `InfrastructureError::ExternalService` si falla la configuracion HTTP.
    pub fn new(config: &ApiConfig) -> Result<Self, InfrastructureError> {
        let headers = construir_cabeceras(config)?;
        let authorization = match config.authorization() {
            Some(valor) => {
                let mut valor = valor_cabecera(&valor)?;
                valor.set_sensitive(true);
                Some(valor)
            }
            None => None,
        };

        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(config.request_timeout())
            .build()
            .map_err(|e| {
                InfrastructureError::ExternalService(format!("Failed to create HTTP client: {}", e))
            })?;

        let registry_client = Client::builder()
            .user_agent(REGISTRY_USER_AGENT)
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| {
                InfrastructureError::ExternalService(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            registry_client,
            registry_url: config.registry_url.clone(),
            authorization,
            request_timeout: config.request_timeout(),
            stream_idle_timeout: config.stream_idle_timeout(),
            probe_retries: config.probe_retries,
            cancel_rx: None,
        })
    }

    /// Configura un receptor de cancelacion global.
    pub fn with_cancel_receiver(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    fn cancelado(&self) -> bool {
        self.cancel_rx
            .as_ref()
            .is_some_and(|cancel_rx| *cancel_rx.borrow())
    }

    /// Copia el cuerpo al archivo. Devuelve `false` si se cancelo antes del final.
    async fn copiar_cuerpo(
        &self,
        mut response: Response,
        archivo: &mut File,
        meter: &mut RateMeter,
        progress: &dyn TransferProgress,
    ) -> Result<bool, InfrastructureError> {
        let mut buffer: Vec<u8> = Vec::with_capacity(CHUNK_SIZE);
        let mut cancel_rx = self.cancel_rx.clone();

        loop {
            let evento = tokio::select! {
                leido = tokio::time::timeout(self.stream_idle_timeout, response.chunk()) => {
                    Some(leido)
                }
                _ = esperar_cancelacion(cancel_rx.as_mut()) => None,
            };

            let Some(leido) = evento else {
                return Ok(false);
            };

            let chunk = match leido {
                Err(_) => {
                    return Err(InfrastructureError::DownloadError(format!(
                        "No data received for {}s",
                        self.stream_idle_timeout.as_secs()
                    )));
                }
                Ok(Err(e)) => {
                    return Err(InfrastructureError::DownloadError(format!(
                        "Failed to read tunnel: {}",
                        e
                    )));
                }
                Ok(Ok(None)) => break,
                Ok(Ok(Some(chunk))) => chunk,
            };

            buffer.extend_from_slice(&chunk);
            if buffer.len() >= CHUNK_SIZE {
                archivo.write_all(&buffer).await?;
                buffer.clear();
            }

            let tasa = meter.record(chunk.len() as u64, Instant::now());
            progress.advance(chunk.len() as u64, tasa);
        }

        if !buffer.is_empty() {
            archivo.write_all(&buffer).await?;
        }
        archivo.flush().await?;
        Ok(true)
    }
}

#[async_trait]
impl CobaltRepository for CobaltClient {
    type Error = InfrastructureError;

    async fn fetch_instances(&self) -> Result<Vec<Instance>, InfrastructureError> {
        let response = self
            .registry_client
            .get(&self.registry_url)
            .send()
            .await
            .map_err(|e| {
                InfrastructureError::RegistryUnavailable(format!("HTTP request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(InfrastructureError::RegistryUnavailable(format!(
                "HTTP request failed with status: {}",
                status
            )));
        }

        let entradas: Vec<Value> = response.json().await.map_err(|e| {
            InfrastructureError::RegistryUnavailable(format!("Failed to parse response: {}", e))
        })?;

        Ok(parsear_instancias(entradas))
    }

    async fn probe_instance(&self, api_url: &str) -> Result<String, InfrastructureError> {
        let mut intento = 0;
        let mut espera_ms = HTTP_RETRY_BASE_MS;

        loop {
            let fallo = match self
                .client
                .get(api_url)
                .timeout(self.request_timeout)
                .send()
                .await
            {
                Ok(response) => {
                    let status = response.status();
                    if status.as_u16() == 429 || status.is_server_error() {
                        format!("HTTP request failed with status: {}", status)
                    } else if !status.is_success() {
                        return Err(InfrastructureError::ExternalService(format!(
                            "Probe of {} failed with status: {}",
                            api_url, status
                        )));
                    } else {
                        let info: ProbeResponse = response.json().await.map_err(|e| {
                            InfrastructureError::ExternalService(format!(
                                "Invalid probe response from {}: {}",
                                api_url, e
                            ))
                        })?;
                        return Ok(info.cobalt.url);
                    }
                }
                Err(e) => format!("HTTP request failed: {}", e),
            };

            if self.cancelado() {
                return Err(DomainError::Cancelled.into());
            }

            if intento < self.probe_retries {
                intento += 1;
                tracing::debug!(
                    instance = %api_url,
                    attempt = intento,
                    reason = %fallo,
                    "retrying probe"
                );
                sleep(Duration::from_millis(espera_ms)).await;
                espera_ms = espera_ms.saturating_mul(2);
                continue;
            }

            return Err(InfrastructureError::InstanceUnreachable(format!(
                "{} ({})",
                api_url, fallo
            )));
        }
    }

    async fn request_extraction(
        &self,
        api_url: &str,
        request: &ExtractionRequest,
    ) -> Result<ExtractionResponse, InfrastructureError> {
        let mut solicitud = self
            .client
            .post(api_url)
            .timeout(self.request_timeout)
            .json(&request.body());
        if let Some(authorization) = &self.authorization {
            solicitud = solicitud.header(AUTHORIZATION, authorization.clone());
        }

        let response = solicitud.send().await.map_err(|e| {
            InfrastructureError::InstanceUnreachable(format!("{} ({})", api_url, e))
        })?;

        // Los errores de la API llegan con status 4xx y cuerpo JSON.
        let status = response.status();
        let raw: RawExtraction = response.json().await.map_err(|e| {
            InfrastructureError::ExternalService(format!(
                "Invalid response from {} (status {}): {}",
                api_url, status, e
            ))
        })?;

        interpretar_respuesta(raw, api_url)
    }

    async fn download_tunnel(
        &self,
        file: &ExtractionResult,
        destination: &Path,
        progress: &dyn TransferProgress,
    ) -> Result<DownloadOutcome, InfrastructureError> {
        if self.cancelado() {
            return Ok(DownloadOutcome::Cancelled {
                path: destination.to_path_buf(),
                bytes: 0,
            });
        }

        let response = tokio::time::timeout(
            self.stream_idle_timeout,
            self.client.get(&file.tunnel_url).send(),
        )
        .await
        .map_err(|_| InfrastructureError::DownloadError("Tunnel did not respond".to_string()))?
        .map_err(|e| InfrastructureError::DownloadError(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(InfrastructureError::DownloadError(format!(
                "Tunnel responded with status: {}",
                status
            )));
        }

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut archivo = File::create(destination).await?;

        progress.start(&file.filename, response.content_length());
        let mut meter = RateMeter::new(Instant::now());
        let copia = self
            .copiar_cuerpo(response, &mut archivo, &mut meter, progress)
            .await;
        drop(archivo);

        match copia {
            Ok(true) => {
                let total = meter.total();
                progress.finish(total, meter.elapsed(Instant::now()));
                tracing::debug!(path = %destination.display(), bytes = total, "download completed");
                Ok(DownloadOutcome::Completed {
                    path: destination.to_path_buf(),
                    bytes: total,
                })
            }
            Ok(false) => {
                progress.abort();
                tokio::fs::remove_file(destination).await?;
                tracing::info!(
                    path = %destination.display(),
                    bytes = meter.total(),
                    "download cancelled"
                );
                Ok(DownloadOutcome::Cancelled {
                    path: destination.to_path_buf(),
                    bytes: meter.total(),
                })
            }
            Err(err) => {
                progress.abort();
                // No se conserva el parcial.
                if let Err(e) = tokio::fs::remove_file(destination).await {
                    tracing::warn!(
                        path = %destination.display(),
                        error = %e,
                        "cannot remove partial file"
                    );
                }
                Err(err)
            }
        }
    }
}

/// Resuelve cuando se pide cancelar; nunca si no hay receptor o el emisor se cerro.
async fn esperar_cancelacion(cancel_rx: Option<&mut watch::Receiver<bool>>) {
    let Some(cancel_rx) = cancel_rx else {
        return std::future::pending().await;
    };
    let cerrado = cancel_rx.wait_for(|cancelado| *cancelado).await.is_err();
    if cerrado {
        std::future::pending::<()>().await;
    }
}

/// Cabeceras comunes a instancias y tuneles. La clave de API no va aqui.
fn construir_cabeceras(config: &ApiConfig) -> Result<HeaderMap, InfrastructureError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(USER_AGENT, valor_cabecera(&config.user_agent)?);

    for (nombre, valor) in &config.headers {
        let nombre = HeaderName::from_bytes(nombre.as_bytes()).map_err(|e| {
            InfrastructureError::Configuration(format!("Invalid header name {}: {}", nombre, e))
        })?;
        headers.insert(nombre, valor_cabecera(valor)?);
    }

    Ok(headers)
}

fn valor_cabecera(valor: &str) -> Result<HeaderValue, InfrastructureError> {
    HeaderValue::from_str(valor.trim()).map_err(|e| {
        InfrastructureError::Configuration(format!("Invalid header value: {}", e))
    })
}

fn parsear_instancias(entradas: Vec<Value>) -> Vec<Instance> {
    entradas
        .into_iter()
        .filter_map(|entrada| match serde_json::from_value::<Instance>(entrada) {
            Ok(instance) => Some(instance),
            Err(err) => {
                tracing::debug!(error = %err, "ignoring malformed registry entry");
                None
            }
        })
        .collect()
}

fn interpretar_respuesta(
    raw: RawExtraction,
    api_url: &str,
) -> Result<ExtractionResponse, InfrastructureError> {
    if let Some(error) = raw.error {
        return Ok(ExtractionResponse::Error(ApiErrorBody {
            code: error.code,
            context: error.context,
        }));
    }

    let status = raw.status.unwrap_or_else(|| "tunnel".to_string());
    match (raw.url, raw.filename) {
        (Some(url), Some(filename)) => Ok(ExtractionResponse::Tunnel {
            status,
            url,
            filename,
        }),
        _ => Err(InfrastructureError::ExternalService(format!(
            "Unsupported response from {} (status {})",
            api_url, status
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(valor: Value) -> RawExtraction {
        serde_json::from_value(valor).expect("parse failed")
    }

    #[test]
    fn interpreta_tunel() {
        let respuesta = interpretar_respuesta(
            raw(json!({
                "status": "tunnel",
                "url": "https://i.example/tunnel?id=1",
                "filename": "clip.mp4",
            })),
            "https://i.example/",
        )
        .unwrap();
        assert_eq!(
            respuesta,
            ExtractionResponse::Tunnel {
                status: "tunnel".to_string(),
                url: "https://i.example/tunnel?id=1".to_string(),
                filename: "clip.mp4".to_string(),
            }
        );
    }

    #[test]
    fn interpreta_error_estructurado() {
        let respuesta = interpretar_respuesta(
            raw(json!({
                "status": "error",
                "error": {"code": "error.api.fetch.empty", "context": {"service": "youtube"}},
            })),
            "https://i.example/",
        )
        .unwrap();
        match respuesta {
            ExtractionResponse::Error(error) => {
                assert_eq!(error.code, "error.api.fetch.empty");
                assert_eq!(error.context, Some(json!({"service": "youtube"})));
            }
            other => panic!("Se esperaba error, llego {:?}", other),
        }
    }

    #[test]
    fn picker_no_soportado() {
        let resultado = interpretar_respuesta(
            raw(json!({"status": "picker", "picker": [{"url": "https://x"}]})),
            "https://i.example/",
        );
        assert!(matches!(resultado, Err(InfrastructureError::ExternalService(_))));
    }

    #[test]
    fn ignora_entradas_malformadas_del_registro() {
        let instancias = parsear_instancias(vec![
            json!({
                "api": "ok.example",
                "protocol": "https",
                "trust": 1,
                "version": "10.0.0",
                "services": {},
                "score": 1,
            }),
            json!({"protocol": "https"}),
            json!("texto"),
        ]);
        assert_eq!(instancias.len(), 1);
        assert_eq!(instancias[0].api, "ok.example");
    }

    #[test]
    fn cabeceras_comunes_sin_clave() {
        let mut config = ApiConfig::default();
        config.api_key = Some("k".to_string());
        config.headers.insert("X-Extra".to_string(), "1".to_string());
        config.headers.insert("User-Agent".to_string(), "custom".to_string());

        let headers = construir_cabeceras(&config).unwrap();
        assert!(!headers.contains_key(AUTHORIZATION));
        assert_eq!(headers[ACCEPT], "application/json");
        assert_eq!(headers["x-extra"], "1");
        assert_eq!(headers[USER_AGENT], "custom");
    }

    #[test]
    fn clave_queda_marcada_como_sensible() {
        let mut config = ApiConfig::default();
        config.api_key = Some(" k ".to_string());
        config.auth_scheme = "Bearer".to_string();

        let client = CobaltClient::new(&config).unwrap();
        let authorization = client.authorization.unwrap();
        assert_eq!(authorization, "Bearer k");
        assert!(authorization.is_sensitive());
    }

    #[test]
    fn cabecera_invalida_es_error_de_configuracion() {
        let mut config = ApiConfig::default();
        config.headers.insert("bad header".to_string(), "1".to_string());
        assert!(matches!(
            construir_cabeceras(&config),
            Err(InfrastructureError::Configuration(_))
        ));
    }
}
