use crate::domain::repositories::PlaylistRepository;
use crate::domain::value_objects::MediaUrl;
use crate::infrastructure::InfrastructureError;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use std::collections::HashSet;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36";
const HTTP_TIMEOUT_SECS: u64 = 20;

static VIDEO_ID: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#""videoId"\s*:\s*"([A-Za-z0-9_-]{11})""#).ok());

/// Expande playlists de YouTube leyendo la pagina publica.
#[derive(Clone)]
pub struct YoutubePlaylistClient {
    client: Client,
    base_url: String,
}

impl YoutubePlaylistClient {
    /// # Errors
    /// - `InfrastructureError::ExternalService` si falla la configuracion HTTP.
    pub fn new() -> Result<Self, InfrastructureError> {
        let client = Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(std::time::Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                InfrastructureError::ExternalService(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: "https://www.youtube.com".to_string(),
        })
    }

    /// Cambia el host desde el que se lee la playlist.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl PlaylistRepository for YoutubePlaylistClient {
    type Error = InfrastructureError;

    async fn expand(&self, playlist_url: &MediaUrl) -> Result<Vec<MediaUrl>, InfrastructureError> {
        let id = playlist_url.playlist_id().ok_or_else(|| {
            InfrastructureError::ExternalService(format!("Not a playlist URL: {}", playlist_url))
        })?;

        let response = self
            .client
            .get(format!("{}/playlist", self.base_url))
            .query(&[("list", id)])
            .send()
            .await
            .map_err(|e| {
                InfrastructureError::ExternalService(format!("HTTP request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(InfrastructureError::ExternalService(format!(
                "HTTP request failed with status: {}",
                status
            )));
        }

        let pagina = response.text().await.map_err(|e| {
            InfrastructureError::ExternalService(format!("Failed to read playlist: {}", e))
        })?;

        let host = if es_youtube_music(playlist_url) {
            "https://music.youtube.com"
        } else {
            "https://www.youtube.com"
        };

        let items: Vec<MediaUrl> = extraer_video_ids(&pagina)
            .into_iter()
            .filter_map(|video_id| MediaUrl::new(format!("{}/watch?v={}", host, video_id)).ok())
            .collect();

        if items.is_empty() {
            return Err(InfrastructureError::ExternalService(format!(
                "Playlist {} has no items",
                id
            )));
        }

        tracing::debug!(playlist = %id, items = items.len(), "expanded playlist");
        Ok(items)
    }
}

fn es_youtube_music(url: &MediaUrl) -> bool {
    let sin_esquema = url
        .as_str()
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    sin_esquema.starts_with("music.")
}

/// Ids en orden de primera aparicion, sin repetir.
fn extraer_video_ids(pagina: &str) -> Vec<String> {
    let Some(patron) = VIDEO_ID.as_ref() else {
        return Vec::new();
    };

    let mut vistos = HashSet::new();
    patron
        .captures_iter(pagina)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|id| vistos.insert(id.clone()))
        .collect()
}
