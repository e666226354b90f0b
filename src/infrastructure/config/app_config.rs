use crate::domain::value_objects::{AudioFormat, DownloadMode, FilenameStyle, VideoCodec};
use directories::{ProjectDirs, UserDirs};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_REGISTRY_URL: &str = "https://instances.cobalt.best/api/instances.json";
pub const DEFAULT_USER_AGENT: &str = concat!("cobaltdl/", env!("CARGO_PKG_VERSION"));
const LOCAL_CONFIG: &str = "config/default.toml";
const FALLBACK_FILENAME: &str = "download";

/// Configuracion de la API y de salida.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub output_dir: PathBuf,
    pub api: ApiConfig,
    pub defaults: MediaDefaults,
}

/// Parametros de conexion con las instancias.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// URL fija, o `None`/sentinela para seleccion automatica.
    pub instance: Option<String>,
    pub api_key: Option<String>,
    pub auth_scheme: String,
    pub user_agent: String,
    pub registry_url: String,
    pub headers: BTreeMap<String, String>,
    pub request_timeout_secs: u64,
    pub stream_idle_timeout_secs: u64,
    pub probe_retries: usize,
}

/// Preferencias por defecto de cada solicitud.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaDefaults {
    pub quality: String,
    pub download_mode: DownloadMode,
    pub filename_style: FilenameStyle,
    pub audio_format: Option<AudioFormat>,
    pub video_codec: Option<VideoCodec>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let output_dir = if let Some(dirs) = UserDirs::new() {
            dirs.download_dir()
                .map(PathBuf::from)
                .unwrap_or_else(|| dirs.home_dir().join("Downloads"))
        } else {
            PathBuf::from(".")
        };
        Self {
            output_dir,
            api: ApiConfig::default(),
            defaults: MediaDefaults::default(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            instance: None,
            api_key: None,
            auth_scheme: "Api-Key".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            headers: BTreeMap::new(),
            request_timeout_secs: 30,
            stream_idle_timeout_secs: 60,
            probe_retries: 1,
        }
    }
}

impl Default for MediaDefaults {
    fn default() -> Self {
        Self {
            quality: "1080".to_string(),
            download_mode: DownloadMode::default(),
            filename_style: FilenameStyle::default(),
            audio_format: None,
            video_codec: None,
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn stream_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_idle_timeout_secs.max(1))
    }

    /// Valor de `Authorization` si hay clave configurada.
    pub fn authorization(&self) -> Option<String> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(|key| format!("{} {}", self.auth_scheme.trim(), key))
    }
}

impl AppConfig {
    /// Carga la configuracion desde `config/default.toml` o el directorio de usuario.
    /// # Notas
    /// - Si el archivo no existe o es invalido, usa valores por defecto.
    /// - `COBALT_API_URL`, `COBALT_API_KEY` y `COBALT_USER_AGENT` tienen prioridad.
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(ruta) = ruta_config() {
            match fs::read_to_string(&ruta) {
                Ok(contenido) => match toml::from_str::<FileConfig>(&contenido) {
                    Ok(file_config) => config.aplicar_archivo(file_config),
                    Err(err) => {
                        tracing::warn!(
                            path = %ruta.display(),
                            error = %err,
                            "invalid config file, using defaults"
                        );
                    }
                },
                Err(err) => {
                    tracing::warn!(path = %ruta.display(), error = %err, "cannot read config file");
                }
            }
        }

        config.aplicar_entorno(|clave| std::env::var(clave).ok());
        config
    }

    fn aplicar_archivo(&mut self, file_config: FileConfig) {
        if let Some(general) = file_config.general {
            if let Some(output_dir) = general.output_dir {
                self.output_dir = expandir_tilde(&output_dir);
            }
        }
        if let Some(api) = file_config.api {
            if api.instance.is_some() {
                self.api.instance = api.instance;
            }
            if api.api_key.is_some() {
                self.api.api_key = api.api_key;
            }
            if let Some(auth_scheme) = api.auth_scheme {
                self.api.auth_scheme = auth_scheme;
            }
            if let Some(user_agent) = api.user_agent {
                self.api.user_agent = user_agent;
            }
            if let Some(registry_url) = api.registry_url {
                self.api.registry_url = registry_url;
            }
            if let Some(headers) = api.headers {
                self.api.headers = headers;
            }
            if let Some(secs) = api.request_timeout_secs {
                self.api.request_timeout_secs = secs;
            }
            if let Some(secs) = api.stream_idle_timeout_secs {
                self.api.stream_idle_timeout_secs = secs;
            }
            if let Some(retries) = api.probe_retries {
                self.api.probe_retries = retries;
            }
        }
        if let Some(defaults) = file_config.defaults {
            if let Some(quality) = defaults.quality {
                self.defaults.quality = quality;
            }
            if let Some(mode) = defaults.download_mode {
                self.defaults.download_mode = mode;
            }
            if let Some(style) = defaults.filename_style {
                self.defaults.filename_style = style;
            }
            if defaults.audio_format.is_some() {
                self.defaults.audio_format = defaults.audio_format;
            }
            if defaults.video_codec.is_some() {
                self.defaults.video_codec = defaults.video_codec;
            }
        }
    }

    fn aplicar_entorno(&mut self, leer: impl Fn(&str) -> Option<String>) {
        let obtener = |clave: &str| leer(clave).filter(|valor| !valor.trim().is_empty());

        if let Some(instance) = obtener("COBALT_API_URL") {
            self.api.instance = Some(instance);
        }
        if let Some(api_key) = obtener("COBALT_API_KEY") {
            self.api.api_key = Some(api_key);
        }
        if let Some(user_agent) = obtener("COBALT_USER_AGENT") {
            self.api.user_agent = user_agent;
        }
    }

    /// Construye la ruta de salida a partir del nombre que sugiere la instancia.
    /// # Arguments
    /// - `filename`: nombre sugerido; solo se usa su ultimo componente.
    /// - `output_dir_override`: directorio opcional de salida.
    /// # Returns
    /// - Ruta completa del archivo de salida.
    pub fn get_output_path(&self, filename: &str, output_dir_override: Option<&Path>) -> PathBuf {
        let nombre = Path::new(filename.trim())
            .file_name()
            .and_then(|nombre| nombre.to_str())
            .filter(|nombre| !nombre.is_empty())
            .unwrap_or(FALLBACK_FILENAME);

        output_dir_override
            .unwrap_or(self.output_dir.as_path())
            .join(nombre)
    }
}

#[derive(Debug, Deserialize)]
struct FileConfig {
    general: Option<GeneralConfig>,
    api: Option<ApiFileConfig>,
    defaults: Option<DefaultsFileConfig>,
}

#[derive(Debug, Deserialize)]
struct GeneralConfig {
    output_dir: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiFileConfig {
    instance: Option<String>,
    api_key: Option<String>,
    auth_scheme: Option<String>,
    user_agent: Option<String>,
    registry_url: Option<String>,
    headers: Option<BTreeMap<String, String>>,
    request_timeout_secs: Option<u64>,
    stream_idle_timeout_secs: Option<u64>,
    probe_retries: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct DefaultsFileConfig {
    quality: Option<String>,
    download_mode: Option<DownloadMode>,
    filename_style: Option<FilenameStyle>,
    audio_format: Option<AudioFormat>,
    video_codec: Option<VideoCodec>,
}

fn ruta_config() -> Option<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG);
    if local.exists() {
        return Some(local);
    }
    ProjectDirs::from("", "", "cobaltdl")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .filter(|ruta| ruta.exists())
}

/// Expande `~/` al directorio personal.
pub fn expandir_tilde(ruta: &str) -> PathBuf {
    let ruta_normalizada = ruta.trim();
    if let Some(resto) = ruta_normalizada.strip_prefix("~/") {
        if let Some(home) = obtener_home_dir() {
            return home.join(resto);
        }
    }
    if let Some(resto) = ruta_normalizada.strip_prefix("~\\") {
        if let Some(home) = obtener_home_dir() {
            return home.join(resto);
        }
    }

    PathBuf::from(ruta_normalizada)
}

fn obtener_home_dir() -> Option<PathBuf> {
    UserDirs::new().map(|dirs| dirs.home_dir().to_path_buf())
}
