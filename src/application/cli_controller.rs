use crate::application::session::{con_cancelacion, CobaltSession};
use crate::domain::errors::DomainError;
use crate::domain::models::ExtractionRequest;
use crate::domain::repositories::{CobaltRepository, DownloadOutcome, PlaylistRepository};
use crate::domain::value_objects::{InstanceTarget, MediaUrl, VideoQuality};
use crate::infrastructure::config::app_config::expandir_tilde;
use crate::infrastructure::{
    open_downloaded, AppConfig, CobaltClient, OpenAction, YoutubePlaylistClient,
};
use crate::presentation::{Cli, Commands, ConsoleOutput, ConsoleProgress, MediaArgs};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

/// Orquesta la ejecucion de la CLI.
pub async fn ejecutar_cli(cli: Cli, mut config: AppConfig) -> anyhow::Result<()> {
    let salida = Arc::new(ConsoleOutput::new());
    let Cli {
        urls,
        media,
        output,
        filename,
        playlist,
        play,
        show,
        instance,
        api_key,
        verbose: _,
        command,
    } = cli;

    if instance.is_some() {
        config.api.instance = instance;
    }
    if api_key.is_some() {
        config.api.api_key = api_key;
    }
    let target = InstanceTarget::parse(config.api.instance.as_deref())?;
    tracing::debug!(instance = %target, "instance target");

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = cancel_tx.send(true);
        }
    });
    let client = CobaltClient::new(&config.api)?.with_cancel_receiver(cancel_rx.clone());

    match command {
        Some(Commands::Instance) => {
            let mut session = CobaltSession::new(client, InstanceTarget::Auto)
                .with_events(salida.clone())
                .with_cancel_receiver(cancel_rx.clone());
            match session.select_instance().await {
                Ok(url) => salida.mostrar_instancia(&url),
                Err(_) if cancelado(&cancel_rx) => salida.mostrar_operacion_cancelada(),
                Err(err) => return Err(err.into()),
            }
            Ok(())
        }
        Some(Commands::Get { url, media }) => {
            let mut session = CobaltSession::new(client, target)
                .with_events(salida.clone())
                .with_cancel_receiver(cancel_rx.clone());
            let request = construir_solicitud(&config, &media, MediaUrl::try_from(url)?)?;
            match session.resolve(&request).await {
                Ok(file) => salida.mostrar_resultado(&file),
                Err(_) if cancelado(&cancel_rx) => salida.mostrar_operacion_cancelada(),
                Err(err) => return Err(err.into()),
            }
            Ok(())
        }
        None => {
            if urls.is_empty() {
                salida.mostrar_error_sin_url();
                std::process::exit(1);
            }
            if target.is_auto() {
                salida.advertir_sin_instancia();
            }

            let nombre = match filename {
                Some(nombre) if urls.len() == 1 && !playlist => Some(nombre),
                Some(_) => {
                    salida.advertir_nombre_ignorado();
                    None
                }
                None => None,
            };

            let mut al_terminar = Vec::new();
            if play {
                al_terminar.push(OpenAction::Play);
            }
            if show {
                al_terminar.push(OpenAction::Reveal);
            }

            let mut session = CobaltSession::new(client, target)
                .with_events(salida.clone())
                .with_cancel_receiver(cancel_rx.clone());
            let playlists = YoutubePlaylistClient::new()?;
            let destino = Destino {
                directorio: output.map(|ruta| expandir_tilde(&ruta)),
                nombre,
                al_terminar,
            };

            descargar_urls(
                &mut session,
                &playlists,
                &config,
                &media,
                urls,
                playlist,
                &destino,
                &cancel_rx,
                salida.as_ref(),
            )
            .await
        }
    }
}

struct Destino {
    directorio: Option<PathBuf>,
    nombre: Option<String>,
    al_terminar: Vec<OpenAction>,
}

fn cancelado(cancel_rx: &watch::Receiver<bool>) -> bool {
    *cancel_rx.borrow()
}

/// Descarga cada URL en orden; las playlists se expanden y se recorren de a un elemento.
#[allow(clippy::too_many_arguments)]
async fn descargar_urls<R, P>(
    session: &mut CobaltSession<R>,
    playlists: &P,
    config: &AppConfig,
    media: &MediaArgs,
    urls: Vec<String>,
    forzar_playlist: bool,
    destino: &Destino,
    cancel_rx: &watch::Receiver<bool>,
    salida: &ConsoleOutput,
) -> anyhow::Result<()>
where
    R: CobaltRepository,
    P: PlaylistRepository,
{
    let mut errores = 0;

    'urls: for raw in urls {
        if cancelado(cancel_rx) {
            break;
        }

        let url = match MediaUrl::try_from(raw.as_str()) {
            Ok(url) => url,
            Err(err) => {
                salida.error_fallo_descarga(&raw, &err.to_string());
                errores += 1;
                continue;
            }
        };

        let es_playlist = forzar_playlist || url.playlist_id().is_some();
        let items = if es_playlist {
            match con_cancelacion(Some(cancel_rx.clone()), playlists.expand(&url)).await {
                Ok(items) => {
                    salida.mostrar_playlist(&url, items.len());
                    items
                }
                Err(_) if cancelado(cancel_rx) => {
                    salida.mostrar_operacion_cancelada();
                    break 'urls;
                }
                Err(err) => {
                    salida.error_fallo_descarga(url.as_str(), &err.to_string());
                    errores += 1;
                    continue;
                }
            }
        } else {
            vec![url]
        };

        let total = items.len();
        for (indice, item) in items.iter().enumerate() {
            if cancelado(cancel_rx) {
                break 'urls;
            }
            if es_playlist {
                salida.mostrar_item_playlist(indice + 1, total, item);
            }

            match descargar_item(session, config, media, item, destino, salida).await {
                Ok(true) => break 'urls,
                Ok(false) => {}
                Err(_) if cancelado(cancel_rx) => {
                    salida.mostrar_cancelacion(item);
                    break 'urls;
                }
                Err(err) => {
                    salida.error_fallo_descarga(item.as_str(), &err.to_string());
                    errores += 1;
                }
            }
        }
    }

    if errores > 0 {
        anyhow::bail!("Fallo la descarga de {} elemento(s)", errores);
    }

    Ok(())
}

/// Resuelve y descarga un elemento. Devuelve `true` si el usuario cancelo.
async fn descargar_item<R: CobaltRepository>(
    session: &mut CobaltSession<R>,
    config: &AppConfig,
    media: &MediaArgs,
    url: &MediaUrl,
    destino: &Destino,
    salida: &ConsoleOutput,
) -> anyhow::Result<bool> {
    let request = construir_solicitud(config, media, url.clone())?;
    let file = session.resolve(&request).await?;

    let nombre = destino.nombre.as_deref().unwrap_or(&file.filename);
    let ruta = config.get_output_path(nombre, destino.directorio.as_deref());
    let progress = ConsoleProgress::new();

    match session
        .repository()
        .download_tunnel(&file, &ruta, &progress)
        .await?
    {
        DownloadOutcome::Completed { path, bytes } => {
            salida.mostrar_archivo_guardado(&path, bytes);
            for accion in &destino.al_terminar {
                if let Err(err) = open_downloaded(&path, *accion).await {
                    salida.advertir_apertura_fallida(&path, &err.to_string());
                }
            }
            Ok(false)
        }
        DownloadOutcome::Cancelled { .. } => {
            salida.mostrar_cancelacion(url);
            Ok(true)
        }
    }
}

/// Combina las opciones de linea de comandos con las de configuracion.
pub fn construir_solicitud(
    config: &AppConfig,
    media: &MediaArgs,
    url: MediaUrl,
) -> Result<ExtractionRequest, DomainError> {
    let defaults = &config.defaults;
    let mut request = ExtractionRequest::new(url);

    request.quality =
        VideoQuality::normalize(media.quality.as_deref().unwrap_or(&defaults.quality));
    request.download_mode = match media.mode.as_deref() {
        Some(mode) => mode.parse()?,
        None => defaults.download_mode,
    };
    request.filename_style = match media.filename_style.as_deref() {
        Some(style) => style.parse()?,
        None => defaults.filename_style,
    };
    request.audio_format = match media.audio_format.as_deref() {
        Some(format) => Some(format.parse()?),
        None => defaults.audio_format,
    };
    request.video_codec = match media.codec.as_deref() {
        Some(codec) => Some(codec.parse()?),
        None => defaults.video_codec,
    };

    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{AudioFormat, DownloadMode, FilenameStyle, VideoCodec};
    use crate::infrastructure::config::ApiConfig;
    use std::time::{Duration, Instant};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn url() -> MediaUrl {
        MediaUrl::new("https://youtu.be/x").unwrap()
    }

    #[test]
    fn solicitud_usa_defaults_de_configuracion() {
        let mut config = AppConfig::default();
        config.defaults.quality = "720p".to_string();
        config.defaults.audio_format = Some(AudioFormat::Mp3);

        let request = construir_solicitud(&config, &MediaArgs::default(), url()).unwrap();
        assert_eq!(request.quality.as_str(), "720");
        assert_eq!(request.download_mode, DownloadMode::Auto);
        assert_eq!(request.filename_style, FilenameStyle::Pretty);
        assert_eq!(request.audio_format, Some(AudioFormat::Mp3));
        assert_eq!(request.video_codec, None);
    }

    #[test]
    fn argumentos_tienen_prioridad() {
        let config = AppConfig::default();
        let media = MediaArgs {
            quality: Some("4k".to_string()),
            mode: Some("mute".to_string()),
            filename_style: Some("classic".to_string()),
            audio_format: Some("wav".to_string()),
            codec: Some("vp9".to_string()),
        };

        let request = construir_solicitud(&config, &media, url()).unwrap();
        assert_eq!(request.quality.as_str(), "2160");
        assert_eq!(request.download_mode, DownloadMode::Mute);
        assert_eq!(request.filename_style, FilenameStyle::Classic);
        assert_eq!(request.audio_format, Some(AudioFormat::Wav));
        assert_eq!(request.video_codec, Some(VideoCodec::Vp9));
    }

    #[test]
    fn opcion_invalida_falla() {
        let media = MediaArgs {
            mode: Some("video".to_string()),
            ..MediaArgs::default()
        };
        let err = construir_solicitud(&AppConfig::default(), &media, url()).unwrap_err();
        assert!(matches!(err, DomainError::InvalidOption { kind: "download mode", .. }));
    }

    #[test]
    fn calidad_desconocida_cae_a_1080() {
        let media = MediaArgs {
            quality: Some("ultra".to_string()),
            ..MediaArgs::default()
        };
        let request = construir_solicitud(&AppConfig::default(), &media, url()).unwrap();
        assert_eq!(request.quality.as_str(), "1080");
    }

    fn destino() -> Destino {
        Destino {
            directorio: None,
            nombre: None,
            al_terminar: Vec::new(),
        }
    }

    #[tokio::test]
    async fn cancelar_durante_la_playlist_no_cuenta_como_fallo() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/playlist"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"videoId":"aaaaaaaaaaa"}"#)
                    .set_delay(Duration::from_secs(10)),
            )
            .mount(&server)
            .await;

        let playlists = YoutubePlaylistClient::new()
            .unwrap()
            .with_base_url(server.uri());
        let client = CobaltClient::new(&ApiConfig::default()).unwrap();
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let mut session = CobaltSession::new(client, InstanceTarget::Auto)
            .with_cancel_receiver(cancel_rx.clone());

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let _ = cancel_tx.send(true);
        });

        let inicio = Instant::now();
        let resultado = descargar_urls(
            &mut session,
            &playlists,
            &AppConfig::default(),
            &MediaArgs::default(),
            vec!["https://www.youtube.com/playlist?list=PL1".to_string()],
            false,
            &destino(),
            &cancel_rx,
            &ConsoleOutput::new(),
        )
        .await;

        assert!(resultado.is_ok());
        assert!(inicio.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn url_vacia_cuenta_como_fallo() {
        let playlists = YoutubePlaylistClient::new().unwrap();
        let client = CobaltClient::new(&ApiConfig::default()).unwrap();
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let mut session = CobaltSession::new(client, InstanceTarget::Auto);

        let resultado = descargar_urls(
            &mut session,
            &playlists,
            &AppConfig::default(),
            &MediaArgs::default(),
            vec!["''".to_string()],
            false,
            &destino(),
            &cancel_rx,
            &ConsoleOutput::new(),
        )
        .await;

        assert!(resultado.is_err());
    }
}
