use crate::domain::errors::DomainError;
use crate::domain::models::instance::{filter_good, rank};
use crate::domain::models::{
    retry_policy, ExtractionRequest, ExtractionResponse, ExtractionResult, RetryDecision,
};
use crate::domain::repositories::CobaltRepository;
use crate::domain::value_objects::{InstanceTarget, MediaUrl};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

/// Avisos de estado durante la seleccion y la resolucion.
pub trait ResolveEvents: Send + Sync {
    fn buscando_instancia(&self) {}

    fn instancias_encontradas(&self, _cantidad: usize) {}

    fn instancia_activa(&self, _url: &str) {}

    fn reintentando(&self, _source: &MediaUrl, _instancia: &str, _code: &str) {}
}

/// No emite avisos.
pub struct SilentEvents;

impl ResolveEvents for SilentEvents {}

#[derive(Debug, Clone)]
struct ActiveInstance {
    canonical: String,
    /// URL con la que figuraba en el registro; `None` si vino de configuracion.
    listed: Option<String>,
}

/// Estado de una sesion contra la API: instancia activa y descartadas.
///
/// Las resoluciones toman `&mut self`, por lo que una sesion atiende una
/// resolucion a la vez. Flujos concurrentes deben usar sesiones separadas.
pub struct CobaltSession<R: CobaltRepository> {
    repository: R,
    active: Option<ActiveInstance>,
    skipped: HashSet<String>,
    events: Arc<dyn ResolveEvents>,
    cancel_rx: Option<watch::Receiver<bool>>,
}

impl<R: CobaltRepository> CobaltSession<R> {
    /// Crea una sesion; una instancia fija se usa sin verificar.
    pub fn new(repository: R, target: InstanceTarget) -> Self {
        let active = target.fixed_url().map(|url| ActiveInstance {
            canonical: url.to_string(),
            listed: None,
        });

        Self {
            repository,
            active,
            skipped: HashSet::new(),
            events: Arc::new(SilentEvents),
            cancel_rx: None,
        }
    }

    /// Corta la seleccion y la resolucion en curso cuando el canal pasa a `true`.
    pub fn with_cancel_receiver(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    pub fn with_events(mut self, events: Arc<dyn ResolveEvents>) -> Self {
        self.events = events;
        self
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn active_instance(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.canonical.as_str())
    }

    pub fn is_skipped(&self, url: &str) -> bool {
        self.skipped.contains(&clave(url))
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    /// Busca la mejor instancia no descartada y la deja activa.
    /// # Returns
    /// - URL canonica de la instancia elegida.
    /// # Errors
    /// - `DomainError::NoAvailableInstance` si se agotan los candidatos.
    /// - Error del repositorio si el registro no esta disponible.
    /// - `DomainError::Cancelled` si se pidio cancelar.
    pub async fn select_instance(&mut self) -> Result<String, R::Error> {
        self.comprobar_cancelacion()?;
        self.events.buscando_instancia();
        self.active = None;

        let registro =
            con_cancelacion(self.cancel_rx.clone(), self.repository.fetch_instances()).await?;
        let mut candidatos = filter_good(registro);
        rank(&mut candidatos);
        self.events.instancias_encontradas(candidatos.len());
        tracing::debug!(candidates = candidatos.len(), "ranked registry instances");

        for candidato in candidatos {
            self.comprobar_cancelacion()?;
            let listada = candidato.api_base_url();
            if self.is_skipped(&listada) {
                tracing::debug!(instance = %listada, "skipping previously failed instance");
                continue;
            }

            let probe = self.repository.probe_instance(&listada);
            match con_cancelacion(self.cancel_rx.clone(), probe).await {
                Ok(canonica) if self.is_skipped(&canonica) => {
                    tracing::debug!(
                        instance = %listada,
                        canonical = %canonica,
                        "canonical url already skipped"
                    );
                }
                Ok(canonica) => {
                    tracing::info!(
                        instance = %canonica,
                        score = candidato.score,
                        "selected instance"
                    );
                    self.events.instancia_activa(&canonica);
                    self.active = Some(ActiveInstance {
                        canonical: canonica.clone(),
                        listed: Some(listada),
                    });
                    return Ok(canonica);
                }
                Err(err) => {
                    self.comprobar_cancelacion()?;
                    tracing::warn!(instance = %listada, error = %err, "instance probe failed");
                }
            }
        }

        Err(DomainError::NoAvailableInstance.into())
    }

    /// Resuelve una solicitud rotando de instancia ante errores transitorios.
    /// # Errors
    /// - Errores terminales de la API (`LinkError`, `ContentError`, ...).
    /// - `DomainError::NoAvailableInstance` si ninguna instancia sirve.
    /// - Error del repositorio si la instancia activa no es alcanzable.
    /// - `DomainError::Cancelled` si se pidio cancelar.
    pub async fn resolve(
        &mut self,
        request: &ExtractionRequest,
    ) -> Result<ExtractionResult, R::Error> {
        // Cada vuelta descarta la instancia activa; termina al agotar candidatos.
        loop {
            self.comprobar_cancelacion()?;
            let instancia = self.ensure_instance().await?;

            let extraccion = self.repository.request_extraction(&instancia, request);
            let respuesta = con_cancelacion(self.cancel_rx.clone(), extraccion).await?;

            let error = match respuesta {
                ExtractionResponse::Tunnel {
                    status,
                    url,
                    filename,
                } => {
                    return Ok(ExtractionResult {
                        status,
                        source_url: request.source_url.clone(),
                        tunnel_url: url,
                        filename,
                    });
                }
                ExtractionResponse::Error(error) => error,
            };

            match retry_policy(&error, &request.source_url) {
                RetryDecision::Retry => {
                    tracing::warn!(
                        instance = %instancia,
                        code = %error.code,
                        "retryable api error, trying next instance"
                    );
                    self.skip_active();
                    self.events
                        .reintentando(&request.source_url, &instancia, &error.code);
                }
                RetryDecision::Terminal(err) => {
                    tracing::debug!(
                        instance = %instancia,
                        code = %error.code,
                        "terminal api error"
                    );
                    return Err(err.into());
                }
            }
        }
    }

    async fn ensure_instance(&mut self) -> Result<String, R::Error> {
        match &self.active {
            Some(active) => Ok(active.canonical.clone()),
            None => self.select_instance().await,
        }
    }

    fn comprobar_cancelacion(&self) -> Result<(), R::Error> {
        let cancelado = self
            .cancel_rx
            .as_ref()
            .is_some_and(|cancel_rx| *cancel_rx.borrow());
        if cancelado {
            return Err(DomainError::Cancelled.into());
        }
        Ok(())
    }

    fn skip_active(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        self.skipped.insert(clave(&active.canonical));
        if let Some(listed) = active.listed {
            self.skipped.insert(clave(&listed));
        }
    }
}

fn clave(url: &str) -> String {
    url.trim().trim_end_matches('/').to_lowercase()
}

/// Espera `operacion` salvo que antes se pida cancelar.
/// # Errors
/// - `DomainError::Cancelled` si el canal pasa a `true` antes de terminar.
pub(crate) async fn con_cancelacion<T, E, F>(
    cancel_rx: Option<watch::Receiver<bool>>,
    operacion: F,
) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<DomainError>,
{
    let Some(mut cancel_rx) = cancel_rx else {
        return operacion.await;
    };
    if *cancel_rx.borrow() {
        return Err(DomainError::Cancelled.into());
    }

    tokio::pin!(operacion);
    tokio::select! {
        resultado = &mut operacion => resultado,
        pedido = cancelacion_pedida(&mut cancel_rx) => {
            if pedido {
                Err(DomainError::Cancelled.into())
            } else {
                operacion.await
            }
        }
    }
}

/// `false` si el emisor se cerro sin cancelar.
async fn cancelacion_pedida(cancel_rx: &mut watch::Receiver<bool>) -> bool {
    cancel_rx.wait_for(|cancelado| *cancelado).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::instance::fixtures::instancia;
    use crate::domain::models::{ApiErrorBody, Instance};
    use crate::domain::repositories::{DownloadOutcome, TransferProgress};
    use crate::domain::value_objects::VideoQuality;
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::path::Path;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};
    use thiserror::Error;

    #[derive(Error, Debug)]
    enum FakeError {
        #[error(transparent)]
        Domain(#[from] DomainError),
        #[error("unreachable: {0}")]
        Unreachable(String),
    }

    #[derive(Default)]
    struct FakeRepository {
        instances: Vec<Instance>,
        /// URL listada -> URL canonica; ausente = verificacion fallida.
        verificaciones: HashMap<String, String>,
        /// URL canonica -> respuestas en orden; vacia = tunel exitoso.
        responses: Mutex<HashMap<String, VecDeque<ExtractionResponse>>>,
        unreachable: HashSet<String>,
        requests: Mutex<Vec<(String, ExtractionRequest)>>,
        registry_calls: Mutex<usize>,
        /// Espera antes de responder cada extraccion.
        demora: Option<Duration>,
    }

    impl FakeRepository {
        fn with_instance(mut self, instance: Instance, canonical: Option<&str>) -> Self {
            if let Some(canonical) = canonical {
                self.verificaciones
                    .insert(instance.api_base_url(), canonical.to_string());
            }
            self.instances.push(instance);
            self
        }

        fn responder(self, canonical: &str, response: ExtractionResponse) -> Self {
            self.responses
                .lock()
                .unwrap()
                .entry(canonical.to_string())
                .or_default()
                .push_back(response);
            self
        }

        fn requested_instances(&self) -> Vec<String> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|(url, _)| url.clone())
                .collect()
        }
    }

    #[async_trait]
    impl CobaltRepository for FakeRepository {
        type Error = FakeError;

        async fn fetch_instances(&self) -> Result<Vec<Instance>, FakeError> {
            *self.registry_calls.lock().unwrap() += 1;
            Ok(self.instances.clone())
        }

        async fn probe_instance(&self, api_url: &str) -> Result<String, FakeError> {
            self.verificaciones
                .get(api_url)
                .cloned()
                .ok_or_else(|| FakeError::Unreachable(api_url.to_string()))
        }

        async fn request_extraction(
            &self,
            api_url: &str,
            request: &ExtractionRequest,
        ) -> Result<ExtractionResponse, FakeError> {
            self.requests
                .lock()
                .unwrap()
                .push((api_url.to_string(), request.clone()));
            if let Some(demora) = self.demora {
                tokio::time::sleep(demora).await;
            }
            if self.unreachable.contains(api_url) {
                return Err(FakeError::Unreachable(api_url.to_string()));
            }
            let siguiente = self
                .responses
                .lock()
                .unwrap()
                .get_mut(api_url)
                .and_then(VecDeque::pop_front);
            Ok(siguiente.unwrap_or_else(|| tunel("clip.mp4")))
        }

        async fn download_tunnel(
            &self,
            _file: &ExtractionResult,
            destination: &Path,
            _progress: &dyn TransferProgress,
        ) -> Result<DownloadOutcome, FakeError> {
            Ok(DownloadOutcome::Completed {
                path: destination.to_path_buf(),
                bytes: 0,
            })
        }
    }

    fn tunel(filename: &str) -> ExtractionResponse {
        ExtractionResponse::Tunnel {
            status: "tunnel".to_string(),
            url: "https://tunnel.example/t?id=1".to_string(),
            filename: filename.to_string(),
        }
    }

    fn error(code: &str) -> ExtractionResponse {
        ExtractionResponse::Error(ApiErrorBody {
            code: code.to_string(),
            context: None,
        })
    }

    fn solicitud() -> ExtractionRequest {
        let mut request =
            ExtractionRequest::new(MediaUrl::new(r#"https://youtu.be/"abc"\"#).unwrap());
        request.quality = VideoQuality::normalize("4k");
        request
    }

    #[tokio::test]
    async fn selecciona_la_de_mayor_puntaje() {
        let repo = FakeRepository::default()
            .with_instance(
                instancia("low.example", "10.0.0", 1.0, 10.0),
                Some("https://low.example/"),
            )
            .with_instance(
                instancia("high.example", "10.2.0", 1.0, 90.0),
                Some("https://high.example/"),
            );
        let mut session = CobaltSession::new(repo, InstanceTarget::Auto);

        let elegida = session.select_instance().await.unwrap();
        assert_eq!(elegida, "https://high.example/");
        assert_eq!(session.active_instance(), Some("https://high.example/"));
    }

    #[tokio::test]
    async fn verificacion_fallida_pasa_a_la_siguiente() {
        let repo = FakeRepository::default()
            .with_instance(instancia("dead.example", "10.0.0", 1.0, 99.0), None)
            .with_instance(
                instancia("alive.example", "10.0.0", 1.0, 1.0),
                Some("https://alive.example/"),
            );
        let mut session = CobaltSession::new(repo, InstanceTarget::Auto);

        assert_eq!(session.select_instance().await.unwrap(), "https://alive.example/");
    }

    #[tokio::test]
    async fn error_youtube_rota_sin_llegar_al_llamador() {
        let repo = FakeRepository::default()
            .with_instance(instancia("a.example", "10.0.0", 1.0, 90.0), Some("https://a.example/"))
            .with_instance(instancia("b.example", "10.0.0", 1.0, 50.0), Some("https://b.example/"))
            .responder("https://a.example/", error("error.api.youtube.some_detail"));
        let mut session = CobaltSession::new(repo, InstanceTarget::Auto);

        let result = session.resolve(&solicitud()).await.unwrap();
        assert_eq!(result.filename, "clip.mp4");
        assert!(session.is_skipped("https://a.example/"));
        assert!(!session.is_skipped("https://b.example/"));
        assert_eq!(session.active_instance(), Some("https://b.example/"));

        let repo = session.repository();
        assert_eq!(
            repo.requested_instances(),
            vec!["https://a.example/", "https://b.example/"]
        );
        let requests = repo.requests.lock().unwrap();
        assert_eq!(requests[0].1, requests[1].1);
    }

    #[tokio::test]
    async fn error_de_link_es_terminal_sin_rotar() {
        let repo = FakeRepository::default()
            .with_instance(instancia("a.example", "10.0.0", 1.0, 90.0), Some("https://a.example/"))
            .with_instance(instancia("b.example", "10.0.0", 1.0, 50.0), Some("https://b.example/"))
            .responder("https://a.example/", error("error.api.link.invalid"));
        let mut session = CobaltSession::new(repo, InstanceTarget::Auto);

        let err = session.resolve(&solicitud()).await.unwrap_err();
        match err {
            FakeError::Domain(DomainError::LinkError { code, .. }) => {
                assert_eq!(code, "error.api.link.invalid");
            }
            other => panic!("Se esperaba LinkError, llego {:?}", other),
        }
        assert_eq!(session.skipped_count(), 0);
        assert_eq!(session.repository().requested_instances().len(), 1);
        assert_eq!(session.active_instance(), Some("https://a.example/"));
    }

    #[tokio::test]
    async fn unica_instancia_con_fetch_fallido_agota_candidatos() {
        let repo = FakeRepository::default()
            .with_instance(
                instancia("only.example", "10.0.0", 1.0, 90.0),
                Some("https://only.example/"),
            )
            .responder("https://only.example/", error("error.api.fetch.failed"));
        let mut session = CobaltSession::new(repo, InstanceTarget::Auto);

        let err = session.resolve(&solicitud()).await.unwrap_err();
        assert!(matches!(err, FakeError::Domain(DomainError::NoAvailableInstance)));
        assert!(session.is_skipped("https://only.example/"));
        assert_eq!(session.active_instance(), None);
    }

    #[tokio::test]
    async fn descartada_no_vuelve_aunque_encabece_el_ranking() {
        let repo = FakeRepository::default()
            .with_instance(
                instancia("top.example", "10.0.0", 1.0, 100.0),
                Some("https://top.example/"),
            )
            .with_instance(
                instancia("next.example", "10.0.0", 1.0, 1.0),
                Some("https://next.example/"),
            )
            .responder("https://top.example/", error("error.api.fetch.critical"));
        let mut session = CobaltSession::new(repo, InstanceTarget::Auto);

        session.resolve(&solicitud()).await.unwrap();
        for _ in 0..3 {
            assert_eq!(session.select_instance().await.unwrap(), "https://next.example/");
        }
        assert_eq!(*session.repository().registry_calls.lock().unwrap(), 5);
    }

    #[tokio::test]
    async fn canonica_descartada_bajo_otro_nombre_se_ignora() {
        let repo = FakeRepository::default()
            .with_instance(
                instancia("alias.example", "10.0.0", 1.0, 100.0),
                Some("https://real.example/"),
            )
            .with_instance(
                instancia("real.example", "10.0.0", 1.0, 50.0),
                Some("https://real.example/"),
            )
            .with_instance(
                instancia("other.example", "10.0.0", 1.0, 10.0),
                Some("https://other.example/"),
            )
            .responder("https://real.example/", error("error.api.youtube.login"));
        let mut session = CobaltSession::new(repo, InstanceTarget::Auto);

        let result = session.resolve(&solicitud()).await.unwrap();
        assert_eq!(result.filename, "clip.mp4");
        assert_eq!(session.active_instance(), Some("https://other.example/"));
        assert_eq!(
            session.repository().requested_instances(),
            vec!["https://real.example/", "https://other.example/"]
        );
    }

    #[tokio::test]
    async fn auth_missing_rota_y_auth_invalida_falla() {
        let repo = FakeRepository::default()
            .with_instance(instancia("a.example", "10.0.0", 1.0, 90.0), Some("https://a.example/"))
            .with_instance(instancia("b.example", "10.0.0", 1.0, 50.0), Some("https://b.example/"))
            .responder("https://a.example/", error("error.api.auth.jwt.missing"))
            .responder("https://b.example/", error("error.api.auth.key.invalid"));
        let mut session = CobaltSession::new(repo, InstanceTarget::Auto);

        let err = session.resolve(&solicitud()).await.unwrap_err();
        assert!(matches!(err, FakeError::Domain(DomainError::AuthError { .. })));
        assert!(session.is_skipped("https://a.example"));
        assert!(!session.is_skipped("https://b.example"));
    }

    #[tokio::test]
    async fn instancia_fija_se_usa_sin_registro_y_luego_rota() {
        let repo = FakeRepository::default()
            .with_instance(
                instancia("pub.example", "10.0.0", 1.0, 90.0),
                Some("https://pub.example/"),
            )
            .responder("https://mine.example", error("error.api.fetch.empty"));
        let target = InstanceTarget::parse(Some("mine.example")).unwrap();
        let mut session = CobaltSession::new(repo, target);
        assert_eq!(session.active_instance(), Some("https://mine.example"));

        let result = session.resolve(&solicitud()).await.unwrap();
        assert_eq!(result.status, "tunnel");
        assert!(session.is_skipped("https://mine.example"));
        assert_eq!(
            session.repository().requested_instances(),
            vec!["https://mine.example", "https://pub.example/"]
        );
    }

    #[tokio::test]
    async fn instancia_inalcanzable_falla_sin_reintentar() {
        let mut repo = FakeRepository::default()
            .with_instance(instancia("a.example", "10.0.0", 1.0, 90.0), Some("https://a.example/"))
            .with_instance(instancia("b.example", "10.0.0", 1.0, 50.0), Some("https://b.example/"));
        repo.unreachable.insert("https://a.example/".to_string());
        let mut session = CobaltSession::new(repo, InstanceTarget::Auto);

        let err = session.resolve(&solicitud()).await.unwrap_err();
        assert!(matches!(err, FakeError::Unreachable(_)));
        assert_eq!(session.repository().requested_instances().len(), 1);
    }

    #[tokio::test]
    async fn url_saneada_igual_en_solicitud_y_resultado() {
        let repo = FakeRepository::default()
            .with_instance(instancia("a.example", "10.0.0", 1.0, 90.0), Some("https://a.example/"));
        let mut session = CobaltSession::new(repo, InstanceTarget::Auto);
        let request = solicitud();

        let result = session.resolve(&request).await.unwrap();
        let enviada = session.repository().requests.lock().unwrap()[0].1.clone();
        assert_eq!(result.source_url.as_str(), "https://youtu.be/abc");
        assert_eq!(enviada.body().url, result.source_url.as_str());
        assert_eq!(enviada.body().video_quality, "2160");
    }

    #[tokio::test]
    async fn registro_vacio_da_sin_instancias() {
        let mut session = CobaltSession::new(FakeRepository::default(), InstanceTarget::Auto);
        let err = session.select_instance().await.unwrap_err();
        assert!(matches!(err, FakeError::Domain(DomainError::NoAvailableInstance)));
    }

    #[tokio::test]
    async fn cancelada_antes_no_consulta_nada() {
        let repo = FakeRepository::default()
            .with_instance(instancia("a.example", "10.0.0", 1.0, 90.0), Some("https://a.example/"));
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let mut session =
            CobaltSession::new(repo, InstanceTarget::Auto).with_cancel_receiver(cancel_rx);
        cancel_tx.send(true).unwrap();

        let err = session.resolve(&solicitud()).await.unwrap_err();
        assert!(matches!(err, FakeError::Domain(DomainError::Cancelled)));
        assert_eq!(*session.repository().registry_calls.lock().unwrap(), 0);
        assert!(session.repository().requested_instances().is_empty());
    }

    #[tokio::test]
    async fn cancelar_corta_la_extraccion_en_curso() {
        let repo = FakeRepository {
            demora: Some(Duration::from_secs(10)),
            ..FakeRepository::default()
        };
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let target = InstanceTarget::parse(Some("mine.example")).unwrap();
        let mut session = CobaltSession::new(repo, target).with_cancel_receiver(cancel_rx);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let _ = cancel_tx.send(true);
        });

        let inicio = Instant::now();
        let err = session.resolve(&solicitud()).await.unwrap_err();
        assert!(matches!(err, FakeError::Domain(DomainError::Cancelled)));
        assert!(inicio.elapsed() < Duration::from_secs(5));
        assert!(!session.is_skipped("https://mine.example"));
    }

    #[tokio::test]
    async fn emisor_cerrado_no_cancela() {
        let repo = FakeRepository::default()
            .with_instance(instancia("a.example", "10.0.0", 1.0, 90.0), Some("https://a.example/"));
        let (cancel_tx, cancel_rx) = watch::channel(false);
        drop(cancel_tx);
        let mut session =
            CobaltSession::new(repo, InstanceTarget::Auto).with_cancel_receiver(cancel_rx);

        let result = session.resolve(&solicitud()).await.unwrap();
        assert_eq!(result.filename, "clip.mp4");
    }
}
