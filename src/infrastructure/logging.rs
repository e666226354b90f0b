use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Inicializa el registro de diagnostico en stderr.
/// # Notas
/// - `RUST_LOG` tiene prioridad; si no, `debug` con `verbose` y `warn` sin el.
pub fn init_logging(verbose: bool) -> anyhow::Result<()> {
    let nivel = if verbose { "cobaltdl=debug" } else { "warn" };
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(nivel))?;

    let capa = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(capa)
        .try_init()?;

    Ok(())
}
