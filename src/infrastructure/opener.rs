use crate::infrastructure::InfrastructureError;
use std::ffi::OsString;
use std::path::Path;
use tokio::process::Command;

/// Que hacer con un archivo recien descargado.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAction {
    /// Abrir con la aplicacion predeterminada.
    Play,
    /// Mostrarlo en el explorador de archivos.
    Reveal,
}

/// Lanza el abridor de la plataforma sobre `path`.
/// # Errors
/// - `InfrastructureError::OpenFailed` si el programa no existe o termina con error.
pub async fn open_downloaded(path: &Path, action: OpenAction) -> Result<(), InfrastructureError> {
    let (programa, argumentos) = comando_apertura(path, action);
    tracing::debug!(program = programa, path = %path.display(), ?action, "opening download");

    let status = Command::new(programa)
        .args(&argumentos)
        .status()
        .await
        .map_err(|e| {
            InfrastructureError::OpenFailed(format!("{} ({}: {})", path.display(), programa, e))
        })?;

    // `explorer` devuelve 1 incluso cuando abre la ventana.
    if !status.success() && !cfg!(target_os = "windows") {
        return Err(InfrastructureError::OpenFailed(format!(
            "{} ({} exited with {})",
            path.display(),
            programa,
            status
        )));
    }

    Ok(())
}

#[cfg(target_os = "windows")]
fn comando_apertura(path: &Path, action: OpenAction) -> (&'static str, Vec<OsString>) {
    match action {
        OpenAction::Play => (
            "cmd",
            vec!["/C".into(), "start".into(), "".into(), path.into()],
        ),
        OpenAction::Reveal => {
            let mut seleccion = OsString::from("/select,");
            seleccion.push(path);
            ("explorer", vec![seleccion])
        }
    }
}

#[cfg(target_os = "macos")]
fn comando_apertura(path: &Path, action: OpenAction) -> (&'static str, Vec<OsString>) {
    match action {
        OpenAction::Play => ("open", vec![path.into()]),
        OpenAction::Reveal => ("open", vec!["-R".into(), path.into()]),
    }
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn comando_apertura(path: &Path, action: OpenAction) -> (&'static str, Vec<OsString>) {
    match action {
        OpenAction::Play => ("xdg-open", vec![path.into()]),
        OpenAction::Reveal => ("xdg-open", vec![directorio_contenedor(path).into()]),
    }
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn directorio_contenedor(path: &Path) -> &Path {
    match path.parent() {
        Some(padre) if !padre.as_os_str().is_empty() => padre,
        _ => Path::new("."),
    }
}
