use crate::application::ResolveEvents;
use crate::domain::models::ExtractionResult;
use crate::domain::value_objects::MediaUrl;
use std::path::Path;

const URL_CORTA: usize = 40;

pub struct ConsoleOutput;

impl ConsoleOutput {
    pub fn new() -> Self {
        Self
    }

    pub fn mostrar_error_sin_url(&self) {
        println!("Error: Debes especificar una URL o comando");
        println!("Uso: cobaltdl <url> [<url> ...]");
        println!("     cobaltdl get <url>");
        println!("     cobaltdl instance");
    }

    pub fn advertir_sin_instancia(&self) {
        println!(
            "[WARN] No hay instancia configurada; se buscara una publica \
             (COBALT_API_URL o --instance)"
        );
    }

    pub fn advertir_nombre_ignorado(&self) {
        println!("[WARN] --filename solo aplica a una unica URL; se usara el nombre sugerido");
    }

    pub fn mostrar_playlist(&self, url: &MediaUrl, items: usize) {
        println!("Playlist {} ({} elementos)", url.abreviada(URL_CORTA), items);
    }

    pub fn mostrar_item_playlist(&self, indice: usize, total: usize, url: &MediaUrl) {
        println!("[{}/{}] {}", indice, total, url);
    }

    pub fn mostrar_resultado(&self, file: &ExtractionResult) {
        println!("Estado: {}", file.status);
        println!("Archivo: {}", file.filename);
        println!("Tunel: {}", file.tunnel_url);
    }

    pub fn mostrar_instancia(&self, url: &str) {
        println!("[OK] Instancia: {}", url);
    }

    pub fn mostrar_archivo_guardado(&self, ruta: &Path, bytes: u64) {
        println!(
            "[OK] Guardado: {} ({:.2} MB)",
            ruta.display(),
            bytes as f64 / 1_048_576.0
        );
    }

    pub fn mostrar_cancelacion(&self, url: &MediaUrl) {
        println!("\n[WARN] Descarga cancelada: {}", url.abreviada(URL_CORTA));
    }

    pub fn mostrar_operacion_cancelada(&self) {
        println!("\n[WARN] Operacion cancelada");
    }

    pub fn advertir_apertura_fallida(&self, ruta: &Path, error: &str) {
        println!("[WARN] No se pudo abrir {}: {}", ruta.display(), error);
    }

    pub fn error_fallo_descarga(&self, url: &str, error: &str) {
        println!("[ERROR] Fallo la descarga de {}: {}", url, error);
    }
}

impl Default for ConsoleOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolveEvents for ConsoleOutput {
    fn buscando_instancia(&self) {
        println!("Buscando instancia...");
    }

    fn instancias_encontradas(&self, cantidad: usize) {
        println!("Se encontraron {} instancias utilizables", cantidad);
    }

    fn reintentando(&self, source: &MediaUrl, instancia: &str, code: &str) {
        println!(
            "[WARN] {} fallo en {} ({}), probando la siguiente instancia...",
            source.abreviada(URL_CORTA),
            instancia,
            code
        );
    }
}
