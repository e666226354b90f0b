use std::time::{Duration, Instant};

const VENTANA: Duration = Duration::from_secs(1);
const BYTES_PER_KIB: f64 = 1024.0;
const BYTES_PER_MIB: f64 = 1_048_576.0;

/// Estimacion de velocidad por ventanas de al menos un segundo.
#[derive(Debug, Clone)]
pub struct RateMeter {
    inicio: Instant,
    ventana_inicio: Instant,
    bytes_ventana: u64,
    total: u64,
    ultima_tasa: Option<f64>,
}

impl RateMeter {
    pub fn new(ahora: Instant) -> Self {
        Self {
            inicio: ahora,
            ventana_inicio: ahora,
            bytes_ventana: 0,
            total: 0,
            ultima_tasa: None,
        }
    }

    /// Registra bytes recibidos; devuelve la tasa si cerro una ventana.
    pub fn record(&mut self, bytes: u64, ahora: Instant) -> Option<f64> {
        self.total += bytes;
        self.bytes_ventana += bytes;

        let transcurrido = ahora.saturating_duration_since(self.ventana_inicio);
        if transcurrido < VENTANA {
            return None;
        }

        let tasa = self.bytes_ventana as f64 / transcurrido.as_secs_f64();
        self.ultima_tasa = Some(tasa);
        self.bytes_ventana = 0;
        self.ventana_inicio = ahora;
        Some(tasa)
    }

    /// Ultima tasa calculada, en bytes por segundo.
    pub fn rate(&self) -> Option<f64> {
        self.ultima_tasa
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn elapsed(&self, ahora: Instant) -> Duration {
        ahora.saturating_duration_since(self.inicio)
    }
}

/// Formatea bytes/s como `MB/s` a partir de ~0.92 MiB/s, si no `KB/s`.
pub fn format_rate(bytes_por_segundo: f64) -> String {
    if bytes_por_segundo >= 0.92 * BYTES_PER_MIB {
        format!("{:.2} MB/s", bytes_por_segundo / BYTES_PER_MIB)
    } else {
        format!("{:.2} KB/s", bytes_por_segundo / BYTES_PER_KIB)
    }
}
