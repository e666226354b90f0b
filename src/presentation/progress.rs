use crate::domain::models::format_rate;
use crate::domain::repositories::TransferProgress;
use indicatif::{ProgressBar, ProgressStyle};
use once_cell::sync::Lazy;
use std::sync::Mutex;
use std::time::Duration;

const BAR_STYLE: &str = concat!(
    "{spinner:.blue} {prefix:.bold} [{elapsed_precise}] ",
    "{wide_bar:.cyan/blue} {bytes}/{total_bytes} {msg}"
);
const SPINNER_STYLE: &str = "{spinner:.blue} {prefix:.bold} [{elapsed_precise}] {bytes} {msg}";
const TICK: &str = "⢎⡰⢎⡡⢎⡑⢎⠱⠎⡱⢊⡱⢌⡱⢆⡱";
const BAR_CHARS: &str = "█▓▒░  ";

static BAR_TEMPLATE: Lazy<Option<ProgressStyle>> = Lazy::new(|| {
    ProgressStyle::with_template(BAR_STYLE)
        .ok()
        .map(|style| style.tick_chars(TICK).progress_chars(BAR_CHARS))
});

static SPINNER_TEMPLATE: Lazy<Option<ProgressStyle>> = Lazy::new(|| {
    ProgressStyle::with_template(SPINNER_STYLE)
        .ok()
        .map(|style| style.tick_chars(TICK))
});

/// Barra de progreso de consola para una descarga.
pub struct ConsoleProgress {
    pb: Mutex<Option<ProgressBar>>,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self { pb: Mutex::new(None) }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.pb.lock() {
            if let Some(pb) = guard.as_ref() {
                f(pb);
            }
        }
    }

    fn take_bar(&self) -> Option<ProgressBar> {
        self.pb.lock().ok().and_then(|mut guard| guard.take())
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferProgress for ConsoleProgress {
    fn start(&self, filename: &str, total: Option<u64>) {
        let (pb, style) = match total {
            Some(len) => (ProgressBar::new(len), BAR_TEMPLATE.as_ref()),
            None => (ProgressBar::new_spinner(), SPINNER_TEMPLATE.as_ref()),
        };
        let pb = match style {
            Some(style) => pb.with_style(style.clone()),
            None => pb,
        };
        pb.set_prefix(filename.to_string());
        pb.enable_steady_tick(Duration::from_millis(200));

        if let Ok(mut guard) = self.pb.lock() {
            *guard = Some(pb);
        }
    }

    fn advance(&self, bytes: u64, rate: Option<f64>) {
        self.with_bar(|pb| {
            pb.inc(bytes);
            if let Some(rate) = rate {
                pb.set_message(format_rate(rate));
            }
        });
    }

    fn finish(&self, bytes: u64, elapsed: Duration) {
        if let Some(pb) = self.take_bar() {
            pb.finish_with_message(format!(
                "{:.2} MB en {:.2}s ✓",
                bytes as f64 / 1_048_576.0,
                elapsed.as_secs_f64()
            ));
        }
    }

    fn abort(&self) {
        if let Some(pb) = self.take_bar() {
            pb.abandon();
        }
    }
}
