use clap::{Args, Parser, Subcommand};

/// Parametros de linea de comandos.
#[derive(Parser)]
#[command(name = "cobaltdl")]
#[command(author, version, about = "Descargador de medios via instancias de Cobalt")]
pub struct Cli {
    /// URLs a descargar (modo principal).
    #[arg(value_name = "URL", num_args = 0.., index = 1)]
    pub urls: Vec<String>,

    #[command(flatten)]
    pub media: MediaArgs,

    /// Directorio de salida.
    #[arg(short, long)]
    pub output: Option<String>,

    /// Nombre del archivo (solo con una URL que no sea playlist).
    #[arg(short, long)]
    pub filename: Option<String>,

    /// Tratar las URLs como playlists.
    #[arg(short, long)]
    pub playlist: bool,

    /// Abrir cada archivo con la aplicacion predeterminada al terminar.
    #[arg(long)]
    pub play: bool,

    /// Mostrar cada archivo en el explorador al terminar.
    #[arg(long)]
    pub show: bool,

    /// Instancia de la API (URL, o `fetch` para elegir una automaticamente).
    #[arg(short, long, global = true)]
    pub instance: Option<String>,

    /// Clave de la API.
    #[arg(short = 'k', long, global = true)]
    pub api_key: Option<String>,

    /// Registro detallado en stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Opciones de la solicitud de extraccion.
#[derive(Args, Debug, Clone, Default)]
pub struct MediaArgs {
    /// Calidad (max, 3840..144, 8k, 4k, 2k, 1080p..144p).
    #[arg(short, long)]
    pub quality: Option<String>,

    /// Modo de descarga (auto, audio, mute).
    #[arg(short, long)]
    pub mode: Option<String>,

    /// Estilo del nombre de archivo (classic, pretty, basic, nerdy).
    #[arg(short = 's', long)]
    pub filename_style: Option<String>,

    /// Formato de audio (best, mp3, ogg, wav, opus).
    #[arg(short, long)]
    pub audio_format: Option<String>,

    /// Codec de video para YouTube (h264, vp9, av1).
    #[arg(short, long)]
    pub codec: Option<String>,
}

/// Subcomandos disponibles.
#[derive(Subcommand)]
pub enum Commands {
    /// Resuelve una URL y muestra el tunel sin descargar.
    Get {
        url: String,
        #[command(flatten)]
        media: MediaArgs,
    },

    /// Busca una instancia sana y la muestra.
    Instance,
}
