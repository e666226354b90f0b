pub mod config;
pub mod errors;
pub mod external;
pub mod logging;
pub mod opener;

pub use config::AppConfig;
pub use errors::InfrastructureError;
pub use external::{CobaltClient, YoutubePlaylistClient};
pub use opener::{open_downloaded, OpenAction};
