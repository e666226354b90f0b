pub mod cobalt_client;
pub mod playlist_client;

pub use cobalt_client::CobaltClient;
pub use playlist_client::YoutubePlaylistClient;
