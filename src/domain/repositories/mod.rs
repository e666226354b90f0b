pub mod cobalt_repository;

pub use cobalt_repository::{
    CobaltRepository, DownloadOutcome, NoProgress, PlaylistRepository, TransferProgress,
};
