pub mod instance_target;
pub mod media_options;
pub mod media_url;
pub mod quality;

pub use instance_target::InstanceTarget;
pub use media_options::{AudioFormat, DownloadMode, FilenameStyle, VideoCodec};
pub use media_url::MediaUrl;
pub use quality::VideoQuality;
