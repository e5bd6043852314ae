pub mod media_encoder;
pub mod media_platform;
pub mod media_track;
pub mod recorder_delegate;
