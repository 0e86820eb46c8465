//! 视频帧来源

pub mod ffmpeg;
pub mod source;

pub use ffmpeg::FfmpegSource;
pub use source::{FrameSource, MemorySource};
