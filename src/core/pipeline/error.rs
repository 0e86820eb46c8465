use std::path::PathBuf;
use thiserror::Error;

use super::frame::Stream;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("无法打开 {stream} 视频源 {path:?}: {reason}")]
    SourceOpen {
        stream: Stream,
        path: PathBuf,
        reason: String,
    },
    #[error("Invalid pipeline config: {0}")]
    InvalidConfig(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
}
