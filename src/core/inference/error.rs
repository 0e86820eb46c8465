use thiserror::Error;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("HTTP 请求失败: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Inference endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Malformed inference response: {0}")]
    MalformedResponse(String),
    #[error("Failed to encode image: {0}")]
    Encode(#[from] image::ImageError),
    #[error("Inference backend unavailable: {0}")]
    Unavailable(String),
}
