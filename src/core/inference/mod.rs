//! 多模态推理能力：提交图像 + 提示词，返回文本结论

pub mod error;
pub mod ollama;

pub use error::InferenceError;
pub use ollama::{OllamaClient, OllamaConfig};

use std::sync::atomic::{AtomicUsize, Ordering};

pub trait InferenceClient: Send + Sync {
    /// `image` 为已压缩的图像字节（JPEG）
    fn infer(&self, image: &[u8], prompt: &str) -> Result<String, InferenceError>;
}

type ReplyFn = Box<dyn Fn(usize, &[u8], &str) -> Result<String, InferenceError> + Send + Sync>;

/// 脚本化的推理客户端，用于测试和离线运行
pub struct MockInferenceClient {
    reply: ReplyFn,
    calls: AtomicUsize,
}

impl MockInferenceClient {
    /// 每次都返回同一段文本
    pub fn with_reply(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::with_pattern(move |_, _, _| Ok(text.clone()))
    }

    /// 每次调用都失败
    pub fn failing(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::with_pattern(move |_, _, _| Err(InferenceError::Unavailable(message.clone())))
    }

    /// 按调用序号（从 0 开始）、图像字节和提示词决定回复
    pub fn with_pattern<F>(reply: F) -> Self
    where
        F: Fn(usize, &[u8], &str) -> Result<String, InferenceError> + Send + Sync + 'static,
    {
        Self {
            reply: Box::new(reply),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// 场景阶段关闭时使用的占位后端，任何调用都返回 `Unavailable`
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledInference;

impl InferenceClient for DisabledInference {
    fn infer(&self, _image: &[u8], _prompt: &str) -> Result<String, InferenceError> {
        Err(InferenceError::Unavailable("scene classification is disabled".to_string()))
    }
}

impl Default for MockInferenceClient {
    fn default() -> Self {
        Self::with_reply("False")
    }
}

impl InferenceClient for MockInferenceClient {
    fn infer(&self, image: &[u8], prompt: &str) -> Result<String, InferenceError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        (self.reply)(call, image, prompt)
    }
}
