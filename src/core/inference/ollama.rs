//! Ollama 兼容的 `/api/chat` 客户端

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use log::{debug, info};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{InferenceClient, InferenceError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub endpoint: String,
    pub model: String,
    /// 单次请求超时，超时按分类失败处理
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "llava:34b".to_string(),
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
    images: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ReplyMessage>,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: String,
}

pub struct OllamaClient {
    client: Client,
    config: OllamaConfig,
}

impl OllamaClient {
    pub fn new(config: OllamaConfig) -> Result<Self, InferenceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        info!(
            "🧠 OllamaClient: model {} at {} (timeout {}s)",
            config.model, config.endpoint, config.timeout_secs
        );
        Ok(Self { client, config })
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.config.endpoint.trim_end_matches('/'))
    }

    fn build_request<'a>(&'a self, image: &[u8], prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
                images: vec![STANDARD.encode(image)],
            }],
            stream: false,
        }
    }
}

impl InferenceClient for OllamaClient {
    fn infer(&self, image: &[u8], prompt: &str) -> Result<String, InferenceError> {
        let request = self.build_request(image, prompt);
        debug!("📤 POST {} ({} image bytes)", self.chat_url(), image.len());

        let resp = self.client.post(self.chat_url()).json(&request).send()?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(InferenceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.text()?;
        parse_chat_response(&body)
    }
}

fn parse_chat_response(body: &str) -> Result<String, InferenceError> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| InferenceError::MalformedResponse(e.to_string()))?;
    parsed
        .message
        .map(|m| m.content)
        .ok_or_else(|| InferenceError::MalformedResponse("missing message.content".to_string()))
}
