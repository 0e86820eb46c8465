use image::{DynamicImage, ImageOutputFormat};
use log::{debug, error};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Cursor;

use crate::core::inference::{InferenceClient, InferenceError};

const JPEG_QUALITY: u8 = 85;

static NOT_DISQUALIFIED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bfalse\b").expect("verdict pattern is valid"));

/// 场景检测结论
#[derive(Debug, Clone, PartialEq)]
pub struct SceneVerdict {
    pub disqualified: bool,
    /// 模型原始回复；调用失败时为错误描述
    pub raw_text: String,
}

/// 解析模型回复：只有明确出现 `False`（不区分大小写、整词）才视为未命中，
/// 其余一律视为存在不合格内容。
pub fn is_disqualifying_reply(reply: &str) -> bool {
    !NOT_DISQUALIFIED.is_match(reply)
}

/// 调用推理后端判断原始帧是否包含不合格内容
///
/// 编码或推理失败时按不合格处理，错误信息作为 `raw_text` 返回。
pub fn classify_scene(image: &DynamicImage, prompt: &str, client: &dyn InferenceClient) -> SceneVerdict {
    match encode_jpeg(image).and_then(|bytes| client.infer(&bytes, prompt)) {
        Ok(reply) => {
            debug!("🧠 scene reply: {}", reply);
            SceneVerdict {
                disqualified: is_disqualifying_reply(&reply),
                raw_text: reply,
            }
        }
        Err(e) => {
            error!("❌ Scene classification failed: {}", e);
            SceneVerdict {
                disqualified: true,
                raw_text: format!("Error: {}", e),
            }
        }
    }
}

fn encode_jpeg(image: &DynamicImage) -> Result<Vec<u8>, InferenceError> {
    // JPEG 不支持 alpha 通道
    let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
    let mut buffer = Cursor::new(Vec::new());
    rgb.write_to(&mut buffer, ImageOutputFormat::Jpeg(JPEG_QUALITY))?;
    Ok(buffer.into_inner())
}
