use ffmpeg_sidecar::child::FfmpegChild;
use ffmpeg_sidecar::command::FfmpegCommand;
use ffmpeg_sidecar::event::{FfmpegEvent, LogLevel};
use ffmpeg_sidecar::iter::FfmpegIterator;
use image::RgbImage;
use log::{debug, trace, warn};
use std::path::Path;

use super::source::FrameSource;
use crate::core::pipeline::error::PipelineError;
use crate::core::pipeline::frame::{Frame, Stream};

/// 通过 ffmpeg 子进程把视频解码为 RGB24 帧
pub struct FfmpegSource {
    name: String,
    child: FfmpegChild,
    events: Option<FfmpegIterator>,
    pending: Option<Frame>,
}

impl FfmpegSource {
    /// 打开失败或首帧之前就报错时返回 `SourceOpen`；
    /// 能打开但没有任何帧的视频视为空来源。
    pub fn open(stream: Stream, path: &Path) -> Result<Self, PipelineError> {
        let open_error = |reason: String| PipelineError::SourceOpen {
            stream,
            path: path.to_path_buf(),
            reason,
        };

        if !path.is_file() {
            return Err(open_error("file does not exist".to_string()));
        }

        let mut child = FfmpegCommand::new()
            .hide_banner()
            .input(path.to_string_lossy().as_ref())
            .rawvideo()
            .spawn()
            .map_err(|e| open_error(e.to_string()))?;

        let events = match child.iter() {
            Ok(events) => events,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(open_error(e.to_string()));
            }
        };

        let mut source = Self {
            name: format!("{} ({})", stream, path.display()),
            child,
            events: Some(events),
            pending: None,
        };

        match source.decode_next() {
            Ok(first) => {
                if first.is_none() {
                    // 无法识别的输入不一定产生 error 级日志，以退出码为准
                    if let Ok(status) = source.child.wait() {
                        if !status.success() {
                            return Err(open_error(format!("ffmpeg exited with {}", status)));
                        }
                    }
                    warn!("⚠️ {} contains no decodable frames", source.name);
                }
                source.pending = first;
                debug!("🎬 Opened {}", source.name);
                Ok(source)
            }
            Err(reason) => Err(open_error(reason)),
        }
    }

    /// Ok(None) 表示正常结束，Err 表示流在下一帧之前因错误终止
    fn decode_next(&mut self) -> Result<Option<Frame>, String> {
        let Some(events) = self.events.as_mut() else {
            return Ok(None);
        };

        let mut last_error: Option<String> = None;
        for event in events {
            match event {
                FfmpegEvent::OutputFrame(frame) => {
                    let frame_number = frame.frame_num as u64;
                    match RgbImage::from_raw(frame.width, frame.height, frame.data) {
                        Some(image) => return Ok(Some(Frame::from_rgb(image, frame_number))),
                        None => {
                            warn!("⚠️ {}: frame {} has an unexpected buffer size", self.name, frame_number);
                        }
                    }
                }
                FfmpegEvent::Error(message)
                | FfmpegEvent::Log(LogLevel::Error, message)
                | FfmpegEvent::Log(LogLevel::Fatal, message) => {
                    trace!("{}: ffmpeg error: {}", self.name, message);
                    last_error = Some(message);
                }
                FfmpegEvent::Done => break,
                _ => {}
            }
        }

        self.events = None;
        match last_error {
            Some(reason) => Err(reason),
            None => Ok(None),
        }
    }
}

impl FrameSource for FfmpegSource {
    fn next_frame(&mut self) -> Option<Frame> {
        if let Some(frame) = self.pending.take() {
            return Some(frame);
        }
        match self.decode_next() {
            Ok(frame) => frame,
            Err(reason) => {
                warn!("⚠️ {} stopped: {}", self.name, reason);
                None
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        self.events = None;
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
