use image::{DynamicImage, GrayImage, RgbImage};
use std::borrow::Cow;
use std::fmt;

/// 视频流类型：原始相机 / RealSense 深度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    Raw,
    Realsense,
}

impl Stream {
    /// 输出目录名，同时也是帧文件名前缀
    pub fn dir_name(self) -> &'static str {
        match self {
            Stream::Raw => "raw",
            Stream::Realsense => "realsense",
        }
    }

    /// `{stream}_frame_{index:05}.png`
    pub fn frame_file_name(self, index: u64) -> String {
        format!("{}_frame_{:05}.png", self.dir_name(), index)
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// 帧数据结构
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: DynamicImage,
    pub frame_number: u64,
}

impl Frame {
    pub fn new(image: DynamicImage, frame_number: u64) -> Self {
        Self {
            image,
            frame_number,
        }
    }

    pub fn from_rgb(image: RgbImage, frame_number: u64) -> Self {
        Self::new(DynamicImage::ImageRgb8(image), frame_number)
    }
}

/// 同一位置索引上的原始帧 + RealSense 帧
#[derive(Debug, Clone)]
pub struct FramePair {
    pub index: u64,
    pub raw: DynamicImage,
    pub realsense: DynamicImage,
}

impl FramePair {
    pub fn new(index: u64, raw: DynamicImage, realsense: DynamicImage) -> Self {
        Self {
            index,
            raw,
            realsense,
        }
    }

    pub fn raw_name(&self) -> String {
        Stream::Raw.frame_file_name(self.index)
    }

    pub fn realsense_name(&self) -> String {
        Stream::Realsense.frame_file_name(self.index)
    }
}

/// 灰度视图：已经是单通道时直接借用，否则转换
pub fn to_gray(image: &DynamicImage) -> Cow<'_, GrayImage> {
    match image {
        DynamicImage::ImageLuma8(gray) => Cow::Borrowed(gray),
        other => Cow::Owned(other.to_luma8()),
    }
}
