//! 局部特征：FAST 角点 + 主方向 + 梯度方向直方图描述子
//!
//! 描述子沿用 SIFT 的 4x4 网格 × 8 方向布局（128 维），归一化后放大到 512，
//! 因此欧氏距离的量级与常见 SIFT 实现一致，距离阈值可以直接沿用。

use image::imageops::{self, FilterType};
use image::GrayImage;
use std::f32::consts::PI;
use thiserror::Error;

pub const DESCRIPTOR_LEN: usize = 128;
pub type Descriptor = [f32; DESCRIPTOR_LEN];

/// 描述子采样窗口半径（含梯度计算的 1 像素）
const PATCH_RADIUS: u32 = 12;
const ORIENTATION_BINS: usize = 36;
const ORIENTATION_RADIUS: i32 = 6;
const DESCRIPTOR_SCALE: f32 = 512.0;
const DESCRIPTOR_CLAMP: f32 = 0.2;

/// Bresenham 半径 3 圆周上的 16 个点，从 12 点钟方向顺时针
const CIRCLE_OFFSETS: [(i32, i32); 16] = [
    (0, -3), (1, -3), (2, -2), (3, -1),
    (3, 0), (3, 1), (2, 2), (1, 3),
    (0, 3), (-1, 3), (-2, 2), (-3, 1),
    (-3, 0), (-3, -1), (-2, -2), (-1, -3),
];

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("image {width}x{height} is too small for feature extraction")]
    TooSmall { width: u32, height: u32 },
}

/// 局部特征提取能力
pub trait FeatureExtractor: Send + Sync {
    fn extract(&self, image: &GrayImage) -> Result<Vec<Descriptor>, FeatureError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub score: f32,
    /// 金字塔层级（0 = 原始分辨率）
    pub level: usize,
    /// 主方向（弧度）
    pub angle: f32,
}

#[derive(Debug, Clone)]
pub struct FeatureConfig {
    pub fast_threshold: u8,
    /// FAST-N 中的 N
    pub arc_length: usize,
    pub pyramid_levels: usize,
    pub blur_sigma: f32,
    /// 网格 NMS 单元大小（像素）
    pub nms_cell: u32,
    pub max_features: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            fast_threshold: 20,
            arc_length: 9,
            pyramid_levels: 3,
            blur_sigma: 1.0,
            nms_cell: 6,
            max_features: 500,
        }
    }
}

/// 多尺度 FAST + 旋转归一化梯度直方图
pub struct GradientHistogramExtractor {
    config: FeatureConfig,
}

impl GradientHistogramExtractor {
    pub fn new() -> Self {
        Self::with_config(FeatureConfig::default())
    }

    pub fn with_config(config: FeatureConfig) -> Self {
        Self { config }
    }

    /// 检测关键点并计算描述子，描述子与关键点一一对应
    pub fn detect_and_compute(&self, image: &GrayImage) -> Result<Vec<(Keypoint, Descriptor)>, FeatureError> {
        let min_side = 2 * PATCH_RADIUS + 1;
        if image.width() < min_side || image.height() < min_side {
            return Err(FeatureError::TooSmall {
                width: image.width(),
                height: image.height(),
            });
        }

        let mut features = Vec::new();
        let mut current = image.clone();

        for level in 0..self.config.pyramid_levels.max(1) {
            if current.width() < min_side || current.height() < min_side {
                break;
            }

            let smoothed = imageops::blur(&current, self.config.blur_sigma);
            let corners = self.detect_corners(&smoothed, level);
            let scale = (1u32 << level) as f32;

            for mut kp in corners {
                kp.angle = dominant_orientation(&smoothed, kp.x as i32, kp.y as i32);
                if let Some(desc) = describe(&smoothed, &kp) {
                    kp.x *= scale;
                    kp.y *= scale;
                    features.push((kp, desc));
                }
            }

            let (w, h) = (current.width() / 2, current.height() / 2);
            if w == 0 || h == 0 {
                break;
            }
            current = imageops::resize(&current, w, h, FilterType::Triangle);
        }

        features.sort_by(|a, b| {
            b.0.score
                .total_cmp(&a.0.score)
                .then(a.0.level.cmp(&b.0.level))
                .then(a.0.y.total_cmp(&b.0.y))
                .then(a.0.x.total_cmp(&b.0.x))
        });
        features.truncate(self.config.max_features);
        Ok(features)
    }

    fn detect_corners(&self, image: &GrayImage, level: usize) -> Vec<Keypoint> {
        let raw = fast_corners(image, self.config.fast_threshold, self.config.arc_length);
        grid_suppress(raw, image.width(), image.height(), self.config.nms_cell)
            .into_iter()
            .map(|(x, y, score)| Keypoint {
                x: x as f32,
                y: y as f32,
                score,
                level,
                angle: 0.0,
            })
            .collect()
    }
}

impl Default for GradientHistogramExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureExtractor for GradientHistogramExtractor {
    fn extract(&self, image: &GrayImage) -> Result<Vec<Descriptor>, FeatureError> {
        Ok(self
            .detect_and_compute(image)?
            .into_iter()
            .map(|(_, desc)| desc)
            .collect())
    }
}

/// FAST-N 角点检测，只在描述子窗口完整的区域内检测
fn fast_corners(image: &GrayImage, threshold: u8, arc_length: usize) -> Vec<(u32, u32, f32)> {
    let (w, h) = image.dimensions();
    let mut corners = Vec::new();
    if w <= 2 * PATCH_RADIUS || h <= 2 * PATCH_RADIUS {
        return corners;
    }

    let thresh = threshold as i16;
    let n = arc_length.clamp(9, 12);

    for y in PATCH_RADIUS..(h - PATCH_RADIUS) {
        for x in PATCH_RADIUS..(w - PATCH_RADIUS) {
            let center = image.get_pixel(x, y).0[0] as i16;

            let mut bright_mask: u32 = 0;
            let mut dark_mask: u32 = 0;
            let mut bright_score = 0f32;
            let mut dark_score = 0f32;

            for (i, &(dx, dy)) in CIRCLE_OFFSETS.iter().enumerate() {
                let px = (x as i32 + dx) as u32;
                let py = (y as i32 + dy) as u32;
                let diff = image.get_pixel(px, py).0[0] as i16 - center;
                if diff > thresh {
                    bright_mask |= 1 << i;
                    bright_score += (diff - thresh) as f32;
                } else if diff < -thresh {
                    dark_mask |= 1 << i;
                    dark_score += (-diff - thresh) as f32;
                }
            }

            let bright = has_contiguous_run(bright_mask, n);
            let dark = has_contiguous_run(dark_mask, n);
            if bright || dark {
                let score = match (bright, dark) {
                    (true, false) => bright_score,
                    (false, true) => dark_score,
                    _ => bright_score.max(dark_score),
                };
                corners.push((x, y, score));
            }
        }
    }

    corners
}

/// 16 位环形掩码中是否存在长度 >= n 的连续置位
fn has_contiguous_run(mask: u32, n: usize) -> bool {
    if mask == 0 {
        return false;
    }
    // 复制到高 16 位以处理首尾相接
    let mut run = mask | (mask << 16);
    for _ in 1..n {
        run &= run >> 1;
    }
    run != 0
}

/// 网格非极大值抑制：每个单元只保留得分最高的角点
fn grid_suppress(corners: Vec<(u32, u32, f32)>, width: u32, height: u32, cell: u32) -> Vec<(u32, u32, f32)> {
    let cell = cell.max(1);
    let cols = width.div_ceil(cell) as usize;
    let rows = height.div_ceil(cell) as usize;
    let mut grid: Vec<Option<(u32, u32, f32)>> = vec![None; cols * rows];

    for corner in corners {
        let slot = &mut grid[(corner.1 / cell) as usize * cols + (corner.0 / cell) as usize];
        if slot.map_or(true, |best| corner.2 > best.2) {
            *slot = Some(corner);
        }
    }

    grid.into_iter().flatten().collect()
}

fn gradient(image: &GrayImage, x: i32, y: i32) -> (f32, f32) {
    let at = |px: i32, py: i32| image.get_pixel(px as u32, py as u32).0[0] as f32;
    (at(x + 1, y) - at(x - 1, y), at(x, y + 1) - at(x, y - 1))
}

/// 36 档方向直方图的峰值方向
fn dominant_orientation(image: &GrayImage, cx: i32, cy: i32) -> f32 {
    let mut hist = [0f32; ORIENTATION_BINS];
    let sigma = ORIENTATION_RADIUS as f32 / 2.0;
    let r2 = ORIENTATION_RADIUS * ORIENTATION_RADIUS;

    for dy in -ORIENTATION_RADIUS..=ORIENTATION_RADIUS {
        for dx in -ORIENTATION_RADIUS..=ORIENTATION_RADIUS {
            if dx * dx + dy * dy > r2 {
                continue;
            }
            let (gx, gy) = gradient(image, cx + dx, cy + dy);
            let magnitude = (gx * gx + gy * gy).sqrt();
            if magnitude == 0.0 {
                continue;
            }
            let weight = (-((dx * dx + dy * dy) as f32) / (2.0 * sigma * sigma)).exp();
            let bin = angle_bin(gy.atan2(gx), ORIENTATION_BINS);
            hist[bin] += magnitude * weight;
        }
    }

    let (peak, _) = hist
        .iter()
        .enumerate()
        .fold((0usize, f32::MIN), |best, (i, &v)| if v > best.1 { (i, v) } else { best });
    (peak as f32 + 0.5) * 2.0 * PI / ORIENTATION_BINS as f32
}

/// 在关键点主方向上采样 16x16 窗口，生成 4x4x8 梯度方向直方图
fn describe(image: &GrayImage, kp: &Keypoint) -> Option<Descriptor> {
    let (w, h) = image.dimensions();
    let (sin, cos) = kp.angle.sin_cos();
    let sigma = 8.0f32;
    let mut desc = [0f32; DESCRIPTOR_LEN];

    for i in 0..16 {
        for j in 0..16 {
            let u = j as f32 - 7.5;
            let v = i as f32 - 7.5;
            let px = (kp.x + u * cos - v * sin).round() as i32;
            let py = (kp.y + u * sin + v * cos).round() as i32;
            if px < 1 || py < 1 || px >= w as i32 - 1 || py >= h as i32 - 1 {
                continue;
            }

            let (gx, gy) = gradient(image, px, py);
            let magnitude = (gx * gx + gy * gy).sqrt();
            if magnitude == 0.0 {
                continue;
            }
            let weight = (-(u * u + v * v) / (2.0 * sigma * sigma)).exp();
            let bin = angle_bin(gy.atan2(gx) - kp.angle, 8);
            let cell = (i / 4) * 4 + j / 4;
            desc[cell * 8 + bin] += magnitude * weight;
        }
    }

    if !normalize(&mut desc) {
        return None;
    }
    for v in desc.iter_mut() {
        *v = v.min(DESCRIPTOR_CLAMP);
    }
    if !normalize(&mut desc) {
        return None;
    }
    for v in desc.iter_mut() {
        *v *= DESCRIPTOR_SCALE;
    }
    Some(desc)
}

fn normalize(desc: &mut Descriptor) -> bool {
    let norm = desc.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm <= f32::EPSILON {
        return false;
    }
    for v in desc.iter_mut() {
        *v /= norm;
    }
    true
}

fn angle_bin(angle: f32, bins: usize) -> usize {
    let turn = 2.0 * PI;
    let normalized = angle.rem_euclid(turn);
    ((normalized / turn * bins as f32) as usize).min(bins - 1)
}
