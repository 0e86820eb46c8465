use image::DynamicImage;
use log::error;

use super::config::SolidColorThresholds;
use super::frame::to_gray;

/// 判断图像是否以黑或白为主（例如镜头被遮挡、过曝的深度帧）
///
/// 空图像不会被判为纯色：测量失败不应导致帧被自动拒绝。
pub fn is_mostly_solid(image: &DynamicImage, thresholds: &SolidColorThresholds) -> bool {
    let gray = to_gray(image);
    let total = gray.as_raw().len();
    if total == 0 {
        error!("❌ is_mostly_solid: image has zero pixels");
        return false;
    }

    let (black, white) = gray
        .as_raw()
        .iter()
        .fold((0usize, 0usize), |(black, white), &v| {
            (
                black + (v <= thresholds.black_cutoff) as usize,
                white + (v >= thresholds.white_cutoff) as usize,
            )
        });

    let black_ratio = black as f32 / total as f32;
    let white_ratio = white as f32 / total as f32;

    black_ratio >= thresholds.fraction_cutoff || white_ratio >= thresholds.fraction_cutoff
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    fn gray_frame(width: u32, height: u32, fill: u8) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([fill])))
    }

    /// 前 `dark_rows` 行填充 `dark`，其余填充 `rest`
    fn split_frame(dark_rows: u32, dark: u8, rest: u8) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_fn(10, 10, |_, y| {
            if y < dark_rows {
                Luma([dark])
            } else {
                Luma([rest])
            }
        }))
    }

    #[test]
    fn test_mid_gray_is_not_solid() {
        let thresholds = SolidColorThresholds::default();
        assert!(!is_mostly_solid(&gray_frame(64, 48, 128), &thresholds));
    }

    #[test]
    fn test_all_black_and_all_white_are_solid() {
        let thresholds = SolidColorThresholds::default();
        assert!(is_mostly_solid(&gray_frame(64, 48, 0), &thresholds));
        assert!(is_mostly_solid(&gray_frame(64, 48, 255), &thresholds));
    }

    #[test]
    fn test_cutoffs_are_inclusive() {
        let thresholds = SolidColorThresholds::default();
        assert!(is_mostly_solid(&gray_frame(8, 8, 30), &thresholds));
        assert!(is_mostly_solid(&gray_frame(8, 8, 225), &thresholds));
        assert!(!is_mostly_solid(&gray_frame(8, 8, 31), &thresholds));
        assert!(!is_mostly_solid(&gray_frame(8, 8, 224), &thresholds));
    }

    #[test]
    fn test_fraction_boundary() {
        let thresholds = SolidColorThresholds::default();
        // 60% 黑 → 命中
        assert!(is_mostly_solid(&split_frame(6, 10, 128), &thresholds));
        // 50% 黑 → 未命中
        assert!(!is_mostly_solid(&split_frame(5, 10, 128), &thresholds));
        // 70% 白
        assert!(is_mostly_solid(&split_frame(7, 250, 128), &thresholds));
    }

    #[test]
    fn test_color_input_is_converted() {
        let thresholds = SolidColorThresholds::default();
        let white = DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, Rgb([255, 255, 255])));
        let gray = DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, Rgb([128, 128, 128])));
        assert!(is_mostly_solid(&white, &thresholds));
        assert!(!is_mostly_solid(&gray, &thresholds));
    }

    #[test]
    fn test_empty_image_is_not_solid() {
        let thresholds = SolidColorThresholds::default();
        assert!(!is_mostly_solid(&gray_frame(0, 0, 0), &thresholds));
    }

    #[test]
    fn test_custom_thresholds() {
        let thresholds = SolidColorThresholds {
            black_cutoff: 50,
            white_cutoff: 200,
            fraction_cutoff: 0.9,
        };
        assert!(is_mostly_solid(&gray_frame(8, 8, 45), &thresholds));
        assert!(!is_mostly_solid(&split_frame(8, 45, 128), &thresholds));
    }
}
