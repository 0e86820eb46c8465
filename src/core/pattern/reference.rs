use image::GrayImage;
use log::{info, warn};
use std::path::{Component, Path, PathBuf};

use super::NO_PATTERN_MATCH;
use crate::core::pipeline::evaluator::{NO_FEATURES_DETECTED, NO_PATTERNS_AVAILABLE, UNCATEGORIZED};

/// 流水线自身使用的分类名，参考图不能占用
const RESERVED_LABELS: [&str; 4] = [UNCATEGORIZED, NO_PATTERNS_AVAILABLE, NO_FEATURES_DETECTED, NO_PATTERN_MATCH];

/// 命名的灰度参考图，整个运行期间只读
pub struct PatternReference {
    label: String,
    image: GrayImage,
}

impl PatternReference {
    pub fn new(label: impl Into<String>, image: GrayImage) -> Self {
        Self {
            label: label.into(),
            image,
        }
    }

    /// 读取图片并转为灰度，标签取文件名（不含扩展名）
    pub fn load(path: &Path) -> Result<Self, image::ImageError> {
        let image = image::open(path)?.to_luma8();
        Ok(Self::new(label_for(path), image))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn image(&self) -> &GrayImage {
        &self.image
    }
}

impl std::fmt::Debug for PatternReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternReference")
            .field("label", &self.label)
            .field("width", &self.image.width())
            .field("height", &self.image.height())
            .finish()
    }
}

fn label_for(path: &Path) -> String {
    path.file_stem()
        .or_else(|| path.file_name())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// 标签会成为输出目录名：必须是单个普通路径分量，且不与保留分类重名
pub fn label_problem(label: &str) -> Option<String> {
    let mut components = Path::new(label).components();
    let single_normal = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(name)), None) if name == label
    );
    if !single_normal || label.contains(|c: char| c == '/' || c == '\\') {
        return Some(format!("label {:?} is not a plain directory name", label));
    }
    if RESERVED_LABELS.contains(&label) {
        return Some(format!("label {:?} is reserved", label));
    }
    None
}

/// 按顺序加载参考图；读取失败或标签不可用的路径记录警告后跳过
pub fn load_references(paths: &[PathBuf]) -> Vec<PatternReference> {
    info!("🧩 Loading {} pattern images", paths.len());
    let references: Vec<PatternReference> = paths
        .iter()
        .filter_map(|path| match PatternReference::load(path) {
            Ok(reference) => match label_problem(reference.label()) {
                Some(problem) => {
                    warn!("⚠️ Skipping pattern image {:?}: {}", path, problem);
                    None
                }
                None => Some(reference),
            },
            Err(e) => {
                warn!("⚠️ Could not load pattern image {:?}: {}", path, e);
                None
            }
        })
        .collect();
    info!("✓ Loaded {}/{} pattern images", references.len(), paths.len());
    references
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb, RgbImage};

    #[test]
    fn test_load_uses_file_stem_and_grayscale() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checker_board.png");
        RgbImage::from_pixel(20, 10, Rgb([255, 0, 0])).save(&path).unwrap();

        let reference = PatternReference::load(&path).unwrap();
        assert_eq!(reference.label(), "checker_board");
        assert_eq!(reference.image().dimensions(), (20, 10));
    }

    #[test]
    fn test_load_references_skips_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("a.png");
        GrayImage::from_pixel(8, 8, Luma([10])).save(&good).unwrap();
        let missing = dir.path().join("missing.png");
        let garbage = dir.path().join("garbage.png");
        std::fs::write(&garbage, b"not an image").unwrap();

        let refs = load_references(&[missing, good, garbage]);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].label(), "a");
    }

    #[test]
    fn test_load_references_skips_unusable_labels() {
        let dir = tempfile::tempdir().unwrap();
        let image = GrayImage::from_pixel(8, 8, Luma([10]));
        let dot_dot = dir.path().join("...png");
        let reserved = dir.path().join("Uncategorized.png");
        let good = dir.path().join("ridge.png");
        for path in [&dot_dot, &reserved, &good] {
            image.save_with_format(path, image::ImageFormat::Png).unwrap();
        }

        let refs = load_references(&[dot_dot, reserved, good]);
        let labels: Vec<&str> = refs.iter().map(|r| r.label()).collect();
        assert_eq!(labels, vec!["ridge"]);
    }

    #[test]
    fn test_label_problem() {
        assert!(label_problem("ridge_01").is_none());
        assert!(label_problem("marker v2").is_none());
        assert!(label_problem("").is_some());
        assert!(label_problem(".").is_some());
        assert!(label_problem("..").is_some());
        assert!(label_problem("a/b").is_some());
        assert!(label_problem("a\\b").is_some());
        assert!(label_problem("/abs").is_some());
        assert!(label_problem(NO_PATTERN_MATCH).is_some());
        assert!(label_problem(NO_FEATURES_DETECTED).is_some());
    }
}
