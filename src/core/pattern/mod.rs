//! 模式匹配：用局部特征对应关系给候选帧打分，返回得分最高的参考图标签

pub mod features;
pub mod matcher;
pub mod reference;

pub use features::{Descriptor, FeatureConfig, FeatureError, FeatureExtractor, GradientHistogramExtractor};
pub use matcher::{cross_check_matches, DescriptorMatch};
pub use reference::{label_problem, load_references, PatternReference};

use image::DynamicImage;
use log::{debug, warn};
use once_cell::sync::OnceCell;

use crate::core::pipeline::frame::to_gray;

/// 已评估但没有任何参考图达到阈值
pub const NO_PATTERN_MATCH: &str = "No_Pattern_Match";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternMatch {
    Matched { label: String, good_matches: usize },
    Unmatched,
}

impl PatternMatch {
    pub fn label(&self) -> &str {
        match self {
            PatternMatch::Matched { label, .. } => label,
            PatternMatch::Unmatched => NO_PATTERN_MATCH,
        }
    }
}

/// 绑定一组参考图和一个特征提取器。参考图描述子在首次使用时由该提取器
/// 提取并缓存，缓存只属于这个匹配器。
pub struct PatternMatcher<'a> {
    extractor: Box<dyn FeatureExtractor>,
    references: &'a [PatternReference],
    descriptors: Vec<OnceCell<Option<Vec<Descriptor>>>>,
}

impl<'a> PatternMatcher<'a> {
    pub fn new(references: &'a [PatternReference]) -> Self {
        Self::with_extractor(references, Box::new(GradientHistogramExtractor::new()))
    }

    pub fn with_extractor(references: &'a [PatternReference], extractor: Box<dyn FeatureExtractor>) -> Self {
        Self {
            extractor,
            references,
            descriptors: references.iter().map(|_| OnceCell::new()).collect(),
        }
    }

    pub fn references(&self) -> &'a [PatternReference] {
        self.references
    }

    /// 提取失败或没有特征时返回 None，整个运行期间跳过该参考图
    fn reference_descriptors(&self, index: usize) -> Option<&[Descriptor]> {
        let reference = &self.references[index];
        self.descriptors[index]
            .get_or_init(|| match self.extractor.extract(reference.image()) {
                Ok(descriptors) if descriptors.is_empty() => {
                    warn!("⚠️ No features found for pattern: {}", reference.label());
                    None
                }
                Ok(descriptors) => Some(descriptors),
                Err(e) => {
                    warn!("⚠️ Feature extraction failed for pattern {}: {}", reference.label(), e);
                    None
                }
            })
            .as_deref()
    }

    /// 返回 None 表示查询图无法提取特征（无法评估），
    /// `Some(Unmatched)` 表示评估完成但没有 good match。
    ///
    /// good match 数相同时保留先出现的参考图。
    pub fn best_pattern(&self, image: &DynamicImage, distance_cutoff: f32) -> Option<PatternMatch> {
        let gray = to_gray(image);
        let query = match self.extractor.extract(&gray) {
            Ok(descriptors) if descriptors.is_empty() => {
                warn!("⚠️ No features found in query image");
                return None;
            }
            Ok(descriptors) => descriptors,
            Err(e) => {
                warn!("⚠️ Feature extraction failed for query image: {}", e);
                return None;
            }
        };

        let mut best: Option<(&PatternReference, usize)> = None;
        for (index, reference) in self.references.iter().enumerate() {
            let Some(train) = self.reference_descriptors(index) else {
                continue;
            };

            let good = cross_check_matches(&query, train)
                .iter()
                .filter(|m| m.distance < distance_cutoff)
                .count();
            debug!("🧩 {}: {} good matches", reference.label(), good);

            if good > best.map_or(0, |(_, n)| n) {
                best = Some((reference, good));
            }
        }

        Some(match best {
            Some((reference, good_matches)) => PatternMatch::Matched {
                label: reference.label().to_string(),
                good_matches,
            },
            None => PatternMatch::Unmatched,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::imageops;
    use image::{GrayImage, Luma};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn block_texture(width: u32, height: u32, block: u32, seed: u64) -> GrayImage {
        let mut rng = StdRng::seed_from_u64(seed);
        let cols = width.div_ceil(block);
        let blocks: Vec<u8> = (0..cols * height.div_ceil(block)).map(|_| rng.gen()).collect();
        GrayImage::from_fn(width, height, |x, y| Luma([blocks[((y / block) * cols + x / block) as usize]]))
    }

    fn query(image: &GrayImage) -> DynamicImage {
        DynamicImage::ImageLuma8(image.clone())
    }

    /// 每张图都返回同一个描述子
    struct ConstantExtractor;

    impl FeatureExtractor for ConstantExtractor {
        fn extract(&self, _image: &GrayImage) -> Result<Vec<Descriptor>, FeatureError> {
            Ok(vec![[1.0; features::DESCRIPTOR_LEN]])
        }
    }

    struct CountingExtractor {
        calls: Arc<AtomicUsize>,
    }

    impl FeatureExtractor for CountingExtractor {
        fn extract(&self, image: &GrayImage) -> Result<Vec<Descriptor>, FeatureError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            GradientHistogramExtractor::new().extract(image)
        }
    }

    #[test]
    fn test_identical_reference_wins() {
        let target = block_texture(96, 96, 8, 1);
        let references = vec![
            PatternReference::new("flat", GrayImage::from_pixel(96, 96, Luma([40]))),
            PatternReference::new("target", target.clone()),
        ];
        let matcher = PatternMatcher::new(&references);

        let result = matcher.best_pattern(&query(&target), 200.0).unwrap();
        match result {
            PatternMatch::Matched { label, good_matches } => {
                assert_eq!(label, "target");
                assert!(good_matches > 0);
            }
            PatternMatch::Unmatched => panic!("expected a match"),
        }
    }

    #[test]
    fn test_tie_keeps_first_reference() {
        let target = block_texture(96, 96, 8, 2);

        let references = vec![
            PatternReference::new("first", target.clone()),
            PatternReference::new("second", target.clone()),
        ];
        let result = PatternMatcher::new(&references).best_pattern(&query(&target), 200.0).unwrap();
        assert_eq!(result.label(), "first");

        let swapped = vec![
            PatternReference::new("second", target.clone()),
            PatternReference::new("first", target.clone()),
        ];
        let result = PatternMatcher::new(&swapped).best_pattern(&query(&target), 200.0).unwrap();
        assert_eq!(result.label(), "second");
    }

    #[test]
    fn test_blank_query_cannot_be_evaluated() {
        let references = vec![PatternReference::new("target", block_texture(96, 96, 8, 3))];
        let blank = DynamicImage::ImageLuma8(GrayImage::from_pixel(96, 96, Luma([200])));
        assert!(PatternMatcher::new(&references).best_pattern(&blank, 200.0).is_none());
    }

    #[test]
    fn test_no_good_match_returns_sentinel() {
        let target = block_texture(96, 96, 8, 4);
        let references = vec![PatternReference::new("other", block_texture(96, 96, 8, 5))];

        // 严格小于 0 的距离不存在
        let result = PatternMatcher::new(&references).best_pattern(&query(&target), 0.0).unwrap();
        assert_eq!(result, PatternMatch::Unmatched);
        assert_eq!(result.label(), NO_PATTERN_MATCH);
    }

    #[test]
    fn test_unusable_references_are_skipped() {
        let target = block_texture(96, 96, 8, 6);
        let mut references = vec![
            PatternReference::new("tiny", GrayImage::from_pixel(4, 4, Luma([0]))),
            PatternReference::new("blank", GrayImage::from_pixel(96, 96, Luma([128]))),
        ];
        let result = PatternMatcher::new(&references).best_pattern(&query(&target), 200.0).unwrap();
        assert_eq!(result, PatternMatch::Unmatched);

        references.push(PatternReference::new("target", target.clone()));
        let result = PatternMatcher::new(&references).best_pattern(&query(&target), 200.0).unwrap();
        assert_eq!(result.label(), "target");
    }

    #[test]
    fn test_rotated_reference_still_matches() {
        let target = block_texture(96, 96, 8, 8);
        let references = vec![PatternReference::new("rotated", imageops::rotate90(&target))];
        let result = PatternMatcher::new(&references).best_pattern(&query(&target), 200.0).unwrap();
        assert_eq!(result.label(), "rotated");
    }

    #[test]
    fn test_reference_descriptors_extracted_once_per_matcher() {
        let calls = Arc::new(AtomicUsize::new(0));
        let references = vec![PatternReference::new("target", block_texture(96, 96, 8, 9))];
        let matcher = PatternMatcher::with_extractor(
            &references,
            Box::new(CountingExtractor { calls: Arc::clone(&calls) }),
        );

        let frame = query(&block_texture(96, 96, 8, 10));
        matcher.best_pattern(&frame, 200.0);
        matcher.best_pattern(&frame, 200.0);
        // 两次查询 + 一次参考图
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_matchers_do_not_share_descriptors() {
        let references = vec![PatternReference::new("r", GrayImage::from_pixel(96, 96, Luma([128])))];
        let frame = query(&block_texture(96, 96, 8, 11));

        // 默认提取器在纯色参考图上找不到特征
        let default_result = PatternMatcher::new(&references).best_pattern(&frame, 200.0).unwrap();
        assert_eq!(default_result, PatternMatch::Unmatched);

        let constant = PatternMatcher::with_extractor(&references, Box::new(ConstantExtractor));
        assert_eq!(
            constant.best_pattern(&frame, 200.0),
            Some(PatternMatch::Matched {
                label: "r".to_string(),
                good_matches: 1
            })
        );
    }
}
