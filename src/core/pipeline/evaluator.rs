use log::{debug, info};

use super::config::PipelineConfig;
use super::frame::FramePair;
use super::scene::classify_scene;
use super::solid_frame::is_mostly_solid;
use crate::core::inference::InferenceClient;
use crate::core::pattern::{PatternMatcher, PatternReference};

/// 模式匹配关闭时的默认分类
pub const UNCATEGORIZED: &str = "Uncategorized";
/// 模式匹配开启但没有可用参考图
pub const NO_PATTERNS_AVAILABLE: &str = "No_Patterns_Available";
/// 查询帧提取不到特征，无法评估
pub const NO_FEATURES_DETECTED: &str = "No_Features_Detected";

pub const SOLID_COLOR_REASON: &str = "mostly solid color";

const REASON_EXCERPT_CHARS: usize = 50;

/// 单个帧对的评估结论
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted { label: String },
    Rejected { reason: String },
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted { .. })
    }
}

/// 按固定顺序执行纯色检测 → 场景检测 → 模式匹配，任一阶段拒绝即短路
pub struct FramePairEvaluator<'a> {
    config: &'a PipelineConfig,
    inference: &'a dyn InferenceClient,
    matcher: PatternMatcher<'a>,
}

impl<'a> FramePairEvaluator<'a> {
    pub fn new(
        config: &'a PipelineConfig,
        references: &'a [PatternReference],
        inference: &'a dyn InferenceClient,
    ) -> Self {
        Self {
            config,
            inference,
            matcher: PatternMatcher::new(references),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        self.config
    }

    pub fn evaluate(&self, pair: &FramePair) -> Verdict {
        let stages = &self.config.stages;

        if stages.solid_color && is_mostly_solid(&pair.realsense, &self.config.solid_color) {
            debug!("{}: rejected by solid color check", pair.realsense_name());
            return Verdict::Rejected {
                reason: SOLID_COLOR_REASON.to_string(),
            };
        }

        if stages.scene_content {
            let scene = classify_scene(&pair.raw, &self.config.scene_prompt, self.inference);
            if scene.disqualified {
                debug!("{}: rejected by scene check: {}", pair.raw_name(), scene.raw_text);
                return Verdict::Rejected {
                    reason: scene_reason(&scene.raw_text),
                };
            }
        }

        let label = if !stages.pattern_matching {
            UNCATEGORIZED.to_string()
        } else if self.matcher.references().is_empty() {
            NO_PATTERNS_AVAILABLE.to_string()
        } else {
            match self
                .matcher
                .best_pattern(&pair.realsense, self.config.pattern_distance_cutoff)
            {
                Some(found) => {
                    info!("{}: matched pattern '{}'", pair.realsense_name(), found.label());
                    found.label().to_string()
                }
                None => NO_FEATURES_DETECTED.to_string(),
            }
        };

        Verdict::Accepted { label }
    }
}

fn scene_reason(raw_text: &str) -> String {
    let excerpt: String = raw_text.chars().take(REASON_EXCERPT_CHARS).collect();
    if raw_text.chars().count() > REASON_EXCERPT_CHARS {
        format!("scene content disqualified ({}...)", excerpt.trim_end())
    } else {
        format!("scene content disqualified ({})", excerpt.trim_end())
    }
}
