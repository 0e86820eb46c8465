use serde::{Deserialize, Serialize};

use super::error::PipelineError;

pub const DEFAULT_SCENE_PROMPT: &str = "Look at this image carefully. Does it contain any man-made objects \
(tools, cables, buildings, vehicles, packaging, text or markings)? \
Answer with a single word, True or False, followed by a one-sentence explanation.";

/// 各阶段开关
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageToggles {
    pub solid_color: bool,
    pub scene_content: bool,
    pub pattern_matching: bool,
}

impl Default for StageToggles {
    fn default() -> Self {
        Self {
            solid_color: true,
            scene_content: true,
            pattern_matching: true,
        }
    }
}

/// 纯色帧检测阈值
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolidColorThresholds {
    /// 亮度 <= 此值视为黑
    pub black_cutoff: u8,
    /// 亮度 >= 此值视为白
    pub white_cutoff: u8,
    /// 黑或白像素占比达到此值即判定为纯色帧
    pub fraction_cutoff: f32,
}

impl Default for SolidColorThresholds {
    fn default() -> Self {
        Self {
            black_cutoff: 30,
            white_cutoff: 225,
            fraction_cutoff: 0.60,
        }
    }
}

/// 单次运行的不可变配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub stages: StageToggles,
    pub solid_color: SolidColorThresholds,
    /// 描述子欧氏距离严格小于此值才算 good match。
    ///
    /// 描述子范数为 512，默认 200 相当宽松：只要查询帧有特征，
    /// 几乎总会有某个参考图拿到至少一个 good match 而被选中，
    /// `No_Pattern_Match` 很少出现。需要拒绝弱匹配时调低此值。
    pub pattern_distance_cutoff: f32,
    pub scene_prompt: String,
    /// 并发评估的帧对数量，1 表示严格串行
    pub batch_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stages: StageToggles::default(),
            solid_color: SolidColorThresholds::default(),
            pattern_distance_cutoff: 200.0,
            scene_prompt: DEFAULT_SCENE_PROMPT.to_string(),
            batch_size: num_cpus::get().clamp(1, 4),
        }
    }
}

impl PipelineConfig {
    /// 默认配置，但逐对串行评估
    pub fn sequential() -> Self {
        Self {
            batch_size: 1,
            ..Self::default()
        }
    }

    pub fn with_stages(mut self, stages: StageToggles) -> Self {
        self.stages = stages;
        self
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        let fraction = self.solid_color.fraction_cutoff;
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "solid_color.fraction_cutoff must be in (0, 1], got {}",
                fraction
            )));
        }
        if !(self.pattern_distance_cutoff > 0.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "pattern_distance_cutoff must be positive, got {}",
                self.pattern_distance_cutoff
            )));
        }
        if self.batch_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if self.stages.scene_content && self.scene_prompt.trim().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "scene_prompt is empty while the scene stage is enabled".to_string(),
            ));
        }
        Ok(())
    }
}
