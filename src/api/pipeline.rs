//! 帧对分类任务入口

use log::info;
use std::path::{Path, PathBuf};

use crate::core::inference::{DisabledInference, InferenceClient, OllamaClient};
use crate::core::pattern::{load_references, PatternReference};
use crate::core::pipeline::{FrameSortJob, JobLayout, JobSettings, PipelineError, RunResult, Stream};
use crate::core::video::FfmpegSource;

/// 帧对分类器：持有任务设置、输出布局和推理后端，可重复执行多个任务
///
/// ```ignore
/// let sorter = FrameSorter::create(JobSettings::default(), JobLayout::default())?;
/// let result = sorter.process_video_frames("dive-07", &raw, &realsense, &patterns)?;
/// println!("{}", result.summary());
/// ```
pub struct FrameSorter {
    settings: JobSettings,
    layout: JobLayout,
    inference: Box<dyn InferenceClient>,
}

impl FrameSorter {
    /// 场景阶段开启时连接 Ollama 后端
    pub fn create(settings: JobSettings, layout: JobLayout) -> Result<Self, PipelineError> {
        settings.pipeline.validate()?;
        let inference: Box<dyn InferenceClient> = if settings.pipeline.stages.scene_content {
            let client = OllamaClient::new(settings.ollama.clone())
                .map_err(|e| PipelineError::InvalidConfig(format!("inference client: {}", e)))?;
            Box::new(client)
        } else {
            Box::new(DisabledInference)
        };
        Ok(Self::with_inference(settings, layout, inference))
    }

    pub fn with_inference(settings: JobSettings, layout: JobLayout, inference: Box<dyn InferenceClient>) -> Self {
        info!("🎬 FrameSorter: created (output {:?})", layout.output_root);
        Self {
            settings,
            layout,
            inference,
        }
    }

    /// 打开两路视频，任一路打不开即失败，不做任何处理
    pub fn process_video_frames(
        &self,
        job_id: &str,
        raw_video: &Path,
        realsense_video: &Path,
        pattern_images: &[PathBuf],
    ) -> Result<RunResult, PipelineError> {
        let mut raw = FfmpegSource::open(Stream::Raw, raw_video)?;
        let mut realsense = FfmpegSource::open(Stream::Realsense, realsense_video)?;

        let references: Vec<PatternReference> = if self.settings.pipeline.stages.pattern_matching {
            load_references(pattern_images)
        } else {
            Vec::new()
        };

        FrameSortJob::new(
            job_id,
            self.layout.clone(),
            &self.settings.pipeline,
            &references,
            self.inference.as_ref(),
        )
        .run(&mut raw, &mut realsense)
    }
}

impl Drop for FrameSorter {
    fn drop(&mut self) {
        info!("🗑️ FrameSorter: released");
    }
}
