use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::archiver::{OutputArchiver, Rejection};
use super::config::PipelineConfig;
use super::error::PipelineError;
use super::evaluator::FramePairEvaluator;
use super::walker::PairWalker;
use crate::core::inference::{InferenceClient, OllamaConfig};
use crate::core::pattern::PatternReference;
use crate::core::video::FrameSource;

const ACCEPTED_DIR: &str = "Accepted_images";
const REJECTION_LOG_FILE: &str = "removed_images_log.txt";

/// 任务输出目录布局
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobLayout {
    pub output_root: PathBuf,
    pub downloads_dir: PathBuf,
}

impl Default for JobLayout {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("pipeline_output"),
            downloads_dir: PathBuf::from("downloads"),
        }
    }
}

impl JobLayout {
    pub fn new(output_root: impl Into<PathBuf>, downloads_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            downloads_dir: downloads_dir.into(),
        }
    }

    pub fn job_dir(&self, job_id: &str) -> PathBuf {
        self.output_root.join(job_id)
    }

    pub fn accepted_dir(&self, job_id: &str) -> PathBuf {
        self.job_dir(job_id).join(ACCEPTED_DIR)
    }

    pub fn rejection_log(&self, job_id: &str) -> PathBuf {
        self.job_dir(job_id).join(REJECTION_LOG_FILE)
    }

    pub fn archiver(&self, job_id: &str) -> OutputArchiver {
        OutputArchiver::new(
            self.accepted_dir(job_id),
            self.rejection_log(job_id),
            self.downloads_dir.clone(),
        )
    }
}

/// 可从 JSON 文件加载的任务设置，所有字段可省略
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobSettings {
    pub pipeline: PipelineConfig,
    pub ollama: OllamaConfig,
}

impl JobSettings {
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, PipelineError> {
        serde_json::from_str(text)
            .map_err(|e| PipelineError::InvalidConfig(format!("settings JSON: {}", e)))
    }
}

/// 一次运行的汇总
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub job_id: String,
    pub total_pairs: u64,
    pub accepted: u64,
    pub rejections: Vec<Rejection>,
    pub label_counts: BTreeMap<String, usize>,
    /// 没有任何通过的帧时为 None
    pub archive: Option<PathBuf>,
}

impl RunResult {
    pub fn rejected(&self) -> usize {
        self.rejections.len()
    }

    pub fn summary(&self) -> String {
        let labels = if self.label_counts.is_empty() {
            "-".to_string()
        } else {
            self.label_counts
                .iter()
                .map(|(label, count)| format!("{}={}", label, count))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let archive = match &self.archive {
            Some(path) => path.display().to_string(),
            None => "none".to_string(),
        };
        format!(
            "job {}: {} pairs, {} accepted, {} rejected [{}], archive: {}",
            self.job_id,
            self.total_pairs,
            self.accepted,
            self.rejected(),
            labels,
            archive
        )
    }
}

/// 单个任务：配置、参考图和推理后端在运行期间只读
pub struct FrameSortJob<'a> {
    id: String,
    layout: JobLayout,
    config: &'a PipelineConfig,
    references: &'a [PatternReference],
    inference: &'a dyn InferenceClient,
}

impl<'a> FrameSortJob<'a> {
    pub fn new(
        id: impl Into<String>,
        layout: JobLayout,
        config: &'a PipelineConfig,
        references: &'a [PatternReference],
        inference: &'a dyn InferenceClient,
    ) -> Self {
        Self {
            id: id.into(),
            layout,
            config,
            references,
            inference,
        }
    }

    pub fn run(&self, raw: &mut dyn FrameSource, realsense: &mut dyn FrameSource) -> Result<RunResult, PipelineError> {
        validate_job_id(&self.id)?;
        self.config.validate()?;

        info!(
            "🚀 Job {}: {} + {}, {} pattern references",
            self.id,
            raw.name(),
            realsense.name(),
            self.references.len()
        );

        let archiver = self.layout.archiver(&self.id);
        archiver.prepare()?;

        let evaluator = FramePairEvaluator::new(self.config, self.references, self.inference);
        let summary = PairWalker::new(&evaluator, &archiver).walk(raw, realsense)?;
        let archive = archiver.finalize(&summary.rejections, &self.id)?;

        let result = RunResult {
            job_id: self.id.clone(),
            total_pairs: summary.total_pairs,
            accepted: summary.accepted,
            rejections: summary.rejections,
            label_counts: summary.label_counts,
            archive,
        };
        info!("✅ {}", result.summary());
        Ok(result)
    }
}

/// 任务 id 会成为目录名和压缩包名的一部分
fn validate_job_id(id: &str) -> Result<(), PipelineError> {
    let valid = !id.is_empty()
        && id != "."
        && id != ".."
        && !id.chars().any(|c| c == '/' || c == '\\' || c.is_control());
    if valid {
        Ok(())
    } else {
        Err(PipelineError::InvalidConfig(format!("invalid job id {:?}", id)))
    }
}
