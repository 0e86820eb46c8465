//! 帧对分类流水线：纯色检测 → 场景检测 → 模式匹配 → 写盘 / 记录拒绝 → 打包

pub mod archiver;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod frame;
pub mod job;
pub mod scene;
pub mod solid_frame;
pub mod walker;

pub use archiver::{OutputArchiver, Rejection};
pub use config::{PipelineConfig, SolidColorThresholds, StageToggles};
pub use error::PipelineError;
pub use evaluator::{FramePairEvaluator, Verdict};
pub use frame::{Frame, FramePair, Stream};
pub use job::{FrameSortJob, JobLayout, JobSettings, RunResult};
pub use scene::{classify_scene, SceneVerdict};
pub use solid_frame::is_mostly_solid;
pub use walker::{PairWalker, WalkSummary};
