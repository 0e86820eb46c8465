use log::{debug, info};
use rayon::prelude::*;
use std::collections::BTreeMap;

use super::archiver::{OutputArchiver, Rejection};
use super::error::PipelineError;
use super::evaluator::{FramePairEvaluator, Verdict};
use super::frame::FramePair;
use crate::core::video::FrameSource;

const PROGRESS_INTERVAL: u64 = 100;

/// 流式处理的统计结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkSummary {
    pub total_pairs: u64,
    pub accepted: u64,
    pub rejections: Vec<Rejection>,
    pub label_counts: BTreeMap<String, usize>,
}

/// 按位置索引同步读取两路视频，评估后写盘或记录拒绝
pub struct PairWalker<'a> {
    evaluator: &'a FramePairEvaluator<'a>,
    archiver: &'a OutputArchiver,
}

impl<'a> PairWalker<'a> {
    pub fn new(evaluator: &'a FramePairEvaluator<'a>, archiver: &'a OutputArchiver) -> Self {
        Self { evaluator, archiver }
    }

    /// 任一路读完即停止。每批最多 `batch_size` 对并发评估，
    /// 写盘和拒绝记录严格按索引顺序进行。
    pub fn walk(
        &self,
        raw: &mut dyn FrameSource,
        realsense: &mut dyn FrameSource,
    ) -> Result<WalkSummary, PipelineError> {
        let batch_size = self.evaluator.config().batch_size.max(1);
        let mut summary = WalkSummary::default();
        let mut next_index: u64 = 0;

        loop {
            let (batch, exhausted) = read_batch(raw, realsense, next_index, batch_size);
            next_index += batch.len() as u64;

            let verdicts: Vec<Verdict> = if batch.len() > 1 {
                batch.par_iter().map(|pair| self.evaluator.evaluate(pair)).collect()
            } else {
                batch.iter().map(|pair| self.evaluator.evaluate(pair)).collect()
            };

            for (pair, verdict) in batch.iter().zip(verdicts) {
                self.record(pair, verdict, &mut summary)?;
                if summary.total_pairs % PROGRESS_INTERVAL == 0 {
                    info!(
                        "📊 Processed {} frame pairs ({} accepted, {} rejected)",
                        summary.total_pairs,
                        summary.accepted,
                        summary.rejections.len()
                    );
                }
            }

            if exhausted {
                break;
            }
        }

        info!(
            "🏁 End of stream after {} frame pairs ({} / {})",
            summary.total_pairs,
            raw.name(),
            realsense.name()
        );
        Ok(summary)
    }

    fn record(&self, pair: &FramePair, verdict: Verdict, summary: &mut WalkSummary) -> Result<(), PipelineError> {
        summary.total_pairs += 1;
        match verdict {
            Verdict::Accepted { label } => {
                self.archiver.persist(&label, pair)?;
                summary.accepted += 1;
                *summary.label_counts.entry(label).or_insert(0) += 1;
            }
            Verdict::Rejected { reason } => {
                debug!("✗ {}: {}", pair.raw_name(), reason);
                summary.rejections.push(Rejection {
                    frame_name: pair.raw_name(),
                    reason,
                });
            }
        }
        Ok(())
    }
}

/// 先读原始流再读 RealSense 流；任一路结束即返回 exhausted
fn read_batch(
    raw: &mut dyn FrameSource,
    realsense: &mut dyn FrameSource,
    start_index: u64,
    batch_size: usize,
) -> (Vec<FramePair>, bool) {
    let mut batch = Vec::with_capacity(batch_size);
    while batch.len() < batch_size {
        let Some(raw_frame) = raw.next_frame() else {
            return (batch, true);
        };
        let Some(realsense_frame) = realsense.next_frame() else {
            return (batch, true);
        };
        let index = start_index + batch.len() as u64;
        batch.push(FramePair::new(index, raw_frame.image, realsense_frame.image));
    }
    (batch, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::inference::MockInferenceClient;
    use crate::core::pipeline::config::{PipelineConfig, StageToggles};
    use crate::core::pipeline::frame::Frame;
    use crate::core::video::MemorySource;
    use image::{Rgb, RgbImage};
    use std::sync::atomic::Ordering;

    fn create_test_frame(index: u64, fill: u8) -> Frame {
        Frame::from_rgb(RgbImage::from_pixel(8, 8, Rgb([fill, fill, fill])), index)
    }

    fn source(name: &str, fills: &[u8]) -> MemorySource {
        let frames = fills
            .iter()
            .enumerate()
            .map(|(i, &fill)| create_test_frame(i as u64, fill))
            .collect();
        MemorySource::new(name, frames)
    }

    fn solid_only(batch_size: usize) -> PipelineConfig {
        let mut config = PipelineConfig::default().with_stages(StageToggles {
            solid_color: true,
            scene_content: false,
            pattern_matching: false,
        });
        config.batch_size = batch_size;
        config
    }

    fn archiver_in(dir: &std::path::Path) -> OutputArchiver {
        let archiver = OutputArchiver::new(dir.join("accepted"), dir.join("log.txt"), dir.join("dl"));
        archiver.prepare().unwrap();
        archiver
    }

    #[test]
    fn test_stops_at_shorter_source() {
        let dir = tempfile::tempdir().unwrap();
        let archiver = archiver_in(dir.path());
        let config = solid_only(3);
        let client = MockInferenceClient::default();
        let evaluator = FramePairEvaluator::new(&config, &[], &client);
        let walker = PairWalker::new(&evaluator, &archiver);

        let mut raw = source("raw", &[128; 8]);
        let mut realsense = source("realsense", &[128; 12]);
        let realsense_reads = realsense.read_counter();

        let summary = walker.walk(&mut raw, &mut realsense).unwrap();
        assert_eq!(summary.total_pairs, 8);
        assert_eq!(summary.accepted, 8);
        assert_eq!(realsense_reads.load(Ordering::SeqCst), 8);
        assert_eq!(realsense.remaining(), 4);
    }

    #[test]
    fn test_rejections_keep_source_order_with_batches() {
        let dir = tempfile::tempdir().unwrap();
        let archiver = archiver_in(dir.path());
        let config = solid_only(4);
        let client = MockInferenceClient::default();
        let evaluator = FramePairEvaluator::new(&config, &[], &client);
        let walker = PairWalker::new(&evaluator, &archiver);

        let fills = [255, 128, 0, 128, 255, 255, 128, 0, 0, 128];
        let mut raw = source("raw", &[128; 10]);
        let mut realsense = source("realsense", &fills);

        let summary = walker.walk(&mut raw, &mut realsense).unwrap();
        let names: Vec<&str> = summary.rejections.iter().map(|r| r.frame_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "raw_frame_00000.png",
                "raw_frame_00002.png",
                "raw_frame_00004.png",
                "raw_frame_00005.png",
                "raw_frame_00007.png",
                "raw_frame_00008.png",
            ]
        );
        assert_eq!(summary.accepted, 4);
        assert_eq!(summary.label_counts.get("Uncategorized"), Some(&4));
        assert!(archiver
            .accepted_root()
            .join("Uncategorized/realsense/realsense_frame_00009.png")
            .is_file());
    }

    #[test]
    fn test_empty_sources() {
        let dir = tempfile::tempdir().unwrap();
        let archiver = archiver_in(dir.path());
        let config = solid_only(1);
        let client = MockInferenceClient::default();
        let evaluator = FramePairEvaluator::new(&config, &[], &client);
        let walker = PairWalker::new(&evaluator, &archiver);

        let mut raw = source("raw", &[]);
        let mut realsense = source("realsense", &[128; 3]);
        let summary = walker.walk(&mut raw, &mut realsense).unwrap();
        assert_eq!(summary, WalkSummary::default());
        assert_eq!(realsense.remaining(), 3);
    }

    #[test]
    fn test_scene_failures_do_not_abort() {
        let dir = tempfile::tempdir().unwrap();
        let archiver = archiver_in(dir.path());
        let mut config = PipelineConfig::sequential();
        config.stages.pattern_matching = false;
        let client = MockInferenceClient::with_pattern(|call, _, _| {
            if call % 2 == 0 {
                Err(crate::core::inference::InferenceError::Unavailable("down".to_string()))
            } else {
                Ok("False".to_string())
            }
        });
        let evaluator = FramePairEvaluator::new(&config, &[], &client);
        let walker = PairWalker::new(&evaluator, &archiver);

        let mut raw = source("raw", &[128; 4]);
        let mut realsense = source("realsense", &[128; 4]);
        let summary = walker.walk(&mut raw, &mut realsense).unwrap();
        assert_eq!(summary.total_pairs, 4);
        assert_eq!(summary.accepted, 2);
        assert_eq!(summary.rejections.len(), 2);
        assert_eq!(client.call_count(), 4);
    }
}
