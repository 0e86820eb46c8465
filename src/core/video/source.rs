use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::core::pipeline::frame::Frame;

/// 顺序帧读取器，None 表示流结束
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Option<Frame>;

    /// 用于日志的来源描述
    fn name(&self) -> &str;
}

/// 内存帧序列，测试和预解码场景使用
pub struct MemorySource {
    name: String,
    frames: VecDeque<Frame>,
    reads: Arc<AtomicUsize>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, frames: Vec<Frame>) -> Self {
        Self {
            name: name.into(),
            frames: frames.into(),
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// 共享的读取计数（包括返回 None 的那次）
    pub fn read_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.reads)
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for MemorySource {
    fn next_frame(&mut self) -> Option<Frame> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.frames.pop_front()
    }

    fn name(&self) -> &str {
        &self.name
    }
}
