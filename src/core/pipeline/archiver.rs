use log::{debug, info};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Component, Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::error::PipelineError;
use super::frame::{FramePair, Stream};

pub const REJECTION_LOG_HEADER: &str = "Log of frames removed or not fitting criteria:";

/// 被拒绝的帧及原因，按处理顺序记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub frame_name: String,
    pub reason: String,
}

/// 把通过的帧对按分类写入磁盘，结束时输出拒绝日志并打包
pub struct OutputArchiver {
    accepted_root: PathBuf,
    log_path: PathBuf,
    archive_dir: PathBuf,
}

impl OutputArchiver {
    pub fn new(accepted_root: impl Into<PathBuf>, log_path: impl Into<PathBuf>, archive_dir: impl Into<PathBuf>) -> Self {
        Self {
            accepted_root: accepted_root.into(),
            log_path: log_path.into(),
            archive_dir: archive_dir.into(),
        }
    }

    pub fn accepted_root(&self) -> &Path {
        &self.accepted_root
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn archive_path(&self, archive_id: &str) -> PathBuf {
        self.archive_dir.join(format!("Results_{}.zip", archive_id))
    }

    /// 清空上一次同名任务留下的输出
    pub fn prepare(&self) -> Result<(), PipelineError> {
        if self.accepted_root.exists() {
            debug!("🧹 Clearing previous output at {:?}", self.accepted_root);
            fs::remove_dir_all(&self.accepted_root)?;
        }
        fs::create_dir_all(&self.accepted_root)?;
        Ok(())
    }

    /// `<root>/<label>/{raw,realsense}/<stream>_frame_<index>.png`
    pub fn persist(&self, label: &str, pair: &FramePair) -> Result<(), PipelineError> {
        let label_dir = self.label_dir(label)?;
        for (stream, image) in [(Stream::Raw, &pair.raw), (Stream::Realsense, &pair.realsense)] {
            let dir = label_dir.join(stream.dir_name());
            fs::create_dir_all(&dir)?;
            image.save(dir.join(stream.frame_file_name(pair.index)))?;
        }
        Ok(())
    }

    /// 分类名必须是单个普通路径分量，写入位置不能离开通过目录
    fn label_dir(&self, label: &str) -> Result<PathBuf, PipelineError> {
        let mut components = Path::new(label).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) if name == label && !label.contains('\\') => {
                Ok(self.accepted_root.join(label))
            }
            _ => Err(PipelineError::InvalidConfig(format!(
                "label {:?} cannot be used as an output directory",
                label
            ))),
        }
    }

    pub fn write_rejection_log(&self, rejections: &[Rejection]) -> Result<(), PipelineError> {
        if let Some(parent) = self.log_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(&self.log_path)?);
        writeln!(writer, "{}", REJECTION_LOG_HEADER)?;
        for rejection in rejections {
            writeln!(
                writer,
                "Frame/Image name: {}, Reason: {}",
                rejection.frame_name, rejection.reason
            )?;
        }
        writer.flush()?;
        Ok(())
    }

    /// 写拒绝日志；通过的目录下至少有一个文件时才生成压缩包。
    /// 没有任何通过的帧时返回 `Ok(None)`。
    pub fn finalize(&self, rejections: &[Rejection], archive_id: &str) -> Result<Option<PathBuf>, PipelineError> {
        self.write_rejection_log(rejections)?;
        info!("📝 Rejection log written: {:?} ({} entries)", self.log_path, rejections.len());

        let archive_path = self.archive_path(archive_id);
        let files = collect_files(&self.accepted_root)?;
        if files.is_empty() {
            if archive_path.exists() {
                fs::remove_file(&archive_path)?;
            }
            info!("📭 No accepted frames, archive not created");
            return Ok(None);
        }

        fs::create_dir_all(&self.archive_dir)?;
        let mut zip = ZipWriter::new(File::create(&archive_path)?);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for file in &files {
            zip.start_file(entry_name(&self.accepted_root, file), options)?;
            io::copy(&mut File::open(file)?, &mut zip)?;
        }
        zip.finish()?;

        info!("📦 Archive created: {:?} ({} files)", archive_path, files.len());
        Ok(Some(archive_path))
    }
}

/// 递归列出目录下所有普通文件，按路径排序
fn collect_files(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if !root.is_dir() {
        return Ok(files);
    }
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.is_file() {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

fn entry_name(root: &Path, file: &Path) -> String {
    file.strip_prefix(root)
        .unwrap_or(file)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
