use anyhow::{Context, Result};
use clap::Parser;
use log::error;
use std::path::PathBuf;
use std::process;

use frame_sorter::api::pipeline::FrameSorter;
use frame_sorter::core::pipeline::{JobLayout, JobSettings};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Frame sorter: classify synchronized raw/RealSense frame pairs",
    long_about = "Walks two aligned videos frame by frame, drops solid-color and disqualified scenes, \
                  sorts the remaining pairs by reference pattern and zips the result."
)]
struct Cli {
    /// Job identifier, used for the output directory and archive name
    #[arg(long, value_name = "ID")]
    job_id: String,

    /// Raw camera video
    #[arg(long, value_name = "PATH")]
    raw: PathBuf,

    /// RealSense video, frame-aligned with --raw
    #[arg(long, value_name = "PATH")]
    realsense: PathBuf,

    /// Reference pattern image (repeatable); label is the file stem
    #[arg(long = "pattern", value_name = "PATH")]
    patterns: Vec<PathBuf>,

    /// Optional: JSON settings file ({"pipeline": {...}, "ollama": {...}})
    #[arg(long, value_name = "JSON")]
    config: Option<PathBuf>,

    #[arg(long, value_name = "DIR", default_value = "pipeline_output")]
    output_root: PathBuf,

    #[arg(long, value_name = "DIR", default_value = "downloads")]
    downloads: PathBuf,

    /// Disable the solid-color check
    #[arg(long)]
    no_solid_color: bool,

    /// Disable the scene-content check
    #[arg(long)]
    no_scene: bool,

    /// Disable pattern matching (every accepted pair is "Uncategorized")
    #[arg(long)]
    no_pattern: bool,
}

fn run(cli: Cli) -> Result<()> {
    let mut settings = match &cli.config {
        Some(path) => JobSettings::load(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => JobSettings::default(),
    };

    let stages = &mut settings.pipeline.stages;
    stages.solid_color &= !cli.no_solid_color;
    stages.scene_content &= !cli.no_scene;
    stages.pattern_matching &= !cli.no_pattern;

    let layout = JobLayout::new(cli.output_root, cli.downloads);
    let sorter = FrameSorter::create(settings, layout)?;
    let result = sorter
        .process_video_frames(&cli.job_id, &cli.raw, &cli.realsense, &cli.patterns)
        .with_context(|| format!("job {} failed", cli.job_id))?;

    println!("{}", result.summary());
    Ok(())
}

fn main() {
    frame_sorter::init_logging();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        error!("{:#}", e);
        process::exit(1);
    }
}
