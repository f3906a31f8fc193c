use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use pcg_lib::{
    aggregate_by_site,
    io::{labels::load_segment_labels, labels::SegmentLabel, load_waveform, text as text_io},
    run_batch, Analysis, BatchOptions, HeartSoundPipeline, PipelineConfig, Waveform,
};
use serde::Serialize;
use std::{
    io::{self, Read},
    path::{Path, PathBuf},
};

#[derive(Parser)]
#[command(
    name = "pcg",
    version,
    about = "Heart-sound segmentation and feature extraction"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract the feature vector of one recording (WAV, text file, or stdin)
    Features {
        #[arg(long)]
        input: Option<PathBuf>,
        /// Sample rate of text input
        #[arg(long)]
        fs: Option<u32>,
        /// Tab-separated S1/S2 labels; adds a validation report
        #[arg(long)]
        labels: Option<PathBuf>,
        #[arg(long)]
        config: Option<PathBuf>,
        /// Recording site used as key prefix (AV, MV, PV, TV)
        #[arg(long)]
        site: Option<String>,
        /// Emit the classifier subset only
        #[arg(long)]
        selected: bool,
    },
    /// Detect S1/S2 peaks and the representative cycle
    Peaks {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        fs: Option<u32>,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Compare detected peaks against labeled segments
    Validate {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        fs: Option<u32>,
        #[arg(long)]
        labels: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Extract features for many files, one JSON line each
    Batch {
        paths: Vec<PathBuf>,
        #[arg(long)]
        fs: Option<u32>,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        selected: bool,
        /// Emit per-(recording, site) medians instead of per-file lines
        #[arg(long)]
        aggregate: bool,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Features {
            input,
            fs,
            labels,
            config,
            site,
            selected,
        } => cmd_features(
            input.as_deref(),
            fs,
            labels.as_deref(),
            config.as_deref(),
            site,
            selected,
        )?,
        Commands::Peaks { input, fs, config } => {
            cmd_peaks(input.as_deref(), fs, config.as_deref())?
        }
        Commands::Validate {
            input,
            fs,
            labels,
            config,
        } => cmd_validate(input.as_deref(), fs, &labels, config.as_deref())?,
        Commands::Batch {
            paths,
            fs,
            config,
            selected,
            aggregate,
        } => cmd_batch(&paths, fs, config.as_deref(), selected, aggregate)?,
    }
    Ok(())
}

fn build_pipeline(config: Option<&Path>, site: Option<String>) -> Result<HeartSoundPipeline> {
    let mut cfg = match config {
        Some(path) => PipelineConfig::from_path(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(site) = site {
        cfg = cfg.with_site(site);
    }
    Ok(HeartSoundPipeline::new(cfg)?)
}

fn read_stdin_waveform(fs: Option<u32>) -> Result<Waveform> {
    let Some(fs) = fs else {
        bail!("--fs is required when samples are read from stdin");
    };
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(text_io::waveform_from_text(&buf, fs)?)
}

/// Run the pipeline on `--input` or stdin. Unreadable labels only skip validation.
fn run_analysis(
    pipeline: &HeartSoundPipeline,
    input: Option<&Path>,
    fs: Option<u32>,
    labels: Option<&Path>,
) -> Result<Analysis> {
    match input {
        Some(path) => Ok(pipeline.analyze_file(path, fs, labels)?),
        None => {
            let waveform = read_stdin_waveform(fs)?;
            let labels = labels.and_then(|path| match load_segment_labels(path) {
                Ok(labels) => Some(labels),
                Err(err) => {
                    log::warn!("{}: {err}; skipping validation", path.display());
                    None
                }
            });
            Ok(pipeline.analyze(&waveform, labels.as_deref())?)
        }
    }
}

fn cmd_features(
    input: Option<&Path>,
    fs: Option<u32>,
    labels: Option<&Path>,
    config: Option<&Path>,
    site: Option<String>,
    selected: bool,
) -> Result<()> {
    let pipeline = build_pipeline(config, site)?;
    let analysis = run_analysis(&pipeline, input, fs, labels)?;
    let features = if selected {
        &analysis.selected
    } else {
        &analysis.feature_vector
    };
    let js = if labels.is_some() {
        serde_json::to_string(&serde_json::json!({
            "features": features,
            "validation": analysis.validation,
        }))?
    } else {
        serde_json::to_string(features)?
    };
    println!("{}", js);
    Ok(())
}

#[derive(Serialize)]
struct PeaksOutput<'a> {
    sample_rate: u32,
    duration_s: f64,
    tempo_bpm: f64,
    outcome: pcg_lib::DetectionOutcome,
    frames: &'a [usize],
    times: &'a [f64],
    segmentation: pcg_lib::Segmentation,
}

fn cmd_peaks(input: Option<&Path>, fs: Option<u32>, config: Option<&Path>) -> Result<()> {
    let pipeline = build_pipeline(config, None)?;
    let analysis = run_analysis(&pipeline, input, fs, None)?;
    let out = PeaksOutput {
        sample_rate: analysis.sample_rate,
        duration_s: analysis.duration_s,
        tempo_bpm: analysis.detection.tempo_bpm,
        outcome: analysis.detection.outcome,
        frames: &analysis.detection.peaks.frames,
        times: &analysis.peak_times,
        segmentation: analysis.segmentation,
    };
    println!("{}", serde_json::to_string(&out)?);
    Ok(())
}

fn cmd_validate(
    input: Option<&Path>,
    fs: Option<u32>,
    labels: &Path,
    config: Option<&Path>,
) -> Result<()> {
    let pipeline = build_pipeline(config, None)?;
    let segments: Vec<SegmentLabel> = load_segment_labels(labels)
        .with_context(|| format!("reading labels {}", labels.display()))?;
    let waveform = match input {
        Some(path) => load_waveform(path, fs)?,
        None => read_stdin_waveform(fs)?,
    };
    let analysis = pipeline.analyze(&waveform, Some(&segments))?;
    match analysis.validation {
        Some(report) => println!("{}", serde_json::to_string(&report)?),
        None => bail!("nothing to validate: no peaks detected or no labeled segments"),
    }
    Ok(())
}

#[derive(Serialize)]
struct BatchFailure<'a> {
    path: Option<&'a Path>,
    stage: pcg_lib::Stage,
    error: String,
}

fn cmd_batch(
    paths: &[PathBuf],
    fs: Option<u32>,
    config: Option<&Path>,
    selected: bool,
    aggregate: bool,
) -> Result<()> {
    if paths.is_empty() {
        bail!("no input files");
    }
    let pipeline = build_pipeline(config, None)?;
    let opts = BatchOptions {
        text_sample_rate: fs,
        selected,
    };
    let results = run_batch(paths, &pipeline, &opts);
    let failures = results.iter().filter(|r| r.is_err()).count();

    if aggregate {
        let reports: Vec<_> = results.into_iter().filter_map(|r| r.ok()).collect();
        for agg in aggregate_by_site(&reports)? {
            println!("{}", serde_json::to_string(&agg)?);
        }
    } else {
        for result in &results {
            let js = match result {
                Ok(report) => serde_json::to_string(report)?,
                Err(err) => serde_json::to_string(&BatchFailure {
                    path: err.path.as_deref(),
                    stage: err.stage,
                    error: err.source.to_string(),
                })?,
            };
            println!("{}", js);
        }
    }

    if failures == paths.len() {
        bail!("all {failures} files failed");
    }
    Ok(())
}
