use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised by individual pipeline stages.
#[derive(Debug, Error)]
pub enum PcgError {
    #[error("file not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("failed to decode {}: {reason}", path.display())]
    Decode { path: PathBuf, reason: String },
    #[error("filter produced non-finite samples during {step}")]
    FilterInstability { step: &'static str },
    #[error("malformed segmentation labels (line {line}): {reason}")]
    LabelFormat { line: usize, reason: String },
    #[error("invalid waveform: {0}")]
    InvalidWaveform(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("spectral transform failed: {0}")]
    Spectral(String),
    #[error("feature vector does not match its schema: {0}")]
    Schema(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = PcgError> = std::result::Result<T, E>;

/// Pipeline stage that produced a terminal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Load,
    PreFilter,
    Envelope,
    PeakDetection,
    Segmentation,
    Features,
    Labels,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Load => "load",
            Stage::PreFilter => "pre-filter",
            Stage::Envelope => "envelope",
            Stage::PeakDetection => "peak detection",
            Stage::Segmentation => "segmentation",
            Stage::Features => "feature extraction",
            Stage::Labels => "label parsing",
        };
        f.write_str(name)
    }
}

/// Terminal error for one recording: which file, which stage, and why.
#[derive(Debug, Error)]
#[error("{stage} failed for {}: {source}", display_path(.path))]
pub struct PipelineError {
    pub path: Option<PathBuf>,
    pub stage: Stage,
    #[source]
    pub source: PcgError,
}

impl PipelineError {
    pub fn new(stage: Stage, source: PcgError) -> Self {
        Self {
            path: None,
            stage,
            source,
        }
    }

    pub fn with_path(mut self, path: &Path) -> Self {
        self.path = Some(path.to_path_buf());
        self
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.source, PcgError::NotFound { .. })
    }
}

fn display_path(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<memory>".into())
}

/// Attach a stage to a stage-local result.
pub(crate) trait StageExt<T> {
    fn stage(self, stage: Stage) -> std::result::Result<T, PipelineError>;
}

impl<T> StageExt<T> for Result<T> {
    fn stage(self, stage: Stage) -> std::result::Result<T, PipelineError> {
        self.map_err(|err| PipelineError::new(stage, err))
    }
}
