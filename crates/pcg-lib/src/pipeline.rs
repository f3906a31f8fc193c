use crate::config::PipelineConfig;
use crate::detectors::{detect_heart_sounds_with_config, DetectionOutcome, PeakDetection};
use crate::envelope::onset_curve;
use crate::error::{PcgError, PipelineError, Stage, StageExt};
use crate::features::{extract_features, select_features, CardiacFeatures, FeatureVector};
use crate::filters::condition;
use crate::io::{labels::load_segment_labels, labels::SegmentLabel, load_waveform};
use crate::segment::{segment_cycle, Segmentation};
use crate::signal::{ConditionedSignal, OnsetCurve, Waveform};
use crate::validation::{validate_peaks, ValidationReport};
use serde::Serialize;
use std::path::Path;

type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// Every intermediate product of one run, for inspection.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub sample_rate: u32,
    pub duration_s: f64,
    #[serde(skip)]
    pub conditioned: ConditionedSignal,
    #[serde(skip)]
    pub onset: OnsetCurve,
    pub detection: PeakDetection,
    pub peak_times: Vec<f64>,
    pub segmentation: Segmentation,
    pub features: CardiacFeatures,
    pub feature_vector: FeatureVector,
    pub selected: FeatureVector,
    pub validation: Option<ValidationReport>,
}

/// Heart-sound analysis with a fixed configuration.
///
/// Holds no state besides the configuration, so one instance can be shared
/// across threads and reused for any number of recordings.
#[derive(Debug, Clone, Default)]
pub struct HeartSoundPipeline {
    config: PipelineConfig,
}

impl HeartSoundPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, PcgError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Same settings, keys prefixed with `site`.
    pub fn with_site(&self, site: &str) -> Self {
        Self {
            config: self.config.clone().with_site(site),
        }
    }

    /// Full feature vector of a recording.
    pub fn extract_features(&self, waveform: &Waveform) -> PipelineResult<FeatureVector> {
        self.analyze(waveform, None).map(|a| a.feature_vector)
    }

    /// Classifier subset of the feature vector.
    pub fn extract_selected(&self, waveform: &Waveform) -> PipelineResult<FeatureVector> {
        self.analyze(waveform, None).map(|a| a.selected)
    }

    /// Run every stage and keep the intermediates. Validation runs only when
    /// `labels` is given.
    pub fn analyze(
        &self,
        waveform: &Waveform,
        labels: Option<&[SegmentLabel]>,
    ) -> PipelineResult<Analysis> {
        let cfg = &self.config;
        let sample_rate = waveform.sample_rate();
        log::debug!("analyzing {} samples at {sample_rate} Hz", waveform.len());

        let conditioned = condition(waveform, &cfg.prefilter).stage(Stage::PreFilter)?;
        let onset = onset_curve(&conditioned, &cfg.envelope).stage(Stage::Envelope)?;
        let detection = detect_heart_sounds_with_config(&onset, &cfg.detector);
        let peak_times = detection.peaks.times(onset.hop_length, sample_rate);

        let segmentation = match detection.outcome {
            DetectionOutcome::Degraded => Segmentation::FullSignal,
            _ => segment_cycle(
                &detection.peaks,
                onset.hop_length,
                conditioned.len(),
                cfg.detector.min_peaks,
            ),
        };
        let segment = segmentation.slice(&conditioned.data);

        let site = cfg.site.as_deref();
        let features = extract_features(segment, sample_rate, &peak_times, &cfg.features)
            .stage(Stage::Features)?;
        let feature_vector = features
            .to_vector(&cfg.features, site)
            .stage(Stage::Features)?;
        let selected =
            select_features(&feature_vector, &cfg.features, site).stage(Stage::Features)?;

        let validation = labels.and_then(|labels| {
            let report = validate_peaks(&peak_times, labels, &cfg.validation);
            if report.is_none() {
                log::warn!("validation skipped: no detected peaks or no labeled segments");
            }
            report
        });

        Ok(Analysis {
            sample_rate,
            duration_s: waveform.duration(),
            conditioned,
            onset,
            detection,
            peak_times,
            segmentation,
            features,
            feature_vector,
            selected,
            validation,
        })
    }

    /// Load and analyze one file. Text inputs use `text_sample_rate`. A label
    /// file that cannot be read only disables validation.
    pub fn analyze_file(
        &self,
        path: &Path,
        text_sample_rate: Option<u32>,
        labels_path: Option<&Path>,
    ) -> PipelineResult<Analysis> {
        let waveform = load_waveform(path, text_sample_rate)
            .stage(Stage::Load)
            .map_err(|e| e.with_path(path))?;

        let labels = labels_path.and_then(|lp| match load_segment_labels(lp) {
            Ok(labels) => Some(labels),
            Err(err) => {
                let err = PipelineError::new(Stage::Labels, err).with_path(lp);
                log::warn!("{err}; skipping validation");
                None
            }
        });

        self.analyze(&waveform, labels.as_deref())
            .map_err(|e| e.with_path(path))
    }
}
