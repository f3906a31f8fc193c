use crate::error::{PcgError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Immutable configuration for one pipeline instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Recording-site label prepended to every feature key (`AV_MFCC_mean_1`).
    pub site: Option<String>,
    pub prefilter: PreFilterConfig,
    pub envelope: EnvelopeConfig,
    pub detector: PeakDetectorConfig,
    pub features: FeatureConfig,
    pub validation: ValidationConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreFilterConfig {
    pub pre_emphasis: f64,
    pub lowcut_hz: f64,
    pub highcut_hz: f64,
    /// Butterworth order applied at each band edge.
    pub order: usize,
}

impl Default for PreFilterConfig {
    fn default() -> Self {
        Self {
            pre_emphasis: 0.97,
            lowcut_hz: 20.0,
            highcut_hz: 400.0,
            order: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeConfig {
    /// Harmonic mask margin; larger values suppress more transient energy.
    pub harmonic_margin: f64,
    /// Frequency median kernel (bins) of the harmonic-percussive split.
    pub harmonic_kernel: usize,
    /// Time median span of the harmonic split (seconds); rounded to an odd
    /// frame count of at least three.
    pub harmonic_time_s: f64,
    /// Target STFT frame duration of the harmonic split (seconds).
    pub harmonic_frame_s: f64,
    pub smoothing_s: f64,
    pub hop_length: usize,
    /// Onset frame length; two hops by default.
    pub n_fft: usize,
    pub fmax_hz: f64,
    /// Dynamic range kept by the log spectrum (dB).
    pub top_db: f64,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            harmonic_margin: 8.0,
            harmonic_kernel: 31,
            harmonic_time_s: 0.1,
            harmonic_frame_s: 0.064,
            smoothing_s: 0.010,
            hop_length: 256,
            n_fft: 512,
            fmax_hz: 500.0,
            top_db: 80.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeakDetectorConfig {
    pub noise_percentile: f64,
    pub threshold_fraction: f64,
    pub min_tempo_bpm: f64,
    pub max_tempo_bpm: f64,
    pub default_tempo_bpm: f64,
    /// Tempo at which the adaptive windows equal the base windows.
    pub reference_tempo_bpm: f64,
    pub wait_tempo_factor: f64,
    pub max_window_s: f64,
    pub avg_window_s: f64,
    pub min_peaks: usize,
    pub fallback_delta: f64,
    pub fallback_wait_s: f64,
}

impl Default for PeakDetectorConfig {
    fn default() -> Self {
        Self {
            noise_percentile: 15.0,
            threshold_fraction: 0.5,
            min_tempo_bpm: 40.0,
            max_tempo_bpm: 220.0,
            default_tempo_bpm: 80.0,
            reference_tempo_bpm: 80.0,
            wait_tempo_factor: 1.5,
            max_window_s: 0.05,
            avg_window_s: 0.10,
            min_peaks: 4,
            fallback_delta: 0.07,
            fallback_wait_s: 0.25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub n_fft: usize,
    pub hop_length: usize,
    pub n_mfcc: usize,
    pub n_mels: usize,
    pub contrast_fmin_hz: f64,
    pub contrast_bands: usize,
    pub contrast_quantile: f64,
    pub zcr_frame_length: usize,
    pub zcr_hop_length: usize,
    /// Half-open `[low, high)` Hz ranges summed into band energies.
    pub energy_bands: Vec<(f64, f64)>,
    pub wavelet_levels: usize,
    /// Wavelet levels kept by the feature selector.
    pub selected_wavelet_levels: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            n_fft: 2048,
            hop_length: 256,
            n_mfcc: 13,
            n_mels: 26,
            contrast_fmin_hz: 20.0,
            contrast_bands: 3,
            contrast_quantile: 0.02,
            zcr_frame_length: 2048,
            zcr_hop_length: 512,
            energy_bands: vec![(20.0, 100.0), (100.0, 200.0), (200.0, 400.0)],
            wavelet_levels: 4,
            selected_wavelet_levels: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub tolerance_s: f64,
    pub s1_class: u8,
    pub s2_class: u8,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            tolerance_s: 0.1,
            s1_class: 1,
            s2_class: 3,
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let cfg: PipelineConfig =
            toml::from_str(text).map_err(|e| PcgError::InvalidConfig(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PcgError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn with_site(mut self, site: impl Into<String>) -> Self {
        self.site = Some(site.into());
        self
    }

    /// Reject parameter combinations no stage can run with.
    pub fn validate(&self) -> Result<()> {
        let p = &self.prefilter;
        if !(0.0..1.0).contains(&p.pre_emphasis) {
            return invalid("prefilter.pre_emphasis must be in [0, 1)");
        }
        if p.lowcut_hz <= 0.0 || p.highcut_hz <= p.lowcut_hz {
            return invalid("prefilter band must satisfy 0 < lowcut < highcut");
        }
        if p.order == 0 || p.order % 2 != 0 {
            return invalid("prefilter.order must be a positive even number");
        }

        let e = &self.envelope;
        if e.hop_length == 0 || e.n_fft < 2 || e.harmonic_kernel == 0 {
            return invalid("envelope hop, n_fft and kernel must be positive");
        }
        if e.smoothing_s < 0.0
            || e.harmonic_frame_s <= 0.0
            || e.harmonic_time_s <= 0.0
            || e.fmax_hz <= 0.0
        {
            return invalid("envelope durations and fmax must be positive");
        }

        let d = &self.detector;
        if !(0.0..=100.0).contains(&d.noise_percentile) {
            return invalid("detector.noise_percentile must be in [0, 100]");
        }
        if d.min_tempo_bpm <= 0.0 || d.max_tempo_bpm < d.min_tempo_bpm {
            return invalid("detector tempo range is empty");
        }
        if d.default_tempo_bpm <= 0.0 || d.reference_tempo_bpm <= 0.0 {
            return invalid("detector default/reference tempo must be positive");
        }
        if d.wait_tempo_factor <= 0.0 || d.max_window_s <= 0.0 || d.avg_window_s <= 0.0 {
            return invalid("detector windows must be positive");
        }

        let f = &self.features;
        if f.n_fft < 2 || f.hop_length == 0 || f.zcr_frame_length == 0 || f.zcr_hop_length == 0
        {
            return invalid("feature frame sizes must be positive");
        }
        if f.n_mfcc == 0 || f.n_mels < f.n_mfcc {
            return invalid("features.n_mels must be >= n_mfcc > 0");
        }
        if f.contrast_fmin_hz <= 0.0 || f.contrast_bands == 0 {
            return invalid("spectral contrast needs fmin > 0 and at least one band");
        }
        if !(0.0..0.5).contains(&f.contrast_quantile) {
            return invalid("features.contrast_quantile must be in [0, 0.5)");
        }
        if f.energy_bands.iter().any(|(lo, hi)| *lo < 0.0 || hi <= lo) {
            return invalid("energy bands must satisfy 0 <= low < high");
        }
        if f.wavelet_levels == 0 || f.selected_wavelet_levels > f.wavelet_levels {
            return invalid("wavelet levels must be positive and cover the selected levels");
        }

        if self.validation.tolerance_s < 0.0 {
            return invalid("validation.tolerance_s must be non-negative");
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> Result<()> {
    Err(PcgError::InvalidConfig(msg.to_string()))
}
