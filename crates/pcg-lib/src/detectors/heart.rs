use crate::config::PeakDetectorConfig;
use crate::signal::{OnsetCurve, PeakSet};
use serde::{Deserialize, Serialize};

/// Lag range and prior of the autocorrelation tempo search.
const TEMPO_SEARCH_MIN_BPM: f64 = 30.0;
const TEMPO_SEARCH_MAX_BPM: f64 = 300.0;
const TEMPO_PRIOR_BPM: f64 = 120.0;
const TEMPO_PRIOR_OCTAVES: f64 = 1.0;

/// Which picker produced the final peak set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionOutcome {
    /// Tempo-scaled windows found enough peaks.
    Adaptive,
    /// Fixed windows were needed.
    Fallback,
    /// Neither picker found enough peaks; segmentation uses the whole signal.
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakDetection {
    pub peaks: PeakSet,
    pub tempo_bpm: f64,
    pub outcome: DetectionOutcome,
}

/// Window sizes in frames plus the height margin of the peak picker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakPickParams {
    pub pre_max: usize,
    pub post_max: usize,
    pub pre_avg: usize,
    pub post_avg: usize,
    pub delta: f64,
    pub wait: usize,
}

impl PeakPickParams {
    /// Windows scaled by `reference / tempo`, threshold from the curve's range.
    pub fn adaptive(curve: &OnsetCurve, tempo_bpm: f64, cfg: &PeakDetectorConfig) -> Self {
        let frame_s = curve.frame_period();
        let floor = percentile(&curve.values, cfg.noise_percentile);
        let max = curve.values.iter().copied().fold(0.0_f64, f64::max);
        let threshold = floor + cfg.threshold_fraction * (max - floor);
        let scale = cfg.reference_tempo_bpm / tempo_bpm;
        let max_w = window_frames(cfg.max_window_s * scale, frame_s);
        let avg_w = window_frames(cfg.avg_window_s * scale, frame_s);
        Self {
            pre_max: max_w,
            post_max: max_w,
            pre_avg: avg_w,
            post_avg: avg_w,
            delta: threshold,
            wait: wait_frames(60.0 / (tempo_bpm * cfg.wait_tempo_factor), frame_s),
        }
    }

    /// Tempo-independent windows used when the adaptive pass comes up short.
    pub fn fallback(curve: &OnsetCurve, cfg: &PeakDetectorConfig) -> Self {
        let frame_s = curve.frame_period();
        let max_w = window_frames(cfg.max_window_s, frame_s);
        let avg_w = window_frames(cfg.avg_window_s, frame_s);
        Self {
            pre_max: max_w,
            post_max: max_w,
            pre_avg: avg_w,
            post_avg: avg_w,
            delta: cfg.fallback_delta,
            wait: wait_frames(cfg.fallback_wait_s, frame_s),
        }
    }
}

fn window_frames(seconds: f64, frame_s: f64) -> usize {
    ((seconds / frame_s).round() as usize).max(1)
}

fn wait_frames(seconds: f64, frame_s: f64) -> usize {
    ((seconds / frame_s).floor() as usize).max(1)
}

/// Detect S1/S2 candidates with the default detector settings.
pub fn detect_heart_sounds(curve: &OnsetCurve) -> PeakDetection {
    detect_heart_sounds_with_config(curve, &PeakDetectorConfig::default())
}

/// Adaptive pass first, fixed-window pass second, degrade when both come up short.
pub fn detect_heart_sounds_with_config(
    curve: &OnsetCurve,
    cfg: &PeakDetectorConfig,
) -> PeakDetection {
    let tempo_bpm = estimate_tempo(curve, cfg);
    let adaptive = PeakPickParams::adaptive(curve, tempo_bpm, cfg);
    log::debug!("tempo {tempo_bpm:.1} bpm, adaptive params {adaptive:?}");
    let peaks = peak_pick(&curve.values, &adaptive);
    if peaks.len() >= cfg.min_peaks {
        return PeakDetection {
            peaks: PeakSet::from_frames(peaks),
            tempo_bpm,
            outcome: DetectionOutcome::Adaptive,
        };
    }

    log::warn!(
        "adaptive picking found {} peaks (< {}); retrying with fixed windows",
        peaks.len(),
        cfg.min_peaks
    );
    let fallback = peak_pick(&curve.values, &PeakPickParams::fallback(curve, cfg));
    if fallback.len() >= cfg.min_peaks {
        return PeakDetection {
            peaks: PeakSet::from_frames(fallback),
            tempo_bpm,
            outcome: DetectionOutcome::Fallback,
        };
    }

    log::warn!(
        "insufficient peaks after fallback ({} adaptive, {} fixed); using the full signal",
        peaks.len(),
        fallback.len()
    );
    let best = if peaks.len() > fallback.len() {
        peaks
    } else {
        fallback
    };
    PeakDetection {
        peaks: PeakSet::from_frames(best),
        tempo_bpm,
        outcome: DetectionOutcome::Degraded,
    }
}

/// Dominant periodicity of the onset curve in BPM, clamped to the configured range.
///
/// Autocorrelation lags covering 30–300 BPM are weighted by a log-normal prior
/// around 120 BPM. A curve without periodic energy yields the default tempo.
pub fn estimate_tempo(curve: &OnsetCurve, cfg: &PeakDetectorConfig) -> f64 {
    let raw = autocorrelation_tempo(&curve.values, curve.frame_period());
    let tempo = if raw > 0.0 {
        raw
    } else {
        log::debug!("no periodicity in onset curve; assuming {} bpm", cfg.default_tempo_bpm);
        cfg.default_tempo_bpm
    };
    tempo.clamp(cfg.min_tempo_bpm, cfg.max_tempo_bpm)
}

fn autocorrelation_tempo(values: &[f64], frame_s: f64) -> f64 {
    let n = values.len();
    if n < 3 || frame_s <= 0.0 {
        return 0.0;
    }
    let min_lag = ((60.0 / (TEMPO_SEARCH_MAX_BPM * frame_s)).floor() as usize).max(1);
    let max_lag = ((60.0 / (TEMPO_SEARCH_MIN_BPM * frame_s)).ceil() as usize).min(n - 1);
    let mut best = (0.0, 0.0);
    for lag in min_lag..=max_lag {
        let ac: f64 = values[..n - lag]
            .iter()
            .zip(&values[lag..])
            .map(|(a, b)| a * b)
            .sum::<f64>()
            / n as f64;
        let bpm = 60.0 / (lag as f64 * frame_s);
        let octaves = (bpm / TEMPO_PRIOR_BPM).log2() / TEMPO_PRIOR_OCTAVES;
        let score = ac * (-0.5 * octaves * octaves).exp();
        if score > best.0 {
            best = (score, bpm);
        }
    }
    best.1
}

/// Percentile with linear interpolation between order statistics; 0 for empty input.
pub fn percentile(data: &[f64], q: f64) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let mut sorted = data.to_vec();
    sorted.sort_by(f64::total_cmp);
    let rank = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Pick frames that are local maxima, exceed the local mean by `delta`,
/// are positive, and lie at least `wait` frames after the previous pick.
pub fn peak_pick(values: &[f64], params: &PeakPickParams) -> Vec<usize> {
    let n = values.len();
    let mut peaks = Vec::new();
    let mut last: Option<usize> = None;
    for (i, &x) in values.iter().enumerate() {
        if x <= 0.0 {
            continue;
        }
        let lo = i.saturating_sub(params.pre_max);
        let hi = (i + params.post_max).min(n - 1);
        let local_max = values[lo..=hi].iter().copied().fold(f64::MIN, f64::max);
        if x < local_max {
            continue;
        }
        let lo = i.saturating_sub(params.pre_avg);
        let hi = (i + params.post_avg).min(n - 1);
        let window = &values[lo..=hi];
        let mean = window.iter().sum::<f64>() / window.len() as f64;
        if x < mean + params.delta {
            continue;
        }
        if matches!(last, Some(prev) if i - prev < params.wait) {
            continue;
        }
        peaks.push(i);
        last = Some(i);
    }
    peaks
}
