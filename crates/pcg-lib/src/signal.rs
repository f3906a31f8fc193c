use crate::error::{PcgError, Result};
use serde::{Deserialize, Serialize};

/// Mono recording at its native sampling rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waveform {
    sample_rate: u32,
    samples: Vec<f64>,
}

impl Waveform {
    /// Build a waveform from an in-memory buffer, validating the invariants.
    pub fn new(samples: Vec<f64>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(PcgError::InvalidWaveform("sample rate must be > 0".into()));
        }
        if samples.is_empty() {
            return Err(PcgError::InvalidWaveform("no samples".into()));
        }
        if let Some(idx) = samples.iter().position(|x| !x.is_finite()) {
            return Err(PcgError::InvalidWaveform(format!(
                "sample {idx} is not finite"
            )));
        }
        Ok(Self {
            sample_rate,
            samples,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }
    pub fn len(&self) -> usize {
        self.samples.len()
    }
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Band-passed, peak-normalized signal; amplitude within [-1, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionedSignal {
    pub sample_rate: u32,
    pub data: Vec<f64>,
}

impl ConditionedSignal {
    pub fn len(&self) -> usize {
        self.data.len()
    }
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Per-frame onset strength, one value per `hop_length` samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnsetCurve {
    pub sample_rate: u32,
    pub hop_length: usize,
    pub values: Vec<f64>,
}

impl OnsetCurve {
    pub fn len(&self) -> usize {
        self.values.len()
    }
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
    /// Seconds per frame.
    pub fn frame_period(&self) -> f64 {
        self.hop_length as f64 / self.sample_rate as f64
    }
}

/// Strictly increasing frame indices of detected heart sounds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeakSet {
    pub frames: Vec<usize>,
}

impl PeakSet {
    pub fn from_frames(frames: Vec<usize>) -> Self {
        debug_assert!(frames.windows(2).all(|w| w[0] < w[1]));
        Self { frames }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn times(&self, hop_length: usize, sample_rate: u32) -> Vec<f64> {
        self.frames
            .iter()
            .map(|&f| (f * hop_length) as f64 / sample_rate as f64)
            .collect()
    }

    /// Sample offset of each frame; the last frames may lie past the signal end.
    pub fn sample_offsets(&self, hop_length: usize) -> Vec<usize> {
        self.frames.iter().map(|&f| f * hop_length).collect()
    }
}

/// Sample range `[start, end)` of one S1→S2→S1 span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardiacCycle {
    pub start: usize,
    pub end: usize,
}

impl CardiacCycle {
    pub fn len(&self) -> usize {
        self.end - self.start
    }
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waveform_rejects_bad_input() {
        assert!(Waveform::new(vec![], 4000).is_err());
        assert!(Waveform::new(vec![0.0; 4], 0).is_err());
        assert!(Waveform::new(vec![0.0, f64::NAN], 4000).is_err());
        let wf = Waveform::new(vec![0.0; 8000], 4000).unwrap();
        assert!((wf.duration() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn peak_frames_convert_to_time_and_offsets() {
        let peaks = PeakSet::from_frames(vec![0, 4, 10]);
        let times = peaks.times(256, 2048);
        assert_eq!(times, vec![0.0, 0.5, 1.25]);
        assert_eq!(peaks.sample_offsets(256), vec![0, 1024, 2560]);
    }
}
