use crate::signal::{CardiacCycle, PeakSet};
use serde::{Deserialize, Serialize};

/// Span of the conditioned signal handed to the feature extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Segmentation {
    /// Median-length S1→S1 cycle.
    Cycle(CardiacCycle),
    /// Too few usable peaks; the whole signal stands in for a cycle.
    FullSignal,
}

impl Segmentation {
    /// `[start, end)` sample bounds for a signal of `len` samples.
    pub fn bounds(&self, len: usize) -> (usize, usize) {
        match self {
            Segmentation::Cycle(cycle) => (cycle.start.min(len), cycle.end.min(len)),
            Segmentation::FullSignal => (0, len),
        }
    }

    pub fn slice<'a>(&self, data: &'a [f64]) -> &'a [f64] {
        let (start, end) = self.bounds(data.len());
        &data[start..end]
    }

    pub fn is_full_signal(&self) -> bool {
        matches!(self, Segmentation::FullSignal)
    }
}

/// Pick the representative cycle from peaks `p[i]..p[i+2]` for even `i`.
pub fn segment_cycle(
    peaks: &PeakSet,
    hop_length: usize,
    signal_len: usize,
    min_peaks: usize,
) -> Segmentation {
    if peaks.len() < min_peaks.max(3) {
        log::debug!("{} peaks; segmenting the full signal", peaks.len());
        return Segmentation::FullSignal;
    }

    let offsets = peaks.sample_offsets(hop_length);
    let mut candidates: Vec<CardiacCycle> = offsets
        .windows(3)
        .step_by(2)
        .map(|w| CardiacCycle {
            start: w[0],
            end: w[2],
        })
        .filter(|c| c.end > c.start && c.end <= signal_len)
        .collect();

    if candidates.is_empty() {
        log::warn!("no cycle fits inside {signal_len} samples; segmenting the full signal");
        return Segmentation::FullSignal;
    }
    candidates.sort_by_key(CardiacCycle::len);
    let chosen = candidates[candidates.len() / 2];
    log::debug!(
        "representative cycle {}..{} of {} candidates",
        chosen.start,
        chosen.end,
        candidates.len()
    );
    Segmentation::Cycle(chosen)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_median_length_cycle() {
        // Cycles of 10, 6 and 8 frames.
        let peaks = PeakSet::from_frames(vec![0, 4, 10, 13, 16, 20, 24]);
        let seg = segment_cycle(&peaks, 100, 10_000, 4);
        assert_eq!(
            seg,
            Segmentation::Cycle(CardiacCycle {
                start: 1600,
                end: 2400
            })
        );
    }

    #[test]
    fn too_few_peaks_fall_back_to_full_signal() {
        let peaks = PeakSet::from_frames(vec![2, 6, 10]);
        let seg = segment_cycle(&peaks, 256, 5000, 4);
        assert!(seg.is_full_signal());
        assert_eq!(seg.bounds(5000), (0, 5000));
    }

    #[test]
    fn cycles_past_the_end_are_discarded() {
        let peaks = PeakSet::from_frames(vec![10, 20, 30, 40]);
        let seg = segment_cycle(&peaks, 256, 7000, 4);
        assert!(seg.is_full_signal());
        let seg = segment_cycle(&peaks, 256, 7680, 4);
        assert_eq!(seg.bounds(7680), (2560, 7680));
    }

    #[test]
    fn even_candidate_count_takes_upper_median() {
        // Cycles of 8 and 4 frames; sorted [4, 8], index 1.
        let peaks = PeakSet::from_frames(vec![0, 3, 8, 10, 12]);
        let seg = segment_cycle(&peaks, 10, 1000, 4);
        assert_eq!(seg.bounds(1000), (0, 80));
    }

    #[test]
    fn slice_is_within_signal() {
        let data = vec![0.0; 100];
        let seg = Segmentation::Cycle(CardiacCycle { start: 20, end: 60 });
        assert_eq!(seg.slice(&data).len(), 40);
        assert_eq!(Segmentation::FullSignal.slice(&data).len(), 100);
    }
}
