use crate::config::ValidationConfig;
use crate::io::labels::SegmentLabel;
use serde::{Deserialize, Serialize};

/// Agreement between detected peaks and annotated S1/S2 segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    #[serde(rename = "S1_Match_Rate")]
    pub s1_match_rate: f64,
    #[serde(rename = "S2_Match_Rate")]
    pub s2_match_rate: f64,
    #[serde(rename = "Total_Match_Rate")]
    pub total_match_rate: f64,
    #[serde(rename = "Total_Detected_Peaks")]
    pub total_detected_peaks: usize,
    #[serde(rename = "Total_S1_Segments")]
    pub total_s1_segments: usize,
    #[serde(rename = "Total_S2_Segments")]
    pub total_s2_segments: usize,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Count labeled S1/S2 segments with a peak inside `[start - tol, end + tol]`.
/// `None` when there is nothing to compare.
pub fn validate_peaks(
    peak_times: &[f64],
    labels: &[SegmentLabel],
    cfg: &ValidationConfig,
) -> Option<ValidationReport> {
    if peak_times.is_empty() || labels.is_empty() {
        return None;
    }
    let tol = cfg.tolerance_s;
    let matched = |label: &SegmentLabel| {
        peak_times
            .iter()
            .any(|&t| t >= label.start_s - tol && t <= label.end_s + tol)
    };
    let tally = |class: u8| {
        labels
            .iter()
            .filter(|l| l.class == class)
            .fold((0, 0), |(hit, total), l| (hit + usize::from(matched(l)), total + 1))
    };
    let (s1_hit, s1_total) = tally(cfg.s1_class);
    let (s2_hit, s2_total) = tally(cfg.s2_class);

    let report = ValidationReport {
        s1_match_rate: ratio(s1_hit, s1_total),
        s2_match_rate: ratio(s2_hit, s2_total),
        total_match_rate: ratio(s1_hit + s2_hit, s1_total + s2_total),
        total_detected_peaks: peak_times.len(),
        total_s1_segments: s1_total,
        total_s2_segments: s2_total,
    };
    log::debug!("validation {report:?}");
    Some(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(start_s: f64, end_s: f64, class: u8) -> SegmentLabel {
        SegmentLabel {
            start_s,
            end_s,
            class,
        }
    }

    #[test]
    fn counts_matches_with_tolerance() {
        let labels = vec![
            label(0.00, 0.10, 1),
            label(0.10, 0.35, 2),
            label(0.35, 0.45, 3),
            label(0.45, 1.00, 4),
            label(1.00, 1.10, 1),
            label(1.35, 1.45, 3),
        ];
        // 0.18 is within 0.1 s of the first S1; nothing near the second S2.
        let report = validate_peaks(&[0.18, 0.40, 1.05], &labels, &ValidationConfig::default())
            .unwrap();
        assert_eq!(report.total_s1_segments, 2);
        assert_eq!(report.total_s2_segments, 2);
        assert_eq!(report.total_detected_peaks, 3);
        assert_eq!(report.s1_match_rate, 1.0);
        assert_eq!(report.s2_match_rate, 0.5);
        assert_eq!(report.total_match_rate, 0.75);
    }

    #[test]
    fn empty_inputs_skip_validation() {
        let labels = vec![label(0.0, 0.1, 1)];
        let cfg = ValidationConfig::default();
        assert!(validate_peaks(&[], &labels, &cfg).is_none());
        assert!(validate_peaks(&[0.05], &[], &cfg).is_none());
    }

    #[test]
    fn no_s2_labels_gives_zero_rate() {
        let report = validate_peaks(
            &[0.05],
            &[label(0.0, 0.1, 1)],
            &ValidationConfig::default(),
        )
        .unwrap();
        assert_eq!(report.s2_match_rate, 0.0);
        assert_eq!(report.total_match_rate, 1.0);
    }

    #[test]
    fn report_uses_tabular_key_names() {
        let report = validate_peaks(&[0.05], &[label(0.0, 0.1, 1)], &ValidationConfig::default())
            .unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["S1_Match_Rate"], 1.0);
        assert_eq!(json["Total_S2_Segments"], 0);
    }
}
