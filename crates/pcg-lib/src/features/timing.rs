use serde::{Deserialize, Serialize};

/// Heart rate and systole/diastole durations from consecutive peak times.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingFeatures {
    pub heart_rate_bpm: f64,
    pub systole_mean_s: f64,
    pub systole_std_s: f64,
    pub diastole_mean_s: f64,
    pub diastole_std_s: f64,
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    (values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64).sqrt()
}

/// Even-indexed intervals are systoles, odd-indexed are diastoles.
pub fn timing_features(peak_times: &[f64]) -> TimingFeatures {
    if peak_times.len() < 2 {
        return TimingFeatures::default();
    }
    let intervals: Vec<f64> = peak_times.windows(2).map(|w| w[1] - w[0]).collect();
    let systole: Vec<f64> = intervals.iter().step_by(2).copied().collect();
    let diastole: Vec<f64> = intervals.iter().skip(1).step_by(2).copied().collect();

    let cycles: Vec<f64> = systole.iter().zip(&diastole).map(|(s, d)| s + d).collect();
    let heart_rate_bpm = if !cycles.is_empty() {
        rate_from_period(mean(&cycles))
    } else {
        // A lone interval is taken as half a cycle.
        rate_from_period(2.0 * mean(&intervals))
    };

    TimingFeatures {
        heart_rate_bpm,
        systole_mean_s: mean(&systole),
        systole_std_s: population_std(&systole),
        diastole_mean_s: mean(&diastole),
        diastole_std_s: population_std(&diastole),
    }
}

fn rate_from_period(period_s: f64) -> f64 {
    if period_s > 0.0 {
        60.0 / period_s
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} vs {b}");
    }

    #[test]
    fn alternating_intervals_split_into_phases() {
        let t = timing_features(&[0.0, 0.3, 1.0, 1.3, 2.0]);
        assert_close(t.systole_mean_s, 0.3);
        assert_close(t.diastole_mean_s, 0.7);
        assert_close(t.systole_std_s, 0.0);
        assert_close(t.heart_rate_bpm, 60.0);
    }

    #[test]
    fn single_interval_uses_half_cycle_rule() {
        let t = timing_features(&[0.5, 1.0]);
        assert_close(t.heart_rate_bpm, 60.0);
        assert_close(t.systole_mean_s, 0.5);
        assert_close(t.diastole_mean_s, 0.0);
    }

    #[test]
    fn fewer_than_two_peaks_is_neutral() {
        assert_eq!(timing_features(&[]), TimingFeatures::default());
        assert_eq!(timing_features(&[1.2]), TimingFeatures::default());
    }

    #[test]
    fn std_is_population() {
        let t = timing_features(&[0.0, 0.2, 1.0, 1.4, 2.0]);
        // Systoles 0.2 and 0.4.
        assert_close(t.systole_std_s, 0.1);
    }
}
