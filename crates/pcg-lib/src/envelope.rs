use crate::config::EnvelopeConfig;
use crate::error::Result;
use crate::filters::centered_moving_average;
use crate::signal::{ConditionedSignal, OnsetCurve};
use crate::spectrum::{istft, power_to_db, stft, stft_frames, Stft};

const MASK_EPS: f64 = 1e-10;

/// Harmonic emphasis, rectification and smoothing followed by onset strength.
pub fn onset_curve(signal: &ConditionedSignal, cfg: &EnvelopeConfig) -> Result<OnsetCurve> {
    let envelope = smoothed_envelope(signal, cfg)?;
    onset_strength(&envelope, signal.sample_rate, cfg)
}

/// Rectified harmonic component smoothed by a centered moving average.
pub fn smoothed_envelope(signal: &ConditionedSignal, cfg: &EnvelopeConfig) -> Result<Vec<f64>> {
    let fs = signal.sample_rate as f64;
    let harmonic = harmonic_component(&signal.data, signal.sample_rate, cfg)?;
    let rectified: Vec<f64> = harmonic.iter().map(|x| x.abs()).collect();
    let mut width = (cfg.smoothing_s * fs).ceil().max(1.0) as usize;
    if width % 2 == 0 {
        width += 1;
    }
    log::debug!("envelope smoothing width {width} samples");
    Ok(centered_moving_average(&rectified, width))
}

/// Frame length of the harmonic split: the smallest power of two covering `frame_s`.
pub fn harmonic_frame_len(sample_rate: u32, frame_s: f64) -> usize {
    let target = (frame_s * sample_rate as f64).ceil().max(1.0) as usize;
    target.next_power_of_two().max(64)
}

/// Odd number of STFT frames spanning `span_s`, never fewer than three.
pub fn harmonic_time_kernel(sample_rate: u32, hop: usize, span_s: f64) -> usize {
    let frames = (span_s * sample_rate as f64 / hop as f64).round().max(3.0) as usize;
    frames | 1
}

/// Median-filter harmonic/percussive split keeping the soft-masked harmonic part.
pub fn harmonic_component(
    data: &[f64],
    sample_rate: u32,
    cfg: &EnvelopeConfig,
) -> Result<Vec<f64>> {
    let n_fft = harmonic_frame_len(sample_rate, cfg.harmonic_frame_s);
    let hop = n_fft / 4;
    let time_kernel = harmonic_time_kernel(sample_rate, hop, cfg.harmonic_time_s);
    let spec = stft(data, n_fft, hop)?;
    let magnitude: Vec<Vec<f64>> = spec
        .frames
        .iter()
        .map(|f| f.iter().map(|c| c.norm()).collect())
        .collect();

    let harmonic = median_along_time(&magnitude, time_kernel);
    let percussive = median_along_frequency(&magnitude, cfg.harmonic_kernel);

    let margin = cfg.harmonic_margin;
    let frames = spec
        .frames
        .iter()
        .zip(harmonic.iter().zip(&percussive))
        .map(|(frame, (h_row, p_row))| {
            frame
                .iter()
                .zip(h_row.iter().zip(p_row))
                .map(|(c, (&h, &p))| {
                    let h2 = h * h;
                    let p2 = (margin * p) * (margin * p);
                    *c * (h2 / (h2 + p2 + MASK_EPS))
                })
                .collect()
        })
        .collect();
    let masked = Stft {
        n_fft,
        hop,
        frames,
    };
    istft(&masked, data.len())
}

/// Onset strength of an envelope: mean positive log-power difference below `fmax_hz`,
/// one value per hop, peak-normalized to [0, 1].
pub fn onset_strength(
    envelope: &[f64],
    sample_rate: u32,
    cfg: &EnvelopeConfig,
) -> Result<OnsetCurve> {
    let hop = cfg.hop_length;
    let n_frames = envelope.len().div_ceil(hop);
    let spec = stft_frames(envelope, cfg.n_fft, hop, n_frames)?;
    let power: Vec<Vec<f64>> = spec
        .frames
        .iter()
        .map(|f| f.iter().map(|c| c.norm_sqr()).collect())
        .collect();
    let db = power_to_db(&power, cfg.top_db);

    let bin_hz = sample_rate as f64 / cfg.n_fft as f64;
    let n_bins = (cfg.n_fft / 2 + 1).min(((cfg.fmax_hz / bin_hz).ceil() as usize).max(1));

    let mut values = vec![0.0; n_frames];
    for i in 1..n_frames {
        let flux: f64 = db[i][..n_bins]
            .iter()
            .zip(&db[i - 1][..n_bins])
            .map(|(cur, prev)| (cur - prev).max(0.0))
            .sum();
        values[i] = flux / n_bins as f64;
    }

    let peak = values.iter().copied().fold(0.0_f64, f64::max);
    if peak > 0.0 {
        values.iter_mut().for_each(|v| *v /= peak);
    }
    Ok(OnsetCurve {
        sample_rate,
        hop_length: hop,
        values,
    })
}

/// Reflect an out-of-range index back into `0..len`.
fn reflect(idx: isize, len: usize) -> usize {
    if len <= 1 {
        return 0;
    }
    let period = 2 * (len as isize - 1);
    let mut i = idx.rem_euclid(period);
    if i >= len as isize {
        i = period - i;
    }
    i as usize
}

fn median_filter(values: &[f64], kernel: usize, scratch: &mut Vec<f64>) -> Vec<f64> {
    let len = values.len();
    if kernel <= 1 || len == 0 {
        return values.to_vec();
    }
    let half = (kernel / 2) as isize;
    (0..len)
        .map(|i| {
            scratch.clear();
            for offset in -half..=half {
                scratch.push(values[reflect(i as isize + offset, len)]);
            }
            let mid = scratch.len() / 2;
            let (_, median, _) = scratch.select_nth_unstable_by(mid, f64::total_cmp);
            *median
        })
        .collect()
}

/// Median over frames for each bin; keeps stationary (harmonic) energy.
fn median_along_time(magnitude: &[Vec<f64>], kernel: usize) -> Vec<Vec<f64>> {
    let n_frames = magnitude.len();
    let n_bins = magnitude.first().map_or(0, Vec::len);
    let mut out = vec![vec![0.0; n_bins]; n_frames];
    let mut scratch = Vec::with_capacity(kernel);
    let mut column = vec![0.0; n_frames];
    for bin in 0..n_bins {
        for (t, frame) in magnitude.iter().enumerate() {
            column[t] = frame[bin];
        }
        for (t, v) in median_filter(&column, kernel, &mut scratch)
            .into_iter()
            .enumerate()
        {
            out[t][bin] = v;
        }
    }
    out
}

/// Median over bins for each frame; keeps broadband (percussive) energy.
fn median_along_frequency(magnitude: &[Vec<f64>], kernel: usize) -> Vec<Vec<f64>> {
    let mut scratch = Vec::with_capacity(kernel);
    magnitude
        .iter()
        .map(|frame| median_filter(frame, kernel, &mut scratch))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn reflect_mirrors_without_repeating_edges() {
        assert_eq!(reflect(-1, 5), 1);
        assert_eq!(reflect(-2, 5), 2);
        assert_eq!(reflect(5, 5), 3);
        assert_eq!(reflect(9, 5), 1);
        assert_eq!(reflect(3, 1), 0);
    }

    #[test]
    fn median_filter_removes_isolated_spike() {
        let mut scratch = Vec::new();
        let filtered = median_filter(&[1.0, 1.0, 9.0, 1.0, 1.0], 3, &mut scratch);
        assert_eq!(filtered, vec![1.0, 1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn harmonic_frame_is_power_of_two() {
        assert_eq!(harmonic_frame_len(2000, 0.064), 128);
        assert_eq!(harmonic_frame_len(4000, 0.064), 256);
        assert_eq!(harmonic_frame_len(100, 0.064), 64);
    }

    #[test]
    fn steady_tone_survives_harmonic_emphasis() {
        let fs = 2000u32;
        let tone: Vec<f64> = (0..4000)
            .map(|i| (2.0 * PI * 150.0 * i as f64 / fs as f64).sin())
            .collect();
        let harmonic = harmonic_component(&tone, fs, &EnvelopeConfig::default()).unwrap();
        let energy = |d: &[f64]| d[500..3500].iter().map(|x| x * x).sum::<f64>();
        let ratio = energy(&harmonic) / energy(&tone);
        assert!(ratio > 0.8, "harmonic kept {ratio}");
    }

    #[test]
    fn time_kernel_is_odd_and_tracks_seconds() {
        assert_eq!(harmonic_time_kernel(2000, 32, 0.1), 7);
        assert_eq!(harmonic_time_kernel(4000, 64, 0.1), 7);
        assert_eq!(harmonic_time_kernel(2000, 32, 0.13), 9);
        assert_eq!(harmonic_time_kernel(2000, 32, 0.001), 3);
    }

    #[test]
    fn short_tonal_pulses_survive_harmonic_emphasis() {
        let fs = 2000u32;
        for (len, floor) in [(200usize, 0.5), (120, 0.25)] {
            let mut pulse = vec![0.0; 4000];
            for j in 0..len {
                let idx = 1000 + j;
                let t = idx as f64 / fs as f64;
                let w = 0.5 - 0.5 * (2.0 * PI * j as f64 / (len - 1) as f64).cos();
                pulse[idx] = w * ((2.0 * PI * 20.0 * t).sin() + (2.0 * PI * 150.0 * t).sin());
            }
            let harmonic = harmonic_component(&pulse, fs, &EnvelopeConfig::default()).unwrap();
            let energy = |d: &[f64]| d.iter().map(|x| x * x).sum::<f64>();
            let ratio = energy(&harmonic) / energy(&pulse);
            assert!(ratio > floor, "{len}-sample pulse kept {ratio}");
        }
    }

    #[test]
    fn onset_curve_has_one_value_per_hop() {
        let cfg = EnvelopeConfig::default();
        let env = vec![0.0; 1000];
        let curve = onset_strength(&env, 2000, &cfg).unwrap();
        assert_eq!(curve.len(), 1000usize.div_ceil(256));
        assert!(curve.values.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn onset_rises_when_envelope_steps_up() {
        let cfg = EnvelopeConfig::default();
        let mut env = vec![0.01; 8000];
        for v in env.iter_mut().skip(4000).take(400) {
            *v = 1.0;
        }
        let curve = onset_strength(&env, 2000, &cfg).unwrap();
        let (argmax, max) = curve
            .values
            .iter()
            .enumerate()
            .fold((0, 0.0), |acc, (i, &v)| if v > acc.1 { (i, v) } else { acc });
        assert_eq!(max, 1.0);
        let onset_frame = 4000 / 256;
        assert!(
            argmax + 2 >= onset_frame && argmax <= onset_frame + 1,
            "onset at frame {argmax}"
        );
        assert!(curve.values.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn silent_signal_gives_flat_curve() {
        let signal = ConditionedSignal {
            sample_rate: 4000,
            data: vec![0.0; 4000],
        };
        let curve = onset_curve(&signal, &EnvelopeConfig::default()).unwrap();
        assert!(curve.values.iter().all(|&v| v == 0.0));
    }
}
