use crate::spectrum::Spectrogram;

const POWER_FLOOR: f64 = 1e-10;

/// Octave-band peak/valley contrast in dB, averaged over frames.
///
/// Band 0 covers `[0, fmin)`, band k covers `[fmin·2^(k-1), fmin·2^k)`, and the
/// last band runs to Nyquist. Edges are clamped to `sample_rate / 2`.
pub fn spectral_contrast(spec: &Spectrogram, fmin: f64, n_bands: usize, quantile: f64) -> Vec<f64> {
    let nyquist = spec.sample_rate as f64 / 2.0;
    let freqs = spec.frequencies();
    let mut edges = Vec::with_capacity(n_bands + 2);
    edges.push(0.0);
    for k in 0..=n_bands {
        edges.push((fmin * 2f64.powi(k as i32)).min(nyquist));
    }

    (0..=n_bands)
        .map(|band| {
            let (lo, hi) = (edges[band], edges[band + 1]);
            let last = band == n_bands;
            let bins: Vec<usize> = freqs
                .iter()
                .enumerate()
                .filter(|&(_, &f)| f >= lo && (last || f < hi))
                .map(|(k, _)| k)
                .collect();
            if bins.is_empty() || spec.frames.is_empty() {
                return 0.0;
            }
            let n_q = ((quantile * bins.len() as f64).round() as usize).max(1);
            let mut values = Vec::with_capacity(bins.len());
            let total: f64 = spec
                .frames
                .iter()
                .map(|frame| {
                    values.clear();
                    values.extend(bins.iter().map(|&k| frame[k]));
                    values.sort_by(f64::total_cmp);
                    let valley = values[..n_q].iter().sum::<f64>() / n_q as f64;
                    let peak = values[values.len() - n_q..].iter().sum::<f64>() / n_q as f64;
                    to_db(peak) - to_db(valley)
                })
                .sum();
            total / spec.frames.len() as f64
        })
        .collect()
}

fn to_db(power: f64) -> f64 {
    10.0 * power.max(POWER_FLOOR).log10()
}

/// Mean fraction of sign changes per centered frame; zero counts as positive.
pub fn zero_crossing_rate(data: &[f64], frame_length: usize, hop_length: usize) -> f64 {
    if data.is_empty() || frame_length < 2 || hop_length == 0 {
        return 0.0;
    }
    let half = (frame_length / 2) as isize;
    let last = data.len() as isize - 1;
    let sample = |idx: isize| data[idx.clamp(0, last) as usize];
    let n_frames = 1 + data.len() / hop_length;
    let total: f64 = (0..n_frames)
        .map(|i| {
            let start = (i * hop_length) as isize - half;
            let crossings = (1..frame_length as isize)
                .filter(|&j| (sample(start + j) >= 0.0) != (sample(start + j - 1) >= 0.0))
                .count();
            crossings as f64 / frame_length as f64
        })
        .sum();
    total / n_frames as f64
}

/// Mean ratio of geometric to arithmetic mean of each frame's power spectrum.
pub fn spectral_flatness(spec: &Spectrogram) -> f64 {
    if spec.frames.is_empty() {
        return 0.0;
    }
    let total: f64 = spec
        .frames
        .iter()
        .map(|frame| {
            let n = frame.len().max(1) as f64;
            let power = frame.iter().map(|m| (m * m).max(POWER_FLOOR));
            let log_mean = power.clone().map(f64::ln).sum::<f64>() / n;
            let mean = power.sum::<f64>() / n;
            log_mean.exp() / mean
        })
        .sum();
    total / spec.frames.len() as f64
}

/// Dominant frequency of the frame-averaged magnitude over the mean spectral bandwidth.
pub fn q_factor(spec: &Spectrogram) -> f64 {
    let mean = spec.mean_spectrum();
    let (peak_bin, _) = mean
        .iter()
        .enumerate()
        .fold((0, f64::MIN), |best, (k, &m)| if m > best.1 { (k, m) } else { best });
    let peak_freq = spec.bin_frequency(peak_bin);
    let bandwidth = mean_bandwidth(spec, &spec.frequencies());
    if bandwidth > 0.0 {
        peak_freq / bandwidth
    } else {
        0.0
    }
}

/// Mean over frames of the second-order spread around the spectral centroid.
fn mean_bandwidth(spec: &Spectrogram, freqs: &[f64]) -> f64 {
    if spec.frames.is_empty() {
        return 0.0;
    }
    let total: f64 = spec
        .frames
        .iter()
        .map(|frame| {
            let sum: f64 = frame.iter().sum();
            if sum <= 0.0 {
                return 0.0;
            }
            let centroid = frame.iter().zip(freqs).map(|(m, f)| m * f).sum::<f64>() / sum;
            let spread = frame
                .iter()
                .zip(freqs)
                .map(|(m, f)| m / sum * (f - centroid).powi(2))
                .sum::<f64>();
            spread.sqrt()
        })
        .sum();
    total / spec.frames.len() as f64
}

/// Sum of the frame-averaged magnitude over `[low, high)` Hz.
pub fn band_energy(mean_spectrum: &[f64], bin_hz: f64, low: f64, high: f64) -> f64 {
    mean_spectrum
        .iter()
        .enumerate()
        .filter(|(k, _)| {
            let f = *k as f64 * bin_hz;
            f >= low && f < high
        })
        .map(|(_, m)| m)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectrum::stft;
    use std::f64::consts::PI;

    fn tone_spec(freq: f64, sr: u32, len: usize) -> Spectrogram {
        let tone: Vec<f64> = (0..len)
            .map(|i| (2.0 * PI * freq * i as f64 / sr as f64).sin())
            .collect();
        stft(&tone, 2048, 256).unwrap().magnitude(sr)
    }

    #[test]
    fn zcr_of_alternating_signal_is_high() {
        let data: Vec<f64> = (0..4096).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        // Edge-padded frames at both ends see fewer crossings.
        let zcr = zero_crossing_rate(&data, 2048, 512);
        assert!(zcr > 0.8 && zcr < 1.0, "zcr {zcr}");
        assert_eq!(zero_crossing_rate(&[0.0; 4000], 2048, 512), 0.0);
    }

    #[test]
    fn flatness_separates_tone_from_silence() {
        let silence = stft(&[0.0; 4000], 2048, 256).unwrap().magnitude(4000);
        assert!((spectral_flatness(&silence) - 1.0).abs() < 1e-12);
        let tone = tone_spec(200.0, 4000, 8000);
        assert!(spectral_flatness(&tone) < 0.1);
    }

    #[test]
    fn q_factor_is_zero_for_silence() {
        let silence = stft(&[0.0; 4000], 2048, 256).unwrap().magnitude(4000);
        assert_eq!(q_factor(&silence), 0.0);
    }

    #[test]
    fn q_factor_grows_with_tonality() {
        let spec = tone_spec(150.0, 2000, 6000);
        assert!(q_factor(&spec) > 1.0);
    }

    #[test]
    fn band_energy_lands_in_tone_band() {
        let spec = tone_spec(150.0, 2000, 6000);
        let mean = spec.mean_spectrum();
        let bin_hz = spec.bin_frequency(1);
        let inside = band_energy(&mean, bin_hz, 100.0, 200.0);
        let outside = band_energy(&mean, bin_hz, 200.0, 400.0);
        assert!(inside > 10.0 * outside);
    }

    #[test]
    fn contrast_has_one_value_per_band_plus_one() {
        let spec = tone_spec(150.0, 2000, 6000);
        let contrast = spectral_contrast(&spec, 20.0, 3, 0.02);
        assert_eq!(contrast.len(), 4);
        assert!(contrast[3] > 20.0);
        let silence = stft(&[0.0; 4000], 2048, 256).unwrap().magnitude(2000);
        assert!(spectral_contrast(&silence, 20.0, 3, 0.02).iter().all(|&c| c == 0.0));
    }
}
