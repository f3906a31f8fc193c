use crate::spectrum::{power_to_db, Spectrogram};
use std::f64::consts::PI;

/// Per-coefficient summary of the MFCC matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct MfccStats {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

/// HTK mel scale.
pub fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

pub fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10.0_f64.powf(mel / 2595.0) - 1.0)
}

/// Triangular, area-normalized mel filters spanning `0..sample_rate/2`.
pub fn mel_filterbank(n_mels: usize, n_fft: usize, sample_rate: u32) -> Vec<Vec<f64>> {
    let n_bins = n_fft / 2 + 1;
    let fmax = sample_rate as f64 / 2.0;
    let mel_max = hz_to_mel(fmax);
    let hz_points: Vec<f64> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_max * i as f64 / (n_mels + 1) as f64))
        .collect();
    let bin_hz = sample_rate as f64 / n_fft as f64;

    (0..n_mels)
        .map(|m| {
            let (left, center, right) = (hz_points[m], hz_points[m + 1], hz_points[m + 2]);
            let norm = 2.0 / (right - left);
            (0..n_bins)
                .map(|k| {
                    let f = k as f64 * bin_hz;
                    let rising = (f - left) / (center - left);
                    let falling = (right - f) / (right - center);
                    rising.min(falling).max(0.0) * norm
                })
                .collect()
        })
        .collect()
}

/// Orthonormal DCT-II truncated to the first `n_out` coefficients.
pub fn dct_ortho(input: &[f64], n_out: usize) -> Vec<f64> {
    let n = input.len();
    if n == 0 {
        return vec![0.0; n_out];
    }
    let n_f = n as f64;
    (0..n_out)
        .map(|k| {
            let sum: f64 = input
                .iter()
                .enumerate()
                .map(|(i, &x)| x * (PI * k as f64 * (2.0 * i as f64 + 1.0) / (2.0 * n_f)).cos())
                .sum();
            let scale = if k == 0 {
                (1.0 / n_f).sqrt()
            } else {
                (2.0 / n_f).sqrt()
            };
            sum * scale
        })
        .collect()
}

/// MFCC mean and population standard deviation across frames of a magnitude spectrogram.
pub fn mfcc_stats(magnitude: &Spectrogram, n_mfcc: usize, n_mels: usize, top_db: f64) -> MfccStats {
    let filters = mel_filterbank(n_mels, magnitude.n_fft, magnitude.sample_rate);
    let mel_power: Vec<Vec<f64>> = magnitude
        .frames
        .iter()
        .map(|frame| {
            filters
                .iter()
                .map(|w| w.iter().zip(frame).map(|(w, m)| w * m * m).sum())
                .collect()
        })
        .collect();
    let mel_db = power_to_db(&mel_power, top_db);
    let coeffs: Vec<Vec<f64>> = mel_db.iter().map(|row| dct_ortho(row, n_mfcc)).collect();

    let n_frames = coeffs.len().max(1) as f64;
    let mut mean = vec![0.0; n_mfcc];
    for row in &coeffs {
        for (acc, c) in mean.iter_mut().zip(row) {
            *acc += c;
        }
    }
    mean.iter_mut().for_each(|m| *m /= n_frames);

    let mut std = vec![0.0; n_mfcc];
    for row in &coeffs {
        for ((acc, c), m) in std.iter_mut().zip(row).zip(&mean) {
            *acc += (c - m) * (c - m);
        }
    }
    std.iter_mut().for_each(|s| *s = (*s / n_frames).sqrt());
    MfccStats { mean, std }
}
