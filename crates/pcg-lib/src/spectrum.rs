use crate::error::{PcgError, Result};
use realfft::num_complex::Complex;
use realfft::RealFftPlanner;
use std::f64::consts::PI;

/// Complex short-time spectrum, frames centered on multiples of `hop`.
#[derive(Debug, Clone)]
pub struct Stft {
    pub n_fft: usize,
    pub hop: usize,
    pub frames: Vec<Vec<Complex<f64>>>,
}

/// Magnitude (or power) spectrogram with its frequency axis.
#[derive(Debug, Clone)]
pub struct Spectrogram {
    pub sample_rate: u32,
    pub n_fft: usize,
    pub frames: Vec<Vec<f64>>,
}

impl Spectrogram {
    pub fn n_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    pub fn bin_frequency(&self, bin: usize) -> f64 {
        bin as f64 * self.sample_rate as f64 / self.n_fft as f64
    }

    pub fn frequencies(&self) -> Vec<f64> {
        (0..self.n_bins()).map(|k| self.bin_frequency(k)).collect()
    }

    /// Per-bin average across frames.
    pub fn mean_spectrum(&self) -> Vec<f64> {
        let mut mean = vec![0.0; self.n_bins()];
        if self.frames.is_empty() {
            return mean;
        }
        for frame in &self.frames {
            for (acc, v) in mean.iter_mut().zip(frame) {
                *acc += v;
            }
        }
        let n = self.frames.len() as f64;
        mean.iter_mut().for_each(|v| *v /= n);
        mean
    }
}

impl Stft {
    pub fn magnitude(&self, sample_rate: u32) -> Spectrogram {
        Spectrogram {
            sample_rate,
            n_fft: self.n_fft,
            frames: self
                .frames
                .iter()
                .map(|f| f.iter().map(|c| c.norm()).collect())
                .collect(),
        }
    }
}

/// Periodic Hann window.
pub fn hann(size: usize) -> Vec<f64> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / (size as f64)).cos()))
        .collect()
}

/// Centered STFT with `1 + len / hop` frames and zero padding at the edges.
pub fn stft(signal: &[f64], n_fft: usize, hop: usize) -> Result<Stft> {
    let n_frames = 1 + signal.len() / hop.max(1);
    stft_frames(signal, n_fft, hop, n_frames)
}

/// Centered STFT with an explicit frame count.
pub fn stft_frames(signal: &[f64], n_fft: usize, hop: usize, n_frames: usize) -> Result<Stft> {
    if n_fft < 2 || hop == 0 {
        return Err(PcgError::Spectral(format!(
            "invalid frame geometry n_fft={n_fft} hop={hop}"
        )));
    }
    let window = hann(n_fft);
    let mut planner = RealFftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(n_fft);
    let half = (n_fft / 2) as isize;
    let mut frames = Vec::with_capacity(n_frames);
    let mut buffer = fft.make_input_vec();
    for i in 0..n_frames {
        let start = (i * hop) as isize - half;
        for (j, slot) in buffer.iter_mut().enumerate() {
            let idx = start + j as isize;
            let sample = if idx >= 0 && (idx as usize) < signal.len() {
                signal[idx as usize]
            } else {
                0.0
            };
            *slot = sample * window[j];
        }
        let mut spectrum = fft.make_output_vec();
        fft.process(&mut buffer, &mut spectrum)
            .map_err(|e| PcgError::Spectral(e.to_string()))?;
        frames.push(spectrum);
    }
    Ok(Stft { n_fft, hop, frames })
}

/// Weighted overlap-add inverse of [`stft`], trimmed to `len` samples.
pub fn istft(spec: &Stft, len: usize) -> Result<Vec<f64>> {
    let n_fft = spec.n_fft;
    let window = hann(n_fft);
    let mut planner = RealFftPlanner::<f64>::new();
    let ifft = planner.plan_fft_inverse(n_fft);
    let half = n_fft / 2;
    let padded_len = len + n_fft + spec.hop * spec.frames.len();
    let mut out = vec![0.0; padded_len];
    let mut norm = vec![0.0; padded_len];
    let mut time = ifft.make_output_vec();
    for (i, frame) in spec.frames.iter().enumerate() {
        let mut bins = frame.clone();
        // DC and Nyquist bins of a real signal carry no imaginary part.
        if let Some(first) = bins.first_mut() {
            first.im = 0.0;
        }
        if n_fft % 2 == 0 {
            if let Some(last) = bins.last_mut() {
                last.im = 0.0;
            }
        }
        ifft.process(&mut bins, &mut time)
            .map_err(|e| PcgError::Spectral(e.to_string()))?;
        let offset = i * spec.hop;
        for j in 0..n_fft {
            out[offset + j] += time[j] / n_fft as f64 * window[j];
            norm[offset + j] += window[j] * window[j];
        }
    }
    Ok((0..len)
        .map(|t| {
            let idx = t + half;
            if norm[idx] > 1e-10 {
                out[idx] / norm[idx]
            } else {
                0.0
            }
        })
        .collect())
}

/// `10·log10(power)` floored at `1e-10` and limited to `top_db` below the peak.
pub fn power_to_db(frames: &[Vec<f64>], top_db: f64) -> Vec<Vec<f64>> {
    let mut db: Vec<Vec<f64>> = frames
        .iter()
        .map(|f| f.iter().map(|&p| 10.0 * p.max(1e-10).log10()).collect())
        .collect();
    let peak = db
        .iter()
        .flat_map(|f| f.iter().copied())
        .fold(f64::NEG_INFINITY, f64::max);
    if peak.is_finite() && top_db > 0.0 {
        let floor = peak - top_db;
        for v in db.iter_mut().flat_map(|f| f.iter_mut()) {
            *v = v.max(floor);
        }
    }
    db
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sine_peaks_at_its_bin() {
        let sr = 2000u32;
        let signal: Vec<f64> = (0..4000)
            .map(|i| (2.0 * PI * 125.0 * i as f64 / sr as f64).sin())
            .collect();
        let spec = stft(&signal, 256, 64).unwrap().magnitude(sr);
        let mean = spec.mean_spectrum();
        let peak_bin = mean
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(k, _)| k)
            .unwrap();
        assert!((spec.bin_frequency(peak_bin) - 125.0).abs() < 1e-9);
        assert_eq!(spec.frames.len(), 1 + 4000 / 64);
    }

    #[test]
    fn istft_reconstructs_interior() {
        let signal: Vec<f64> = (0..1000).map(|i| ((i * 7 % 13) as f64 - 6.0) / 6.0).collect();
        let spec = stft(&signal, 128, 32).unwrap();
        let rebuilt = istft(&spec, signal.len()).unwrap();
        for (a, b) in signal.iter().zip(&rebuilt).skip(64).take(800) {
            assert!((a - b).abs() < 1e-8, "{a} vs {b}");
        }
    }

    #[test]
    fn power_to_db_limits_range() {
        let db = power_to_db(&[vec![1.0, 0.0]], 80.0);
        assert_eq!(db[0][0], 0.0);
        assert_eq!(db[0][1], -80.0);
    }
}
