use crate::config::PreFilterConfig;
use crate::error::{PcgError, Result};
use crate::signal::{ConditionedSignal, Waveform};
use std::f64::consts::PI;

/// Normalized second-order section (`a[0] == 1`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    pub b: [f64; 3],
    pub a: [f64; 3],
}

impl Biquad {
    fn from_raw(b: [f64; 3], a: [f64; 3]) -> Self {
        let a0 = a[0];
        Self {
            b: [b[0] / a0, b[1] / a0, b[2] / a0],
            a: [1.0, a[1] / a0, a[2] / a0],
        }
    }

    /// Second-order low-pass at `fc` Hz with quality `q` (bilinear, pre-warped).
    pub fn lowpass(fc: f64, fs: f64, q: f64) -> Self {
        let w0 = 2.0 * PI * fc / fs;
        let (sin, cos) = w0.sin_cos();
        let alpha = sin / (2.0 * q);
        Self::from_raw(
            [(1.0 - cos) / 2.0, 1.0 - cos, (1.0 - cos) / 2.0],
            [1.0 + alpha, -2.0 * cos, 1.0 - alpha],
        )
    }

    /// Second-order high-pass at `fc` Hz with quality `q` (bilinear, pre-warped).
    pub fn highpass(fc: f64, fs: f64, q: f64) -> Self {
        let w0 = 2.0 * PI * fc / fs;
        let (sin, cos) = w0.sin_cos();
        let alpha = sin / (2.0 * q);
        Self::from_raw(
            [(1.0 + cos) / 2.0, -(1.0 + cos), (1.0 + cos) / 2.0],
            [1.0 + alpha, -2.0 * cos, 1.0 - alpha],
        )
    }

    /// DC gain of the section.
    fn dc_gain(&self) -> f64 {
        let den = self.a[0] + self.a[1] + self.a[2];
        if den.abs() < f64::EPSILON {
            0.0
        } else {
            (self.b[0] + self.b[1] + self.b[2]) / den
        }
    }
}

/// Quality factors of the conjugate pole pairs of an even-order Butterworth filter.
fn butterworth_qs(order: usize) -> Vec<f64> {
    (0..order / 2)
        .map(|k| {
            let theta = PI * (2 * k + 1) as f64 / (2 * order) as f64;
            1.0 / (2.0 * theta.cos())
        })
        .collect()
}

/// Butterworth band-pass as high-pass sections at `low` followed by low-pass sections at `high`.
/// An edge at or above Nyquist is left out.
pub fn butterworth_bandpass(order: usize, low: f64, high: f64, fs: f64) -> Vec<Biquad> {
    let nyquist = fs * 0.5;
    let qs = butterworth_qs(order);
    let mut sections = Vec::with_capacity(qs.len() * 2);
    if low > 0.0 && low < nyquist {
        sections.extend(qs.iter().map(|&q| Biquad::highpass(low, fs, q)));
    } else {
        log::warn!("band-pass low edge {low} Hz is outside (0, {nyquist}) Hz; skipping high-pass");
    }
    if high > 0.0 && high < nyquist {
        sections.extend(qs.iter().map(|&q| Biquad::lowpass(high, fs, q)));
    } else {
        log::debug!("band-pass high edge {high} Hz is at or above Nyquist; skipping low-pass");
    }
    sections
}

/// Run a cascade of sections (transposed direct form II) starting from steady state at `x0`.
fn sosfilt_steady(sections: &[Biquad], data: &[f64]) -> Vec<f64> {
    let mut out = data.to_vec();
    let Some(&first) = data.first() else {
        return out;
    };
    let mut level = first;
    for sec in sections {
        let g = sec.dc_gain();
        let mut s1 = (g - sec.b[0]) * level;
        let mut s2 = (sec.b[2] - sec.a[2] * g) * level;
        for x in out.iter_mut() {
            let input = *x;
            let y = sec.b[0] * input + s1;
            s1 = sec.b[1] * input - sec.a[1] * y + s2;
            s2 = sec.b[2] * input - sec.a[2] * y;
            *x = y;
        }
        level *= g;
    }
    out
}

/// Zero-phase forward-backward filtering with odd edge extension.
pub fn sosfiltfilt(sections: &[Biquad], data: &[f64]) -> Vec<f64> {
    if sections.is_empty() || data.is_empty() {
        return data.to_vec();
    }
    let n = data.len();
    let padlen = (3 * (2 * sections.len() + 1)).min(n - 1);
    let mut ext = Vec::with_capacity(n + 2 * padlen);
    for i in (1..=padlen).rev() {
        ext.push(2.0 * data[0] - data[i]);
    }
    ext.extend_from_slice(data);
    for i in 1..=padlen {
        ext.push(2.0 * data[n - 1] - data[n - 1 - i]);
    }

    let mut forward = sosfilt_steady(sections, &ext);
    forward.reverse();
    let mut backward = sosfilt_steady(sections, &forward);
    backward.reverse();
    backward[padlen..padlen + n].to_vec()
}

/// First-order emphasis `y[n] = x[n] - coeff * x[n-1]`.
pub fn pre_emphasis(data: &[f64], coeff: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(data.len());
    let mut prev = 0.0;
    for (i, &x) in data.iter().enumerate() {
        out.push(if i == 0 { x } else { x - coeff * prev });
        prev = x;
    }
    out
}

/// Scale to unit peak amplitude; silent input is returned unchanged.
pub fn peak_normalize(data: &[f64]) -> Vec<f64> {
    let peak = data.iter().fold(0.0_f64, |acc, x| acc.max(x.abs()));
    if peak <= 1e-12 {
        return data.to_vec();
    }
    data.iter().map(|x| (x / peak).clamp(-1.0, 1.0)).collect()
}

/// Centered moving average of odd `width`; the window shrinks at the edges.
pub fn centered_moving_average(data: &[f64], width: usize) -> Vec<f64> {
    if data.is_empty() || width <= 1 {
        return data.to_vec();
    }
    let half = width / 2;
    let mut prefix = Vec::with_capacity(data.len() + 1);
    prefix.push(0.0);
    let mut acc = 0.0;
    for &x in data {
        acc += x;
        prefix.push(acc);
    }
    (0..data.len())
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half + 1).min(data.len());
            (prefix[hi] - prefix[lo]) / (hi - lo) as f64
        })
        .collect()
}

fn ensure_finite(data: &[f64], step: &'static str) -> Result<()> {
    if data.iter().all(|x| x.is_finite()) {
        Ok(())
    } else {
        Err(PcgError::FilterInstability { step })
    }
}

/// Pre-emphasis, zero-phase band-pass and peak normalization.
pub fn condition(waveform: &Waveform, cfg: &PreFilterConfig) -> Result<ConditionedSignal> {
    let fs = waveform.sample_rate() as f64;
    let emphasized = pre_emphasis(waveform.samples(), cfg.pre_emphasis);
    let sections = butterworth_bandpass(cfg.order, cfg.lowcut_hz, cfg.highcut_hz, fs);
    log::debug!(
        "band-pass {}-{} Hz, {} sections at {} Hz",
        cfg.lowcut_hz,
        cfg.highcut_hz,
        sections.len(),
        fs
    );
    let filtered = sosfiltfilt(&sections, &emphasized);
    ensure_finite(&filtered, "band-pass")?;
    let data = peak_normalize(&filtered);
    ensure_finite(&data, "normalization")?;
    Ok(ConditionedSignal {
        sample_rate: waveform.sample_rate(),
        data,
    })
}
