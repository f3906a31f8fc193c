pub mod cepstral;
pub mod select;
pub mod spectral;
pub mod timing;
pub mod vector;
pub mod wavelet;

pub use select::select_features;
pub use timing::TimingFeatures;
pub use vector::{FeatureSchema, FeatureVector};
pub use wavelet::WaveletLevel;

use crate::config::FeatureConfig;
use crate::error::Result;
use crate::spectrum::stft;
use serde::{Deserialize, Serialize};
use vector::*;

const MFCC_TOP_DB: f64 = 80.0;

/// Mean-spectrum magnitude summed over one frequency band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandEnergy {
    pub low_hz: f64,
    pub high_hz: f64,
    pub energy: f64,
}

/// Typed feature record of one recording before flattening.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardiacFeatures {
    pub mfcc_mean: Vec<f64>,
    pub mfcc_std: Vec<f64>,
    pub spectral_contrast: Vec<f64>,
    pub zero_crossing_rate: f64,
    pub spectral_flatness: f64,
    pub q_factor: f64,
    pub band_energies: Vec<BandEnergy>,
    pub wavelet: Vec<WaveletLevel>,
    pub timing: TimingFeatures,
}

impl CardiacFeatures {
    /// Flatten into `(key, value)` pairs in schema order, keys prefixed with `{site}_`.
    pub fn entries(&self, site: Option<&str>) -> Vec<(String, f64)> {
        let mut out: Vec<(String, f64)> = Vec::new();
        out.extend(
            self.mfcc_mean
                .iter()
                .enumerate()
                .map(|(i, &v)| (mfcc_mean_key(i + 1), v)),
        );
        out.extend(
            self.mfcc_std
                .iter()
                .enumerate()
                .map(|(i, &v)| (mfcc_std_key(i + 1), v)),
        );
        out.extend(
            self.spectral_contrast
                .iter()
                .enumerate()
                .map(|(i, &v)| (contrast_key(i + 1), v)),
        );
        out.push((ZCR_KEY.to_string(), self.zero_crossing_rate));
        out.push((FLATNESS_KEY.to_string(), self.spectral_flatness));
        out.push((Q_FACTOR_KEY.to_string(), self.q_factor));
        out.extend(
            self.band_energies
                .iter()
                .map(|b| (energy_key(b.low_hz, b.high_hz), b.energy)),
        );
        for level in &self.wavelet {
            out.push((wavelet_energy_key(level.level), level.energy));
            out.push((wavelet_entropy_key(level.level), level.entropy));
            if let Some(ratio) = level.energy_ratio {
                out.push((wavelet_ratio_key(level.level), ratio));
            }
        }
        let t = &self.timing;
        let timing = [
            t.heart_rate_bpm,
            t.systole_mean_s,
            t.systole_std_s,
            t.diastole_mean_s,
            t.diastole_std_s,
        ];
        out.extend(TIMING_KEYS.iter().zip(timing).map(|(k, v)| (k.to_string(), v)));

        match site {
            Some(site) => out
                .into_iter()
                .map(|(k, v)| (format!("{site}_{k}"), v))
                .collect(),
            None => out,
        }
    }

    /// Validated full feature vector.
    pub fn to_vector(&self, cfg: &FeatureConfig, site: Option<&str>) -> Result<FeatureVector> {
        let schema = FeatureSchema::full(cfg).with_site(site);
        FeatureVector::from_entries(&schema, self.entries(site))
    }
}

/// Spectral, cepstral and wavelet features of `segment` plus timing from the
/// full-signal `peak_times`.
pub fn extract_features(
    segment: &[f64],
    sample_rate: u32,
    peak_times: &[f64],
    cfg: &FeatureConfig,
) -> Result<CardiacFeatures> {
    log::debug!(
        "extracting features from {} samples, {} peaks",
        segment.len(),
        peak_times.len()
    );
    let magnitude = stft(segment, cfg.n_fft, cfg.hop_length)?.magnitude(sample_rate);
    let mean_spectrum = magnitude.mean_spectrum();
    let bin_hz = magnitude.bin_frequency(1);

    let mfcc = cepstral::mfcc_stats(&magnitude, cfg.n_mfcc, cfg.n_mels, MFCC_TOP_DB);
    let band_energies = cfg
        .energy_bands
        .iter()
        .map(|&(low_hz, high_hz)| BandEnergy {
            low_hz,
            high_hz,
            energy: spectral::band_energy(&mean_spectrum, bin_hz, low_hz, high_hz),
        })
        .collect();

    Ok(CardiacFeatures {
        mfcc_mean: mfcc.mean,
        mfcc_std: mfcc.std,
        spectral_contrast: spectral::spectral_contrast(
            &magnitude,
            cfg.contrast_fmin_hz,
            cfg.contrast_bands,
            cfg.contrast_quantile,
        ),
        zero_crossing_rate: spectral::zero_crossing_rate(
            segment,
            cfg.zcr_frame_length,
            cfg.zcr_hop_length,
        ),
        spectral_flatness: spectral::spectral_flatness(&magnitude),
        q_factor: spectral::q_factor(&magnitude),
        band_energies,
        wavelet: wavelet::wavelet_levels(segment, cfg.wavelet_levels),
        timing: timing::timing_features(peak_times),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn entries_match_full_schema() {
        let cfg = FeatureConfig::default();
        let sr = 2000;
        let segment: Vec<f64> = (0..2048)
            .map(|i| (2.0 * PI * 60.0 * i as f64 / sr as f64).sin())
            .collect();
        let features = extract_features(&segment, sr, &[0.1, 0.4, 1.1, 1.4], &cfg).unwrap();
        let vector = features.to_vector(&cfg, None).unwrap();
        assert_eq!(vector.len(), FeatureSchema::full(&cfg).len());
        assert!(vector.iter().all(|(_, v)| v.is_finite()));
        assert!(vector.get("Energy_20_100Hz").unwrap() > vector.get("Energy_200_400Hz").unwrap());
        assert!((vector.get("HeartRate").unwrap() - 60.0).abs() < 1e-9);
    }

    #[test]
    fn site_prefix_reaches_every_key() {
        let cfg = FeatureConfig::default();
        let features = extract_features(&[0.0; 1000], 4000, &[], &cfg).unwrap();
        let vector = features.to_vector(&cfg, Some("AV")).unwrap();
        assert!(vector.keys().all(|k| k.starts_with("AV_")));
        assert_eq!(vector.get("AV_HeartRate"), Some(0.0));
    }
}
