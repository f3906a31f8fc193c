//! Daubechies-4 discrete wavelet transform with symmetric boundary extension.

/// db4 decomposition low-pass filter.
const DB4_DEC_LO: [f64; 8] = [
    -0.010597401784997278,
    0.032883011666982945,
    0.030841381835986965,
    -0.18703481171888114,
    -0.02798376941698385,
    0.6308807679295904,
    0.7148465705525415,
    0.23037781330885523,
];

const ENTROPY_EPS: f64 = 1e-12;

/// Statistics of one detail band; level 1 is the finest scale.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WaveletLevel {
    pub level: usize,
    pub energy: f64,
    pub entropy: f64,
    /// `E_j / E_{j-1}`; absent for level 1.
    pub energy_ratio: Option<f64>,
}

fn db4_dec_hi() -> [f64; 8] {
    let n = DB4_DEC_LO.len();
    let mut hi = [0.0; 8];
    for (k, h) in hi.iter_mut().enumerate() {
        let sign = if k % 2 == 0 { -1.0 } else { 1.0 };
        *h = sign * DB4_DEC_LO[n - 1 - k];
    }
    hi
}

/// Half-sample symmetric extension by `pad` samples on both sides.
fn symmetric_extend(data: &[f64], pad: usize) -> Vec<f64> {
    let n = data.len() as isize;
    let idx = |i: isize| -> usize {
        let period = 2 * n;
        let mut j = i.rem_euclid(period);
        if j >= n {
            j = period - 1 - j;
        }
        j as usize
    };
    (-(pad as isize)..n + pad as isize)
        .map(|i| data[idx(i)])
        .collect()
}

/// One analysis step: `(approximation, detail)`, each `floor((N + L - 1) / 2)` long.
pub fn dwt_step(data: &[f64]) -> (Vec<f64>, Vec<f64>) {
    if data.is_empty() {
        return (Vec::new(), Vec::new());
    }
    let lo = DB4_DEC_LO;
    let hi = db4_dec_hi();
    let taps = lo.len();
    let ext = symmetric_extend(data, taps - 1);
    let out_len = (data.len() + taps - 1) / 2;
    let mut approx = Vec::with_capacity(out_len);
    let mut detail = Vec::with_capacity(out_len);
    for i in 0..out_len {
        // Full convolution index 2i+1, shifted into the extended buffer.
        let n = 2 * i + 1 + taps - 1;
        let (mut a, mut d) = (0.0, 0.0);
        for k in 0..taps {
            let x = ext[n - k];
            a += lo[k] * x;
            d += hi[k] * x;
        }
        approx.push(a);
        detail.push(d);
    }
    (approx, detail)
}

/// Detail coefficients for levels `1..=levels`, finest first.
pub fn wavedec_details(data: &[f64], levels: usize) -> Vec<Vec<f64>> {
    let mut details = Vec::with_capacity(levels);
    let mut approx = data.to_vec();
    for _ in 0..levels {
        let (a, d) = dwt_step(&approx);
        details.push(d);
        approx = a;
    }
    details
}

/// Shannon entropy (bits) of the normalized coefficient energy; 0 when the band is silent.
pub fn coefficient_entropy(coeffs: &[f64]) -> f64 {
    let total: f64 = coeffs.iter().map(|c| c * c).sum();
    if total <= 0.0 {
        return 0.0;
    }
    -coeffs
        .iter()
        .map(|c| {
            let p = c * c / total;
            p * (p + ENTROPY_EPS).log2()
        })
        .sum::<f64>()
}

/// Energy, entropy and inter-level energy ratio for each detail level.
pub fn wavelet_levels(data: &[f64], levels: usize) -> Vec<WaveletLevel> {
    let details = wavedec_details(data, levels);
    let mut out: Vec<WaveletLevel> = Vec::with_capacity(levels);
    for (i, coeffs) in details.iter().enumerate() {
        let energy: f64 = coeffs.iter().map(|c| c * c).sum();
        let energy_ratio = out.last().map(|prev| {
            if prev.energy > 0.0 {
                energy / prev.energy
            } else {
                0.0
            }
        });
        out.push(WaveletLevel {
            level: i + 1,
            energy,
            entropy: coefficient_entropy(coeffs),
            energy_ratio,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64, tol: f64) {
        assert!((a - b).abs() <= tol, "{a} vs {b}");
    }

    #[test]
    fn filters_are_orthonormal() {
        let hi = db4_dec_hi();
        let lo_norm: f64 = DB4_DEC_LO.iter().map(|h| h * h).sum();
        let dot: f64 = DB4_DEC_LO.iter().zip(&hi).map(|(a, b)| a * b).sum();
        assert_close(lo_norm, 1.0, 1e-10);
        assert_close(dot, 0.0, 1e-12);
        assert_close(DB4_DEC_LO.iter().sum::<f64>(), 2f64.sqrt(), 1e-10);
        assert_close(hi.iter().sum::<f64>(), 0.0, 1e-12);
    }

    #[test]
    fn symmetric_extension_mirrors_edges() {
        let ext = symmetric_extend(&[1.0, 2.0, 3.0], 2);
        assert_eq!(ext, vec![2.0, 1.0, 1.0, 2.0, 3.0, 3.0, 2.0]);
    }

    #[test]
    fn output_lengths_follow_filter_length() {
        let (a, d) = dwt_step(&[0.0; 100]);
        assert_eq!(a.len(), 53);
        assert_eq!(d.len(), 53);
        let levels = wavedec_details(&[1.0; 100], 4);
        let lens: Vec<usize> = levels.iter().map(Vec::len).collect();
        assert_eq!(lens, vec![53, 30, 18, 12]);
    }

    #[test]
    fn constant_signal_has_no_detail_energy() {
        let levels = wavelet_levels(&[0.5; 256], 4);
        for level in &levels {
            assert!(level.energy < 1e-18, "level {} energy {}", level.level, level.energy);
        }
        assert_eq!(levels[0].energy_ratio, None);
    }

    #[test]
    fn silence_is_all_zero() {
        let levels = wavelet_levels(&[0.0; 64], 4);
        assert!(levels.iter().all(|l| l.energy == 0.0 && l.entropy == 0.0));
        assert!(levels[1..].iter().all(|l| l.energy_ratio == Some(0.0)));
    }

    #[test]
    fn entropy_of_uniform_coefficients() {
        assert_close(coefficient_entropy(&[1.0, -1.0, 1.0, -1.0]), 2.0, 1e-9);
        assert_close(coefficient_entropy(&[0.0, 3.0, 0.0, 0.0]), 0.0, 1e-9);
    }

    #[test]
    fn alternating_signal_lands_in_finest_level() {
        let data: Vec<f64> = (0..512).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let levels = wavelet_levels(&data, 4);
        assert!(levels[0].energy > 10.0 * levels[1].energy);
    }
}
