use crate::config::FeatureConfig;
use crate::error::{PcgError, Result};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::HashSet;

pub(crate) fn mfcc_mean_key(k: usize) -> String {
    format!("MFCC_mean_{k}")
}
pub(crate) fn mfcc_std_key(k: usize) -> String {
    format!("MFCC_std_{k}")
}
pub(crate) fn contrast_key(k: usize) -> String {
    format!("SpectralContrast_{k}")
}
pub(crate) fn energy_key(low: f64, high: f64) -> String {
    format!("Energy_{low}_{high}Hz")
}
pub(crate) fn wavelet_energy_key(level: usize) -> String {
    format!("Wavelet_L{level}_Energy")
}
pub(crate) fn wavelet_entropy_key(level: usize) -> String {
    format!("Wavelet_L{level}_Entropy")
}
pub(crate) fn wavelet_ratio_key(level: usize) -> String {
    format!("Wavelet_L{level}_EnergyRatio")
}

pub(crate) const ZCR_KEY: &str = "ZeroCrossingRate";
pub(crate) const FLATNESS_KEY: &str = "SpectralFlatness";
pub(crate) const Q_FACTOR_KEY: &str = "QFactor";
pub(crate) const TIMING_KEYS: [&str; 5] = [
    "HeartRate",
    "Systole_Mean",
    "Systole_Std",
    "Diastole_Mean",
    "Diastole_Std",
];

/// Ordered key set a feature vector must match exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureSchema {
    keys: Vec<String>,
}

impl FeatureSchema {
    /// Every feature the extractor produces, in output order.
    pub fn full(cfg: &FeatureConfig) -> Self {
        let mut keys = Vec::new();
        keys.extend((1..=cfg.n_mfcc).map(mfcc_mean_key));
        keys.extend((1..=cfg.n_mfcc).map(mfcc_std_key));
        keys.extend((1..=cfg.contrast_bands + 1).map(contrast_key));
        keys.push(ZCR_KEY.to_string());
        keys.push(FLATNESS_KEY.to_string());
        keys.push(Q_FACTOR_KEY.to_string());
        keys.extend(cfg.energy_bands.iter().map(|&(lo, hi)| energy_key(lo, hi)));
        for level in 1..=cfg.wavelet_levels {
            keys.push(wavelet_energy_key(level));
            keys.push(wavelet_entropy_key(level));
            if level > 1 {
                keys.push(wavelet_ratio_key(level));
            }
        }
        keys.extend(TIMING_KEYS.iter().map(|k| k.to_string()));
        Self { keys }
    }

    /// Stable subset handed to the classifier.
    pub fn selected(cfg: &FeatureConfig) -> Self {
        let mut keys: Vec<String> = TIMING_KEYS.iter().map(|k| k.to_string()).collect();
        keys.push(Q_FACTOR_KEY.to_string());
        keys.push(FLATNESS_KEY.to_string());
        keys.push(ZCR_KEY.to_string());
        keys.extend((1..=cfg.n_mfcc).map(mfcc_mean_key));
        keys.extend(cfg.energy_bands.iter().map(|&(lo, hi)| energy_key(lo, hi)));
        for level in 1..=cfg.selected_wavelet_levels {
            keys.push(wavelet_energy_key(level));
            keys.push(wavelet_entropy_key(level));
        }
        Self { keys }
    }

    /// Schema with an arbitrary key order, e.g. taken from an existing vector.
    pub fn from_keys(keys: impl IntoIterator<Item = String>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
        }
    }

    /// Prefix every key with `{site}_`.
    pub fn with_site(self, site: Option<&str>) -> Self {
        match site {
            Some(site) => Self {
                keys: self
                    .keys
                    .into_iter()
                    .map(|k| format!("{site}_{k}"))
                    .collect(),
            },
            None => self,
        }
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }
}

/// Ordered name → value mapping with a validated key set and finite values.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    entries: Vec<(String, f64)>,
}

impl FeatureVector {
    /// Check `entries` against `schema` and order them like the schema.
    /// Non-finite values become 0.0.
    pub fn from_entries(
        schema: &FeatureSchema,
        entries: impl IntoIterator<Item = (String, f64)>,
    ) -> Result<Self> {
        let entries: Vec<(String, f64)> = entries.into_iter().collect();
        let mut seen = HashSet::with_capacity(entries.len());
        for (key, _) in &entries {
            if !seen.insert(key.as_str()) {
                return Err(PcgError::Schema(format!("duplicate key {key}")));
            }
            if !schema.contains(key) {
                return Err(PcgError::Schema(format!("unexpected key {key}")));
            }
        }
        if let Some(missing) = schema.keys().iter().find(|k| !seen.contains(k.as_str())) {
            return Err(PcgError::Schema(format!("missing key {missing}")));
        }

        let ordered = schema
            .keys()
            .iter()
            .filter_map(|key| entries.iter().find(|(k, _)| k == key))
            .map(|(key, value)| {
                let value = if value.is_finite() {
                    *value
                } else {
                    log::warn!("feature {key} is {value}; replacing with 0.0");
                    0.0
                };
                (key.clone(), value)
            })
            .collect();
        Ok(Self { entries: ordered })
    }

    /// Restrict to the keys of `schema`, in its order.
    pub fn project(&self, schema: &FeatureSchema) -> Result<Self> {
        let picked: Vec<(String, f64)> = schema
            .keys()
            .iter()
            .filter_map(|key| self.get(key).map(|v| (key.clone(), v)))
            .collect();
        Self::from_entries(schema, picked)
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for FeatureVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> FeatureSchema {
        FeatureSchema {
            keys: vec!["A".into(), "B".into(), "C".into()],
        }
    }

    #[test]
    fn full_schema_has_expected_shape() {
        let cfg = FeatureConfig::default();
        let full = FeatureSchema::full(&cfg);
        // 26 MFCC + 4 contrast + 3 scalars + 3 bands + 11 wavelet + 5 timing
        assert_eq!(full.len(), 52);
        assert_eq!(full.keys()[0], "MFCC_mean_1");
        assert!(full.contains("Energy_20_100Hz"));
        assert!(full.contains("Wavelet_L4_EnergyRatio"));
        assert!(!full.contains("Wavelet_L1_EnergyRatio"));
        let unique: HashSet<&String> = full.keys().iter().collect();
        assert_eq!(unique.len(), full.len());
    }

    #[test]
    fn selected_schema_is_subset_of_full() {
        let cfg = FeatureConfig::default();
        let full = FeatureSchema::full(&cfg);
        let selected = FeatureSchema::selected(&cfg);
        assert_eq!(selected.len(), 5 + 3 + 13 + 3 + 6);
        assert!(selected.keys().iter().all(|k| full.contains(k)));
        assert!(!selected.contains("Wavelet_L4_Energy"));
    }

    #[test]
    fn site_prefix_applies_to_every_key() {
        let prefixed = schema().with_site(Some("MV"));
        assert_eq!(prefixed.keys(), &["MV_A", "MV_B", "MV_C"]);
    }

    #[test]
    fn entries_are_reordered_and_sanitized() {
        let v = FeatureVector::from_entries(
            &schema(),
            vec![("C".into(), 3.0), ("A".into(), f64::NAN), ("B".into(), 2.0)],
        )
        .unwrap();
        let keys: Vec<&str> = v.keys().collect();
        assert_eq!(keys, vec!["A", "B", "C"]);
        assert_eq!(v.get("A"), Some(0.0));
        assert_eq!(
            serde_json::to_string(&v).unwrap(),
            r#"{"A":0.0,"B":2.0,"C":3.0}"#
        );
    }

    #[test]
    fn schema_mismatch_is_rejected() {
        let missing = FeatureVector::from_entries(&schema(), vec![("A".into(), 1.0)]);
        assert!(matches!(missing, Err(PcgError::Schema(_))));
        let extra = FeatureVector::from_entries(
            &schema(),
            vec![
                ("A".into(), 1.0),
                ("B".into(), 1.0),
                ("C".into(), 1.0),
                ("D".into(), 1.0),
            ],
        );
        assert!(matches!(extra, Err(PcgError::Schema(_))));
        let dup = FeatureVector::from_entries(
            &schema(),
            vec![("A".into(), 1.0), ("A".into(), 1.0), ("C".into(), 1.0)],
        );
        assert!(matches!(dup, Err(PcgError::Schema(_))));
    }

    #[test]
    fn projection_keeps_schema_order() {
        let v = FeatureVector::from_entries(
            &schema(),
            vec![("A".into(), 1.0), ("B".into(), 2.0), ("C".into(), 3.0)],
        )
        .unwrap();
        let sub = FeatureSchema {
            keys: vec!["C".into(), "A".into()],
        };
        let p = v.project(&sub).unwrap();
        assert_eq!(p.iter().collect::<Vec<_>>(), vec![("C", 3.0), ("A", 1.0)]);
    }
}
