use super::vector::{FeatureSchema, FeatureVector};
use crate::config::FeatureConfig;
use crate::error::Result;

/// Narrow a full feature vector to the fixed classifier subset.
pub fn select_features(
    full: &FeatureVector,
    cfg: &FeatureConfig,
    site: Option<&str>,
) -> Result<FeatureVector> {
    let schema = FeatureSchema::selected(cfg).with_site(site);
    full.project(&schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PcgError;
    use crate::features::extract_features;

    #[test]
    fn selection_is_deterministic_and_ordered() {
        let cfg = FeatureConfig::default();
        let segment: Vec<f64> = (0..3000).map(|i| ((i % 37) as f64 - 18.0) / 18.0).collect();
        let full = extract_features(&segment, 4000, &[0.1, 0.4, 1.0], &cfg)
            .unwrap()
            .to_vector(&cfg, Some("TV"))
            .unwrap();
        let a = select_features(&full, &cfg, Some("TV")).unwrap();
        let b = select_features(&full, &cfg, Some("TV")).unwrap();
        assert_eq!(a, b);
        let keys: Vec<&str> = a.keys().collect();
        assert_eq!(keys[0], "TV_HeartRate");
        assert_eq!(keys.len(), FeatureSchema::selected(&cfg).len());
        assert_eq!(a.get("TV_QFactor"), full.get("TV_QFactor"));
    }

    #[test]
    fn mismatched_site_is_a_schema_error() {
        let cfg = FeatureConfig::default();
        let full = extract_features(&[0.0; 500], 4000, &[], &cfg)
            .unwrap()
            .to_vector(&cfg, None)
            .unwrap();
        let err = select_features(&full, &cfg, Some("AV")).unwrap_err();
        assert!(matches!(err, PcgError::Schema(_)));
    }
}
