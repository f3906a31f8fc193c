use crate::error::{PcgError, Result};
use crate::signal::Waveform;
use anyhow::Context;
use std::path::Path;

/// Parse newline-delimited floating point samples, ignoring blank/comment lines.
pub fn parse_f64_series(text: &str) -> anyhow::Result<Vec<f64>> {
    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let val: f64 = trimmed
            .parse()
            .with_context(|| format!("line {} is not f64: {}", idx + 1, trimmed))?;
        out.push(val);
    }
    if out.is_empty() {
        anyhow::bail!("no numeric samples found");
    }
    Ok(out)
}

/// Build a waveform from a text buffer recorded at `sample_rate`.
pub fn waveform_from_text(text: &str, sample_rate: u32) -> Result<Waveform> {
    let samples = parse_f64_series(text).map_err(|e| PcgError::Decode {
        path: "<buffer>".into(),
        reason: format!("{e:#}"),
    })?;
    Waveform::new(samples, sample_rate)
}

/// Read a newline-delimited sample file recorded at `sample_rate`.
pub fn load_text_waveform(path: &Path, sample_rate: u32) -> Result<Waveform> {
    if !path.exists() {
        return Err(PcgError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let text = std::fs::read_to_string(path).map_err(|e| PcgError::Decode {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let samples = parse_f64_series(&text).map_err(|e| PcgError::Decode {
        path: path.to_path_buf(),
        reason: format!("{e:#}"),
    })?;
    Waveform::new(samples, sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_comments_and_blank_lines() {
        let series = parse_f64_series("# header\n0.5\n\n-0.25\n1e-3\n").unwrap();
        assert_eq!(series, vec![0.5, -0.25, 1e-3]);
    }

    #[test]
    fn bad_line_is_a_decode_error() {
        let err = waveform_from_text("0.1\nabc\n", 1000).unwrap_err();
        assert!(matches!(err, PcgError::Decode { .. }));
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn missing_text_file_is_not_found() {
        let err = load_text_waveform(Path::new("/nonexistent/samples.txt"), 1000).unwrap_err();
        assert!(matches!(err, PcgError::NotFound { .. }));
    }
}
