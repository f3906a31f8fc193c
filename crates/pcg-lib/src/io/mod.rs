pub mod labels;
pub mod text;
pub mod wav;

use crate::error::{PcgError, Result};
use crate::signal::Waveform;
use std::path::Path;

/// Load a recording by extension: `.wav` is decoded, anything else is read as
/// newline-delimited samples at `text_sample_rate`.
pub fn load_waveform(path: &Path, text_sample_rate: Option<u32>) -> Result<Waveform> {
    let is_wav = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
    if is_wav {
        return wav::load_wav(path);
    }
    match text_sample_rate {
        Some(sr) => text::load_text_waveform(path, sr),
        None if !path.exists() => Err(PcgError::NotFound {
            path: path.to_path_buf(),
        }),
        None => Err(PcgError::Decode {
            path: path.to_path_buf(),
            reason: "text samples need an explicit sample rate".into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_without_rate_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rec.txt");
        std::fs::write(&path, "0.1\n0.2\n").unwrap();
        assert!(matches!(
            load_waveform(&path, None),
            Err(PcgError::Decode { .. })
        ));
        let w = load_waveform(&path, Some(1000)).unwrap();
        assert_eq!(w.len(), 2);
    }

    #[test]
    fn missing_wav_is_not_found() {
        let err = load_waveform(Path::new("/nonexistent/a_AV.WAV"), None).unwrap_err();
        assert!(matches!(err, PcgError::NotFound { .. }));
    }
}
