use crate::error::{PcgError, Result};
use crate::signal::Waveform;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::io::Read;
use std::path::Path;

/// Decode a WAV file into a mono waveform at its native rate.
pub fn load_wav(path: &Path) -> Result<Waveform> {
    if !path.exists() {
        return Err(PcgError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let reader = WavReader::open(path).map_err(|e| decode_error(path, e))?;
    decode(reader).map_err(|e| decode_error(path, e))
}

/// Decode WAV bytes already held in memory.
pub fn decode_wav_bytes(bytes: &[u8]) -> Result<Waveform> {
    let label = Path::new("<memory>");
    let reader = WavReader::new(bytes).map_err(|e| decode_error(label, e))?;
    decode(reader).map_err(|e| decode_error(label, e))
}

/// Write a waveform as 32-bit float mono WAV.
pub fn save_wav(path: &Path, waveform: &Waveform) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: waveform.sample_rate(),
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(path, spec).map_err(|e| decode_error(path, e))?;
    for &sample in waveform.samples() {
        writer
            .write_sample(sample as f32)
            .map_err(|e| decode_error(path, e))?;
    }
    writer.finalize().map_err(|e| decode_error(path, e))
}

fn decode<R: Read>(reader: WavReader<R>) -> std::result::Result<Waveform, DecodeFailure> {
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;
    let interleaved: Vec<f64> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .map(|s| s.map(f64::from))
            .collect::<std::result::Result<_, _>>()?,
        SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f64;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f64 / scale))
                .collect::<std::result::Result<_, _>>()?
        }
    };
    let mono = downmix(&interleaved, channels);
    if channels > 1 {
        log::debug!("down-mixed {channels} channels to mono");
    }
    Waveform::new(mono, spec.sample_rate).map_err(DecodeFailure::Invalid)
}

/// Average interleaved frames into one channel.
fn downmix(interleaved: &[f64], channels: usize) -> Vec<f64> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f64>() / channels as f64)
        .collect()
}

enum DecodeFailure {
    Wav(hound::Error),
    Invalid(PcgError),
}

impl From<hound::Error> for DecodeFailure {
    fn from(err: hound::Error) -> Self {
        DecodeFailure::Wav(err)
    }
}

fn decode_error(path: &Path, err: impl Into<DecodeFailure>) -> PcgError {
    let reason = match err.into() {
        DecodeFailure::Wav(e) => e.to_string(),
        DecodeFailure::Invalid(e) => e.to_string(),
    };
    PcgError::Decode {
        path: path.to_path_buf(),
        reason,
    }
}
