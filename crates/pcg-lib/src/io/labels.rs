use crate::error::{PcgError, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One labeled segment: `[start_s, end_s]` with its class code.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentLabel {
    pub start_s: f64,
    pub end_s: f64,
    pub class: u8,
}

/// Read a headerless three-column label file; comma-separated for `.csv`, tab otherwise.
pub fn load_segment_labels(path: &Path) -> Result<Vec<SegmentLabel>> {
    if !path.exists() {
        return Err(PcgError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let text = std::fs::read_to_string(path)?;
    let delimiter = match path.extension().and_then(|s| s.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => b',',
        _ => b'\t',
    };
    parse_segment_labels(&text, delimiter)
}

/// Parse label rows; every row must carry exactly start, end and class.
pub fn parse_segment_labels(text: &str, delimiter: u8) -> Result<Vec<SegmentLabel>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());
    let mut out = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 1;
        let record = result.map_err(|e| PcgError::LabelFormat {
            line,
            reason: e.to_string(),
        })?;
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        out.push(label_from_record(&record, line)?);
    }
    Ok(out)
}

fn label_from_record(record: &StringRecord, line: usize) -> Result<SegmentLabel> {
    if record.len() != 3 {
        return Err(PcgError::LabelFormat {
            line,
            reason: format!("expected 3 columns, found {}", record.len()),
        });
    }
    let field = |i: usize, name: &str| -> Result<f64> {
        record[i].parse::<f64>().map_err(|_| PcgError::LabelFormat {
            line,
            reason: format!("{name} is not a number: {}", &record[i]),
        })
    };
    let start_s = field(0, "start")?;
    let end_s = field(1, "end")?;
    let class: u8 = record[2].parse().map_err(|_| PcgError::LabelFormat {
        line,
        reason: format!("class is not a small integer: {}", &record[2]),
    })?;
    if !start_s.is_finite() || !end_s.is_finite() || end_s < start_s {
        return Err(PcgError::LabelFormat {
            line,
            reason: format!("invalid interval [{start_s}, {end_s}]"),
        });
    }
    Ok(SegmentLabel {
        start_s,
        end_s,
        class,
    })
}
