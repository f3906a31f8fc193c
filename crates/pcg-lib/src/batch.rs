use crate::error::{PcgError, PipelineError, Result as PcgResult};
use crate::features::{FeatureSchema, FeatureVector};
use crate::pipeline::HeartSoundPipeline;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Auscultation site encoded in `{id}_{SITE}.wav` file names.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Site {
    AV,
    MV,
    PV,
    TV,
}

impl Site {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "AV" => Some(Site::AV),
            "MV" => Some(Site::MV),
            "PV" => Some(Site::PV),
            "TV" => Some(Site::TV),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Site::AV => "AV",
            Site::MV => "MV",
            Site::PV => "PV",
            Site::TV => "TV",
        }
    }

    /// Split a file stem like `50782_MV` into recording id and site.
    pub fn from_path(path: &Path) -> Option<(String, Site)> {
        let stem = path.file_stem()?.to_str()?;
        let (id, site) = stem.rsplit_once('_')?;
        if id.is_empty() {
            return None;
        }
        Site::parse(site).map(|s| (id.to_string(), s))
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOptions {
    /// Sample rate for newline-delimited text inputs.
    pub text_sample_rate: Option<u32>,
    /// Emit the classifier subset instead of the full vector.
    pub selected: bool,
}

/// Features of one successfully processed file.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub recording_id: Option<String>,
    pub site: Option<Site>,
    pub features: FeatureVector,
}

/// Per-feature median over every recording of one (id, site) pair.
#[derive(Debug, Clone, Serialize)]
pub struct SiteAggregate {
    pub recording_id: String,
    pub site: Site,
    pub files: usize,
    pub features: FeatureVector,
}

pub type BatchResult = Result<FileReport, PipelineError>;

fn process_one(path: &Path, pipeline: &HeartSoundPipeline, opts: &BatchOptions) -> BatchResult {
    let tagged = Site::from_path(path);
    let site_pipeline;
    let pipeline = match &tagged {
        Some((_, site)) if pipeline.config().site.is_none() => {
            site_pipeline = pipeline.with_site(site.as_str());
            &site_pipeline
        }
        _ => pipeline,
    };
    let analysis = pipeline.analyze_file(path, opts.text_sample_rate, None)?;
    let features = if opts.selected {
        analysis.selected
    } else {
        analysis.feature_vector
    };
    let (recording_id, site) = match tagged {
        Some((id, site)) => (Some(id), Some(site)),
        None => (None, None),
    };
    Ok(FileReport {
        path: path.to_path_buf(),
        recording_id,
        site,
        features,
    })
}

/// Analyze every path independently; results keep input order.
pub fn run_batch(
    paths: &[PathBuf],
    pipeline: &HeartSoundPipeline,
    opts: &BatchOptions,
) -> Vec<BatchResult> {
    log::debug!("batch of {} files", paths.len());

    #[cfg(feature = "parallel")]
    let results: Vec<BatchResult> = paths
        .par_iter()
        .map(|p| process_one(p, pipeline, opts))
        .collect();

    #[cfg(not(feature = "parallel"))]
    let results: Vec<BatchResult> = paths
        .iter()
        .map(|p| process_one(p, pipeline, opts))
        .collect();

    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        log::warn!("{err}");
    }
    results
}

fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        0.5 * (values[mid - 1] + values[mid])
    } else {
        values[mid]
    }
}

/// Group site-tagged reports by (recording id, site) and take per-feature medians.
/// Untagged reports are ignored. Members of one group must share a key set.
pub fn aggregate_by_site(reports: &[FileReport]) -> PcgResult<Vec<SiteAggregate>> {
    let mut groups: BTreeMap<(String, Site), Vec<&FileReport>> = BTreeMap::new();
    for report in reports {
        if let (Some(id), Some(site)) = (&report.recording_id, report.site) {
            groups.entry((id.clone(), site)).or_default().push(report);
        }
    }

    groups
        .into_iter()
        .map(|((recording_id, site), members)| {
            let schema = FeatureSchema::from_keys(members[0].features.keys().map(str::to_string));
            if let Some(odd) = members
                .iter()
                .find(|m| m.features.keys().ne(schema.keys().iter().map(String::as_str)))
            {
                return Err(PcgError::Schema(format!(
                    "{} does not share the key set of its site group",
                    odd.path.display()
                )));
            }
            let entries = schema.keys().iter().map(|key| {
                let mut values: Vec<f64> = members
                    .iter()
                    .filter_map(|m| m.features.get(key))
                    .collect();
                (key.clone(), median(&mut values))
            });
            let features = FeatureVector::from_entries(&schema, entries)?;
            Ok(SiteAggregate {
                recording_id,
                site,
                files: members.len(),
                features,
            })
        })
        .collect()
}
