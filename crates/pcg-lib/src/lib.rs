//! Heart-sound (phonocardiogram) segmentation and feature extraction.
//!
//! A recording flows through conditioning, onset estimation, adaptive peak
//! detection and cycle segmentation before being summarized as an ordered
//! [`FeatureVector`]. [`HeartSoundPipeline`] runs the whole chain.

pub mod batch;
pub mod config;
pub mod detectors;
pub mod envelope;
pub mod error;
pub mod features;
pub mod filters;
pub mod io;
pub mod pipeline;
pub mod segment;
pub mod signal;
pub mod spectrum;
pub mod validation;

pub use batch::{aggregate_by_site, run_batch, BatchOptions, FileReport, Site, SiteAggregate};
pub use config::PipelineConfig;
pub use detectors::*;
pub use error::{PcgError, PipelineError, Stage};
pub use features::{CardiacFeatures, FeatureSchema, FeatureVector};
pub use pipeline::{Analysis, HeartSoundPipeline};
pub use segment::Segmentation;
pub use signal::*;
pub use validation::ValidationReport;
