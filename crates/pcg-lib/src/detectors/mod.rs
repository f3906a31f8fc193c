pub mod heart;

pub use heart::{
    detect_heart_sounds, detect_heart_sounds_with_config, estimate_tempo, DetectionOutcome,
    PeakDetection,
};
