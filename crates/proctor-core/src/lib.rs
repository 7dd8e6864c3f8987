//! proctor-core — Face detection and violation tracking for exam proctoring.
//!
//! Uses SCRFD for face detection via ONNX Runtime, and a small state
//! machine that turns per-frame face counts into violations.

use std::path::PathBuf;

pub mod detector;
pub mod session;
pub mod types;

pub use detector::{DetectorError, FaceDetector, ScrfdDetector};
pub use session::{Violation, ViolationCounts, ViolationTracker};
pub use types::BoundingBox;

/// Default directory for ONNX model files: `$XDG_DATA_HOME/proctor/models`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("proctor")
        .join("models")
}
