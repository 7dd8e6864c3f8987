//! Violation evidence: the append-only text log and JPEG screenshots.

use chrono::NaiveDateTime;
use image::RgbImage;
use proctor_core::Violation;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EvidenceError {
    #[error("cannot create screenshot directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot append to {path}: {source}")]
    Append {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot write screenshot {path}: {source}")]
    Screenshot {
        path: PathBuf,
        source: image::ImageError,
    },
}

/// Writes violation records and screenshots.
///
/// The log file is opened, appended and closed on every record; no handle is
/// held between violations.
#[derive(Debug, Clone)]
pub struct EvidenceLog {
    log_path: PathBuf,
    screenshot_dir: PathBuf,
}

impl EvidenceLog {
    /// Prepare the evidence locations, creating the screenshot directory if needed.
    pub fn create(log_path: &Path, screenshot_dir: &Path) -> Result<Self, EvidenceError> {
        std::fs::create_dir_all(screenshot_dir).map_err(|source| EvidenceError::CreateDir {
            path: screenshot_dir.to_path_buf(),
            source,
        })?;
        Ok(Self {
            log_path: log_path.to_path_buf(),
            screenshot_dir: screenshot_dir.to_path_buf(),
        })
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn screenshot_dir(&self) -> &Path {
        &self.screenshot_dir
    }

    /// Append one line to the log, creating the file if absent.
    pub fn append(&self, line: &str) -> Result<(), EvidenceError> {
        let append_err = |source| EvidenceError::Append {
            path: self.log_path.clone(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(append_err)?;
        writeln!(file, "{line}").map_err(append_err)
    }

    /// Save the frame captured at `captured_at` as JPEG evidence for `violation`.
    /// Returns the written path.
    pub fn save_screenshot(
        &self,
        violation: &Violation,
        captured_at: NaiveDateTime,
        image: &RgbImage,
    ) -> Result<PathBuf, EvidenceError> {
        let path = self
            .screenshot_dir
            .join(violation.screenshot_name(captured_at));
        image
            .save_with_format(&path, image::ImageFormat::Jpeg)
            .map_err(|source| EvidenceError::Screenshot {
                path: path.clone(),
                source,
            })?;
        tracing::debug!(path = %path.display(), kind = violation.kind(), "screenshot saved");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use image::Rgb;
    use std::time::Duration;

    fn captured_at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 16)
            .unwrap()
            .and_hms_opt(14, 2, 9)
            .unwrap()
    }

    #[test]
    fn test_create_makes_screenshot_dir() {
        let dir = tempfile::tempdir().unwrap();
        let shots = dir.path().join("nested/screenshots");
        EvidenceLog::create(&dir.path().join("log.txt"), &shots).unwrap();
        assert!(shots.is_dir());
    }

    #[test]
    fn test_append_adds_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("cheating_log.txt");
        let evidence = EvidenceLog::create(&log_path, dir.path()).unwrap();

        evidence.append("first").unwrap();
        evidence.append("second").unwrap();

        let contents = std::fs::read_to_string(&log_path).unwrap();
        assert_eq!(contents, "first\nsecond\n");
    }

    #[test]
    fn test_append_keeps_existing_contents() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("cheating_log.txt");
        std::fs::write(&log_path, "earlier session\n").unwrap();

        let evidence = EvidenceLog::create(&log_path, dir.path()).unwrap();
        evidence.append("new").unwrap();

        let contents = std::fs::read_to_string(&log_path).unwrap();
        assert_eq!(contents, "earlier session\nnew\n");
    }

    #[test]
    fn test_append_to_unwritable_path_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let evidence =
            EvidenceLog::create(&dir.path().join("missing/log.txt"), dir.path()).unwrap();
        assert!(matches!(
            evidence.append("x"),
            Err(EvidenceError::Append { .. })
        ));
    }

    #[test]
    fn test_screenshot_written_as_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let shots = dir.path().join("screenshots");
        let evidence = EvidenceLog::create(&dir.path().join("log.txt"), &shots).unwrap();

        let violation = Violation::FaceMissing {
            duration: Duration::from_millis(3100),
        };
        let image = RgbImage::from_pixel(32, 24, Rgb([90, 90, 90]));
        let path = evidence
            .save_screenshot(&violation, captured_at(), &image)
            .unwrap();

        assert_eq!(path, shots.join("no_face_140209.jpg"));
        let img = image::open(&path).unwrap();
        assert_eq!((img.width(), img.height()), (32, 24));
        assert_eq!(
            image::ImageFormat::from_path(&path).unwrap(),
            image::ImageFormat::Jpeg
        );
    }

    #[test]
    fn test_screenshot_into_missing_dir_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let shots = dir.path().join("screenshots");
        let evidence = EvidenceLog::create(&dir.path().join("log.txt"), &shots).unwrap();
        std::fs::remove_dir(&shots).unwrap();

        let image = RgbImage::new(4, 4);
        assert!(matches!(
            evidence.save_screenshot(&Violation::MultipleFaces { count: 2 }, captured_at(), &image),
            Err(EvidenceError::Screenshot { .. })
        ));
    }
}
