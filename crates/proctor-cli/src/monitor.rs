use crate::display::{Control, Display, DisplayError};
use crate::evidence::EvidenceLog;
use crate::overlay::{self, StatusPanel};
use chrono::NaiveDateTime;
use image::RgbImage;
use proctor_core::{DetectorError, FaceDetector, Violation, ViolationCounts, ViolationTracker};
use proctor_hw::FrameSource;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("display error: {0}")]
    Display(#[from] DisplayError),
}

/// Why a session stopped without a fatal error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// The user pressed the quit key.
    Quit,
    /// The capture source could not supply a frame.
    CaptureFailed(String),
}

/// The monitoring loop: capture, detect, track, record evidence, render, present.
pub struct Monitor<S, D, V> {
    source: S,
    detector: D,
    display: V,
    evidence: EvidenceLog,
    tracker: ViolationTracker,
    frames_seen: u64,
}

impl<S, D, V> Monitor<S, D, V>
where
    S: FrameSource,
    D: FaceDetector,
    V: Display,
{
    pub fn new(source: S, detector: D, display: V, evidence: EvidenceLog) -> Self {
        Self {
            source,
            detector,
            display,
            evidence,
            tracker: ViolationTracker::new(),
            frames_seen: 0,
        }
    }

    /// Run iterations until the user quits or capture fails.
    pub fn run(&mut self) -> Result<SessionEnd, MonitorError> {
        tracing::info!("monitoring started");
        loop {
            if let Some(end) = self.step()? {
                tracing::info!(
                    frames = self.frames_seen,
                    violations = self.tracker.counts().total(),
                    reason = ?end,
                    "monitoring stopped"
                );
                return Ok(end);
            }
        }
    }

    /// One loop iteration. Returns `Some` when the session should end.
    pub fn step(&mut self) -> Result<Option<SessionEnd>, MonitorError> {
        let frame = match self.source.next_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(error = %e, "capture failed; ending session");
                return Ok(Some(SessionEnd::CaptureFailed(e.to_string())));
            }
        };
        self.frames_seen += 1;

        let faces = self
            .detector
            .detect(&frame.data, frame.width, frame.height)?;
        let now = frame.timestamp;
        let captured_at = frame.captured_at;
        tracing::trace!(seq = frame.sequence, faces = faces.len(), "frame processed");

        let mut image = match frame.into_image() {
            Ok(image) => image,
            Err(e) => return Ok(Some(SessionEnd::CaptureFailed(e.to_string()))),
        };

        // Evidence is written from the raw frame, before any overlay is drawn.
        if let Some(violation) = self.tracker.observe(faces.len(), now) {
            self.record(&violation, captured_at, &image);
        }

        let status = StatusPanel {
            clock: captured_at,
            face_count: faces.len(),
            total_violations: self.tracker.counts().total(),
            missing_for: self.tracker.missing_for(now),
        };
        overlay::annotate(&mut image, &faces, &status);

        match self.display.present(&image)? {
            Control::Quit => Ok(Some(SessionEnd::Quit)),
            Control::Continue => Ok(None),
        }
    }

    pub fn counts(&self) -> ViolationCounts {
        self.tracker.counts()
    }

    /// Print, log and screenshot a violation. Write failures are reported and
    /// the session continues.
    fn record(&self, violation: &Violation, captured_at: NaiveDateTime, image: &RgbImage) {
        let line = violation.log_line(captured_at);
        println!("{line}");

        if let Err(e) = self.evidence.append(&line) {
            tracing::warn!(error = %e, kind = violation.kind(), "violation not written to log");
        }

        match self.evidence.save_screenshot(violation, captured_at, image) {
            Ok(path) => println!("Screenshot saved: {}", path.display()),
            Err(e) => {
                tracing::warn!(error = %e, kind = violation.kind(), "screenshot not saved");
            }
        }
    }
}

/// Run a whole session on a source that may have failed to open.
///
/// A source that never opened ends the session the same way a failed read does,
/// with zero counts; the display is only opened once frames can flow.
pub fn run_session<S, D, V>(
    source: Result<S, String>,
    detector: D,
    open_display: impl FnOnce() -> Result<V, DisplayError>,
    evidence: EvidenceLog,
) -> (Result<SessionEnd, MonitorError>, ViolationCounts)
where
    S: FrameSource,
    D: FaceDetector,
    V: Display,
{
    let source = match source {
        Ok(source) => source,
        Err(reason) => {
            tracing::error!(%reason, "capture source unavailable; ending session");
            return (
                Ok(SessionEnd::CaptureFailed(reason)),
                ViolationCounts::default(),
            );
        }
    };
    let display = match open_display() {
        Ok(display) => display,
        Err(e) => return (Err(e.into()), ViolationCounts::default()),
    };

    let mut monitor = Monitor::new(source, detector, display, evidence);
    let outcome = monitor.run();
    (outcome, monitor.counts())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use proctor_core::BoundingBox;
    use proctor_hw::{CameraError, Frame};
    use std::collections::VecDeque;
    use std::path::Path;
    use std::time::{Duration, Instant};

    const WIDTH: u32 = 64;
    const HEIGHT: u32 = 48;

    struct ScriptedSource {
        frames: VecDeque<Frame>,
    }

    impl FrameSource for ScriptedSource {
        fn next_frame(&mut self) -> Result<Frame, CameraError> {
            self.frames
                .pop_front()
                .ok_or_else(|| CameraError::CaptureFailed("end of script".into()))
        }
    }

    /// Returns the scripted number of faces per frame; `None` fails the call.
    struct ScriptedDetector {
        script: VecDeque<Option<usize>>,
    }

    impl FaceDetector for ScriptedDetector {
        fn detect(&mut self, _: &[u8], _: u32, _: u32) -> Result<Vec<BoundingBox>, DetectorError> {
            match self.script.pop_front().flatten() {
                Some(count) => Ok((0..count)
                    .map(|i| BoundingBox::new(8.0 + i as f32 * 2.0, 8.0, 40.0, 32.0))
                    .collect()),
                None => Err(DetectorError::InferenceFailed("scripted failure".into())),
            }
        }
    }

    #[derive(Default)]
    struct RecordingDisplay {
        presented: Vec<RgbImage>,
        quit_after: Option<usize>,
    }

    impl Display for RecordingDisplay {
        fn present(&mut self, image: &RgbImage) -> Result<Control, DisplayError> {
            self.presented.push(image.clone());
            if Some(self.presented.len()) == self.quit_after {
                Ok(Control::Quit)
            } else {
                Ok(Control::Continue)
            }
        }
    }

    fn wall_clock() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 16)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    /// Frames at the given millisecond offsets, all mid-gray.
    fn frames_at(offsets_ms: &[u64]) -> VecDeque<Frame> {
        let base = Instant::now();
        offsets_ms
            .iter()
            .enumerate()
            .map(|(i, &ms)| Frame {
                data: vec![128; (WIDTH * HEIGHT * 3) as usize],
                width: WIDTH,
                height: HEIGHT,
                timestamp: base + Duration::from_millis(ms),
                captured_at: wall_clock() + chrono::Duration::milliseconds(ms as i64),
                sequence: i as u32,
            })
            .collect()
    }

    fn monitor(
        dir: &Path,
        offsets_ms: &[u64],
        counts: &[usize],
        display: RecordingDisplay,
    ) -> Monitor<ScriptedSource, ScriptedDetector, RecordingDisplay> {
        let evidence =
            EvidenceLog::create(&dir.join("cheating_log.txt"), &dir.join("screenshots")).unwrap();
        Monitor::new(
            ScriptedSource {
                frames: frames_at(offsets_ms),
            },
            ScriptedDetector {
                script: counts.iter().map(|&c| Some(c)).collect(),
            },
            display,
            evidence,
        )
    }

    fn log_lines(dir: &Path) -> Vec<String> {
        std::fs::read_to_string(dir.join("cheating_log.txt"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_end_to_end_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = monitor(
            dir.path(),
            &[0, 100, 200, 300, 400, 1500, 2700, 3900, 4000],
            &[1, 1, 2, 2, 0, 0, 0, 0, 1],
            RecordingDisplay::default(),
        );

        let end = m.run().unwrap();
        assert!(matches!(end, SessionEnd::CaptureFailed(_)));

        let counts = m.counts();
        assert_eq!(counts.multiple_faces, 1);
        assert_eq!(counts.missing_face, 1);
        assert_eq!(counts.total(), 2);

        assert_eq!(
            log_lines(dir.path()),
            vec![
                "[2026-10-16 10:00:00] PELANGGARAN: Terdeteksi 2 wajah!",
                "[2026-10-16 10:00:03] PELANGGARAN: Wajah tidak terlihat selama 3.5 detik!",
            ]
        );

        let shots = dir.path().join("screenshots");
        assert!(shots.join("multiple_faces_100000.jpg").is_file());
        assert!(shots.join("no_face_100003.jpg").is_file());
        assert_eq!(m.display.presented.len(), 9);
    }

    #[test]
    fn test_cooldown_suppresses_repeat_within_three_seconds() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = monitor(
            dir.path(),
            &[0, 1000, 2900, 3100],
            &[2, 3, 2, 2],
            RecordingDisplay::default(),
        );
        m.run().unwrap();
        assert_eq!(m.counts().multiple_faces, 2);
        assert_eq!(log_lines(dir.path()).len(), 2);
        assert!(log_lines(dir.path())[1].ends_with("Terdeteksi 2 wajah!"));
    }

    #[test]
    fn test_short_absence_does_not_fire() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = monitor(
            dir.path(),
            &[0, 1000, 2000, 2100, 2200, 4000, 5000],
            &[0, 0, 0, 1, 0, 0, 0],
            RecordingDisplay::default(),
        );
        m.run().unwrap();
        assert_eq!(m.counts().total(), 0);
        assert!(log_lines(dir.path()).is_empty());
    }

    #[test]
    fn test_repeated_absence_fires_each_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = monitor(
            dir.path(),
            &[0, 3100, 3200, 6300, 6400],
            &[0, 0, 0, 0, 0],
            RecordingDisplay::default(),
        );
        m.run().unwrap();
        assert_eq!(m.counts().missing_face, 2);
        let lines = log_lines(dir.path());
        assert!(lines[0].ends_with("Wajah tidak terlihat selama 3.1 detik!"));
        assert!(lines[1].ends_with("Wajah tidak terlihat selama 3.1 detik!"));
    }

    #[test]
    fn test_quit_key_ends_gracefully() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = monitor(
            dir.path(),
            &[0, 100, 200, 300],
            &[1, 1, 1, 1],
            RecordingDisplay {
                quit_after: Some(2),
                ..Default::default()
            },
        );
        assert_eq!(m.run().unwrap(), SessionEnd::Quit);
        assert_eq!(m.display.presented.len(), 2);
        assert_eq!(m.source.frames.len(), 2);
    }

    #[test]
    fn test_screenshot_is_raw_frame_but_display_is_annotated() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = monitor(dir.path(), &[0], &[2], RecordingDisplay::default());
        m.run().unwrap();

        // Top edge of the first box at (30, 8).
        let shown = &m.display.presented[0];
        assert_eq!(shown.get_pixel(30, 8).0, [255, 0, 0]);

        let shot = image::open(dir.path().join("screenshots/multiple_faces_100000.jpg"))
            .unwrap()
            .to_rgb8();
        let px = shot.get_pixel(30, 8).0;
        assert!(
            px.iter().all(|&c| (c as i32 - 128).abs() < 16),
            "screenshot should not contain overlay, got {px:?}"
        );
    }

    #[test]
    fn test_detector_failure_is_fatal_and_keeps_counts() {
        let dir = tempfile::tempdir().unwrap();
        let evidence =
            EvidenceLog::create(&dir.path().join("log.txt"), &dir.path().join("shots")).unwrap();
        let mut m = Monitor::new(
            ScriptedSource {
                frames: frames_at(&[0, 100, 200]),
            },
            ScriptedDetector {
                script: VecDeque::from(vec![Some(2), None, Some(1)]),
            },
            RecordingDisplay::default(),
            evidence,
        );

        assert!(matches!(m.run(), Err(MonitorError::Detector(_))));
        assert_eq!(m.counts().multiple_faces, 1);
        assert_eq!(m.counts().total(), 1);
    }

    #[test]
    fn test_evidence_failure_does_not_stop_session() {
        let dir = tempfile::tempdir().unwrap();
        let evidence = EvidenceLog::create(
            &dir.path().join("no-such-dir/log.txt"),
            &dir.path().join("shots"),
        )
        .unwrap();
        let mut m = Monitor::new(
            ScriptedSource {
                frames: frames_at(&[0, 100, 3500]),
            },
            ScriptedDetector {
                script: VecDeque::from(vec![Some(0), Some(0), Some(0)]),
            },
            RecordingDisplay::default(),
            evidence,
        );

        assert!(matches!(m.run().unwrap(), SessionEnd::CaptureFailed(_)));
        assert_eq!(m.counts().missing_face, 1);
        assert_eq!(m.display.presented.len(), 3);
        assert!(dir.path().join("shots/no_face_100003.jpg").is_file());
    }

    #[test]
    fn test_step_reports_capture_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = monitor(dir.path(), &[], &[], RecordingDisplay::default());
        match m.step().unwrap() {
            Some(SessionEnd::CaptureFailed(reason)) => assert!(reason.contains("end of script")),
            other => panic!("expected capture failure, got {other:?}"),
        }
    }

    #[test]
    fn test_session_with_unopened_source_ends_with_zero_counts() {
        let dir = tempfile::tempdir().unwrap();
        let evidence =
            EvidenceLog::create(&dir.path().join("log.txt"), &dir.path().join("shots")).unwrap();
        let mut display_opened = false;

        let (outcome, counts) = run_session(
            Err::<ScriptedSource, _>("device not found: /dev/video0".to_string()),
            ScriptedDetector {
                script: VecDeque::new(),
            },
            || {
                display_opened = true;
                Ok(RecordingDisplay::default())
            },
            evidence,
        );

        assert_eq!(
            outcome.unwrap(),
            SessionEnd::CaptureFailed("device not found: /dev/video0".into())
        );
        assert_eq!(counts.total(), 0);
        assert!(!display_opened);
        assert!(log_lines(dir.path()).is_empty());
    }

    #[test]
    fn test_session_runs_until_source_is_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        let evidence =
            EvidenceLog::create(&dir.path().join("cheating_log.txt"), &dir.path().join("shots"))
                .unwrap();

        let (outcome, counts) = run_session(
            Ok(ScriptedSource {
                frames: frames_at(&[0, 100]),
            }),
            ScriptedDetector {
                script: VecDeque::from(vec![Some(3), Some(1)]),
            },
            || Ok(RecordingDisplay::default()),
            evidence,
        );

        assert!(matches!(outcome, Ok(SessionEnd::CaptureFailed(_))));
        assert_eq!(counts.multiple_faces, 1);
        assert_eq!(log_lines(dir.path()).len(), 1);
    }

    #[test]
    fn test_mismatched_frame_buffer_ends_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut frames = frames_at(&[0]);
        frames[0].data.truncate(10);
        let evidence =
            EvidenceLog::create(&dir.path().join("log.txt"), &dir.path().join("shots")).unwrap();
        let mut m = Monitor::new(
            ScriptedSource { frames },
            ScriptedDetector {
                script: VecDeque::from(vec![Some(1)]),
            },
            RecordingDisplay::default(),
            evidence,
        );

        assert!(matches!(m.step().unwrap(), Some(SessionEnd::CaptureFailed(_))));
        assert!(m.display.presented.is_empty());
    }
}
