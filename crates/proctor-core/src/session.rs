//! Violation tracking for a monitoring session.
//!
//! Turns the per-frame face count into at most one violation per frame:
//!
//! - more than one face fires a multiple-faces violation, rate-limited by
//!   [`WARNING_COOLDOWN`];
//! - a contiguous run of zero-face frames longer than [`MISSING_FACE_THRESHOLD`]
//!   fires a face-missing violation and restarts the absence timer.
//!
//! The tracker is pure: callers pass the capture instant of each frame, which
//! keeps the timing rules testable with synthetic clocks.

use chrono::NaiveDateTime;
use std::time::{Duration, Instant};

/// Minimum gap between two multiple-faces violations.
pub const WARNING_COOLDOWN: Duration = Duration::from_secs(3);

/// Absence longer than this fires a face-missing violation.
pub const MISSING_FACE_THRESHOLD: Duration = Duration::from_secs(3);

const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const SCREENSHOT_TIME_FORMAT: &str = "%H%M%S";

/// A suspicious condition detected on one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    /// More than one face in frame.
    MultipleFaces { count: usize },
    /// No face visible for longer than the threshold.
    FaceMissing { duration: Duration },
}

impl Violation {
    /// Human-readable detail, as written after `PELANGGARAN:` in the log.
    pub fn detail(&self) -> String {
        match self {
            Violation::MultipleFaces { count } => format!("Terdeteksi {count} wajah!"),
            Violation::FaceMissing { duration } => format!(
                "Wajah tidak terlihat selama {:.1} detik!",
                duration.as_secs_f64()
            ),
        }
    }

    /// Full log record: `[YYYY-MM-DD HH:MM:SS] PELANGGARAN: <detail>`.
    pub fn log_line(&self, at: NaiveDateTime) -> String {
        format!(
            "[{}] PELANGGARAN: {}",
            at.format(LOG_TIMESTAMP_FORMAT),
            self.detail()
        )
    }

    /// Evidence file name, keyed by violation kind and time of day.
    pub fn screenshot_name(&self, at: NaiveDateTime) -> String {
        format!("{}_{}.jpg", self.kind(), at.format(SCREENSHOT_TIME_FORMAT))
    }

    /// Short machine-friendly kind, used in file names and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Violation::MultipleFaces { .. } => "multiple_faces",
            Violation::FaceMissing { .. } => "no_face",
        }
    }
}

/// Per-kind violation counters. Never reset during a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViolationCounts {
    pub multiple_faces: u32,
    pub missing_face: u32,
}

impl ViolationCounts {
    pub fn total(&self) -> u32 {
        self.multiple_faces + self.missing_face
    }
}

/// Session state for the two violation rules.
#[derive(Debug, Default)]
pub struct ViolationTracker {
    /// Start of the open run of zero-face frames, if any.
    face_missing_since: Option<Instant>,
    /// When the last multiple-faces violation fired.
    last_multiple_warning: Option<Instant>,
    counts: ViolationCounts,
}

impl ViolationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update the session with the face count of a frame captured at `now`.
    pub fn observe(&mut self, face_count: usize, now: Instant) -> Option<Violation> {
        let mut fired = None;

        if face_count > 1 {
            let cooled_down = self
                .last_multiple_warning
                .map_or(true, |last| now.saturating_duration_since(last) > WARNING_COOLDOWN);
            if cooled_down {
                self.counts.multiple_faces += 1;
                self.last_multiple_warning = Some(now);
                fired = Some(Violation::MultipleFaces { count: face_count });
            }
        }

        if face_count == 0 {
            let since = *self.face_missing_since.get_or_insert(now);
            let duration = now.saturating_duration_since(since);
            if duration > MISSING_FACE_THRESHOLD {
                self.counts.missing_face += 1;
                // The next zero-face frame starts a fresh countdown.
                self.face_missing_since = None;
                fired = Some(Violation::FaceMissing { duration });
            }
        } else {
            self.face_missing_since = None;
        }

        if let Some(violation) = &fired {
            tracing::debug!(
                kind = violation.kind(),
                face_count,
                total = self.counts.total(),
                "violation fired"
            );
        }
        fired
    }

    /// Elapsed absence while the missing-face timer runs.
    pub fn missing_for(&self, now: Instant) -> Option<Duration> {
        self.face_missing_since
            .map(|since| now.saturating_duration_since(since))
    }

    pub fn is_face_missing(&self) -> bool {
        self.face_missing_since.is_some()
    }

    pub fn counts(&self) -> ViolationCounts {
        self.counts
    }
}
