//! Console banner and end-of-session summary.

use crate::display::QUIT_KEY;
use crate::evidence::EvidenceLog;
use proctor_core::session::MISSING_FACE_THRESHOLD;
use proctor_core::ViolationCounts;

const RULE_WIDTH: usize = 50;

pub fn banner() -> String {
    [
        "=== Exam Proctoring Monitor ===".to_string(),
        "Watching for two suspicious conditions:".to_string(),
        "1. More than one face in frame".to_string(),
        format!(
            "2. No face visible for more than {} seconds",
            MISSING_FACE_THRESHOLD.as_secs()
        ),
        format!("Press '{QUIT_KEY}' to quit"),
        "-".repeat(RULE_WIDTH),
    ]
    .join("\n")
}

/// Console line for a session ended by the capture source.
pub fn capture_failed(reason: &str) -> String {
    format!("Error: cannot read from webcam ({reason})")
}

pub fn summary(counts: &ViolationCounts, evidence: &EvidenceLog) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    [
        String::new(),
        rule.clone(),
        "MONITORING SUMMARY".to_string(),
        rule.clone(),
        format!("Total violations: {}", counts.total()),
        format!("- Multiple faces: {}", counts.multiple_faces),
        format!("- Missing face: {}", counts.missing_face),
        format!("Log file: '{}'", evidence.log_path().display()),
        format!("Screenshots: folder '{}/'", evidence.screenshot_dir().display()),
        rule,
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_banner_mentions_conditions_and_quit_key() {
        let text = banner();
        assert!(text.contains("More than one face"));
        assert!(text.contains("more than 3 seconds"));
        assert!(text.contains("Press 'q' to quit"));
    }

    #[test]
    fn test_capture_failed_line_names_reason() {
        assert_eq!(
            capture_failed("device not found: /dev/video9"),
            "Error: cannot read from webcam (device not found: /dev/video9)"
        );
    }

    #[test]
    fn test_summary_with_no_violations() {
        let dir = tempfile::tempdir().unwrap();
        let evidence = EvidenceLog::create(Path::new("cheating_log.txt"), dir.path()).unwrap();
        let text = summary(&ViolationCounts::default(), &evidence);
        assert!(text.contains("Total violations: 0"));
        assert!(text.contains("- Multiple faces: 0"));
        assert!(text.contains("- Missing face: 0"));
    }

    #[test]
    fn test_summary_breakdown() {
        let dir = tempfile::tempdir().unwrap();
        let shots = dir.path().join("screenshots");
        let evidence = EvidenceLog::create(Path::new("cheating_log.txt"), &shots).unwrap();
        let counts = ViolationCounts {
            multiple_faces: 2,
            missing_face: 3,
        };

        let text = summary(&counts, &evidence);
        assert!(text.contains("Total violations: 5"));
        assert!(text.contains("- Multiple faces: 2"));
        assert!(text.contains("- Missing face: 3"));
        assert!(text.contains("Log file: 'cheating_log.txt'"));
        assert!(text.contains(&format!("Screenshots: folder '{}/'", shots.display())));
    }
}
