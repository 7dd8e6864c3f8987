use std::path::PathBuf;

/// Session configuration, loaded from environment variables.
///
/// Only resource locations are configurable; the violation thresholds are
/// fixed constants in `proctor_core::session`.
#[derive(Debug, Clone)]
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Directory containing the SCRFD ONNX model.
    pub model_dir: PathBuf,
    /// Append-only violation log (default: cheating_log.txt).
    pub log_path: PathBuf,
    /// Directory for evidence screenshots (default: screenshots/).
    pub screenshot_dir: PathBuf,
    /// Number of frames discarded after the stream starts (exposure stabilization).
    pub warmup_frames: usize,
    /// Run without a preview window even when one is available.
    pub headless: bool,
}

impl Config {
    /// Load configuration from `PROCTOR_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            camera_device: var("PROCTOR_CAMERA_DEVICE").unwrap_or_else(|| "/dev/video0".to_string()),
            model_dir: var("PROCTOR_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(proctor_core::default_model_dir),
            log_path: var("PROCTOR_LOG_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("cheating_log.txt")),
            screenshot_dir: var("PROCTOR_SCREENSHOT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("screenshots")),
            warmup_frames: var("PROCTOR_WARMUP_FRAMES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(4),
            headless: var("PROCTOR_HEADLESS").is_some_and(|v| v != "0"),
        }
    }

    /// Path to the SCRFD detection model.
    pub fn scrfd_model_path(&self) -> String {
        self.model_dir
            .join("det_500m.onnx")
            .to_string_lossy()
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(vars: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults_match_output_contract() {
        let config = config_with(&[]);
        assert_eq!(config.camera_device, "/dev/video0");
        assert_eq!(config.log_path, PathBuf::from("cheating_log.txt"));
        assert_eq!(config.screenshot_dir, PathBuf::from("screenshots"));
        assert_eq!(config.warmup_frames, 4);
        assert!(!config.headless);
    }

    #[test]
    fn test_overrides() {
        let config = config_with(&[
            ("PROCTOR_CAMERA_DEVICE", "/dev/video3"),
            ("PROCTOR_MODEL_DIR", "/opt/models"),
            ("PROCTOR_WARMUP_FRAMES", "0"),
            ("PROCTOR_HEADLESS", "1"),
        ]);
        assert_eq!(config.camera_device, "/dev/video3");
        assert_eq!(config.scrfd_model_path(), "/opt/models/det_500m.onnx");
        assert_eq!(config.warmup_frames, 0);
        assert!(config.headless);
    }

    #[test]
    fn test_unparseable_warmup_falls_back() {
        let config = config_with(&[("PROCTOR_WARMUP_FRAMES", "lots"), ("PROCTOR_HEADLESS", "0")]);
        assert_eq!(config.warmup_frames, 4);
        assert!(!config.headless);
    }
}
