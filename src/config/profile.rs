use crate::core::{CaptureRequest, CaptureSettings};
use crate::domain::model::{FourCc, FrameInterval, Resolution};
use crate::utils::error::{PicamError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_DEVICE: &str = "/dev/video0";
pub const DEFAULT_OUTPUT: &str = ".";
pub const DEFAULT_PATTERN: &str = "frame-{index}.{ext}";

/// Capture profile loaded from TOML. Every table is optional; missing
/// values fall back to 1280x720 MJPG at 10 fps, ten frames from /dev/video0.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaptureProfile {
    pub device: Option<DeviceSection>,
    pub capture: Option<CaptureSection>,
    pub output: Option<OutputSection>,
    pub monitoring: Option<MonitoringSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceSection {
    pub path: Option<String>,
    pub verify_format: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaptureSection {
    pub format: Option<FourCc>,
    pub resolution: Option<Resolution>,
    pub interval: Option<FrameInterval>,
    pub frames: Option<usize>,
    pub buffers: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputSection {
    pub path: Option<String>,
    pub pattern: Option<String>,
    pub archive: Option<bool>,
    pub manifest: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitoringSection {
    pub enabled: bool,
}

impl CaptureProfile {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(PicamError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| PicamError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${CAMERA_DEVICE})，未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| PicamError::ConfigError {
            message: format!("env substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn device_mut(&mut self) -> &mut DeviceSection {
        self.device.get_or_insert_with(Default::default)
    }

    pub fn capture_mut(&mut self) -> &mut CaptureSection {
        self.capture.get_or_insert_with(Default::default)
    }

    pub fn output_mut(&mut self) -> &mut OutputSection {
        self.output.get_or_insert_with(Default::default)
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    pub fn set_monitoring(&mut self, enabled: bool) {
        self.monitoring = Some(MonitoringSection { enabled });
    }

    pub fn validate_config(&self) -> Result<()> {
        let request = self.request();

        validation::validate_device_path("device.path", CaptureSettings::device(self))?;
        validation::validate_fourcc("capture.format", request.format)?;
        validation::validate_resolution("capture.resolution", request.resolution)?;
        validation::validate_interval("capture.interval", request.interval)?;
        validation::validate_positive_number("capture.frames", request.frame_count, 1)?;
        validation::validate_range("capture.buffers", request.buffers, 1, 32)?;
        validation::validate_path("output.path", self.output_path())?;
        validation::validate_file_pattern("output.pattern", self.file_pattern())?;

        Ok(())
    }
}

impl CaptureSettings for CaptureProfile {
    fn device(&self) -> &str {
        self.device
            .as_ref()
            .and_then(|d| d.path.as_deref())
            .unwrap_or(DEFAULT_DEVICE)
    }

    fn request(&self) -> CaptureRequest {
        let defaults = CaptureRequest::default();
        let Some(capture) = &self.capture else {
            return defaults;
        };
        CaptureRequest {
            format: capture.format.unwrap_or(defaults.format),
            resolution: capture.resolution.unwrap_or(defaults.resolution),
            interval: capture.interval.unwrap_or(defaults.interval),
            frame_count: capture.frames.unwrap_or(defaults.frame_count),
            buffers: capture.buffers.unwrap_or(defaults.buffers),
        }
    }

    fn output_path(&self) -> &str {
        self.output
            .as_ref()
            .and_then(|o| o.path.as_deref())
            .unwrap_or(DEFAULT_OUTPUT)
    }

    fn file_pattern(&self) -> &str {
        self.output
            .as_ref()
            .and_then(|o| o.pattern.as_deref())
            .unwrap_or(DEFAULT_PATTERN)
    }

    fn archive(&self) -> bool {
        self.output.as_ref().and_then(|o| o.archive).unwrap_or(false)
    }

    fn write_manifest(&self) -> bool {
        self.output.as_ref().and_then(|o| o.manifest).unwrap_or(true)
    }

    fn verify_format(&self) -> bool {
        self.device
            .as_ref()
            .and_then(|d| d.verify_format)
            .unwrap_or(true)
    }
}

impl Validate for CaptureProfile {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_profile_uses_capture_defaults() {
        let profile = CaptureProfile::from_toml_str("").unwrap();
        let request = profile.request();

        assert_eq!(CaptureSettings::device(&profile), "/dev/video0");
        assert_eq!(request.format, FourCc::MJPG);
        assert_eq!(request.resolution, Resolution::new(1280, 720));
        assert_eq!(request.interval, FrameInterval::new(1, 10));
        assert_eq!(request.frame_count, 10);
        assert_eq!(profile.file_pattern(), "frame-{index}.{ext}");
        assert!(!profile.archive());
        assert!(profile.write_manifest());
        assert!(profile.validate().is_ok());
    }

    #[test]
    fn test_parse_full_profile() {
        let toml_content = r#"
[device]
path = "/dev/video2"
verify_format = false

[capture]
format = "YUYV"
resolution = "640x480"
interval = "1/30"
frames = 3
buffers = 4

[output]
path = "./captures"
pattern = "shot-{index}.{ext}"
archive = true

[monitoring]
enabled = true
"#;

        let profile = CaptureProfile::from_toml_str(toml_content).unwrap();
        let request = profile.request();

        assert_eq!(CaptureSettings::device(&profile), "/dev/video2");
        assert!(!profile.verify_format());
        assert_eq!(request.format, FourCc::YUYV);
        assert_eq!(request.resolution, Resolution::new(640, 480));
        assert_eq!(request.interval.denominator, 30);
        assert_eq!(request.frame_count, 3);
        assert_eq!(request.buffers, 4);
        assert!(profile.archive());
        assert!(profile.monitoring_enabled());
        assert!(profile.validate().is_ok());
    }

    #[test]
    fn test_bad_resolution_is_a_parse_error() {
        let result = CaptureProfile::from_toml_str("[capture]\nresolution = \"wide\"\n");
        assert!(matches!(
            result,
            Err(PicamError::ConfigValidationError { .. })
        ));
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("PICAM_TEST_DEVICE", "/dev/video9");

        let profile =
            CaptureProfile::from_toml_str("[device]\npath = \"${PICAM_TEST_DEVICE}\"\n").unwrap();
        assert_eq!(CaptureSettings::device(&profile), "/dev/video9");

        std::env::remove_var("PICAM_TEST_DEVICE");
    }

    #[test]
    fn test_zero_frames_fails_validation() {
        let profile = CaptureProfile::from_toml_str("[capture]\nframes = 0\n").unwrap();
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_profile_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[output]\npath = \"/tmp/picam\"\n")
            .unwrap();

        let profile = CaptureProfile::from_file(temp_file.path()).unwrap();
        assert_eq!(profile.output_path(), "/tmp/picam");
    }
}
