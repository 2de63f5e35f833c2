use crate::utils::error::{PicamError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Four-character pixel format code, e.g. `MJPG` or `YUYV`.
///
/// Codes shorter than four characters are padded with spaces, the same way
/// V4L2 defines formats like `Y10 `.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FourCc([u8; 4]);

impl FourCc {
    pub const MJPG: FourCc = FourCc(*b"MJPG");
    pub const JPEG: FourCc = FourCc(*b"JPEG");
    pub const YUYV: FourCc = FourCc(*b"YUYV");

    pub fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_jpeg(&self) -> bool {
        *self == Self::MJPG || *self == Self::JPEG
    }

    pub fn file_extension(&self) -> &'static str {
        if self.is_jpeg() {
            "jpg"
        } else {
            "raw"
        }
    }
}

impl FromStr for FourCc {
    type Err = PicamError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| PicamError::InvalidConfigValueError {
            field: "format".to_string(),
            value: s.to_string(),
            reason: reason.to_string(),
        };

        if s.is_empty() || s.len() > 4 {
            return Err(invalid("Pixel format must be 1 to 4 characters"));
        }
        if !s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b' ') {
            return Err(invalid("Pixel format must be ASCII letters or digits"));
        }

        let mut code = [b' '; 4];
        code[..s.len()].copy_from_slice(s.as_bytes());
        Ok(Self(code))
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text: String = self.0.iter().map(|b| *b as char).collect();
        f.write_str(text.trim_end())
    }
}

impl TryFrom<String> for FourCc {
    type Error = PicamError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<FourCc> for String {
    fn from(value: FourCc) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl FromStr for Resolution {
    type Err = PicamError;

    fn from_str(s: &str) -> Result<Self> {
        let parsed = s
            .trim()
            .split_once(['x', 'X'])
            .and_then(|(w, h)| Some((w.trim().parse().ok()?, h.trim().parse().ok()?)));

        match parsed {
            Some((width, height)) => Ok(Self { width, height }),
            None => Err(PicamError::InvalidConfigValueError {
                field: "resolution".to_string(),
                value: s.to_string(),
                reason: "Expected WIDTHxHEIGHT, e.g. 1280x720".to_string(),
            }),
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl TryFrom<String> for Resolution {
    type Error = PicamError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Resolution> for String {
    fn from(value: Resolution) -> Self {
        value.to_string()
    }
}

impl From<(u32, u32)> for Resolution {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

/// Seconds per frame as a fraction; `1/10` is 10 fps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FrameInterval {
    pub numerator: u32,
    pub denominator: u32,
}

impl FrameInterval {
    pub fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    pub fn from_fps(fps: u32) -> Self {
        Self::new(1, fps)
    }

    pub fn fps(&self) -> f64 {
        if self.numerator == 0 {
            return 0.0;
        }
        self.denominator as f64 / self.numerator as f64
    }
}

impl FromStr for FrameInterval {
    type Err = PicamError;

    fn from_str(s: &str) -> Result<Self> {
        let parsed = s
            .trim()
            .split_once('/')
            .and_then(|(n, d)| Some((n.trim().parse().ok()?, d.trim().parse().ok()?)));

        match parsed {
            Some((numerator, denominator)) => Ok(Self {
                numerator,
                denominator,
            }),
            None => Err(PicamError::InvalidConfigValueError {
                field: "interval".to_string(),
                value: s.to_string(),
                reason: "Expected NUMERATOR/DENOMINATOR, e.g. 1/10 for 10 fps".to_string(),
            }),
        }
    }
}

impl fmt::Display for FrameInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

impl TryFrom<String> for FrameInterval {
    type Error = PicamError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<FrameInterval> for String {
    fn from(value: FrameInterval) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntervalSupport {
    Discrete {
        intervals: Vec<FrameInterval>,
    },
    Stepwise {
        min: FrameInterval,
        max: FrameInterval,
        step: FrameInterval,
    },
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureMode {
    pub resolution: Resolution,
    pub intervals: IntervalSupport,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolutionSupport {
    Discrete {
        modes: Vec<CaptureMode>,
    },
    Stepwise {
        min: Resolution,
        max: Resolution,
        step: Resolution,
    },
    Unknown,
}

impl ResolutionSupport {
    /// `Unknown` accepts everything: the driver refused to enumerate, so the
    /// final word belongs to the driver when streaming starts.
    pub fn contains(&self, resolution: Resolution) -> bool {
        match self {
            ResolutionSupport::Discrete { modes } => {
                modes.iter().any(|m| m.resolution == resolution)
            }
            ResolutionSupport::Stepwise { min, max, step } => {
                let on_step = |value: u32, min: u32, step: u32| {
                    step == 0 || (value - min) % step == 0
                };
                resolution.width >= min.width
                    && resolution.width <= max.width
                    && resolution.height >= min.height
                    && resolution.height <= max.height
                    && on_step(resolution.width, min.width, step.width)
                    && on_step(resolution.height, min.height, step.height)
            }
            ResolutionSupport::Unknown => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatDescriptor {
    pub fourcc: FourCc,
    pub description: String,
    pub compressed: bool,
    pub emulated: bool,
    pub resolutions: ResolutionSupport,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceCapabilities {
    pub device: String,
    pub formats: Vec<FormatDescriptor>,
}

impl DeviceCapabilities {
    pub fn find_format(&self, fourcc: FourCc) -> Option<&FormatDescriptor> {
        self.formats.iter().find(|f| f.fourcc == fourcc)
    }

    /// Rejects requests the device cannot satisfy before any buffer is mapped.
    pub fn check(&self, request: &CaptureRequest) -> Result<()> {
        let available = || {
            self.formats
                .iter()
                .map(|f| f.fourcc.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };

        let Some(format) = self.find_format(request.format) else {
            return Err(PicamError::UnsupportedFormatError {
                device: self.device.clone(),
                format: request.format.to_string(),
                available: available(),
            });
        };

        if !format.resolutions.contains(request.resolution) {
            return Err(PicamError::UnsupportedFormatError {
                device: self.device.clone(),
                format: format!("{} @ {}", request.format, request.resolution),
                available: available(),
            });
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureRequest {
    pub format: FourCc,
    pub resolution: Resolution,
    pub interval: FrameInterval,
    pub frame_count: usize,
    pub buffers: u32,
}

impl Default for CaptureRequest {
    fn default() -> Self {
        Self {
            format: FourCc::MJPG,
            resolution: Resolution::new(1280, 720),
            interval: FrameInterval::new(1, 10),
            frame_count: 10,
            buffers: 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Frame {
    pub index: usize,
    pub data: Vec<u8>,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct PackagedFrame {
    pub index: usize,
    pub file_name: String,
    pub data: Vec<u8>,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct PackagedCapture {
    pub frames: Vec<PackagedFrame>,
    pub manifest_csv: String,
    pub summary_json: String,
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureReport {
    pub frames_written: usize,
    pub frames_skipped: usize,
    pub bytes_written: u64,
    pub files: Vec<String>,
    pub archive: Option<String>,
}
