use super::profile::CaptureProfile;
use crate::core::boot_config::{DEFAULT_BOOT_CONFIG, DEFAULT_OVERLAY};
use crate::domain::model::{FourCc, FrameInterval, Resolution};
use crate::utils::error::Result;
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Clone, Parser)]
#[command(name = "picam")]
#[command(about = "Raspberry Pi camera setup checks and V4L2 frame capture")]
pub struct CliConfig {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log CPU and memory usage per stage")]
    pub monitor: bool,

    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    pub log_json: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// List pixel formats, resolutions and frame intervals of a device
    Formats {
        #[arg(long, default_value = "/dev/video0")]
        device: String,

        /// Print capabilities as JSON
        #[arg(long)]
        json: bool,
    },
    /// Capture frames to disk
    Capture(CaptureArgs),
    /// Inspect or edit the camera overlay in the boot config
    Overlay {
        #[command(subcommand)]
        action: OverlayAction,
    },
    /// Verify that libcamera, GStreamer and OpenCV are installed
    Doctor,
}

#[derive(Debug, Clone, Args)]
pub struct CaptureArgs {
    /// TOML capture profile; flags below override its values
    #[arg(short, long)]
    pub profile: Option<String>,

    #[arg(long)]
    pub device: Option<String>,

    /// Pixel format FourCC, e.g. MJPG or YUYV
    #[arg(long)]
    pub format: Option<FourCc>,

    /// WIDTHxHEIGHT
    #[arg(long)]
    pub resolution: Option<Resolution>,

    /// Frame interval as NUM/DEN seconds, e.g. 1/10
    #[arg(long)]
    pub interval: Option<FrameInterval>,

    #[arg(short = 'n', long)]
    pub frames: Option<usize>,

    #[arg(short, long)]
    pub output: Option<String>,

    /// File name pattern with {index}, {ext} and {ts} placeholders
    #[arg(long)]
    pub pattern: Option<String>,

    /// Bundle frames and manifest into capture.zip
    #[arg(long)]
    pub archive: bool,

    #[arg(long)]
    pub no_manifest: bool,

    /// Start streaming without checking the format against the device
    #[arg(long)]
    pub skip_verify: bool,
}

impl CaptureArgs {
    /// Loads the profile (or defaults) and applies command line overrides.
    pub fn resolve(&self, monitor: bool) -> Result<CaptureProfile> {
        let mut profile = match &self.profile {
            Some(path) => {
                tracing::info!("📁 Loading capture profile from: {}", path);
                CaptureProfile::from_file(path)?
            }
            None => CaptureProfile::default(),
        };

        if let Some(device) = &self.device {
            profile.device_mut().path = Some(device.clone());
        }
        if self.skip_verify {
            profile.device_mut().verify_format = Some(false);
        }

        let capture = profile.capture_mut();
        if let Some(format) = self.format {
            capture.format = Some(format);
        }
        if let Some(resolution) = self.resolution {
            capture.resolution = Some(resolution);
        }
        if let Some(interval) = self.interval {
            capture.interval = Some(interval);
        }
        if let Some(frames) = self.frames {
            capture.frames = Some(frames);
        }

        let output = profile.output_mut();
        if let Some(path) = &self.output {
            output.path = Some(path.clone());
        }
        if let Some(pattern) = &self.pattern {
            output.pattern = Some(pattern.clone());
        }
        if self.archive {
            output.archive = Some(true);
        }
        if self.no_manifest {
            output.manifest = Some(false);
        }

        if monitor {
            profile.set_monitoring(true);
        }

        Ok(profile)
    }
}

#[derive(Debug, Clone, Args)]
pub struct OverlayTarget {
    #[arg(long, default_value = DEFAULT_BOOT_CONFIG)]
    pub config: String,

    #[arg(long, default_value = DEFAULT_OVERLAY)]
    pub overlay: String,
}

#[derive(Debug, Clone, Subcommand)]
pub enum OverlayAction {
    /// Show whether the overlay is active
    Status {
        #[command(flatten)]
        target: OverlayTarget,
    },
    /// Add dtoverlay=<overlay> and turn off camera auto-detection
    Enable {
        #[command(flatten)]
        target: OverlayTarget,

        /// Leave camera_auto_detect untouched
        #[arg(long)]
        keep_auto_detect: bool,

        /// Print the resulting file instead of writing it
        #[arg(long)]
        dry_run: bool,
    },
    /// Comment out dtoverlay=<overlay> lines
    Disable {
        #[command(flatten)]
        target: OverlayTarget,

        #[arg(long)]
        dry_run: bool,
    },
}
