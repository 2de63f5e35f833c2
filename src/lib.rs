pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

#[cfg(feature = "v4l2")]
pub use adapters::v4l2::V4l2Source;

pub use adapters::storage::LocalStorage;
pub use config::profile::CaptureProfile;
pub use crate::core::{
    boot_config::BootConfig,
    engine::{describe_device, CaptureEngine},
    pipeline::CapturePipeline,
};
pub use utils::error::{PicamError, Result};
