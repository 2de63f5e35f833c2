pub mod boot_config;
pub mod doctor;
pub mod engine;
pub mod pipeline;

pub use crate::domain::model::{
    CaptureReport, CaptureRequest, DeviceCapabilities, Frame, PackagedCapture, PackagedFrame,
};
pub use crate::domain::ports::{CaptureSettings, FrameSource, Pipeline, Storage};
pub use crate::utils::error::Result;
