use crate::domain::model::{
    CaptureReport, CaptureRequest, DeviceCapabilities, Frame, PackagedCapture,
};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    /// Human readable location of `path` for reports.
    fn locate(&self, path: &str) -> String;
}

/// Blocking access to a camera. Implementations are driven from a blocking
/// thread so they may hold the device for the whole call.
pub trait FrameSource: Send + Sync + 'static {
    fn device(&self) -> &str;
    fn describe(&self) -> Result<DeviceCapabilities>;
    fn capture(&self, request: &CaptureRequest) -> Result<Vec<Frame>>;
}

pub trait CaptureSettings: Send + Sync {
    fn device(&self) -> &str;
    fn request(&self) -> CaptureRequest;
    fn output_path(&self) -> &str;
    fn file_pattern(&self) -> &str;
    fn archive(&self) -> bool;
    fn write_manifest(&self) -> bool;
    fn verify_format(&self) -> bool;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn acquire(&self) -> Result<Vec<Frame>>;
    async fn package(&self, frames: Vec<Frame>) -> Result<PackagedCapture>;
    async fn persist(&self, capture: PackagedCapture) -> Result<CaptureReport>;
}
