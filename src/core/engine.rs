use crate::core::{CaptureReport, DeviceCapabilities, FrameSource, Pipeline};
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

pub struct CaptureEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> CaptureEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub async fn run(&self) -> Result<CaptureReport> {
        tracing::info!("🚀 Starting capture");
        self.monitor.log_stats("Start");

        // Acquire
        let frames = self.pipeline.acquire().await?;
        let raw_bytes: u64 = frames.iter().map(|f| f.data.len() as u64).sum();
        tracing::info!("📷 Acquired {} frames ({} bytes)", frames.len(), raw_bytes);
        self.monitor.log_stats("Acquire");

        // Package
        let packaged = self.pipeline.package(frames).await?;
        tracing::info!(
            "📦 Packaged {} frames ({} skipped)",
            packaged.frames.len(),
            packaged.skipped
        );
        self.monitor.log_stats("Package");

        // Persist
        let report = self.pipeline.persist(packaged).await?;
        self.monitor
            .record_frames(report.frames_written, report.bytes_written);
        self.monitor.log_stats("Persist");
        self.monitor.log_final_stats();

        match &report.archive {
            Some(archive) => tracing::info!("💾 Archive saved to: {}", archive),
            None => tracing::info!("💾 Wrote {} files", report.files.len()),
        }

        Ok(report)
    }
}

/// Enumerates formats on a blocking thread; V4L2 ioctls block.
pub async fn describe_device<F: FrameSource>(source: F) -> Result<DeviceCapabilities> {
    let capabilities = tokio::task::spawn_blocking(move || source.describe()).await??;
    tracing::debug!(
        "{} exposes {} formats",
        capabilities.device,
        capabilities.formats.len()
    );
    Ok(capabilities)
}
