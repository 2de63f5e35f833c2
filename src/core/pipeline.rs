use crate::core::{
    CaptureReport, CaptureSettings, Frame, FrameSource, PackagedCapture, PackagedFrame, Pipeline,
    Storage,
};
use crate::domain::model::FourCc;
use crate::utils::error::{PicamError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use std::sync::Arc;
use zip::write::{SimpleFileOptions, ZipWriter};

pub const ARCHIVE_NAME: &str = "capture.zip";
pub const MANIFEST_NAME: &str = "manifest.csv";
pub const SUMMARY_NAME: &str = "summary.json";

#[derive(Debug, Serialize)]
struct ManifestRow<'a> {
    index: usize,
    file: &'a str,
    bytes: usize,
    captured_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct CaptureSummary<'a> {
    device: &'a str,
    format: FourCc,
    resolution: String,
    fps: f64,
    frames: usize,
    skipped: usize,
    bytes: usize,
}

/// Expands `{index}`, `{ext}` and `{ts}` in a frame name pattern.
pub fn frame_file_name(pattern: &str, index: usize, ext: &str, at: DateTime<Utc>) -> String {
    pattern
        .replace("{index}", &index.to_string())
        .replace("{ext}", ext)
        .replace("{ts}", &at.format("%Y%m%dT%H%M%S%3f").to_string())
}

/// Streams frames from a camera into storage: acquire on a blocking thread,
/// name and describe them, then write loose files or a single archive.
pub struct CapturePipeline<S: Storage, F: FrameSource, C: CaptureSettings> {
    storage: S,
    source: Arc<F>,
    settings: C,
}

impl<S: Storage, F: FrameSource, C: CaptureSettings> CapturePipeline<S, F, C> {
    pub fn new(storage: S, source: F, settings: C) -> Self {
        Self {
            storage,
            source: Arc::new(source),
            settings,
        }
    }

    fn build_archive(&self, capture: &PackagedCapture) -> Result<Vec<u8>> {
        let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
        // JPEG 已壓縮，直接存放
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);

        for frame in &capture.frames {
            zip.start_file(frame.file_name.as_str(), options)?;
            zip.write_all(&frame.data)?;
        }

        if self.settings.write_manifest() {
            let deflated = SimpleFileOptions::default();
            zip.start_file(MANIFEST_NAME, deflated)?;
            zip.write_all(capture.manifest_csv.as_bytes())?;
            zip.start_file(SUMMARY_NAME, deflated)?;
            zip.write_all(capture.summary_json.as_bytes())?;
        }

        let cursor = zip.finish()?;
        Ok(cursor.into_inner())
    }
}

#[async_trait::async_trait]
impl<S: Storage, F: FrameSource, C: CaptureSettings> Pipeline for CapturePipeline<S, F, C> {
    async fn acquire(&self) -> Result<Vec<Frame>> {
        let request = self.settings.request();
        let verify = self.settings.verify_format();
        let source = Arc::clone(&self.source);

        tracing::debug!("Capture request: {:?}", request);

        let frames = tokio::task::spawn_blocking(move || {
            if verify {
                let capabilities = source.describe()?;
                if capabilities.formats.is_empty() {
                    // some drivers answer VIDIOC_ENUM_FMT with nothing
                    tracing::warn!(
                        "{} listed no formats; leaving {} @ {} to the driver",
                        capabilities.device,
                        request.format,
                        request.resolution
                    );
                } else {
                    capabilities.check(&request)?;
                }
            }
            source.capture(&request)
        })
        .await??;

        if frames.len() < self.settings.request().frame_count {
            tracing::warn!(
                "Device returned {} of {} requested frames",
                frames.len(),
                self.settings.request().frame_count
            );
        }

        Ok(frames)
    }

    async fn package(&self, frames: Vec<Frame>) -> Result<PackagedCapture> {
        let request = self.settings.request();
        let ext = request.format.file_extension();
        let pattern = self.settings.file_pattern();

        let mut packaged = Vec::with_capacity(frames.len());
        let mut skipped = 0;
        for frame in frames {
            if frame.data.is_empty() {
                tracing::warn!("Skipping empty frame {}", frame.index);
                skipped += 1;
                continue;
            }
            packaged.push(PackagedFrame {
                index: frame.index,
                file_name: frame_file_name(pattern, frame.index, ext, frame.captured_at),
                data: frame.data,
                captured_at: frame.captured_at,
            });
        }

        let mut writer = csv::Writer::from_writer(Vec::new());
        for frame in &packaged {
            writer.serialize(ManifestRow {
                index: frame.index,
                file: &frame.file_name,
                bytes: frame.data.len(),
                captured_at: frame.captured_at,
            })?;
        }
        let manifest_bytes = writer
            .into_inner()
            .map_err(|e| PicamError::ProcessingError {
                message: format!("manifest flush failed: {}", e),
            })?;
        let manifest_csv =
            String::from_utf8(manifest_bytes).map_err(|e| PicamError::ProcessingError {
                message: format!("manifest is not UTF-8: {}", e),
            })?;

        let summary = CaptureSummary {
            device: self.settings.device(),
            format: request.format,
            resolution: request.resolution.to_string(),
            fps: request.interval.fps(),
            frames: packaged.len(),
            skipped,
            bytes: packaged.iter().map(|f| f.data.len()).sum(),
        };
        let summary_json = serde_json::to_string_pretty(&summary)?;

        Ok(PackagedCapture {
            frames: packaged,
            manifest_csv,
            summary_json,
            skipped,
        })
    }

    async fn persist(&self, capture: PackagedCapture) -> Result<CaptureReport> {
        let bytes_written: u64 = capture.frames.iter().map(|f| f.data.len() as u64).sum();
        let mut files = Vec::new();
        let mut archive = None;

        if self.settings.archive() {
            let zip_data = self.build_archive(&capture)?;
            tracing::debug!("Writing archive ({} bytes) to storage", zip_data.len());
            self.storage.write_file(ARCHIVE_NAME, &zip_data).await?;
            archive = Some(self.storage.locate(ARCHIVE_NAME));
            files.extend(capture.frames.iter().map(|f| f.file_name.clone()));
        } else {
            for frame in &capture.frames {
                self.storage.write_file(&frame.file_name, &frame.data).await?;
                files.push(frame.file_name.clone());
            }
            if self.settings.write_manifest() {
                self.storage
                    .write_file(MANIFEST_NAME, capture.manifest_csv.as_bytes())
                    .await?;
                self.storage
                    .write_file(SUMMARY_NAME, capture.summary_json.as_bytes())
                    .await?;
            }
        }

        Ok(CaptureReport {
            frames_written: capture.frames.len(),
            frames_skipped: capture.skipped,
            bytes_written,
            files,
            archive,
        })
    }
}
