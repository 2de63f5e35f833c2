use anyhow::Result;
use chrono::Utc;
use picam::core::{CaptureRequest, CaptureSettings, DeviceCapabilities, Frame, FrameSource};
use picam::domain::model::{
    CaptureMode, FormatDescriptor, FourCc, IntervalSupport, Resolution, ResolutionSupport,
};
use picam::{
    describe_device, CaptureEngine, CapturePipeline, CaptureProfile, LocalStorage, PicamError,
};
use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// In-memory camera: MJPG only, 1280x720 and 640x480, unless built `without_formats`.
struct FakeCamera {
    payloads: Vec<Vec<u8>>,
    captures: Arc<AtomicUsize>,
    lists_formats: bool,
}

impl FakeCamera {
    fn new(payloads: Vec<Vec<u8>>) -> Self {
        Self {
            payloads,
            captures: Arc::new(AtomicUsize::new(0)),
            lists_formats: true,
        }
    }

    /// A driver whose format enumeration comes back empty.
    fn without_formats(payloads: Vec<Vec<u8>>) -> Self {
        Self {
            lists_formats: false,
            ..Self::new(payloads)
        }
    }
}

impl FrameSource for FakeCamera {
    fn device(&self) -> &str {
        "/dev/video0"
    }

    fn describe(&self) -> picam::Result<DeviceCapabilities> {
        let mode = |w, h| CaptureMode {
            resolution: Resolution::new(w, h),
            intervals: IntervalSupport::Unknown,
        };
        if !self.lists_formats {
            return Ok(DeviceCapabilities {
                device: self.device().to_string(),
                formats: Vec::new(),
            });
        }
        Ok(DeviceCapabilities {
            device: self.device().to_string(),
            formats: vec![FormatDescriptor {
                fourcc: FourCc::MJPG,
                description: "Motion-JPEG".to_string(),
                compressed: true,
                emulated: false,
                resolutions: ResolutionSupport::Discrete {
                    modes: vec![mode(1280, 720), mode(640, 480)],
                },
            }],
        })
    }

    fn capture(&self, request: &CaptureRequest) -> picam::Result<Vec<Frame>> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .payloads
            .iter()
            .take(request.frame_count)
            .enumerate()
            .map(|(index, data)| Frame {
                index,
                data: data.clone(),
                captured_at: Utc::now(),
            })
            .collect())
    }
}

fn jpeg(marker: u8) -> Vec<u8> {
    vec![0xff, 0xd8, marker, 0xff, 0xd9]
}

fn profile(output: &str, extra: &str) -> Result<CaptureProfile> {
    let content = format!(
        "[capture]\nframes = 3\n\n[output]\npath = \"{}\"\n{}",
        output.replace('\\', "/"),
        extra
    );
    Ok(CaptureProfile::from_toml_str(&content)?)
}

#[tokio::test]
async fn test_capture_writes_frames_and_manifest() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let output = temp_dir.path().to_str().unwrap().to_string();

    let settings = profile(&output, "")?;
    let storage = LocalStorage::new(settings.output_path().to_string());
    let camera = FakeCamera::new(vec![jpeg(1), jpeg(2), jpeg(3), jpeg(4)]);
    let pipeline = CapturePipeline::new(storage, camera, settings);

    let report = CaptureEngine::new(pipeline).run().await?;

    assert_eq!(report.frames_written, 3);
    assert_eq!(report.bytes_written, 15);
    assert_eq!(report.files, vec!["frame-0.jpg", "frame-1.jpg", "frame-2.jpg"]);
    assert!(report.archive.is_none());

    let first = std::fs::read(temp_dir.path().join("frame-0.jpg"))?;
    assert_eq!(first, jpeg(1));
    assert!(!temp_dir.path().join("frame-3.jpg").exists());

    let manifest = std::fs::read_to_string(temp_dir.path().join("manifest.csv"))?;
    let mut lines = manifest.lines();
    assert_eq!(lines.next(), Some("index,file,bytes,captured_at"));
    assert!(lines.next().unwrap_or_default().starts_with("0,frame-0.jpg,5,"));
    assert_eq!(manifest.lines().count(), 4);

    let summary: serde_json::Value =
        serde_json::from_slice(&std::fs::read(temp_dir.path().join("summary.json"))?)?;
    assert_eq!(summary["format"], "MJPG");
    assert_eq!(summary["resolution"], "1280x720");
    assert_eq!(summary["frames"], 3);

    Ok(())
}

#[tokio::test]
async fn test_archive_mode_bundles_everything() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let output = temp_dir.path().to_str().unwrap().to_string();

    let settings = profile(&output, "archive = true\n")?;
    let storage = LocalStorage::new(output.clone());
    let pipeline = CapturePipeline::new(storage, FakeCamera::new(vec![jpeg(7); 3]), settings);

    let report = CaptureEngine::new_with_monitoring(pipeline, false).run().await?;

    let archive_path = temp_dir.path().join("capture.zip");
    assert!(report.archive.as_deref().unwrap_or_default().ends_with("capture.zip"));
    assert!(archive_path.exists());
    assert!(!temp_dir.path().join("frame-0.jpg").exists());

    let mut archive = zip::ZipArchive::new(std::fs::File::open(&archive_path)?)?;
    let names: Vec<String> = (0..archive.len())
        .map(|i| archive.by_index(i).map(|f| f.name().to_string()))
        .collect::<std::result::Result<_, _>>()?;
    assert_eq!(
        names,
        vec!["frame-0.jpg", "frame-1.jpg", "frame-2.jpg", "manifest.csv", "summary.json"]
    );

    let mut frame = archive.by_name("frame-2.jpg")?;
    let mut data = Vec::new();
    frame.read_to_end(&mut data)?;
    assert_eq!(data, jpeg(7));

    Ok(())
}

#[tokio::test]
async fn test_empty_frames_are_skipped() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let output = temp_dir.path().to_str().unwrap().to_string();

    let settings = profile(&output, "manifest = false\n")?;
    let storage = LocalStorage::new(output);
    let camera = FakeCamera::new(vec![jpeg(1), Vec::new(), jpeg(3)]);
    let pipeline = CapturePipeline::new(storage, camera, settings);

    let report = CaptureEngine::new(pipeline).run().await?;

    assert_eq!(report.frames_written, 2);
    assert_eq!(report.frames_skipped, 1);
    assert_eq!(report.files, vec!["frame-0.jpg", "frame-2.jpg"]);
    assert!(!temp_dir.path().join("manifest.csv").exists());

    Ok(())
}

#[tokio::test]
async fn test_unsupported_format_fails_before_streaming() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let output = temp_dir.path().to_str().unwrap().to_string();

    let mut settings = profile(&output, "")?;
    settings.capture_mut().format = Some(FourCc::YUYV);

    let camera = FakeCamera::new(vec![jpeg(1)]);
    let captures = Arc::clone(&camera.captures);
    let pipeline = CapturePipeline::new(LocalStorage::new(output), camera, settings);

    let result = CaptureEngine::new(pipeline).run().await;

    match result {
        Err(PicamError::UnsupportedFormatError { format, available, .. }) => {
            assert_eq!(format, "YUYV");
            assert_eq!(available, "MJPG");
        }
        other => panic!("expected unsupported format error, got {:?}", other.map(|r| r.files)),
    }
    assert_eq!(captures.load(Ordering::SeqCst), 0);

    Ok(())
}

#[tokio::test]
async fn test_skip_verify_streams_unlisted_resolution() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let output = temp_dir.path().to_str().unwrap().to_string();

    let mut settings = profile(&output, "")?;
    settings.capture_mut().resolution = Some(Resolution::new(1920, 1080));
    settings.device_mut().verify_format = Some(false);

    let pipeline = CapturePipeline::new(
        LocalStorage::new(output),
        FakeCamera::new(vec![jpeg(1)]),
        settings,
    );
    let report = CaptureEngine::new(pipeline).run().await?;
    assert_eq!(report.frames_written, 1);

    Ok(())
}

#[tokio::test]
async fn test_empty_format_list_does_not_block_capture() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let output = temp_dir.path().to_str().unwrap().to_string();

    let settings = profile(&output, "")?;
    assert!(settings.verify_format());

    let camera = FakeCamera::without_formats(vec![jpeg(1), jpeg(2)]);
    let captures = Arc::clone(&camera.captures);
    let pipeline = CapturePipeline::new(LocalStorage::new(output), camera, settings);

    let report = CaptureEngine::new(pipeline).run().await?;
    assert_eq!(report.frames_written, 2);
    assert_eq!(captures.load(Ordering::SeqCst), 1);

    Ok(())
}

#[tokio::test]
async fn test_describe_device_runs_off_runtime() -> Result<()> {
    let capabilities = describe_device(FakeCamera::new(Vec::new())).await?;
    assert_eq!(capabilities.formats.len(), 1);
    assert!(capabilities
        .find_format(FourCc::MJPG)
        .is_some_and(|f| f.resolutions.contains(Resolution::new(640, 480))));
    Ok(())
}
