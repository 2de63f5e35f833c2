use crate::domain::model::{
    CaptureMode, CaptureRequest, DeviceCapabilities, FormatDescriptor, FourCc, Frame,
    FrameInterval, IntervalSupport, Resolution, ResolutionSupport,
};
use crate::domain::ports::FrameSource;
use crate::utils::error::{PicamError, Result};
use chrono::Utc;

/// Video4Linux2 capture node, e.g. `/dev/video0` exposed by the ov5647
/// overlay or a USB webcam. The device is opened per call and released on
/// return, so other programs (libcamera-hello, GStreamer) can use it between
/// runs.
#[derive(Debug, Clone)]
pub struct V4l2Source {
    device: String,
}

impl V4l2Source {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
        }
    }

    fn open(&self) -> Result<rscam::Camera> {
        rscam::new(&self.device).map_err(|e| self.device_error("open", e))
    }

    fn device_error(&self, action: &str, detail: impl std::fmt::Debug) -> PicamError {
        PicamError::DeviceError {
            device: self.device.clone(),
            message: format!("{} failed: {:?}", action, detail),
        }
    }

    fn intervals(camera: &rscam::Camera, format: &[u8], resolution: (u32, u32)) -> IntervalSupport {
        match camera.intervals(format, resolution) {
            Ok(rscam::IntervalInfo::Discretes(list)) => IntervalSupport::Discrete {
                intervals: list
                    .into_iter()
                    .map(|(n, d)| FrameInterval::new(n, d))
                    .collect(),
            },
            Ok(rscam::IntervalInfo::Stepwise { min, max, step }) => IntervalSupport::Stepwise {
                min: FrameInterval::new(min.0, min.1),
                max: FrameInterval::new(max.0, max.1),
                step: FrameInterval::new(step.0, step.1),
            },
            Err(e) => {
                tracing::debug!(
                    "Interval enumeration failed for {}x{}: {}",
                    resolution.0,
                    resolution.1,
                    e
                );
                IntervalSupport::Unknown
            }
        }
    }
}

impl FrameSource for V4l2Source {
    fn device(&self) -> &str {
        &self.device
    }

    fn describe(&self) -> Result<DeviceCapabilities> {
        let camera = self.open()?;
        let mut formats = Vec::new();

        for entry in camera.formats() {
            let info = match entry {
                Ok(info) => info,
                Err(e) => {
                    tracing::warn!("Skipping unreadable format entry on {}: {}", self.device, e);
                    continue;
                }
            };

            let fourcc = FourCc::new(info.format);
            let resolutions = match camera.resolutions(&info.format) {
                Ok(rscam::ResolutionInfo::Discretes(list)) => ResolutionSupport::Discrete {
                    modes: list
                        .into_iter()
                        .map(|size| CaptureMode {
                            resolution: Resolution::from(size),
                            intervals: Self::intervals(&camera, &info.format, size),
                        })
                        .collect(),
                },
                Ok(rscam::ResolutionInfo::Stepwise { min, max, step }) => {
                    ResolutionSupport::Stepwise {
                        min: Resolution::from(min),
                        max: Resolution::from(max),
                        step: Resolution::from(step),
                    }
                }
                Err(e) => {
                    tracing::warn!("Resolution enumeration failed for {}: {}", fourcc, e);
                    ResolutionSupport::Unknown
                }
            };

            tracing::debug!("Found format {} ({})", fourcc, info.description);
            formats.push(FormatDescriptor {
                fourcc,
                description: info.description.clone(),
                compressed: info.compressed,
                emulated: info.emulated,
                resolutions,
            });
        }

        Ok(DeviceCapabilities {
            device: self.device.clone(),
            formats,
        })
    }

    fn capture(&self, request: &CaptureRequest) -> Result<Vec<Frame>> {
        let mut camera = self.open()?;

        camera
            .start(&rscam::Config {
                interval: (request.interval.numerator, request.interval.denominator),
                resolution: (request.resolution.width, request.resolution.height),
                format: request.format.as_bytes(),
                nbuffers: request.buffers,
                ..Default::default()
            })
            .map_err(|e| self.device_error("start streaming", e))?;

        tracing::info!(
            "📷 Streaming {} {} @ {:.1} fps from {}",
            request.format,
            request.resolution,
            request.interval.fps(),
            self.device
        );

        let mut frames = Vec::with_capacity(request.frame_count);
        for index in 0..request.frame_count {
            let frame = camera
                .capture()
                .map_err(|e| self.device_error("capture", e))?;
            tracing::debug!("Frame {} of length {}", index, frame.len());

            frames.push(Frame {
                index,
                data: frame[..].to_vec(),
                captured_at: Utc::now(),
            });
        }

        camera
            .stop()
            .map_err(|e| self.device_error("stop streaming", e))?;

        Ok(frames)
    }
}
