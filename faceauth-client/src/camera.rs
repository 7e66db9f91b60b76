//! Live camera stream used by the verify form's camera mode.
//!
//! Frames are read on a dedicated thread and pushed through a small bounded
//! channel. Dropping the [`CameraStream`] closes the channel, which ends the
//! thread and releases the device.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use crate::config::CameraConfig;
use crate::error::CameraError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraFrame {
    pub rgb_data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Something that yields raw RGB frames. Dropping it releases the device.
pub trait FrameSource: Send {
    fn read_frame(&mut self) -> Result<CameraFrame, CameraError>;
}

/// Opens frame sources for the configured device.
pub trait CameraProvider {
    fn open(&self, config: &CameraConfig) -> Result<Box<dyn FrameSource>, CameraError>;
}

/// Uses the OpenCV V4L2 backend when built with the `opencv` feature.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultCameraProvider;

impl CameraProvider for DefaultCameraProvider {
    #[cfg(feature = "opencv")]
    fn open(&self, config: &CameraConfig) -> Result<Box<dyn FrameSource>, CameraError> {
        let camera = opencv_backend::OpenCvCamera::new(config)?;
        Ok(Box::new(camera))
    }

    #[cfg(not(feature = "opencv"))]
    fn open(&self, _config: &CameraConfig) -> Result<Box<dyn FrameSource>, CameraError> {
        Err(CameraError::Unsupported)
    }
}

pub struct CameraStream {
    device_id: i32,
    receiver: async_channel::Receiver<CameraFrame>,
    running: Arc<AtomicBool>,
}

impl std::fmt::Debug for CameraStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraStream")
            .field("device_id", &self.device_id)
            .field("running", &self.is_running())
            .finish()
    }
}

impl CameraStream {
    pub fn open(provider: &dyn CameraProvider, config: &CameraConfig) -> Result<Self, CameraError> {
        let source = provider.open(config)?;
        Ok(Self::start(source, config.device_id, config.frame_interval()))
    }

    pub fn start(mut source: Box<dyn FrameSource>, device_id: i32, interval: Duration) -> Self {
        let (frame_tx, frame_rx) = async_channel::bounded::<CameraFrame>(2);
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);

        std::thread::spawn(move || {
            while flag.load(Ordering::Acquire) {
                match source.read_frame() {
                    Ok(frame) => {
                        if frame_tx.send_blocking(frame).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Camera {} stopped delivering frames: {}", device_id, e);
                        break;
                    }
                }
                std::thread::sleep(interval);
            }
            flag.store(false, Ordering::Release);
            debug!("Camera {} capture thread finished", device_id);
        });

        info!("Camera {} stream started", device_id);
        Self {
            device_id,
            receiver: frame_rx,
            running,
        }
    }

    pub fn device_id(&self) -> i32 {
        self.device_id
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire) && !self.receiver.is_closed()
    }

    /// Discards `frames` frames so exposure can settle.
    pub async fn warm_up(&self, frames: u32) -> Result<(), CameraError> {
        for _ in 0..frames {
            self.receiver.recv().await.map_err(|_| CameraError::Closed)?;
        }
        Ok(())
    }

    /// Returns the newest available frame, waiting for one if none is queued.
    pub async fn capture(&self) -> Result<CameraFrame, CameraError> {
        let mut latest = None;
        while let Ok(frame) = self.receiver.try_recv() {
            latest = Some(frame);
        }
        match latest {
            Some(frame) => Ok(frame),
            None => self.receiver.recv().await.map_err(|_| CameraError::Closed),
        }
    }

    pub fn stop(&self) {
        if self.receiver.close() {
            info!("Camera {} stream released", self.device_id);
        }
        self.running.store(false, Ordering::Release);
    }
}

impl Drop for CameraStream {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraKind {
    Infrared,
    Rgb,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct CameraInfo {
    pub device_id: i32,
    pub device_path: String,
    pub name: String,
    pub kind: CameraKind,
}

/// Lists V4L2 capture nodes from sysfs, skipping metadata nodes.
pub fn list_devices() -> Vec<CameraInfo> {
    list_devices_in(Path::new("/sys/class/video4linux"))
}

pub fn list_devices_in(video_dir: &Path) -> Vec<CameraInfo> {
    let mut cameras = Vec::new();

    let entries = match fs::read_dir(video_dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Cannot read {:?}: {}", video_dir, e);
            return cameras;
        }
    };

    for entry in entries.flatten() {
        let node = entry.file_name().to_string_lossy().to_string();
        let device_id: i32 = match node.strip_prefix("video").and_then(|s| s.parse().ok()) {
            Some(id) => id,
            None => continue,
        };

        let index = fs::read_to_string(entry.path().join("index"))
            .ok()
            .and_then(|s| s.trim().parse::<i32>().ok())
            .unwrap_or(0);
        if index != 0 {
            debug!("Skipping video{} (index {}), likely metadata device", device_id, index);
            continue;
        }

        let name = fs::read_to_string(entry.path().join("name"))
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|_| format!("video{}", device_id));
        let kind = classify(&name);

        cameras.push(CameraInfo {
            device_id,
            device_path: format!("/dev/video{}", device_id),
            name,
            kind,
        });
    }

    cameras.sort_by_key(|c| c.device_id);
    cameras
}

fn classify(name: &str) -> CameraKind {
    let lower = name.to_lowercase();

    if lower.ends_with(" i") || lower.ends_with(": i") {
        return CameraKind::Infrared;
    }
    if ["infrared", "ir camera", "ir sensor", "infra red", "depth"]
        .iter()
        .any(|k| lower.contains(k))
    {
        return CameraKind::Infrared;
    }
    if lower.ends_with(" c") || lower.ends_with(": c") {
        return CameraKind::Rgb;
    }
    if ["rgb", "color", "webcam", "hd camera", "usb camera"]
        .iter()
        .any(|k| lower.contains(k))
    {
        return CameraKind::Rgb;
    }
    CameraKind::Unknown
}

#[cfg(feature = "opencv")]
mod opencv_backend {
    use opencv::prelude::*;
    use opencv::videoio::{self, VideoCapture, CAP_V4L2};

    use super::{CameraFrame, FrameSource};
    use crate::config::CameraConfig;
    use crate::error::CameraError;

    pub struct OpenCvCamera {
        cap: VideoCapture,
    }

    impl OpenCvCamera {
        pub fn new(config: &CameraConfig) -> Result<Self, CameraError> {
            let open_err = |message: String| CameraError::Open {
                device: config.device_id,
                message,
            };

            let mut cap = VideoCapture::new(config.device_id, CAP_V4L2)
                .map_err(|e| open_err(e.to_string()))?;
            if !cap.is_opened().unwrap_or(false) {
                return Err(open_err("device did not open".to_string()));
            }

            cap.set(videoio::CAP_PROP_FRAME_WIDTH, config.frame_width as f64).ok();
            cap.set(videoio::CAP_PROP_FRAME_HEIGHT, config.frame_height as f64).ok();

            Ok(Self { cap })
        }
    }

    impl FrameSource for OpenCvCamera {
        fn read_frame(&mut self) -> Result<CameraFrame, CameraError> {
            let mut mat = opencv::core::Mat::default();
            self.cap
                .read(&mut mat)
                .map_err(|e| CameraError::Frame(e.to_string()))?;
            if mat.empty() {
                return Err(CameraError::Frame("empty frame".to_string()));
            }

            let mut rgb = opencv::core::Mat::default();
            opencv::imgproc::cvt_color(&mat, &mut rgb, opencv::imgproc::COLOR_BGR2RGB, 0)
                .map_err(|e| CameraError::Frame(e.to_string()))?;

            let width = rgb.cols() as u32;
            let height = rgb.rows() as u32;
            let rgb_data = rgb
                .data_bytes()
                .map_err(|e| CameraError::Frame(e.to_string()))?
                .to_vec();

            Ok(CameraFrame { rgb_data, width, height })
        }
    }

    impl Drop for OpenCvCamera {
        fn drop(&mut self) {
            let _ = self.cap.release();
        }
    }
}
