use std::cell::{Cell, RefCell};
use std::rc::Rc;

use log::{info, warn};

use super::FormStatus;
use crate::api::{EventName, VerificationResult};
use crate::camera::{CameraProvider, CameraStream};
use crate::config::CameraConfig;
use crate::dispatcher::{Dispatcher, VerificationRequest};
use crate::error::{CameraError, SubmitError, ValidationError};
use crate::media::{ImageAsset, MediaAcquirer, MediaSource};
use crate::notify::Notifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AcquisitionMode {
    #[default]
    FileUpload,
    Camera,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelStyle {
    Success,
    Error,
}

/// What the result panel shows for a verification outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultPanel {
    pub style: PanelStyle,
    pub headline: String,
    pub user: String,
    pub event: String,
    pub confidence_text: String,
    pub message: String,
}

impl ResultPanel {
    pub fn from_result(result: &VerificationResult) -> Self {
        let (style, headline) = if result.success {
            (PanelStyle::Success, "Verification successful")
        } else {
            (PanelStyle::Error, "Verification failed")
        };
        Self {
            style,
            headline: headline.to_string(),
            user: result.user_id.clone().unwrap_or_else(|| "unknown".to_string()),
            event: result.event.clone(),
            confidence_text: format_confidence(result.confidence),
            message: result.message.clone(),
        }
    }
}

/// `0.12` -> `"12.0%"`. Out-of-range and non-finite scores are clamped.
pub fn format_confidence(confidence: Option<f64>) -> String {
    match confidence {
        Some(c) if c.is_finite() => format!("{:.1}%", c.clamp(0.0, 1.0) * 100.0),
        Some(_) | None => "n/a".to_string(),
    }
}

/// Verify tab: `Idle -> Submitting -> Idle` with a parallel acquisition
/// mode. Responses are tagged; one that was superseded by a newer submit,
/// a new image, a mode switch or a reset is dropped.
pub struct VerifyController {
    dispatcher: Dispatcher,
    acquirer: MediaAcquirer,
    notifier: Notifier,
    camera_provider: Box<dyn CameraProvider>,
    camera_config: CameraConfig,
    event: Cell<EventName>,
    token: RefCell<String>,
    image: RefCell<Option<ImageAsset>>,
    result: RefCell<Option<VerificationResult>>,
    mode: Cell<AcquisitionMode>,
    camera: RefCell<Option<Rc<CameraStream>>>,
    status: Cell<FormStatus>,
    media_seq: Cell<u64>,
    result_seq: Cell<u64>,
}

impl VerifyController {
    pub fn new(
        dispatcher: Dispatcher,
        acquirer: MediaAcquirer,
        notifier: Notifier,
        camera_provider: Box<dyn CameraProvider>,
        camera_config: CameraConfig,
    ) -> Self {
        Self {
            dispatcher,
            acquirer,
            notifier,
            camera_provider,
            camera_config,
            event: Cell::new(EventName::default()),
            token: RefCell::new(String::new()),
            image: RefCell::new(None),
            result: RefCell::new(None),
            mode: Cell::new(AcquisitionMode::FileUpload),
            camera: RefCell::new(None),
            status: Cell::new(FormStatus::Idle),
            media_seq: Cell::new(0),
            result_seq: Cell::new(0),
        }
    }

    pub fn set_event(&self, event: EventName) {
        self.event.set(event);
    }

    pub fn event(&self) -> EventName {
        self.event.get()
    }

    pub fn set_token(&self, token: &str) {
        *self.token.borrow_mut() = token.to_string();
    }

    pub fn token(&self) -> String {
        self.token.borrow().clone()
    }

    pub fn image(&self) -> Option<ImageAsset> {
        self.image.borrow().clone()
    }

    pub fn preview(&self) -> Option<String> {
        self.image.borrow().as_ref().map(|i| i.preview().to_string())
    }

    pub fn result(&self) -> Option<VerificationResult> {
        self.result.borrow().clone()
    }

    pub fn panel(&self) -> Option<ResultPanel> {
        self.result.borrow().as_ref().map(ResultPanel::from_result)
    }

    pub fn status(&self) -> FormStatus {
        self.status.get()
    }

    pub fn mode(&self) -> AcquisitionMode {
        self.mode.get()
    }

    pub fn camera_active(&self) -> bool {
        self.camera.borrow().is_some()
    }

    pub fn can_submit(&self) -> bool {
        self.status.get() == FormStatus::Idle
            && !self.token.borrow().trim().is_empty()
            && self.image.borrow().is_some()
    }

    fn invalidate(&self) {
        self.media_seq.set(self.media_seq.get() + 1);
        self.result_seq.set(self.result_seq.get() + 1);
        *self.image.borrow_mut() = None;
        *self.result.borrow_mut() = None;
    }

    /// Switching clears the pending image and result. Entering camera mode
    /// opens the stream; leaving it releases the stream. If the camera
    /// cannot be opened the form stays in file-upload mode.
    pub fn set_mode(&self, mode: AcquisitionMode) -> Result<(), CameraError> {
        if self.mode.get() == mode {
            return Ok(());
        }
        self.invalidate();
        self.release_camera();

        match mode {
            AcquisitionMode::FileUpload => {
                self.mode.set(AcquisitionMode::FileUpload);
                Ok(())
            }
            AcquisitionMode::Camera => {
                match CameraStream::open(self.camera_provider.as_ref(), &self.camera_config) {
                    Ok(stream) => {
                        *self.camera.borrow_mut() = Some(Rc::new(stream));
                        self.mode.set(AcquisitionMode::Camera);
                        Ok(())
                    }
                    Err(e) => {
                        warn!("Camera mode unavailable: {}", e);
                        self.mode.set(AcquisitionMode::FileUpload);
                        self.notifier.error(e.to_string());
                        Err(e)
                    }
                }
            }
        }
    }

    fn release_camera(&self) {
        if let Some(stream) = self.camera.borrow_mut().take() {
            stream.stop();
        }
    }

    /// Called when the tab is left or torn down.
    pub fn leave(&self) {
        self.invalidate();
        self.release_camera();
        self.mode.set(AcquisitionMode::FileUpload);
    }

    pub async fn acquire(&self, source: MediaSource) -> Result<(), ValidationError> {
        let seq = self.media_seq.get() + 1;
        self.media_seq.set(seq);

        match self.acquirer.acquire(source).await {
            Ok(asset) => {
                if seq != self.media_seq.get() {
                    warn!("Discarding superseded verify image {}", asset.file_name);
                    return Ok(());
                }
                *self.image.borrow_mut() = Some(asset);
                self.result_seq.set(self.result_seq.get() + 1);
                *self.result.borrow_mut() = None;
                Ok(())
            }
            Err(e) if seq != self.media_seq.get() => {
                warn!("Dropping failure of superseded verify image: {}", e);
                Ok(())
            }
            Err(e) => {
                self.notifier.error(e.to_string());
                Err(e)
            }
        }
    }

    /// Grabs the newest camera frame and acquires it as the verify image.
    pub async fn capture(&self) -> Result<(), SubmitError> {
        let stream = match self.camera.borrow().as_ref() {
            Some(stream) => Rc::clone(stream),
            None => {
                self.notifier.error(CameraError::NotActive.to_string());
                return Err(CameraError::NotActive.into());
            }
        };

        let frame = match stream.capture().await {
            Ok(frame) => frame,
            Err(e) => {
                self.notifier.error(e.to_string());
                return Err(e.into());
            }
        };
        drop(stream);

        self.acquire(MediaSource::Camera(frame)).await?;
        Ok(())
    }

    /// Lets the camera settle before the first capture.
    pub async fn warm_up_camera(&self) -> Result<(), CameraError> {
        let stream = self.camera.borrow().as_ref().map(Rc::clone).ok_or(CameraError::NotActive)?;
        stream.warm_up(self.camera_config.warmup_frames).await
    }

    pub async fn submit(&self) -> Result<VerificationResult, SubmitError> {
        if self.status.get() == FormStatus::Submitting {
            return Err(SubmitError::AlreadyInFlight);
        }

        let request = {
            let image = match self.image.borrow().clone() {
                Some(image) => image,
                None => return Err(self.reject(ValidationError::EmptyField("Image"))),
            };
            match VerificationRequest::new(self.event.get(), &self.token.borrow(), image) {
                Ok(request) => request,
                Err(e) => return Err(self.reject(e)),
            }
        };

        let seq = self.result_seq.get() + 1;
        self.result_seq.set(seq);
        self.status.set(FormStatus::Submitting);
        *self.result.borrow_mut() = None;

        let outcome = self.dispatcher.verify(request).await;
        self.status.set(FormStatus::Idle);

        if seq != self.result_seq.get() {
            warn!("Discarding superseded verification response #{}", seq);
            return Err(SubmitError::Superseded);
        }

        match outcome {
            Ok(result) => {
                let panel = ResultPanel::from_result(&result);
                if result.success {
                    info!("Verification succeeded for {} ({})", panel.user, panel.confidence_text);
                    self.notifier.success(format!("{} ({})", panel.headline, panel.confidence_text));
                } else {
                    info!("Verification failed for {}: {}", panel.user, result.message);
                    let message = if result.message.is_empty() {
                        panel.headline.clone()
                    } else {
                        result.message.clone()
                    };
                    self.notifier.error(message);
                }

                self.media_seq.set(self.media_seq.get() + 1);
                *self.image.borrow_mut() = None;
                *self.result.borrow_mut() = Some(result.clone());
                Ok(result)
            }
            Err(e) => {
                warn!("Verification request failed: {}", e);
                self.notifier.error(e.user_message());
                Err(e.into())
            }
        }
    }

    fn reject(&self, error: ValidationError) -> SubmitError {
        self.notifier.error(error.to_string());
        error.into()
    }
}

impl Drop for VerifyController {
    fn drop(&mut self) {
        self.release_camera();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(success: bool, confidence: Option<f64>) -> VerificationResult {
        VerificationResult {
            success,
            user_id: Some("bob".into()),
            event: "login-event".into(),
            confidence,
            message: "no match".into(),
        }
    }

    #[test]
    fn failed_result_renders_error_panel_with_one_decimal() {
        let panel = ResultPanel::from_result(&result(false, Some(0.12)));
        assert_eq!(panel.style, PanelStyle::Error);
        assert_eq!(panel.confidence_text, "12.0%");
        assert_eq!(panel.user, "bob");
        assert_eq!(panel.event, "login-event");
        assert_eq!(panel.message, "no match");
    }

    #[test]
    fn confidence_formatting_covers_the_unit_interval() {
        for i in 0..=1000 {
            let c = i as f64 / 1000.0;
            let text = format_confidence(Some(c));
            assert!(text.ends_with('%'), "{} -> {}", c, text);
        }
        assert_eq!(format_confidence(Some(0.0)), "0.0%");
        assert_eq!(format_confidence(Some(1.0)), "100.0%");
        assert_eq!(format_confidence(Some(0.9347)), "93.5%");
    }

    #[test]
    fn odd_confidences_do_not_panic() {
        assert_eq!(format_confidence(None), "n/a");
        assert_eq!(format_confidence(Some(f64::NAN)), "n/a");
        assert_eq!(format_confidence(Some(1.7)), "100.0%");
        assert_eq!(format_confidence(Some(-0.2)), "0.0%");
    }
}
