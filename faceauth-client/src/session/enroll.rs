use std::cell::{Cell, RefCell};
use std::rc::Rc;

use log::{info, warn};

use super::{Directory, FormStatus};
use crate::api::Ack;
use crate::dispatcher::{Dispatcher, EnrollmentRequest};
use crate::error::{SubmitError, ValidationError};
use crate::media::{ImageAsset, MediaAcquirer, MediaSource};
use crate::notify::Notifier;

/// Enroll tab: `Idle -> Submitting -> Idle`. Inputs are cleared on success
/// and kept on failure.
pub struct EnrollController {
    dispatcher: Dispatcher,
    acquirer: MediaAcquirer,
    notifier: Notifier,
    directory: Rc<Directory>,
    user_id: RefCell<String>,
    image: RefCell<Option<ImageAsset>>,
    status: Cell<FormStatus>,
    media_seq: Cell<u64>,
}

impl EnrollController {
    pub fn new(dispatcher: Dispatcher, acquirer: MediaAcquirer, notifier: Notifier, directory: Rc<Directory>) -> Self {
        Self {
            dispatcher,
            acquirer,
            notifier,
            directory,
            user_id: RefCell::new(String::new()),
            image: RefCell::new(None),
            status: Cell::new(FormStatus::Idle),
            media_seq: Cell::new(0),
        }
    }

    pub fn set_user_id(&self, user_id: &str) {
        *self.user_id.borrow_mut() = user_id.to_string();
    }

    pub fn user_id(&self) -> String {
        self.user_id.borrow().clone()
    }

    pub fn image(&self) -> Option<ImageAsset> {
        self.image.borrow().clone()
    }

    pub fn preview(&self) -> Option<String> {
        self.image.borrow().as_ref().map(|i| i.preview().to_string())
    }

    pub fn status(&self) -> FormStatus {
        self.status.get()
    }

    /// Submit is enabled only with a non-blank user id, an image, and no
    /// request in flight.
    pub fn can_submit(&self) -> bool {
        self.status.get() == FormStatus::Idle
            && !self.user_id.borrow().trim().is_empty()
            && self.image.borrow().is_some()
    }

    /// Validates and encodes a new image. On failure the previous image is
    /// kept and an error notification is raised. A result for an image that
    /// was superseded in the meantime is dropped silently.
    pub async fn acquire(&self, source: MediaSource) -> Result<(), ValidationError> {
        let seq = self.media_seq.get() + 1;
        self.media_seq.set(seq);

        match self.acquirer.acquire(source).await {
            Ok(asset) => {
                if seq == self.media_seq.get() {
                    *self.image.borrow_mut() = Some(asset);
                } else {
                    warn!("Discarding superseded enroll image {}", asset.file_name);
                }
                Ok(())
            }
            Err(e) if seq != self.media_seq.get() => {
                warn!("Dropping failure of superseded enroll image: {}", e);
                Ok(())
            }
            Err(e) => {
                self.notifier.error(e.to_string());
                Err(e)
            }
        }
    }

    pub fn clear_image(&self) {
        self.media_seq.set(self.media_seq.get() + 1);
        *self.image.borrow_mut() = None;
    }

    pub fn reset(&self) {
        self.clear_image();
        self.user_id.borrow_mut().clear();
    }

    pub async fn submit(&self) -> Result<Ack, SubmitError> {
        if self.status.get() == FormStatus::Submitting {
            return Err(SubmitError::AlreadyInFlight);
        }

        let request = {
            let image = match self.image.borrow().clone() {
                Some(image) => image,
                None => return Err(self.reject(ValidationError::EmptyField("Image"))),
            };
            match EnrollmentRequest::new(&self.user_id.borrow(), image) {
                Ok(request) => request,
                Err(e) => return Err(self.reject(e)),
            }
        };
        let user_id = request.user_id().to_string();

        self.status.set(FormStatus::Submitting);
        let result = self.dispatcher.enroll(request).await;
        self.status.set(FormStatus::Idle);

        match result {
            Ok(ack) => {
                info!("Enrolled '{}'", user_id);
                self.reset();
                self.notifier.success(format!("Face enrolled successfully for {}", user_id));
                let _ = self.directory.refresh().await;
                Ok(ack)
            }
            Err(e) => {
                warn!("Enrollment of '{}' failed: {}", user_id, e);
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
