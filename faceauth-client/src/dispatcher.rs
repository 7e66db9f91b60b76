//! Request construction and dispatch.
//!
//! The dispatcher keeps no state between calls: each operation turns a
//! request value into a result or an [`ApiError`]. Blocking transport calls
//! run on tokio's blocking pool so the event loop stays responsive.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::api::{Ack, EnrolledUserSummary, EventName, FaceAuthApi, ImagePart, SystemHealth, VerificationResult};
use crate::error::{ApiError, ValidationError};
use crate::media::ImageAsset;

const SLOW_VERIFICATION: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct EnrollmentRequest {
    user_id: String,
    image: ImageAsset,
}

impl EnrollmentRequest {
    pub fn new(user_id: &str, image: ImageAsset) -> Result<Self, ValidationError> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(ValidationError::EmptyField("User ID"));
        }
        Ok(Self { user_id: user_id.to_string(), image })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

#[derive(Debug, Clone)]
pub struct VerificationRequest {
    event: EventName,
    token: String,
    image: ImageAsset,
}

impl VerificationRequest {
    pub fn new(event: EventName, token: &str, image: ImageAsset) -> Result<Self, ValidationError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ValidationError::EmptyField("Token"));
        }
        Ok(Self { event, token: token.to_string(), image })
    }

    pub fn event(&self) -> EventName {
        self.event
    }
}

/// Proof that the operator confirmed a deletion. Only the manage controller
/// can mint one, so no DELETE can be dispatched without a confirmation step.
#[derive(Debug)]
pub struct ConfirmedDeletion {
    user_id: String,
}

impl ConfirmedDeletion {
    pub(crate) fn new(user_id: String) -> Self {
        Self { user_id }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    api: Arc<dyn FaceAuthApi>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher").finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(api: Arc<dyn FaceAuthApi>) -> Self {
        Self { api }
    }

    async fn run<T, F>(&self, op: &'static str, call: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn FaceAuthApi) -> Result<T, ApiError> + Send + 'static,
    {
        let api = Arc::clone(&self.api);
        tokio::task::spawn_blocking(move || call(api.as_ref()))
            .await
            .map_err(|e| ApiError::Network(format!("{} task failed: {}", op, e)))?
    }

    pub async fn enroll(&self, request: EnrollmentRequest) -> Result<Ack, ApiError> {
        info!("Dispatching enroll for '{}'", request.user_id);
        let EnrollmentRequest { user_id, image } = request;
        let part = ImagePart {
            file_name: image.file_name.clone(),
            mime: image.mime.clone(),
            bytes: image.shared_bytes(),
        };
        self.run("enroll", move |api| api.enroll(&user_id, &part)).await
    }

    pub async fn verify(&self, request: VerificationRequest) -> Result<VerificationResult, ApiError> {
        info!("Dispatching verify for event '{}'", request.event);
        let started = Instant::now();
        let VerificationRequest { event, token, image } = request;
        let result = self
            .run("verify", move |api| api.verify(event, &token, image.base64_payload()))
            .await;

        let elapsed = started.elapsed();
        if elapsed > SLOW_VERIFICATION {
            warn!("Verification took {:.2}s", elapsed.as_secs_f64());
        } else {
            info!("Verification took {:.2}s", elapsed.as_secs_f64());
        }
        result
    }

    pub async fn delete_user(&self, confirmed: ConfirmedDeletion) -> Result<Ack, ApiError> {
        info!("Dispatching delete for '{}'", confirmed.user_id);
        let user_id = confirmed.user_id;
        self.run("delete", move |api| api.delete_user(&user_id)).await
    }

    pub async fn list_users(&self) -> Result<Vec<EnrolledUserSummary>, ApiError> {
        self.run("list users", |api| api.list_users()).await
    }

    pub async fn fetch_health(&self) -> Result<SystemHealth, ApiError> {
        self.run("health", |api| api.health()).await
    }
}
