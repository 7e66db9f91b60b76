//! Client-side workflow controller for a remote face authentication service.
//!
//! The crate turns operator input (an image file, an upload or a live camera
//! frame plus form fields) into enroll, verify, delete, list and health
//! requests, and keeps per-tab session state consistent while those
//! requests are in flight.

pub mod api;
pub mod camera;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod media;
pub mod notify;
pub mod session;

pub use api::{
    Ack, EnrolledUserSummary, EventName, FaceAuthApi, HttpApi, ImagePart, SystemHealth, VerificationResult,
};
pub use camera::{CameraFrame, CameraInfo, CameraKind, CameraProvider, CameraStream, DefaultCameraProvider, FrameSource};
pub use config::ClientConfig;
pub use dispatcher::{ConfirmedDeletion, Dispatcher, EnrollmentRequest, VerificationRequest};
pub use error::{ApiError, CameraError, SubmitError, ValidationError};
pub use media::{ImageAsset, MediaAcquirer, MediaSource, SourceKind};
pub use notify::{Notification, Notifier, Severity};
pub use session::{
    AcquisitionMode, Confirm, DeleteState, Directory, EnrollController, FormStatus, ManageController, PanelStyle,
    ResultPanel, Session, Tab, VerifyController,
};
