use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Local, pre-network failures. These always block dispatch.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("File must be an image (got '{mime}')")]
    NotAnImage { mime: String },

    #[error("Image is {size} bytes; the limit is {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    #[error("{0} is required")]
    EmptyField(&'static str),

    #[error("Could not read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Could not encode camera frame: {0}")]
    FrameEncoding(String),
}

/// Failures of a single exchange with the remote service.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The service rejected the request itself (bad identifier, unreadable
    /// face, duplicate, oversize, bad token).
    #[error("{detail}")]
    Validation { status: u16, detail: String },

    /// Any other non-2xx answer carrying a detail message.
    #[error("{detail}")]
    Application { status: u16, detail: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected response from service: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Validation { status, .. } | ApiError::Application { status, .. } => {
                Some(*status)
            }
            ApiError::Network(_) | ApiError::Decode(_) => None,
        }
    }

    /// Text shown to the operator. Server details are passed through
    /// verbatim; transport failures get a generic message.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Validation { detail, .. } | ApiError::Application { detail, .. } => {
                detail.clone()
            }
            ApiError::Network(_) => "Network error: could not reach the authentication service".to_string(),
            ApiError::Decode(_) => "Unexpected response from the authentication service".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("Camera support is not available in this build")]
    Unsupported,

    #[error("Failed to open camera {device}: {message}")]
    Open { device: i32, message: String },

    #[error("Failed to read frame: {0}")]
    Frame(String),

    #[error("Camera stream has stopped")]
    Closed,

    #[error("Camera mode is not active")]
    NotActive,
}

/// Outcome of a rejected or failed transition on a session controller.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("A request from this form is already in flight")]
    AlreadyInFlight,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("No confirmation pending for '{0}'")]
    NotConfirmed(String),

    #[error("Deletion of '{0}' was cancelled")]
    Cancelled(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Camera(#[from] CameraError),

    #[error("Response was superseded by a newer request")]
    Superseded,
}
