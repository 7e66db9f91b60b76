//! Wire contract of the face authentication service and its HTTP transport.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::ServiceConfig;
use crate::error::ApiError;

/// Business events a verification can authorize. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventName {
    #[default]
    LoginEvent,
    TransactionEvent,
    PaymentEvent,
    AdminEvent,
    SensitiveOperation,
}

impl EventName {
    pub const ALL: [EventName; 5] = [
        EventName::LoginEvent,
        EventName::TransactionEvent,
        EventName::PaymentEvent,
        EventName::AdminEvent,
        EventName::SensitiveOperation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::LoginEvent => "login-event",
            EventName::TransactionEvent => "transaction-event",
            EventName::PaymentEvent => "payment-event",
            EventName::AdminEvent => "admin-event",
            EventName::SensitiveOperation => "sensitive-operation",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventName::ALL
            .iter()
            .copied()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| {
                let allowed: Vec<&str> = EventName::ALL.iter().map(|e| e.as_str()).collect();
                format!("unknown event '{}', expected one of: {}", s, allowed.join(", "))
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemHealth {
    #[serde(default)]
    pub status: String,
    pub enrolled_users: u64,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnrolledUserSummary {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
struct UsersResponse {
    enrolled_users: Vec<EnrolledUserSummary>,
}

/// Acknowledgement of a mutating call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyRequestBody<'a> {
    pub event: EventName,
    pub token: &'a str,
    pub facial_data: &'a str,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub success: bool,
    #[serde(default)]
    pub user_id: Option<String>,
    pub event: String,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

/// Bytes and metadata of the image sent as the multipart file part.
#[derive(Debug, Clone)]
pub struct ImagePart {
    pub file_name: String,
    pub mime: String,
    pub bytes: Arc<[u8]>,
}

/// The five exchanges with the service. Implementations block; the
/// dispatcher moves them off the event loop.
pub trait FaceAuthApi: Send + Sync + 'static {
    fn health(&self) -> Result<SystemHealth, ApiError>;
    fn list_users(&self) -> Result<Vec<EnrolledUserSummary>, ApiError>;
    fn enroll(&self, user_id: &str, image: &ImagePart) -> Result<Ack, ApiError>;
    fn verify(&self, event: EventName, token: &str, facial_data: &str) -> Result<VerificationResult, ApiError>;
    fn delete_user(&self, user_id: &str) -> Result<Ack, ApiError>;
}

/// `ureq`-backed transport.
pub struct HttpApi {
    agent: ureq::Agent,
    base_url: String,
}

impl fmt::Debug for HttpApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpApi").field("base_url", &self.base_url).finish()
    }
}

impl HttpApi {
    pub fn new(config: &ServiceConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(config.timeout())
            .user_agent(concat!("faceauth-client/", env!("CARGO_PKG_VERSION")))
            .build();
        Self {
            agent,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Status and body text of an answered request, whatever the status.
struct Answer {
    status: u16,
    reason: String,
    body: String,
}

fn answer(result: Result<ureq::Response, ureq::Error>) -> Result<Answer, ApiError> {
    let response = match result {
        Ok(response) => response,
        Err(ureq::Error::Status(_, response)) => response,
        Err(ureq::Error::Transport(transport)) => {
            log::error!("Transport failure: {}", transport);
            return Err(ApiError::Network(transport.to_string()));
        }
    };
    let status = response.status();
    let reason = response.status_text().to_string();
    let body = response
        .into_string()
        .map_err(|e| ApiError::Network(format!("failed to read response body: {}", e)))?;
    debug!("HTTP {} ({} bytes)", status, body.len());
    Ok(Answer { status, reason, body })
}

impl FaceAuthApi for HttpApi {
    fn health(&self) -> Result<SystemHealth, ApiError> {
        let a = answer(self.agent.get(&self.url("/health")).call())?;
        decode_json(a.status, &a.reason, &a.body)
    }

    fn list_users(&self) -> Result<Vec<EnrolledUserSummary>, ApiError> {
        let a = answer(self.agent.get(&self.url("/users")).call())?;
        decode_json::<UsersResponse>(a.status, &a.reason, &a.body).map(|r| r.enrolled_users)
    }

    fn enroll(&self, user_id: &str, image: &ImagePart) -> Result<Ack, ApiError> {
        let boundary = multipart_boundary();
        let body = multipart_file_body(&boundary, "file", &image.file_name, &image.mime, &image.bytes);
        let a = answer(
            self.agent
                .post(&self.url("/enroll"))
                .query("user_id", user_id)
                .set("Content-Type", &format!("multipart/form-data; boundary={}", boundary))
                .send_bytes(&body),
        )?;
        decode_ack(a.status, &a.reason, &a.body)
    }

    fn verify(&self, event: EventName, token: &str, facial_data: &str) -> Result<VerificationResult, ApiError> {
        let payload = serde_json::to_string(&VerifyRequestBody { event, token, facial_data })
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        let a = answer(
            self.agent
                .post(&self.url("/verify"))
                .set("Content-Type", "application/json")
                .send_string(&payload),
        )?;
        decode_verification(a.status, &a.reason, &a.body)
    }

    fn delete_user(&self, user_id: &str) -> Result<Ack, ApiError> {
        let path = format!("/enroll/{}", encode_path_segment(user_id));
        let a = answer(self.agent.delete(&self.url(&path)).call())?;
        decode_ack(a.status, &a.reason, &a.body)
    }
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

/// Maps a non-2xx answer onto the error taxonomy.
pub fn status_error(status: u16, reason: &str, body: &str) -> ApiError {
    let detail = match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody { detail: serde_json::Value::String(s) }) => s,
        Ok(ErrorBody { detail }) => detail.to_string(),
        Err(_) if !body.trim().is_empty() => body.trim().to_string(),
        Err(_) => format!("HTTP {} {}", status, reason).trim_end().to_string(),
    };

    match status {
        400 | 401 | 404 | 409 | 413 | 422 => ApiError::Validation { status, detail },
        _ => ApiError::Application { status, detail },
    }
}

pub fn decode_json<T: serde::de::DeserializeOwned>(status: u16, reason: &str, body: &str) -> Result<T, ApiError> {
    if !is_success(status) {
        return Err(status_error(status, reason, body));
    }
    serde_json::from_str(body).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Mutating calls only need a 2xx; the body is informational.
pub fn decode_ack(status: u16, reason: &str, body: &str) -> Result<Ack, ApiError> {
    if !is_success(status) {
        return Err(status_error(status, reason, body));
    }
    Ok(serde_json::from_str(body).unwrap_or_default())
}

/// A structured verification body is an outcome whatever the status code.
pub fn decode_verification(status: u16, reason: &str, body: &str) -> Result<VerificationResult, ApiError> {
    match serde_json::from_str::<VerificationResult>(body) {
        Ok(result) => Ok(result),
        Err(_) if !is_success(status) => Err(status_error(status, reason, body)),
        Err(e) => Err(ApiError::Decode(e.to_string())),
    }
}

fn multipart_boundary() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("----faceauth-{:x}", nanos)
}

/// A `multipart/form-data` body holding a single file part.
pub fn multipart_file_body(boundary: &str, field: &str, file_name: &str, mime: &str, bytes: &[u8]) -> Vec<u8> {
    let file_name = file_name.replace(['"', '\r', '\n'], "_");
    let mut body = Vec::with_capacity(bytes.len() + 256);
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n", field, file_name).as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", mime).as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}

/// Percent-encodes everything outside the RFC 3986 unreserved set.
pub fn encode_path_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => out.push(byte as char),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}
