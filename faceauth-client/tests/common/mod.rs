#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use faceauth_client::api::{Ack, EnrolledUserSummary, EventName, FaceAuthApi, ImagePart, SystemHealth, VerificationResult};
use faceauth_client::camera::{CameraFrame, CameraProvider, FrameSource};
use faceauth_client::config::{CameraConfig, ClientConfig};
use faceauth_client::error::{ApiError, CameraError};
use faceauth_client::media::MediaSource;
use faceauth_client::session::Session;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Health,
    ListUsers,
    Enroll { user_id: String, file_name: String, size: usize },
    Verify { event: EventName, token: String, facial_data: String },
    Delete(String),
}

/// In-memory service that records every call and can be scripted to fail
/// or to hold a verification or a user listing until the test releases it.
#[derive(Default)]
pub struct FakeApi {
    calls: Mutex<Vec<Call>>,
    users: Mutex<Vec<String>>,
    enroll_failure: Mutex<Option<ApiError>>,
    delete_failure: Mutex<Option<ApiError>>,
    users_failure: Mutex<Option<ApiError>>,
    verify_replies: Mutex<VecDeque<Result<VerificationResult, ApiError>>>,
    verify_gate: Mutex<Option<mpsc::Receiver<()>>>,
    users_gate: Mutex<Option<mpsc::Receiver<()>>>,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_users(users: &[&str]) -> Arc<Self> {
        let api = Self::default();
        *api.users.lock().unwrap() = users.iter().map(|u| u.to_string()).collect();
        Arc::new(api)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    pub fn list_calls(&self) -> usize {
        self.count(|c| *c == Call::ListUsers)
    }

    pub fn deletes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Delete(user) => Some(user),
                _ => None,
            })
            .collect()
    }

    pub fn fail_enroll(&self, error: ApiError) {
        *self.enroll_failure.lock().unwrap() = Some(error);
    }

    pub fn fail_delete(&self, error: ApiError) {
        *self.delete_failure.lock().unwrap() = Some(error);
    }

    pub fn fail_users(&self, error: ApiError) {
        *self.users_failure.lock().unwrap() = Some(error);
    }

    pub fn reply_verify(&self, reply: Result<VerificationResult, ApiError>) {
        self.verify_replies.lock().unwrap().push_back(reply);
    }

    /// The next verification blocks until the returned sender fires.
    pub fn hold_next_verify(&self) -> mpsc::Sender<()> {
        let (tx, rx) = mpsc::channel();
        *self.verify_gate.lock().unwrap() = Some(rx);
        tx
    }

    /// The next user listing reads the current users, then blocks until
    /// the returned sender fires before answering with that snapshot.
    pub fn hold_next_list(&self) -> mpsc::Sender<()> {
        let (tx, rx) = mpsc::channel();
        *self.users_gate.lock().unwrap() = Some(rx);
        tx
    }

    pub fn add_user(&self, user_id: &str) {
        self.users.lock().unwrap().push(user_id.to_string());
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl FaceAuthApi for FakeApi {
    fn health(&self) -> Result<SystemHealth, ApiError> {
        self.record(Call::Health);
        Ok(SystemHealth {
            status: "healthy".into(),
            enrolled_users: self.users.lock().unwrap().len() as u64,
            timestamp: None,
        })
    }

    fn list_users(&self) -> Result<Vec<EnrolledUserSummary>, ApiError> {
        // Taken before recording: once the call shows up it is the held one.
        let gate = self.users_gate.lock().unwrap().take();
        self.record(Call::ListUsers);
        if let Some(error) = self.users_failure.lock().unwrap().clone() {
            return Err(error);
        }
        let snapshot: Vec<EnrolledUserSummary> = self
            .users
            .lock()
            .unwrap()
            .iter()
            .map(|u| EnrolledUserSummary { user_id: u.clone() })
            .collect();
        if let Some(gate) = gate {
            let _ = gate.recv();
        }
        Ok(snapshot)
    }

    fn enroll(&self, user_id: &str, image: &ImagePart) -> Result<Ack, ApiError> {
        self.record(Call::Enroll {
            user_id: user_id.to_string(),
            file_name: image.file_name.clone(),
            size: image.bytes.len(),
        });
        if let Some(error) = self.enroll_failure.lock().unwrap().take() {
            return Err(error);
        }
        self.users.lock().unwrap().push(user_id.to_string());
        Ok(Ack { message: format!("Successfully enrolled user {}", user_id) })
    }

    fn verify(&self, event: EventName, token: &str, facial_data: &str) -> Result<VerificationResult, ApiError> {
        self.record(Call::Verify {
            event,
            token: token.to_string(),
            facial_data: facial_data.to_string(),
        });
        let gate = self.verify_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.recv();
        }
        self.verify_replies.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(VerificationResult {
                success: true,
                user_id: Some("alice".into()),
                event: event.to_string(),
                confidence: Some(0.93),
                message: "Face verified".into(),
            })
        })
    }

    fn delete_user(&self, user_id: &str) -> Result<Ack, ApiError> {
        self.record(Call::Delete(user_id.to_string()));
        if let Some(error) = self.delete_failure.lock().unwrap().take() {
            return Err(error);
        }
        self.users.lock().unwrap().retain(|u| u != user_id);
        Ok(Ack { message: format!("Successfully deleted user {}", user_id) })
    }
}

/// Camera that produces a tiny grey frame and counts opens and releases.
#[derive(Clone, Default)]
pub struct FakeCamera {
    pub opened: Arc<AtomicUsize>,
    pub released: Arc<AtomicUsize>,
    pub broken: bool,
}

impl FakeCamera {
    pub fn broken() -> Self {
        Self { broken: true, ..Self::default() }
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

struct FakeFrames {
    released: Arc<AtomicUsize>,
}

impl FrameSource for FakeFrames {
    fn read_frame(&mut self) -> Result<CameraFrame, CameraError> {
        Ok(CameraFrame {
            rgb_data: vec![128; 4 * 4 * 3],
            width: 4,
            height: 4,
        })
    }
}

impl Drop for FakeFrames {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

impl CameraProvider for FakeCamera {
    fn open(&self, config: &CameraConfig) -> Result<Box<dyn FrameSource>, CameraError> {
        if self.broken {
            return Err(CameraError::Open {
                device: config.device_id,
                message: "permission denied".into(),
            });
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeFrames { released: Arc::clone(&self.released) }))
    }
}

pub fn config() -> ClientConfig {
    let mut config = ClientConfig::default();
    config.camera.frame_interval_ms = 5;
    config
}

pub fn session(api: &Arc<FakeApi>, camera: FakeCamera) -> Session {
    Session::new(&config(), api.clone(), Box::new(camera))
}

pub fn jpeg_upload(name: &str) -> MediaSource {
    MediaSource::Upload {
        file_name: name.into(),
        mime: "image/jpeg".into(),
        bytes: vec![0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10],
    }
}

pub fn missing_file() -> MediaSource {
    MediaSource::File(std::env::temp_dir().join("faceauth-missing-5f3a9c.jpg"))
}

pub fn pdf_upload() -> MediaSource {
    MediaSource::Upload {
        file_name: "scan.pdf".into(),
        mime: "application/pdf".into(),
        bytes: b"%PDF-1.4".to_vec(),
    }
}

pub fn validation(detail: &str) -> ApiError {
    ApiError::Validation { status: 400, detail: detail.into() }
}

/// Polls `check` until it holds or two seconds pass.
pub async fn eventually(check: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
