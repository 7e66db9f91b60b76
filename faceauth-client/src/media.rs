//! Face image acquisition: validation, camera frame materialization and
//! preview encoding.

use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::ColorType;
use log::{debug, info};

use crate::camera::CameraFrame;
use crate::config::MediaConfig;
use crate::error::ValidationError;

pub const CAMERA_FILE_NAME: &str = "capture.jpg";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    File,
    CameraFrame,
}

/// Where an image comes from.
pub enum MediaSource {
    /// A file picked from disk; its MIME type is derived from the extension.
    File(PathBuf),
    /// Bytes handed over by a picker that already knows the content type.
    Upload {
        file_name: String,
        mime: String,
        bytes: Vec<u8>,
    },
    /// A raw frame captured from the live camera stream.
    Camera(CameraFrame),
}

impl fmt::Debug for MediaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaSource::File(path) => f.debug_tuple("File").field(path).finish(),
            MediaSource::Upload { file_name, mime, bytes } => f
                .debug_struct("Upload")
                .field("file_name", file_name)
                .field("mime", mime)
                .field("len", &bytes.len())
                .finish(),
            MediaSource::Camera(frame) => f
                .debug_struct("Camera")
                .field("width", &frame.width)
                .field("height", &frame.height)
                .finish(),
        }
    }
}

/// A validated face image held in memory.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageAsset {
    pub source: SourceKind,
    pub file_name: String,
    pub mime: String,
    pub size_bytes: u64,
    bytes: Arc<[u8]>,
    preview: String,
}

impl fmt::Debug for ImageAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageAsset")
            .field("source", &self.source)
            .field("file_name", &self.file_name)
            .field("mime", &self.mime)
            .field("size_bytes", &self.size_bytes)
            .finish()
    }
}

impl ImageAsset {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    /// `data:<mime>;base64,<payload>` for display.
    pub fn preview(&self) -> &str {
        &self.preview
    }

    /// The base64 payload without the data-URL prefix, as sent to /verify.
    pub fn base64_payload(&self) -> &str {
        strip_data_url_prefix(&self.preview)
    }
}

/// Checks the MIME type first, then the size. Nothing else runs before these.
pub fn validate(mime: &str, size: u64, limit: u64) -> Result<(), ValidationError> {
    if !mime.starts_with("image/") {
        return Err(ValidationError::NotAnImage { mime: mime.to_string() });
    }
    if size > limit {
        return Err(ValidationError::TooLarge { size, limit });
    }
    Ok(())
}

pub fn data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, general_purpose::STANDARD.encode(bytes))
}

pub fn strip_data_url_prefix(value: &str) -> &str {
    if value.starts_with("data:") {
        if let Some((_, payload)) = value.split_once(',') {
            return payload;
        }
    }
    value
}

pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" | "jfif" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        "tif" | "tiff" => "image/tiff",
        "heic" => "image/heic",
        "txt" => "text/plain",
        "pdf" => "application/pdf",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}

/// Encodes a raw RGB frame into a JPEG blob.
pub fn materialize_frame(frame: &CameraFrame, quality: u8) -> Result<Vec<u8>, ValidationError> {
    let expected = frame.width as usize * frame.height as usize * 3;
    if frame.rgb_data.len() != expected {
        return Err(ValidationError::FrameEncoding(format!(
            "frame is {} bytes, expected {} for {}x{} RGB",
            frame.rgb_data.len(),
            expected,
            frame.width,
            frame.height
        )));
    }

    let mut out = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode(&frame.rgb_data, frame.width, frame.height, ColorType::Rgb8)
        .map_err(|e| ValidationError::FrameEncoding(e.to_string()))?;
    Ok(out.into_inner())
}

/// Turns a [`MediaSource`] into an [`ImageAsset`].
#[derive(Debug, Clone)]
pub struct MediaAcquirer {
    max_bytes: u64,
    jpeg_quality: u8,
}

impl MediaAcquirer {
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            max_bytes: config.max_image_bytes,
            jpeg_quality: config.jpeg_quality,
        }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub async fn acquire(&self, source: MediaSource) -> Result<ImageAsset, ValidationError> {
        let (kind, file_name, mime, bytes) = match source {
            MediaSource::File(path) => {
                let mime = mime_for_path(&path).to_string();
                if !mime.starts_with("image/") {
                    return Err(ValidationError::NotAnImage { mime });
                }

                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "upload".to_string());
                let bytes = read_file(path, self.max_bytes).await?;
                (SourceKind::File, file_name, mime, bytes)
            }
            MediaSource::Upload { file_name, mime, bytes } => {
                (SourceKind::File, file_name, mime, bytes)
            }
            MediaSource::Camera(frame) => {
                let quality = self.jpeg_quality;
                let bytes = tokio::task::spawn_blocking(move || materialize_frame(&frame, quality))
                    .await
                    .map_err(|e| ValidationError::FrameEncoding(e.to_string()))??;
                (SourceKind::CameraFrame, CAMERA_FILE_NAME.to_string(), "image/jpeg".to_string(), bytes)
            }
        };

        let size = bytes.len() as u64;
        validate(&mime, size, self.max_bytes)?;

        let bytes: Arc<[u8]> = Arc::from(bytes);
        let preview = {
            let bytes = Arc::clone(&bytes);
            let mime = mime.clone();
            tokio::task::spawn_blocking(move || data_url(&mime, &bytes))
                .await
                .map_err(|e| ValidationError::FrameEncoding(e.to_string()))?
        };

        info!("Acquired {} ({}, {} bytes) from {:?}", file_name, mime, size, kind);

        Ok(ImageAsset {
            source: kind,
            file_name,
            mime,
            size_bytes: size,
            bytes,
            preview,
        })
    }
}

/// Stats then reads the file on the blocking pool. An oversized file is
/// rejected before any of it is read.
async fn read_file(path: PathBuf, limit: u64) -> Result<Vec<u8>, ValidationError> {
    debug!("Reading image file {:?}", path);
    tokio::task::spawn_blocking(move || -> Result<Vec<u8>, ValidationError> {
        let size = std::fs::metadata(&path)
            .map_err(|source| ValidationError::Unreadable { path: path.clone(), source })?
            .len();
        if size > limit {
            return Err(ValidationError::TooLarge { size, limit });
        }
        std::fs::read(&path).map_err(|source| ValidationError::Unreadable { path, source })
    })
    .await
    .map_err(|e| ValidationError::FrameEncoding(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn acquirer() -> MediaAcquirer {
        MediaAcquirer::new(&MediaConfig::default())
    }

    #[test]
    fn mime_check_runs_before_size_check() {
        let err = validate("text/plain", 10 * 1024 * 1024, 5 * 1024 * 1024).unwrap_err();
        assert!(matches!(err, ValidationError::NotAnImage { .. }));
    }

    #[test]
    fn size_limit_is_inclusive() {
        let limit = 5 * 1024 * 1024;
        assert!(validate("image/png", limit, limit).is_ok());
        assert!(matches!(
            validate("image/png", limit + 1, limit),
            Err(ValidationError::TooLarge { size, .. }) if size == limit + 1
        ));
    }

    #[test]
    fn data_url_prefix_is_stripped_for_transmission() {
        let url = data_url("image/jpeg", b"\xff\xd8\xff");
        assert!(url.starts_with("data:image/jpeg;base64,"));
        assert_eq!(strip_data_url_prefix(&url), "/9j/");
        assert_eq!(strip_data_url_prefix("/9j/"), "/9j/");
    }

    #[test]
    fn extension_drives_mime_type() {
        assert_eq!(mime_for_path(Path::new("face.JPG")), "image/jpeg");
        assert_eq!(mime_for_path(Path::new("face.png")), "image/png");
        assert_eq!(mime_for_path(Path::new("notes.txt")), "text/plain");
        assert_eq!(mime_for_path(Path::new("no_extension")), "application/octet-stream");
    }

    #[test]
    fn frame_with_wrong_length_is_rejected() {
        let frame = CameraFrame { rgb_data: vec![0; 10], width: 4, height: 4 };
        assert!(matches!(
            materialize_frame(&frame, 90),
            Err(ValidationError::FrameEncoding(_))
        ));
    }

    #[tokio::test]
    async fn file_is_read_and_encoded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("face.png");
        std::fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();

        let asset = acquirer().acquire(MediaSource::File(path)).await.unwrap();
        assert_eq!(asset.source, SourceKind::File);
        assert_eq!(asset.file_name, "face.png");
        assert_eq!(asset.mime, "image/png");
        assert_eq!(asset.size_bytes, 4);
        assert_eq!(asset.bytes(), &[0x89, b'P', b'N', b'G']);
        assert!(asset.preview().starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn non_image_file_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();

        let err = acquirer().acquire(MediaSource::File(path)).await.unwrap_err();
        assert!(matches!(err, ValidationError::NotAnImage { ref mime } if mime == "text/plain"));
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let source = MediaSource::Upload {
            file_name: "big.jpg".into(),
            mime: "image/jpeg".into(),
            bytes: vec![0; 5 * 1024 * 1024 + 1],
        };
        let err = acquirer().acquire(source).await.unwrap_err();
        assert!(matches!(err, ValidationError::TooLarge { .. }));
    }

    #[tokio::test]
    async fn oversized_file_is_rejected_before_reading() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("huge.jpg");
        let file = std::fs::File::create(&path).unwrap();
        file.set_len(5 * 1024 * 1024 + 1).unwrap();

        let err = acquirer().acquire(MediaSource::File(path)).await.unwrap_err();
        assert!(matches!(err, ValidationError::TooLarge { size, .. } if size == 5 * 1024 * 1024 + 1));
    }

    #[tokio::test]
    async fn missing_file_is_unreadable() {
        let dir = tempdir().unwrap();
        let err = acquirer()
            .acquire(MediaSource::File(dir.path().join("gone.jpg")))
            .await
            .unwrap_err();
        assert!(matches!(err, ValidationError::Unreadable { .. }));
    }

    #[tokio::test]
    async fn camera_frame_becomes_jpeg() {
        let frame = CameraFrame { rgb_data: vec![128; 8 * 8 * 3], width: 8, height: 8 };
        let asset = acquirer().acquire(MediaSource::Camera(frame)).await.unwrap();
        assert_eq!(asset.source, SourceKind::CameraFrame);
        assert_eq!(asset.mime, "image/jpeg");
        assert_eq!(asset.file_name, CAMERA_FILE_NAME);
        assert_eq!(&asset.bytes()[..2], &[0xff, 0xd8]);
    }
}
