use std::path::PathBuf;

use axum::body::Bytes;
use uuid::Uuid;

/// Largest accepted file, resumes and images alike.
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Prefix of every locator handed out; `/uploads` is served statically.
const PUBLIC_PREFIX: &str = "uploads/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Resume,
    Avatar,
    Logo,
}

impl UploadKind {
    pub fn field_name(&self) -> &'static str {
        match self {
            UploadKind::Resume => "resume",
            UploadKind::Avatar => "avatar",
            UploadKind::Logo => "logo",
        }
    }

    fn accepts(&self, extension: &str, content_type: &str) -> bool {
        match self {
            UploadKind::Resume => {
                matches!(extension, "pdf" | "doc" | "docx")
                    && matches!(
                        content_type,
                        "application/pdf"
                            | "application/msword"
                            | "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
                    )
            }
            UploadKind::Avatar | UploadKind::Logo => {
                matches!(extension, "jpeg" | "jpg" | "png" | "gif")
                    && matches!(
                        content_type,
                        "image/jpeg" | "image/jpg" | "image/png" | "image/gif"
                    )
            }
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("Resume must be a PDF, DOC, or DOCX file")]
    InvalidResume,
    #[error("Images must be JPEG, JPG, PNG, or GIF format")]
    InvalidImage,
    #[error("File too large. Maximum size is 5MB")]
    TooLarge,
    #[error("Uploaded file is empty")]
    Empty,
}

/// A file that passed validation and is ready to be stored.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub kind: UploadKind,
    pub extension: String,
    pub bytes: Bytes,
}

pub fn validate_upload(
    kind: UploadKind,
    file_name: &str,
    content_type: &str,
    bytes: Bytes,
) -> Result<FileUpload, UploadError> {
    if bytes.is_empty() {
        return Err(UploadError::Empty);
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(UploadError::TooLarge);
    }

    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    if !kind.accepts(&extension, &content_type.to_ascii_lowercase()) {
        return Err(match kind {
            UploadKind::Resume => UploadError::InvalidResume,
            UploadKind::Avatar | UploadKind::Logo => UploadError::InvalidImage,
        });
    }

    Ok(FileUpload {
        kind,
        extension,
        bytes,
    })
}

/// Where uploaded files live. Returns a locator that the rest of the system
/// stores and later hands back to `remove`.
pub trait BlobStore {
    async fn put(&self, upload: &FileUpload) -> std::io::Result<String>;

    /// Removing a blob that is already gone is not an error.
    async fn remove(&self, locator: &str) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct DiskBlobStore {
    root: PathBuf,
}

impl DiskBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DiskBlobStore { root: root.into() }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    fn path_for(&self, locator: &str) -> Option<PathBuf> {
        let name = locator.strip_prefix(PUBLIC_PREFIX)?;
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return None;
        }
        Some(self.root.join(name))
    }
}

impl BlobStore for DiskBlobStore {
    async fn put(&self, upload: &FileUpload) -> std::io::Result<String> {
        tokio::fs::create_dir_all(&self.root).await?;

        let name = format!(
            "{}-{}.{}",
            upload.kind.field_name(),
            Uuid::new_v4(),
            upload.extension
        );
        tokio::fs::write(self.root.join(&name), &upload.bytes).await?;

        Ok(format!("{}{}", PUBLIC_PREFIX, name))
    }

    async fn remove(&self, locator: &str) -> std::io::Result<()> {
        // Defaults such as "default-avatar.png" are not ours to delete.
        let Some(path) = self.path_for(locator) else {
            return Ok(());
        };
        match tokio::fs::remove_file(path).await {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}
