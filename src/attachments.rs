//! Attachment storage: uploaded files written under the public directory.
//!
//! Accepted uploads land in `{public_dir}/uploads/{millis}-{sanitized name}`
//! and are referenced by their public path `/uploads/...`, which the HTTP
//! server serves directly. Saving never fails past this boundary: every
//! rejection, including I/O errors, comes back as a [`Decline`]. Removal is
//! best-effort and only logs failures.

use std::ffi::OsStr;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};

use axum::body::Bytes;

use crate::models::FileRef;

/// Sub-directory of the public directory holding attachments.
pub const UPLOADS_SUBDIR: &str = "uploads";

/// Extensions accepted for attachments (compared lower-case).
pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "pdf", "docx"];

/// Maximum attachment size: 5 MB.
pub const MAX_ATTACHMENT_BYTES: u64 = 5 * 1024 * 1024;

/// Longest sanitized file name kept after the timestamp prefix.
const MAX_SANITIZED_LEN: usize = 100;

/// Attempts at finding a free file name before giving up.
const MAX_NAME_ATTEMPTS: i64 = 16;

/// One uploaded file as received from a multipart request.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl UploadedFile {
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Why an upload was not stored.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Decline {
    #[error("file has no name")]
    MissingName,
    #[error("file type not allowed: {extension:?}")]
    ExtensionNotAllowed { extension: String },
    #[error("file too large: {size} bytes (max {max})")]
    TooLarge { size: u64, max: u64 },
    #[error("failed to store file: {0}")]
    Io(String),
}

#[derive(Debug, Clone)]
pub struct AttachmentStore {
    public_dir: PathBuf,
}

impl AttachmentStore {
    pub fn new(public_dir: impl Into<PathBuf>) -> Self {
        Self {
            public_dir: public_dir.into(),
        }
    }

    pub fn public_dir(&self) -> &Path {
        &self.public_dir
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.public_dir.join(UPLOADS_SUBDIR)
    }

    /// Check name, extension and size without touching the disk.
    pub fn check(&self, upload: &UploadedFile) -> Result<(), Decline> {
        if upload.file_name.trim().is_empty() {
            return Err(Decline::MissingName);
        }

        let extension = file_extension(&upload.file_name);
        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(Decline::ExtensionNotAllowed { extension });
        }

        if upload.size() > MAX_ATTACHMENT_BYTES {
            return Err(Decline::TooLarge {
                size: upload.size(),
                max: MAX_ATTACHMENT_BYTES,
            });
        }

        Ok(())
    }

    /// Validate and write one upload. Returns its public path.
    pub fn save(&self, upload: &UploadedFile) -> Result<String, Decline> {
        if let Err(decline) = self.check(upload) {
            tracing::warn!(
                filename = %upload.file_name,
                size = upload.size(),
                reason = %decline,
                "Attachment declined"
            );
            return Err(decline);
        }

        let dir = self.uploads_dir();
        if let Err(e) = std::fs::create_dir_all(&dir) {
            tracing::error!(dir = %dir.display(), "Failed to create uploads dir: {e}");
            return Err(Decline::Io(e.to_string()));
        }

        let safe_name = sanitize_filename(&upload.file_name);
        let mut stamp = chrono::Utc::now().timestamp_millis();

        for _ in 0..MAX_NAME_ATTEMPTS {
            let stored_name = format!("{stamp}-{safe_name}");
            let path = dir.join(&stored_name);

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    if let Err(e) = file.write_all(&upload.bytes) {
                        tracing::error!(path = %path.display(), "Failed to write attachment: {e}");
                        drop(file);
                        let _ = std::fs::remove_file(&path);
                        return Err(Decline::Io(e.to_string()));
                    }
                    tracing::info!(
                        filename = %stored_name,
                        size = upload.size(),
                        "Attachment stored"
                    );
                    return Ok(format!("/{UPLOADS_SUBDIR}/{stored_name}"));
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    stamp += 1;
                }
                Err(e) => {
                    tracing::error!(path = %path.display(), "Failed to create attachment: {e}");
                    return Err(Decline::Io(e.to_string()));
                }
            }
        }

        tracing::error!(filename = %safe_name, "No free attachment name found");
        Err(Decline::Io("no free file name".into()))
    }

    /// Map a public path (`/uploads/x.png`) to its file on disk.
    ///
    /// Returns `None` for anything outside the uploads directory.
    pub fn resolve(&self, public_path: &str) -> Option<PathBuf> {
        let relative = Path::new(public_path.trim_start_matches('/'));
        let only_normal = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !only_normal {
            return None;
        }

        let mut components = relative.components();
        let in_uploads = components.next() == Some(Component::Normal(OsStr::new(UPLOADS_SUBDIR)));
        if !in_uploads || components.next().is_none() {
            return None;
        }
        Some(self.public_dir.join(relative))
    }

    /// Delete one stored attachment. Failures are logged, never raised.
    ///
    /// Returns whether a file was actually removed.
    pub fn remove(&self, public_path: &str) -> bool {
        let Some(path) = self.resolve(public_path) else {
            tracing::warn!(path = %public_path, "Refusing to delete file outside uploads dir");
            return false;
        };

        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Attachment deleted");
                true
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), "Failed to delete attachment: {e}");
                false
            }
        }
    }

    /// Delete every referenced attachment independently.
    ///
    /// Returns the number of files removed.
    pub fn remove_all<'a>(&self, files: impl IntoIterator<Item = &'a FileRef>) -> usize {
        files
            .into_iter()
            .map(FileRef::path)
            .filter(|p| !p.is_empty())
            .filter(|p| self.remove(p))
            .count()
    }
}

/// Lower-cased extension after the last dot, or an empty string.
pub fn file_extension(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

/// Sanitize a filename. Every character outside `[A-Za-z0-9.-]` becomes `_`.
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    // Collapse dot runs so no `..` survives and the extension dot is kept
    let mut sanitized = sanitized;
    while sanitized.contains("..") {
        sanitized = sanitized.replace("..", ".");
    }

    // Keep the tail so the extension survives truncation
    let sanitized = if sanitized.len() > MAX_SANITIZED_LEN {
        sanitized[sanitized.len() - MAX_SANITIZED_LEN..].to_string()
    } else {
        sanitized
    };

    if sanitized.is_empty() {
        "document".into()
    } else {
        sanitized
    }
}
