use chrono::{DateTime, Utc};

use super::domain::{PropertyId, UserId, ValidationError};

/// Bucket holding listing photos.
pub const PROPERTY_IMAGES_BUCKET: &str = "property-images";

/// Object storage backend for uploaded files.
pub trait ObjectStorage: Send + Sync {
    fn upload(
        &self,
        bucket: &str,
        path: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<(), StorageError>;

    fn public_url(&self, bucket: &str, path: &str) -> String;
}

/// File picked by a dealer for a new listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// Guessed from the file name; anything that is not `image/*` is refused.
    pub fn content_type(&self) -> Result<String, ValidationError> {
        mime_guess::from_path(&self.file_name)
            .first()
            .filter(|mime| mime.type_() == mime_guess::mime::IMAGE)
            .map(|mime| mime.essence_str().to_string())
            .ok_or_else(|| ValidationError::UnsupportedImage {
                file_name: self.file_name.clone(),
            })
    }

    pub fn extension(&self) -> &str {
        self.file_name
            .rsplit_once('.')
            .map(|(_, extension)| extension)
            .filter(|extension| !extension.is_empty())
            .unwrap_or("bin")
    }

    /// `{owner}/{property}/{millis}-{index}.{ext}`
    pub fn object_path(
        &self,
        owner: &UserId,
        property: &PropertyId,
        uploaded_at: DateTime<Utc>,
        index: usize,
    ) -> String {
        format!(
            "{owner}/{property}/{}-{index}.{}",
            uploaded_at.timestamp_millis(),
            self.extension().to_ascii_lowercase()
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("object already exists at {0}")]
    AlreadyExists(String),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}
