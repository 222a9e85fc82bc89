use std::{io::ErrorKind, path::PathBuf};

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use uuid::Uuid;

use crate::error::AppError;

/// Directory (relative to the media root) holding recipe illustrations.
pub const IMAGE_UPLOAD_DIR: &str = "recipes/images";

/// Public URL prefix under which the media root is served.
pub const MEDIA_URL: &str = "/media/";

/// An uploaded image after decoding its data URL.
#[derive(Debug, PartialEq)]
pub struct DecodedImage {
    pub extension: &'static str,
    pub bytes: Vec<u8>,
}

/// Decodes `data:image/<type>;base64,<payload>` into raw bytes.
pub fn decode_data_url(input: &str) -> Result<DecodedImage, AppError> {
    let invalid = || AppError::field("image", "Upload a valid image as a base64 data URL.");

    let rest = input.trim().strip_prefix("data:").ok_or_else(invalid)?;
    let (meta, payload) = rest.split_once(',').ok_or_else(invalid)?;
    let mime = meta.strip_suffix(";base64").ok_or_else(invalid)?;

    let extension = match mime.to_ascii_lowercase().as_str() {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => return Err(invalid()),
    };

    let bytes = STANDARD.decode(payload.trim()).map_err(|_| invalid())?;
    if bytes.is_empty() {
        return Err(invalid());
    }

    Ok(DecodedImage { extension, bytes })
}

/// Public URL of a stored media path.
pub fn media_url(path: &str) -> String {
    format!("{}{}", MEDIA_URL, path)
}

/// Storage backend for recipe images.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Persists the image and returns its path relative to the media root.
    async fn save(&self, image: &DecodedImage) -> Result<String, AppError>;

    /// Removes a previously stored image. Missing files are not an error.
    async fn remove(&self, path: &str) -> Result<(), AppError>;
}

/// Stores images on the local filesystem under the media root.
pub struct LocalImageStore {
    root: PathBuf,
}

impl LocalImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    async fn save(&self, image: &DecodedImage) -> Result<String, AppError> {
        let relative = format!("{}/{}.{}", IMAGE_UPLOAD_DIR, Uuid::new_v4(), image.extension);
        let full_path = self.root.join(&relative);

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::InternalServerError(e.to_string()))?;
        }

        tokio::fs::write(&full_path, &image.bytes)
            .await
            .map_err(|e| AppError::InternalServerError(e.to_string()))?;

        tracing::debug!("Stored image {} ({} bytes)", relative, image.bytes.len());
        Ok(relative)
    }

    async fn remove(&self, path: &str) -> Result<(), AppError> {
        if path.split('/').any(|segment| segment == "..") {
            return Err(AppError::BadRequest(format!("Refusing to remove '{}'", path)));
        }

        match tokio::fs::remove_file(self.root.join(path)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::InternalServerError(e.to_string())),
        }
    }
}
