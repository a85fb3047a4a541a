// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Uploaded image storage under the media root.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ring::rand::{SecureRandom, SystemRandom};
use serde::Serializer;
use std::path::{Path, PathBuf};

/// Largest accepted upload.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// URL prefix under which the media root is served.
pub const MEDIA_URL: &str = "/media/";

/// Upload folders.
pub mod kinds {
    pub const PROFILES: &str = "profiles";
    pub const DONATIONS: &str = "donations";
    pub const ANONYMOUS_LOCATIONS: &str = "anonymous_locations";
}

/// Media errors
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("Upload a valid image. The file you uploaded was either not an image or a corrupted image.")]
    NotAnImage,

    #[error("The submitted data was not a file. Check the encoding type on the form.")]
    InvalidEncoding,

    #[error("Image must be at most 5 MB.")]
    TooLarge,

    #[error("Failed to store upload: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to name upload")]
    Random,
}

/// Stores images on local disk.
#[derive(Clone)]
pub struct MediaStore {
    root: PathBuf,
    rng: SystemRandom,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            rng: SystemRandom::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Decode a base64 (or `data:` URL) image and write it under `kind/`.
    ///
    /// Returns the stored path relative to the media root.
    pub async fn save_image(&self, kind: &str, payload: &str) -> Result<String, MediaError> {
        let bytes = decode_payload(payload)?;
        let ext = sniff_image(&bytes).ok_or(MediaError::NotAnImage)?;

        let mut name = [0u8; 16];
        self.rng.fill(&mut name).map_err(|_| MediaError::Random)?;
        let relative = format!("{}/{}.{}", kind, hex::encode(name), ext);

        let path = self.root.join(&relative);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &bytes).await?;

        tracing::debug!(path = %relative, size = bytes.len(), "Stored upload");
        Ok(relative)
    }

    /// Best-effort removal of a previously stored file.
    pub async fn remove(&self, relative: &str) {
        if relative.contains("..") {
            return;
        }
        if let Err(e) = tokio::fs::remove_file(self.root.join(relative)).await {
            tracing::debug!(path = relative, error = %e, "Could not remove upload");
        }
    }
}

fn decode_payload(payload: &str) -> Result<Vec<u8>, MediaError> {
    let data = match payload.trim().strip_prefix("data:") {
        Some(rest) => {
            let (meta, data) = rest.split_once(',').ok_or(MediaError::InvalidEncoding)?;
            if !meta.ends_with(";base64") {
                return Err(MediaError::InvalidEncoding);
            }
            data
        }
        None => payload.trim(),
    };

    // Decoded size is about three quarters of the encoded length.
    if data.len() / 4 * 3 > MAX_IMAGE_BYTES + 3 {
        return Err(MediaError::TooLarge);
    }
    let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = BASE64
        .decode(compact)
        .map_err(|_| MediaError::InvalidEncoding)?;
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(MediaError::TooLarge);
    }
    Ok(bytes)
}

/// File extension for a supported image format, judged by magic bytes.
fn sniff_image(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("jpg")
    } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("png")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("gif")
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("webp")
    } else {
        None
    }
}

/// Serialize a stored media path as its public URL.
pub fn serialize_media_url<S: Serializer>(
    value: &Option<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(path) if !path.is_empty() => {
            serializer.serialize_str(&format!("{}{}", MEDIA_URL, path))
        }
        _ => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_1X1: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8BQDwAEhQGAhKmMIQAAAABJRU5ErkJggg==";

    #[test]
    fn test_sniff_formats() {
        assert_eq!(sniff_image(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("jpg"));
        assert_eq!(sniff_image(b"GIF89a...."), Some("gif"));
        assert_eq!(sniff_image(b"RIFF\0\0\0\0WEBPVP8 "), Some("webp"));
        assert_eq!(sniff_image(b"%PDF-1.7"), None);
    }

    #[test]
    fn test_decode_data_url() {
        let bytes = decode_payload(&format!("data:image/png;base64,{}", PNG_1X1)).unwrap();
        assert_eq!(sniff_image(&bytes), Some("png"));
        assert!(matches!(
            decode_payload("data:image/png,raw"),
            Err(MediaError::InvalidEncoding)
        ));
    }

    #[tokio::test]
    async fn test_save_image_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let store = MediaStore::new(&root);

        let relative = store
            .save_image(kinds::ANONYMOUS_LOCATIONS, PNG_1X1)
            .await
            .unwrap();
        assert!(relative.starts_with("anonymous_locations/"));
        assert!(relative.ends_with(".png"));
        assert!(root.join(&relative).exists());

        assert!(matches!(
            store.save_image(kinds::DONATIONS, "aGVsbG8=").await,
            Err(MediaError::NotAnImage)
        ));

        store.remove(&relative).await;
        assert!(!root.join(&relative).exists());
    }
}
