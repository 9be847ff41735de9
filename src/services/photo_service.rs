use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::Utc;
use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, ImageError};
use uuid::Uuid;

use crate::error::{Error, Result};

pub const PHOTO_SIZE: u32 = 500;
pub const JPEG_QUALITY: u8 = 90;

/// An avatar held in memory for the duration of one request.
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub content_type: String,
    pub data: Bytes,
}

/// Rejects anything whose declared media type is not `image/*`.
pub fn ensure_image(content_type: Option<&str>) -> Result<&str> {
    match content_type {
        Some(ct) if ct.starts_with("image") => Ok(ct),
        _ => Err(Error::BadRequest(
            "Not an image! Please upload only images.".to_string(),
        )),
    }
}

impl PhotoUpload {
    /// `content_type` is expected to have passed [`ensure_image`] already.
    pub fn new(content_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            content_type: content_type.into(),
            data,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PhotoService {
    dir: PathBuf,
}

impl PhotoService {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn filename_for(user_id: Uuid) -> String {
        format!("user-{}-{}.jpeg", user_id, Utc::now().timestamp_millis())
    }

    /// Resizes and stores the upload, returning the filename to persist.
    ///
    /// Without an upload this returns immediately and touches nothing. With one,
    /// it only returns once the JPEG has been written to disk.
    pub async fn resize_user_photo(
        &self,
        user_id: Uuid,
        upload: Option<PhotoUpload>,
    ) -> Result<Option<String>> {
        let Some(upload) = upload else {
            return Ok(None);
        };

        let filename = Self::filename_for(user_id);
        let data = upload.data;
        let encoded = tokio::task::spawn_blocking(move || transcode(&data, PHOTO_SIZE, JPEG_QUALITY))
            .await
            .map_err(|e| Error::Internal(format!("image worker failed: {}", e)))??;

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(&filename);
        tokio::fs::write(&path, encoded).await?;

        tracing::info!(%user_id, path = %path.display(), "stored user photo");
        Ok(Some(filename))
    }
}

/// Cover-fits `data` into a `size`×`size` square and re-encodes it as JPEG.
pub fn transcode(data: &[u8], size: u32, quality: u8) -> Result<Vec<u8>> {
    let img = match image::load_from_memory(data) {
        Ok(img) => img,
        Err(ImageError::Decoding(e)) => {
            return Err(Error::BadRequest(format!("Could not read image: {}", e)));
        }
        Err(ImageError::Unsupported(e)) => {
            return Err(Error::BadRequest(format!("Unsupported image: {}", e)));
        }
        Err(other) => return Err(other.into()),
    };

    let resized = img.resize_to_fill(size, size, FilterType::Lanczos3).to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality).encode_image(&resized)?;
    Ok(out)
}
