//! Media storage for uploaded images.

use std::path::{Path, PathBuf};

use cms_core::uploads::UploadedFile;
use cms_core::{CmsResult, ValidationError};
use image::GenericImageView;

/// Directory, relative to the media root, that image uploads land in.
pub const UPLOAD_TO: &str = "uploads/images";

/// A stored image file and what was read from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    /// Media-relative path.
    pub path: String,
    pub width: u32,
    pub height: u32,
    pub size: u64,
}

/// Files under `root`, served from `url`.
#[derive(Debug, Clone)]
pub struct MediaStorage {
    root: PathBuf,
    url: String,
}

impl MediaStorage {
    pub fn new(root: impl Into<PathBuf>, url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            url: url.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The URL prefix media is served from.
    pub fn base_url(&self) -> &str {
        &self.url
    }

    /// The public URL of a media-relative path.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.url.trim_end_matches('/'), path)
    }

    /// Validates an uploaded image and writes it below [`UPLOAD_TO`].
    ///
    /// Files get a unique prefix so uploads with the same name never collide.
    ///
    /// # Errors
    ///
    /// A [`ValidationError`] on the `image` field when the upload is not an
    /// image this build can decode.
    pub async fn save_image(&self, upload: &UploadedFile) -> CmsResult<StoredImage> {
        let (width, height) = image_dimensions(&upload.content)?;
        let path = format!(
            "{UPLOAD_TO}/{}-{}",
            uuid::Uuid::new_v4().simple(),
            clean_file_name(&upload.name)
        );
        let target = self.root.join(&path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, &upload.content).await?;
        tracing::debug!(path = %path, width, height, "stored image");
        Ok(StoredImage {
            path,
            width,
            height,
            size: upload.content.len() as u64,
        })
    }

    /// Removes a stored file. A file that is already gone is not an error.
    pub async fn delete(&self, path: &str) -> CmsResult<()> {
        match tokio::fs::remove_file(self.root.join(path)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path, "media file already removed");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Decodes an image enough to read its width and height.
pub fn image_dimensions(content: &[u8]) -> Result<(u32, u32), ValidationError> {
    image::load_from_memory(content)
        .map(|img| img.dimensions())
        .map_err(|_| {
            ValidationError::new("Please correct the errors below.").field(
                "image",
                "Upload a valid image. The file you uploaded was either not an image or a corrupted image.",
            )
        })
}

/// The base name of an uploaded file, restricted to safe characters.
fn clean_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "image".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::new(width, height);
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn upload(name: &str, content: Vec<u8>) -> UploadedFile {
        UploadedFile {
            name: name.into(),
            content_type: "image/png".into(),
            content,
        }
    }

    #[test]
    fn test_image_dimensions() {
        assert_eq!(image_dimensions(&png(4, 3)).unwrap(), (4, 3));
        let err = image_dimensions(b"not an image").unwrap_err();
        assert!(err.field_errors.contains_key("image"));
    }

    #[test]
    fn test_clean_file_name() {
        assert_eq!(clean_file_name("logo.png"), "logo.png");
        assert_eq!(clean_file_name("../../etc/passwd"), "passwd");
        assert_eq!(clean_file_name("C:\\photos\\my pic.jpg"), "my_pic.jpg");
        assert_eq!(clean_file_name(".."), "image");
    }

    #[tokio::test]
    async fn test_save_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = MediaStorage::new(dir.path(), "/media/");
        let stored = storage.save_image(&upload("logo.png", png(8, 2))).await.unwrap();
        assert!(stored.path.starts_with("uploads/images/"));
        assert!(stored.path.ends_with("-logo.png"));
        assert_eq!((stored.width, stored.height), (8, 2));
        assert!(dir.path().join(&stored.path).exists());
        assert_eq!(storage.url(&stored.path), format!("/media/{}", stored.path));

        storage.delete(&stored.path).await.unwrap();
        assert!(!dir.path().join(&stored.path).exists());
        storage.delete(&stored.path).await.unwrap();
    }

    #[tokio::test]
    async fn test_save_rejects_non_image() {
        let dir = tempfile::tempdir().unwrap();
        let storage = MediaStorage::new(dir.path(), "/media/");
        let result = storage.save_image(&upload("x.png", b"nope".to_vec())).await;
        assert!(matches!(result, Err(cms_core::CmsError::ValidationError(_))));
        assert!(!dir.path().join(UPLOAD_TO).exists());
    }
}
