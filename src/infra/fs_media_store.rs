//! Filesystem based implementation of the media store.

use crate::domain::media_store::{ImageData, MediaStore};
use log::debug;
use serde::Deserialize;
use std::{
    io,
    path::{Path, PathBuf},
};
use thiserror::Error;
use uuid::Uuid;

/// A media store keeping images as files under a configured root directory. Stored names are
/// generated (`<uuid-v7>.<ext>`), so they never collide and are safe to join onto the root.
#[derive(Debug, Clone)]
pub struct FsMediaStore {
    root: PathBuf,
}

impl FsMediaStore {
    /// Create a new filesystem media store with the given config, creating the root directory if
    /// necessary.
    pub async fn new(config: Config) -> Result<Self, Error> {
        let Config { root } = config;

        tokio::fs::create_dir_all(&root).await?;
        debug!(root:% = root.display(); "created filesystem media store");

        Ok(Self { root })
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, Error> {
        // Stored names are single path components; anything else cannot have come from this store.
        if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
            return Err(Error(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid media file name {name}"),
            )));
        }

        Ok(self.root.join(name))
    }
}

impl MediaStore for FsMediaStore {
    type Error = Error;

    async fn store_image(&self, image: ImageData) -> Result<String, Self::Error> {
        let ImageData {
            bytes,
            file_name,
            content_type,
        } = image;

        let extension = image_extension(content_type.as_deref(), file_name.as_deref());
        let name = format!("{}.{extension}", Uuid::now_v7());

        tokio::fs::write(self.root.join(&name), &bytes).await?;

        Ok(name)
    }

    async fn remove_image(&self, name: &str) -> Result<(), Self::Error> {
        let path = self.path_for(name)?;
        tokio::fs::remove_file(path).await?;
        Ok(())
    }
}

/// File extension for a stored image, derived from the content type if known, else from the
/// original file name, else `bin`.
fn image_extension(content_type: Option<&str>, file_name: Option<&str>) -> &'static str {
    match content_type {
        Some("image/png") => "png",
        Some("image/jpeg") => "jpg",
        Some("image/webp") => "webp",
        Some("image/gif") => "gif",

        _ => file_name
            .and_then(|name| Path::new(name).extension())
            .and_then(|extension| extension.to_str())
            .and_then(|extension| match extension.to_ascii_lowercase().as_str() {
                "png" => Some("png"),
                "jpg" | "jpeg" => Some("jpg"),
                "webp" => Some("webp"),
                "gif" => Some("gif"),
                _ => None,
            })
            .unwrap_or("bin"),
    }
}

/// Configuration for a [FsMediaStore].
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub root: PathBuf,
}

/// Error possibly returned by [FsMediaStore] operations.
#[derive(Debug, Error)]
#[error("cannot access media store")]
pub struct Error(#[from] io::Error);

#[cfg(test)]
mod tests {
    use crate::{
        domain::media_store::{ImageData, MediaStore},
        infra::fs_media_store::{Config, FsMediaStore, image_extension},
    };
    use std::{env, error::Error as StdError};
    use uuid::Uuid;

    #[test]
    fn test_image_extension() {
        assert_eq!(image_extension(Some("image/png"), None), "png");
        assert_eq!(image_extension(Some("image/jpeg"), Some("a.png")), "jpg");
        assert_eq!(image_extension(None, Some("photo.JPEG")), "jpg");
        assert_eq!(image_extension(None, Some("photo")), "bin");
        assert_eq!(image_extension(Some("text/plain"), None), "bin");
    }

    #[tokio::test]
    async fn test_store_and_remove() -> Result<(), Box<dyn StdError>> {
        let root = env::temp_dir().join(format!("fs-media-store-{}", Uuid::now_v7()));
        let media_store = FsMediaStore::new(Config { root: root.clone() }).await?;

        let image = ImageData {
            bytes: vec![0xAB; 64],
            file_name: Some("avatar.png".into()),
            content_type: Some("image/png".into()),
        };
        let name = media_store.store_image(image).await?;
        assert!(name.ends_with(".png"));

        let stored = tokio::fs::read(root.join(&name)).await?;
        assert_eq!(stored, vec![0xAB; 64]);

        media_store.remove_image(&name).await?;
        assert!(!root.join(&name).exists());

        let result = media_store.remove_image("../escape.png").await;
        assert!(result.is_err());

        tokio::fs::remove_dir_all(root).await?;

        Ok(())
    }
}
