//! A store for uploaded media files.

use std::error::Error as StdError;

/// An uploaded image, not yet stored. The file name and content type are taken from the multipart
/// field, if present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub bytes: Vec<u8>,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
}

/// A store for uploaded media files, e.g. avatar and cover images.
#[trait_variant::make(Send)]
pub trait MediaStore
where
    Self: Clone + Send + Sync + 'static,
{
    type Error: StdError + Send + Sync + 'static;

    /// Store the given image and return the generated file name under which it can be retrieved
    /// later.
    async fn store_image(&self, image: ImageData) -> Result<String, Self::Error>;

    /// Remove the image with the given file name.
    async fn remove_image(&self, name: &str) -> Result<(), Self::Error>;
}
