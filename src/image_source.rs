use image::{DynamicImage, GenericImageView};
use std::sync::Arc;

use crate::error::ExportError;

/// Encoded upload bytes, shared read-only between export calls.
#[derive(Debug, Clone)]
pub struct ImageSource {
    bytes: Arc<[u8]>,
}

impl ImageSource {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn decode(&self) -> Result<ImageHandle, ExportError> {
        ImageHandle::decode(&self.bytes)
    }
}

/// Decoded raster at the original upload resolution.
#[derive(Debug, Clone)]
pub struct ImageHandle {
    image: DynamicImage,
    width: u32,
    height: u32,
}

impl ImageHandle {
    pub fn decode(bytes: &[u8]) -> Result<Self, ExportError> {
        let image = image::load_from_memory(bytes)
            .map_err(|err| ExportError::SourceUnavailable(format!("failed to decode image ({})", err)))?;
        Ok(Self::from_image(image))
    }

    pub fn from_image(image: DynamicImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            image,
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }
}
