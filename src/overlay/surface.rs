use image::{DynamicImage, RgbaImage};
use std::io::Cursor;
use tiny_skia::{ColorU8, IntSize, Pixmap};

use crate::error::ExportError;

/// Pixel buffer sized exactly to the source image, owned by one export call.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedSurface {
    image: RgbaImage,
}

impl RenderedSurface {
    pub(crate) fn from_rgba(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.image
    }

    pub fn encode_png(&self) -> Result<Vec<u8>, ExportError> {
        let mut bytes = Vec::new();
        let mut cursor = Cursor::new(&mut bytes);
        DynamicImage::ImageRgba8(self.image.clone())
            .write_to(&mut cursor, image::ImageFormat::Png)
            .map_err(|err| ExportError::EncodeFailure(format!("failed to encode png ({})", err)))?;
        Ok(bytes)
    }
}

pub(crate) fn pixmap_from_rgba(image: &RgbaImage) -> Result<Pixmap, ExportError> {
    let size = IntSize::from_wh(image.width(), image.height()).ok_or_else(|| {
        ExportError::RenderFailure(format!(
            "invalid surface size {}x{}",
            image.width(),
            image.height()
        ))
    })?;
    let mut data = Vec::with_capacity(image.as_raw().len());
    for pixel in image.pixels() {
        let [r, g, b, a] = pixel.0;
        let color = ColorU8::from_rgba(r, g, b, a).premultiply();
        data.extend_from_slice(&[color.red(), color.green(), color.blue(), color.alpha()]);
    }
    Pixmap::from_vec(data, size)
        .ok_or_else(|| ExportError::RenderFailure("failed to allocate drawing surface".to_string()))
}

pub(crate) fn rgba_from_pixmap(pixmap: &Pixmap) -> Result<RgbaImage, ExportError> {
    let mut data = Vec::with_capacity(pixmap.data().len());
    for pixel in pixmap.pixels() {
        let color = pixel.demultiply();
        data.extend_from_slice(&[color.red(), color.green(), color.blue(), color.alpha()]);
    }
    RgbaImage::from_raw(pixmap.width(), pixmap.height(), data)
        .ok_or_else(|| ExportError::RenderFailure("failed to read back drawing surface".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opaque_pixels_survive_pixmap_round_trip() {
        let image = RgbaImage::from_fn(4, 3, |x, y| image::Rgba([x as u8 * 60, y as u8 * 80, 7, 255]));
        let pixmap = pixmap_from_rgba(&image).expect("pixmap");
        let back = rgba_from_pixmap(&pixmap).expect("rgba");
        assert_eq!(image, back);
    }

    #[test]
    fn empty_image_cannot_become_a_surface() {
        let err = pixmap_from_rgba(&RgbaImage::new(0, 0)).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::RenderFailure);
    }
}
