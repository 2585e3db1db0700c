use printpdf::image_crate::{DynamicImage, GenericImageView};
use printpdf::{
    BuiltinFont, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference,
};
use std::io::Cursor;

use super::layout::{AssembledDocument, DrawCommand, ReportConfig};
use crate::error::ExportError;
use crate::font::FontFace;

const IMAGE_DPI: f32 = 300.0;

/// Writes the assembled pages as a PDF, embedding `surface_png` wherever an
/// image block was laid out.
pub fn write_pdf(
    document: &AssembledDocument,
    surface_png: &[u8],
    config: &ReportConfig,
) -> Result<Vec<u8>, ExportError> {
    let page = &config.page;
    let (doc, first_page, first_layer) = PdfDocument::new(
        config.title.as_str(),
        Mm(page.width_mm),
        Mm(page.height_mm),
        "Layer 1",
    );
    let regular = register_font(&doc, &config.fonts.regular)?;
    let bold = register_font(&doc, &config.fonts.bold)?;

    let surface = printpdf::image_crate::load_from_memory(surface_png)
        .map_err(|err| ExportError::EncodeFailure(format!("failed to decode surface ({})", err)))?;
    // Flatten alpha; the overlay is opaque over an opaque scan anyway.
    let surface = DynamicImage::ImageRgb8(surface.to_rgb8());
    let (px_width, px_height) = surface.dimensions();
    let natural_width_mm = px_width as f32 / IMAGE_DPI * 25.4;
    let natural_height_mm = px_height as f32 / IMAGE_DPI * 25.4;

    for (idx, laid_out) in document.pages.iter().enumerate() {
        let (page_index, layer_index) = if idx == 0 {
            (first_page, first_layer)
        } else {
            doc.add_page(
                Mm(page.width_mm),
                Mm(page.height_mm),
                format!("Layer {}", idx + 1),
            )
        };
        let layer = doc.get_page(page_index).get_layer(layer_index);

        for command in &laid_out.commands {
            match command {
                DrawCommand::Text {
                    x,
                    baseline,
                    text,
                    role,
                } => {
                    let font = if role.is_bold() { &bold } else { &regular };
                    layer.use_text(
                        text.clone(),
                        role.size_pt(),
                        Mm(*x),
                        Mm(page.height_mm - baseline),
                        font,
                    );
                }
                DrawCommand::Image {
                    x,
                    y,
                    width,
                    height,
                } => {
                    let transform = ImageTransform {
                        translate_x: Some(Mm(*x)),
                        translate_y: Some(Mm(page.height_mm - y - height)),
                        rotate: None,
                        scale_x: Some(width / natural_width_mm),
                        scale_y: Some(height / natural_height_mm),
                        dpi: Some(IMAGE_DPI),
                    };
                    Image::from_dynamic_image(&surface).add_to_layer(layer.clone(), transform);
                }
            }
        }
    }

    let mut buffer = Vec::new();
    {
        let mut writer = std::io::BufWriter::new(&mut buffer);
        doc.save(&mut writer)
            .map_err(|err| ExportError::EncodeFailure(format!("failed to write pdf ({})", err)))?;
    }
    tracing::debug!(pages = document.pages.len(), bytes = buffer.len(), "pdf written");
    Ok(buffer)
}

fn register_font(doc: &PdfDocumentReference, face: &FontFace) -> Result<IndirectFontRef, ExportError> {
    let registered = match face {
        FontFace::Helvetica => doc.add_builtin_font(BuiltinFont::Helvetica),
        FontFace::HelveticaBold => doc.add_builtin_font(BuiltinFont::HelveticaBold),
        FontFace::External(metrics) => doc.add_external_font(Cursor::new(metrics.data().to_vec())),
    };
    registered.map_err(|err| ExportError::EncodeFailure(format!("failed to embed font ({})", err)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisResult, BoundingBox, Finding};
    use crate::document::assemble;
    use image::{Rgba, RgbaImage};

    fn surface_png(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba([30, 30, 30, 255]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(image)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .expect("png");
        bytes
    }

    #[test]
    fn writes_a_pdf_for_a_multi_page_report() {
        let config = ReportConfig::default();
        let findings = (0..15)
            .map(|idx| {
                Finding::new(
                    format!("Lesion {}", idx + 1),
                    "Well-circumscribed hypodense lesion measuring approximately twelve \
                     millimetres, without internal enhancement. Likely benign; follow-up \
                     imaging suggested to document stability over time.",
                    BoundingBox::new(1.0, 1.0, 2.0, 2.0),
                )
            })
            .collect();
        let result = AnalysisResult::with_findings("Multiple lesions.", findings);
        let document = assemble((64, 48), &result, &config).expect("assemble");
        assert!(document.pages.len() >= 2);
        let bytes = write_pdf(&document, &surface_png(64, 48), &config).expect("pdf");
        assert!(bytes.starts_with(b"%PDF-"));
        assert_eq!(count_names(&bytes, "Type", "Page"), document.pages.len());
        assert_eq!(count_names(&bytes, "Subtype", "Image"), 1);
    }

    /// Occurrences of `/key /value` in the uncompressed object dictionaries,
    /// with or without the separating space.
    fn count_names(bytes: &[u8], key: &str, value: &str) -> usize {
        let text = String::from_utf8_lossy(bytes).replace(&format!("/{key} /"), &format!("/{key}/"));
        let needle = format!("/{key}/{value}");
        text.match_indices(&needle)
            .filter(|(idx, _)| {
                text[idx + needle.len()..]
                    .chars()
                    .next()
                    .is_none_or(|next| !next.is_ascii_alphanumeric())
            })
            .count()
    }

    #[test]
    fn broken_surface_is_an_encode_failure() {
        let config = ReportConfig::default();
        let document = assemble((4, 4), &AnalysisResult::healthy("ok"), &config).expect("assemble");
        let err = write_pdf(&document, b"not png", &config).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::EncodeFailure);
    }
}
