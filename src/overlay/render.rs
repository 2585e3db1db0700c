use std::sync::Arc;
use tiny_skia::Pixmap;
use usvg::{Options, Tree, fontdb};

use super::geometry::{LabelPlacement, resolve_label};
use super::surface::{RenderedSurface, pixmap_from_rgba, rgba_from_pixmap};
use crate::analysis::{AnalysisResult, BoundingBox, Finding};
use crate::error::ExportError;
use crate::font::FontFace;
use crate::image_source::ImageHandle;

#[derive(Debug, Clone)]
pub struct OverlayStyle {
    pub highlight_color: String,
    pub highlight_opacity: f32,
    pub stroke_color: String,
    pub stroke_width: f32,
    pub label_color: String,
    pub label_text_color: String,
    pub font_size: f32,
    /// Face used both to size the label box and to draw its text.
    pub face: FontFace,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            highlight_color: "#ff0000".to_string(),
            highlight_opacity: 0.3,
            stroke_color: "#ff0000".to_string(),
            stroke_width: 2.0,
            label_color: "#ff0000".to_string(),
            label_text_color: "#ffffff".to_string(),
            font_size: 14.0,
            face: FontFace::overlay_default(),
        }
    }
}

/// One finding's overlay: highlight box, outline and label.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayMark {
    pub bbox: BoundingBox,
    pub label: String,
    pub placement: LabelPlacement,
}

pub fn plan_overlays(findings: &[Finding], image_width: u32, style: &OverlayStyle) -> Vec<OverlayMark> {
    findings
        .iter()
        .map(|finding| {
            let bbox = finding.bounding_box.sanitized();
            let text_width = style.face.text_width(&finding.label, style.font_size);
            let placement = resolve_label(&bbox, text_width, image_width as f32);
            OverlayMark {
                bbox,
                label: finding.label.clone(),
                placement,
            }
        })
        .collect()
}

/// SVG document with the marks only; the base image is composited separately.
pub fn overlay_svg(marks: &[OverlayMark], width: u32, height: u32, style: &OverlayStyle) -> String {
    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = width,
        h = height
    ));
    let family = escape_xml(&style.face.svg_family());
    let weight = style.face.svg_weight();

    for mark in marks {
        let BoundingBox {
            x,
            y,
            width: w,
            height: h,
        } = mark.bbox;
        svg.push_str(&format!(
            r#"<rect class="highlight" x="{x}" y="{y}" width="{w}" height="{h}" fill="{fill}" fill-opacity="{opacity}"/>"#,
            fill = escape_xml(&style.highlight_color),
            opacity = style.highlight_opacity.clamp(0.0, 1.0)
        ));
        svg.push_str(&format!(
            r#"<rect class="outline" x="{x}" y="{y}" width="{w}" height="{h}" fill="none" stroke="{stroke}" stroke-width="{sw}"/>"#,
            stroke = escape_xml(&style.stroke_color),
            sw = style.stroke_width
        ));
        let label = mark.placement;
        svg.push_str(&format!(
            r#"<rect class="label" x="{x}" y="{y}" width="{w}" height="{h}" fill="{fill}"/>"#,
            x = label.x,
            y = label.y,
            w = label.width,
            h = label.height,
            fill = escape_xml(&style.label_color)
        ));
        svg.push_str(&format!(
            r#"<text x="{x}" y="{y}" font-size="{size}" font-family="{family}" font-weight="{weight}" fill="{color}">{text}</text>"#,
            x = label.text_x(),
            y = label.text_baseline(style.font_size),
            size = style.font_size,
            color = escape_xml(&style.label_text_color),
            text = escape_xml(&mark.label)
        ));
    }

    svg.push_str("</svg>");
    svg
}

/// Draws the base image and, for anomalies, one overlay per finding in list order.
pub fn render(
    image: &ImageHandle,
    result: &AnalysisResult,
    style: &OverlayStyle,
) -> Result<RenderedSurface, ExportError> {
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(ExportError::RenderFailure(format!(
            "cannot draw on an empty {}x{} surface",
            width, height
        )));
    }
    let base = image.image().to_rgba8();

    let findings = match result {
        AnalysisResult::Healthy { .. } => return Ok(RenderedSurface::from_rgba(base)),
        AnalysisResult::AnomalyDetected { findings, .. } => findings,
    };

    let marks = plan_overlays(findings, width, style);
    let svg = overlay_svg(&marks, width, height, style);
    let mut pixmap = pixmap_from_rgba(&base)?;
    rasterize_onto(&mut pixmap, &svg, &style.face)?;
    tracing::debug!(width, height, marks = marks.len(), "overlay rendered");
    Ok(RenderedSurface::from_rgba(rgba_from_pixmap(&pixmap)?))
}

/// An external face is the only font the rasterizer sees, so labels are drawn
/// with exactly the face that sized them.
fn rasterize_onto(pixmap: &mut Pixmap, svg: &str, face: &FontFace) -> Result<(), ExportError> {
    let mut db = fontdb::Database::new();
    match face.font_data() {
        Some(data) => {
            db.load_font_data(data.to_vec());
            let family = db
                .faces()
                .find_map(|info| info.families.first().map(|(name, _)| name.clone()));
            if let Some(family) = family {
                db.set_sans_serif_family(family);
            }
        }
        None => db.load_system_fonts(),
    }
    let options = Options {
        fontdb: Arc::new(db),
        ..Options::default()
    };
    let tree = Tree::from_str(svg, &options)
        .map_err(|err| ExportError::RenderFailure(format!("failed to parse overlay ({})", err)))?;
    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, tiny_skia::Transform::identity(), &mut pixmap_mut);
    Ok(())
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
