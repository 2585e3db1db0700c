use anyhow::{Context, Result, anyhow};
use std::path::Path;
use std::sync::{Arc, OnceLock};
use ttf_parser::Face;
use ttf_parser::name_id;
use usvg::fontdb;

/// System families tried in order for overlay labels when no font is configured.
pub const OVERLAY_FALLBACK_FAMILIES: &[&str] = &[
    "Helvetica",
    "Arial",
    "DejaVu Sans",
    "Liberation Sans",
    "Noto Sans",
    "sans-serif",
];

/// Metrics of a TrueType/OpenType face, kept together with its raw data so
/// the same bytes can be handed to the rasterizer and the PDF writer.
#[derive(Clone)]
pub struct FontMetrics {
    data: Arc<Vec<u8>>,
    units_per_em: u16,
    space_advance: u16,
    weight: u16,
    family: Option<String>,
    face_index: u32,
}

impl std::fmt::Debug for FontMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontMetrics")
            .field("family", &self.family)
            .field("face_index", &self.face_index)
            .field("weight", &self.weight)
            .field("units_per_em", &self.units_per_em)
            .finish()
    }
}

impl FontMetrics {
    fn from_face(data: Arc<Vec<u8>>, face_index: u32) -> Option<Self> {
        let face = Face::parse(&data, face_index).ok()?;
        let units_per_em = face.units_per_em().max(1);
        let space_advance = face
            .glyph_index(' ')
            .and_then(|id| face.glyph_hor_advance(id))
            .unwrap_or(units_per_em / 2);
        let weight = face.weight().to_number();
        let family = extract_family_name(&face);
        Some(Self {
            data,
            units_per_em,
            space_advance,
            weight,
            family,
            face_index,
        })
    }

    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    /// CSS weight of the face (400 regular, 700 bold).
    pub fn weight(&self) -> u16 {
        self.weight
    }

    fn text_width(&self, text: &str, font_size: f32) -> f32 {
        let Ok(face) = Face::parse(&self.data, self.face_index) else {
            return builtin_text_width(text, font_size, false);
        };
        let mut advance = 0u32;
        for ch in text.chars() {
            if ch == '\n' {
                continue;
            }
            if ch == ' ' {
                advance = advance.saturating_add(self.space_advance as u32);
                continue;
            }
            let glyph_advance = face
                .glyph_index(ch)
                .and_then(|glyph| face.glyph_hor_advance(glyph))
                .unwrap_or(self.space_advance);
            advance = advance.saturating_add(glyph_advance as u32);
        }
        let units = self.units_per_em.max(1) as f32;
        advance as f32 * (font_size / units)
    }

    fn missing_glyph(&self, text: &str) -> Option<char> {
        let face = Face::parse(&self.data, self.face_index).ok()?;
        text.chars()
            .find(|ch| !ch.is_whitespace() && face.glyph_index(*ch).is_none())
    }
}

/// Face used for both measuring and drawing a run of text.
///
/// The built-in variants map to the PDF base-14 Helvetica fonts, whose
/// advance widths are fixed by the format and tabulated below. They only
/// cover printable ASCII; anything else needs an external font. The raster
/// overlay has no base-14 fonts, so it draws with an external face whenever
/// one can be found.
#[derive(Debug, Clone)]
pub enum FontFace {
    Helvetica,
    HelveticaBold,
    External(FontMetrics),
}

impl FontFace {
    /// Bold system face for overlay labels, resolved once per process from
    /// [`OVERLAY_FALLBACK_FAMILIES`]. Built-in Helvetica Bold is the last
    /// resort when the host has none of them.
    pub fn overlay_default() -> FontFace {
        static SYSTEM_FACE: OnceLock<Option<FontMetrics>> = OnceLock::new();
        let metrics = SYSTEM_FACE.get_or_init(|| {
            match resolve_font(None, None, OVERLAY_FALLBACK_FAMILIES, fontdb::Weight::BOLD) {
                Ok(resolved) => {
                    tracing::debug!(family = %resolved.family, "overlay font resolved");
                    Some(resolved.metrics)
                }
                Err(err) => {
                    tracing::warn!(error = %err, "no system font for overlay labels");
                    None
                }
            }
        });
        match metrics {
            Some(metrics) => FontFace::External(metrics.clone()),
            None => FontFace::HelveticaBold,
        }
    }

    /// Advance width of `text` at `font_size`, in the same unit as the size.
    pub fn text_width(&self, text: &str, font_size: f32) -> f32 {
        match self {
            FontFace::Helvetica => builtin_text_width(text, font_size, false),
            FontFace::HelveticaBold => builtin_text_width(text, font_size, true),
            FontFace::External(metrics) => metrics.text_width(text, font_size),
        }
    }

    /// First character this face cannot draw.
    pub fn unsupported_char(&self, text: &str) -> Option<char> {
        match self {
            FontFace::Helvetica | FontFace::HelveticaBold => text
                .chars()
                .find(|ch| !ch.is_whitespace() && !ch.is_ascii()),
            FontFace::External(metrics) => metrics.missing_glyph(text),
        }
    }

    pub fn svg_family(&self) -> String {
        match self {
            FontFace::Helvetica | FontFace::HelveticaBold => {
                "Helvetica, Arial, sans-serif".to_string()
            }
            FontFace::External(metrics) => match metrics.family() {
                Some(name) => format!("{}, sans-serif", name),
                None => "sans-serif".to_string(),
            },
        }
    }

    /// Value for the SVG `font-weight` attribute. External faces report their
    /// own weight so the rasterizer picks the face that was measured.
    pub fn svg_weight(&self) -> String {
        match self {
            FontFace::Helvetica => "normal".to_string(),
            FontFace::HelveticaBold => "bold".to_string(),
            FontFace::External(metrics) => metrics.weight().to_string(),
        }
    }

    pub fn font_data(&self) -> Option<&[u8]> {
        match self {
            FontFace::External(metrics) => Some(metrics.data()),
            _ => None,
        }
    }

    /// Bold variant for headings. External faces have no bold sibling and
    /// are reused as-is.
    pub fn bold(&self) -> FontFace {
        match self {
            FontFace::Helvetica | FontFace::HelveticaBold => FontFace::HelveticaBold,
            FontFace::External(metrics) => FontFace::External(metrics.clone()),
        }
    }
}

/// Loads a font file. In a collection, `family` picks the face; a family the
/// file does not contain is an error.
pub fn load_font_metrics(path: &Path, family: Option<&str>) -> Result<FontMetrics> {
    let data =
        std::fs::read(path).with_context(|| format!("failed to read font: {}", path.display()))?;
    load_font_metrics_from_data(Arc::new(data), family)
        .with_context(|| format!("failed to load font: {}", path.display()))
}

#[derive(Debug)]
pub struct ResolvedFont {
    pub metrics: FontMetrics,
    pub family: String,
}

/// Resolves a face from an explicit file, a named system family, or the
/// first available entry of `fallback`, in that order of precedence.
pub fn resolve_font(
    font_path: Option<&Path>,
    font_family: Option<&str>,
    fallback: &[&str],
    weight: fontdb::Weight,
) -> Result<ResolvedFont> {
    if let Some(path) = font_path {
        let metrics = load_font_metrics(path, font_family)?;
        let family = metrics
            .family()
            .map(|name| name.to_string())
            .or_else(|| font_family.map(|name| name.to_string()))
            .unwrap_or_else(|| "sans-serif".to_string());
        return Ok(ResolvedFont { metrics, family });
    }

    let mut db = fontdb::Database::new();
    db.load_system_fonts();

    if let Some(family) = font_family {
        return load_font_metrics_from_family(&db, family, weight);
    }
    for candidate in fallback {
        if let Ok(resolved) = load_font_metrics_from_family(&db, candidate, weight) {
            return Ok(resolved);
        }
    }
    Err(anyhow!("none of the fallback fonts is installed: {}", fallback.join(", ")))
}

fn load_font_metrics_from_data(data: Arc<Vec<u8>>, family: Option<&str>) -> Result<FontMetrics> {
    let count = ttf_parser::fonts_in_collection(&data).unwrap_or(1);
    let mut first = None;
    for index in 0..count {
        let Some(metrics) = FontMetrics::from_face(Arc::clone(&data), index) else {
            continue;
        };
        let Some(wanted) = family else {
            return Ok(metrics);
        };
        if metrics
            .family()
            .is_some_and(|found| found.eq_ignore_ascii_case(wanted))
        {
            return Ok(metrics);
        }
        if first.is_none() {
            first = Some(metrics);
        }
    }
    match (family, first) {
        (Some(wanted), Some(_)) => Err(anyhow!("font family not found in font file: {}", wanted)),
        _ => Err(anyhow!("failed to parse font data")),
    }
}

/// Asks `fontdb` for the best match of `family` at `weight` and measures
/// exactly the face it picked.
fn load_font_metrics_from_family(
    db: &fontdb::Database,
    family: &str,
    weight: fontdb::Weight,
) -> Result<ResolvedFont> {
    let families = if family.eq_ignore_ascii_case("sans-serif") {
        vec![fontdb::Family::SansSerif]
    } else {
        vec![fontdb::Family::Name(family)]
    };
    let query = fontdb::Query {
        families: &families,
        weight,
        ..Default::default()
    };
    let id = db
        .query(&query)
        .ok_or_else(|| anyhow!("font not found: {}", family))?;
    let (data, index) = db
        .with_face_data(id, |data, index| (data.to_vec(), index))
        .ok_or_else(|| anyhow!("failed to load font data: {}", family))?;
    let metrics = FontMetrics::from_face(Arc::new(data), index)
        .ok_or_else(|| anyhow!("failed to parse font: {}", family))?;
    let resolved_family = metrics
        .family()
        .map(|name| name.to_string())
        .unwrap_or_else(|| family.to_string());
    Ok(ResolvedFont {
        metrics,
        family: resolved_family,
    })
}

/// Typographic family if the face names one, else the legacy family name.
fn extract_family_name(face: &Face<'_>) -> Option<String> {
    let names: Vec<_> = face.names().into_iter().collect();
    let lookup = |id: u16| {
        names
            .iter()
            .filter(|name| name.name_id == id)
            .find_map(|name| name.to_string())
    };
    lookup(name_id::TYPOGRAPHIC_FAMILY).or_else(|| lookup(name_id::FAMILY))
}

fn builtin_text_width(text: &str, font_size: f32, bold: bool) -> f32 {
    let table = if bold { &HELVETICA_BOLD } else { &HELVETICA };
    let units: u32 = text
        .chars()
        .filter(|ch| *ch != '\n')
        .map(|ch| {
            let code = ch as u32;
            if (0x20..=0x7E).contains(&code) {
                table[(code - 0x20) as usize] as u32
            } else if ch.is_whitespace() {
                table[0] as u32
            } else {
                556
            }
        })
        .sum();
    units as f32 * font_size / 1000.0
}

// Advance widths (1/1000 em) for U+0020..=U+007E.
#[rustfmt::skip]
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];
