//! Page layout for the exported report.
//!
//! Layout is a single forward pass over a `PageCursor`: title, image,
//! summary, findings and disclaimer, in that order. Every block is measured
//! first and either fits below the cursor or moves to a fresh page whole.
//! Coordinates are millimetres from the top-left corner of the page.

use crate::analysis::{AnalysisResult, Finding};
use crate::error::ExportError;
use crate::font::FontFace;
use crate::text_flow::{ensure_supported, measure, wrap};

pub const MM_PER_PT: f32 = 25.4 / 72.0;
const LINE_HEIGHT_FACTOR: f32 = 1.15;
const EPSILON: f32 = 0.01;

#[derive(Debug, Clone, PartialEq)]
pub struct PageConfig {
    pub width_mm: f32,
    pub height_mm: f32,
    pub margin_mm: f32,
    /// Bottom margin the disclaimer may run into; smaller than `margin_mm`.
    pub disclaimer_margin_mm: f32,
    pub footer_offset_mm: f32,
    pub image_max_height_mm: f32,
    pub block_spacing_mm: f32,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            width_mm: 210.0,
            height_mm: 297.0,
            margin_mm: 20.0,
            disclaimer_margin_mm: 12.0,
            footer_offset_mm: 10.0,
            image_max_height_mm: 120.0,
            block_spacing_mm: 4.0,
        }
    }
}

impl PageConfig {
    pub fn content_width(&self) -> f32 {
        self.width_mm - self.margin_mm * 2.0
    }

    pub fn printable_bottom(&self) -> f32 {
        self.height_mm - self.margin_mm
    }

    pub fn disclaimer_bottom(&self) -> f32 {
        self.height_mm - self.disclaimer_margin_mm
    }
}

#[derive(Debug, Clone)]
pub struct ReportFonts {
    pub regular: FontFace,
    pub bold: FontFace,
}

impl Default for ReportFonts {
    fn default() -> Self {
        Self {
            regular: FontFace::Helvetica,
            bold: FontFace::HelveticaBold,
        }
    }
}

impl ReportFonts {
    pub fn for_role(&self, role: TextRole) -> &FontFace {
        if role.is_bold() { &self.bold } else { &self.regular }
    }
}

#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub title: String,
    pub disclaimer: String,
    pub page: PageConfig,
    pub fonts: ReportFonts,
}

pub const DEFAULT_TITLE: &str = "Medical Scan Analysis Report";
pub const DEFAULT_DISCLAIMER: &str = "Disclaimer: This report was generated by an automated \
    image analysis system and is intended to support, not replace, the judgement of a qualified \
    medical professional. Findings must be confirmed by a clinician before any diagnostic or \
    treatment decision is made.";

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            disclaimer: DEFAULT_DISCLAIMER.to_string(),
            page: PageConfig::default(),
            fonts: ReportFonts::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextRole {
    Title,
    Heading,
    FindingTitle,
    Body,
    Disclaimer,
    Footer,
}

impl TextRole {
    pub fn size_pt(self) -> f32 {
        match self {
            TextRole::Title => 20.0,
            TextRole::Heading => 14.0,
            TextRole::FindingTitle => 12.0,
            TextRole::Body => 11.0,
            TextRole::Disclaimer | TextRole::Footer => 9.0,
        }
    }

    pub fn is_bold(self) -> bool {
        matches!(
            self,
            TextRole::Title | TextRole::Heading | TextRole::FindingTitle
        )
    }

    pub fn line_height_mm(self) -> f32 {
        self.size_pt() * MM_PER_PT * LINE_HEIGHT_FACTOR
    }

    fn ascent_mm(self) -> f32 {
        self.size_pt() * MM_PER_PT * 0.8
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Text {
        x: f32,
        baseline: f32,
        text: String,
        role: TextRole,
    },
    Image {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub commands: Vec<DrawCommand>,
}

impl Page {
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().filter_map(|command| match command {
            DrawCommand::Text { text, .. } => Some(text.as_str()),
            DrawCommand::Image { .. } => None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Title,
    Image,
    Summary,
    /// Zero-based position of the finding in the input list.
    Finding(usize),
    Disclaimer,
}

/// Vertical extent of one laid-out block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockSpan {
    pub kind: BlockKind,
    pub page: usize,
    pub top: f32,
    pub bottom: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssembledDocument {
    pub pages: Vec<Page>,
    pub blocks: Vec<BlockSpan>,
}

impl AssembledDocument {
    pub fn finding_blocks(&self) -> Vec<BlockSpan> {
        self.blocks
            .iter()
            .copied()
            .filter(|block| matches!(block.kind, BlockKind::Finding(_)))
            .collect()
    }
}

struct PageCursor {
    y: f32,
    page_index: usize,
}

/// Measured block waiting to be placed: runs of wrapped lines, one role each.
struct TextBlock {
    runs: Vec<(Vec<String>, TextRole)>,
}

impl TextBlock {
    fn new() -> Self {
        Self { runs: Vec::new() }
    }

    fn height(&self) -> f32 {
        self.runs
            .iter()
            .map(|(lines, role)| measure(lines, role.line_height_mm()))
            .sum()
    }
}

/// Lays out the report for a rendered surface of `image_size` pixels.
pub fn assemble(
    image_size: (u32, u32),
    result: &AnalysisResult,
    config: &ReportConfig,
) -> Result<AssembledDocument, ExportError> {
    let mut assembler = Assembler::new(config);
    assembler.title()?;
    assembler.image(image_size)?;
    assembler.summary(result)?;
    assembler.findings(result.findings())?;
    assembler.disclaimer()?;
    Ok(assembler.finish())
}

struct Assembler<'a> {
    config: &'a ReportConfig,
    cursor: PageCursor,
    pages: Vec<Page>,
    blocks: Vec<BlockSpan>,
}

impl<'a> Assembler<'a> {
    fn new(config: &'a ReportConfig) -> Self {
        Self {
            config,
            cursor: PageCursor {
                y: config.page.margin_mm,
                page_index: 0,
            },
            pages: vec![Page::default()],
            blocks: Vec::new(),
        }
    }

    fn page(&self) -> &PageConfig {
        &self.config.page
    }

    fn wrap_into(&self, block: &mut TextBlock, text: &str, role: TextRole) -> Result<(), ExportError> {
        let face = self.config.fonts.for_role(role);
        ensure_supported(text, face)?;
        let max_width_pt = self.page().content_width() / MM_PER_PT;
        let lines = wrap(text, max_width_pt, face, role.size_pt());
        if !lines.is_empty() {
            block.runs.push((lines, role));
        }
        Ok(())
    }

    fn new_page(&mut self) {
        self.pages.push(Page::default());
        self.cursor.page_index += 1;
        self.cursor.y = self.page().margin_mm;
        tracing::debug!(page = self.cursor.page_index + 1, "page break");
    }

    /// Breaks the page when `height` does not fit above `bottom`. A cursor
    /// already at the top margin never breaks, so oversized blocks still land.
    fn reserve(&mut self, height: f32, bottom: f32) {
        let at_top = self.cursor.y <= self.page().margin_mm + EPSILON;
        if self.cursor.y + height > bottom + EPSILON && !at_top {
            self.new_page();
        }
    }

    fn place(&mut self, kind: BlockKind, block: TextBlock, bottom: f32) {
        let height = block.height();
        self.reserve(height, bottom);
        let top = self.cursor.y;
        self.emit_lines(block);
        self.blocks.push(BlockSpan {
            kind,
            page: self.cursor.page_index,
            top,
            bottom: top + height,
        });
        self.cursor.y = top + height + self.page().block_spacing_mm;
    }

    fn emit_lines(&mut self, block: TextBlock) {
        let x = self.page().margin_mm;
        let mut y = self.cursor.y;
        let page = self.cursor.page_index;
        for (lines, role) in block.runs {
            for text in lines {
                self.pages[page].commands.push(DrawCommand::Text {
                    x,
                    baseline: y + role.ascent_mm(),
                    text,
                    role,
                });
                y += role.line_height_mm();
            }
        }
        self.cursor.y = y;
    }

    fn title(&mut self) -> Result<(), ExportError> {
        let mut block = TextBlock::new();
        self.wrap_into(&mut block, &self.config.title, TextRole::Title)?;
        let bottom = self.page().printable_bottom();
        self.place(BlockKind::Title, block, bottom);
        Ok(())
    }

    fn image(&mut self, (px_w, px_h): (u32, u32)) -> Result<(), ExportError> {
        if px_w == 0 || px_h == 0 {
            return Err(ExportError::LayoutFailure(format!(
                "cannot place an empty {}x{} image",
                px_w, px_h
            )));
        }
        let page = self.page().clone();
        let aspect = px_h as f32 / px_w as f32;
        let mut width = page.content_width();
        let mut height = width * aspect;
        if height > page.image_max_height_mm {
            height = page.image_max_height_mm;
            width = height / aspect;
        }
        self.reserve(height, page.printable_bottom());
        let x = page.margin_mm + (page.content_width() - width) / 2.0;
        let top = self.cursor.y;
        self.pages[self.cursor.page_index]
            .commands
            .push(DrawCommand::Image {
                x,
                y: top,
                width,
                height,
            });
        self.blocks.push(BlockSpan {
            kind: BlockKind::Image,
            page: self.cursor.page_index,
            top,
            bottom: top + height,
        });
        self.cursor.y = top + height + page.block_spacing_mm * 2.0;
        Ok(())
    }

    fn summary(&mut self, result: &AnalysisResult) -> Result<(), ExportError> {
        let status = match result {
            AnalysisResult::Healthy { .. } => "Status: Healthy".to_string(),
            AnalysisResult::AnomalyDetected { findings, .. } => {
                let noun = if findings.len() == 1 { "finding" } else { "findings" };
                format!("Status: Anomaly detected ({} {})", findings.len(), noun)
            }
        };
        let mut block = TextBlock::new();
        self.wrap_into(&mut block, "Summary", TextRole::Heading)?;
        self.wrap_into(&mut block, &status, TextRole::Body)?;
        self.wrap_into(&mut block, result.summary(), TextRole::Body)?;
        let bottom = self.page().printable_bottom();
        self.place(BlockKind::Summary, block, bottom);
        Ok(())
    }

    fn findings(&mut self, findings: &[Finding]) -> Result<(), ExportError> {
        let bottom = self.page().printable_bottom();
        for (idx, finding) in findings.iter().enumerate() {
            let mut block = TextBlock::new();
            let title = format!("Finding {}: {}", idx + 1, finding.label);
            self.wrap_into(&mut block, &title, TextRole::FindingTitle)?;
            self.wrap_into(&mut block, &finding.description, TextRole::Body)?;

            if idx == 0 {
                let mut heading = TextBlock::new();
                self.wrap_into(&mut heading, "Findings", TextRole::Heading)?;
                self.reserve(heading.height() + block.height(), bottom);
                self.emit_lines(heading);
            }
            self.place(BlockKind::Finding(idx), block, bottom);
        }
        Ok(())
    }

    fn disclaimer(&mut self) -> Result<(), ExportError> {
        let mut block = TextBlock::new();
        self.wrap_into(&mut block, &self.config.disclaimer, TextRole::Disclaimer)?;
        let bottom = self.page().disclaimer_bottom();
        self.place(BlockKind::Disclaimer, block, bottom);
        Ok(())
    }

    fn finish(mut self) -> AssembledDocument {
        let total = self.pages.len();
        let page = self.config.page.clone();
        let face = self.config.fonts.for_role(TextRole::Footer).clone();
        for (idx, current) in self.pages.iter_mut().enumerate() {
            let text = format!("Page {} of {}", idx + 1, total);
            let width = face.text_width(&text, TextRole::Footer.size_pt()) * MM_PER_PT;
            current.commands.push(DrawCommand::Text {
                x: (page.width_mm - width) / 2.0,
                baseline: page.height_mm - page.footer_offset_mm,
                text,
                role: TextRole::Footer,
            });
        }
        AssembledDocument {
            pages: self.pages,
            blocks: self.blocks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::BoundingBox;

    const LONG_DESCRIPTION: &str = "Ill-defined region of increased attenuation in the \
        posterior segment with surrounding ground-glass change and mild interlobular septal \
        thickening. Appearance may reflect an evolving infectious or inflammatory process; \
        correlation with clinical history and follow-up imaging in six to eight weeks is \
        recommended to exclude an underlying lesion.";

    fn findings(count: usize) -> Vec<Finding> {
        (0..count)
            .map(|idx| {
                Finding::new(
                    format!("Region {}", idx + 1),
                    LONG_DESCRIPTION,
                    BoundingBox::new(idx as f32 * 10.0, 40.0, 20.0, 20.0),
                )
            })
            .collect()
    }

    fn kinds(document: &AssembledDocument) -> Vec<BlockKind> {
        document.blocks.iter().map(|block| block.kind).collect()
    }

    #[test]
    fn healthy_document_has_no_finding_blocks() {
        let config = ReportConfig::default();
        let result = AnalysisResult::healthy("No abnormalities detected.");
        let document = assemble((800, 600), &result, &config).expect("assemble");
        assert_eq!(
            kinds(&document),
            vec![
                BlockKind::Title,
                BlockKind::Image,
                BlockKind::Summary,
                BlockKind::Disclaimer
            ]
        );
        assert_eq!(document.pages.len(), 1);
        let texts: Vec<&str> = document.pages[0].texts().collect();
        assert!(texts.contains(&DEFAULT_TITLE));
        assert!(texts.contains(&"No abnormalities detected."));
        assert!(texts.contains(&"Status: Healthy"));
        assert!(!texts.iter().any(|text| text.starts_with("Finding")));
        assert!(texts.iter().any(|text| text.starts_with("Disclaimer:")));
    }

    #[test]
    fn finding_blocks_follow_input_order() {
        let config = ReportConfig::default();
        let result = AnalysisResult::with_findings("Three findings.", findings(3));
        let document = assemble((800, 600), &result, &config).expect("assemble");
        let order: Vec<BlockKind> = document.finding_blocks().iter().map(|b| b.kind).collect();
        assert_eq!(
            order,
            vec![
                BlockKind::Finding(0),
                BlockKind::Finding(1),
                BlockKind::Finding(2)
            ]
        );
        let titles: Vec<&str> = document
            .pages
            .iter()
            .flat_map(|page| page.texts())
            .filter(|text| text.starts_with("Finding "))
            .collect();
        assert_eq!(
            titles,
            vec!["Finding 1: Region 1", "Finding 2: Region 2", "Finding 3: Region 3"]
        );
    }

    #[test]
    fn long_reports_paginate_without_splitting_blocks() {
        let config = ReportConfig::default();
        let result = AnalysisResult::with_findings("Many findings.", findings(15));
        let document = assemble((1024, 1024), &result, &config).expect("assemble");
        assert!(document.pages.len() >= 2);
        assert_eq!(document.finding_blocks().len(), 15);

        let page = &config.page;
        for block in &document.blocks {
            let limit = match block.kind {
                BlockKind::Disclaimer => page.disclaimer_bottom(),
                _ => page.printable_bottom(),
            };
            assert!(block.top >= page.margin_mm - EPSILON, "{block:?}");
            assert!(block.bottom <= limit + EPSILON, "{block:?}");
            assert!(block.page < document.pages.len());
        }
        let mut previous = (0, 0.0);
        for block in &document.blocks {
            assert!((block.page, block.top) >= previous, "blocks move backwards");
            previous = (block.page, block.top);
        }
    }

    #[test]
    fn title_and_image_only_on_first_page() {
        let config = ReportConfig::default();
        let result = AnalysisResult::with_findings("Many findings.", findings(15));
        let document = assemble((1024, 1024), &result, &config).expect("assemble");
        for (idx, page) in document.pages.iter().enumerate() {
            let images = page
                .commands
                .iter()
                .filter(|command| matches!(command, DrawCommand::Image { .. }))
                .count();
            let titles = page.texts().filter(|text| *text == DEFAULT_TITLE).count();
            let expected = if idx == 0 { 1 } else { 0 };
            assert_eq!((images, titles), (expected, expected), "page {idx}");
        }
    }

    #[test]
    fn every_page_gets_a_numbered_footer() {
        let config = ReportConfig::default();
        let result = AnalysisResult::with_findings("Many findings.", findings(15));
        let document = assemble((1024, 1024), &result, &config).expect("assemble");
        let total = document.pages.len();
        for (idx, page) in document.pages.iter().enumerate() {
            let footer = format!("Page {} of {}", idx + 1, total);
            assert_eq!(page.texts().last(), Some(footer.as_str()));
        }
    }

    #[test]
    fn image_keeps_aspect_ratio_within_limits() {
        let config = ReportConfig::default();
        let result = AnalysisResult::healthy("ok");
        let wide = assemble((2000, 500), &result, &config).expect("assemble");
        let tall = assemble((500, 2000), &result, &config).expect("assemble");
        let image_of = |document: &AssembledDocument| {
            document.pages[0]
                .commands
                .iter()
                .find_map(|command| match command {
                    DrawCommand::Image { width, height, .. } => Some((*width, *height)),
                    _ => None,
                })
                .expect("image")
        };
        let (w, h) = image_of(&wide);
        assert!((w - config.page.content_width()).abs() < EPSILON);
        assert!((w / h - 4.0).abs() < 0.01);
        let (w, h) = image_of(&tall);
        assert!((h - config.page.image_max_height_mm).abs() < EPSILON);
        assert!((h / w - 4.0).abs() < 0.01);
    }

    #[test]
    fn findings_heading_stays_with_first_block() {
        let config = ReportConfig::default();
        let result = AnalysisResult::with_findings("One finding.", findings(1));
        let document = assemble((800, 600), &result, &config).expect("assemble");
        let first = document.finding_blocks()[0];
        let page = &document.pages[first.page];
        assert!(page.texts().any(|text| text == "Findings"));
    }

    #[test]
    fn unsupported_characters_fail_layout() {
        let config = ReportConfig::default();
        let result = AnalysisResult::with_findings(
            "Summary.",
            vec![Finding::new("骨折", "desc", BoundingBox::default())],
        );
        let err = assemble((100, 100), &result, &config).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::LayoutFailure);
    }
}
