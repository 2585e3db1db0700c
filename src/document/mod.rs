mod layout;
mod pdf;

pub use layout::{
    AssembledDocument, BlockKind, BlockSpan, DEFAULT_DISCLAIMER, DEFAULT_TITLE, DrawCommand,
    MM_PER_PT, Page, PageConfig, ReportConfig, ReportFonts, TextRole, assemble,
};
pub use pdf::write_pdf;
