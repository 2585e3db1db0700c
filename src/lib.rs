use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub mod analysis;
pub mod document;
pub mod error;
pub mod export;
pub mod font;
pub mod image_source;
pub mod logging;
pub mod overlay;
pub mod settings;
pub mod text_flow;

#[cfg(test)]
mod test_util;

pub use analysis::{AnalysisResult, BoundingBox, Finding};
pub use error::{ErrorKind, ExportError};
pub use export::{
    Export, ExportRequest, ExportSettings, derive_base_name, export_document, export_image,
    save_export,
};
pub use image_source::{ImageHandle, ImageSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Png,
    Pdf,
    Both,
}

impl ExportFormat {
    fn wants_image(self) -> bool {
        matches!(self, ExportFormat::Png | ExportFormat::Both)
    }

    fn wants_document(self) -> bool {
        matches!(self, ExportFormat::Pdf | ExportFormat::Both)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub image_path: PathBuf,
    pub result_path: PathBuf,
    pub format: ExportFormat,
    pub out_dir: PathBuf,
    pub settings_path: Option<PathBuf>,
}

/// Reads the scan and its analysis result, runs the requested exports
/// concurrently and saves them. Returns the written paths, image first.
pub async fn run(config: Config) -> Result<Vec<PathBuf>> {
    let settings = settings::load_settings(config.settings_path.as_deref())?;
    let bytes = tokio::fs::read(&config.image_path)
        .await
        .with_context(|| format!("failed to read image: {}", config.image_path.display()))?;
    let json = tokio::fs::read_to_string(&config.result_path)
        .await
        .with_context(|| format!("failed to read result: {}", config.result_path.display()))?;
    let result = AnalysisResult::from_json(&json)
        .with_context(|| format!("invalid result: {}", config.result_path.display()))?;
    tokio::fs::create_dir_all(&config.out_dir)
        .await
        .with_context(|| format!("failed to create output directory: {}", config.out_dir.display()))?;

    let request = ExportRequest::new(
        ImageSource::new(bytes),
        result,
        settings.to_export_settings(),
    );
    let out_dir = config.out_dir.as_path();
    let (image, document) = tokio::join!(
        async {
            if !config.format.wants_image() {
                return Ok(None);
            }
            export_and_save(out_dir, export_image(&request).await).await
        },
        async {
            if !config.format.wants_document() {
                return Ok(None);
            }
            export_and_save(out_dir, export_document(&request).await).await
        },
    );

    let mut written = Vec::new();
    written.extend(image.context("image export failed")?);
    written.extend(document.context("document export failed")?);
    Ok(written)
}

async fn export_and_save(
    out_dir: &Path,
    export: Result<Export, ExportError>,
) -> Result<Option<PathBuf>, ExportError> {
    let export = export?;
    save_export(out_dir, &export).await.map(Some)
}
