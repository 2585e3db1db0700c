use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::analysis::AnalysisResult;
use crate::document::{self, ReportConfig};
use crate::error::ExportError;
use crate::image_source::{ImageHandle, ImageSource};
use crate::overlay::{self, OverlayStyle};

pub const PNG_MIME: &str = "image/png";
pub const PDF_MIME: &str = "application/pdf";
pub const HEALTHY_BASE_NAME: &str = "healthy";

#[derive(Debug, Clone, Default)]
pub struct ExportSettings {
    pub overlay: OverlayStyle,
    pub report: ReportConfig,
}

/// Inputs of one export call. Everything is shared read-only, so a request
/// can be cloned into concurrent exports.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub source: ImageSource,
    pub result: Arc<AnalysisResult>,
    pub settings: Arc<ExportSettings>,
}

impl ExportRequest {
    pub fn new(source: ImageSource, result: AnalysisResult, settings: ExportSettings) -> Self {
        Self {
            source,
            result: Arc::new(result),
            settings: Arc::new(settings),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Export {
    pub file_name: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

/// Annotated PNG at the original resolution.
pub async fn export_image(request: &ExportRequest) -> Result<Export, ExportError> {
    let image = decode(&request.source).await?;
    let surface = overlay::render(&image, &request.result, &request.settings.overlay)
        .inspect_err(|err| tracing::warn!(error = %err, "raster export failed"))?;
    let bytes = surface.encode_png()?;
    let file_name = format!("{}.png", derive_base_name(&request.result));
    tracing::debug!(file = %file_name, bytes = bytes.len(), "raster export ready");
    Ok(Export {
        file_name,
        mime: PNG_MIME,
        bytes,
    })
}

/// Paginated PDF report embedding the annotated image.
pub async fn export_document(request: &ExportRequest) -> Result<Export, ExportError> {
    let image = decode(&request.source).await?;
    let settings = &request.settings;
    let bytes = build_document(&image, &request.result, settings)
        .inspect_err(|err| tracing::warn!(error = %err, "document export failed"))?;
    let file_name = format!("{}.pdf", derive_base_name(&request.result));
    tracing::debug!(file = %file_name, bytes = bytes.len(), "document export ready");
    Ok(Export {
        file_name,
        mime: PDF_MIME,
        bytes,
    })
}

fn build_document(
    image: &ImageHandle,
    result: &AnalysisResult,
    settings: &ExportSettings,
) -> Result<Vec<u8>, ExportError> {
    let surface = overlay::render(image, result, &settings.overlay)?;
    let assembled = document::assemble(
        (surface.width(), surface.height()),
        result,
        &settings.report,
    )?;
    let png = surface.encode_png()?;
    document::write_pdf(&assembled, &png, &settings.report)
}

async fn decode(source: &ImageSource) -> Result<ImageHandle, ExportError> {
    let source = source.clone();
    let image = tokio::task::spawn_blocking(move || source.decode())
        .await
        .map_err(|err| ExportError::SourceUnavailable(format!("image decode task failed ({})", err)))?
        .inspect_err(|err| tracing::warn!(error = %err, "image decode failed"))?;
    tracing::debug!(width = image.width(), height = image.height(), "image decoded");
    Ok(image)
}

/// Base name shared by the raster and document exports of one result.
///
/// The first finding's label, lower-cased, with each run of whitespace or
/// slashes turned into a single underscore. Healthy results use
/// [`HEALTHY_BASE_NAME`].
pub fn derive_base_name(result: &AnalysisResult) -> String {
    let Some(first) = result.findings().first() else {
        return HEALTHY_BASE_NAME.to_string();
    };
    let mut name = String::new();
    let mut pending_separator = false;
    for ch in first.label.trim().chars() {
        if ch.is_whitespace() || ch == '/' || ch == '\\' {
            pending_separator = true;
            continue;
        }
        if pending_separator && !name.is_empty() {
            name.push('_');
        }
        pending_separator = false;
        name.extend(ch.to_lowercase());
    }
    if name.is_empty() {
        "finding".to_string()
    } else {
        name
    }
}

/// Writes `export` into `dir` under its file name. The bytes land in a
/// temporary file first, so a failed save never leaves a partial artifact.
pub async fn save_export(dir: &Path, export: &Export) -> Result<PathBuf, ExportError> {
    let dir = dir.to_path_buf();
    let file_name = export.file_name.clone();
    let bytes = export.bytes.clone();
    tokio::task::spawn_blocking(move || write_atomically(&dir, &file_name, &bytes))
        .await
        .map_err(|err| ExportError::EncodeFailure(format!("save task failed ({})", err)))?
}

fn write_atomically(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<PathBuf, ExportError> {
    let target = dir.join(file_name);
    let io_error = |err: std::io::Error| {
        ExportError::EncodeFailure(format!("failed to save {} ({})", target.display(), err))
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_error)?;
    tmp.write_all(bytes).map_err(io_error)?;
    tmp.as_file().sync_all().map_err(io_error)?;
    tmp.persist(&target).map_err(|err| io_error(err.error))?;
    tracing::info!(path = %target.display(), "export saved");
    Ok(target)
}
