use serde::Deserialize;

use crate::error::ExportError;

/// Box in the original image's pixel space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, serde::Serialize)]
pub struct BoundingBox {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub width: f32,
    #[serde(default)]
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Replaces non-finite values with 0 and negative sizes with 0.
    ///
    /// Coordinates outside the image are left alone; they clip when drawn.
    pub fn sanitized(&self) -> Self {
        fn finite(value: f32) -> f32 {
            if value.is_finite() { value } else { 0.0 }
        }
        Self {
            x: finite(self.x),
            y: finite(self.y),
            width: finite(self.width).max(0.0),
            height: finite(self.height).max(0.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Finding {
    pub label: String,
    pub description: String,
    pub bounding_box: BoundingBox,
}

impl Finding {
    pub fn new(
        label: impl Into<String>,
        description: impl Into<String>,
        bounding_box: BoundingBox,
    ) -> Self {
        Self {
            label: label.into(),
            description: description.into(),
            bounding_box,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisResult {
    Healthy {
        summary: String,
    },
    AnomalyDetected {
        summary: String,
        findings: Vec<Finding>,
    },
}

impl AnalysisResult {
    pub fn healthy(summary: impl Into<String>) -> Self {
        AnalysisResult::Healthy {
            summary: summary.into(),
        }
    }

    /// Builds an anomaly result, falling back to healthy when `findings` is empty.
    pub fn with_findings(summary: impl Into<String>, findings: Vec<Finding>) -> Self {
        let summary = summary.into();
        if findings.is_empty() {
            AnalysisResult::Healthy { summary }
        } else {
            AnalysisResult::AnomalyDetected { summary, findings }
        }
    }

    pub fn summary(&self) -> &str {
        match self {
            AnalysisResult::Healthy { summary } => summary,
            AnalysisResult::AnomalyDetected { summary, .. } => summary,
        }
    }

    pub fn findings(&self) -> &[Finding] {
        match self {
            AnalysisResult::Healthy { .. } => &[],
            AnalysisResult::AnomalyDetected { findings, .. } => findings,
        }
    }

    /// Parses the inference service's JSON payload.
    ///
    /// Missing or empty `findings` always yield [`AnalysisResult::Healthy`],
    /// whatever `status` claims.
    pub fn from_json(input: &str) -> Result<Self, ExportError> {
        let wire: WireResult = serde_json::from_str(input)
            .map_err(|err| ExportError::LayoutFailure(format!("result could not be read ({})", err)))?;
        Ok(wire.into_result())
    }
}

#[derive(Debug, Default, Deserialize)]
struct WireResult {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    findings: Option<Vec<WireFinding>>,
}

#[derive(Debug, Default, Deserialize)]
struct WireFinding {
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, rename = "boundingBox", alias = "bounding_box")]
    bounding_box: Option<BoundingBox>,
}

impl WireResult {
    fn into_result(self) -> AnalysisResult {
        let summary = self.summary.unwrap_or_default();
        let findings: Vec<Finding> = self
            .findings
            .unwrap_or_default()
            .into_iter()
            .map(|finding| Finding {
                label: finding.label.unwrap_or_default(),
                description: finding.description.unwrap_or_default(),
                bounding_box: finding.bounding_box.unwrap_or_default(),
            })
            .collect();
        if findings.is_empty() {
            if let Some(status) = self.status.as_deref() {
                if !status.eq_ignore_ascii_case("healthy") {
                    tracing::debug!(status, "result without findings treated as healthy");
                }
            }
        }
        AnalysisResult::with_findings(summary, findings)
    }
}
