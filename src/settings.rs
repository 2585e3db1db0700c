use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::document::{DEFAULT_DISCLAIMER, DEFAULT_TITLE, ReportConfig, ReportFonts};
use crate::export::ExportSettings;
use crate::font::{FontFace, resolve_font};
use crate::overlay::OverlayStyle;
use usvg::fontdb;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone)]
pub struct Settings {
    pub highlight_color: String,
    pub highlight_opacity: f32,
    pub stroke_color: String,
    pub stroke_width: f32,
    pub label_color: String,
    pub label_text_color: String,
    pub font_size: f32,
    pub font_family: Option<String>,
    pub font_path: Option<String>,
    pub report_title: String,
    pub report_disclaimer: String,
}

impl Default for Settings {
    fn default() -> Self {
        let style = OverlayStyle::default();
        Self {
            highlight_color: style.highlight_color,
            highlight_opacity: style.highlight_opacity,
            stroke_color: style.stroke_color,
            stroke_width: style.stroke_width,
            label_color: style.label_color,
            label_text_color: style.label_text_color,
            font_size: style.font_size,
            font_family: None,
            font_path: None,
            report_title: DEFAULT_TITLE.to_string(),
            report_disclaimer: DEFAULT_DISCLAIMER.to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    overlay: Option<OverlaySettings>,
    report: Option<ReportSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct OverlaySettings {
    highlight_color: Option<String>,
    highlight_opacity: Option<f32>,
    stroke_color: Option<String>,
    stroke_width: Option<f32>,
    label_color: Option<String>,
    label_text_color: Option<String>,
    font_size: Option<f32>,
    font_family: Option<String>,
    font_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ReportSettings {
    title: Option<String>,
    disclaimer: Option<String>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    ensure_home_settings_file()?;

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            tracing::debug!(path = %path.display(), "settings merged");
            settings.merge(parsed);
        }
    }

    Ok(settings)
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(overlay) = incoming.overlay {
            merge_text(&mut self.highlight_color, overlay.highlight_color);
            merge_text(&mut self.stroke_color, overlay.stroke_color);
            merge_text(&mut self.label_color, overlay.label_color);
            merge_text(&mut self.label_text_color, overlay.label_text_color);
            if let Some(opacity) = overlay.highlight_opacity {
                if (0.0..=1.0).contains(&opacity) {
                    self.highlight_opacity = opacity;
                }
            }
            merge_positive(&mut self.stroke_width, overlay.stroke_width);
            merge_positive(&mut self.font_size, overlay.font_size);
            if let Some(family) = overlay.font_family {
                if !family.trim().is_empty() {
                    self.font_family = Some(family);
                }
            }
            if let Some(path) = overlay.font_path {
                if !path.trim().is_empty() {
                    self.font_path = Some(path);
                }
            }
        }
        if let Some(report) = incoming.report {
            merge_text(&mut self.report_title, report.title);
            merge_text(&mut self.report_disclaimer, report.disclaimer);
        }
    }

    /// Builds the export configuration, resolving the configured font. A font
    /// that cannot be loaded is logged and ignored. Without one, the report
    /// uses built-in Helvetica and the overlay a system face.
    pub fn to_export_settings(&self) -> ExportSettings {
        let configured = self.resolve_face().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "ignoring configured font");
            None
        });
        let (regular, bold, label_face) = match configured {
            Some(face) => (face.clone(), face.bold(), face),
            None => (
                FontFace::Helvetica,
                FontFace::HelveticaBold,
                FontFace::overlay_default(),
            ),
        };
        let overlay = OverlayStyle {
            highlight_color: self.highlight_color.clone(),
            highlight_opacity: self.highlight_opacity,
            stroke_color: self.stroke_color.clone(),
            stroke_width: self.stroke_width,
            label_color: self.label_color.clone(),
            label_text_color: self.label_text_color.clone(),
            font_size: self.font_size,
            face: label_face,
        };
        let report = ReportConfig {
            title: self.report_title.clone(),
            disclaimer: self.report_disclaimer.clone(),
            fonts: ReportFonts { regular, bold },
            ..ReportConfig::default()
        };
        ExportSettings { overlay, report }
    }

    fn resolve_face(&self) -> Result<Option<FontFace>> {
        if self.font_path.is_none() && self.font_family.is_none() {
            return Ok(None);
        }
        let resolved = resolve_font(
            self.font_path.as_deref().map(Path::new),
            self.font_family.as_deref(),
            &[],
            fontdb::Weight::NORMAL,
        )?;
        tracing::debug!(family = %resolved.family, "report font resolved");
        Ok(Some(FontFace::External(resolved.metrics)))
    }
}

fn merge_text(target: &mut String, incoming: Option<String>) {
    if let Some(value) = incoming {
        if !value.trim().is_empty() {
            *target = value;
        }
    }
}

fn merge_positive(target: &mut f32, incoming: Option<f32>) {
    if let Some(value) = incoming {
        if value > 0.0 {
            *target = value;
        }
    }
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".scan-report"))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::with_temp_home;

    #[test]
    fn embedded_defaults_match_built_in_defaults() {
        let parsed: SettingsFile = toml::from_str(DEFAULT_SETTINGS_TOML).expect("parse defaults");
        let mut settings = Settings::default();
        settings.merge(parsed);
        let defaults = Settings::default();
        assert_eq!(settings.highlight_color, defaults.highlight_color);
        assert_eq!(settings.highlight_opacity, defaults.highlight_opacity);
        assert_eq!(settings.font_size, defaults.font_size);
        assert_eq!(settings.report_title, DEFAULT_TITLE);
        assert!(settings.font_path.is_none());
    }

    #[test]
    fn home_settings_file_is_created() {
        with_temp_home(|home| {
            load_settings(None).expect("load settings");
            let path = home.join(".scan-report").join("settings.toml");
            let content = fs::read_to_string(path).expect("home settings");
            assert_eq!(content, DEFAULT_SETTINGS_TOML);
        });
    }

    #[test]
    fn later_files_override_earlier_ones() {
        with_temp_home(|home| {
            let dir = home.join(".scan-report");
            fs::create_dir_all(&dir).expect("settings dir");
            fs::write(
                dir.join("settings.local.toml"),
                "[overlay]\nhighlight_color = \"#00ff00\"\nfont_size = 18\n",
            )
            .expect("local settings");
            let extra = home.join("extra.toml");
            fs::write(
                &extra,
                "[overlay]\nfont_size = 22\nstroke_width = 0\nlabel_color = \"  \"\n\n[report]\ntitle = \"Chest X-Ray Report\"\n",
            )
            .expect("extra settings");

            let settings = load_settings(Some(&extra)).expect("load settings");
            assert_eq!(settings.highlight_color, "#00ff00");
            assert_eq!(settings.font_size, 22.0);
            assert_eq!(settings.stroke_width, 2.0);
            assert_eq!(settings.label_color, "#ff0000");
            assert_eq!(settings.report_title, "Chest X-Ray Report");
        });
    }

    #[test]
    fn missing_explicit_settings_file_is_an_error() {
        with_temp_home(|home| {
            let err = load_settings(Some(&home.join("missing.toml"))).unwrap_err();
            assert!(err.to_string().contains("settings file not found"));
        });
    }

    #[test]
    fn unloadable_font_falls_back_to_defaults() {
        let settings = Settings {
            font_path: Some("/nonexistent/font.ttf".to_string()),
            ..Settings::default()
        };
        let export = settings.to_export_settings();
        assert!(matches!(export.report.fonts.regular, FontFace::Helvetica));
        assert!(matches!(export.report.fonts.bold, FontFace::HelveticaBold));
        assert_eq!(
            export.overlay.face.svg_family(),
            FontFace::overlay_default().svg_family()
        );
    }

    #[test]
    fn overlay_labels_draw_with_a_measurable_system_face() {
        let export = Settings::default().to_export_settings();
        assert!(matches!(export.overlay.face, FontFace::External(_)));
        assert!(export.overlay.face.font_data().is_some());
    }

    #[test]
    fn export_settings_carry_report_text() {
        let settings = Settings {
            report_title: "Knee MRI".to_string(),
            highlight_opacity: 0.5,
            ..Settings::default()
        };
        let export = settings.to_export_settings();
        assert_eq!(export.report.title, "Knee MRI");
        assert_eq!(export.report.disclaimer, DEFAULT_DISCLAIMER);
        assert_eq!(export.overlay.highlight_opacity, 0.5);
    }
}
