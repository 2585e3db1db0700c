use scan_report::document::{BlockKind, DrawCommand, ReportConfig, assemble};
use scan_report::{AnalysisResult, BoundingBox, Finding};

fn outline(config: &ReportConfig, result: &AnalysisResult) -> String {
    let document = assemble((400, 300), result, config).unwrap();
    document
        .pages
        .iter()
        .enumerate()
        .flat_map(|(idx, page)| {
            page.commands.iter().map(move |command| match command {
                DrawCommand::Text { text, role, .. } => format!("{} {:?}: {}", idx + 1, role, text),
                DrawCommand::Image { .. } => format!("{} Image", idx + 1),
            })
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn config() -> ReportConfig {
    ReportConfig {
        title: "Chest X-Ray Report".to_string(),
        disclaimer: "Disclaimer: for review only.".to_string(),
        ..ReportConfig::default()
    }
}

#[test]
fn anomaly_report_outline_snapshot() {
    let result = AnalysisResult::with_findings(
        "Two findings.",
        vec![
            Finding::new(
                "Nodule",
                "Small nodule in the left apex.",
                BoundingBox::new(40.0, 60.0, 30.0, 30.0),
            ),
            Finding::new(
                "Effusion",
                "Trace pleural effusion.",
                BoundingBox::new(200.0, 220.0, 80.0, 40.0),
            ),
        ],
    );
    insta::assert_snapshot!(outline(&config(), &result), @r"
1 Title: Chest X-Ray Report
1 Image
1 Heading: Summary
1 Body: Status: Anomaly detected (2 findings)
1 Body: Two findings.
1 Heading: Findings
1 FindingTitle: Finding 1: Nodule
1 Body: Small nodule in the left apex.
1 FindingTitle: Finding 2: Effusion
1 Body: Trace pleural effusion.
1 Disclaimer: Disclaimer: for review only.
1 Footer: Page 1 of 1
");
}

#[test]
fn healthy_report_outline_snapshot() {
    let result = AnalysisResult::healthy("No abnormalities detected.");
    insta::assert_snapshot!(outline(&config(), &result), @r"
1 Title: Chest X-Ray Report
1 Image
1 Heading: Summary
1 Body: Status: Healthy
1 Body: No abnormalities detected.
1 Disclaimer: Disclaimer: for review only.
1 Footer: Page 1 of 1
");
    let document = assemble((400, 300), &result, &config()).unwrap();
    let kinds: Vec<BlockKind> = document.blocks.iter().map(|block| block.kind).collect();
    assert_eq!(
        kinds,
        vec![
            BlockKind::Title,
            BlockKind::Image,
            BlockKind::Summary,
            BlockKind::Disclaimer
        ]
    );
}
