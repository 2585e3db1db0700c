use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use scan_report::{Config, ExportFormat};

#[derive(Parser, Debug)]
#[command(
    name = "scan-report",
    version,
    about = "Draw analysis findings over a scan and export it as an image or PDF report"
)]
struct Cli {
    /// Scan image (PNG, JPEG, ...)
    #[arg(short = 'i', long = "image")]
    image: PathBuf,

    /// Analysis result as JSON
    #[arg(short = 'j', long = "result")]
    result: PathBuf,

    /// Which exports to write
    #[arg(short = 'f', long = "format", value_enum, default_value = "both")]
    format: FormatArg,

    /// Directory the exports are written to
    #[arg(short = 'o', long = "out-dir", default_value = ".")]
    out_dir: PathBuf,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Png,
    Pdf,
    Both,
}

impl From<FormatArg> for ExportFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Png => ExportFormat::Png,
            FormatArg::Pdf => ExportFormat::Pdf,
            FormatArg::Both => ExportFormat::Both,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    scan_report::logging::init(cli.verbose)?;

    let config = Config {
        image_path: cli.image,
        result_path: cli.result,
        format: cli.format.into(),
        out_dir: cli.out_dir,
        settings_path: cli.read_settings,
    };
    for path in scan_report::run(config).await? {
        println!("{}", path.display());
    }
    Ok(())
}
