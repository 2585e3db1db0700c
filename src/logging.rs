use anyhow::Result;
use tracing_subscriber::fmt;

/// Installs the stderr subscriber. Without `verbose` the library's events
/// stay silent.
pub fn init(verbose: bool) -> Result<()> {
    if !verbose {
        return Ok(());
    }
    let _ = fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
    Ok(())
}
