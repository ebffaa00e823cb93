//! cropdx CLI Tool
//!
//! Command-line interface for classifying plant diseases from leaf images
//! with the cropdx library.

#[cfg(feature = "cli")]
use cropdx::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(1);
}
