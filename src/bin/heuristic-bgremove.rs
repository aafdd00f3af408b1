//! Heuristic Background Removal CLI Tool
//!
//! Command-line interface for removing uniform backgrounds from images with
//! the heuristic-bgremove library.

#[cfg(feature = "cli")]
use heuristic_bgremove::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    panic!("CLI feature not enabled. Please rebuild with --features cli");
}
