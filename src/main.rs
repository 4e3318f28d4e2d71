//! Apiscope server binary.

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present; ignore a missing file.
    dotenvy::dotenv().ok();

    apiscope::cli::run().await?;
    Ok(())
}
