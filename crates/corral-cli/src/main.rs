//! corral CLI
//!
//! Renders Cluster API objects and rolls changed immutable templates onto new
//! names against a live management cluster.

use clap::Parser;

use corral_cli::{Cli, Result};
use corral_common::telemetry::{init_telemetry, TelemetryConfig};
use tracing::{error, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_telemetry(TelemetryConfig {
        json: cli.log_format.is_json(),
        ..Default::default()
    })?;

    let result = cli.run().await;
    if let Err(e) = &result {
        if e.is_cancelled() {
            warn!("interrupted before all objects were generated");
        } else {
            error!(retryable = e.is_retryable(), error = %e, "generation failed");
        }
    }
    result
}
