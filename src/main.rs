//! send-assessment-test: test client for the metadig controller
//!
//! Sends an assessment test request to a controller listening on a local
//! TCP port, for exercising the assessment and indexing queues without a
//! real repository:
//! - Request kind (`quality` or `graph`)
//! - Number of test records
//! - One record per metadata document to assess
//! - `Done` terminator
//!
//! Configuration via CLI arguments or TOML file.

use send_assessment_test::config::Config;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    send_assessment_test::run(&config, &mut std::io::stdout().lock())?;

    Ok(())
}
