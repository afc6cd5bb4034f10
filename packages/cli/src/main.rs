#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Batch pipeline entry point for Data Coyote.
//!
//! ```text
//! data_coyote [--config config/config.toml]
//! ```
//!
//! Runs ingest, quality checks, cleaning, file output, and optional
//! spreadsheet publishing for the crime and tourism datasets. Exits
//! non-zero if any stage fails.

mod pipeline;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use data_coyote_config::DEFAULT_CONFIG_PATH;

#[derive(Parser)]
#[command(
    name = "data_coyote",
    about = "Fetch, clean, and publish crime and tourism datasets"
)]
struct Cli {
    /// Path to the pipeline config file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let logger = data_coyote_cli_utils::init_logger();
    let cli = Cli::parse();

    data_coyote_config::load_dotenv();

    let steps = logger.steps_bar("Data Coyote", pipeline::STEP_COUNT);
    match pipeline::run(&cli.config, &steps).await {
        Ok(summary) => {
            steps.finish("Pipeline complete");
            log::info!(
                "Done: {} crime rows, {} tourism rows{}",
                summary.crime_rows,
                summary.tourism_rows,
                if summary.published { ", published" } else { "" }
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            steps.abandon();
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
