//! Mirrors Gradescope and Canvas coursework into a CalDAV task list, once.
//!
//! Everything is configured through environment variables (or a `.env` file).
//! Set `RUST_LOG` to display more info about the sync.

use std::process;

use coursework_sync::client::Client;
use coursework_sync::config::Config;
use coursework_sync::source::{CanvasSource, GradescopeSource};
use coursework_sync::Synchronizer;

const EXIT_FATAL: i32 = 2;


#[tokio::main]
async fn main() {
    env_logger::init();
    process::exit(run().await);
}

async fn run() -> i32 {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Invalid configuration: {}", err);
            return EXIT_FATAL;
        },
    };

    let client = match Client::from_config(&config.caldav).await {
        Ok(client) => client,
        Err(err) => {
            eprintln!("Unable to reach the CalDAV calendar: {}", err);
            return EXIT_FATAL;
        },
    };

    let mut sync = Synchronizer::new(client, config.retry.clone()).dry_run(config.dry_run);

    if let Some(gradescope) = &config.gradescope {
        match GradescopeSource::from_config(gradescope) {
            Ok(source) => sync = sync.with_source(Box::new(source)),
            Err(err) => log::error!("Unable to set up Gradescope: {}", err),
        }
    }
    if let Some(canvas) = &config.canvas {
        match CanvasSource::from_config(canvas) {
            Ok(source) => sync = sync.with_source(Box::new(source)),
            Err(err) => log::error!("Unable to set up Canvas: {}", err),
        }
    }

    println!("Syncing to {}", sync.store().url());
    let report = match sync.run().await {
        Ok(report) => report,
        Err(err) => {
            eprintln!("Sync aborted: {}", err);
            return EXIT_FATAL;
        },
    };

    if config.dry_run {
        coursework_sync::utils::print_plan(&report.plan);
    }
    println!("{}", report);
    report.exit_code()
}
