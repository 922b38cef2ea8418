mod args;
mod csv;

use std::{fs::File, process::ExitCode};

use air_quality_dashboard::{
    db::{bulk_insert_readings, new_pool},
    logging,
};
use anyhow::{Context as _, Result};
use args::Args;
use clap::Parser as _;
use tracing::{debug, info};

use crate::csv::{CsvReadingIter, ImportDefaults};

const BULK_INSERT_SIZE: usize = 1000;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    logging::init();

    if let Err(e) = run().await {
        eprintln!("{e:#}");
        return ExitCode::from(1);
    }

    ExitCode::from(0)
}

async fn run() -> Result<()> {
    let args = Args::parse();

    let file =
        File::open(&args.file).with_context(|| format!("failed to open file: {:?}", args.file))?;
    let defaults = ImportDefaults {
        machine_id: args.machine_id.clone(),
        organization_id: args.organization_id.clone(),
        location_id: args.location_id.clone(),
        tag: args.tag.clone(),
        timezone: args.timezone,
    };
    let iter =
        CsvReadingIter::new(file, defaults).context("failed to create CSV reading iterator")?;

    let pool = new_pool(&args.database_url)
        .await
        .context("failed to connect to database")?;

    let mut buffer = Vec::with_capacity(BULK_INSERT_SIZE);
    let mut total = 0;

    for result in iter {
        let record = result.context("failed to parse CSV record")?;
        buffer.push(record);

        if buffer.len() >= BULK_INSERT_SIZE {
            bulk_insert_readings(&pool, &buffer)
                .await
                .context("failed to bulk insert readings")?;
            total += buffer.len();
            debug!(total, "inserted batch");
            buffer.clear();
        }
    }

    if !buffer.is_empty() {
        bulk_insert_readings(&pool, &buffer)
            .await
            .context("failed to bulk insert remaining readings")?;
        total += buffer.len();
    }

    info!(total, file = ?args.file, "imported readings");

    Ok(())
}
