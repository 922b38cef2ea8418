mod args;

use std::process::ExitCode;

use air_quality_dashboard::{
    air_quality::{Machine, MachineId},
    dashboard::build_dashboard,
    db::{PgReadingSource, list_fragment_machines, list_reporting_machines, new_pool},
    logging,
    render::{render_block, render_page},
};
use anyhow::{Context as _, Result};
use args::Args;
use chrono::Utc;
use clap::Parser as _;
use indexmap::IndexMap;
use tracing::info;

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
    let now = Utc::now();
    let scope = args.scope(now);

    let pool = new_pool(&args.database_url)
        .await
        .context("failed to connect to database")?;

    let listed = match &args.fragment_id {
        Some(fragment_id) => list_fragment_machines(&pool, fragment_id, &args.organization_id)
            .await
            .with_context(|| format!("failed to list machines of fragment {fragment_id}"))?,
        None => list_reporting_machines(&pool, &args.organization_id, &scope)
            .await
            .context("failed to list machines with air quality data")?,
    };

    let machines: IndexMap<MachineId, Machine> =
        listed.into_iter().map(|m| (m.id.clone(), m)).collect();

    info!(
        machines = machines.len(),
        strategy = ?args.strategy(),
        "building air quality dashboard"
    );

    let source = PgReadingSource::new(pool);
    let results = build_dashboard(&source, machines.into_values(), &scope, args.strategy()).await;

    let html = if args.fragment_only {
        render_block(&results)
    } else {
        render_page(&results, now.with_timezone(&args.timezone))
    };

    match &args.output {
        Some(path) => {
            std::fs::write(path, html)
                .with_context(|| format!("failed to write dashboard: {path:?}"))?;
            info!(?path, "wrote dashboard");
        }
        None => print!("{html}"),
    }

    Ok(())
}
