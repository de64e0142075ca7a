use std::process::ExitCode;

use anyhow::{Context, bail};
use clap::Parser;
use gridscan::{ApifySource, Cli, CheckpointStore, ProgressTracker, RunCoordinator, RunPhase, Settings};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Apify API token. Never read from config files.
const TOKEN_VAR: &str = "APIFY_API_KEY";

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter())))
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings::load(&cli)?;
    let query = settings.query()?;

    let token = match std::env::var(TOKEN_VAR) {
        Ok(token) if !token.trim().is_empty() => token,
        _ => bail!("{TOKEN_VAR} is not set"),
    };
    let mut source = ApifySource::new(token)
        .max_places(settings.per_cell_cap)
        .language(settings.apify.language.clone());
    if let Some(base_url) = &settings.apify.base_url {
        source = source.base_url(base_url.clone());
    }
    if let Some(actor) = &settings.apify.actor {
        source = source.actor(actor.clone());
    }

    if cli.fresh && CheckpointStore::remove(&settings.checkpoint)? {
        info!(path = %settings.checkpoint.display(), "discarded previous checkpoint");
    }

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, finishing in-flight cells");
                cancel.cancel();
            }
        }
    });

    let tracker = ProgressTracker::new();
    let coordinator = RunCoordinator::new(source, settings.run_options())
        .with_cancellation(cancel)
        .on_progress({
            let tracker = tracker.clone();
            move |progress| tracker.update(progress)
        });

    let report = coordinator
        .run(&query, &settings.checkpoint)
        .await
        .with_context(|| format!("run against checkpoint {}", settings.checkpoint.display()))?;
    tracker.finish(Some(format!("{} records", report.records.len())));

    report
        .write_json(&settings.output)
        .with_context(|| format!("writing {}", settings.output.display()))?;
    info!(
        path = %settings.output.display(),
        records = report.records.len(),
        cells = report.total_cells,
        "results written"
    );

    for skipped in &report.skipped {
        warn!(cell = skipped.cell, bounds = %skipped.bounds, reason = %skipped.reason, "cell not covered");
    }
    if !report.saturated.is_empty() {
        warn!(
            cells = ?report.saturated,
            "some cells hit the per-query cap; rerun with a smaller --cell-size to cover them fully"
        );
    }

    if report.status == RunPhase::Cancelled {
        info!(
            pending = report.pending.len(),
            path = %settings.checkpoint.display(),
            "run cancelled; rerun the same command to resume"
        );
        return Ok(ExitCode::from(130));
    }

    if !settings.keep_checkpoint {
        CheckpointStore::remove(&settings.checkpoint)?;
    }
    Ok(if report.skipped.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}
