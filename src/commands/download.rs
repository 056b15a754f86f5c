//! Download command handler.

use std::io::{self, IsTerminal};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::{Context, Result};
use memories_core::download::{DownloadEngine, FetchWorker, HttpClient, RunSummary};
use memories_core::export::read_export;
use memories_core::ledger::{ErrorLog, Ledger};
use tracing::{info, warn};

use super::build_writer;
use crate::app::config_runtime::RunSettings;
use crate::app::progress_manager::spawn_progress_ui;

pub(crate) async fn run_download(settings: &RunSettings, quiet: bool) -> Result<RunSummary> {
    let index = read_export(&settings.html_file).await.with_context(|| {
        format!(
            "Failed to read export '{}'. Place memories_history.html next to the tool or pass --html",
            settings.html_file.display()
        )
    })?;

    let mut tasks = index.tasks();
    info!(memories = tasks.len(), "found memories in export");
    if let Some(limit) = settings.limit
        && limit < tasks.len()
    {
        tasks.truncate(limit);
        info!(limit, "limiting run to the first memories");
    }

    let ledger = Ledger::load(&settings.ledger_file)
        .await
        .with_context(|| format!("Failed to load '{}'", settings.ledger_file.display()))?;
    let errors = ErrorLog::load(&settings.error_file)
        .await
        .with_context(|| format!("Failed to load '{}'", settings.error_file.display()))?;
    info!(already_downloaded = ledger.len().await, "loaded ledger");

    let writer = build_writer(settings).await;
    let client = HttpClient::with_timeout(Duration::from_secs(settings.request_timeout_secs));
    let worker = FetchWorker::new(
        client,
        &settings.output_dir,
        Arc::new(ledger),
        Arc::new(errors),
        writer,
    );
    let engine = DownloadEngine::new(settings.concurrency)?;

    let use_spinner = !quiet && io::stderr().is_terminal();
    let (spinner, stop) = spawn_progress_ui(use_spinner, engine.stats());
    let result = engine.run(Arc::new(worker), tasks).await;
    stop.store(true, Ordering::SeqCst);
    if let Some(handle) = spinner {
        let _ = handle.await;
    }
    let summary = result?;

    info!(
        downloaded = summary.downloaded,
        skipped = summary.skipped,
        failed = summary.failed,
        total = summary.total,
        output = %settings.output_dir.display(),
        "download finished"
    );
    if summary.failed > 0 {
        warn!(
            failed = summary.failed,
            error_log = %settings.error_file.display(),
            "some memories failed; run again to retry them"
        );
    }
    Ok(summary)
}
