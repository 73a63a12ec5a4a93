use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use super::registry::{JobId, JobRegistry, JobStatus};
use crate::engine::ReportEngine;
use crate::report::write_report;
use crate::storage::Storage;

/// Runs report jobs in the background and records their outcome
pub struct ReportRunner {
    storage: Arc<dyn Storage>,
    engine: ReportEngine,
    output_dir: PathBuf,
    registry: Arc<JobRegistry>,
}

impl ReportRunner {
    pub fn new(
        storage: Arc<dyn Storage>,
        engine: ReportEngine,
        output_dir: PathBuf,
        registry: Arc<JobRegistry>,
    ) -> Self {
        Self {
            storage,
            engine,
            output_dir,
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Register a job and start computing it; returns without waiting.
    ///
    /// Errors and panics inside the worker are recorded as `Failed`, never
    /// surfaced to the caller.
    pub fn trigger(self: &Arc<Self>) -> JobId {
        let id = self.registry.register();
        info!(report_id = %id, "Report triggered");

        let runner = Arc::clone(self);
        tokio::spawn(async move {
            let worker = {
                let runner = Arc::clone(&runner);
                tokio::spawn(async move { runner.generate(id).await })
            };

            let status = match worker.await {
                Ok(Ok(path)) => JobStatus::Complete { path },
                Ok(Err(e)) => {
                    error!(report_id = %id, "Error generating report: {:#}", e);
                    JobStatus::Failed {
                        error: format!("{e:#}"),
                    }
                }
                Err(e) => {
                    error!(report_id = %id, "Report worker aborted: {}", e);
                    JobStatus::Failed {
                        error: format!("report worker aborted: {e}"),
                    }
                }
            };

            runner.registry.finish(&id, status);
        });

        id
    }

    /// Compute the report for a fresh snapshot and write it to disk
    pub async fn generate(&self, id: JobId) -> Result<PathBuf> {
        let started = Instant::now();

        let dataset = self
            .storage
            .snapshot()
            .await
            .context("failed to snapshot cached data")?;

        let engine = self.engine.clone();
        let report = tokio::task::spawn_blocking(move || engine.build_report(&dataset))
            .await
            .context("report computation panicked")??;

        let path = write_report(&self.output_dir, &id.to_string(), &report.rows).await?;

        info!(
            report_id = %id,
            stores = report.rows.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Report generated successfully: {}",
            path.display()
        );
        Ok(path)
    }
}
