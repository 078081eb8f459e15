//! Follows a [`SyncSession`] and logs what changes.

use std::collections::HashSet;

use artforge_core::generation::GenerationState;
use artforge_core::remove_bg::RemoveBgState;
use artforge_core::training::TrainingState;
use artforge_core::types::DbId;
use artforge_export::ExportOrchestrator;
use artforge_sync::{ConnectionStatus, SyncSession};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

use crate::report::{status_label, ProgressLog};

/// Receivers for everything the monitor reports on.
pub struct Watched {
    pub transitions: broadcast::Receiver<ConnectionStatus>,
    pub generation: watch::Receiver<GenerationState>,
    pub training: watch::Receiver<TrainingState>,
    pub remove_bg: watch::Receiver<RemoveBgState>,
}

impl Watched {
    pub fn from_session(session: &SyncSession) -> Self {
        Self {
            transitions: session.connection().subscribe(),
            generation: session.generation.subscribe(),
            training: session.training.subscribe(),
            remove_bg: session.remove_bg.subscribe(),
        }
    }
}

/// Log connection transitions and job progress until `cancel` fires.
///
/// With an `exporter`, every generation that finishes with output is
/// bundled into `task-{id}.zip` in the background.
pub async fn run(mut watched: Watched, exporter: Option<ExportOrchestrator>, cancel: CancellationToken) {
    let mut log = ProgressLog::default();
    let mut exported: HashSet<DbId> = HashSet::new();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            transition = watched.transitions.recv() => match transition {
                Ok(status) => tracing::info!(status = status_label(status), "Progress channel"),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Missed connection transitions");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },

            changed = watched.generation.changed() => {
                if changed.is_err() {
                    break;
                }
                let finished = {
                    let state = watched.generation.borrow_and_update();
                    if let Some(line) = log.generation(&state) {
                        tracing::info!("{line}");
                    }
                    state
                        .current
                        .as_ref()
                        .filter(|task| task.status.produced_output() && !task.output_paths.is_empty())
                        .map(|task| (task.id, task.output_paths.clone()))
                };
                if let (Some(exporter), Some((task_id, paths))) = (&exporter, finished) {
                    if exported.insert(task_id) {
                        spawn_export(exporter.clone(), task_id, paths);
                    }
                }
            }

            changed = watched.training.changed() => {
                if changed.is_err() {
                    break;
                }
                let lines = log.training(&watched.training.borrow_and_update());
                for line in lines {
                    tracing::info!("{line}");
                }
            }

            changed = watched.remove_bg.changed() => {
                if changed.is_err() {
                    break;
                }
                if let Some(line) = log.remove_bg(&watched.remove_bg.borrow_and_update()) {
                    tracing::info!("{line}");
                }
            }
        }
    }

    tracing::debug!("Monitor stopped");
}

fn spawn_export(exporter: ExportOrchestrator, task_id: DbId, paths: Vec<String>) {
    tokio::spawn(async move {
        let archive = format!("task-{task_id}.zip");
        match exporter.download_many(&paths, &archive).await {
            Ok(report) if report.is_total_failure() => {
                tracing::warn!(task_id, "No images could be exported");
            }
            Ok(report) => tracing::info!(
                task_id,
                archive = %report.archive_path.display(),
                included = report.included.len(),
                failed = report.failed.len(),
                "Exported generation",
            ),
            Err(e) => tracing::error!(task_id, error = %e, "Export failed"),
        }
    });
}
