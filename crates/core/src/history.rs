//! Per-style gallery of finished generation results.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::naming::image_filename;
use crate::types::{DbId, Timestamp};

/// History key used for tasks submitted without a style.
pub const UNSTYLED_HISTORY_KEY: DbId = 0;

/// One image produced by a generation task. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// `{task_id}-{index}`.
    pub id: String,
    pub task_id: DbId,
    pub image_url: String,
    pub filename: String,
    pub created_at: Timestamp,
}

/// Convert a batch of output paths into results, preserving order.
pub fn results_from_paths(
    task_id: DbId,
    paths: &[String],
    created_at: Timestamp,
) -> Vec<GenerationResult> {
    paths
        .iter()
        .enumerate()
        .map(|(index, path)| GenerationResult {
            id: format!("{task_id}-{index}"),
            task_id,
            image_url: path.clone(),
            filename: image_filename(path, index),
            created_at,
        })
        .collect()
}

/// Results grouped by style id, newest batch first.
///
/// Batches are only ever prepended. A result already present for the
/// same `(task_id, image_url)` is skipped, so replaying a terminal
/// message does not duplicate gallery entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    by_style: HashMap<DbId, Vec<GenerationResult>>,
}

impl History {
    /// Prepend a batch to a style's history. Returns how many results
    /// were actually added.
    pub fn prepend(&mut self, style_id: DbId, results: Vec<GenerationResult>) -> usize {
        let existing = self.by_style.entry(style_id).or_default();
        let fresh: Vec<GenerationResult> = results
            .into_iter()
            .filter(|r| {
                !existing
                    .iter()
                    .any(|e| e.task_id == r.task_id && e.image_url == r.image_url)
            })
            .collect();

        let added = fresh.len();
        if added > 0 {
            existing.splice(0..0, fresh);
        }
        added
    }

    /// Results for one style, newest first. Empty if none.
    pub fn for_style(&self, style_id: DbId) -> &[GenerationResult] {
        self.by_style
            .get(&style_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Image URLs for one style in display order.
    pub fn urls_for_style(&self, style_id: DbId) -> Vec<String> {
        self.for_style(style_id)
            .iter()
            .map(|r| r.image_url.clone())
            .collect()
    }

    pub fn total(&self) -> usize {
        self.by_style.values().map(Vec::len).sum()
    }
}
