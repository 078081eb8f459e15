use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use artforge_core::naming::{image_filename, remove_bg_filename, unique_name};
use artforge_core::remove_bg::RemoveBgTaskState;
use futures::future::join_all;
use reqwest::Url;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::ExportError;
use crate::plan::{DownloadPlan, DEFAULT_ARCHIVE_NAME};

/// Folder inside every archive that holds the images.
pub const ARCHIVE_IMAGE_DIR: &str = "images";

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// An image written into an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundledItem {
    pub url: String,
    /// Path of the entry inside the archive, e.g. `images/a.png`.
    pub entry_name: String,
}

/// An image left out of an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedItem {
    pub url: String,
    pub reason: String,
}

/// Outcome of a bundle download.
///
/// The archive is written even when every fetch failed; use
/// [`is_total_failure`](Self::is_total_failure) to tell that apart from
/// a partial bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleReport {
    pub archive_path: PathBuf,
    /// In request order.
    pub included: Vec<BundledItem>,
    pub failed: Vec<FailedItem>,
}

impl BundleReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Some items made it, some did not.
    pub fn is_partial(&self) -> bool {
        !self.included.is_empty() && !self.failed.is_empty()
    }

    /// Nothing could be fetched.
    pub fn is_total_failure(&self) -> bool {
        self.included.is_empty() && !self.failed.is_empty()
    }
}

/// Result of executing a [`DownloadPlan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    Nothing,
    Saved(PathBuf),
    Bundled(BundleReport),
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Fetches generated images from the backend and writes them under
/// `output_dir`.
#[derive(Debug, Clone)]
pub struct ExportOrchestrator {
    client: reqwest::Client,
    origin: Url,
    output_dir: PathBuf,
}

impl ExportOrchestrator {
    /// `origin` is used to resolve server-relative output paths such as
    /// `/outputs/12/a.png`.
    pub fn new(
        origin: &str,
        output_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Result<Self, ExportError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Self::with_client(client, origin, output_dir)
    }

    pub fn with_client(
        client: reqwest::Client,
        origin: &str,
        output_dir: impl Into<PathBuf>,
    ) -> Result<Self, ExportError> {
        let origin = Url::parse(origin).map_err(|e| ExportError::InvalidUrl {
            url: origin.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            client,
            origin,
            output_dir: output_dir.into(),
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Resolve a relative or absolute image URL against the origin.
    pub fn resolve(&self, url: &str) -> Result<Url, ExportError> {
        self.origin.join(url).map_err(|e| ExportError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }

    /// Fetch one image and save it as `filename`, or under the name
    /// derived from its URL. Errors go straight to the caller.
    pub async fn download_one(&self, url: &str, filename: Option<&str>) -> Result<PathBuf, ExportError> {
        let bytes = self.fetch(url).await?;

        let derived = image_filename(url, 0);
        let name = filename
            .and_then(safe_file_name)
            .or_else(|| safe_file_name(&derived))
            .unwrap_or_else(|| "image-0.png".to_string());

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self.output_dir.join(name);
        tokio::fs::write(&path, &bytes).await?;

        tracing::info!(url, path = %path.display(), bytes = bytes.len(), "Image downloaded");
        Ok(path)
    }

    /// Fetch every URL concurrently and bundle the successes into
    /// `archive_name` under `images/`.
    ///
    /// A failed fetch is logged and recorded in the report; it never
    /// aborts the bundle. The archive is written only after every fetch
    /// has settled.
    pub async fn download_many(&self, urls: &[String], archive_name: &str) -> Result<BundleReport, ExportError> {
        let fetches = urls
            .iter()
            .map(|url| async move { (url, self.fetch(url).await) });
        let settled = join_all(fetches).await;

        let mut taken = HashSet::new();
        let mut entries = Vec::new();
        let mut included = Vec::new();
        let mut failed = Vec::new();

        for (index, (url, result)) in settled.into_iter().enumerate() {
            match result {
                Ok(bytes) => {
                    let base = safe_file_name(&image_filename(url, index))
                        .unwrap_or_else(|| format!("image-{index}.png"));
                    let entry_name = format!("{ARCHIVE_IMAGE_DIR}/{}", unique_name(&mut taken, base, index));
                    included.push(BundledItem {
                        url: url.clone(),
                        entry_name: entry_name.clone(),
                    });
                    entries.push((entry_name, bytes));
                }
                Err(e) => {
                    tracing::error!(url = %url, error = %e, "Failed to fetch image for bundle");
                    failed.push(FailedItem {
                        url: url.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let archive_path = self.output_dir.join(archive_file_name(archive_name));

        let path = archive_path.clone();
        tokio::task::spawn_blocking(move || write_archive(&path, &entries))
            .await
            .map_err(std::io::Error::other)??;

        let report = BundleReport {
            archive_path,
            included,
            failed,
        };
        if report.is_total_failure() {
            tracing::warn!(
                archive = %report.archive_path.display(),
                failed = report.failed.len(),
                "Every image failed; archive is empty",
            );
        } else {
            tracing::info!(
                archive = %report.archive_path.display(),
                included = report.included.len(),
                failed = report.failed.len(),
                "Bundle written",
            );
        }
        Ok(report)
    }

    /// Execute a plan built from the current selection.
    pub async fn export(&self, plan: &DownloadPlan) -> Result<ExportOutcome, ExportError> {
        match plan {
            DownloadPlan::Nothing => Ok(ExportOutcome::Nothing),
            DownloadPlan::Single(url) => Ok(ExportOutcome::Saved(self.download_one(url, None).await?)),
            DownloadPlan::Bundle { urls, archive_name } => Ok(ExportOutcome::Bundled(
                self.download_many(urls, archive_name).await?,
            )),
        }
    }

    /// Save the output of a background-removal task as `rmbg_{id}.png`.
    /// Returns `None` while the task has no output yet.
    pub async fn download_remove_bg(&self, task: &RemoveBgTaskState) -> Result<Option<PathBuf>, ExportError> {
        let Some(url) = task.output_image.as_deref() else {
            return Ok(None);
        };
        let name = remove_bg_filename(task.id);
        let path = self.download_one(url, Some(name.as_str())).await?;
        Ok(Some(path))
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ExportError> {
        let resolved = self.resolve(url)?;
        let response = self.client.get(resolved.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExportError::Status {
                url: resolved.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn write_archive(path: &Path, entries: &[(String, Vec<u8>)]) -> Result<(), ExportError> {
    let file = std::fs::File::create(path)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    for (name, bytes) in entries {
        zip.start_file(name.as_str(), options)?;
        zip.write_all(bytes)?;
    }
    zip.finish()?;
    Ok(())
}

/// Keep only the final component of `name`, refusing `.` and `..`.
fn safe_file_name(name: &str) -> Option<String> {
    let last = name.rsplit(['/', '\\']).next()?.trim();
    match last {
        "" | "." | ".." => None,
        other => Some(other.to_string()),
    }
}

fn archive_file_name(name: &str) -> String {
    let name = safe_file_name(name).unwrap_or_else(|| DEFAULT_ARCHIVE_NAME.to_string());
    if name.to_ascii_lowercase().ends_with(".zip") {
        name
    } else {
        format!("{name}.zip")
    }
}
