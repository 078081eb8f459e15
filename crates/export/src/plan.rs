//! What a "download" click should do for a given selection.

use std::collections::BTreeSet;

use artforge_core::history::GenerationResult;

/// Archive name used when the caller does not pick one.
pub const DEFAULT_ARCHIVE_NAME: &str = "generated-images.zip";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadPlan {
    /// Nothing selected.
    Nothing,
    /// Exactly one image: save it directly.
    Single(String),
    /// Several images: fetch them all and bundle into one archive.
    Bundle { urls: Vec<String>, archive_name: String },
}

impl DownloadPlan {
    /// Plan for the selected URLs.
    ///
    /// URLs are ordered as they appear in `displayed`; selected URLs that
    /// are no longer displayed follow in set order.
    pub fn from_selection(selected: &BTreeSet<String>, displayed: &[String]) -> Self {
        let mut urls: Vec<String> = displayed
            .iter()
            .filter(|url| selected.contains(*url))
            .cloned()
            .collect();
        urls.extend(
            selected
                .iter()
                .filter(|url| !displayed.contains(url))
                .cloned(),
        );

        match urls.len() {
            0 => Self::Nothing,
            1 => Self::Single(urls.remove(0)),
            _ => Self::Bundle {
                urls,
                archive_name: DEFAULT_ARCHIVE_NAME.to_string(),
            },
        }
    }

    /// "Download all" for a style: always an archive, even for one image.
    pub fn for_history(results: &[GenerationResult], archive_name: &str) -> Self {
        if results.is_empty() {
            return Self::Nothing;
        }
        Self::Bundle {
            urls: results.iter().map(|r| r.image_url.clone()).collect(),
            archive_name: archive_name.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Nothing => 0,
            Self::Single(_) => 1,
            Self::Bundle { urls, .. } => urls.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
