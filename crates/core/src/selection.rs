//! Gallery selection model.
//!
//! Selections are immutable values: every change builds a new set and
//! swaps the shared pointer, so a snapshot handed to an observer never
//! changes underneath it. Comparing snapshots with [`Arc::ptr_eq`] is
//! enough to detect a change.
//!
//! The model does not watch the result list. Callers must call
//! [`SelectionModel::select_all`], [`SelectionModel::clear`] or
//! [`SelectionModel::retain_displayed`] when the displayed results change
//! shape (e.g. on a style switch).

use std::collections::BTreeSet;
use std::sync::Arc;

/// Shared, immutable set of selected image URLs.
pub type SelectionSet = Arc<BTreeSet<String>>;

#[derive(Debug, Clone, Default)]
pub struct SelectionModel {
    selected: SelectionSet,
}

impl SelectionModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip membership of `url`.
    pub fn toggle(&mut self, url: &str) {
        let mut next = BTreeSet::clone(&self.selected);
        if !next.remove(url) {
            next.insert(url.to_string());
        }
        self.selected = Arc::new(next);
    }

    /// Replace the selection with exactly `urls`.
    pub fn select_all<I, S>(&mut self, urls: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected = Arc::new(urls.into_iter().map(Into::into).collect());
    }

    pub fn clear(&mut self) {
        self.selected = Arc::default();
    }

    /// Drop every selected URL that is not in `displayed`.
    pub fn retain_displayed(&mut self, displayed: &[String]) {
        if self.selected.iter().all(|url| displayed.contains(url)) {
            return;
        }
        let next = self
            .selected
            .iter()
            .filter(|url| displayed.contains(url))
            .cloned()
            .collect();
        self.selected = Arc::new(next);
    }

    /// "Select all" toggle of the gallery header: clears when every
    /// displayed result is already selected, selects all otherwise.
    pub fn toggle_all(&mut self, displayed: &[String]) {
        if self.is_all_selected(displayed) {
            self.clear();
        } else {
            self.select_all(displayed.iter().cloned());
        }
    }

    pub fn is_all_selected(&self, displayed: &[String]) -> bool {
        !displayed.is_empty() && displayed.iter().all(|url| self.selected.contains(url))
    }

    pub fn contains(&self, url: &str) -> bool {
        self.selected.contains(url)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Current selection. Later changes never mutate the returned set.
    pub fn snapshot(&self) -> SelectionSet {
        Arc::clone(&self.selected)
    }
}
