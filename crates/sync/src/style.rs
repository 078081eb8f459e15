//! Style "generating" flag.
//!
//! The generation reconciler needs to mark a style busy while one of its
//! tasks runs. It does so only through [`StylePresence`]; it never sees
//! the style store itself.

use std::collections::BTreeSet;
use std::sync::Arc;

use artforge_core::types::DbId;
use tokio::sync::watch;

/// Capability to flip the "generating" flag of a style.
pub trait StylePresence: Send + Sync + 'static {
    fn set_generating(&self, style_id: DbId, generating: bool);
}

/// Ids of styles that currently have a generation in flight.
pub type GeneratingStyles = Arc<BTreeSet<DbId>>;

/// In-memory [`StylePresence`] that publishes the set of generating
/// styles to subscribers.
#[derive(Debug)]
pub struct StyleActivity {
    generating: watch::Sender<GeneratingStyles>,
}

impl Default for StyleActivity {
    fn default() -> Self {
        Self::new()
    }
}

impl StyleActivity {
    pub fn new() -> Self {
        let (generating, _) = watch::channel(GeneratingStyles::default());
        Self { generating }
    }

    pub fn is_generating(&self, style_id: DbId) -> bool {
        self.generating.borrow().contains(&style_id)
    }

    pub fn snapshot(&self) -> GeneratingStyles {
        Arc::clone(&self.generating.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<GeneratingStyles> {
        self.generating.subscribe()
    }
}

impl StylePresence for StyleActivity {
    fn set_generating(&self, style_id: DbId, generating: bool) {
        let changed = self.generating.send_if_modified(|styles| {
            if styles.contains(&style_id) == generating {
                return false;
            }
            let set = Arc::make_mut(styles);
            if generating {
                set.insert(style_id);
            } else {
                set.remove(&style_id);
            }
            true
        });
        if changed {
            tracing::debug!(style_id, generating, "Style activity changed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_round_trip() {
        let activity = StyleActivity::new();
        activity.set_generating(7, true);
        assert!(activity.is_generating(7));
        assert!(!activity.is_generating(8));
        activity.set_generating(7, false);
        assert!(!activity.is_generating(7));
    }

    #[test]
    fn earlier_snapshot_is_not_mutated() {
        let activity = StyleActivity::new();
        activity.set_generating(1, true);
        let before = activity.snapshot();
        activity.set_generating(2, true);

        assert_eq!(before.len(), 1);
        assert_eq!(activity.snapshot().len(), 2);
    }

    #[test]
    fn redundant_update_does_not_notify() {
        let activity = StyleActivity::new();
        let mut rx = activity.subscribe();
        activity.set_generating(3, false);
        assert!(!rx.has_changed().unwrap());

        activity.set_generating(3, true);
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();
        activity.set_generating(3, true);
        assert!(!rx.has_changed().unwrap());
    }
}
