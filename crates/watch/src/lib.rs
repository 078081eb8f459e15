//! Headless progress watcher.
//!
//! [`monitor`] follows a running [`artforge_sync::SyncSession`] and logs
//! connection transitions and job progress; [`report`] turns state
//! snapshots into log lines.

pub mod monitor;
pub mod report;
