//! Pure domain logic for the artforge progress-synchronization client.
//!
//! Everything here is free of I/O: message decoding, the per-domain
//! state reducers that merge progress into client-side state, result
//! history, and the gallery selection model. The async plumbing that
//! feeds these reducers lives in `artforge-sync`.

pub mod error;
pub mod generation;
pub mod history;
pub mod naming;
pub mod progress;
pub mod remove_bg;
pub mod selection;
pub mod training;
pub mod types;
