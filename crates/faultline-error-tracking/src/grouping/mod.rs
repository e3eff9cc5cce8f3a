//! Event grouping: deterministic fingerprints plus the human-readable
//! title, culprit and metadata derived alongside them.
//!
//! Everything in this module is CPU-only and pure; the ingest hot path
//! calls [`group_event`] once per event.

mod fingerprint;
mod normalize;

pub use fingerprint::{fingerprint_event, group_event, EventGrouping};
pub use normalize::normalize_message;
