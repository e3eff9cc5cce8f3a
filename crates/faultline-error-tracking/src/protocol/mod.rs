//! Pure wire-protocol parsing: envelopes, DSNs and auth headers.

mod auth;
mod envelope;

pub use auth::{extract_public_key, parse_basic_auth, parse_dsn, parse_sentry_auth, ParsedDsn};
pub use envelope::{
    decompress_body, extract_events, fill_event_defaults, generate_event_id,
    is_single_event_body, normalize_event_id, Envelope, EnvelopeError, EnvelopeItem, ItemHeader,
    ItemType,
};
