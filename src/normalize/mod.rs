//! Message normalization: classification context, normalized messages and
//! deduplication.

pub mod context;
pub mod dedup;
pub mod message;

pub use context::{create_normalization_context, ContextInput, NormalizationContext};
pub use dedup::{dedup_key_for, deduplicate_messages};
pub use message::{normalize_message, normalize_messages};
