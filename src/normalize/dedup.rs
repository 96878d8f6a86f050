//! Stable deduplication keys and the deduplication pass.
//!
//! The same logical message can reach the store through several ingestion
//! paths (webhook, scheduled sync, manual re-fetch). When a provider id is
//! available all copies share `id:<provider id>`. Otherwise the key is a
//! content hash over the visible body, the author type and a 2-minute time
//! bucket; near-simultaneous near-duplicates may occasionally over- or
//! under-merge and that is accepted.

use std::collections::HashSet;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::model::message::{AuthorType, NormalizedMessage};
use crate::model::raw::RawMessage;
use crate::parser::header::MessageIds;

/// Width of a content-hash time bucket, in milliseconds.
pub const BUCKET_MILLIS: i64 = 120_000;

/// Hex characters kept from the SHA-256 digest.
const HASH_PREFIX_LEN: usize = 16;

/// Compute the deduplication key of a message; the time bucket comes from
/// `raw.created_at`.
pub fn dedup_key_for(
    raw: &RawMessage,
    ids: &MessageIds,
    visible_body: &str,
    author_type: AuthorType,
) -> String {
    let explicit = ids.message_id.clone().or_else(|| {
        raw.external_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
    });
    if let Some(id) = explicit {
        return format!("id:{id}");
    }

    let body: Vec<&str> = visible_body.split_whitespace().collect();
    let bucket = raw.created_at.timestamp_millis().div_euclid(BUCKET_MILLIS);
    let material = format!("{}|{}|{}", body.join(" "), author_type.as_str(), bucket);

    let digest = Sha256::digest(material.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("ch:{}", &hex[..HASH_PREFIX_LEN])
}

/// Sort by time and keep the first message seen for every key.
///
/// The sort is stable, so among copies with the same timestamp the one
/// that came first in the input wins.
pub fn deduplicate_messages(mut messages: Vec<NormalizedMessage>) -> Vec<NormalizedMessage> {
    messages.sort_by_key(|m| m.created_at);

    let before = messages.len();
    let mut seen: HashSet<String> = HashSet::with_capacity(messages.len());
    messages.retain(|m| seen.insert(m.dedup_key.clone()));

    debug!(
        kept = messages.len(),
        dropped = before - messages.len(),
        "Deduplicated messages"
    );
    messages
}
