//! Thread membership for individual messages.
//!
//! A [`ThreadSeed`] collects the identifying signals of a known set of
//! messages; [`message_matches_thread`] then tests a candidate against it.
//! Threading headers are authoritative and tried first. The subject and
//! participant fallback exists for webmail and forwarding setups that drop
//! those headers.

use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;

use crate::model::raw::RawMessage;
use crate::parser::header::{self, decode_encoded_words};
use crate::threading::strip_subject_prefixes;

/// Prefixes removed by [`normalize_subject_light`].
const LIGHT_PREFIXES: &[&str] = &["re:", "fwd:", "fw:", "aw:"];

/// Accumulated signals of a thread.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ThreadSeed {
    pub message_ids: HashSet<String>,
    pub references: HashSet<String>,
    /// First non-empty normalized subject among the seed messages.
    pub normalized_subject: String,
    /// Lower-cased participant addresses.
    pub participants: HashSet<String>,
}

/// Strip `Re:`/`Fwd:`/`Fw:`/`Aw:` prefixes, collapse whitespace, lower-case.
///
/// Localized Nordic prefixes and bracketed tags are left alone; see
/// [`normalize_subject_aggressive`](super::conversation::normalize_subject_aggressive)
/// for the conversation-level variant.
pub fn normalize_subject_light(subject: &str) -> String {
    strip_subject_prefixes(subject, LIGHT_PREFIXES)
}

/// Build a seed from the messages already known to be in the thread.
pub fn build_thread_seed(messages: &[RawMessage], inbox_email: Option<&str>) -> ThreadSeed {
    let mut seed = ThreadSeed::default();

    for message in messages {
        let ids = header::extract_message_ids(message.email_headers.as_ref());
        if let Some(id) = ids.message_id {
            seed.message_ids.insert(id);
        }
        seed.references.extend(ids.references);

        if seed.normalized_subject.is_empty() {
            if let Some(subject) = message_subject(message) {
                seed.normalized_subject = normalize_subject_light(&subject);
            }
        }

        if let Some(customer) = customer_address(message) {
            seed.participants.insert(customer);
        }
    }

    if let Some(inbox) = normalize_email(inbox_email) {
        seed.participants.insert(inbox);
    }

    debug!(
        ids = seed.message_ids.len(),
        references = seed.references.len(),
        participants = seed.participants.len(),
        "Built thread seed"
    );
    seed
}

/// `true` if `candidate` belongs to the seeded thread.
///
/// Checked in order, first hit wins: the candidate is referenced by the
/// thread; it replies to a thread message; it references a thread message;
/// it has the same subject and shares a participant. `inbox_email` never
/// counts as a shared participant, so the inbox alone links nothing.
pub fn message_matches_thread(
    candidate: &RawMessage,
    seed: &ThreadSeed,
    inbox_email: Option<&str>,
) -> bool {
    let ids = header::extract_message_ids(candidate.email_headers.as_ref());

    if ids
        .message_id
        .as_ref()
        .is_some_and(|id| seed.references.contains(id))
    {
        return true;
    }
    if ids
        .in_reply_to
        .as_ref()
        .is_some_and(|id| seed.message_ids.contains(id))
    {
        return true;
    }
    if ids.references.iter().any(|r| seed.message_ids.contains(r)) {
        return true;
    }

    if seed.normalized_subject.is_empty() {
        return false;
    }
    let subject = message_subject(candidate)
        .map(|s| normalize_subject_light(&s))
        .unwrap_or_default();
    if subject != seed.normalized_subject {
        return false;
    }

    let inbox = normalize_email(inbox_email);
    let overlap = candidate_participants(candidate)
        .iter()
        .filter(|p| inbox.as_ref() != Some(*p))
        .any(|p| seed.participants.contains(p));
    debug!(id = %candidate.id, overlap, "Subject fallback match");
    overlap
}

fn normalize_email(email: Option<&str>) -> Option<String> {
    email
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
}

/// `email_subject`, else the decoded `Subject` header, else the
/// conversation subject.
fn message_subject(message: &RawMessage) -> Option<String> {
    let pairs = header::header_pairs(message.email_headers.as_ref());
    message
        .email_subject
        .clone()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| header::header_value(&pairs, "subject").map(decode_encoded_words))
        .or_else(|| message.conversation.as_ref().and_then(|c| c.subject.clone()))
}

/// The customer side of a message: the conversation customer, else the
/// sender of a message not written by an agent.
fn customer_address(message: &RawMessage) -> Option<String> {
    if let Some(email) = message.customer_email() {
        return Some(email);
    }
    let by_agent = message.is_internal
        || message
            .sender_type
            .as_deref()
            .is_some_and(|t| t.trim().eq_ignore_ascii_case("agent"));
    if by_agent {
        return None;
    }
    let pairs = header::header_pairs(message.email_headers.as_ref());
    addresses(&pairs, "from").into_iter().next()
}

fn candidate_participants(message: &RawMessage) -> HashSet<String> {
    let pairs = header::header_pairs(message.email_headers.as_ref());
    let mut participants: HashSet<String> = ["from", "to", "cc"]
        .iter()
        .flat_map(|name| addresses(&pairs, name))
        .collect();
    if let Some(customer) = message.customer_email() {
        participants.insert(customer);
    }
    participants
}

fn addresses(pairs: &[(String, String)], name: &str) -> Vec<String> {
    header::header_value(pairs, name)
        .map(|v| {
            header::parse_address_header(v)
                .into_iter()
                .filter_map(|a| a.email)
                .collect()
        })
        .unwrap_or_default()
}
