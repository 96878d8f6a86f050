//! Conversation-level threading for the inbox list.
//!
//! Conversations from the same customer with the same subject (after
//! aggressive normalization) collapse into one row; the most recently
//! active conversation represents the thread.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::model::conversation::{ConversationSummary, ThreadedConversation};
use crate::threading::strip_subject_prefixes;

/// Prefixes removed by [`normalize_subject_aggressive`], including the
/// Norwegian/Swedish `SV:` and Finnish `VS:`.
const AGGRESSIVE_PREFIXES: &[&str] = &["re:", "fwd:", "fw:", "aw:", "sv:", "vs:"];

/// Bracketed tags such as `[External]` or `[Ticket #123]`.
static BRACKET_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\[\]]*\]").expect("valid tag pattern"));

/// Remove bracketed tags and every known reply prefix, collapse whitespace,
/// lower-case.
pub fn normalize_subject_aggressive(subject: &str) -> String {
    let untagged = BRACKET_TAG.replace_all(subject, " ");
    strip_subject_prefixes(&untagged, AGGRESSIVE_PREFIXES)
}

/// `customer_email::normalized_subject`, or `None` without a customer email.
pub fn thread_key(conversation: &ConversationSummary) -> Option<String> {
    let email = conversation.customer_email()?;
    let subject = normalize_subject_aggressive(conversation.subject.as_deref().unwrap_or(""));
    Some(format!("{email}::{subject}"))
}

/// Group key; conversations without a thread key stand alone.
fn group_key(conversation: &ConversationSummary) -> String {
    thread_key(conversation).unwrap_or_else(|| format!("conversation::{}", conversation.id))
}

/// Collapse conversations into one representative per thread.
///
/// The representative is the conversation with the latest `received_at`
/// (falling back to `updated_at`); on ties the one earlier in the input
/// wins. `thread_ids` lists the whole thread in the same recency order.
/// The output is sorted by the representative's recency, newest first.
pub fn group_conversations_by_thread(
    conversations: Vec<ConversationSummary>,
) -> Vec<ThreadedConversation> {
    let total = conversations.len();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Vec<ConversationSummary>> = Vec::new();

    for conversation in conversations {
        let key = group_key(&conversation);
        match index.get(&key) {
            Some(&i) => groups[i].push(conversation),
            None => {
                index.insert(key, groups.len());
                groups.push(vec![conversation]);
            }
        }
    }

    let mut threaded: Vec<ThreadedConversation> = groups
        .into_iter()
        .filter_map(|mut members| {
            members.sort_by_key(|c| Reverse(c.activity_at()));
            let thread_ids = members.iter().map(|c| c.id.clone()).collect();
            let thread_count = members.len();
            let representative = members.into_iter().next()?;
            Some(ThreadedConversation {
                conversation: representative,
                thread_count,
                thread_ids,
                is_thread_representative: true,
            })
        })
        .collect();

    threaded.sort_by_key(|t| Reverse(t.conversation.activity_at()));

    debug!(
        conversations = total,
        threads = threaded.len(),
        "Grouped conversations"
    );
    threaded
}

/// Cheap pre-check: `true` as soon as two conversations share a thread key.
pub fn should_group_conversations(conversations: &[ConversationSummary]) -> bool {
    if conversations.len() < 2 {
        return false;
    }
    let mut seen = HashSet::new();
    conversations
        .iter()
        .filter_map(thread_key)
        .any(|key| !seen.insert(key))
}
