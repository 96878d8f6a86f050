//! Threading: message-level thread membership, conversation grouping and
//! segmentation of quoted history into cards.

pub mod conversation;
pub mod seed;
pub mod segment;

pub use conversation::{
    group_conversations_by_thread, normalize_subject_aggressive, should_group_conversations,
    thread_key,
};
pub use seed::{build_thread_seed, message_matches_thread, normalize_subject_light, ThreadSeed};
pub use segment::{segment_message_into_cards, SegmentationOptions};

/// Repeatedly strip reply prefixes, then collapse whitespace and lower-case.
pub(crate) fn strip_subject_prefixes(subject: &str, prefixes: &[&str]) -> String {
    let mut s = subject.trim();
    'strip: loop {
        for prefix in prefixes {
            let matches = s
                .get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix));
            if matches {
                s = s[prefix.len()..].trim_start();
                continue 'strip;
            }
        }
        break;
    }
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
