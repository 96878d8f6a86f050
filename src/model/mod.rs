//! Core data model: raw input records, addresses, quotes, normalized messages
//! and conversation summaries.

pub mod address;
pub mod conversation;
pub mod message;
pub mod quote;
pub mod raw;
