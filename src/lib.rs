//! `inboxkit`: email thread reconstruction for helpdesk inboxes.
//!
//! This crate turns raw message records (as stored by a support backend)
//! into normalized, deduplicated, threaded messages: quoted history is
//! split from the visible body, authorship is classified as agent or
//! customer, duplicate deliveries collapse onto a stable key, and
//! conversations are grouped into threads.

pub mod config;
pub mod error;
pub mod model;
pub mod normalize;
pub mod parser;
pub mod threading;
