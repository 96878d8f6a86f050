//! Email parsing: header extraction, quote splitting and `.eml` ingestion.

pub mod attribution;
pub mod eml;
pub mod header;
pub mod patterns;
pub mod quote;
pub mod quote_html;
pub mod quote_text;
