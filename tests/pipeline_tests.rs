//! Integration tests for the normalization, deduplication and threading
//! pipeline, EML ingestion and the command-line front end.

use std::path::{Path, PathBuf};
use std::process::Command;

use assert_fs::prelude::*;
use chrono::{TimeZone, Utc};
use predicates::prelude::*;

use inboxkit::error::read_json_file;
use inboxkit::model::conversation::ConversationSummary;
use inboxkit::model::message::{AuthorType, Direction};
use inboxkit::model::quote::QuoteKind;
use inboxkit::model::raw::RawMessage;
use inboxkit::normalize::{
    create_normalization_context, deduplicate_messages, normalize_messages, ContextInput,
    NormalizationContext,
};
use inboxkit::parser::eml::ingest_eml_file;
use inboxkit::threading::{
    build_thread_seed, group_conversations_by_thread, message_matches_thread,
    segment_message_into_cards, should_group_conversations, SegmentationOptions,
};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn messages() -> Vec<RawMessage> {
    read_json_file(&fixture("messages.json")).unwrap()
}

fn ctx() -> NormalizationContext {
    create_normalization_context(ContextInput {
        agent_emails: vec!["agent@co.com".into()],
        current_user_email: Some("agent@co.com".into()),
        ..Default::default()
    })
}

// ─── Test 1: Every header shape in the fixture is understood ────────

#[test]
fn test_normalize_fixture_messages() {
    let normalized = normalize_messages(&messages(), &ctx());
    assert_eq!(normalized.len(), 4);

    let first = &normalized[0];
    assert_eq!(first.author_type, AuthorType::Customer);
    assert_eq!(first.author_label, "Jane Doe");
    assert_eq!(first.avatar_initial, "J");
    assert_eq!(first.dedup_key, "id:m1@cust.com");
    assert!(first.quoted_blocks.is_none());

    // Folded raw header block.
    let reply = &normalized[1];
    assert_eq!(reply.from.email.as_deref(), Some("agent@co.com"));
    assert_eq!(reply.from.name.as_deref(), Some("Agent Smith"));
    assert_eq!(reply.direction, Direction::Outbound);
    assert_eq!(reply.author_label, "You");
    assert_eq!(reply.visible_body, "Thanks!");
    assert_eq!(reply.subject.as_deref(), Some("Re: Printer broken"));
    let blocks = reply.quoted_blocks.as_ref().unwrap();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].kind, QuoteKind::Header);
}

// ─── Test 2: Gmail HTML reply keeps only the new text ───────────────

#[test]
fn test_gmail_html_reply() {
    let normalized = normalize_messages(&messages(), &ctx());
    let html = &normalized[3];

    assert!(html.is_html);
    assert!(html.visible_body.contains("Still broken."));
    assert!(!html.visible_body.contains("Thanks!"));
    assert!(!html.visible_body.contains("gmail_quote"));
    let kinds: Vec<QuoteKind> = html
        .quoted_blocks
        .as_ref()
        .unwrap()
        .iter()
        .map(|b| b.kind)
        .collect();
    assert_eq!(kinds, vec![QuoteKind::Gmail]);
    assert_eq!(html.dedup_key, "id:m3@cust.com");
}

// ─── Test 3: Redelivered message collapses onto the first copy ──────

#[test]
fn test_deduplicate_fixture() {
    let deduped = deduplicate_messages(normalize_messages(&messages(), &ctx()));
    let ids: Vec<&str> = deduped.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["m1", "m2", "m3"]);
}

// ─── Test 4: Quoted Gmail history becomes a separate card ───────────

#[test]
fn test_segment_gmail_reply_into_cards() {
    let ctx = ctx();
    let normalized = normalize_messages(&messages(), &ctx);
    let cards = segment_message_into_cards(&normalized[3], &SegmentationOptions::from(&ctx));

    assert_eq!(cards.len(), 2);
    assert_eq!(cards[0].id, "m3");
    let quoted = &cards[1];
    assert_eq!(quoted.id, "m3::q0");
    assert_eq!(quoted.author_type, AuthorType::Agent);
    assert_eq!(quoted.author_label, "You");
    assert!(quoted.quoted_blocks.is_none());
    assert!(quoted.visible_body.contains("Thanks!"));
    assert_eq!(
        quoted.created_at,
        Utc.with_ymd_and_hms(2024, 1, 1, 11, 0, 0).unwrap()
    );
}

// ─── Test 5: Thread membership across header shapes ─────────────────

#[test]
fn test_thread_matching() {
    let all = messages();
    let seed = build_thread_seed(&all[..1], Some("support@co.com"));

    // In-Reply-To from a raw header block, References from a map.
    assert!(message_matches_thread(&all[1], &seed, Some("support@co.com")));
    assert!(message_matches_thread(&all[3], &seed, Some("support@co.com")));

    let mut stranger = RawMessage::new("x", Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap(), "Hi");
    stranger.email_subject = Some("Re: Printer broken".into());
    assert!(!message_matches_thread(&stranger, &seed, Some("support@co.com")));
}

// ─── Test 6: Conversation grouping ──────────────────────────────────

#[test]
fn test_group_fixture_conversations() {
    let conversations: Vec<ConversationSummary> =
        read_json_file(&fixture("conversations.json")).unwrap();
    assert!(should_group_conversations(&conversations));

    let threads = group_conversations_by_thread(conversations);
    let ids: Vec<&str> = threads.iter().map(|t| t.conversation.id.as_str()).collect();
    assert_eq!(ids, vec!["c2", "c3", "c4"]);

    let printer = &threads[0];
    assert_eq!(printer.thread_count, 2);
    assert_eq!(printer.thread_ids, vec!["c2", "c1"]);
    assert_eq!(printer.conversation.extra["status"], "open");

    let json = serde_json::to_value(printer).unwrap();
    assert_eq!(json["unread_count"], 2);
    assert_eq!(json["is_thread_representative"], true);
}

// ─── Test 7: EML ingestion feeds the same pipeline ──────────────────

#[test]
fn test_ingest_eml_and_match() {
    let raw = ingest_eml_file(fixture("reply.eml")).unwrap();
    assert_eq!(raw.id, "reply");
    assert_eq!(
        raw.created_at,
        Utc.with_ymd_and_hms(2024, 1, 2, 9, 15, 0).unwrap()
    );
    assert_eq!(raw.email_subject.as_deref(), Some("Re: Printer broken"));

    let normalized = normalize_messages(std::slice::from_ref(&raw), &ctx());
    assert_eq!(normalized[0].visible_body, "It works now, thanks!");
    assert_eq!(normalized[0].author_type, AuthorType::Customer);
    assert_eq!(normalized[0].dedup_key, "id:m4@cust.com");

    let seed = build_thread_seed(&messages()[..2], None);
    assert!(message_matches_thread(&raw, &seed, None));
}

// ─── Test 8: Missing input files surface as errors ──────────────────

#[test]
fn test_missing_fixture_is_reported() {
    let err = read_json_file::<Vec<RawMessage>>(&fixture("does-not-exist.json")).unwrap_err();
    assert!(predicate::str::contains("does-not-exist.json").eval(&err.to_string()));
}

// ─── CLI ────────────────────────────────────────────────────────────

fn inboxkit(temp: &assert_fs::TempDir) -> Command {
    let config = temp.child("config.toml");
    config
        .write_str(&format!(
            "[general]\ncache_dir = {:?}\n\n[output]\npretty = false\n",
            temp.path().join("cache").display().to_string()
        ))
        .unwrap();

    let mut cmd = Command::new(env!("CARGO_BIN_EXE_inboxkit"));
    cmd.env("INBOXKIT_CONFIG", config.path())
        .env_remove("INBOXKIT_CURRENT_USER")
        .env("RUST_LOG", "error");
    cmd
}

// ─── Test 9: normalize --dedup over the fixture ─────────────────────

#[test]
fn test_cli_normalize_dedup() {
    let temp = assert_fs::TempDir::new().unwrap();
    let output = inboxkit(&temp)
        .args(["--agent-email", "agent@co.com", "normalize", "--dedup"])
        .arg(fixture("messages.json"))
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let ids: Vec<&str> = value
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["m1", "m2", "m3"]);
    assert_eq!(value[1]["direction"], "outbound");
    assert!(predicate::str::contains("\"author_label\":\"Agent Smith\"").eval(&stdout));

    temp.child("cache").child("inboxkit.log").assert(predicate::path::exists());
}

// ─── Test 10: group --check ─────────────────────────────────────────

#[test]
fn test_cli_group_check() {
    let temp = assert_fs::TempDir::new().unwrap();
    let output = inboxkit(&temp)
        .args(["group", "--check"])
        .arg(fixture("conversations.json"))
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout.trim(), r#"{"should_group":true}"#);
}

// ─── Test 11: ingest a directory of .eml files ──────────────────────

#[test]
fn test_cli_ingest_directory() {
    let temp = assert_fs::TempDir::new().unwrap();
    let inbox = temp.child("inbox");
    inbox
        .child("b.eml")
        .write_file(&fixture("reply.eml"))
        .unwrap();
    inbox
        .child("a.eml")
        .write_str("From: bob@other.com\nSubject: Hello\n\nHi there\n")
        .unwrap();
    inbox.child("notes.txt").write_str("ignored").unwrap();

    let out = temp.child("out").child("raw.json");
    let status = inboxkit(&temp)
        .arg("ingest")
        .arg(inbox.path())
        .arg("-o")
        .arg(out.path())
        .status()
        .unwrap();
    assert!(status.success());

    out.assert(predicate::str::contains("\"id\":\"a\""));
    let raws: Vec<RawMessage> = read_json_file(out.path()).unwrap();
    let ids: Vec<&str> = raws.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert_eq!(raws[0].created_at.timestamp(), 0);
}

// ─── Test 12: match prints the ids of thread members ────────────────

#[test]
fn test_cli_match() {
    let temp = assert_fs::TempDir::new().unwrap();
    let seed = temp.child("seed.json");
    let all: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(fixture("messages.json")).unwrap()).unwrap();
    seed.write_str(&serde_json::to_string(&[all[0].clone()]).unwrap())
        .unwrap();

    let output = inboxkit(&temp)
        .args(["match", "--inbox", "support@co.com"])
        .arg(seed.path())
        .arg(fixture("messages.json"))
        .output()
        .unwrap();
    assert!(output.status.success());
    let ids: Vec<String> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(ids, vec!["m1", "m2", "m2-redelivered", "m3"]);
}
