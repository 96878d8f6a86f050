//! Expand a message's quoted history into separate message cards.

use std::collections::HashSet;

use crate::model::address::EmailAddress;
use crate::model::message::{AuthorType, Direction, NormalizedMessage};
use crate::model::quote::QuotedMessage;
use crate::normalize::context::{in_org_domains, NormalizationContext};

/// Classification input for synthetic cards. Phones are not consulted:
/// quoted messages only carry an email identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentationOptions {
    pub agent_email_set: HashSet<String>,
    pub org_domains: Vec<String>,
    pub current_user_email: Option<String>,
}

impl From<&NormalizationContext> for SegmentationOptions {
    fn from(ctx: &NormalizationContext) -> Self {
        Self {
            agent_email_set: ctx.agent_email_set.clone(),
            org_domains: ctx.org_domains.clone(),
            current_user_email: ctx.current_user_email.clone(),
        }
    }
}

impl SegmentationOptions {
    fn is_agent(&self, from: &EmailAddress) -> bool {
        let Some(email) = from.email.as_deref() else {
            return false;
        };
        self.agent_email_set.contains(email) || in_org_domains(email, &self.org_domains)
    }
}

/// Split `message` into itself plus one card per quoted sub-message.
///
/// Cards never carry quotes of their own; only one level is expanded.
/// The result is ordered newest first.
pub fn segment_message_into_cards(
    message: &NormalizedMessage,
    opts: &SegmentationOptions,
) -> Vec<NormalizedMessage> {
    let mut cards = Vec::with_capacity(1 + message.quoted_messages.len());
    cards.push(message.clone());
    cards.extend(
        message
            .quoted_messages
            .iter()
            .enumerate()
            .map(|(i, quoted)| quoted_card(message, i, quoted, opts)),
    );
    cards.sort_by_key(|c| std::cmp::Reverse(c.created_at));
    cards
}

fn quoted_card(
    parent: &NormalizedMessage,
    index: usize,
    quoted: &QuotedMessage,
    opts: &SegmentationOptions,
) -> NormalizedMessage {
    let author_type = if opts.is_agent(&quoted.from) {
        AuthorType::Agent
    } else {
        AuthorType::Customer
    };

    let html = quoted.html.as_ref().filter(|_| parent.is_html);
    let (visible_body, is_html) = match html {
        Some(html) => (html.clone(), true),
        None => (quoted.text.clone(), false),
    };

    NormalizedMessage {
        id: format!("{}::q{index}", parent.id),
        dedup_key: format!("quoted:{}:{index}", parent.id),
        created_at: quoted.sent_at.unwrap_or(parent.created_at),
        channel: parent.channel,
        from: quoted.from.clone(),
        to: Vec::new(),
        cc: None,
        bcc: None,
        subject: quoted.subject.clone().or_else(|| parent.subject.clone()),
        direction: Direction::from(author_type),
        author_type,
        author_label: card_label(&quoted.from, author_type, opts),
        avatar_initial: card_initial(&quoted.from),
        visible_body,
        is_html,
        quoted_blocks: None,
        original_message: parent.original_message.clone(),
        quoted_messages: Vec::new(),
    }
}

fn card_label(from: &EmailAddress, author_type: AuthorType, opts: &SegmentationOptions) -> String {
    let is_me = from
        .email
        .as_deref()
        .is_some_and(|e| opts.current_user_email.as_deref() == Some(e));
    if author_type == AuthorType::Agent && is_me {
        return "You".to_string();
    }
    let fallback = match author_type {
        AuthorType::Agent => "Agent",
        _ => "Customer",
    };
    from.name
        .clone()
        .or_else(|| from.email.clone())
        .unwrap_or_else(|| fallback.to_string())
}

fn card_initial(from: &EmailAddress) -> String {
    from.name
        .as_deref()
        .and_then(|n| n.trim().chars().next())
        .or_else(|| from.email.as_deref().and_then(|e| e.chars().next()))
        .unwrap_or('A')
        .to_uppercase()
        .collect()
}
