//! Raw record to [`NormalizedMessage`].

use tracing::debug;

use crate::model::address::EmailAddress;
use crate::model::message::{AuthorType, Direction, NormalizedMessage};
use crate::model::raw::{Channel, RawMessage};
use crate::normalize::context::{looks_like_phone, NormalizationContext};
use crate::normalize::dedup::dedup_key_for;
use crate::parser::header::{self, decode_encoded_words};
use crate::parser::quote::parse_quoted_email;

/// Normalize one raw message.
///
/// Authorship is a heuristic union: the message is an agent's if any of
/// the known signals says so. Its quality is bounded by how complete the
/// context's agent lists are.
pub fn normalize_message(raw: &RawMessage, ctx: &NormalizationContext) -> NormalizedMessage {
    let parsed = parse_quoted_email(&raw.content, raw.content_type.as_deref());
    let pairs = header::header_pairs(raw.email_headers.as_ref());

    let mut from = address_list(&pairs, "from")
        .and_then(|list| list.into_iter().next())
        .unwrap_or_default();
    let to = address_list(&pairs, "to").unwrap_or_default();
    let cc = address_list(&pairs, "cc");
    let bcc = address_list(&pairs, "bcc");

    let sender_phone = sender_phone(raw, &pairs);
    if raw.channel == Channel::Sms && from.email.is_none() {
        if let Some(phone) = &sender_phone {
            from.email = Some(phone.clone());
        }
    }

    let author_type = classify_author(raw, &from, sender_phone.as_deref(), ctx);
    let author_label = author_label(raw, &from, sender_phone.as_deref(), author_type, ctx);
    let avatar_initial = avatar_initial(&from);

    let subject = raw
        .email_subject
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| header::header_value(&pairs, "subject").map(decode_encoded_words))
        .or_else(|| raw.conversation.as_ref().and_then(|c| c.subject.clone()));

    let ids = header::extract_message_ids(raw.email_headers.as_ref());
    let dedup_key = dedup_key_for(raw, &ids, &parsed.visible_content, author_type);

    NormalizedMessage {
        id: raw.id.clone(),
        dedup_key,
        created_at: raw.created_at,
        channel: raw.channel,
        from,
        to,
        cc,
        bcc,
        subject,
        direction: Direction::from(author_type),
        author_type,
        author_label,
        avatar_initial,
        visible_body: parsed.visible_content,
        is_html: parsed.is_html,
        quoted_blocks: (!parsed.quoted_blocks.is_empty()).then_some(parsed.quoted_blocks),
        original_message: raw.clone(),
        quoted_messages: parsed.quoted_messages,
    }
}

/// Normalize every message, in input order.
pub fn normalize_messages(raws: &[RawMessage], ctx: &NormalizationContext) -> Vec<NormalizedMessage> {
    raws.iter().map(|raw| normalize_message(raw, ctx)).collect()
}

/// Parse an address header. `None` when the header is missing or empty.
fn address_list(pairs: &[(String, String)], name: &str) -> Option<Vec<EmailAddress>> {
    let value = header::header_value(pairs, name)?;
    let list = header::parse_address_header(value);
    (!list.is_empty()).then_some(list)
}

/// Phone identity of the sender on phone channels.
fn sender_phone(raw: &RawMessage, pairs: &[(String, String)]) -> Option<String> {
    if !raw.channel.is_phone() {
        return None;
    }
    header::header_value(pairs, "from")
        .filter(|v| looks_like_phone(v))
        .map(|v| v.trim().to_string())
        .or_else(|| {
            raw.customer_phone
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
        })
}

fn classify_author(
    raw: &RawMessage,
    from: &EmailAddress,
    sender_phone: Option<&str>,
    ctx: &NormalizationContext,
) -> AuthorType {
    let email = from.email.as_deref().unwrap_or("");
    let by_email = ctx.is_agent_email(email);
    let by_sender_type = raw
        .sender_type
        .as_deref()
        .is_some_and(|t| t.trim().eq_ignore_ascii_case("agent"));
    let by_phone = sender_phone.is_some_and(|p| ctx.is_agent_phone(p));

    let agent = by_email || by_sender_type || raw.is_internal || by_phone;
    debug!(
        id = %raw.id,
        by_email,
        by_sender_type,
        internal = raw.is_internal,
        by_phone,
        agent,
        "Classified author"
    );
    if agent {
        AuthorType::Agent
    } else {
        AuthorType::Customer
    }
}

fn author_label(
    raw: &RawMessage,
    from: &EmailAddress,
    sender_phone: Option<&str>,
    author_type: AuthorType,
    ctx: &NormalizationContext,
) -> String {
    if author_type == AuthorType::Agent {
        if from.email.as_deref().is_some_and(|e| ctx.is_current_user(e)) {
            return "You".to_string();
        }
        return from
            .name
            .clone()
            .or_else(|| from.email.clone())
            .unwrap_or_else(|| "Agent".to_string());
    }

    from.name
        .clone()
        .or_else(|| from.email.clone())
        .or_else(|| sender_phone.map(str::to_string))
        .or_else(|| {
            raw.conversation
                .as_ref()
                .and_then(|c| c.customer.as_ref())
                .and_then(|c| c.full_name.clone())
                .filter(|n| !n.trim().is_empty())
        })
        .unwrap_or_else(|| "Customer".to_string())
}

fn avatar_initial(from: &EmailAddress) -> String {
    from.name
        .as_deref()
        .and_then(|n| n.trim().chars().next())
        .or_else(|| from.email.as_deref().and_then(|e| e.chars().next()))
        .unwrap_or('A')
        .to_uppercase()
        .collect()
}
