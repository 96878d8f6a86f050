//! Quote splitting for HTML bodies.
//!
//! Known quote containers are removed from the DOM first, origin by origin.
//! What remains is rendered to text and scanned for a localized quote header;
//! the DOM is cut at the first one found.

use kuchiki::iter::NodeEdge;
use kuchiki::traits::*;
use kuchiki::NodeRef;
use tracing::debug;

use crate::model::quote::{QuoteKind, QuotedBlock, QuotedMessage};
use crate::parser::attribution::{self, Attribution};
use crate::parser::patterns::{self, QUOTE_ORIGINS};
use crate::parser::quote::ParsedEmail;
use crate::parser::quote_text;

/// Parse an HTML body and split off quoted history.
pub fn parse_html(content: &str) -> ParsedEmail {
    let document = kuchiki::parse_html().one(content);
    let body = body_of(&document);

    let mut quoted_blocks = Vec::new();
    let mut quoted_messages = Vec::new();

    for origin in QUOTE_ORIGINS {
        let outlook = origin.kind == QuoteKind::Outlook;
        let selected = select_nodes(&document, origin.selectors);
        let candidates: Vec<NodeRef> = document
            .descendants()
            .filter(|n| selected.contains(n) || (outlook && is_outlook_border_div(n)))
            .collect();

        for node in candidates {
            // Nested inside a container removed earlier.
            if !is_attached(&node, &document) {
                continue;
            }

            let removed = if outlook {
                let anchor = outlook_anchor(&node, &body);
                let mut nodes = vec![anchor.clone()];
                nodes.extend(anchor.following_siblings());
                if let Some(message) = outlook_message(&nodes) {
                    quoted_messages.push(message);
                }
                nodes
            } else {
                if let Some(message) = container_message(&node) {
                    quoted_messages.push(message);
                }
                vec![node]
            };

            quoted_blocks.push(QuotedBlock {
                kind: origin.kind,
                raw: serialize_nodes(&removed),
            });
            for n in &removed {
                n.detach();
            }
        }
    }

    debug!(
        containers = quoted_blocks.len(),
        "HTML quote containers removed"
    );

    if let Some((raw, message)) = truncate_at_quote_header(&body) {
        quoted_blocks.push(QuotedBlock {
            kind: QuoteKind::Header,
            raw,
        });
        if let Some(message) = message {
            quoted_messages.push(message);
        }
    }

    ParsedEmail {
        visible_content: inner_html(&body).trim().to_string(),
        quoted_blocks,
        quoted_messages,
        is_html: true,
    }
}

// ── DOM helpers ─────────────────────────────────────────────────────

fn body_of(document: &NodeRef) -> NodeRef {
    document
        .select_first("body")
        .map(|b| b.as_node().clone())
        .unwrap_or_else(|_| document.clone())
}

fn select_nodes(root: &NodeRef, selectors: &str) -> Vec<NodeRef> {
    match root.select(selectors) {
        Ok(matches) => matches.map(|m| m.as_node().clone()).collect(),
        Err(()) => Vec::new(),
    }
}

fn is_attached(node: &NodeRef, document: &NodeRef) -> bool {
    node.ancestors().any(|a| a == *document)
}

fn is_outlook_border_div(node: &NodeRef) -> bool {
    let Some(element) = node.as_element() else {
        return false;
    };
    if element.name.local.as_ref() != "div" {
        return false;
    }
    let attributes = element.attributes.borrow();
    attributes
        .get("style")
        .is_some_and(patterns::is_outlook_border_style)
}

fn is_blank(node: &NodeRef) -> bool {
    if node.as_comment().is_some() {
        return true;
    }
    node.as_text()
        .is_some_and(|t| t.borrow().trim().is_empty())
}

/// Blank text, `br`, or an element with no text and no image.
fn is_filler(node: &NodeRef) -> bool {
    if is_blank(node) {
        return true;
    }
    match node.as_element() {
        Some(element) => {
            let tag = element.name.local.as_ref();
            tag == "br"
                || (tag != "img"
                    && node.text_contents().trim().is_empty()
                    && node.select_first("img").is_err())
        }
        None => false,
    }
}

/// Outlook wraps its header block in one or more otherwise empty divs.
/// Climb to the outermost such wrapper below `body`.
fn outlook_anchor(node: &NodeRef, body: &NodeRef) -> NodeRef {
    let mut current = node.clone();
    while let Some(parent) = current.parent() {
        if parent == *body || parent.as_document().is_some() {
            break;
        }
        let only_child = parent.children().all(|c| c == current || is_blank(&c));
        if !only_child {
            break;
        }
        current = parent;
    }
    current
}

fn inner_html(node: &NodeRef) -> String {
    node.children().map(|c| c.to_string()).collect()
}

fn serialize_nodes(nodes: &[NodeRef]) -> String {
    nodes.iter().map(|n| n.to_string()).collect()
}

fn unwrap_node(node: &NodeRef) {
    if node.parent().is_none() {
        return;
    }
    let children: Vec<NodeRef> = node.children().collect();
    for child in children {
        node.insert_before(child);
    }
    node.detach();
}

/// Parse a fragment and return its `body`.
fn parse_fragment(html: &str) -> NodeRef {
    body_of(&kuchiki::parse_html().one(html))
}

/// Remove every quote container below `root`.
fn remove_quote_containers(root: &NodeRef) {
    for origin in QUOTE_ORIGINS {
        for node in select_nodes(root, origin.selectors) {
            node.detach();
        }
    }
    let borders: Vec<NodeRef> = root
        .descendants()
        .filter(is_outlook_border_div)
        .collect();
    for node in borders {
        let tail: Vec<NodeRef> = node.following_siblings().collect();
        node.detach();
        for t in tail {
            t.detach();
        }
    }
}

// ── Text rendering ──────────────────────────────────────────────────

/// A rendered text node and where its text starts in the rendering.
struct TextSegment {
    node: NodeRef,
    start: usize,
    len: usize,
    /// Text copied without whitespace collapsing (inside `pre`).
    verbatim: bool,
}

fn is_block_tag(tag: &str) -> bool {
    matches!(
        tag,
        "address"
            | "article"
            | "aside"
            | "blockquote"
            | "center"
            | "dd"
            | "div"
            | "dl"
            | "dt"
            | "fieldset"
            | "figure"
            | "footer"
            | "form"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "header"
            | "hr"
            | "li"
            | "main"
            | "nav"
            | "ol"
            | "p"
            | "pre"
            | "section"
            | "table"
            | "tr"
            | "ul"
    )
}

fn is_hidden_tag(tag: &str) -> bool {
    matches!(
        tag,
        "head" | "script" | "style" | "title" | "meta" | "noscript" | "template"
    )
}

fn break_line(out: &mut String) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

/// Render a subtree roughly the way `innerText` does.
fn render_with_segments(root: &NodeRef) -> (String, Vec<TextSegment>) {
    let mut out = String::new();
    let mut segments = Vec::new();
    let mut hidden: Option<NodeRef> = None;
    let mut pre_depth = 0usize;

    for edge in root.traverse() {
        match edge {
            NodeEdge::Start(node) => {
                if hidden.is_some() {
                    continue;
                }
                if let Some(element) = node.as_element() {
                    let tag = element.name.local.as_ref();
                    if is_hidden_tag(tag) {
                        hidden = Some(node.clone());
                    } else if tag == "br" {
                        out.push('\n');
                    } else if is_block_tag(tag) {
                        break_line(&mut out);
                        if tag == "pre" {
                            pre_depth += 1;
                        }
                    }
                } else if let Some(text) = node.as_text() {
                    let text = text.borrow();
                    let piece = if pre_depth > 0 {
                        text.clone()
                    } else {
                        collapse_whitespace(&text, out.is_empty() || out.ends_with([' ', '\n']))
                    };
                    if !piece.is_empty() {
                        segments.push(TextSegment {
                            node: node.clone(),
                            start: out.len(),
                            len: piece.len(),
                            verbatim: pre_depth > 0,
                        });
                        out.push_str(&piece);
                    }
                }
            }
            NodeEdge::End(node) => {
                if let Some(h) = &hidden {
                    if *h == node {
                        hidden = None;
                    }
                    continue;
                }
                if let Some(element) = node.as_element() {
                    let tag = element.name.local.as_ref();
                    if is_block_tag(tag) {
                        break_line(&mut out);
                        if tag == "pre" {
                            pre_depth = pre_depth.saturating_sub(1);
                        }
                    } else if matches!(tag, "td" | "th") {
                        out.push(' ');
                    }
                }
            }
        }
    }

    (out, segments)
}

fn collapse_whitespace(text: &str, at_line_start: bool) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for ch in text.chars() {
        if ch.is_whitespace() && ch != '\u{a0}' {
            pending_space = true;
            continue;
        }
        if pending_space && !(out.is_empty() && at_line_start) {
            out.push(' ');
        }
        pending_space = false;
        out.push(ch);
    }
    if pending_space && !(out.is_empty() && at_line_start) {
        out.push(' ');
    }
    out
}

/// Plain-text rendering of a subtree, lines trimmed.
fn render_text(root: &NodeRef) -> String {
    let (text, _) = render_with_segments(root);
    tidy_text(&text)
}

fn tidy_text(text: &str) -> String {
    text.replace('\u{a0}', " ")
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

// ── Quoted message recovery ─────────────────────────────────────────

/// Where a container's attribution was found.
enum AttributionSource {
    GmailAttr,
    /// The first `n` rendered lines of the container.
    Leading(Vec<String>),
    /// Text just before the container; nothing to strip.
    Preceding,
}

fn container_message(container: &NodeRef) -> Option<QuotedMessage> {
    let (attribution, source) = container_attribution(container)?;

    let body = parse_fragment(&inner_html(container));
    match &source {
        AttributionSource::GmailAttr => {
            for node in select_nodes(&body, ".gmail_attr") {
                node.detach();
            }
        }
        AttributionSource::Leading(lines) => strip_leading_text(&body, lines),
        AttributionSource::Preceding => {}
    }
    unwrap_lone_blockquote(&body);
    remove_quote_containers(&body);

    Some(quoted_message(attribution, &body))
}

fn container_attribution(container: &NodeRef) -> Option<(Attribution, AttributionSource)> {
    if let Ok(attr) = container.select_first(".gmail_attr") {
        let line = collapse_whitespace(&attr.as_node().text_contents(), true);
        if let Some(attribution) = attribution::parse_wrote_line(&line) {
            return Some((attribution, AttributionSource::GmailAttr));
        }
    }

    let text = render_text(container);
    let lines: Vec<&str> = text.lines().collect();
    if let Some((attribution, used)) = attribution::find_attribution(&lines) {
        let leading = lines[..used].iter().map(|l| l.to_string()).collect();
        return Some((attribution, AttributionSource::Leading(leading)));
    }

    let mut previous = container.previous_sibling();
    while let Some(node) = previous.as_ref().filter(|n| is_blank(n)) {
        previous = node.previous_sibling();
    }
    let previous = previous?;
    let previous_text = render_text(&previous);
    let last_line = previous_text.lines().rev().find(|l| !l.trim().is_empty())?;
    attribution::parse_wrote_line(last_line).map(|a| (a, AttributionSource::Preceding))
}

/// Detach the leading text nodes that spell out `lines`.
fn strip_leading_text(body: &NodeRef, lines: &[String]) {
    let mut target: String = lines
        .concat()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let text_nodes: Vec<NodeRef> = body
        .descendants()
        .filter(|n| n.as_text().is_some() && !is_blank(n))
        .collect();

    for node in text_nodes {
        if target.is_empty() {
            break;
        }
        let compact: String = node
            .text_contents()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        match target.strip_prefix(compact.as_str()) {
            Some(rest) => {
                target = rest.to_string();
                node.detach();
            }
            None => break,
        }
    }
}

/// Gmail nests the quoted body in one more blockquote; lift its children.
fn unwrap_lone_blockquote(body: &NodeRef) {
    let content: Vec<NodeRef> = body.children().filter(|c| !is_filler(c)).collect();
    if let [only] = content.as_slice() {
        let is_blockquote = only
            .as_element()
            .is_some_and(|e| e.name.local.as_ref() == "blockquote");
        if is_blockquote {
            unwrap_node(only);
        }
    }
}

fn quoted_message(attribution: Attribution, body: &NodeRef) -> QuotedMessage {
    let html = inner_html(body).trim().to_string();
    QuotedMessage {
        from: attribution.from,
        sent_at: attribution.sent_at,
        subject: attribution.subject,
        html: (!html.is_empty()).then_some(html),
        text: render_text(body),
    }
}

/// Outlook prints the original headers as a field block; the body is
/// whatever follows the node carrying the `From:` line.
fn outlook_message(nodes: &[NodeRef]) -> Option<QuotedMessage> {
    let rendered: Vec<String> = nodes.iter().map(render_text).collect();
    let joined = rendered.join("\n");
    let lines: Vec<&str> = joined.lines().collect();
    let (attribution, _) = attribution::find_attribution(&lines)?;

    let header_at = rendered
        .iter()
        .position(|text| text.lines().any(patterns::is_field_from_line))?;
    let body_html = serialize_nodes(&nodes[header_at + 1..]);
    let body = parse_fragment(&body_html);
    remove_quote_containers(&body);

    Some(quoted_message(attribution, &body))
}

// ── Header truncation ───────────────────────────────────────────────

/// Cut the DOM at the first quote-header line of the rendered text.
///
/// Returns the removed markup and the message recovered from it, if the
/// header names a sender and a body follows.
fn truncate_at_quote_header(body: &NodeRef) -> Option<(String, Option<QuotedMessage>)> {
    let (text, segments) = render_with_segments(body);
    let lines: Vec<&str> = text.split('\n').collect();

    let hit = (0..lines.len()).find(|&i| patterns::quote_header_at(&lines, i))?;
    let line_start: usize = lines[..hit].iter().map(|l| l.len() + 1).sum();

    let segment = segments
        .iter()
        .find(|s| s.start + s.len > line_start)?;
    let start = if segment.start >= line_start || !segment.verbatim {
        segment.node.clone()
    } else {
        split_text_node(&segment.node, line_start - segment.start)?
    };

    debug!(line = hit, "Quote header found in HTML body");

    // Cut at the outermost element that begins with the header line.
    let mut start = start;
    while let Some(parent) = start.parent() {
        if parent == *body || !is_first_content(&start) {
            break;
        }
        start = parent;
    }

    let mut tail = vec![start.clone()];
    tail.extend(start.following_siblings());
    for ancestor in start.ancestors() {
        if ancestor == *body {
            break;
        }
        tail.extend(ancestor.following_siblings());
    }

    let raw = serialize_nodes(&tail);
    for node in &tail {
        node.detach();
    }

    let message = quote_text::quoted_message_from_lines(&lines[hit..])
        .filter(|m| !m.text.is_empty());
    Some((raw, message))
}

fn is_first_content(node: &NodeRef) -> bool {
    let mut previous = node.previous_sibling();
    while let Some(p) = previous {
        if !is_blank(&p) {
            return false;
        }
        previous = p.previous_sibling();
    }
    true
}

/// Split a text node at byte `at`; returns the new node holding the tail.
fn split_text_node(node: &NodeRef, at: usize) -> Option<NodeRef> {
    let text = node.as_text()?;
    let tail = {
        let mut content = text.borrow_mut();
        if !content.is_char_boundary(at) {
            return None;
        }
        content.split_off(at)
    };
    let tail_node = NodeRef::new_text(tail);
    node.insert_after(tail_node.clone());
    Some(tail_node)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gmail_container_and_message() {
        let html = concat!(
            r#"<div dir="ltr">Works now, thanks</div>"#,
            r#"<div class="gmail_quote"><div dir="ltr" class="gmail_attr">On Mon, Jan 1, 2024 at 10:30 AM Jane Doe &lt;jane@co.com&gt; wrote:<br></div>"#,
            r#"<blockquote class="gmail_quote"><div>It is broken</div>"#,
            r#"<div class="gmail_quote"><div class="gmail_attr">On Sun, Dec 31, 2023 at 9:00 AM Bob &lt;bob@co.com&gt; wrote:</div><blockquote>Older</blockquote></div>"#,
            r#"</blockquote></div>"#
        );
        let parsed = parse_html(html);
        assert_eq!(parsed.visible_content, r#"<div dir="ltr">Works now, thanks</div>"#);
        assert_eq!(parsed.quoted_blocks.len(), 1);
        assert_eq!(parsed.quoted_blocks[0].kind, QuoteKind::Gmail);
        assert!(parsed.quoted_blocks[0].raw.contains("Older"));

        assert_eq!(parsed.quoted_messages.len(), 1);
        let quoted = &parsed.quoted_messages[0];
        assert_eq!(quoted.from.email.as_deref(), Some("jane@co.com"));
        assert_eq!(quoted.text, "It is broken");
        let html = quoted.html.as_deref().unwrap();
        assert!(html.contains("It is broken"));
        assert!(!html.contains("Older"));
        assert!(!html.contains("gmail_attr"));
    }

    #[test]
    fn test_outlook_header_swallows_siblings() {
        let html = concat!(
            "<div>Reply text</div>",
            r#"<div id="appendonsend"></div><hr>"#,
            r#"<div id="divRplyFwdMsg"><b>From:</b> Jane &lt;jane@co.com&gt;<br><b>Sent:</b> Monday, January 1, 2024 2:15 PM<br><b>Subject:</b> Invoice</div>"#,
            "<div>Original body</div>"
        );
        let parsed = parse_html(html);
        assert_eq!(parsed.visible_content, "<div>Reply text</div>");
        assert_eq!(parsed.quoted_blocks.len(), 1);
        assert_eq!(parsed.quoted_blocks[0].kind, QuoteKind::Outlook);

        let quoted = &parsed.quoted_messages[0];
        assert_eq!(quoted.from.email.as_deref(), Some("jane@co.com"));
        assert_eq!(quoted.subject.as_deref(), Some("Invoice"));
        assert_eq!(quoted.text, "Original body");
    }

    #[test]
    fn test_outlook_border_div() {
        let html = concat!(
            "<p>See below</p>",
            r#"<div><div style="border:none;border-top:solid #E1E1E1 1.0pt;padding:3.0pt 0cm 0cm 0cm"><p><b>From:</b> Jane &lt;jane@co.com&gt;</p><p><b>Sent:</b> Monday, January 1, 2024 2:15 PM</p></div></div>"#,
            "<p>Quoted text</p>"
        );
        let parsed = parse_html(html);
        assert_eq!(parsed.visible_content, "<p>See below</p>");
        assert_eq!(parsed.quoted_blocks[0].kind, QuoteKind::Outlook);
        assert_eq!(parsed.quoted_messages[0].text, "Quoted text");
    }

    #[test]
    fn test_apple_attribution_from_preceding_line() {
        let html = concat!(
            "<div>Got it</div>",
            "<div>On Jan 1, 2024, at 10:00, Jane &lt;jane@co.com&gt; wrote:</div>",
            r#"<blockquote type="cite"><div>Question</div></blockquote>"#
        );
        let parsed = parse_html(html);
        assert_eq!(parsed.visible_content, "<div>Got it</div>");
        let kinds: Vec<QuoteKind> = parsed.quoted_blocks.iter().map(|b| b.kind).collect();
        assert_eq!(kinds, vec![QuoteKind::Apple, QuoteKind::Header]);
        // The leftover attribution line carries no body of its own.
        assert_eq!(parsed.quoted_messages.len(), 1);
        assert_eq!(parsed.quoted_messages[0].from.email.as_deref(), Some("jane@co.com"));
        assert_eq!(parsed.quoted_messages[0].text, "Question");
    }

    #[test]
    fn test_yahoo_container_and_message() {
        let html = concat!(
            "<div>Sounds good</div>",
            r#"<div id="yahoo_quoted_5512" class="yahoo_quoted">"#,
            "<div>On Mon, Jan 1, 2024 at 10:00 AM Jane Doe &lt;jane@co.com&gt; wrote:</div>",
            "<div>Can we meet?</div>",
            "<blockquote>Older</blockquote>",
            "</div>"
        );
        let parsed = parse_html(html);
        assert_eq!(parsed.visible_content, "<div>Sounds good</div>");
        assert_eq!(parsed.quoted_blocks.len(), 1);
        assert_eq!(parsed.quoted_blocks[0].kind, QuoteKind::Yahoo);
        assert!(parsed.quoted_blocks[0].raw.contains("yahoo_quoted_5512"));

        assert_eq!(parsed.quoted_messages.len(), 1);
        let quoted = &parsed.quoted_messages[0];
        assert_eq!(quoted.from.name.as_deref(), Some("Jane Doe"));
        assert_eq!(quoted.from.email.as_deref(), Some("jane@co.com"));
        assert_eq!(
            quoted.sent_at.map(|d| d.format("%Y-%m-%d %H:%M").to_string()),
            Some("2024-01-01 10:00".to_string())
        );
        assert_eq!(quoted.text, "Can we meet?");
        assert!(!quoted.html.as_deref().unwrap().contains("wrote:"));
    }

    #[test]
    fn test_yahoo_container_by_id_prefix() {
        let html = r#"<p>Yes</p><div id="yahoo_quoted_77"><div>Old text</div></div>"#;
        let parsed = parse_html(html);
        assert_eq!(parsed.visible_content, "<p>Yes</p>");
        assert_eq!(parsed.quoted_blocks.len(), 1);
        assert_eq!(parsed.quoted_blocks[0].kind, QuoteKind::Yahoo);
        // No attribution inside or before the container.
        assert!(parsed.quoted_messages.is_empty());
    }

    #[test]
    fn test_plain_blockquote_and_message() {
        let html = concat!(
            "<p>Sure</p>",
            "<blockquote><p>On Mon, Jan 1, 2024 at 9:00 AM Bob &lt;bob@co.com&gt; wrote:</p><p>Original</p></blockquote>"
        );
        let parsed = parse_html(html);
        assert_eq!(parsed.visible_content, "<p>Sure</p>");
        let kinds: Vec<QuoteKind> = parsed.quoted_blocks.iter().map(|b| b.kind).collect();
        assert_eq!(kinds, vec![QuoteKind::Blockquote]);

        let quoted = &parsed.quoted_messages[0];
        assert_eq!(quoted.from.email.as_deref(), Some("bob@co.com"));
        assert_eq!(quoted.text, "Original");
    }

    #[test]
    fn test_header_line_truncates_dom() {
        let html = "<p>Thanks!</p><p>On Mon, Jan 1, 2024, Jane &lt;jane@co.com&gt; wrote:</p><p>&gt; Original question</p>";
        let parsed = parse_html(html);
        assert_eq!(parsed.visible_content, "<p>Thanks!</p>");
        assert_eq!(parsed.quoted_blocks.len(), 1);
        assert_eq!(parsed.quoted_blocks[0].kind, QuoteKind::Header);
        assert_eq!(parsed.quoted_messages[0].text, "Original question");
    }

    #[test]
    fn test_header_line_inside_pre_splits_text() {
        let html = "<pre>Thanks!\nOn Jan 1, 2024, Jane &lt;jane@co.com&gt; wrote:\n&gt; old</pre>";
        let parsed = parse_html(html);
        assert_eq!(parsed.visible_content, "<pre>Thanks!\n</pre>");
        assert_eq!(parsed.quoted_blocks[0].kind, QuoteKind::Header);
    }

    #[test]
    fn test_no_quotes_leaves_body() {
        let parsed = parse_html("<p>Hello <b>there</b></p>");
        assert_eq!(parsed.visible_content, "<p>Hello <b>there</b></p>");
        assert!(parsed.quoted_blocks.is_empty());
        assert!(parsed.quoted_messages.is_empty());
    }

    #[test]
    fn test_render_text() {
        let body = parse_fragment("<div>One<br>Two</div><p>  Three\n  four </p><style>x{}</style>");
        assert_eq!(render_text(&body), "One\nTwo\nThree four");
    }
}
