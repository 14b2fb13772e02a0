//! Token markup: the only form in which a token is persisted in a document.
//!
//! # Responsibility
//! - Build escaped token markup for the insertion path.
//! - Parse inserted fragments into typed text/token pieces.
//!
//! # Invariants
//! - Attribute values and labels are always HTML-escaped on the way out, so
//!   template text can never inject markup.
//! - Only plain text and token spans are accepted on the way in.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Class understood by the engine as "non-editable atomic unit".
pub const NON_EDITABLE_CLASS: &str = "mceNonEditable";
/// Attribute carrying the bound template id.
pub const TEMPLATE_ID_ATTR: &str = "data-template-id";
/// Validity rule registered through the document's init hook.
pub const TOKEN_ELEMENT_RULE: &str = "span[class|data-template-id|contenteditable]";

static TOKEN_SPAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<span\b([^<>]*)>(.*?)</span\s*>").expect("token span regex is valid")
});
static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([A-Za-z][A-Za-z0-9_:-]*)\s*=\s*"([^"]*)""#).expect("attribute regex is valid")
});
static TAG_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^</?([A-Za-z][A-Za-z0-9]*)").expect("tag name regex is valid"));

/// Markup parse and insertion errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupError {
    /// A tag other than a token span was found.
    UnsupportedElement(String),
    /// A span without the template id attribute.
    MissingTemplateId,
    /// `<` that does not start a recognisable tag.
    Malformed(usize),
    /// Token markup inserted before the token rule was registered.
    UnregisteredElement(String),
    /// Insertion requested without a caret.
    NoCaret,
}

impl Display for MarkupError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedElement(tag) => write!(f, "unsupported element in markup: <{tag}>"),
            Self::MissingTemplateId => {
                write!(f, "token span is missing `{TEMPLATE_ID_ATTR}` attribute")
            }
            Self::Malformed(position) => write!(f, "malformed markup at byte {position}"),
            Self::UnregisteredElement(rule) => {
                write!(f, "element rule not registered: {rule}")
            }
            Self::NoCaret => write!(f, "document has no caret to insert at"),
        }
    }
}

impl Error for MarkupError {}

/// One parsed piece of an inserted fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentNode {
    Text(String),
    Token { bound_id: String, label: String },
}

impl FragmentNode {
    pub fn is_token(&self) -> bool {
        matches!(self, Self::Token { .. })
    }
}

/// Escapes text for use in element content or a double-quoted attribute.
pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Decodes the entities produced by `escape_html` plus `&nbsp;`.
///
/// Unknown entities are kept verbatim.
pub fn unescape_html(value: &str) -> String {
    let mut decoded = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find('&') {
        decoded.push_str(&rest[..start]);
        let tail = &rest[start..];
        let Some(end) = tail.find(';') else {
            decoded.push_str(tail);
            return decoded;
        };
        let entity = &tail[1..end];
        let replacement = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "#39" | "#x27" | "apos" => Some('\''),
            "nbsp" => Some('\u{a0}'),
            _ => None,
        };
        match replacement {
            Some(c) => decoded.push(c),
            None => decoded.push_str(&tail[..=end]),
        }
        rest = &tail[end + 1..];
    }
    decoded.push_str(rest);
    decoded
}

/// Builds token markup with escaped id and label.
pub fn token_markup(bound_id: &str, label: &str, token_class: &str) -> String {
    format!(
        r#"<span class="{} {NON_EDITABLE_CLASS}" contenteditable="false" {TEMPLATE_ID_ATTR}="{}">{}</span>"#,
        escape_html(token_class),
        escape_html(bound_id),
        escape_html(label),
    )
}

/// Parses a fragment into text runs and token spans.
///
/// Whitespace-only text between pieces is dropped; token labels are trimmed.
pub fn parse_markup(input: &str) -> Result<Vec<FragmentNode>, MarkupError> {
    let mut nodes = Vec::new();
    let mut cursor = 0;

    for captures in TOKEN_SPAN.captures_iter(input) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        push_text(&mut nodes, input, cursor, whole.start())?;

        let attrs = captures.get(1).map_or("", |m| m.as_str());
        let bound_id = ATTRIBUTE
            .captures_iter(attrs)
            .find(|attr| attr.get(1).is_some_and(|name| name.as_str() == TEMPLATE_ID_ATTR))
            .and_then(|attr| attr.get(2))
            .map(|value| unescape_html(value.as_str()))
            .ok_or(MarkupError::MissingTemplateId)?;

        let inner = captures.get(2).map_or("", |m| m.as_str());
        let inner_offset = captures.get(2).map_or(whole.start(), |m| m.start());
        reject_tags(inner, inner_offset)?;

        nodes.push(FragmentNode::Token {
            bound_id,
            label: unescape_html(inner).trim().to_string(),
        });
        cursor = whole.end();
    }
    push_text(&mut nodes, input, cursor, input.len())?;

    Ok(nodes)
}

fn push_text(
    nodes: &mut Vec<FragmentNode>,
    input: &str,
    start: usize,
    end: usize,
) -> Result<(), MarkupError> {
    let segment = &input[start..end];
    reject_tags(segment, start)?;
    if segment.trim().is_empty() {
        return Ok(());
    }
    nodes.push(FragmentNode::Text(unescape_html(segment)));
    Ok(())
}

fn reject_tags(segment: &str, base_offset: usize) -> Result<(), MarkupError> {
    let Some(position) = segment.find('<') else {
        return Ok(());
    };
    match TAG_NAME.captures(&segment[position..]) {
        Some(captures) => {
            let tag = captures.get(1).map_or("", |m| m.as_str());
            Err(MarkupError::UnsupportedElement(tag.to_ascii_lowercase()))
        }
        None => Err(MarkupError::Malformed(base_offset + position)),
    }
}
