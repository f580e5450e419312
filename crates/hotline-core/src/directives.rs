//! Operator text commands and the reply-threading marker.
//!
//! The operator addresses customers in three ways:
//! - `<stop>_<id>` ends a session,
//! - `<chat>_<id> text` sends `text` to a customer,
//! - replying to a forwarded message whose text carries `Customer <id>`.

use std::sync::OnceLock;

use regex::Regex;

use crate::domain::UserId;

/// Literal tokens the operator types, e.g. `/stop` and `/chat`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectiveTokens {
    pub stop: String,
    pub chat: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DirectiveKind {
    Stop,
    Chat,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Directive {
    Stop(UserId),
    Chat { customer: UserId, body: String },
    /// Recognized prefix but unusable arguments (non-numeric id, missing text).
    Malformed(DirectiveKind),
}

impl DirectiveTokens {
    /// Parse an operator message. `None` means the text is not a directive at all.
    pub fn parse(&self, text: &str) -> Option<Directive> {
        let text = text.trim();

        if let Some(rest) = strip_token(text, &self.stop) {
            let id = rest.split_whitespace().next().and_then(parse_id);
            return Some(match id {
                Some(id) => Directive::Stop(id),
                None => Directive::Malformed(DirectiveKind::Stop),
            });
        }

        if let Some(rest) = strip_token(text, &self.chat) {
            let (head, body) = rest
                .split_once(char::is_whitespace)
                .unwrap_or((rest, ""));
            let body = body.trim();
            return Some(match parse_id(head) {
                Some(customer) if !body.is_empty() => Directive::Chat {
                    customer,
                    body: body.to_string(),
                },
                _ => Directive::Malformed(DirectiveKind::Chat),
            });
        }

        None
    }

    pub fn stop_for(&self, customer: UserId) -> String {
        format!("{}_{}", self.stop, customer)
    }

    pub fn chat_for(&self, customer: UserId) -> String {
        format!("{}_{}", self.chat, customer)
    }

    /// Example invocation shown to the operator after a malformed directive.
    pub fn usage(&self, kind: DirectiveKind) -> String {
        match kind {
            DirectiveKind::Stop => format!("{}_123456789", self.stop),
            DirectiveKind::Chat => format!("{}_123456789 message text", self.chat),
        }
    }
}

fn strip_token<'a>(text: &'a str, token: &str) -> Option<&'a str> {
    text.strip_prefix(token)?.strip_prefix('_')
}

/// Accepts `123` and `123@botname` (Telegram appends the bot name in groups).
fn parse_id(raw: &str) -> Option<UserId> {
    raw.split('@')
        .next()
        .and_then(|s| s.parse::<i64>().ok())
        .map(UserId)
}

/// The marker every forwarded customer message starts with.
pub fn customer_marker(customer: UserId) -> String {
    format!("Customer {customer}")
}

fn marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Customer (-?\d+)").expect("valid regex"))
}

/// Recover the customer id from the text of a message the operator replied to.
///
/// Only the first marker counts; forwarded bodies may quote other ids later on.
pub fn extract_customer_marker(text: &str) -> Option<UserId> {
    let caps = marker_re().captures(text)?;
    caps.get(1)?.as_str().parse::<i64>().ok().map(UserId)
}
