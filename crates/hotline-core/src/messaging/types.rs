use crate::domain::{ChatId, Customer, MessageRef, UserId};

/// Platform-neutral incoming update.
///
/// Telegram-specific fields stay in the Telegram adapter.
#[derive(Clone, Debug)]
pub enum IncomingUpdate {
    Message(IncomingMessage),
    Callback(CallbackQuery),
}

#[derive(Clone, Debug)]
pub struct IncomingMessage {
    pub chat_id: ChatId,
    pub sender: Customer,
    pub payload: Payload,
    /// Text (or caption) of the message this one replies to.
    pub reply_to_text: Option<String>,
}

impl IncomingMessage {
    pub fn text(&self) -> Option<&str> {
        match &self.payload {
            Payload::Text(t) => Some(t.as_str()),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Photo {
        file_id: String,
        caption: Option<String>,
    },
    Document {
        file_id: String,
        caption: Option<String>,
    },
    Contact {
        phone_number: String,
        first_name: String,
    },
    /// Stickers, voice, locations and everything else we do not relay.
    Unsupported,
}

#[derive(Clone, Debug)]
pub struct CallbackQuery {
    pub callback_id: String,
    pub user_id: UserId,
    pub data: String,
    /// The message carrying the inline keyboard, when Telegram still has it.
    pub message: Option<MessageRef>,
}

/// Inline keyboard attached to a message (buttons resolve to callback queries).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineKeyboard {
    pub rows: Vec<Vec<InlineButton>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineButton {
    pub label: String,
    pub callback_data: String,
}

impl InlineKeyboard {
    /// Convenience for a single row of buttons.
    pub fn single_row(buttons: Vec<InlineButton>) -> Self {
        Self {
            rows: vec![buttons],
        }
    }
}

/// Persistent reply keyboard shown under the input field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplyKeyboard {
    pub rows: Vec<Vec<ReplyButton>>,
    pub placeholder: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplyButton {
    pub label: String,
    /// Ask the client to share the user's phone number when pressed.
    pub request_contact: bool,
}

impl ReplyButton {
    pub fn text(label: &str) -> Self {
        Self {
            label: label.to_string(),
            request_contact: false,
        }
    }

    pub fn contact(label: &str) -> Self {
        Self {
            label: label.to_string(),
            request_contact: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Keyboard {
    Reply(ReplyKeyboard),
    Inline(InlineKeyboard),
}

/// Size limits of a messenger implementation, in UTF-16 code units.
#[derive(Clone, Copy, Debug)]
pub struct MessagingCapabilities {
    pub max_message_len: usize,
    pub max_caption_len: usize,
}
