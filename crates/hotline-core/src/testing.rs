//! In-memory messenger shared by the unit tests.

use std::{collections::HashSet, sync::Mutex};

use async_trait::async_trait;

use crate::{
    domain::{ChatId, Customer, MessageId, MessageRef, UserId},
    messaging::{
        port::MessagingPort,
        types::{IncomingMessage, Keyboard, MessagingCapabilities, Payload},
    },
    Error, Result,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Sent {
    Html {
        chat_id: ChatId,
        html: String,
        keyboard: Option<Keyboard>,
    },
    Photo {
        chat_id: ChatId,
        file_id: String,
        caption: String,
    },
    Document {
        chat_id: ChatId,
        file_id: String,
        caption: String,
    },
}

impl Sent {
    pub fn chat_id(&self) -> ChatId {
        match self {
            Sent::Html { chat_id, .. }
            | Sent::Photo { chat_id, .. }
            | Sent::Document { chat_id, .. } => *chat_id,
        }
    }
}

#[derive(Default)]
pub struct FakeMessenger {
    next_id: Mutex<i32>,
    sent: Mutex<Vec<Sent>>,
    edits: Mutex<Vec<(MessageRef, String)>>,
    answers: Mutex<Vec<(String, Option<String>)>>,
    failing: Mutex<HashSet<i64>>,
}

impl FakeMessenger {
    /// Every send to `chat_id` fails like a blocked bot until `restore_chat`.
    pub fn fail_chat(&self, chat_id: ChatId) {
        self.failing.lock().unwrap().insert(chat_id.0);
    }

    pub fn restore_chat(&self, chat_id: ChatId) {
        self.failing.lock().unwrap().remove(&chat_id.0);
    }

    pub fn sent_to(&self, chat_id: ChatId) -> Vec<Sent> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.chat_id() == chat_id)
            .cloned()
            .collect()
    }

    pub fn texts_to(&self, chat_id: ChatId) -> Vec<String> {
        self.sent_to(chat_id)
            .into_iter()
            .filter_map(|s| match s {
                Sent::Html { html, .. } => Some(html),
                _ => None,
            })
            .collect()
    }

    pub fn last_text_to(&self, chat_id: ChatId) -> Option<String> {
        self.texts_to(chat_id).pop()
    }

    pub fn last_keyboard_to(&self, chat_id: ChatId) -> Option<Keyboard> {
        self.sent_to(chat_id).into_iter().rev().find_map(|s| match s {
            Sent::Html { keyboard, .. } => keyboard,
            _ => None,
        })
    }

    pub fn edits(&self) -> Vec<(MessageRef, String)> {
        self.edits.lock().unwrap().clone()
    }

    pub fn callback_answers(&self) -> Vec<(String, Option<String>)> {
        self.answers.lock().unwrap().clone()
    }

    fn check(&self, chat_id: ChatId) -> Result<()> {
        if self.failing.lock().unwrap().contains(&chat_id.0) {
            return Err(Error::Transport(
                "Forbidden: bot was blocked by the user".to_string(),
            ));
        }
        Ok(())
    }

    fn record(&self, sent: Sent) -> MessageRef {
        let chat_id = sent.chat_id();
        self.sent.lock().unwrap().push(sent);
        let mut guard = self.next_id.lock().unwrap();
        *guard += 1;
        MessageRef {
            chat_id,
            message_id: MessageId(*guard),
        }
    }
}

#[async_trait]
impl MessagingPort for FakeMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            max_message_len: 4096,
            max_caption_len: 1024,
        }
    }

    async fn send_html(
        &self,
        chat_id: ChatId,
        html: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<MessageRef> {
        self.check(chat_id)?;
        Ok(self.record(Sent::Html {
            chat_id,
            html: html.to_string(),
            keyboard,
        }))
    }

    async fn send_photo(
        &self,
        chat_id: ChatId,
        file_id: &str,
        caption_html: &str,
    ) -> Result<MessageRef> {
        self.check(chat_id)?;
        Ok(self.record(Sent::Photo {
            chat_id,
            file_id: file_id.to_string(),
            caption: caption_html.to_string(),
        }))
    }

    async fn send_document(
        &self,
        chat_id: ChatId,
        file_id: &str,
        caption_html: &str,
    ) -> Result<MessageRef> {
        self.check(chat_id)?;
        Ok(self.record(Sent::Document {
            chat_id,
            file_id: file_id.to_string(),
            caption: caption_html.to_string(),
        }))
    }

    async fn edit_html(&self, msg: MessageRef, html: &str) -> Result<()> {
        self.check(msg.chat_id)?;
        self.edits.lock().unwrap().push((msg, html.to_string()));
        Ok(())
    }

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.answers
            .lock()
            .unwrap()
            .push((callback_id.to_string(), text.map(|t| t.to_string())));
        Ok(())
    }
}

pub fn customer(id: i64) -> Customer {
    Customer {
        id: UserId(id),
        full_name: format!("Customer Name {id}"),
        username: Some(format!("user{id}")),
    }
}

pub fn message_from(sender: Customer, payload: Payload) -> IncomingMessage {
    IncomingMessage {
        chat_id: sender.id.chat(),
        sender,
        payload,
        reply_to_text: None,
    }
}

pub fn text_from(sender: Customer, text: &str) -> IncomingMessage {
    message_from(sender, Payload::Text(text.to_string()))
}
