//! Telegram update handlers.
//!
//! Each handler is a thin adapter that:
//! - turns the teloxide update into a platform-neutral one
//! - hands it to the core router
//!
//! Updates without a sender (channel posts and similar) are dropped here.

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{CallbackQuery, Message, User},
};

use hotline_core::{
    domain::{ChatId, Customer, MessageId, MessageRef, UserId},
    messaging::types::{self, IncomingMessage, IncomingUpdate, Payload},
};

use crate::router::AppState;

pub async fn handle_callback(q: CallbackQuery, state: Arc<AppState>) -> ResponseResult<()> {
    state
        .bot
        .handle(IncomingUpdate::Callback(callback_query(&q)))
        .await;
    Ok(())
}

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(incoming) = incoming_message(&msg) else {
        tracing::debug!(chat_id = msg.chat.id.0, "message without sender ignored");
        return Ok(());
    };
    state.bot.handle(IncomingUpdate::Message(incoming)).await;
    Ok(())
}

fn customer(user: &User) -> Customer {
    Customer {
        id: UserId(user.id.0 as i64),
        full_name: user.full_name(),
        username: user.username.clone(),
    }
}

fn incoming_message(msg: &Message) -> Option<IncomingMessage> {
    let sender = customer(msg.from()?);
    let reply_to_text = msg
        .reply_to_message()
        .and_then(|r| r.text().or_else(|| r.caption()))
        .map(|s| s.to_string());

    Some(IncomingMessage {
        chat_id: ChatId(msg.chat.id.0),
        sender,
        payload: payload(msg),
        reply_to_text,
    })
}

fn payload(msg: &Message) -> Payload {
    let caption = msg.caption().map(|s| s.to_string());

    if let Some(text) = msg.text() {
        return Payload::Text(text.to_string());
    }
    // Telegram sends every size; the last one is the largest.
    if let Some(photo) = msg.photo().and_then(|sizes| sizes.last()) {
        return Payload::Photo {
            file_id: photo.file.id.clone(),
            caption,
        };
    }
    if let Some(doc) = msg.document() {
        return Payload::Document {
            file_id: doc.file.id.clone(),
            caption,
        };
    }
    if let Some(contact) = msg.contact() {
        return Payload::Contact {
            phone_number: contact.phone_number.clone(),
            first_name: contact.first_name.clone(),
        };
    }
    Payload::Unsupported
}

fn callback_query(q: &CallbackQuery) -> types::CallbackQuery {
    types::CallbackQuery {
        callback_id: q.id.clone(),
        user_id: UserId(q.from.id.0 as i64),
        data: q.data.clone().unwrap_or_default(),
        message: q.message.as_ref().map(|m| MessageRef {
            chat_id: ChatId(m.chat.id.0),
            message_id: MessageId(m.id.0),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::UserId as TgUserId;

    fn user(username: Option<&str>) -> User {
        User {
            id: TgUserId(555),
            is_bot: false,
            first_name: "Ann".to_string(),
            last_name: Some("Lee".to_string()),
            username: username.map(|s| s.to_string()),
            language_code: None,
            is_premium: false,
            added_to_attachment_menu: false,
        }
    }

    #[test]
    fn customer_carries_full_name_and_handle() {
        let c = customer(&user(Some("ann")));
        assert_eq!(c.id, UserId(555));
        assert_eq!(c.full_name, "Ann Lee");
        assert_eq!(c.handle().as_deref(), Some("@ann"));

        assert_eq!(customer(&user(None)).handle(), None);
    }

    #[test]
    fn callback_without_data_or_message_still_converts() {
        let q = CallbackQuery {
            id: "cb1".to_string(),
            from: user(None),
            message: None,
            inline_message_id: None,
            chat_instance: "ci".to_string(),
            data: None,
            game_short_name: None,
        };
        let converted = callback_query(&q);
        assert_eq!(converted.callback_id, "cb1");
        assert_eq!(converted.user_id, UserId(555));
        assert!(converted.data.is_empty());
        assert!(converted.message.is_none());
    }

    fn private_chat() -> serde_json::Value {
        serde_json::json!({ "id": 1000, "type": "private", "first_name": "Op" })
    }

    fn parse(value: serde_json::Value) -> Message {
        serde_json::from_value(value).expect("valid telegram message")
    }

    #[test]
    fn reply_to_a_forwarded_photo_reads_the_marker_from_its_caption() {
        let msg = parse(serde_json::json!({
            "message_id": 10,
            "date": 1_700_000_000,
            "chat": private_chat(),
            "from": { "id": 1000, "is_bot": false, "first_name": "Op" },
            "text": "thanks, got it",
            "reply_to_message": {
                "message_id": 9,
                "date": 1_699_999_990,
                "chat": private_chat(),
                "from": { "id": 42, "is_bot": true, "first_name": "Hotline" },
                "photo": [
                    { "file_id": "small", "file_unique_id": "s1", "width": 90, "height": 90 },
                    { "file_id": "big", "file_unique_id": "b1", "width": 800, "height": 800 }
                ],
                "caption": "👤 Customer 555 (@ann):\n\nlook"
            }
        }));

        let incoming = incoming_message(&msg).unwrap();
        assert_eq!(incoming.sender.id, UserId(1000));
        assert_eq!(incoming.payload, Payload::Text("thanks, got it".to_string()));
        let replied = incoming.reply_to_text.unwrap();
        assert_eq!(
            hotline_core::directives::extract_customer_marker(&replied),
            Some(UserId(555))
        );
    }

    #[test]
    fn photo_uses_the_largest_size_and_keeps_the_caption() {
        let msg = parse(serde_json::json!({
            "message_id": 11,
            "date": 1_700_000_000,
            "chat": private_chat(),
            "from": { "id": 555, "is_bot": false, "first_name": "Ann", "username": "ann" },
            "photo": [
                { "file_id": "small", "file_unique_id": "s1", "width": 90, "height": 90 },
                { "file_id": "big", "file_unique_id": "b1", "width": 800, "height": 800 }
            ],
            "caption": "our filter"
        }));

        let incoming = incoming_message(&msg).unwrap();
        assert_eq!(
            incoming.payload,
            Payload::Photo {
                file_id: "big".to_string(),
                caption: Some("our filter".to_string()),
            }
        );
        assert!(incoming.reply_to_text.is_none());
    }
}
