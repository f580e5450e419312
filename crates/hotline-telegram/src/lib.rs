//! Telegram adapter (teloxide).
//!
//! This crate implements the `hotline-core` MessagingPort over the Telegram Bot API
//! and feeds incoming updates to the core router.

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{
        ButtonRequest, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, KeyboardButton,
        KeyboardMarkup, ParseMode, ReplyMarkup,
    },
};

use tokio::time::sleep;

pub mod handlers;
pub mod router;

use hotline_core::{
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{Keyboard, MessagingCapabilities},
    },
    Result,
};

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
        teloxide::types::MessageId(message_id.0)
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::Transport(format!("telegram error: {e}"))
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        tracing::debug!(retry_after = ?d, "telegram flood control; retrying once");
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

/// Translate a platform-neutral keyboard into Telegram reply markup.
pub fn reply_markup(keyboard: &Keyboard) -> ReplyMarkup {
    match keyboard {
        Keyboard::Reply(kb) => {
            let rows: Vec<Vec<KeyboardButton>> = kb
                .rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|b| {
                            let button = KeyboardButton::new(b.label.clone());
                            if b.request_contact {
                                button.request(ButtonRequest::Contact)
                            } else {
                                button
                            }
                        })
                        .collect()
                })
                .collect();
            let mut markup = KeyboardMarkup::new(rows).resize_keyboard(true);
            if let Some(p) = &kb.placeholder {
                markup = markup.input_field_placeholder(p.clone());
            }
            markup.into()
        }
        Keyboard::Inline(kb) => {
            let rows: Vec<Vec<InlineKeyboardButton>> = kb
                .rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|b| InlineKeyboardButton::callback(b.label.clone(), b.callback_data.clone()))
                        .collect()
                })
                .collect();
            InlineKeyboardMarkup::new(rows).into()
        }
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
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
        let markup = keyboard.as_ref().map(reply_markup);
        let msg = self
            .with_retry(|| {
                let req = self
                    .bot
                    .send_message(Self::tg_chat(chat_id), html.to_string())
                    .parse_mode(ParseMode::Html);
                match &markup {
                    Some(m) => req.reply_markup(m.clone()),
                    None => req,
                }
            })
            .await?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn send_photo(
        &self,
        chat_id: ChatId,
        file_id: &str,
        caption_html: &str,
    ) -> Result<MessageRef> {
        let msg = self
            .with_retry(|| {
                self.bot
                    .send_photo(Self::tg_chat(chat_id), InputFile::file_id(file_id.to_string()))
                    .caption(caption_html.to_string())
                    .parse_mode(ParseMode::Html)
            })
            .await?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn send_document(
        &self,
        chat_id: ChatId,
        file_id: &str,
        caption_html: &str,
    ) -> Result<MessageRef> {
        let msg = self
            .with_retry(|| {
                self.bot
                    .send_document(Self::tg_chat(chat_id), InputFile::file_id(file_id.to_string()))
                    .caption(caption_html.to_string())
                    .parse_mode(ParseMode::Html)
            })
            .await?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn edit_html(&self, msg: MessageRef, html: &str) -> Result<()> {
        self.with_retry(|| {
            self.bot
                .edit_message_text(
                    Self::tg_chat(msg.chat_id),
                    Self::tg_msg_id(msg.message_id),
                    html.to_string(),
                )
                .parse_mode(ParseMode::Html)
        })
        .await?;
        Ok(())
    }

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.with_retry(|| {
            let mut req = self.bot.answer_callback_query(callback_id.to_string());
            if let Some(t) = text {
                req = req.text(t.to_string());
            }
            req
        })
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hotline_core::{domain::UserId, menu};
    use teloxide::types::InlineKeyboardButtonKind;

    #[test]
    fn main_menu_becomes_a_reply_keyboard() {
        let ReplyMarkup::Keyboard(kb) = reply_markup(&menu::main_menu()) else {
            panic!("expected reply keyboard");
        };
        assert_eq!(kb.keyboard.len(), 2);
        assert_eq!(kb.keyboard[0][0].text, menu::ABOUT);
        assert_eq!(kb.keyboard[1][0].text, menu::START_DIALOG);
        assert!(kb.keyboard[0][0].request.is_none());
    }

    #[test]
    fn contact_button_requests_the_phone_number() {
        let ReplyMarkup::Keyboard(kb) = reply_markup(&menu::contact_request_menu()) else {
            panic!("expected reply keyboard");
        };
        assert!(matches!(kb.keyboard[0][0].request, Some(ButtonRequest::Contact)));
        assert_eq!(kb.keyboard[1][0].text, menu::BACK);
    }

    #[test]
    fn request_keyboard_becomes_inline_callbacks() {
        let ReplyMarkup::InlineKeyboard(kb) = reply_markup(&menu::request_keyboard(UserId(9)))
        else {
            panic!("expected inline keyboard");
        };
        let data: Vec<String> = kb.inline_keyboard[0]
            .iter()
            .filter_map(|b| match &b.kind {
                InlineKeyboardButtonKind::CallbackData(d) => Some(d.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(data, vec!["accept_9".to_string(), "reject_9".to_string()]);
    }
}
