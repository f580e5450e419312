use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef},
    messaging::types::{Keyboard, MessagingCapabilities},
    Result,
};

/// Outbound side of the messaging platform.
///
/// Every relay operation goes through this trait, so the Telegram adapter, the
/// throttling decorator and test fakes are interchangeable. Text and captions
/// are Telegram-flavoured HTML; callers escape user content.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    fn capabilities(&self) -> MessagingCapabilities;

    async fn send_html(
        &self,
        chat_id: ChatId,
        html: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<MessageRef>;

    /// Re-send a photo the bot already received, by platform file id.
    async fn send_photo(&self, chat_id: ChatId, file_id: &str, caption_html: &str)
        -> Result<MessageRef>;

    /// Re-send a document the bot already received, by platform file id.
    async fn send_document(
        &self,
        chat_id: ChatId,
        file_id: &str,
        caption_html: &str,
    ) -> Result<MessageRef>;

    async fn edit_html(&self, msg: MessageRef, html: &str) -> Result<()>;

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()>;
}
