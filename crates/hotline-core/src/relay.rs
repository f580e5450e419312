//! Relay engine: session requests and message forwarding in both directions.
//!
//! Delivery failures never propagate out of here. A failed send to the
//! operator on behalf of a customer drops that customer's session; a failed
//! send to a customer on behalf of the operator is reported back to the
//! operator and the session is left alone.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::{
    audit::{AuditEvent, AuditLogger, CloseReason, Direction},
    config::Config,
    dialog::DialogStates,
    directives::{customer_marker, extract_customer_marker, Directive, DirectiveKind, DirectiveTokens},
    domain::{ChatId, Customer, MessageRef, UserId},
    formatting::{escape_html, split_text, tg_len},
    menu,
    messaging::{
        port::MessagingPort,
        types::{IncomingMessage, Keyboard, Payload},
    },
    sessions::SessionStore,
    Result,
};

const MANAGER_REPLY_HEADER: &str = "👤 <b>Manager replied:</b>\n\n";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Prompt delivered to the operator; the customer is waiting.
    Requested,
    AlreadyActive,
    OperatorUnreachable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcceptOutcome {
    Started,
    /// Session already existed; its timestamp was kept.
    AlreadyActive,
    /// The customer could not be notified; the session was rolled back.
    CustomerUnreachable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CustomerRelay {
    Forwarded,
    NoSession,
    Unsupported,
    /// The operator could not be reached; the session was dropped.
    OperatorUnreachable,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OperatorRelay {
    Stopped(UserId),
    Sent(UserId),
    NotActive(UserId),
    DeliveryFailed(UserId),
    Unsupported(UserId),
    Usage(DirectiveKind),
    Hint,
}

pub struct RelayEngine {
    operator: UserId,
    tokens: DirectiveTokens,
    sessions: Arc<SessionStore>,
    dialogs: Arc<DialogStates>,
    messenger: Arc<dyn MessagingPort>,
    audit: Option<Arc<AuditLogger>>,
}

impl RelayEngine {
    pub fn new(
        cfg: &Config,
        sessions: Arc<SessionStore>,
        dialogs: Arc<DialogStates>,
        messenger: Arc<dyn MessagingPort>,
    ) -> Self {
        Self {
            operator: cfg.manager_id,
            tokens: DirectiveTokens {
                stop: cfg.stop_token.clone(),
                chat: cfg.chat_token.clone(),
            },
            sessions,
            dialogs,
            messenger,
            audit: None,
        }
    }

    pub fn with_audit(mut self, audit: Arc<AuditLogger>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn operator(&self) -> UserId {
        self.operator
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn dialogs(&self) -> &Arc<DialogStates> {
        &self.dialogs
    }

    pub fn messenger(&self) -> &Arc<dyn MessagingPort> {
        &self.messenger
    }

    pub(crate) fn audit(&self, event: AuditEvent) {
        if let Some(a) = &self.audit {
            a.record(event);
        }
    }

    /// Send and forget: failures are logged, never surfaced.
    pub(crate) async fn notify(&self, chat_id: ChatId, html: &str, keyboard: Option<Keyboard>) {
        if let Err(e) = self.messenger.send_html(chat_id, html, keyboard).await {
            warn!(chat_id = chat_id.0, error = %e, "best-effort send failed");
        }
    }

    pub(crate) async fn notify_operator(&self, html: &str) {
        self.notify(self.operator.chat(), html, None).await;
    }

    /// Ask the operator to take a live dialog with `customer`.
    pub async fn request_session(&self, customer: &Customer) -> RequestOutcome {
        let id = customer.id;
        let chat = id.chat();

        if self.sessions.contains(id).await {
            self.dialogs.enter(id).await;
            self.notify(
                chat,
                "💬 You are already in a dialog with a manager.\n\
                 All your messages are forwarded to the manager.",
                Some(menu::dialog_menu()),
            )
            .await;
            return RequestOutcome::AlreadyActive;
        }

        let handle = customer.handle().unwrap_or_else(|| "not set".to_string());
        let prompt = format!(
            "💬 <b>New dialog request!</b>\n\
             👤 Name: {}\n\
             🆔 ID: <code>{id}</code>\n\
             🔗 Username: {}\n\n\
             Press ✅ to start the dialog",
            escape_html(&customer.full_name),
            escape_html(&handle),
        );

        if let Err(e) = self
            .messenger
            .send_html(self.operator.chat(), &prompt, Some(menu::request_keyboard(id)))
            .await
        {
            error!(customer_id = %id, operation = "request_session", error = %e, "failed to reach operator");
            self.audit(AuditEvent::error(id, &e.to_string(), "request_session"));
            self.notify(
                chat,
                "⚠️ The manager is temporarily unavailable. \
                 Please try again later or request a call.",
                Some(menu::main_menu()),
            )
            .await;
            return RequestOutcome::OperatorUnreachable;
        }

        info!(customer_id = %id, "dialog request sent to operator");
        self.audit(AuditEvent::session_requested(customer));
        self.notify(
            chat,
            "⏳ Waiting for a manager to connect...\n\
             As soon as the manager accepts, you can chat in real time.",
            Some(menu::back_menu()),
        )
        .await;
        RequestOutcome::Requested
    }

    /// Operator pressed "accept" on a pending request.
    pub async fn accept_session(&self, customer: UserId, prompt: Option<MessageRef>) -> AcceptOutcome {
        let created = self.sessions.open(customer).await;
        if !created {
            debug!(customer_id = %customer, "accept for an already active session; timestamp kept");
        }

        let confirmation = format!(
            "✅ Dialog with customer {customer} started.\n\
             All your replies will be forwarded to the customer.\n\
             To end the dialog, send {}",
            escape_html(&self.tokens.stop_for(customer)),
        );
        self.confirm_to_operator(prompt, &confirmation).await;

        let delivered = self
            .messenger
            .send_html(
                customer.chat(),
                "✅ A manager has joined the dialog!\n\
                 You can now chat in real time.\n\
                 All messages are delivered instantly.",
                Some(menu::dialog_menu()),
            )
            .await;

        if let Err(e) = delivered {
            error!(customer_id = %customer, operation = "accept_session", error = %e, "customer unreachable; rolling back session");
            self.sessions.close(customer).await;
            self.dialogs.clear(customer).await;
            self.audit(AuditEvent::session_closed(customer, CloseReason::Undeliverable));
            self.notify_operator(&format!(
                "⚠️ Customer {customer} has blocked the bot or is unreachable."
            ))
            .await;
            return AcceptOutcome::CustomerUnreachable;
        }

        self.dialogs.enter(customer).await;
        if created {
            info!(customer_id = %customer, "dialog started");
            self.audit(AuditEvent::session_started(customer));
            AcceptOutcome::Started
        } else {
            AcceptOutcome::AlreadyActive
        }
    }

    /// Operator pressed "reject". The registry is not touched.
    pub async fn reject_session(&self, customer: UserId, prompt: Option<MessageRef>) {
        if let Err(e) = self
            .messenger
            .send_html(
                customer.chat(),
                "❌ The manager is busy right now.\n\
                 Please try starting a dialog later or request a callback.",
                Some(menu::main_menu()),
            )
            .await
        {
            debug!(customer_id = %customer, error = %e, "rejection notice not delivered");
        }

        self.confirm_to_operator(prompt, &format!("❌ Request from customer {customer} rejected"))
            .await;
        info!(customer_id = %customer, "dialog request rejected");
    }

    /// Customer ended the dialog (end button or back button).
    ///
    /// Returns `false` if there was no session to end.
    pub async fn end_session_by_customer(&self, customer: &Customer) -> bool {
        let id = customer.id;
        self.dialogs.clear(id).await;

        if !self.sessions.close(id).await {
            self.notify(
                id.chat(),
                "ℹ️ The dialog has already ended.",
                Some(menu::main_menu()),
            )
            .await;
            return false;
        }

        self.notify_operator(&format!("ℹ️ Customer {id} ended the dialog."))
            .await;
        self.notify(
            id.chat(),
            "✅ The dialog with the manager has ended.\n\
             Thank you for contacting us! You are back in the main menu.",
            Some(menu::main_menu()),
        )
        .await;
        info!(customer_id = %id, "customer ended the dialog");
        self.audit(AuditEvent::session_closed(id, CloseReason::Customer));
        true
    }

    /// Forward a customer's message to the operator.
    pub async fn relay_customer_message(&self, msg: &IncomingMessage) -> CustomerRelay {
        let customer = &msg.sender;
        let id = customer.id;

        // Touch doubles as the membership check; a stale dialog flag heals here.
        if !self.sessions.touch(id).await {
            self.dialogs.clear(id).await;
            self.notify(
                msg.chat_id,
                "ℹ️ The dialog has ended. Start a new one from the main menu.",
                Some(menu::main_menu()),
            )
            .await;
            return CustomerRelay::NoSession;
        }

        let mut header = format!("👤 {}", customer_marker(id));
        if let Some(handle) = customer.handle() {
            header.push_str(&format!(" ({})", escape_html(&handle)));
        }
        header.push_str(":\n\n");

        let Some(delivered) = self
            .deliver(self.operator.chat(), &header, &msg.payload)
            .await
        else {
            self.notify(
                msg.chat_id,
                "⚠️ Only text, photos and documents are supported.",
                None,
            )
            .await;
            return CustomerRelay::Unsupported;
        };

        match delivered {
            Ok(_) => {
                debug!(customer_id = %id, "customer message forwarded to operator");
                self.audit(AuditEvent::relay(
                    id,
                    Direction::ToOperator,
                    payload_kind(&msg.payload),
                    payload_text(&msg.payload),
                ));
                CustomerRelay::Forwarded
            }
            Err(e) => {
                error!(customer_id = %id, operation = "relay_customer_message", error = %e, "failed to forward to operator; dropping session");
                self.notify(
                    msg.chat_id,
                    "⚠️ The manager is temporarily unavailable. Please try again later.",
                    Some(menu::main_menu()),
                )
                .await;
                self.sessions.close(id).await;
                self.dialogs.clear(id).await;
                self.audit(AuditEvent::session_closed(id, CloseReason::Undeliverable));
                CustomerRelay::OperatorUnreachable
            }
        }
    }

    /// Route an operator message to a customer.
    ///
    /// Resolution order: stop directive, direct-send directive, reply marker, hint.
    pub async fn relay_operator_message(&self, msg: &IncomingMessage) -> OperatorRelay {
        if let Some(directive) = msg.text().and_then(|t| self.tokens.parse(t)) {
            return match directive {
                Directive::Stop(customer) => self.stop_session(customer).await,
                Directive::Chat { customer, body } => {
                    self.send_to_customer(customer, &Payload::Text(body)).await
                }
                Directive::Malformed(kind) => {
                    self.notify_operator(&format!(
                        "⚠️ Invalid command format. Use: {}",
                        escape_html(&self.tokens.usage(kind))
                    ))
                    .await;
                    OperatorRelay::Usage(kind)
                }
            };
        }

        if let Some(customer) = msg.reply_to_text.as_deref().and_then(extract_customer_marker) {
            return self.send_to_customer(customer, &msg.payload).await;
        }

        self.send_hint().await;
        OperatorRelay::Hint
    }

    async fn stop_session(&self, customer: UserId) -> OperatorRelay {
        if !self.sessions.close(customer).await {
            self.report_not_active(customer).await;
            return OperatorRelay::NotActive(customer);
        }
        self.dialogs.clear(customer).await;

        self.notify(
            customer.chat(),
            "ℹ️ The manager has ended the dialog.\n\
             Thank you for contacting us! You are back in the main menu.",
            Some(menu::main_menu()),
        )
        .await;
        self.notify_operator(&format!("✅ Dialog with customer {customer} ended."))
            .await;
        info!(customer_id = %customer, "operator ended the dialog");
        self.audit(AuditEvent::session_closed(customer, CloseReason::Operator));
        OperatorRelay::Stopped(customer)
    }

    async fn send_to_customer(&self, customer: UserId, payload: &Payload) -> OperatorRelay {
        if !self.sessions.contains(customer).await {
            self.report_not_active(customer).await;
            return OperatorRelay::NotActive(customer);
        }

        let Some(delivered) = self
            .deliver(customer.chat(), MANAGER_REPLY_HEADER, payload)
            .await
        else {
            self.notify_operator("⚠️ Only text, photos and documents can be forwarded.")
                .await;
            return OperatorRelay::Unsupported(customer);
        };

        match delivered {
            Ok(_) => {
                self.notify_operator(&format!("✅ Message sent to customer {customer}."))
                    .await;
                info!(customer_id = %customer, "operator reply delivered");
                self.audit(AuditEvent::relay(
                    customer,
                    Direction::ToCustomer,
                    payload_kind(payload),
                    payload_text(payload),
                ));
                OperatorRelay::Sent(customer)
            }
            Err(e) => {
                warn!(customer_id = %customer, operation = "relay_operator_message", error = %e, "operator reply not delivered");
                self.audit(AuditEvent::error(customer, &e.to_string(), "relay_operator_message"));
                self.notify_operator(&format!(
                    "❌ Could not deliver the message to customer {customer}: {}",
                    escape_html(&e.to_string())
                ))
                .await;
                OperatorRelay::DeliveryFailed(customer)
            }
        }
    }

    async fn report_not_active(&self, customer: UserId) {
        self.notify_operator(&format!(
            "⚠️ Customer {customer} is not in an active dialog."
        ))
        .await;
    }

    async fn send_hint(&self) {
        let active = self.sessions.active().await;
        self.notify_operator(&operator_hint(&self.tokens, &active))
            .await;
    }

    /// Edit the request prompt in place when we have it, otherwise send a new message.
    async fn confirm_to_operator(&self, prompt: Option<MessageRef>, html: &str) {
        if let Some(prompt) = prompt {
            match self.messenger.edit_html(prompt, html).await {
                Ok(()) => return,
                Err(e) => debug!(error = %e, "prompt edit failed; sending a new message"),
            }
        }
        self.notify_operator(html).await;
    }

    /// Send `payload` under `header_html`. `None` means the payload kind is not relayable.
    ///
    /// Text that does not fit one message goes out as several, each carrying
    /// the header so a reply to any part still resolves. The first sent
    /// message is returned.
    async fn deliver(
        &self,
        to: ChatId,
        header_html: &str,
        payload: &Payload,
    ) -> Option<Result<MessageRef>> {
        let res = match payload {
            Payload::Text(text) => self.deliver_text(to, header_html, text).await,
            Payload::Photo { file_id, caption } | Payload::Document { file_id, caption } => {
                let is_photo = matches!(payload, Payload::Photo { .. });
                self.deliver_media(to, header_html, file_id, caption.as_deref(), is_photo)
                    .await
            }
            Payload::Contact { .. } | Payload::Unsupported => return None,
        };
        Some(res)
    }

    async fn deliver_text(&self, to: ChatId, header_html: &str, text: &str) -> Result<MessageRef> {
        let room = self
            .messenger
            .capabilities()
            .max_message_len
            .saturating_sub(tg_len(header_html));
        let mut parts = split_text(text, room).into_iter();
        let first = parts.next().unwrap_or_default();

        let first_ref = self.send_part(to, header_html, &first).await?;
        for part in parts {
            self.send_part(to, header_html, &part).await?;
        }
        Ok(first_ref)
    }

    /// Media goes first with as much caption as fits; the rest follows as text.
    async fn deliver_media(
        &self,
        to: ChatId,
        header_html: &str,
        file_id: &str,
        caption: Option<&str>,
        is_photo: bool,
    ) -> Result<MessageRef> {
        let caps = self.messenger.capabilities();
        let header_len = tg_len(header_html);
        let (first, rest) = split_caption(
            caption.unwrap_or(""),
            caps.max_caption_len.saturating_sub(header_len),
            caps.max_message_len.saturating_sub(header_len),
        );

        let caption_html = format!("{header_html}{}", escape_html(&first));
        let media_ref = if is_photo {
            self.messenger.send_photo(to, file_id, &caption_html).await?
        } else {
            self.messenger.send_document(to, file_id, &caption_html).await?
        };
        for part in rest {
            self.send_part(to, header_html, &part).await?;
        }
        Ok(media_ref)
    }

    async fn send_part(&self, to: ChatId, header_html: &str, raw: &str) -> Result<MessageRef> {
        self.messenger
            .send_html(to, &format!("{header_html}{}", escape_html(raw)), None)
            .await
    }
}

/// First piece fits a caption; the remainder is re-split for plain messages.
fn split_caption(caption: &str, caption_room: usize, text_room: usize) -> (String, Vec<String>) {
    let mut parts = split_text(caption, caption_room).into_iter();
    let first = parts.next().unwrap_or_default();
    let rest: String = parts.collect();
    (first, split_text(&rest, text_room))
}

/// Help text for the operator listing active dialogs and both addressing syntaxes.
pub fn operator_hint(tokens: &DirectiveTokens, active: &[UserId]) -> String {
    let mut hint = String::from("ℹ️ To answer a customer:\n");
    let Some(first) = active.first() else {
        hint.push_str("No active dialogs.");
        return hint;
    };

    hint.push_str("• Reply to their message, OR\n");
    hint.push_str(&format!(
        "• Send {} your message\n",
        escape_html(&tokens.chat_for(*first))
    ));
    hint.push_str(&format!(
        "• To end a dialog, send {}\n",
        escape_html(&tokens.stop_for(*first))
    ));
    let ids = active
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    hint.push_str(&format!("\nActive dialogs: {ids}"));
    hint
}

fn payload_kind(payload: &Payload) -> &'static str {
    match payload {
        Payload::Text(_) => "text",
        Payload::Photo { .. } => "photo",
        Payload::Document { .. } => "document",
        Payload::Contact { .. } => "contact",
        Payload::Unsupported => "unsupported",
    }
}

fn payload_text(payload: &Payload) -> Option<&str> {
    match payload {
        Payload::Text(t) => Some(t.as_str()),
        Payload::Photo { caption, .. } | Payload::Document { caption, .. } => caption.as_deref(),
        _ => None,
    }
}
