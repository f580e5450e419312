//! Update dispatch: decides which handler sees each incoming update.
//!
//! Messages from the operator always go to the relay engine. Customer
//! messages are checked in order: `/start`, menu labels, shared contact,
//! in-dialog relay, and finally the "menu only" fallback.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    audit::AuditEvent,
    catalog,
    domain::Customer,
    formatting::escape_html,
    menu::{self, MenuAction, OperatorAction},
    messaging::types::{CallbackQuery, IncomingMessage, IncomingUpdate, Keyboard, Payload},
    relay::RelayEngine,
};

const START_COMMAND: &str = "/start";

#[derive(Clone)]
pub struct HotlineBot {
    engine: Arc<RelayEngine>,
}

impl HotlineBot {
    pub fn new(engine: Arc<RelayEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<RelayEngine> {
        &self.engine
    }

    pub async fn handle(&self, update: IncomingUpdate) {
        match update {
            IncomingUpdate::Message(msg) => self.handle_message(&msg).await,
            IncomingUpdate::Callback(q) => self.handle_callback(&q).await,
        }
    }

    pub async fn handle_message(&self, msg: &IncomingMessage) {
        if msg.sender.id == self.engine.operator() {
            self.engine.relay_operator_message(msg).await;
            return;
        }

        if let Some(text) = msg.text() {
            if is_start_command(text) {
                self.handle_start(&msg.sender).await;
                return;
            }
            if let Some(action) = MenuAction::from_label(text) {
                self.handle_menu(&msg.sender, action).await;
                return;
            }
        }

        if let Payload::Contact { phone_number, first_name } = &msg.payload {
            self.handle_contact(&msg.sender, phone_number, first_name)
                .await;
            return;
        }

        let id = msg.sender.id;
        if self.engine.dialogs().is_in_dialog(id).await || self.engine.sessions().contains(id).await
        {
            self.engine.relay_customer_message(msg).await;
            return;
        }

        self.reply(
            &msg.sender,
            "❓ I only understand menu commands.\nChoose an action below 👇",
            menu::main_menu(),
        )
        .await;
    }

    pub async fn handle_callback(&self, q: &CallbackQuery) {
        if q.user_id != self.engine.operator() {
            warn!(user_id = %q.user_id, data = %q.data, "callback from non-operator ignored");
            self.answer(q, Some("Unauthorized")).await;
            return;
        }

        match OperatorAction::parse(&q.data) {
            Some(OperatorAction::Accept(customer)) => {
                self.answer(q, None).await;
                self.engine.accept_session(customer, q.message).await;
            }
            Some(OperatorAction::Reject(customer)) => {
                self.answer(q, None).await;
                self.engine.reject_session(customer, q.message).await;
            }
            None => {
                debug!(data = %q.data, "unknown callback data");
                self.answer(q, None).await;
            }
        }
    }

    async fn handle_start(&self, customer: &Customer) {
        let id = customer.id;
        self.engine.dialogs().clear(id).await;

        if self.engine.sessions().contains(id).await {
            self.engine.dialogs().enter(id).await;
            self.reply(
                customer,
                "💬 You are still in a dialog with a manager.\n\
                 Write your message or press «⏹️ End dialog».",
                menu::dialog_menu(),
            )
            .await;
            return;
        }

        self.reply(customer, catalog::GREETING, menu::main_menu())
            .await;
    }

    async fn handle_menu(&self, customer: &Customer, action: MenuAction) {
        let active = self.engine.sessions().contains(customer.id).await;

        match action {
            MenuAction::About | MenuAction::PriceList | MenuAction::RequestCall if active => {
                self.reply(
                    customer,
                    "⚠️ Please finish your current dialog with the manager first.",
                    menu::dialog_menu(),
                )
                .await;
            }
            MenuAction::About => {
                self.reply(customer, catalog::COMPANY_INFO, menu::back_menu())
                    .await;
            }
            MenuAction::PriceList => {
                self.reply(customer, &catalog::price_list_html(), menu::back_menu())
                    .await;
            }
            MenuAction::RequestCall => {
                self.reply(
                    customer,
                    "📱 Tap the button below to share your phone number.\n\
                     A manager will call you back within 30 minutes.",
                    menu::contact_request_menu(),
                )
                .await;
            }
            MenuAction::StartDialog => {
                self.engine.request_session(customer).await;
            }
            MenuAction::EndDialog => {
                self.engine.end_session_by_customer(customer).await;
            }
            MenuAction::Back if active => {
                self.engine.end_session_by_customer(customer).await;
            }
            MenuAction::Back => {
                self.engine.dialogs().clear(customer.id).await;
                self.reply(
                    customer,
                    "↩️ You are back in the main menu",
                    menu::main_menu(),
                )
                .await;
            }
        }
    }

    /// A shared contact is always a callback request, even mid-dialog.
    async fn handle_contact(&self, customer: &Customer, phone_number: &str, first_name: &str) {
        let id = customer.id;
        let phone = if phone_number.starts_with('+') {
            phone_number.to_string()
        } else {
            format!("+{phone_number}")
        };
        let handle = customer.handle().unwrap_or_else(|| "not set".to_string());
        let name = if first_name.trim().is_empty() {
            customer.full_name.as_str()
        } else {
            first_name
        };

        let notice = format!(
            "🔔 <b>New callback request!</b>\n\
             👤 Name: {}\n\
             📱 Phone: {}\n\
             🆔 User ID: <code>{id}</code>\n\
             🔗 Username: {}",
            escape_html(name),
            escape_html(&phone),
            escape_html(&handle),
        );

        if let Err(e) = self
            .engine
            .messenger()
            .send_html(self.engine.operator().chat(), &notice, None)
            .await
        {
            warn!(customer_id = %id, error = %e, "callback request not delivered to operator");
            self.engine
                .audit(AuditEvent::error(id, &e.to_string(), "callback_request"));
            self.reply(
                customer,
                "⚠️ We could not pass on your request right now. Please try again later.",
                menu::main_menu(),
            )
            .await;
            return;
        }

        info!(customer_id = %id, "callback request forwarded");
        self.engine
            .audit(AuditEvent::callback_request(customer, &phone));
        if !self.engine.sessions().contains(id).await {
            self.engine.dialogs().clear(id).await;
        }
        self.reply(
            customer,
            "✅ Callback request received!\nA manager will call you back shortly.",
            menu::main_menu(),
        )
        .await;
    }

    async fn reply(&self, customer: &Customer, html: &str, keyboard: Keyboard) {
        self.engine
            .notify(customer.id.chat(), html, Some(keyboard))
            .await;
    }

    async fn answer(&self, q: &CallbackQuery, text: Option<&str>) {
        if let Err(e) = self
            .engine
            .messenger()
            .answer_callback_query(&q.callback_id, text)
            .await
        {
            debug!(error = %e, "answer_callback_query failed");
        }
    }
}

fn is_start_command(text: &str) -> bool {
    let first = text.split_whitespace().next().unwrap_or("");
    first == START_COMMAND || first.starts_with("/start@")
}
