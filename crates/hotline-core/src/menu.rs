//! Customer menu vocabulary, keyboards and operator inline actions.

use crate::{
    domain::UserId,
    messaging::types::{InlineButton, InlineKeyboard, Keyboard, ReplyButton, ReplyKeyboard},
};

pub const ABOUT: &str = "ℹ️ About us";
pub const PRICE_LIST: &str = "💰 Price list";
pub const START_DIALOG: &str = "💬 Chat with a manager";
pub const REQUEST_CALL: &str = "📞 Request a call";
pub const END_DIALOG: &str = "⏹️ End dialog";
pub const BACK: &str = "⬅️ Back";
pub const SHARE_CONTACT: &str = "📱 Share contact";

/// A reserved menu label the customer tapped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MenuAction {
    About,
    PriceList,
    StartDialog,
    RequestCall,
    EndDialog,
    Back,
}

impl MenuAction {
    /// Exact match only; anything else is free text.
    pub fn from_label(text: &str) -> Option<Self> {
        match text {
            ABOUT => Some(Self::About),
            PRICE_LIST => Some(Self::PriceList),
            START_DIALOG => Some(Self::StartDialog),
            REQUEST_CALL => Some(Self::RequestCall),
            END_DIALOG => Some(Self::EndDialog),
            BACK => Some(Self::Back),
            _ => None,
        }
    }
}

pub fn main_menu() -> Keyboard {
    Keyboard::Reply(ReplyKeyboard {
        rows: vec![
            vec![ReplyButton::text(ABOUT), ReplyButton::text(PRICE_LIST)],
            vec![
                ReplyButton::text(START_DIALOG),
                ReplyButton::text(REQUEST_CALL),
            ],
        ],
        placeholder: Some("Choose an action".to_string()),
    })
}

pub fn dialog_menu() -> Keyboard {
    Keyboard::Reply(ReplyKeyboard {
        rows: vec![vec![ReplyButton::text(END_DIALOG)]],
        placeholder: Some("Write to the manager...".to_string()),
    })
}

pub fn back_menu() -> Keyboard {
    Keyboard::Reply(ReplyKeyboard {
        rows: vec![vec![ReplyButton::text(BACK)]],
        placeholder: None,
    })
}

pub fn contact_request_menu() -> Keyboard {
    Keyboard::Reply(ReplyKeyboard {
        rows: vec![
            vec![ReplyButton::contact(SHARE_CONTACT)],
            vec![ReplyButton::text(BACK)],
        ],
        placeholder: None,
    })
}

const ACCEPT_PREFIX: &str = "accept_";
const REJECT_PREFIX: &str = "reject_";

/// Resolution of a pending relay request, carried in callback data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperatorAction {
    Accept(UserId),
    Reject(UserId),
}

impl OperatorAction {
    pub fn parse(data: &str) -> Option<Self> {
        if let Some(id) = data.strip_prefix(ACCEPT_PREFIX) {
            return id.parse::<i64>().ok().map(|id| Self::Accept(UserId(id)));
        }
        if let Some(id) = data.strip_prefix(REJECT_PREFIX) {
            return id.parse::<i64>().ok().map(|id| Self::Reject(UserId(id)));
        }
        None
    }

    pub fn callback_data(&self) -> String {
        match self {
            Self::Accept(id) => format!("{ACCEPT_PREFIX}{id}"),
            Self::Reject(id) => format!("{REJECT_PREFIX}{id}"),
        }
    }
}

/// Accept / reject buttons attached to the operator's request prompt.
pub fn request_keyboard(customer: UserId) -> Keyboard {
    Keyboard::Inline(InlineKeyboard::single_row(vec![
        InlineButton {
            label: "✅ Accept".to_string(),
            callback_data: OperatorAction::Accept(customer).callback_data(),
        },
        InlineButton {
            label: "❌ Reject".to_string(),
            callback_data: OperatorAction::Reject(customer).callback_data(),
        },
    ]))
}
