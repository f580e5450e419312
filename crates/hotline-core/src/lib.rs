//! Core domain + application logic for the hotline relay bot.
//!
//! Framework-agnostic: Telegram lives behind the [`messaging::port::MessagingPort`]
//! trait, implemented in the adapter crate.

pub mod audit;
pub mod catalog;
pub mod config;
pub mod dialog;
pub mod directives;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod menu;
pub mod messaging;
pub mod relay;
pub mod router;
pub mod sessions;
pub mod sweeper;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};
