//! Per-customer "in relay dialog" flag.
//!
//! This is only a cache of [`SessionStore`](crate::sessions::SessionStore)
//! membership. The router always double-checks the registry before relaying,
//! so a stale flag costs one "dialog ended" notice, never a misrouted message.

use std::collections::HashSet;

use tokio::sync::Mutex;

use crate::domain::UserId;

#[derive(Debug, Default)]
pub struct DialogStates {
    in_dialog: Mutex<HashSet<UserId>>,
}

impl DialogStates {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_in_dialog(&self, customer: UserId) -> bool {
        self.in_dialog.lock().await.contains(&customer)
    }

    pub async fn enter(&self, customer: UserId) {
        self.in_dialog.lock().await.insert(customer);
    }

    pub async fn clear(&self, customer: UserId) {
        self.in_dialog.lock().await.remove(&customer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn enter_and_clear_toggle_the_flag() {
        let states = DialogStates::new();
        let u = UserId(3);
        assert!(!states.is_in_dialog(u).await);
        states.enter(u).await;
        assert!(states.is_in_dialog(u).await);
        states.clear(u).await;
        assert!(!states.is_in_dialog(u).await);
        // Clearing twice is harmless.
        states.clear(u).await;
    }
}
