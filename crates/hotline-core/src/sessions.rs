//! Registry of active relay sessions.
//!
//! A customer id is present here iff that customer is in a live dialog with
//! the operator. The value is the customer's last activity, used by the idle
//! sweeper. Nothing is persisted; a restart drops every session.

use std::{collections::HashMap, time::Duration};

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::domain::UserId;

#[derive(Debug, Default)]
pub struct SessionStore {
    inner: Mutex<HashMap<UserId, Instant>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session unless one already exists.
    ///
    /// Returns `true` when a new entry was created. An existing session keeps
    /// its timestamp, so a repeated accept is a no-op.
    pub async fn open(&self, customer: UserId) -> bool {
        self.open_at(customer, Instant::now()).await
    }

    pub async fn open_at(&self, customer: UserId, now: Instant) -> bool {
        let mut map = self.inner.lock().await;
        if map.contains_key(&customer) {
            return false;
        }
        map.insert(customer, now);
        true
    }

    /// Record customer activity. Returns `false` if there is no session to touch.
    pub async fn touch(&self, customer: UserId) -> bool {
        self.touch_at(customer, Instant::now()).await
    }

    pub async fn touch_at(&self, customer: UserId, now: Instant) -> bool {
        match self.inner.lock().await.get_mut(&customer) {
            Some(last) => {
                *last = now;
                true
            }
            None => false,
        }
    }

    /// Close a session. Returns `true` if one was open.
    pub async fn close(&self, customer: UserId) -> bool {
        self.inner.lock().await.remove(&customer).is_some()
    }

    pub async fn contains(&self, customer: UserId) -> bool {
        self.inner.lock().await.contains_key(&customer)
    }

    pub async fn last_activity(&self, customer: UserId) -> Option<Instant> {
        self.inner.lock().await.get(&customer).copied()
    }

    /// Active customer ids in ascending order.
    pub async fn active(&self) -> Vec<UserId> {
        let mut ids: Vec<UserId> = self.inner.lock().await.keys().copied().collect();
        ids.sort();
        ids
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    /// Remove and return every session idle for longer than `max_idle`.
    ///
    /// Selection and removal happen under one lock so a message arriving
    /// mid-sweep cannot be lost between the two.
    pub async fn remove_expired_at(&self, now: Instant, max_idle: Duration) -> Vec<UserId> {
        let mut map = self.inner.lock().await;
        let mut expired: Vec<UserId> = map
            .iter()
            .filter(|(_, last)| now.saturating_duration_since(**last) > max_idle)
            .map(|(id, _)| *id)
            .collect();
        expired.sort();
        for id in &expired {
            map.remove(id);
        }
        expired
    }
}
