use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{
    domain::{ChatId, MessageRef},
    messaging::{
        port::MessagingPort,
        types::{Keyboard, MessagingCapabilities},
    },
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Minimum spacing between *any* Telegram API calls (global flood control).
    pub global_min_interval: Duration,
    /// Minimum spacing between calls per chat (Telegram 1 msg/sec style limits).
    pub per_chat_min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            global_min_interval: Duration::from_millis(40), // ~25/sec
            per_chat_min_interval: Duration::from_millis(1050), // ~0.95/sec
        }
    }
}

#[derive(Debug)]
struct IntervalLimiter {
    interval: Duration,
    next: Instant,
}

impl IntervalLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now(),
        }
    }

    /// Reserve the next slot and return the wait duration required before executing.
    fn reserve(&mut self) -> Duration {
        let now = Instant::now();
        let start = if now >= self.next { now } else { self.next };
        self.next = start + self.interval;
        start.saturating_duration_since(now)
    }
}

/// Per-chat limiters are swept once the map grows to this many entries.
const PER_CHAT_PRUNE_AT: usize = 1024;

/// Drop limiters whose next slot has already passed.
///
/// A fresh limiter behaves exactly like one whose slot is in the past, so
/// removing them loses nothing. Limiters currently held by a caller are kept.
fn prune_idle(map: &mut HashMap<i64, Arc<Mutex<IntervalLimiter>>>, now: Instant) {
    map.retain(|_, lim| {
        if Arc::strong_count(lim) > 1 {
            return true;
        }
        match lim.try_lock() {
            Ok(guard) => guard.next > now,
            Err(_) => true,
        }
    });
}

/// MessagingPort decorator that rate-limits outbound calls.
///
/// The operator chat is the hot spot: every relayed customer message lands there,
/// so a handful of chatty customers can trip Telegram's per-chat limit.
pub struct ThrottledMessenger {
    inner: Arc<dyn MessagingPort>,
    cfg: ThrottleConfig,
    global: Mutex<IntervalLimiter>,
    per_chat: Mutex<HashMap<i64, Arc<Mutex<IntervalLimiter>>>>,
}

impl ThrottledMessenger {
    pub fn new(inner: Arc<dyn MessagingPort>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            cfg,
            global: Mutex::new(IntervalLimiter::new(cfg.global_min_interval)),
            per_chat: Mutex::new(HashMap::new()),
        }
    }

    async fn limiter_for_chat(&self, chat_id: i64) -> Arc<Mutex<IntervalLimiter>> {
        let mut map = self.per_chat.lock().await;
        if map.len() >= PER_CHAT_PRUNE_AT && !map.contains_key(&chat_id) {
            prune_idle(&mut map, Instant::now());
        }
        map.entry(chat_id)
            .or_insert_with(|| {
                Arc::new(Mutex::new(IntervalLimiter::new(
                    self.cfg.per_chat_min_interval,
                )))
            })
            .clone()
    }

    async fn throttle_chat(&self, chat_id: i64) {
        let global_wait = { self.global.lock().await.reserve() };
        let chat_wait = {
            let lim = self.limiter_for_chat(chat_id).await;
            let mut guard = lim.lock().await;
            guard.reserve()
        };

        let wait = global_wait.max(chat_wait);
        if wait > Duration::ZERO {
            sleep(wait).await;
        }
    }

    async fn throttle_global(&self) {
        let wait = { self.global.lock().await.reserve() };
        if wait > Duration::ZERO {
            sleep(wait).await;
        }
    }
}

#[async_trait::async_trait]
impl MessagingPort for ThrottledMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        self.inner.capabilities()
    }

    async fn send_html(
        &self,
        chat_id: ChatId,
        html: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<MessageRef> {
        self.throttle_chat(chat_id.0).await;
        self.inner.send_html(chat_id, html, keyboard).await
    }

    async fn send_photo(
        &self,
        chat_id: ChatId,
        file_id: &str,
        caption_html: &str,
    ) -> Result<MessageRef> {
        self.throttle_chat(chat_id.0).await;
        self.inner.send_photo(chat_id, file_id, caption_html).await
    }

    async fn send_document(
        &self,
        chat_id: ChatId,
        file_id: &str,
        caption_html: &str,
    ) -> Result<MessageRef> {
        self.throttle_chat(chat_id.0).await;
        self.inner.send_document(chat_id, file_id, caption_html).await
    }

    async fn edit_html(&self, msg: MessageRef, html: &str) -> Result<()> {
        self.throttle_chat(msg.chat_id.0).await;
        self.inner.edit_html(msg, html).await
    }

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        // No chat_id available here; apply global throttling only.
        self.throttle_global().await;
        self.inner.answer_callback_query(callback_id, text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeMessenger;

    #[tokio::test]
    async fn limiter_spaces_consecutive_reservations() {
        let mut lim = IntervalLimiter::new(Duration::from_millis(100));
        assert_eq!(lim.reserve(), Duration::ZERO);
        let second = lim.reserve();
        assert!(second > Duration::from_millis(50));
        assert!(second <= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn delegates_every_call_to_inner_messenger() {
        let fake = Arc::new(FakeMessenger::default());
        let throttled = ThrottledMessenger::new(
            fake.clone(),
            ThrottleConfig {
                global_min_interval: Duration::from_millis(1),
                per_chat_min_interval: Duration::from_millis(1),
            },
        );

        throttled.send_html(ChatId(1), "a", None).await.unwrap();
        throttled.send_photo(ChatId(1), "file-1", "cap").await.unwrap();
        throttled.answer_callback_query("cb", None).await.unwrap();

        assert_eq!(fake.texts_to(ChatId(1)), vec!["a".to_string()]);
        assert_eq!(fake.sent_to(ChatId(1)).len(), 2);
        assert_eq!(fake.callback_answers().len(), 1);
    }

    #[tokio::test]
    async fn per_chat_limiters_stay_bounded_across_many_chats() {
        let fake = Arc::new(FakeMessenger::default());
        let throttled = ThrottledMessenger::new(
            fake.clone(),
            ThrottleConfig {
                global_min_interval: Duration::ZERO,
                per_chat_min_interval: Duration::ZERO,
            },
        );

        for chat in 0..5000 {
            throttled.send_html(ChatId(chat), "hi", None).await.unwrap();
        }

        assert!(throttled.per_chat.lock().await.len() <= PER_CHAT_PRUNE_AT);
        assert_eq!(fake.texts_to(ChatId(4999)), vec!["hi".to_string()]);
    }

    #[tokio::test]
    async fn pruning_keeps_chats_still_cooling_down() {
        let now = Instant::now();
        let mut map = HashMap::new();
        let mut busy = IntervalLimiter::new(Duration::from_secs(10));
        busy.reserve();
        map.insert(1, Arc::new(Mutex::new(busy)));
        map.insert(2, Arc::new(Mutex::new(IntervalLimiter::new(Duration::ZERO))));
        let held = Arc::new(Mutex::new(IntervalLimiter::new(Duration::ZERO)));
        map.insert(3, held.clone());

        prune_idle(&mut map, now + Duration::from_secs(1));

        let mut left: Vec<i64> = map.keys().copied().collect();
        left.sort();
        assert_eq!(left, vec![1, 3]);
    }
}
