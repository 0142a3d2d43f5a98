use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use moka::sync::Cache;
use tokio::time::{sleep, Instant};

use crate::{
    domain::{ChatId, MessageId, MessageRef},
    messaging::port::MessagingPort,
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Minimum spacing between any two sends (global flood control).
    pub global_min_interval: Duration,
    /// Sustained rate per chat: one reply per interval.
    pub per_chat_interval: Duration,
    /// Replies a quiet chat may receive back to back. One archived video
    /// produces three.
    pub per_chat_burst: u32,
    /// Chats silent this long forget their budget.
    pub chat_idle_ttl: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            global_min_interval: Duration::from_millis(40),
            per_chat_interval: Duration::from_millis(1050),
            per_chat_burst: 3,
            chat_idle_ttl: Duration::from_secs(600),
        }
    }
}

/// Token bucket that may go into debt: every caller takes a token right away
/// and is told how long to wait until that token would have existed.
#[derive(Debug)]
struct ReplyBudget {
    capacity: f64,
    tokens: f64,
    refill_every: Duration,
    updated: Instant,
}

impl ReplyBudget {
    fn new(capacity: u32, refill_every: Duration) -> Self {
        let capacity = f64::from(capacity.max(1));
        Self {
            capacity,
            tokens: capacity,
            refill_every,
            updated: Instant::now(),
        }
    }

    fn take(&mut self) -> Duration {
        let now = Instant::now();
        if !self.refill_every.is_zero() {
            let earned = now.duration_since(self.updated).as_secs_f64()
                / self.refill_every.as_secs_f64();
            self.tokens = (self.tokens + earned).min(self.capacity);
        } else {
            self.tokens = self.capacity;
        }
        self.updated = now;

        self.tokens -= 1.0;
        if self.tokens >= 0.0 {
            Duration::ZERO
        } else {
            self.refill_every.mul_f64(-self.tokens)
        }
    }
}

/// MessagingPort decorator that paces replies.
///
/// A chat gets a short burst (one video's "Downloading / Saving / Saved")
/// and then one reply per interval, so albums do not hit Telegram's per-chat
/// flood limit. File downloads are not throttled.
pub struct ThrottledMessenger {
    inner: Arc<dyn MessagingPort>,
    cfg: ThrottleConfig,
    global: Mutex<ReplyBudget>,
    per_chat: Cache<i64, Arc<Mutex<ReplyBudget>>>,
}

impl ThrottledMessenger {
    pub fn new(inner: Arc<dyn MessagingPort>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            cfg,
            global: Mutex::new(ReplyBudget::new(1, cfg.global_min_interval)),
            per_chat: Cache::builder().time_to_idle(cfg.chat_idle_ttl).build(),
        }
    }

    fn budget_wait(budget: &Mutex<ReplyBudget>) -> Duration {
        budget.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    async fn pace(&self, chat_id: i64) {
        let global_wait = Self::budget_wait(&self.global);
        let chat = self.per_chat.get_with(chat_id, || {
            Arc::new(Mutex::new(ReplyBudget::new(
                self.cfg.per_chat_burst,
                self.cfg.per_chat_interval,
            )))
        });
        let chat_wait = Self::budget_wait(&chat);

        let wait = global_wait.max(chat_wait);
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }

    /// Chats currently holding a budget.
    pub fn tracked_chats(&self) -> u64 {
        self.per_chat.run_pending_tasks();
        self.per_chat.entry_count()
    }
}

#[async_trait::async_trait]
impl MessagingPort for ThrottledMessenger {
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> Result<MessageRef> {
        self.pace(chat_id.0).await;
        self.inner.send_text(chat_id, text, reply_to).await
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>> {
        self.inner.download_file(file_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        sent: std::sync::Mutex<Vec<(i64, String)>>,
    }

    #[async_trait::async_trait]
    impl MessagingPort for Recorder {
        async fn send_text(
            &self,
            chat_id: ChatId,
            text: &str,
            _reply_to: Option<MessageId>,
        ) -> Result<MessageRef> {
            self.sent.lock().unwrap().push((chat_id.0, text.to_string()));
            Ok(MessageRef {
                chat_id,
                message_id: MessageId(1),
            })
        }

        async fn download_file(&self, file_id: &str) -> Result<Vec<u8>> {
            Ok(file_id.as_bytes().to_vec())
        }
    }

    fn cfg(interval_ms: u64, burst: u32) -> ThrottleConfig {
        ThrottleConfig {
            global_min_interval: Duration::ZERO,
            per_chat_interval: Duration::from_millis(interval_ms),
            per_chat_burst: burst,
            chat_idle_ttl: Duration::from_secs(60),
        }
    }

    #[test]
    fn budget_allows_burst_then_charges_debt() {
        let mut b = ReplyBudget::new(3, Duration::from_secs(10));
        assert_eq!(b.take(), Duration::ZERO);
        assert_eq!(b.take(), Duration::ZERO);
        assert_eq!(b.take(), Duration::ZERO);

        let fourth = b.take();
        assert!(fourth > Duration::from_secs(9) && fourth <= Duration::from_secs(10));
        let fifth = b.take();
        assert!(fifth > Duration::from_secs(19) && fifth <= Duration::from_secs(20));
    }

    #[tokio::test]
    async fn one_video_worth_of_replies_is_not_delayed() {
        let inner = Arc::new(Recorder::default());
        let throttled = ThrottledMessenger::new(inner.clone(), cfg(500, 3));

        let started = Instant::now();
        for text in ["Downloading...", "Saving...", "Saved /x"] {
            throttled.send_text(ChatId(7), text, None).await.unwrap();
        }
        assert!(started.elapsed() < Duration::from_millis(250));

        throttled.send_text(ChatId(7), "next", None).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(400));
        assert_eq!(inner.sent.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn chats_have_separate_budgets() {
        let inner = Arc::new(Recorder::default());
        let throttled = ThrottledMessenger::new(inner, cfg(500, 1));

        let started = Instant::now();
        throttled.send_text(ChatId(1), "a", None).await.unwrap();
        throttled.send_text(ChatId(2), "b", None).await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(250));
        assert_eq!(throttled.tracked_chats(), 2);
    }

    #[tokio::test]
    async fn downloads_pass_straight_through() {
        let inner = Arc::new(Recorder::default());
        let throttled = ThrottledMessenger::new(inner, ThrottleConfig::default());
        let bytes = throttled.download_file("abc").await.unwrap();
        assert_eq!(bytes, b"abc");
    }
}
