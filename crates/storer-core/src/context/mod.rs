//! Message-context engine: the lookback tables and the caption resolver.
//!
//! One [`ContextStore`] belongs to one daemon instance. All three tables sit
//! behind a single mutex, so every operation below is atomic with respect to
//! the others. The daemon additionally serializes whole updates per chat.

use std::{
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use crate::{
    domain::{ChatId, MessageRef},
    messaging::types::IncomingMessage,
};

mod cache;
pub mod countdown;
pub mod history;
pub mod media_groups;
pub mod resolver;

pub use countdown::{CountdownDirective, Countdowns};
pub use history::MessageHistory;
pub use media_groups::{MediaGroupContext, MediaGroups};
pub use resolver::{CaptionSource, Resolution};

#[derive(Clone, Copy, Debug)]
pub struct ContextLimits {
    /// Max remembered message texts; 0 = unbounded.
    pub history_capacity: usize,
    /// Max remembered media groups; 0 = unbounded.
    pub media_group_capacity: usize,
    /// History and media-group entries untouched this long are dropped.
    pub idle_ttl: Option<Duration>,
}

impl Default for ContextLimits {
    fn default() -> Self {
        Self {
            history_capacity: 10_000,
            media_group_capacity: 1_000,
            idle_ttl: None,
        }
    }
}

#[derive(Debug)]
pub struct ContextTables {
    pub history: MessageHistory,
    pub media_groups: MediaGroups,
    pub countdowns: Countdowns,
}

impl ContextTables {
    pub fn new(limits: ContextLimits) -> Self {
        Self {
            history: MessageHistory::new(limits.history_capacity, limits.idle_ttl),
            media_groups: MediaGroups::new(limits.media_group_capacity, limits.idle_ttl),
            countdowns: Countdowns::default(),
        }
    }
}

#[derive(Debug)]
pub struct ContextStore {
    tables: Mutex<ContextTables>,
}

impl ContextStore {
    pub fn new(limits: ContextLimits) -> Self {
        Self {
            tables: Mutex::new(ContextTables::new(limits)),
        }
    }

    fn tables(&self) -> MutexGuard<'_, ContextTables> {
        // Tables stay consistent even if a holder panicked; keep serving.
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Remember a text-bearing message (and its countdown, if any).
    /// Returns false when the message has no usable text.
    pub fn record_text(&self, msg: &IncomingMessage) -> bool {
        resolver::record_text(&mut self.tables(), msg)
    }

    /// Effective caption and delta for `msg`.
    pub fn resolve(&self, msg: &IncomingMessage) -> Resolution {
        resolver::resolve(&mut self.tables(), msg)
    }

    /// Consume one slot of the chat's countdown on behalf of `processed`.
    /// Returns the remaining count.
    ///
    /// The message that declared the directive does not count against it.
    pub fn tick_countdown(&self, processed: MessageRef) -> Option<u32> {
        let mut tables = self.tables();
        let own = tables
            .countdowns
            .get(processed.chat_id)
            .is_some_and(|d| d.origin == processed.message_id);
        if own {
            return None;
        }
        tables.countdowns.tick(processed.chat_id)
    }

    pub fn countdown(&self, chat_id: ChatId) -> Option<CountdownDirective> {
        self.tables().countdowns.get(chat_id).cloned()
    }

    /// Current (history, media groups, countdowns) sizes.
    pub fn sizes(&self) -> (usize, usize, usize) {
        let t = self.tables();
        (t.history.len(), t.media_groups.len(), t.countdowns.len())
    }
}

impl Default for ContextStore {
    fn default() -> Self {
        Self::new(ContextLimits::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{domain::MessageId, messaging::types::VideoRef};

    fn msg(id: i32, text: Option<&str>, video: bool) -> IncomingMessage {
        IncomingMessage {
            chat_id: ChatId(1),
            message_id: MessageId(id),
            text: text.map(str::to_string),
            video: video.then(|| VideoRef {
                file_id: "f".to_string(),
                file_name: None,
            }),
            ..Default::default()
        }
    }

    #[test]
    fn countdown_covers_exactly_n_messages() {
        let store = ContextStore::default();
        store.record_text(&msg(10, Some("2 folder=trip"), false));

        // Two processed messages consume the directive...
        for id in [11, 13] {
            let m = msg(id, None, true);
            let r = store.resolve(&m);
            assert_eq!(r.caption.as_deref(), Some("2 folder=trip"));
            store.tick_countdown(m.message_ref());
        }

        // ...and the third has nothing left to inherit.
        let r = store.resolve(&msg(15, None, true));
        assert_eq!(r, Resolution::none());
        assert!(store.countdown(ChatId(1)).is_none());
    }

    #[test]
    fn history_is_bounded() {
        let store = ContextStore::new(ContextLimits {
            history_capacity: 2,
            media_group_capacity: 2,
            ..Default::default()
        });
        for id in 1..=5 {
            store.record_text(&msg(id, Some("x"), false));
        }
        assert_eq!(store.sizes().0, 2);
        assert_eq!(store.resolve(&msg(2, None, true)), Resolution::none());
        assert_eq!(
            store.resolve(&msg(6, None, true)).source,
            CaptionSource::PreviousMessage
        );
    }

    #[test]
    fn directive_carrier_does_not_consume_its_own_slot() {
        let store = ContextStore::default();
        let carrier = msg(11, Some("2,folder=trip"), true);
        store.record_text(&carrier);
        assert_eq!(store.resolve(&carrier).source, CaptionSource::OwnText);

        assert_eq!(store.tick_countdown(carrier.message_ref()), None);
        assert_eq!(store.countdown(ChatId(1)).unwrap().remaining, 2);

        assert_eq!(store.tick_countdown(msg(13, None, true).message_ref()), Some(1));
        assert_eq!(store.tick_countdown(msg(15, None, true).message_ref()), Some(0));
        assert!(store.countdown(ChatId(1)).is_none());
    }
}
