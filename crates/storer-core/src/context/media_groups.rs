use std::{fmt, time::Duration};

use moka::sync::Cache;

use crate::domain::MessageId;

use super::cache::{context_cache, settled_len};

/// Caption discovered for an album, and the message that carried it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaGroupContext {
    pub caption: String,
    pub origin: MessageId,
}

pub struct MediaGroups {
    groups: Cache<String, MediaGroupContext>,
}

impl MediaGroups {
    pub fn new(capacity: usize, idle: Option<Duration>) -> Self {
        Self {
            groups: context_cache(capacity, idle),
        }
    }

    /// Replace (never merge) the context of `group_id`.
    pub fn upsert(&mut self, group_id: &str, caption: &str, origin: MessageId) {
        self.groups.insert(
            group_id.to_string(),
            MediaGroupContext {
                caption: caption.to_string(),
                origin,
            },
        );
    }

    pub fn get(&self, group_id: &str) -> Option<MediaGroupContext> {
        self.groups.get(group_id)
    }

    pub fn len(&self) -> usize {
        settled_len(&self.groups)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for MediaGroups {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaGroups")
            .field("groups", &self.groups.entry_count())
            .finish()
    }
}
