//! Caption resolution as an ordered list of rules.
//!
//! The first rule that yields a caption wins:
//!
//! 1. the message's own text,
//! 2. the text of the message right before it in the same chat,
//! 3. the caption remembered for its media group,
//! 4. the chat's active countdown directive.

use crate::{domain::MessageRef, messaging::types::IncomingMessage};

use super::ContextTables;

/// Which rule produced a [`Resolution`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptionSource {
    OwnText,
    PreviousMessage,
    MediaGroup,
    Countdown,
    None,
}

impl CaptionSource {
    pub fn as_str(self) -> &'static str {
        match self {
            CaptionSource::OwnText => "own_text",
            CaptionSource::PreviousMessage => "previous_message",
            CaptionSource::MediaGroup => "media_group",
            CaptionSource::Countdown => "countdown",
            CaptionSource::None => "none",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub caption: Option<String>,
    /// Message-id offset from the message that originally carried the caption.
    pub delta: Option<i32>,
    pub source: CaptionSource,
}

impl Resolution {
    pub fn none() -> Self {
        Self {
            caption: None,
            delta: None,
            source: CaptionSource::None,
        }
    }
}

type Rule = fn(&mut ContextTables, &IncomingMessage) -> Option<Resolution>;

pub(crate) const RULES: [Rule; 4] = [own_text, previous_message, media_group, countdown];

pub(crate) fn resolve(tables: &mut ContextTables, msg: &IncomingMessage) -> Resolution {
    RULES
        .iter()
        .find_map(|rule| rule(tables, msg))
        .unwrap_or_else(Resolution::none)
}

/// Side effects of seeing a text-bearing message: remember it for lookback
/// and install a countdown when it starts with a count.
pub(crate) fn record_text(tables: &mut ContextTables, msg: &IncomingMessage) -> bool {
    let Some(text) = msg.non_empty_text() else {
        return false;
    };
    tables.history.record(msg.message_ref(), text);
    tables
        .countdowns
        .install_if_directive(msg.chat_id, msg.message_id, text);
    true
}

fn own_text(tables: &mut ContextTables, msg: &IncomingMessage) -> Option<Resolution> {
    if !record_text(tables, msg) {
        return None;
    }
    Some(Resolution {
        caption: msg.text.clone(),
        delta: None,
        source: CaptionSource::OwnText,
    })
}

fn previous_message(tables: &mut ContextTables, msg: &IncomingMessage) -> Option<Resolution> {
    let prev = MessageRef {
        chat_id: msg.chat_id,
        message_id: msg.message_id.previous(),
    };
    let text = tables.history.get(&prev)?;

    if let Some(group_id) = msg.non_empty_media_group() {
        tables.media_groups.upsert(group_id, &text, prev.message_id);
    }

    Some(Resolution {
        caption: Some(text),
        delta: None,
        source: CaptionSource::PreviousMessage,
    })
}

fn media_group(tables: &mut ContextTables, msg: &IncomingMessage) -> Option<Resolution> {
    let group_id = msg.non_empty_media_group()?;
    let ctx = tables.media_groups.get(group_id)?;
    Some(Resolution {
        caption: Some(ctx.caption),
        delta: Some(msg.message_id.delta_from(ctx.origin)),
        source: CaptionSource::MediaGroup,
    })
}

fn countdown(tables: &mut ContextTables, msg: &IncomingMessage) -> Option<Resolution> {
    let directive = tables.countdowns.get(msg.chat_id)?;
    Some(Resolution {
        caption: Some(directive.caption.clone()),
        delta: Some(msg.message_id.delta_from(directive.origin)),
        source: CaptionSource::Countdown,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        context::ContextTables,
        domain::{ChatId, MessageId},
        messaging::types::VideoRef,
    };

    fn tables() -> ContextTables {
        ContextTables::new(crate::context::ContextLimits {
            history_capacity: 100,
            media_group_capacity: 100,
            idle_ttl: None,
        })
    }

    fn text(chat: i64, id: i32, t: &str) -> IncomingMessage {
        IncomingMessage {
            chat_id: ChatId(chat),
            message_id: MessageId(id),
            text: Some(t.to_string()),
            ..Default::default()
        }
    }

    fn video(chat: i64, id: i32, group: Option<&str>) -> IncomingMessage {
        IncomingMessage {
            chat_id: ChatId(chat),
            message_id: MessageId(id),
            media_group_id: group.map(str::to_string),
            video: Some(VideoRef {
                file_id: format!("f{id}"),
                file_name: None,
            }),
            ..Default::default()
        }
    }

    #[test]
    fn lookback_beats_media_group_and_refreshes_it() {
        let mut t = tables();
        record_text(&mut t, &text(1, 10, "file=a"));
        resolve(&mut t, &video(1, 11, Some("g")));
        record_text(&mut t, &text(1, 12, "file=b"));

        let r = resolve(&mut t, &video(1, 13, Some("g")));
        assert_eq!(r.source, CaptionSource::PreviousMessage);
        assert_eq!(r.caption.as_deref(), Some("file=b"));
        assert_eq!(t.media_groups.get("g").unwrap().origin, MessageId(12));
    }

    #[test]
    fn own_text_wins_and_is_recorded() {
        let mut t = tables();
        let r = resolve(&mut t, &text(1, 5, "folder=a"));
        assert_eq!(r.source, CaptionSource::OwnText);
        assert_eq!(r.caption.as_deref(), Some("folder=a"));
        assert_eq!(r.delta, None);
        assert_eq!(
            t.history.get(&MessageRef {
                chat_id: ChatId(1),
                message_id: MessageId(5)
            })
            .as_deref(),
            Some("folder=a")
        );
    }

    #[test]
    fn whitespace_text_is_not_a_caption() {
        let mut t = tables();
        let r = resolve(&mut t, &text(1, 5, "   "));
        assert_eq!(r, Resolution::none());
        assert!(t.history.is_empty());
    }

    #[test]
    fn text_then_video_uses_lookback_without_delta() {
        let mut t = tables();
        record_text(&mut t, &text(1, 10, "folder=trip"));
        let r = resolve(&mut t, &video(1, 11, None));
        assert_eq!(r.source, CaptionSource::PreviousMessage);
        assert_eq!(r.caption.as_deref(), Some("folder=trip"));
        assert_eq!(r.delta, None);
    }

    #[test]
    fn lookback_is_scoped_to_the_chat() {
        let mut t = tables();
        record_text(&mut t, &text(1, 10, "folder=trip"));
        assert_eq!(resolve(&mut t, &video(2, 11, None)), Resolution::none());
    }

    #[test]
    fn album_after_standalone_caption() {
        let mut t = tables();
        record_text(&mut t, &text(1, 10, "file=beach"));

        let first = resolve(&mut t, &video(1, 11, Some("g")));
        assert_eq!(first.source, CaptionSource::PreviousMessage);
        assert_eq!(first.delta, None);

        let second = resolve(&mut t, &video(1, 12, Some("g")));
        assert_eq!(second.source, CaptionSource::MediaGroup);
        assert_eq!(second.caption.as_deref(), Some("file=beach"));
        assert_eq!(second.delta, Some(2));

        let third = resolve(&mut t, &video(1, 13, Some("g")));
        assert_eq!(third.delta, Some(3));
    }

    #[test]
    fn album_with_caption_on_first_item() {
        let mut t = tables();
        let mut first = video(1, 11, Some("g"));
        first.text = Some("file=beach".to_string());

        assert_eq!(resolve(&mut t, &first).source, CaptionSource::OwnText);

        let second = resolve(&mut t, &video(1, 12, Some("g")));
        assert_eq!(second.source, CaptionSource::PreviousMessage);
        assert_eq!(second.delta, None);

        let third = resolve(&mut t, &video(1, 13, Some("g")));
        assert_eq!(third.source, CaptionSource::MediaGroup);
        assert_eq!(third.delta, Some(2));
    }

    #[test]
    fn media_group_context_is_overwritten_not_merged() {
        let mut t = tables();
        record_text(&mut t, &text(1, 10, "file=a"));
        resolve(&mut t, &video(1, 11, Some("g")));
        record_text(&mut t, &text(1, 20, "file=b"));
        resolve(&mut t, &video(1, 21, Some("g")));

        let ctx = t.media_groups.get("g").unwrap();
        assert_eq!(ctx.caption, "file=b");
        assert_eq!(ctx.origin, MessageId(20));
    }

    #[test]
    fn media_group_beats_countdown() {
        let mut t = tables();
        record_text(&mut t, &text(1, 10, "5 file=count"));
        record_text(&mut t, &text(1, 20, "file=album"));
        resolve(&mut t, &video(1, 21, Some("g")));

        let r = resolve(&mut t, &video(1, 22, Some("g")));
        assert_eq!(r.source, CaptionSource::MediaGroup);
        assert_eq!(r.caption.as_deref(), Some("file=album"));
    }

    #[test]
    fn countdown_applies_with_delta() {
        let mut t = tables();
        record_text(&mut t, &text(1, 10, "2,folder=trip"));
        t.countdowns.tick(ChatId(1));

        let r = resolve(&mut t, &video(1, 14, None));
        assert_eq!(r.source, CaptionSource::Countdown);
        assert_eq!(r.caption.as_deref(), Some("2,folder=trip"));
        assert_eq!(r.delta, Some(4));
    }

    #[test]
    fn nothing_to_resolve() {
        let mut t = tables();
        assert_eq!(resolve(&mut t, &video(1, 1, Some("g"))), Resolution::none());
        assert!(t.media_groups.is_empty());
    }
}
