//! Streaming assembler
//!
//! Builds the live assistant output of a turn. Text deltas accumulate in a
//! streaming placeholder `T:stream`; finalized items collect in `T:items`.
//! Both are keyed by turn, so output of one turn never lands in a message
//! belonging to another.

use crate::session::Session;
use crate::types::{AssistantMessage, ChatMessage, StoredItem};

/// Message id of the streaming placeholder for a turn
pub fn stream_id(turn_id: &str) -> String {
    format!("{turn_id}:stream")
}

/// Message id of the finalized item message for a turn
pub fn items_id(turn_id: &str) -> String {
    format!("{turn_id}:items")
}

fn is_live_stream_of(msg: &ChatMessage, turn_id: &str) -> bool {
    msg.as_assistant()
        .is_some_and(|a| a.is_streaming() && a.turn_id == turn_id)
}

/// Append a text delta for `turn_id`
///
/// Extends this turn's live stream wherever it sits in the history; without
/// one, a new placeholder seeded with the delta is appended.
pub fn push_delta(session: &mut Session, turn_id: &str, text: &str) {
    if let Some(msg) = session
        .messages
        .iter_mut()
        .rev()
        .find(|msg| is_live_stream_of(msg, turn_id))
        .and_then(ChatMessage::as_assistant_mut)
    {
        msg.push_delta(text);
        return;
    }

    session
        .messages
        .push(ChatMessage::Assistant(AssistantMessage::streaming(
            stream_id(turn_id),
            turn_id,
            text,
        )));
}

/// Append a finalized item for `turn_id`
///
/// The turn's streaming placeholder is dropped; the item goes into the
/// turn's item message, created on first use.
pub fn push_item(session: &mut Session, turn_id: &str, item: StoredItem) {
    session
        .messages
        .retain(|msg| !is_live_stream_of(msg, turn_id));

    let key = items_id(turn_id);
    let existing = session
        .messages
        .iter_mut()
        .rev()
        .filter_map(ChatMessage::as_assistant_mut)
        .find(|msg| msg.id == key);

    match existing {
        Some(msg) => {
            msg.push_item(item);
        }
        None => {
            let mut msg = AssistantMessage::finalized(key, turn_id);
            msg.push_item(item);
            session.messages.push(ChatMessage::Assistant(msg));
        }
    }
}

/// Close every message still streaming
pub fn finalize_all(session: &mut Session) -> usize {
    let mut closed = 0;
    for msg in session
        .messages
        .iter_mut()
        .filter_map(ChatMessage::as_assistant_mut)
        .filter(|msg| msg.is_streaming())
    {
        msg.finalize();
        closed += 1;
    }
    closed
}
