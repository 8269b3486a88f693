//! Notification router
//!
//! Applies server-pushed events to the session store, in arrival order.
//! Sessions for turn-scoped events are located by their active turn, never
//! by a cached reference, since the active turn changes between events.

pub mod assembler;

use tracing::{debug, trace};

use crate::protocol::{ServerNotification, TurnEnded};
use crate::session::{Session, SessionStore};

/// Apply one notification; returns true if the store changed
pub fn route(store: &mut SessionStore, notification: ServerNotification) -> bool {
    match notification {
        ServerNotification::Initialized => false,

        ServerNotification::TurnStarted(event) => {
            let Some(session) = store.get_mut(&event.thread_id) else {
                debug!(thread_id = %event.thread_id, "turn/started for unknown session");
                return false;
            };
            debug!(thread_id = %event.thread_id, turn_id = %event.turn_id, "Turn started");
            session.active_turn_id = Some(event.turn_id);
            session.last_error = None;
            true
        }

        ServerNotification::ItemProgress(event) => {
            let Some(text) = event.delta.as_text() else {
                trace!(turn_id = %event.turn_id, kind = %event.delta.kind, "Ignoring non-text delta");
                return false;
            };
            let Some(session) = store.find_by_turn_mut(&event.turn_id) else {
                debug!(turn_id = %event.turn_id, "item/progress for unknown turn");
                return false;
            };
            assembler::push_delta(session, &event.turn_id, text);
            true
        }

        ServerNotification::ItemCreated(event) => {
            let Some(session) = store.find_by_turn_mut(&event.turn_id) else {
                debug!(turn_id = %event.turn_id, "item/created for unknown turn");
                return false;
            };
            assembler::push_item(session, &event.turn_id, event.item);
            true
        }

        ServerNotification::PermissionDenied(event) => {
            let Some(session) = store.get_mut(&event.thread_id) else {
                debug!(thread_id = %event.thread_id, "Denial for unknown session");
                return false;
            };
            debug!(
                thread_id = %event.thread_id,
                count = event.denials.len(),
                "Permission denied"
            );
            session.record_denials(event.denials);
            true
        }

        ServerNotification::TurnCompleted(event) => end_turn(store, &event, TurnOutcome::Completed),

        ServerNotification::TurnError(event) => {
            let outcome = TurnOutcome::Failed(event.error_message());
            end_turn(store, &event, outcome)
        }
    }
}

/// Locate by thread id, falling back to the active turn
fn ended_session<'a>(store: &'a mut SessionStore, event: &TurnEnded) -> Option<&'a mut Session> {
    match (&event.thread_id, &event.turn_id) {
        (Some(thread_id), _) => store.get_mut(thread_id),
        (None, Some(turn_id)) => store.find_by_turn_mut(turn_id),
        (None, None) => None,
    }
}

enum TurnOutcome {
    Completed,
    Failed(Option<String>),
}

fn end_turn(store: &mut SessionStore, event: &TurnEnded, outcome: TurnOutcome) -> bool {
    let Some(session) = ended_session(store, event) else {
        debug!(
            thread_id = ?event.thread_id,
            turn_id = ?event.turn_id,
            "Turn end for unknown session"
        );
        return false;
    };

    let finalized = assembler::finalize_all(session);
    session.active_turn_id = None;
    session.completed_turns += 1;

    match outcome {
        TurnOutcome::Completed => {
            debug!(thread_id = %session.thread_id, finalized, "Turn completed");
        }
        TurnOutcome::Failed(message) => {
            debug!(thread_id = %session.thread_id, error = ?message, "Turn failed");
            if message.is_some() {
                session.last_error = message;
            }
        }
    }
    true
}
