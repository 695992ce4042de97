//! Conversation history cleanup.

use std::time::Duration;

use kaab_core::messages::ChatTurn;

/// Default window for collapsing resubmitted turns.
pub const DEFAULT_DUPLICATE_WINDOW: Duration = Duration::from_secs(1);

/// Collapse rapid resubmissions.
///
/// A turn is dropped when the turn immediately before it in the raw history
/// has the same role and text and was stamped less than `window` apart.
pub fn dedupe(history: &[ChatTurn], window: Duration) -> Vec<ChatTurn> {
    let window_ms = window.as_millis();
    let mut kept = Vec::with_capacity(history.len());
    let mut prev: Option<&ChatTurn> = None;

    for turn in history {
        let duplicate = prev.is_some_and(|p| {
            p.role == turn.role
                && p.text == turn.text
                && u128::from((turn.timestamp - p.timestamp).num_milliseconds().unsigned_abs())
                    < window_ms
        });
        if !duplicate {
            kept.push(turn.clone());
        }
        prev = Some(turn);
    }
    kept
}
