//! Lifecycle plausibility checks for canonical updates.
//!
//! There is no local transition graph: the server's state always wins.
//! What the client enforces is the coupling between the lifecycle tag and
//! the current track — a patch that leaves the two incoherent is either
//! completed (when the server's intent is unambiguous) or applied as-is
//! with a surfaced anomaly (when it is not).

use crate::protocol::player::PlayerState;
use crate::session::{Session, SessionPatch};

/// Normalizes a canonical patch against the current session and returns
/// the anomalies it implied. Mutates the patch in place; the caller
/// applies whatever remains.
pub(crate) fn reconcile_canonical(patch: &mut SessionPatch, session: &Session) -> Vec<String> {
    let mut anomalies = Vec::new();

    // A finished-queue report means playback ended: fold it into a clear.
    if let Some(Some(track)) = &patch.current {
        if track.queue_finished {
            let queue_len = patch
                .queue
                .as_ref()
                .map(Vec::len)
                .unwrap_or_else(|| session.queue.len());
            if queue_len != 0 {
                anomalies.push(format!(
                    "track {:?} reports queueFinished with {queue_len} queued tracks",
                    track.label()
                ));
            }
            patch.current = Some(None);
            if patch.player_state.is_none() {
                patch.player_state = Some(PlayerState::Idle);
            }
        }
    }

    let next_current = match &patch.current {
        Some(current) => current.as_ref(),
        None => session.current.as_ref(),
    };

    match patch.player_state {
        // Playing/Paused/AutoPaused without a track is impossible; the
        // server is authoritative so the value still goes in, but loudly.
        Some(state) if state.requires_track() && next_current.is_none() => {
            anomalies.push(format!("player state {state} arrived without a current track"));
        }
        // Idle means no resource; a leftover track is cleared with it.
        Some(PlayerState::Idle) => {
            if next_current.is_some() && patch.current.is_none() {
                patch.current = Some(None);
            }
        }
        // The patch says nothing about the lifecycle: keep the coupling
        // invariant (current is absent iff idle) by inferring it.
        None => match &patch.current {
            Some(None) if session.player_state != PlayerState::Idle => {
                patch.player_state = Some(PlayerState::Idle);
            }
            Some(Some(_)) if session.player_state == PlayerState::Idle => {
                patch.player_state = Some(PlayerState::Buffering);
            }
            _ => {}
        },
        Some(_) => {}
    }

    anomalies
}
