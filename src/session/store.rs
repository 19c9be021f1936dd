use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::common::notices::Notice;
use crate::common::types::{CommandId, Intent};
use crate::protocol::channel::UserData;
use crate::queue::QueueModel;
use crate::session::rules::reconcile_canonical;
use crate::session::{FieldValue, Session, SessionField, SessionPatch};

/// The single mutation entry point for the session aggregate.
///
/// Every update — canonical push events, optimistic command deltas,
/// rollbacks — goes through here, one atomic mutation per call; the lock
/// is never held across a suspension point. Canonical updates always win:
/// applying one discards any outstanding optimistic tag for the same
/// logical field (forgotten, not rolled back — the visible value is
/// already correct).
pub struct SessionStateStore {
    inner: Mutex<Inner>,
    notices: flume::Sender<Notice>,
}

#[derive(Default)]
struct Inner {
    session: Session,
    /// Outstanding optimistic commands, oldest first.
    pending: Vec<PendingCommand>,
}

struct PendingCommand {
    id: CommandId,
    intent: Intent,
    deadline: Instant,
    deltas: Vec<FieldDelta>,
    /// Distinguishes a command whose deltas were all superseded (resolved)
    /// from one that never had any (pause/skip-style, resolved only by a
    /// confirming snapshot or expiry).
    had_deltas: bool,
}

struct FieldDelta {
    field: SessionField,
    prior: FieldValue,
}

impl SessionStateStore {
    /// Creates an empty store together with the notice channel the UI
    /// layer drains.
    pub fn new() -> (Self, flume::Receiver<Notice>) {
        let (tx, rx) = flume::unbounded();
        (
            Self {
                inner: Mutex::new(Inner::default()),
                notices: tx,
            },
            rx,
        )
    }

    pub fn snapshot(&self) -> Session {
        self.inner.lock().session.clone()
    }

    pub fn user(&self) -> Option<UserData> {
        self.inner.lock().session.user.clone()
    }

    pub fn queue(&self) -> QueueModel {
        self.inner.lock().session.queue.clone()
    }

    /// Applies an authoritative update. Anomalies found while normalizing
    /// are surfaced but never block the update.
    pub fn apply_canonical(&self, mut patch: SessionPatch) {
        let anomalies = {
            let mut inner = self.inner.lock();
            let anomalies = reconcile_canonical(&mut patch, &inner.session);
            let fields = patch.fields();
            inner.session.apply(patch);
            for command in &mut inner.pending {
                command.deltas.retain(|delta| !fields.contains(&delta.field));
            }
            inner
                .pending
                .retain(|command| !(command.had_deltas && command.deltas.is_empty()));
            anomalies
        };
        for detail in anomalies {
            self.surface_anomaly(detail);
        }
    }

    /// Applies a provisional delta tagged with its originating command.
    /// The prior value of each touched field is captured so the delta can
    /// be reverted if the command fails or expires unconfirmed. An empty
    /// patch registers the command for expiry tracking only.
    pub fn apply_optimistic(
        &self,
        patch: SessionPatch,
        id: CommandId,
        intent: Intent,
        expires_in: Duration,
    ) {
        let mut inner = self.inner.lock();
        let deltas: Vec<FieldDelta> = patch
            .fields()
            .into_iter()
            .map(|field| FieldDelta {
                field,
                prior: inner.session.capture(field),
            })
            .collect();
        let had_deltas = !deltas.is_empty();
        inner.session.apply(patch);
        inner.pending.push(PendingCommand {
            id,
            intent,
            deadline: Instant::now() + expires_in,
            deltas,
            had_deltas,
        });
    }

    /// Reverts exactly the deltas tagged with `id` that have not since
    /// been superseded by a canonical update. No-op if none remain.
    pub fn rollback(&self, id: CommandId) -> bool {
        rollback_locked(&mut self.inner.lock(), id)
    }

    /// Drops a pending command whose effect has just been confirmed by an
    /// authoritative echo; any of its surviving deltas become final.
    pub fn confirm(&self, id: CommandId) {
        self.inner.lock().pending.retain(|command| command.id != id);
    }

    /// Rolls back every optimistic delta whose expiry has passed and
    /// surfaces the unknown outcome. Prevents unconfirmed state from being
    /// displayed indefinitely.
    pub fn expire_stale(&self) {
        let now = Instant::now();
        let expired = {
            let mut inner = self.inner.lock();
            let expired: Vec<(CommandId, Intent)> = inner
                .pending
                .iter()
                .filter(|command| command.deadline <= now)
                .map(|command| (command.id, command.intent))
                .collect();
            for (id, _) in &expired {
                rollback_locked(&mut inner, *id);
            }
            expired
        };
        for (id, intent) in expired {
            warn!("command {intent} ({id}) unconfirmed past its deadline, rolling back");
            let _ = self.notices.send(Notice::CommandOutcomeUnknown { intent });
        }
    }

    /// Rebuilds the aggregate wholesale from a reconnect snapshot. All
    /// pending optimistic state predates the disconnect and is dropped.
    pub fn resync(&self, mut patch: SessionPatch) {
        let anomalies = {
            let mut inner = self.inner.lock();
            inner.pending.clear();
            inner.session = Session::default();
            let anomalies = reconcile_canonical(&mut patch, &inner.session);
            inner.session.apply(patch);
            anomalies
        };
        for detail in anomalies {
            self.surface_anomaly(detail);
        }
        let _ = self.notices.send(Notice::Resynced);
    }

    /// Tears the session down to empty. Used when the client closes for
    /// good; during reconnects the stale view is kept until the
    /// resnapshot lands.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.session = Session::default();
        inner.pending.clear();
    }

    pub fn surface_anomaly(&self, detail: String) {
        warn!("reconciliation anomaly: {detail}");
        let _ = self.notices.send(Notice::ReconciliationAnomaly { detail });
    }

    pub(crate) fn notify(&self, notice: Notice) {
        debug!("surfacing notice: {notice:?}");
        let _ = self.notices.send(notice);
    }
}

fn rollback_locked(inner: &mut Inner, id: CommandId) -> bool {
    let Some(position) = inner.pending.iter().position(|command| command.id == id) else {
        return false;
    };
    let command = inner.pending.remove(position);
    for delta in command.deltas.into_iter().rev() {
        // A newer optimistic delta for the same field keeps the visible
        // value and inherits this one's prior, so rolling the newer
        // command back later still lands on the true pre-command state.
        let newer = inner.pending[position..]
            .iter_mut()
            .flat_map(|command| command.deltas.iter_mut())
            .find(|other| other.field == delta.field);
        match newer {
            Some(other) => other.prior = delta.prior,
            None => inner.session.restore(delta.prior),
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::player::PlayerState;
    use crate::protocol::tracks::Track;

    fn track(id: &str) -> Track {
        Track::placeholder(Some(id.to_string()), id, None)
    }

    fn store() -> (SessionStateStore, flume::Receiver<Notice>) {
        SessionStateStore::new()
    }

    const EXPIRY: Duration = Duration::from_secs(5);

    #[test]
    fn test_canonical_supersedes_optimistic() {
        let (store, _notices) = store();
        let id = CommandId::generate();
        store.apply_optimistic(
            SessionPatch::current(track("optimistic")).with_player_state(PlayerState::Buffering),
            id,
            Intent::Jump,
            EXPIRY,
        );

        store.apply_canonical(
            SessionPatch::current(track("canonical")).with_player_state(PlayerState::Playing),
        );

        let session = store.snapshot();
        assert_eq!(session.current.as_ref().unwrap().id.as_deref(), Some("canonical"));
        assert_eq!(session.player_state, PlayerState::Playing);

        // The optimistic tag was discarded, not rolled back: reverting the
        // command now must change nothing.
        store.rollback(id);
        let session = store.snapshot();
        assert_eq!(session.current.as_ref().unwrap().id.as_deref(), Some("canonical"));
        assert_eq!(session.player_state, PlayerState::Playing);
    }

    #[test]
    fn test_rollback_is_field_for_field_inverse() {
        let (store, _notices) = store();
        store.apply_canonical(
            SessionPatch::queue(vec![track("a"), track("b")]),
        );
        let before = store.snapshot();

        let id = CommandId::generate();
        store.apply_optimistic(
            SessionPatch {
                current: Some(Some(track("b"))),
                queue: Some(vec![track("a")]),
                player_state: Some(PlayerState::Buffering),
                ..SessionPatch::default()
            },
            id,
            Intent::Jump,
            EXPIRY,
        );
        assert_ne!(store.snapshot(), before);

        assert!(store.rollback(id));
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_stacked_rollbacks_land_on_pre_command_state() {
        let (store, _notices) = store();
        store.apply_canonical(SessionPatch::queue(vec![track("a"), track("b"), track("c")]));
        let original = store.snapshot();

        let first = CommandId::generate();
        store.apply_optimistic(
            SessionPatch::queue(vec![track("b"), track("c")]),
            first,
            Intent::Remove,
            EXPIRY,
        );
        let second = CommandId::generate();
        store.apply_optimistic(
            SessionPatch::queue(vec![track("c")]),
            second,
            Intent::Remove,
            EXPIRY,
        );

        // Rolling back the older command first must not clobber the newer
        // delta; rolling back both restores the original queue.
        assert!(store.rollback(first));
        assert_eq!(store.queue().len(), 1);
        assert!(store.rollback(second));
        assert_eq!(store.snapshot(), original);
    }

    #[test]
    fn test_expiry_rolls_back_and_surfaces_unknown_outcome() {
        let (store, notices) = store();
        let before = store.snapshot();
        let id = CommandId::generate();
        store.apply_optimistic(
            SessionPatch::queue(vec![track("ghost")]),
            id,
            Intent::Enqueue,
            Duration::ZERO,
        );

        store.expire_stale();
        assert_eq!(store.snapshot(), before);
        assert_eq!(
            notices.try_recv(),
            Ok(Notice::CommandOutcomeUnknown {
                intent: Intent::Enqueue
            })
        );
        // Already rolled back; a late failure path must be a no-op.
        assert!(!store.rollback(id));
    }

    #[test]
    fn test_zero_delta_command_resolves_only_by_confirm_or_expiry() {
        let (store, notices) = store();
        let id = CommandId::generate();
        store.apply_optimistic(SessionPatch::default(), id, Intent::Pause, EXPIRY);

        // An unrelated canonical update must not resolve it.
        store.apply_canonical(SessionPatch::queue(vec![track("a")]));
        store.confirm(id);
        store.expire_stale();
        assert!(notices.try_recv().is_err(), "confirmed command must not expire");
    }

    #[test]
    fn test_idle_iff_no_current_track_through_event_flow() {
        let (store, _notices) = store();

        let check = |session: &Session| {
            assert_eq!(
                session.current.is_none(),
                session.player_state == PlayerState::Idle,
                "idle/current coupling broken: {session:?}"
            );
        };

        check(&store.snapshot());
        store.apply_canonical(SessionPatch::current(track("a")));
        check(&store.snapshot());
        store.apply_canonical(SessionPatch::player_state(PlayerState::Playing));
        check(&store.snapshot());
        store.apply_canonical(SessionPatch::clear_current());
        check(&store.snapshot());
        store.apply_canonical(SessionPatch::current(track("b")));
        store.apply_canonical(SessionPatch::player_state(PlayerState::Idle));
        check(&store.snapshot());
    }

    #[test]
    fn test_resync_drops_pending_and_rebuilds() {
        let (store, notices) = store();
        store.apply_optimistic(
            SessionPatch::queue(vec![track("stale")]),
            CommandId::generate(),
            Intent::Enqueue,
            EXPIRY,
        );

        store.resync(SessionPatch {
            current: Some(Some(track("fresh"))),
            queue: Some(vec![track("x"), track("y")]),
            player_state: Some(PlayerState::Playing),
            ..SessionPatch::default()
        });

        let session = store.snapshot();
        assert_eq!(session.current.as_ref().unwrap().id.as_deref(), Some("fresh"));
        assert_eq!(session.queue.len(), 2);
        assert_eq!(notices.try_recv(), Ok(Notice::Resynced));

        // Nothing left to expire.
        store.expire_stale();
        assert!(notices.try_recv().is_err());
    }
}
