use std::sync::Arc;
use std::time::Duration;

use crate::common::errors::{CommandError, QueueError, TransportError};
use crate::common::notices::Notice;
use crate::common::types::{CommandId, Intent};
use crate::protocol::events::SessionSnapshot;
use crate::protocol::player::PlayerState;
use crate::protocol::tracks::Track;
use crate::rest::CommandTransport;
use crate::session::{SessionPatch, SessionStateStore};

/// Translates user intents into outbound commands.
///
/// Every intent follows the same shape: validate locally, apply an
/// optimistic delta tagged with a fresh command id, issue the call, and on
/// transport failure roll the delta back and surface the failure. A
/// successful delta stays in place until a canonical push supersedes it, a
/// returned snapshot confirms it, or its expiry elapses.
pub struct CommandGateway<T: CommandTransport> {
    store: Arc<SessionStateStore>,
    transport: Arc<T>,
    expiry: Duration,
}

impl<T: CommandTransport> CommandGateway<T> {
    pub fn new(store: Arc<SessionStateStore>, transport: Arc<T>, expiry: Duration) -> Self {
        Self {
            store,
            transport,
            expiry,
        }
    }

    /// Plays an ad-hoc resource. Optimistically shows a placeholder track
    /// in the buffering state; the server's `update` push replaces it.
    pub async fn play(&self, resource: &str) -> Result<(), CommandError> {
        let id = CommandId::generate();
        let placeholder = Track::placeholder(None, resource, self.store.user().as_ref());
        self.store.apply_optimistic(
            SessionPatch::current(placeholder)
                .with_player_state(PlayerState::Buffering),
            id,
            Intent::Play,
            self.expiry,
        );
        match self.transport.play(resource).await {
            Ok(()) => Ok(()),
            Err(source) => self.fail(id, Intent::Play, source),
        }
    }

    /// Appends tracks by identifier, showing placeholders until the
    /// canonical queue payload arrives.
    pub async fn enqueue(&self, ids: Vec<String>) -> Result<(), CommandError> {
        let command = CommandId::generate();
        let user = self.store.user();
        let mut queue = self.store.queue();
        queue.append(
            ids.iter()
                .map(|id| Track::placeholder(Some(id.clone()), id.clone(), user.as_ref()))
                .collect(),
        );
        self.store.apply_optimistic(
            SessionPatch::queue(queue.into_tracks()),
            command,
            Intent::Enqueue,
            self.expiry,
        );
        match self.transport.queue_ids(&ids).await {
            Ok(()) => Ok(()),
            Err(source) => self.fail(command, Intent::Enqueue, source),
        }
    }

    /// No optimistic delta is guaranteed correct for the transport
    /// controls: the command is registered for expiry tracking only and
    /// the returned snapshot is what updates the view.
    pub async fn previous(&self) -> Result<(), CommandError> {
        let id = self.register(Intent::Previous);
        let result = self.transport.previous().await;
        self.resolve(id, Intent::Previous, result)
    }

    pub async fn pause(&self) -> Result<(), CommandError> {
        let id = self.register(Intent::Pause);
        let result = self.transport.pause().await;
        self.resolve(id, Intent::Pause, result)
    }

    pub async fn skip(&self) -> Result<(), CommandError> {
        let id = self.register(Intent::Skip);
        let result = self.transport.skip().await;
        self.resolve(id, Intent::Skip, result)
    }

    pub async fn shuffle(&self) -> Result<(), CommandError> {
        let id = self.register(Intent::Shuffle);
        let result = self.transport.shuffle().await;
        self.resolve(id, Intent::Shuffle, result)
    }

    pub async fn clear_queue(&self) -> Result<(), CommandError> {
        let id = CommandId::generate();
        self.store
            .apply_optimistic(SessionPatch::queue(Vec::new()), id, Intent::ClearQueue, self.expiry);
        match self.transport.clear_queue().await {
            Ok(()) => Ok(()),
            Err(source) => self.fail(id, Intent::ClearQueue, source),
        }
    }

    /// Jumps to a queued track. Rejected locally when the index is out of
    /// range; no command is issued in that case.
    pub async fn jump(&self, index: usize) -> Result<(), CommandError> {
        let queue = self.store.queue();
        let target = queue
            .get(index)
            .cloned()
            .ok_or(QueueError::OutOfRange {
                index,
                len: queue.len(),
            })?;
        let id = CommandId::generate();
        self.store.apply_optimistic(
            SessionPatch::current(target)
                .with_player_state(PlayerState::Buffering),
            id,
            Intent::Jump,
            self.expiry,
        );
        let result = self.transport.jump(index).await;
        self.resolve(id, Intent::Jump, result)
    }

    pub async fn remove_index(&self, index: usize) -> Result<(), CommandError> {
        let mut queue = self.store.queue();
        queue.remove_at(index)?;
        let id = CommandId::generate();
        self.store.apply_optimistic(
            SessionPatch::queue(queue.into_tracks()),
            id,
            Intent::Remove,
            self.expiry,
        );
        let result = self.transport.remove_index(index).await;
        self.resolve(id, Intent::Remove, result)
    }

    pub async fn reorder(&self, selected: &[usize], pos: usize) -> Result<(), CommandError> {
        let mut queue = self.store.queue();
        queue.reorder(selected, pos)?;
        let id = CommandId::generate();
        self.store.apply_optimistic(
            SessionPatch::queue(queue.into_tracks()),
            id,
            Intent::Reorder,
            self.expiry,
        );
        let result = self.transport.reorder(selected, pos).await;
        self.resolve(id, Intent::Reorder, result)
    }

    fn register(&self, intent: Intent) -> CommandId {
        let id = CommandId::generate();
        self.store
            .apply_optimistic(SessionPatch::default(), id, intent, self.expiry);
        id
    }

    fn resolve(
        &self,
        id: CommandId,
        intent: Intent,
        result: Result<SessionSnapshot, TransportError>,
    ) -> Result<(), CommandError> {
        match result {
            Ok(snapshot) => {
                let (patch, anomalies) = SessionPatch::from_snapshot(snapshot);
                for detail in anomalies {
                    self.store.surface_anomaly(detail);
                }
                self.store.apply_canonical(patch);
                self.store.confirm(id);
                Ok(())
            }
            Err(source) => self.fail(id, intent, source),
        }
    }

    fn fail(
        &self,
        id: CommandId,
        intent: Intent,
        source: TransportError,
    ) -> Result<(), CommandError> {
        self.store.rollback(id);
        self.store.notify(Notice::CommandFailed {
            intent,
            cause: source.to_string(),
        });
        Err(CommandError::Failed { intent, source })
    }
}
