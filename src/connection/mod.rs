use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use parking_lot::Mutex;
use rand::Rng;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{info, warn};

use crate::common::errors::ChannelError;
use crate::common::notices::Notice;
use crate::config::{SocketConfig, SyncConfig};
use crate::protocol::events::{InboundMessage, SessionSnapshot};
use crate::rest::CommandTransport;
use crate::session::{SessionPatch, SessionStateStore, event_field};

type Socket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Lifecycle of the push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connecting,
    Handshaking,
    Connected,
    Disconnected,
    Reconnecting,
}

/// Owns the push channel: handshake, inbound dispatch into the store,
/// disconnect detection, and the reconnect-triggered resnapshot.
///
/// The wire carries no sequence numbers, so diffed replay across a
/// disconnect window cannot be made correct; recovery is always a full
/// authoritative re-fetch, with events that race the fetch buffered and
/// replayed only where the snapshot carried no statement.
pub struct ConnectionManager<T: CommandTransport> {
    store: Arc<SessionStateStore>,
    transport: Arc<T>,
    socket: SocketConfig,
    sync: SyncConfig,
    state: Mutex<LinkState>,
}

impl<T: CommandTransport> ConnectionManager<T> {
    pub fn new(
        store: Arc<SessionStateStore>,
        transport: Arc<T>,
        socket: SocketConfig,
        sync: SyncConfig,
    ) -> Self {
        Self {
            store,
            transport,
            socket,
            sync,
            state: Mutex::new(LinkState::Disconnected),
        }
    }

    pub fn link_state(&self) -> LinkState {
        *self.state.lock()
    }

    fn transition(&self, next: LinkState) {
        let mut state = self.state.lock();
        if *state != next {
            info!("push channel {:?} -> {next:?}", *state);
            *state = next;
        }
    }

    /// Connects and keeps reconnecting until the task is dropped. Local
    /// state survives a transport loss and is only replaced once the next
    /// resnapshot lands.
    pub async fn run(&self) {
        let mut first = true;
        let mut delay = Duration::from_millis(self.sync.reconnect_delay_ms);
        loop {
            self.transition(LinkState::Connecting);
            match self.open_socket().await {
                Ok(socket) => {
                    delay = Duration::from_millis(self.sync.reconnect_delay_ms);
                    if let Err(e) = self.drive(socket, !first).await {
                        warn!("push channel lost: {e}");
                    }
                    first = false;
                    self.transition(LinkState::Disconnected);
                    self.store.notify(Notice::ChannelLost);
                }
                Err(e) => warn!("push channel connect failed: {e}"),
            }
            self.transition(LinkState::Reconnecting);
            tokio::time::sleep(jittered(delay)).await;
            delay = (delay * 2).min(Duration::from_millis(self.sync.reconnect_max_delay_ms));
        }
    }

    async fn open_socket(&self) -> Result<Socket, ChannelError> {
        let mut request = self.socket.url.as_str().into_client_request()?;
        if let Some(session) = &self.socket.session {
            // Opaque session identifier; never inspected locally.
            let value = session
                .parse()
                .map_err(|e: tokio_tungstenite::tungstenite::http::header::InvalidHeaderValue| {
                    tokio_tungstenite::tungstenite::Error::HttpFormat(e.into())
                })?;
            request
                .headers_mut()
                .insert(tokio_tungstenite::tungstenite::http::header::COOKIE, value);
        }
        let (socket, _) = connect_async(request).await?;
        Ok(socket)
    }

    async fn drive(&self, mut socket: Socket, resync: bool) -> Result<(), ChannelError> {
        self.transition(LinkState::Handshaking);
        if resync {
            self.resnapshot(&mut socket).await?;
            self.transition(LinkState::Connected);
        }
        loop {
            let Some(message) = socket.next().await else {
                return Err(ChannelError::Closed);
            };
            match message? {
                Message::Text(text) => {
                    if let Some(event) = parse_event(text.as_str()) {
                        self.dispatch(event);
                    }
                }
                Message::Close(_) => return Err(ChannelError::Closed),
                _ => {}
            }
        }
    }

    /// Fetches the authoritative snapshot while buffering any events the
    /// reopened channel delivers in the meantime.
    async fn resnapshot(&self, socket: &mut Socket) -> Result<(), ChannelError> {
        let fetch = self.transport.session_snapshot();
        tokio::pin!(fetch);
        let mut buffered = Vec::new();
        let snapshot = loop {
            tokio::select! {
                result = &mut fetch => break result?,
                message = socket.next() => match message {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(event) = parse_event(text.as_str()) {
                            buffered.push(event);
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return Err(ChannelError::Closed),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                },
            }
        };
        apply_resnapshot(&self.store, snapshot, buffered);
        Ok(())
    }

    fn dispatch(&self, event: InboundMessage) {
        let identity = matches!(event, InboundMessage::UserData { .. });
        apply_event(&self.store, event);
        // Identity handshake completes the connection.
        if identity && self.link_state() == LinkState::Handshaking {
            self.transition(LinkState::Connected);
        }
    }
}

fn parse_event(text: &str) -> Option<InboundMessage> {
    match serde_json::from_str::<InboundMessage>(text) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!("bad push message: {e}");
            None
        }
    }
}

/// Applies one push event canonically.
pub(crate) fn apply_event(store: &SessionStateStore, event: InboundMessage) {
    let (patch, anomalies) = SessionPatch::from_event(event);
    for detail in anomalies {
        store.surface_anomaly(detail);
    }
    store.apply_canonical(patch);
}

/// Rebuilds the store from a snapshot, then replays buffered events only
/// for fields the snapshot itself carried no statement about.
pub(crate) fn apply_resnapshot(
    store: &SessionStateStore,
    snapshot: SessionSnapshot,
    buffered: Vec<InboundMessage>,
) {
    let (patch, anomalies) = SessionPatch::from_snapshot(snapshot);
    for detail in anomalies {
        store.surface_anomaly(detail);
    }
    let covered = patch.fields();
    store.resync(patch);
    let replayed = buffered
        .into_iter()
        .filter(|event| !covered.contains(&event_field(event)))
        .collect::<Vec<_>>();
    for event in replayed {
        apply_event(store, event);
    }
    info!("resynchronized from authoritative snapshot");
}

fn jittered(delay: Duration) -> Duration {
    delay.mul_f64(rand::thread_rng().gen_range(0.5..1.5))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::errors::TransportError;
    use crate::protocol::channel::UserData;
    use crate::protocol::events::TrackField;
    use crate::protocol::player::PlayerState;
    use crate::protocol::tracks::Track;

    fn track(id: &str) -> Track {
        Track::placeholder(Some(id.to_string()), id, None)
    }

    struct NoopTransport;

    #[async_trait::async_trait]
    impl CommandTransport for NoopTransport {
        async fn play(&self, _resource: &str) -> Result<(), TransportError> {
            Ok(())
        }
        async fn queue_ids(&self, _ids: &[String]) -> Result<(), TransportError> {
            Ok(())
        }
        async fn previous(&self) -> Result<SessionSnapshot, TransportError> {
            Ok(SessionSnapshot::default())
        }
        async fn pause(&self) -> Result<SessionSnapshot, TransportError> {
            Ok(SessionSnapshot::default())
        }
        async fn skip(&self) -> Result<SessionSnapshot, TransportError> {
            Ok(SessionSnapshot::default())
        }
        async fn shuffle(&self) -> Result<SessionSnapshot, TransportError> {
            Ok(SessionSnapshot::default())
        }
        async fn clear_queue(&self) -> Result<(), TransportError> {
            Ok(())
        }
        async fn jump(&self, _index: usize) -> Result<SessionSnapshot, TransportError> {
            Ok(SessionSnapshot::default())
        }
        async fn remove_index(&self, _index: usize) -> Result<SessionSnapshot, TransportError> {
            Ok(SessionSnapshot::default())
        }
        async fn reorder(
            &self,
            _selected: &[usize],
            _pos: usize,
        ) -> Result<SessionSnapshot, TransportError> {
            Ok(SessionSnapshot::default())
        }
        async fn session_snapshot(&self) -> Result<SessionSnapshot, TransportError> {
            Ok(SessionSnapshot::default())
        }
    }

    #[test]
    fn test_identity_handshake_completes_connection() {
        let (store, _notices) = SessionStateStore::new();
        let store = Arc::new(store);
        let manager = ConnectionManager::new(
            store.clone(),
            Arc::new(NoopTransport),
            SocketConfig {
                url: "ws://127.0.0.1:9/socket".to_string(),
                session: None,
            },
            SyncConfig::default(),
        );
        assert_eq!(manager.link_state(), LinkState::Disconnected);

        manager.transition(LinkState::Handshaking);
        // A non-identity event does not complete the handshake.
        manager.dispatch(InboundMessage::Queue { tracks: None });
        assert_eq!(manager.link_state(), LinkState::Handshaking);

        manager.dispatch(InboundMessage::UserData {
            user: UserData::default(),
        });
        assert_eq!(manager.link_state(), LinkState::Connected);
        assert!(store.snapshot().user.is_some());
    }

    #[test]
    fn test_resnapshot_overrides_buffered_stale_events() {
        let (store, _notices) = SessionStateStore::new();

        // Pre-disconnect view.
        store.apply_canonical(
            SessionPatch::current(track("old")).with_player_state(PlayerState::Playing),
        );

        // Stale events raced the snapshot fetch; the snapshot covers both
        // of their fields, so they must not survive the resync.
        let buffered = vec![
            InboundMessage::Update {
                track: Some(track("stale")),
            },
            InboundMessage::Queue {
                tracks: Some(vec![track("stale-q")]),
            },
        ];
        let snapshot = SessionSnapshot {
            track: Some(TrackField::Set(track("fresh"))),
            player_state: Some("playing".to_string()),
            queue: Some(vec![track("q1"), track("q2")]),
            ..SessionSnapshot::default()
        };

        apply_resnapshot(&store, snapshot, buffered);

        let session = store.snapshot();
        assert_eq!(session.current.as_ref().unwrap().id.as_deref(), Some("fresh"));
        assert_eq!(session.player_state, PlayerState::Playing);
        assert_eq!(session.queue.len(), 2);
    }

    #[test]
    fn test_buffered_event_replayed_when_snapshot_silent() {
        let (store, _notices) = SessionStateStore::new();

        // Snapshot says nothing about the voice channel; the buffered
        // membership update is the freshest statement and must survive.
        let channel = crate::protocol::channel::VoiceChannel {
            name: "listening".to_string(),
            members: Vec::new(),
            guild: crate::protocol::channel::Guild {
                id: "g1".to_string(),
                name: "guild".to_string(),
                icon: String::new(),
            },
        };
        let buffered = vec![InboundMessage::VoiceChannelUpdate {
            channel: channel.clone(),
        }];
        let snapshot = SessionSnapshot {
            track: Some(TrackField::Clear),
            queue: Some(Vec::new()),
            ..SessionSnapshot::default()
        };

        apply_resnapshot(&store, snapshot, buffered);

        let session = store.snapshot();
        assert_eq!(session.voice_channel, Some(channel));
        assert!(session.current.is_none());
        assert_eq!(session.player_state, PlayerState::Idle);
    }

    #[test]
    fn test_unknown_state_tag_is_surfaced_not_stored() {
        let (store, notices) = SessionStateStore::new();
        store.apply_canonical(
            SessionPatch::current(track("a")).with_player_state(PlayerState::Playing),
        );

        apply_event(
            &store,
            InboundMessage::PlayerStateUpdate {
                state: "warming-up".to_string(),
            },
        );

        assert_eq!(store.snapshot().player_state, PlayerState::Playing);
        assert!(matches!(
            notices.try_recv(),
            Ok(Notice::ReconciliationAnomaly { .. })
        ));
    }
}
