pub mod rules;
pub mod store;

pub use store::*;

use crate::protocol::channel::{UserData, VoiceChannel};
use crate::protocol::events::{InboundMessage, SessionSnapshot, TrackField};
use crate::protocol::player::PlayerState;
use crate::protocol::tracks::Track;
use crate::queue::QueueModel;

/// The reconciled aggregate: everything the client knows about the shared
/// playback session. Created empty at connection open, populated by the
/// handshake, mutated only through [`store::SessionStateStore`], reset on
/// disconnect and rebuilt from a fresh snapshot on reconnect.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub user: Option<UserData>,
    pub voice_channel: Option<VoiceChannel>,
    pub current: Option<Track>,
    pub queue: QueueModel,
    pub player_state: PlayerState,
}

/// The logical fields reconciliation operates over. Canonical and
/// optimistic updates to the *same* field race; per-field resolution
/// (canonical always wins) is what makes the unordered sources safe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionField {
    User,
    VoiceChannel,
    Current,
    Queue,
    PlayerState,
}

/// A partial update to the session. Unset fields carry no statement;
/// `current` distinguishes "set" from "clear" with a nested option.
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub user: Option<UserData>,
    pub voice_channel: Option<VoiceChannel>,
    pub current: Option<Option<Track>>,
    pub queue: Option<Vec<Track>>,
    pub player_state: Option<PlayerState>,
}

impl SessionPatch {
    pub fn current(track: Track) -> Self {
        Self {
            current: Some(Some(track)),
            ..Self::default()
        }
    }

    pub fn clear_current() -> Self {
        Self {
            current: Some(None),
            ..Self::default()
        }
    }

    pub fn queue(tracks: Vec<Track>) -> Self {
        Self {
            queue: Some(tracks),
            ..Self::default()
        }
    }

    pub fn player_state(state: PlayerState) -> Self {
        Self {
            player_state: Some(state),
            ..Self::default()
        }
    }

    pub fn with_player_state(mut self, state: PlayerState) -> Self {
        self.player_state = Some(state);
        self
    }

    /// The logical fields this patch touches.
    pub fn fields(&self) -> Vec<SessionField> {
        let mut fields = Vec::new();
        if self.user.is_some() {
            fields.push(SessionField::User);
        }
        if self.voice_channel.is_some() {
            fields.push(SessionField::VoiceChannel);
        }
        if self.current.is_some() {
            fields.push(SessionField::Current);
        }
        if self.queue.is_some() {
            fields.push(SessionField::Queue);
        }
        if self.player_state.is_some() {
            fields.push(SessionField::PlayerState);
        }
        fields
    }

    /// Translates an inbound push message. Returns the patch together with
    /// any boundary anomalies (currently only unrecognized state tags, in
    /// which case the field is dropped rather than propagated untyped).
    pub fn from_event(event: InboundMessage) -> (Self, Vec<String>) {
        let mut anomalies = Vec::new();
        let patch = match event {
            InboundMessage::UserData { user } => Self {
                user: Some(user),
                ..Self::default()
            },
            InboundMessage::VoiceChannelUpdate { channel } => Self {
                voice_channel: Some(channel),
                ..Self::default()
            },
            InboundMessage::Update { track } => Self {
                current: Some(track),
                ..Self::default()
            },
            InboundMessage::PlayerStateUpdate { state } => match PlayerState::parse(&state) {
                Some(state) => Self::player_state(state),
                None => {
                    anomalies.push(format!("unrecognized player state tag {state:?}"));
                    Self::default()
                }
            },
            InboundMessage::Queue { tracks } => Self {
                queue: Some(tracks.unwrap_or_default()),
                ..Self::default()
            },
        };
        (patch, anomalies)
    }

    /// Translates an authoritative snapshot (resnapshot fetch or a control
    /// endpoint's response body).
    pub fn from_snapshot(snapshot: SessionSnapshot) -> (Self, Vec<String>) {
        let mut anomalies = Vec::new();
        let player_state = snapshot.player_state.and_then(|tag| {
            let parsed = PlayerState::parse(&tag);
            if parsed.is_none() {
                anomalies.push(format!("unrecognized player state tag {tag:?} in snapshot"));
            }
            parsed
        });
        let patch = Self {
            user: snapshot.user_data,
            voice_channel: snapshot.voice_channel,
            current: snapshot.track.map(|field| match field {
                TrackField::Clear => None,
                TrackField::Set(track) => Some(track),
            }),
            queue: snapshot.queue,
            player_state,
        };
        (patch, anomalies)
    }
}

/// The logical field an inbound message targets, used by the reconnect
/// path to decide whether a buffered event survived the resnapshot.
pub fn event_field(event: &InboundMessage) -> SessionField {
    match event {
        InboundMessage::UserData { .. } => SessionField::User,
        InboundMessage::VoiceChannelUpdate { .. } => SessionField::VoiceChannel,
        InboundMessage::Update { .. } => SessionField::Current,
        InboundMessage::PlayerStateUpdate { .. } => SessionField::PlayerState,
        InboundMessage::Queue { .. } => SessionField::Queue,
    }
}

/// One field's value, captured for the rollback ledger.
#[derive(Debug, Clone)]
pub(crate) enum FieldValue {
    User(Option<UserData>),
    VoiceChannel(Option<VoiceChannel>),
    Current(Option<Track>),
    Queue(Vec<Track>),
    PlayerState(PlayerState),
}

impl Session {
    pub(crate) fn capture(&self, field: SessionField) -> FieldValue {
        match field {
            SessionField::User => FieldValue::User(self.user.clone()),
            SessionField::VoiceChannel => FieldValue::VoiceChannel(self.voice_channel.clone()),
            SessionField::Current => FieldValue::Current(self.current.clone()),
            SessionField::Queue => FieldValue::Queue(self.queue.tracks().to_vec()),
            SessionField::PlayerState => FieldValue::PlayerState(self.player_state),
        }
    }

    pub(crate) fn restore(&mut self, value: FieldValue) {
        match value {
            FieldValue::User(user) => self.user = user,
            FieldValue::VoiceChannel(channel) => self.voice_channel = channel,
            FieldValue::Current(track) => self.current = track,
            FieldValue::Queue(tracks) => self.queue.replace(tracks),
            FieldValue::PlayerState(state) => self.player_state = state,
        }
    }

    pub(crate) fn apply(&mut self, patch: SessionPatch) {
        if let Some(user) = patch.user {
            self.user = Some(user);
        }
        if let Some(channel) = patch.voice_channel {
            self.voice_channel = Some(channel);
        }
        if let Some(current) = patch.current {
            self.current = current;
        }
        if let Some(tracks) = patch.queue {
            self.queue.replace(tracks);
        }
        if let Some(state) = patch.player_state {
            self.player_state = state;
        }
    }
}
