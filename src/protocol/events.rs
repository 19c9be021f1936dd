use serde::{Deserialize, Serialize};

use crate::protocol::channel::{UserData, VoiceChannel};
use crate::protocol::tracks::Track;

/// Messages pushed from server to client over the long-lived channel.
///
/// The channel is receive-only from the client's perspective; every
/// client-originated action goes through the REST command surface instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum InboundMessage {
    /// Identity handshake for the local participant.
    UserData { user: UserData },
    /// Membership mirror of the voice channel the session lives in.
    VoiceChannelUpdate { channel: VoiceChannel },
    /// Current track changed. An absent track clears it.
    Update {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        track: Option<Track>,
    },
    /// Player lifecycle tag, as a bare string normalized at the boundary
    /// (older revisions disagree on the tag type, see `PlayerState::parse`).
    PlayerStateUpdate { state: String },
    /// Full queue replacement. An absent list means the queue is empty.
    Queue {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tracks: Option<Vec<Track>>,
    },
}

/// Distinguishes "set the current track" from "clear it" in snapshot
/// payloads, where a missing field means "no statement at all".
#[derive(Debug, Clone, PartialEq)]
pub enum TrackField {
    /// JSON `null`.
    Clear,
    /// JSON object.
    Set(Track),
}

fn deserialize_track_field<'de, D>(deserializer: D) -> Result<Option<TrackField>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: serde_json::Value = Deserialize::deserialize(deserializer)?;
    match value {
        serde_json::Value::Null => Ok(Some(TrackField::Clear)),
        other => serde_json::from_value::<Track>(other)
            .map(|t| Some(TrackField::Set(t)))
            .map_err(serde::de::Error::custom),
    }
}

/// Authoritative session snapshot, as returned by `GET /session` and, in
/// partial form, by the control endpoints. Absent fields carry no statement.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    #[serde(default)]
    pub user_data: Option<UserData>,
    #[serde(default)]
    pub voice_channel: Option<VoiceChannel>,
    #[serde(default, deserialize_with = "deserialize_track_field")]
    pub track: Option<TrackField>,
    #[serde(default)]
    pub player_state: Option<String>,
    #[serde(default)]
    pub queue: Option<Vec<Track>>,
}
