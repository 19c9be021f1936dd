use serde::{Deserialize, Serialize};

use crate::protocol::channel::UserData;
use crate::protocol::player::{PlayerState, lenient_player_state};

/// A single queue entry as carried on the wire.
///
/// `queue_index` is meaningful only while the track is a member of the
/// queue; it always mirrors the track's array position and is reassigned
/// on every membership or order change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    /// Absent for ad-hoc resources (direct links, local files).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub artists: Vec<Artist>,
    pub length_ms: u64,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(rename = "type")]
    pub track_type: String,
    pub requester: Requester,
    /// Elapsed playback in milliseconds at the time of reporting.
    #[serde(default)]
    pub playback_duration: u64,
    /// True only when the player is idle and the queue has run out.
    #[serde(default)]
    pub queue_finished: bool,
    /// Player-state tag at the time the track was reported.
    #[serde(default, deserialize_with = "lenient_player_state")]
    pub player_state: Option<PlayerState>,
    pub queue_index: usize,
}

impl Track {
    /// Display label: prefers `name`, then `title`, then the id.
    pub fn label(&self) -> &str {
        self.name
            .as_deref()
            .or(self.title.as_deref())
            .or(self.id.as_deref())
            .unwrap_or("<unknown>")
    }

    /// Provisional entry standing in for a resource the server has not
    /// yet resolved, attributed to the local participant when known.
    pub fn placeholder(id: Option<String>, label: impl Into<String>, user: Option<&UserData>) -> Self {
        Self {
            id,
            name: Some(label.into()),
            title: None,
            artists: Vec::new(),
            length_ms: 0,
            images: Vec::new(),
            track_type: "pending".to_string(),
            requester: user.map(Requester::from).unwrap_or_default(),
            playback_duration: 0,
            queue_finished: false,
            player_state: None,
            queue_index: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artist {
    #[serde(default)]
    pub external_urls: ExternalUrls,
    #[serde(default)]
    pub href: String,
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub artist_type: String,
    #[serde(default)]
    pub uri: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalUrls {
    #[serde(default)]
    pub spotify: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
}

/// The participant who asked for a track.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requester {
    pub username: String,
    pub avatar: String,
    pub id: String,
}

impl From<&UserData> for Requester {
    fn from(user: &UserData) -> Self {
        Self {
            username: user.username.clone(),
            avatar: user.avatar.clone(),
            id: user.id.clone(),
        }
    }
}
