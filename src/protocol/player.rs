use serde::{Deserialize, Serialize};

/// Playback lifecycle tags as reported by the server.
///
/// `Idle` means no current resource exists; `Buffering` means one is being
/// prepared; the remaining three all imply a current resource. There is no
/// locally driven transition: the server is authoritative and the client
/// only validates that an update arrives with a plausible track context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerState {
    #[default]
    Idle,
    Buffering,
    Playing,
    Paused,
    /// Pause imposed by the player itself, not by a participant.
    AutoPaused,
}

impl PlayerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Buffering => "buffering",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::AutoPaused => "autopaused",
        }
    }

    /// Normalizes an inbound wire tag. Some client revisions sent the tag
    /// as a bare string, so unknown values are possible and must be
    /// rejected at the channel boundary rather than stored untyped.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "idle" => Some(Self::Idle),
            "buffering" => Some(Self::Buffering),
            "playing" => Some(Self::Playing),
            "paused" => Some(Self::Paused),
            "autopaused" => Some(Self::AutoPaused),
            _ => None,
        }
    }

    /// Whether this tag implies that a current track exists.
    pub fn requires_track(&self) -> bool {
        matches!(self, Self::Playing | Self::Paused | Self::AutoPaused)
    }
}

impl std::fmt::Display for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lenient deserializer for tags embedded in track payloads: unknown tags
/// become `None` instead of failing the whole message.
pub fn lenient_player_state<'de, D>(deserializer: D) -> Result<Option<PlayerState>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let tag: Option<String> = Deserialize::deserialize(deserializer)?;
    Ok(tag.and_then(|t| {
        let parsed = PlayerState::parse(&t);
        if parsed.is_none() {
            tracing::warn!("unrecognized player state tag: {:?}", t);
        }
        parsed
    }))
}
