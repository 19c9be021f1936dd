/// A generic boxed error type.
pub type AnyError = Box<dyn std::error::Error + Send + Sync>;

/// A convenient Result alias returning `AnyError`.
pub type AnyResult<T> = std::result::Result<T, AnyError>;

/// Identifies one locally issued command so its optimistic deltas can be
/// found again when the command fails, expires, or is confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct CommandId(pub uuid::Uuid);

impl CommandId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl std::fmt::Display for CommandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// User-facing intents the gateway can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Intent {
    Play,
    Enqueue,
    Previous,
    Pause,
    Skip,
    Shuffle,
    ClearQueue,
    Jump,
    Remove,
    Reorder,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Play => "play",
            Self::Enqueue => "enqueue",
            Self::Previous => "previous",
            Self::Pause => "pause",
            Self::Skip => "skip",
            Self::Shuffle => "shuffle",
            Self::ClearQueue => "clearQueue",
            Self::Jump => "jump",
            Self::Remove => "remove",
            Self::Reorder => "reorder",
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
