use serde::{Deserialize, Serialize};

/// The local participant's identity as delivered by the handshake.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub global_name: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default, rename = "defaultAvatarURL")]
    pub default_avatar_url: String,
    #[serde(default, rename = "avatarURL")]
    pub avatar_url: String,
    #[serde(default, rename = "displayAvatarURL")]
    pub display_avatar_url: String,
}

/// A remote participant. Read-only mirror; mutated only by push events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub global_name: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub bot: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceState {
    #[serde(default)]
    pub self_deaf: bool,
    #[serde(default)]
    pub self_mute: bool,
    #[serde(default)]
    pub self_video: bool,
    #[serde(default)]
    pub server_deaf: bool,
    #[serde(default)]
    pub streaming: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub user: User,
    pub voice: VoiceState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Guild {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceChannel {
    pub name: String,
    #[serde(default)]
    pub members: Vec<Member>,
    pub guild: Guild,
}

const AVATAR_FALLBACK: &str = "/assets/18e336a74a159cfd.png";

/// CDN avatar URL for a user, falling back to the bundled asset when the
/// user has no uploaded avatar.
pub fn avatar_url(id: &str, avatar: &str, size: u32) -> String {
    if avatar.is_empty() {
        AVATAR_FALLBACK.to_string()
    } else {
        format!("https://cdn.discordapp.com/avatars/{id}/{avatar}.webp?size={size}")
    }
}
