//! HTTP API response DTOs for the room list snapshot.

use serde::{Deserialize, Serialize};

/// Room summary row returned by `GET /api/rooms`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSummaryDto {
    pub room_id: String,
    #[serde(default)]
    pub peer_nickname: Option<String>,
    #[serde(default)]
    pub last_message: Option<String>,
    #[serde(default)]
    pub last_message_time: Option<String>, // ISO 8601
    #[serde(default)]
    pub unread_count: u32,
    #[serde(default)]
    pub profile_image: Option<String>,
}
