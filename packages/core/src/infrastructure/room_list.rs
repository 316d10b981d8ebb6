//! Room list snapshot source.
//!
//! The store is rebuilt from a server-fetched snapshot plus live events. The snapshot
//! comes from `GET {base_url}/api/rooms`.

use async_trait::async_trait;
use thiserror::Error;
use tsunagi_shared::time::rfc3339_to_timestamp;

use crate::{
    domain::{Credentials, MessageBody, Nickname, RoomId, RoomSummary, Timestamp, ValueObjectError},
    infrastructure::dto::http::RoomSummaryDto,
};

/// Errors while fetching the room list
#[derive(Debug, Error)]
pub enum RoomListError {
    #[error("room list request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("room list request returned HTTP {0}")]
    Status(u16),
}

/// Source of room list snapshots
#[async_trait]
pub trait RoomListSource: Send + Sync {
    async fn fetch(&self, credentials: &Credentials) -> Result<Vec<RoomSummary>, RoomListError>;
}

/// Fetches the room list over HTTP with the session's bearer token
#[derive(Debug, Clone)]
pub struct HttpRoomListSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRoomListSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn rooms_url(&self) -> String {
        format!("{}/api/rooms", self.base_url)
    }
}

#[async_trait]
impl RoomListSource for HttpRoomListSource {
    async fn fetch(&self, credentials: &Credentials) -> Result<Vec<RoomSummary>, RoomListError> {
        let response = self
            .client
            .get(self.rooms_url())
            .bearer_auth(credentials.token.expose())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RoomListError::Status(status.as_u16()));
        }

        let rows: Vec<RoomSummaryDto> = response.json().await?;
        Ok(summaries_from_rows(rows))
    }
}

/// Convert DTO rows, skipping rows with invalid values
pub fn summaries_from_rows(rows: Vec<RoomSummaryDto>) -> Vec<RoomSummary> {
    rows.into_iter()
        .filter_map(|row| {
            let room_id = row.room_id.clone();
            match RoomSummary::try_from(row) {
                Ok(summary) => Some(summary),
                Err(e) => {
                    tracing::warn!("Skipping room list row '{}': {}", room_id, e);
                    None
                }
            }
        })
        .collect()
}

impl TryFrom<RoomSummaryDto> for RoomSummary {
    type Error = ValueObjectError;

    fn try_from(dto: RoomSummaryDto) -> Result<Self, Self::Error> {
        let mut summary = RoomSummary::new(RoomId::new(dto.room_id)?);
        summary.peer_nickname = dto
            .peer_nickname
            .filter(|name| !name.trim().is_empty())
            .map(Nickname::new)
            .transpose()?;
        summary.last_message = dto
            .last_message
            .filter(|body| !body.is_empty())
            .map(MessageBody::new)
            .transpose()?;
        summary.last_message_time = dto
            .last_message_time
            .as_deref()
            .and_then(rfc3339_to_timestamp)
            .map(Timestamp::new);
        summary.unread_count = dto.unread_count;
        summary.profile_image_ref = dto.profile_image.filter(|url| !url.is_empty());
        Ok(summary)
    }
}
