//! Data Transfer Objects for REST request/response serialization.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::hub::MemberInfo;

/// Message to publish, as posted by a producer.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BroadcastRequest {
    /// Message type discriminator copied into the envelope's `type` field.
    #[serde(rename = "type")]
    pub message_type: String,
    /// Arbitrary JSON payload copied into the envelope's `data` field.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub data: serde_json::Value,
}

/// Acknowledgement that a message was queued for fan-out.
///
/// Acceptance does not imply delivery: recipients that are too slow are
/// disconnected instead.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BroadcastAccepted {
    /// Always `true`.
    pub accepted: bool,
    /// Echo of the message type.
    #[serde(rename = "type")]
    pub message_type: String,
    /// Target user id for targeted broadcasts.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub user_id: Option<String>,
}

/// One connected client.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClientDto {
    /// Connection id.
    pub client_id: uuid::Uuid,
    /// Identity token the connection registered with.
    pub user_id: String,
}

impl From<MemberInfo> for ClientDto {
    fn from(member: MemberInfo) -> Self {
        Self {
            client_id: member.client_id.into(),
            user_id: member.user_id,
        }
    }
}

/// Response body of `GET /api/v1/clients`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClientListResponse {
    /// Number of connected clients.
    pub count: usize,
    /// Connected clients, in no particular order.
    pub clients: Vec<ClientDto>,
}
