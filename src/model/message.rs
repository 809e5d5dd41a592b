use super::traits::Model;
use super::user::User;
use crate::constants;
use campus_learn::FromPgRow;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, FromPgRow)]
pub struct DirectMessage {
    pub message_id: i64,
    pub sender_id: i64,
    pub recipient_id: i64,
    pub content: String,
    pub material_id: Option<i64>,
    pub is_read: bool,
    pub time_created: i64,
}

impl DirectMessage {
    /// The other side of the exchange, seen from `user_id`.
    pub fn peer_of(&self, user_id: i64) -> i64 {
        if self.sender_id == user_id {
            self.recipient_id
        } else {
            self.sender_id
        }
    }
}

impl Model for DirectMessage {
    fn table_name() -> &'static str {
        constants::MESSAGE_TABLE_NAME
    }
    fn id_column() -> &'static str {
        "message_id"
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct MessageView {
    pub message_id: i64,
    pub sender_id: i64,
    pub sender_name: String,
    pub sender_email: String,
    pub recipient_id: i64,
    pub recipient_name: String,
    pub recipient_email: String,
    pub content: String,
    pub time_created: i64,
    pub is_read: bool,
    pub material_id: Option<i64>,
}

impl MessageView {
    pub fn project(msg: &DirectMessage, sender: Option<&User>, recipient: Option<&User>) -> Self {
        Self {
            message_id: msg.message_id,
            sender_id: msg.sender_id,
            sender_name: sender.map(|u| u.display_name()).unwrap_or_default(),
            sender_email: sender.map(|u| u.email.clone()).unwrap_or_default(),
            recipient_id: msg.recipient_id,
            recipient_name: recipient.map(|u| u.display_name()).unwrap_or_default(),
            recipient_email: recipient.map(|u| u.email.clone()).unwrap_or_default(),
            content: msg.content.clone(),
            time_created: msg.time_created,
            is_read: msg.is_read,
            material_id: msg.material_id,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Conversation {
    pub user_id: i64,
    pub user_name: String,
    pub user_email: String,
    pub last_message: Option<MessageView>,
    pub unread_count: i64,
}
