use super::traits::Model;
use crate::constants;
use campus_learn::FromPgRow;
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fmt::{Display, Formatter};
use tokio_postgres::types::{FromSql, IsNull, ToSql, Type};

/// Stored as text so clients see the same words the database holds.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Comment,
    NewPost,
    NewTopic,
    Like,
    Message,
    TicketResponse,
    NewTicket,
    #[default]
    System,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Comment => "comment",
            NotificationType::NewPost => "new_post",
            NotificationType::NewTopic => "new_topic",
            NotificationType::Like => "like",
            NotificationType::Message => "message",
            NotificationType::TicketResponse => "ticket_response",
            NotificationType::NewTicket => "new_ticket",
            NotificationType::System => "system",
        }
    }

    /// Icon used in the full email template.
    pub fn icon(&self) -> &'static str {
        match self {
            NotificationType::Comment => "💬",
            NotificationType::NewPost => "📝",
            NotificationType::NewTopic => "📌",
            NotificationType::Like => "❤️",
            NotificationType::Message => "✉️",
            NotificationType::TicketResponse => "💡",
            NotificationType::NewTicket => "🎫",
            NotificationType::System => "🔔",
        }
    }
}

impl Display for NotificationType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for NotificationType {
    type Error = String;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Ok(match s {
            "comment" => NotificationType::Comment,
            "new_post" => NotificationType::NewPost,
            "new_topic" => NotificationType::NewTopic,
            "like" => NotificationType::Like,
            "message" => NotificationType::Message,
            "ticket_response" => NotificationType::TicketResponse,
            "new_ticket" => NotificationType::NewTicket,
            "system" => NotificationType::System,
            other => return Err(format!("unknown notification type {}", other)),
        })
    }
}

impl<'a> FromSql<'a> for NotificationType {
    fn from_sql(
        ty: &Type,
        raw: &'a [u8],
    ) -> Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        let s = <&str as FromSql>::from_sql(ty, raw)?;
        NotificationType::try_from(s).map_err(|e| e.into())
    }
    fn accepts(ty: &Type) -> bool {
        <&str as FromSql>::accepts(ty)
    }
}

impl ToSql for NotificationType {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut bytes::BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        <&str as ToSql>::to_sql(&self.as_str(), ty, out)
    }
    fn accepts(ty: &Type) -> bool {
        <&str as ToSql>::accepts(ty)
    }
    tokio_postgres::types::to_sql_checked!();
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, FromPgRow)]
pub struct Notification {
    pub notification_id: i64,
    pub user_id: i64,
    pub title: String,
    pub message: String,
    pub kind: NotificationType,
    pub related_id: Option<i64>,
    pub is_read: bool,
    pub time_created: i64,
}

impl Model for Notification {
    fn table_name() -> &'static str {
        constants::NOTIFICATION_TABLE_NAME
    }
    fn id_column() -> &'static str {
        "notification_id"
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub user_id: i64,
    pub title: String,
    pub message: String,
    pub kind: NotificationType,
    pub related_id: Option<i64>,
}

impl NewNotification {
    pub fn new(
        user_id: i64,
        title: &str,
        message: &str,
        kind: NotificationType,
        related_id: Option<i64>,
    ) -> Self {
        Self {
            user_id,
            title: title.to_string(),
            message: message.to_string(),
            kind,
            related_id,
        }
    }

    pub fn into_notification(self, time_created: i64) -> Notification {
        Notification {
            notification_id: 0,
            user_id: self.user_id,
            title: self.title,
            message: self.message,
            kind: self.kind,
            related_id: self.related_id,
            is_read: false,
            time_created,
        }
    }
}
