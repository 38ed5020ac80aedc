use serde::{Deserialize, Serialize};

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Room {
    pub id: String,
    pub code: String,
    pub name: String,
    pub host_fingerprint: String,
    pub is_locked: bool,
    pub created_at: i64,
    pub last_activity_at: i64,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Participant {
    pub id: String,
    pub room_id: String,
    pub username: String,
    pub fingerprint: String,
    pub is_muted: bool,
    pub is_banned: bool,
    pub joined_at: i64,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BanRecord {
    pub room_id: String,
    pub fingerprint: String,
}

/// The three message shapes share one row; the variant decides which of the
/// optional columns carry data.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum MessageBody {
    Text {
        content: String,
        reply_to_id: Option<String>,
    },
    File {
        content: String,
        file_url: String,
        file_name: String,
        file_type: Option<String>,
    },
    System {
        content: String,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Message {
    pub id: String,
    pub room_id: String,
    /// None for system messages not attributed to a participant.
    pub participant_id: Option<String>,
    pub username: String,
    pub body: MessageBody,
    pub created_at: i64,
}

impl Message {
    pub fn text(
        room_id: &str,
        participant: &Participant,
        content: String,
        reply_to_id: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            room_id: room_id.to_string(),
            participant_id: Some(participant.id.clone()),
            username: participant.username.clone(),
            body: MessageBody::Text {
                content,
                reply_to_id,
            },
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn file(
        room_id: &str,
        participant: &Participant,
        file_url: String,
        file_name: String,
        file_type: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            room_id: room_id.to_string(),
            participant_id: Some(participant.id.clone()),
            username: participant.username.clone(),
            body: MessageBody::File {
                content: format!("Shared file: {}", file_name),
                file_url,
                file_name,
                file_type,
            },
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn system(
        room_id: &str,
        participant_id: Option<String>,
        username: &str,
        content: String,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            room_id: room_id.to_string(),
            participant_id,
            username: username.to_string(),
            body: MessageBody::System { content },
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self.body {
            MessageBody::Text { .. } => "text",
            MessageBody::File { .. } => "file",
            MessageBody::System { .. } => "system",
        }
    }

    pub fn content(&self) -> &str {
        match &self.body {
            MessageBody::Text { content, .. } => content,
            MessageBody::File { content, .. } => content,
            MessageBody::System { content } => content,
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self.body, MessageBody::System { .. })
    }
}

/// Flat shape of the messages table; converted to [`Message`] at the store
/// boundary.
#[derive(sqlx::FromRow, Debug, Clone)]
pub(crate) struct MessageRow {
    pub id: String,
    pub room_id: String,
    pub participant_id: Option<String>,
    pub username: String,
    pub content: Option<String>,
    pub message_type: String,
    pub reply_to_id: Option<String>,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
    pub file_type: Option<String>,
    pub created_at: i64,
}

impl TryFrom<MessageRow> for Message {
    type Error = anyhow::Error;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        let body = match row.message_type.as_str() {
            "text" => MessageBody::Text {
                content: row.content.unwrap_or_default(),
                reply_to_id: row.reply_to_id,
            },
            "file" => MessageBody::File {
                content: row.content.unwrap_or_default(),
                file_url: row
                    .file_url
                    .ok_or_else(|| anyhow::anyhow!("file message {} has no file_url", row.id))?,
                file_name: row.file_name.unwrap_or_default(),
                file_type: row.file_type,
            },
            "system" => MessageBody::System {
                content: row.content.unwrap_or_default(),
            },
            other => anyhow::bail!("unknown message_type '{}' for message {}", other, row.id),
        };

        Ok(Message {
            id: row.id,
            room_id: row.room_id,
            participant_id: row.participant_id,
            username: row.username,
            body,
            created_at: row.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(message_type: &str) -> MessageRow {
        MessageRow {
            id: "m1".into(),
            room_id: "r1".into(),
            participant_id: None,
            username: "System".into(),
            content: Some("hello".into()),
            message_type: message_type.into(),
            reply_to_id: None,
            file_url: Some("http://blobs/x".into()),
            file_name: Some("x.txt".into()),
            file_type: Some("text/plain".into()),
            created_at: 0,
        }
    }

    #[test]
    fn row_converts_each_kind() {
        assert_eq!(Message::try_from(row("text")).unwrap().kind(), "text");
        assert_eq!(Message::try_from(row("file")).unwrap().kind(), "file");
        assert!(Message::try_from(row("system")).unwrap().is_system());
    }

    #[test]
    fn messages_serialize_with_their_variant() {
        let m = Message::system("r1", None, "System", "alice joined the room".into());
        let json = serde_json::to_string(&m).unwrap();
        assert!(json.contains("System"));
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert!(Message::try_from(row("sticker")).is_err());
    }

    #[test]
    fn file_without_url_is_rejected() {
        let mut r = row("file");
        r.file_url = None;
        assert!(Message::try_from(r).is_err());
    }
}
