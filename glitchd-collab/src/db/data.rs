use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// The type used for primary keys in the database, a uuid in text form.
pub type PrimaryKey = String;

/// The amount of rows a write touched
pub type RowsAffected = u64;

/// A glitchd account
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    pub id: PrimaryKey,
    pub email: String,
    pub username: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A one-time login code issued to a user.
/// It is deleted once it has been exchanged for a session.
#[derive(Debug, Clone, FromRow)]
pub struct LoginTokenData {
    pub id: PrimaryKey,
    pub user_id: PrimaryKey,
    /// The code sent to the user
    pub token: String,
    pub created_at: DateTime<Utc>,
}

/// How a user appears in chat
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ChatIdentity {
    pub id: PrimaryKey,
    pub user_id: PrimaryKey,
    /// Name color, as a hex string
    pub color: String,
    pub badge: String,
}

/// A message sent in a channel's chat
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: PrimaryKey,
    pub channel_id: PrimaryKey,
    pub sender_id: PrimaryKey,
    pub message: String,
    /// The message this one replies to, if any
    pub reply_to: Option<PrimaryKey>,
    pub created_at: DateTime<Utc>,
}

/// A post on a channel's feed
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: PrimaryKey,
    pub channel_id: PrimaryKey,
    pub author_id: PrimaryKey,
    pub message: String,
    pub media: Option<String>,
    pub reply_to: Option<PrimaryKey>,
    pub created_at: DateTime<Utc>,
}

/// Something that happened to a channel, like a follow or a membership purchase
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: PrimaryKey,
    pub sender_id: PrimaryKey,
    /// The channel the activity is about
    pub target_id: PrimaryKey,
    pub kind: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}
