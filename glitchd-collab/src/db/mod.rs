use async_trait::async_trait;
use thiserror::Error;

mod data;
pub use data::*;

mod memory;
pub use memory::*;

mod pg;
pub use pg::*;

pub type Result<T> = std::result::Result<T, DatabaseError>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    /// An unknown or internal error happened with the database
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    /// A resource already exists
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        /// The resource in question
        resource: &'static str,
        /// The field that is conflicting
        field: &'static str,
        /// The conflicting value
        value: String,
    },
    /// A resource in the database doesn't exist
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
}

/// Helper trait to reduce boilerplate
pub trait IntoDatabaseError {
    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError;
    fn any(self) -> DatabaseError;
}

/// Helper trait to reduce boilerplate
pub trait DatabaseResult {
    /// Turns the Result into a conflict error if it's Ok()
    fn conflict_or_ok(self, resource: &'static str, field: &'static str, value: &str)
        -> Result<()>;
}

impl<T> DatabaseResult for Result<T> {
    fn conflict_or_ok(
        self,
        resource: &'static str,
        field: &'static str,
        value: &str,
    ) -> Result<()> {
        match self {
            Ok(_) => Err(DatabaseError::Conflict {
                resource,
                field,
                value: value.to_string(),
            }),
            Err(DatabaseError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// The storage gateway glitchd reads and writes its data through.
///
/// Writes that can race report the rows they touched, so callers can tell who won.
#[async_trait]
pub trait Database: Send + Sync {
    async fn user_by_id(&self, user_id: &str) -> Result<UserData>;
    async fn user_by_email(&self, email: &str) -> Result<UserData>;
    /// Fails with [DatabaseError::Conflict] if the email is taken
    async fn create_user(&self, new_user: NewUser) -> Result<UserData>;

    async fn create_login_token(&self, new_token: NewLoginToken) -> Result<LoginTokenData>;
    /// Finds a login token matching both the user and the code
    async fn login_token(&self, user_id: &str, token: &str) -> Result<LoginTokenData>;
    /// Deletes a login token. Only one caller can ever observe a non-zero result.
    async fn delete_login_token(&self, token_id: &str) -> Result<RowsAffected>;

    async fn chat_identity(&self, user_id: &str) -> Result<ChatIdentity>;
    /// Creates the user's chat identity, or replaces the existing one
    async fn upsert_chat_identity(
        &self,
        user_id: &str,
        identity: NewChatIdentity,
    ) -> Result<ChatIdentity>;

    async fn create_message(&self, new_message: NewMessage) -> Result<ChatMessage>;
    async fn create_post(&self, new_post: NewPost) -> Result<Post>;
    async fn create_activity(&self, new_activity: NewActivity) -> Result<Activity>;
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewLoginToken {
    pub user_id: PrimaryKey,
    pub token: String,
}

#[derive(Debug, Clone)]
pub struct NewChatIdentity {
    pub color: String,
    pub badge: String,
}

impl Default for NewChatIdentity {
    /// The identity given to users on their first login
    fn default() -> Self {
        Self {
            color: "#FF0000".to_string(),
            badge: String::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub channel_id: PrimaryKey,
    pub sender_id: PrimaryKey,
    pub message: String,
    pub reply_to: Option<PrimaryKey>,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    /// The channel whose feed the post appears on
    pub channel_id: PrimaryKey,
    pub author_id: PrimaryKey,
    pub message: String,
    pub media: Option<String>,
    pub reply_to: Option<PrimaryKey>,
}

#[derive(Debug, Clone)]
pub struct NewActivity {
    pub sender_id: PrimaryKey,
    pub target_id: PrimaryKey,
    pub kind: String,
    pub message: String,
}
