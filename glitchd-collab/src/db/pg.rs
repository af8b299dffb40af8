use async_trait::async_trait;
use chrono::Utc;
use sqlx::{postgres::PgPoolOptions, query, query_as, Error as SqlxError, PgPool};

use crate::{
    util::new_id, Activity, ChatIdentity, ChatMessage, Database, DatabaseError, DatabaseResult,
    IntoDatabaseError, LoginTokenData, NewActivity, NewChatIdentity, NewLoginToken, NewMessage,
    NewPost, NewUser, Post, Result, RowsAffected, UserData,
};

/// A postgres database implementation for glitchd
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    pub async fn new(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| e.any())?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn user_by_id(&self, user_id: &str) -> Result<UserData> {
        query_as::<_, UserData>(
            "SELECT id, email, username, name, created_at FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("user", "id"))
    }

    async fn user_by_email(&self, email: &str) -> Result<UserData> {
        query_as::<_, UserData>(
            "SELECT id, email, username, name, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("user", "email"))
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserData> {
        self.user_by_email(&new_user.email)
            .await
            .conflict_or_ok("user", "email", &new_user.email)?;

        // The unique index still decides if two registrations race
        query_as::<_, UserData>(
            "INSERT INTO users (id, email, username, name, created_at) VALUES ($1, $2, $3, $4, $5)
            RETURNING id, email, username, name, created_at",
        )
        .bind(new_id())
        .bind(&new_user.email)
        .bind(&new_user.username)
        .bind(&new_user.name)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.conflict_or_any("user", "email", &new_user.email))
    }

    async fn create_login_token(&self, new_token: NewLoginToken) -> Result<LoginTokenData> {
        query_as::<_, LoginTokenData>(
            "INSERT INTO login_tokens (id, user_id, token, created_at) VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, token, created_at",
        )
        .bind(new_id())
        .bind(&new_token.user_id)
        .bind(&new_token.token)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn login_token(&self, user_id: &str, token: &str) -> Result<LoginTokenData> {
        query_as::<_, LoginTokenData>(
            "SELECT id, user_id, token, created_at FROM login_tokens
            WHERE user_id = $1 AND token = $2",
        )
        .bind(user_id)
        .bind(token)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("login_token", "token"))
    }

    async fn delete_login_token(&self, token_id: &str) -> Result<RowsAffected> {
        query("DELETE FROM login_tokens WHERE id = $1")
            .bind(token_id)
            .execute(&self.pool)
            .await
            .map(|r| r.rows_affected())
            .map_err(|e| e.any())
    }

    async fn chat_identity(&self, user_id: &str) -> Result<ChatIdentity> {
        query_as::<_, ChatIdentity>(
            "SELECT id, user_id, color, badge FROM chat_identities WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("chat_identity", "user_id"))
    }

    async fn upsert_chat_identity(
        &self,
        user_id: &str,
        identity: NewChatIdentity,
    ) -> Result<ChatIdentity> {
        query_as::<_, ChatIdentity>(
            "INSERT INTO chat_identities (id, user_id, color, badge) VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE SET color = EXCLUDED.color, badge = EXCLUDED.badge
            RETURNING id, user_id, color, badge",
        )
        .bind(new_id())
        .bind(user_id)
        .bind(&identity.color)
        .bind(&identity.badge)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn create_message(&self, new_message: NewMessage) -> Result<ChatMessage> {
        query_as::<_, ChatMessage>(
            "INSERT INTO messages (id, channel_id, sender_id, message, reply_to, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, channel_id, sender_id, message, reply_to, created_at",
        )
        .bind(new_id())
        .bind(&new_message.channel_id)
        .bind(&new_message.sender_id)
        .bind(&new_message.message)
        .bind(&new_message.reply_to)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn create_post(&self, new_post: NewPost) -> Result<Post> {
        query_as::<_, Post>(
            "INSERT INTO posts (id, channel_id, author_id, message, media, reply_to, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, channel_id, author_id, message, media, reply_to, created_at",
        )
        .bind(new_id())
        .bind(&new_post.channel_id)
        .bind(&new_post.author_id)
        .bind(&new_post.message)
        .bind(&new_post.media)
        .bind(&new_post.reply_to)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn create_activity(&self, new_activity: NewActivity) -> Result<Activity> {
        query_as::<_, Activity>(
            "INSERT INTO activities (id, sender_id, target_id, kind, message, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, sender_id, target_id, kind, message, created_at",
        )
        .bind(new_id())
        .bind(&new_activity.sender_id)
        .bind(&new_activity.target_id)
        .bind(&new_activity.kind)
        .bind(&new_activity.message)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())
    }
}

impl IntoDatabaseError for SqlxError {
    fn any(self) -> DatabaseError {
        DatabaseError::Internal(Box::new(self))
    }

    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError {
        match self {
            SqlxError::RowNotFound => DatabaseError::NotFound {
                resource,
                identifier,
            },
            e => Self::any(e),
        }
    }
}

trait UniqueViolation {
    fn conflict_or_any(self, resource: &'static str, field: &'static str, value: &str)
        -> DatabaseError;
}

impl UniqueViolation for SqlxError {
    fn conflict_or_any(
        self,
        resource: &'static str,
        field: &'static str,
        value: &str,
    ) -> DatabaseError {
        let is_unique_violation =
            matches!(&self, SqlxError::Database(e) if e.is_unique_violation());

        if is_unique_violation {
            return DatabaseError::Conflict {
                resource,
                field,
                value: value.to_string(),
            };
        }

        self.any()
    }
}
