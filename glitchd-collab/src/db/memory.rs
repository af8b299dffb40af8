use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use crate::{
    util::new_id, Activity, ChatIdentity, ChatMessage, Database, DatabaseError, LoginTokenData,
    NewActivity, NewChatIdentity, NewLoginToken, NewMessage, NewPost, NewUser, Post, Result,
    RowsAffected, UserData,
};

/// An in-memory database, used in development and tests.
/// Every table sits behind its own lock, which gives row-level atomicity for deletes.
#[derive(Default)]
pub struct MemoryDatabase {
    users: Mutex<Vec<UserData>>,
    login_tokens: Mutex<HashMap<String, LoginTokenData>>,
    /// Keyed by user id
    chat_identities: Mutex<HashMap<String, ChatIdentity>>,
    messages: Mutex<Vec<ChatMessage>>,
    posts: Mutex<Vec<Post>>,
    activities: Mutex<Vec<Activity>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every outstanding login token of a user
    pub fn login_tokens_of(&self, user_id: &str) -> Vec<LoginTokenData> {
        self.login_tokens
            .lock()
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn messages_in(&self, channel_id: &str) -> Vec<ChatMessage> {
        self.messages
            .lock()
            .iter()
            .filter(|m| m.channel_id == channel_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn user_by_id(&self, user_id: &str) -> Result<UserData> {
        self.users
            .lock()
            .iter()
            .find(|u| u.id == user_id)
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "user",
                identifier: "id",
            })
    }

    async fn user_by_email(&self, email: &str) -> Result<UserData> {
        self.users
            .lock()
            .iter()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "user",
                identifier: "email",
            })
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserData> {
        let mut users = self.users.lock();

        if users.iter().any(|u| u.email == new_user.email) {
            return Err(DatabaseError::Conflict {
                resource: "user",
                field: "email",
                value: new_user.email,
            });
        }

        let user = UserData {
            id: new_id(),
            email: new_user.email,
            username: new_user.username,
            name: new_user.name,
            created_at: Utc::now(),
        };

        users.push(user.clone());
        Ok(user)
    }

    async fn create_login_token(&self, new_token: NewLoginToken) -> Result<LoginTokenData> {
        let token = LoginTokenData {
            id: new_id(),
            user_id: new_token.user_id,
            token: new_token.token,
            created_at: Utc::now(),
        };

        self.login_tokens
            .lock()
            .insert(token.id.clone(), token.clone());

        Ok(token)
    }

    async fn login_token(&self, user_id: &str, token: &str) -> Result<LoginTokenData> {
        self.login_tokens
            .lock()
            .values()
            .find(|t| t.user_id == user_id && t.token == token)
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "login_token",
                identifier: "token",
            })
    }

    async fn delete_login_token(&self, token_id: &str) -> Result<RowsAffected> {
        let removed = self.login_tokens.lock().remove(token_id);
        Ok(removed.map_or(0, |_| 1))
    }

    async fn chat_identity(&self, user_id: &str) -> Result<ChatIdentity> {
        self.chat_identities
            .lock()
            .get(user_id)
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "chat_identity",
                identifier: "user_id",
            })
    }

    async fn upsert_chat_identity(
        &self,
        user_id: &str,
        identity: NewChatIdentity,
    ) -> Result<ChatIdentity> {
        let mut identities = self.chat_identities.lock();

        let id = identities
            .get(user_id)
            .map(|i| i.id.clone())
            .unwrap_or_else(new_id);

        let identity = ChatIdentity {
            id,
            user_id: user_id.to_string(),
            color: identity.color,
            badge: identity.badge,
        };

        identities.insert(user_id.to_string(), identity.clone());
        Ok(identity)
    }

    async fn create_message(&self, new_message: NewMessage) -> Result<ChatMessage> {
        let message = ChatMessage {
            id: new_id(),
            channel_id: new_message.channel_id,
            sender_id: new_message.sender_id,
            message: new_message.message,
            reply_to: new_message.reply_to,
            created_at: Utc::now(),
        };

        self.messages.lock().push(message.clone());
        Ok(message)
    }

    async fn create_post(&self, new_post: NewPost) -> Result<Post> {
        let post = Post {
            id: new_id(),
            channel_id: new_post.channel_id,
            author_id: new_post.author_id,
            message: new_post.message,
            media: new_post.media,
            reply_to: new_post.reply_to,
            created_at: Utc::now(),
        };

        self.posts.lock().push(post.clone());
        Ok(post)
    }

    async fn create_activity(&self, new_activity: NewActivity) -> Result<Activity> {
        let activity = Activity {
            id: new_id(),
            sender_id: new_activity.sender_id,
            target_id: new_activity.target_id,
            kind: new_activity.kind,
            message: new_activity.message,
            created_at: Utc::now(),
        };

        self.activities.lock().push(activity.clone());
        Ok(activity)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            username: "someone".to_string(),
            name: None,
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_is_a_conflict() {
        let db = MemoryDatabase::new();
        db.create_user(new_user("a@b.com")).await.unwrap();

        let result = db.create_user(new_user("a@b.com")).await;

        assert!(
            matches!(result, Err(DatabaseError::Conflict { field: "email", .. })),
            "second user with the same email should conflict"
        );
    }

    #[tokio::test]
    async fn test_login_token_must_match_user_and_code() {
        let db = MemoryDatabase::new();
        let token = db
            .create_login_token(NewLoginToken {
                user_id: "user-1".to_string(),
                token: "abc123".to_string(),
            })
            .await
            .unwrap();

        assert!(db.login_token("user-1", "abc123").await.is_ok());
        assert!(
            db.login_token("user-2", "abc123").await.is_err(),
            "code of another user should not match"
        );
        assert!(db.login_token("user-1", "zzz999").await.is_err());

        assert_eq!(db.delete_login_token(&token.id).await.unwrap(), 1);
        assert_eq!(
            db.delete_login_token(&token.id).await.unwrap(),
            0,
            "second delete should affect nothing"
        );
    }

    #[tokio::test]
    async fn test_chat_identity_upsert_keeps_one_row_per_user() {
        let db = MemoryDatabase::new();

        assert!(
            matches!(
                db.chat_identity("user-1").await,
                Err(DatabaseError::NotFound { .. })
            ),
            "no identity before the first upsert"
        );

        let created = db
            .upsert_chat_identity("user-1", NewChatIdentity::default())
            .await
            .unwrap();

        let updated = db
            .upsert_chat_identity(
                "user-1",
                NewChatIdentity {
                    color: "#00FF00".to_string(),
                    badge: "mod".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(created.id, updated.id, "upsert should replace, not add");
        assert_eq!(db.chat_identity("user-1").await.unwrap(), updated);
    }
}
