use std::sync::Arc;

use log::debug;

use crate::{
    rooms::{Chat, ChannelActivity, ChannelPosts, JobStatus},
    Activity, ChatMessage, CollabContext, Database, DatabaseError, NewActivity, NewMessage,
    NewPost, Post, RoomRegistry,
};

/// Mutations with live subscribers. Each one writes to the database first and only
/// publishes to the matching room once the write succeeded.
pub struct Live<Db> {
    database: Arc<Db>,
    rooms: RoomRegistry,
}

impl<Db> Live<Db>
where
    Db: Database,
{
    pub fn new(context: &CollabContext<Db>) -> Self {
        Self {
            database: context.database.clone(),
            rooms: context.rooms.clone(),
        }
    }

    /// Stores a chat message and broadcasts it to the channel's chat
    pub async fn send_message(&self, new_message: NewMessage) -> Result<ChatMessage, DatabaseError> {
        let message = self.database.create_message(new_message).await?;

        debug!("Message {} sent in {}", message.id, message.channel_id);
        self.rooms
            .publish::<Chat>(&message.channel_id, message.clone());

        Ok(message)
    }

    /// Stores a post and broadcasts it to the channel's post feed
    pub async fn create_post(&self, new_post: NewPost) -> Result<Post, DatabaseError> {
        let post = self.database.create_post(new_post).await?;

        self.rooms
            .publish::<ChannelPosts>(&post.channel_id, post.clone());

        Ok(post)
    }

    /// Stores an activity and broadcasts it to the target channel's activity feed
    pub async fn record_activity(
        &self,
        new_activity: NewActivity,
    ) -> Result<Activity, DatabaseError> {
        let activity = self.database.create_activity(new_activity).await?;

        self.rooms
            .publish::<ChannelActivity>(&activity.target_id, activity.clone());

        Ok(activity)
    }

    /// Broadcasts the status of a job. Job statuses only live in memory.
    pub fn update_job_status(&self, job_id: &str, status: &str) {
        debug!("Job {} is now {}", job_id, status);
        self.rooms.publish::<JobStatus>(job_id, status.to_string());
    }
}

#[cfg(test)]
mod test {
    use async_trait::async_trait;
    use futures_util::StreamExt;

    use super::*;
    use crate::{
        ChatIdentity, LoginTokenData, MemoryDatabase, NewChatIdentity, NewLoginToken, NewUser,
        Result, RowsAffected, UserData,
    };

    fn live() -> (Live<MemoryDatabase>, Arc<MemoryDatabase>) {
        let context = CollabContext::new(MemoryDatabase::new(), &Default::default());
        (Live::new(&context), context.database)
    }

    fn new_message(text: &str) -> NewMessage {
        NewMessage {
            channel_id: "channel-42".to_string(),
            sender_id: "user-1".to_string(),
            message: text.to_string(),
            reply_to: None,
        }
    }

    #[tokio::test]
    async fn test_sent_message_reaches_subscribers() {
        let (live, database) = live();
        let mut chat = live.rooms.subscribe::<Chat>("channel-42");

        let sent = live.send_message(new_message("hello")).await.unwrap();

        assert_eq!(chat.next().await, Some(sent));
        assert_eq!(database.messages_in("channel-42").len(), 1, "message is stored");
    }

    #[tokio::test]
    async fn test_message_before_subscription_is_replayed() {
        let (live, _) = live();

        live.send_message(new_message("hello")).await.unwrap();
        let mut chat = live.rooms.subscribe::<Chat>("channel-42");

        let replayed = chat.next().await.unwrap();
        assert_eq!(replayed.message, "hello");
    }

    #[tokio::test]
    async fn test_post_and_activity_go_to_their_channel() {
        let (live, _) = live();
        let mut posts = live.rooms.subscribe::<ChannelPosts>("channel-1");
        let mut activity = live.rooms.subscribe::<ChannelActivity>("channel-2");

        let post = live
            .create_post(NewPost {
                channel_id: "channel-1".to_string(),
                author_id: "user-1".to_string(),
                message: "first post".to_string(),
                media: None,
                reply_to: None,
            })
            .await
            .unwrap();

        let followed = live
            .record_activity(NewActivity {
                sender_id: "user-1".to_string(),
                target_id: "channel-2".to_string(),
                kind: "follow".to_string(),
                message: "user-1 followed you".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(posts.next().await, Some(post));
        assert_eq!(activity.next().await, Some(followed));
        assert_eq!(live.rooms.current::<ChannelPosts>("channel-2"), None);
    }

    #[tokio::test]
    async fn test_job_status_is_published() {
        let (live, _) = live();

        live.update_job_status("job-1", "processing");
        live.update_job_status("job-1", "ready");

        let mut status = live.rooms.subscribe::<JobStatus>("job-1");
        assert_eq!(status.next().await.as_deref(), Some("ready"));
    }

    /// Refuses every write
    struct ReadOnlyDatabase;

    #[async_trait]
    impl Database for ReadOnlyDatabase {
        async fn user_by_id(&self, _: &str) -> Result<UserData> {
            Err(DatabaseError::Internal("read only".into()))
        }

        async fn user_by_email(&self, _: &str) -> Result<UserData> {
            Err(DatabaseError::Internal("read only".into()))
        }

        async fn create_user(&self, _: NewUser) -> Result<UserData> {
            Err(DatabaseError::Internal("read only".into()))
        }

        async fn create_login_token(&self, _: NewLoginToken) -> Result<LoginTokenData> {
            Err(DatabaseError::Internal("read only".into()))
        }

        async fn login_token(&self, _: &str, _: &str) -> Result<LoginTokenData> {
            Err(DatabaseError::Internal("read only".into()))
        }

        async fn delete_login_token(&self, _: &str) -> Result<RowsAffected> {
            Err(DatabaseError::Internal("read only".into()))
        }

        async fn chat_identity(&self, _: &str) -> Result<ChatIdentity> {
            Err(DatabaseError::Internal("read only".into()))
        }

        async fn upsert_chat_identity(&self, _: &str, _: NewChatIdentity) -> Result<ChatIdentity> {
            Err(DatabaseError::Internal("read only".into()))
        }

        async fn create_message(&self, _: NewMessage) -> Result<ChatMessage> {
            Err(DatabaseError::Internal("read only".into()))
        }

        async fn create_post(&self, _: NewPost) -> Result<Post> {
            Err(DatabaseError::Internal("read only".into()))
        }

        async fn create_activity(&self, _: NewActivity) -> Result<Activity> {
            Err(DatabaseError::Internal("read only".into()))
        }
    }

    #[tokio::test]
    async fn test_failed_write_publishes_nothing() {
        let context = CollabContext::new(ReadOnlyDatabase, &Default::default());
        let live = Live::new(&context);

        let result = live.send_message(new_message("hello")).await;

        assert!(result.is_err());
        assert_eq!(
            live.rooms.current::<Chat>("channel-42"),
            None,
            "nothing should be published when the write fails"
        );
    }
}
