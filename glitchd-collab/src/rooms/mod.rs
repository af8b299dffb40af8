mod presence;

use std::sync::Arc;

use glitchd_core::{Config, Observer, Room, RoomStore};
use log::debug;

use crate::{Activity, ChatMessage, Post};

pub use presence::*;

/// A category of rooms. Keys only need to be unique within a namespace.
pub trait Namespace: Send + Sync + 'static {
    /// The value broadcast to observers of rooms in this namespace
    type Value: Clone + Send + Sync + 'static;

    const NAME: &'static str;

    fn store(registry: &RoomRegistry) -> &RoomStore<Self::Value>;
}

/// Chat messages of a channel
pub struct Chat;
/// The amount of people watching a video
pub struct VideoViewers;
/// The amount of people watching a channel
pub struct ChannelViewers;
/// The status of a background job, like a video upload
pub struct JobStatus;
/// The activity feed of a channel
pub struct ChannelActivity;
/// New posts on a channel's feed
pub struct ChannelPosts;

impl Namespace for Chat {
    type Value = ChatMessage;
    const NAME: &'static str = "chat";

    fn store(registry: &RoomRegistry) -> &RoomStore<Self::Value> {
        &registry.chat
    }
}

impl Namespace for VideoViewers {
    type Value = u32;
    const NAME: &'static str = "video-viewers";

    fn store(registry: &RoomRegistry) -> &RoomStore<Self::Value> {
        &registry.video_viewers
    }
}

impl Namespace for ChannelViewers {
    type Value = u32;
    const NAME: &'static str = "channel-viewers";

    fn store(registry: &RoomRegistry) -> &RoomStore<Self::Value> {
        &registry.channel_viewers
    }
}

impl Namespace for JobStatus {
    type Value = String;
    const NAME: &'static str = "job-status";

    fn store(registry: &RoomRegistry) -> &RoomStore<Self::Value> {
        &registry.job_status
    }
}

impl Namespace for ChannelActivity {
    type Value = Activity;
    const NAME: &'static str = "activity";

    fn store(registry: &RoomRegistry) -> &RoomStore<Self::Value> {
        &registry.activity
    }
}

impl Namespace for ChannelPosts {
    type Value = Post;
    const NAME: &'static str = "posts";

    fn store(registry: &RoomRegistry) -> &RoomStore<Self::Value> {
        &registry.posts
    }
}

/// Every live room in the process, one table per namespace.
#[derive(Clone)]
pub struct RoomRegistry {
    chat: RoomStore<ChatMessage>,
    video_viewers: RoomStore<u32>,
    channel_viewers: RoomStore<u32>,
    job_status: RoomStore<String>,
    activity: RoomStore<Activity>,
    posts: RoomStore<Post>,
}

/// A summary of one namespace, for diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceStats {
    pub namespace: &'static str,
    pub rooms: usize,
    pub observers: usize,
}

impl RoomRegistry {
    pub fn new(config: &Config) -> Self {
        Self {
            chat: RoomStore::new(config),
            video_viewers: RoomStore::new(config),
            channel_viewers: RoomStore::new(config),
            job_status: RoomStore::new(config),
            activity: RoomStore::new(config),
            posts: RoomStore::new(config),
        }
    }

    /// Returns the room for the key, creating it if needed
    pub fn room<N: Namespace>(&self, key: &str) -> Arc<Room<N::Value>> {
        N::store(self).get_or_create(key)
    }

    /// Subscribes to a room. The latest value, if any, is delivered first.
    pub fn subscribe<N: Namespace>(&self, key: &str) -> Observer<N::Value> {
        let observer = self.room::<N>(key).subscribe_with_snapshot();
        debug!("Observer {} subscribed to {}:{}", observer.id(), N::NAME, key);

        observer
    }

    pub fn publish<N: Namespace>(&self, key: &str, value: N::Value) {
        self.room::<N>(key).publish(value)
    }

    /// Returns the latest value of a room without creating it
    pub fn current<N: Namespace>(&self, key: &str) -> Option<N::Value> {
        N::store(self).get(key).and_then(|r| r.current())
    }

    pub fn stats(&self) -> Vec<NamespaceStats> {
        vec![
            Self::stats_of::<Chat>(&self.chat),
            Self::stats_of::<VideoViewers>(&self.video_viewers),
            Self::stats_of::<ChannelViewers>(&self.channel_viewers),
            Self::stats_of::<JobStatus>(&self.job_status),
            Self::stats_of::<ChannelActivity>(&self.activity),
            Self::stats_of::<ChannelPosts>(&self.posts),
        ]
    }

    fn stats_of<N: Namespace>(store: &RoomStore<N::Value>) -> NamespaceStats {
        NamespaceStats {
            namespace: N::NAME,
            rooms: store.len(),
            observers: store.observer_count(),
        }
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}
