use std::{
    marker::PhantomData,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use futures_util::Stream;
use glitchd_core::{Observer, Room};
use log::debug;

use super::{ChannelViewers, Namespace, RoomRegistry, VideoViewers};

/// A namespace whose rooms hold a count of the people currently watching
pub trait Counter: Namespace<Value = u32> {}

impl Counter for VideoViewers {}
impl Counter for ChannelViewers {}

/// A viewer's presence in a counter room. It counts as one viewer while it exists,
/// and streams the viewer count.
pub struct Presence<N: Counter> {
    room: Arc<Room<u32>>,
    observer: Observer<u32>,
    namespace: PhantomData<fn() -> N>,
}

impl RoomRegistry {
    /// Joins a counter room as a viewer, incrementing its count until the presence is dropped.
    pub fn watch<N: Counter>(&self, key: &str) -> Presence<N> {
        let room = self.room::<N>(key);

        // Subscribe before counting ourselves, so the new count is the first value we see
        let observer = room.subscribe();
        let count = room.update(|count| count.copied().unwrap_or(0) + 1);

        debug!("{}:{} now has {} viewers", N::NAME, key, count);

        Presence {
            room,
            observer,
            namespace: PhantomData,
        }
    }
}

impl<N: Counter> Presence<N> {
    /// The current amount of viewers
    pub fn viewers(&self) -> u32 {
        self.room.current().unwrap_or(0)
    }
}

impl<N: Counter> Stream for Presence<N> {
    type Item = u32;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().observer).poll_next(cx)
    }
}

impl<N: Counter> Drop for Presence<N> {
    fn drop(&mut self) {
        self.observer.unsubscribe();

        let count = self
            .room
            .update(|count| count.copied().unwrap_or(0).saturating_sub(1));

        debug!("{}:{} now has {} viewers", N::NAME, self.room.key(), count);
    }
}
