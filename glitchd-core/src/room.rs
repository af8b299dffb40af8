use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::{observer::Inbox, Config, Observer, ObserverId};

/// A fan-out unit for a single entity, holding the latest value and the observers to
/// broadcast new values to.
pub struct Room<T> {
    me: Weak<Self>,
    key: String,
    config: Config,
    state: Mutex<RoomState<T>>,
}

struct RoomState<T> {
    last_value: Option<T>,
    observers: Vec<Registration<T>>,
}

struct Registration<T> {
    id: ObserverId,
    inbox: Arc<Inbox<T>>,
}

impl<T> Room<T> {
    pub fn new(key: &str, config: Config) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            key: key.to_string(),
            config,
            state: Mutex::new(RoomState {
                last_value: None,
                observers: Vec::new(),
            }),
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Registers a new observer that receives every value published from now on
    pub fn subscribe(&self) -> Observer<T> {
        let mut state = self.state.lock();
        self.register(&mut state)
    }

    /// Removes an observer. Unknown or already removed observers are ignored.
    pub fn unsubscribe(&self, id: ObserverId) {
        let mut state = self.state.lock();

        if let Some(index) = state.observers.iter().position(|o| o.id == id) {
            let registration = state.observers.remove(index);
            registration.inbox.close();
        }
    }

    /// Returns the amount of currently registered observers
    pub fn observer_count(&self) -> usize {
        self.state.lock().observers.len()
    }

    fn register(&self, state: &mut RoomState<T>) -> Observer<T> {
        let id = ObserverId::new();
        let inbox = Arc::new(Inbox::new(self.config.observer_capacity()));

        state.observers.push(Registration {
            id,
            inbox: inbox.clone(),
        });

        Observer::new(id, inbox, self.me.clone())
    }
}

impl<T> Room<T>
where
    T: Clone,
{
    /// Same as [Room::subscribe], but the latest value, if any, is delivered first.
    /// The snapshot and registration happen together, so nothing published in
    /// between is lost or repeated.
    pub fn subscribe_with_snapshot(&self) -> Observer<T> {
        let mut state = self.state.lock();
        let observer = self.register(&mut state);

        if let (Some(value), Some(registration)) = (&state.last_value, state.observers.last()) {
            registration.inbox.push(value.clone());
        }

        observer
    }

    /// Stores the value as the latest one and pushes it to every observer.
    /// Slow observers lose their oldest buffered values instead of blocking this.
    pub fn publish(&self, value: T) {
        let mut state = self.state.lock();
        Self::broadcast(&mut state, value);
    }

    /// Computes a new value from the latest one and publishes it, returning the new value.
    /// No other publish can happen between reading and writing.
    pub fn update<F>(&self, f: F) -> T
    where
        F: FnOnce(Option<&T>) -> T,
    {
        let mut state = self.state.lock();
        let value = f(state.last_value.as_ref());

        Self::broadcast(&mut state, value.clone());
        value
    }

    /// Returns the latest published value, if any
    pub fn current(&self) -> Option<T> {
        self.state.lock().last_value.clone()
    }

    fn broadcast(state: &mut RoomState<T>, value: T) {
        for observer in state.observers.iter() {
            observer.inbox.push(value.clone());
        }

        state.last_value = Some(value);
    }
}

#[cfg(test)]
mod test {
    use std::{sync::Barrier, thread};

    use futures_util::StreamExt;

    use super::*;

    fn room<T>() -> Arc<Room<T>> {
        Room::new("chat:channel-42", Config::default())
    }

    #[test]
    fn test_observers_receive_publishes_in_order() {
        let room = room();
        let first = room.subscribe();
        let second = room.subscribe();

        for i in 0..10 {
            room.publish(i);
        }

        for observer in [&first, &second] {
            let received: Vec<_> = std::iter::from_fn(|| observer.try_recv()).collect();
            assert_eq!(
                received,
                (0..10).collect::<Vec<_>>(),
                "every observer should see every value in publish order"
            );
        }
    }

    #[test]
    fn test_current_returns_value_published_before_subscribing() {
        let room = room();
        room.publish("hello".to_string());

        let observer = room.subscribe();

        assert_eq!(room.current().as_deref(), Some("hello"));
        assert_eq!(
            observer.try_recv(),
            None,
            "a plain subscription should not replay the snapshot"
        );
    }

    #[test]
    fn test_current_is_absent_without_publishes() {
        let room = room::<String>();
        let _observer = room.subscribe();

        assert_eq!(room.current(), None, "nothing was ever published");
    }

    #[test]
    fn test_snapshot_subscription_replays_latest_value() {
        let room = room();
        room.publish(1);
        room.publish(2);

        let observer = room.subscribe_with_snapshot();
        room.publish(3);

        assert_eq!(observer.try_recv(), Some(2), "snapshot should come first");
        assert_eq!(observer.try_recv(), Some(3));
        assert_eq!(observer.try_recv(), None);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let room = room();
        let leaving = room.subscribe();
        let staying = room.subscribe();

        leaving.unsubscribe();
        leaving.unsubscribe();
        room.unsubscribe(leaving.id());

        room.publish(7);

        assert_eq!(room.observer_count(), 1, "only one observer should remain");
        assert!(leaving.is_closed(), "removed observer should be closed");
        assert_eq!(leaving.try_recv(), None, "removed observer gets nothing");
        assert_eq!(staying.try_recv(), Some(7), "other observers are unaffected");
    }

    #[test]
    fn test_dropping_observer_removes_it() {
        let room = room::<u32>();

        {
            let _observer = room.subscribe();
            assert_eq!(room.observer_count(), 1);
        }

        assert_eq!(room.observer_count(), 0, "dropped observer should be removed");
    }

    #[test]
    fn test_publish_without_observers_updates_value() {
        let room = room();
        room.publish(5);

        assert_eq!(room.current(), Some(5));
        assert_eq!(room.observer_count(), 0);
    }

    #[test]
    fn test_stalled_observer_does_not_block_others() {
        let room = Room::new(
            "video:1",
            Config {
                observer_capacity: 4,
            },
        );
        let stalled = room.subscribe();
        let reader = room.subscribe();

        let mut received = Vec::new();
        for i in 0..100 {
            room.publish(i);
            received.extend(reader.try_recv());
        }

        assert_eq!(received, (0..100).collect::<Vec<_>>());
        assert_eq!(stalled.pending(), 4, "stalled observer keeps a full buffer");
        assert_eq!(stalled.lagged(), 96, "the rest were dropped oldest first");
        assert_eq!(stalled.try_recv(), Some(96), "only the newest values survive");
    }

    #[test]
    fn test_update_reads_and_writes_atomically() {
        let room = room::<u32>();
        let barrier = Barrier::new(8);

        thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    barrier.wait();
                    for _ in 0..100 {
                        room.update(|count| count.copied().unwrap_or(0) + 1);
                    }
                });
            }
        });

        assert_eq!(room.current(), Some(800), "no increment should be lost");
    }

    #[test]
    fn test_concurrent_publishers_are_seen_in_one_order() {
        let room = Room::new(
            "job:1",
            Config {
                observer_capacity: 1024,
            },
        );
        let first = room.subscribe();
        let second = room.subscribe();

        thread::scope(|scope| {
            for publisher in 0..4 {
                let room = room.clone();
                scope.spawn(move || {
                    for i in 0..100 {
                        room.publish((publisher, i));
                    }
                });
            }
        });

        let first: Vec<_> = std::iter::from_fn(|| first.try_recv()).collect();
        let second: Vec<_> = std::iter::from_fn(|| second.try_recv()).collect();

        assert_eq!(first.len(), 400);
        assert_eq!(first, second, "observers should agree on the order");
    }

    #[tokio::test]
    async fn test_observer_stream_wakes_on_publish() {
        let room = room();
        let mut observer = room.subscribe();

        let publisher = {
            let room = room.clone();
            tokio::spawn(async move {
                room.publish("first");
                room.publish("second");
            })
        };

        assert_eq!(observer.next().await, Some("first"));
        assert_eq!(observer.next().await, Some("second"));
        publisher.await.unwrap();
    }

    #[tokio::test]
    async fn test_observer_stream_ends_after_unsubscribe() {
        let room = room();
        let mut observer = room.subscribe();

        room.publish(1);
        room.unsubscribe(observer.id());

        assert_eq!(observer.next().await, Some(1), "buffered values are drained");
        assert_eq!(observer.next().await, None, "then the stream ends");
    }
}
