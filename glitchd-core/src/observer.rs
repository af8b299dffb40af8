use std::{
    pin::Pin,
    sync::{Arc, Weak},
    task::{Context, Poll, Waker},
};

use futures_util::Stream;
use parking_lot::Mutex;
use ringbuf::{
    traits::{Consumer, Observer as _, RingBuffer},
    HeapRb,
};

use crate::{Id, Room};

pub type ObserverId = Id<Observer<()>>;

/// The buffered side of an observer, shared between a [Room] and the [Observer] handle.
///
/// When the buffer is full, pushing overwrites the oldest value and counts it as lagged.
pub(crate) struct Inbox<T> {
    state: Mutex<InboxState<T>>,
}

struct InboxState<T> {
    pending: HeapRb<T>,
    waker: Option<Waker>,
    /// Set once the observer is removed from its room
    closed: bool,
    lagged: u64,
}

impl<T> Inbox<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(InboxState {
                pending: HeapRb::new(capacity),
                waker: None,
                closed: false,
                lagged: 0,
            }),
        }
    }

    /// Buffers a value and wakes the consumer. Never waits.
    pub(crate) fn push(&self, value: T) {
        let waker = {
            let mut state = self.state.lock();

            if state.closed {
                return;
            }

            if state.pending.push_overwrite(value).is_some() {
                state.lagged += 1;
            }

            state.waker.take()
        };

        if let Some(waker) = waker {
            waker.wake()
        }
    }

    /// Marks the inbox as closed, the consumer drains what is left and then ends.
    pub(crate) fn close(&self) {
        let waker = {
            let mut state = self.state.lock();
            state.closed = true;
            state.waker.take()
        };

        if let Some(waker) = waker {
            waker.wake()
        }
    }
}

/// A handle to a subscription on a [Room], yielding published values as a [Stream].
///
/// Dropping the handle removes it from the room.
pub struct Observer<T> {
    id: ObserverId,
    inbox: Arc<Inbox<T>>,
    /// Required to remove the observer when unsubscribing
    room: Weak<Room<T>>,
}

impl<T> Observer<T> {
    pub(crate) fn new(
        id: ObserverId,
        inbox: Arc<Inbox<T>>,
        room: Weak<Room<T>>,
    ) -> Self {
        Self {
            id,
            inbox,
            room,
        }
    }

    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// Takes the next buffered value without waiting
    pub fn try_recv(&self) -> Option<T> {
        self.inbox.state.lock().pending.try_pop()
    }

    /// How many values are currently buffered
    pub fn pending(&self) -> usize {
        self.inbox.state.lock().pending.occupied_len()
    }

    /// How many values were overwritten before this observer could read them
    pub fn lagged(&self) -> u64 {
        self.inbox.state.lock().lagged
    }

    /// Returns true if the observer no longer receives values from its room
    pub fn is_closed(&self) -> bool {
        self.inbox.state.lock().closed
    }

    /// Removes the observer from its room. Calling this more than once does nothing.
    pub fn unsubscribe(&self) {
        match self.room.upgrade() {
            Some(room) => room.unsubscribe(self.id),
            None => self.inbox.close(),
        }
    }
}

impl<T> Stream for Observer<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut state = self.inbox.state.lock();

        if let Some(value) = state.pending.try_pop() {
            return Poll::Ready(Some(value));
        }

        if state.closed {
            return Poll::Ready(None);
        }

        state.waker = Some(cx.waker().clone());
        Poll::Pending
    }
}

impl<T> Drop for Observer<T> {
    fn drop(&mut self) {
        self.unsubscribe()
    }
}
