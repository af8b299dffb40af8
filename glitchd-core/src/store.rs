use std::sync::Arc;

use dashmap::DashMap;

use crate::{Config, Room};

/// A concurrent table of rooms by key, creating rooms on first access.
///
/// Rooms are never removed, they live as long as the store does.
pub struct RoomStore<T> {
    config: Config,
    rooms: Arc<DashMap<String, Arc<Room<T>>>>,
}

impl<T> RoomStore<T> {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            rooms: Default::default(),
        }
    }

    /// Returns the room for the key, creating an empty one if it doesn't exist yet.
    /// Concurrent callers with the same key always get the same room.
    pub fn get_or_create(&self, key: &str) -> Arc<Room<T>> {
        if let Some(room) = self.rooms.get(key) {
            return room.value().clone();
        }

        self.rooms
            .entry(key.to_string())
            .or_insert_with(|| Room::new(key, self.config.clone()))
            .value()
            .clone()
    }

    /// Returns the room for the key if it was ever accessed
    pub fn get(&self, key: &str) -> Option<Arc<Room<T>>> {
        self.rooms.get(key).map(|r| r.value().clone())
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// The total amount of observers across all rooms
    pub fn observer_count(&self) -> usize {
        self.rooms.iter().map(|r| r.value().observer_count()).sum()
    }
}

impl<T> Clone for RoomStore<T> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            rooms: self.rooms.clone(),
        }
    }
}
