/// The configuration of the fan-out engine
#[derive(Debug, Clone)]
pub struct Config {
    /// How many values an observer can hold before the oldest ones are overwritten
    pub observer_capacity: usize,
}

impl Config {
    pub const DEFAULT_OBSERVER_CAPACITY: usize = 64;

    /// The capacity actually used for observer buffers, which is never zero
    pub fn observer_capacity(&self) -> usize {
        self.observer_capacity.max(1)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Enough for a burst of chat messages without holding on to a stalled client forever
            observer_capacity: Self::DEFAULT_OBSERVER_CAPACITY,
        }
    }
}
