mod config;
mod observer;
mod room;
mod store;
mod util;

pub use config::*;
pub use observer::{Observer, ObserverId};
pub use room::*;
pub use store::*;
pub use util::*;
