pub mod message;
pub mod state;
pub mod turn;

pub use message::*;
pub use state::{SessionState, StateError, StateStore};
pub use turn::*;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
