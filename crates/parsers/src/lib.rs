//! Claude Code transcript → turn reconstruction.

pub mod classify;
pub mod discover;
pub mod incremental;
pub mod tools;
pub mod turns;

pub use classify::classify;
pub use incremental::{TranscriptSlice, read_since};
pub use tools::{resolve_tool_calls, turn_tool_calls};
pub use turns::{TurnBatch, TurnBuilder, build_turns};
