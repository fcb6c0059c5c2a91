//! Turn export: projection into trace trees, the backend seam, and the
//! per-session pipeline with predecessor recovery.

pub mod pipeline;
pub mod projector;
pub mod recovery;
pub mod sink;

pub use pipeline::{
    ExportOptions, ExportSummary, HookTarget, SessionOutcome, export, process_session,
};
pub use projector::{AgentSpan, Generation, SpanLevel, ToolSpan, TraceTree, project_turn};
pub use recovery::recover_predecessor;
pub use sink::{JsonLinesSink, LangfuseSink, MemorySink, TraceSink, trace_events};
