pub mod client;
pub mod ingestion;
pub mod retry;

pub use client::{ApiError, LangfuseClient};
pub use ingestion::{
    IngestionEvent, IngestionFailure, IngestionResponse, IngestionSuccess, ObservationBody,
    ObservationLevel, TraceBody, UsageBody,
};
pub use retry::RetryConfig;
