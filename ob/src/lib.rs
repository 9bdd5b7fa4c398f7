//! Offload breakdown - AI breakdown orchestration core
//!
//! Breaks free-form text into actionable steps. Requests go to the Offload cloud
//! backend when the user has opted in, and fall back to an on-device generator
//! whenever consent is missing or the cloud path fails for any reason.
//!
//! # Modules
//!
//! - [`service`] - Orchestrator choosing between cloud and on-device paths
//! - [`backend`] - Backend client with anonymous sessions and one-shot 401 retry
//! - [`transport`] - Request/response boundary and the reqwest implementation
//! - [`session`] - Session token storage
//! - [`consent`] - Cloud AI consent flag
//! - [`usage`] - Per-feature usage counters merged with server counts
//! - [`generator`] - On-device breakdown capability
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod backend;
pub mod cli;
pub mod config;
pub mod consent;
pub mod error;
pub mod generator;
pub mod service;
pub mod session;
pub mod transport;
pub mod types;
pub mod usage;

// Re-export commonly used types
pub use backend::{AiBackendClient, ClientIdentity, NetworkAiBackendClient};
pub use config::Config;
pub use consent::{ConsentStore, InMemoryConsentStore};
pub use error::{BackendError, GeneratorError, TransportError};
pub use generator::{OnDeviceBreakdownGenerator, SentenceSplitGenerator};
pub use service::{BREAKDOWN_FEATURE, BreakdownService};
pub use session::{InMemorySessionTokenStore, SessionToken, SessionTokenStore};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Transport, resolve_url};
pub use types::{
    AnonymousSessionRequest, AnonymousSessionResponse, BreakdownGenerateRequest, BreakdownGenerateResponse,
    BreakdownResult, BreakdownSource, BreakdownStep, BreakdownUsage, HealthResponse, UsageReconcileRequest,
    UsageReconcileResponse,
};
pub use usage::{FileUsageCounterStore, InMemoryUsageCounterStore, UsageCounterStore};
