//! AI backend client module
//!
//! Creates anonymous sessions, issues authenticated breakdown calls and
//! reconciles usage counts against the Offload API.

pub mod client;
mod network;

pub use client::AiBackendClient;
pub use network::{ClientIdentity, NetworkAiBackendClient};

pub const SESSIONS_PATH: &str = "/v1/sessions/anonymous";
pub const GENERATE_PATH: &str = "/v1/ai/breakdown/generate";
pub const RECONCILE_PATH: &str = "/v1/usage/reconcile";
pub const HEALTH_PATH: &str = "/v1/health";
