//! Request/response types for the breakdown backend
//!
//! These model the wire contract of the Offload backend API. Field names on the
//! wire are snake_case; the reconcile response also accepts camelCase spellings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A single step in a breakdown tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakdownStep {
    pub title: String,

    #[serde(default)]
    pub substeps: Vec<BreakdownStep>,
}

impl BreakdownStep {
    /// Create a leaf step with no substeps
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            substeps: Vec::new(),
        }
    }

    /// Create a step with nested substeps
    pub fn with_substeps(title: impl Into<String>, substeps: Vec<BreakdownStep>) -> Self {
        Self {
            title: title.into(),
            substeps,
        }
    }

    /// Total number of steps in this subtree, including self
    pub fn count(&self) -> usize {
        1 + self.substeps.iter().map(BreakdownStep::count).sum::<usize>()
    }
}

/// Body of `POST /v1/ai/breakdown/generate`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakdownGenerateRequest {
    pub input_text: String,
    pub granularity: u32,

    #[serde(default)]
    pub context_hints: Vec<String>,

    #[serde(default)]
    pub template_ids: Vec<String>,
}

impl BreakdownGenerateRequest {
    pub fn new(
        input_text: impl Into<String>,
        granularity: u32,
        context_hints: &[String],
        template_ids: &[String],
    ) -> Self {
        Self {
            input_text: input_text.into(),
            granularity,
            context_hints: context_hints.to_vec(),
            template_ids: template_ids.to_vec(),
        }
    }
}

/// Token usage reported by the backend for a generation call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakdownUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Response of `POST /v1/ai/breakdown/generate`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakdownGenerateResponse {
    pub steps: Vec<BreakdownStep>,
    pub provider: String,
    pub latency_ms: u64,
    pub usage: BreakdownUsage,
}

/// Which execution path produced a breakdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakdownSource {
    Cloud,
    OnDevice,
}

impl std::fmt::Display for BreakdownSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BreakdownSource::Cloud => write!(f, "cloud"),
            BreakdownSource::OnDevice => write!(f, "on-device"),
        }
    }
}

/// The value handed back to callers of the breakdown service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakdownResult {
    pub steps: Vec<BreakdownStep>,
    pub source: BreakdownSource,

    /// Backend token usage; only present when the cloud path served the request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<BreakdownUsage>,
}

impl BreakdownResult {
    pub fn cloud(response: BreakdownGenerateResponse) -> Self {
        debug!(step_count = %response.steps.len(), provider = %response.provider, "BreakdownResult::cloud: called");
        Self {
            steps: response.steps,
            source: BreakdownSource::Cloud,
            usage: Some(response.usage),
        }
    }

    pub fn on_device(steps: Vec<BreakdownStep>) -> Self {
        debug!(step_count = %steps.len(), "BreakdownResult::on_device: called");
        Self {
            steps,
            source: BreakdownSource::OnDevice,
            usage: None,
        }
    }
}

/// Body of `POST /v1/sessions/anonymous`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnonymousSessionRequest {
    pub install_id: String,
    pub app_version: String,
    pub platform: String,
}

/// Response of `POST /v1/sessions/anonymous`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnonymousSessionResponse {
    pub session_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Body of `POST /v1/usage/reconcile`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageReconcileRequest {
    pub install_id: String,
    pub feature: String,
    pub local_count: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<DateTime<Utc>>,
}

impl UsageReconcileRequest {
    pub fn new(install_id: impl Into<String>, feature: impl Into<String>, local_count: u64) -> Self {
        Self {
            install_id: install_id.into(),
            feature: feature.into(),
            local_count,
            since: None,
        }
    }
}

/// Response of `POST /v1/usage/reconcile`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageReconcileResponse {
    #[serde(alias = "serverCount")]
    pub server_count: u64,

    #[serde(alias = "effectiveRemaining")]
    pub effective_remaining: u64,

    #[serde(alias = "reconciledAt")]
    pub reconciled_at: DateTime<Utc>,
}

/// Response of `GET /v1/health`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub environment: String,
}

/// Error envelope returned by the backend for non-2xx responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorEnvelope {
    pub error: ApiErrorBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
    pub request_id: String,
}
