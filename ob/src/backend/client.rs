//! AiBackendClient trait definition

use async_trait::async_trait;

use crate::error::BackendError;
use crate::types::{
    AnonymousSessionRequest, AnonymousSessionResponse, BreakdownGenerateRequest, BreakdownGenerateResponse,
    UsageReconcileRequest, UsageReconcileResponse,
};

/// Remote breakdown backend
///
/// Implementations own session handling: callers never pass tokens, and a
/// rejected token is refreshed at most once per generation call.
#[async_trait]
pub trait AiBackendClient: Send + Sync {
    /// Create an anonymous session and store its token before returning
    async fn create_anonymous_session(
        &self,
        request: AnonymousSessionRequest,
    ) -> Result<AnonymousSessionResponse, BackendError>;

    /// Generate breakdown steps in the cloud
    ///
    /// Fails with `ConsentRequired` before any network activity when cloud AI
    /// is disabled.
    async fn generate_breakdown(
        &self,
        request: BreakdownGenerateRequest,
    ) -> Result<BreakdownGenerateResponse, BackendError>;

    /// Report a local usage count and receive the server's authoritative count
    async fn reconcile_usage(&self, request: UsageReconcileRequest) -> Result<UsageReconcileResponse, BackendError>;
}
