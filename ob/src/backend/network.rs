//! Network implementation of the AI backend client
//!
//! Session lifecycle:
//!
//! - A missing or expired token is replaced by a fresh anonymous session before
//!   the first authenticated call.
//! - A 401 from the generate endpoint triggers exactly one refresh and one
//!   resend; whatever the resend returns is final.
//! - Session creation is serialized behind a single lock, so concurrent callers
//!   that find the token stale share one refresh instead of racing.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{AiBackendClient, GENERATE_PATH, HEALTH_PATH, RECONCILE_PATH, SESSIONS_PATH};
use crate::consent::ConsentStore;
use crate::error::BackendError;
use crate::session::SessionTokenStore;
use crate::transport::{ApiRequest, Transport};
use crate::types::{
    AnonymousSessionRequest, AnonymousSessionResponse, BreakdownGenerateRequest, BreakdownGenerateResponse,
    HealthResponse, UsageReconcileRequest, UsageReconcileResponse,
};

const CLOUD_OPT_IN_HEADER: &str = "X-Offload-Cloud-Opt-In";

/// Identity reported when creating anonymous sessions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub install_id: String,
    pub app_version: String,
    pub platform: String,
}

impl ClientIdentity {
    pub fn new(install_id: impl Into<String>, app_version: impl Into<String>, platform: impl Into<String>) -> Self {
        Self {
            install_id: install_id.into(),
            app_version: app_version.into(),
            platform: platform.into(),
        }
    }

    pub fn session_request(&self) -> AnonymousSessionRequest {
        AnonymousSessionRequest {
            install_id: self.install_id.clone(),
            app_version: self.app_version.clone(),
            platform: self.platform.clone(),
        }
    }
}

/// Backend client that talks to the Offload API through a `Transport`
pub struct NetworkAiBackendClient {
    transport: Arc<dyn Transport>,
    token_store: Arc<dyn SessionTokenStore>,
    consent_store: Arc<dyn ConsentStore>,
    identity: ClientIdentity,
    refresh_lock: Mutex<()>,
}

impl NetworkAiBackendClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        token_store: Arc<dyn SessionTokenStore>,
        consent_store: Arc<dyn ConsentStore>,
        identity: ClientIdentity,
    ) -> Self {
        debug!(?identity, "NetworkAiBackendClient::new: called");
        Self {
            transport,
            token_store,
            consent_store,
            identity,
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    /// Unauthenticated liveness probe
    pub async fn health(&self) -> Result<HealthResponse, BackendError> {
        debug!("health: called");
        self.perform(ApiRequest::get(HEALTH_PATH)).await
    }

    /// Send a request and decode a 2xx body; any other status becomes `StatusCode`
    async fn perform<R: DeserializeOwned>(&self, request: ApiRequest) -> Result<R, BackendError> {
        let path = request.path.clone();
        debug!(%path, method = %request.method, "perform: called");

        let response = self.transport.send(request).await.map_err(|e| {
            debug!(%path, error = %e, "perform: transport failure");
            BackendError::from(e)
        })?;

        if !response.is_success() {
            debug!(%path, status = %response.status, "perform: non-success status");
            return Err(BackendError::StatusCode {
                status: response.status,
                body: response.body_text(),
            });
        }

        serde_json::from_slice(&response.body).map_err(|e| {
            debug!(%path, error = %e, "perform: decode failure");
            BackendError::InvalidResponse(format!("{}: {}", path, e))
        })
    }

    /// Return a usable token, creating a session if the stored one is missing or expired
    async fn ensure_session(&self) -> Result<String, BackendError> {
        if let Some(token) = self.token_store.valid_token(Utc::now()) {
            debug!("ensure_session: stored token is valid");
            return Ok(token);
        }

        let _guard = self.refresh_lock.lock().await;
        if let Some(token) = self.token_store.valid_token(Utc::now()) {
            debug!("ensure_session: session refreshed by another caller");
            return Ok(token);
        }

        debug!("ensure_session: token missing or expired, creating session");
        self.refresh_session().await
    }

    /// Replace a token the server rejected
    ///
    /// The stored token is trusted only if it differs from the rejected one, i.e.
    /// another caller already refreshed while we waited for the lock.
    async fn refresh_after_rejection(&self, rejected: &str) -> Result<String, BackendError> {
        let _guard = self.refresh_lock.lock().await;
        if let Some(current) = self.token_store.current()
            && current.token != rejected
            && current.is_valid(Utc::now())
        {
            debug!("refresh_after_rejection: session refreshed by another caller");
            return Ok(current.token);
        }

        self.refresh_session().await
    }

    async fn refresh_session(&self) -> Result<String, BackendError> {
        let response = self.create_anonymous_session(self.identity.session_request()).await?;
        Ok(response.session_token)
    }

    async fn send_generate(
        &self,
        request: &BreakdownGenerateRequest,
        token: &str,
    ) -> Result<BreakdownGenerateResponse, BackendError> {
        let api_request = ApiRequest::post_json(GENERATE_PATH, request)?
            .with_bearer(token)
            .with_header(CLOUD_OPT_IN_HEADER, "true");
        self.perform(api_request).await
    }
}

#[async_trait]
impl AiBackendClient for NetworkAiBackendClient {
    async fn create_anonymous_session(
        &self,
        request: AnonymousSessionRequest,
    ) -> Result<AnonymousSessionResponse, BackendError> {
        debug!(platform = %request.platform, app_version = %request.app_version, "create_anonymous_session: called");
        let response: AnonymousSessionResponse = self.perform(ApiRequest::post_json(SESSIONS_PATH, &request)?).await?;

        // Commit token and expiry together, only once the response decoded
        self.token_store
            .set(response.session_token.clone(), response.expires_at);
        info!(expires_at = %response.expires_at, "create_anonymous_session: session stored");

        Ok(response)
    }

    async fn generate_breakdown(
        &self,
        request: BreakdownGenerateRequest,
    ) -> Result<BreakdownGenerateResponse, BackendError> {
        debug!(input_len = %request.input_text.len(), granularity = %request.granularity, "generate_breakdown: called");

        if !self.consent_store.is_cloud_ai_enabled() {
            debug!("generate_breakdown: cloud AI disabled");
            return Err(BackendError::ConsentRequired);
        }

        let token = self.ensure_session().await?;

        match self.send_generate(&request, &token).await {
            Err(e) if e.is_unauthorized() => {
                warn!(code = ?e.api_error().map(|b| b.code), "generate_breakdown: token rejected, refreshing session once");
                let refreshed = self.refresh_after_rejection(&token).await?;
                self.send_generate(&request, &refreshed).await
            }
            result => result,
        }
    }

    async fn reconcile_usage(&self, request: UsageReconcileRequest) -> Result<UsageReconcileResponse, BackendError> {
        debug!(feature = %request.feature, local_count = %request.local_count, "reconcile_usage: called");

        let token = self.ensure_session().await?;
        let response: UsageReconcileResponse = self
            .perform(
                ApiRequest::post_json(RECONCILE_PATH, &request)?
                    .with_query("feature", &request.feature)
                    .with_bearer(&token),
            )
            .await?;

        info!(
            feature = %request.feature,
            server_count = %response.server_count,
            effective_remaining = %response.effective_remaining,
            "reconcile_usage: reconciled"
        );
        Ok(response)
    }
}
