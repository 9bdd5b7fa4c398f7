//! Breakdown orchestration
//!
//! Chooses between the cloud backend and the on-device generator. Consent
//! disabled means on-device only; consent enabled tries the cloud first and
//! falls back to on-device on any cloud failure.

use std::sync::Arc;

use tracing::debug;

use crate::backend::AiBackendClient;
use crate::consent::ConsentStore;
use crate::error::{BackendError, GeneratorError};
use crate::generator::OnDeviceBreakdownGenerator;
use crate::types::{BreakdownGenerateRequest, BreakdownResult, UsageReconcileRequest, UsageReconcileResponse};
use crate::usage::UsageCounterStore;

/// Usage feature key for breakdown generation
pub const BREAKDOWN_FEATURE: &str = "breakdown";

pub struct BreakdownService {
    backend: Arc<dyn AiBackendClient>,
    consent_store: Arc<dyn ConsentStore>,
    usage_store: Arc<dyn UsageCounterStore>,
    on_device: Arc<dyn OnDeviceBreakdownGenerator>,
    install_id: String,
}

impl BreakdownService {
    pub fn new(
        backend: Arc<dyn AiBackendClient>,
        consent_store: Arc<dyn ConsentStore>,
        usage_store: Arc<dyn UsageCounterStore>,
        on_device: Arc<dyn OnDeviceBreakdownGenerator>,
        install_id: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            consent_store,
            usage_store,
            on_device,
            install_id: install_id.into(),
        }
    }

    /// Produce a breakdown, tagging the result with the path that served it
    ///
    /// Cloud errors never reach the caller; only an on-device failure does.
    /// Local usage is counted for on-device results only, cloud usage is
    /// accounted server-side and merged back through `reconcile_usage`.
    pub async fn generate_breakdown(
        &self,
        input_text: &str,
        granularity: u32,
        context_hints: &[String],
        template_ids: &[String],
    ) -> Result<BreakdownResult, GeneratorError> {
        debug!(input_len = %input_text.len(), %granularity, "generate_breakdown: called");

        if !self.consent_store.is_cloud_ai_enabled() {
            debug!("generate_breakdown: cloud AI disabled, using on-device");
            return self
                .generate_on_device(input_text, granularity, context_hints, template_ids)
                .await;
        }

        let request = BreakdownGenerateRequest::new(input_text, granularity, context_hints, template_ids);
        match self.backend.generate_breakdown(request).await {
            Ok(response) => {
                debug!("generate_breakdown: served by cloud");
                Ok(BreakdownResult::cloud(response))
            }
            Err(_) => {
                debug!("generate_breakdown: cloud path unavailable, using on-device");
                self.generate_on_device(input_text, granularity, context_hints, template_ids)
                    .await
            }
        }
    }

    async fn generate_on_device(
        &self,
        input_text: &str,
        granularity: u32,
        context_hints: &[String],
        template_ids: &[String],
    ) -> Result<BreakdownResult, GeneratorError> {
        let steps = self
            .on_device
            .generate_breakdown(input_text, granularity, context_hints, template_ids)
            .await?;
        self.usage_store.increment(BREAKDOWN_FEATURE, 1);
        Ok(BreakdownResult::on_device(steps))
    }

    /// Send the local count for `feature` and raise the server floor with the reply
    pub async fn reconcile_usage(&self, feature: &str) -> Result<UsageReconcileResponse, BackendError> {
        let local_count = self.usage_store.local_count(feature);
        debug!(%feature, %local_count, "reconcile_usage: called");

        let response = self
            .backend
            .reconcile_usage(UsageReconcileRequest::new(&self.install_id, feature, local_count))
            .await?;
        self.usage_store.update_server_count(feature, response.server_count);

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::client::mock::MockBackendClient;
    use crate::consent::InMemoryConsentStore;
    use crate::generator::mock::MockGenerator;
    use crate::types::{BreakdownGenerateResponse, BreakdownSource, BreakdownStep, BreakdownUsage};
    use crate::usage::InMemoryUsageCounterStore;
    use chrono::Utc;

    fn cloud_response(title: &str) -> BreakdownGenerateResponse {
        BreakdownGenerateResponse {
            steps: vec![BreakdownStep::new(title)],
            provider: "openai".to_string(),
            latency_ms: 10,
            usage: BreakdownUsage {
                input_tokens: 5,
                output_tokens: 7,
            },
        }
    }

    struct Fixture {
        backend: Arc<MockBackendClient>,
        usage: Arc<InMemoryUsageCounterStore>,
        generator: Arc<MockGenerator>,
        service: BreakdownService,
    }

    fn fixture(backend: MockBackendClient, consent: bool, generator: MockGenerator) -> Fixture {
        let backend = Arc::new(backend);
        let usage = Arc::new(InMemoryUsageCounterStore::new());
        let generator = Arc::new(generator);
        let service = BreakdownService::new(
            backend.clone(),
            Arc::new(InMemoryConsentStore::new(consent)),
            usage.clone(),
            generator.clone(),
            "install-1234",
        );
        Fixture {
            backend,
            usage,
            generator,
            service,
        }
    }

    #[tokio::test]
    async fn test_consent_disabled_uses_on_device() {
        let f = fixture(
            MockBackendClient::new(vec![Ok(cloud_response("never"))]),
            false,
            MockGenerator::returning(vec![BreakdownStep::new("Offline step")]),
        );

        let result = f.service.generate_breakdown("Organize office", 2, &[], &[]).await.unwrap();

        assert_eq!(result.steps, vec![BreakdownStep::new("Offline step")]);
        assert_eq!(result.source, BreakdownSource::OnDevice);
        assert_eq!(f.backend.generate_calls(), 0);
        assert_eq!(f.usage.local_count(BREAKDOWN_FEATURE), 1);
    }

    #[tokio::test]
    async fn test_cloud_success_does_not_count_locally() {
        let f = fixture(
            MockBackendClient::new(vec![Ok(cloud_response("Step 1"))]),
            true,
            MockGenerator::returning(vec![BreakdownStep::new("Offline step")]),
        );

        let result = f.service.generate_breakdown("Organize office", 2, &[], &[]).await.unwrap();

        assert_eq!(result.source, BreakdownSource::Cloud);
        assert_eq!(result.steps, vec![BreakdownStep::new("Step 1")]);
        assert_eq!(result.usage.unwrap().output_tokens, 7);
        assert_eq!(f.generator.call_count(), 0);
        assert_eq!(f.usage.local_count(BREAKDOWN_FEATURE), 0);
    }

    #[tokio::test]
    async fn test_cloud_errors_fall_back() {
        let errors = vec![
            BackendError::Transport("reset".to_string()),
            BackendError::StatusCode {
                status: 401,
                body: String::new(),
            },
            BackendError::StatusCode {
                status: 429,
                body: String::new(),
            },
            BackendError::InvalidResponse("bad".to_string()),
            BackendError::ConsentRequired,
        ];

        for err in errors {
            let f = fixture(
                MockBackendClient::new(vec![Err(err)]),
                true,
                MockGenerator::returning(vec![BreakdownStep::new("Offline step")]),
            );

            let result = f.service.generate_breakdown("Organize office", 2, &[], &[]).await.unwrap();

            assert_eq!(result.source, BreakdownSource::OnDevice);
            assert!(result.usage.is_none());
            assert_eq!(f.backend.generate_calls(), 1);
            assert_eq!(f.usage.local_count(BREAKDOWN_FEATURE), 1);
        }
    }

    #[tokio::test]
    async fn test_on_device_failure_propagates_after_fallback() {
        let f = fixture(
            MockBackendClient::new(vec![Err(BackendError::Transport("reset".to_string()))]),
            true,
            MockGenerator::failing(),
        );

        let result = f.service.generate_breakdown("", 2, &[], &[]).await;

        assert!(matches!(result, Err(GeneratorError::InvalidInput(_))));
        assert_eq!(f.usage.local_count(BREAKDOWN_FEATURE), 0);
    }

    #[tokio::test]
    async fn test_on_device_failure_propagates_without_consent() {
        let f = fixture(MockBackendClient::new(vec![]), false, MockGenerator::failing());

        assert!(f.service.generate_breakdown("x", 1, &[], &[]).await.is_err());
        assert_eq!(f.backend.generate_calls(), 0);
    }

    #[tokio::test]
    async fn test_reconcile_sends_local_count_and_raises_floor() {
        let backend = MockBackendClient::new(vec![]).with_reconcile(vec![Ok(UsageReconcileResponse {
            server_count: 12,
            effective_remaining: 88,
            reconciled_at: Utc::now(),
        })]);
        let f = fixture(backend, true, MockGenerator::returning(vec![]));
        f.usage.increment(BREAKDOWN_FEATURE, 3);

        let response = f.service.reconcile_usage(BREAKDOWN_FEATURE).await.unwrap();

        assert_eq!(response.server_count, 12);
        let sent = f.backend.reconcile_requests();
        assert_eq!(sent[0].local_count, 3);
        assert_eq!(sent[0].install_id, "install-1234");
        assert_eq!(f.usage.server_count(BREAKDOWN_FEATURE), 12);
        assert_eq!(f.usage.merged_count(BREAKDOWN_FEATURE), 12);
        assert_eq!(f.usage.local_count(BREAKDOWN_FEATURE), 3);
    }

    #[tokio::test]
    async fn test_reconcile_lower_server_count_keeps_merged() {
        let backend = MockBackendClient::new(vec![]).with_reconcile(vec![Ok(UsageReconcileResponse {
            server_count: 1,
            effective_remaining: 99,
            reconciled_at: Utc::now(),
        })]);
        let f = fixture(backend, true, MockGenerator::returning(vec![]));
        f.usage.increment(BREAKDOWN_FEATURE, 5);
        f.usage.update_server_count(BREAKDOWN_FEATURE, 8);

        f.service.reconcile_usage(BREAKDOWN_FEATURE).await.unwrap();

        assert_eq!(f.usage.server_count(BREAKDOWN_FEATURE), 8);
        assert_eq!(f.usage.merged_count(BREAKDOWN_FEATURE), 8);
    }

    #[tokio::test]
    async fn test_reconcile_error_propagates() {
        let backend = MockBackendClient::new(vec![]).with_reconcile(vec![Err(BackendError::StatusCode {
            status: 403,
            body: String::new(),
        })]);
        let f = fixture(backend, true, MockGenerator::returning(vec![]));

        let err = f.service.reconcile_usage(BREAKDOWN_FEATURE).await.unwrap_err();
        assert_eq!(err.status(), Some(403));
        assert_eq!(f.usage.server_count(BREAKDOWN_FEATURE), 0);
    }
}
