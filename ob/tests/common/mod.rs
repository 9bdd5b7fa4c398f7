//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;

use offload_breakdown::error::TransportError;
use offload_breakdown::transport::{ApiRequest, ApiResponse, Transport};

/// Transport that replays scripted responses and records every request
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<ApiResponse, TransportError>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<Result<ApiResponse, TransportError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.path).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::InvalidUrl("No more scripted responses".to_string())))
    }
}

pub fn session_ok(token: &str, expires_at: DateTime<Utc>) -> Result<ApiResponse, TransportError> {
    Ok(ApiResponse::json(
        200,
        &json!({"session_token": token, "expires_at": expires_at.to_rfc3339()}),
    ))
}

pub fn generate_ok(titles: &[&str]) -> Result<ApiResponse, TransportError> {
    let steps: Vec<_> = titles.iter().map(|t| json!({"title": t, "substeps": []})).collect();
    Ok(ApiResponse::json(
        200,
        &json!({
            "steps": steps,
            "provider": "openai",
            "latency_ms": 85,
            "usage": {"input_tokens": 20, "output_tokens": 40}
        }),
    ))
}

pub fn error_envelope(status: u16, code: &str) -> Result<ApiResponse, TransportError> {
    Ok(ApiResponse::json(
        status,
        &json!({"error": {"code": code, "message": code, "request_id": "req-test"}}),
    ))
}

/// On-device generator returning fixed steps
pub struct FixedGenerator(pub Vec<offload_breakdown::BreakdownStep>);

#[async_trait]
impl offload_breakdown::OnDeviceBreakdownGenerator for FixedGenerator {
    async fn generate_breakdown(
        &self,
        _input_text: &str,
        _granularity: u32,
        _context_hints: &[String],
        _template_ids: &[String],
    ) -> Result<Vec<offload_breakdown::BreakdownStep>, offload_breakdown::GeneratorError> {
        Ok(self.0.clone())
    }
}
