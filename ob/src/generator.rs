//! On-device breakdown capability

use async_trait::async_trait;
use tracing::debug;

use crate::error::GeneratorError;
use crate::types::BreakdownStep;

/// Local fallback that produces breakdown steps without the network
#[async_trait]
pub trait OnDeviceBreakdownGenerator: Send + Sync {
    async fn generate_breakdown(
        &self,
        input_text: &str,
        granularity: u32,
        context_hints: &[String],
        template_ids: &[String],
    ) -> Result<Vec<BreakdownStep>, GeneratorError>;
}

const MAX_STEPS: usize = 6;

/// Splits the input into sentences and turns each into a step
#[derive(Debug, Default, Clone, Copy)]
pub struct SentenceSplitGenerator;

#[async_trait]
impl OnDeviceBreakdownGenerator for SentenceSplitGenerator {
    async fn generate_breakdown(
        &self,
        input_text: &str,
        granularity: u32,
        _context_hints: &[String],
        _template_ids: &[String],
    ) -> Result<Vec<BreakdownStep>, GeneratorError> {
        debug!(input_len = %input_text.len(), %granularity, "SentenceSplitGenerator::generate_breakdown: called");
        let max_steps = (granularity as usize).saturating_add(1).clamp(1, MAX_STEPS);

        let steps: Vec<BreakdownStep> = input_text
            .split('.')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .take(max_steps)
            .enumerate()
            .map(|(i, part)| BreakdownStep::new(format!("Step {}: {}", i + 1, part)))
            .collect();

        if steps.is_empty() {
            debug!("SentenceSplitGenerator::generate_breakdown: no sentences, using placeholder");
            return Ok(vec![BreakdownStep::new("Review the task and define the first step")]);
        }

        Ok(steps)
    }
}
