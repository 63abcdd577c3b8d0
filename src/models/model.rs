//! Model records and capability metadata.

use serde::{Deserialize, Serialize};

/// Model capabilities
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ModelCapability {
    TextGeneration,
    TextAnalysis,
    Summarization,
    TopicExtraction,
    CodeGeneration,
    FunctionCalling,
    Reasoning,
    Vision,
}

/// A specific AI model offered by a provider.
///
/// Prices are USD per 1000 tokens, split by prompt and completion. The
/// catalog rejects negative or non-finite prices at ingestion; anything that
/// slips past is caught again by the cost estimator, which fails closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    pub id: String,
    pub display_name: String,
    pub provider_id: String,
    pub cost_per_1k_prompt: f64,
    pub cost_per_1k_completion: f64,
    pub context_window: u32,
    pub max_output_tokens: u32,
    pub capabilities: Vec<ModelCapability>,
    pub active: bool,
}

impl ModelSpec {
    pub fn has_capability(&self, capability: &ModelCapability) -> bool {
        self.capabilities.contains(capability)
    }

    /// True when both price fields are usable for estimation
    pub fn pricing_is_valid(&self) -> bool {
        self.cost_per_1k_prompt.is_finite()
            && self.cost_per_1k_completion.is_finite()
            && self.cost_per_1k_prompt >= 0.0
            && self.cost_per_1k_completion >= 0.0
    }
}
