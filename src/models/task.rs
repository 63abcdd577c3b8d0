//! Task type records.
//!
//! Task types categorize the work sent through the selector (summarization,
//! topic extraction, and so on). They are static data, mutated rarely.

use serde::{Deserialize, Serialize};

use super::model::ModelCapability;

/// A category of work with its capability requirements
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskType {
    pub id: String,
    pub description: String,
    pub required_capabilities: Vec<ModelCapability>,
    /// Floor on the candidate's context window, independent of request size
    pub min_context_window: Option<u32>,
    /// Multiplier applied to the reliability weight when scoring this task
    pub quality_bias: f64,
}

impl TaskType {
    pub fn new(id: &str, description: &str, required: Vec<ModelCapability>) -> Self {
        Self {
            id: id.to_string(),
            description: description.to_string(),
            required_capabilities: required,
            min_context_window: None,
            quality_bias: 1.0,
        }
    }

    pub fn with_min_context_window(mut self, window: u32) -> Self {
        self.min_context_window = Some(window);
        self
    }

    pub fn with_quality_bias(mut self, bias: f64) -> Self {
        self.quality_bias = bias;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let task = TaskType::new(
            "summarization",
            "Condense a conversation",
            vec![ModelCapability::Summarization],
        );
        assert_eq!(task.min_context_window, None);
        assert_eq!(task.quality_bias, 1.0);

        let long = task.clone().with_min_context_window(32_768);
        assert_eq!(long.min_context_window, Some(32_768));
    }
}
