//! Configuration for spaces and operation queues
//!
//! Both structs deserialize from JSON with every field optional, so a host
//! can keep only the overrides in its own settings file.

use serde::{Deserialize, Serialize};

use crate::error::{CogError, Result};

/// What `end_batch` does with a batch that received no operations
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyBatchPolicy {
    /// Discard the batch; it never occupies an undo slot
    #[default]
    Drop,
    /// Keep the batch as a no-op undo entry
    Keep,
}

/// Space tuning
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpaceConfig {
    /// Pre-allocated cog slots
    pub initial_capacity: usize,
    /// Log each component add/remove at debug level
    pub trace_component_edits: bool,
}

impl Default for SpaceConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 256,
            trace_component_edits: false,
        }
    }
}

impl SpaceConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| CogError::ConfigError(e.to_string()))
    }

    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    pub fn with_component_tracing(mut self, enabled: bool) -> Self {
        self.trace_component_edits = enabled;
        self
    }
}

/// Undo/redo queue tuning
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationQueueConfig {
    /// Oldest top-level entries are discarded past this depth (0 = unbounded)
    pub max_undo_depth: usize,
    pub empty_batch_policy: EmptyBatchPolicy,
    /// Capacity of the queue's notification buffer
    pub event_capacity: usize,
}

impl Default for OperationQueueConfig {
    fn default() -> Self {
        Self {
            max_undo_depth: 0,
            empty_batch_policy: EmptyBatchPolicy::Drop,
            event_capacity: 1024,
        }
    }
}

impl OperationQueueConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| CogError::ConfigError(e.to_string()))
    }

    pub fn with_max_undo_depth(mut self, depth: usize) -> Self {
        self.max_undo_depth = depth;
        self
    }

    pub fn with_empty_batch_policy(mut self, policy: EmptyBatchPolicy) -> Self {
        self.empty_batch_policy = policy;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            OperationQueueConfig::from_json_str(r#"{"empty_batch_policy": "keep"}"#).unwrap();
        assert_eq!(config.empty_batch_policy, EmptyBatchPolicy::Keep);
        assert_eq!(config.event_capacity, 1024);

        let space = SpaceConfig::from_json_str("{}").unwrap();
        assert_eq!(space, SpaceConfig::default());
    }

    #[test]
    fn test_bad_json_is_config_error() {
        let err = SpaceConfig::from_json_str("{").unwrap_err();
        assert!(matches!(err, CogError::ConfigError(_)));
    }
}
