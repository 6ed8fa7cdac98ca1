// src/config.rs
//! One flat configuration bundle for all three engines.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::algorithms::{
    CounterfactualBackgroundConfig, CounterfactualConfig, KernelShapSamples, Link, ShapConfig,
};
use crate::core::{ExplainError, Result};

/// Request-level settings, typically loaded from JSON.
///
/// Missing keys take the defaults of the engine configs they feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplainerConfig {
    pub steps: usize,
    pub timeout_seconds: Option<u64>,
    pub seed: u64,
    /// Coalition count for Kernel SHAP; `None` means `2048 + 2 * n_features`.
    pub samples: Option<usize>,
    /// Coalitions per SHAP provider call, and candidates per counterfactual search iteration.
    pub batch_size: usize,
    pub link_type: String,
    pub k_seeds: usize,
    pub k_per_goal: usize,
    pub goal_threshold: f64,
    pub max_attempt_count: usize,
    pub chain: bool,
}

impl Default for ExplainerConfig {
    fn default() -> Self {
        ExplainerConfig {
            steps: 10_000,
            timeout_seconds: None,
            seed: 0,
            samples: None,
            batch_size: 20,
            link_type: "identity".to_string(),
            k_seeds: 5,
            k_per_goal: 100,
            goal_threshold: 0.01,
            max_attempt_count: 5,
            chain: false,
        }
    }
}

impl ExplainerConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: ExplainerConfig = serde_json::from_str(json)?;
        config.link()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn link(&self) -> Result<Link> {
        self.link_type.parse()
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds.map(Duration::from_secs)
    }

    pub fn counterfactual_config(&self) -> CounterfactualConfig {
        CounterfactualConfig {
            steps: self.steps,
            timeout: self.timeout(),
            seed: self.seed,
            goal_threshold: self.goal_threshold,
            max_attempt_count: self.max_attempt_count,
            batch_size: self.batch_size.max(1),
            ..Default::default()
        }
    }

    pub fn shap_config(&self) -> Result<ShapConfig> {
        if self.batch_size == 0 {
            return Err(ExplainError::configuration("batch_size must be at least 1"));
        }
        Ok(ShapConfig {
            link: self.link()?,
            n_samples: self.samples.map_or(KernelShapSamples::Auto, KernelShapSamples::Fixed),
            batch_size: self.batch_size,
            seed: self.seed,
            timeout: self.timeout(),
            goal_threshold: self.goal_threshold,
            ..Default::default()
        })
    }

    pub fn background_config(&self) -> CounterfactualBackgroundConfig {
        let defaults = CounterfactualBackgroundConfig::default();
        CounterfactualBackgroundConfig {
            k_seeds: self.k_seeds,
            goal_threshold: self.goal_threshold,
            chain: self.chain,
            max_attempt_count: self.max_attempt_count,
            step_count: self.steps,
            timeout_seconds: self.timeout_seconds.unwrap_or(defaults.timeout_seconds),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_takes_defaults() -> Result<()> {
        let config = ExplainerConfig::from_json_str(r#"{"steps": 500, "link_type": "logit", "samples": 300}"#)?;
        assert_eq!(config.steps, 500);
        assert_eq!(config.k_seeds, 5);
        let shap = config.shap_config()?;
        assert_eq!(shap.link, Link::Logit);
        assert_eq!(shap.n_samples, KernelShapSamples::Fixed(300));
        assert_eq!(config.counterfactual_config().steps, 500);
        assert_eq!(config.counterfactual_config().batch_size, 20);
        assert_eq!(config.background_config().step_count, 500);
        Ok(())
    }

    #[test]
    fn timeouts_convert_to_durations() -> Result<()> {
        let config = ExplainerConfig::from_json_str(r#"{"timeout_seconds": 7, "chain": true}"#)?;
        assert_eq!(config.counterfactual_config().timeout, Some(Duration::from_secs(7)));
        assert_eq!(config.background_config().timeout_seconds, 7);
        assert!(config.background_config().chain);
        Ok(())
    }

    #[test]
    fn batch_size_reaches_both_engines() -> Result<()> {
        let config = ExplainerConfig::from_json_str(r#"{"batch_size": 4}"#)?;
        assert_eq!(config.counterfactual_config().batch_size, 4);
        assert_eq!(config.shap_config()?.batch_size, 4);
        Ok(())
    }

    #[test]
    fn unknown_link_type_is_rejected() {
        let err = ExplainerConfig::from_json_str(r#"{"link_type": "probit"}"#);
        assert!(matches!(err, Err(ExplainError::Configuration(_))));
    }

    #[test]
    fn malformed_json_is_a_serialization_error() {
        let err = ExplainerConfig::from_json_str("{ steps: }");
        assert!(matches!(err, Err(ExplainError::Serialization(_))));
    }

    #[test]
    fn json_round_trip() -> Result<()> {
        let config = ExplainerConfig {
            seed: 11,
            samples: Some(64),
            ..Default::default()
        };
        let back = ExplainerConfig::from_json_str(&config.to_json_string()?)?;
        assert_eq!(back, config);
        Ok(())
    }
}
