// src/lib.rs

//! `explain_rs` explains black-box models queried through a batched
//! [`PredictionProvider`]:
//!
//! - [`CounterfactualExplainer`] searches for a nearby input whose prediction
//!   meets a goal, leaving constrained features untouched.
//! - [`ShapKernelExplainer`] estimates Shapley values with Kernel SHAP.
//! - [`BackgroundGenerator`] builds the reference dataset Kernel SHAP needs, by
//!   sampling, k-means or counterfactual search.
//!
//! ```
//! use explain_rs::utils::models::LinearModel;
//! use explain_rs::{PredictionInput, PredictionProvider, ShapConfig, ShapKernelExplainer};
//!
//! # fn main() -> explain_rs::Result<()> {
//! let model = LinearModel { weights: vec![2.0, 3.0], intercept: 1.0 };
//! let input = PredictionInput::from_numbers(&[1.0, 1.0]);
//! let output = model.predict(&[input.clone()])?.remove(0);
//!
//! let background = vec![PredictionInput::from_numbers(&[0.0, 0.0])];
//! let explainer = ShapKernelExplainer::new(ShapConfig::default(), background)?;
//! let result = explainer.explain(&input, &output, &model)?;
//! assert!((result.fnull()["linear"] - 1.0).abs() < 1e-9);
//! # Ok(())
//! # }
//! ```

pub mod algorithms;
pub mod config;
pub mod core;
pub mod traits;
pub mod utils;

pub use crate::algorithms::{
    BackgroundGenerator, CounterfactualBackgroundConfig, CounterfactualConfig,
    CounterfactualExplainer, CounterfactualRequest, KernelShapSamples, Link, OutputGoal,
    ShapConfig, ShapKernelExplainer,
};
pub use crate::config::ExplainerConfig;
pub use crate::core::{
    CounterfactualResult, Domain, Entity, ExplainError, Feature, Kind, Output, PredictionInput,
    PredictionOutput, Result, Saliency, SearchState, ShapResult, Value,
};
pub use crate::traits::{GoalCriteria, GoalScore, NumericModel, PredictionProvider};
