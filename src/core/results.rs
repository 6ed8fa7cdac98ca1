// src/core/results.rs
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::{Feature, Output, PredictionInput, PredictionOutput, Value};

/// Name of the trailing baseline entry in every [`Saliency`].
pub const FNULL_NAME: &str = "fnull";

/// Lifecycle of one counterfactual search run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchState {
    Initialized,
    Searching,
    /// Best fitness reached the goal threshold.
    Converged,
    /// Wall-clock timeout hit before convergence.
    TimedOut,
    /// Step and attempt budget spent without convergence.
    Exhausted,
}

/// One feature as frozen at the end of a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// The feature carrying the value proposed by the search.
    pub feature: Feature,
    /// The value the search started from.
    pub original: Value,
    pub constrained: bool,
}

impl Entity {
    pub fn as_feature(&self) -> Feature {
        self.feature.clone()
    }

    pub fn proposed(&self) -> &Value {
        self.feature.value()
    }

    pub fn is_changed(&self) -> bool {
        *self.proposed() != self.original
    }

    /// `proposed - original` for numeric entities.
    pub fn difference(&self) -> Option<f64> {
        Some(self.proposed().as_number()? - self.original.as_number()?)
    }
}

/// A single row of the counterfactual result table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterfactualRow {
    pub feature: String,
    pub proposed: Value,
    pub original: Value,
    pub constrained: bool,
    pub difference: Option<f64>,
}

/// Outcome of a counterfactual search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounterfactualResult {
    pub entities: Vec<Entity>,
    /// Model outputs for the proposed entities.
    pub final_outputs: PredictionOutput,
    /// True iff the goal distance is within the goal threshold.
    pub is_valid: bool,
    pub termination: SearchState,
    /// Goal distance (times weight) of the returned candidate.
    pub goal_distance: f64,
    /// Number of candidate evaluations performed.
    pub evaluations: usize,
}

impl CounterfactualResult {
    /// The proposed input, ready to feed back to the model.
    pub fn proposed_features(&self) -> PredictionInput {
        PredictionInput::new(self.entities.iter().map(Entity::as_feature).collect())
    }

    pub fn changed_entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter().filter(|e| e.is_changed())
    }

    pub fn rows(&self) -> Vec<CounterfactualRow> {
        self.entities
            .iter()
            .map(|e| CounterfactualRow {
                feature: e.feature.name().to_string(),
                proposed: e.proposed().clone(),
                original: e.original.clone(),
                constrained: e.constrained,
                difference: e.difference(),
            })
            .collect()
    }
}

impl fmt::Display for CounterfactualResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Counterfactual ({:?}, valid: {}):", self.termination, self.is_valid)?;
        writeln!(
            f,
            "  {:<16} {:>12} {:>12} {:>11} {:>12}",
            "feature", "proposed", "original", "constrained", "difference"
        )?;
        for row in self.rows() {
            let diff = row
                .difference
                .map(|d| format!("{:.4}", d))
                .unwrap_or_else(|| "-".to_string());
            writeln!(
                f,
                "  {:<16} {:>12} {:>12} {:>11} {:>12}",
                row.feature,
                row.proposed.to_string(),
                row.original.to_string(),
                row.constrained,
                diff
            )?;
        }
        Ok(())
    }
}

/// Attribution of one feature towards one output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: Feature,
    pub score: f64,
}

/// SHAP values for one model output. The last entry is the `fnull` baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Saliency {
    pub output: Output,
    pub per_feature_importance: Vec<FeatureImportance>,
}

impl Saliency {
    pub(crate) fn new(output: Output, features: &[Feature], shap_values: &[f64], fnull: f64) -> Self {
        let mut per_feature_importance: Vec<FeatureImportance> = features
            .iter()
            .zip(shap_values)
            .map(|(feature, &score)| FeatureImportance {
                feature: feature.clone(),
                score,
            })
            .collect();
        per_feature_importance.push(FeatureImportance {
            feature: Feature::number(FNULL_NAME, fnull),
            score: fnull,
        });
        Saliency {
            output,
            per_feature_importance,
        }
    }

    pub fn fnull(&self) -> f64 {
        self.per_feature_importance.last().map_or(0.0, |fi| fi.score)
    }

    /// Feature attributions without the trailing baseline.
    pub fn feature_importances(&self) -> &[FeatureImportance] {
        let n = self.per_feature_importance.len().saturating_sub(1);
        &self.per_feature_importance[..n]
    }

    pub fn shap_values(&self) -> Vec<f64> {
        self.feature_importances().iter().map(|fi| fi.score).collect()
    }

    pub fn get(&self, feature_name: &str) -> Option<&FeatureImportance> {
        self.feature_importances()
            .iter()
            .find(|fi| fi.feature.name() == feature_name)
    }

    /// `fnull + Σ φ`, the explained output in link space.
    pub fn prediction(&self) -> f64 {
        self.fnull() + self.shap_values().iter().sum::<f64>()
    }
}

/// A single row of the SHAP result table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapRow {
    pub label: String,
    pub mean_background_value: Option<f64>,
    pub feature_value: Option<f64>,
    pub shap_value: f64,
}

/// Outcome of a Kernel SHAP explanation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShapResult {
    /// One saliency per model output, in model output order.
    pub saliencies: Vec<Saliency>,
    /// Background used for every output of this explanation.
    pub background: Arc<Vec<PredictionInput>>,
    /// Synthetic points that satisfied the tracked goal, if tracking was enabled.
    pub counterfactuals: Vec<(PredictionInput, PredictionOutput)>,
    /// True when the timeout cut coalition evaluation short.
    pub timed_out: bool,
}

impl ShapResult {
    pub fn saliency(&self, output_name: &str) -> Option<&Saliency> {
        self.saliencies.iter().find(|s| s.output.name == output_name)
    }

    pub fn saliency_map(&self) -> BTreeMap<&str, &Saliency> {
        self.saliencies
            .iter()
            .map(|s| (s.output.name.as_str(), s))
            .collect()
    }

    pub fn fnull(&self) -> BTreeMap<String, f64> {
        self.saliencies
            .iter()
            .map(|s| (s.output.name.clone(), s.fnull()))
            .collect()
    }

    /// Background row, one row per feature, then the prediction row.
    pub fn rows(&self, output_name: &str) -> Option<Vec<ShapRow>> {
        let saliency = self.saliency(output_name)?;
        let fnull = saliency.fnull();
        let mut rows = vec![ShapRow {
            label: "Background".to_string(),
            mean_background_value: None,
            feature_value: None,
            shap_value: fnull,
        }];
        for (idx, fi) in saliency.feature_importances().iter().enumerate() {
            rows.push(ShapRow {
                label: fi.feature.name().to_string(),
                mean_background_value: self.mean_background_value(idx),
                feature_value: fi.feature.value().as_number(),
                shap_value: fi.score,
            });
        }
        let prediction = saliency.prediction();
        rows.push(ShapRow {
            label: "Prediction".to_string(),
            mean_background_value: Some(fnull),
            feature_value: Some(prediction),
            shap_value: prediction,
        });
        Some(rows)
    }

    fn mean_background_value(&self, feature_idx: usize) -> Option<f64> {
        let mut sum = 0.0;
        for point in self.background.iter() {
            sum += point.features.get(feature_idx)?.value().as_number()?;
        }
        if self.background.is_empty() {
            return None;
        }
        Some(sum / self.background.len() as f64)
    }
}

impl fmt::Display for ShapResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for saliency in &self.saliencies {
            writeln!(f, "Explanation of {}:", saliency.output.name)?;
            let rows = self.rows(&saliency.output.name).unwrap_or_default();
            for row in rows {
                let mean = row
                    .mean_background_value
                    .map_or_else(|| "-".to_string(), |v| format!("{:.4}", v));
                let value = row
                    .feature_value
                    .map_or_else(|| "-".to_string(), |v| format!("{:.4}", v));
                writeln!(
                    f,
                    "  {:<16} {:>12} {:>12} {:>12.4}",
                    row.label, mean, value, row.shap_value
                )?;
            }
        }
        Ok(())
    }
}
