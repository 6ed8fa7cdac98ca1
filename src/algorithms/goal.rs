// src/algorithms/goal.rs
use std::sync::Arc;

use tracing::warn;

use crate::core::{ExplainError, Output, PredictionOutput, Result, Value};
use crate::traits::{GoalCriteria, GoalScore};

/// Goal given as a list of target outputs, matched to predictions by position.
#[derive(Debug, Clone)]
pub struct OutputGoal {
    targets: Vec<Output>,
    threshold: f64,
}

impl OutputGoal {
    /// `threshold` is the relative distance under which a numeric output counts as met.
    pub fn new(targets: Vec<Output>, threshold: f64) -> Result<Self> {
        if targets.is_empty() {
            return Err(ExplainError::InvalidGoal(
                "The goal must contain at least one output.".to_string(),
            ));
        }
        if threshold.is_nan() || threshold < 0.0 {
            return Err(ExplainError::configuration(format!(
                "goal_threshold must be non-negative, got {}",
                threshold
            )));
        }
        Ok(OutputGoal { targets, threshold })
    }

    pub fn targets(&self) -> &[Output] {
        &self.targets
    }

    /// Checks that predictions of this shape can be scored against the goal.
    pub fn validate(&self, sample: &PredictionOutput) -> Result<()> {
        if sample.len() != self.targets.len() {
            return Err(ExplainError::InvalidGoal(format!(
                "The goal has {} outputs but the model produces {}.",
                self.targets.len(),
                sample.len()
            )));
        }
        for (target, predicted) in self.targets.iter().zip(&sample.outputs) {
            let comparable = target.kind() == predicted.kind()
                || (target.value.as_number().is_some() && predicted.value.as_number().is_some());
            if !comparable {
                return Err(ExplainError::InvalidGoal(format!(
                    "Goal output '{}' is {:?} but the model produced {:?} for '{}'.",
                    target.name,
                    target.kind(),
                    predicted.kind(),
                    predicted.name
                )));
            }
            if target.name != predicted.name {
                warn!(goal = %target.name, predicted = %predicted.name, "goal output name differs from model output name");
            }
        }
        Ok(())
    }

    /// Distance of one predicted output to its target.
    pub fn output_distance(&self, predicted: &Output, target: &Output) -> f64 {
        let mut distance = match (&predicted.value, &target.value) {
            (Value::Categorical(p), Value::Categorical(g)) => mismatch(p == g, predicted.score),
            (Value::Boolean(p), Value::Boolean(g)) => mismatch(p == g, predicted.score),
            (p, g) => match (p.as_number(), g.as_number()) {
                (Some(p), Some(g)) => {
                    let d = relative_distance(p, g);
                    if d < self.threshold {
                        0.0
                    } else {
                        d
                    }
                }
                _ => f64::INFINITY,
            },
        };
        if predicted.score < target.score {
            distance += target.score - predicted.score;
        }
        distance
    }
}

fn mismatch(equal: bool, score: f64) -> f64 {
    if equal {
        0.0
    } else {
        1.0 + score.clamp(0.0, 1.0)
    }
}

/// `|p - g|`, relative to the larger magnitude unless either side is zero.
pub(crate) fn relative_distance(p: f64, g: f64) -> f64 {
    let diff = (p - g).abs();
    if p == 0.0 || g == 0.0 {
        diff
    } else {
        diff / p.abs().max(g.abs())
    }
}

impl GoalCriteria for OutputGoal {
    fn score(&self, outputs: &PredictionOutput) -> GoalScore {
        if outputs.len() != self.targets.len() {
            return GoalScore::new(f64::INFINITY, 1.0);
        }
        let distance = outputs
            .outputs
            .iter()
            .zip(&self.targets)
            .map(|(p, g)| self.output_distance(p, g))
            .sum();
        GoalScore::new(distance, 1.0)
    }
}

/// Picks the criteria used for a search: an explicit criteria wins over a goal.
pub(crate) fn resolve_criteria(
    goal: Option<&[Output]>,
    criteria: Option<Arc<dyn GoalCriteria>>,
    threshold: f64,
) -> Result<(Arc<dyn GoalCriteria>, Option<OutputGoal>)> {
    match (goal, criteria) {
        (_, Some(criteria)) => {
            if goal.is_some() {
                warn!("both a goal and criteria were given, using the criteria");
            }
            Ok((criteria, None))
        }
        (Some(targets), None) => {
            let output_goal = OutputGoal::new(targets.to_vec(), threshold)?;
            Ok((Arc::new(output_goal.clone()), Some(output_goal)))
        }
        (None, None) => Err(ExplainError::InvalidGoal(
            "Either a goal or criteria must be provided.".to_string(),
        )),
    }
}

/// Euclidean distance between two output vectors over their numeric encoding.
/// Categorical outputs count 0 when equal and 1 otherwise.
pub(crate) fn output_vector_distance(a: &PredictionOutput, b: &PredictionOutput) -> f64 {
    a.outputs
        .iter()
        .zip(&b.outputs)
        .map(|(x, y)| match (x.value.as_number(), y.value.as_number()) {
            (Some(p), Some(g)) => (p - g).powi(2),
            _ => {
                if x.value == y.value {
                    0.0
                } else {
                    1.0
                }
            }
        })
        .sum::<f64>()
        .sqrt()
}
