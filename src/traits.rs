// src/traits.rs
use ndarray::Array2;

use crate::core::{Dataset, ExplainError, Output, PredictionInput, PredictionOutput, Result};

/// A black-box model queried in batches.
///
/// Implementations must return exactly one [`PredictionOutput`] per input, in
/// input order, and accept any batch size from 1 upwards. Errors are passed
/// through to the caller of the explainer untouched.
pub trait PredictionProvider: Send + Sync {
    fn predict(&self, inputs: &[PredictionInput]) -> Result<Vec<PredictionOutput>>;
}

impl<F> PredictionProvider for F
where
    F: Fn(&[PredictionInput]) -> Result<Vec<PredictionOutput>> + Send + Sync,
{
    fn predict(&self, inputs: &[PredictionInput]) -> Result<Vec<PredictionOutput>> {
        self(inputs)
    }
}

/// Calls `provider` and checks the batch came back whole.
pub(crate) fn predict_checked<P: PredictionProvider + ?Sized>(
    provider: &P,
    inputs: &[PredictionInput],
) -> Result<Vec<PredictionOutput>> {
    let outputs = provider.predict(inputs)?;
    if outputs.len() != inputs.len() {
        return Err(ExplainError::IncompatibleDimensions(format!(
            "Provider returned {} outputs for {} inputs",
            outputs.len(),
            inputs.len()
        )));
    }
    Ok(outputs)
}

/// How far a candidate's predicted outputs are from what the caller wants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GoalScore {
    /// Distance to the goal, 0 when met. Only its magnitude is used.
    pub distance: f64,
    /// Scale applied to the distance.
    pub weight: f64,
}

impl GoalScore {
    pub fn new(distance: f64, weight: f64) -> Self {
        GoalScore { distance, weight }
    }

    /// Fitness contribution: `|distance| * weight`, NaN counted as unreachable.
    pub fn fitness(&self) -> f64 {
        let f = self.distance.abs() * self.weight;
        if f.is_nan() {
            f64::INFINITY
        } else {
            f
        }
    }
}

/// Scores predicted outputs against a goal.
pub trait GoalCriteria: Send + Sync {
    fn score(&self, outputs: &PredictionOutput) -> GoalScore;
}

impl<F> GoalCriteria for F
where
    F: Fn(&PredictionOutput) -> GoalScore + Send + Sync,
{
    fn score(&self, outputs: &PredictionOutput) -> GoalScore {
        self(outputs)
    }
}

/// Adapts a numeric model (`rows x features -> rows x outputs`) to a provider.
///
/// Inputs are numerically encoded (booleans as 1/0); categorical features are rejected.
pub struct NumericModel<F> {
    predict_fn: F,
    output_names: Vec<String>,
}

impl<F> NumericModel<F>
where
    F: Fn(&Dataset) -> Result<Dataset> + Send + Sync,
{
    pub fn new(predict_fn: F, output_names: Vec<String>) -> Self {
        NumericModel {
            predict_fn,
            output_names,
        }
    }
}

impl<F> PredictionProvider for NumericModel<F>
where
    F: Fn(&Dataset) -> Result<Dataset> + Send + Sync,
{
    fn predict(&self, inputs: &[PredictionInput]) -> Result<Vec<PredictionOutput>> {
        let n_features = inputs.first().map_or(0, PredictionInput::len);
        let mut flat = Vec::with_capacity(inputs.len() * n_features);
        for input in inputs {
            if input.len() != n_features {
                return Err(ExplainError::IncompatibleDimensions(format!(
                    "Batch mixes inputs of {} and {} features",
                    n_features,
                    input.len()
                )));
            }
            flat.extend(input.to_numbers()?);
        }
        let rows = Array2::from_shape_vec((inputs.len(), n_features), flat)?;
        let predictions = (self.predict_fn)(&rows)?;
        if predictions.nrows() != inputs.len() || predictions.ncols() != self.output_names.len() {
            return Err(ExplainError::IncompatibleDimensions(format!(
                "Model returned a {}x{} matrix, expected {}x{}",
                predictions.nrows(),
                predictions.ncols(),
                inputs.len(),
                self.output_names.len()
            )));
        }
        Ok(predictions
            .rows()
            .into_iter()
            .map(|row| {
                PredictionOutput::new(
                    self.output_names
                        .iter()
                        .zip(row.iter())
                        .map(|(name, &v)| Output::number(name.clone(), v))
                        .collect(),
                )
            })
            .collect())
    }
}
