// src/utils/models.rs
//! Small deterministic models, handy for trying the explainers out.

use crate::core::{ExplainError, Output, PredictionInput, PredictionOutput, Result, Value};
use crate::traits::PredictionProvider;

fn numbers(input: &PredictionInput) -> Result<Vec<f64>> {
    input
        .to_numbers()
        .map_err(|e| ExplainError::provider(e.to_string()))
}

/// Sums every feature except the one at `skip`. Output `sum-but{skip}`.
#[derive(Debug, Clone)]
pub struct SumSkipModel {
    pub skip: usize,
}

impl PredictionProvider for SumSkipModel {
    fn predict(&self, inputs: &[PredictionInput]) -> Result<Vec<PredictionOutput>> {
        inputs
            .iter()
            .map(|input| {
                let values = numbers(input)?;
                let sum: f64 = values
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != self.skip)
                    .map(|(_, v)| v)
                    .sum();
                Ok(PredictionOutput::new(vec![Output::number(
                    format!("sum-but{}", self.skip),
                    sum,
                )]))
            })
            .collect()
    }
}

/// Like [`SumSkipModel`] plus a second output holding twice the sum.
#[derive(Debug, Clone)]
pub struct SumSkipTwoOutputModel {
    pub skip: usize,
}

impl PredictionProvider for SumSkipTwoOutputModel {
    fn predict(&self, inputs: &[PredictionInput]) -> Result<Vec<PredictionOutput>> {
        SumSkipModel { skip: self.skip }
            .predict(inputs)?
            .into_iter()
            .map(|mut out| {
                let sum = out.number_at(0).unwrap_or(0.0);
                out.outputs.push(Output::number(
                    format!("sum-but{}*2", self.skip),
                    sum * 2.0,
                ));
                Ok(out)
            })
            .collect()
    }
}

/// Boolean output `inside`: whether the feature sum lies in `[center - epsilon, center + epsilon]`.
///
/// The score is the confidence in the reported label. Outside the band it grows
/// with the distance to the band, so a wrong label is held more firmly far away.
#[derive(Debug, Clone)]
pub struct SumThresholdModel {
    pub center: f64,
    pub epsilon: f64,
}

impl PredictionProvider for SumThresholdModel {
    fn predict(&self, inputs: &[PredictionInput]) -> Result<Vec<PredictionOutput>> {
        let scale = self.center.abs().max(self.epsilon).max(1.0);
        inputs
            .iter()
            .map(|input| {
                let sum: f64 = numbers(input)?.iter().sum();
                let gap = (sum - self.center).abs();
                let inside = gap <= self.epsilon;
                let score = if inside {
                    1.0 - gap / (2.0 * self.epsilon.max(f64::EPSILON))
                } else {
                    ((gap - self.epsilon) / scale).min(1.0)
                };
                Ok(PredictionOutput::new(vec![Output::new(
                    "inside",
                    Value::Boolean(inside),
                    score,
                )]))
            })
            .collect()
    }
}

/// `intercept + Σ w_i x_i`, output `linear`.
#[derive(Debug, Clone)]
pub struct LinearModel {
    pub weights: Vec<f64>,
    pub intercept: f64,
}

impl LinearModel {
    fn raw(&self, input: &PredictionInput) -> Result<f64> {
        let values = numbers(input)?;
        if values.len() != self.weights.len() {
            return Err(ExplainError::provider(format!(
                "Model expects {} features, got {}",
                self.weights.len(),
                values.len()
            )));
        }
        Ok(self.intercept + values.iter().zip(&self.weights).map(|(x, w)| x * w).sum::<f64>())
    }
}

impl PredictionProvider for LinearModel {
    fn predict(&self, inputs: &[PredictionInput]) -> Result<Vec<PredictionOutput>> {
        inputs
            .iter()
            .map(|input| Ok(PredictionOutput::new(vec![Output::number("linear", self.raw(input)?)])))
            .collect()
    }
}

/// Sigmoid of a linear model, output `probability`.
#[derive(Debug, Clone)]
pub struct LogisticModel {
    pub linear: LinearModel,
}

impl PredictionProvider for LogisticModel {
    fn predict(&self, inputs: &[PredictionInput]) -> Result<Vec<PredictionOutput>> {
        inputs
            .iter()
            .map(|input| {
                let z = self.linear.raw(input)?;
                let p = 1.0 / (1.0 + (-z).exp());
                Ok(PredictionOutput::new(vec![Output::number("probability", p)]))
            })
            .collect()
    }
}
