// src/algorithms/kernel_shap.rs

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::algorithms::coalitions::{self, Coalition};
use crate::algorithms::goal::OutputGoal;
use crate::core::{
    ExplainError, Output, PredictionInput, PredictionOutput, Result, Saliency, ShapResult,
};
use crate::traits::{predict_checked, GoalCriteria, PredictionProvider};
use crate::utils::linalg::weighted_least_squares;
use crate::utils::rng::stream_rng;

/// Probabilities are clamped into `[LOGIT_CLAMP, 1 - LOGIT_CLAMP]` before the logit.
const LOGIT_CLAMP: f64 = 1e-7;

/// Function applied to model outputs before the regression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Link {
    #[default]
    Identity,
    /// Log-odds, for models returning probabilities.
    Logit,
}

impl Link {
    pub fn apply(&self, value: f64) -> f64 {
        match self {
            Link::Identity => value,
            Link::Logit => {
                let p = value.clamp(LOGIT_CLAMP, 1.0 - LOGIT_CLAMP);
                (p / (1.0 - p)).ln()
            }
        }
    }
}

impl FromStr for Link {
    type Err = ExplainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "identity" => Ok(Link::Identity),
            "logit" => Ok(Link::Logit),
            other => Err(ExplainError::configuration(format!(
                "Unknown link type '{}', expected 'identity' or 'logit'",
                other
            ))),
        }
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Link::Identity => write!(f, "identity"),
            Link::Logit => write!(f, "logit"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum KernelShapSamples {
    /// `2048 + 2 * n_features`
    #[default]
    Auto,
    Fixed(usize),
}

impl KernelShapSamples {
    pub fn resolve(&self, num_features: usize) -> usize {
        match self {
            KernelShapSamples::Auto => 2 * num_features + 2048,
            KernelShapSamples::Fixed(n) => *n,
        }
    }
}

/// Configuration for the Kernel SHAP explainer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapConfig {
    pub link: Link,
    pub n_samples: KernelShapSamples,
    /// Coalitions per provider call; each coalition expands to one input per background point.
    pub batch_size: usize,
    pub seed: u64,
    pub timeout: Option<Duration>,
    /// Goal outputs; synthetic points meeting them are returned with the result.
    pub track_counterfactuals: Option<Vec<Output>>,
    pub goal_threshold: f64,
}

impl Default for ShapConfig {
    fn default() -> Self {
        ShapConfig {
            link: Link::Identity,
            n_samples: KernelShapSamples::Auto,
            batch_size: 20,
            seed: 0,
            timeout: None,
            track_counterfactuals: None,
            goal_threshold: 0.01,
        }
    }
}

impl ShapConfig {
    pub fn with_link(mut self, link: Link) -> Self {
        self.link = link;
        self
    }

    pub fn with_n_samples(mut self, n_samples: usize) -> Self {
        self.n_samples = KernelShapSamples::Fixed(n_samples);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_tracked_counterfactuals(mut self, goal: Vec<Output>) -> Self {
        self.track_counterfactuals = Some(goal);
        self
    }

    pub fn with_goal_threshold(mut self, threshold: f64) -> Self {
        self.goal_threshold = threshold;
        self
    }
}

/// Kernel SHAP over a fixed background dataset.
///
/// Features whose value matches every background point cannot change the
/// output and get a zero attribution; the coalitions are drawn over the others.
#[derive(Debug, Clone)]
pub struct ShapKernelExplainer {
    config: ShapConfig,
    background: Arc<Vec<PredictionInput>>,
}

/// Mean (raw, pre-link) outputs of the coalitions evaluated before the deadline.
struct Evaluation {
    rows: Vec<(usize, Vec<f64>)>,
    counterfactuals: Vec<(PredictionInput, PredictionOutput)>,
    timed_out: bool,
}

impl ShapKernelExplainer {
    pub fn new(config: ShapConfig, background: Vec<PredictionInput>) -> Result<Self> {
        let Some(first) = background.first() else {
            return Err(ExplainError::configuration(
                "Background data must contain at least one point.",
            ));
        };
        if let Some(bad) = background.iter().find(|b| b.len() != first.len()) {
            return Err(ExplainError::IncompatibleDimensions(format!(
                "Background points have {} and {} features.",
                first.len(),
                bad.len()
            )));
        }
        if config.batch_size == 0 {
            return Err(ExplainError::configuration("batch_size must be at least 1"));
        }
        if config.n_samples == KernelShapSamples::Fixed(0) {
            return Err(ExplainError::configuration("n_samples must be at least 1"));
        }
        Ok(ShapKernelExplainer {
            config,
            background: Arc::new(background),
        })
    }

    pub fn config(&self) -> &ShapConfig {
        &self.config
    }

    pub fn background(&self) -> &Arc<Vec<PredictionInput>> {
        &self.background
    }

    /// Attributes every output of `output` (the model's prediction for `input`)
    /// to the features of `input`.
    pub fn explain<P: PredictionProvider + ?Sized>(
        &self,
        input: &PredictionInput,
        output: &PredictionOutput,
        provider: &P,
    ) -> Result<ShapResult> {
        let deadline = self.config.timeout.map(|t| Instant::now() + t);
        let n = input.len();
        if n == 0 {
            return Err(ExplainError::configuration("Cannot explain an input without features."));
        }
        if self.background[0].len() != n {
            return Err(ExplainError::IncompatibleDimensions(format!(
                "Input has {} features, background points have {}.",
                n,
                self.background[0].len()
            )));
        }
        if output.is_empty() {
            return Err(ExplainError::configuration("Cannot explain a prediction without outputs."));
        }
        let link = self.config.link;
        let fx: Vec<f64> = numeric_outputs(output, output.len())?
            .into_iter()
            .map(|v| link.apply(v))
            .collect();
        let tracker = match &self.config.track_counterfactuals {
            Some(targets) => {
                let goal = OutputGoal::new(targets.clone(), self.config.goal_threshold)?;
                goal.validate(output)?;
                Some(goal)
            }
            None => None,
        };

        let background_outputs = predict_checked(provider, &self.background)?;
        let fnull: Vec<f64> = mean_outputs(&background_outputs, output.len())?
            .into_iter()
            .map(|v| link.apply(v))
            .collect();

        let varying: Vec<usize> = (0..n)
            .filter(|&j| {
                self.background
                    .iter()
                    .any(|b| b.features[j].value() != input.features[j].value())
            })
            .collect();
        let m = varying.len();
        let mut phi = vec![vec![0.0; n]; output.len()];
        let mut timed_out = false;
        let mut counterfactuals = Vec::new();
        info!(
            features = n,
            varying = m,
            outputs = output.len(),
            background = self.background.len(),
            %link,
            "kernel shap started"
        );

        if m == 1 {
            for (o, phi_o) in phi.iter_mut().enumerate() {
                phi_o[varying[0]] = fx[o] - fnull[o];
            }
        } else if m > 1 {
            let n_samples = self.config.n_samples.resolve(n);
            let mut rng = stream_rng(self.config.seed, 0);
            let plan = coalitions::plan(m, n_samples, &mut rng);
            let evaluation =
                self.evaluate(&plan, &varying, input, output.len(), provider, deadline, tracker.as_ref())?;
            timed_out = evaluation.timed_out;
            counterfactuals = evaluation.counterfactuals;
            if evaluation.rows.len() < m - 1 {
                return Err(ExplainError::Timeout(format!(
                    "only {} of {} coalitions evaluated, {} needed",
                    evaluation.rows.len(),
                    plan.len(),
                    m - 1
                )));
            }
            if timed_out {
                warn!(
                    evaluated = evaluation.rows.len(),
                    planned = plan.len(),
                    "kernel shap timed out, regressing on the coalitions evaluated so far"
                );
            }

            // Efficiency is enforced by eliminating the last varying feature:
            // φ_last = Δ - Σ φ_j, so y - z_last Δ ≈ Σ_j (z_j - z_last) φ_j.
            let rows = &evaluation.rows;
            let last = m - 1;
            let mut design = Array2::zeros((rows.len(), last));
            let mut weights = Array1::zeros(rows.len());
            for (r, (idx, _)) in rows.iter().enumerate() {
                let coalition = &plan[*idx];
                let z_last = indicator(coalition.mask[last]);
                for j in 0..last {
                    design[[r, j]] = indicator(coalition.mask[j]) - z_last;
                }
                weights[r] = coalition.weight;
            }
            for (o, phi_o) in phi.iter_mut().enumerate() {
                let delta = fx[o] - fnull[o];
                let target: Array1<f64> = rows
                    .iter()
                    .map(|(idx, means)| {
                        let z_last = indicator(plan[*idx].mask[last]);
                        link.apply(means[o]) - fnull[o] - z_last * delta
                    })
                    .collect();
                let coeffs = weighted_least_squares(design.view(), target.view(), weights.view())?;
                for (j, &c) in coeffs.iter().enumerate() {
                    phi_o[varying[j]] = c;
                }
                phi_o[varying[last]] = delta - coeffs.sum();
            }
        }

        let saliencies = output
            .outputs
            .iter()
            .zip(&phi)
            .zip(&fnull)
            .map(|((out, phi_o), &f)| Saliency::new(out.clone(), &input.features, phi_o, f))
            .collect();
        debug!(timed_out, tracked = counterfactuals.len(), "kernel shap finished");
        Ok(ShapResult {
            saliencies,
            background: Arc::clone(&self.background),
            counterfactuals,
            timed_out,
        })
    }

    /// Evaluates every coalition against the whole background, `batch_size`
    /// coalitions per provider call. Batches are dispatched on the rayon pool
    /// and come back in plan order; batches starting after the deadline are skipped.
    #[allow(clippy::too_many_arguments)]
    fn evaluate<P: PredictionProvider + ?Sized>(
        &self,
        plan: &[Coalition],
        varying: &[usize],
        input: &PredictionInput,
        n_outputs: usize,
        provider: &P,
        deadline: Option<Instant>,
        tracker: Option<&OutputGoal>,
    ) -> Result<Evaluation> {
        let batch_size = self.config.batch_size;
        let threshold = self.config.goal_threshold;
        let batches: Vec<Option<Evaluation>> = plan
            .par_chunks(batch_size)
            .enumerate()
            .map(|(b, chunk)| -> Result<Option<Evaluation>> {
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    return Ok(None);
                }
                let inputs: Vec<PredictionInput> = chunk
                    .iter()
                    .flat_map(|c| {
                        self.background
                            .iter()
                            .map(move |bg| compose(&c.mask, varying, input, bg))
                    })
                    .collect();
                let outputs = predict_checked(provider, &inputs)?;
                let mut rows = Vec::with_capacity(chunk.len());
                for (i, group) in outputs.chunks(self.background.len()).enumerate() {
                    rows.push((b * batch_size + i, mean_outputs(group, n_outputs)?));
                }
                let counterfactuals = match tracker {
                    Some(goal) => inputs
                        .iter()
                        .zip(&outputs)
                        .filter(|(_, out)| goal.score(out).fitness() <= threshold)
                        .map(|(i, o)| (i.clone(), o.clone()))
                        .collect(),
                    None => Vec::new(),
                };
                Ok(Some(Evaluation {
                    rows,
                    counterfactuals,
                    timed_out: false,
                }))
            })
            .collect::<Result<_>>()?;

        let mut evaluation = Evaluation {
            rows: Vec::with_capacity(plan.len()),
            counterfactuals: Vec::new(),
            timed_out: false,
        };
        for batch in batches {
            match batch {
                Some(done) => {
                    evaluation.rows.extend(done.rows);
                    evaluation.counterfactuals.extend(done.counterfactuals);
                }
                None => evaluation.timed_out = true,
            }
        }
        Ok(evaluation)
    }
}

fn indicator(present: bool) -> f64 {
    if present {
        1.0
    } else {
        0.0
    }
}

/// Input taking the explained values for present features and `background`'s elsewhere.
fn compose(
    mask: &[bool],
    varying: &[usize],
    input: &PredictionInput,
    background: &PredictionInput,
) -> PredictionInput {
    let mut present = vec![true; input.len()];
    for (&j, &p) in varying.iter().zip(mask) {
        present[j] = p;
    }
    PredictionInput::new(
        present
            .iter()
            .enumerate()
            .map(|(j, &p)| {
                if p {
                    input.features[j].clone()
                } else {
                    background.features[j].clone()
                }
            })
            .collect(),
    )
}

fn numeric_outputs(output: &PredictionOutput, expected: usize) -> Result<Vec<f64>> {
    if output.len() != expected {
        return Err(ExplainError::IncompatibleDimensions(format!(
            "Expected {} outputs per prediction, got {}.",
            expected,
            output.len()
        )));
    }
    output
        .outputs
        .iter()
        .map(|o| {
            o.value.as_number().ok_or_else(|| {
                ExplainError::configuration(format!(
                    "Output '{}' is categorical and cannot be explained.",
                    o.name
                ))
            })
        })
        .collect()
}

fn mean_outputs(outputs: &[PredictionOutput], expected: usize) -> Result<Vec<f64>> {
    let mut sums = vec![0.0; expected];
    for out in outputs {
        for (s, v) in sums.iter_mut().zip(numeric_outputs(out, expected)?) {
            *s += v;
        }
    }
    let count = outputs.len().max(1) as f64;
    Ok(sums.into_iter().map(|s| s / count).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Feature;
    use crate::utils::models::{LinearModel, LogisticModel, SumSkipModel, SumSkipTwoOutputModel};
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    fn point(values: &[f64]) -> PredictionInput {
        PredictionInput::from_numbers(values)
    }

    fn explain_linear(
        model: &LinearModel,
        x: &[f64],
        background: Vec<PredictionInput>,
        config: ShapConfig,
    ) -> Result<ShapResult> {
        let input = point(x);
        let output = model.predict(&[input.clone()])?.remove(0);
        ShapKernelExplainer::new(config, background)?.explain(&input, &output, model)
    }

    #[test]
    fn linear_model_single_background_recovers_weights() -> Result<()> {
        let model = LinearModel {
            weights: vec![1.0, 2.0, 3.0, 4.0, 5.0],
            intercept: 0.5,
        };
        let result = explain_linear(&model, &[1.0; 5], vec![point(&[0.0; 5])], ShapConfig::default())?;
        let saliency = result.saliency("linear").ok_or_else(|| ExplainError::configuration("missing"))?;
        for (phi, w) in saliency.shap_values().iter().zip(&model.weights) {
            assert_abs_diff_eq!(*phi, *w, epsilon = 1e-6);
        }
        assert_abs_diff_eq!(saliency.fnull(), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(result.fnull()["linear"], 0.5, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn linear_model_uses_background_mean() -> Result<()> {
        // f(x1, x2) = 2*x1 + 3*x2 + 5
        let model = LinearModel {
            weights: vec![2.0, 3.0],
            intercept: 5.0,
        };
        let background = vec![point(&[0.0, 0.0]), point(&[1.0, 0.0]), point(&[0.0, 1.0])];
        let result = explain_linear(&model, &[2.0, 1.0], background, ShapConfig::default())?;
        let saliency = &result.saliencies[0];
        assert_abs_diff_eq!(saliency.fnull(), 20.0 / 3.0, epsilon = 1e-9);
        assert_abs_diff_eq!(saliency.shap_values()[0], 2.0 * (2.0 - 1.0 / 3.0), epsilon = 1e-9);
        assert_abs_diff_eq!(saliency.shap_values()[1], 3.0 * (1.0 - 1.0 / 3.0), epsilon = 1e-9);
        assert_abs_diff_eq!(saliency.prediction(), 12.0, epsilon = 1e-9);
        Ok(())
    }

    #[test]
    fn interaction_is_split_evenly() -> Result<()> {
        let model = |inputs: &[PredictionInput]| -> Result<Vec<PredictionOutput>> {
            inputs
                .iter()
                .map(|i| {
                    let v = i.to_numbers()?;
                    Ok(PredictionOutput::new(vec![Output::number("product", v[0] * v[1])]))
                })
                .collect()
        };
        let input = point(&[1.0, 1.0]);
        let output = model(&[input.clone()])?.remove(0);
        let result = ShapKernelExplainer::new(ShapConfig::default(), vec![point(&[0.0, 0.0])])?
            .explain(&input, &output, &model)?;
        let phi = result.saliencies[0].shap_values();
        assert_abs_diff_eq!(phi[0], 0.5, epsilon = 1e-9);
        assert_abs_diff_eq!(phi[1], 0.5, epsilon = 1e-9);
        Ok(())
    }

    #[test]
    fn sampled_coalitions_are_deterministic_and_exact_for_linear_models() -> Result<()> {
        let weights: Vec<f64> = (0..12).map(|i| i as f64 - 5.5).collect();
        let model = LinearModel {
            weights: weights.clone(),
            intercept: 1.0,
        };
        let x: Vec<f64> = (0..12).map(|i| (i % 4) as f64 + 1.0).collect();
        let background = vec![point(&[0.0; 12]), point(&[-1.0; 12])];
        let config = ShapConfig::default().with_n_samples(200).with_seed(3);
        let first = explain_linear(&model, &x, background.clone(), config.clone())?;
        let second = explain_linear(&model, &x, background, config)?;
        assert_eq!(first.saliencies, second.saliencies);

        let phi = first.saliencies[0].shap_values();
        for j in 0..12 {
            assert_abs_diff_eq!(phi[j], weights[j] * (x[j] + 0.5), epsilon = 1e-6);
        }
        Ok(())
    }

    #[test]
    fn logit_link_is_additive_in_log_odds() -> Result<()> {
        let model = LogisticModel {
            linear: LinearModel {
                weights: vec![0.5, -1.0, 0.25],
                intercept: 0.2,
            },
        };
        let input = point(&[1.0, 1.0, 2.0]);
        let output = model.predict(&[input.clone()])?.remove(0);
        let explainer = ShapKernelExplainer::new(
            ShapConfig::default().with_link(Link::Logit),
            vec![point(&[0.0, 0.0, 0.0])],
        )?;
        let saliency = &explainer.explain(&input, &output, &model)?.saliencies[0];
        assert_abs_diff_eq!(saliency.fnull(), 0.2, epsilon = 1e-9);
        assert_abs_diff_eq!(saliency.shap_values()[0], 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(saliency.shap_values()[1], -1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(saliency.shap_values()[2], 0.5, epsilon = 1e-6);
        Ok(())
    }

    #[test]
    fn skipped_feature_gets_no_credit_on_every_output() -> Result<()> {
        let model = SumSkipTwoOutputModel { skip: 1 };
        let input = point(&[1.0, 7.0, 3.0]);
        let output = model.predict(&[input.clone()])?.remove(0);
        let result = ShapKernelExplainer::new(ShapConfig::default(), vec![point(&[0.0; 3])])?
            .explain(&input, &output, &model)?;
        assert_eq!(result.saliencies.len(), 2);
        let single = result.saliencies[0].shap_values();
        let double = result.saliencies[1].shap_values();
        assert_abs_diff_eq!(single[1], 0.0, epsilon = 1e-9);
        for j in 0..3 {
            assert_abs_diff_eq!(double[j], 2.0 * single[j], epsilon = 1e-9);
        }
        Ok(())
    }

    #[test]
    fn features_matching_the_background_get_zero() -> Result<()> {
        let model = SumSkipModel { skip: 99 };
        let input = point(&[4.0, 2.0, 0.0]);
        let output = model.predict(&[input.clone()])?.remove(0);
        let result = ShapKernelExplainer::new(ShapConfig::default(), vec![point(&[0.0; 3])])?
            .explain(&input, &output, &model)?;
        let phi = result.saliencies[0].shap_values();
        assert_abs_diff_eq!(phi[0], 4.0, epsilon = 1e-9);
        assert_abs_diff_eq!(phi[1], 2.0, epsilon = 1e-9);
        assert_eq!(phi[2], 0.0);
        Ok(())
    }

    #[test]
    fn tracked_counterfactuals_are_collected() -> Result<()> {
        let model = LinearModel {
            weights: vec![1.0; 3],
            intercept: 0.0,
        };
        let config = ShapConfig::default().with_tracked_counterfactuals(vec![Output::number("linear", 2.0)]);
        let result = explain_linear(&model, &[1.0; 3], vec![point(&[0.0; 3])], config)?;
        assert_eq!(result.counterfactuals.len(), 3);
        assert!(result
            .counterfactuals
            .iter()
            .all(|(_, out)| out.number_at(0) == Some(2.0)));
        Ok(())
    }

    #[test]
    fn expired_timeout_is_an_error() {
        let model = LinearModel {
            weights: vec![1.0; 4],
            intercept: 0.0,
        };
        let config = ShapConfig::default().with_timeout(Duration::ZERO);
        let err = explain_linear(&model, &[1.0; 4], vec![point(&[0.0; 4])], config);
        assert!(matches!(err, Err(ExplainError::Timeout(_))));
    }

    #[test]
    fn partial_timeout_regresses_on_evaluated_coalitions() -> Result<()> {
        let model = LinearModel {
            weights: (1..=10).map(f64::from).collect(),
            intercept: 0.0,
        };
        // the background call and the first twenty coalition calls are fast, later calls stall
        let calls = std::sync::atomic::AtomicUsize::new(0);
        let stalling = |inputs: &[PredictionInput]| -> Result<Vec<PredictionOutput>> {
            if calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst) > 20 {
                std::thread::sleep(Duration::from_millis(300));
            }
            model.predict(inputs)
        };
        let input = point(&[1.0; 10]);
        let output = model.predict(&[input.clone()])?.remove(0);
        let config = ShapConfig::default()
            .with_n_samples(1022)
            .with_batch_size(1)
            .with_timeout(Duration::from_millis(150));

        let result = ShapKernelExplainer::new(config, vec![point(&[0.0; 10])])?.explain(&input, &output, &stalling)?;

        assert!(result.timed_out);
        assert!(calls.load(std::sync::atomic::Ordering::SeqCst) < 1023);
        let saliency = &result.saliencies[0];
        assert_eq!(saliency.shap_values().len(), 10);
        assert_abs_diff_eq!(saliency.prediction(), 55.0, epsilon = 1e-8);
        Ok(())
    }

    #[test]
    fn empty_background_is_a_configuration_error() {
        let err = ShapKernelExplainer::new(ShapConfig::default(), Vec::new());
        assert!(matches!(err, Err(ExplainError::Configuration(_))));
    }

    #[test]
    fn categorical_outputs_are_rejected() -> Result<()> {
        let model = |inputs: &[PredictionInput]| -> Result<Vec<PredictionOutput>> {
            Ok(inputs
                .iter()
                .map(|_| PredictionOutput::new(vec![Output::new("label", "cat", 0.9)]))
                .collect())
        };
        let input = PredictionInput::new(vec![Feature::number("a", 1.0), Feature::number("b", 2.0)]);
        let output = model(&[input.clone()])?.remove(0);
        let err = ShapKernelExplainer::new(ShapConfig::default(), vec![point(&[0.0, 0.0])])?
            .explain(&input, &output, &model);
        assert!(matches!(err, Err(ExplainError::Configuration(_))));
        Ok(())
    }

    #[test]
    fn provider_errors_abort_the_explanation() -> Result<()> {
        let model = |_: &[PredictionInput]| -> Result<Vec<PredictionOutput>> {
            Err(ExplainError::provider("model offline"))
        };
        let input = point(&[1.0, 2.0]);
        let output = PredictionOutput::new(vec![Output::number("y", 3.0)]);
        let err = ShapKernelExplainer::new(ShapConfig::default(), vec![point(&[0.0, 0.0])])?
            .explain(&input, &output, &model);
        assert!(matches!(err, Err(ExplainError::Provider(msg)) if msg == "model offline"));
        Ok(())
    }

    #[test]
    fn link_parsing() {
        assert_eq!("Logit".parse::<Link>().ok(), Some(Link::Logit));
        assert_eq!("identity".parse::<Link>().ok(), Some(Link::Identity));
        assert!(matches!("probit".parse::<Link>(), Err(ExplainError::Configuration(_))));
    }

    proptest! {
        #[test]
        fn efficiency_holds(
            weights in prop::collection::vec(-5.0f64..5.0, 4),
            x in prop::collection::vec(-10.0f64..10.0, 4),
            b in prop::collection::vec(-10.0f64..10.0, 8),
        ) {
            let model = LinearModel { weights, intercept: 0.3 };
            let background = vec![point(&b[..4]), point(&b[4..])];
            let result = explain_linear(&model, &x, background, ShapConfig::default());
            prop_assert!(result.is_ok());
            if let Ok(result) = result {
                let saliency = &result.saliencies[0];
                let fx = saliency.output.value.as_number().unwrap_or(f64::NAN);
                prop_assert!((saliency.prediction() - fx).abs() < 1e-8);
            }
        }
    }
}
