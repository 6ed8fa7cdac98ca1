// src/algorithms/counterfactual.rs

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::algorithms::goal::{resolve_criteria, OutputGoal};
use crate::core::{
    CounterfactualResult, Domain, Entity, ExplainError, Feature, Kind, Output, PredictionInput,
    PredictionOutput, Result, SearchState, Value,
};
use crate::traits::{predict_checked, GoalCriteria, PredictionProvider};
use crate::utils::rng::{stream_id, stream_rng};

/// Configuration for the counterfactual search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterfactualConfig {
    /// Candidate evaluations allowed per attempt.
    pub steps: usize,
    /// Wall-clock limit for the whole request.
    pub timeout: Option<Duration>,
    pub seed: u64,
    /// Goal distance at or under which a candidate is a valid counterfactual.
    pub goal_threshold: f64,
    /// Perturb/retry cycles before giving up on the goal.
    pub max_attempt_count: usize,
    /// Length of the late-acceptance history.
    pub late_acceptance_size: usize,
    /// Evaluations spent reducing changes once the goal is met.
    pub polish_steps: usize,
    /// Candidates proposed (and sent to the provider) per iteration.
    pub batch_size: usize,
}

impl Default for CounterfactualConfig {
    fn default() -> Self {
        CounterfactualConfig {
            steps: 10_000,
            timeout: None,
            seed: 0,
            goal_threshold: 0.01,
            max_attempt_count: 1,
            late_acceptance_size: 50,
            polish_steps: 500,
            batch_size: 1,
        }
    }
}

impl CounterfactualConfig {
    pub fn with_steps(mut self, steps: usize) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_goal_threshold(mut self, threshold: f64) -> Self {
        self.goal_threshold = threshold;
        self
    }

    pub fn with_max_attempt_count(mut self, attempts: usize) -> Self {
        self.max_attempt_count = attempts;
        self
    }

    pub fn with_polish_steps(mut self, steps: usize) -> Self {
        self.polish_steps = steps;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }
}

/// What to search from and what to search for.
#[derive(Clone, Default)]
pub struct CounterfactualRequest {
    features: Vec<Feature>,
    goal: Option<Vec<Output>>,
    criteria: Option<Arc<dyn GoalCriteria>>,
    feature_domains: Option<Vec<Option<Domain>>>,
}

impl CounterfactualRequest {
    pub fn new(features: Vec<Feature>) -> Self {
        CounterfactualRequest {
            features,
            ..Default::default()
        }
    }

    /// Desired outputs, matched to the model outputs by position.
    pub fn with_goal(mut self, goal: Vec<Output>) -> Self {
        self.goal = Some(goal);
        self
    }

    /// Arbitrary scoring callback; takes precedence over `with_goal`.
    pub fn with_criteria<C: GoalCriteria + 'static>(mut self, criteria: C) -> Self {
        self.criteria = Some(Arc::new(criteria));
        self
    }

    /// Per-feature domains replacing those carried by the features.
    pub fn with_feature_domains(mut self, domains: Vec<Option<Domain>>) -> Self {
        self.feature_domains = Some(domains);
        self
    }
}

/// Finds a nearby input whose predictions satisfy a goal.
#[derive(Debug, Clone, Default)]
pub struct CounterfactualExplainer {
    config: CounterfactualConfig,
}

impl CounterfactualExplainer {
    pub fn new(config: CounterfactualConfig) -> Self {
        CounterfactualExplainer { config }
    }

    pub fn config(&self) -> &CounterfactualConfig {
        &self.config
    }

    pub fn explain<P: PredictionProvider + ?Sized>(
        &self,
        request: CounterfactualRequest,
        provider: &P,
    ) -> Result<CounterfactualResult> {
        let (criteria, output_goal) = resolve_criteria(
            request.goal.as_deref(),
            request.criteria,
            self.config.goal_threshold,
        )?;
        let features = match request.feature_domains {
            Some(domains) => apply_domains(request.features, domains)?,
            None => request.features,
        };
        let deadline = self.config.timeout.map(|t| Instant::now() + t);
        let search = CounterfactualSearch::new(features, criteria, output_goal, self.config.clone())?;
        search.run(provider, 0, deadline, false)
    }
}

/// Replaces feature domains, warning when an existing domain is overwritten.
pub(crate) fn apply_domains(features: Vec<Feature>, domains: Vec<Option<Domain>>) -> Result<Vec<Feature>> {
    if domains.len() != features.len() {
        return Err(ExplainError::IncompatibleDimensions(format!(
            "{} feature domains given for {} features",
            domains.len(),
            features.len()
        )));
    }
    features
        .into_iter()
        .zip(domains)
        .map(|(feature, domain)| match domain {
            None => Ok(feature),
            Some(domain) => {
                if feature.domain().is_some() {
                    warn!(feature = feature.name(), "overwriting an existing feature domain");
                }
                feature.replace_domain(None).with_domain(domain)
            }
        })
        .collect()
}

/// Checks every searchable feature can be perturbed within bounds.
pub(crate) fn validate_search_domains(features: &[Feature]) -> Result<()> {
    for feature in features {
        if let Some(domain) = feature.domain() {
            domain.validate()?;
        }
    }
    for feature in features.iter().filter(|f| !f.is_constrained()) {
        let ok = match (feature.kind(), feature.domain()) {
            (Kind::Boolean, _) => true,
            (_, Some(_)) => true,
            (_, None) => false,
        };
        if !ok {
            return Err(ExplainError::Configuration(format!(
                "Feature '{}' needs a domain to be searched; constrain it or pass feature domains",
                feature.name()
            )));
        }
    }
    Ok(())
}

/// Lexicographic fitness: goal distance, then changed entities, then change magnitude.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Score {
    goal: f64,
    changed: usize,
    proximity: f64,
}

impl Score {
    fn met(&self, threshold: f64) -> bool {
        self.goal <= threshold
    }

    fn effective_goal(&self, threshold: f64) -> f64 {
        if self.met(threshold) {
            0.0
        } else {
            self.goal
        }
    }

    fn compare(&self, other: &Score, threshold: f64) -> Ordering {
        self.effective_goal(threshold)
            .total_cmp(&other.effective_goal(threshold))
            .then(self.changed.cmp(&other.changed))
            .then(self.proximity.total_cmp(&other.proximity))
    }
}

/// One evaluated assignment of entity values.
#[derive(Debug, Clone)]
struct Candidate {
    values: Vec<Value>,
    outputs: PredictionOutput,
    score: Score,
}

struct AttemptOutcome {
    best: Candidate,
    timed_out: bool,
}

/// A single search problem: original entities, criteria and budget.
///
/// Entities stay immutable; the search mutates candidate value vectors only,
/// so concurrent runs over the same problem never alias.
pub struct CounterfactualSearch {
    originals: Vec<Feature>,
    free: Vec<usize>,
    criteria: Arc<dyn GoalCriteria>,
    output_goal: Option<OutputGoal>,
    config: CounterfactualConfig,
}

impl CounterfactualSearch {
    pub fn new(
        features: Vec<Feature>,
        criteria: Arc<dyn GoalCriteria>,
        output_goal: Option<OutputGoal>,
        config: CounterfactualConfig,
    ) -> Result<Self> {
        if features.is_empty() {
            return Err(ExplainError::configuration("Cannot search over an empty input"));
        }
        if config.goal_threshold.is_nan() || config.goal_threshold < 0.0 {
            return Err(ExplainError::Configuration(format!(
                "goal_threshold must be non-negative, got {}",
                config.goal_threshold
            )));
        }
        validate_search_domains(&features)?;
        let free = features
            .iter()
            .enumerate()
            .filter(|(_, f)| !f.is_constrained())
            .map(|(i, _)| i)
            .collect();
        Ok(CounterfactualSearch {
            originals: features,
            free,
            criteria,
            output_goal,
            config,
        })
    }

    /// Runs the search on generator stream `stream`.
    ///
    /// With `perturb_start` the first attempt starts from a perturbed copy of the
    /// original entities instead of the entities themselves.
    pub fn run<P: PredictionProvider + ?Sized>(
        &self,
        provider: &P,
        stream: u64,
        deadline: Option<Instant>,
        perturb_start: bool,
    ) -> Result<CounterfactualResult> {
        let threshold = self.config.goal_threshold;
        let mut state = SearchState::Initialized;
        let original: Vec<Value> = self.originals.iter().map(|f| f.value().clone()).collect();
        let initial = self.evaluate(provider, vec![original])?.remove(0);
        if let Some(goal) = &self.output_goal {
            goal.validate(&initial.outputs)?;
        }
        let mut evaluations = 1;
        info!(
            ?state,
            features = self.originals.len(),
            free = self.free.len(),
            steps = self.config.steps,
            initial_goal = initial.score.goal,
            "counterfactual search started"
        );

        let mut best = initial.clone();
        let mut timed_out = false;
        let needs_search = perturb_start || !initial.score.met(threshold);
        if needs_search && !self.free.is_empty() {
            state = SearchState::Searching;
            debug!(?state, "entering local search");
            for attempt in 0..self.config.max_attempt_count.max(1) {
                let mut rng = stream_rng(self.config.seed, stream_id(&[stream, attempt as u64]));
                let start = if attempt == 0 && !perturb_start {
                    initial.clone()
                } else {
                    if deadline.map_or(false, |d| Instant::now() >= d) {
                        timed_out = true;
                        break;
                    }
                    let values = self.perturb(&initial.values, &mut rng);
                    evaluations += 1;
                    self.evaluate(provider, vec![values])?.remove(0)
                };
                let outcome = self.local_search(provider, start, &mut rng, deadline, &mut evaluations)?;
                debug!(
                    attempt,
                    goal = outcome.best.score.goal,
                    changed = outcome.best.score.changed,
                    "search attempt finished"
                );
                if perturb_start && attempt == 0 {
                    best = outcome.best;
                } else if outcome.best.score.compare(&best.score, threshold) == Ordering::Less {
                    best = outcome.best;
                }
                if best.score.met(threshold) {
                    break;
                }
                if outcome.timed_out {
                    timed_out = true;
                    break;
                }
            }
        }

        let is_valid = best.score.met(threshold);
        state = if is_valid {
            SearchState::Converged
        } else if timed_out {
            SearchState::TimedOut
        } else {
            SearchState::Exhausted
        };
        info!(
            ?state,
            evaluations,
            goal = best.score.goal,
            changed = best.score.changed,
            "counterfactual search finished"
        );
        Ok(self.freeze(best, is_valid, state, evaluations))
    }

    fn local_search<P: PredictionProvider + ?Sized>(
        &self,
        provider: &P,
        start: Candidate,
        rng: &mut ChaCha8Rng,
        deadline: Option<Instant>,
        evaluations: &mut usize,
    ) -> Result<AttemptOutcome> {
        let threshold = self.config.goal_threshold;
        let history_len = self.config.late_acceptance_size.max(1);
        let batch_size = self.config.batch_size.max(1);
        let mut history = vec![start.score.goal; history_len];
        let mut current = start.clone();
        let mut best = start;
        let mut used = 0;
        let mut polish_used = 0;
        let mut iteration = 0;

        while used < self.config.steps {
            if deadline.map_or(false, |d| Instant::now() >= d) {
                return Ok(AttemptOutcome { best, timed_out: true });
            }
            let polishing = best.score.met(threshold);
            if polishing && polish_used >= self.config.polish_steps {
                break;
            }
            let k = batch_size.min(self.config.steps - used);
            let proposals = (0..k)
                .map(|_| self.propose(&current.values, rng, polishing))
                .collect();
            let candidate = self
                .evaluate(provider, proposals)?
                .into_iter()
                .min_by(|a, b| {
                    a.score
                        .goal
                        .total_cmp(&b.score.goal)
                        .then(a.score.compare(&b.score, threshold))
                });
            used += k;
            *evaluations += k;
            if polishing {
                polish_used += k;
            }
            let Some(candidate) = candidate else { break };

            let slot = iteration % history_len;
            let accept = if polishing {
                candidate.score.met(threshold)
                    && candidate.score.compare(&current.score, threshold) != Ordering::Greater
            } else {
                candidate.score.goal <= current.score.goal || candidate.score.goal <= history[slot]
            };
            if candidate.score.compare(&best.score, threshold) == Ordering::Less {
                best = candidate.clone();
            }
            if accept {
                current = candidate;
            }
            if !polishing && best.score.met(threshold) {
                // polish from the first point that meets the goal
                current = best.clone();
            }
            history[slot] = current.score.goal;
            iteration += 1;
        }
        Ok(AttemptOutcome { best, timed_out: false })
    }

    /// Neighbour of `values`: one or two free entities moved within their domains.
    fn propose(&self, values: &[Value], rng: &mut ChaCha8Rng, polishing: bool) -> Vec<Value> {
        let mut next = values.to_vec();
        let moves = if self.free.len() > 1 && rng.gen_bool(0.2) { 2 } else { 1 };
        let revert_p = if polishing { 0.4 } else { 0.1 };
        for _ in 0..moves {
            let idx = self.free[rng.gen_range(0..self.free.len())];
            let original = self.originals[idx].value();
            next[idx] = if next[idx] != *original && rng.gen_bool(revert_p) {
                original.clone()
            } else {
                self.move_value(idx, &next[idx], rng)
            };
        }
        next
    }

    fn move_value(&self, idx: usize, current: &Value, rng: &mut ChaCha8Rng) -> Value {
        let feature = &self.originals[idx];
        match (feature.domain(), current) {
            (Some(domain @ Domain::Numeric { lower, upper }), Value::Number(v)) => {
                if rng.gen_bool(0.35) {
                    domain.sample(rng)
                } else {
                    // multi-scale gaussian step, a quarter of the span down to ~1e-6 of it
                    let scale = 0.25 * (upper - lower) * 10f64.powf(-rng.gen_range(0.0..6.0));
                    let z: f64 = StandardNormal.sample(rng);
                    Value::Number((v + z * scale).clamp(*lower, *upper))
                }
            }
            (Some(domain), _) => domain.sample_other(current, rng),
            (None, Value::Boolean(b)) => Value::Boolean(!b),
            (None, other) => other.clone(),
        }
    }

    /// Restart point: every free entity moved with probability one half, at least one moved.
    fn perturb(&self, values: &[Value], rng: &mut ChaCha8Rng) -> Vec<Value> {
        let mut next = values.to_vec();
        let forced = self.free[rng.gen_range(0..self.free.len())];
        for &idx in &self.free {
            if idx == forced || rng.gen_bool(0.5) {
                next[idx] = self.move_value(idx, &next[idx], rng);
            }
        }
        next
    }

    fn evaluate<P: PredictionProvider + ?Sized>(
        &self,
        provider: &P,
        batch: Vec<Vec<Value>>,
    ) -> Result<Vec<Candidate>> {
        let inputs: Vec<PredictionInput> = batch.iter().map(|values| self.to_input(values)).collect();
        let outputs = predict_checked(provider, &inputs)?;
        Ok(batch
            .into_iter()
            .zip(outputs)
            .map(|(values, outputs)| {
                let score = self.score(&values, &outputs);
                Candidate { values, outputs, score }
            })
            .collect())
    }

    fn score(&self, values: &[Value], outputs: &PredictionOutput) -> Score {
        let goal = self.criteria.score(outputs).fitness();
        let mut changed = 0;
        let mut proximity = 0.0;
        for &idx in &self.free {
            let original = self.originals[idx].value();
            if values[idx] == *original {
                continue;
            }
            changed += 1;
            proximity += match (values[idx].as_number(), original.as_number(), self.originals[idx].domain()) {
                (Some(p), Some(o), Some(domain)) => match domain.span() {
                    Some(span) if span > 0.0 => (p - o).abs() / span,
                    _ => 1.0,
                },
                _ => 1.0,
            };
        }
        Score { goal, changed, proximity }
    }

    fn to_input(&self, values: &[Value]) -> PredictionInput {
        PredictionInput::new(
            self.originals
                .iter()
                .zip(values)
                .map(|(f, v)| f.with_value(v.clone()))
                .collect(),
        )
    }

    fn freeze(&self, best: Candidate, is_valid: bool, termination: SearchState, evaluations: usize) -> CounterfactualResult {
        let entities = self
            .originals
            .iter()
            .zip(best.values)
            .map(|(feature, proposed)| Entity {
                constrained: feature.is_constrained(),
                original: feature.value().clone(),
                feature: feature.with_value(proposed),
            })
            .collect();
        CounterfactualResult {
            entities,
            final_outputs: best.outputs,
            is_valid,
            termination,
            goal_distance: best.score.goal,
            evaluations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::GoalScore;
    use crate::utils::models::{LinearModel, SumSkipModel, SumSkipTwoOutputModel, SumThresholdModel};
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    fn numeric_features(n: usize, value: f64, lower: f64, upper: f64) -> Vec<Feature> {
        (0..n)
            .map(|i| {
                Feature::number(format!("f-num{}", i + 1), value)
                    .with_domain(Domain::numeric(lower, upper).unwrap())
                    .unwrap()
            })
            .collect()
    }

    fn total(result: &CounterfactualResult) -> f64 {
        result
            .entities
            .iter()
            .filter_map(|e| e.feature.value().as_number())
            .sum()
    }

    #[test]
    fn finds_sum_inside_threshold_band() -> Result<()> {
        let explainer = CounterfactualExplainer::new(CounterfactualConfig::default().with_steps(10_000));
        let request = CounterfactualRequest::new(numeric_features(4, 10.0, 0.0, 1000.0))
            .with_goal(vec![Output::new("inside", true, 0.0)]);
        let model = SumThresholdModel { center: 500.0, epsilon: 10.0 };

        let result = explainer.explain(request, &model)?;

        let sum = total(&result);
        assert!(result.is_valid);
        assert_eq!(result.termination, SearchState::Converged);
        assert!(sum >= 490.0 && sum <= 510.0, "sum = {}", sum);
        assert_eq!(result.final_outputs.outputs[0].value, Value::Boolean(true));
        Ok(())
    }

    #[test]
    fn entities_carry_proposed_values_and_originals() -> Result<()> {
        let request = CounterfactualRequest::new(numeric_features(3, 10.0, 0.0, 1000.0))
            .with_goal(vec![Output::number("sum-but9", 300.0)]);
        let result = CounterfactualExplainer::default().explain(request, &SumSkipModel { skip: 9 })?;

        assert!(result.is_valid);
        assert!(result.entities.iter().all(|e| e.original == Value::Number(10.0)));
        assert!(result.changed_entities().count() > 0);
        assert_abs_diff_eq!(total(&result), 300.0, epsilon = 3.1);
        let rows = result.rows();
        for (row, entity) in rows.iter().zip(&result.entities) {
            assert_eq!(&row.proposed, entity.feature.value());
            assert_eq!(row.original, Value::Number(10.0));
        }
        Ok(())
    }

    #[test]
    fn batched_proposals_converge() -> Result<()> {
        let config = CounterfactualConfig::default().with_batch_size(8).with_seed(5);
        let calls = std::sync::atomic::AtomicUsize::new(0);
        let largest = std::sync::atomic::AtomicUsize::new(0);
        let model = SumThresholdModel { center: 500.0, epsilon: 10.0 };
        let counting = |inputs: &[PredictionInput]| -> Result<Vec<PredictionOutput>> {
            calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            largest.fetch_max(inputs.len(), std::sync::atomic::Ordering::SeqCst);
            model.predict(inputs)
        };
        let request = CounterfactualRequest::new(numeric_features(4, 10.0, 0.0, 1000.0))
            .with_goal(vec![Output::new("inside", true, 0.0)]);

        let result = CounterfactualExplainer::new(config).explain(request, &counting)?;

        assert!(result.is_valid);
        let sum = total(&result);
        assert!(sum >= 490.0 && sum <= 510.0, "sum = {}", sum);
        assert_eq!(largest.load(std::sync::atomic::Ordering::SeqCst), 8);
        // one initial call, then eight evaluations per call
        assert!(calls.load(std::sync::atomic::Ordering::SeqCst) < result.evaluations);
        Ok(())
    }

    #[test]
    fn reaches_numeric_goal() -> Result<()> {
        let explainer = CounterfactualExplainer::new(CounterfactualConfig::default().with_steps(5_000));
        let request = CounterfactualRequest::new(numeric_features(5, 10.0, 0.0, 1000.0))
            .with_goal(vec![Output::number("sum-but4", 1000.0)]);

        let result = explainer.explain(request, &SumSkipModel { skip: 4 })?;

        assert!(result.is_valid);
        let predicted = result.final_outputs.number_at(0).unwrap_or(f64::NAN);
        assert!((predicted - 1000.0).abs() <= 10.2, "predicted = {}", predicted);
        Ok(())
    }

    #[test]
    fn reaches_zero_goal_of_linear_model() -> Result<()> {
        let model = LinearModel { weights: vec![0.55, 0.72, 0.6, 0.54, 0.42], intercept: 0.0 };
        let features = [0.44, 0.65, 0.44, 0.89, 0.96]
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                Feature::number(i.to_string(), v)
                    .with_domain(Domain::numeric(-10.0, 10.0).unwrap())
                    .unwrap()
            })
            .collect();
        let explainer = CounterfactualExplainer::new(CounterfactualConfig::default());
        let result = explainer.explain(
            CounterfactualRequest::new(features).with_goal(vec![Output::number("linear", 0.0)]),
            &model,
        )?;

        let check = model.predict(&[result.proposed_features()])?;
        let y = check[0].number_at(0).unwrap_or(f64::NAN);
        assert!(y.abs() < 0.01, "output = {}", y);
        Ok(())
    }

    #[test]
    fn custom_criteria_drives_the_search() -> Result<()> {
        // square of the first output equals the second output
        let criteria = |out: &PredictionOutput| {
            let f1 = out.number_at(0).unwrap_or(f64::NAN);
            let f2 = out.number_at(1).unwrap_or(f64::NAN);
            let d = f1 - f2.sqrt();
            if d.abs() < 1e-3 {
                GoalScore::new(0.0, 0.0)
            } else {
                GoalScore::new(d, 1.0)
            }
        };
        let explainer = CounterfactualExplainer::new(
            CounterfactualConfig::default().with_goal_threshold(1e-3),
        );
        let result = explainer.explain(
            CounterfactualRequest::new(numeric_features(3, 10.0, 0.0, 1000.0)).with_criteria(criteria),
            &SumSkipTwoOutputModel { skip: 3 },
        )?;

        assert!(result.is_valid);
        let f1 = result.final_outputs.number_at(0).unwrap_or(f64::NAN);
        let f2 = result.final_outputs.number_at(1).unwrap_or(f64::NAN);
        assert_abs_diff_eq!(f1, f2.sqrt(), epsilon = 1e-3);
        Ok(())
    }

    #[test]
    fn missing_goal_and_criteria_is_rejected() {
        let explainer = CounterfactualExplainer::default();
        let err = explainer
            .explain(CounterfactualRequest::new(numeric_features(3, 10.0, 0.0, 1000.0)), &SumSkipModel { skip: 0 })
            .err();
        assert_eq!(
            err.map(|e| e.to_string()).as_deref(),
            Some("Either a goal or criteria must be provided.")
        );
    }

    #[test]
    fn unbounded_numeric_feature_is_a_configuration_error() {
        let explainer = CounterfactualExplainer::default();
        let request = CounterfactualRequest::new(vec![Feature::number("a", 1.0)])
            .with_goal(vec![Output::number("sum-but1", 3.0)]);
        let err = explainer.explain(request, &SumSkipModel { skip: 1 });
        assert!(matches!(err, Err(ExplainError::Configuration(_))));
    }

    #[test]
    fn malformed_domain_override_is_a_configuration_error() {
        let request = CounterfactualRequest::new(vec![Feature::number("a", 5.0), Feature::number("b", 5.0)])
            .with_goal(vec![Output::number("sum-but9", 30.0)])
            .with_feature_domains(vec![
                Some(Domain::Numeric { lower: 0.0, upper: f64::INFINITY }),
                Some(Domain::Numeric { lower: 10.0, upper: 0.0 }),
            ]);
        let err = CounterfactualExplainer::default().explain(request, &SumSkipModel { skip: 9 });
        assert!(matches!(err, Err(ExplainError::Configuration(_))));
    }

    #[test]
    fn infeasible_goal_is_reported_not_raised() -> Result<()> {
        let config = CounterfactualConfig::default()
            .with_steps(300)
            .with_max_attempt_count(3);
        let request = CounterfactualRequest::new(numeric_features(3, 1.0, 0.0, 10.0))
            .with_goal(vec![Output::number("sum-but5", 1000.0)]);

        let result = CounterfactualExplainer::new(config).explain(request, &SumSkipModel { skip: 5 })?;

        assert!(!result.is_valid);
        assert_eq!(result.termination, SearchState::Exhausted);
        // the best effort pushes every feature to its upper bound
        assert!(total(&result) > 25.0);
        assert!(result.evaluations > 300);
        Ok(())
    }

    #[test]
    fn timeout_is_reported_not_raised() -> Result<()> {
        let config = CounterfactualConfig::default()
            .with_steps(usize::MAX)
            .with_timeout(Duration::from_millis(20));
        let request = CounterfactualRequest::new(numeric_features(2, 1.0, 0.0, 10.0))
            .with_goal(vec![Output::number("sum-but5", 1000.0)]);

        let result = CounterfactualExplainer::new(config).explain(request, &SumSkipModel { skip: 5 })?;

        assert!(!result.is_valid);
        assert_eq!(result.termination, SearchState::TimedOut);
        Ok(())
    }

    #[test]
    fn categorical_and_boolean_features_are_searched() -> Result<()> {
        let features = vec![
            Feature::categorical("colour", "alpha")
                .with_domain(Domain::set(["alpha", "beta", "gamma"])?)?,
            Feature::boolean("flag", false),
            Feature::number("x", 2.0).with_domain(Domain::numeric(0.0, 10.0)?)?,
        ];
        // 10 when colour is beta and flag is set, else x
        let model = |inputs: &[PredictionInput]| -> Result<Vec<PredictionOutput>> {
            Ok(inputs
                .iter()
                .map(|input| {
                    let colour = input.features[0].value().as_str() == Some("beta");
                    let flag = input.features[1].value().as_bool() == Some(true);
                    let y = if colour && flag { 42.0 } else { input.features[2].value().as_number().unwrap_or(0.0) };
                    PredictionOutput::new(vec![Output::number("y", y)])
                })
                .collect())
        };
        let result = CounterfactualExplainer::default().explain(
            CounterfactualRequest::new(features).with_goal(vec![Output::number("y", 42.0)]),
            &model,
        )?;

        assert!(result.is_valid);
        assert_eq!(result.entities[0].feature.value(), &Value::from("beta"));
        assert_eq!(result.entities[1].feature.value(), &Value::Boolean(true));
        // x is not needed for the goal, polishing reverts it
        assert_eq!(result.entities[2].feature.value(), &Value::Number(2.0));
        Ok(())
    }

    #[test]
    fn goal_shape_mismatch_is_invalid_goal() {
        let request = CounterfactualRequest::new(numeric_features(2, 1.0, 0.0, 10.0))
            .with_goal(vec![Output::number("a", 1.0), Output::number("b", 1.0)]);
        let err = CounterfactualExplainer::default().explain(request, &SumSkipModel { skip: 0 });
        assert!(matches!(err, Err(ExplainError::InvalidGoal(_))));
    }

    #[test]
    fn provider_errors_propagate_unchanged() {
        let failing = |_: &[PredictionInput]| -> Result<Vec<PredictionOutput>> {
            Err(ExplainError::provider("model offline"))
        };
        let request = CounterfactualRequest::new(numeric_features(2, 1.0, 0.0, 10.0))
            .with_goal(vec![Output::number("y", 1.0)]);
        let err = CounterfactualExplainer::default().explain(request, &failing);
        assert!(matches!(err, Err(ExplainError::Provider(ref m)) if m == "model offline"));
    }

    #[test]
    fn domain_overrides_replace_feature_domains() -> Result<()> {
        let features = vec![Feature::number("a", 0.5), Feature::number("b", 0.5)];
        let request = CounterfactualRequest::new(features)
            .with_goal(vec![Output::number("sum-but9", 15.0)])
            .with_feature_domains(vec![Some(Domain::numeric(-10.0, 10.0)?), Some(Domain::numeric(-10.0, 10.0)?)]);
        let result = CounterfactualExplainer::default().explain(request, &SumSkipModel { skip: 9 })?;
        assert!(result.is_valid);
        assert!(result.entities.iter().all(|e| e.feature.domain().is_some()));

        let short = CounterfactualRequest::new(vec![Feature::number("a", 0.5)])
            .with_goal(vec![Output::number("sum-but9", 15.0)])
            .with_feature_domains(Vec::new());
        assert!(CounterfactualExplainer::default().explain(short, &SumSkipModel { skip: 9 }).is_err());
        Ok(())
    }

    #[test]
    fn same_seed_same_counterfactual() -> Result<()> {
        let explainer = CounterfactualExplainer::new(CounterfactualConfig::default().with_seed(11));
        let request = || {
            CounterfactualRequest::new(numeric_features(4, 10.0, 0.0, 1000.0))
                .with_goal(vec![Output::new("inside", true, 0.0)])
        };
        let model = SumThresholdModel { center: 500.0, epsilon: 10.0 };
        let a = explainer.explain(request(), &model)?;
        let b = explainer.explain(request(), &model)?;
        assert_eq!(a.entities, b.entities);
        assert_eq!(a.evaluations, b.evaluations);
        Ok(())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn constrained_entities_never_move(seed in any::<u64>(), fixed in 0usize..4, target in 0.0f64..3000.0) {
            let mut features = numeric_features(4, 10.0, 0.0, 1000.0);
            features[fixed] = features[fixed].clone().constrained();
            let config = CounterfactualConfig::default().with_steps(200).with_seed(seed);
            let request = CounterfactualRequest::new(features)
                .with_goal(vec![Output::number("sum-but9", target)]);

            let result = CounterfactualExplainer::new(config)
                .explain(request, &SumSkipModel { skip: 9 })
                .unwrap();

            prop_assert!(result.entities[fixed].constrained);
            prop_assert_eq!(result.entities[fixed].feature.value(), &Value::Number(10.0));
            prop_assert!(!result.entities[fixed].is_changed());
        }
    }
}
