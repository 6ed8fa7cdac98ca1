// src/algorithms/background.rs
//! Reference datasets for Kernel SHAP: sampled, clustered or goal-directed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::seq::index;
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::algorithms::counterfactual::{apply_domains, CounterfactualConfig, CounterfactualSearch};
use crate::algorithms::goal::{output_vector_distance, OutputGoal};
use crate::algorithms::kmeans::KMeans;
use crate::core::{Domain, ExplainError, PredictionInput, PredictionOutput, Result};
use crate::traits::{predict_checked, PredictionProvider};
use crate::utils::rng::{stream_id, stream_rng};
use crate::utils::FeatureEncoder;

const SAMPLE_STREAM: u64 = 1;
const KMEANS_STREAM: u64 = 2;

/// Settings for counterfactual-seeded background generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterfactualBackgroundConfig {
    /// Pool points closest to each goal that seed the searches.
    pub k_seeds: usize,
    pub goal_threshold: f64,
    /// Feed each goal's points into the seed pool of the following goals.
    pub chain: bool,
    pub max_attempt_count: usize,
    /// Evaluations per search attempt.
    pub step_count: usize,
    /// Wall-clock limit of each search.
    pub timeout_seconds: u64,
}

impl Default for CounterfactualBackgroundConfig {
    fn default() -> Self {
        CounterfactualBackgroundConfig {
            k_seeds: 5,
            goal_threshold: 0.01,
            chain: false,
            max_attempt_count: 5,
            step_count: 5_000,
            timeout_seconds: 3,
        }
    }
}

impl CounterfactualBackgroundConfig {
    pub fn with_k_seeds(mut self, k_seeds: usize) -> Self {
        self.k_seeds = k_seeds;
        self
    }

    pub fn with_goal_threshold(mut self, threshold: f64) -> Self {
        self.goal_threshold = threshold;
        self
    }

    pub fn with_chain(mut self, chain: bool) -> Self {
        self.chain = chain;
        self
    }

    pub fn with_max_attempt_count(mut self, attempts: usize) -> Self {
        self.max_attempt_count = attempts;
        self
    }

    pub fn with_step_count(mut self, steps: usize) -> Self {
        self.step_count = steps;
        self
    }

    pub fn with_timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    fn search_config(&self, seed: u64) -> CounterfactualConfig {
        CounterfactualConfig::default()
            .with_steps(self.step_count)
            .with_seed(seed)
            .with_goal_threshold(self.goal_threshold)
            .with_max_attempt_count(self.max_attempt_count)
            .with_timeout(Duration::from_secs(self.timeout_seconds))
    }
}

/// Builds background datasets out of a pool of datapoints.
#[derive(Debug, Clone)]
pub struct BackgroundGenerator {
    datapoints: Vec<PredictionInput>,
    seed: u64,
    feature_domains: Option<Vec<Option<Domain>>>,
}

/// A pool point together with the model's prediction for it.
type Scored = (PredictionInput, PredictionOutput);

impl BackgroundGenerator {
    pub fn new(datapoints: Vec<PredictionInput>) -> Self {
        BackgroundGenerator {
            datapoints,
            seed: 0,
            feature_domains: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Per-feature search domains, required by the counterfactual generator.
    pub fn with_feature_domains(mut self, domains: Vec<Option<Domain>>) -> Self {
        self.feature_domains = Some(domains);
        self
    }

    pub fn datapoints(&self) -> &[PredictionInput] {
        &self.datapoints
    }

    /// `k` points drawn from the pool: distinct when `k <= n`, otherwise every
    /// point once followed by draws with replacement.
    pub fn sample(&self, k: usize) -> Result<Vec<PredictionInput>> {
        let n = self.datapoints.len();
        if n == 0 {
            return Err(ExplainError::configuration("Cannot sample from an empty pool"));
        }
        let mut rng = stream_rng(self.seed, SAMPLE_STREAM);
        if k <= n {
            return Ok(index::sample(&mut rng, n, k)
                .into_iter()
                .map(|i| self.datapoints[i].clone())
                .collect());
        }
        let mut points = self.datapoints.clone();
        points.extend((n..k).map(|_| self.datapoints[rng.gen_range(0..n)].clone()));
        Ok(points)
    }

    /// Centroids of `k` k-means clusters, decoded back to valid feature values.
    pub fn kmeans(&self, k: usize) -> Result<Vec<PredictionInput>> {
        let n = self.datapoints.len();
        if k == 0 || k > n {
            return Err(ExplainError::configuration(format!(
                "k-means needs 0 < k <= {} (pool size), got {}",
                n, k
            )));
        }
        let encoder = FeatureEncoder::fit(&self.datapoints)?;
        let x = encoder.encode_all(&self.datapoints)?;
        let mut rng = stream_rng(self.seed, KMEANS_STREAM);
        let centroids = KMeans::new(k).fit(&x, &mut rng)?;
        Ok(centroids.rows().into_iter().map(|row| encoder.decode(row)).collect())
    }

    /// Points whose predictions meet `goals`, found by counterfactual search
    /// from the pool points closest to each goal.
    pub fn counterfactual<P: PredictionProvider + ?Sized>(
        &self,
        goals: &[PredictionOutput],
        provider: &P,
        k_per_goal: usize,
        config: &CounterfactualBackgroundConfig,
    ) -> Result<Vec<PredictionInput>> {
        match goals {
            [goal] => self.generate(goal, provider, k_per_goal, config),
            _ => self.generate_range(goals, provider, k_per_goal, config),
        }
    }

    /// `k_per_goal` points for a single goal.
    pub fn generate<P: PredictionProvider + ?Sized>(
        &self,
        goal: &PredictionOutput,
        provider: &P,
        k_per_goal: usize,
        config: &CounterfactualBackgroundConfig,
    ) -> Result<Vec<PredictionInput>> {
        let domains = self.required_domains()?;
        let pool = self.scored_pool(provider)?;
        let found = self.generate_from(&pool, goal, 0, provider, k_per_goal, config, domains)?;
        Ok(found.into_iter().map(|(input, _)| input).collect())
    }

    /// `k_per_goal` points for each goal.
    ///
    /// Independent goals run in parallel and come back in goal order. Chained
    /// goals run one after the other, nearest to the mean pool output first
    /// (ties keep input order), each seeing the points found before it.
    pub fn generate_range<P: PredictionProvider + ?Sized>(
        &self,
        goals: &[PredictionOutput],
        provider: &P,
        k_per_goal: usize,
        config: &CounterfactualBackgroundConfig,
    ) -> Result<Vec<PredictionInput>> {
        if goals.is_empty() {
            return Err(ExplainError::InvalidGoal(
                "At least one goal is needed to generate a counterfactual background".to_string(),
            ));
        }
        let domains = self.required_domains()?;
        let mut pool = self.scored_pool(provider)?;
        info!(goals = goals.len(), k_per_goal, chain = config.chain, "generating counterfactual background");

        if !config.chain {
            let per_goal: Vec<Vec<Scored>> = goals
                .par_iter()
                .enumerate()
                .map(|(g, goal)| self.generate_from(&pool, goal, g, provider, k_per_goal, config, domains))
                .collect::<Result<_>>()?;
            return Ok(per_goal.into_iter().flatten().map(|(input, _)| input).collect());
        }

        let pool_outputs: Vec<PredictionOutput> = pool.iter().map(|(_, out)| out.clone()).collect();
        let mut order: Vec<usize> = (0..goals.len()).collect();
        let distances: Vec<f64> = goals
            .iter()
            .map(|goal| distance_from_mean(goal, &pool_outputs))
            .collect();
        order.sort_by(|&a, &b| distances[a].total_cmp(&distances[b]));
        debug!(?order, "chained goal order");

        let mut generated = Vec::with_capacity(goals.len() * k_per_goal);
        for g in order {
            let found = self.generate_from(&pool, &goals[g], g, provider, k_per_goal, config, domains)?;
            pool.extend(found.iter().cloned());
            generated.extend(found.into_iter().map(|(input, _)| input));
        }
        Ok(generated)
    }

    fn required_domains(&self) -> Result<&[Option<Domain>]> {
        self.feature_domains.as_deref().ok_or_else(|| {
            ExplainError::configuration(
                "Feature domains must be passed to perform meaningful counterfactual search",
            )
        })
    }

    fn scored_pool<P: PredictionProvider + ?Sized>(&self, provider: &P) -> Result<Vec<Scored>> {
        if self.datapoints.is_empty() {
            return Err(ExplainError::configuration("Cannot seed searches from an empty pool"));
        }
        let outputs = predict_checked(provider, &self.datapoints)?;
        Ok(self.datapoints.iter().cloned().zip(outputs).collect())
    }

    #[allow(clippy::too_many_arguments)]
    fn generate_from<P: PredictionProvider + ?Sized>(
        &self,
        pool: &[Scored],
        goal: &PredictionOutput,
        goal_index: usize,
        provider: &P,
        k_per_goal: usize,
        config: &CounterfactualBackgroundConfig,
        domains: &[Option<Domain>],
    ) -> Result<Vec<Scored>> {
        let output_goal = OutputGoal::new(goal.outputs.clone(), config.goal_threshold)?;
        if let Some((_, sample)) = pool.first() {
            output_goal.validate(sample)?;
        }
        if k_per_goal == 0 || pool.is_empty() {
            return Ok(Vec::new());
        }

        let mut nearest: Vec<usize> = (0..pool.len()).collect();
        let distances: Vec<f64> = pool
            .iter()
            .map(|(_, out)| output_vector_distance(out, goal))
            .collect();
        nearest.sort_by(|&a, &b| distances[a].total_cmp(&distances[b]));
        let seeds = config.k_seeds.clamp(1, pool.len()).min(k_per_goal);
        nearest.truncate(seeds);

        // remainder goes to the nearest seeds
        let tasks: Vec<(usize, usize)> = nearest
            .iter()
            .enumerate()
            .flat_map(|(rank, &idx)| {
                let count = k_per_goal / seeds + usize::from(rank < k_per_goal % seeds);
                (0..count).map(move |repeat| (idx, repeat))
            })
            .collect();
        debug!(goal_index, seeds, searches = tasks.len(), "seeded counterfactual searches");

        let search_config = config.search_config(self.seed);
        let criteria = Arc::new(output_goal.clone());
        tasks
            .par_iter()
            .map(|&(idx, repeat)| -> Result<Scored> {
                let features = apply_domains(pool[idx].0.features.clone(), domains.to_vec())?;
                let search = CounterfactualSearch::new(
                    features,
                    criteria.clone(),
                    Some(output_goal.clone()),
                    search_config.clone(),
                )?;
                let deadline = Instant::now() + Duration::from_secs(config.timeout_seconds);
                let stream = stream_id(&[goal_index as u64, idx as u64, repeat as u64]);
                let result = search.run(provider, stream, Some(deadline), repeat > 0)?;
                if !result.is_valid {
                    warn!(
                        goal_index,
                        seed = idx,
                        distance = result.goal_distance,
                        state = ?result.termination,
                        "keeping a background point that misses its goal"
                    );
                }
                Ok((result.proposed_features(), result.final_outputs))
            })
            .collect()
    }
}

/// Distance of `goal` from the mean of the pool outputs; categorical outputs
/// count the share of the pool with a different label.
fn distance_from_mean(goal: &PredictionOutput, pool_outputs: &[PredictionOutput]) -> f64 {
    let n = pool_outputs.len().max(1) as f64;
    goal.outputs
        .iter()
        .enumerate()
        .map(|(o, target)| match target.value.as_number() {
            Some(g) => {
                let mean = pool_outputs
                    .iter()
                    .filter_map(|out| out.outputs.get(o).and_then(|x| x.value.as_number()))
                    .sum::<f64>()
                    / n;
                (g - mean).powi(2)
            }
            None => {
                let differing = pool_outputs
                    .iter()
                    .filter(|out| out.outputs.get(o).map(|x| &x.value) != Some(&target.value))
                    .count();
                (differing as f64 / n).powi(2)
            }
        })
        .sum::<f64>()
        .sqrt()
}
