// src/algorithms/kmeans.rs
//! K-Means over encoded feature rows, k-means++ initialised.

use ndarray::{Array2, ArrayView1};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{Dataset, ExplainError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KMeans {
    pub n_clusters: usize,
    pub max_iter: usize,
    pub tol: f64,
}

impl KMeans {
    pub fn new(n_clusters: usize) -> Self {
        KMeans {
            n_clusters,
            max_iter: 100,
            tol: 1e-4,
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Returns the `n_clusters x n_features` centroid matrix.
    pub fn fit(&self, x: &Dataset, rng: &mut ChaCha8Rng) -> Result<Dataset> {
        let n_samples = x.nrows();
        if self.n_clusters == 0 || n_samples < self.n_clusters {
            return Err(ExplainError::configuration(format!(
                "Cannot build {} clusters from {} points",
                self.n_clusters, n_samples
            )));
        }

        let mut centroids = kmeans_pp_init(x, self.n_clusters, rng);
        let mut labels: Option<Vec<usize>> = None;
        for iter in 0..self.max_iter {
            let new_labels = assign(x, &centroids);
            let changed = labels.as_ref().map_or(n_samples, |old| {
                old.iter().zip(&new_labels).filter(|(a, b)| a != b).count()
            });

            let mut new_centroids = Array2::zeros(centroids.dim());
            let mut counts = vec![0usize; self.n_clusters];
            for (i, &c) in new_labels.iter().enumerate() {
                counts[c] += 1;
                let mut row = new_centroids.row_mut(c);
                row += &x.row(i);
            }
            for c in 0..self.n_clusters {
                if counts[c] > 0 {
                    new_centroids.row_mut(c).mapv_inplace(|v| v / counts[c] as f64);
                } else {
                    // empty cluster, restart it on a random point
                    let idx = rng.gen_range(0..n_samples);
                    new_centroids.row_mut(c).assign(&x.row(idx));
                }
            }

            let shift = (&centroids - &new_centroids).mapv(|v| v * v).sum().sqrt();
            centroids = new_centroids;
            labels = Some(new_labels);
            if changed == 0 || shift < self.tol {
                debug!(iterations = iter + 1, shift, "k-means converged");
                break;
            }
        }
        Ok(centroids)
    }
}

fn euclidean_sq(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

fn assign(x: &Dataset, centroids: &Dataset) -> Vec<usize> {
    (0..x.nrows())
        .into_par_iter()
        .map(|i| {
            let row = x.row(i);
            let mut best_c = 0;
            let mut best_dist = f64::MAX;
            for (c, centroid) in centroids.rows().into_iter().enumerate() {
                let d = euclidean_sq(row, centroid);
                if d < best_dist {
                    best_dist = d;
                    best_c = c;
                }
            }
            best_c
        })
        .collect()
}

/// Picks centroids one by one, each with probability proportional to the
/// squared distance from the nearest one already picked.
fn kmeans_pp_init(x: &Dataset, k: usize, rng: &mut ChaCha8Rng) -> Dataset {
    let n_samples = x.nrows();
    let mut centroids = Array2::zeros((k, x.ncols()));
    let first = rng.gen_range(0..n_samples);
    centroids.row_mut(0).assign(&x.row(first));
    let mut nearest: Vec<f64> = (0..n_samples)
        .map(|i| euclidean_sq(x.row(i), centroids.row(0)))
        .collect();

    for c in 1..k {
        let chosen = match WeightedIndex::new(&nearest) {
            Ok(dist) => dist.sample(rng),
            // every point already sits on a centroid
            Err(_) => rng.gen_range(0..n_samples),
        };
        centroids.row_mut(c).assign(&x.row(chosen));
        for (i, d) in nearest.iter_mut().enumerate() {
            *d = d.min(euclidean_sq(x.row(i), centroids.row(c)));
        }
    }
    centroids
}
