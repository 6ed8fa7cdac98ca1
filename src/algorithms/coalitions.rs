// src/algorithms/coalitions.rs
//! Coalition masks and their Shapley kernel weights.

use std::collections::HashMap;

use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::index;
use rand::Rng;
use tracing::debug;

/// A set of "present" features and its regression weight.
#[derive(Debug, Clone, PartialEq)]
pub struct Coalition {
    pub mask: Vec<bool>,
    pub weight: f64,
}

impl Coalition {
    pub fn size(&self) -> usize {
        self.mask.iter().filter(|&&present| present).count()
    }
}

/// Shapley kernel weight `(M-1) / (C(M,|z|) * |z| * (M-|z|))`.
///
/// Returns a very large number (effective infinity) for `|z| = 0` or `|z| = M`;
/// those coalitions enter the regression as constraints instead.
pub fn kernel_weight(coalition_size: usize, num_features: usize) -> f64 {
    if coalition_size == 0 || coalition_size >= num_features || num_features <= 1 {
        return 1e9;
    }
    let denominator =
        n_choose_k(num_features, coalition_size) * coalition_size as f64 * (num_features - coalition_size) as f64;
    (num_features - 1) as f64 / denominator
}

/// Helper for combinations C(n, k) = n! / (k! * (n-k)!)
pub fn n_choose_k(n: usize, k: usize) -> f64 {
    if k > n {
        return 0.0;
    }
    if k == 0 || k == n {
        return 1.0;
    }
    // Exploit symmetry C(n, k) = C(n, n-k) to keep k small for precision/performance
    let eff_k = if k > n / 2 { n - k } else { k };
    let mut res = 1.0;
    for i in 0..eff_k {
        res *= (n - i) as f64;
        res /= (i + 1) as f64;
    }
    res
}

/// Masks for `m` features within a budget of `n_samples` evaluations, empty and
/// full coalitions excluded.
///
/// Every mask is enumerated when the budget covers all `2^m - 2` of them.
/// Otherwise subset sizes are filled completely, smallest (and their
/// complements) first, while the budget allows; the remaining sizes are
/// sampled in proportion to their kernel mass, complements paired and
/// duplicates merged into one weighted mask.
pub fn plan<R: Rng + ?Sized>(m: usize, n_samples: usize, rng: &mut R) -> Vec<Coalition> {
    if m < 2 {
        return Vec::new();
    }
    let all = if m < usize::BITS as usize - 1 {
        (1usize << m) - 2
    } else {
        usize::MAX
    };
    if n_samples >= all {
        debug!(m, masks = all, "enumerating every coalition");
        return enumerate_all(m);
    }

    // ceil((m - 1) / 2)
    let num_subset_sizes = m / 2;
    let num_paired = (m - 1) / 2;
    let mut weight_vector: Vec<f64> = (1..=num_subset_sizes)
        .map(|s| {
            let w = (m - 1) as f64 / (s * (m - s)) as f64;
            if s <= num_paired {
                2.0 * w
            } else {
                w
            }
        })
        .collect();
    let total: f64 = weight_vector.iter().sum();
    weight_vector.iter_mut().for_each(|w| *w /= total);

    let mut coalitions = Vec::new();
    let mut remaining = n_samples as f64;
    let mut remaining_weights = weight_vector.clone();
    let mut full_sizes = 0;
    for s in 1..=num_subset_sizes {
        let paired = s <= num_paired;
        let nsub = n_choose_k(m, s) * if paired { 2.0 } else { 1.0 };
        if remaining * remaining_weights[s - 1] / nsub < 1.0 - 1e-8 {
            break;
        }
        full_sizes += 1;
        remaining -= nsub;
        if remaining_weights[s - 1] < 1.0 {
            let rest = 1.0 - remaining_weights[s - 1];
            remaining_weights.iter_mut().for_each(|w| *w /= rest);
        }
        let w = weight_vector[s - 1] / nsub;
        for_each_combination(m, s, |chosen| {
            let mut mask = vec![false; m];
            chosen.iter().for_each(|&i| mask[i] = true);
            if paired {
                coalitions.push(Coalition {
                    mask: mask.iter().map(|p| !p).collect(),
                    weight: w,
                });
            }
            coalitions.push(Coalition { mask, weight: w });
        });
    }
    debug!(m, full_sizes, num_subset_sizes, enumerated = coalitions.len(), "coalition plan");

    if full_sizes == num_subset_sizes {
        return coalitions;
    }
    let samples_left = remaining.max(0.0) as usize;
    let left_weights = &weight_vector[full_sizes..];
    let weight_left: f64 = left_weights.iter().sum();
    let Ok(size_dist) = WeightedIndex::new(left_weights) else {
        return coalitions;
    };

    let mut counts: Vec<f64> = Vec::new();
    let mut sampled: Vec<Vec<bool>> = Vec::new();
    let mut seen: HashMap<Vec<bool>, usize> = HashMap::new();
    let mut add = |mask: Vec<bool>, counts: &mut Vec<f64>, sampled: &mut Vec<Vec<bool>>| -> bool {
        match seen.get(&mask) {
            Some(&idx) => {
                counts[idx] += 1.0;
                false
            }
            None => {
                seen.insert(mask.clone(), sampled.len());
                sampled.push(mask);
                counts.push(1.0);
                true
            }
        }
    };

    let mut left = samples_left;
    let mut draws = 0;
    while left > 0 && draws < 4 * samples_left.max(1) {
        draws += 1;
        let s = full_sizes + 1 + size_dist.sample(rng);
        let mut mask = vec![false; m];
        index::sample(rng, m, s).into_iter().for_each(|i| mask[i] = true);
        let complement: Vec<bool> = mask.iter().map(|p| !p).collect();
        if add(mask, &mut counts, &mut sampled) {
            left -= 1;
        }
        if left > 0 && s <= num_paired && add(complement, &mut counts, &mut sampled) {
            left -= 1;
        }
    }

    let count_total: f64 = counts.iter().sum();
    coalitions.extend(sampled.into_iter().zip(counts).map(|(mask, count)| Coalition {
        mask,
        weight: count * weight_left / count_total,
    }));
    coalitions
}

fn enumerate_all(m: usize) -> Vec<Coalition> {
    let mut coalitions = Vec::new();
    for s in 1..m {
        let w = kernel_weight(s, m);
        for_each_combination(m, s, |chosen| {
            let mut mask = vec![false; m];
            chosen.iter().for_each(|&i| mask[i] = true);
            coalitions.push(Coalition { mask, weight: w });
        });
    }
    coalitions
}

/// Calls `f` with every `k`-subset of `0..n`, in lexicographic order.
fn for_each_combination<F: FnMut(&[usize])>(n: usize, k: usize, mut f: F) {
    if k > n {
        return;
    }
    let mut idx: Vec<usize> = (0..k).collect();
    loop {
        f(&idx);
        // rightmost index that can still move
        let Some(i) = (0..k).rev().find(|&i| idx[i] < n - k + i) else {
            return;
        };
        idx[i] += 1;
        for j in (i + 1)..k {
            idx[j] = idx[j - 1] + 1;
        }
    }
}
