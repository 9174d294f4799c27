//! Genetic-algorithm hyperparameter search
//!
//! Population search over a [`HyperGrid`]: uniform initialization, rank
//! selection, blend crossover, Gaussian mutation scaled to each parameter's
//! range. The best candidate observed across the whole run wins, not just
//! the final generation. All randomness flows from one seeded `StdRng` on
//! the coordinating thread, so runs are reproducible even when candidate
//! evaluation fans out on the rayon pool.

use super::{CalibrationOutcome, HyperGrid, ParamSet, ParamValue};
use crate::config::CalibrationConfig;
use crate::error::{EnsembleError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;
use std::cmp::Ordering;
use std::time::Instant;
use tracing::warn;

pub(super) fn search<F>(
    grid: &HyperGrid,
    config: &CalibrationConfig,
    seed: u64,
    evaluate: F,
) -> Result<CalibrationOutcome>
where
    F: Fn(&ParamSet) -> Result<f64> + Sync,
{
    let mut rng = StdRng::seed_from_u64(seed);
    let pop_size = config.init_pop_size;
    let mut population: Vec<Vec<ParamValue>> =
        (0..pop_size).map(|_| grid.sample_genes(&mut rng)).collect();

    let deadline = config.time_budget.map(|budget| Instant::now() + budget);
    let mut best: Option<(Vec<ParamValue>, f64)> = None;
    let mut stagnant = 0usize;

    for generation in 0..config.n_iter {
        let scores = evaluate_population(grid, config, &population, &evaluate)?;

        // Rank descending; stable sort keeps earlier candidates on ties.
        let mut order: Vec<usize> = (0..population.len()).collect();
        order.sort_by(|&a, &b| {
            scores[b]
                .partial_cmp(&scores[a])
                .unwrap_or(Ordering::Equal)
        });

        let leader = order[0];
        if best
            .as_ref()
            .map_or(true, |(_, score)| scores[leader] > *score)
        {
            best = Some((population[leader].clone(), scores[leader]));
            stagnant = 0;
        } else {
            stagnant += 1;
        }

        if let Some(limit) = config.stagnation_limit {
            if stagnant >= limit {
                break;
            }
        }
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                warn!(
                    generation,
                    "calibration budget expired; keeping best candidate so far"
                );
                break;
            }
        }
        if generation + 1 == config.n_iter {
            break;
        }

        // Retain the top fraction as parents, then replenish with offspring.
        let retain = ((pop_size as f64 * config.select_rate).ceil() as usize).clamp(1, pop_size);
        let parents: Vec<Vec<ParamValue>> = order[..retain]
            .iter()
            .map(|&i| population[i].clone())
            .collect();

        let mut next = parents.clone();
        while next.len() < pop_size {
            let a = &parents[rng.gen_range(0..parents.len())];
            let b = &parents[rng.gen_range(0..parents.len())];
            let mut child = crossover(grid, a, b, config.mixing_ratio, &mut rng);
            mutate(grid, &mut child, config, &mut rng);
            next.push(child);
        }
        population = next;
    }

    let (genes, score) = best.ok_or_else(|| {
        EnsembleError::InvalidConfiguration("Genetic search evaluated no candidates".to_string())
    })?;
    Ok(CalibrationOutcome {
        params: grid.genes_to_params(&genes),
        score: Some(score),
    })
}

fn evaluate_population<F>(
    grid: &HyperGrid,
    config: &CalibrationConfig,
    population: &[Vec<ParamValue>],
    evaluate: &F,
) -> Result<Vec<f64>>
where
    F: Fn(&ParamSet) -> Result<f64> + Sync,
{
    let param_sets: Vec<ParamSet> = population
        .iter()
        .map(|genes| grid.genes_to_params(genes))
        .collect();

    if config.parallel {
        param_sets
            .par_iter()
            .map(|params| evaluate(params))
            .collect::<Result<Vec<_>>>()
    } else {
        param_sets.iter().map(|params| evaluate(params)).collect()
    }
}

/// Blend two parents gene by gene. Numeric genes mix with the configured
/// weight; non-numeric genes are inherited whole from either parent.
fn crossover(
    grid: &HyperGrid,
    a: &[ParamValue],
    b: &[ParamValue],
    mixing_ratio: f64,
    rng: &mut StdRng,
) -> Vec<ParamValue> {
    grid.dims()
        .iter()
        .enumerate()
        .map(|(i, (_, dim))| match (a[i].as_float(), b[i].as_float()) {
            (Some(va), Some(vb)) if dim.numeric_range().is_some() => {
                dim.snap(mixing_ratio * va + (1.0 - mixing_ratio) * vb)
            }
            _ => {
                if rng.gen::<f64>() < mixing_ratio {
                    a[i].clone()
                } else {
                    b[i].clone()
                }
            }
        })
        .collect()
}

/// Perturb each gene independently with the configured probability. Numeric
/// genes move by a Gaussian step scaled to the parameter's range;
/// non-numeric genes are resampled uniformly.
fn mutate(grid: &HyperGrid, genes: &mut [ParamValue], config: &CalibrationConfig, rng: &mut StdRng) {
    for (i, (_, dim)) in grid.dims().iter().enumerate() {
        if rng.gen::<f64>() >= config.mutation_proba {
            continue;
        }
        let perturbed = match (genes[i].as_float(), dim.numeric_range()) {
            (Some(current), Some((min, max))) if max > min => {
                let sigma = config.variance_ratio * (max - min);
                match Normal::new(0.0, sigma) {
                    Ok(normal) => Some(dim.snap(current + normal.sample(rng))),
                    Err(_) => None,
                }
            }
            _ => None,
        };
        genes[i] = perturbed.unwrap_or_else(|| dim.sample_value(rng));
    }
}
