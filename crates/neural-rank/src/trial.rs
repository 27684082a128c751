//! Trial driver: deterministic comparison, Monte Carlo campaign and the
//! self-consistency run.
//!
//! Every pass ranks a matrix three ways (PageRank, the real fixed point and
//! the complex fixed point) and measures how far each nonlinear family's
//! middle layer and fixed point are from the PageRank order.
//!
//! # Reproducibility
//!
//! The campaign draws all perturbations sequentially from a single
//! `StdRng` seeded with [`ExperimentConfig::seed`]. Perturbation is
//! cumulative, so trial `k` sees the matrix after `k + 1` perturbations.
//! Evaluation of the perturbed matrices may run on the rayon pool, but
//! results are reduced in trial order, so the means are identical either way.

use std::time::Instant;

use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::autodiff::Scalar;
use crate::complex::{polar_scores, ComplexRankSolver};
use crate::config::{ExperimentConfig, Mode};
use crate::error::{Result, ValidationError};
use crate::matrix::AdjacencyMatrix;
use crate::pagerank::PageRankSolver;
use crate::rank::{compare, RankPermutation};
use crate::real::RealRankSolver;
use crate::traits::{LinearRankSolver, NonlinearRankSolver};
use crate::truth::{SelfConsistencyOutcome, SelfConsistencySolver};
use crate::types::{DistancePair, FixedPointSolution, MeanDistances, PolarScore};

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Rankings of one nonlinear family next to the PageRank baseline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankComparison {
    /// PageRank order.
    pub baseline: RankPermutation,
    /// Order of the first intermediate layer.
    pub middle: RankPermutation,
    /// Order of the fixed point.
    pub fixed_point: RankPermutation,
    /// Edit distances of `middle` and `fixed_point` from `baseline`.
    pub distances: DistancePair,
    /// Iterations the search ran.
    pub iterations: usize,
    /// Whether the search reached tolerance.
    pub converged: bool,
    /// Loss magnitude at the last iteration.
    pub final_loss: f64,
}

impl RankComparison {
    /// Rank a solution and measure it against `baseline`.
    pub fn new<S: Scalar>(baseline: &RankPermutation, solution: &FixedPointSolution<S>) -> Self {
        let middle = RankPermutation::from_scores(solution.middle_layer());
        let fixed_point = RankPermutation::from_scores(&solution.scores);
        let distances = DistancePair {
            middle: compare(baseline, &middle),
            fixed_point: compare(baseline, &fixed_point),
        };
        Self {
            baseline: baseline.clone(),
            middle,
            fixed_point,
            distances,
            iterations: solution.iterations,
            converged: solution.converged,
            final_loss: solution.final_loss,
        }
    }
}

/// Result of the single pass over the unperturbed matrix.
#[derive(Debug, Clone, Serialize)]
pub struct DeterministicReport {
    /// The matrix that was ranked.
    pub matrix: AdjacencyMatrix,
    /// PageRank score per node.
    pub baseline_scores: Vec<f64>,
    /// Real family.
    pub real: RankComparison,
    /// Complex family.
    pub complex: RankComparison,
    /// Complex fixed point in polar form.
    pub complex_scores: Vec<PolarScore>,
}

/// Distances measured in one Monte Carlo trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrialOutcome {
    /// Real family distances.
    pub real: DistancePair,
    /// Complex family distances.
    pub complex: DistancePair,
}

/// Running distance sums over contributing trials.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrialAccumulator {
    /// Sum of middle-layer distances.
    pub middle_sum: usize,
    /// Sum of fixed-point distances.
    pub fixed_point_sum: usize,
    /// Number of trials added.
    pub trials: usize,
}

impl TrialAccumulator {
    /// Add one trial.
    pub fn add(&mut self, pair: DistancePair) {
        self.middle_sum += pair.middle;
        self.fixed_point_sum += pair.fixed_point;
        self.trials += 1;
    }

    /// Fold another accumulator into this one.
    pub fn merge(&mut self, other: &Self) {
        self.middle_sum += other.middle_sum;
        self.fixed_point_sum += other.fixed_point_sum;
        self.trials += other.trials;
    }

    /// Mean distances, or `None` if no trial contributed.
    pub fn mean(&self) -> Option<MeanDistances> {
        if self.trials == 0 {
            return None;
        }
        let n = self.trials as f64;
        Some(MeanDistances {
            middle: self.middle_sum as f64 / n,
            fixed_point: self.fixed_point_sum as f64 / n,
        })
    }
}

/// A trial whose evaluation failed. Its distances were not accumulated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrialFailure {
    /// 0-based trial index.
    pub trial: usize,
    /// Rendered error.
    pub error: String,
}

/// Aggregate of a Monte Carlo campaign.
#[derive(Debug, Clone, Serialize)]
pub struct MonteCarloReport {
    /// Campaign seed.
    pub seed: u64,
    /// Trials attempted.
    pub trials: usize,
    /// Real family sums.
    pub real: TrialAccumulator,
    /// Complex family sums.
    pub complex: TrialAccumulator,
    /// Real family means over contributing trials.
    pub real_mean: Option<MeanDistances>,
    /// Complex family means over contributing trials.
    pub complex_mean: Option<MeanDistances>,
    /// Trials that did not contribute.
    pub failures: Vec<TrialFailure>,
    /// Whether trials were evaluated on the rayon pool.
    pub parallel: bool,
    /// Wall-clock time in milliseconds.
    pub elapsed_ms: u64,
}

/// Self-consistency training followed by a ranking of the trained matrix.
#[derive(Debug, Clone, Serialize)]
pub struct TruthReport {
    /// Training outcome.
    pub training: SelfConsistencyOutcome,
    /// Real family comparison on the trained matrix, if it could be ranked.
    pub comparison: Option<RankComparison>,
    /// Why the trained matrix could not be ranked.
    pub comparison_error: Option<String>,
}

/// Report of whichever experiment ran.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ExperimentReport {
    /// Deterministic pass plus Monte Carlo campaign.
    Experiment {
        /// Unperturbed comparison.
        deterministic: DeterministicReport,
        /// Campaign aggregate.
        monte_carlo: MonteCarloReport,
    },
    /// Self-consistency run.
    Truth(TruthReport),
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Reduce per-trial outcomes in trial order. A failed trial adds nothing to
/// either accumulator and is recorded under its index.
fn tally(
    outcomes: Vec<Result<TrialOutcome>>,
) -> (TrialAccumulator, TrialAccumulator, Vec<TrialFailure>) {
    let mut real = TrialAccumulator::default();
    let mut complex = TrialAccumulator::default();
    let mut failures = Vec::new();
    for (trial, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            Ok(o) => {
                real.add(o.real);
                complex.add(o.complex);
            }
            Err(e) => {
                warn!(trial, error = %e, "trial failed; excluded from means");
                failures.push(TrialFailure {
                    trial,
                    error: e.to_string(),
                });
            }
        }
    }
    (real, complex, failures)
}

/// Intermediate product of ranking one matrix.
struct Evaluation {
    baseline_scores: Vec<f64>,
    baseline: RankPermutation,
    real: FixedPointSolution<f32>,
    complex: FixedPointSolution<Complex64>,
}

/// Runs experiments described by an [`ExperimentConfig`].
#[derive(Debug, Clone)]
pub struct TrialDriver {
    config: ExperimentConfig,
    matrix: AdjacencyMatrix,
    real: RealRankSolver,
    complex: ComplexRankSolver,
    pagerank: PageRankSolver,
    trainer: SelfConsistencySolver,
}

impl TrialDriver {
    /// Driver over the baseline graph.
    ///
    /// # Errors
    ///
    /// [`SolverError::InvalidInput`](crate::error::SolverError::InvalidInput)
    /// if the configuration is invalid or `config.size` is not the baseline
    /// size.
    pub fn new(config: ExperimentConfig) -> Result<Self> {
        Self::with_matrix(config, AdjacencyMatrix::baseline())
    }

    /// Driver over an arbitrary starting matrix of size `config.size`.
    pub fn with_matrix(config: ExperimentConfig, matrix: AdjacencyMatrix) -> Result<Self> {
        config.validate()?;
        let driver = Self {
            real: RealRankSolver::new(config.solver),
            complex: ComplexRankSolver::new(config.solver),
            pagerank: PageRankSolver::from_params(&config.pagerank),
            trainer: SelfConsistencySolver::new(config.self_consistency),
            matrix,
            config,
        };
        driver.check_size(&driver.matrix)?;
        Ok(driver)
    }

    /// The configuration in use.
    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// The starting matrix.
    pub fn matrix(&self) -> &AdjacencyMatrix {
        &self.matrix
    }

    /// Run the experiment selected by `config.mode`.
    pub fn run(&self) -> Result<ExperimentReport> {
        match self.config.mode {
            Mode::Experiment => Ok(ExperimentReport::Experiment {
                deterministic: self.run_deterministic()?,
                monte_carlo: self.run_monte_carlo()?,
            }),
            Mode::Truth => Ok(ExperimentReport::Truth(self.run_truth()?)),
        }
    }

    /// PageRank order of `matrix`.
    pub fn baseline_permutation(&self, matrix: &AdjacencyMatrix) -> Result<RankPermutation> {
        self.check_size(matrix)?;
        let scores = self.pagerank.rank(matrix)?;
        Ok(RankPermutation::from_scores(&scores))
    }

    /// Every matrix the driver ranks has the configured node count.
    fn check_size(&self, matrix: &AdjacencyMatrix) -> Result<()> {
        if matrix.size() != self.config.size {
            return Err(ValidationError::DimensionMismatch(format!(
                "matrix has {} nodes but the configuration expects {}",
                matrix.size(),
                self.config.size
            ))
            .into());
        }
        Ok(())
    }

    fn evaluate(&self, matrix: &AdjacencyMatrix) -> Result<Evaluation> {
        self.check_size(matrix)?;
        let baseline_scores = self.pagerank.rank(matrix)?;
        let baseline = RankPermutation::from_scores(&baseline_scores);
        Ok(Evaluation {
            baseline_scores,
            baseline,
            real: self.real.solve(matrix)?,
            complex: self.complex.solve(matrix)?,
        })
    }

    /// Compare both nonlinear families against PageRank on `matrix`.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` if `matrix` does not have `config.size` nodes.
    pub fn compare(&self, matrix: &AdjacencyMatrix) -> Result<(RankComparison, RankComparison)> {
        let e = self.evaluate(matrix)?;
        Ok((
            RankComparison::new(&e.baseline, &e.real),
            RankComparison::new(&e.baseline, &e.complex),
        ))
    }

    /// Rank the unperturbed starting matrix.
    #[instrument(skip(self), fields(n = self.matrix.size()))]
    pub fn run_deterministic(&self) -> Result<DeterministicReport> {
        let e = self.evaluate(&self.matrix)?;
        let real = RankComparison::new(&e.baseline, &e.real);
        let complex = RankComparison::new(&e.baseline, &e.complex);
        info!(
            baseline = %e.baseline,
            real = ?real.distances,
            complex = ?complex.distances,
            "deterministic comparison"
        );
        Ok(DeterministicReport {
            matrix: self.matrix.clone(),
            baseline_scores: e.baseline_scores,
            complex_scores: polar_scores(&e.complex.scores),
            real,
            complex,
        })
    }

    /// Distances of one (already perturbed) matrix.
    pub fn run_trial(&self, matrix: &AdjacencyMatrix) -> Result<TrialOutcome> {
        let (real, complex) = self.compare(matrix)?;
        Ok(TrialOutcome {
            real: real.distances,
            complex: complex.distances,
        })
    }

    /// Run the Monte Carlo campaign.
    #[instrument(skip(self), fields(trials = self.config.trials, seed = self.config.seed))]
    pub fn run_monte_carlo(&self) -> Result<MonteCarloReport> {
        let start = Instant::now();
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut matrix = self.matrix.clone();
        let matrices: Vec<AdjacencyMatrix> = (0..self.config.trials)
            .map(|_| {
                matrix.perturb(&mut rng);
                matrix.clone()
            })
            .collect();

        let (outcomes, parallel) = self.evaluate_trials(&matrices);
        let (real, complex, failures) = tally(outcomes);

        let report = MonteCarloReport {
            seed: self.config.seed,
            trials: self.config.trials,
            real_mean: real.mean(),
            complex_mean: complex.mean(),
            real,
            complex,
            failures,
            parallel,
            elapsed_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            contributing = real.trials,
            failed = report.failures.len(),
            real = ?report.real_mean,
            complex = ?report.complex_mean,
            elapsed_ms = report.elapsed_ms,
            "monte carlo campaign finished"
        );
        Ok(report)
    }

    /// Evaluate trials in order; returns the outcomes and whether the rayon
    /// pool was used.
    fn evaluate_trials(&self, matrices: &[AdjacencyMatrix]) -> (Vec<Result<TrialOutcome>>, bool) {
        #[cfg(feature = "parallel")]
        {
            if self.config.parallel {
                return (self.evaluate_trials_parallel(matrices), true);
            }
        }
        #[cfg(not(feature = "parallel"))]
        {
            if self.config.parallel {
                warn!("built without the `parallel` feature, evaluating trials sequentially");
            }
        }
        (matrices.iter().map(|m| self.run_trial(m)).collect(), false)
    }

    #[cfg(feature = "parallel")]
    fn evaluate_trials_parallel(&self, matrices: &[AdjacencyMatrix]) -> Vec<Result<TrialOutcome>> {
        use rayon::prelude::*;

        matrices.par_iter().map(|m| self.run_trial(m)).collect()
    }

    /// Train the starting matrix toward self-consistency, then rank the
    /// trained matrix with the real family.
    ///
    /// A trained matrix that is not a valid adjacency matrix (e.g. negative
    /// weights) is reported in [`TruthReport::comparison_error`] rather than
    /// failing the run.
    #[instrument(skip(self), fields(n = self.matrix.size()))]
    pub fn run_truth(&self) -> Result<TruthReport> {
        let training = self.trainer.train(&self.matrix)?;
        let ranked: Result<RankComparison> = training
            .trained_matrix()
            .map_err(Into::into)
            .and_then(|m| {
                let baseline = self.baseline_permutation(&m)?;
                Ok(RankComparison::new(&baseline, &self.real.solve(&m)?))
            });

        let (comparison, comparison_error) = match ranked {
            Ok(c) => {
                info!(distances = ?c.distances, "trained matrix ranked");
                (Some(c), None)
            }
            Err(e) => {
                warn!(error = %e, "trained matrix could not be ranked");
                (None, Some(e.to_string()))
            }
        };
        Ok(TruthReport {
            training,
            comparison,
            comparison_error,
        })
    }
}
