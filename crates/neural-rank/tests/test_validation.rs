//! Integration tests for input validation.
//!
//! Tests cover rejection of negative and non-finite weights, dimension
//! mismatches, out-of-range parameters and malformed configuration files.

use neural_rank::config::{ExperimentConfig, FixedPointParams, PageRankParams};
use neural_rank::error::{SolverError, ValidationError};
use neural_rank::matrix::AdjacencyMatrix;
use neural_rank::pagerank::PageRankSolver;
use neural_rank::real::RealRankSolver;
use neural_rank::traits::{LinearRankSolver, NonlinearRankSolver};
use neural_rank::validation::{validate_config, MAX_SIZE};

// ---------------------------------------------------------------------------
// Matrices
// ---------------------------------------------------------------------------

#[test]
fn negative_weight_rejected_at_construction() {
    let rows = vec![vec![0.0, 1.0], vec![-0.5, 0.0]];
    let err = AdjacencyMatrix::from_rows(&rows).unwrap_err();
    assert_eq!(
        err,
        ValidationError::NegativeWeight {
            row: 1,
            col: 0,
            value: -0.5
        }
    );
}

#[test]
fn infinite_weight_rejected() {
    let err = AdjacencyMatrix::from_flat(2, vec![0.0, f32::INFINITY, 0.0, 0.0]).unwrap_err();
    assert!(matches!(err, ValidationError::NonFiniteValue(_)));
}

#[test]
fn wrong_length_rejected() {
    let err = AdjacencyMatrix::from_flat(3, vec![0.0; 10]).unwrap_err();
    assert!(matches!(err, ValidationError::DimensionMismatch(_)));
}

#[test]
fn oversized_matrix_rejected() {
    let n = MAX_SIZE + 1;
    let err = AdjacencyMatrix::from_flat(n, vec![0.0; n * n]).unwrap_err();
    assert!(matches!(err, ValidationError::ParameterOutOfRange { .. }));
}

// ---------------------------------------------------------------------------
// Solver parameters
// ---------------------------------------------------------------------------

#[test]
fn zero_iteration_budget_rejected() {
    let solver = RealRankSolver::new(FixedPointParams {
        iterations: 0,
        ..FixedPointParams::default()
    });
    let err = solver.solve(&AdjacencyMatrix::baseline()).unwrap_err();
    assert!(matches!(
        err,
        SolverError::InvalidInput(ValidationError::ParameterOutOfRange { ref name, .. })
            if name == "solver.iterations"
    ));
}

#[test]
fn nan_learning_rate_rejected() {
    let solver = RealRankSolver::new(FixedPointParams {
        learning_rate: f64::NAN,
        ..FixedPointParams::default()
    });
    assert!(solver.solve(&AdjacencyMatrix::baseline()).is_err());
}

#[test]
fn pagerank_parameters_checked() {
    let bad = [
        PageRankParams {
            damping: 0.0,
            ..PageRankParams::default()
        },
        PageRankParams {
            tolerance: -1.0,
            ..PageRankParams::default()
        },
        PageRankParams {
            max_iterations: 0,
            ..PageRankParams::default()
        },
    ];
    for params in bad {
        let err = PageRankSolver::from_params(&params)
            .rank(&AdjacencyMatrix::baseline())
            .unwrap_err();
        assert!(matches!(err, SolverError::InvalidInput(_)), "{params:?}");
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[test]
fn config_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("experiment.json");
    let config = ExperimentConfig {
        seed: 9,
        trials: 32,
        parallel: true,
        ..ExperimentConfig::default()
    };
    std::fs::write(&path, config.to_json_pretty().unwrap()).unwrap();
    assert_eq!(ExperimentConfig::from_json_file(&path).unwrap(), config);
}

#[test]
fn missing_config_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = ExperimentConfig::from_json_file(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, SolverError::Config(_)));
}

#[test]
fn unknown_mode_is_config_error() {
    let err = ExperimentConfig::from_json_str(r#"{"mode": "sideways"}"#).unwrap_err();
    assert!(matches!(err, SolverError::Config(_)));
}

#[test]
fn self_consistency_params_validated() {
    let config = ExperimentConfig {
        self_consistency: FixedPointParams {
            momentum: -0.1,
            ..FixedPointParams::self_consistency()
        },
        ..ExperimentConfig::default()
    };
    assert!(matches!(
        validate_config(&config),
        Err(ValidationError::ParameterOutOfRange { ref name, .. }) if name == "self_consistency.momentum"
    ));
}
