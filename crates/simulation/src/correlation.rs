//! Correlated multi-strategy return generation.
//!
//! Per-step means and volatilities are derived from annualized figures, the
//! covariance matrix is built from the volatilities and a correlation matrix,
//! and its lower-triangular Cholesky factor turns independent standard
//! normal shocks into correlated step returns.

use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};
use vault_sim_domain::error::{Result, SimulationError};
use vault_sim_domain::strategy::StrategySpec;

/// Relative tolerance for treating a Cholesky pivot as zero.
const PIVOT_TOLERANCE: f64 = 1e-10;

/// Absolute tolerance for symmetry and unit diagonal checks.
const MATRIX_TOLERANCE: f64 = 1e-9;

/// A symmetric correlation matrix with a unit diagonal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<f64>>", into = "Vec<Vec<f64>>")]
pub struct CorrelationMatrix {
    values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    /// Builds a correlation matrix from rows.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` when the matrix is empty, not square,
    /// not symmetric, has a non-unit diagonal or entries outside `[-1, 1]`.
    /// Positive semi-definiteness is only checked when the matrix is
    /// factorized.
    pub fn new(values: Vec<Vec<f64>>) -> Result<Self> {
        let n = values.len();
        if n == 0 {
            return Err(SimulationError::invalid_config("correlation matrix is empty"));
        }
        if let Some((i, row)) = values.iter().enumerate().find(|(_, row)| row.len() != n) {
            return Err(SimulationError::invalid_config(format!(
                "correlation matrix row {i} has {} entries, expected {n}",
                row.len()
            )));
        }
        for (i, row) in values.iter().enumerate() {
            for (j, value) in row.iter().enumerate() {
                if !value.is_finite() || value.abs() > 1.0 + MATRIX_TOLERANCE {
                    return Err(SimulationError::invalid_config(format!(
                        "correlation [{i}][{j}] = {value} is outside [-1, 1]"
                    )));
                }
                if (value - values[j][i]).abs() > MATRIX_TOLERANCE {
                    return Err(SimulationError::invalid_config(format!(
                        "correlation matrix is not symmetric at [{i}][{j}]"
                    )));
                }
            }
            if (row[i] - 1.0).abs() > MATRIX_TOLERANCE {
                return Err(SimulationError::invalid_config(format!(
                    "correlation [{i}][{i}] must be 1"
                )));
            }
        }
        Ok(Self { values })
    }

    /// The `n x n` identity (uncorrelated strategies).
    #[must_use]
    pub fn identity(n: usize) -> Self {
        let values = (0..n)
            .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
            .collect();
        Self { values }
    }

    /// Number of strategies covered.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    /// Correlation between strategies `i` and `j`.
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i][j]
    }

    /// Matrix rows.
    #[must_use]
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.values
    }

    /// Default correlation for `n` strategies: the three-strategy restaking
    /// preset when `n == 3`, the identity otherwise.
    #[must_use]
    pub fn default_for(n: usize) -> Self {
        if n == 3 {
            Self {
                values: vec![
                    vec![1.0, 0.3, 0.2],
                    vec![0.3, 1.0, 0.1],
                    vec![0.2, 0.1, 1.0],
                ],
            }
        } else {
            Self::identity(n)
        }
    }

    /// Named three-strategy scenarios for correlation sensitivity runs.
    #[must_use]
    pub fn presets() -> Vec<(&'static str, Self)> {
        vec![
            (
                "Low Correlation (Diversified)",
                Self {
                    values: vec![
                        vec![1.0, 0.2, 0.1],
                        vec![0.2, 1.0, 0.1],
                        vec![0.1, 0.1, 1.0],
                    ],
                },
            ),
            (
                "Medium Correlation",
                Self {
                    values: vec![
                        vec![1.0, 0.5, 0.3],
                        vec![0.5, 1.0, 0.4],
                        vec![0.3, 0.4, 1.0],
                    ],
                },
            ),
            (
                "High Correlation (Risky)",
                Self {
                    values: vec![
                        vec![1.0, 0.8, 0.7],
                        vec![0.8, 1.0, 0.6],
                        vec![0.7, 0.6, 1.0],
                    ],
                },
            ),
        ]
    }
}

impl TryFrom<Vec<Vec<f64>>> for CorrelationMatrix {
    type Error = SimulationError;

    fn try_from(values: Vec<Vec<f64>>) -> Result<Self> {
        Self::new(values)
    }
}

impl From<CorrelationMatrix> for Vec<Vec<f64>> {
    fn from(matrix: CorrelationMatrix) -> Self {
        matrix.values
    }
}

/// Cholesky factorization of a symmetric positive semi-definite matrix.
///
/// Returns the lower-triangular `L` with `matrix = L * L^T`. Pivots within
/// tolerance of zero produce a zero column, so zero-variance entries and
/// perfectly correlated pairs factorize.
///
/// # Errors
///
/// Returns `DecompositionError` when the matrix is not positive
/// semi-definite.
pub fn cholesky(matrix: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
    let n = matrix.len();
    let scale = (0..n)
        .map(|i| matrix[i][i].abs())
        .fold(0.0_f64, f64::max)
        .max(f64::MIN_POSITIVE);
    let tolerance = PIVOT_TOLERANCE * scale;
    let mut l = vec![vec![0.0; n]; n];

    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[i][k] * l[j][k]).sum();
            let residual = matrix[i][j] - sum;

            if i == j {
                if residual < -tolerance {
                    return Err(SimulationError::decomposition(format!(
                        "matrix is not positive semi-definite (pivot {i} = {residual:e})"
                    )));
                }
                l[i][i] = if residual <= tolerance { 0.0 } else { residual.sqrt() };
            } else if l[j][j] == 0.0 {
                if residual.abs() > tolerance.sqrt() * scale.sqrt() {
                    return Err(SimulationError::decomposition(format!(
                        "matrix is not positive semi-definite (entry [{i}][{j}])"
                    )));
                }
                l[i][j] = 0.0;
            } else {
                l[i][j] = residual / l[j][j];
            }
        }
    }

    Ok(l)
}

/// Draws correlated per-step returns for a set of strategies.
#[derive(Debug, Clone)]
pub struct CorrelatedReturnGenerator {
    step_means: Vec<f64>,
    step_vols: Vec<f64>,
    covariance: Vec<Vec<f64>>,
    factor: Vec<Vec<f64>>,
}

impl CorrelatedReturnGenerator {
    /// Builds a generator from annualized means and standard deviations.
    ///
    /// # Arguments
    /// * `annual_means` - Expected annual return per strategy
    /// * `annual_stds` - Annual return std per strategy
    /// * `correlation` - Cross-strategy correlation
    /// * `steps_per_year` - Step granularity (365 for daily)
    ///
    /// # Errors
    ///
    /// `InvalidConfiguration` on mismatched lengths or unusable parameters,
    /// `DecompositionError` when the covariance cannot be factorized.
    pub fn new(
        annual_means: &[f64],
        annual_stds: &[f64],
        correlation: &CorrelationMatrix,
        steps_per_year: u32,
    ) -> Result<Self> {
        let n = annual_means.len();
        if n == 0 {
            return Err(SimulationError::invalid_config("no strategies to correlate"));
        }
        if annual_stds.len() != n || correlation.dimension() != n {
            return Err(SimulationError::invalid_config(format!(
                "{n} means, {} stds and a {}x{} correlation matrix do not match",
                annual_stds.len(),
                correlation.dimension(),
                correlation.dimension()
            )));
        }
        if steps_per_year == 0 {
            return Err(SimulationError::invalid_config(
                "steps per year must be positive",
            ));
        }
        if annual_means.iter().any(|m| !m.is_finite() || *m <= -1.0) {
            return Err(SimulationError::invalid_config(
                "annual means must be finite and above -100%",
            ));
        }
        if annual_stds.iter().any(|s| !s.is_finite() || *s < 0.0) {
            return Err(SimulationError::invalid_config(
                "annual stds must be finite and non-negative",
            ));
        }

        let steps = f64::from(steps_per_year);
        let step_means: Vec<f64> = annual_means
            .iter()
            .map(|m| (1.0 + m).powf(1.0 / steps) - 1.0)
            .collect();
        let step_vols: Vec<f64> = annual_stds.iter().map(|s| s / steps.sqrt()).collect();

        let covariance: Vec<Vec<f64>> = (0..n)
            .map(|i| {
                (0..n)
                    .map(|j| step_vols[i] * step_vols[j] * correlation.get(i, j))
                    .collect()
            })
            .collect();

        // Factorize the unit-diagonal correlation so the definiteness check
        // does not depend on how the volatilities are scaled, then scale the
        // rows: D·C·D = (D·L)(D·L)^T.
        let factor: Vec<Vec<f64>> = cholesky(correlation.rows())?
            .into_iter()
            .zip(&step_vols)
            .map(|(row, vol)| row.into_iter().map(|l| l * vol).collect())
            .collect();

        Ok(Self {
            step_means,
            step_vols,
            covariance,
            factor,
        })
    }

    /// Builds a generator from strategy specs.
    pub fn from_strategies(
        strategies: &[StrategySpec],
        correlation: &CorrelationMatrix,
        steps_per_year: u32,
    ) -> Result<Self> {
        let means: Vec<f64> = strategies.iter().map(|s| s.mean_annual_return).collect();
        let stds: Vec<f64> = strategies.iter().map(|s| s.std_annual_return).collect();
        Self::new(&means, &stds, correlation, steps_per_year)
    }

    /// Number of strategies.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.step_means.len()
    }

    /// Per-step mean returns.
    #[must_use]
    pub fn step_means(&self) -> &[f64] {
        &self.step_means
    }

    /// Per-step volatilities.
    #[must_use]
    pub fn step_vols(&self) -> &[f64] {
        &self.step_vols
    }

    /// Per-step covariance matrix.
    #[must_use]
    pub fn covariance(&self) -> &[Vec<f64>] {
        &self.covariance
    }

    /// Lower-triangular Cholesky factor of the covariance.
    #[must_use]
    pub fn cholesky_factor(&self) -> &[Vec<f64>] {
        &self.factor
    }

    /// Writes one step's correlated returns into `out`.
    ///
    /// `out` must have `dimension()` entries.
    pub fn fill_returns<R: Rng + ?Sized>(&self, rng: &mut R, out: &mut [f64]) {
        debug_assert_eq!(out.len(), self.dimension());
        for z in out.iter_mut() {
            *z = StandardNormal.sample(rng);
        }
        // In place: row i only reads shocks 0..=i, which are still untouched
        // when walking from the last row up.
        for i in (0..out.len()).rev() {
            let shock: f64 = (0..=i).map(|j| self.factor[i][j] * out[j]).sum();
            out[i] = self.step_means[i] + shock;
        }
    }

    /// Draws one step's correlated returns.
    pub fn next_returns<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
        let mut out = vec![0.0; self.dimension()];
        self.fill_returns(rng, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn reconstruct(l: &[Vec<f64>]) -> Vec<Vec<f64>> {
        let n = l.len();
        (0..n)
            .map(|i| (0..n).map(|j| (0..n).map(|k| l[i][k] * l[j][k]).sum()).collect())
            .collect()
    }

    #[test]
    fn test_cholesky_identity() {
        let l = cholesky(CorrelationMatrix::identity(3).rows()).unwrap();
        assert_eq!(l, CorrelationMatrix::identity(3).rows());
    }

    #[test]
    fn test_cholesky_correlated() {
        let matrix = vec![vec![1.0, 0.5], vec![0.5, 1.0]];
        let l = cholesky(&matrix).unwrap();
        assert_eq!(l[0][1], 0.0);
        let back = reconstruct(&l);
        for i in 0..2 {
            for j in 0..2 {
                assert!((back[i][j] - matrix[i][j]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_cholesky_semi_definite() {
        // Perfectly correlated pair.
        let l = cholesky(&[vec![1.0, 1.0], vec![1.0, 1.0]]).unwrap();
        assert_eq!(l[1][1], 0.0);
        assert!((l[1][0] - 1.0).abs() < 1e-12);

        // Zero-variance strategy.
        let l = cholesky(&[vec![0.0, 0.0], vec![0.0, 4.0]]).unwrap();
        assert_eq!(l[0][0], 0.0);
        assert_eq!(l[1][1], 2.0);
    }

    #[test]
    fn test_cholesky_rejects_indefinite() {
        let matrix = CorrelationMatrix::new(vec![
            vec![1.0, 0.9, -0.9],
            vec![0.9, 1.0, 0.9],
            vec![-0.9, 0.9, 1.0],
        ])
        .unwrap();
        let err = cholesky(matrix.rows()).unwrap_err();
        assert!(matches!(err, SimulationError::DecompositionError { .. }));
    }

    #[test]
    fn test_matrix_validation() {
        assert!(CorrelationMatrix::new(vec![]).is_err());
        assert!(CorrelationMatrix::new(vec![vec![1.0, 0.2], vec![0.3, 1.0]]).is_err());
        assert!(CorrelationMatrix::new(vec![vec![0.9, 0.0], vec![0.0, 1.0]]).is_err());
        assert!(CorrelationMatrix::new(vec![vec![1.0, 1.5], vec![1.5, 1.0]]).is_err());
        assert!(CorrelationMatrix::new(vec![vec![1.0, 0.2]]).is_err());
        assert!(CorrelationMatrix::new(vec![vec![1.0, 0.2], vec![0.2, 1.0]]).is_ok());
    }

    #[test]
    fn test_matrix_deserialization_validates() {
        let ok: CorrelationMatrix = serde_json::from_str("[[1.0, 0.4], [0.4, 1.0]]").unwrap();
        assert_eq!(ok.get(0, 1), 0.4);
        let bad: std::result::Result<CorrelationMatrix, _> =
            serde_json::from_str("[[1.0, 0.4], [0.1, 1.0]]");
        assert!(bad.is_err());
    }

    #[test]
    fn test_presets_factorize() {
        for (name, matrix) in CorrelationMatrix::presets() {
            assert!(cholesky(matrix.rows()).is_ok(), "{name}");
        }
        assert_eq!(CorrelationMatrix::default_for(3).get(0, 1), 0.3);
        assert_eq!(CorrelationMatrix::default_for(2), CorrelationMatrix::identity(2));
    }

    #[test]
    fn test_generator_reconstructs_covariance() {
        let generator = CorrelatedReturnGenerator::new(
            &[0.085, 0.045, 0.035],
            &[0.03, 0.02, 0.05],
            &CorrelationMatrix::default_for(3),
            365,
        )
        .unwrap();

        let back = reconstruct(generator.cholesky_factor());
        let cov = generator.covariance();
        for i in 0..3 {
            for j in 0..3 {
                assert!((back[i][j] - cov[i][j]).abs() < 1e-15);
            }
        }
        assert!((generator.step_vols()[0] - 0.03 / 365f64.sqrt()).abs() < 1e-15);
        let expected_mean = 1.085f64.powf(1.0 / 365.0) - 1.0;
        assert!((generator.step_means()[0] - expected_mean).abs() < 1e-15);
    }

    #[test]
    fn test_zero_vol_returns_equal_step_mean() {
        let generator = CorrelatedReturnGenerator::new(
            &[0.10, 0.05],
            &[0.0, 0.0],
            &CorrelationMatrix::identity(2),
            365,
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let returns = generator.next_returns(&mut rng);
        assert_eq!(returns, generator.step_means());
    }

    #[test]
    fn test_generated_returns_are_correlated() {
        let correlation = CorrelationMatrix::new(vec![vec![1.0, 0.8], vec![0.8, 1.0]]).unwrap();
        let generator =
            CorrelatedReturnGenerator::new(&[0.05, 0.05], &[0.2, 0.2], &correlation, 365).unwrap();
        let mut rng = StdRng::seed_from_u64(42);

        let draws: Vec<Vec<f64>> = (0..20_000).map(|_| generator.next_returns(&mut rng)).collect();
        let a: Vec<f64> = draws.iter().map(|d| d[0]).collect();
        let b: Vec<f64> = draws.iter().map(|d| d[1]).collect();
        let (ma, mb) = (crate::stats::mean(&a), crate::stats::mean(&b));
        let cov: f64 =
            a.iter().zip(&b).map(|(x, y)| (x - ma) * (y - mb)).sum::<f64>() / a.len() as f64;
        let rho = cov / (crate::stats::std_dev(&a) * crate::stats::std_dev(&b));
        assert!((rho - 0.8).abs() < 0.03, "sample correlation {rho}");
    }

    #[test]
    fn test_indefinite_correlation_rejected_regardless_of_vols() {
        let matrix = CorrelationMatrix::new(vec![
            vec![1.0, 0.9, -0.9],
            vec![0.9, 1.0, 0.9],
            vec![-0.9, 0.9, 1.0],
        ])
        .unwrap();

        let even = CorrelatedReturnGenerator::new(&[0.05; 3], &[0.3, 0.3, 0.3], &matrix, 365);
        assert!(matches!(even, Err(SimulationError::DecompositionError { .. })));

        let skewed = CorrelatedReturnGenerator::new(&[0.05; 3], &[0.3, 0.3, 1e-9], &matrix, 365);
        assert!(matches!(skewed, Err(SimulationError::DecompositionError { .. })));
    }

    #[test]
    fn test_generator_rejects_mismatched_inputs() {
        let err = CorrelatedReturnGenerator::new(
            &[0.05, 0.05],
            &[0.1],
            &CorrelationMatrix::identity(2),
            365,
        )
        .unwrap_err();
        assert!(matches!(err, SimulationError::InvalidConfiguration { .. }));

        assert!(
            CorrelatedReturnGenerator::new(&[-1.5], &[0.1], &CorrelationMatrix::identity(1), 365)
                .is_err()
        );
    }
}
