//! Equality-constrained minimisation problems.

use crate::error::EquilibriumResult;
use crate::jacobian::{central_difference_gradient, central_difference_jacobian};
use crate::transform::VariableKind;
use nalgebra::{DMatrix, DVector};

/// Finite-difference step used by the default derivative implementations.
pub const DEFAULT_FD_EPSILON: f64 = 1e-6;

/// Minimise f(x) subject to c(x) = 0 and per-variable bounds.
///
/// Amount variables are bounded below by zero; bounded variables by their
/// [`VariableKind::Bounded`] limits. Derivatives default to central finite
/// differences; implementations with analytic derivatives should override
/// [`NlpProblem::gradient`] and [`NlpProblem::constraint_jacobian`].
pub trait NlpProblem {
    /// One entry per variable.
    fn variable_kinds(&self) -> &[VariableKind];

    fn initial_point(&self) -> DVector<f64>;

    fn objective(&self, x: &DVector<f64>) -> EquilibriumResult<f64>;

    fn constraints(&self, x: &DVector<f64>) -> EquilibriumResult<DVector<f64>>;

    /// Typical magnitude of the amount variables (the system total).
    fn amount_scale(&self) -> f64 {
        1.0
    }

    fn num_variables(&self) -> usize {
        self.variable_kinds().len()
    }

    fn gradient(&self, x: &DVector<f64>) -> EquilibriumResult<DVector<f64>> {
        central_difference_gradient(x, |x| self.objective(x), DEFAULT_FD_EPSILON)
    }

    fn constraint_jacobian(&self, x: &DVector<f64>) -> EquilibriumResult<DMatrix<f64>> {
        central_difference_jacobian(x, |x| self.constraints(x), DEFAULT_FD_EPSILON)
    }

    fn variable_labels(&self) -> Vec<String> {
        (0..self.num_variables()).map(|i| format!("x[{i}]")).collect()
    }

    fn constraint_labels(&self) -> Vec<String> {
        Vec::new()
    }

    fn describe_objective(&self) -> String {
        "f(x)".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// min x² + y²  s.t.  x + y = 1
    struct Circle;

    impl NlpProblem for Circle {
        fn variable_kinds(&self) -> &[VariableKind] {
            &[VariableKind::Amount, VariableKind::Amount]
        }

        fn initial_point(&self) -> DVector<f64> {
            DVector::from_vec(vec![0.9, 0.1])
        }

        fn objective(&self, x: &DVector<f64>) -> EquilibriumResult<f64> {
            Ok(x.norm_squared())
        }

        fn constraints(&self, x: &DVector<f64>) -> EquilibriumResult<DVector<f64>> {
            Ok(DVector::from_element(1, x[0] + x[1] - 1.0))
        }
    }

    #[test]
    fn default_derivatives() {
        let x = DVector::from_vec(vec![0.3, 2.0]);
        let g = Circle.gradient(&x).unwrap();
        assert!((g[0] - 0.6).abs() < 1e-8);
        assert!((g[1] - 4.0).abs() < 1e-8);
        let jac = Circle.constraint_jacobian(&x).unwrap();
        assert_eq!(jac.shape(), (1, 2));
        assert!((jac[(0, 1)] - 1.0).abs() < 1e-8);
        assert_eq!(Circle.num_variables(), 2);
        assert_eq!(Circle.variable_labels()[1], "x[1]");
    }
}
