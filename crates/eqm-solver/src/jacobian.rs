//! Finite difference derivatives.

use crate::error::EquilibriumResult;
use nalgebra::{DMatrix, DVector};

/// Forward-difference Jacobian around a point where f(x) is already known.
///
/// Column j is (f(x + steps[j]·e_j) − f(x)) / steps[j]. Steps may be negative.
/// A column whose perturbed point fails to evaluate is retried with the step
/// reversed; only if that fails too is the error returned.
pub fn forward_difference_from<F>(
    x: &DVector<f64>,
    f_x: &DVector<f64>,
    f: F,
    steps: &[f64],
) -> EquilibriumResult<DMatrix<f64>>
where
    F: Fn(&DVector<f64>) -> EquilibriumResult<DVector<f64>>,
{
    let n = x.len();
    let m = f_x.len();
    let mut jac = DMatrix::zeros(m, n);

    let column = |j: usize, dx: f64| -> EquilibriumResult<DVector<f64>> {
        let mut x_perturbed = x.clone();
        x_perturbed[j] += dx;
        let f_perturbed = f(&x_perturbed)?;
        Ok((f_perturbed - f_x) / dx)
    };

    for j in 0..n {
        let df = match column(j, steps[j]) {
            Ok(df) => df,
            Err(_) => column(j, -steps[j])?,
        };
        jac.set_column(j, &df);
    }

    Ok(jac)
}

/// Central differences (more accurate but 2x cost).
pub fn central_difference_jacobian<F>(
    x: &DVector<f64>,
    f: F,
    epsilon: f64,
) -> EquilibriumResult<DMatrix<f64>>
where
    F: Fn(&DVector<f64>) -> EquilibriumResult<DVector<f64>>,
{
    let n = x.len();
    let m = f(x)?.len();
    let mut jac = DMatrix::zeros(m, n);

    for j in 0..n {
        let dx = epsilon * x[j].abs().max(1.0);

        let mut x_plus = x.clone();
        x_plus[j] += dx;
        let f_plus = f(&x_plus)?;

        let mut x_minus = x.clone();
        x_minus[j] -= dx;
        let f_minus = f(&x_minus)?;

        let df = (f_plus - f_minus) / (2.0 * dx);
        jac.set_column(j, &df);
    }

    Ok(jac)
}

/// Central-difference gradient of a scalar function.
pub fn central_difference_gradient<F>(
    x: &DVector<f64>,
    f: F,
    epsilon: f64,
) -> EquilibriumResult<DVector<f64>>
where
    F: Fn(&DVector<f64>) -> EquilibriumResult<f64>,
{
    let jac = central_difference_jacobian(
        x,
        |x| Ok(DVector::from_element(1, f(x)?)),
        epsilon,
    )?;
    Ok(jac.row(0).transpose())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EquilibriumError;

    #[test]
    fn jacobian_linear() {
        // f(x) = 2*x, J = 2
        let f = |x: &DVector<f64>| -> EquilibriumResult<DVector<f64>> {
            Ok(DVector::from_element(1, 2.0 * x[0]))
        };

        let x = DVector::from_element(1, 3.0);
        let f_x = f(&x).unwrap();
        let jac = forward_difference_from(&x, &f_x, f, &[3e-7]).unwrap();

        assert!((jac[(0, 0)] - 2.0).abs() < 1e-5);
    }

    #[test]
    fn failed_column_is_differenced_backwards() {
        // Undefined above x = 1
        let f = |x: &DVector<f64>| -> EquilibriumResult<DVector<f64>> {
            if x[0] > 1.0 {
                return Err(EquilibriumError::numeric("out of domain"));
            }
            Ok(DVector::from_element(1, x[0] * x[0]))
        };
        let x = DVector::from_element(1, 1.0);
        let f_x = f(&x).unwrap();
        let jac = forward_difference_from(&x, &f_x, f, &[1e-7]).unwrap();
        assert!((jac[(0, 0)] - 2.0).abs() < 1e-5);

        let nowhere = |_: &DVector<f64>| -> EquilibriumResult<DVector<f64>> {
            Err(EquilibriumError::numeric("undefined"))
        };
        assert!(forward_difference_from(&x, &f_x, nowhere, &[1e-7]).is_err());
    }

    #[test]
    fn jacobian_quadratic() {
        // f(x) = x^2, J = 2*x
        let f = |x: &DVector<f64>| -> EquilibriumResult<DVector<f64>> {
            Ok(DVector::from_element(1, x[0] * x[0]))
        };

        let x = DVector::from_element(1, 3.0);
        let jac = central_difference_jacobian(&x, f, 1e-6).unwrap();

        assert!((jac[(0, 0)] - 6.0).abs() < 1e-7);
    }

    #[test]
    fn negative_steps_allowed() {
        let f = |x: &DVector<f64>| -> EquilibriumResult<DVector<f64>> {
            Ok(DVector::from_vec(vec![x[0] * x[1], x[1]]))
        };
        let x = DVector::from_vec(vec![2.0, 5.0]);
        let f_x = f(&x).unwrap();
        let jac = forward_difference_from(&x, &f_x, f, &[-1e-7, 1e-7]).unwrap();
        assert!((jac[(0, 0)] - 5.0).abs() < 1e-5);
        assert!((jac[(0, 1)] - 2.0).abs() < 1e-5);
        assert!((jac[(1, 1)] - 1.0).abs() < 1e-6);
        assert_eq!(jac[(1, 0)], 0.0);
    }

    #[test]
    fn gradient_of_scalar() {
        let f = |x: &DVector<f64>| -> EquilibriumResult<f64> { Ok(x[0] * x[0] + 3.0 * x[1]) };
        let x = DVector::from_vec(vec![1.5, -2.0]);
        let g = central_difference_gradient(&x, f, 1e-6).unwrap();
        assert!((g[0] - 3.0).abs() < 1e-7);
        assert!((g[1] - 3.0).abs() < 1e-7);
    }
}
