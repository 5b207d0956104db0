use crate::numerical::optimization::bounds::Bounds;
use crate::numerical::optimization::errors::OptimizationError;
use crate::numerical::optimization::objective::ObjectiveFunction;
use nalgebra::{DMatrix, DVector};
use strum_macros::{Display, EnumIter};

/// f(x) = (1 - x0)^2 + 100 (x1 - x0^2)^2, minimum f(1, 1) = 0
pub fn rosenbrock_value(x: &DVector<f64>) -> f64 {
    let a = 1.0 - x[0];
    let b = x[1] - x[0] * x[0];
    a * a + 100.0 * b * b
}

pub fn rosenbrock_gradient(x: &DVector<f64>) -> DVector<f64> {
    let b = x[1] - x[0] * x[0];
    DVector::from_vec(vec![-2.0 * (1.0 - x[0]) - 400.0 * x[0] * b, 200.0 * b])
}

pub fn rosenbrock_hessian(x: &DVector<f64>) -> DMatrix<f64> {
    let off_diagonal = -400.0 * x[0];
    DMatrix::from_row_slice(
        2,
        2,
        &[
            2.0 - 400.0 * x[1] + 1200.0 * x[0] * x[0],
            off_diagonal,
            off_diagonal,
            200.0,
        ],
    )
}

const SPHERE_CENTER: [f64; 3] = [1.0, -2.0, 3.0];

/// Smooth problems with known minimizers, used to exercise the minimizer
/// and for benchmarks. Every problem provides an analytic Hessian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum TestObjective {
    /// banana valley, minimum at (1, 1)
    Rosenbrock,
    /// sum (x_i - c_i)^2 with c = (1, -2, 3)
    ShiftedSphere,
    /// (x + 2y - 7)^2 + (2x + y - 5)^2, minimum at (1, 3)
    Booth,
    /// minimum at (3, 0.5)
    Beale,
}

impl TestObjective {
    pub fn dimension(&self) -> usize {
        match self {
            TestObjective::ShiftedSphere => 3,
            _ => 2,
        }
    }

    pub fn minimizer(&self) -> DVector<f64> {
        match self {
            TestObjective::Rosenbrock => DVector::from_vec(vec![1.0, 1.0]),
            TestObjective::ShiftedSphere => DVector::from_row_slice(&SPHERE_CENTER),
            TestObjective::Booth => DVector::from_vec(vec![1.0, 3.0]),
            TestObjective::Beale => DVector::from_vec(vec![3.0, 0.5]),
        }
    }

    pub fn starting_points(&self) -> Vec<DVector<f64>> {
        match self {
            TestObjective::Rosenbrock => vec![
                DVector::from_vec(vec![-1.2, 1.0]),
                DVector::from_vec(vec![5.0, 5.0]),
                DVector::from_vec(vec![1.0, 1.0]),
            ],
            TestObjective::ShiftedSphere => vec![
                DVector::zeros(3),
                DVector::from_vec(vec![-4.0, 4.0, -4.0]),
            ],
            TestObjective::Booth => vec![
                DVector::zeros(2),
                DVector::from_vec(vec![-5.0, 8.0]),
            ],
            TestObjective::Beale => vec![DVector::from_vec(vec![2.0, 0.2])],
        }
    }

    /// box containing the minimizer and all starting points
    pub fn default_bounds(&self) -> Result<Bounds, OptimizationError> {
        let n = self.dimension();
        let half_width = match self {
            TestObjective::Beale => 4.5,
            _ => 10.0,
        };
        Bounds::new(
            DVector::from_element(n, -half_width),
            DVector::from_element(n, half_width),
        )
    }
}

fn beale_terms(x: &DVector<f64>) -> [(f64, [f64; 2], [[f64; 2]; 2]); 3] {
    let (u, v) = (x[0], x[1]);
    // (residual, gradient, hessian) of each term c_k - u + u v^k
    [
        (1.5 - u + u * v, [v - 1.0, u], [[0.0, 1.0], [1.0, 0.0]]),
        (
            2.25 - u + u * v * v,
            [v * v - 1.0, 2.0 * u * v],
            [[0.0, 2.0 * v], [2.0 * v, 2.0 * u]],
        ),
        (
            2.625 - u + u * v.powi(3),
            [v.powi(3) - 1.0, 3.0 * u * v * v],
            [[0.0, 3.0 * v * v], [3.0 * v * v, 6.0 * u * v]],
        ),
    ]
}

impl ObjectiveFunction for TestObjective {
    fn value(&self, x: &DVector<f64>) -> f64 {
        match self {
            TestObjective::Rosenbrock => rosenbrock_value(x),
            TestObjective::ShiftedSphere => x
                .iter()
                .zip(SPHERE_CENTER.iter())
                .map(|(xi, ci)| (xi - ci).powi(2))
                .sum(),
            TestObjective::Booth => {
                (x[0] + 2.0 * x[1] - 7.0).powi(2) + (2.0 * x[0] + x[1] - 5.0).powi(2)
            }
            TestObjective::Beale => beale_terms(x).iter().map(|(t, _, _)| t * t).sum(),
        }
    }

    fn gradient(&self, x: &DVector<f64>) -> DVector<f64> {
        match self {
            TestObjective::Rosenbrock => rosenbrock_gradient(x),
            TestObjective::ShiftedSphere => {
                DVector::from_fn(x.len(), |i, _| 2.0 * (x[i] - SPHERE_CENTER[i]))
            }
            TestObjective::Booth => {
                let r1 = x[0] + 2.0 * x[1] - 7.0;
                let r2 = 2.0 * x[0] + x[1] - 5.0;
                DVector::from_vec(vec![2.0 * r1 + 4.0 * r2, 4.0 * r1 + 2.0 * r2])
            }
            TestObjective::Beale => {
                let mut g = DVector::zeros(2);
                for (t, dt, _) in beale_terms(x) {
                    g[0] += 2.0 * t * dt[0];
                    g[1] += 2.0 * t * dt[1];
                }
                g
            }
        }
    }

    fn hessian(&self, x: &DVector<f64>) -> Option<DMatrix<f64>> {
        let h = match self {
            TestObjective::Rosenbrock => rosenbrock_hessian(x),
            TestObjective::ShiftedSphere => DMatrix::identity(3, 3) * 2.0,
            TestObjective::Booth => DMatrix::from_row_slice(2, 2, &[10.0, 8.0, 8.0, 10.0]),
            TestObjective::Beale => {
                let mut h = DMatrix::zeros(2, 2);
                for (t, dt, d2t) in beale_terms(x) {
                    for i in 0..2 {
                        for j in 0..2 {
                            h[(i, j)] += 2.0 * (dt[i] * dt[j] + t * d2t[i][j]);
                        }
                    }
                }
                h
            }
        };
        Some(h)
    }

    fn name(&self) -> &str {
        match self {
            TestObjective::Rosenbrock => "Rosenbrock",
            TestObjective::ShiftedSphere => "shifted sphere",
            TestObjective::Booth => "Booth",
            TestObjective::Beale => "Beale",
        }
    }
}
