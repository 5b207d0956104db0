use crate::numerical::optimization::errors::OptimizationError;
use nalgebra::{DMatrix, DVector};
use strum_macros::Display;

/// Axis-aligned box l <= x <= u
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    lower: DVector<f64>,
    upper: DVector<f64>,
}

impl Bounds {
    /// Validates lower[i] <= upper[i] for every coordinate. Infinite bounds
    /// are allowed, NaN is not.
    pub fn new(lower: DVector<f64>, upper: DVector<f64>) -> Result<Self, OptimizationError> {
        if lower.len() != upper.len() {
            return Err(OptimizationError::InvalidBounds(format!(
                "lower bound has {} coordinates, upper bound has {}",
                lower.len(),
                upper.len()
            )));
        }
        if lower.is_empty() {
            return Err(OptimizationError::InvalidBounds(
                "bounds must have at least one coordinate".to_string(),
            ));
        }
        for (i, (l, u)) in lower.iter().zip(upper.iter()).enumerate() {
            if l.is_nan() || u.is_nan() {
                return Err(OptimizationError::InvalidBounds(format!(
                    "bound {} is NaN: [{}, {}]",
                    i, l, u
                )));
            }
            if l > u {
                return Err(OptimizationError::InvalidBounds(format!(
                    "lower[{}] = {} exceeds upper[{}] = {}",
                    i, l, i, u
                )));
            }
        }
        Ok(Self { lower, upper })
    }

    /// Box with no restriction in any coordinate
    pub fn unbounded(dimension: usize) -> Result<Self, OptimizationError> {
        Self::new(
            DVector::from_element(dimension, f64::NEG_INFINITY),
            DVector::from_element(dimension, f64::INFINITY),
        )
    }

    pub fn dimension(&self) -> usize {
        self.lower.len()
    }

    pub fn lower(&self) -> &DVector<f64> {
        &self.lower
    }

    pub fn upper(&self) -> &DVector<f64> {
        &self.upper
    }

    /// Projection onto the box
    pub fn clip(&self, y: &DVector<f64>) -> DVector<f64> {
        let mut clipped_y = y.clone();
        for (i, y_i) in y.iter().enumerate() {
            if *y_i < self.lower[i] {
                clipped_y[i] = self.lower[i];
            } else if *y_i > self.upper[i] {
                clipped_y[i] = self.upper[i];
            }
        }
        clipped_y
    }

    pub fn contains(&self, x: &DVector<f64>) -> bool {
        x.len() == self.dimension()
            && x
                .iter()
                .enumerate()
                .all(|(i, xi)| *xi >= self.lower[i] && *xi <= self.upper[i])
    }

    /// Clamp an initial guess into the box; the guess has to match the
    /// dimension and be finite for the clamp to mean anything.
    pub fn clamp_initial_guess(&self, guess: &DVector<f64>) -> Result<DVector<f64>, OptimizationError> {
        if guess.len() != self.dimension() {
            return Err(OptimizationError::DimensionMismatch {
                context: "initial guess",
                expected: self.dimension(),
                found: guess.len(),
            });
        }
        if let Some(i) = guess.iter().position(|g| !g.is_finite()) {
            return Err(OptimizationError::InvalidBounds(format!(
                "initial guess coordinate {} is not finite ({})",
                i, guess[i]
            )));
        }
        Ok(self.clip(guess))
    }
}

/// Role of one coordinate in the current iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum CoordinateState {
    /// interior, or on a bound with the gradient pointing back inside
    Free,
    /// pinned at the lower bound, gradient pushes further down
    AtLower,
    /// pinned at the upper bound, gradient pushes further up
    AtUpper,
    /// lower == upper
    Fixed,
}

/// Partition of the coordinates into free and bound-pinned ones
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveSet {
    states: Vec<CoordinateState>,
}

impl ActiveSet {
    pub fn identify(x: &DVector<f64>, gradient: &DVector<f64>, bounds: &Bounds) -> Self {
        let states = (0..x.len())
            .map(|i| {
                let (l, u) = (bounds.lower[i], bounds.upper[i]);
                if l == u {
                    CoordinateState::Fixed
                } else if x[i] <= l && gradient[i] > 0.0 {
                    CoordinateState::AtLower
                } else if x[i] >= u && gradient[i] < 0.0 {
                    CoordinateState::AtUpper
                } else {
                    CoordinateState::Free
                }
            })
            .collect();
        Self { states }
    }

    pub fn state(&self, i: usize) -> CoordinateState {
        self.states[i]
    }

    pub fn is_free(&self, i: usize) -> bool {
        self.states[i] == CoordinateState::Free
    }

    pub fn free_indices(&self) -> Vec<usize> {
        (0..self.states.len()).filter(|&i| self.is_free(i)).collect()
    }

    pub fn active_indices(&self) -> Vec<usize> {
        (0..self.states.len()).filter(|&i| !self.is_free(i)).collect()
    }

    pub fn n_free(&self) -> usize {
        self.states.iter().filter(|s| **s == CoordinateState::Free).count()
    }

    /// Coordinates that are free in one set and active in the other
    pub fn switched_coordinates(&self, other: &ActiveSet) -> Vec<usize> {
        (0..self.states.len())
            .filter(|&i| self.is_free(i) != other.is_free(i))
            .collect()
    }

    /// Zero the active components of v
    pub fn mask(&self, v: &DVector<f64>) -> DVector<f64> {
        DVector::from_fn(v.len(), |i, _| if self.is_free(i) { v[i] } else { 0.0 })
    }

    /// Gradient with active components zeroed
    pub fn projected_gradient(&self, gradient: &DVector<f64>) -> DVector<f64> {
        self.mask(gradient)
    }

    /// d_F = -H_FF g_F, d_A = 0
    pub fn free_subspace_direction(
        &self,
        inverse_hessian: &DMatrix<f64>,
        gradient: &DVector<f64>,
    ) -> DVector<f64> {
        let free = self.free_indices();
        let mut direction = DVector::zeros(gradient.len());
        for &i in &free {
            let mut d_i = 0.0;
            for &j in &free {
                d_i -= inverse_hessian[(i, j)] * gradient[j];
            }
            direction[i] = d_i;
        }
        direction
    }
}
