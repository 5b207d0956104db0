use crate::numerical::optimization::bounds::Bounds;
use crate::numerical::optimization::errors::OptimizationError;
use crate::numerical::optimization::objective::{ObjectiveEvaluator, ObjectiveFunction};
use log::debug;
use nalgebra::DVector;

/// Parameters of the projected backtracking line search
#[derive(Debug, Clone, PartialEq)]
pub struct LineSearchParams {
    /// Armijo sufficient decrease constant
    pub c1: f64,
    /// step multiplier applied after each rejected trial, in (0, 1)
    pub shrink_factor: f64,
    pub initial_step: f64,
    pub max_backtracks: usize,
    pub min_step: f64,
}

impl Default for LineSearchParams {
    fn default() -> Self {
        Self {
            c1: 1e-4,
            shrink_factor: 0.5,
            initial_step: 1.0,
            max_backtracks: 60,
            min_step: 1e-16,
        }
    }
}

impl LineSearchParams {
    pub fn validate(&self) -> Result<(), OptimizationError> {
        if !(self.c1 > 0.0 && self.c1 < 1.0) {
            return Err(OptimizationError::InvalidParameters(format!(
                "line search c1 must lie in (0, 1), got {}",
                self.c1
            )));
        }
        if !(self.shrink_factor > 0.0 && self.shrink_factor < 1.0) {
            return Err(OptimizationError::InvalidParameters(format!(
                "line search shrink factor must lie in (0, 1), got {}",
                self.shrink_factor
            )));
        }
        if !(self.initial_step > 0.0 && self.initial_step.is_finite()) {
            return Err(OptimizationError::InvalidParameters(format!(
                "line search initial step must be positive, got {}",
                self.initial_step
            )));
        }
        if self.max_backtracks == 0 {
            return Err(OptimizationError::InvalidParameters(
                "line search needs at least one backtrack".to_string(),
            ));
        }
        Ok(())
    }
}

/// Accepted trial of a projected line search
#[derive(Debug, Clone)]
pub struct LineSearchResult {
    pub alpha: f64,
    pub x_new: DVector<f64>,
    pub f_new: f64,
    /// the first trial step was accepted without backtracking
    pub full_step: bool,
}

/// Backtracking along the projected path x(α) = P(x + α d).
/// A trial is accepted when f(x(α)) <= f(x) + c1 * gᵀ(x(α) - x).
/// Returns `Ok(None)` when no trial satisfies the condition or the
/// projected path stops moving.
pub fn projected_backtracking<O: ObjectiveFunction + ?Sized>(
    evaluator: &mut ObjectiveEvaluator<O>,
    bounds: &Bounds,
    x: &DVector<f64>,
    f_current: f64,
    gradient: &DVector<f64>,
    direction: &DVector<f64>,
    params: &LineSearchParams,
) -> Result<Option<LineSearchResult>, OptimizationError> {
    let mut alpha = params.initial_step;
    let mut evaluations = 0_usize;

    for k in 0..params.max_backtracks {
        if alpha < params.min_step {
            break;
        }
        let x_new = bounds.clip(&(x + direction * alpha));
        let displacement = &x_new - x;
        if displacement.amax() == 0.0 {
            // projection swallowed the whole step
            debug!("line search: projected step vanished at alpha = {:e}", alpha);
            break;
        }
        let predicted_decrease = gradient.dot(&displacement);
        let f_new = evaluator.value(&x_new)?;
        evaluations += 1;

        if predicted_decrease < 0.0 && f_new <= f_current + params.c1 * predicted_decrease {
            return Ok(Some(LineSearchResult {
                alpha,
                x_new,
                f_new,
                full_step: k == 0,
            }));
        }
        alpha *= params.shrink_factor;
    }
    debug!(
        "line search failed after {} evaluations, last alpha = {:e}",
        evaluations, alpha
    );
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numerical::optimization::objective::SimpleObjectiveFunction;
    use approx::assert_relative_eq;

    fn quadratic() -> SimpleObjectiveFunction<
        impl Fn(&DVector<f64>) -> f64,
        impl Fn(&DVector<f64>) -> DVector<f64>,
    > {
        // minimum at (2, -1)
        SimpleObjectiveFunction::new(
            |x: &DVector<f64>| (x[0] - 2.0).powi(2) + (x[1] + 1.0).powi(2),
            |x: &DVector<f64>| DVector::from_vec(vec![2.0 * (x[0] - 2.0), 2.0 * (x[1] + 1.0)]),
        )
    }

    #[test]
    fn test_full_newton_like_step_accepted() {
        let obj = quadratic();
        let mut eval = ObjectiveEvaluator::new(&obj, 2);
        let bounds = Bounds::unbounded(2).unwrap();
        let x = DVector::from_vec(vec![0.0, 0.0]);
        let g = obj.gradient(&x);
        let d = -&g * 0.5;
        let res = projected_backtracking(
            &mut eval,
            &bounds,
            &x,
            obj.value(&x),
            &g,
            &d,
            &LineSearchParams::default(),
        )
        .unwrap()
        .unwrap();
        assert!(res.full_step);
        assert_relative_eq!(res.x_new[0], 2.0, epsilon = 1e-14);
        assert_relative_eq!(res.x_new[1], -1.0, epsilon = 1e-14);
        assert_relative_eq!(res.f_new, 0.0, epsilon = 1e-14);
    }

    #[test]
    fn test_backtracking_on_overlong_step() {
        let obj = quadratic();
        let mut eval = ObjectiveEvaluator::new(&obj, 2);
        let bounds = Bounds::unbounded(2).unwrap();
        let x = DVector::from_vec(vec![0.0, 0.0]);
        let g = obj.gradient(&x);
        let d = -&g * 10.0;
        let res = projected_backtracking(
            &mut eval,
            &bounds,
            &x,
            obj.value(&x),
            &g,
            &d,
            &LineSearchParams::default(),
        )
        .unwrap()
        .unwrap();
        assert!(!res.full_step);
        assert!(res.alpha < 1.0);
        assert!(res.f_new < obj.value(&x));
        // one evaluation per trial, the last one accepted
        let trials = (res.alpha.log2() / LineSearchParams::default().shrink_factor.log2()).round() as usize + 1;
        assert_eq!(eval.value_evaluations, trials);
    }

    #[test]
    fn test_projection_keeps_trial_inside_box() {
        let obj = quadratic();
        let mut eval = ObjectiveEvaluator::new(&obj, 2);
        let bounds = Bounds::new(
            DVector::from_vec(vec![0.0, 0.0]),
            DVector::from_vec(vec![1.0, 1.0]),
        )
        .unwrap();
        let x = DVector::from_vec(vec![0.5, 0.5]);
        let g = obj.gradient(&x);
        let d = -&g;
        let res = projected_backtracking(
            &mut eval,
            &bounds,
            &x,
            obj.value(&x),
            &g,
            &d,
            &LineSearchParams::default(),
        )
        .unwrap()
        .unwrap();
        assert!(bounds.contains(&res.x_new));
        assert_eq!(res.x_new, DVector::from_vec(vec![1.0, 0.0]));
    }

    #[test]
    fn test_ascent_direction_fails() {
        let obj = quadratic();
        let mut eval = ObjectiveEvaluator::new(&obj, 2);
        let bounds = Bounds::unbounded(2).unwrap();
        let x = DVector::from_vec(vec![0.0, 0.0]);
        let g = obj.gradient(&x);
        let res = projected_backtracking(
            &mut eval,
            &bounds,
            &x,
            obj.value(&x),
            &g,
            &g,
            &LineSearchParams::default(),
        )
        .unwrap();
        assert!(res.is_none());
    }

    #[test]
    fn test_params_validation() {
        let params = LineSearchParams {
            shrink_factor: 1.5,
            ..LineSearchParams::default()
        };
        assert!(matches!(
            params.validate(),
            Err(OptimizationError::InvalidParameters(_))
        ));
        assert!(LineSearchParams::default().validate().is_ok());
    }
}
