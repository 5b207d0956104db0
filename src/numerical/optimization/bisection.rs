use crate::Utils::logger::init_logger;
use crate::numerical::optimization::errors::OptimizationError;
use log::{debug, info, warn};
use std::cmp::Ordering;

/// Hard ceiling on bracket expansion steps, whatever the configured budget
pub const EXPANSION_SAFETY_LIMIT: usize = 200;

/// Configuration for the bisection root finder
#[derive(Debug, Clone, PartialEq)]
pub struct BisectionConfig {
    /// bracket width tolerance near zero and residual tolerance |f(root)|
    pub absolute_tolerance: f64,
    /// bracket width tolerance relative to |root| away from zero
    pub relative_tolerance: f64,
    /// 1.0 disables expansion of the lower end
    pub lower_expansion_factor: f64,
    /// 1.0 disables expansion of the upper end
    pub upper_expansion_factor: f64,
    pub max_expansion_steps: usize,
    pub max_iterations: usize,
    pub loglevel: Option<String>,
    pub log_to_file: bool,
}

impl Default for BisectionConfig {
    fn default() -> Self {
        Self {
            absolute_tolerance: 1e-8,
            relative_tolerance: 1e-8,
            lower_expansion_factor: 1.0,
            upper_expansion_factor: 1.0,
            max_expansion_steps: 10,
            max_iterations: 200,
            loglevel: None,
            log_to_file: false,
        }
    }
}

impl BisectionConfig {
    pub fn validate(&self) -> Result<(), OptimizationError> {
        for (name, tol) in [
            ("absolute_tolerance", self.absolute_tolerance),
            ("relative_tolerance", self.relative_tolerance),
        ] {
            if !(tol > 0.0 && tol.is_finite()) {
                return Err(OptimizationError::InvalidParameters(format!(
                    "{} must be finite and positive, got {}",
                    name, tol
                )));
            }
        }
        for (name, factor) in [
            ("lower_expansion_factor", self.lower_expansion_factor),
            ("upper_expansion_factor", self.upper_expansion_factor),
        ] {
            if !(factor >= 1.0 && factor.is_finite()) {
                return Err(OptimizationError::InvalidParameters(format!(
                    "{} must be finite and >= 1, got {}",
                    name, factor
                )));
            }
        }
        if self.max_iterations == 0 {
            return Err(OptimizationError::InvalidParameters(
                "max_iterations must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Result of a root search
#[derive(Debug, Clone, PartialEq)]
pub struct RootFindResult {
    pub root: f64,
    pub function_value: f64,
    /// bracket whose midpoint is the root
    pub bracket: (f64, f64),
    pub iterations: usize,
    pub expansion_steps: usize,
}

#[derive(Debug, Clone, Copy)]
struct Bracket {
    lower: f64,
    upper: f64,
    f_lower: f64,
    f_upper: f64,
}

impl Bracket {
    /// opposite signs, or exactly one end is a zero of f
    fn straddles(&self) -> bool {
        sign(self.f_lower) != sign(self.f_upper)
    }

    fn no_sign_change(&self) -> OptimizationError {
        OptimizationError::NoSignChange {
            lower: self.lower,
            upper: self.upper,
            f_lower: self.f_lower,
            f_upper: self.f_upper,
        }
    }
}

/// zero is a sign class of its own
fn sign(value: f64) -> Ordering {
    value.partial_cmp(&0.0).unwrap_or(Ordering::Equal)
}

fn evaluate<F: Fn(f64) -> f64>(function: &F, x: f64) -> Result<f64, OptimizationError> {
    let value = function(x);
    if !value.is_finite() {
        return Err(OptimizationError::NonFiniteEvaluation {
            context: "root finder function",
            value,
        });
    }
    Ok(value)
}

/// Bisection root finder with optional outward expansion of the initial bracket
///
/// When f(lower) and f(upper) share a sign and an expansion factor k > 1 is
/// set, the end with the smaller |f| is pushed outward
/// (lower - k(upper - lower) or upper + k(upper - lower)) until the first
/// interval with a sign change is found. Then plain bisection runs until the
/// bracket is narrower than the x tolerance and |f(mid)| <= absolute_tolerance.
///
/// If f is identically zero on a region next to the root, the result is the
/// edge of that region closest to the initial bracket.
///
/// Example
/// ```
/// use RustedOptim::numerical::optimization::bisection::BisectionRootFinder;
/// let solver = BisectionRootFinder::new(1e-6, 1e-6).with_expansion_factors(2.0, 2.0);
/// let root = solver.find_root(|x| x * x - 2.0, 3.0, 4.0).unwrap();
/// assert!((root - 2f64.sqrt()).abs() < 1e-6);
/// ```
#[derive(Debug, Clone)]
pub struct BisectionRootFinder {
    config: BisectionConfig,
}

impl Default for BisectionRootFinder {
    fn default() -> Self {
        Self::with_config(BisectionConfig::default())
    }
}

impl BisectionRootFinder {
    pub fn new(absolute_tolerance: f64, relative_tolerance: f64) -> Self {
        Self {
            config: BisectionConfig {
                absolute_tolerance,
                relative_tolerance,
                ..BisectionConfig::default()
            },
        }
    }

    pub fn with_config(config: BisectionConfig) -> Self {
        Self { config }
    }

    pub fn with_expansion_factors(mut self, lower: f64, upper: f64) -> Self {
        self.config.lower_expansion_factor = lower;
        self.config.upper_expansion_factor = upper;
        self
    }

    pub fn with_max_expansion_steps(mut self, max_expansion_steps: usize) -> Self {
        self.config.max_expansion_steps = max_expansion_steps;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    pub fn with_loglevel(mut self, loglevel: &str) -> Self {
        self.config.loglevel = Some(loglevel.to_string());
        self
    }

    pub fn config(&self) -> &BisectionConfig {
        &self.config
    }

    pub fn find_root<F>(&self, function: F, lower: f64, upper: f64) -> Result<f64, OptimizationError>
    where
        F: Fn(f64) -> f64,
    {
        Ok(self.find_root_detailed(function, lower, upper)?.root)
    }

    pub fn find_root_detailed<F>(
        &self,
        function: F,
        lower: f64,
        upper: f64,
    ) -> Result<RootFindResult, OptimizationError>
    where
        F: Fn(f64) -> f64,
    {
        self.config.validate()?;
        if self.config.loglevel.is_some() {
            init_logger(self.config.loglevel.as_deref(), self.config.log_to_file)?;
        }
        if !lower.is_finite() || !upper.is_finite() {
            return Err(OptimizationError::InvalidBounds(format!(
                "bracket [{}, {}] is not finite",
                lower, upper
            )));
        }
        let (lower, upper) = if lower <= upper {
            (lower, upper)
        } else {
            (upper, lower)
        };
        info!("Bisection started on [{}, {}]", lower, upper);

        let f_lower = evaluate(&function, lower)?;
        if f_lower == 0.0 {
            return Ok(RootFindResult {
                root: lower,
                function_value: f_lower,
                bracket: (lower, upper),
                iterations: 0,
                expansion_steps: 0,
            });
        }
        let f_upper = evaluate(&function, upper)?;
        if f_upper == 0.0 {
            return Ok(RootFindResult {
                root: upper,
                function_value: f_upper,
                bracket: (lower, upper),
                iterations: 0,
                expansion_steps: 0,
            });
        }

        let initial = Bracket {
            lower,
            upper,
            f_lower,
            f_upper,
        };
        let (bracket, expansion_steps) = self.expand_bracket(&function, initial)?;
        self.bisect(&function, bracket, expansion_steps)
    }

    fn expand_bracket<F>(
        &self,
        function: &F,
        mut bracket: Bracket,
    ) -> Result<(Bracket, usize), OptimizationError>
    where
        F: Fn(f64) -> f64,
    {
        if bracket.straddles() {
            return Ok((bracket, 0));
        }
        let lower_factor = self.config.lower_expansion_factor;
        let upper_factor = self.config.upper_expansion_factor;
        let can_expand_lower = lower_factor > 1.0;
        let can_expand_upper = upper_factor > 1.0;
        if !can_expand_lower && !can_expand_upper {
            return Err(bracket.no_sign_change());
        }

        for step in 1..=self.config.max_expansion_steps {
            if step > EXPANSION_SAFETY_LIMIT {
                return Err(OptimizationError::MaxExpansionExceeded {
                    steps: EXPANSION_SAFETY_LIMIT,
                });
            }
            let width = bracket.upper - bracket.lower;
            // push out the end that is closer to a root
            let expand_lower = can_expand_lower
                && (!can_expand_upper || bracket.f_lower.abs() < bracket.f_upper.abs());
            if expand_lower {
                let new_lower = bracket.lower - lower_factor * width;
                if !new_lower.is_finite() {
                    return Err(OptimizationError::MaxExpansionExceeded { steps: step });
                }
                bracket.lower = new_lower;
                bracket.f_lower = evaluate(function, new_lower)?;
            } else {
                let new_upper = bracket.upper + upper_factor * width;
                if !new_upper.is_finite() {
                    return Err(OptimizationError::MaxExpansionExceeded { steps: step });
                }
                bracket.upper = new_upper;
                bracket.f_upper = evaluate(function, new_upper)?;
            }
            debug!(
                "expansion step {}: bracket [{}, {}], f = ({:e}, {:e})",
                step, bracket.lower, bracket.upper, bracket.f_lower, bracket.f_upper
            );
            if bracket.straddles() {
                info!(
                    "bracket [{}, {}] straddles a root after {} expansion steps",
                    bracket.lower, bracket.upper, step
                );
                return Ok((bracket, step));
            }
        }
        warn!(
            "no sign change after {} expansion steps",
            self.config.max_expansion_steps
        );
        Err(bracket.no_sign_change())
    }

    /// x tolerance: absolute near zero, otherwise the tighter of absolute and relative
    fn x_tolerance(&self, mid: f64) -> f64 {
        let scale = mid.abs();
        if scale < 1.0 {
            self.config.absolute_tolerance
        } else {
            self.config
                .absolute_tolerance
                .min(self.config.relative_tolerance * scale)
        }
    }

    fn bisect<F>(
        &self,
        function: &F,
        mut bracket: Bracket,
        expansion_steps: usize,
    ) -> Result<RootFindResult, OptimizationError>
    where
        F: Fn(f64) -> f64,
    {
        for iteration in 1..=self.config.max_iterations {
            let mid = 0.5 * (bracket.lower + bracket.upper);
            let f_mid = evaluate(function, mid)?;
            let result = RootFindResult {
                root: mid,
                function_value: f_mid,
                bracket: (bracket.lower, bracket.upper),
                iterations: iteration,
                expansion_steps,
            };

            if mid <= bracket.lower || mid >= bracket.upper {
                warn!(
                    "bracket [{}, {}] collapsed to floating point resolution, |f| = {:e}",
                    bracket.lower,
                    bracket.upper,
                    f_mid.abs()
                );
                return Ok(result);
            }
            let width = bracket.upper - bracket.lower;
            debug!(
                "iteration {}: x = {:.10}, f(x) = {:.2e}, interval = [{:.6}, {:.6}]",
                iteration, mid, f_mid, bracket.lower, bracket.upper
            );
            if width <= self.x_tolerance(mid) && f_mid.abs() <= self.config.absolute_tolerance {
                info!(
                    "Bisection converged to {} in {} iterations",
                    mid, iteration
                );
                return Ok(result);
            }

            let mid_sign = sign(f_mid);
            let upper_sign = sign(bracket.f_upper);
            let replace_lower = if mid_sign == sign(bracket.f_lower) {
                true
            } else if mid_sign == upper_sign {
                false
            } else if mid_sign == Ordering::Equal {
                // f(mid) == 0 with non-zero ends of opposite sign
                info!("Bisection hit an exact root at {}", mid);
                return Ok(result);
            } else {
                // one end is exactly zero and f(mid) is opposite to the other end:
                // drop the zero end, [other end, mid] holds the sign change
                upper_sign != Ordering::Equal
            };
            if replace_lower {
                bracket.lower = mid;
                bracket.f_lower = f_mid;
            } else {
                bracket.upper = mid;
                bracket.f_upper = f_mid;
            }
        }
        Err(OptimizationError::MaxIterationsExceeded {
            iterations: self.config.max_iterations,
        })
    }
}

/// Convenience function for quick usage
pub fn bisection_root<F>(function: F, a: f64, b: f64, tolerance: f64) -> Result<f64, OptimizationError>
where
    F: Fn(f64) -> f64,
{
    BisectionRootFinder::new(tolerance, tolerance).find_root(function, a, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    fn goes_flat_at_one(x: f64) -> f64 {
        if x < 1.0 { -3.0 * (x - 1.0) } else { 0.0 }
    }

    #[test]
    fn test_find_root_quadratic() {
        let solver = BisectionRootFinder::new(1e-3, 1e-3);
        let f = |x: f64| (x - 3.0) * (x - 4.0);

        let r1 = solver.find_root(f, 2.1, 3.9).unwrap();
        assert!(f(r1).abs() < 1e-3);
        assert!((r1 - 3.0).abs() < 1e-3);

        let r2 = solver.find_root(f, 2.1, 3.4).unwrap();
        assert!(f(r2).abs() < 1e-3);
        assert!((r2 - 3.0).abs() < 1e-3);
    }

    #[test]
    fn test_constant_zero_region_hits_first_zero_on_expansion() {
        let solver = BisectionRootFinder::new(1e-3, 1e-3).with_expansion_factors(2.0, 2.0);
        let r = solver.find_root(goes_flat_at_one, -1.0, 0.0).unwrap();
        assert!((r - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_constant_zero_region_hits_past_first_zero_on_expansion() {
        let solver = BisectionRootFinder::new(1e-3, 1e-3).with_expansion_factors(2.0, 2.0);
        let result = solver
            .find_root_detailed(goes_flat_at_one, -2.25, 0.0)
            .unwrap();
        assert!((result.root - 1.0).abs() < 1e-3);
        // the first expansion jumps straight into the flat region
        assert_eq!(result.expansion_steps, 1);
    }

    #[test]
    fn test_expansion_ending_on_a_zero_keeps_bracketing() {
        // the upper end expands exactly onto the root x = 4,
        // the first midpoint lies beyond the root x = 1
        let f = |x: f64| (x - 1.0) * (x - 4.0);
        let solver = BisectionRootFinder::new(1e-8, 1e-8).with_expansion_factors(4.0, 4.0);
        let result = solver.find_root_detailed(f, -1.0, 0.0).unwrap();
        assert_eq!(result.expansion_steps, 1);
        assert!(f(result.root).abs() <= 1e-8);
        assert_abs_diff_eq!(result.root, 1.0, epsilon = 1e-7);
    }

    #[test]
    fn test_trigonometric_tight_tolerance() {
        let solver = BisectionRootFinder::new(1e-12, 1e-12);
        let result = solver.find_root_detailed(|x: f64| x.sin(), 3.0, 4.0).unwrap();
        assert_abs_diff_eq!(result.root, PI, epsilon = 1e-11);
        assert!(result.iterations > 30);
        assert_eq!(result.expansion_steps, 0);
    }

    #[test]
    fn test_reversed_bracket_is_swapped() {
        let solver = BisectionRootFinder::new(1e-9, 1e-9);
        let root = solver.find_root(|x: f64| x * x - 4.0, 3.0, 0.0).unwrap();
        assert_abs_diff_eq!(root, 2.0, epsilon = 1e-8);
    }

    #[test]
    fn test_root_at_endpoint_returned_immediately() {
        let solver = BisectionRootFinder::new(1e-9, 1e-9);
        let result = solver
            .find_root_detailed(|x: f64| x - 2.0, 2.0, 5.0)
            .unwrap();
        assert_eq!(result.root, 2.0);
        assert_eq!(result.iterations, 0);
    }

    #[test]
    fn test_no_sign_change_without_expansion() {
        let solver = BisectionRootFinder::new(1e-6, 1e-6);
        let result = solver.find_root(|x: f64| x * x + 1.0, -1.0, 2.0);
        assert!(matches!(result, Err(OptimizationError::NoSignChange { .. })));
    }

    #[test]
    fn test_no_sign_change_after_budget() {
        let solver = BisectionRootFinder::new(1e-6, 1e-6)
            .with_expansion_factors(2.0, 2.0)
            .with_max_expansion_steps(5);
        let result = solver.find_root(|x: f64| x * x + 1.0, -1.0, 2.0);
        match result {
            Err(OptimizationError::NoSignChange { lower, upper, .. }) => {
                assert!(upper - lower > 3.0);
            }
            other => panic!("expected NoSignChange, got {:?}", other),
        }
    }

    #[test]
    fn test_expansion_overflow_is_reported() {
        let solver = BisectionRootFinder::new(1e-6, 1e-6)
            .with_expansion_factors(1e200, 1e200)
            .with_max_expansion_steps(50);
        let result = solver.find_root(|_x: f64| 1.0, 0.0, 1.0);
        assert!(matches!(
            result,
            Err(OptimizationError::MaxExpansionExceeded { .. })
        ));
    }

    #[test]
    fn test_expansion_safety_limit() {
        let solver = BisectionRootFinder::new(1e-6, 1e-6)
            .with_expansion_factors(1.0, 1.01)
            .with_max_expansion_steps(EXPANSION_SAFETY_LIMIT + 10);
        let result = solver.find_root(|_x: f64| 1.0, 0.0, 1.0);
        assert_eq!(
            result,
            Err(OptimizationError::MaxExpansionExceeded {
                steps: EXPANSION_SAFETY_LIMIT
            })
        );
    }

    #[test]
    fn test_lower_only_expansion() {
        let solver = BisectionRootFinder::new(1e-8, 1e-8).with_expansion_factors(3.0, 1.0);
        let root = solver.find_root(|x: f64| x + 10.0, 0.0, 1.0).unwrap();
        assert_abs_diff_eq!(root, -10.0, epsilon = 1e-7);
    }

    #[test]
    fn test_non_finite_evaluation() {
        let solver = BisectionRootFinder::new(1e-6, 1e-6);
        let result = solver.find_root(|x: f64| x.ln(), -1.0, 2.0);
        assert!(matches!(
            result,
            Err(OptimizationError::NonFiniteEvaluation { .. })
        ));
        let result = solver.find_root(|x: f64| x, f64::NAN, 2.0);
        assert!(matches!(result, Err(OptimizationError::InvalidBounds(_))));
    }

    #[test]
    fn test_iteration_limit() {
        let solver = BisectionRootFinder::new(1e-12, 1e-12).with_max_iterations(5);
        let result = solver.find_root(|x: f64| x - 0.3, 0.0, 1.0);
        assert_eq!(
            result,
            Err(OptimizationError::MaxIterationsExceeded { iterations: 5 })
        );
    }

    #[test]
    fn test_discontinuous_function_stops_at_resolution() {
        let solver = BisectionRootFinder::new(1e-12, 1e-12);
        let root = solver
            .find_root(|x: f64| if x < 0.3 { -1.0 } else { 1.0 }, 0.0, 1.0)
            .unwrap();
        assert_abs_diff_eq!(root, 0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_invalid_parameters() {
        let solver = BisectionRootFinder::new(0.0, 1e-3);
        assert!(matches!(
            solver.find_root(|x: f64| x, -1.0, 1.0),
            Err(OptimizationError::InvalidParameters(_))
        ));
        let solver = BisectionRootFinder::new(1e-3, 1e-3).with_expansion_factors(0.5, 2.0);
        assert!(matches!(
            solver.find_root(|x: f64| x, -1.0, 1.0),
            Err(OptimizationError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_repeated_calls_are_identical() {
        let solver = BisectionRootFinder::new(1e-3, 1e-3).with_expansion_factors(2.0, 2.0);
        let a = solver.find_root_detailed(goes_flat_at_one, -2.25, 0.0).unwrap();
        let b = solver.find_root_detailed(goes_flat_at_one, -2.25, 0.0).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_convenience_function() {
        let root = bisection_root(|x: f64| x * x * x - x - 1.0, 1.0, 2.0, 1e-10).unwrap();
        assert_abs_diff_eq!(root, 1.324717957244746, epsilon = 1e-9);
    }
}
