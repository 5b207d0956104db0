use crate::Utils::logger::init_logger;
use crate::numerical::optimization::bounds::{ActiveSet, Bounds};
use crate::numerical::optimization::errors::OptimizationError;
use crate::numerical::optimization::line_search::{
    LineSearchParams, LineSearchResult, projected_backtracking,
};
use crate::numerical::optimization::objective::{ObjectiveEvaluator, ObjectiveFunction};
use log::{Level, debug, info, log_enabled, warn};
use nalgebra::{DMatrix, DVector};
use strum_macros::Display;
use tabled::{builder::Builder, settings::Style};

/// consecutive low-improvement iterations that count as convergence
pub const OBJECTIVE_STALL_ITERATIONS: usize = 5;

/// the step test only accepts points whose scaled projected gradient is
/// below this multiple of gradient_tolerance
pub const STEP_TEST_GRADIENT_FACTOR: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TerminationReason {
    Converged,
    MaxIterationsReached,
    /// no admissible step along the projected path
    BoundaryStall,
}

/// Which stopping test fired for a `Converged` result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ConvergenceCriterion {
    Gradient,
    Step,
    Objective,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MinimizationResult {
    pub minimizing_point: DVector<f64>,
    pub function_value: f64,
    pub gradient: DVector<f64>,
    /// scaled projected gradient at the returned point
    pub projected_gradient_measure: f64,
    pub iterations: usize,
    pub function_evaluations: usize,
    pub gradient_evaluations: usize,
    pub hessian_evaluations: usize,
    pub reason: TerminationReason,
    pub criterion: Option<ConvergenceCriterion>,
    /// coordinates pinned at a bound at the returned point
    pub active_coordinates: Vec<usize>,
}

impl MinimizationResult {
    pub fn converged(&self) -> bool {
        self.reason == TerminationReason::Converged
    }

    pub fn statistics_table(&self) -> String {
        let criterion = self
            .criterion
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string());
        let mut builder = Builder::default();
        builder.push_record(vec!["quantity".to_string(), "value".to_string()]);
        builder.push_record(vec!["termination".to_string(), self.reason.to_string()]);
        builder.push_record(vec!["criterion".to_string(), criterion]);
        builder.push_record(vec!["iterations".to_string(), self.iterations.to_string()]);
        builder.push_record(vec![
            "function evaluations".to_string(),
            self.function_evaluations.to_string(),
        ]);
        builder.push_record(vec![
            "gradient evaluations".to_string(),
            self.gradient_evaluations.to_string(),
        ]);
        builder.push_record(vec![
            "hessian evaluations".to_string(),
            self.hessian_evaluations.to_string(),
        ]);
        builder.push_record(vec![
            "objective value".to_string(),
            format!("{:.6e}", self.function_value),
        ]);
        builder.push_record(vec![
            "projected gradient".to_string(),
            format!("{:.3e}", self.projected_gradient_measure),
        ]);
        builder.push_record(vec![
            "active coordinates".to_string(),
            format!("{:?}", self.active_coordinates),
        ]);
        let mut table = builder.build();
        table.with(Style::modern_rounded());
        table.to_string()
    }
}

/// Configuration for the BFGS-B minimizer
#[derive(Debug, Clone, PartialEq)]
pub struct BfgsBConfig {
    pub gradient_tolerance: f64,
    pub step_tolerance: f64,
    pub objective_tolerance: f64,
    pub max_iterations: usize,
    pub line_search: LineSearchParams,
    /// secant pairs with sᵀy <= curvature_epsilon ‖s‖‖y‖ are skipped
    pub curvature_epsilon: f64,
    pub loglevel: Option<String>,
    pub log_to_file: bool,
}

impl Default for BfgsBConfig {
    fn default() -> Self {
        Self {
            gradient_tolerance: 1e-5,
            step_tolerance: 1e-5,
            objective_tolerance: 1e-5,
            max_iterations: 1000,
            line_search: LineSearchParams::default(),
            curvature_epsilon: 1e-10,
            loglevel: None,
            log_to_file: false,
        }
    }
}

impl BfgsBConfig {
    pub fn validate(&self) -> Result<(), OptimizationError> {
        for (name, tol) in [
            ("gradient_tolerance", self.gradient_tolerance),
            ("step_tolerance", self.step_tolerance),
            ("objective_tolerance", self.objective_tolerance),
        ] {
            if !(tol >= 0.0 && tol.is_finite()) {
                return Err(OptimizationError::InvalidParameters(format!(
                    "{} must be finite and non-negative, got {}",
                    name, tol
                )));
            }
        }
        if self.max_iterations == 0 {
            return Err(OptimizationError::InvalidParameters(
                "max_iterations must be positive".to_string(),
            ));
        }
        if !(self.curvature_epsilon >= 0.0 && self.curvature_epsilon.is_finite()) {
            return Err(OptimizationError::InvalidParameters(format!(
                "curvature_epsilon must be finite and non-negative, got {}",
                self.curvature_epsilon
            )));
        }
        self.line_search.validate()
    }
}

/// Bound-constrained BFGS (gradient projection + quasi-Newton on the free subspace)
///
/// Each iteration:
/// 1) splits the coordinates into free and active ones (see [`ActiveSet`]): a
///    coordinate is active when it sits on a bound and the gradient pushes it
///    further out of the box;
/// 2) builds the direction d_F = -H_FF g_F from the inverse Hessian
///    approximation H restricted to the free coordinates, d_A = 0;
/// 3) backtracks along the projected path P(x + αd) until the Armijo
///    condition holds, so iterates never leave the box;
/// 4) updates H with the BFGS secant formula using the step and gradient
///    difference restricted to the free coordinates, skipping the update when
///    sᵀy is not positive enough to keep H positive definite.
///
/// Stopping tests (any of them is sufficient):
///  - scaled projected gradient max_i |pg_i| max(|x_i|,1) / max(|f|,1) < gradient_tolerance
///  - relative step max_i |s_i| / max(|x_i|,1) < step_tolerance after a full (α = 1) step
///    that left the active set unchanged, with the scaled projected gradient
///    below `STEP_TEST_GRADIENT_FACTOR` * gradient_tolerance
///  - relative improvement (f_prev - f) <= objective_tolerance |f| for
///    `OBJECTIVE_STALL_ITERATIONS` iterations in a row
///
/// Example
/// ```
/// use RustedOptim::numerical::optimization::bfgs_b::{BfgsBMinimizer, TerminationReason};
/// use RustedOptim::numerical::optimization::objective::SimpleObjectiveFunction;
/// use nalgebra::DVector;
/// let obj = SimpleObjectiveFunction::new(
///     |x: &DVector<f64>| (x[0] - 3.0).powi(2) + (x[1] + 1.0).powi(2),
///     |x: &DVector<f64>| DVector::from_vec(vec![2.0 * (x[0] - 3.0), 2.0 * (x[1] + 1.0)]),
/// );
/// let solver = BfgsBMinimizer::new(1e-8, 1e-8, 1e-8, 100);
/// let lower = DVector::from_vec(vec![0.0, 0.0]);
/// let upper = DVector::from_vec(vec![2.0, 2.0]);
/// let guess = DVector::from_vec(vec![1.0, 1.0]);
/// let result = solver.find_minimum(&obj, &lower, &upper, &guess).unwrap();
/// assert_eq!(result.reason, TerminationReason::Converged);
/// assert!((result.minimizing_point[0] - 2.0).abs() < 1e-8);
/// assert!(result.minimizing_point[1].abs() < 1e-8);
/// ```
#[derive(Debug, Clone)]
pub struct BfgsBMinimizer {
    config: BfgsBConfig,
}

impl Default for BfgsBMinimizer {
    fn default() -> Self {
        Self::with_config(BfgsBConfig::default())
    }
}

impl BfgsBMinimizer {
    pub fn new(
        gradient_tolerance: f64,
        step_tolerance: f64,
        objective_tolerance: f64,
        max_iterations: usize,
    ) -> Self {
        Self {
            config: BfgsBConfig {
                gradient_tolerance,
                step_tolerance,
                objective_tolerance,
                max_iterations,
                ..BfgsBConfig::default()
            },
        }
    }

    pub fn with_config(config: BfgsBConfig) -> Self {
        Self { config }
    }

    pub fn with_line_search(mut self, line_search: LineSearchParams) -> Self {
        self.config.line_search = line_search;
        self
    }

    pub fn with_loglevel(mut self, loglevel: &str) -> Self {
        self.config.loglevel = Some(loglevel.to_string());
        self
    }

    pub fn config(&self) -> &BfgsBConfig {
        &self.config
    }

    /// Minimize `objective` over the box [lower_bound, upper_bound] starting
    /// from `initial_guess` (clamped into the box).
    pub fn find_minimum<O: ObjectiveFunction + ?Sized>(
        &self,
        objective: &O,
        lower_bound: &DVector<f64>,
        upper_bound: &DVector<f64>,
        initial_guess: &DVector<f64>,
    ) -> Result<MinimizationResult, OptimizationError> {
        let bounds = Bounds::new(lower_bound.clone(), upper_bound.clone())?;
        self.find_minimum_in(objective, &bounds, initial_guess)
    }

    /// Same as [`find_minimum`](Self::find_minimum) for an already validated box
    pub fn find_minimum_in<O: ObjectiveFunction + ?Sized>(
        &self,
        objective: &O,
        bounds: &Bounds,
        initial_guess: &DVector<f64>,
    ) -> Result<MinimizationResult, OptimizationError> {
        self.config.validate()?;
        if self.config.loglevel.is_some() {
            init_logger(self.config.loglevel.as_deref(), self.config.log_to_file)?;
        }
        let result = self.solver(objective, bounds, initial_guess)?;
        if log_enabled!(Level::Info) {
            info!(
                "\n \n BFGS-B finished for {}: \n {}",
                objective.name(),
                result.statistics_table()
            );
        }
        Ok(result)
    }

    fn solver<O: ObjectiveFunction + ?Sized>(
        &self,
        objective: &O,
        bounds: &Bounds,
        initial_guess: &DVector<f64>,
    ) -> Result<MinimizationResult, OptimizationError> {
        let n = bounds.dimension();
        let cfg = &self.config;
        let mut evaluator = ObjectiveEvaluator::new(objective, n);

        let mut x = bounds.clamp_initial_guess(initial_guess)?;
        let mut f = evaluator.value(&x)?;
        let mut g = evaluator.gradient(&x)?;
        let (mut h_inv, mut scaled) = initial_inverse_hessian(&mut evaluator, &x)?;

        let mut active = ActiveSet::identify(&x, &g, bounds);
        let mut measure = scaled_projected_gradient(&x, f, &active.projected_gradient(&g));
        info!(
            "BFGS-B start: n = {}, f(x0) = {:e}, projected gradient = {:e}, free coordinates = {}",
            n,
            f,
            measure,
            active.n_free()
        );

        // sᵀy / yᵀy of the latest accepted pair, used for freshly freed coordinates
        let mut curvature_scale = 1.0;
        let mut iterations = 0;
        let mut stalled = 0;
        let mut reason = TerminationReason::MaxIterationsReached;
        let mut criterion = None;

        if measure < cfg.gradient_tolerance {
            reason = TerminationReason::Converged;
            criterion = Some(ConvergenceCriterion::Gradient);
        }

        while criterion.is_none() && iterations < cfg.max_iterations {
            iterations += 1;
            let projected_gradient = active.projected_gradient(&g);
            let mut direction = active.free_subspace_direction(&h_inv, &g);
            let mut steepest = false;
            if direction.dot(&g) >= 0.0 {
                warn!(
                    "iteration {}: quasi-Newton direction is not a descent direction, resetting H",
                    iterations
                );
                h_inv = DMatrix::identity(n, n);
                scaled = false;
                direction = -&projected_gradient;
                steepest = true;
            }

            let mut search = projected_backtracking(
                &mut evaluator,
                bounds,
                &x,
                f,
                &g,
                &direction,
                &cfg.line_search,
            )?;
            if search.is_none() && !steepest {
                warn!(
                    "iteration {}: line search failed along quasi-Newton direction, retrying with projected steepest descent",
                    iterations
                );
                h_inv = DMatrix::identity(n, n);
                scaled = false;
                search = projected_backtracking(
                    &mut evaluator,
                    bounds,
                    &x,
                    f,
                    &g,
                    &(-&projected_gradient),
                    &cfg.line_search,
                )?;
            }
            let Some(LineSearchResult {
                alpha,
                x_new,
                f_new,
                full_step,
                ..
            }) = search
            else {
                warn!(
                    "iteration {}: no admissible step along the projected path, stopping",
                    iterations
                );
                reason = TerminationReason::BoundaryStall;
                break;
            };

            let g_new = evaluator.gradient(&x_new)?;
            let step = &x_new - &x;
            let s = active.mask(&step);
            let y = active.mask(&(&g_new - &g));
            let sy = s.dot(&y);
            if sy > cfg.curvature_epsilon * s.norm() * y.norm() && sy > 0.0 {
                curvature_scale = sy / y.dot(&y);
                if !scaled {
                    h_inv = DMatrix::identity(n, n) * curvature_scale;
                    scaled = true;
                }
                bfgs_update(&mut h_inv, &s, &y, sy);
            } else {
                debug!(
                    "iteration {}: curvature condition failed (sᵀy = {:e}), update skipped",
                    iterations, sy
                );
            }

            let relative_step = relative_step(&step, &x);
            let improvement = f - f_new;
            x = x_new;
            f = f_new;
            g = g_new;
            let next_active = ActiveSet::identify(&x, &g, bounds);
            let switched = active.switched_coordinates(&next_active);
            if !switched.is_empty() {
                // rows of H for these coordinates were not updated while they were
                // active, or carry couplings that no longer apply
                debug!(
                    "iteration {}: coordinates {:?} switched between free and active, resetting their rows of H",
                    iterations, switched
                );
                reset_coordinates(&mut h_inv, &switched, curvature_scale);
            }
            active = next_active;
            measure = scaled_projected_gradient(&x, f, &active.projected_gradient(&g));
            debug!(
                "iteration {}: f = {:e}, alpha = {:e}, step = {:e}, projected gradient = {:e}, free = {}",
                iterations,
                f,
                alpha,
                relative_step,
                measure,
                active.n_free()
            );

            if improvement <= cfg.objective_tolerance * f.abs() {
                stalled += 1;
            } else {
                stalled = 0;
            }

            if measure < cfg.gradient_tolerance {
                criterion = Some(ConvergenceCriterion::Gradient);
            } else if full_step
                && switched.is_empty()
                && relative_step < cfg.step_tolerance
                && measure < STEP_TEST_GRADIENT_FACTOR * cfg.gradient_tolerance
            {
                criterion = Some(ConvergenceCriterion::Step);
            } else if stalled >= OBJECTIVE_STALL_ITERATIONS {
                criterion = Some(ConvergenceCriterion::Objective);
            }
            if criterion.is_some() {
                reason = TerminationReason::Converged;
            }
        }

        if reason == TerminationReason::MaxIterationsReached {
            warn!(
                "BFGS-B reached the iteration limit ({}) with projected gradient {:e}",
                cfg.max_iterations, measure
            );
        }

        Ok(MinimizationResult {
            minimizing_point: x,
            function_value: f,
            gradient: g,
            projected_gradient_measure: measure,
            iterations,
            function_evaluations: evaluator.value_evaluations,
            gradient_evaluations: evaluator.gradient_evaluations,
            hessian_evaluations: evaluator.hessian_evaluations,
            reason,
            criterion,
            active_coordinates: active.active_indices(),
        })
    }
}

/// Inverse of the user Hessian at x0 when it is available and SPD,
/// identity otherwise. The flag tells whether H is already scaled.
fn initial_inverse_hessian<O: ObjectiveFunction + ?Sized>(
    evaluator: &mut ObjectiveEvaluator<O>,
    x: &DVector<f64>,
) -> Result<(DMatrix<f64>, bool), OptimizationError> {
    let n = x.len();
    let Some(hessian) = evaluator.hessian(x)? else {
        return Ok((DMatrix::identity(n, n), false));
    };
    let asymmetry = (&hessian - hessian.transpose()).amax();
    if asymmetry > 1e-10 * hessian.amax().max(1.0) {
        warn!("Hessian at the start point is not symmetric, starting from identity");
        return Ok((DMatrix::identity(n, n), false));
    }
    match hessian.cholesky() {
        Some(cholesky) => {
            info!("inverse Hessian approximation seeded from the objective Hessian");
            Ok((cholesky.inverse(), true))
        }
        None => {
            warn!("Hessian at the start point is not positive definite, starting from identity");
            Ok((DMatrix::identity(n, n), false))
        }
    }
}

/// H+ = (I - ρ s yᵀ) H (I - ρ y sᵀ) + ρ s sᵀ, ρ = 1 / sᵀy
fn bfgs_update(h_inv: &mut DMatrix<f64>, s: &DVector<f64>, y: &DVector<f64>, sy: f64) {
    let rho = 1.0 / sy;
    let hy = &*h_inv * y;
    let yhy = y.dot(&hy);
    let ss = s * s.transpose();
    let cross = &hy * s.transpose() + s * hy.transpose();
    *h_inv += ss * (rho * rho * yhy + rho) - cross * rho;
}

/// Zero the rows and columns of `indices` and put `scale` on their diagonal.
/// Keeps H positive definite.
fn reset_coordinates(h_inv: &mut DMatrix<f64>, indices: &[usize], scale: f64) {
    for &i in indices {
        h_inv.row_mut(i).fill(0.0);
        h_inv.column_mut(i).fill(0.0);
        h_inv[(i, i)] = scale;
    }
}

fn scaled_projected_gradient(x: &DVector<f64>, f: f64, projected_gradient: &DVector<f64>) -> f64 {
    let normalizer = f.abs().max(1.0);
    projected_gradient
        .iter()
        .zip(x.iter())
        .map(|(pg, xi)| (pg * xi.abs().max(1.0) / normalizer).abs())
        .fold(0.0, f64::max)
}

fn relative_step(step: &DVector<f64>, x_prev: &DVector<f64>) -> f64 {
    step.iter()
        .zip(x_prev.iter())
        .map(|(s, xi)| s.abs() / xi.abs().max(1.0))
        .fold(0.0, f64::max)
}
