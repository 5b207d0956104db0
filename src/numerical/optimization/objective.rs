use crate::numerical::optimization::errors::OptimizationError;
use nalgebra::{DMatrix, DVector};

/// Trait for a differentiable scalar objective f: R^n -> R
pub trait ObjectiveFunction {
    /// Evaluate the objective at point x
    fn value(&self, x: &DVector<f64>) -> f64;

    /// Evaluate the gradient at point x
    fn gradient(&self, x: &DVector<f64>) -> DVector<f64>;

    /// Evaluate the Hessian at point x (optional)
    fn hessian(&self, _x: &DVector<f64>) -> Option<DMatrix<f64>> {
        None
    }

    /// Get function name for debugging/logging
    fn name(&self) -> &str {
        "unnamed_objective"
    }
}

type HessianFn = Box<dyn Fn(&DVector<f64>) -> DMatrix<f64>>;

/// Objective built from a value closure and a gradient closure,
/// with an optional Hessian closure
pub struct SimpleObjectiveFunction<F, G>
where
    F: Fn(&DVector<f64>) -> f64,
    G: Fn(&DVector<f64>) -> DVector<f64>,
{
    value_func: F,
    gradient_func: G,
    hessian_func: Option<HessianFn>,
    name: String,
}

impl<F, G> SimpleObjectiveFunction<F, G>
where
    F: Fn(&DVector<f64>) -> f64,
    G: Fn(&DVector<f64>) -> DVector<f64>,
{
    pub fn new(value_func: F, gradient_func: G) -> Self {
        Self {
            value_func,
            gradient_func,
            hessian_func: None,
            name: "simple_objective".to_string(),
        }
    }

    pub fn with_hessian<H>(mut self, hessian_func: H) -> Self
    where
        H: Fn(&DVector<f64>) -> DMatrix<f64> + 'static,
    {
        self.hessian_func = Some(Box::new(hessian_func));
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }
}

impl<F, G> ObjectiveFunction for SimpleObjectiveFunction<F, G>
where
    F: Fn(&DVector<f64>) -> f64,
    G: Fn(&DVector<f64>) -> DVector<f64>,
{
    fn value(&self, x: &DVector<f64>) -> f64 {
        (self.value_func)(x)
    }

    fn gradient(&self, x: &DVector<f64>) -> DVector<f64> {
        (self.gradient_func)(x)
    }

    fn hessian(&self, x: &DVector<f64>) -> Option<DMatrix<f64>> {
        self.hessian_func.as_ref().map(|h| h(x))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Checked access to an objective: validates dimensions and finiteness of
/// every evaluation and keeps evaluation counters for the solve statistics.
pub struct ObjectiveEvaluator<'a, O: ObjectiveFunction + ?Sized> {
    objective: &'a O,
    dimension: usize,
    pub value_evaluations: usize,
    pub gradient_evaluations: usize,
    pub hessian_evaluations: usize,
}

impl<'a, O: ObjectiveFunction + ?Sized> ObjectiveEvaluator<'a, O> {
    pub fn new(objective: &'a O, dimension: usize) -> Self {
        Self {
            objective,
            dimension,
            value_evaluations: 0,
            gradient_evaluations: 0,
            hessian_evaluations: 0,
        }
    }

    pub fn name(&self) -> &str {
        self.objective.name()
    }

    fn check_input(&self, x: &DVector<f64>) -> Result<(), OptimizationError> {
        if x.len() != self.dimension {
            return Err(OptimizationError::DimensionMismatch {
                context: "objective input",
                expected: self.dimension,
                found: x.len(),
            });
        }
        Ok(())
    }

    pub fn value(&mut self, x: &DVector<f64>) -> Result<f64, OptimizationError> {
        self.check_input(x)?;
        let value = self.objective.value(x);
        self.value_evaluations += 1;
        if !value.is_finite() {
            return Err(OptimizationError::NonFiniteEvaluation {
                context: "objective value",
                value,
            });
        }
        Ok(value)
    }

    pub fn gradient(&mut self, x: &DVector<f64>) -> Result<DVector<f64>, OptimizationError> {
        self.check_input(x)?;
        let gradient = self.objective.gradient(x);
        self.gradient_evaluations += 1;
        if gradient.len() != self.dimension {
            return Err(OptimizationError::DimensionMismatch {
                context: "gradient",
                expected: self.dimension,
                found: gradient.len(),
            });
        }
        if let Some(bad) = gradient.iter().find(|g| !g.is_finite()) {
            return Err(OptimizationError::NonFiniteEvaluation {
                context: "gradient",
                value: *bad,
            });
        }
        Ok(gradient)
    }

    /// `Ok(None)` when the objective has no Hessian
    pub fn hessian(&mut self, x: &DVector<f64>) -> Result<Option<DMatrix<f64>>, OptimizationError> {
        self.check_input(x)?;
        let Some(hessian) = self.objective.hessian(x) else {
            return Ok(None);
        };
        self.hessian_evaluations += 1;
        let (rows, cols) = hessian.shape();
        if rows != self.dimension || cols != self.dimension {
            return Err(OptimizationError::DimensionMismatch {
                context: "hessian",
                expected: self.dimension,
                found: if rows != self.dimension { rows } else { cols },
            });
        }
        if let Some(bad) = hessian.iter().find(|h| !h.is_finite()) {
            return Err(OptimizationError::NonFiniteEvaluation {
                context: "hessian",
                value: *bad,
            });
        }
        Ok(Some(hessian))
    }
}
