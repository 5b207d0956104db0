use std::fmt;

/// Error types shared by the root finder and the bound-constrained minimizer
#[derive(Debug, Clone, PartialEq)]
pub enum OptimizationError {
    /// gradient/Hessian/bounds length disagrees with the decision variable
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        found: usize,
    },
    /// the bracket could not be made to straddle a sign change
    NoSignChange {
        lower: f64,
        upper: f64,
        f_lower: f64,
        f_upper: f64,
    },
    /// bracket expansion ran past the internal safety bound
    MaxExpansionExceeded { steps: usize },
    InvalidBounds(String),
    /// objective, gradient or Hessian returned NaN or inf
    NonFiniteEvaluation { context: &'static str, value: f64 },
    InvalidParameters(String),
    /// bisection did not reach the requested tolerance
    MaxIterationsExceeded { iterations: usize },
    Logger(String),
}

impl fmt::Display for OptimizationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OptimizationError::DimensionMismatch {
                context,
                expected,
                found,
            } => write!(
                f,
                "Dimension mismatch in {}: expected {}, found {}",
                context, expected, found
            ),
            OptimizationError::NoSignChange {
                lower,
                upper,
                f_lower,
                f_upper,
            } => write!(
                f,
                "No sign change in bracket [{}, {}]: f(lower) = {}, f(upper) = {}",
                lower, upper, f_lower, f_upper
            ),
            OptimizationError::MaxExpansionExceeded { steps } => {
                write!(f, "Bracket expansion exceeded safety bound after {} steps", steps)
            }
            OptimizationError::InvalidBounds(msg) => write!(f, "Invalid bounds: {}", msg),
            OptimizationError::NonFiniteEvaluation { context, value } => {
                write!(f, "Non-finite evaluation in {}: {}", context, value)
            }
            OptimizationError::InvalidParameters(msg) => write!(f, "Invalid parameters: {}", msg),
            OptimizationError::MaxIterationsExceeded { iterations } => {
                write!(f, "Maximum iterations exceeded ({})", iterations)
            }
            OptimizationError::Logger(msg) => write!(f, "Logger error: {}", msg),
        }
    }
}

impl std::error::Error for OptimizationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = OptimizationError::DimensionMismatch {
            context: "gradient",
            expected: 2,
            found: 3,
        };
        assert_eq!(err.to_string(), "Dimension mismatch in gradient: expected 2, found 3");

        let err = OptimizationError::MaxExpansionExceeded { steps: 12 };
        assert!(err.to_string().contains("12"));

        let err = OptimizationError::InvalidBounds("lower[0] > upper[0]".to_string());
        assert_eq!(err.to_string(), "Invalid bounds: lower[0] > upper[0]");
    }

    #[test]
    fn test_error_is_std_error() {
        let err: Box<dyn std::error::Error> = Box::new(OptimizationError::NonFiniteEvaluation {
            context: "objective value",
            value: f64::NAN,
        });
        assert!(err.to_string().starts_with("Non-finite evaluation in objective value"));
    }
}
