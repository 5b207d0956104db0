/// error type shared by the root finder and the minimizer
pub mod errors;
/// objective function trait, closure-based objective and checked evaluator
pub mod objective;
/// box constraints, projection onto the box and active set identification
pub mod bounds;
/// projected backtracking (Armijo) line search
pub mod line_search;
/// bound-constrained quasi-Newton minimizer (BFGS-B)
pub mod bfgs_b;
/// using Bisection with optional bracket expansion to find a root of a scalar function of one variable
pub mod bisection;
/// smooth test problems with known minimizers (Rosenbrock, Booth, ...)
pub mod test_problems;
