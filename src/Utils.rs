//! different utility modules used throughout the project
/// logger setup shared by the solvers
pub mod logger;
