/// root finding and bound-constrained minimization
pub mod optimization;
