mod linalg;
pub mod max_sharpe;
mod qp;
pub mod sqp;

pub use max_sharpe::{optimize_max_sharpe, MaxSharpeSolution, NegativeSharpe};
pub use sqp::{BudgetConstraints, Objective, SqpSettings, SqpSolution, SqpSolver, Termination};
