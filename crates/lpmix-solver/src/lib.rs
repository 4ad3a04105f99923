//! Linear and mixed-integer programming.
//!
//! Build a [`Model`] from typed variables and linear expressions, then hand
//! it to [`solve`] or a configured [`Solver`]. Continuous models are solved
//! with a two-phase simplex method; models with Integer or Binary variables
//! go through depth-first branch-and-bound on top of it.
//!
//! ```
//! use lpmix_solver::{Model, Sense, Status, Variable, solve};
//!
//! let mut model = Model::maximize();
//! let x = model.add_variable(Variable::continuous("x")).unwrap();
//! let y = model.add_variable(Variable::continuous("y")).unwrap();
//! model.add_constraint((x + y).leq(4.0)).unwrap();
//! model.add_constraint((x + 3.0 * y).leq(6.0)).unwrap();
//! model.set_objective(3.0 * x + 2.0 * y, Sense::Maximize).unwrap();
//!
//! let result = solve(&model);
//! assert_eq!(result.status(), Status::Optimal);
//! assert!((result.objective_value().unwrap() - 12.0).abs() < 1e-9);
//! ```

mod branch;
mod error;
mod expr;
mod model;
mod presolve;
mod simplex;
mod solution;
mod solver;

pub use error::ModelError;
pub use expr::{Constraint, LinearExpr, Relation};
pub use model::{Domain, Model, Sense, VarId, Variable};
pub use solution::{SolveStats, SolverResult, Status};
pub use solver::Solver;

/// Solve `model` with the default [`Solver`] settings.
pub fn solve(model: &Model) -> SolverResult {
    Solver::new().solve(model)
}
