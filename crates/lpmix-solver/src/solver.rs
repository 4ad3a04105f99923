use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::branch::BranchAndBound;
use crate::model::Model;
use crate::presolve::Presolve;
use crate::simplex::{LpOutcome, Simplex};
use crate::solution::{SolveStats, SolverResult, Status, extract};

/// Solver settings and the entry point for solving a [`Model`].
///
/// ```
/// use lpmix_solver::{Model, Sense, Solver, Status, Variable};
///
/// let mut model = Model::maximize();
/// let x = model.add_variable(Variable::integer("x")).unwrap();
/// model.add_constraint((2.0 * x).leq(7.0)).unwrap();
/// model.set_objective(x, Sense::Maximize).unwrap();
///
/// let result = Solver::new().with_max_nodes(1_000).solve(&model);
/// assert_eq!(result.status(), Status::Optimal);
/// assert_eq!(result.value(x), Some(3.0));
/// ```
#[derive(Debug, Clone)]
pub struct Solver {
    /// Tolerance for floating point comparisons
    tolerance: f64,
    /// Distance from an integer still accepted as integral
    integrality_tolerance: f64,
    /// Pivot budget for each relaxation
    max_iterations: Option<usize>,
    /// Branch-and-bound node budget
    max_nodes: Option<usize>,
    /// Worker threads for branch-and-bound (needs the `parallel` feature)
    threads: usize,
    cancel: Option<Arc<AtomicBool>>,
}

impl Default for Solver {
    fn default() -> Self {
        Self {
            tolerance: 1e-9,
            integrality_tolerance: 1e-6,
            max_iterations: None,
            max_nodes: None,
            threads: 1,
            cancel: None,
        }
    }
}

impl Solver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tolerance(mut self, tol: f64) -> Self {
        debug_assert!(tol > 0.0, "tolerance must be positive");
        self.tolerance = tol;
        self
    }

    pub fn with_integrality_tolerance(mut self, tol: f64) -> Self {
        debug_assert!((0.0..0.5).contains(&tol), "integrality tolerance must be in [0, 0.5)");
        self.integrality_tolerance = tol;
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = Some(max);
        self
    }

    pub fn with_max_nodes(mut self, max: usize) -> Self {
        self.max_nodes = Some(max);
        self
    }

    /// Explore branch-and-bound nodes on `threads` workers. Without the
    /// `parallel` feature the search always runs on the calling thread.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    /// Checked before every branch-and-bound node; once the flag is set the
    /// solve stops with [`Status::Cancelled`].
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn integrality_tolerance(&self) -> f64 {
        self.integrality_tolerance
    }

    pub fn max_nodes(&self) -> Option<usize> {
        self.max_nodes
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Solve the model. Models without Integer/Binary variables go straight
    /// to the simplex method; the rest go through branch-and-bound.
    pub fn solve(&self, model: &Model) -> SolverResult {
        if self.is_cancelled() {
            return SolverResult::without_solution(Status::Cancelled, SolveStats::default());
        }
        if model.has_integral_variables() {
            BranchAndBound::new(self, model).run()
        } else {
            self.solve_relaxation(model)
        }
    }

    /// Solve the LP relaxation, treating every variable as continuous.
    pub fn solve_relaxation(&self, model: &Model) -> SolverResult {
        let mut stats = SolveStats::default();
        match self.relax(model, model.bounds(), None, &mut stats) {
            Relaxation::Optimal(values) => SolverResult::optimal(model, values, stats),
            Relaxation::Infeasible => SolverResult::without_solution(Status::Infeasible, stats),
            Relaxation::Unbounded => SolverResult::without_solution(Status::Unbounded, stats),
            Relaxation::IterationLimit => SolverResult::without_solution(Status::IterationLimit, stats),
        }
    }

    /// Presolve and solve one relaxation under `bounds`. `integrality`
    /// enables inward rounding of integral bounds.
    pub(crate) fn relax(
        &self,
        model: &Model,
        bounds: Vec<(f64, f64)>,
        integrality: Option<f64>,
        stats: &mut SolveStats,
    ) -> Relaxation {
        let Ok(form) = Presolve::new(model, bounds, self.tolerance, integrality).run() else {
            return Relaxation::Infeasible;
        };

        let mut iterations = 0;
        let outcome = Simplex::new(self.tolerance, self.max_iterations).solve(&form, &mut iterations);
        stats.simplex_iterations += iterations;

        match outcome {
            LpOutcome::Optimal(columns) => Relaxation::Optimal(extract::variable_values(&form, &columns)),
            LpOutcome::Infeasible => Relaxation::Infeasible,
            LpOutcome::Unbounded => Relaxation::Unbounded,
            LpOutcome::IterationLimit => Relaxation::IterationLimit,
        }
    }
}

/// A relaxation outcome in model terms.
pub(crate) enum Relaxation {
    /// One value per model variable
    Optimal(Vec<f64>),
    Infeasible,
    Unbounded,
    IterationLimit,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Sense, Variable};

    #[test]
    fn test_dispatch_keeps_relaxation_fractional() {
        let mut model = Model::maximize();
        let x = model.add_variable(Variable::integer("x")).unwrap();
        model.add_constraint((2.0 * x).leq(7.0)).unwrap();
        model.set_objective(x, Sense::Maximize).unwrap();

        let solver = Solver::new();
        let relaxed = solver.solve_relaxation(&model);
        assert_eq!(relaxed.status(), Status::Optimal);
        assert!((relaxed.value(x).unwrap() - 3.5).abs() < 1e-9);

        let integral = solver.solve(&model);
        assert_eq!(integral.value(x), Some(3.0));
        assert_eq!(integral.objective_value(), Some(3.0));
    }

    #[test]
    fn test_cancelled_before_start() {
        let mut model = Model::maximize();
        let x = model.add_variable(Variable::continuous("x").with_bounds(0.0, 1.0)).unwrap();
        model.set_objective(x, Sense::Maximize).unwrap();

        let flag = Arc::new(AtomicBool::new(true));
        let result = Solver::new().with_cancel(flag.clone()).solve(&model);
        assert_eq!(result.status(), Status::Cancelled);
        assert_eq!(result.objective_value(), None);

        flag.store(false, Ordering::Relaxed);
        let result = Solver::new().with_cancel(flag).solve(&model);
        assert_eq!(result.objective_value(), Some(1.0));
    }

    #[test]
    fn test_iteration_limit_reported() {
        let mut model = Model::maximize();
        let x = model.add_variable(Variable::continuous("x")).unwrap();
        let y = model.add_variable(Variable::continuous("y")).unwrap();
        model.add_constraint((x + y).leq(4.0)).unwrap();
        model.add_constraint((x - y).leq(1.0)).unwrap();
        model.set_objective(3.0 * x + 2.0 * y, Sense::Maximize).unwrap();

        let result = Solver::new().with_max_iterations(0).solve(&model);
        assert_eq!(result.status(), Status::IterationLimit);
        assert_eq!(result.values().count(), 0);
    }
}
