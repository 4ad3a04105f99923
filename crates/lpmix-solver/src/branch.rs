//! Depth-first branch-and-bound over LP relaxations.
//!
//! Every node is the caller's model plus tightened variable bounds. A node
//! carries its branch path (`false` = the child explored first), and nodes
//! are processed in lexicographic path order. Among leaves with equal
//! objective the one with the smallest path wins, which makes the parallel
//! search return the same answer as the sequential one.

use crate::model::Model;
use crate::solution::{SolveStats, SolverResult, Status, extract};
use crate::solver::{Relaxation, Solver};

#[derive(Debug, Clone)]
struct Node {
    bounds: Vec<(f64, f64)>,
    path: Vec<bool>,
}

impl Node {
    fn child(&self, var: usize, bounds: (f64, f64), second: bool) -> Node {
        let mut child = self.clone();
        child.bounds[var] = bounds;
        child.path.push(second);
        child
    }
}

/// Best integer-feasible solution found so far.
#[derive(Debug, Clone)]
struct Incumbent {
    /// Objective times the sense factor, so larger is better
    score: f64,
    values: Vec<f64>,
    path: Vec<bool>,
}

impl Incumbent {
    /// Whether a solution scoring `score` at `path` would replace this one.
    fn is_beaten_by(&self, score: f64, path: &[bool], tolerance: f64) -> bool {
        score > self.score + tolerance || (score >= self.score - tolerance && path < self.path.as_slice())
    }
}

fn improves(incumbent: Option<&Incumbent>, score: f64, path: &[bool], tolerance: f64) -> bool {
    incumbent.is_none_or(|best| best.is_beaten_by(score, path, tolerance))
}

enum Step {
    Prune,
    Leaf(Incumbent),
    Branch { first: Node, second: Node },
    IterationLimit,
}

pub(crate) struct BranchAndBound<'a> {
    solver: &'a Solver,
    model: &'a Model,
    factor: f64,
}

impl<'a> BranchAndBound<'a> {
    pub(crate) fn new(solver: &'a Solver, model: &'a Model) -> Self {
        Self {
            solver,
            model,
            factor: model.sense().factor(),
        }
    }

    fn root(&self) -> Node {
        Node {
            bounds: self.model.bounds(),
            path: Vec::new(),
        }
    }

    /// Solve the plain LP relaxation once, then search. An unbounded
    /// relaxation ends the solve before any integral rounding is applied.
    pub(crate) fn run(&self) -> SolverResult {
        let mut stats = SolveStats::default();
        let status = match self.solver.relax(self.model, self.model.bounds(), None, &mut stats) {
            Relaxation::Optimal(_) => None,
            Relaxation::Infeasible => Some(Status::Infeasible),
            Relaxation::Unbounded => Some(Status::Unbounded),
            Relaxation::IterationLimit => Some(Status::IterationLimit),
        };
        if let Some(status) = status {
            return SolverResult::without_solution(status, stats);
        }

        #[cfg(feature = "parallel")]
        if self.solver.threads() > 1 {
            return self.run_parallel(self.solver.threads(), stats);
        }
        self.run_sequential(stats)
    }

    fn score(&self, values: &[f64]) -> f64 {
        self.factor * self.model.objective().evaluate(values)
    }

    /// Solve a node's relaxation and decide what to do with it.
    /// `improves` reports whether a bound at a path can still beat the
    /// incumbent.
    fn process(&self, node: Node, stats: &mut SolveStats, improves: impl Fn(f64, &[bool]) -> bool) -> Step {
        stats.nodes_explored += 1;
        let tolerance = self.solver.integrality_tolerance();

        let mut values = match self.solver.relax(self.model, node.bounds.clone(), Some(tolerance), stats) {
            Relaxation::Optimal(values) => values,
            // Nodes only tighten a bounded relaxation
            Relaxation::Infeasible | Relaxation::Unbounded => {
                stats.nodes_pruned += 1;
                return Step::Prune;
            }
            Relaxation::IterationLimit => return Step::IterationLimit,
        };

        if !improves(self.score(&values), &node.path) {
            stats.nodes_pruned += 1;
            return Step::Prune;
        }

        if extract::snap_integral(self.model, &mut values, tolerance) {
            return Step::Leaf(Incumbent {
                score: self.score(&values),
                values,
                path: node.path,
            });
        }

        let Some(var) = self.branching_variable(&values) else {
            // snap_integral reported a fractional value, so one exists
            stats.nodes_pruned += 1;
            return Step::Prune;
        };
        let value = values[var];
        let (lower, upper) = node.bounds[var];
        let down = (lower, value.floor());
        let up = (value.ceil(), upper);
        if value - value.floor() < 0.5 {
            Step::Branch {
                first: node.child(var, down, false),
                second: node.child(var, up, true),
            }
        } else {
            Step::Branch {
                first: node.child(var, up, false),
                second: node.child(var, down, true),
            }
        }
    }

    /// The integral variable farthest from an integer; lowest index on ties.
    fn branching_variable(&self, values: &[f64]) -> Option<usize> {
        let tolerance = self.solver.integrality_tolerance();
        let mut best: Option<(usize, f64)> = None;
        for (j, variable) in self.model.variables().iter().enumerate() {
            if !variable.is_integral() {
                continue;
            }
            let distance = (values[j] - values[j].round()).abs();
            if distance <= tolerance {
                continue;
            }
            if best.is_none_or(|(_, farthest)| distance > farthest) {
                best = Some((j, distance));
            }
        }
        best.map(|(j, _)| j)
    }

    fn finish(&self, incumbent: Option<Incumbent>, stats: SolveStats) -> SolverResult {
        match incumbent {
            Some(best) => SolverResult::optimal(self.model, best.values, stats),
            None => SolverResult::without_solution(Status::Infeasible, stats),
        }
    }

    fn run_sequential(&self, mut stats: SolveStats) -> SolverResult {
        let tolerance = self.solver.tolerance();
        let mut incumbent: Option<Incumbent> = None;
        let mut stack = vec![self.root()];

        loop {
            if self.solver.is_cancelled() {
                return SolverResult::without_solution(Status::Cancelled, stats);
            }
            let Some(node) = stack.pop() else {
                break;
            };
            if self.solver.max_nodes().is_some_and(|max| stats.nodes_explored >= max) {
                return SolverResult::without_solution(Status::NodeLimit, stats);
            }

            let step = self.process(node, &mut stats, |score, path| {
                improves(incumbent.as_ref(), score, path, tolerance)
            });
            match step {
                Step::Prune => {}
                Step::Leaf(candidate) => {
                    if improves(incumbent.as_ref(), candidate.score, &candidate.path, tolerance) {
                        incumbent = Some(candidate);
                    }
                }
                Step::Branch { first, second } => {
                    stack.push(second);
                    stack.push(first);
                }
                Step::IterationLimit => return SolverResult::without_solution(Status::IterationLimit, stats),
            }
        }

        self.finish(incumbent, stats)
    }
}

#[cfg(feature = "parallel")]
mod parallel {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Mutex, MutexGuard, PoisonError};

    use super::*;

    /// State shared by the workers of one parallel search.
    struct Shared {
        incumbent: Mutex<Option<Incumbent>>,
        stats: Mutex<SolveStats>,
        started: AtomicUsize,
        halted: AtomicBool,
        halt_status: Mutex<Option<Status>>,
    }

    fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }

    impl Shared {
        fn new(stats: SolveStats) -> Self {
            Self {
                incumbent: Mutex::new(None),
                stats: Mutex::new(stats),
                started: AtomicUsize::new(0),
                halted: AtomicBool::new(false),
                halt_status: Mutex::new(None),
            }
        }

        /// Stop the search; the first status recorded wins.
        fn halt(&self, status: Status) {
            let mut halt_status = lock(&self.halt_status);
            if halt_status.is_none() {
                *halt_status = Some(status);
            }
            self.halted.store(true, Ordering::Relaxed);
        }
    }

    impl BranchAndBound<'_> {
        pub(super) fn run_parallel(&self, threads: usize, stats: SolveStats) -> SolverResult {
            let pool = match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
                Ok(pool) => pool,
                Err(_) => return self.run_sequential(stats),
            };

            let shared = Shared::new(stats);
            let root = self.root();
            pool.install(|| rayon::scope(|scope| self.explore(scope, &shared, root)));

            let stats = *lock(&shared.stats);
            if let Some(status) = *lock(&shared.halt_status) {
                return SolverResult::without_solution(status, stats);
            }
            let incumbent = lock(&shared.incumbent).take();
            self.finish(incumbent, stats)
        }

        fn explore<'s>(&'s self, scope: &rayon::Scope<'s>, shared: &'s Shared, node: Node) {
            if shared.halted.load(Ordering::Relaxed) {
                return;
            }
            if self.solver.is_cancelled() {
                shared.halt(Status::Cancelled);
                return;
            }
            let started = shared.started.fetch_add(1, Ordering::Relaxed);
            if self.solver.max_nodes().is_some_and(|max| started >= max) {
                shared.halt(Status::NodeLimit);
                return;
            }

            let tolerance = self.solver.tolerance();
            let mut stats = SolveStats::default();
            let step = self.process(node, &mut stats, |score, path| {
                improves(lock(&shared.incumbent).as_ref(), score, path, tolerance)
            });
            lock(&shared.stats).merge(&stats);

            match step {
                Step::Prune => {}
                Step::Leaf(candidate) => {
                    // Re-check under the lock: another worker may have improved
                    // the incumbent since this node's bound was tested.
                    let mut incumbent = lock(&shared.incumbent);
                    if improves(incumbent.as_ref(), candidate.score, &candidate.path, tolerance) {
                        *incumbent = Some(candidate);
                    }
                }
                Step::Branch { first, second } => {
                    scope.spawn(move |scope| self.explore(scope, shared, first));
                    scope.spawn(move |scope| self.explore(scope, shared, second));
                }
                Step::IterationLimit => shared.halt(Status::IterationLimit),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;

    use crate::model::{Sense, Variable};

    fn knapsack() -> Model {
        // maximize 5a + 4b + 3c  s.t.  2a + 3b + c <= 5,  4a + b + 2c <= 11,  3a + 4b + 2c <= 8
        // Optimum 13 at a=2, b=0, c=1.
        let mut model = Model::maximize();
        let a = model.add_variable(Variable::integer("a")).unwrap();
        let b = model.add_variable(Variable::integer("b")).unwrap();
        let c = model.add_variable(Variable::integer("c")).unwrap();
        model.add_constraint((2.0 * a + 3.0 * b + c).leq(5.0)).unwrap();
        model.add_constraint((4.0 * a + b + 2.0 * c).leq(11.0)).unwrap();
        model.add_constraint((3.0 * a + 4.0 * b + 2.0 * c).leq(8.0)).unwrap();
        model.set_objective(5.0 * a + 4.0 * b + 3.0 * c, Sense::Maximize).unwrap();
        model
    }

    #[test]
    fn test_small_integer_program() {
        let model = knapsack();
        let result = Solver::new().solve(&model);
        assert_eq!(result.status(), Status::Optimal);
        assert_eq!(result.objective_value(), Some(13.0));
        let values: Vec<f64> = result.values().map(|(_, v)| v).collect();
        assert_eq!(values, vec![2.0, 0.0, 1.0]);
    }

    #[test]
    fn test_minimize_with_equality() {
        // minimize x + y  s.t.  3x + 2y = 12,  x, y integer  =>  x=4, y=0
        let mut model = Model::minimize();
        let x = model.add_variable(Variable::integer("x")).unwrap();
        let y = model.add_variable(Variable::integer("y")).unwrap();
        model.add_constraint((3.0 * x + 2.0 * y).equals(12.0)).unwrap();
        model.set_objective(x + y, Sense::Minimize).unwrap();

        let result = Solver::new().solve(&model);
        assert_eq!(result.status(), Status::Optimal);
        assert_eq!(result.objective_value(), Some(4.0));
        assert_eq!(result.value(x), Some(4.0));
        assert_eq!(result.value(y), Some(0.0));
    }

    #[test]
    fn test_integer_infeasible_but_relaxation_feasible() {
        // 2x = 3 has the fractional solution x = 1.5 only
        let mut model = Model::maximize();
        let x = model.add_variable(Variable::integer("x")).unwrap();
        let y = model.add_variable(Variable::integer("y")).unwrap();
        model.add_constraint((2.0 * x + 2.0 * y).equals(3.0)).unwrap();
        model.set_objective(x, Sense::Maximize).unwrap();

        let solver = Solver::new();
        assert_eq!(solver.solve_relaxation(&model).status(), Status::Optimal);
        let result = solver.solve(&model);
        assert_eq!(result.status(), Status::Infeasible);
        assert_eq!(result.values().count(), 0);
    }

    #[test]
    fn test_mixed_integer_keeps_continuous_fractional() {
        // maximize x + y  s.t.  x + y <= 2.5,  y <= 1.2,  x integer, y continuous
        let mut model = Model::maximize();
        let x = model.add_variable(Variable::integer("x")).unwrap();
        let y = model.add_variable(Variable::continuous("y").with_bounds(0.0, 1.2)).unwrap();
        model.add_constraint((x + y).leq(2.5)).unwrap();
        model.set_objective(x + y, Sense::Maximize).unwrap();

        let result = Solver::new().solve(&model);
        assert_eq!(result.status(), Status::Optimal);
        assert!((result.objective_value().unwrap() - 2.5).abs() < 1e-9);
        let x_value = result.value(x).unwrap();
        assert_eq!(x_value, x_value.round());
        assert!(result.value(y).unwrap() <= 1.2 + 1e-9);
    }

    #[test]
    fn test_node_limit() {
        let result = Solver::new().with_max_nodes(0).solve(&knapsack());
        assert_eq!(result.status(), Status::NodeLimit);
        assert_eq!(result.objective_value(), None);
    }

    #[test]
    fn test_cancel_checked_before_node() {
        let model = knapsack();
        let solver = Solver::new().with_cancel(Arc::new(AtomicBool::new(true)));
        let result = BranchAndBound::new(&solver, &model).run();
        assert_eq!(result.status(), Status::Cancelled);
        assert_eq!(result.objective_value(), None);
        assert_eq!(result.values().count(), 0);
        assert_eq!(result.stats().nodes_explored, 0);
    }

    #[test]
    fn test_unbounded_relaxation_with_empty_integer_domain() {
        // rounding x inward leaves no integer, but y is unbounded above
        let mut model = Model::maximize();
        let x = model.add_variable(Variable::integer("x").with_bounds(0.2, 0.8)).unwrap();
        let y = model.add_variable(Variable::continuous("y")).unwrap();
        model.set_objective(x + y, Sense::Maximize).unwrap();

        let solver = Solver::new();
        let result = BranchAndBound::new(&solver, &model).run();
        assert_eq!(result.status(), Status::Unbounded);
        assert_eq!(result.stats().nodes_explored, 0);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_cancel_and_node_limit() {
        let model = knapsack();
        let cancelled = Solver::new()
            .with_threads(4)
            .with_cancel(Arc::new(AtomicBool::new(true)));
        let result = BranchAndBound::new(&cancelled, &model).run();
        assert_eq!(result.status(), Status::Cancelled);
        assert_eq!(result.values().count(), 0);

        let limited = Solver::new().with_threads(4).with_max_nodes(0);
        let result = BranchAndBound::new(&limited, &model).run();
        assert_eq!(result.status(), Status::NodeLimit);
        assert_eq!(result.objective_value(), None);
    }

    #[test]
    fn test_branching_prefers_most_fractional_then_lowest_index() {
        let model = knapsack();
        let solver = Solver::new();
        let bb = BranchAndBound::new(&solver, &model);
        assert_eq!(bb.branching_variable(&[0.5, 0.3, 0.5]), Some(0));
        assert_eq!(bb.branching_variable(&[1.0, 0.4, 0.5]), Some(2));
        assert_eq!(bb.branching_variable(&[1.0, 2.0, 3.0]), None);
    }

    #[test]
    fn test_incumbent_tie_break_by_path() {
        let incumbent = Incumbent {
            score: 10.0,
            values: Vec::new(),
            path: vec![false, true],
        };
        assert!(incumbent.is_beaten_by(11.0, &[true, true], 1e-9));
        assert!(!incumbent.is_beaten_by(10.0, &[true], 1e-9));
        assert!(incumbent.is_beaten_by(10.0, &[false, false], 1e-9));
        assert!(!incumbent.is_beaten_by(9.0, &[], 1e-9));
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_matches_sequential() {
        let model = knapsack();
        let sequential = Solver::new().solve(&model);
        let parallel = Solver::new().with_threads(4).solve(&model);
        assert_eq!(parallel.status(), sequential.status());
        assert_eq!(parallel.objective_value(), sequential.objective_value());
        let a: Vec<_> = sequential.values().collect();
        let b: Vec<_> = parallel.values().collect();
        assert_eq!(a, b);
    }
}
