use std::fmt;

use crate::model::{Model, VarId};

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// An optimal solution was found
    Optimal,
    /// No assignment satisfies all constraints
    Infeasible,
    /// The objective can be improved without limit
    Unbounded,
    /// The simplex pivot budget ran out
    IterationLimit,
    /// The branch-and-bound node budget ran out
    NodeLimit,
    /// The cancellation flag was raised
    Cancelled,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Optimal => write!(f, "OPTIMAL"),
            Status::Infeasible => write!(f, "INFEASIBLE"),
            Status::Unbounded => write!(f, "UNBOUNDED"),
            Status::IterationLimit => write!(f, "ITERATION LIMIT"),
            Status::NodeLimit => write!(f, "NODE LIMIT"),
            Status::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Counters describing the work a solve performed.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SolveStats {
    /// Simplex pivots across every relaxation solved
    pub simplex_iterations: usize,
    /// Branch-and-bound nodes whose relaxation was solved
    pub nodes_explored: usize,
    /// Nodes discarded as infeasible or bounded by the incumbent
    pub nodes_pruned: usize,
}

impl SolveStats {
    #[cfg(feature = "parallel")]
    pub(crate) fn merge(&mut self, other: &SolveStats) {
        self.simplex_iterations += other.simplex_iterations;
        self.nodes_explored += other.nodes_explored;
        self.nodes_pruned += other.nodes_pruned;
    }
}

/// The outcome of one solve call.
///
/// Only an `Optimal` result carries values; every other status comes with
/// no objective and no assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverResult {
    status: Status,
    objective_value: Option<f64>,
    values: Vec<f64>,
    stats: SolveStats,
}

impl SolverResult {
    /// Build an optimal result from one value per model variable. The
    /// objective is recomputed from the model's own objective expression.
    pub(crate) fn optimal(model: &Model, values: Vec<f64>, stats: SolveStats) -> Self {
        let objective_value = model.objective().evaluate(&values);
        Self {
            status: Status::Optimal,
            objective_value: Some(objective_value),
            values,
            stats,
        }
    }

    pub(crate) fn without_solution(status: Status, stats: SolveStats) -> Self {
        Self {
            status,
            objective_value: None,
            values: Vec::new(),
            stats,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_optimal(&self) -> bool {
        self.status == Status::Optimal
    }

    pub fn objective_value(&self) -> Option<f64> {
        self.objective_value
    }

    pub fn value(&self, var: VarId) -> Option<f64> {
        self.values.get(var.index()).copied()
    }

    /// Assigned values in variable insertion order.
    pub fn values(&self) -> impl Iterator<Item = (VarId, f64)> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(|(index, &value)| (VarId::from_index(index), value))
    }

    pub fn stats(&self) -> &SolveStats {
        &self.stats
    }
}

/// Maps a solved relaxation back to model terms.
pub(crate) mod extract {
    use crate::model::Model;
    use crate::presolve::StandardForm;

    /// One value per model variable from standard-form column values,
    /// clamped to the tightened bounds to absorb round-off. Slack, surplus
    /// and artificial columns never reach this point.
    pub(crate) fn variable_values(form: &StandardForm, columns: &[f64]) -> Vec<f64> {
        form.columns
            .iter()
            .zip(&form.bounds)
            .map(|(column, &(lower, upper))| column.value(columns).max(lower).min(upper))
            .collect()
    }

    /// Snap Integer/Binary values that sit within `tolerance` of an integer.
    /// Returns false when some integral variable is fractional.
    pub(crate) fn snap_integral(model: &Model, values: &mut [f64], tolerance: f64) -> bool {
        let mut integral = true;
        for (variable, value) in model.variables().iter().zip(values.iter_mut()) {
            if !variable.is_integral() {
                continue;
            }
            let rounded = value.round();
            if (*value - rounded).abs() <= tolerance {
                *value = rounded;
            } else {
                integral = false;
            }
        }
        integral
    }
}
