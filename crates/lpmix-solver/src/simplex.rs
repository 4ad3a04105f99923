use crate::expr::Relation;
use crate::presolve::StandardForm;

/// Consecutive degenerate pivots tolerated before switching to Bland's rule.
const DEGENERATE_LIMIT: usize = 50;

/// Outcome of solving a standard-form relaxation.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LpOutcome {
    /// Value of every standard-form column at an optimal vertex.
    Optimal(Vec<f64>),
    Infeasible,
    Unbounded,
    IterationLimit,
}

enum PhaseResult {
    Optimal,
    Unbounded,
    IterationLimit,
}

/// Two-phase tableau simplex over a [`StandardForm`].
///
/// Entering columns are chosen by largest reduced cost until a run of
/// degenerate pivots is seen, then by Bland's rule for the rest of the phase.
/// Ratio-test ties always go to the lowest-index basic variable.
pub(crate) struct Simplex {
    /// Tolerance for floating point comparisons
    tolerance: f64,
    /// Pivot budget shared by both phases
    max_iterations: Option<usize>,
}

impl Simplex {
    pub(crate) fn new(tolerance: f64, max_iterations: Option<usize>) -> Self {
        Self {
            tolerance,
            max_iterations,
        }
    }

    /// Solve `form`, adding the number of pivots performed to `iterations`.
    pub(crate) fn solve(&self, form: &StandardForm, iterations: &mut usize) -> LpOutcome {
        let mut tableau = Tableau::build(form);

        if tableau.n_artificial > 0 {
            match self.phase1(&mut tableau, iterations) {
                Some(true) => {}
                Some(false) => return LpOutcome::Infeasible,
                None => return LpOutcome::IterationLimit,
            }
        }

        match self.phase2(&mut tableau, form, iterations) {
            PhaseResult::Optimal => LpOutcome::Optimal(tableau.structural_values()),
            PhaseResult::Unbounded => LpOutcome::Unbounded,
            PhaseResult::IterationLimit => LpOutcome::IterationLimit,
        }
    }

    /// Minimize the sum of artificials. `Some(true)` when it reaches zero,
    /// `Some(false)` when the model is infeasible, `None` on iteration limit.
    fn phase1(&self, tableau: &mut Tableau, iterations: &mut usize) -> Option<bool> {
        let obj_row = tableau.obj_row();
        let art_start = tableau.art_start();
        let n_cols = tableau.n_cols();

        // maximize -sum(artificials), written in reduced-cost form
        tableau.data[obj_row] = vec![0.0; n_cols];
        for j in art_start..art_start + tableau.n_artificial {
            tableau.data[obj_row][j] = -1.0;
        }
        for i in 0..obj_row {
            if tableau.basic_vars[i] >= art_start {
                for j in 0..n_cols {
                    tableau.data[obj_row][j] += tableau.data[i][j];
                }
            }
        }

        match self.optimize(tableau, n_cols - 1, iterations) {
            PhaseResult::Optimal => {}
            PhaseResult::IterationLimit => return None,
            // The phase 1 objective is bounded by zero
            PhaseResult::Unbounded => return Some(false),
        }

        let rhs_col = n_cols - 1;
        let scale = 1.0 + tableau.max_rhs;
        for i in 0..obj_row {
            if tableau.basic_vars[i] >= art_start && tableau.data[i][rhs_col] > self.tolerance * scale {
                return Some(false);
            }
        }

        self.drive_out_artificials(tableau);
        Some(true)
    }

    /// Pivot zero-valued artificials out of the basis. A row with no
    /// nonzero entry outside the artificial columns is redundant and keeps
    /// its artificial, which can never move again.
    fn drive_out_artificials(&self, tableau: &mut Tableau) {
        let art_start = tableau.art_start();
        for i in 0..tableau.obj_row() {
            if tableau.basic_vars[i] < art_start {
                continue;
            }
            if let Some(col) = (0..art_start).find(|&j| tableau.data[i][j].abs() > self.tolerance) {
                self.pivot(tableau, i, col);
            }
        }
    }

    fn phase2(&self, tableau: &mut Tableau, form: &StandardForm, iterations: &mut usize) -> PhaseResult {
        let obj_row = tableau.obj_row();
        let n_cols = tableau.n_cols();

        tableau.data[obj_row] = vec![0.0; n_cols];
        tableau.data[obj_row][..form.num_cols].copy_from_slice(&form.objective);
        for i in 0..obj_row {
            let basic = tableau.basic_vars[i];
            let ratio = tableau.data[obj_row][basic];
            if ratio != 0.0 {
                for j in 0..n_cols {
                    tableau.data[obj_row][j] -= ratio * tableau.data[i][j];
                }
            }
        }

        // Artificial columns never re-enter
        let limit = tableau.art_start();
        self.optimize(tableau, limit, iterations)
    }

    fn optimize(&self, tableau: &mut Tableau, limit: usize, iterations: &mut usize) -> PhaseResult {
        let mut degenerate_run = 0;
        let mut bland = false;
        loop {
            let Some(pivot_col) = self.find_pivot_column(tableau, limit, bland) else {
                return PhaseResult::Optimal;
            };
            if self.max_iterations.is_some_and(|max| *iterations >= max) {
                return PhaseResult::IterationLimit;
            }
            let Some(pivot_row) = self.find_pivot_row(tableau, pivot_col) else {
                return PhaseResult::Unbounded;
            };
            if tableau.data[pivot_row][tableau.rhs_col()] <= self.tolerance {
                degenerate_run += 1;
                bland |= degenerate_run >= DEGENERATE_LIMIT;
            } else {
                degenerate_run = 0;
            }
            self.pivot(tableau, pivot_row, pivot_col);
            *iterations += 1;
        }
    }

    /// A column below `limit` whose reduced cost improves the objective.
    fn find_pivot_column(&self, tableau: &Tableau, limit: usize, bland: bool) -> Option<usize> {
        let obj = &tableau.data[tableau.obj_row()];
        if bland {
            return (0..limit).find(|&j| obj[j] > self.tolerance);
        }

        let mut max_val = self.tolerance;
        let mut max_col = None;
        for (j, &value) in obj.iter().enumerate().take(limit) {
            if value > max_val {
                max_val = value;
                max_col = Some(j);
            }
        }
        max_col
    }

    /// Minimum-ratio test with Bland's lowest-index tie-break.
    fn find_pivot_row(&self, tableau: &Tableau, col: usize) -> Option<usize> {
        let rhs_col = tableau.rhs_col();

        let mut best: Option<(usize, f64)> = None;
        for i in 0..tableau.obj_row() {
            let val = tableau.data[i][col];
            if val <= self.tolerance {
                continue;
            }
            let ratio = tableau.data[i][rhs_col] / val;
            best = match best {
                None => Some((i, ratio)),
                Some((row, min_ratio)) => {
                    let better = ratio < min_ratio - self.tolerance
                        || (ratio <= min_ratio + self.tolerance && tableau.basic_vars[i] < tableau.basic_vars[row]);
                    if better { Some((i, ratio)) } else { Some((row, min_ratio)) }
                }
            };
        }

        best.map(|(row, _)| row)
    }

    fn pivot(&self, tableau: &mut Tableau, row: usize, col: usize) {
        let n_rows = tableau.data.len();
        let rhs_col = tableau.rhs_col();

        tableau.basic_vars[row] = col;

        let pivot_val = tableau.data[row][col];
        for value in tableau.data[row].iter_mut() {
            *value /= pivot_val;
        }
        let pivot_row = std::mem::take(&mut tableau.data[row]);

        for i in 0..n_rows {
            if i == row {
                continue;
            }
            let factor = tableau.data[i][col];
            if factor == 0.0 {
                continue;
            }
            for (value, &p) in tableau.data[i].iter_mut().zip(&pivot_row) {
                *value -= factor * p;
            }
            tableau.data[i][col] = 0.0;
            if i != n_rows - 1 && tableau.data[i][rhs_col].abs() < self.tolerance {
                tableau.data[i][rhs_col] = 0.0;
            }
        }

        tableau.data[row] = pivot_row;
    }
}

/// Dense simplex tableau. Columns are laid out as
/// `[structural | slack/surplus | artificial | rhs]`; the objective row is
/// last and holds reduced costs, positive where entering improves.
struct Tableau {
    data: Vec<Vec<f64>>,
    basic_vars: Vec<usize>,
    n_structural: usize,
    n_slack: usize,
    n_artificial: usize,
    max_rhs: f64,
}

impl Tableau {
    fn build(form: &StandardForm) -> Self {
        let n_structural = form.num_cols;
        let n_constraints = form.rows.len();

        // Rows with a negative rhs are negated, flipping their relation
        let relations: Vec<Relation> = form
            .rows
            .iter()
            .map(|row| match (row.relation, row.rhs < 0.0) {
                (Relation::Le, true) => Relation::Ge,
                (Relation::Ge, true) => Relation::Le,
                (relation, _) => relation,
            })
            .collect();

        let mut n_slack = 0;
        let mut n_artificial = 0;
        for relation in &relations {
            match relation {
                Relation::Le => n_slack += 1,
                Relation::Ge => {
                    n_slack += 1;
                    n_artificial += 1;
                }
                Relation::Eq => n_artificial += 1,
            }
        }

        let total_cols = n_structural + n_slack + n_artificial + 1;
        let mut tableau = Tableau {
            data: vec![vec![0.0; total_cols]; n_constraints + 1],
            basic_vars: vec![0; n_constraints],
            n_structural,
            n_slack,
            n_artificial,
            max_rhs: 0.0,
        };

        let mut slack_idx = n_structural;
        let mut artificial_idx = n_structural + n_slack;

        for (i, (row, relation)) in form.rows.iter().zip(&relations).enumerate() {
            let sign = if row.rhs < 0.0 { -1.0 } else { 1.0 };
            for (j, &coef) in row.coefficients.iter().enumerate() {
                tableau.data[i][j] = sign * coef;
            }
            let rhs = sign * row.rhs;
            tableau.data[i][total_cols - 1] = rhs;
            tableau.max_rhs = tableau.max_rhs.max(rhs);

            match relation {
                Relation::Le => {
                    tableau.data[i][slack_idx] = 1.0;
                    tableau.basic_vars[i] = slack_idx;
                    slack_idx += 1;
                }
                Relation::Ge => {
                    tableau.data[i][slack_idx] = -1.0; // surplus
                    slack_idx += 1;
                    tableau.data[i][artificial_idx] = 1.0;
                    tableau.basic_vars[i] = artificial_idx;
                    artificial_idx += 1;
                }
                Relation::Eq => {
                    tableau.data[i][artificial_idx] = 1.0;
                    tableau.basic_vars[i] = artificial_idx;
                    artificial_idx += 1;
                }
            }
        }

        tableau
    }

    fn obj_row(&self) -> usize {
        self.data.len() - 1
    }

    fn n_cols(&self) -> usize {
        self.n_structural + self.n_slack + self.n_artificial + 1
    }

    fn rhs_col(&self) -> usize {
        self.n_cols() - 1
    }

    fn art_start(&self) -> usize {
        self.n_structural + self.n_slack
    }

    fn structural_values(&self) -> Vec<f64> {
        let rhs_col = self.rhs_col();
        let mut values = vec![0.0; self.n_structural];
        for (i, &basic) in self.basic_vars.iter().enumerate() {
            if basic < self.n_structural {
                values[basic] = self.data[i][rhs_col].max(0.0);
            }
        }
        values
    }
}
