//! Bound tightening and conversion to the standard form the simplex
//! tableau is built from.

use crate::expr::{LinearExpr, Relation};
use crate::model::Model;

const MAX_PASSES: usize = 16;

/// Minimum relative improvement for a tightened bound to count as a change.
const BOUND_EPS: f64 = 1e-7;

/// How a model variable maps onto standard-form columns. Every column is
/// nonnegative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Column {
    /// Bounds meet; the variable is a constant.
    Fixed(f64),
    /// `x = offset + x'`
    Shifted { col: usize, offset: f64 },
    /// `x = offset - x'`, for variables with only an upper bound.
    Mirrored { col: usize, offset: f64 },
    /// `x = x+ - x-`, for free variables.
    Split { pos: usize, neg: usize },
}

impl Column {
    pub(crate) fn value(&self, columns: &[f64]) -> f64 {
        match *self {
            Column::Fixed(value) => value,
            Column::Shifted { col, offset } => offset + columns[col],
            Column::Mirrored { col, offset } => offset - columns[col],
            Column::Split { pos, neg } => columns[pos] - columns[neg],
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Row {
    pub coefficients: Vec<f64>,
    pub relation: Relation,
    pub rhs: f64,
}

/// `maximize objective . x  s.t.  rows, x >= 0`
#[derive(Debug, Clone)]
pub(crate) struct StandardForm {
    pub columns: Vec<Column>,
    pub num_cols: usize,
    pub rows: Vec<Row>,
    pub objective: Vec<f64>,
    /// Tightened bounds per model variable.
    pub bounds: Vec<(f64, f64)>,
}

/// Presolve proved that no assignment satisfies the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Infeasible;

pub(crate) struct Presolve<'a> {
    model: &'a Model,
    bounds: Vec<(f64, f64)>,
    live: Vec<bool>,
    tolerance: f64,
    /// When set, bounds of Integer/Binary variables are rounded inward.
    integrality: Option<f64>,
}

impl<'a> Presolve<'a> {
    pub(crate) fn new(
        model: &'a Model,
        bounds: Vec<(f64, f64)>,
        tolerance: f64,
        integrality: Option<f64>,
    ) -> Self {
        Self {
            model,
            bounds,
            live: vec![true; model.num_constraints()],
            tolerance,
            integrality,
        }
    }

    pub(crate) fn run(mut self) -> Result<StandardForm, Infeasible> {
        for j in 0..self.bounds.len() {
            let (lower, upper) = self.bounds[j];
            self.bounds[j] = (self.round_lower(j, lower), self.round_upper(j, upper));
            self.check(j)?;
        }

        for _ in 0..MAX_PASSES {
            let mut changed = false;
            for i in 0..self.model.num_constraints() {
                if self.live[i] {
                    changed |= self.propagate(i)?;
                }
            }
            if !changed {
                break;
            }
        }

        self.standard_form()
    }

    fn is_integral(&self, j: usize) -> bool {
        self.model.variables()[j].is_integral()
    }

    fn round_lower(&self, j: usize, value: f64) -> f64 {
        match self.integrality {
            Some(tol) if self.is_integral(j) => (value - tol).ceil(),
            _ => value,
        }
    }

    fn round_upper(&self, j: usize, value: f64) -> f64 {
        match self.integrality {
            Some(tol) if self.is_integral(j) => (value + tol).floor(),
            _ => value,
        }
    }

    fn check(&mut self, j: usize) -> Result<(), Infeasible> {
        let (lower, upper) = self.bounds[j];
        if lower > upper {
            if lower - upper > self.tolerance * (1.0 + lower.abs()) {
                return Err(Infeasible);
            }
            self.bounds[j].1 = lower;
        }
        Ok(())
    }

    fn is_fixed(&self, j: usize) -> bool {
        let (lower, upper) = self.bounds[j];
        upper - lower <= self.tolerance
    }

    /// Tighten bounds from constraint `i`, dropping it once the bounds make
    /// it redundant. Returns whether any bound moved.
    fn propagate(&mut self, i: usize) -> Result<bool, Infeasible> {
        let model = self.model;
        let constraint = &model.constraints()[i];
        let (expr, rhs) = (constraint.expr(), constraint.rhs());
        let (changed, redundant) = match constraint.relation() {
            Relation::Le => self.propagate_le(expr, 1.0, rhs)?,
            Relation::Ge => self.propagate_le(expr, -1.0, -rhs)?,
            Relation::Eq => {
                let (up_changed, up_redundant) = self.propagate_le(expr, 1.0, rhs)?;
                let (down_changed, down_redundant) = self.propagate_le(expr, -1.0, -rhs)?;
                (up_changed || down_changed, up_redundant && down_redundant)
            }
        };
        if redundant {
            self.live[i] = false;
        }
        Ok(changed)
    }

    /// Activity-based propagation of `sign * expr <= rhs`.
    fn propagate_le(&mut self, expr: &LinearExpr, sign: f64, rhs: f64) -> Result<(bool, bool), Infeasible> {
        let terms: Vec<(usize, f64)> = expr.terms().map(|(var, coef)| (var.index(), sign * coef)).collect();

        let mut min_finite = 0.0;
        let mut min_infinite = 0usize;
        let mut max_finite = 0.0;
        let mut max_infinite = 0usize;
        for &(j, a) in &terms {
            let (lower, upper) = self.bounds[j];
            let (lo, hi) = if a > 0.0 { (a * lower, a * upper) } else { (a * upper, a * lower) };
            if lo.is_finite() {
                min_finite += lo;
            } else {
                min_infinite += 1;
            }
            if hi.is_finite() {
                max_finite += hi;
            } else {
                max_infinite += 1;
            }
        }

        let slack = self.tolerance * (1.0 + rhs.abs());
        if min_infinite == 0 && min_finite > rhs + slack {
            return Err(Infeasible);
        }
        if max_infinite == 0 && max_finite <= rhs + self.tolerance {
            return Ok((false, true));
        }

        let mut changed = false;
        for &(j, a) in &terms {
            let (lower, upper) = self.bounds[j];
            let lo = if a > 0.0 { a * lower } else { a * upper };
            let residual = if lo.is_finite() {
                if min_infinite > 0 {
                    continue;
                }
                rhs - (min_finite - lo)
            } else {
                if min_infinite > 1 {
                    continue;
                }
                rhs - min_finite
            };
            if a > 0.0 {
                changed |= self.tighten_upper(j, residual / a)?;
            } else {
                changed |= self.tighten_lower(j, residual / a)?;
            }
        }
        Ok((changed, false))
    }

    fn tighten_upper(&mut self, j: usize, value: f64) -> Result<bool, Infeasible> {
        let value = self.round_upper(j, value);
        let upper = self.bounds[j].1;
        if upper.is_infinite() || value < upper - BOUND_EPS * upper.abs().max(1.0) {
            self.bounds[j].1 = value;
            self.check(j)?;
            return Ok(true);
        }
        Ok(false)
    }

    fn tighten_lower(&mut self, j: usize, value: f64) -> Result<bool, Infeasible> {
        let value = self.round_lower(j, value);
        let lower = self.bounds[j].0;
        if lower.is_infinite() || value > lower + BOUND_EPS * lower.abs().max(1.0) {
            self.bounds[j].0 = value;
            self.check(j)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Upper bounds implied by the live rows and the lower bounds alone.
    /// A variable whose own upper bound is no tighter than this needs no
    /// explicit bound row.
    fn implied_uppers(&self) -> Vec<f64> {
        let mut implied = vec![f64::INFINITY; self.bounds.len()];
        for (i, constraint) in self.model.constraints().iter().enumerate() {
            if !self.live[i] {
                continue;
            }
            let signs: &[f64] = match constraint.relation() {
                Relation::Le => &[1.0],
                Relation::Ge => &[-1.0],
                Relation::Eq => &[1.0, -1.0],
            };
            'direction: for &sign in signs {
                let mut rhs = sign * constraint.rhs();
                let mut terms = Vec::new();
                for (var, coef) in constraint.expr().terms() {
                    let (j, a) = (var.index(), sign * coef);
                    let lower = self.bounds[j].0;
                    if self.is_fixed(j) {
                        rhs -= a * lower;
                        continue;
                    }
                    if a < 0.0 || !lower.is_finite() {
                        continue 'direction;
                    }
                    rhs -= a * lower;
                    terms.push((j, a));
                }
                for (j, a) in terms {
                    implied[j] = implied[j].min(self.bounds[j].0 + rhs / a);
                }
            }
        }
        implied
    }

    fn standard_form(self) -> Result<StandardForm, Infeasible> {
        let mut num_cols = 0;
        let columns: Vec<Column> = (0..self.bounds.len())
            .map(|j| {
                let (lower, upper) = self.bounds[j];
                let column = if self.is_fixed(j) {
                    Column::Fixed(lower)
                } else if lower.is_finite() {
                    Column::Shifted { col: num_cols, offset: lower }
                } else if upper.is_finite() {
                    Column::Mirrored { col: num_cols, offset: upper }
                } else {
                    num_cols += 1;
                    Column::Split { pos: num_cols - 1, neg: num_cols }
                };
                if !matches!(column, Column::Fixed(_)) {
                    num_cols += 1;
                }
                column
            })
            .collect();

        let mut rows = Vec::new();
        for (i, constraint) in self.model.constraints().iter().enumerate() {
            if !self.live[i] {
                continue;
            }
            let mut coefficients = vec![0.0; num_cols];
            let mut rhs = constraint.rhs();
            for (var, a) in constraint.expr().terms() {
                match columns[var.index()] {
                    Column::Fixed(value) => rhs -= a * value,
                    Column::Shifted { col, offset } => {
                        coefficients[col] += a;
                        rhs -= a * offset;
                    }
                    Column::Mirrored { col, offset } => {
                        coefficients[col] -= a;
                        rhs -= a * offset;
                    }
                    Column::Split { pos, neg } => {
                        coefficients[pos] += a;
                        coefficients[neg] -= a;
                    }
                }
            }
            if coefficients.iter().all(|&c| c == 0.0) {
                if !constraint.relation().holds(0.0, rhs, self.tolerance * (1.0 + rhs.abs())) {
                    return Err(Infeasible);
                }
                continue;
            }
            rows.push(Row {
                coefficients,
                relation: constraint.relation(),
                rhs,
            });
        }

        let implied = self.implied_uppers();
        for (j, column) in columns.iter().enumerate() {
            if let Column::Shifted { col, offset } = *column {
                let upper = self.bounds[j].1;
                if upper.is_finite() && upper < implied[j] - self.tolerance {
                    let mut coefficients = vec![0.0; num_cols];
                    coefficients[col] = 1.0;
                    rows.push(Row {
                        coefficients,
                        relation: Relation::Le,
                        rhs: upper - offset,
                    });
                }
            }
        }

        let factor = self.model.sense().factor();
        let mut objective = vec![0.0; num_cols];
        for (var, c) in self.model.objective().terms() {
            match columns[var.index()] {
                Column::Fixed(_) => {}
                Column::Shifted { col, .. } => objective[col] += factor * c,
                Column::Mirrored { col, .. } => objective[col] -= factor * c,
                Column::Split { pos, neg } => {
                    objective[pos] += factor * c;
                    objective[neg] -= factor * c;
                }
            }
        }

        Ok(StandardForm {
            columns,
            num_cols,
            rows,
            objective,
            bounds: self.bounds,
        })
    }
}
