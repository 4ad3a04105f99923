use std::collections::BTreeMap;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Mul, Neg, Sub};

use crate::model::VarId;

/// A linear combination of variables plus a constant term.
///
/// Terms are keyed by [`VarId`], so each variable appears at most once and
/// iteration follows variable insertion order. Expressions are values: the
/// arithmetic operators consume their operands and return a new expression.
///
/// ```
/// use lpmix_solver::{Model, Variable, LinearExpr};
///
/// let mut model = Model::maximize();
/// let a = model.add_variable(Variable::continuous("a")).unwrap();
/// let b = model.add_variable(Variable::continuous("b")).unwrap();
/// let expr = 48.0 * a + 35.0 * b + 1.0;
/// assert_eq!(expr.coefficient(a), 48.0);
/// assert_eq!(expr.constant(), 1.0);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpr {
    terms: BTreeMap<VarId, f64>,
    constant: f64,
}

impl LinearExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_constant(value: f64) -> Self {
        Self {
            terms: BTreeMap::new(),
            constant: value,
        }
    }

    pub fn term(var: VarId, coefficient: f64) -> Self {
        Self::new().with_term(var, coefficient)
    }

    pub fn with_term(mut self, var: VarId, coefficient: f64) -> Self {
        self.add_term(var, coefficient);
        self
    }

    fn add_term(&mut self, var: VarId, coefficient: f64) {
        let entry = self.terms.entry(var).or_insert(0.0);
        *entry += coefficient;
        if *entry == 0.0 {
            self.terms.remove(&var);
        }
    }

    /// Coefficient of `var`, zero when the variable does not appear.
    pub fn coefficient(&self, var: VarId) -> f64 {
        self.terms.get(&var).copied().unwrap_or(0.0)
    }

    pub fn constant(&self) -> f64 {
        self.constant
    }

    /// Variable terms in variable order. Zero coefficients are never stored.
    pub fn terms(&self) -> impl Iterator<Item = (VarId, f64)> + '_ {
        self.terms.iter().map(|(&var, &coef)| (var, coef))
    }

    pub fn num_terms(&self) -> usize {
        self.terms.len()
    }

    /// Evaluate against a full assignment indexed by variable index.
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .fold(self.constant, |acc, (var, coef)| acc + coef * values[var.index()])
    }

    pub fn leq(self, rhs: impl Into<LinearExpr>) -> Constraint {
        Constraint::new(self, Relation::Le, rhs)
    }

    pub fn geq(self, rhs: impl Into<LinearExpr>) -> Constraint {
        Constraint::new(self, Relation::Ge, rhs)
    }

    pub fn equals(self, rhs: impl Into<LinearExpr>) -> Constraint {
        Constraint::new(self, Relation::Eq, rhs)
    }
}

impl From<VarId> for LinearExpr {
    fn from(var: VarId) -> Self {
        Self::term(var, 1.0)
    }
}

impl From<f64> for LinearExpr {
    fn from(value: f64) -> Self {
        Self::from_constant(value)
    }
}

impl<T: Into<LinearExpr>> Add<T> for LinearExpr {
    type Output = LinearExpr;

    fn add(mut self, rhs: T) -> LinearExpr {
        let rhs = rhs.into();
        for (var, coef) in rhs.terms {
            self.add_term(var, coef);
        }
        self.constant += rhs.constant;
        self
    }
}

impl<T: Into<LinearExpr>> Sub<T> for LinearExpr {
    type Output = LinearExpr;

    fn sub(self, rhs: T) -> LinearExpr {
        self + (-rhs.into())
    }
}

impl Neg for LinearExpr {
    type Output = LinearExpr;

    fn neg(self) -> LinearExpr {
        self * -1.0
    }
}

impl Mul<f64> for LinearExpr {
    type Output = LinearExpr;

    fn mul(self, scalar: f64) -> LinearExpr {
        if scalar == 0.0 {
            return LinearExpr::new();
        }
        LinearExpr {
            terms: self.terms.into_iter().map(|(var, coef)| (var, coef * scalar)).collect(),
            constant: self.constant * scalar,
        }
    }
}

impl Mul<LinearExpr> for f64 {
    type Output = LinearExpr;

    fn mul(self, expr: LinearExpr) -> LinearExpr {
        expr * self
    }
}

impl Mul<f64> for VarId {
    type Output = LinearExpr;

    fn mul(self, scalar: f64) -> LinearExpr {
        LinearExpr::term(self, scalar)
    }
}

impl Mul<VarId> for f64 {
    type Output = LinearExpr;

    fn mul(self, var: VarId) -> LinearExpr {
        LinearExpr::term(var, self)
    }
}

impl<T: Into<LinearExpr>> Add<T> for VarId {
    type Output = LinearExpr;

    fn add(self, rhs: T) -> LinearExpr {
        LinearExpr::from(self) + rhs
    }
}

impl<T: Into<LinearExpr>> Sub<T> for VarId {
    type Output = LinearExpr;

    fn sub(self, rhs: T) -> LinearExpr {
        LinearExpr::from(self) - rhs
    }
}

impl Neg for VarId {
    type Output = LinearExpr;

    fn neg(self) -> LinearExpr {
        LinearExpr::term(self, -1.0)
    }
}

impl VarId {
    pub fn leq(self, rhs: impl Into<LinearExpr>) -> Constraint {
        LinearExpr::from(self).leq(rhs)
    }

    pub fn geq(self, rhs: impl Into<LinearExpr>) -> Constraint {
        LinearExpr::from(self).geq(rhs)
    }

    pub fn equals(self, rhs: impl Into<LinearExpr>) -> Constraint {
        LinearExpr::from(self).equals(rhs)
    }
}

impl Sum for LinearExpr {
    fn sum<I: Iterator<Item = LinearExpr>>(iter: I) -> Self {
        iter.fold(LinearExpr::new(), |acc, expr| acc + expr)
    }
}

impl Sum<VarId> for LinearExpr {
    fn sum<I: Iterator<Item = VarId>>(iter: I) -> Self {
        iter.fold(LinearExpr::new(), |acc, var| acc + var)
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// Less than or equal (<=)
    Le,
    /// Greater than or equal (>=)
    Ge,
    /// Equal (=)
    Eq,
}

impl Relation {
    /// Whether `lhs <relation> rhs` holds within `tolerance`.
    pub fn holds(self, lhs: f64, rhs: f64, tolerance: f64) -> bool {
        match self {
            Relation::Le => lhs <= rhs + tolerance,
            Relation::Ge => lhs >= rhs - tolerance,
            Relation::Eq => (lhs - rhs).abs() <= tolerance,
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relation::Le => write!(f, "<="),
            Relation::Ge => write!(f, ">="),
            Relation::Eq => write!(f, "="),
        }
    }
}

/// A linear constraint `expr <relation> rhs`.
///
/// Construction moves every variable term to the left-hand side and every
/// constant to the right-hand side, so `expr` never carries a constant.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    name: Option<String>,
    expr: LinearExpr,
    relation: Relation,
    rhs: f64,
}

impl Constraint {
    pub fn new(lhs: impl Into<LinearExpr>, relation: Relation, rhs: impl Into<LinearExpr>) -> Self {
        let mut expr = lhs.into() - rhs.into();
        let rhs = -expr.constant;
        expr.constant = 0.0;
        Self {
            name: None,
            expr,
            relation,
            rhs,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn expr(&self) -> &LinearExpr {
        &self.expr
    }

    pub fn relation(&self) -> Relation {
        self.relation
    }

    pub fn rhs(&self) -> f64 {
        self.rhs
    }

    pub fn is_satisfied(&self, values: &[f64], tolerance: f64) -> bool {
        self.relation.holds(self.expr.evaluate(values), self.rhs, tolerance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(index: usize) -> VarId {
        VarId::from_index(index)
    }

    #[test]
    fn test_terms_merge_and_cancel() {
        let x = var(0);
        let y = var(1);
        let expr = 2.0 * x + 3.0 * y + x - 3.0 * y;
        assert_eq!(expr.coefficient(x), 3.0);
        assert_eq!(expr.coefficient(y), 0.0);
        assert_eq!(expr.num_terms(), 1);
    }

    #[test]
    fn test_scaling_and_negation() {
        let x = var(0);
        let expr = -((x + 2.0) * 3.0);
        assert_eq!(expr.coefficient(x), -3.0);
        assert_eq!(expr.constant(), -6.0);
        assert_eq!((expr * 0.0).num_terms(), 0);
    }

    #[test]
    fn test_sum_of_variables() {
        let expr: LinearExpr = (0..4).map(var).sum();
        assert_eq!(expr.num_terms(), 4);
        assert!(expr.terms().all(|(_, coef)| coef == 1.0));
        let order: Vec<usize> = expr.terms().map(|(v, _)| v.index()).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_constraint_normalization() {
        let x = var(0);
        let y = var(1);
        // x + 5 <= 2y + 1  =>  x - 2y <= -4
        let c = (x + 5.0).leq(2.0 * y + 1.0);
        assert_eq!(c.relation(), Relation::Le);
        assert_eq!(c.expr().coefficient(x), 1.0);
        assert_eq!(c.expr().coefficient(y), -2.0);
        assert_eq!(c.expr().constant(), 0.0);
        assert_eq!(c.rhs(), -4.0);
    }

    #[test]
    fn test_evaluate_and_satisfaction() {
        let x = var(0);
        let y = var(1);
        let c = (48.0 * x + 35.0 * y).leq(8400.0);
        assert_eq!(c.expr().evaluate(&[100.0, 120.0]), 9000.0);
        assert!(!c.is_satisfied(&[100.0, 120.0], 1e-9));
        assert!(c.is_satisfied(&[100.0, 100.0], 1e-9));
        assert!((x.equals(1.0)).is_satisfied(&[1.0 + 1e-12], 1e-9));
    }
}
