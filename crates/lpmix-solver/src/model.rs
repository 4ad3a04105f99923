use std::collections::HashMap;
use std::fmt;

use crate::error::ModelError;
use crate::expr::{Constraint, LinearExpr};

/// Index of a variable in its model's arena.
///
/// An id carries no reference to the model that issued it. A model rejects
/// ids past its own variable count with [`ModelError::UnknownVariable`], but
/// an id from another model that happens to be in range names whichever
/// variable sits at that index here.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(usize);

impl VarId {
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    /// Any real value within bounds
    Continuous,
    /// Integer values within bounds
    Integer,
    /// 0 or 1
    Binary,
}

/// A decision variable before it is added to a [`Model`].
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    name: String,
    domain: Domain,
    lower: f64,
    upper: f64,
}

impl Variable {
    fn with_domain(name: impl Into<String>, domain: Domain, lower: f64, upper: f64) -> Self {
        Self {
            name: name.into(),
            domain,
            lower,
            upper,
        }
    }

    /// Continuous variable with bounds `[0, +inf)`.
    pub fn continuous(name: impl Into<String>) -> Self {
        Self::with_domain(name, Domain::Continuous, 0.0, f64::INFINITY)
    }

    /// Integer variable with bounds `[0, +inf)`.
    pub fn integer(name: impl Into<String>) -> Self {
        Self::with_domain(name, Domain::Integer, 0.0, f64::INFINITY)
    }

    /// Binary variable, bounds `[0, 1]`.
    pub fn binary(name: impl Into<String>) -> Self {
        Self::with_domain(name, Domain::Binary, 0.0, 1.0)
    }

    /// Continuous variable with no bounds at all.
    pub fn free(name: impl Into<String>) -> Self {
        Self::with_domain(name, Domain::Continuous, f64::NEG_INFINITY, f64::INFINITY)
    }

    /// Replace both bounds. Use `f64::NEG_INFINITY` / `f64::INFINITY` for no bound.
    pub fn with_bounds(mut self, lower: f64, upper: f64) -> Self {
        self.lower = lower;
        self.upper = upper;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn lower(&self) -> f64 {
        self.lower
    }

    pub fn upper(&self) -> f64 {
        self.upper
    }

    /// Integer or Binary.
    pub fn is_integral(&self) -> bool {
        matches!(self.domain, Domain::Integer | Domain::Binary)
    }

    fn validate(&self) -> Result<(), ModelError> {
        let (lower, upper) = (self.lower, self.upper);
        if lower.is_nan() || upper.is_nan() || lower == f64::INFINITY || upper == f64::NEG_INFINITY || lower > upper {
            return Err(ModelError::InvalidBounds {
                name: self.name.clone(),
                lower,
                upper,
            });
        }
        if self.domain == Domain::Binary && (lower < 0.0 || upper > 1.0) {
            return Err(ModelError::BinaryBounds {
                name: self.name.clone(),
                lower,
                upper,
            });
        }
        Ok(())
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Maximize,
    Minimize,
}

impl Sense {
    /// +1 for Maximize, -1 for Minimize. Multiplying an objective value by
    /// this factor turns "better" into "larger".
    pub(crate) fn factor(self) -> f64 {
        match self {
            Sense::Maximize => 1.0,
            Sense::Minimize => -1.0,
        }
    }
}

/// A linear or mixed-integer program.
///
/// Variables live in an arena addressed by [`VarId`] and keep their
/// insertion order. Every mutation is validated, so a `Model` that exists is
/// always well formed. Solvers only borrow it.
#[derive(Debug, Clone)]
pub struct Model {
    variables: Vec<Variable>,
    names: HashMap<String, VarId>,
    constraints: Vec<Constraint>,
    objective: LinearExpr,
    sense: Sense,
}

impl Model {
    pub fn new(sense: Sense) -> Self {
        Self {
            variables: Vec::new(),
            names: HashMap::new(),
            constraints: Vec::new(),
            objective: LinearExpr::new(),
            sense,
        }
    }

    pub fn maximize() -> Self {
        Self::new(Sense::Maximize)
    }

    pub fn minimize() -> Self {
        Self::new(Sense::Minimize)
    }

    pub fn add_variable(&mut self, variable: Variable) -> Result<VarId, ModelError> {
        variable.validate()?;
        if self.names.contains_key(&variable.name) {
            return Err(ModelError::DuplicateVariable(variable.name));
        }
        let id = VarId(self.variables.len());
        self.names.insert(variable.name.clone(), id);
        self.variables.push(variable);
        Ok(id)
    }

    pub fn add_constraint(&mut self, constraint: Constraint) -> Result<(), ModelError> {
        let context = constraint.name().unwrap_or("constraint").to_string();
        self.check_expr(constraint.expr(), &context)?;
        if !constraint.rhs().is_finite() {
            return Err(ModelError::NonFinite(context));
        }
        self.constraints.push(constraint);
        Ok(())
    }

    pub fn set_objective(&mut self, objective: impl Into<LinearExpr>, sense: Sense) -> Result<(), ModelError> {
        let objective = objective.into();
        self.check_expr(&objective, "objective")?;
        self.objective = objective;
        self.sense = sense;
        Ok(())
    }

    fn check_expr(&self, expr: &LinearExpr, context: &str) -> Result<(), ModelError> {
        for (var, coef) in expr.terms() {
            if var.index() >= self.variables.len() {
                return Err(ModelError::UnknownVariable(var.index()));
            }
            if !coef.is_finite() {
                return Err(ModelError::NonFinite(context.to_string()));
            }
        }
        if !expr.constant().is_finite() {
            return Err(ModelError::NonFinite(context.to_string()));
        }
        Ok(())
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// Panics if `id` came from a different model with more variables.
    pub fn variable(&self, id: VarId) -> &Variable {
        &self.variables[id.0]
    }

    pub fn variable_by_name(&self, name: &str) -> Option<VarId> {
        self.names.get(name).copied()
    }

    pub fn var_ids(&self) -> impl Iterator<Item = VarId> + use<> {
        (0..self.variables.len()).map(VarId)
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn objective(&self) -> &LinearExpr {
        &self.objective
    }

    pub fn sense(&self) -> Sense {
        self.sense
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn has_integral_variables(&self) -> bool {
        self.variables.iter().any(Variable::is_integral)
    }

    pub(crate) fn bounds(&self) -> Vec<(f64, f64)> {
        self.variables.iter().map(|v| (v.lower, v.upper)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_defaults() {
        let x = Variable::continuous("x");
        assert_eq!((x.lower(), x.upper()), (0.0, f64::INFINITY));
        let b = Variable::binary("b");
        assert_eq!((b.lower(), b.upper()), (0.0, 1.0));
        assert!(b.is_integral());
        let f = Variable::free("f");
        assert_eq!((f.lower(), f.upper()), (f64::NEG_INFINITY, f64::INFINITY));
    }

    #[test]
    fn test_invalid_bounds_rejected() {
        let mut model = Model::minimize();
        let err = model
            .add_variable(Variable::continuous("x").with_bounds(5.0, 1.0))
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidBounds { .. }));

        let err = model
            .add_variable(Variable::continuous("y").with_bounds(f64::NAN, 1.0))
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidBounds { .. }));

        let err = model
            .add_variable(Variable::binary("b").with_bounds(0.0, 2.0))
            .unwrap_err();
        assert!(matches!(err, ModelError::BinaryBounds { .. }));

        assert_eq!(model.num_variables(), 0);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut model = Model::minimize();
        let x = model.add_variable(Variable::continuous("x")).unwrap();
        assert_eq!(model.variable_by_name("x"), Some(x));
        let err = model.add_variable(Variable::integer("x")).unwrap_err();
        assert_eq!(err, ModelError::DuplicateVariable("x".to_string()));
    }

    #[test]
    fn test_foreign_variable_rejected() {
        let mut other = Model::minimize();
        other.add_variable(Variable::continuous("a")).unwrap();
        let foreign = other.add_variable(Variable::continuous("b")).unwrap();

        let mut model = Model::minimize();
        model.add_variable(Variable::continuous("x")).unwrap();
        let err = model.add_constraint(LinearExpr::from(foreign).leq(1.0)).unwrap_err();
        assert_eq!(err, ModelError::UnknownVariable(1));
        let err = model.set_objective(foreign, Sense::Maximize).unwrap_err();
        assert_eq!(err, ModelError::UnknownVariable(1));
    }

    #[test]
    fn test_in_range_foreign_id_aliases_by_index() {
        let mut other = Model::minimize();
        let foreign = other.add_variable(Variable::continuous("a")).unwrap();

        let mut model = Model::minimize();
        let x = model.add_variable(Variable::continuous("x")).unwrap();
        // Ids are bare indices, so index 0 of any model names `x` here.
        assert_eq!(foreign, x);
        model.add_constraint(LinearExpr::from(foreign).leq(1.0)).unwrap();
        assert_eq!(model.variable(foreign).name(), "x");
    }

    #[test]
    fn test_non_finite_rejected() {
        let mut model = Model::minimize();
        let x = model.add_variable(Variable::continuous("x")).unwrap();
        let err = model
            .add_constraint((f64::INFINITY * x).leq(1.0).with_name("cap"))
            .unwrap_err();
        assert_eq!(err, ModelError::NonFinite("cap".to_string()));
        let err = model.add_constraint((1.0 * x).leq(f64::NAN)).unwrap_err();
        assert!(matches!(err, ModelError::NonFinite(_)));
        assert_eq!(model.num_constraints(), 0);
    }
}
