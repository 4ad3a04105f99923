use lpmix_solver::{Model, ModelError, Sense, VarId, Variable};

/// Two products `a` and `b` sharing two raw materials.
///
/// maximize 1000a + 1000b
///   s.t.   48a + 35b <= 8400
///          36a + 49b <= 10800
///          a, b >= 0
pub struct Chemical {
    pub model: Model,
    pub a: VarId,
    pub b: VarId,
}

impl Chemical {
    /// `integer` makes both quantities Integer; otherwise they are free
    /// variables kept nonnegative by explicit constraints.
    pub fn build(integer: bool) -> Result<Self, ModelError> {
        let variable = |name: &str| {
            if integer {
                Variable::integer(name)
            } else {
                Variable::free(name)
            }
        };

        let mut model = Model::maximize();
        let a = model.add_variable(variable("a"))?;
        let b = model.add_variable(variable("b"))?;

        model.add_constraint((48.0 * a + 35.0 * b).leq(8400.0).with_name("material_1"))?;
        model.add_constraint((36.0 * a + 49.0 * b).leq(10800.0).with_name("material_2"))?;
        model.add_constraint(a.geq(0.0))?;
        model.add_constraint(b.geq(0.0))?;
        model.set_objective(1000.0 * a + 1000.0 * b, Sense::Maximize)?;

        Ok(Self { model, a, b })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lpmix_solver::{Solver, Status, solve};

    #[test]
    fn test_continuous() {
        let chemical = Chemical::build(false).unwrap();
        let result = solve(&chemical.model);
        assert_eq!(result.status(), Status::Optimal);
        assert!((result.objective_value().unwrap() - 228571.428571).abs() < 1e-3);
        assert!((result.value(chemical.a).unwrap() - 30.769231).abs() < 1e-6);
        assert!((result.value(chemical.b).unwrap() - 197.802198).abs() < 1e-6);
    }

    #[test]
    fn test_integer() {
        let chemical = Chemical::build(true).unwrap();
        let result = Solver::new().with_threads(2).solve(&chemical.model);
        assert_eq!(result.status(), Status::Optimal);
        assert_eq!(result.objective_value(), Some(228000.0));
        let a = result.value(chemical.a).unwrap();
        assert!((29.0..=32.0).contains(&a));
        assert_eq!(a + result.value(chemical.b).unwrap(), 228.0);
    }
}
