//! Randomized checks on small bounded models, cross-checked by enumeration.

use lpmix_solver::*;
use proptest::prelude::*;

const TOL: f64 = 1e-6;

/// Two nonnegative variables under `<=` rows with positive coefficients,
/// so every instance is feasible (at the origin) and bounded.
#[derive(Debug, Clone)]
struct Instance {
    objective: [f64; 2],
    rows: Vec<([f64; 2], f64)>,
}

fn instance() -> impl Strategy<Value = Instance> {
    let coefficient = (1u32..10).prop_map(f64::from);
    let row = ([coefficient.clone(), coefficient.clone()], (10u32..100).prop_map(f64::from));
    ([coefficient.clone(), coefficient], prop::collection::vec(row, 1..4))
        .prop_map(|(objective, rows)| Instance { objective, rows })
}

fn build(instance: &Instance, integer: bool) -> (Model, [VarId; 2]) {
    let mut model = Model::maximize();
    let make = |name: &str| if integer { Variable::integer(name) } else { Variable::continuous(name) };
    let x = model.add_variable(make("x")).unwrap();
    let y = model.add_variable(make("y")).unwrap();
    for &([a, b], rhs) in &instance.rows {
        model.add_constraint((a * x + b * y).leq(rhs)).unwrap();
    }
    let [cx, cy] = instance.objective;
    model.set_objective(cx * x + cy * y, Sense::Maximize).unwrap();
    (model, [x, y])
}

/// Best integer objective by trying every lattice point in the box.
fn enumerate(instance: &Instance) -> f64 {
    let fits = |x: f64, y: f64| instance.rows.iter().all(|&([a, b], rhs)| a * x + b * y <= rhs);
    let mut best = f64::NEG_INFINITY;
    for x in 0..=100 {
        for y in 0..=100 {
            let (x, y) = (f64::from(x), f64::from(y));
            if fits(x, y) {
                best = best.max(instance.objective[0] * x + instance.objective[1] * y);
            }
        }
    }
    best
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn relaxation_is_feasible(instance in instance()) {
        let (model, [x, y]) = build(&instance, false);
        let result = solve(&model);
        prop_assert_eq!(result.status(), Status::Optimal);

        let values = [result.value(x).unwrap(), result.value(y).unwrap()];
        prop_assert!(values.iter().all(|&v| v >= -TOL));
        for constraint in model.constraints() {
            prop_assert!(constraint.is_satisfied(&values, TOL));
        }
    }

    #[test]
    fn integer_optimum_matches_enumeration(instance in instance()) {
        let (relaxed_model, _) = build(&instance, false);
        let (model, [x, y]) = build(&instance, true);

        let relaxed = solve(&relaxed_model).objective_value().unwrap();
        let result = solve(&model);
        prop_assert_eq!(result.status(), Status::Optimal);

        let objective = result.objective_value().unwrap();
        prop_assert!(objective <= relaxed + TOL);
        prop_assert!((objective - enumerate(&instance)).abs() < TOL);

        let (xv, yv) = (result.value(x).unwrap(), result.value(y).unwrap());
        prop_assert_eq!(xv, xv.round());
        prop_assert_eq!(yv, yv.round());
        for &([a, b], rhs) in &instance.rows {
            prop_assert!(a * xv + b * yv <= rhs + TOL);
        }
    }
}
