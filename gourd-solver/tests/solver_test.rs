//! End-to-end tests of the solving lifecycle through the public API.

use std::path::PathBuf;

use gourd_solver::model::ObjSense;
use gourd_solver::model::VarType;
use gourd_solver::SolveStatus;
use gourd_solver::Solver;
use gourd_solver::Stage;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("gourd-{}-{name}", std::process::id()))
}

#[test]
fn continuous_lp_solves_to_optimality() {
    let mut solver = Solver::default();
    solver.create_prob("lp").unwrap();
    let x = solver
        .create_var("x", 0.0, f64::INFINITY, 1.0, VarType::Continuous)
        .unwrap();
    let y = solver
        .create_var("y", 0.0, f64::INFINITY, 1.0, VarType::Continuous)
        .unwrap();
    solver
        .add_linear_cons("c", &[(x, 1.0), (y, 1.0)], 3.0, f64::INFINITY)
        .unwrap();

    solver.solve().unwrap();

    assert_eq!(SolveStatus::Optimal, solver.status());
    assert_eq!(Stage::Solved, solver.stage());
    let best = solver.best_sol().unwrap();
    assert!((solver.sol_orig_obj(best) - 3.0).abs() < 1e-6);
}

#[test]
fn integer_program_branches_to_optimality() {
    // The LP relaxation has value 1.5; the integer optimum is 2.
    let mut solver = Solver::default();
    solver.create_prob("ip").unwrap();
    let x = solver.create_var("x", 0.0, 10.0, 1.0, VarType::Integer).unwrap();
    let y = solver.create_var("y", 0.0, 10.0, 1.0, VarType::Integer).unwrap();
    solver
        .add_linear_cons("c", &[(x, 2.0), (y, 2.0)], 3.0, f64::INFINITY)
        .unwrap();

    solver.solve().unwrap();

    assert_eq!(SolveStatus::Optimal, solver.status());
    let best = solver.best_sol().unwrap();
    assert!((solver.sol_orig_obj(best) - 2.0).abs() < 1e-6);
}

#[test]
fn infeasible_problem_is_detected() {
    let mut solver = Solver::default();
    solver.create_prob("infeasible").unwrap();
    let x = solver.create_var("x", 0.0, 1.0, 0.0, VarType::Binary).unwrap();
    solver
        .add_linear_cons("c", &[(x, 1.0)], 2.0, f64::INFINITY)
        .unwrap();

    solver.solve().unwrap();

    assert_eq!(SolveStatus::Infeasible, solver.status());
    assert_eq!(0, solver.n_sols());
}

#[test]
fn unbounded_problem_reports_a_ray() {
    let mut solver = Solver::default();
    solver.create_prob("unbounded").unwrap();
    let x = solver
        .create_var("x", f64::NEG_INFINITY, 0.0, 1.0, VarType::Continuous)
        .unwrap();

    solver.solve().unwrap();

    assert_eq!(SolveStatus::Unbounded, solver.status());
    assert!(solver.has_primal_ray());
    // The improving direction drives the variable downwards.
    assert!(solver.primal_ray_val(x) < 0.0);
}

#[test]
fn maximisation_is_mapped_back_to_the_original_sense() {
    let mut solver = Solver::default();
    solver.create_prob("max").unwrap();
    let x = solver.create_var("x", 0.0, 5.0, 1.0, VarType::Integer).unwrap();
    let y = solver.create_var("y", 0.0, 5.0, 2.0, VarType::Integer).unwrap();
    solver
        .add_linear_cons("c", &[(x, 1.0), (y, 1.0)], f64::NEG_INFINITY, 6.0)
        .unwrap();
    solver.set_obj_sense(ObjSense::Maximize).unwrap();

    solver.solve().unwrap();

    assert_eq!(SolveStatus::Optimal, solver.status());
    // x = 1, y = 5 maximises x + 2y under x + y <= 6.
    let best = solver.best_sol().unwrap();
    assert!((solver.sol_orig_obj(best) - 11.0).abs() < 1e-6);
}

#[test]
fn node_limit_stops_the_search() {
    let mut solver = Solver::default();
    solver.create_prob("limited").unwrap();
    let x = solver.create_var("x", 0.0, 10.0, 1.0, VarType::Integer).unwrap();
    let y = solver.create_var("y", 0.0, 10.0, 1.0, VarType::Integer).unwrap();
    solver
        .add_linear_cons("c", &[(x, 2.0), (y, 2.0)], 3.0, f64::INFINITY)
        .unwrap();
    solver.params.set_long("limits/nodes", 1).unwrap();

    solver.solve().unwrap();

    assert_eq!(SolveStatus::NodeLimit, solver.status());
    assert_eq!(1, solver.n_nodes());
}

#[test]
fn objective_limit_prunes_all_solutions() {
    let mut solver = Solver::default();
    solver.create_prob("limited-obj").unwrap();
    let x = solver.create_var("x", 0.0, 10.0, 1.0, VarType::Integer).unwrap();
    let y = solver.create_var("y", 0.0, 10.0, 1.0, VarType::Integer).unwrap();
    solver
        .add_linear_cons("c", &[(x, 2.0), (y, 2.0)], 3.0, f64::INFINITY)
        .unwrap();
    // The integer optimum is 2; nothing beats 1.9.
    solver.params.set_real("limits/objective", 1.9).unwrap();

    solver.solve().unwrap();

    assert_eq!(SolveStatus::Infeasible, solver.status());
    assert_eq!(0, solver.n_sols());
}

#[test]
fn a_loose_objective_limit_leaves_the_optimum() {
    let mut solver = Solver::default();
    solver.create_prob("loose-obj").unwrap();
    let x = solver.create_var("x", 0.0, 10.0, 1.0, VarType::Integer).unwrap();
    let y = solver.create_var("y", 0.0, 10.0, 1.0, VarType::Integer).unwrap();
    solver
        .add_linear_cons("c", &[(x, 2.0), (y, 2.0)], 3.0, f64::INFINITY)
        .unwrap();
    solver.params.set_real("limits/objective", 100.0).unwrap();

    solver.solve().unwrap();

    assert_eq!(SolveStatus::Optimal, solver.status());
    let best = solver.best_sol().unwrap();
    assert!((solver.sol_orig_obj(best) - 2.0).abs() < 1e-6);
}

#[test]
fn restart_preserves_the_incumbent() {
    let mut solver = Solver::default();
    solver.create_prob("restarted").unwrap();
    let x = solver.create_var("x", 0.0, 10.0, 1.0, VarType::Integer).unwrap();
    let y = solver.create_var("y", 0.0, 10.0, 1.0, VarType::Integer).unwrap();
    solver
        .add_linear_cons("c", &[(x, 2.0), (y, 2.0)], 3.0, f64::INFINITY)
        .unwrap();

    solver.solve().unwrap();
    assert_eq!(SolveStatus::Optimal, solver.status());

    solver.free_solve(true).unwrap();
    assert_eq!(Stage::Transformed, solver.stage());
    assert_eq!(1, solver.n_restarts());
    assert_eq!(1, solver.n_sols());

    solver.solve().unwrap();
    assert_eq!(SolveStatus::Optimal, solver.status());
    let best = solver.best_sol().unwrap();
    assert!((solver.sol_orig_obj(best) - 2.0).abs() < 1e-6);
}

#[test]
fn probing_is_fully_undone() {
    let mut solver = Solver::default();
    solver.create_prob("probed").unwrap();
    let x = solver.create_var("x", 0.0, 10.0, 1.0, VarType::Integer).unwrap();
    let y = solver.create_var("y", 0.0, 10.0, 1.0, VarType::Integer).unwrap();
    solver
        .add_linear_cons("c", &[(x, 1.0), (y, 1.0)], f64::NEG_INFINITY, 4.0)
        .unwrap();
    solver.transform().unwrap();

    solver.start_probing().unwrap();
    solver.chg_var_lb_probing(x, 3.0).unwrap();
    let (cutoff, ndomreds) = solver.propagate_probing(-1).unwrap();
    assert!(!cutoff);
    assert!(ndomreds > 0);
    // x >= 3 and x + y <= 4 force y <= 1.
    assert!((solver.var_ub_local(y).unwrap() - 1.0).abs() < 1e-6);

    solver.end_probing().unwrap();
    assert!(!solver.in_probing());
    assert_eq!(0.0, solver.var_lb_local(x).unwrap());
    assert_eq!(10.0, solver.var_ub_local(y).unwrap());
}

#[test]
fn probing_detects_a_cutoff() {
    let mut solver = Solver::default();
    solver.create_prob("probed").unwrap();
    let x = solver.create_var("x", 0.0, 10.0, 1.0, VarType::Integer).unwrap();
    let y = solver.create_var("y", 0.0, 10.0, 1.0, VarType::Integer).unwrap();
    solver
        .add_linear_cons("c", &[(x, 1.0), (y, 1.0)], f64::NEG_INFINITY, 4.0)
        .unwrap();
    solver.transform().unwrap();

    solver.start_probing().unwrap();
    solver.chg_var_lb_probing(x, 3.0).unwrap();
    solver.chg_var_lb_probing(y, 2.0).unwrap();
    let (cutoff, _) = solver.propagate_probing(-1).unwrap();
    assert!(cutoff);
    solver.end_probing().unwrap();

    // The probe leaves no trace; the real solve still reaches the optimum.
    solver.solve().unwrap();
    assert_eq!(SolveStatus::Optimal, solver.status());
}

#[test]
fn solution_pool_orders_by_objective() {
    let mut solver = Solver::default();
    solver.create_prob("pool").unwrap();
    let x = solver.create_var("x", 0.0, 20.0, 1.0, VarType::Integer).unwrap();
    solver.transform().unwrap();

    for value in [10.0, 7.0, 8.0] {
        let mut sol = solver.create_sol().unwrap();
        sol.set_val(x, value);
        assert!(solver.try_sol(sol).unwrap());
    }

    let objs: Vec<f64> = solver.sols().iter().map(|sol| sol.obj).collect();
    assert_eq!(vec![7.0, 8.0, 10.0], objs);
    assert_eq!(7.0, solver.best_sol().unwrap().obj);
}

#[test]
fn infeasible_candidate_solutions_are_rejected() {
    let mut solver = Solver::default();
    solver.create_prob("reject").unwrap();
    let x = solver.create_var("x", 0.0, 10.0, 1.0, VarType::Integer).unwrap();
    solver
        .add_linear_cons("c", &[(x, 1.0)], 3.0, f64::INFINITY)
        .unwrap();
    solver.transform().unwrap();

    let mut sol = solver.create_sol().unwrap();
    sol.set_val(x, 1.0);
    assert!(!solver.try_sol(sol).unwrap());
    assert_eq!(0, solver.n_sols());
}

#[test]
fn parameter_files_round_trip() {
    let mut solver = Solver::default();
    solver.params.set_long("limits/nodes", 500).unwrap();
    solver.params.set_int("separating/maxcuts", 42).unwrap();
    solver.params.set_bool("conflict/enable", false).unwrap();

    let path = temp_path("settings.set");
    solver.write_params(&path, true, true).unwrap();

    let mut reread = Solver::default();
    reread.read_params(&path).unwrap();
    assert_eq!(500, reread.params.get_long("limits/nodes").unwrap());
    assert_eq!(42, reread.params.get_int("separating/maxcuts").unwrap());
    assert!(!reread.params.get_bool("conflict/enable").unwrap());

    let _ = std::fs::remove_file(&path);
}

#[test]
fn cip_files_round_trip() {
    let mut solver = Solver::default();
    solver.create_prob("roundtrip").unwrap();
    let x = solver.create_var("x", 0.0, 10.0, 1.0, VarType::Integer).unwrap();
    let y = solver
        .create_var("y", 0.0, f64::INFINITY, 2.5, VarType::Continuous)
        .unwrap();
    solver
        .add_linear_cons("c", &[(x, 1.0), (y, -2.0)], 3.0, f64::INFINITY)
        .unwrap();

    let path = temp_path("roundtrip.cip");
    solver.write_orig_problem(&path).unwrap();
    let first = std::fs::read_to_string(&path).unwrap();

    let mut reread = Solver::default();
    reread.read_prob(&path).unwrap();
    assert_eq!(Stage::Problem, reread.stage());
    reread.write_orig_problem(&path).unwrap();
    let second = std::fs::read_to_string(&path).unwrap();
    assert_eq!(first, second);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn best_solution_is_written_in_the_original_sense() {
    let mut solver = Solver::default();
    solver.create_prob("written").unwrap();
    let x = solver.create_var("x", 0.0, 5.0, 1.0, VarType::Integer).unwrap();
    solver
        .add_linear_cons("c", &[(x, 1.0)], 2.0, f64::INFINITY)
        .unwrap();
    solver.solve().unwrap();
    assert_eq!(SolveStatus::Optimal, solver.status());

    let path = temp_path("best.sol");
    solver.write_best_sol(&path).unwrap();
    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains('x'));

    let _ = std::fs::remove_file(&path);
}
