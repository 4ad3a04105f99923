mod chemical;
mod sudoku;

use clap::{Parser, Subcommand, ValueEnum};
use lpmix_solver::{Solver, SolverResult, Status};
use serde_json::json;
use std::fmt::Display;
use std::path::PathBuf;

use chemical::Chemical;
use sudoku::{Board, Sudoku};

#[derive(Parser)]
#[command(name = "lpmix")]
#[command(about = "Linear and integer programming examples", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Pretty,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve the two-product chemical mix problem
    Chemical {
        /// Restrict both quantities to whole numbers
        #[arg(short, long)]
        integer: bool,
        /// Output format
        #[arg(short, long, value_enum, default_value = "pretty")]
        format: Format,
        /// Branch-and-bound worker threads
        #[arg(short, long, default_value_t = 1)]
        threads: usize,
    },
    /// Solve a Sudoku puzzle
    Sudoku {
        /// Puzzle file: 9 lines of 9 cells, 0 or '.' for blanks (defaults to a built-in puzzle)
        file: Option<PathBuf>,
        /// Output format
        #[arg(short, long, value_enum, default_value = "pretty")]
        format: Format,
        /// Branch-and-bound worker threads
        #[arg(short, long, default_value_t = 1)]
        threads: usize,
    },
}

fn fail(message: impl Display) -> ! {
    eprintln!("{}", message);
    std::process::exit(1);
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => fail(format!("Error writing JSON: {}", e)),
    }
}

/// Explain a non-optimal outcome and exit.
fn report_failure(result: &SolverResult) -> ! {
    println!("Status: {}", result.status());
    match result.status() {
        Status::Infeasible => println!("No solution exists that satisfies all constraints."),
        Status::Unbounded => println!("The problem has no finite optimal solution."),
        _ => println!("The solver stopped before proving optimality."),
    }
    std::process::exit(1);
}

fn print_stats(result: &SolverResult) {
    let stats = result.stats();
    println!(
        "Simplex iterations: {}, nodes explored: {}, nodes pruned: {}",
        stats.simplex_iterations, stats.nodes_explored, stats.nodes_pruned
    );
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Chemical { integer, format, threads } => {
            let chemical = Chemical::build(integer).unwrap_or_else(|e| fail(format!("Model error: {}", e)));
            let result = Solver::new().with_threads(threads).solve(&chemical.model);

            match format {
                Format::Json => {
                    print_json(&json!({
                        "status": result.status(),
                        "objective": result.objective_value(),
                        "values": {
                            "a": result.value(chemical.a),
                            "b": result.value(chemical.b),
                        },
                        "stats": result.stats(),
                    }));
                    if !result.is_optimal() {
                        std::process::exit(1);
                    }
                }
                Format::Pretty => {
                    if !result.is_optimal() {
                        report_failure(&result);
                    }
                    println!("Status: {}", result.status());
                    println!("Objective: {:.2}", result.objective_value().unwrap_or_default());
                    println!();
                    for (name, var) in [("a", chemical.a), ("b", chemical.b)] {
                        println!("  {:4} {:12.6}", name, result.value(var).unwrap_or_default());
                    }
                    println!();
                    print_stats(&result);
                }
            }
        }
        Commands::Sudoku { file, format, threads } => {
            let puzzle = match file {
                Some(path) => {
                    let source = std::fs::read_to_string(&path)
                        .unwrap_or_else(|e| fail(format!("Error reading file: {}", e)));
                    source
                        .parse::<Board>()
                        .unwrap_or_else(|e| fail(format!("Puzzle error in {}: {}", path.display(), e)))
                }
                None => Board::builtin(),
            };

            let sudoku = Sudoku::build(&puzzle).unwrap_or_else(|e| fail(format!("Model error: {}", e)));
            let result = Solver::new().with_threads(threads).solve(&sudoku.model);
            let solution = result.is_optimal().then(|| sudoku.decode(&result));

            match format {
                Format::Json => {
                    print_json(&json!({
                        "status": result.status(),
                        "puzzle": puzzle.rows(),
                        "solution": solution.as_ref().map(Board::rows),
                        "stats": result.stats(),
                    }));
                    if solution.is_none() {
                        std::process::exit(1);
                    }
                }
                Format::Pretty => {
                    println!("Puzzle:");
                    println!("{}", puzzle);
                    println!();
                    let Some(solution) = solution else {
                        report_failure(&result);
                    };
                    println!("Solution:");
                    println!("{}", solution);
                    println!();
                    print_stats(&result);
                }
            }
        }
    }
}
