use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use log::{debug, warn};

use crate::domain::lp_format;
use crate::domain::program::LinearProgram;
use crate::domain::registry::CommandDialect;
use crate::domain::solver::{Assignment, SolveOptions, Solver, Verdict};
use crate::domain::validate::validate_program;
use crate::error::SolverError;

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const MODEL_FILE: &str = "model.lp";
const OUTPUT_FILE: &str = "solver.out";

/// Solver executable driven through its command line.
///
/// The program is written as LP text into a scratch directory and the process output is
/// captured to a file, so a chatty solver can never block on a full pipe. The process is
/// killed as soon as the run is cancelled.
pub struct CommandSolver {
    name: String,
    dialect: CommandDialect,
    path: PathBuf,
}

impl CommandSolver {
    pub fn new(name: impl Into<String>, dialect: CommandDialect, path: impl Into<PathBuf>) -> Self {
        CommandSolver {
            name: name.into(),
            dialect,
            path: path.into(),
        }
    }

    fn arguments(&self, model: &Path, time_limit: Option<Duration>) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        match self.dialect {
            CommandDialect::Cbc => {
                args.push(model.into());
                if let Some(limit) = time_limit {
                    args.push("sec".into());
                    args.push(format!("{}", limit.as_secs_f64()).into());
                }
                args.push("solve".into());
            }
            CommandDialect::Glpsol => {
                args.push("--lp".into());
                args.push(model.into());
                if let Some(limit) = time_limit {
                    // whole seconds only
                    let seconds = limit.as_secs_f64().ceil().max(1.0) as u64;
                    args.push("--tmlim".into());
                    args.push(seconds.to_string().into());
                }
            }
            CommandDialect::Highs => {
                args.push("--model_file".into());
                args.push(model.into());
                if let Some(limit) = time_limit {
                    args.push("--time_limit".into());
                    args.push(format!("{}", limit.as_secs_f64()).into());
                }
            }
        }
        args
    }

    fn spawn_error(&self, error: io::Error) -> SolverError {
        if error.kind() == io::ErrorKind::NotFound {
            SolverError::MissingExecutable(self.path.clone())
        } else {
            SolverError::Io(error)
        }
    }
}

/// Read the solver's verdict from its captured output.
pub fn parse_verdict(dialect: CommandDialect, output: &str) -> Option<Verdict> {
    let feasible = || Some(Verdict::Feasible(Assignment::new()));

    match dialect {
        CommandDialect::Cbc => {
            if output.contains("Optimal solution found") {
                feasible()
            } else if output.contains("Stopped on time") {
                Some(Verdict::TimedOut)
            } else if output.to_lowercase().contains("infeasible") {
                Some(Verdict::Infeasible)
            } else {
                None
            }
        }
        CommandDialect::Glpsol => {
            if output.contains("INTEGER OPTIMAL SOLUTION FOUND") {
                feasible()
            } else if output.contains("TIME LIMIT EXCEEDED") {
                Some(Verdict::TimedOut)
            } else if output.contains("NO PRIMAL FEASIBLE SOLUTION")
                || output.contains("NO INTEGER FEASIBLE SOLUTION")
            {
                Some(Verdict::Infeasible)
            } else {
                None
            }
        }
        CommandDialect::Highs => {
            let status = output.lines().find_map(|line| {
                let line = line.trim();
                line.strip_prefix("Model status")
                    .and_then(|rest| rest.split_once(':'))
                    .map(|(_, value)| value.trim().to_string())
            })?;

            match status.as_str() {
                "Optimal" => feasible(),
                "Infeasible" => Some(Verdict::Infeasible),
                "Time limit reached" => Some(Verdict::TimedOut),
                _ => None,
            }
        }
    }
}

impl Solver for CommandSolver {
    fn solve(&self, program: &LinearProgram, options: &SolveOptions) -> Result<Verdict, SolverError> {
        validate_program(program)?;

        // LP readers reject rows without variables
        if let Some(constraint) = program.contradiction() {
            debug!("{}: constraint {} is unsatisfiable", program.name, constraint.name);
            return Ok(Verdict::Infeasible);
        }

        let scratch = tempfile::tempdir()?;
        let model_path = scratch.path().join(MODEL_FILE);
        let output_path = scratch.path().join(OUTPUT_FILE);
        fs::write(&model_path, lp_format::render(program))?;
        let output_file = File::create(&output_path)?;

        let mut child = Command::new(&self.path)
            .args(self.arguments(&model_path, options.time_limit))
            .stdin(Stdio::null())
            .stdout(Stdio::from(output_file))
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;
        debug!("{}: started {} (pid {})", self.name, self.path.display(), child.id());

        let exit_status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if options.cancel.is_cancelled() {
                if let Err(e) = child.kill() {
                    warn!("{}: failed to kill pid {}: {}", self.name, child.id(), e);
                }
                // reap the process so it does not linger as a zombie
                let _ = child.wait();
                return Err(SolverError::Interrupted);
            }
            thread::sleep(POLL_INTERVAL);
        };

        let output = fs::read_to_string(&output_path)?;
        parse_verdict(self.dialect, &output).ok_or_else(|| {
            SolverError::Backend(format!(
                "{} exited with {} without a recognised status",
                self.path.display(),
                exit_status
            ))
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_verdict_cbc() {
        let optimal = "Result - Optimal solution found\nObjective value: 0.0\n";
        let infeasible = "Problem is infeasible - 0.00 seconds\n";
        let stopped = "Result - Stopped on time limit\n";

        assert!(matches!(parse_verdict(CommandDialect::Cbc, optimal), Some(Verdict::Feasible(_))));
        assert_eq!(parse_verdict(CommandDialect::Cbc, infeasible), Some(Verdict::Infeasible));
        assert_eq!(parse_verdict(CommandDialect::Cbc, stopped), Some(Verdict::TimedOut));
        assert_eq!(parse_verdict(CommandDialect::Cbc, "Segmentation fault"), None);
    }

    #[test]
    fn test_parse_verdict_glpsol() {
        assert!(matches!(
            parse_verdict(CommandDialect::Glpsol, "INTEGER OPTIMAL SOLUTION FOUND\n"),
            Some(Verdict::Feasible(_))
        ));
        assert_eq!(
            parse_verdict(CommandDialect::Glpsol, "PROBLEM HAS NO PRIMAL FEASIBLE SOLUTION\n"),
            Some(Verdict::Infeasible)
        );
        assert_eq!(
            parse_verdict(CommandDialect::Glpsol, "TIME LIMIT EXCEEDED; SEARCH TERMINATED\n"),
            Some(Verdict::TimedOut)
        );
    }

    #[test]
    fn test_parse_verdict_highs() {
        let output = "Solving report\n  Model status      : Infeasible\n  Primal bound      : inf\n";
        assert_eq!(parse_verdict(CommandDialect::Highs, output), Some(Verdict::Infeasible));
        assert_eq!(
            parse_verdict(CommandDialect::Highs, "Model status : Time limit reached\n"),
            Some(Verdict::TimedOut)
        );
        assert_eq!(parse_verdict(CommandDialect::Highs, "no status here"), None);
    }

    #[test]
    fn test_arguments_follow_dialect() {
        let model = Path::new("/tmp/model.lp");
        let limit = Some(Duration::from_millis(1500));

        let cbc = CommandSolver::new("cbc", CommandDialect::Cbc, "cbc").arguments(model, limit);
        assert_eq!(cbc, vec!["/tmp/model.lp", "sec", "1.5", "solve"]);

        let glpsol = CommandSolver::new("glpsol", CommandDialect::Glpsol, "glpsol").arguments(model, limit);
        assert_eq!(glpsol, vec!["--lp", "/tmp/model.lp", "--tmlim", "2"]);

        let highs = CommandSolver::new("highs", CommandDialect::Highs, "highs").arguments(model, None);
        assert_eq!(highs, vec!["--model_file", "/tmp/model.lp"]);
    }

    #[test]
    fn test_solve_given_missing_executable_should_fail() {
        let program = LinearProgram::default();
        let solver = CommandSolver::new("cbc", CommandDialect::Cbc, "/nonexistent/cbc");

        let result = solver.solve(&program, &SolveOptions::default());

        assert!(matches!(result, Err(SolverError::MissingExecutable(_))));
    }

    #[cfg(unix)]
    mod scripted {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use std::time::Instant;

        use crate::domain::dimacs;
        use crate::domain::encode::encode;

        fn script(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("solver.sh");
            fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        fn program() -> LinearProgram {
            encode(&dimacs::parse("p cnf 2 2\n1 -2 0\n-1 2 0\n").unwrap(), "p").unwrap()
        }

        #[test]
        fn test_solve_should_pass_rendered_model() {
            let dir = tempfile::tempdir().unwrap();
            let path = script(
                dir.path(),
                r#"if grep -q "Subject To" "$2"; then echo "INTEGER OPTIMAL SOLUTION FOUND"; fi"#,
            );
            let solver = CommandSolver::new("glpsol", CommandDialect::Glpsol, path);

            let verdict = solver.solve(&program(), &SolveOptions::default()).unwrap();

            assert!(matches!(verdict, Verdict::Feasible(_)));
        }

        #[test]
        fn test_solve_given_unrecognised_output_should_fail() {
            let dir = tempfile::tempdir().unwrap();
            let path = script(dir.path(), "echo garbage; exit 3");
            let solver = CommandSolver::new("cbc", CommandDialect::Cbc, path);

            let result = solver.solve(&program(), &SolveOptions::default());

            assert!(matches!(result, Err(SolverError::Backend(_))));
        }

        #[test]
        fn test_solve_given_empty_clause_should_not_consult_executable() {
            let dir = tempfile::tempdir().unwrap();
            let path = script(dir.path(), "echo garbage; exit 3");
            let solver = CommandSolver::new("highs", CommandDialect::Highs, path);
            let program = encode(&dimacs::parse("p cnf 0 1\n0\n").unwrap(), "empty").unwrap();

            let verdict = solver.solve(&program, &SolveOptions::default()).unwrap();

            assert_eq!(verdict, Verdict::Infeasible);
        }

        #[test]
        fn test_solve_given_cancellation_should_kill_process() {
            let dir = tempfile::tempdir().unwrap();
            let path = script(dir.path(), "exec sleep 30");
            let solver = CommandSolver::new("cbc", CommandDialect::Cbc, path);
            let options = SolveOptions::default();

            let cancel = options.cancel.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(100));
                cancel.cancel();
            });

            let start = Instant::now();
            let result = solver.solve(&program(), &options);

            assert!(matches!(result, Err(SolverError::Interrupted)));
            assert!(start.elapsed() < Duration::from_secs(10));
        }
    }
}
