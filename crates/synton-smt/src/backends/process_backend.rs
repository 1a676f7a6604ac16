use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command, Stdio};

use thiserror::Error;

use crate::backends::smtlib_printer::{sort_to_smtlib, to_smtlib};
use crate::solver::{Model, ModelValue, SatResult, SmtSolver};
use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

#[derive(Debug, Error)]
pub enum ProcessSolverError {
    #[error("solver I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("solver binary not found: {0}")]
    NotFound(String),
    #[error("solver error: {0}")]
    SolverError(String),
    #[error("failed to parse solver output: {0}")]
    ParseError(String),
}

/// SMT-LIB2 pipe backend driving an external solver binary.
///
/// Declarations and assertions are fire-and-forget; only `check-sat`,
/// `get-value`, and `get-info` read a response line. Query timeouts are
/// configured on the child process so a slow check comes back as `unknown`
/// with a resource-out reason instead of hanging the session.
pub struct ProcessSolver {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    stderr: BufReader<ChildStderr>,
    vars: HashMap<String, SmtSort>,
}

impl ProcessSolver {
    /// Spawn `z3` from PATH.
    pub fn z3(timeout_ms: Option<u64>) -> Result<Self, ProcessSolverError> {
        let mut args = vec!["-smt2".to_string(), "-in".to_string()];
        if let Some(ms) = timeout_ms {
            args.push(format!("-t:{ms}"));
        }
        Self::with_command("z3", &args)
    }

    /// Spawn `cvc5` from PATH.
    pub fn cvc5(timeout_ms: Option<u64>) -> Result<Self, ProcessSolverError> {
        let mut args = vec![
            "--lang".to_string(),
            "smt2".to_string(),
            "--incremental".to_string(),
            "--produce-models".to_string(),
        ];
        if let Some(ms) = timeout_ms {
            args.push(format!("--tlimit-per={ms}"));
        }
        Self::with_command("cvc5", &args)
    }

    pub fn with_command(cmd: &str, args: &[String]) -> Result<Self, ProcessSolverError> {
        let mut child = Command::new(cmd)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ProcessSolverError::NotFound(format!("{cmd}: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ProcessSolverError::SolverError("failed to capture solver stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ProcessSolverError::SolverError("failed to capture solver stdout".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ProcessSolverError::SolverError("failed to capture solver stderr".into()))?;

        let mut solver = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            stderr: BufReader::new(stderr),
            vars: HashMap::new(),
        };

        solver.send_command_no_response("(set-option :produce-models true)")?;
        solver.send_command_no_response("(set-logic ALL)")?;
        Ok(solver)
    }

    fn send_command(&mut self, cmd: &str) -> Result<String, ProcessSolverError> {
        writeln!(self.stdin, "{cmd}")?;
        self.stdin.flush()?;

        let mut response = String::new();
        self.stdout.read_line(&mut response)?;
        if response.is_empty() {
            let mut stderr = String::new();
            let _ = self.stderr.read_line(&mut stderr);
            return Err(ProcessSolverError::SolverError(format!(
                "no response from solver for command `{cmd}`. stderr: {}",
                stderr.trim()
            )));
        }
        Ok(response.trim_end().to_string())
    }

    fn send_command_no_response(&mut self, cmd: &str) -> Result<(), ProcessSolverError> {
        writeln!(self.stdin, "{cmd}")?;
        self.stdin.flush()?;
        Ok(())
    }

    /// Ask the backend why the last check came back unknown.
    fn reason_unknown(&mut self) -> String {
        match self.send_command("(get-info :reason-unknown)") {
            Ok(response) => parse_reason_unknown(&response),
            Err(_) => "unknown".to_string(),
        }
    }
}

impl Drop for ProcessSolver {
    fn drop(&mut self) {
        let _ = writeln!(self.stdin, "(exit)");
        let _ = self.stdin.flush();
        let _ = self.child.wait();
    }
}

impl SmtSolver for ProcessSolver {
    type Error = ProcessSolverError;

    fn declare_var(&mut self, name: &str, sort: &SmtSort) -> Result<(), ProcessSolverError> {
        let sort_str = sort_to_smtlib(sort);
        self.send_command_no_response(&format!("(declare-const {name} {sort_str})"))?;
        self.vars.insert(name.to_string(), sort.clone());
        Ok(())
    }

    fn declare_fun(
        &mut self,
        name: &str,
        domain: &[SmtSort],
        range: &SmtSort,
    ) -> Result<(), ProcessSolverError> {
        let domain_str: Vec<String> = domain.iter().map(sort_to_smtlib).collect();
        self.send_command_no_response(&format!(
            "(declare-fun {name} ({}) {})",
            domain_str.join(" "),
            sort_to_smtlib(range)
        ))?;
        Ok(())
    }

    fn assert(&mut self, term: &SmtTerm) -> Result<(), ProcessSolverError> {
        let smt_str = to_smtlib(term);
        self.send_command_no_response(&format!("(assert {smt_str})"))?;
        Ok(())
    }

    fn push(&mut self) -> Result<(), ProcessSolverError> {
        self.send_command_no_response("(push 1)")?;
        Ok(())
    }

    fn pop(&mut self) -> Result<(), ProcessSolverError> {
        self.send_command_no_response("(pop 1)")?;
        Ok(())
    }

    fn check_sat(&mut self) -> Result<SatResult, ProcessSolverError> {
        let response = self.send_command("(check-sat)")?;
        match response.as_str() {
            "sat" => Ok(SatResult::Sat),
            "unsat" => Ok(SatResult::Unsat),
            "unknown" => {
                let reason = self.reason_unknown();
                Ok(SatResult::Unknown(reason))
            }
            other => Err(ProcessSolverError::SolverError(other.to_string())),
        }
    }

    fn check_sat_with_model(
        &mut self,
        var_names: &[(&str, &SmtSort)],
    ) -> Result<(SatResult, Option<Model>), ProcessSolverError> {
        let result = self.check_sat()?;
        if result != SatResult::Sat {
            return Ok((result, None));
        }

        let mut values = HashMap::new();
        for &(name, sort) in var_names {
            let response = self.send_command(&format!("(get-value ({name}))"))?;
            if let Some(val) = parse_model_value(&response, sort) {
                values.insert(name.to_string(), val);
            }
        }

        Ok((SatResult::Sat, Some(Model { values })))
    }

    fn reset(&mut self) -> Result<(), ProcessSolverError> {
        self.send_command_no_response("(reset)")?;
        self.send_command_no_response("(set-option :produce-models true)")?;
        self.send_command_no_response("(set-logic ALL)")?;
        self.vars.clear();
        Ok(())
    }
}

fn parse_reason_unknown(response: &str) -> String {
    // Response format: (:reason-unknown "timeout") or (:reason-unknown canceled)
    let inner = response
        .trim()
        .trim_start_matches('(')
        .trim_end_matches(')');
    match inner.strip_prefix(":reason-unknown") {
        Some(rest) => rest.trim().trim_matches('"').to_string(),
        None => response.trim().to_string(),
    }
}

fn parse_model_value(response: &str, sort: &SmtSort) -> Option<ModelValue> {
    // Strip outer parens: ((name value)) -> name value
    let inner = response
        .trim()
        .trim_start_matches('(')
        .trim_end_matches(')');
    let parts: Vec<&str> = inner.splitn(2, ' ').collect();
    if parts.len() < 2 {
        return None;
    }
    let val_str = parts[1].trim().trim_end_matches(')').trim();

    match sort {
        SmtSort::Int => {
            // Handle (- N) format
            if let Some(num_str) = val_str.strip_prefix("(- ") {
                let num_str = num_str.trim_end_matches(')');
                num_str.parse::<i64>().ok().map(|n| ModelValue::Int(-n))
            } else {
                val_str.parse::<i64>().ok().map(ModelValue::Int)
            }
        }
        SmtSort::Bool => match val_str {
            "true" => Some(ModelValue::Bool(true)),
            "false" => Some(ModelValue::Bool(false)),
            _ => None,
        },
        SmtSort::BitVec(width) => parse_bitvec_value(val_str, *width),
    }
}

fn parse_bitvec_value(val_str: &str, width: u32) -> Option<ModelValue> {
    let value = if let Some(hex) = val_str.strip_prefix("#x") {
        u64::from_str_radix(hex, 16).ok()?
    } else if let Some(bits) = val_str.strip_prefix("#b") {
        u64::from_str_radix(bits, 2).ok()?
    } else if let Some(rest) = val_str.strip_prefix("(_ bv") {
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse::<u64>().ok()?
    } else {
        return None;
    };
    Some(ModelValue::BitVec { value, width })
}
