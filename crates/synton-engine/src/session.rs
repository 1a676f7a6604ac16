//! Solver session orchestration.
//!
//! One orchestrator owns one solver session for the lifetime of one
//! verification unit; sessions are never shared across units, which is what
//! makes whole-program verification safe to parallelize. Within a unit the
//! state machine is strictly sequential:
//!
//! `Idle -> Asserting -> Checking -> verdict -> Idle`
//!
//! Obligations are discharged with the conventional encoding: to verify
//! obligation `P` under assumptions `A`, the backend checks `A ∧ ¬P`.
//! `Unsat` means no input violates `P` given `A`. A satisfiable check
//! yields a model that becomes a counterexample. If `A` alone is already
//! unsatisfiable the contract itself is malformed and the unit is reported
//! `Inconsistent`, distinct from a violation.

use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;

use synton_smt::encoder::{encode_predicate, EncodeError, EncodeOptions};
use synton_smt::solver::{SatResult, SmtSolver};

use crate::collector::{CollectError, CollectedUnit};
use crate::counterexample::{extract_validated, Counterexample};
use crate::result::VerificationOutcome;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("constraint collection failed: {0}")]
    Collect(#[from] CollectError),
    #[error("predicate translation failed: {0}")]
    Encode(#[from] EncodeError),
    #[error("solver backend error: {0}")]
    Backend(String),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Stringify a backend error at the trait boundary; backends are
/// heterogeneous and their error types do not travel further than this.
pub fn backend_err<E: std::error::Error>(e: E) -> EngineError {
    EngineError::Backend(e.to_string())
}

/// Per-unit session policy.
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    /// Wall-clock budget for the whole unit. The backend gets the same
    /// budget as a query timeout, so a stuck check surfaces as `unknown`
    /// and the caller never blocks indefinitely.
    pub timeout: Duration,
    /// How many refined models to request before discarding a candidate
    /// counterexample.
    pub max_refine_rounds: usize,
    /// Encoder unrolling bound for literal quantifier ranges.
    pub max_unroll: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(500),
            max_refine_rounds: 2,
            max_unroll: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Asserting,
    Checking,
}

pub(crate) fn deadline_exceeded(deadline: Instant) -> bool {
    Instant::now() >= deadline
}

/// Owns one solver session and drives it through a unit's constraint set.
pub struct Orchestrator<S: SmtSolver> {
    solver: S,
    options: SessionOptions,
    phase: SessionPhase,
}

impl<S: SmtSolver> Orchestrator<S> {
    pub fn new(solver: S, options: SessionOptions) -> Self {
        Self {
            solver,
            options,
            phase: SessionPhase::Idle,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Run the unit to a verdict. The session returns to `Idle` on every
    /// path, including errors.
    pub fn verify_unit(
        &mut self,
        unit: &CollectedUnit,
    ) -> Result<VerificationOutcome, EngineError> {
        let deadline = Instant::now() + self.options.timeout;
        let outcome = self.run_unit(unit, deadline);
        self.phase = SessionPhase::Idle;
        outcome
    }

    fn run_unit(
        &mut self,
        unit: &CollectedUnit,
        deadline: Instant,
    ) -> Result<VerificationOutcome, EngineError> {
        let enc_opts = EncodeOptions {
            max_unroll: self.options.max_unroll,
        };

        self.phase = SessionPhase::Asserting;
        unit.env.declare_all(&mut self.solver).map_err(backend_err)?;
        for assumption in unit.assumptions() {
            let term = encode_predicate(&unit.env, &assumption.predicate, enc_opts)?;
            self.solver.assert(&term).map_err(backend_err)?;
        }

        // Assumption consistency comes first: contradictory preconditions
        // would make every obligation vacuously "verified".
        self.phase = SessionPhase::Checking;
        match self.solver.check_sat().map_err(backend_err)? {
            SatResult::Unsat => {
                let ids: Vec<&str> = unit.assumptions().map(|c| c.id.as_str()).collect();
                return Ok(VerificationOutcome::inconsistent(format!(
                    "assumptions {{{}}} are jointly unsatisfiable",
                    ids.join(", ")
                )));
            }
            SatResult::Sat => {}
            unknown @ SatResult::Unknown(_) => {
                return Ok(classify_unknown(&unknown, deadline, "assumption check"));
            }
        }

        let scalar_vars = unit.env.scalar_vars();
        let mut counterexamples: Vec<Counterexample> = Vec::new();
        let mut timeout_detail: Option<String> = None;
        let mut unknown_detail: Option<String> = None;

        for obligation in unit.obligations() {
            if deadline_exceeded(deadline) {
                timeout_detail =
                    Some(format!("deadline expired before checking `{}`", obligation.id));
                break;
            }

            self.phase = SessionPhase::Asserting;
            self.solver.push().map_err(backend_err)?;
            let term = encode_predicate(&unit.env, &obligation.predicate, enc_opts)?;
            self.solver.assert(&term.not()).map_err(backend_err)?;

            self.phase = SessionPhase::Checking;
            let (result, model) = self
                .solver
                .check_sat_with_model(&scalar_vars)
                .map_err(backend_err)?;
            match result {
                SatResult::Unsat => {
                    debug!(obligation = %obligation.id, "obligation discharged");
                }
                SatResult::Sat => {
                    let model = model.ok_or_else(|| {
                        EngineError::Internal(format!(
                            "backend reported sat without a model for `{}`",
                            obligation.id
                        ))
                    })?;
                    match extract_validated(
                        &mut self.solver,
                        unit,
                        obligation,
                        &model,
                        &scalar_vars,
                        enc_opts,
                        self.options.max_refine_rounds,
                    )? {
                        Some(cex) => counterexamples.push(cex),
                        None => {
                            unknown_detail = Some(format!(
                                "counterexample for `{}` could not be validated",
                                obligation.id
                            ));
                        }
                    }
                }
                unknown @ SatResult::Unknown(_) => {
                    let classified =
                        classify_unknown(&unknown, deadline, &format!("`{}`", obligation.id));
                    match classified.status {
                        crate::result::VerificationStatus::TimedOut => {
                            timeout_detail = classified.detail;
                        }
                        _ => unknown_detail = classified.detail,
                    }
                }
            }
            self.solver.pop().map_err(backend_err)?;

            if timeout_detail.is_some() {
                break;
            }
        }

        Ok(aggregate(counterexamples, timeout_detail, unknown_detail))
    }
}

fn classify_unknown(
    result: &SatResult,
    deadline: Instant,
    context: &str,
) -> VerificationOutcome {
    let reason = match result {
        SatResult::Unknown(reason) => reason.clone(),
        _ => String::new(),
    };
    if result.is_timeout() || deadline_exceeded(deadline) {
        VerificationOutcome::timed_out(format!("{context} timed out: {reason}"))
    } else {
        VerificationOutcome::unknown(format!("{context} came back unknown: {reason}"))
    }
}

/// A validated violation outranks every other non-verified verdict; a
/// timeout outranks an unknown.
fn aggregate(
    counterexamples: Vec<Counterexample>,
    timeout_detail: Option<String>,
    unknown_detail: Option<String>,
) -> VerificationOutcome {
    if !counterexamples.is_empty() {
        return VerificationOutcome::violated(counterexamples);
    }
    if let Some(detail) = timeout_detail {
        return VerificationOutcome::timed_out(detail);
    }
    if let Some(detail) = unknown_detail {
        return VerificationOutcome::unknown(detail);
    }
    VerificationOutcome::verified()
}
