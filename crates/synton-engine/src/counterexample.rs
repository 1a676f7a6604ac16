//! Counterexample extraction and local validation.
//!
//! A model coming back from the backend is only reported after substituting
//! its bindings into every other assumed constraint of the unit and checking
//! locally that each one still holds. When a binding fails that check the
//! extractor re-asserts the failing assumptions and requests a refined model
//! instead of emitting an invalid counterexample.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use synton_ast::Value;
use synton_smt::encoder::{encode_predicate, EncodeOptions};
use synton_smt::solver::{Model, SatResult, SmtSolver};
use synton_smt::sorts::SmtSort;

use crate::collector::{CollectedUnit, Constraint};
use crate::eval::{eval_bool, EvalError};
use crate::session::{backend_err, EngineError};

/// A concrete variable assignment demonstrating a violated obligation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Counterexample {
    pub bindings: IndexMap<String, Value>,
    pub violated_constraint: String,
    pub note: String,
}

/// Validation verdict for one candidate binding set.
struct Validation {
    /// The violated predicate really evaluates to false under the bindings.
    witness_ok: bool,
    /// Indices of assumptions the bindings falsify; refinement re-asserts
    /// exactly these.
    failing: Vec<usize>,
}

impl Validation {
    fn is_valid(&self) -> bool {
        self.witness_ok && self.failing.is_empty()
    }
}

/// Extract a validated counterexample from a satisfiable `A ∧ ¬P` model.
///
/// Returns `None` when no binding set could be validated within the refine
/// budget; the caller must then degrade the verdict rather than report an
/// unchecked witness.
pub fn extract_validated<S: SmtSolver>(
    solver: &mut S,
    unit: &CollectedUnit,
    violated: &Constraint,
    model: &Model,
    scalar_vars: &[(&str, &SmtSort)],
    enc_opts: EncodeOptions,
    max_refine_rounds: usize,
) -> Result<Option<Counterexample>, EngineError> {
    let assumptions: Vec<&Constraint> = unit.assumptions().collect();
    let mut bindings = unit.env.read_model(model);

    for round in 0..=max_refine_rounds {
        let verdict = validate(&assumptions, violated, &bindings);
        if verdict.is_valid() {
            return Ok(Some(Counterexample {
                bindings,
                violated_constraint: violated.id.clone(),
                note: format!(
                    "bindings falsify `{}` while satisfying the remaining assumptions",
                    violated.predicate
                ),
            }));
        }
        // A witness that fails no re-assertable assumption cannot be
        // refined; discard it.
        if round == max_refine_rounds || verdict.failing.is_empty() {
            break;
        }
        for idx in verdict.failing {
            let term = encode_predicate(&unit.env, &assumptions[idx].predicate, enc_opts)?;
            solver.assert(&term).map_err(backend_err)?;
        }
        let (result, refined) = solver
            .check_sat_with_model(scalar_vars)
            .map_err(backend_err)?;
        match (result, refined) {
            (SatResult::Sat, Some(refined)) => {
                bindings = unit.env.read_model(&refined);
            }
            _ => break,
        }
    }

    Ok(None)
}

fn validate(
    assumptions: &[&Constraint],
    violated: &Constraint,
    bindings: &IndexMap<String, Value>,
) -> Validation {
    // The violated predicate itself must evaluate to false under the
    // bindings; a model that satisfies it is no witness at all.
    let witness_ok = match eval_bool(&violated.predicate, bindings) {
        Ok(holds) => !holds,
        Err(EvalError::UnboundVariable(_)) | Err(EvalError::Unsupported(_)) => true,
        Err(_) => false,
    };

    let mut failing = Vec::new();
    for (idx, assumption) in assumptions.iter().enumerate() {
        match eval_bool(&assumption.predicate, bindings) {
            Ok(true) => {}
            Ok(false) => failing.push(idx),
            // Bindings that do not cover an assumption (array-valued or
            // otherwise unevaluable) cannot refute it locally.
            Err(EvalError::UnboundVariable(_)) | Err(EvalError::Unsupported(_)) => {}
            Err(_) => failing.push(idx),
        }
    }

    Validation {
        witness_ok,
        failing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synton_ast::{ContractKind, NodeId, Predicate};

    use crate::collector::{ConstraintOrigin, Polarity};

    fn constraint(id: &str, predicate: Predicate, polarity: Polarity) -> Constraint {
        Constraint {
            id: id.into(),
            predicate,
            origin: ConstraintOrigin {
                node_id: NodeId::new(1),
                kind: ContractKind::Precondition,
            },
            polarity,
            confidence: None,
        }
    }

    fn bindings(pairs: &[(&str, i64)]) -> IndexMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::Int(*v)))
            .collect()
    }

    #[test]
    fn valid_candidate_satisfies_assumptions_and_falsifies_obligation() {
        let assume = constraint(
            "arg[0]",
            Predicate::var("n").eq(Predicate::int(-1)),
            Polarity::Assume,
        );
        let violated = constraint(
            "pre[0]",
            Predicate::var("n").ge(Predicate::int(0)),
            Polarity::Assert,
        );
        let verdict = validate(&[&assume], &violated, &bindings(&[("n", -1)]));
        assert!(verdict.is_valid());
    }

    #[test]
    fn candidate_violating_an_assumption_is_refuted() {
        let assume = constraint(
            "arg[0]",
            Predicate::var("n").eq(Predicate::int(-1)),
            Polarity::Assume,
        );
        let violated = constraint(
            "pre[0]",
            Predicate::var("n").ge(Predicate::int(0)),
            Polarity::Assert,
        );
        // n = -2 falsifies the obligation but also breaks the assumption.
        let verdict = validate(&[&assume], &violated, &bindings(&[("n", -2)]));
        assert!(!verdict.is_valid());
        assert_eq!(verdict.failing, vec![0]);
        assert!(verdict.witness_ok);
    }

    #[test]
    fn candidate_satisfying_the_obligation_is_no_witness() {
        let violated = constraint(
            "pre[0]",
            Predicate::var("n").ge(Predicate::int(0)),
            Polarity::Assert,
        );
        let verdict = validate(&[], &violated, &bindings(&[("n", 3)]));
        assert!(!verdict.is_valid());
        assert!(!verdict.witness_ok);
        assert!(verdict.failing.is_empty());
    }

    #[test]
    fn unevaluable_assumptions_do_not_refute() {
        let assume = constraint(
            "pre[0]",
            Predicate::forall(
                "i",
                Predicate::int(0),
                Predicate::app("len", vec![Predicate::var("xs")]),
                Predicate::var("xs")
                    .index(Predicate::var("i"))
                    .ge(Predicate::int(0)),
            ),
            Polarity::Assume,
        );
        let violated = constraint(
            "post[0]",
            Predicate::var("n").ge(Predicate::int(0)),
            Polarity::Assert,
        );
        // `xs` has no concrete binding; the quantified assumption cannot be
        // checked locally and must not block the witness.
        let verdict = validate(&[&assume], &violated, &bindings(&[("n", -1)]));
        assert!(verdict.is_valid());
    }
}
