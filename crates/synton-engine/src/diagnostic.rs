//! Debug State Object construction.
//!
//! One builder for both failure paths. The compile-time path turns a
//! verification outcome into DSOs with an empty call stack and the
//! counterexample bindings as variable values; the runtime path snapshots
//! in-scope bindings, the active call stack, and a content hash of the heap
//! image at the fault point. `expected`/`actual` are always populated and
//! `reason` comes from a fixed template per error code.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use synton_ast::{ContractKind, NodeId, Span, Value};

use crate::collector::{CollectedUnit, CollectError};
use crate::counterexample::Counterexample;
use crate::dso::{
    codes, ContractState, DebugStateObject, DsoStatus, ErrorDetails, Location, Severity,
    StackFrame, StateContext,
};
use crate::eval::eval_bool;
use crate::result::{VerificationOutcome, VerificationStatus};
use crate::session::EngineError;
use crate::suggest::suggest;

/// A trap raised by the execution engine.
///
/// This is the only shape the runtime hands into the verifier core; the
/// variants mirror the runtime's trap codes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "fault_kind", rename_all = "snake_case")]
pub enum RuntimeFault {
    DivisionByZero,
    IndexOutOfBounds { index: i64, len: usize },
    StackOverflow { depth: usize, limit: usize },
    MaxStepsExceeded { limit: u64 },
    ConstraintViolation {
        constraint_id: String,
        kind: ContractKind,
        text: String,
        actual: String,
    },
}

impl RuntimeFault {
    pub fn error_code(&self) -> &'static str {
        match self {
            RuntimeFault::DivisionByZero => codes::DIVISION_BY_ZERO,
            RuntimeFault::IndexOutOfBounds { .. } => codes::INDEX_OUT_OF_BOUNDS,
            RuntimeFault::StackOverflow { .. } => codes::STACK_OVERFLOW,
            RuntimeFault::MaxStepsExceeded { .. } => codes::MAX_STEPS_EXCEEDED,
            RuntimeFault::ConstraintViolation { .. } => codes::CONSTRAINT_VIOLATION,
        }
    }

    fn details(&self) -> ErrorDetails {
        match self {
            RuntimeFault::DivisionByZero => ErrorDetails {
                expected: "a nonzero divisor".into(),
                actual: "divisor = 0".into(),
                reason: "the program divided by zero at runtime".into(),
            },
            RuntimeFault::IndexOutOfBounds { index, len } => ErrorDetails {
                expected: format!("an index in [0, {len})"),
                actual: format!("index = {index}"),
                reason: "the program indexed outside the array bounds".into(),
            },
            RuntimeFault::StackOverflow { depth, limit } => ErrorDetails {
                expected: format!("call depth at most {limit}"),
                actual: format!("depth = {depth}"),
                reason: "the call stack exceeded its configured limit".into(),
            },
            RuntimeFault::MaxStepsExceeded { limit } => ErrorDetails {
                expected: format!("termination within {limit} steps"),
                actual: format!("steps = {limit}"),
                reason: "execution exceeded its step budget".into(),
            },
            RuntimeFault::ConstraintViolation { text, actual, .. } => ErrorDetails {
                expected: text.clone(),
                actual: actual.clone(),
                reason: "a contract clause failed when evaluated at runtime".into(),
            },
        }
    }
}

/// Everything the runtime captures at the fault point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub node_id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_span: Option<Span>,
    #[serde(default)]
    pub variables: IndexMap<String, Value>,
    #[serde(default)]
    pub call_stack: Vec<StackFrame>,
    /// Raw heap image; only its content hash reaches the DSO.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heap_image: Option<Vec<u8>>,
    #[serde(default)]
    pub contract_states: Vec<ContractState>,
}

pub fn sha256_hex_bytes(input: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input);
    format!("{:x}", hasher.finalize())
}

/// Assembles DSOs from verification outcomes and runtime traps.
pub struct DiagnosticBuilder;

impl DiagnosticBuilder {
    /// Compile-time path: one DSO per counterexample for a violation, one
    /// DSO for the other non-verified verdicts, nothing for `Verified`.
    pub fn from_verification(
        unit: &CollectedUnit,
        outcome: &VerificationOutcome,
        source_span: Option<Span>,
    ) -> Vec<DebugStateObject> {
        match outcome.status {
            VerificationStatus::Verified => Vec::new(),
            VerificationStatus::Violated => outcome
                .counterexamples
                .iter()
                .map(|cex| violation_dso(unit, cex, source_span))
                .collect(),
            VerificationStatus::Inconsistent => {
                let details = ErrorDetails {
                    expected: "assumed clauses that admit at least one input".into(),
                    actual: outcome.detail.clone().unwrap_or_default(),
                    reason: "the assumed constraints are jointly unsatisfiable".into(),
                };
                vec![unit_dso(
                    unit,
                    DsoStatus::Inconsistent,
                    codes::CONTRACT_INCONSISTENT,
                    Severity::Error,
                    details,
                    None,
                    source_span,
                )]
            }
            VerificationStatus::Unknown => {
                let details = ErrorDetails {
                    expected: "a constraint set the backend can decide".into(),
                    actual: outcome.detail.clone().unwrap_or_default(),
                    reason: "the solver could not decide the constraint fragment".into(),
                };
                vec![unit_dso(
                    unit,
                    DsoStatus::Unknown,
                    codes::VERIFICATION_UNKNOWN,
                    Severity::Warning,
                    details,
                    None,
                    source_span,
                )]
            }
            VerificationStatus::TimedOut => {
                let details = ErrorDetails {
                    expected: "a verdict within the configured deadline".into(),
                    actual: outcome.detail.clone().unwrap_or_default(),
                    reason: "the solver exceeded the verification deadline".into(),
                };
                vec![unit_dso(
                    unit,
                    DsoStatus::TimedOut,
                    codes::VERIFICATION_TIMEOUT,
                    Severity::Warning,
                    details,
                    None,
                    source_span,
                )]
            }
        }
    }

    /// Collection failures are diagnosed before any solver session opens.
    pub fn from_collect_error(
        node_id: NodeId,
        err: &CollectError,
        source_span: Option<Span>,
    ) -> DebugStateObject {
        let (code, details) = match err {
            CollectError::ContractIllFormed { name, kind, .. } => (
                codes::CONTRACT_ILL_FORMED,
                ErrorDetails {
                    expected: "every contract variable bound to a parameter, local, or `$ret`"
                        .into(),
                    actual: format!("free variable `{name}` in @{kind} clause"),
                    reason: "the contract references a name the unit does not bind".into(),
                },
            ),
            CollectError::UnsupportedBinding { name, ty, reason } => (
                codes::UNSUPPORTED_PREDICATE,
                ErrorDetails {
                    expected: "bindings representable in the solver fragment".into(),
                    actual: format!("`{name}: {ty}` ({reason})"),
                    reason: "the translator cannot express this construct in the backend".into(),
                },
            ),
            CollectError::DuplicateBinding { name, .. } => (
                codes::CONTRACT_ILL_FORMED,
                ErrorDetails {
                    expected: "one binding per name in the verification unit".into(),
                    actual: format!("`{name}` is bound twice"),
                    reason: "the contract references a name the unit does not bind".into(),
                },
            ),
            CollectError::ArityMismatch {
                callee,
                given,
                expected,
                ..
            } => (
                codes::CONTRACT_ILL_FORMED,
                ErrorDetails {
                    expected: format!("{expected} argument(s) for `{callee}`"),
                    actual: format!("{given} argument(s)"),
                    reason: "the call does not match the callee's declared parameters".into(),
                },
            ),
            CollectError::ArgTypeMismatch {
                param,
                expected,
                found,
            } => (
                codes::TYPE_ERROR,
                ErrorDetails {
                    expected: format!("{expected} for parameter `{param}`"),
                    actual: found.to_string(),
                    reason: "a literal argument does not match the declared parameter type".into(),
                },
            ),
        };
        let suggestions = suggest(code, &details, None);
        DebugStateObject {
            status: DsoStatus::Error,
            error_code: code.to_string(),
            severity: Severity::Error,
            location: Location {
                node_id,
                source_span,
            },
            context: StateContext::default(),
            error_details: details,
            suggestions,
        }
    }

    /// Translator gaps and backend failures, surfaced as-is.
    pub fn from_engine_error(
        node_id: NodeId,
        err: &EngineError,
        source_span: Option<Span>,
    ) -> DebugStateObject {
        let (code, details) = match err {
            EngineError::Encode(encode) => (
                codes::UNSUPPORTED_PREDICATE,
                ErrorDetails {
                    expected: "a predicate expressible in the solver fragment".into(),
                    actual: encode.to_string(),
                    reason: "the translator cannot express this construct in the backend".into(),
                },
            ),
            other => (
                codes::INTERNAL_ERROR,
                ErrorDetails {
                    expected: "a verdict from the verification backend".into(),
                    actual: other.to_string(),
                    reason: "the verification backend failed; the unit's verdict is unavailable"
                        .into(),
                },
            ),
        };
        let suggestions = suggest(code, &details, None);
        DebugStateObject {
            status: DsoStatus::Error,
            error_code: code.to_string(),
            severity: Severity::Error,
            location: Location {
                node_id,
                source_span,
            },
            context: StateContext::default(),
            error_details: details,
            suggestions,
        }
    }

    /// A call site naming a function the program does not define.
    pub fn from_undefined_callee(
        node_id: NodeId,
        callee: &str,
        source_span: Option<Span>,
    ) -> DebugStateObject {
        let details = ErrorDetails {
            expected: "a function definition for the callee".into(),
            actual: format!("`{callee}`"),
            reason: "the call names a function the program does not define".into(),
        };
        let suggestions = suggest(codes::UNDEFINED_REFERENCE, &details, None);
        DebugStateObject {
            status: DsoStatus::Error,
            error_code: codes::UNDEFINED_REFERENCE.to_string(),
            severity: Severity::Error,
            location: Location {
                node_id,
                source_span,
            },
            context: StateContext::default(),
            error_details: details,
            suggestions,
        }
    }

    /// Runtime hook: the only call the execution engine makes into this core.
    pub fn from_runtime_fault(fault: &RuntimeFault, snapshot: &StateSnapshot) -> DebugStateObject {
        let details = fault.details();
        let suggestions = suggest(fault.error_code(), &details, None);
        DebugStateObject {
            status: DsoStatus::RuntimeFault,
            error_code: fault.error_code().to_string(),
            severity: Severity::Error,
            location: Location {
                node_id: snapshot.node_id,
                source_span: snapshot.source_span,
            },
            context: StateContext {
                variable_values: snapshot.variables.clone(),
                call_stack: snapshot.call_stack.clone(),
                memory_snapshot: snapshot
                    .heap_image
                    .as_deref()
                    .map(sha256_hex_bytes),
                contract_states: snapshot.contract_states.clone(),
            },
            error_details: details,
            suggestions,
        }
    }
}

fn violation_dso(
    unit: &CollectedUnit,
    cex: &Counterexample,
    source_span: Option<Span>,
) -> DebugStateObject {
    let violated = unit.constraint(&cex.violated_constraint);
    let code = match violated.map(|c| c.origin.kind) {
        Some(ContractKind::Precondition) => codes::PRECONDITION_VIOLATION,
        Some(ContractKind::Postcondition) => codes::POSTCONDITION_VIOLATION,
        Some(ContractKind::Invariant) => codes::INVARIANT_VIOLATION,
        None => codes::CONSTRAINT_VIOLATION,
    };
    let expected = violated
        .map(|c| c.predicate.to_string())
        .unwrap_or_else(|| cex.violated_constraint.clone());
    let actual = render_bindings(&cex.bindings);
    let details = ErrorDetails {
        expected,
        actual,
        reason: "assumed constraints admit an input that falsifies this clause".into(),
    };
    let suggestions = suggest(code, &details, Some(cex));
    DebugStateObject {
        status: DsoStatus::Violated,
        error_code: code.to_string(),
        severity: Severity::Error,
        location: Location {
            node_id: unit.node_id,
            source_span,
        },
        context: StateContext {
            variable_values: cex.bindings.clone(),
            call_stack: Vec::new(),
            memory_snapshot: None,
            contract_states: contract_states(unit, Some(&cex.bindings)),
        },
        error_details: details,
        suggestions,
    }
}

fn unit_dso(
    unit: &CollectedUnit,
    status: DsoStatus,
    code: &str,
    severity: Severity,
    details: ErrorDetails,
    cex: Option<&Counterexample>,
    source_span: Option<Span>,
) -> DebugStateObject {
    let suggestions = suggest(code, &details, cex);
    DebugStateObject {
        status,
        error_code: code.to_string(),
        severity,
        location: Location {
            node_id: unit.node_id,
            source_span,
        },
        context: StateContext {
            variable_values: IndexMap::new(),
            call_stack: Vec::new(),
            memory_snapshot: None,
            contract_states: contract_states(unit, None),
        },
        error_details: details,
        suggestions,
    }
}

/// Evaluation state of every clause in the unit. With bindings, clauses
/// that evaluate concretely get a verdict; everything else stays undecided.
fn contract_states(
    unit: &CollectedUnit,
    bindings: Option<&IndexMap<String, Value>>,
) -> Vec<ContractState> {
    unit.constraints
        .iter()
        .map(|c| ContractState {
            constraint_id: c.id.clone(),
            kind: c.origin.kind,
            text: c.predicate.to_string(),
            holds: bindings.and_then(|b| eval_bool(&c.predicate, b).ok()),
            confidence: c.confidence,
        })
        .collect()
}

fn render_bindings(bindings: &IndexMap<String, Value>) -> String {
    if bindings.is_empty() {
        return "no concrete bindings".into();
    }
    bindings
        .iter()
        .map(|(name, value)| format!("{name} = {value}"))
        .collect::<Vec<_>>()
        .join(", ")
}
