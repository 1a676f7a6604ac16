//! The Debug State Object: one structured, machine-consumable diagnostic
//! schema for every failure, compile-time or runtime.
//!
//! A DSO is created once per failure, never mutated, serialized to JSON for
//! the CLI, editor integrations, and self-correction loops, and discarded by
//! the consumer. Field names are part of the wire contract.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use synton_ast::{ContractKind, NodeId, Span, Value};

use crate::suggest::Suggestion;

/// Wire status of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DsoStatus {
    Violated,
    Inconsistent,
    Unknown,
    TimedOut,
    RuntimeFault,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// Location of the failing node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub node_id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_span: Option<Span>,
}

/// One frame of the runtime call stack at the fault point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackFrame {
    pub function: String,
    pub node_id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default)]
    pub locals: IndexMap<String, Value>,
}

/// Evaluation state of one contract clause at failure time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractState {
    pub constraint_id: String,
    pub kind: ContractKind,
    pub text: String,
    /// `None` when the clause was not decided (e.g. sibling obligations).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holds: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// State snapshot attached to a diagnostic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateContext {
    #[serde(default)]
    pub variable_values: IndexMap<String, Value>,
    #[serde(default)]
    pub call_stack: Vec<StackFrame>,
    /// Content hash of the heap image at the fault point; absent on the
    /// compile-time path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_snapshot: Option<String>,
    #[serde(default)]
    pub contract_states: Vec<ContractState>,
}

/// Expected/actual/reason triple. `reason` comes from a fixed template per
/// error code so automated consumers see a stable string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub expected: String,
    pub actual: String,
    pub reason: String,
}

/// The Debug State Object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugStateObject {
    pub status: DsoStatus,
    pub error_code: String,
    pub severity: Severity,
    pub location: Location,
    pub context: StateContext,
    pub error_details: ErrorDetails,
    pub suggestions: Vec<Suggestion>,
}

impl DebugStateObject {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Stable error codes shared by the compile-time and runtime paths.
pub mod codes {
    pub const PRECONDITION_VIOLATION: &str = "PRECONDITION_VIOLATION";
    pub const POSTCONDITION_VIOLATION: &str = "POSTCONDITION_VIOLATION";
    pub const INVARIANT_VIOLATION: &str = "INVARIANT_VIOLATION";
    pub const CONTRACT_INCONSISTENT: &str = "CONTRACT_INCONSISTENT";
    pub const CONTRACT_ILL_FORMED: &str = "CONTRACT_ILL_FORMED";
    pub const UNSUPPORTED_PREDICATE: &str = "UNSUPPORTED_PREDICATE";
    pub const VERIFICATION_TIMEOUT: &str = "VERIFICATION_TIMEOUT";
    pub const VERIFICATION_UNKNOWN: &str = "VERIFICATION_UNKNOWN";
    pub const TYPE_ERROR: &str = "TYPE_ERROR";
    pub const UNDEFINED_REFERENCE: &str = "UNDEFINED_REFERENCE";
    pub const DIVISION_BY_ZERO: &str = "DIVISION_BY_ZERO";
    pub const INDEX_OUT_OF_BOUNDS: &str = "INDEX_OUT_OF_BOUNDS";
    pub const STACK_OVERFLOW: &str = "STACK_OVERFLOW";
    pub const MAX_STEPS_EXCEEDED: &str = "MAX_STEPS_EXCEEDED";
    pub const CONSTRAINT_VIOLATION: &str = "CONSTRAINT_VIOLATION";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}
