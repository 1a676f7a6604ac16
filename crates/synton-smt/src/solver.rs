use std::collections::HashMap;

use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

/// Result of a satisfiability check.
///
/// `Unknown` carries the backend's stated reason; the orchestrator inspects
/// it to distinguish a timeout from an undecidable fragment.
#[derive(Debug, Clone, PartialEq)]
pub enum SatResult {
    Sat,
    Unsat,
    Unknown(String),
}

impl SatResult {
    /// True when the backend's unknown-reason points at resource exhaustion
    /// rather than an undecidable fragment.
    pub fn is_timeout(&self) -> bool {
        match self {
            SatResult::Unknown(reason) => {
                let reason = reason.to_ascii_lowercase();
                ["timeout", "canceled", "cancelled", "resourceout", "interrupted"]
                    .iter()
                    .any(|needle| reason.contains(needle))
            }
            _ => false,
        }
    }
}

/// A model (variable assignments) extracted from a SAT result.
#[derive(Debug, Clone, Default)]
pub struct Model {
    pub values: HashMap<String, ModelValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModelValue {
    Int(i64),
    Bool(bool),
    BitVec { value: u64, width: u32 },
}

impl Model {
    pub fn get_int(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(ModelValue::Int(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(ModelValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn get_bitvec(&self, name: &str) -> Option<(u64, u32)> {
        match self.values.get(name) {
            Some(ModelValue::BitVec { value, width }) => Some((*value, *width)),
            _ => None,
        }
    }
}

/// Abstract SMT solver interface.
///
/// One instance is one solver session; the verification engine never shares
/// a session across verification units.
pub trait SmtSolver {
    type Error: std::error::Error;

    /// Declare a new variable.
    fn declare_var(&mut self, name: &str, sort: &SmtSort) -> Result<(), Self::Error>;

    /// Declare an uninterpreted function (used for array element access).
    fn declare_fun(
        &mut self,
        name: &str,
        domain: &[SmtSort],
        range: &SmtSort,
    ) -> Result<(), Self::Error>;

    /// Assert a constraint.
    fn assert(&mut self, term: &SmtTerm) -> Result<(), Self::Error>;

    /// Push a new scope.
    fn push(&mut self) -> Result<(), Self::Error>;

    /// Pop a scope.
    fn pop(&mut self) -> Result<(), Self::Error>;

    /// Check satisfiability.
    fn check_sat(&mut self) -> Result<SatResult, Self::Error>;

    /// Check satisfiability and extract a model if SAT.
    fn check_sat_with_model(
        &mut self,
        var_names: &[(&str, &SmtSort)],
    ) -> Result<(SatResult, Option<Model>), Self::Error>;

    /// Reset the solver state.
    fn reset(&mut self) -> Result<(), Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_getters_return_typed_values_only() {
        let mut values = HashMap::new();
        values.insert("x".to_string(), ModelValue::Int(42));
        values.insert("flag".to_string(), ModelValue::Bool(true));
        values.insert(
            "w".to_string(),
            ModelValue::BitVec {
                value: 0xff,
                width: 8,
            },
        );
        let model = Model { values };

        assert_eq!(model.get_int("x"), Some(42));
        assert_eq!(model.get_bool("flag"), Some(true));
        assert_eq!(model.get_bitvec("w"), Some((0xff, 8)));
        assert_eq!(model.get_int("flag"), None);
        assert_eq!(model.get_bool("x"), None);
        assert_eq!(model.get_int("missing"), None);
    }

    #[test]
    fn unknown_reason_classifies_timeouts() {
        assert!(SatResult::Unknown("timeout".into()).is_timeout());
        assert!(SatResult::Unknown("solver canceled".into()).is_timeout());
        assert!(SatResult::Unknown("(:reason-unknown resourceout)".into()).is_timeout());
        assert!(!SatResult::Unknown("incomplete quantifiers".into()).is_timeout());
        assert!(!SatResult::Sat.is_timeout());
        assert!(!SatResult::Unsat.is_timeout());
    }
}
