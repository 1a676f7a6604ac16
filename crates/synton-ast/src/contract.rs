use serde::{Deserialize, Serialize};
use std::fmt;

use crate::predicate::Predicate;
use crate::span::Span;

/// Which contract clause list a predicate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractKind {
    Precondition,
    Postcondition,
    Invariant,
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContractKind::Precondition => "pre",
            ContractKind::Postcondition => "post",
            ContractKind::Invariant => "inv",
        };
        write!(f, "{s}")
    }
}

/// One `@pre(...)` / `@post(...)` / `@inv(...)` clause.
///
/// `confidence` is a secondary annotation for probabilistic ("maybe")
/// contracts. It is carried through to diagnostics but never folded into the
/// solver encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractClause {
    pub predicate: Predicate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

impl ContractClause {
    pub fn new(predicate: Predicate) -> Self {
        Self {
            predicate,
            confidence: None,
            span: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

impl From<Predicate> for ContractClause {
    fn from(predicate: Predicate) -> Self {
        Self::new(predicate)
    }
}

/// The contract attached to a function definition.
///
/// Built once at annotation time and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    #[serde(default)]
    pub preconditions: Vec<ContractClause>,
    #[serde(default)]
    pub postconditions: Vec<ContractClause>,
    #[serde(default)]
    pub invariants: Vec<ContractClause>,
}

impl Contract {
    pub fn is_empty(&self) -> bool {
        self.preconditions.is_empty()
            && self.postconditions.is_empty()
            && self.invariants.is_empty()
    }

    /// Clauses in declaration order, tagged with their kind.
    pub fn clauses(&self) -> impl Iterator<Item = (ContractKind, &ContractClause)> {
        self.preconditions
            .iter()
            .map(|c| (ContractKind::Precondition, c))
            .chain(
                self.postconditions
                    .iter()
                    .map(|c| (ContractKind::Postcondition, c)),
            )
            .chain(self.invariants.iter().map(|c| (ContractKind::Invariant, c)))
    }

    /// Deterministic rendering of the whole contract, used for cache keys.
    pub fn canonical_text(&self) -> String {
        let mut out = String::new();
        for (kind, clause) in self.clauses() {
            out.push('@');
            out.push_str(&kind.to_string());
            out.push('(');
            out.push_str(&clause.predicate.to_string());
            out.push(')');
            if let Some(c) = clause.confidence {
                out.push_str(&format!("~{c}"));
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_contract_is_empty() {
        assert!(Contract::default().is_empty());
    }

    #[test]
    fn canonical_text_is_stable_across_clones() {
        let contract = Contract {
            preconditions: vec![Predicate::var("n").ge(Predicate::int(0)).into()],
            postconditions: vec![Predicate::ret().ge(Predicate::int(1)).into()],
            invariants: vec![],
        };
        assert_eq!(
            contract.canonical_text(),
            contract.clone().canonical_text()
        );
        assert_eq!(
            contract.canonical_text(),
            "@pre((n >= 0))\n@post(($ret >= 1))\n"
        );
    }

    #[test]
    fn clauses_iterate_in_declaration_order() {
        let contract = Contract {
            preconditions: vec![Predicate::bool(true).into()],
            postconditions: vec![Predicate::bool(true).into()],
            invariants: vec![Predicate::bool(true).into()],
        };
        let kinds: Vec<ContractKind> = contract.clauses().map(|(k, _)| k).collect();
        assert_eq!(
            kinds,
            vec![
                ContractKind::Precondition,
                ContractKind::Postcondition,
                ContractKind::Invariant
            ]
        );
    }
}
