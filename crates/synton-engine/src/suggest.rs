//! Rule-based repair suggestions.
//!
//! A pure function from `(error_code, error_details, optional
//! counterexample)` to ranked suggestions. Rules are independently addable;
//! ranking is descending confidence with kind priority breaking ties
//! (`Fix` over `Refactor` over `Hint`). The generator only proposes patches
//! as data and never touches source.

use serde::{Deserialize, Serialize};

use crate::counterexample::Counterexample;
use crate::dso::{codes, ErrorDetails};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    Fix,
    Refactor,
    Hint,
}

impl SuggestionKind {
    fn priority(self) -> u8 {
        match self {
            SuggestionKind::Fix => 0,
            SuggestionKind::Refactor => 1,
            SuggestionKind::Hint => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub kind: SuggestionKind,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,
    /// In `[0, 1]`.
    pub confidence: f64,
}

type Rule = fn(&str, &ErrorDetails, Option<&Counterexample>) -> Option<Suggestion>;

const RULES: &[Rule] = &[
    guard_call_site,
    strengthen_precondition,
    weaken_precondition,
    reconcile_contradictory_clauses,
    bind_missing_variable,
    insert_conversion,
    search_library_index,
    guard_divisor,
    bound_or_simplify,
    check_index_bounds,
];

/// Generate ranked suggestions for a failure.
pub fn suggest(
    error_code: &str,
    details: &ErrorDetails,
    counterexample: Option<&Counterexample>,
) -> Vec<Suggestion> {
    let mut out: Vec<Suggestion> = RULES
        .iter()
        .filter_map(|rule| rule(error_code, details, counterexample))
        .collect();
    rank(&mut out);
    out
}

/// Descending confidence; `Fix` > `Refactor` > `Hint` on ties.
pub fn rank(suggestions: &mut [Suggestion]) {
    suggestions.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.kind.priority().cmp(&b.kind.priority()))
    });
}

fn render_bindings(cex: &Counterexample) -> String {
    cex.bindings
        .iter()
        .map(|(name, value)| format!("{name} == {value}"))
        .collect::<Vec<_>>()
        .join(" && ")
}

fn guard_call_site(
    code: &str,
    details: &ErrorDetails,
    _cex: Option<&Counterexample>,
) -> Option<Suggestion> {
    if code != codes::PRECONDITION_VIOLATION {
        return None;
    }
    Some(Suggestion {
        kind: SuggestionKind::Fix,
        description: format!(
            "guard the call site so {} holds before the call",
            details.expected
        ),
        patch: Some(format!("(branch {} (call ...) (error ...))", details.expected)),
        confidence: 0.75,
    })
}

fn strengthen_precondition(
    code: &str,
    _details: &ErrorDetails,
    cex: Option<&Counterexample>,
) -> Option<Suggestion> {
    if code != codes::POSTCONDITION_VIOLATION && code != codes::INVARIANT_VIOLATION {
        return None;
    }
    let cex = cex?;
    if cex.bindings.is_empty() {
        return None;
    }
    let exclusion = cex
        .bindings
        .iter()
        .map(|(name, value)| format!("{name} != {value}"))
        .collect::<Vec<_>>()
        .join(" || ");
    Some(Suggestion {
        kind: SuggestionKind::Fix,
        description: format!(
            "strengthen the precondition to exclude the counterexample ({})",
            render_bindings(cex)
        ),
        patch: Some(format!("@pre({exclusion})")),
        confidence: 0.6,
    })
}

fn weaken_precondition(
    code: &str,
    _details: &ErrorDetails,
    _cex: Option<&Counterexample>,
) -> Option<Suggestion> {
    if code != codes::POSTCONDITION_VIOLATION {
        return None;
    }
    Some(Suggestion {
        kind: SuggestionKind::Refactor,
        description: "revisit the return paths; the body can produce a value the postcondition \
                      does not admit"
            .into(),
        patch: None,
        confidence: 0.4,
    })
}

fn reconcile_contradictory_clauses(
    code: &str,
    details: &ErrorDetails,
    _cex: Option<&Counterexample>,
) -> Option<Suggestion> {
    if code != codes::CONTRACT_INCONSISTENT {
        return None;
    }
    Some(Suggestion {
        kind: SuggestionKind::Fix,
        description: format!(
            "the assumed clauses admit no input at all ({}); drop or relax one of them",
            details.actual
        ),
        patch: None,
        confidence: 0.7,
    })
}

fn bind_missing_variable(
    code: &str,
    details: &ErrorDetails,
    _cex: Option<&Counterexample>,
) -> Option<Suggestion> {
    if code != codes::CONTRACT_ILL_FORMED {
        return None;
    }
    Some(Suggestion {
        kind: SuggestionKind::Fix,
        description: format!(
            "every contract variable must name a parameter, local, or `$ret`; {}",
            details.reason
        ),
        patch: None,
        confidence: 0.8,
    })
}

fn insert_conversion(
    code: &str,
    details: &ErrorDetails,
    _cex: Option<&Counterexample>,
) -> Option<Suggestion> {
    if code != codes::TYPE_ERROR {
        return None;
    }
    Some(Suggestion {
        kind: SuggestionKind::Fix,
        description: format!(
            "insert an explicit conversion from {} to {}",
            details.actual, details.expected
        ),
        patch: Some(format!("(as <expr> {})", details.expected)),
        confidence: 0.8,
    })
}

fn search_library_index(
    code: &str,
    details: &ErrorDetails,
    _cex: Option<&Counterexample>,
) -> Option<Suggestion> {
    if code != codes::UNDEFINED_REFERENCE {
        return None;
    }
    Some(Suggestion {
        kind: SuggestionKind::Hint,
        description: format!(
            "no definition for {}; search the content-addressed library index for a matching \
             signature",
            details.actual
        ),
        patch: None,
        confidence: 0.5,
    })
}

fn guard_divisor(
    code: &str,
    _details: &ErrorDetails,
    _cex: Option<&Counterexample>,
) -> Option<Suggestion> {
    if code != codes::DIVISION_BY_ZERO {
        return None;
    }
    Some(Suggestion {
        kind: SuggestionKind::Fix,
        description: "declare the divisor nonzero in the contract so the violation is caught at \
                      the call site"
            .into(),
        patch: Some("@pre(<divisor> != 0)".into()),
        confidence: 0.85,
    })
}

fn bound_or_simplify(
    code: &str,
    _details: &ErrorDetails,
    _cex: Option<&Counterexample>,
) -> Option<Suggestion> {
    if code != codes::VERIFICATION_TIMEOUT && code != codes::VERIFICATION_UNKNOWN {
        return None;
    }
    Some(Suggestion {
        kind: SuggestionKind::Hint,
        description: "add explicit bounds to quantified ranges or split the clause into simpler \
                      conjuncts; the solver could not decide it in budget"
            .into(),
        patch: None,
        confidence: 0.3,
    })
}

fn check_index_bounds(
    code: &str,
    _details: &ErrorDetails,
    _cex: Option<&Counterexample>,
) -> Option<Suggestion> {
    if code != codes::INDEX_OUT_OF_BOUNDS {
        return None;
    }
    Some(Suggestion {
        kind: SuggestionKind::Fix,
        description: "bound the index by the array length in the contract".into(),
        patch: Some("@pre(<index> >= 0 && <index> < len(<array>))".into()),
        confidence: 0.8,
    })
}
