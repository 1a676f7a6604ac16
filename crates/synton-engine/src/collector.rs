//! Constraint collection: from a verification unit to its symbolic
//! environment and named constraint set.
//!
//! Preconditions become assumed constraints; postconditions and invariants
//! become asserted obligations. Call-site literal arguments become assumed
//! equalities with the callee's preconditions as the obligations. A free
//! variable that does not resolve in the symbolic environment fails here,
//! before any solver session is opened.

use miette::Diagnostic;
use thiserror::Error;

use synton_ast::{
    Arg, CallSite, ContractKind, FunctionDef, NodeId, Predicate, Type, Value, RETURN_SYMBOL,
};
use synton_smt::encoder::{symbol_kind_of_type, EncodeError, SymbolicEnv, SymbolicTerm};

#[derive(Debug, Error, Diagnostic, Clone, PartialEq)]
pub enum CollectError {
    #[error("free variable `{name}` in @{kind} clause at {node_id} does not resolve in the symbolic environment")]
    #[diagnostic(code(synton::collect::contract_ill_formed))]
    ContractIllFormed {
        name: String,
        kind: ContractKind,
        node_id: NodeId,
    },

    #[error("binding `{name}: {ty}` cannot be represented symbolically: {reason}")]
    #[diagnostic(code(synton::collect::unsupported_binding))]
    UnsupportedBinding {
        name: String,
        ty: Type,
        reason: String,
    },

    #[error("duplicate binding `{name}` in verification unit at {node_id}")]
    #[diagnostic(code(synton::collect::duplicate_binding))]
    DuplicateBinding { name: String, node_id: NodeId },

    #[error("call at {node_id} passes {given} argument(s) but `{callee}` declares {expected} parameter(s)")]
    #[diagnostic(code(synton::collect::arity_mismatch))]
    ArityMismatch {
        callee: String,
        node_id: NodeId,
        given: usize,
        expected: usize,
    },

    #[error("literal argument for `{param}` has type {found}, expected {expected}")]
    #[diagnostic(code(synton::collect::argument_type))]
    ArgTypeMismatch {
        param: String,
        expected: Type,
        found: Type,
    },
}

/// Whether a constraint is available as an assumption or owed as an
/// obligation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Assume,
    Assert,
}

/// Where a constraint came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintOrigin {
    pub node_id: NodeId,
    pub kind: ContractKind,
}

/// A named constraint derived for one verification request. Ephemeral:
/// rebuilt from the contract on every request, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub id: String,
    pub predicate: Predicate,
    pub origin: ConstraintOrigin,
    pub polarity: Polarity,
    pub confidence: Option<f64>,
}

/// What to verify: a function against its own contract, or a representative
/// call against the callee's preconditions.
#[derive(Debug, Clone, Copy)]
pub struct UnitSpec<'a> {
    pub def: &'a FunctionDef,
    pub call: Option<&'a CallSite>,
}

impl UnitSpec<'_> {
    pub fn name(&self) -> String {
        match self.call {
            Some(call) => format!("{}@{}", self.def.name, call.id),
            None => self.def.name.clone(),
        }
    }

    pub fn node_id(&self) -> NodeId {
        match self.call {
            Some(call) => call.id,
            None => self.def.id,
        }
    }
}

/// A collected unit, ready for the orchestrator.
#[derive(Debug, Clone)]
pub struct CollectedUnit {
    pub name: String,
    pub node_id: NodeId,
    pub env: SymbolicEnv,
    pub constraints: Vec<Constraint>,
}

impl CollectedUnit {
    pub fn assumptions(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints
            .iter()
            .filter(|c| c.polarity == Polarity::Assume)
    }

    pub fn obligations(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints
            .iter()
            .filter(|c| c.polarity == Polarity::Assert)
    }

    pub fn constraint(&self, id: &str) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.id == id)
    }
}

/// Build the symbolic environment and the ordered constraint list for a unit.
pub fn collect(spec: &UnitSpec<'_>) -> Result<CollectedUnit, CollectError> {
    match spec.call {
        None => collect_function(spec.def),
        Some(call) => collect_call(spec.def, call),
    }
}

/// Bindings that exist in the source but have no symbolic representation,
/// with the translator's reason. Referencing one from a clause is an error
/// distinct from an unknown name.
struct EnvBuild {
    env: SymbolicEnv,
    skipped: Vec<(String, Type, String)>,
}

fn build_env(
    node_id: NodeId,
    bindings: impl Iterator<Item = (String, Type)>,
) -> Result<EnvBuild, CollectError> {
    let mut env = SymbolicEnv::new();
    let mut skipped = Vec::new();
    for (name, ty) in bindings {
        match symbol_kind_of_type(&ty) {
            Ok(kind) => {
                let inserted = env.insert(SymbolicTerm {
                    name: name.clone(),
                    kind,
                    ty,
                });
                if !inserted {
                    return Err(CollectError::DuplicateBinding { name, node_id });
                }
            }
            Err(EncodeError::UnsupportedPredicate(reason)) => {
                skipped.push((name, ty, reason));
            }
            Err(other) => {
                skipped.push((name, ty, other.to_string()));
            }
        }
    }
    Ok(EnvBuild { env, skipped })
}

fn check_clause_vars(
    predicate: &Predicate,
    kind: ContractKind,
    node_id: NodeId,
    build: &EnvBuild,
) -> Result<(), CollectError> {
    for name in predicate.free_vars() {
        if build.env.contains(&name) {
            continue;
        }
        if let Some((_, ty, reason)) = build.skipped.iter().find(|(n, _, _)| *n == name) {
            return Err(CollectError::UnsupportedBinding {
                name,
                ty: ty.clone(),
                reason: reason.clone(),
            });
        }
        return Err(CollectError::ContractIllFormed {
            name,
            kind,
            node_id,
        });
    }
    Ok(())
}

fn collect_function(def: &FunctionDef) -> Result<CollectedUnit, CollectError> {
    let bindings = def
        .params
        .iter()
        .chain(def.locals.iter())
        .map(|p| (p.name.clone(), p.ty.clone()))
        .chain(match &def.ret {
            // A unit-returning function has nothing to say about `$ret`.
            Type::Unit => None,
            ret => Some((RETURN_SYMBOL.to_string(), ret.clone())),
        });
    let build = build_env(def.id, bindings)?;

    let mut constraints = Vec::new();
    for (i, clause) in def.contract.preconditions.iter().enumerate() {
        check_clause_vars(&clause.predicate, ContractKind::Precondition, def.id, &build)?;
        constraints.push(Constraint {
            id: format!("pre[{i}]"),
            predicate: clause.predicate.clone(),
            origin: ConstraintOrigin {
                node_id: def.id,
                kind: ContractKind::Precondition,
            },
            polarity: Polarity::Assume,
            confidence: clause.confidence,
        });
    }
    for (i, clause) in def.contract.postconditions.iter().enumerate() {
        check_clause_vars(&clause.predicate, ContractKind::Postcondition, def.id, &build)?;
        constraints.push(Constraint {
            id: format!("post[{i}]"),
            predicate: clause.predicate.clone(),
            origin: ConstraintOrigin {
                node_id: def.id,
                kind: ContractKind::Postcondition,
            },
            polarity: Polarity::Assert,
            confidence: clause.confidence,
        });
    }
    for (i, clause) in def.contract.invariants.iter().enumerate() {
        check_clause_vars(&clause.predicate, ContractKind::Invariant, def.id, &build)?;
        constraints.push(Constraint {
            id: format!("inv[{i}]"),
            predicate: clause.predicate.clone(),
            origin: ConstraintOrigin {
                node_id: def.id,
                kind: ContractKind::Invariant,
            },
            polarity: Polarity::Assert,
            confidence: clause.confidence,
        });
    }

    Ok(CollectedUnit {
        name: def.name.clone(),
        node_id: def.id,
        env: build.env,
        constraints,
    })
}

fn collect_call(def: &FunctionDef, call: &CallSite) -> Result<CollectedUnit, CollectError> {
    if call.args.len() != def.params.len() {
        return Err(CollectError::ArityMismatch {
            callee: def.name.clone(),
            node_id: call.id,
            given: call.args.len(),
            expected: def.params.len(),
        });
    }

    let build = build_env(
        call.id,
        def.params.iter().map(|p| (p.name.clone(), p.ty.clone())),
    )?;

    let mut constraints = Vec::new();
    for (i, (param, arg)) in def.params.iter().zip(call.args.iter()).enumerate() {
        let Arg::Literal(value) = arg else {
            continue;
        };
        check_arg_type(param.ty.clone(), value).map_err(|found| {
            CollectError::ArgTypeMismatch {
                param: param.name.clone(),
                expected: param.ty.clone(),
                found,
            }
        })?;
        // An argument whose parameter has no symbolic form cannot constrain
        // anything the preconditions can mention either; skip it.
        if !build.env.contains(&param.name) {
            continue;
        }
        constraints.push(Constraint {
            id: format!("arg[{i}]"),
            predicate: Predicate::var(&param.name).eq(Predicate::Literal(value.clone())),
            origin: ConstraintOrigin {
                node_id: call.id,
                kind: ContractKind::Precondition,
            },
            polarity: Polarity::Assume,
            confidence: None,
        });
    }

    for (i, clause) in def.contract.preconditions.iter().enumerate() {
        check_clause_vars(&clause.predicate, ContractKind::Precondition, call.id, &build)?;
        constraints.push(Constraint {
            id: format!("pre[{i}]"),
            predicate: clause.predicate.clone(),
            origin: ConstraintOrigin {
                node_id: def.id,
                kind: ContractKind::Precondition,
            },
            polarity: Polarity::Assert,
            confidence: clause.confidence,
        });
    }

    Ok(CollectedUnit {
        name: format!("{}@{}", def.name, call.id),
        node_id: call.id,
        env: build.env,
        constraints,
    })
}

fn check_arg_type(expected: Type, value: &Value) -> Result<(), Type> {
    let compatible = matches!(
        (&expected, value),
        (Type::Int { .. }, Value::Int(_))
            | (Type::Float, Value::Float(_))
            | (Type::Bool, Value::Bool(_))
            | (Type::Str, Value::Str(_))
            | (Type::Array(_), Value::Array(_))
    );
    if compatible {
        Ok(())
    } else {
        Err(value.ty())
    }
}
