//! Lowering from contract predicates to solver terms, and model readback.
//!
//! The encoder owns the mapping between symbolic environment entries and
//! solver variables. Translation is deterministic and side-effect-free:
//! constructs the backend cannot express are rejected with
//! [`EncodeError::UnsupportedPredicate`] instead of being approximated.
//! Integers with a declared bit width are lowered to fixed-width bit-vectors
//! so wraparound violations stay detectable.

use indexmap::IndexMap;
use thiserror::Error;

use synton_ast::{BinaryOp, CompareOp, Predicate, QuantKind, Type, UnaryOp, Value};

use crate::solver::{Model, SmtSolver};
use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EncodeError {
    #[error("unsupported predicate construct: {0}")]
    UnsupportedPredicate(String),
    #[error("unbound variable `{0}` in predicate")]
    UnboundVariable(String),
    #[error("sort mismatch: expected {expected}, found {found}")]
    SortMismatch { expected: String, found: String },
}

/// How a binding is represented on the solver side.
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolKind {
    Scalar(SmtSort),
    /// Arrays are an uninterpreted `Int -> elem` function plus a length
    /// variable named by [`array_len_symbol`].
    Array { elem: SmtSort },
}

/// One binding of the symbolic environment.
#[derive(Debug, Clone)]
pub struct SymbolicTerm {
    pub name: String,
    pub kind: SymbolKind,
    pub ty: Type,
}

/// Symbolic environment for one verification unit: binding name to symbolic
/// term, including the distinguished return symbol.
#[derive(Debug, Clone, Default)]
pub struct SymbolicEnv {
    bindings: IndexMap<String, SymbolicTerm>,
}

/// Name of the length variable backing an array binding.
pub fn array_len_symbol(name: &str) -> String {
    format!("{name}.len")
}

/// Solver-side representation of a declared type.
pub fn symbol_kind_of_type(ty: &Type) -> Result<SymbolKind, EncodeError> {
    match ty {
        Type::Int { width: None } => Ok(SymbolKind::Scalar(SmtSort::Int)),
        Type::Int { width: Some(w) } => Ok(SymbolKind::Scalar(SmtSort::BitVec(*w))),
        Type::Bool => Ok(SymbolKind::Scalar(SmtSort::Bool)),
        Type::Array(elem) => match symbol_kind_of_type(elem)? {
            SymbolKind::Scalar(sort) => Ok(SymbolKind::Array { elem: sort }),
            SymbolKind::Array { .. } => Err(EncodeError::UnsupportedPredicate(
                "nested array binding".into(),
            )),
        },
        Type::Float => Err(EncodeError::UnsupportedPredicate(
            "float-typed binding".into(),
        )),
        Type::Str => Err(EncodeError::UnsupportedPredicate(
            "string-typed binding".into(),
        )),
        Type::Unit => Err(EncodeError::UnsupportedPredicate(
            "unit-typed binding".into(),
        )),
    }
}

impl SymbolicEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a binding; returns false when the name was already present.
    pub fn insert(&mut self, term: SymbolicTerm) -> bool {
        let name = term.name.clone();
        if self.bindings.contains_key(&name) {
            return false;
        }
        self.bindings.insert(name, term);
        true
    }

    pub fn get(&self, name: &str) -> Option<&SymbolicTerm> {
        self.bindings.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SymbolicTerm> {
        self.bindings.values()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Scalar solver variables, in insertion order. These are the names the
    /// orchestrator asks the backend to evaluate when extracting a model.
    pub fn scalar_vars(&self) -> Vec<(&str, &SmtSort)> {
        self.bindings
            .values()
            .filter_map(|t| match &t.kind {
                SymbolKind::Scalar(sort) => Some((t.name.as_str(), sort)),
                SymbolKind::Array { .. } => None,
            })
            .collect()
    }

    /// Declare every binding in the backend session.
    pub fn declare_all<S: SmtSolver>(&self, solver: &mut S) -> Result<(), S::Error> {
        for term in self.bindings.values() {
            match &term.kind {
                SymbolKind::Scalar(sort) => solver.declare_var(&term.name, sort)?,
                SymbolKind::Array { elem } => {
                    solver.declare_fun(&term.name, &[SmtSort::Int], elem)?;
                    solver.declare_var(&array_len_symbol(&term.name), &SmtSort::Int)?;
                }
            }
        }
        Ok(())
    }

    /// Inverse mapping: read scalar model values back into concrete bindings.
    ///
    /// Fixed-width values are re-signed from two's complement. Array-valued
    /// bindings have no finite model representation here and are skipped.
    pub fn read_model(&self, model: &Model) -> IndexMap<String, Value> {
        let mut out = IndexMap::new();
        for term in self.bindings.values() {
            let value = match &term.kind {
                SymbolKind::Scalar(SmtSort::Int) => model.get_int(&term.name).map(Value::Int),
                SymbolKind::Scalar(SmtSort::Bool) => model.get_bool(&term.name).map(Value::Bool),
                SymbolKind::Scalar(SmtSort::BitVec(_)) => model
                    .get_bitvec(&term.name)
                    .map(|(value, width)| Value::Int(bv_to_signed(value, width))),
                SymbolKind::Array { .. } => None,
            };
            if let Some(value) = value {
                out.insert(term.name.clone(), value);
            }
        }
        out
    }
}

/// Interpret a two's-complement bit pattern as a signed integer.
pub fn bv_to_signed(value: u64, width: u32) -> i64 {
    if width == 0 || width >= 64 {
        return value as i64;
    }
    let masked = value & mask(width);
    let sign_bit = 1u64 << (width - 1);
    if masked & sign_bit != 0 {
        (masked as i64) - (1i64 << width)
    } else {
        masked as i64
    }
}

fn mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// Encoding policy knobs.
#[derive(Debug, Clone, Copy)]
pub struct EncodeOptions {
    /// Quantifiers over a literal range no wider than this are unrolled;
    /// zero keeps every quantifier first-class.
    pub max_unroll: usize,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self { max_unroll: 0 }
    }
}

/// Lower one predicate to a boolean solver term.
pub fn encode_predicate(
    env: &SymbolicEnv,
    pred: &Predicate,
    opts: EncodeOptions,
) -> Result<SmtTerm, EncodeError> {
    let mut ctx = Ctx {
        env,
        opts,
        bound: Vec::new(),
    };
    ctx.encode_bool(pred)
}

struct Ctx<'a> {
    env: &'a SymbolicEnv,
    opts: EncodeOptions,
    /// Quantifier-bound variables in scope, innermost last. Always `Int`.
    bound: Vec<String>,
}

impl Ctx<'_> {
    fn sort_of_var(&self, name: &str) -> Result<SmtSort, EncodeError> {
        if self.bound.iter().any(|b| b == name) {
            return Ok(SmtSort::Int);
        }
        match self.env.get(name) {
            Some(SymbolicTerm {
                kind: SymbolKind::Scalar(sort),
                ..
            }) => Ok(sort.clone()),
            Some(SymbolicTerm {
                kind: SymbolKind::Array { .. },
                ..
            }) => Err(EncodeError::SortMismatch {
                expected: "scalar".into(),
                found: "array".into(),
            }),
            None => Err(EncodeError::UnboundVariable(name.to_string())),
        }
    }

    /// Infer the numeric sort a subterm will take, without encoding it.
    fn infer_numeric_sort(&self, pred: &Predicate) -> Option<SmtSort> {
        match pred {
            Predicate::Literal(Value::Int(_)) => None,
            Predicate::Var(name) => match self.sort_of_var(name) {
                Ok(sort @ (SmtSort::Int | SmtSort::BitVec(_))) => Some(sort),
                _ => None,
            },
            Predicate::Unary {
                op: UnaryOp::Neg,
                arg,
            } => self.infer_numeric_sort(arg),
            Predicate::Binary { op, lhs, rhs } if !matches!(op, BinaryOp::And | BinaryOp::Or) => {
                self.infer_numeric_sort(lhs)
                    .or_else(|| self.infer_numeric_sort(rhs))
            }
            Predicate::Index { base, .. } => match &**base {
                Predicate::Var(name) => match self.env.get(name) {
                    Some(SymbolicTerm {
                        kind: SymbolKind::Array { elem },
                        ..
                    }) => Some(elem.clone()),
                    _ => None,
                },
                _ => None,
            },
            // len/abs/min/max all produce the sort of their numeric argument,
            // or Int for len.
            Predicate::App { func, args } => match func.as_str() {
                "len" => Some(SmtSort::Int),
                "abs" | "min" | "max" => args.first().and_then(|a| self.infer_numeric_sort(a)),
                _ => None,
            },
            _ => None,
        }
    }

    fn encode_bool(&mut self, pred: &Predicate) -> Result<SmtTerm, EncodeError> {
        match pred {
            Predicate::Literal(Value::Bool(b)) => Ok(SmtTerm::BoolLit(*b)),
            Predicate::Literal(other) => Err(EncodeError::SortMismatch {
                expected: "Bool".into(),
                found: other.ty().to_string(),
            }),
            Predicate::Var(name) => match self.sort_of_var(name)? {
                SmtSort::Bool => Ok(SmtTerm::Var(name.clone())),
                other => Err(EncodeError::SortMismatch {
                    expected: "Bool".into(),
                    found: other.to_string(),
                }),
            },
            Predicate::Unary {
                op: UnaryOp::Not,
                arg,
            } => Ok(self.encode_bool(arg)?.not()),
            Predicate::Unary {
                op: UnaryOp::Neg, ..
            } => Err(EncodeError::SortMismatch {
                expected: "Bool".into(),
                found: "numeric negation".into(),
            }),
            Predicate::Binary {
                op: BinaryOp::And,
                lhs,
                rhs,
            } => Ok(SmtTerm::And(vec![
                self.encode_bool(lhs)?,
                self.encode_bool(rhs)?,
            ])),
            Predicate::Binary {
                op: BinaryOp::Or,
                lhs,
                rhs,
            } => Ok(SmtTerm::Or(vec![
                self.encode_bool(lhs)?,
                self.encode_bool(rhs)?,
            ])),
            Predicate::Binary { op, .. } => Err(EncodeError::SortMismatch {
                expected: "Bool".into(),
                found: format!("arithmetic `{op}`"),
            }),
            Predicate::Compare { op, lhs, rhs } => self.encode_compare(*op, lhs, rhs),
            Predicate::Quantifier {
                kind,
                var,
                lo,
                hi,
                body,
            } => self.encode_quantifier(*kind, var, lo, hi, body),
            Predicate::Index { .. } | Predicate::App { .. } => Err(EncodeError::SortMismatch {
                expected: "Bool".into(),
                found: "numeric expression".into(),
            }),
        }
    }

    fn encode_compare(
        &mut self,
        op: CompareOp,
        lhs: &Predicate,
        rhs: &Predicate,
    ) -> Result<SmtTerm, EncodeError> {
        // Boolean equality is the only non-numeric comparison.
        let lhs_bool = matches!(lhs, Predicate::Literal(Value::Bool(_)))
            || matches!(lhs, Predicate::Var(name) if self.sort_of_var(name) == Ok(SmtSort::Bool));
        let rhs_bool = matches!(rhs, Predicate::Literal(Value::Bool(_)))
            || matches!(rhs, Predicate::Var(name) if self.sort_of_var(name) == Ok(SmtSort::Bool));
        if lhs_bool || rhs_bool {
            let l = self.encode_bool(lhs)?;
            let r = self.encode_bool(rhs)?;
            return match op {
                CompareOp::Eq => Ok(l.eq(r)),
                CompareOp::Ne => Ok(l.eq(r).not()),
                other => Err(EncodeError::UnsupportedPredicate(format!(
                    "ordering comparison `{other}` on booleans"
                ))),
            };
        }

        let sort = self
            .infer_numeric_sort(lhs)
            .or_else(|| self.infer_numeric_sort(rhs))
            .unwrap_or(SmtSort::Int);
        let l = Box::new(self.encode_num(lhs, &sort)?);
        let r = Box::new(self.encode_num(rhs, &sort)?);
        let term = match (&sort, op) {
            (_, CompareOp::Eq) => SmtTerm::Eq(l, r),
            (_, CompareOp::Ne) => SmtTerm::Not(Box::new(SmtTerm::Eq(l, r))),
            (SmtSort::BitVec(_), CompareOp::Lt) => SmtTerm::BvSlt(l, r),
            (SmtSort::BitVec(_), CompareOp::Le) => SmtTerm::BvSle(l, r),
            (SmtSort::BitVec(_), CompareOp::Gt) => SmtTerm::BvSgt(l, r),
            (SmtSort::BitVec(_), CompareOp::Ge) => SmtTerm::BvSge(l, r),
            (_, CompareOp::Lt) => SmtTerm::Lt(l, r),
            (_, CompareOp::Le) => SmtTerm::Le(l, r),
            (_, CompareOp::Gt) => SmtTerm::Gt(l, r),
            (_, CompareOp::Ge) => SmtTerm::Ge(l, r),
        };
        Ok(term)
    }

    fn encode_num(&mut self, pred: &Predicate, want: &SmtSort) -> Result<SmtTerm, EncodeError> {
        match pred {
            Predicate::Literal(Value::Int(n)) => match want {
                SmtSort::Int => Ok(SmtTerm::IntLit(*n)),
                SmtSort::BitVec(w) => Ok(SmtTerm::BvLit {
                    value: (*n as u64) & mask(*w),
                    width: *w,
                }),
                SmtSort::Bool => Err(EncodeError::SortMismatch {
                    expected: "Bool".into(),
                    found: "int".into(),
                }),
            },
            Predicate::Literal(Value::Float(_)) => Err(EncodeError::UnsupportedPredicate(
                "float arithmetic".into(),
            )),
            Predicate::Literal(other) => Err(EncodeError::SortMismatch {
                expected: want.to_string(),
                found: other.ty().to_string(),
            }),
            Predicate::Var(name) => {
                let sort = self.sort_of_var(name)?;
                if &sort != want {
                    return Err(EncodeError::SortMismatch {
                        expected: want.to_string(),
                        found: sort.to_string(),
                    });
                }
                Ok(SmtTerm::Var(name.clone()))
            }
            Predicate::Unary {
                op: UnaryOp::Neg,
                arg,
            } => {
                let inner = Box::new(self.encode_num(arg, want)?);
                Ok(match want {
                    SmtSort::BitVec(_) => SmtTerm::BvNeg(inner),
                    _ => SmtTerm::Neg(inner),
                })
            }
            Predicate::Unary {
                op: UnaryOp::Not, ..
            } => Err(EncodeError::SortMismatch {
                expected: want.to_string(),
                found: "Bool".into(),
            }),
            Predicate::Binary { op, lhs, rhs } => {
                if matches!(op, BinaryOp::And | BinaryOp::Or) {
                    return Err(EncodeError::SortMismatch {
                        expected: want.to_string(),
                        found: "Bool".into(),
                    });
                }
                let l = Box::new(self.encode_num(lhs, want)?);
                let r = Box::new(self.encode_num(rhs, want)?);
                Ok(match (want, op) {
                    (SmtSort::BitVec(_), BinaryOp::Add) => SmtTerm::BvAdd(l, r),
                    (SmtSort::BitVec(_), BinaryOp::Sub) => SmtTerm::BvSub(l, r),
                    (SmtSort::BitVec(_), BinaryOp::Mul) => SmtTerm::BvMul(l, r),
                    (SmtSort::BitVec(_), BinaryOp::Div) => SmtTerm::BvSDiv(l, r),
                    (SmtSort::BitVec(_), BinaryOp::Mod) => SmtTerm::BvSRem(l, r),
                    (_, BinaryOp::Add) => SmtTerm::Add(l, r),
                    (_, BinaryOp::Sub) => SmtTerm::Sub(l, r),
                    (_, BinaryOp::Mul) => SmtTerm::Mul(l, r),
                    (_, BinaryOp::Div) => SmtTerm::Div(l, r),
                    (_, BinaryOp::Mod) => SmtTerm::Mod(l, r),
                    (_, BinaryOp::And | BinaryOp::Or) => unreachable!(),
                })
            }
            Predicate::Index { base, index } => {
                let Predicate::Var(name) = &**base else {
                    return Err(EncodeError::UnsupportedPredicate(
                        "indexing into a computed array expression".into(),
                    ));
                };
                let Some(SymbolicTerm {
                    kind: SymbolKind::Array { elem },
                    ..
                }) = self.env.get(name)
                else {
                    return Err(match self.env.get(name) {
                        Some(_) => EncodeError::SortMismatch {
                            expected: "array".into(),
                            found: "scalar".into(),
                        },
                        None => EncodeError::UnboundVariable(name.clone()),
                    });
                };
                if elem != want {
                    return Err(EncodeError::SortMismatch {
                        expected: want.to_string(),
                        found: elem.to_string(),
                    });
                }
                let idx = self.encode_num(index, &SmtSort::Int)?;
                Ok(SmtTerm::App(name.clone(), vec![idx]))
            }
            Predicate::App { func, args } => self.encode_app(func, args, want),
            Predicate::Compare { .. } | Predicate::Quantifier { .. } => {
                Err(EncodeError::SortMismatch {
                    expected: want.to_string(),
                    found: "Bool".into(),
                })
            }
        }
    }

    fn encode_app(
        &mut self,
        func: &str,
        args: &[Predicate],
        want: &SmtSort,
    ) -> Result<SmtTerm, EncodeError> {
        match (func, args) {
            ("len", [Predicate::Var(name)]) => {
                match self.env.get(name) {
                    Some(SymbolicTerm {
                        kind: SymbolKind::Array { .. },
                        ..
                    }) => {}
                    Some(_) => {
                        return Err(EncodeError::SortMismatch {
                            expected: "array".into(),
                            found: "scalar".into(),
                        })
                    }
                    None => return Err(EncodeError::UnboundVariable(name.clone())),
                }
                if want != &SmtSort::Int {
                    return Err(EncodeError::SortMismatch {
                        expected: want.to_string(),
                        found: "Int".into(),
                    });
                }
                Ok(SmtTerm::Var(array_len_symbol(name)))
            }
            ("len", _) => Err(EncodeError::UnsupportedPredicate(
                "len() of a computed expression".into(),
            )),
            ("abs", [arg]) => {
                if want != &SmtSort::Int {
                    return Err(EncodeError::UnsupportedPredicate(
                        "abs() on fixed-width integers".into(),
                    ));
                }
                let x = self.encode_num(arg, want)?;
                Ok(SmtTerm::ite(
                    x.clone().ge(SmtTerm::int(0)),
                    x.clone(),
                    SmtTerm::Neg(Box::new(x)),
                ))
            }
            ("min", [a, b]) | ("max", [a, b]) => {
                if want != &SmtSort::Int {
                    return Err(EncodeError::UnsupportedPredicate(format!(
                        "{func}() on fixed-width integers"
                    )));
                }
                let x = self.encode_num(a, want)?;
                let y = self.encode_num(b, want)?;
                let cond = x.clone().le(y.clone());
                Ok(if func == "min" {
                    SmtTerm::ite(cond, x, y)
                } else {
                    SmtTerm::ite(cond, y, x)
                })
            }
            _ => Err(EncodeError::UnsupportedPredicate(format!(
                "uninterpreted function application `{func}`"
            ))),
        }
    }

    fn encode_quantifier(
        &mut self,
        kind: QuantKind,
        var: &str,
        lo: &Predicate,
        hi: &Predicate,
        body: &Predicate,
    ) -> Result<SmtTerm, EncodeError> {
        // Literal ranges within the configured bound unroll to a finite
        // conjunction/disjunction; everything else stays a guarded quantifier.
        if self.opts.max_unroll > 0 {
            if let (Predicate::Literal(Value::Int(lo_n)), Predicate::Literal(Value::Int(hi_n))) =
                (lo, hi)
            {
                let width = hi_n.saturating_sub(*lo_n).max(0) as usize;
                if width <= self.opts.max_unroll {
                    let mut parts = Vec::with_capacity(width);
                    for i in *lo_n..*hi_n {
                        let instance = substitute_var(body, var, i);
                        parts.push(self.encode_bool(&instance)?);
                    }
                    return Ok(match kind {
                        QuantKind::Forall => SmtTerm::And(parts),
                        QuantKind::Exists => SmtTerm::Or(parts),
                    });
                }
            }
        }

        let lo_term = self.encode_num(lo, &SmtSort::Int)?;
        let hi_term = self.encode_num(hi, &SmtSort::Int)?;
        self.bound.push(var.to_string());
        let body_term = self.encode_bool(body);
        self.bound.pop();
        let body_term = body_term?;

        let guard = SmtTerm::And(vec![
            SmtTerm::var(var).ge(lo_term),
            SmtTerm::var(var).lt(hi_term),
        ]);
        let bindings = vec![(var.to_string(), SmtSort::Int)];
        Ok(match kind {
            QuantKind::Forall => {
                SmtTerm::ForAll(bindings, Box::new(guard.implies(body_term)))
            }
            QuantKind::Exists => {
                SmtTerm::Exists(bindings, Box::new(SmtTerm::And(vec![guard, body_term])))
            }
        })
    }
}

/// Replace every free occurrence of `var` with an integer literal.
fn substitute_var(pred: &Predicate, var: &str, value: i64) -> Predicate {
    match pred {
        Predicate::Literal(_) => pred.clone(),
        Predicate::Var(name) => {
            if name == var {
                Predicate::int(value)
            } else {
                pred.clone()
            }
        }
        Predicate::Unary { op, arg } => Predicate::Unary {
            op: *op,
            arg: Box::new(substitute_var(arg, var, value)),
        },
        Predicate::Binary { op, lhs, rhs } => Predicate::Binary {
            op: *op,
            lhs: Box::new(substitute_var(lhs, var, value)),
            rhs: Box::new(substitute_var(rhs, var, value)),
        },
        Predicate::Compare { op, lhs, rhs } => Predicate::Compare {
            op: *op,
            lhs: Box::new(substitute_var(lhs, var, value)),
            rhs: Box::new(substitute_var(rhs, var, value)),
        },
        Predicate::Index { base, index } => Predicate::Index {
            base: Box::new(substitute_var(base, var, value)),
            index: Box::new(substitute_var(index, var, value)),
        },
        Predicate::Quantifier {
            kind,
            var: inner_var,
            lo,
            hi,
            body,
        } => {
            let lo = Box::new(substitute_var(lo, var, value));
            let hi = Box::new(substitute_var(hi, var, value));
            // An inner binding of the same name shadows the substitution.
            let body = if inner_var == var {
                body.clone()
            } else {
                Box::new(substitute_var(body, var, value))
            };
            Predicate::Quantifier {
                kind: *kind,
                var: inner_var.clone(),
                lo,
                hi,
                body,
            }
        }
        Predicate::App { func, args } => Predicate::App {
            func: func.clone(),
            args: args
                .iter()
                .map(|a| substitute_var(a, var, value))
                .collect(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::smtlib_printer::to_smtlib;
    use crate::solver::ModelValue;
    use std::collections::HashMap;

    fn env_with(bindings: &[(&str, Type)]) -> SymbolicEnv {
        let mut env = SymbolicEnv::new();
        for (name, ty) in bindings {
            let kind = symbol_kind_of_type(ty).unwrap();
            env.insert(SymbolicTerm {
                name: name.to_string(),
                kind,
                ty: ty.clone(),
            });
        }
        env
    }

    #[test]
    fn encode_simple_comparison() {
        let env = env_with(&[("n", Type::int())]);
        let pred = Predicate::var("n").ge(Predicate::int(0));
        let term = encode_predicate(&env, &pred, EncodeOptions::default()).unwrap();
        assert_eq!(to_smtlib(&term), "(>= n 0)");
    }

    #[test]
    fn encode_is_deterministic() {
        let env = env_with(&[("a", Type::int()), ("b", Type::int())]);
        let pred = Predicate::var("a")
            .add(Predicate::var("b"))
            .gt(Predicate::int(3))
            .and(Predicate::var("a").ne(Predicate::int(0)));
        let one = encode_predicate(&env, &pred, EncodeOptions::default()).unwrap();
        let two = encode_predicate(&env, &pred, EncodeOptions::default()).unwrap();
        assert_eq!(one, two);
    }

    #[test]
    fn unbound_variable_is_rejected() {
        let env = env_with(&[("n", Type::int())]);
        let pred = Predicate::var("m").ge(Predicate::int(0));
        let err = encode_predicate(&env, &pred, EncodeOptions::default()).unwrap_err();
        assert_eq!(err, EncodeError::UnboundVariable("m".into()));
    }

    #[test]
    fn float_predicates_are_a_translator_gap() {
        let env = env_with(&[("n", Type::int())]);
        let pred = Predicate::var("n").gt(Predicate::Literal(Value::Float(0.5)));
        let err = encode_predicate(&env, &pred, EncodeOptions::default()).unwrap_err();
        assert!(matches!(err, EncodeError::UnsupportedPredicate(_)));
    }

    #[test]
    fn unknown_function_application_is_a_translator_gap() {
        let env = env_with(&[("n", Type::int())]);
        let pred = Predicate::app("hash", vec![Predicate::var("n")]).eq(Predicate::int(0));
        let err = encode_predicate(&env, &pred, EncodeOptions::default()).unwrap_err();
        assert!(matches!(err, EncodeError::UnsupportedPredicate(_)));
    }

    #[test]
    fn fixed_width_ints_lower_to_bitvectors() {
        let env = env_with(&[("x", Type::int_width(8))]);
        let pred = Predicate::var("x")
            .add(Predicate::int(1))
            .gt(Predicate::var("x"));
        let term = encode_predicate(&env, &pred, EncodeOptions::default()).unwrap();
        assert_eq!(to_smtlib(&term), "(bvsgt (bvadd x (_ bv1 8)) x)");
    }

    #[test]
    fn negative_literal_wraps_into_bitvector_range() {
        let env = env_with(&[("x", Type::int_width(8))]);
        let pred = Predicate::var("x").eq(Predicate::int(-1));
        let term = encode_predicate(&env, &pred, EncodeOptions::default()).unwrap();
        assert_eq!(to_smtlib(&term), "(= x (_ bv255 8))");
    }

    #[test]
    fn quantifier_stays_first_class_by_default() {
        let env = env_with(&[("xs", Type::array(Type::int()))]);
        let pred = Predicate::forall(
            "i",
            Predicate::int(0),
            Predicate::app("len", vec![Predicate::var("xs")]),
            Predicate::var("xs")
                .index(Predicate::var("i"))
                .ge(Predicate::int(0)),
        );
        let term = encode_predicate(&env, &pred, EncodeOptions::default()).unwrap();
        assert_eq!(
            to_smtlib(&term),
            "(forall ((i Int)) (=> (and (>= i 0) (< i xs.len)) (>= (xs i) 0)))"
        );
    }

    #[test]
    fn literal_range_unrolls_within_bound() {
        let env = env_with(&[("xs", Type::array(Type::int()))]);
        let pred = Predicate::forall(
            "i",
            Predicate::int(0),
            Predicate::int(2),
            Predicate::var("xs")
                .index(Predicate::var("i"))
                .ge(Predicate::int(0)),
        );
        let term = encode_predicate(&env, &pred, EncodeOptions { max_unroll: 4 }).unwrap();
        assert_eq!(to_smtlib(&term), "(and (>= (xs 0) 0) (>= (xs 1) 0))");
    }

    #[test]
    fn bool_equality_encodes_without_ordering() {
        let env = env_with(&[("p", Type::Bool)]);
        let eq = Predicate::var("p").eq(Predicate::bool(true));
        let term = encode_predicate(&env, &eq, EncodeOptions::default()).unwrap();
        assert_eq!(to_smtlib(&term), "(= p true)");

        let lt = Predicate::var("p").lt(Predicate::bool(false));
        assert!(encode_predicate(&env, &lt, EncodeOptions::default()).is_err());
    }

    #[test]
    fn read_model_resign_bitvectors_and_keeps_order() {
        let env = env_with(&[
            ("n", Type::int()),
            ("w", Type::int_width(8)),
            ("p", Type::Bool),
        ]);
        let mut values = HashMap::new();
        values.insert("n".to_string(), ModelValue::Int(-1));
        values.insert(
            "w".to_string(),
            ModelValue::BitVec {
                value: 255,
                width: 8,
            },
        );
        values.insert("p".to_string(), ModelValue::Bool(false));
        let bindings = env.read_model(&Model { values });
        let names: Vec<&String> = bindings.keys().collect();
        assert_eq!(names, vec!["n", "w", "p"]);
        assert_eq!(bindings["n"], Value::Int(-1));
        assert_eq!(bindings["w"], Value::Int(-1));
        assert_eq!(bindings["p"], Value::Bool(false));
    }

    #[test]
    fn bv_to_signed_round_trips_width_edges() {
        assert_eq!(bv_to_signed(255, 8), -1);
        assert_eq!(bv_to_signed(127, 8), 127);
        assert_eq!(bv_to_signed(128, 8), -128);
        assert_eq!(bv_to_signed(u64::MAX, 64), -1);
    }
}
