//! Concrete predicate evaluation over counterexample bindings.
//!
//! Counterexample validation happens locally, never through the backend.
//! Integer division and modulo follow the Euclidean convention so a value
//! checked here agrees with the solver's `div`/`mod` semantics.

use indexmap::IndexMap;
use thiserror::Error;

use synton_ast::{BinaryOp, CompareOp, Predicate, QuantKind, UnaryOp, Value};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    #[error("unbound variable `{0}`")]
    UnboundVariable(String),
    #[error("type mismatch evaluating `{0}`")]
    TypeMismatch(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("index {index} out of bounds for array of length {len}")]
    IndexOutOfBounds { index: i64, len: usize },
    #[error("cannot evaluate `{0}` concretely")]
    Unsupported(String),
}

/// Evaluate a predicate to a boolean under concrete bindings.
pub fn eval_bool(pred: &Predicate, bindings: &IndexMap<String, Value>) -> Result<bool, EvalError> {
    match eval_value(pred, bindings)? {
        Value::Bool(b) => Ok(b),
        other => Err(EvalError::TypeMismatch(other.to_string())),
    }
}

/// Evaluate a predicate to a concrete value under bindings.
pub fn eval_value(pred: &Predicate, bindings: &IndexMap<String, Value>) -> Result<Value, EvalError> {
    match pred {
        Predicate::Literal(v) => Ok(v.clone()),
        Predicate::Var(name) => bindings
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::UnboundVariable(name.clone())),
        Predicate::Unary { op, arg } => {
            let v = eval_value(arg, bindings)?;
            match (op, v) {
                (UnaryOp::Neg, Value::Int(n)) => Ok(Value::Int(n.wrapping_neg())),
                (UnaryOp::Neg, Value::Float(x)) => Ok(Value::Float(-x)),
                (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                (_, v) => Err(EvalError::TypeMismatch(v.to_string())),
            }
        }
        Predicate::Binary { op, lhs, rhs } => {
            let l = eval_value(lhs, bindings)?;
            let r = eval_value(rhs, bindings)?;
            eval_binary(*op, l, r)
        }
        Predicate::Compare { op, lhs, rhs } => {
            let l = eval_value(lhs, bindings)?;
            let r = eval_value(rhs, bindings)?;
            eval_compare(*op, l, r)
        }
        Predicate::Index { base, index } => {
            let base = eval_value(base, bindings)?;
            let idx = eval_value(index, bindings)?;
            match (base, idx) {
                (Value::Array(items), Value::Int(i)) => {
                    if i < 0 || i as usize >= items.len() {
                        Err(EvalError::IndexOutOfBounds {
                            index: i,
                            len: items.len(),
                        })
                    } else {
                        Ok(items[i as usize].clone())
                    }
                }
                (base, _) => Err(EvalError::TypeMismatch(base.to_string())),
            }
        }
        Predicate::Quantifier {
            kind,
            var,
            lo,
            hi,
            body,
        } => {
            let lo = int_of(eval_value(lo, bindings)?)?;
            let hi = int_of(eval_value(hi, bindings)?)?;
            let mut scope = bindings.clone();
            for i in lo..hi {
                scope.insert(var.clone(), Value::Int(i));
                let holds = eval_bool(body, &scope)?;
                match kind {
                    QuantKind::Forall if !holds => return Ok(Value::Bool(false)),
                    QuantKind::Exists if holds => return Ok(Value::Bool(true)),
                    _ => {}
                }
            }
            Ok(Value::Bool(matches!(kind, QuantKind::Forall)))
        }
        Predicate::App { func, args } => eval_app(func, args, bindings),
    }
}

fn int_of(v: Value) -> Result<i64, EvalError> {
    v.as_int()
        .ok_or_else(|| EvalError::TypeMismatch(v.to_string()))
}

fn eval_binary(op: BinaryOp, l: Value, r: Value) -> Result<Value, EvalError> {
    match (op, l, r) {
        (BinaryOp::And, Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(a && b)),
        (BinaryOp::Or, Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(a || b)),
        (op, Value::Int(a), Value::Int(b)) => {
            let n = match op {
                BinaryOp::Add => a.wrapping_add(b),
                BinaryOp::Sub => a.wrapping_sub(b),
                BinaryOp::Mul => a.wrapping_mul(b),
                BinaryOp::Div => {
                    if b == 0 {
                        return Err(EvalError::DivisionByZero);
                    }
                    a.div_euclid(b)
                }
                BinaryOp::Mod => {
                    if b == 0 {
                        return Err(EvalError::DivisionByZero);
                    }
                    a.rem_euclid(b)
                }
                BinaryOp::And | BinaryOp::Or => {
                    return Err(EvalError::TypeMismatch(format!("{a} {op} {b}")))
                }
            };
            Ok(Value::Int(n))
        }
        (op, Value::Float(a), Value::Float(b)) => {
            let x = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
                _ => return Err(EvalError::TypeMismatch(format!("{a} {op} {b}"))),
            };
            Ok(Value::Float(x))
        }
        (op, l, r) => Err(EvalError::TypeMismatch(format!("{l} {op} {r}"))),
    }
}

fn eval_compare(op: CompareOp, l: Value, r: Value) -> Result<Value, EvalError> {
    let holds = match (&l, &r) {
        (Value::Int(a), Value::Int(b)) => match op {
            CompareOp::Eq => a == b,
            CompareOp::Ne => a != b,
            CompareOp::Lt => a < b,
            CompareOp::Le => a <= b,
            CompareOp::Gt => a > b,
            CompareOp::Ge => a >= b,
        },
        (Value::Float(a), Value::Float(b)) => match op {
            CompareOp::Eq => a == b,
            CompareOp::Ne => a != b,
            CompareOp::Lt => a < b,
            CompareOp::Le => a <= b,
            CompareOp::Gt => a > b,
            CompareOp::Ge => a >= b,
        },
        (Value::Bool(a), Value::Bool(b)) => match op {
            CompareOp::Eq => a == b,
            CompareOp::Ne => a != b,
            _ => return Err(EvalError::TypeMismatch(format!("{l} {op} {r}"))),
        },
        (Value::Str(a), Value::Str(b)) => match op {
            CompareOp::Eq => a == b,
            CompareOp::Ne => a != b,
            _ => return Err(EvalError::TypeMismatch(format!("{l} {op} {r}"))),
        },
        _ => return Err(EvalError::TypeMismatch(format!("{l} {op} {r}"))),
    };
    Ok(Value::Bool(holds))
}

fn eval_app(
    func: &str,
    args: &[Predicate],
    bindings: &IndexMap<String, Value>,
) -> Result<Value, EvalError> {
    match (func, args) {
        ("len", [arg]) => match eval_value(arg, bindings)? {
            Value::Array(items) => Ok(Value::Int(items.len() as i64)),
            other => Err(EvalError::TypeMismatch(other.to_string())),
        },
        ("abs", [arg]) => match eval_value(arg, bindings)? {
            Value::Int(n) => Ok(Value::Int(n.wrapping_abs())),
            other => Err(EvalError::TypeMismatch(other.to_string())),
        },
        ("min", [a, b]) | ("max", [a, b]) => {
            let x = int_of(eval_value(a, bindings)?)?;
            let y = int_of(eval_value(b, bindings)?)?;
            Ok(Value::Int(if func == "min" {
                x.min(y)
            } else {
                x.max(y)
            }))
        }
        _ => Err(EvalError::Unsupported(format!("{func}()"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings(pairs: &[(&str, Value)]) -> IndexMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn eval_comparison_under_bindings() {
        let b = bindings(&[("n", Value::Int(-1))]);
        let pred = Predicate::var("n").ge(Predicate::int(0));
        assert_eq!(eval_bool(&pred, &b), Ok(false));
        let pred = Predicate::var("n").eq(Predicate::int(-1));
        assert_eq!(eval_bool(&pred, &b), Ok(true));
    }

    #[test]
    fn eval_division_is_euclidean() {
        let b = bindings(&[]);
        let pred = Predicate::int(-7).div(Predicate::int(2));
        assert_eq!(eval_value(&pred, &b), Ok(Value::Int(-4)));
        let pred = Predicate::Binary {
            op: BinaryOp::Mod,
            lhs: Box::new(Predicate::int(-7)),
            rhs: Box::new(Predicate::int(2)),
        };
        assert_eq!(eval_value(&pred, &b), Ok(Value::Int(1)));
    }

    #[test]
    fn eval_division_by_zero_is_an_error() {
        let b = bindings(&[("b", Value::Int(0))]);
        let pred = Predicate::int(1).div(Predicate::var("b"));
        assert_eq!(eval_value(&pred, &b), Err(EvalError::DivisionByZero));
    }

    #[test]
    fn eval_quantifier_over_concrete_array() {
        let b = bindings(&[(
            "xs",
            Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(-3)]),
        )]);
        let all_positive = Predicate::forall(
            "i",
            Predicate::int(0),
            Predicate::app("len", vec![Predicate::var("xs")]),
            Predicate::var("xs")
                .index(Predicate::var("i"))
                .gt(Predicate::int(0)),
        );
        assert_eq!(eval_bool(&all_positive, &b), Ok(false));

        let some_negative = Predicate::exists(
            "i",
            Predicate::int(0),
            Predicate::app("len", vec![Predicate::var("xs")]),
            Predicate::var("xs")
                .index(Predicate::var("i"))
                .lt(Predicate::int(0)),
        );
        assert_eq!(eval_bool(&some_negative, &b), Ok(true));
    }

    #[test]
    fn eval_empty_range_follows_quantifier_identity() {
        let b = bindings(&[]);
        let forall = Predicate::forall("i", Predicate::int(3), Predicate::int(3), Predicate::bool(false));
        assert_eq!(eval_bool(&forall, &b), Ok(true));
        let exists = Predicate::exists("i", Predicate::int(3), Predicate::int(3), Predicate::bool(true));
        assert_eq!(eval_bool(&exists, &b), Ok(false));
    }

    #[test]
    fn unbound_variable_reports_name() {
        let b = bindings(&[]);
        let pred = Predicate::var("ghost").eq(Predicate::int(1));
        assert_eq!(
            eval_bool(&pred, &b),
            Err(EvalError::UnboundVariable("ghost".into()))
        );
    }

    #[test]
    fn interpreted_functions_evaluate() {
        let b = bindings(&[("n", Value::Int(-5))]);
        let pred = Predicate::app("abs", vec![Predicate::var("n")]).eq(Predicate::int(5));
        assert_eq!(eval_bool(&pred, &b), Ok(true));
        let pred = Predicate::app("min", vec![Predicate::var("n"), Predicate::int(2)])
            .eq(Predicate::int(-5));
        assert_eq!(eval_bool(&pred, &b), Ok(true));
        let pred = Predicate::app("max", vec![Predicate::var("n"), Predicate::int(2)])
            .eq(Predicate::int(2));
        assert_eq!(eval_bool(&pred, &b), Ok(true));
    }
}
