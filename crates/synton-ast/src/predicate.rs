use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::value::Value;

/// Name the verifier binds to a function's return value inside postconditions.
pub const RETURN_SYMBOL: &str = "$ret";

/// Function applications the verifier interprets itself.
///
/// Anything outside this list is a translator gap and is rejected instead of
/// being silently approximated.
pub const INTERPRETED_FUNCTIONS: &[&str] = &["len", "abs", "min", "max"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantKind {
    Forall,
    Exists,
}

/// A logical expression extracted from a contract clause.
///
/// Immutable once built; owned by the [`Contract`](crate::Contract) that
/// declared it. Quantifiers range over a half-open index interval
/// `[lo, hi)` and are kept as first-class nodes rather than unrolled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    Literal(Value),
    Var(String),
    Unary {
        op: UnaryOp,
        arg: Box<Predicate>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Predicate>,
        rhs: Box<Predicate>,
    },
    Compare {
        op: CompareOp,
        lhs: Box<Predicate>,
        rhs: Box<Predicate>,
    },
    Index {
        base: Box<Predicate>,
        index: Box<Predicate>,
    },
    Quantifier {
        kind: QuantKind,
        var: String,
        lo: Box<Predicate>,
        hi: Box<Predicate>,
        body: Box<Predicate>,
    },
    App {
        func: String,
        args: Vec<Predicate>,
    },
}

#[allow(clippy::should_implement_trait)]
impl Predicate {
    pub fn var(name: impl Into<String>) -> Self {
        Predicate::Var(name.into())
    }

    pub fn int(n: i64) -> Self {
        Predicate::Literal(Value::Int(n))
    }

    pub fn bool(b: bool) -> Self {
        Predicate::Literal(Value::Bool(b))
    }

    pub fn ret() -> Self {
        Predicate::Var(RETURN_SYMBOL.to_string())
    }

    pub fn neg(self) -> Self {
        Predicate::Unary {
            op: UnaryOp::Neg,
            arg: Box::new(self),
        }
    }

    pub fn not(self) -> Self {
        Predicate::Unary {
            op: UnaryOp::Not,
            arg: Box::new(self),
        }
    }

    pub fn binary(self, op: BinaryOp, rhs: Predicate) -> Self {
        Predicate::Binary {
            op,
            lhs: Box::new(self),
            rhs: Box::new(rhs),
        }
    }

    pub fn add(self, rhs: Predicate) -> Self {
        self.binary(BinaryOp::Add, rhs)
    }

    pub fn sub(self, rhs: Predicate) -> Self {
        self.binary(BinaryOp::Sub, rhs)
    }

    pub fn mul(self, rhs: Predicate) -> Self {
        self.binary(BinaryOp::Mul, rhs)
    }

    pub fn div(self, rhs: Predicate) -> Self {
        self.binary(BinaryOp::Div, rhs)
    }

    pub fn and(self, rhs: Predicate) -> Self {
        self.binary(BinaryOp::And, rhs)
    }

    pub fn or(self, rhs: Predicate) -> Self {
        self.binary(BinaryOp::Or, rhs)
    }

    pub fn compare(self, op: CompareOp, rhs: Predicate) -> Self {
        Predicate::Compare {
            op,
            lhs: Box::new(self),
            rhs: Box::new(rhs),
        }
    }

    pub fn eq(self, rhs: Predicate) -> Self {
        self.compare(CompareOp::Eq, rhs)
    }

    pub fn ne(self, rhs: Predicate) -> Self {
        self.compare(CompareOp::Ne, rhs)
    }

    pub fn lt(self, rhs: Predicate) -> Self {
        self.compare(CompareOp::Lt, rhs)
    }

    pub fn le(self, rhs: Predicate) -> Self {
        self.compare(CompareOp::Le, rhs)
    }

    pub fn gt(self, rhs: Predicate) -> Self {
        self.compare(CompareOp::Gt, rhs)
    }

    pub fn ge(self, rhs: Predicate) -> Self {
        self.compare(CompareOp::Ge, rhs)
    }

    pub fn index(self, idx: Predicate) -> Self {
        Predicate::Index {
            base: Box::new(self),
            index: Box::new(idx),
        }
    }

    pub fn app(func: impl Into<String>, args: Vec<Predicate>) -> Self {
        Predicate::App {
            func: func.into(),
            args,
        }
    }

    pub fn forall(
        var: impl Into<String>,
        lo: Predicate,
        hi: Predicate,
        body: Predicate,
    ) -> Self {
        Predicate::Quantifier {
            kind: QuantKind::Forall,
            var: var.into(),
            lo: Box::new(lo),
            hi: Box::new(hi),
            body: Box::new(body),
        }
    }

    pub fn exists(
        var: impl Into<String>,
        lo: Predicate,
        hi: Predicate,
        body: Predicate,
    ) -> Self {
        Predicate::Quantifier {
            kind: QuantKind::Exists,
            var: var.into(),
            lo: Box::new(lo),
            hi: Box::new(hi),
            body: Box::new(body),
        }
    }

    /// Collect free variable names, skipping quantifier-bound names.
    pub fn free_vars(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_free_vars(&mut Vec::new(), &mut out);
        out
    }

    fn collect_free_vars(&self, bound: &mut Vec<String>, out: &mut BTreeSet<String>) {
        match self {
            Predicate::Literal(_) => {}
            Predicate::Var(name) => {
                if !bound.iter().any(|b| b == name) {
                    out.insert(name.clone());
                }
            }
            Predicate::Unary { arg, .. } => arg.collect_free_vars(bound, out),
            Predicate::Binary { lhs, rhs, .. } | Predicate::Compare { lhs, rhs, .. } => {
                lhs.collect_free_vars(bound, out);
                rhs.collect_free_vars(bound, out);
            }
            Predicate::Index { base, index } => {
                base.collect_free_vars(bound, out);
                index.collect_free_vars(bound, out);
            }
            Predicate::Quantifier {
                var, lo, hi, body, ..
            } => {
                lo.collect_free_vars(bound, out);
                hi.collect_free_vars(bound, out);
                bound.push(var.clone());
                body.collect_free_vars(bound, out);
                bound.pop();
            }
            Predicate::App { args, .. } => {
                for arg in args {
                    arg.collect_free_vars(bound, out);
                }
            }
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOp::Neg => write!(f, "-"),
            UnaryOp::Not => write!(f, "!"),
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        };
        write!(f, "{s}")
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        };
        write!(f, "{s}")
    }
}

/// Canonical contract text. Fully parenthesized so the rendering is
/// unambiguous and stable; the verification cache hashes this form.
impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Literal(v) => write!(f, "{v}"),
            Predicate::Var(name) => write!(f, "{name}"),
            Predicate::Unary { op, arg } => write!(f, "{op}{arg}"),
            Predicate::Binary { op, lhs, rhs } => write!(f, "({lhs} {op} {rhs})"),
            Predicate::Compare { op, lhs, rhs } => write!(f, "({lhs} {op} {rhs})"),
            Predicate::Index { base, index } => write!(f, "{base}[{index}]"),
            Predicate::Quantifier {
                kind,
                var,
                lo,
                hi,
                body,
            } => {
                let q = match kind {
                    QuantKind::Forall => "forall",
                    QuantKind::Exists => "exists",
                };
                write!(f, "({q} {var} in [{lo}, {hi}) . {body})")
            }
            Predicate::App { func, args } => {
                write!(f, "{func}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_fully_parenthesized() {
        let p = Predicate::var("n").ge(Predicate::int(0));
        assert_eq!(p.to_string(), "(n >= 0)");

        let p = Predicate::ret()
            .ge(Predicate::int(1))
            .or(Predicate::ret().eq(Predicate::int(0)));
        assert_eq!(p.to_string(), "(($ret >= 1) || ($ret == 0))");
    }

    #[test]
    fn display_quantifier_and_index() {
        let p = Predicate::forall(
            "i",
            Predicate::int(0),
            Predicate::app("len", vec![Predicate::var("xs")]),
            Predicate::var("xs")
                .index(Predicate::var("i"))
                .ge(Predicate::int(0)),
        );
        assert_eq!(p.to_string(), "(forall i in [0, len(xs)) . (xs[i] >= 0))");
    }

    #[test]
    fn free_vars_skip_quantifier_bindings() {
        let p = Predicate::forall(
            "i",
            Predicate::int(0),
            Predicate::var("n"),
            Predicate::var("xs")
                .index(Predicate::var("i"))
                .lt(Predicate::var("bound")),
        );
        let vars = p.free_vars();
        assert!(vars.contains("n"));
        assert!(vars.contains("xs"));
        assert!(vars.contains("bound"));
        assert!(!vars.contains("i"));
    }

    #[test]
    fn free_vars_include_return_symbol() {
        let p = Predicate::ret().ge(Predicate::int(1));
        assert!(p.free_vars().contains(RETURN_SYMBOL));
    }

    #[test]
    fn predicate_serde_round_trip() {
        let p = Predicate::var("b").ne(Predicate::int(0));
        let json = serde_json::to_string(&p).unwrap();
        let back: Predicate = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}
