use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

/// Print an SmtTerm as SMT-LIB2 format.
pub fn to_smtlib(term: &SmtTerm) -> String {
    match term {
        SmtTerm::Var(name) => name.clone(),
        SmtTerm::IntLit(n) => {
            if *n < 0 {
                format!("(- {})", n.unsigned_abs())
            } else {
                n.to_string()
            }
        }
        SmtTerm::BoolLit(b) => {
            if *b {
                "true".to_string()
            } else {
                "false".to_string()
            }
        }
        SmtTerm::BvLit { value, width } => format!("(_ bv{value} {width})"),
        SmtTerm::Add(lhs, rhs) => format!("(+ {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Sub(lhs, rhs) => format!("(- {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Mul(lhs, rhs) => format!("(* {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Div(lhs, rhs) => format!("(div {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Mod(lhs, rhs) => format!("(mod {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Neg(inner) => format!("(- {})", to_smtlib(inner)),
        SmtTerm::BvAdd(lhs, rhs) => format!("(bvadd {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::BvSub(lhs, rhs) => format!("(bvsub {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::BvMul(lhs, rhs) => format!("(bvmul {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::BvSDiv(lhs, rhs) => format!("(bvsdiv {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::BvSRem(lhs, rhs) => format!("(bvsrem {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::BvNeg(inner) => format!("(bvneg {})", to_smtlib(inner)),
        SmtTerm::Eq(lhs, rhs) => format!("(= {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Lt(lhs, rhs) => format!("(< {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Le(lhs, rhs) => format!("(<= {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Gt(lhs, rhs) => format!("(> {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Ge(lhs, rhs) => format!("(>= {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::BvSlt(lhs, rhs) => format!("(bvslt {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::BvSle(lhs, rhs) => format!("(bvsle {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::BvSgt(lhs, rhs) => format!("(bvsgt {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::BvSge(lhs, rhs) => format!("(bvsge {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::And(terms) => {
            if terms.is_empty() {
                "true".to_string()
            } else if terms.len() == 1 {
                to_smtlib(&terms[0])
            } else {
                let inner: Vec<String> = terms.iter().map(to_smtlib).collect();
                format!("(and {})", inner.join(" "))
            }
        }
        SmtTerm::Or(terms) => {
            if terms.is_empty() {
                "false".to_string()
            } else if terms.len() == 1 {
                to_smtlib(&terms[0])
            } else {
                let inner: Vec<String> = terms.iter().map(to_smtlib).collect();
                format!("(or {})", inner.join(" "))
            }
        }
        SmtTerm::Not(inner) => format!("(not {})", to_smtlib(inner)),
        SmtTerm::Implies(lhs, rhs) => {
            format!("(=> {} {})", to_smtlib(lhs), to_smtlib(rhs))
        }
        SmtTerm::ForAll(bindings, body) => {
            let vars: Vec<String> = bindings
                .iter()
                .map(|(n, s)| format!("({n} {})", sort_to_smtlib(s)))
                .collect();
            format!("(forall ({}) {})", vars.join(" "), to_smtlib(body))
        }
        SmtTerm::Exists(bindings, body) => {
            let vars: Vec<String> = bindings
                .iter()
                .map(|(n, s)| format!("({n} {})", sort_to_smtlib(s)))
                .collect();
            format!("(exists ({}) {})", vars.join(" "), to_smtlib(body))
        }
        SmtTerm::Ite(cond, then, els) => {
            format!(
                "(ite {} {} {})",
                to_smtlib(cond),
                to_smtlib(then),
                to_smtlib(els)
            )
        }
        SmtTerm::App(func, args) => {
            if args.is_empty() {
                func.clone()
            } else {
                let inner: Vec<String> = args.iter().map(to_smtlib).collect();
                format!("({func} {})", inner.join(" "))
            }
        }
    }
}

/// Print a sort as SMT-LIB2 format.
pub fn sort_to_smtlib(sort: &SmtSort) -> String {
    sort.to_string()
}
