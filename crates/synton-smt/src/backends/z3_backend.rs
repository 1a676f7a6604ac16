use std::collections::HashMap;

use thiserror::Error;
use z3::SatResult as Z3SatResult;

use crate::solver::{Model, ModelValue, SatResult, SmtSolver};
use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

#[derive(Debug, Error)]
pub enum Z3Error {
    #[error("Z3 error: {0}")]
    Internal(String),
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),
    #[error("Unknown function: {0}")]
    UnknownFunction(String),
    #[error("Sort mismatch for variable {0}")]
    SortMismatch(String),
}

/// Linked Z3 backend.
///
/// Query timeouts are set through solver parameters at construction so a
/// slow `check` returns `unknown` instead of blocking the session.
pub struct Z3Solver {
    solver: z3::Solver,
    int_vars: HashMap<String, z3::ast::Int>,
    bool_vars: HashMap<String, z3::ast::Bool>,
    bv_vars: HashMap<String, z3::ast::BV>,
    funs: HashMap<String, z3::FuncDecl>,
    _params: Option<z3::Params>,
}

impl Z3Solver {
    pub fn new() -> Self {
        Self {
            solver: z3::Solver::new(),
            int_vars: HashMap::new(),
            bool_vars: HashMap::new(),
            bv_vars: HashMap::new(),
            funs: HashMap::new(),
            _params: None,
        }
    }

    pub fn with_timeout_ms(timeout_ms: u64) -> Self {
        if timeout_ms == 0 {
            return Self::new();
        }
        let solver = z3::Solver::new();
        let mut params = z3::Params::new();
        params.set_u32("timeout", timeout_ms as u32);
        solver.set_params(&params);
        Self {
            solver,
            int_vars: HashMap::new(),
            bool_vars: HashMap::new(),
            bv_vars: HashMap::new(),
            funs: HashMap::new(),
            _params: Some(params),
        }
    }

    fn z3_sort(sort: &SmtSort) -> z3::Sort {
        match sort {
            SmtSort::Bool => z3::Sort::bool(),
            SmtSort::Int => z3::Sort::int(),
            SmtSort::BitVec(w) => z3::Sort::bitvector(*w),
        }
    }

    fn translate(&self, term: &SmtTerm) -> Result<Z3Term, Z3Error> {
        self.translate_term(term, &HashMap::new())
    }

    fn translate_term(
        &self,
        term: &SmtTerm,
        bound: &HashMap<String, Z3Term>,
    ) -> Result<Z3Term, Z3Error> {
        match term {
            SmtTerm::Var(name) => {
                if let Some(v) = bound.get(name) {
                    Ok(v.clone_term())
                } else if let Some(v) = self.int_vars.get(name) {
                    Ok(Z3Term::Int(v.clone()))
                } else if let Some(v) = self.bool_vars.get(name) {
                    Ok(Z3Term::Bool(v.clone()))
                } else if let Some(v) = self.bv_vars.get(name) {
                    Ok(Z3Term::Bv(v.clone()))
                } else {
                    Err(Z3Error::UnknownVariable(name.clone()))
                }
            }
            SmtTerm::IntLit(n) => Ok(Z3Term::Int(z3::ast::Int::from_i64(*n))),
            SmtTerm::BoolLit(b) => Ok(Z3Term::Bool(z3::ast::Bool::from_bool(*b))),
            SmtTerm::BvLit { value, width } => {
                Ok(Z3Term::Bv(z3::ast::BV::from_u64(*value, *width)))
            }
            SmtTerm::Add(lhs, rhs) => {
                let l = self.translate_term(lhs, bound)?.into_int()?;
                let r = self.translate_term(rhs, bound)?.into_int()?;
                Ok(Z3Term::Int(&l + &r))
            }
            SmtTerm::Sub(lhs, rhs) => {
                let l = self.translate_term(lhs, bound)?.into_int()?;
                let r = self.translate_term(rhs, bound)?.into_int()?;
                Ok(Z3Term::Int(&l - &r))
            }
            SmtTerm::Mul(lhs, rhs) => {
                let l = self.translate_term(lhs, bound)?.into_int()?;
                let r = self.translate_term(rhs, bound)?.into_int()?;
                Ok(Z3Term::Int(&l * &r))
            }
            SmtTerm::Div(lhs, rhs) => {
                let l = self.translate_term(lhs, bound)?.into_int()?;
                let r = self.translate_term(rhs, bound)?.into_int()?;
                Ok(Z3Term::Int(l.div(&r)))
            }
            SmtTerm::Mod(lhs, rhs) => {
                let l = self.translate_term(lhs, bound)?.into_int()?;
                let r = self.translate_term(rhs, bound)?.into_int()?;
                Ok(Z3Term::Int(l.modulo(&r)))
            }
            SmtTerm::Neg(inner) => {
                let v = self.translate_term(inner, bound)?.into_int()?;
                Ok(Z3Term::Int(v.unary_minus()))
            }
            SmtTerm::BvAdd(lhs, rhs) => {
                let l = self.translate_term(lhs, bound)?.into_bv()?;
                let r = self.translate_term(rhs, bound)?.into_bv()?;
                Ok(Z3Term::Bv(&l + &r))
            }
            SmtTerm::BvSub(lhs, rhs) => {
                let l = self.translate_term(lhs, bound)?.into_bv()?;
                let r = self.translate_term(rhs, bound)?.into_bv()?;
                Ok(Z3Term::Bv(&l - &r))
            }
            SmtTerm::BvMul(lhs, rhs) => {
                let l = self.translate_term(lhs, bound)?.into_bv()?;
                let r = self.translate_term(rhs, bound)?.into_bv()?;
                Ok(Z3Term::Bv(&l * &r))
            }
            SmtTerm::BvSDiv(lhs, rhs) => {
                let l = self.translate_term(lhs, bound)?.into_bv()?;
                let r = self.translate_term(rhs, bound)?.into_bv()?;
                Ok(Z3Term::Bv(l.bvsdiv(&r)))
            }
            SmtTerm::BvSRem(lhs, rhs) => {
                let l = self.translate_term(lhs, bound)?.into_bv()?;
                let r = self.translate_term(rhs, bound)?.into_bv()?;
                Ok(Z3Term::Bv(l.bvsrem(&r)))
            }
            SmtTerm::BvNeg(inner) => {
                let v = self.translate_term(inner, bound)?.into_bv()?;
                Ok(Z3Term::Bv(v.bvneg()))
            }
            SmtTerm::Eq(lhs, rhs) => {
                let l = self.translate_term(lhs, bound)?;
                let r = self.translate_term(rhs, bound)?;
                match (l, r) {
                    (Z3Term::Int(li), Z3Term::Int(ri)) => Ok(Z3Term::Bool(li.eq(&ri))),
                    (Z3Term::Bool(lb), Z3Term::Bool(rb)) => Ok(Z3Term::Bool(lb.eq(&rb))),
                    (Z3Term::Bv(lv), Z3Term::Bv(rv)) => Ok(Z3Term::Bool(lv.eq(&rv))),
                    _ => Err(Z3Error::Internal("Sort mismatch in Eq".into())),
                }
            }
            SmtTerm::Lt(lhs, rhs) => {
                let l = self.translate_term(lhs, bound)?.into_int()?;
                let r = self.translate_term(rhs, bound)?.into_int()?;
                Ok(Z3Term::Bool(l.lt(&r)))
            }
            SmtTerm::Le(lhs, rhs) => {
                let l = self.translate_term(lhs, bound)?.into_int()?;
                let r = self.translate_term(rhs, bound)?.into_int()?;
                Ok(Z3Term::Bool(l.le(&r)))
            }
            SmtTerm::Gt(lhs, rhs) => {
                let l = self.translate_term(lhs, bound)?.into_int()?;
                let r = self.translate_term(rhs, bound)?.into_int()?;
                Ok(Z3Term::Bool(l.gt(&r)))
            }
            SmtTerm::Ge(lhs, rhs) => {
                let l = self.translate_term(lhs, bound)?.into_int()?;
                let r = self.translate_term(rhs, bound)?.into_int()?;
                Ok(Z3Term::Bool(l.ge(&r)))
            }
            SmtTerm::BvSlt(lhs, rhs) => {
                let l = self.translate_term(lhs, bound)?.into_bv()?;
                let r = self.translate_term(rhs, bound)?.into_bv()?;
                Ok(Z3Term::Bool(l.bvslt(&r)))
            }
            SmtTerm::BvSle(lhs, rhs) => {
                let l = self.translate_term(lhs, bound)?.into_bv()?;
                let r = self.translate_term(rhs, bound)?.into_bv()?;
                Ok(Z3Term::Bool(l.bvsle(&r)))
            }
            SmtTerm::BvSgt(lhs, rhs) => {
                let l = self.translate_term(lhs, bound)?.into_bv()?;
                let r = self.translate_term(rhs, bound)?.into_bv()?;
                Ok(Z3Term::Bool(l.bvsgt(&r)))
            }
            SmtTerm::BvSge(lhs, rhs) => {
                let l = self.translate_term(lhs, bound)?.into_bv()?;
                let r = self.translate_term(rhs, bound)?.into_bv()?;
                Ok(Z3Term::Bool(l.bvsge(&r)))
            }
            SmtTerm::And(terms) => {
                let bools: Result<Vec<_>, _> = terms
                    .iter()
                    .map(|t| self.translate_term(t, bound).and_then(|z| z.into_bool()))
                    .collect();
                let bools = bools?;
                let refs: Vec<&z3::ast::Bool> = bools.iter().collect();
                Ok(Z3Term::Bool(z3::ast::Bool::and(&refs)))
            }
            SmtTerm::Or(terms) => {
                let bools: Result<Vec<_>, _> = terms
                    .iter()
                    .map(|t| self.translate_term(t, bound).and_then(|z| z.into_bool()))
                    .collect();
                let bools = bools?;
                let refs: Vec<&z3::ast::Bool> = bools.iter().collect();
                Ok(Z3Term::Bool(z3::ast::Bool::or(&refs)))
            }
            SmtTerm::Not(inner) => {
                let b = self.translate_term(inner, bound)?.into_bool()?;
                Ok(Z3Term::Bool(b.not()))
            }
            SmtTerm::Implies(lhs, rhs) => {
                let l = self.translate_term(lhs, bound)?.into_bool()?;
                let r = self.translate_term(rhs, bound)?.into_bool()?;
                Ok(Z3Term::Bool(l.implies(&r)))
            }
            SmtTerm::Ite(cond, then, els) => {
                let c = self.translate_term(cond, bound)?.into_bool()?;
                let t = self.translate_term(then, bound)?;
                let e = self.translate_term(els, bound)?;
                match (t, e) {
                    (Z3Term::Int(ti), Z3Term::Int(ei)) => Ok(Z3Term::Int(c.ite(&ti, &ei))),
                    (Z3Term::Bool(tb), Z3Term::Bool(eb)) => Ok(Z3Term::Bool(c.ite(&tb, &eb))),
                    (Z3Term::Bv(tv), Z3Term::Bv(ev)) => Ok(Z3Term::Bv(c.ite(&tv, &ev))),
                    _ => Err(Z3Error::Internal("Sort mismatch in ITE".into())),
                }
            }
            SmtTerm::ForAll(bindings, body) => {
                self.translate_quantifier(bindings, body, bound, true)
            }
            SmtTerm::Exists(bindings, body) => {
                self.translate_quantifier(bindings, body, bound, false)
            }
            SmtTerm::App(name, args) => {
                let decl = self
                    .funs
                    .get(name)
                    .ok_or_else(|| Z3Error::UnknownFunction(name.clone()))?;
                let translated: Result<Vec<Z3Term>, Z3Error> =
                    args.iter().map(|a| self.translate_term(a, bound)).collect();
                let translated = translated?;
                let dyn_args: Vec<&dyn z3::ast::Ast> =
                    translated.iter().map(|t| t.as_ast()).collect();
                let applied = decl.apply(&dyn_args);
                if let Some(i) = applied.as_int() {
                    Ok(Z3Term::Int(i))
                } else if let Some(b) = applied.as_bool() {
                    Ok(Z3Term::Bool(b))
                } else if let Some(v) = applied.as_bv() {
                    Ok(Z3Term::Bv(v))
                } else {
                    Err(Z3Error::Internal(format!(
                        "unsupported application result sort for `{name}`"
                    )))
                }
            }
        }
    }

    fn translate_quantifier(
        &self,
        bindings: &[(String, SmtSort)],
        body: &SmtTerm,
        bound: &HashMap<String, Z3Term>,
        universal: bool,
    ) -> Result<Z3Term, Z3Error> {
        // Bound variables become fresh constants layered over the declared
        // session variables; inner bindings shadow outer ones by name.
        let mut inner = bound.clone();
        let mut bound_asts: Vec<Z3Term> = Vec::with_capacity(bindings.len());
        for (name, sort) in bindings {
            let v = match sort {
                SmtSort::Int => Z3Term::Int(z3::ast::Int::new_const(name.clone())),
                SmtSort::Bool => Z3Term::Bool(z3::ast::Bool::new_const(name.clone())),
                SmtSort::BitVec(w) => Z3Term::Bv(z3::ast::BV::new_const(name.clone(), *w)),
            };
            inner.insert(name.clone(), v.clone_term());
            bound_asts.push(v);
        }
        let body = self.translate_term(body, &inner)?.into_bool()?;
        let dyn_bound: Vec<&dyn z3::ast::Ast> = bound_asts.iter().map(|t| t.as_ast()).collect();
        let quantified = if universal {
            z3::ast::forall_const(&dyn_bound, &[], &body)
        } else {
            z3::ast::exists_const(&dyn_bound, &[], &body)
        };
        Ok(Z3Term::Bool(quantified))
    }
}

enum Z3Term {
    Int(z3::ast::Int),
    Bool(z3::ast::Bool),
    Bv(z3::ast::BV),
}

impl Z3Term {
    fn clone_term(&self) -> Z3Term {
        match self {
            Z3Term::Int(i) => Z3Term::Int(i.clone()),
            Z3Term::Bool(b) => Z3Term::Bool(b.clone()),
            Z3Term::Bv(v) => Z3Term::Bv(v.clone()),
        }
    }

    fn into_int(self) -> Result<z3::ast::Int, Z3Error> {
        match self {
            Z3Term::Int(i) => Ok(i),
            _ => Err(Z3Error::Internal("Expected Int".into())),
        }
    }

    fn into_bool(self) -> Result<z3::ast::Bool, Z3Error> {
        match self {
            Z3Term::Bool(b) => Ok(b),
            _ => Err(Z3Error::Internal("Expected Bool".into())),
        }
    }

    fn into_bv(self) -> Result<z3::ast::BV, Z3Error> {
        match self {
            Z3Term::Bv(v) => Ok(v),
            _ => Err(Z3Error::Internal("Expected BitVec".into())),
        }
    }

    fn as_ast(&self) -> &dyn z3::ast::Ast {
        match self {
            Z3Term::Int(i) => i,
            Z3Term::Bool(b) => b,
            Z3Term::Bv(v) => v,
        }
    }
}

impl Default for Z3Solver {
    fn default() -> Self {
        Self::new()
    }
}

impl SmtSolver for Z3Solver {
    type Error = Z3Error;

    fn declare_var(&mut self, name: &str, sort: &SmtSort) -> Result<(), Z3Error> {
        match sort {
            SmtSort::Int => {
                let v = z3::ast::Int::new_const(name);
                self.int_vars.insert(name.to_string(), v);
            }
            SmtSort::Bool => {
                let v = z3::ast::Bool::new_const(name);
                self.bool_vars.insert(name.to_string(), v);
            }
            SmtSort::BitVec(w) => {
                let v = z3::ast::BV::new_const(name, *w);
                self.bv_vars.insert(name.to_string(), v);
            }
        }
        Ok(())
    }

    fn declare_fun(
        &mut self,
        name: &str,
        domain: &[SmtSort],
        range: &SmtSort,
    ) -> Result<(), Z3Error> {
        let domain_sorts: Vec<z3::Sort> = domain.iter().map(Self::z3_sort).collect();
        let domain_refs: Vec<&z3::Sort> = domain_sorts.iter().collect();
        let decl = z3::FuncDecl::new(name, &domain_refs, &Self::z3_sort(range));
        self.funs.insert(name.to_string(), decl);
        Ok(())
    }

    fn assert(&mut self, term: &SmtTerm) -> Result<(), Z3Error> {
        let z3_term = self.translate(term)?.into_bool()?;
        self.solver.assert(&z3_term);
        Ok(())
    }

    fn push(&mut self) -> Result<(), Z3Error> {
        self.solver.push();
        Ok(())
    }

    fn pop(&mut self) -> Result<(), Z3Error> {
        self.solver.pop(1);
        Ok(())
    }

    fn check_sat(&mut self) -> Result<SatResult, Z3Error> {
        match self.solver.check() {
            Z3SatResult::Sat => Ok(SatResult::Sat),
            Z3SatResult::Unsat => Ok(SatResult::Unsat),
            Z3SatResult::Unknown => Ok(SatResult::Unknown(
                self.solver
                    .get_reason_unknown()
                    .unwrap_or_else(|| "Z3 returned unknown".into()),
            )),
        }
    }

    fn check_sat_with_model(
        &mut self,
        var_names: &[(&str, &SmtSort)],
    ) -> Result<(SatResult, Option<Model>), Z3Error> {
        match self.check_sat()? {
            SatResult::Sat => {
                let z3_model = self
                    .solver
                    .get_model()
                    .ok_or_else(|| Z3Error::Internal("SAT but no model available".into()))?;
                let mut values = HashMap::new();

                for &(name, sort) in var_names {
                    match sort {
                        SmtSort::Int => {
                            if let Some(v) = self.int_vars.get(name) {
                                if let Some(val) = z3_model.eval::<z3::ast::Int>(v, true) {
                                    if let Some(n) = val.as_i64() {
                                        values.insert(name.to_string(), ModelValue::Int(n));
                                    }
                                }
                            }
                        }
                        SmtSort::Bool => {
                            if let Some(v) = self.bool_vars.get(name) {
                                if let Some(val) = z3_model.eval::<z3::ast::Bool>(v, true) {
                                    if let Some(b) = val.as_bool() {
                                        values.insert(name.to_string(), ModelValue::Bool(b));
                                    }
                                }
                            }
                        }
                        SmtSort::BitVec(w) => {
                            if let Some(v) = self.bv_vars.get(name) {
                                if let Some(val) = z3_model.eval::<z3::ast::BV>(v, true) {
                                    if let Some(n) = val.as_u64() {
                                        values.insert(
                                            name.to_string(),
                                            ModelValue::BitVec {
                                                value: n,
                                                width: *w,
                                            },
                                        );
                                    }
                                }
                            }
                        }
                    }
                }

                Ok((SatResult::Sat, Some(Model { values })))
            }
            other => Ok((other, None)),
        }
    }

    fn reset(&mut self) -> Result<(), Z3Error> {
        self.solver.reset();
        // Z3 may drop per-solver parameters on reset; reapply if configured.
        if let Some(params) = &self._params {
            self.solver.set_params(params);
        }
        self.int_vars.clear();
        self.bool_vars.clear();
        self.bv_vars.clear();
        self.funs.clear();
        Ok(())
    }
}
