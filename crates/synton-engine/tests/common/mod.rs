#![allow(dead_code)]

//! Solver doubles for engine tests.
//!
//! [`MiniSolver`] decides linear integer/boolean constraint sets by
//! enumerating assignments over a small domain, which is enough to drive the
//! orchestrator through real sat/unsat/model paths without a solver binary.
//! [`ScriptedSolver`] replays a fixed response sequence for the paths a real
//! search cannot produce on demand (timeouts, unknown fragments).

use std::collections::{HashMap, VecDeque};
use std::convert::Infallible;

use synton_ast::{Contract, FunctionDef, NodeId, Param, Type};
use synton_smt::solver::{Model, ModelValue, SatResult, SmtSolver};
use synton_smt::sorts::SmtSort;
use synton_smt::terms::SmtTerm;

#[derive(Debug, Clone, Copy, PartialEq)]
enum V {
    I(i64),
    B(bool),
}

/// Brute-force model finder over a bounded integer domain.
pub struct MiniSolver {
    lo: i64,
    hi: i64,
    decls: Vec<(String, SmtSort)>,
    scopes: Vec<Vec<SmtTerm>>,
}

impl MiniSolver {
    pub fn new(lo: i64, hi: i64) -> Self {
        Self {
            lo,
            hi,
            decls: Vec::new(),
            scopes: vec![Vec::new()],
        }
    }

    fn assertions(&self) -> Vec<&SmtTerm> {
        self.scopes.iter().flatten().collect()
    }

    fn unsupported(&self) -> bool {
        fn walk(term: &SmtTerm) -> bool {
            match term {
                SmtTerm::App(..) => true,
                SmtTerm::BvLit { .. }
                | SmtTerm::BvAdd(..)
                | SmtTerm::BvSub(..)
                | SmtTerm::BvMul(..)
                | SmtTerm::BvSDiv(..)
                | SmtTerm::BvSRem(..)
                | SmtTerm::BvNeg(..)
                | SmtTerm::BvSlt(..)
                | SmtTerm::BvSle(..)
                | SmtTerm::BvSgt(..)
                | SmtTerm::BvSge(..) => true,
                SmtTerm::Var(_) | SmtTerm::IntLit(_) | SmtTerm::BoolLit(_) => false,
                SmtTerm::Add(a, b)
                | SmtTerm::Sub(a, b)
                | SmtTerm::Mul(a, b)
                | SmtTerm::Div(a, b)
                | SmtTerm::Mod(a, b)
                | SmtTerm::Eq(a, b)
                | SmtTerm::Lt(a, b)
                | SmtTerm::Le(a, b)
                | SmtTerm::Gt(a, b)
                | SmtTerm::Ge(a, b)
                | SmtTerm::Implies(a, b) => walk(a) || walk(b),
                SmtTerm::Neg(a) | SmtTerm::Not(a) => walk(a),
                SmtTerm::And(parts) | SmtTerm::Or(parts) => parts.iter().any(walk),
                SmtTerm::ForAll(_, body) | SmtTerm::Exists(_, body) => walk(body),
                SmtTerm::Ite(c, t, e) => walk(c) || walk(t) || walk(e),
            }
        }
        self.assertions().into_iter().any(walk)
    }

    fn eval(&self, term: &SmtTerm, env: &HashMap<String, V>) -> Option<V> {
        let int = |v: V| match v {
            V::I(n) => Some(n),
            V::B(_) => None,
        };
        let boolean = |v: V| match v {
            V::B(b) => Some(b),
            V::I(_) => None,
        };
        match term {
            SmtTerm::Var(name) => env.get(name).copied(),
            SmtTerm::IntLit(n) => Some(V::I(*n)),
            SmtTerm::BoolLit(b) => Some(V::B(*b)),
            SmtTerm::Neg(a) => Some(V::I(int(self.eval(a, env)?)?.wrapping_neg())),
            SmtTerm::Add(a, b) | SmtTerm::Sub(a, b) | SmtTerm::Mul(a, b)
            | SmtTerm::Div(a, b) | SmtTerm::Mod(a, b) => {
                let x = int(self.eval(a, env)?)?;
                let y = int(self.eval(b, env)?)?;
                let n = match term {
                    SmtTerm::Add(..) => x.wrapping_add(y),
                    SmtTerm::Sub(..) => x.wrapping_sub(y),
                    SmtTerm::Mul(..) => x.wrapping_mul(y),
                    // Division by zero is total in the theory; pin it to 0.
                    SmtTerm::Div(..) => {
                        if y == 0 {
                            0
                        } else {
                            x.div_euclid(y)
                        }
                    }
                    SmtTerm::Mod(..) => {
                        if y == 0 {
                            0
                        } else {
                            x.rem_euclid(y)
                        }
                    }
                    _ => unreachable!(),
                };
                Some(V::I(n))
            }
            SmtTerm::Eq(a, b) => {
                let x = self.eval(a, env)?;
                let y = self.eval(b, env)?;
                Some(V::B(x == y))
            }
            SmtTerm::Lt(a, b) | SmtTerm::Le(a, b) | SmtTerm::Gt(a, b) | SmtTerm::Ge(a, b) => {
                let x = int(self.eval(a, env)?)?;
                let y = int(self.eval(b, env)?)?;
                let holds = match term {
                    SmtTerm::Lt(..) => x < y,
                    SmtTerm::Le(..) => x <= y,
                    SmtTerm::Gt(..) => x > y,
                    SmtTerm::Ge(..) => x >= y,
                    _ => unreachable!(),
                };
                Some(V::B(holds))
            }
            SmtTerm::And(parts) => {
                for part in parts {
                    if !boolean(self.eval(part, env)?)? {
                        return Some(V::B(false));
                    }
                }
                Some(V::B(true))
            }
            SmtTerm::Or(parts) => {
                for part in parts {
                    if boolean(self.eval(part, env)?)? {
                        return Some(V::B(true));
                    }
                }
                Some(V::B(false))
            }
            SmtTerm::Not(a) => Some(V::B(!boolean(self.eval(a, env)?)?)),
            SmtTerm::Implies(a, b) => {
                let p = boolean(self.eval(a, env)?)?;
                let q = boolean(self.eval(b, env)?)?;
                Some(V::B(!p || q))
            }
            SmtTerm::Ite(c, t, e) => {
                if boolean(self.eval(c, env)?)? {
                    self.eval(t, env)
                } else {
                    self.eval(e, env)
                }
            }
            SmtTerm::ForAll(bindings, body) | SmtTerm::Exists(bindings, body) => {
                let [(var, _)] = bindings.as_slice() else {
                    return None;
                };
                let is_forall = matches!(term, SmtTerm::ForAll(..));
                let mut scope = env.clone();
                for v in self.lo..=self.hi {
                    scope.insert(var.clone(), V::I(v));
                    let holds = boolean(self.eval(body, &scope)?)?;
                    if is_forall && !holds {
                        return Some(V::B(false));
                    }
                    if !is_forall && holds {
                        return Some(V::B(true));
                    }
                }
                Some(V::B(is_forall))
            }
            _ => None,
        }
    }

    /// First satisfying assignment in declaration order, ints ascending.
    fn search(&self) -> Option<HashMap<String, V>> {
        let assertions = self.assertions();
        let mut env = HashMap::new();
        self.search_rec(0, &mut env, &assertions)
    }

    fn search_rec(
        &self,
        depth: usize,
        env: &mut HashMap<String, V>,
        assertions: &[&SmtTerm],
    ) -> Option<HashMap<String, V>> {
        if depth == self.decls.len() {
            let all_hold = assertions
                .iter()
                .all(|term| self.eval(term, env) == Some(V::B(true)));
            return all_hold.then(|| env.clone());
        }
        let (name, sort) = &self.decls[depth];
        match sort {
            SmtSort::Int => {
                for v in self.lo..=self.hi {
                    env.insert(name.clone(), V::I(v));
                    if let Some(found) = self.search_rec(depth + 1, env, assertions) {
                        return Some(found);
                    }
                }
            }
            SmtSort::Bool => {
                for v in [false, true] {
                    env.insert(name.clone(), V::B(v));
                    if let Some(found) = self.search_rec(depth + 1, env, assertions) {
                        return Some(found);
                    }
                }
            }
            SmtSort::BitVec(_) => {}
        }
        env.remove(name);
        None
    }

    fn model_of(env: &HashMap<String, V>) -> Model {
        let values = env
            .iter()
            .map(|(name, v)| {
                let value = match v {
                    V::I(n) => ModelValue::Int(*n),
                    V::B(b) => ModelValue::Bool(*b),
                };
                (name.clone(), value)
            })
            .collect();
        Model { values }
    }
}

impl SmtSolver for MiniSolver {
    type Error = Infallible;

    fn declare_var(&mut self, name: &str, sort: &SmtSort) -> Result<(), Infallible> {
        self.decls.push((name.to_string(), sort.clone()));
        Ok(())
    }

    fn declare_fun(
        &mut self,
        _name: &str,
        _domain: &[SmtSort],
        _range: &SmtSort,
    ) -> Result<(), Infallible> {
        Ok(())
    }

    fn assert(&mut self, term: &SmtTerm) -> Result<(), Infallible> {
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(term.clone());
        }
        Ok(())
    }

    fn push(&mut self) -> Result<(), Infallible> {
        self.scopes.push(Vec::new());
        Ok(())
    }

    fn pop(&mut self) -> Result<(), Infallible> {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
        Ok(())
    }

    fn check_sat(&mut self) -> Result<SatResult, Infallible> {
        if self.unsupported() {
            return Ok(SatResult::Unknown("unsupported term".into()));
        }
        Ok(match self.search() {
            Some(_) => SatResult::Sat,
            None => SatResult::Unsat,
        })
    }

    fn check_sat_with_model(
        &mut self,
        _var_names: &[(&str, &SmtSort)],
    ) -> Result<(SatResult, Option<Model>), Infallible> {
        if self.unsupported() {
            return Ok((SatResult::Unknown("unsupported term".into()), None));
        }
        Ok(match self.search() {
            Some(env) => (SatResult::Sat, Some(Self::model_of(&env))),
            None => (SatResult::Unsat, None),
        })
    }

    fn reset(&mut self) -> Result<(), Infallible> {
        self.decls.clear();
        self.scopes = vec![Vec::new()];
        Ok(())
    }
}

/// Replays a fixed sequence of check responses.
pub struct ScriptedSolver {
    responses: VecDeque<(SatResult, Option<Model>)>,
}

impl ScriptedSolver {
    pub fn new(responses: Vec<(SatResult, Option<Model>)>) -> Self {
        Self {
            responses: responses.into(),
        }
    }

    pub fn timing_out() -> Self {
        Self::new(vec![(SatResult::Unknown("timeout".into()), None)])
    }

    fn next(&mut self) -> (SatResult, Option<Model>) {
        self.responses
            .pop_front()
            .unwrap_or((SatResult::Unknown("script exhausted".into()), None))
    }
}

impl SmtSolver for ScriptedSolver {
    type Error = Infallible;

    fn declare_var(&mut self, _name: &str, _sort: &SmtSort) -> Result<(), Infallible> {
        Ok(())
    }

    fn declare_fun(
        &mut self,
        _name: &str,
        _domain: &[SmtSort],
        _range: &SmtSort,
    ) -> Result<(), Infallible> {
        Ok(())
    }

    fn assert(&mut self, _term: &SmtTerm) -> Result<(), Infallible> {
        Ok(())
    }

    fn push(&mut self) -> Result<(), Infallible> {
        Ok(())
    }

    fn pop(&mut self) -> Result<(), Infallible> {
        Ok(())
    }

    fn check_sat(&mut self) -> Result<SatResult, Infallible> {
        Ok(self.next().0)
    }

    fn check_sat_with_model(
        &mut self,
        _var_names: &[(&str, &SmtSort)],
    ) -> Result<(SatResult, Option<Model>), Infallible> {
        Ok(self.next())
    }

    fn reset(&mut self) -> Result<(), Infallible> {
        self.responses.clear();
        Ok(())
    }
}

pub fn int_fn(id: u32, name: &str, params: &[&str], contract: Contract) -> FunctionDef {
    FunctionDef {
        id: NodeId::new(id),
        name: name.into(),
        params: params
            .iter()
            .map(|p| Param::new(*p, Type::int()))
            .collect(),
        ret: Type::int(),
        contract,
        locals: vec![],
        span: None,
    }
}
