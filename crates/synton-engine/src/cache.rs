//! Sharded verification-result cache with request coalescing.
//!
//! Keys are a SHA-256 over the unit's signature, canonical contract text,
//! and call-site literal arguments, so any change to the contract or to the
//! body fingerprint produces a different key and stale entries simply stop
//! being addressed. Shards keep unrelated units from contending; same-key
//! concurrent requests coalesce onto a single in-flight computation, with
//! the waiters adopting the leader's result.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};

use sha2::{Digest, Sha256};

use synton_ast::{CallSite, FunctionDef};

use crate::result::VerificationOutcome;
use crate::session::EngineError;

const SHARD_COUNT: usize = 16;

/// Content hash addressing one unit's verification result.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

pub fn sha256_hex_text(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Cache key for a unit: function signature + contract text, plus the
/// representative call's literal arguments when checking a call site.
pub fn unit_cache_key(def: &FunctionDef, call: Option<&CallSite>) -> CacheKey {
    let mut text = String::new();
    text.push_str(&def.signature_text());
    text.push('\n');
    text.push_str(&def.contract.canonical_text());
    if let Some(call) = call {
        text.push_str(&format!("\ncall {} ({})", call.id, call.literal_args_text()));
    }
    CacheKey(sha256_hex_text(&text))
}

struct Gate {
    done: Mutex<bool>,
    cv: Condvar,
}

impl Gate {
    fn new() -> Self {
        Self {
            done: Mutex::new(false),
            cv: Condvar::new(),
        }
    }

    fn wait(&self) -> Result<(), EngineError> {
        let mut done = self.done.lock().map_err(|_| poisoned())?;
        while !*done {
            done = self.cv.wait(done).map_err(|_| poisoned())?;
        }
        Ok(())
    }

    fn open(&self) {
        if let Ok(mut done) = self.done.lock() {
            *done = true;
        }
        self.cv.notify_all();
    }
}

fn poisoned() -> EngineError {
    EngineError::Internal("verification cache lock poisoned".into())
}

enum Slot {
    InFlight(Arc<Gate>),
    Ready(VerificationOutcome),
}

/// The only resource shared across concurrent verification requests.
pub struct ResultCache {
    shards: Vec<Mutex<HashMap<String, Slot>>>,
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultCache {
    pub fn new() -> Self {
        Self {
            shards: (0..SHARD_COUNT).map(|_| Mutex::new(HashMap::new())).collect(),
        }
    }

    fn shard(&self, key: &CacheKey) -> &Mutex<HashMap<String, Slot>> {
        let byte = key.0.as_bytes().first().copied().unwrap_or(0) as usize;
        &self.shards[byte % SHARD_COUNT]
    }

    /// Look up `key`, or run `compute` exactly once among all concurrent
    /// same-key callers. A failing leader removes the in-flight entry and a
    /// waiter takes over.
    pub fn get_or_compute<F>(
        &self,
        key: &CacheKey,
        compute: F,
    ) -> Result<VerificationOutcome, EngineError>
    where
        F: FnOnce() -> Result<VerificationOutcome, EngineError>,
    {
        enum Action {
            Done(VerificationOutcome),
            Lead(Arc<Gate>),
            Wait(Arc<Gate>),
        }

        let mut compute = Some(compute);
        loop {
            let action = {
                let mut shard = self.shard(key).lock().map_err(|_| poisoned())?;
                match shard.get(&key.0) {
                    Some(Slot::Ready(outcome)) => Action::Done(outcome.clone()),
                    Some(Slot::InFlight(gate)) => Action::Wait(gate.clone()),
                    None => {
                        let gate = Arc::new(Gate::new());
                        shard.insert(key.0.clone(), Slot::InFlight(gate.clone()));
                        Action::Lead(gate)
                    }
                }
            };

            match action {
                Action::Done(outcome) => return Ok(outcome),
                Action::Wait(gate) => {
                    gate.wait()?;
                    // Re-check the slot; a failed leader leaves it vacant.
                }
                Action::Lead(gate) => {
                    let Some(compute) = compute.take() else {
                        return Err(EngineError::Internal(
                            "cache leadership acquired twice for one request".into(),
                        ));
                    };
                    let result = compute();
                    {
                        let mut shard = self.shard(key).lock().map_err(|_| poisoned())?;
                        match &result {
                            Ok(outcome) => {
                                shard.insert(key.0.clone(), Slot::Ready(outcome.clone()));
                            }
                            Err(_) => {
                                shard.remove(&key.0);
                            }
                        }
                    }
                    gate.open();
                    return result;
                }
            }
        }
    }

    /// Drop a single entry, e.g. when the owning function was re-annotated.
    pub fn invalidate(&self, key: &CacheKey) {
        if let Ok(mut shard) = self.shard(key).lock() {
            shard.remove(&key.0);
        }
    }

    pub fn clear(&self) {
        for shard in &self.shards {
            if let Ok(mut shard) = shard.lock() {
                shard.clear();
            }
        }
    }

    /// Number of ready entries across all shards.
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .filter_map(|s| s.lock().ok())
            .map(|s| {
                s.values()
                    .filter(|slot| matches!(slot, Slot::Ready(_)))
                    .count()
            })
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use synton_ast::{Arg, Contract, NodeId, Param, Predicate, Type, Value};

    fn sample_def() -> FunctionDef {
        FunctionDef {
            id: NodeId::new(1),
            name: "fact".into(),
            params: vec![Param::new("n", Type::int())],
            ret: Type::int(),
            contract: Contract {
                preconditions: vec![Predicate::var("n").ge(Predicate::int(0)).into()],
                postconditions: vec![],
                invariants: vec![],
            },
            locals: vec![],
            span: None,
        }
    }

    #[test]
    fn key_changes_with_contract_and_body_and_args() {
        let def = sample_def();
        let base = unit_cache_key(&def, None);

        let mut reannotated = def.clone();
        reannotated.contract.preconditions =
            vec![Predicate::var("n").ge(Predicate::int(1)).into()];
        assert_ne!(base, unit_cache_key(&reannotated, None));

        let mut body_changed = def.clone();
        body_changed.locals.push(Param::new("tmp", Type::int()));
        assert_ne!(base, unit_cache_key(&body_changed, None));

        let call = CallSite {
            id: NodeId::new(7),
            callee: "fact".into(),
            args: vec![Arg::Literal(Value::Int(-1))],
            span: None,
        };
        let call_key = unit_cache_key(&def, Some(&call));
        assert_ne!(base, call_key);

        let mut other_args = call.clone();
        other_args.args = vec![Arg::Literal(Value::Int(2))];
        assert_ne!(call_key, unit_cache_key(&def, Some(&other_args)));
    }

    #[test]
    fn second_lookup_hits_without_recompute() {
        let cache = ResultCache::new();
        let key = unit_cache_key(&sample_def(), None);
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let outcome = cache
                .get_or_compute(&key, || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(VerificationOutcome::verified())
                })
                .unwrap();
            assert!(outcome.is_verified());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn failed_leader_leaves_no_entry() {
        let cache = ResultCache::new();
        let key = unit_cache_key(&sample_def(), None);

        let err = cache.get_or_compute(&key, || Err(EngineError::Internal("boom".into())));
        assert!(err.is_err());
        assert!(cache.is_empty());

        let ok = cache.get_or_compute(&key, || Ok(VerificationOutcome::verified()));
        assert!(ok.is_ok());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn invalidate_forces_recompute() {
        let cache = ResultCache::new();
        let key = unit_cache_key(&sample_def(), None);
        let calls = AtomicUsize::new(0);

        let mut run = || {
            cache
                .get_or_compute(&key, || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(VerificationOutcome::verified())
                })
                .unwrap()
        };
        run();
        run();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cache.invalidate(&key);
        run();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn concurrent_same_key_requests_coalesce() {
        let cache = ResultCache::new();
        let key = unit_cache_key(&sample_def(), None);
        let calls = AtomicUsize::new(0);

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    let outcome = cache
                        .get_or_compute(&key, || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            // Hold leadership long enough for followers to queue.
                            std::thread::sleep(std::time::Duration::from_millis(20));
                            Ok(VerificationOutcome::verified())
                        })
                        .unwrap();
                    assert!(outcome.is_verified());
                });
            }
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
