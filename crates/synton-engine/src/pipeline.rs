//! Whole-program verification pass.
//!
//! Units (each annotated function, plus each call site against its callee's
//! preconditions) are independent and checked in parallel by a bounded worker
//! pool. Each worker opens its own solver session through the
//! [`SolverFactory`]; the sharded result cache is the only shared resource.
//! A failing unit never aborts the pass; every unit gets its own report and
//! the pass succeeds only if every unit is verified.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use synton_ast::{CallSite, NodeId, Program};
use synton_smt::solver::SmtSolver;

use crate::cache::{unit_cache_key, ResultCache};
use crate::collector::{collect, CollectError, UnitSpec};
use crate::diagnostic::DiagnosticBuilder;
use crate::dso::DebugStateObject;
use crate::result::VerificationStatus;
use crate::session::{EngineError, Orchestrator, SessionOptions};

/// Opens one fresh solver session per verification unit.
///
/// Sessions are never shared across units, which is what keeps the pass safe
/// to parallelize.
pub trait SolverFactory: Sync {
    type Solver: SmtSolver;

    fn open_session(&self) -> Result<Self::Solver, EngineError>;
}

impl<S, F> SolverFactory for F
where
    S: SmtSolver,
    F: Fn() -> Result<S, EngineError> + Sync,
{
    type Solver = S;

    fn open_session(&self) -> Result<S, EngineError> {
        self()
    }
}

/// Pass-wide policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineOptions {
    pub session: SessionOptions,
    /// Worker threads; zero sizes the pool to the available cores.
    pub jobs: usize,
}

/// Cooperative cancellation handle.
///
/// Setting the flag stops workers from claiming further units; the unit a
/// worker already owns runs to its own deadline and tears down only its own
/// session.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-unit verdict in the pass report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Verified,
    Violated,
    Inconsistent,
    Unknown,
    TimedOut,
    IllFormed,
    Unsupported,
    InternalError,
    Cancelled,
}

impl From<VerificationStatus> for ReportStatus {
    fn from(status: VerificationStatus) -> Self {
        match status {
            VerificationStatus::Verified => ReportStatus::Verified,
            VerificationStatus::Violated => ReportStatus::Violated,
            VerificationStatus::Inconsistent => ReportStatus::Inconsistent,
            VerificationStatus::Unknown => ReportStatus::Unknown,
            VerificationStatus::TimedOut => ReportStatus::TimedOut,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitReport {
    pub unit: String,
    pub node_id: NodeId,
    pub status: ReportStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default)]
    pub diagnostics: Vec<DebugStateObject>,
}

/// The whole pass, one report per unit in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PassReport {
    pub units: Vec<UnitReport>,
}

impl PassReport {
    pub fn all_verified(&self) -> bool {
        self.units
            .iter()
            .all(|u| u.status == ReportStatus::Verified)
    }

    pub fn count(&self, status: ReportStatus) -> usize {
        self.units.iter().filter(|u| u.status == status).count()
    }

    /// CLI contract: 0 = all verified (warnings allowed), 1 = at least one
    /// failed unit, 2 = the tooling itself failed or the pass was cancelled.
    pub fn exit_code(&self) -> u8 {
        let has = |status| self.units.iter().any(|u| u.status == status);
        if has(ReportStatus::InternalError) || has(ReportStatus::Cancelled) {
            return 2;
        }
        if has(ReportStatus::Violated)
            || has(ReportStatus::Inconsistent)
            || has(ReportStatus::IllFormed)
            || has(ReportStatus::Unsupported)
        {
            return 1;
        }
        0
    }
}

enum PlannedUnit<'a> {
    Unit(UnitSpec<'a>),
    UnknownCallee(&'a CallSite),
}

impl PlannedUnit<'_> {
    fn name(&self) -> String {
        match self {
            PlannedUnit::Unit(spec) => spec.name(),
            PlannedUnit::UnknownCallee(call) => format!("{}@{}", call.callee, call.id),
        }
    }

    fn node_id(&self) -> NodeId {
        match self {
            PlannedUnit::Unit(spec) => spec.node_id(),
            PlannedUnit::UnknownCallee(call) => call.id,
        }
    }
}

/// The verification pass: a solver factory, session policy, and the shared
/// result cache.
pub struct Pipeline<F: SolverFactory> {
    factory: F,
    options: PipelineOptions,
    cache: ResultCache,
}

impl<F: SolverFactory> Pipeline<F> {
    pub fn new(factory: F, options: PipelineOptions) -> Self {
        Self {
            factory,
            options,
            cache: ResultCache::new(),
        }
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn verify_program(&self, program: &Program) -> PassReport {
        self.verify_program_with_cancel(program, &CancelFlag::new())
    }

    pub fn verify_program_with_cancel(
        &self,
        program: &Program,
        cancel: &CancelFlag,
    ) -> PassReport {
        let units = plan_units(program);
        let jobs = self.effective_jobs(units.len());
        info!(units = units.len(), jobs, "verification pass started");

        let next = AtomicUsize::new(0);
        let reports: Mutex<Vec<(usize, UnitReport)>> = Mutex::new(Vec::with_capacity(units.len()));

        thread::scope(|s| {
            for _ in 0..jobs {
                s.spawn(|| loop {
                    let idx = next.fetch_add(1, Ordering::SeqCst);
                    let Some(planned) = units.get(idx) else {
                        break;
                    };
                    let report = if cancel.is_cancelled() {
                        UnitReport {
                            unit: planned.name(),
                            node_id: planned.node_id(),
                            status: ReportStatus::Cancelled,
                            detail: Some("pass cancelled before this unit started".into()),
                            diagnostics: Vec::new(),
                        }
                    } else {
                        self.verify_planned(planned)
                    };
                    debug!(unit = %report.unit, status = ?report.status, "unit finished");
                    if let Ok(mut guard) = reports.lock() {
                        guard.push((idx, report));
                    }
                });
            }
        });

        let mut collected = reports.into_inner().unwrap_or_default();
        collected.sort_by_key(|(idx, _)| *idx);
        let report = PassReport {
            units: collected.into_iter().map(|(_, r)| r).collect(),
        };
        info!(
            verified = report.count(ReportStatus::Verified),
            violated = report.count(ReportStatus::Violated),
            "verification pass finished"
        );
        report
    }

    /// Verify one unit through the cache; concurrent same-key requests
    /// coalesce onto a single solver session.
    pub fn verify_unit(&self, spec: &UnitSpec<'_>) -> UnitReport {
        self.verify_planned(&PlannedUnit::Unit(*spec))
    }

    /// Drop the cached result for a unit whose contract or body changed.
    pub fn invalidate_unit(&self, spec: &UnitSpec<'_>) {
        self.cache.invalidate(&unit_cache_key(spec.def, spec.call));
    }

    fn effective_jobs(&self, units: usize) -> usize {
        let configured = if self.options.jobs > 0 {
            self.options.jobs
        } else {
            thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        };
        configured.min(units).max(1)
    }

    fn verify_planned(&self, planned: &PlannedUnit<'_>) -> UnitReport {
        let name = planned.name();
        let node_id = planned.node_id();
        match planned {
            PlannedUnit::UnknownCallee(call) => UnitReport {
                unit: name,
                node_id,
                status: ReportStatus::IllFormed,
                detail: Some(format!("call to undefined function `{}`", call.callee)),
                diagnostics: vec![DiagnosticBuilder::from_undefined_callee(
                    call.id,
                    &call.callee,
                    call.span,
                )],
            },
            PlannedUnit::Unit(spec) => self.verify_spec(spec, name, node_id),
        }
    }

    fn verify_spec(&self, spec: &UnitSpec<'_>, name: String, node_id: NodeId) -> UnitReport {
        let source_span = match spec.call {
            Some(call) => call.span,
            None => spec.def.span,
        };

        let unit = match collect(spec) {
            Ok(unit) => unit,
            Err(err) => {
                let status = match err {
                    CollectError::UnsupportedBinding { .. } => ReportStatus::Unsupported,
                    _ => ReportStatus::IllFormed,
                };
                return UnitReport {
                    unit: name,
                    node_id,
                    status,
                    detail: Some(err.to_string()),
                    diagnostics: vec![DiagnosticBuilder::from_collect_error(
                        node_id,
                        &err,
                        source_span,
                    )],
                };
            }
        };

        // Nothing to assume and nothing to prove.
        if unit.constraints.is_empty() {
            return UnitReport {
                unit: name,
                node_id,
                status: ReportStatus::Verified,
                detail: None,
                diagnostics: Vec::new(),
            };
        }

        let key = unit_cache_key(spec.def, spec.call);
        let outcome = self.cache.get_or_compute(&key, || {
            let solver = self.factory.open_session()?;
            let mut orchestrator = Orchestrator::new(solver, self.options.session);
            orchestrator.verify_unit(&unit)
        });

        match outcome {
            Ok(outcome) => UnitReport {
                unit: name,
                node_id,
                status: outcome.status.into(),
                detail: outcome.detail.clone(),
                diagnostics: DiagnosticBuilder::from_verification(&unit, &outcome, source_span),
            },
            Err(err) => {
                let status = match err {
                    EngineError::Encode(_) => ReportStatus::Unsupported,
                    _ => ReportStatus::InternalError,
                };
                UnitReport {
                    unit: name,
                    node_id,
                    status,
                    detail: Some(err.to_string()),
                    diagnostics: vec![DiagnosticBuilder::from_engine_error(
                        node_id,
                        &err,
                        source_span,
                    )],
                }
            }
        }
    }
}

/// Every annotated function, then every call site against its callee.
fn plan_units(program: &Program) -> Vec<PlannedUnit<'_>> {
    let mut units = Vec::with_capacity(program.functions.len() + program.call_sites.len());
    for def in &program.functions {
        units.push(PlannedUnit::Unit(UnitSpec { def, call: None }));
    }
    for call in &program.call_sites {
        match program.function(&call.callee) {
            Some(def) => units.push(PlannedUnit::Unit(UnitSpec {
                def,
                call: Some(call),
            })),
            None => units.push(PlannedUnit::UnknownCallee(call)),
        }
    }
    units
}
