//! Whole-program pass behavior: worker pool, cache reuse, per-unit
//! isolation, cancellation, and the wire form of the pass report.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};

use common::{int_fn, MiniSolver};

use synton_ast::{Arg, CallSite, Contract, NodeId, Param, Predicate, Program, Type, Value};
use synton_engine::dso::codes;
use synton_engine::pipeline::{
    CancelFlag, PassReport, Pipeline, PipelineOptions, ReportStatus,
};
use synton_engine::session::EngineError;
use synton_engine::suggest::SuggestionKind;

fn pre_only(pred: Predicate) -> Contract {
    Contract {
        preconditions: vec![pred.into()],
        postconditions: vec![],
        invariants: vec![],
    }
}

fn entailed_contract() -> Contract {
    Contract {
        preconditions: vec![Predicate::var("n").ge(Predicate::int(1)).into()],
        postconditions: vec![Predicate::var("n").ge(Predicate::int(0)).into()],
        invariants: vec![],
    }
}

#[test]
fn independent_units_verify_in_parallel() {
    let functions: Vec<_> = (0..8)
        .map(|i| int_fn(i, &format!("f{i}"), &["n"], entailed_contract()))
        .collect();
    let program = Program {
        functions,
        call_sites: vec![],
    };

    let sessions = AtomicUsize::new(0);
    let factory = || -> Result<MiniSolver, EngineError> {
        sessions.fetch_add(1, Ordering::SeqCst);
        Ok(MiniSolver::new(-16, 16))
    };
    let pipeline = Pipeline::new(&factory, PipelineOptions {
        jobs: 4,
        ..PipelineOptions::default()
    });

    let report = pipeline.verify_program(&program);
    assert_eq!(report.units.len(), 8);
    assert!(report.all_verified());
    // One isolated session per unit; none shared, none skipped.
    assert_eq!(sessions.load(Ordering::SeqCst), 8);
    // Reports come back in input order regardless of worker scheduling.
    let names: Vec<&str> = report.units.iter().map(|u| u.unit.as_str()).collect();
    assert_eq!(names, vec!["f0", "f1", "f2", "f3", "f4", "f5", "f6", "f7"]);
}

#[test]
fn cached_units_skip_the_solver_on_repeat_passes() {
    let program = Program {
        functions: vec![int_fn(1, "f", &["n"], entailed_contract())],
        call_sites: vec![],
    };

    let sessions = AtomicUsize::new(0);
    let factory = || -> Result<MiniSolver, EngineError> {
        sessions.fetch_add(1, Ordering::SeqCst);
        Ok(MiniSolver::new(-16, 16))
    };
    let pipeline = Pipeline::new(&factory, PipelineOptions::default());

    let first = pipeline.verify_program(&program);
    let second = pipeline.verify_program(&program);
    assert_eq!(first, second);
    assert_eq!(sessions.load(Ordering::SeqCst), 1);
    assert_eq!(pipeline.cache().len(), 1);
}

#[test]
fn a_changed_contract_misses_the_old_cache_entry() {
    let mut program = Program {
        functions: vec![int_fn(1, "f", &["n"], entailed_contract())],
        call_sites: vec![],
    };

    let sessions = AtomicUsize::new(0);
    let factory = || -> Result<MiniSolver, EngineError> {
        sessions.fetch_add(1, Ordering::SeqCst);
        Ok(MiniSolver::new(-16, 16))
    };
    let pipeline = Pipeline::new(&factory, PipelineOptions::default());

    pipeline.verify_program(&program);
    program.functions[0].contract.preconditions =
        vec![Predicate::var("n").ge(Predicate::int(2)).into()];
    pipeline.verify_program(&program);
    // The re-annotated function is a new key, so the solver ran again.
    assert_eq!(sessions.load(Ordering::SeqCst), 2);
    assert_eq!(pipeline.cache().len(), 2);
}

#[test]
fn a_failing_unit_never_aborts_its_siblings() {
    let ill_formed = int_fn(
        1,
        "broken",
        &["n"],
        pre_only(Predicate::var("mystery").gt(Predicate::int(0))),
    );
    let good = int_fn(2, "good", &["n"], entailed_contract());
    let program = Program {
        functions: vec![ill_formed, good],
        call_sites: vec![],
    };

    let pipeline = Pipeline::new(
        || -> Result<MiniSolver, EngineError> { Ok(MiniSolver::new(-16, 16)) },
        PipelineOptions::default(),
    );
    let report = pipeline.verify_program(&program);

    let broken = &report.units[0];
    assert_eq!(broken.status, ReportStatus::IllFormed);
    assert_eq!(broken.diagnostics[0].error_code, codes::CONTRACT_ILL_FORMED);
    assert!(broken.diagnostics[0]
        .error_details
        .actual
        .contains("mystery"));

    let good = &report.units[1];
    assert_eq!(good.status, ReportStatus::Verified);
    assert_eq!(report.exit_code(), 1);
}

#[test]
fn unsupported_bindings_are_a_translator_gap_not_an_ill_formed_contract() {
    let mut def = int_fn(1, "f", &[], Contract::default());
    def.params.push(Param::new("x", Type::Float));
    def.contract = pre_only(Predicate::var("x").gt(Predicate::int(0)));
    let program = Program {
        functions: vec![def],
        call_sites: vec![],
    };

    let pipeline = Pipeline::new(
        || -> Result<MiniSolver, EngineError> { Ok(MiniSolver::new(-16, 16)) },
        PipelineOptions::default(),
    );
    let report = pipeline.verify_program(&program);
    assert_eq!(report.units[0].status, ReportStatus::Unsupported);
    assert_eq!(
        report.units[0].diagnostics[0].error_code,
        codes::UNSUPPORTED_PREDICATE
    );
}

#[test]
fn a_call_to_an_undefined_function_gets_a_reference_diagnostic() {
    let program = Program {
        functions: vec![],
        call_sites: vec![CallSite {
            id: NodeId::new(3),
            callee: "missing".into(),
            args: vec![Arg::Literal(Value::Int(1))],
            span: None,
        }],
    };

    let sessions = AtomicUsize::new(0);
    let factory = || -> Result<MiniSolver, EngineError> {
        sessions.fetch_add(1, Ordering::SeqCst);
        Ok(MiniSolver::new(-16, 16))
    };
    let pipeline = Pipeline::new(&factory, PipelineOptions::default());
    let report = pipeline.verify_program(&program);

    let unit = &report.units[0];
    assert_eq!(unit.unit, "missing@n3");
    assert_eq!(unit.status, ReportStatus::IllFormed);
    let dso = &unit.diagnostics[0];
    assert_eq!(dso.error_code, codes::UNDEFINED_REFERENCE);
    assert_eq!(dso.suggestions[0].kind, SuggestionKind::Hint);
    // Nothing reached the solver.
    assert_eq!(sessions.load(Ordering::SeqCst), 0);
}

#[test]
fn functions_without_contracts_verify_without_a_session() {
    let program = Program {
        functions: vec![int_fn(1, "plain", &["n"], Contract::default())],
        call_sites: vec![],
    };

    let sessions = AtomicUsize::new(0);
    let factory = || -> Result<MiniSolver, EngineError> {
        sessions.fetch_add(1, Ordering::SeqCst);
        Ok(MiniSolver::new(-16, 16))
    };
    let pipeline = Pipeline::new(&factory, PipelineOptions::default());
    let report = pipeline.verify_program(&program);

    assert!(report.all_verified());
    assert_eq!(sessions.load(Ordering::SeqCst), 0);
    assert!(pipeline.cache().is_empty());
}

#[test]
fn cancellation_skips_pending_units_and_opens_no_sessions() {
    let functions: Vec<_> = (0..4)
        .map(|i| int_fn(i, &format!("f{i}"), &["n"], entailed_contract()))
        .collect();
    let program = Program {
        functions,
        call_sites: vec![],
    };

    let sessions = AtomicUsize::new(0);
    let factory = || -> Result<MiniSolver, EngineError> {
        sessions.fetch_add(1, Ordering::SeqCst);
        Ok(MiniSolver::new(-16, 16))
    };
    let pipeline = Pipeline::new(&factory, PipelineOptions::default());

    let cancel = CancelFlag::new();
    cancel.cancel();
    let report = pipeline.verify_program_with_cancel(&program, &cancel);

    assert_eq!(report.units.len(), 4);
    assert!(report
        .units
        .iter()
        .all(|u| u.status == ReportStatus::Cancelled));
    assert_eq!(sessions.load(Ordering::SeqCst), 0);
    assert_eq!(report.exit_code(), 2);
}

#[test]
fn backend_failures_surface_as_internal_errors_without_stopping_the_pass() {
    let program = Program {
        functions: vec![
            int_fn(1, "f0", &["n"], entailed_contract()),
            int_fn(2, "f1", &["n"], entailed_contract()),
        ],
        call_sites: vec![],
    };

    // Sessions fail to open at all; every unit still gets its own report.
    let factory = || -> Result<MiniSolver, EngineError> {
        Err(EngineError::Backend("solver crashed on startup".into()))
    };
    let pipeline = Pipeline::new(factory, PipelineOptions::default());
    let report = pipeline.verify_program(&program);

    assert_eq!(report.units.len(), 2);
    for unit in &report.units {
        assert_eq!(unit.status, ReportStatus::InternalError);
        assert_eq!(unit.diagnostics[0].error_code, codes::INTERNAL_ERROR);
    }
    assert_eq!(report.exit_code(), 2);
}

#[test]
fn pass_report_round_trips_through_its_wire_format() {
    let program = Program {
        functions: vec![int_fn(1, "fact", &["n"], entailed_contract())],
        call_sites: vec![CallSite {
            id: NodeId::new(9),
            callee: "fact".into(),
            args: vec![Arg::Literal(Value::Int(-1))],
            span: None,
        }],
    };
    let pipeline = Pipeline::new(
        || -> Result<MiniSolver, EngineError> { Ok(MiniSolver::new(-16, 16)) },
        PipelineOptions::default(),
    );
    let report = pipeline.verify_program(&program);
    assert!(report.units.iter().any(|u| !u.diagnostics.is_empty()));

    let json = serde_json::to_string_pretty(&report).unwrap();
    let back: PassReport = serde_json::from_str(&json).unwrap();
    assert_eq!(back, report);
}
