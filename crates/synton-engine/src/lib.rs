#![doc = include_str!("../README.md")]

//! Contract verification engine.
//!
//! The pipeline takes annotated function definitions and call sites to a
//! per-unit verdict (`verified`, `violated`, `inconsistent`, `unknown`,
//! `timed_out`) plus a fully-populated Debug State Object for every failure,
//! compile-time or runtime, in one schema.

pub mod cache;
pub mod collector;
pub mod counterexample;
pub mod diagnostic;
pub mod dso;
pub mod eval;
pub mod pipeline;
pub mod result;
pub mod session;
pub mod suggest;

pub use pipeline::{CancelFlag, PassReport, Pipeline, PipelineOptions, ReportStatus, UnitReport};
pub use session::{EngineError, SessionOptions};
