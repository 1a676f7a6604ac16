#![doc = include_str!("../README.md")]

//! SMT layer of the Synton contract verifier.
//!
//! The engine talks to solvers exclusively through the [`solver::SmtSolver`]
//! trait; the [`encoder`] module owns the mapping between contract
//! predicates, symbolic environment entries, and solver variables.

pub mod backends;
pub mod encoder;
pub mod solver;
pub mod sorts;
pub mod terms;
