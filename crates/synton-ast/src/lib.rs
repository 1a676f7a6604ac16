#![doc = include_str!("../README.md")]

//! Input data model for the Synton contract verification engine.
//!
//! Everything here is produced upstream (parser, type checker, contract
//! annotation pass) and consumed read-only by the verifier. All types are
//! `serde`-serializable so a frontend can hand the engine a JSON AST dump.

pub mod contract;
pub mod id;
pub mod predicate;
pub mod program;
pub mod span;
pub mod types;
pub mod value;

pub use contract::{Contract, ContractClause, ContractKind};
pub use id::NodeId;
pub use predicate::{BinaryOp, CompareOp, Predicate, QuantKind, UnaryOp, RETURN_SYMBOL};
pub use program::{Arg, CallSite, FunctionDef, Param, Program};
pub use span::Span;
pub use types::Type;
pub use value::Value;
