use serde::{Deserialize, Serialize};

use crate::contract::Contract;
use crate::id::NodeId;
use crate::span::Span;
use crate::types::Type;
use crate::value::Value;

/// A typed parameter or local binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: Type,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            span: None,
        }
    }
}

/// A function definition as handed over by the parser and type checker.
///
/// `locals` is the part of the body the symbolic analysis needs: the typed
/// bindings introduced inside the function. The executable body stays with
/// the runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub id: NodeId,
    pub name: String,
    pub params: Vec<Param>,
    pub ret: Type,
    #[serde(default)]
    pub contract: Contract,
    #[serde(default)]
    pub locals: Vec<Param>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

impl FunctionDef {
    /// Deterministic signature rendering, part of the verification cache key.
    ///
    /// Locals participate so that a body change invalidates cached results.
    pub fn signature_text(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| format!("{}: {}", p.name, p.ty))
            .collect();
        let locals: Vec<String> = self
            .locals
            .iter()
            .map(|p| format!("{}: {}", p.name, p.ty))
            .collect();
        format!(
            "fn {}({}) -> {} [{}]",
            self.name,
            params.join(", "),
            self.ret,
            locals.join(", ")
        )
    }
}

/// One argument at a call site.
///
/// Literal arguments constrain the callee's inputs during call-site checking;
/// opaque arguments stay fully symbolic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arg {
    Literal(Value),
    Opaque,
}

/// A call expression selected as the representative call for a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSite {
    pub id: NodeId,
    pub callee: String,
    pub args: Vec<Arg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

impl CallSite {
    /// Deterministic rendering of the literal arguments, part of the cache key.
    pub fn literal_args_text(&self) -> String {
        let rendered: Vec<String> = self
            .args
            .iter()
            .enumerate()
            .map(|(i, arg)| match arg {
                Arg::Literal(v) => format!("{i}={v}"),
                Arg::Opaque => format!("{i}=_"),
            })
            .collect();
        rendered.join(",")
    }
}

/// The verification engine's whole input: annotated functions plus the call
/// sites the frontend wants checked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub functions: Vec<FunctionDef>,
    #[serde(default)]
    pub call_sites: Vec<CallSite>,
}

impl Program {
    pub fn function(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.iter().find(|f| f.name == name)
    }
}
