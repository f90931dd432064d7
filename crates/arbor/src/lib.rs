//! # Arbor: The ESTree Node Universe
//!
//! **Role**: Owns the AST that the signature engine consumes (an
//! arena-allocated tree of tagged records) and the parser adapter that
//! lowers a tree-sitter JavaScript CST into that shape.
//!
//! **Core Types**:
//! - `Kind`: the full node universe, parser-produced ESTree kinds plus the
//!   synthetic kinds injected during grammar regularization.
//! - `Ast` / `NodeId`: arena of nodes with stable `u32` ids.
//! - `Annotations`: per-invocation side table (`ParamNonce` | `Structure`)
//!   keyed by node id, replacing ad-hoc field attachment on nodes.
//!
//! **Design**:
//! - Fields are held in canonical (name-sorted) order; that order is the
//!   iteration order for both hashing and child gathering, and it places the
//!   injected structure edge ahead of the declared identifier in postorder.
//! - Absent fields are omitted, never stored as null. A `Null` value occurs
//!   only where the grammar produces one (the `null` literal).

pub mod node;
pub mod parse;

pub use node::{Annotation, Annotations, Ast, InjectedKind, Kind, Node, NodeId, Value};
pub use parse::parse_script;

/// Errors produced by the Arbor crate.
#[derive(Debug, thiserror::Error)]
pub enum ArborError {
    /// The script is not syntactically valid JavaScript.
    #[error("Parse failure: {0}")]
    ParseFailure(String),

    /// The tree-sitter JavaScript grammar failed to load.
    #[error("Grammar load failure: {0}")]
    Grammar(String),
}
