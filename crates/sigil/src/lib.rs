//! # Sigil: Structural Signature Engine
//!
//! **Role**: Computes the structural signature digest of a JavaScript
//! program: a fixed-width hex digest invariant under semantics-preserving
//! renames and object-literal reordering, sensitive to everything else.
//!
//! **Pipeline** (leaves first):
//! 1. `annotate` — tags parameter-referencing identifiers with a
//!    per-function nonce.
//! 2. `inject` — regularizes the grammar in place: operator wrappers,
//!    structure nodes factoring declaration identity, LHS/RHS wrappers.
//! 3. `traverse` — postorder linearization with root-to-node path strings.
//! 4. `engine` — the iterative signature computation; the root's signature
//!    is the script digest.
//!
//! **Design**:
//! - All state (annotations, structure index, signature maps) lives for a
//!   single invocation; nothing is shared across calls.
//! - Every production walk uses an explicit stack. The recursive
//!   formulation in `recursive` exists for test cross-checks only.
//! - SHA-256 hex strings are the signature space; a memoized blake3/u64
//!   node hash is the map key space. The two never mix.

pub mod annotate;
pub mod engine;
pub mod hash;
pub mod inject;
pub mod nonce;
pub mod recursive;
pub mod traverse;

use arbor::{Annotations, Ast};

pub use nonce::NonceMode;

/// Errors produced by the signature engine.
#[derive(Debug, thiserror::Error)]
pub enum SigilError {
    /// A declaration lacked a field the grammar regularization requires.
    #[error("Malformed AST: {kind} node is missing required field `{field}`")]
    MalformedAst { kind: String, field: &'static str },
}

/// Computes the structural signature digest of a parsed script.
///
/// Mutates `ast` in place (node injection); callers signing the same tree
/// from multiple threads must clone it first or keep a one-writer
/// discipline.
///
/// # Errors
/// Returns [`SigilError::MalformedAst`] if a declaration is missing its
/// declared identifier.
///
/// # Example
/// ```
/// let mut ast = arbor::parse_script("var x = 10;").unwrap();
/// let digest = sigil::sign(&mut ast, sigil::NonceMode::Random).unwrap();
/// assert_eq!(digest.len(), 64);
/// ```
pub fn sign(ast: &mut Ast, mode: NonceMode) -> Result<String, SigilError> {
    let mut annotations = Annotations::new();
    let mut nonces = nonce::NonceSource::new(mode);
    annotate::annotate_param_nonces(ast, &mut annotations, &mut nonces);

    let mut hasher = hash::NodeHasher::new();
    let mut struct_index = inject::StructIndex::new();
    inject::inject_nodes(ast, &mut annotations, &mut struct_index, &mut nonces, &mut hasher)?;

    let traversal = traverse::traverse(ast, &annotations);
    engine::structural_signature(ast, &annotations, &traversal, &struct_index, &mut hasher)
}
