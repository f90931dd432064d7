//! Recursive cross-check formulation of the signature engine.
//!
//! Applies the identical per-node rules as the iterative engine, including
//! the signature memo and the shallow structure signing, expressed as a
//! depth-first recursion. Kept out of the production path: recursion depth
//! tracks input nesting, so the iterative form is primary. The test suite
//! asserts digest equality between the two forms.

use std::collections::HashSet;

use arbor::{Annotations, Ast, NodeId};

use crate::engine::{
    combine_signature, get_label, is_unordered, leaf_signature, refine_struct_ids, SignState,
};
use crate::hash::NodeHasher;
use crate::inject::{inject_nodes, StructIndex};
use crate::nonce::NonceSource;
use crate::{annotate, NonceMode, SigilError};

/// Computes the digest with the recursive formulation.
///
/// Mutates `ast` in place (node injection), like [`crate::sign`].
///
/// # Errors
/// Returns [`SigilError::MalformedAst`] under the same conditions as the
/// iterative engine.
pub fn sign_recursive(ast: &mut Ast, mode: NonceMode) -> Result<String, SigilError> {
    let mut annotations = Annotations::new();
    let mut nonces = NonceSource::new(mode);
    annotate::annotate_param_nonces(ast, &mut annotations, &mut nonces);

    let mut hasher = NodeHasher::new();
    let mut struct_index = StructIndex::new();
    inject_nodes(ast, &mut annotations, &mut struct_index, &mut nonces, &mut hasher)?;

    let mut state = SignState::new();
    let root = ast.root();
    let top_level: HashSet<NodeId> = ast.children(root, &annotations).into_iter().collect();
    Ok(sign_node(
        ast,
        &annotations,
        &struct_index,
        &top_level,
        &mut hasher,
        &mut state,
        root,
        "",
    ))
}

fn sign_node(
    ast: &Ast,
    annotations: &Annotations,
    struct_index: &StructIndex,
    top_level: &HashSet<NodeId>,
    hasher: &mut NodeHasher,
    state: &mut SignState,
    id: NodeId,
    pos: &str,
) -> String {
    let hash = hasher.hash(ast, annotations, id);
    // The memo mirrors the iterative skip gate: structurally identical
    // subtrees sign once, without re-buffering identifier positions.
    if let Some(signature) = state.signatures.get(&hash) {
        return signature.clone();
    }

    let children = ast.children(id, annotations);
    let signature = if children.is_empty() {
        let effective = if ast.node(id).is_identifier() {
            format!("{}Identifier", pos)
        } else {
            pos.to_string()
        };
        leaf_signature(
            ast,
            annotations,
            struct_index,
            hasher,
            state,
            id,
            hash,
            &effective,
        )
    } else {
        let child_pos = format!("{}{}", pos, ast.node(id).type_str());
        let mut child_sigs: Vec<String> = Vec::with_capacity(children.len());
        for &child in &children {
            child_sigs.push(sign_node(
                ast,
                annotations,
                struct_index,
                top_level,
                hasher,
                state,
                child,
                &child_pos,
            ));
        }
        if is_unordered(ast.node(id).type_str()) {
            child_sigs.sort();
        }
        let signature = combine_signature(&get_label(ast, id), &child_sigs);
        if top_level.contains(&id) {
            refine_struct_ids(&mut state.struct_id, &state.identity_pos, &signature);
            state.identity_pos.clear();
        }
        signature
    };
    state.signatures.insert(hash, signature.clone());
    signature
}
