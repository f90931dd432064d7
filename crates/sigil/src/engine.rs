//! Iterative signature engine.
//!
//! Processes the postorder node list once. Leaves sign from their type and
//! label; identifier leaves sign from their declaration's structure node,
//! with a running per-identifier signature held in `struct_id`. Interior nodes
//! sign over their children's signatures, sorted first for unordered kinds.
//! After each direct child of the program root completes, the buffered
//! identifier positions are refined into `struct_id` and the buffer is
//! cleared. The root's signature is the script digest.

use std::collections::{HashMap, HashSet};

use arbor::{Annotations, Ast, Kind, NodeId, Value};

use crate::hash::{sig_hash, NodeHasher};
use crate::inject::StructIndex;
use crate::traverse::Traversal;
use crate::SigilError;

/// Node types whose children are a multiset for signature purposes.
///
/// Exactly object literals; expanding this set would silently break corpus
/// compatibility.
pub(crate) const UNORDERED_NODE_TYPES: &[&str] = &["ObjectExpression"];

pub(crate) fn is_unordered(tag: &str) -> bool {
    UNORDERED_NODE_TYPES.contains(&tag)
}

/// Engine-local signature state, created fresh per invocation.
pub(crate) struct SignState {
    /// Node hash → signature, for every processed node.
    pub signatures: HashMap<u64, String>,
    /// Identifier hash → (node, running structural signature).
    pub struct_id: HashMap<u64, (NodeId, String)>,
    /// Identifier hash → (node, positions buffered since the last
    /// refinement point).
    pub identity_pos: HashMap<u64, (NodeId, Vec<String>)>,
}

impl SignState {
    pub fn new() -> Self {
        Self {
            signatures: HashMap::new(),
            struct_id: HashMap::new(),
            identity_pos: HashMap::new(),
        }
    }
}

/// Runs the iterative engine over a traversed, injected tree.
pub fn structural_signature(
    ast: &Ast,
    annotations: &Annotations,
    traversal: &Traversal,
    struct_index: &StructIndex,
    hasher: &mut NodeHasher,
) -> Result<String, SigilError> {
    let mut state = SignState::new();
    let root = ast.root();
    let top_level: HashSet<NodeId> = ast.children(root, annotations).into_iter().collect();

    for &id in &traversal.nodes {
        let hash = hasher.hash(ast, annotations, id);
        if state.signatures.contains_key(&hash) {
            continue;
        }

        let children = ast.children(id, annotations);
        let signature = if children.is_empty() {
            let pos = traversal
                .node_pos
                .get(&id)
                .map(|p| p.to_string())
                .unwrap_or_default();
            leaf_signature(ast, annotations, struct_index, hasher, &mut state, id, hash, &pos)
        } else {
            let mut child_sigs: Vec<String> = Vec::with_capacity(children.len());
            for &child in &children {
                let child_hash = hasher.hash(ast, annotations, child);
                child_sigs.push(
                    state
                        .signatures
                        .get(&child_hash)
                        .expect("postorder guarantees child signatures")
                        .clone(),
                );
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
        state.signatures.insert(hash, signature);
    }

    let root_hash = hasher.hash(ast, annotations, root);
    Ok(state
        .signatures
        .get(&root_hash)
        .cloned()
        .expect("the root is the last traversed node"))
}

/// Signs a leaf node. `pos` is the leaf's traversal path string; only
/// identifier leaves consult it.
pub(crate) fn leaf_signature(
    ast: &Ast,
    annotations: &Annotations,
    struct_index: &StructIndex,
    hasher: &mut NodeHasher,
    state: &mut SignState,
    id: NodeId,
    hash: u64,
    pos: &str,
) -> String {
    let node = ast.node(id);
    if !node.is_identifier() {
        return sig_hash(&format!("{}{}", node.type_str(), get_label(ast, id)));
    }

    // Identifier leaf: reuse the running structural signature when one
    // exists, buffering this occurrence's position for refinement.
    if let Some((_, signature)) = state.struct_id.get(&hash) {
        let signature = signature.clone();
        state
            .identity_pos
            .entry(hash)
            .or_insert_with(|| (id, Vec::new()))
            .1
            .push(format!("{}Identifier", pos));
        return signature;
    }

    let signature = match structure_node_of(ast, annotations, hasher, struct_index, id) {
        Some(structure) => {
            let structure_hash = hasher.hash(ast, annotations, structure);
            if !state.signatures.contains_key(&structure_hash) {
                shallow_structure_signature(ast, annotations, hasher, state, structure);
            }
            let structure_sig = state
                .signatures
                .get(&structure_hash)
                .cloned()
                .expect("shallow pass records the structure signature");
            sig_hash(&format!("{}{}", sig_hash(node.type_str()), structure_sig))
        }
        // No structural identity available: default signature computation.
        None => sig_hash(&sig_hash(&get_label(ast, id))),
    };
    state.struct_id.insert(hash, (id, signature.clone()));
    signature
}

/// Shallow signature for a structure node met before its own postorder
/// turn: each child signs from type and label only, without recursing into
/// grandchildren. The recorded child signatures stand for those subtrees
/// from here on; deeper structure reaches the digest through the outer
/// pass and position refinement.
pub(crate) fn shallow_structure_signature(
    ast: &Ast,
    annotations: &Annotations,
    hasher: &mut NodeHasher,
    state: &mut SignState,
    structure: NodeId,
) {
    let children = ast.children(structure, annotations);
    let mut child_sigs: Vec<String> = Vec::with_capacity(children.len());
    for &child in &children {
        let child_sig = sig_hash(&format!(
            "{}{}",
            ast.node(child).type_str(),
            get_label(ast, child)
        ));
        state
            .signatures
            .insert(hasher.hash(ast, annotations, child), child_sig.clone());
        child_sigs.push(child_sig);
    }
    if is_unordered(ast.node(structure).type_str()) {
        child_sigs.sort();
    }
    let signature = combine_signature(&get_label(ast, structure), &child_sigs);
    state
        .signatures
        .insert(hasher.hash(ast, annotations, structure), signature);
}

/// The structure node for `id`: the annotation edge is the primary channel,
/// the hash index the fallback for identifier uses resolving to their
/// declaration by content.
pub(crate) fn structure_node_of(
    ast: &Ast,
    annotations: &Annotations,
    hasher: &mut NodeHasher,
    struct_index: &StructIndex,
    id: NodeId,
) -> Option<NodeId> {
    if let Some(structure) = annotations.structure(id) {
        return Some(structure);
    }
    let hash = hasher.hash(ast, annotations, id);
    struct_index.get(&hash).map(|(_, structure)| *structure)
}

/// Binds each buffered identifier's running signature to the just-completed
/// top-level statement's signature and the positions at which the
/// identifier occurred within it.
pub(crate) fn refine_struct_ids(
    struct_id: &mut HashMap<u64, (NodeId, String)>,
    identity_pos: &HashMap<u64, (NodeId, Vec<String>)>,
    top_signature: &str,
) {
    for (key, (_, positions)) in identity_pos {
        let mut pos_hash = String::new();
        for position in positions {
            pos_hash.push_str(&sig_hash(position));
        }
        let mixed = format!("{}{}", top_signature, pos_hash);
        if let Some(entry) = struct_id.get_mut(key) {
            entry.1 = sig_hash(&format!("{}{}", entry.1, mixed));
        }
    }
}

/// Combines a node label with its (possibly sorted) child signatures.
pub(crate) fn combine_signature(label: &str, child_sigs: &[String]) -> String {
    let mut text = sig_hash(label);
    for sig in child_sigs {
        text.push_str(sig);
    }
    sig_hash(&text)
}

/// The label function: literals label as their value, identifiers as their
/// name, operator wrappers as their operator string, everything else as
/// `{type}Type`.
pub(crate) fn get_label(ast: &Ast, id: NodeId) -> String {
    let node = ast.node(id);
    match node.kind() {
        Kind::Estree(tag) if tag == "Literal" => match node.field("value") {
            Some(value) => literal_text(value),
            None => format!("{}Type", node.type_str()),
        },
        Kind::Estree(tag) if tag == "Identifier" => match node.field("name") {
            Some(Value::Str(name)) => name.clone(),
            _ => format!("{}Type", node.type_str()),
        },
        Kind::Injected(kind) if kind.is_operator() => match node.field("operator") {
            Some(Value::Str(operator)) => operator.clone(),
            _ => format!("{}Type", node.type_str()),
        },
        _ => format!("{}Type", node.type_str()),
    }
}

/// JavaScript-style rendering of a literal value.
fn literal_text(value: &Value) -> String {
    match value {
        Value::Bool(true) => "true".to_string(),
        Value::Bool(false) => "false".to_string(),
        Value::Null => "null".to_string(),
        Value::Number(n) => format!("{}", n),
        Value::Str(s) => s.clone(),
        // Labels are primitive-only; node-valued literals do not occur.
        Value::Node(_) | Value::List(_) => String::new(),
    }
}
