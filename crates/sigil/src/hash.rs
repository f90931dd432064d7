//! Hash primitives: SHA-256 signature-space mixing and the 64-bit
//! structural node identity.
//!
//! Signatures are lowercase-hex SHA-256 strings composed by plain textual
//! concatenation, so composition is associative and well-defined. Node
//! identities are blake3 digests truncated to `u64` — a map key within one
//! invocation, not a cryptographic identity. Two structurally identical
//! subtrees hash equal by construction, and unrelated collisions are
//! acceptable at map-key odds.

use std::collections::HashMap;

use sha2::{Digest, Sha256};

use arbor::{Annotations, Ast, NodeId, Value};

/// Lowercase hex SHA-256 of the UTF-8 text.
///
/// Rust strings are valid UTF-8 by construction, so there are no invalid
/// sequences to elide here; lossy conversion at the parse boundary is what
/// absorbs encoding anomalies.
pub fn sig_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Computes deterministic 64-bit structural identities for nodes.
///
/// The hash covers the type tag, the node's annotations (a parameter nonce
/// separates same-named parameters of different functions; a structure edge
/// contributes its subtree), and the canonical `(field, value)` pairs, with
/// child nodes contributing their own identity values. Results are memoized
/// per [`NodeId`]; callers must not hash a node whose subtree will still be
/// mutated.
pub struct NodeHasher {
    cache: HashMap<NodeId, u64>,
}

impl NodeHasher {
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
        }
    }

    /// The structural identity of `id`, computing and caching any
    /// not-yet-hashed descendants first (explicit stack, no recursion).
    pub fn hash(&mut self, ast: &Ast, annotations: &Annotations, id: NodeId) -> u64 {
        if let Some(&cached) = self.cache.get(&id) {
            return cached;
        }
        let mut stack = vec![id];
        while let Some(&top) = stack.last() {
            if self.cache.contains_key(&top) {
                stack.pop();
                continue;
            }
            let mut ready = true;
            for child in ast.children(top, annotations) {
                if !self.cache.contains_key(&child) {
                    stack.push(child);
                    ready = false;
                }
            }
            if ready {
                let value = self.combine(ast, annotations, top);
                self.cache.insert(top, value);
                stack.pop();
            }
        }
        self.cache[&id]
    }

    /// Flattens one node over its already-hashed children.
    fn combine(&self, ast: &Ast, annotations: &Annotations, id: NodeId) -> u64 {
        let node = ast.node(id);
        let mut hasher = blake3::Hasher::new();
        hasher.update(node.type_str().as_bytes());
        hasher.update(&[0xFF]);

        if let Some(nonce) = annotations.nonce(id) {
            hasher.update(b"nonce\0");
            hasher.update(nonce.as_bytes());
            hasher.update(&[0xFF]);
        }
        if let Some(structure) = annotations.structure(id) {
            hasher.update(b"a_structure\0");
            hasher.update(&self.child_hash(structure).to_le_bytes());
            hasher.update(&[0xFF]);
        }

        for (name, value) in node.fields() {
            hasher.update(name.as_bytes());
            hasher.update(&[0]);
            match value {
                Value::Bool(b) => {
                    hasher.update(&[1, u8::from(*b)]);
                }
                Value::Number(n) => {
                    hasher.update(&[2]);
                    hasher.update(&n.to_bits().to_le_bytes());
                }
                Value::Str(s) => {
                    hasher.update(&[3]);
                    hasher.update(s.as_bytes());
                }
                Value::Null => {
                    hasher.update(&[4]);
                }
                Value::Node(child) => {
                    hasher.update(&[5]);
                    hasher.update(&self.child_hash(*child).to_le_bytes());
                }
                Value::List(list) => {
                    hasher.update(&[6]);
                    for child in list {
                        hasher.update(&self.child_hash(*child).to_le_bytes());
                    }
                }
            }
            hasher.update(&[0xFF]);
        }

        let digest = hasher.finalize();
        u64::from_le_bytes(digest.as_bytes()[..8].try_into().expect("blake3 ≥ 8 bytes"))
    }

    fn child_hash(&self, child: NodeId) -> u64 {
        *self
            .cache
            .get(&child)
            .expect("children are hashed before their parents")
    }
}

impl Default for NodeHasher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor::{Annotation, Kind, Node};

    fn identifier(ast: &mut Ast, name: &str) -> NodeId {
        ast.alloc(Node::new(
            Kind::estree("Identifier"),
            vec![("name", Value::Str(name.to_string()))],
        ))
    }

    #[test]
    fn test_sig_hash_vectors() {
        assert_eq!(
            sig_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            sig_hash("hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_identical_structure_hashes_equal() {
        let mut ast = Ast::empty();
        let a = identifier(&mut ast, "x");
        let b = identifier(&mut ast, "x");
        let annotations = Annotations::new();
        let mut hasher = NodeHasher::new();
        assert_eq!(
            hasher.hash(&ast, &annotations, a),
            hasher.hash(&ast, &annotations, b),
            "distinct ids with identical content must collide"
        );
    }

    #[test]
    fn test_name_changes_hash() {
        let mut ast = Ast::empty();
        let a = identifier(&mut ast, "x");
        let b = identifier(&mut ast, "y");
        let annotations = Annotations::new();
        let mut hasher = NodeHasher::new();
        assert_ne!(
            hasher.hash(&ast, &annotations, a),
            hasher.hash(&ast, &annotations, b)
        );
    }

    #[test]
    fn test_nonce_annotation_changes_hash() {
        let mut ast = Ast::empty();
        let a = identifier(&mut ast, "x");
        let b = identifier(&mut ast, "x");
        let mut annotations = Annotations::new();
        annotations.set(b, Annotation::ParamNonce("aabb".to_string()));
        let mut hasher = NodeHasher::new();
        assert_ne!(
            hasher.hash(&ast, &annotations, a),
            hasher.hash(&ast, &annotations, b),
            "a parameter nonce must separate otherwise identical identifiers"
        );
    }

    #[test]
    fn test_children_compose_into_parent() {
        let mut ast = Ast::empty();
        let one = ast.alloc(Node::new(
            Kind::estree("Literal"),
            vec![("value", Value::Number(1.0))],
        ));
        let two = ast.alloc(Node::new(
            Kind::estree("Literal"),
            vec![("value", Value::Number(2.0))],
        ));
        let with_one = ast.alloc(Node::new(
            Kind::estree("ExpressionStatement"),
            vec![("expression", Value::Node(one))],
        ));
        let with_two = ast.alloc(Node::new(
            Kind::estree("ExpressionStatement"),
            vec![("expression", Value::Node(two))],
        ));
        let annotations = Annotations::new();
        let mut hasher = NodeHasher::new();
        assert_ne!(
            hasher.hash(&ast, &annotations, with_one),
            hasher.hash(&ast, &annotations, with_two)
        );
    }
}
