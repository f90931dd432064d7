//! Parameter-nonce annotation pass (pre-injection).
//!
//! Walks the tree depth-first carrying the chain of enclosing function
//! declarations. Each function is recorded once with its parameter names
//! and a fresh nonce; every identifier leaf whose name matches a parameter
//! of an enclosing function takes the innermost matching function's nonce.
//! Identifiers with no matching parameter remain unannotated; there are no
//! observable error conditions.

use std::collections::HashMap;
use std::rc::Rc;

use arbor::{Annotation, Annotations, Ast, NodeId, Value};

use crate::nonce::NonceSource;

struct FnData {
    param_names: Vec<String>,
    nonce: String,
}

/// One link in the enclosing-function chain; shared by all frames below it.
struct Enclosing {
    function: NodeId,
    parent: Option<Rc<Enclosing>>,
}

/// Tags parameter-referencing identifiers with their function's nonce.
///
/// State is per-invocation and passed explicitly; nothing persists across
/// calls. Runs before injection, while `params` still lives on the
/// declaration.
pub fn annotate_param_nonces(
    ast: &Ast,
    annotations: &mut Annotations,
    nonces: &mut NonceSource,
) {
    let mut fn_data: HashMap<NodeId, FnData> = HashMap::new();
    let empty: Rc<str> = Rc::from("");
    let mut stack: Vec<(NodeId, Option<Rc<Enclosing>>, Rc<str>)> =
        vec![(ast.root(), None, empty)];

    while let Some((id, enclosing, path)) = stack.pop() {
        let node = ast.node(id);

        let enclosing = if node.type_str() == "FunctionDeclaration" {
            if !fn_data.contains_key(&id) {
                fn_data.insert(
                    id,
                    FnData {
                        param_names: param_names(ast, id),
                        nonce: nonces.mint(&path),
                    },
                );
            }
            Some(Rc::new(Enclosing {
                function: id,
                parent: enclosing,
            }))
        } else {
            enclosing
        };

        let children = ast.children(id, annotations);
        if children.is_empty() {
            if node.is_identifier() {
                if let Some(Value::Str(name)) = node.field("name") {
                    // Innermost matching function wins; otherwise the
                    // reference propagates outward.
                    let mut scope = enclosing.as_deref();
                    while let Some(link) = scope {
                        if let Some(data) = fn_data.get(&link.function) {
                            if data.param_names.iter().any(|p| p == name) {
                                annotations
                                    .set(id, Annotation::ParamNonce(data.nonce.clone()));
                                break;
                            }
                        }
                        scope = link.parent.as_deref();
                    }
                }
            }
        } else {
            let child_path: Rc<str> = Rc::from(format!("{}{}", path, node.type_str()));
            // Reversed push keeps the visit order left-to-right.
            for child in children.into_iter().rev() {
                stack.push((child, enclosing.clone(), child_path.clone()));
            }
        }
    }
}

/// The declaration's identifier parameter names; patterns contribute none.
fn param_names(ast: &Ast, function: NodeId) -> Vec<String> {
    let mut names = Vec::new();
    if let Some(Value::List(params)) = ast.node(function).field("params") {
        for &param in params {
            let node = ast.node(param);
            if node.is_identifier() {
                if let Some(Value::Str(name)) = node.field("name") {
                    names.push(name.clone());
                }
            }
        }
    }
    names
}
