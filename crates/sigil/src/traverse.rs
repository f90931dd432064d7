//! Postorder linearization with root-to-node path strings.
//!
//! An iterative DFS pushes children onto a stack and reverses the visit
//! order, so iterating `nodes` left to right meets every node's children
//! before the node itself. `pos` expresses depth-by-type path, not a unique
//! address: two siblings may share a `pos` string.

use std::collections::HashMap;
use std::rc::Rc;

use arbor::{Annotations, Ast, NodeId};

pub struct Traversal {
    /// Postorder-equivalent list over the injected tree.
    pub nodes: Vec<NodeId>,
    /// Concatenated ancestor type tags per node; identifier leaves carry a
    /// trailing `Identifier` of their own.
    pub node_pos: HashMap<NodeId, Rc<str>>,
}

pub fn traverse(ast: &Ast, annotations: &Annotations) -> Traversal {
    let mut stack = vec![ast.root()];
    let mut order: Vec<NodeId> = Vec::with_capacity(ast.len());
    let mut node_pos: HashMap<NodeId, Rc<str>> = HashMap::new();
    node_pos.insert(ast.root(), Rc::from(""));

    while let Some(id) = stack.pop() {
        order.push(id);
        let pos = node_pos
            .get(&id)
            .cloned()
            .unwrap_or_else(|| Rc::from(""));

        let children = ast.children(id, annotations);
        if children.is_empty() {
            if ast.node(id).is_identifier() {
                node_pos.insert(id, Rc::from(format!("{}Identifier", pos)));
            }
        } else {
            let child_pos: Rc<str> = Rc::from(format!("{}{}", pos, ast.node(id).type_str()));
            for &child in &children {
                node_pos.insert(child, child_pos.clone());
                stack.push(child);
            }
        }
    }

    order.reverse();
    Traversal {
        nodes: order,
        node_pos,
    }
}
