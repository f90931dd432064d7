//! Arena-allocated AST: tagged records, canonical field order, and the
//! per-invocation annotation side table.

use std::collections::HashMap;

/// Stable identity of a node within one [`Ast`] arena.
///
/// Ids are arena indices: in-place mutation (field moves, wrapper insertion)
/// never invalidates them, which is what makes them usable as side-table
/// keys across the injection passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    /// Index into the arena's node vector.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Synthetic node kinds injected to regularize the grammar before signing.
///
/// Operator wrappers carry the operator token so the label hash covers both
/// the operator string and its category; structure nodes factor a
/// declaration's identity (initializer, parameters, body) apart from its
/// position; `LHSExpression`/`RHSExpression` wrap the `left`/`right` fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InjectedKind {
    AssignmentOperator,
    UnaryOperator,
    BinaryOperator,
    UpdateOperator,
    /// Canonical stand-in for a missing initializer.
    Undefined,
    /// Wraps a parameter identifier so it is treated as a declaration site.
    FunctionParameterDeclarator,
    FunctionStructure,
    VariableStructure,
    LhsExpression,
    RhsExpression,
}

impl InjectedKind {
    /// The type tag as it appears in labels and path strings.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AssignmentOperator => "AssignmentOperator",
            Self::UnaryOperator => "UnaryOperator",
            Self::BinaryOperator => "BinaryOperator",
            Self::UpdateOperator => "UpdateOperator",
            Self::Undefined => "Undefined",
            Self::FunctionParameterDeclarator => "FunctionParameterDeclarator",
            Self::FunctionStructure => "FunctionStructure",
            Self::VariableStructure => "VariableStructure",
            Self::LhsExpression => "LHSExpression",
            Self::RhsExpression => "RHSExpression",
        }
    }

    /// Whether this kind is one of the four operator wrappers.
    pub fn is_operator(self) -> bool {
        matches!(
            self,
            Self::AssignmentOperator
                | Self::UnaryOperator
                | Self::BinaryOperator
                | Self::UpdateOperator
        )
    }
}

/// Type tag for every node in the universe.
///
/// Parser-produced nodes carry their ESTree type string; injected nodes
/// carry their [`InjectedKind`]. Keeping the two arms distinct lets
/// traversal stay uniform while the engine can still ask "is this one of
/// ours" without string comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Kind {
    Estree(String),
    Injected(InjectedKind),
}

impl Kind {
    /// Builds an ESTree kind from a type tag.
    pub fn estree(tag: &str) -> Self {
        Self::Estree(tag.to_string())
    }

    /// The type tag string for labels, paths, and diagnostics.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Estree(tag) => tag,
            Self::Injected(kind) => kind.as_str(),
        }
    }
}

/// A field value: primitive, child node, or ordered list of children.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Number(f64),
    Str(String),
    Null,
    Node(NodeId),
    List(Vec<NodeId>),
}

/// A tagged record: a type tag plus named fields in canonical order.
///
/// Canonical order is name-sorted. It is the iteration order for hashing
/// and child gathering, so two nodes built from the same fields in a
/// different insertion order are indistinguishable downstream.
#[derive(Debug, Clone)]
pub struct Node {
    kind: Kind,
    fields: Vec<(&'static str, Value)>,
}

impl Node {
    /// Creates a node, sorting `fields` into canonical order.
    pub fn new(kind: Kind, mut fields: Vec<(&'static str, Value)>) -> Self {
        fields.sort_by(|a, b| a.0.cmp(b.0));
        Self { kind, fields }
    }

    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    /// The type tag string.
    pub fn type_str(&self) -> &str {
        self.kind.as_str()
    }

    /// Fields in canonical order.
    pub fn fields(&self) -> &[(&'static str, Value)] {
        &self.fields
    }

    /// Looks up a field by name. Absent fields return `None`; the engine
    /// treats them as "not present", never as null.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields
            .binary_search_by(|(n, _)| (*n).cmp(name))
            .ok()
            .map(|i| &self.fields[i].1)
    }

    /// Inserts or replaces a field, keeping canonical order.
    pub fn set_field(&mut self, name: &'static str, value: Value) {
        match self.fields.binary_search_by(|(n, _)| (*n).cmp(name)) {
            Ok(i) => self.fields[i].1 = value,
            Err(i) => self.fields.insert(i, (name, value)),
        }
    }

    /// Removes a field and returns its value, if present.
    pub fn take_field(&mut self, name: &str) -> Option<Value> {
        match self.fields.binary_search_by(|(n, _)| (*n).cmp(name)) {
            Ok(i) => Some(self.fields.remove(i).1),
            Err(_) => None,
        }
    }

    /// Whether this is an ESTree `Identifier`.
    pub fn is_identifier(&self) -> bool {
        matches!(&self.kind, Kind::Estree(tag) if tag == "Identifier")
    }
}

/// Per-invocation annotation attached to a node from the outside.
///
/// A sum type rather than optional fields on `Node`: a node carries at most
/// one annotation, and the table lives exactly as long as one signature
/// computation.
#[derive(Debug, Clone)]
pub enum Annotation {
    /// Parameter-reference nonce (lowercase hex, 32 chars).
    ParamNonce(String),
    /// The injected structure node factoring this declaration's identity.
    Structure(NodeId),
}

/// Side table of per-node annotations, keyed by stable node id.
#[derive(Debug, Default)]
pub struct Annotations {
    map: HashMap<NodeId, Annotation>,
}

impl Annotations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, id: NodeId, annotation: Annotation) {
        self.map.insert(id, annotation);
    }

    pub fn get(&self, id: NodeId) -> Option<&Annotation> {
        self.map.get(&id)
    }

    /// The parameter nonce attached to `id`, if any.
    pub fn nonce(&self, id: NodeId) -> Option<&str> {
        match self.map.get(&id) {
            Some(Annotation::ParamNonce(nonce)) => Some(nonce),
            _ => None,
        }
    }

    /// The structure node attached to `id`, if any.
    pub fn structure(&self, id: NodeId) -> Option<NodeId> {
        match self.map.get(&id) {
            Some(Annotation::Structure(structure)) => Some(*structure),
            _ => None,
        }
    }
}

/// Arena-allocated AST.
///
/// Nodes are appended and never freed or moved within one invocation, so a
/// [`NodeId`] handed out once stays valid through every injection pass.
#[derive(Debug)]
pub struct Ast {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Ast {
    /// Creates an empty arena. The root must be set once allocated.
    pub fn empty() -> Self {
        Self {
            nodes: Vec::new(),
            root: NodeId(0),
        }
    }

    /// Allocates a node and returns its id.
    pub fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn set_root(&mut self, id: NodeId) {
        self.root = id;
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// Number of nodes allocated so far.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// All allocated node ids, in allocation order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Children of `id` in canonical order: the annotated structure edge
    /// first, then node-valued fields in field order.
    ///
    /// Invariant: the structure edge name (`a_structure`) sorts ahead of
    /// every ESTree field name, so the structure node is met before the
    /// declared identifier in postorder.
    pub fn children(&self, id: NodeId, annotations: &Annotations) -> Vec<NodeId> {
        let mut children = Vec::new();
        if let Some(structure) = annotations.structure(id) {
            children.push(structure);
        }
        for (_, value) in self.node(id).fields() {
            match value {
                Value::Node(child) => children.push(*child),
                Value::List(list) => children.extend(list.iter().copied()),
                _ => {}
            }
        }
        children
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identifier(ast: &mut Ast, name: &str) -> NodeId {
        ast.alloc(Node::new(
            Kind::estree("Identifier"),
            vec![("name", Value::Str(name.to_string()))],
        ))
    }

    #[test]
    fn test_fields_canonical_order() {
        let node = Node::new(
            Kind::estree("BinaryExpression"),
            vec![
                ("right", Value::Null),
                ("left", Value::Null),
                ("operator", Value::Str("+".into())),
            ],
        );
        let names: Vec<&str> = node.fields().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["left", "operator", "right"]);
    }

    #[test]
    fn test_set_field_keeps_order() {
        let mut node = Node::new(Kind::estree("VariableDeclarator"), vec![("init", Value::Null)]);
        node.set_field("id", Value::Bool(true));
        let names: Vec<&str> = node.fields().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["id", "init"]);
        node.set_field("init", Value::Bool(false));
        assert_eq!(node.fields().len(), 2, "replace must not duplicate");
    }

    #[test]
    fn test_take_field_removes() {
        let mut node = Node::new(
            Kind::estree("VariableDeclarator"),
            vec![("id", Value::Null), ("init", Value::Bool(true))],
        );
        assert_eq!(node.take_field("init"), Some(Value::Bool(true)));
        assert!(node.field("init").is_none());
        assert!(node.take_field("init").is_none());
    }

    #[test]
    fn test_children_structure_edge_first() {
        let mut ast = Ast::empty();
        let id = identifier(&mut ast, "x");
        let decl = ast.alloc(Node::new(
            Kind::estree("VariableDeclarator"),
            vec![("id", Value::Node(id))],
        ));
        let structure = ast.alloc(Node::new(Kind::Injected(InjectedKind::VariableStructure), vec![]));

        let mut annotations = Annotations::new();
        assert_eq!(ast.children(decl, &annotations), vec![id]);

        annotations.set(decl, Annotation::Structure(structure));
        assert_eq!(ast.children(decl, &annotations), vec![structure, id]);
    }

    #[test]
    fn test_children_flatten_lists_in_order() {
        let mut ast = Ast::empty();
        let a = identifier(&mut ast, "a");
        let b = identifier(&mut ast, "b");
        let callee = identifier(&mut ast, "f");
        let call = ast.alloc(Node::new(
            Kind::estree("CallExpression"),
            vec![
                ("callee", Value::Node(callee)),
                ("arguments", Value::List(vec![a, b])),
            ],
        ));
        // "arguments" sorts before "callee".
        assert_eq!(ast.children(call, &Annotations::new()), vec![a, b, callee]);
    }

    #[test]
    fn test_injected_type_tags() {
        assert_eq!(InjectedKind::LhsExpression.as_str(), "LHSExpression");
        assert_eq!(InjectedKind::RhsExpression.as_str(), "RHSExpression");
        assert!(InjectedKind::BinaryOperator.is_operator());
        assert!(!InjectedKind::FunctionStructure.is_operator());
    }
}
