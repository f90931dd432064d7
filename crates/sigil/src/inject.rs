//! Node injection: grammar regularization applied in place.
//!
//! Three idempotent passes run per node (operator wrapping, structure
//! factoring, LHS/RHS wrapping) and the walk then descends into the
//! post-injection children, so freshly injected subtrees are regularized
//! too. Re-running the whole pass over an already-injected tree is a no-op.

use std::collections::HashMap;
use std::rc::Rc;

use arbor::{Annotation, Annotations, Ast, InjectedKind, Kind, Node, NodeId, Value};

use crate::hash::NodeHasher;
use crate::nonce::NonceSource;
use crate::SigilError;

/// Secondary structure index: declared identifier's node hash →
/// (declaration, structure). The `Structure` annotation on the declaration
/// is the primary channel; this map serves identifier uses that resolve to
/// their declaration by content.
pub type StructIndex = HashMap<u64, (NodeId, NodeId)>;

/// Regularizes the tree in place.
///
/// # Errors
/// Returns [`SigilError::MalformedAst`] if a declaration carries no
/// declared identifier.
pub fn inject_nodes(
    ast: &mut Ast,
    annotations: &mut Annotations,
    struct_index: &mut StructIndex,
    nonces: &mut NonceSource,
    hasher: &mut NodeHasher,
) -> Result<(), SigilError> {
    let mut stack: Vec<(NodeId, Rc<str>)> = vec![(ast.root(), Rc::from(""))];
    while let Some((id, path)) = stack.pop() {
        inject_operator_node(ast, id);
        inject_structure_node(ast, id, annotations, struct_index, nonces, hasher, &path)?;
        inject_left_right_nodes(ast, id);

        let child_path: Rc<str> = Rc::from(format!("{}{}", path, ast.node(id).type_str()));
        // Reversed push keeps the visit order left-to-right, so a duplicate
        // index key settles on the last declaration in source order.
        for child in ast.children(id, annotations).into_iter().rev() {
            stack.push((child, child_path.clone()));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Operator wrapping
// ---------------------------------------------------------------------------

fn operator_wrapper(tag: &str) -> Option<InjectedKind> {
    match tag {
        "AssignmentExpression" => Some(InjectedKind::AssignmentOperator),
        "UnaryExpression" => Some(InjectedKind::UnaryOperator),
        "BinaryExpression" => Some(InjectedKind::BinaryOperator),
        "UpdateExpression" => Some(InjectedKind::UpdateOperator),
        _ => None,
    }
}

/// Replaces the operator string of the four operator-bearing expression
/// kinds with a wrapper node carrying both the string and the category.
fn inject_operator_node(ast: &mut Ast, id: NodeId) {
    let Some(wrapper) = operator_wrapper(ast.node(id).type_str()) else {
        return;
    };
    let operator = match ast.node(id).field("operator") {
        Some(Value::Str(operator)) => operator.clone(),
        // Already wrapped, or absent.
        _ => return,
    };
    let operator_node = ast.alloc(Node::new(
        Kind::Injected(wrapper),
        vec![("operator", Value::Str(operator))],
    ));
    ast.node_mut(id).set_field("operator", Value::Node(operator_node));
}

// ---------------------------------------------------------------------------
// Structure factoring
// ---------------------------------------------------------------------------

enum StructureKind {
    Variable,
    Function,
}

fn structure_target(tag: &str) -> Option<StructureKind> {
    match tag {
        "VariableDeclarator" | "FunctionParameterDeclarator" => Some(StructureKind::Variable),
        "FunctionDeclaration" => Some(StructureKind::Function),
        _ => None,
    }
}

/// Factors a declaration's identity into a structure node.
///
/// The fields that move (initializer; parameters and body) are removed from
/// the declaration: its signature keeps only the position, while the
/// structure carries the identity. The structure is attached as the
/// `Structure` annotation and indexed under the declared identifier's hash.
fn inject_structure_node(
    ast: &mut Ast,
    id: NodeId,
    annotations: &mut Annotations,
    struct_index: &mut StructIndex,
    nonces: &mut NonceSource,
    hasher: &mut NodeHasher,
    path: &str,
) -> Result<(), SigilError> {
    let Some(target) = structure_target(ast.node(id).type_str()) else {
        return Ok(());
    };
    if annotations.structure(id).is_some() {
        return Ok(());
    }

    let structure = match target {
        StructureKind::Variable => {
            let init = match ast.node_mut(id).take_field("init") {
                Some(Value::Node(init)) => init,
                _ => ast.alloc(Node::new(Kind::Injected(InjectedKind::Undefined), Vec::new())),
            };
            ast.alloc(Node::new(
                Kind::Injected(InjectedKind::VariableStructure),
                vec![("init", Value::Node(init))],
            ))
        }
        StructureKind::Function => {
            let body = ast.node_mut(id).take_field("body");
            // Absent params means "no parameters".
            let params = match ast.node_mut(id).take_field("params") {
                Some(Value::List(params)) => params,
                Some(Value::Node(single)) => vec![single],
                _ => Vec::new(),
            };
            let declarators: Vec<NodeId> = params
                .into_iter()
                .map(|param| {
                    ast.alloc(Node::new(
                        Kind::Injected(InjectedKind::FunctionParameterDeclarator),
                        vec![("id", Value::Node(param))],
                    ))
                })
                .collect();

            let mut fields = vec![
                ("nonce", Value::Str(nonces.mint(path))),
                ("params", Value::List(declarators)),
            ];
            if let Some(body) = body {
                fields.push(("body", body));
            }
            ast.alloc(Node::new(Kind::Injected(InjectedKind::FunctionStructure), fields))
        }
    };

    let declared = match ast.node(id).field("id") {
        Some(Value::Node(declared)) => *declared,
        _ => {
            return Err(SigilError::MalformedAst {
                kind: ast.node(id).type_str().to_string(),
                field: "id",
            })
        }
    };
    let declared_hash = hasher.hash(ast, annotations, declared);
    struct_index.insert(declared_hash, (id, structure));
    annotations.set(id, Annotation::Structure(structure));
    Ok(())
}

// ---------------------------------------------------------------------------
// LHS / RHS wrapping
// ---------------------------------------------------------------------------

fn inject_left_right_nodes(ast: &mut Ast, id: NodeId) {
    let tag = ast.node(id).type_str();
    if tag == "LHSExpression" || tag == "RHSExpression" {
        return;
    }
    wrap_side(ast, id, "left", InjectedKind::LhsExpression);
    wrap_side(ast, id, "right", InjectedKind::RhsExpression);
}

fn wrap_side(ast: &mut Ast, id: NodeId, field: &'static str, kind: InjectedKind) {
    let inner = match ast.node(id).field(field) {
        Some(Value::Node(inner)) => *inner,
        _ => return,
    };
    if matches!(ast.node(inner).kind(), Kind::Injected(k) if *k == kind) {
        return;
    }
    let wrapper = ast.alloc(Node::new(Kind::Injected(kind), vec![(field, Value::Node(inner))]));
    ast.node_mut(id).set_field(field, Value::Node(wrapper));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nonce::NonceMode;
    use arbor::parse_script;

    fn injected(source: &str) -> (Ast, Annotations, StructIndex) {
        let mut ast = parse_script(source).unwrap();
        let mut annotations = Annotations::new();
        let mut nonces = NonceSource::new(NonceMode::Random);
        crate::annotate::annotate_param_nonces(&ast, &mut annotations, &mut nonces);
        let mut struct_index = StructIndex::new();
        let mut hasher = NodeHasher::new();
        inject_nodes(
            &mut ast,
            &mut annotations,
            &mut struct_index,
            &mut nonces,
            &mut hasher,
        )
        .unwrap();
        (ast, annotations, struct_index)
    }

    fn find_by_type(ast: &Ast, tag: &str) -> Vec<NodeId> {
        ast.ids().filter(|&id| ast.node(id).type_str() == tag).collect()
    }

    #[test]
    fn test_operator_wrapped() {
        let (ast, _, _) = injected("a + b;");
        let binary = find_by_type(&ast, "BinaryExpression")[0];
        let operator = match ast.node(binary).field("operator") {
            Some(Value::Node(op)) => *op,
            other => panic!("operator not wrapped: {:?}", other),
        };
        assert_eq!(ast.node(operator).type_str(), "BinaryOperator");
        assert_eq!(
            ast.node(operator).field("operator"),
            Some(&Value::Str("+".to_string()))
        );
    }

    #[test]
    fn test_left_right_wrapped_once() {
        let (ast, _, _) = injected("a + b;");
        let binary = find_by_type(&ast, "BinaryExpression")[0];
        let left = match ast.node(binary).field("left") {
            Some(Value::Node(left)) => *left,
            other => panic!("left not wrapped: {:?}", other),
        };
        assert_eq!(ast.node(left).type_str(), "LHSExpression");
        // The wrapper's own `left` holds the original expression unwrapped.
        let inner = match ast.node(left).field("left") {
            Some(Value::Node(inner)) => *inner,
            other => panic!("wrapper lost its child: {:?}", other),
        };
        assert!(ast.node(inner).is_identifier());
    }

    #[test]
    fn test_variable_structure_moves_init() {
        let (ast, annotations, struct_index) = injected("var x = 10;");
        let declarator = find_by_type(&ast, "VariableDeclarator")[0];
        assert!(ast.node(declarator).field("init").is_none(), "init must move");

        let structure = annotations.structure(declarator).expect("annotation set");
        assert_eq!(ast.node(structure).type_str(), "VariableStructure");
        let init = match ast.node(structure).field("init") {
            Some(Value::Node(init)) => *init,
            other => panic!("structure lost init: {:?}", other),
        };
        assert_eq!(ast.node(init).type_str(), "Literal");
        assert_eq!(struct_index.len(), 1);
    }

    #[test]
    fn test_missing_init_becomes_undefined() {
        let (ast, annotations, _) = injected("var y;");
        let declarator = find_by_type(&ast, "VariableDeclarator")[0];
        let structure = annotations.structure(declarator).unwrap();
        let init = match ast.node(structure).field("init") {
            Some(Value::Node(init)) => *init,
            other => panic!("structure lost init: {:?}", other),
        };
        assert_eq!(ast.node(init).type_str(), "Undefined");
    }

    #[test]
    fn test_function_structure_factors_params_and_body() {
        let (ast, annotations, _) = injected("function f(a, b) { return a; }");
        let declaration = find_by_type(&ast, "FunctionDeclaration")[0];
        assert!(ast.node(declaration).field("params").is_none());
        assert!(ast.node(declaration).field("body").is_none());

        let structure = annotations.structure(declaration).unwrap();
        assert_eq!(ast.node(structure).type_str(), "FunctionStructure");
        match ast.node(structure).field("nonce") {
            Some(Value::Str(nonce)) => {
                assert_eq!(nonce.len(), 32);
                assert!(nonce.chars().all(|c| c.is_ascii_hexdigit()));
            }
            other => panic!("missing nonce: {:?}", other),
        }
        let params = match ast.node(structure).field("params") {
            Some(Value::List(params)) => params.clone(),
            other => panic!("missing params: {:?}", other),
        };
        assert_eq!(params.len(), 2);
        for param in params {
            assert_eq!(ast.node(param).type_str(), "FunctionParameterDeclarator");
            // Each parameter declarator gets its own variable structure.
            let param_structure = annotations.structure(param).unwrap();
            assert_eq!(ast.node(param_structure).type_str(), "VariableStructure");
        }
    }

    #[test]
    fn test_injection_idempotent() {
        let mut ast = parse_script("function f(a) { a = a + 1; }").unwrap();
        let mut annotations = Annotations::new();
        let mut nonces = NonceSource::new(NonceMode::Random);
        crate::annotate::annotate_param_nonces(&ast, &mut annotations, &mut nonces);
        let mut struct_index = StructIndex::new();
        let mut hasher = NodeHasher::new();
        inject_nodes(&mut ast, &mut annotations, &mut struct_index, &mut nonces, &mut hasher)
            .unwrap();
        let nodes_after_first = ast.len();
        let index_after_first = struct_index.len();

        inject_nodes(&mut ast, &mut annotations, &mut struct_index, &mut nonces, &mut hasher)
            .unwrap();
        assert_eq!(ast.len(), nodes_after_first, "re-injection must not allocate");
        assert_eq!(struct_index.len(), index_after_first);
    }

    #[test]
    fn test_declaration_without_id_is_malformed() {
        let mut ast = Ast::empty();
        let declarator = ast.alloc(Node::new(
            Kind::estree("VariableDeclarator"),
            Vec::new(),
        ));
        let root = ast.alloc(Node::new(
            Kind::estree("Program"),
            vec![("body", Value::List(vec![declarator]))],
        ));
        ast.set_root(root);

        let mut annotations = Annotations::new();
        let mut nonces = NonceSource::new(NonceMode::Random);
        let mut struct_index = StructIndex::new();
        let mut hasher = NodeHasher::new();
        let err = inject_nodes(&mut ast, &mut annotations, &mut struct_index, &mut nonces, &mut hasher)
            .unwrap_err();
        match err {
            SigilError::MalformedAst { kind, field } => {
                assert_eq!(kind, "VariableDeclarator");
                assert_eq!(field, "id");
            }
        }
    }
}
