//! Tree-sitter based JavaScript parser adapter.
//!
//! Lowers the tree-sitter CST into the ESTree shape the engine consumes:
//! explicit lowerings for the script grammar, a pascal-cased generic
//! fallback for everything else. Parentheses are unwrapped (ESTree has no
//! node for them), comments are erased, and anonymous tokens contribute
//! only where they are read (operator text, declaration kind).

use tree_sitter::{Node as TsNode, Parser};

use crate::node::{Ast, Kind, Node, NodeId, Value};
use crate::ArborError;

/// Parses a JavaScript program into an ESTree-shaped [`Ast`].
///
/// A CST containing error or missing nodes is a parse failure: the engine
/// is never invoked on a partially recovered tree, and the error names the
/// first offending location.
///
/// # Errors
/// - `ArborError::Grammar` if the JavaScript grammar fails to load.
/// - `ArborError::ParseFailure` on syntax errors.
pub fn parse_script(source: &str) -> Result<Ast, ArborError> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_javascript::LANGUAGE.into())
        .map_err(|e| ArborError::Grammar(format!("Failed to load JavaScript grammar: {}", e)))?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| ArborError::ParseFailure("Tree-sitter parse returned None".to_string()))?;

    let root = tree.root_node();
    if root.has_error() {
        return Err(ArborError::ParseFailure(first_syntax_error(root)));
    }

    let mut ast = Ast::empty();
    let program = lower(root, source.as_bytes(), &mut ast)?
        .ok_or_else(|| ArborError::ParseFailure("Empty parse tree".to_string()))?;
    ast.set_root(program);
    Ok(ast)
}

/// Locates the first error or missing node and renders its position.
fn first_syntax_error(root: TsNode) -> String {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            let point = node.start_position();
            return format!("syntax error at {}:{}", point.row + 1, point.column + 1);
        }
        for i in (0..node.child_count()).rev() {
            if let Some(child) = node.child(i as u32) {
                if child.has_error() {
                    stack.push(child);
                }
            }
        }
    }
    "syntax error".to_string()
}

// ---------------------------------------------------------------------------
// Lowering
// ---------------------------------------------------------------------------

fn lower(ts: TsNode, src: &[u8], ast: &mut Ast) -> Result<Option<NodeId>, ArborError> {
    let node = match ts.kind() {
        "comment" | "html_comment" | "hash_bang_line" => return Ok(None),

        // Wrappers ESTree does not represent.
        "parenthesized_expression" | "computed_property_name" | "else_clause"
        | "finally_clause" => {
            return match first_named_child(ts) {
                Some(inner) => lower(inner, src, ast),
                None => Ok(None),
            };
        }

        "program" => {
            let body = lower_named_children(ts, src, ast)?;
            alloc(ast, "Program", vec![("body", Value::List(body))])
        }

        // -- statements ------------------------------------------------------
        "expression_statement" => {
            let expression = lower_first_child(ts, src, ast)?;
            let mut fields = Vec::new();
            if let Some(expression) = expression {
                fields.push(("expression", Value::Node(expression)));
            }
            alloc(ast, "ExpressionStatement", fields)
        }
        "variable_declaration" | "lexical_declaration" => {
            let kind_text = declaration_kind(ts, src);
            let declarations = lower_named_children(ts, src, ast)?;
            alloc(
                ast,
                "VariableDeclaration",
                vec![
                    ("declarations", Value::List(declarations)),
                    ("kind", Value::Str(kind_text)),
                ],
            )
        }
        "variable_declarator" => {
            let mut fields = Vec::new();
            if let Some(id) = lower_field(ts, "name", src, ast)? {
                fields.push(("id", Value::Node(id)));
            }
            if let Some(init) = lower_field(ts, "value", src, ast)? {
                fields.push(("init", Value::Node(init)));
            }
            alloc(ast, "VariableDeclarator", fields)
        }
        "function_declaration" => lower_function(ts, src, ast, "FunctionDeclaration", false)?,
        "generator_function_declaration" => {
            lower_function(ts, src, ast, "FunctionDeclaration", true)?
        }
        "statement_block" => {
            let body = lower_named_children(ts, src, ast)?;
            alloc(ast, "BlockStatement", vec![("body", Value::List(body))])
        }
        "if_statement" => {
            let mut fields = Vec::new();
            push_node(&mut fields, "test", lower_field(ts, "condition", src, ast)?);
            push_node(
                &mut fields,
                "consequent",
                lower_field(ts, "consequence", src, ast)?,
            );
            push_node(
                &mut fields,
                "alternate",
                lower_field(ts, "alternative", src, ast)?,
            );
            alloc(ast, "IfStatement", fields)
        }
        "for_statement" => {
            let mut fields = Vec::new();
            push_node(
                &mut fields,
                "init",
                lower_for_header(ts, "initializer", src, ast)?,
            );
            push_node(
                &mut fields,
                "test",
                lower_for_header(ts, "condition", src, ast)?,
            );
            push_node(&mut fields, "update", lower_field(ts, "increment", src, ast)?);
            push_node(&mut fields, "body", lower_field(ts, "body", src, ast)?);
            alloc(ast, "ForStatement", fields)
        }
        "for_in_statement" => {
            let tag = if field_text(ts, "operator", src) == Some("of") {
                "ForOfStatement"
            } else {
                "ForInStatement"
            };
            let mut fields = Vec::new();
            let left = lower_field(ts, "left", src, ast)?;
            let left = match (left, ts.child_by_field_name("kind")) {
                // `for (var k in o)`: ESTree wraps the binding in a declaration.
                (Some(left), Some(kind_token)) => {
                    let declarator = ast.alloc(Node::new(
                        Kind::estree("VariableDeclarator"),
                        vec![("id", Value::Node(left))],
                    ));
                    Some(ast.alloc(Node::new(
                        Kind::estree("VariableDeclaration"),
                        vec![
                            ("declarations", Value::List(vec![declarator])),
                            ("kind", Value::Str(node_text(kind_token, src).to_string())),
                        ],
                    )))
                }
                (left, _) => left,
            };
            push_node(&mut fields, "left", left);
            push_node(&mut fields, "right", lower_field(ts, "right", src, ast)?);
            push_node(&mut fields, "body", lower_field(ts, "body", src, ast)?);
            alloc(ast, tag, fields)
        }
        "while_statement" => {
            let mut fields = Vec::new();
            push_node(&mut fields, "test", lower_field(ts, "condition", src, ast)?);
            push_node(&mut fields, "body", lower_field(ts, "body", src, ast)?);
            alloc(ast, "WhileStatement", fields)
        }
        "do_statement" => {
            let mut fields = Vec::new();
            push_node(&mut fields, "body", lower_field(ts, "body", src, ast)?);
            push_node(&mut fields, "test", lower_field(ts, "condition", src, ast)?);
            alloc(ast, "DoWhileStatement", fields)
        }
        "return_statement" => {
            let mut fields = Vec::new();
            push_node(&mut fields, "argument", lower_first_child(ts, src, ast)?);
            alloc(ast, "ReturnStatement", fields)
        }
        "break_statement" | "continue_statement" => {
            let tag = if ts.kind() == "break_statement" {
                "BreakStatement"
            } else {
                "ContinueStatement"
            };
            let mut fields = Vec::new();
            push_node(&mut fields, "label", lower_first_child(ts, src, ast)?);
            alloc(ast, tag, fields)
        }
        "labeled_statement" => {
            let mut fields = Vec::new();
            push_node(&mut fields, "label", lower_field(ts, "label", src, ast)?);
            push_node(&mut fields, "body", lower_field(ts, "body", src, ast)?);
            alloc(ast, "LabeledStatement", fields)
        }
        "throw_statement" => {
            let mut fields = Vec::new();
            push_node(&mut fields, "argument", lower_first_child(ts, src, ast)?);
            alloc(ast, "ThrowStatement", fields)
        }
        "try_statement" => {
            let mut fields = Vec::new();
            push_node(&mut fields, "block", lower_field(ts, "body", src, ast)?);
            push_node(&mut fields, "handler", lower_field(ts, "handler", src, ast)?);
            push_node(
                &mut fields,
                "finalizer",
                lower_field(ts, "finalizer", src, ast)?,
            );
            alloc(ast, "TryStatement", fields)
        }
        "catch_clause" => {
            let mut fields = Vec::new();
            push_node(&mut fields, "param", lower_field(ts, "parameter", src, ast)?);
            push_node(&mut fields, "body", lower_field(ts, "body", src, ast)?);
            alloc(ast, "CatchClause", fields)
        }
        "switch_statement" => {
            let mut fields = Vec::new();
            push_node(
                &mut fields,
                "discriminant",
                lower_field(ts, "value", src, ast)?,
            );
            let cases = match ts.child_by_field_name("body") {
                Some(body) => lower_named_children(body, src, ast)?,
                None => Vec::new(),
            };
            fields.push(("cases", Value::List(cases)));
            alloc(ast, "SwitchStatement", fields)
        }
        "switch_case" | "switch_default" => {
            let mut fields = Vec::new();
            let value_id = ts.child_by_field_name("value").map(|n| n.id());
            push_node(&mut fields, "test", lower_field(ts, "value", src, ast)?);
            let mut consequent = Vec::new();
            let mut cursor = ts.walk();
            for child in ts.named_children(&mut cursor) {
                if Some(child.id()) == value_id {
                    continue;
                }
                if let Some(id) = lower(child, src, ast)? {
                    consequent.push(id);
                }
            }
            fields.push(("consequent", Value::List(consequent)));
            alloc(ast, "SwitchCase", fields)
        }
        "with_statement" => {
            let mut fields = Vec::new();
            push_node(&mut fields, "object", lower_field(ts, "object", src, ast)?);
            push_node(&mut fields, "body", lower_field(ts, "body", src, ast)?);
            alloc(ast, "WithStatement", fields)
        }
        "empty_statement" => alloc(ast, "EmptyStatement", Vec::new()),
        "debugger_statement" => alloc(ast, "DebuggerStatement", Vec::new()),

        // -- classes ---------------------------------------------------------
        "class_declaration" | "class" => {
            let tag = if ts.kind() == "class_declaration" {
                "ClassDeclaration"
            } else {
                "ClassExpression"
            };
            let mut fields = Vec::new();
            push_node(&mut fields, "id", lower_field(ts, "name", src, ast)?);
            let heritage = ts
                .children(&mut ts.walk())
                .find(|c| c.kind() == "class_heritage");
            if let Some(heritage) = heritage {
                if let Some(superclass) = first_named_child(heritage) {
                    push_node(&mut fields, "superClass", lower(superclass, src, ast)?);
                }
            }
            push_node(&mut fields, "body", lower_field(ts, "body", src, ast)?);
            alloc(ast, tag, fields)
        }
        "class_body" => {
            let body = lower_named_children(ts, src, ast)?;
            alloc(ast, "ClassBody", vec![("body", Value::List(body))])
        }
        "method_definition" => {
            let mut fields = Vec::new();
            push_node(&mut fields, "key", lower_field(ts, "name", src, ast)?);
            let function = lower_function(ts, src, ast, "FunctionExpression", false)?;
            push_node(&mut fields, "value", function);
            fields.push(("kind", Value::Str("method".to_string())));
            alloc(ast, "MethodDefinition", fields)
        }
        "field_definition" => {
            let mut fields = Vec::new();
            push_node(&mut fields, "key", lower_field(ts, "property", src, ast)?);
            push_node(&mut fields, "value", lower_field(ts, "value", src, ast)?);
            alloc(ast, "PropertyDefinition", fields)
        }

        // -- expressions -----------------------------------------------------
        "assignment_expression" => {
            let mut fields = vec![("operator", Value::Str("=".to_string()))];
            push_node(&mut fields, "left", lower_field(ts, "left", src, ast)?);
            push_node(&mut fields, "right", lower_field(ts, "right", src, ast)?);
            alloc(ast, "AssignmentExpression", fields)
        }
        "augmented_assignment_expression" => {
            let operator = field_text(ts, "operator", src).unwrap_or("=").to_string();
            let mut fields = vec![("operator", Value::Str(operator))];
            push_node(&mut fields, "left", lower_field(ts, "left", src, ast)?);
            push_node(&mut fields, "right", lower_field(ts, "right", src, ast)?);
            alloc(ast, "AssignmentExpression", fields)
        }
        "binary_expression" => {
            let operator = field_text(ts, "operator", src).unwrap_or("").to_string();
            // ESTree splits short-circuiting operators into their own kind.
            let tag = match operator.as_str() {
                "&&" | "||" | "??" => "LogicalExpression",
                _ => "BinaryExpression",
            };
            let mut fields = vec![("operator", Value::Str(operator))];
            push_node(&mut fields, "left", lower_field(ts, "left", src, ast)?);
            push_node(&mut fields, "right", lower_field(ts, "right", src, ast)?);
            alloc(ast, tag, fields)
        }
        "unary_expression" => {
            let operator = field_text(ts, "operator", src).unwrap_or("").to_string();
            let mut fields = vec![
                ("operator", Value::Str(operator)),
                ("prefix", Value::Bool(true)),
            ];
            push_node(&mut fields, "argument", lower_field(ts, "argument", src, ast)?);
            alloc(ast, "UnaryExpression", fields)
        }
        "update_expression" => {
            let operator_token = ts.child_by_field_name("operator");
            let argument_token = ts.child_by_field_name("argument");
            let prefix = match (operator_token, argument_token) {
                (Some(op), Some(arg)) => op.start_byte() < arg.start_byte(),
                _ => true,
            };
            let operator = operator_token
                .map(|n| node_text(n, src).to_string())
                .unwrap_or_default();
            let mut fields = vec![
                ("operator", Value::Str(operator)),
                ("prefix", Value::Bool(prefix)),
            ];
            push_node(&mut fields, "argument", lower_field(ts, "argument", src, ast)?);
            alloc(ast, "UpdateExpression", fields)
        }
        "ternary_expression" => {
            let mut fields = Vec::new();
            push_node(&mut fields, "test", lower_field(ts, "condition", src, ast)?);
            push_node(
                &mut fields,
                "consequent",
                lower_field(ts, "consequence", src, ast)?,
            );
            push_node(
                &mut fields,
                "alternate",
                lower_field(ts, "alternative", src, ast)?,
            );
            alloc(ast, "ConditionalExpression", fields)
        }
        "sequence_expression" => {
            let expressions = lower_named_children(ts, src, ast)?;
            alloc(
                ast,
                "SequenceExpression",
                vec![("expressions", Value::List(expressions))],
            )
        }
        "call_expression" => {
            // A template-string "argument" is a tagged template, not a call.
            if let Some(arguments) = ts.child_by_field_name("arguments") {
                if arguments.kind() == "template_string" {
                    let mut fields = Vec::new();
                    push_node(&mut fields, "tag", lower_field(ts, "function", src, ast)?);
                    push_node(&mut fields, "quasi", lower(arguments, src, ast)?);
                    return Ok(alloc(ast, "TaggedTemplateExpression", fields));
                }
            }
            let mut fields = Vec::new();
            push_node(&mut fields, "callee", lower_field(ts, "function", src, ast)?);
            fields.push(("arguments", lower_arguments(ts, src, ast)?));
            alloc(ast, "CallExpression", fields)
        }
        "new_expression" => {
            let mut fields = Vec::new();
            push_node(
                &mut fields,
                "callee",
                lower_field(ts, "constructor", src, ast)?,
            );
            fields.push(("arguments", lower_arguments(ts, src, ast)?));
            alloc(ast, "NewExpression", fields)
        }
        "member_expression" => {
            let mut fields = vec![("computed", Value::Bool(false))];
            push_node(&mut fields, "object", lower_field(ts, "object", src, ast)?);
            push_node(&mut fields, "property", lower_field(ts, "property", src, ast)?);
            alloc(ast, "MemberExpression", fields)
        }
        "subscript_expression" => {
            let mut fields = vec![("computed", Value::Bool(true))];
            push_node(&mut fields, "object", lower_field(ts, "object", src, ast)?);
            push_node(&mut fields, "property", lower_field(ts, "index", src, ast)?);
            alloc(ast, "MemberExpression", fields)
        }
        "object" => {
            let properties = lower_named_children(ts, src, ast)?;
            alloc(
                ast,
                "ObjectExpression",
                vec![("properties", Value::List(properties))],
            )
        }
        "pair" | "pair_pattern" => {
            let mut fields = vec![("kind", Value::Str("init".to_string()))];
            push_node(&mut fields, "key", lower_field(ts, "key", src, ast)?);
            push_node(&mut fields, "value", lower_field(ts, "value", src, ast)?);
            alloc(ast, "Property", fields)
        }
        "shorthand_property_identifier" | "shorthand_property_identifier_pattern" => {
            let name = node_text(ts, src).to_string();
            let key = alloc_identifier(ast, &name);
            let value = alloc_identifier(ast, &name);
            alloc(
                ast,
                "Property",
                vec![
                    ("key", Value::Node(key)),
                    ("kind", Value::Str("init".to_string())),
                    ("value", Value::Node(value)),
                ],
            )
        }
        "array" => {
            let elements = lower_named_children(ts, src, ast)?;
            alloc(ast, "ArrayExpression", vec![("elements", Value::List(elements))])
        }
        "spread_element" => {
            let mut fields = Vec::new();
            push_node(&mut fields, "argument", lower_first_child(ts, src, ast)?);
            alloc(ast, "SpreadElement", fields)
        }
        "function_expression" | "function" => {
            lower_function(ts, src, ast, "FunctionExpression", false)?
        }
        "generator_function" => lower_function(ts, src, ast, "FunctionExpression", true)?,
        "arrow_function" => {
            let mut fields = vec![("params", lower_params(ts, src, ast)?)];
            push_node(&mut fields, "body", lower_field(ts, "body", src, ast)?);
            alloc(ast, "ArrowFunctionExpression", fields)
        }
        "yield_expression" => {
            let mut fields = Vec::new();
            push_node(&mut fields, "argument", lower_first_child(ts, src, ast)?);
            alloc(ast, "YieldExpression", fields)
        }
        "await_expression" => {
            let mut fields = Vec::new();
            push_node(&mut fields, "argument", lower_first_child(ts, src, ast)?);
            alloc(ast, "AwaitExpression", fields)
        }
        "template_string" => {
            let mut expressions = Vec::new();
            let mut cursor = ts.walk();
            for child in ts.named_children(&mut cursor) {
                if child.kind() == "template_substitution" {
                    if let Some(inner) = first_named_child(child) {
                        if let Some(id) = lower(inner, src, ast)? {
                            expressions.push(id);
                        }
                    }
                }
            }
            alloc(
                ast,
                "TemplateLiteral",
                vec![("expressions", Value::List(expressions))],
            )
        }

        // -- patterns --------------------------------------------------------
        "object_pattern" => {
            let properties = lower_named_children(ts, src, ast)?;
            alloc(
                ast,
                "ObjectPattern",
                vec![("properties", Value::List(properties))],
            )
        }
        "array_pattern" => {
            let elements = lower_named_children(ts, src, ast)?;
            alloc(ast, "ArrayPattern", vec![("elements", Value::List(elements))])
        }
        "assignment_pattern" | "object_assignment_pattern" => {
            let mut fields = Vec::new();
            push_node(&mut fields, "left", lower_field(ts, "left", src, ast)?);
            push_node(&mut fields, "right", lower_field(ts, "right", src, ast)?);
            alloc(ast, "AssignmentPattern", fields)
        }
        "rest_pattern" => {
            let mut fields = Vec::new();
            push_node(&mut fields, "argument", lower_first_child(ts, src, ast)?);
            alloc(ast, "RestElement", fields)
        }

        // -- leaves ----------------------------------------------------------
        "identifier"
        | "property_identifier"
        | "statement_identifier"
        | "private_property_identifier"
        | "undefined" => {
            let name = node_text(ts, src).to_string();
            Some(alloc_identifier(ast, &name))
        }
        "this" => alloc(ast, "ThisExpression", Vec::new()),
        "super" => alloc(ast, "Super", Vec::new()),
        "number" => alloc(
            ast,
            "Literal",
            vec![("value", number_value(node_text(ts, src)))],
        ),
        "string" => alloc(
            ast,
            "Literal",
            vec![("value", string_value(node_text(ts, src)))],
        ),
        "regex" => alloc(
            ast,
            "Literal",
            vec![("value", Value::Str(node_text(ts, src).to_string()))],
        ),
        "true" => alloc(ast, "Literal", vec![("value", Value::Bool(true))]),
        "false" => alloc(ast, "Literal", vec![("value", Value::Bool(false))]),
        "null" => alloc(ast, "Literal", vec![("value", Value::Null)]),

        _ => lower_generic(ts, src, ast)?,
    };
    Ok(node)
}

// ---------------------------------------------------------------------------
// Shared lowering helpers
// ---------------------------------------------------------------------------

fn alloc(ast: &mut Ast, tag: &str, fields: Vec<(&'static str, Value)>) -> Option<NodeId> {
    Some(ast.alloc(Node::new(Kind::estree(tag), fields)))
}

fn alloc_identifier(ast: &mut Ast, name: &str) -> NodeId {
    ast.alloc(Node::new(
        Kind::estree("Identifier"),
        vec![("name", Value::Str(name.to_string()))],
    ))
}

fn push_node(fields: &mut Vec<(&'static str, Value)>, name: &'static str, id: Option<NodeId>) {
    if let Some(id) = id {
        fields.push((name, Value::Node(id)));
    }
}

fn node_text<'a>(ts: TsNode, src: &'a [u8]) -> &'a str {
    std::str::from_utf8(&src[ts.start_byte()..ts.end_byte()]).unwrap_or("")
}

fn field_text<'a>(ts: TsNode, field: &str, src: &'a [u8]) -> Option<&'a str> {
    ts.child_by_field_name(field).map(|n| node_text(n, src))
}

fn first_named_child(ts: TsNode) -> Option<TsNode> {
    let mut cursor = ts.walk();
    let result = ts.named_children(&mut cursor)
        .find(|c| c.kind() != "comment");
    result
}

fn lower_field(
    ts: TsNode,
    field: &str,
    src: &[u8],
    ast: &mut Ast,
) -> Result<Option<NodeId>, ArborError> {
    match ts.child_by_field_name(field) {
        Some(child) => lower(child, src, ast),
        None => Ok(None),
    }
}

fn lower_first_child(ts: TsNode, src: &[u8], ast: &mut Ast) -> Result<Option<NodeId>, ArborError> {
    match first_named_child(ts) {
        Some(child) => lower(child, src, ast),
        None => Ok(None),
    }
}

fn lower_named_children(
    ts: TsNode,
    src: &[u8],
    ast: &mut Ast,
) -> Result<Vec<NodeId>, ArborError> {
    let mut out = Vec::new();
    let mut cursor = ts.walk();
    for child in ts.named_children(&mut cursor) {
        if let Some(id) = lower(child, src, ast)? {
            out.push(id);
        }
    }
    Ok(out)
}

/// `var` declarations carry their kind implicitly; lexical ones spell it.
fn declaration_kind(ts: TsNode, src: &[u8]) -> String {
    if ts.kind() == "variable_declaration" {
        return "var".to_string();
    }
    ts.child(0)
        .map(|c| node_text(c, src).to_string())
        .unwrap_or_else(|| "let".to_string())
}

fn lower_function(
    ts: TsNode,
    src: &[u8],
    ast: &mut Ast,
    tag: &str,
    generator: bool,
) -> Result<Option<NodeId>, ArborError> {
    let mut fields = Vec::new();
    push_node(&mut fields, "id", lower_field(ts, "name", src, ast)?);
    fields.push(("params", lower_params(ts, src, ast)?));
    push_node(&mut fields, "body", lower_field(ts, "body", src, ast)?);
    if generator {
        fields.push(("generator", Value::Bool(true)));
    }
    Ok(alloc(ast, tag, fields))
}

fn lower_params(ts: TsNode, src: &[u8], ast: &mut Ast) -> Result<Value, ArborError> {
    if let Some(parameters) = ts.child_by_field_name("parameters") {
        return Ok(Value::List(lower_named_children(parameters, src, ast)?));
    }
    // Arrow functions allow a single bare parameter.
    if let Some(single) = ts.child_by_field_name("parameter") {
        return Ok(Value::List(lower(single, src, ast)?.into_iter().collect()));
    }
    Ok(Value::List(Vec::new()))
}

fn lower_arguments(ts: TsNode, src: &[u8], ast: &mut Ast) -> Result<Value, ArborError> {
    match ts.child_by_field_name("arguments") {
        Some(arguments) => Ok(Value::List(lower_named_children(arguments, src, ast)?)),
        None => Ok(Value::List(Vec::new())),
    }
}

/// For-header slots: an expression statement unwraps to its expression and
/// an empty statement means the slot is absent.
fn lower_for_header(
    ts: TsNode,
    field: &str,
    src: &[u8],
    ast: &mut Ast,
) -> Result<Option<NodeId>, ArborError> {
    let Some(child) = ts.child_by_field_name(field) else {
        return Ok(None);
    };
    match child.kind() {
        "empty_statement" => Ok(None),
        "expression_statement" => lower_first_child(child, src, ast),
        _ => lower(child, src, ast),
    }
}

/// Fallback lowering for CST kinds without an explicit mapping.
///
/// The snake_case kind becomes the type tag, field-named children become
/// fields (lists when a field repeats), and fieldless named children
/// accumulate into a `children` list. Keeps the engine total over grammar
/// corners the explicit table does not cover.
fn lower_generic(ts: TsNode, src: &[u8], ast: &mut Ast) -> Result<Option<NodeId>, ArborError> {
    if !ts.is_named() {
        return Ok(None);
    }

    let mut grouped: Vec<(&'static str, Vec<NodeId>)> = Vec::new();
    let mut loose: Vec<NodeId> = Vec::new();

    let mut cursor = ts.walk();
    if cursor.goto_first_child() {
        loop {
            let child = cursor.node();
            let field = cursor.field_name();
            if child.is_named() {
                if let Some(id) = lower(child, src, ast)? {
                    match field {
                        Some(name) => match grouped.iter_mut().find(|(n, _)| *n == name) {
                            Some((_, ids)) => ids.push(id),
                            None => grouped.push((name, vec![id])),
                        },
                        None => loose.push(id),
                    }
                }
            }
            if !cursor.goto_next_sibling() {
                break;
            }
        }
    }

    let mut fields: Vec<(&'static str, Value)> = grouped
        .into_iter()
        .map(|(name, mut ids)| {
            if ids.len() == 1 {
                (name, Value::Node(ids.remove(0)))
            } else {
                (name, Value::List(ids))
            }
        })
        .collect();
    if !loose.is_empty() {
        fields.push(("children", Value::List(loose)));
    }

    let tag = pascal_case(ts.kind());
    Ok(Some(ast.alloc(Node::new(Kind::Estree(tag), fields))))
}

fn pascal_case(kind: &str) -> String {
    kind.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

fn number_value(raw: &str) -> Value {
    let text = raw.replace('_', "");
    let trimmed = text.strip_suffix(['n', 'N']).unwrap_or(&text);
    let lowercase = trimmed.to_ascii_lowercase();
    let parsed = if let Some(hex) = lowercase.strip_prefix("0x") {
        i64::from_str_radix(hex, 16).ok().map(|v| v as f64)
    } else if let Some(octal) = lowercase.strip_prefix("0o") {
        i64::from_str_radix(octal, 8).ok().map(|v| v as f64)
    } else if let Some(binary) = lowercase.strip_prefix("0b") {
        i64::from_str_radix(binary, 2).ok().map(|v| v as f64)
    } else {
        trimmed.parse::<f64>().ok()
    };
    match parsed {
        Some(value) => Value::Number(value),
        None => Value::Str(text),
    }
}

/// The quoted text minus its delimiters; escape sequences are left as-is.
fn string_value(raw: &str) -> Value {
    let inner = raw
        .strip_prefix(['"', '\''])
        .and_then(|s| s.strip_suffix(['"', '\'']))
        .unwrap_or(raw);
    Value::Str(inner.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Annotations;

    fn field_node(ast: &Ast, id: NodeId, name: &str) -> NodeId {
        match ast.node(id).field(name) {
            Some(Value::Node(child)) => *child,
            other => panic!("expected node field `{}`, got {:?}", name, other),
        }
    }

    fn field_list(ast: &Ast, id: NodeId, name: &str) -> Vec<NodeId> {
        match ast.node(id).field(name) {
            Some(Value::List(list)) => list.clone(),
            other => panic!("expected list field `{}`, got {:?}", name, other),
        }
    }

    fn first_statement(ast: &Ast) -> NodeId {
        field_list(ast, ast.root(), "body")[0]
    }

    #[test]
    fn test_var_declaration_shape() {
        let ast = parse_script("var x = 10;").unwrap();
        assert_eq!(ast.node(ast.root()).type_str(), "Program");

        let declaration = first_statement(&ast);
        assert_eq!(ast.node(declaration).type_str(), "VariableDeclaration");
        assert_eq!(
            ast.node(declaration).field("kind"),
            Some(&Value::Str("var".to_string()))
        );

        let declarator = field_list(&ast, declaration, "declarations")[0];
        let id = field_node(&ast, declarator, "id");
        assert_eq!(ast.node(id).field("name"), Some(&Value::Str("x".to_string())));
        let init = field_node(&ast, declarator, "init");
        assert_eq!(ast.node(init).field("value"), Some(&Value::Number(10.0)));
    }

    #[test]
    fn test_declarator_without_init_omits_field() {
        let ast = parse_script("var y;").unwrap();
        let declaration = first_statement(&ast);
        let declarator = field_list(&ast, declaration, "declarations")[0];
        assert!(ast.node(declarator).field("init").is_none());
    }

    #[test]
    fn test_lexical_declaration_kind() {
        let ast = parse_script("const z = 1;").unwrap();
        let declaration = first_statement(&ast);
        assert_eq!(
            ast.node(declaration).field("kind"),
            Some(&Value::Str("const".to_string()))
        );
    }

    #[test]
    fn test_function_declaration_shape() {
        let ast = parse_script("function add(a, b) { return a + b; }").unwrap();
        let function = first_statement(&ast);
        assert_eq!(ast.node(function).type_str(), "FunctionDeclaration");
        let params = field_list(&ast, function, "params");
        assert_eq!(params.len(), 2);
        assert!(ast.node(params[0]).is_identifier());
        let body = field_node(&ast, function, "body");
        assert_eq!(ast.node(body).type_str(), "BlockStatement");
    }

    #[test]
    fn test_logical_split_from_binary() {
        let ast = parse_script("a + b; a && b;").unwrap();
        let statements = field_list(&ast, ast.root(), "body");
        let plus = field_node(&ast, statements[0], "expression");
        let and = field_node(&ast, statements[1], "expression");
        assert_eq!(ast.node(plus).type_str(), "BinaryExpression");
        assert_eq!(ast.node(and).type_str(), "LogicalExpression");
    }

    #[test]
    fn test_update_prefix_flag() {
        let ast = parse_script("x++; ++x;").unwrap();
        let statements = field_list(&ast, ast.root(), "body");
        let postfix = field_node(&ast, statements[0], "expression");
        let prefix = field_node(&ast, statements[1], "expression");
        assert_eq!(ast.node(postfix).field("prefix"), Some(&Value::Bool(false)));
        assert_eq!(ast.node(prefix).field("prefix"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_parenthesized_expression_unwrapped() {
        let ast = parse_script("(a + 1);").unwrap();
        let expression = field_node(&ast, first_statement(&ast), "expression");
        assert_eq!(ast.node(expression).type_str(), "BinaryExpression");
    }

    #[test]
    fn test_object_literal_shape() {
        let ast = parse_script("var x = {a: 'hi', b: 'bye'};").unwrap();
        let declaration = first_statement(&ast);
        let declarator = field_list(&ast, declaration, "declarations")[0];
        let object = field_node(&ast, declarator, "init");
        assert_eq!(ast.node(object).type_str(), "ObjectExpression");
        let properties = field_list(&ast, object, "properties");
        assert_eq!(properties.len(), 2);
        assert_eq!(ast.node(properties[0]).type_str(), "Property");
        let key = field_node(&ast, properties[0], "key");
        assert!(ast.node(key).is_identifier());
        let value = field_node(&ast, properties[0], "value");
        assert_eq!(
            ast.node(value).field("value"),
            Some(&Value::Str("hi".to_string()))
        );
    }

    #[test]
    fn test_member_expression_computed_flag() {
        let ast = parse_script("a.b; a[b];").unwrap();
        let statements = field_list(&ast, ast.root(), "body");
        let dot = field_node(&ast, statements[0], "expression");
        let bracket = field_node(&ast, statements[1], "expression");
        assert_eq!(ast.node(dot).field("computed"), Some(&Value::Bool(false)));
        assert_eq!(ast.node(bracket).field("computed"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_empty_program() {
        let ast = parse_script("").unwrap();
        let root = ast.root();
        assert_eq!(ast.node(root).type_str(), "Program");
        assert!(field_list(&ast, root, "body").is_empty());
        assert!(ast.children(root, &Annotations::new()).is_empty());
    }

    #[test]
    fn test_syntax_error_rejected() {
        let err = parse_script("var = ;").unwrap_err();
        match err {
            ArborError::ParseFailure(msg) => {
                assert!(msg.contains("syntax error"), "unexpected message: {}", msg)
            }
            other => panic!("expected ParseFailure, got {:?}", other),
        }
    }

    #[test]
    fn test_literal_values() {
        let ast = parse_script("1.5; 0x10; true; null;").unwrap();
        let statements = field_list(&ast, ast.root(), "body");
        let values: Vec<Value> = statements
            .iter()
            .map(|s| {
                ast.node(field_node(&ast, *s, "expression"))
                    .field("value")
                    .cloned()
                    .unwrap()
            })
            .collect();
        assert_eq!(
            values,
            vec![
                Value::Number(1.5),
                Value::Number(16.0),
                Value::Bool(true),
                Value::Null,
            ]
        );
    }
}
