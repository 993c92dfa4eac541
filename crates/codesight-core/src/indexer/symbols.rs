//! Declaration, import and metric extraction from parsed Python source.
//!
//! One pass over the tree-sitter syntax tree collects declarations in source
//! order, every import statement (including ones nested in functions),
//! module-level constants and the control-flow shape of each function. Raw
//! line metrics and Halstead counts are gathered from the same tree.

use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use tree_sitter::Node;

use crate::indexer::parser::{end_line, node_text, start_line, ParsedUnit};
use crate::models::{
    ClassDecl, ConstantBinding, ControlFlowShape, Declaration, DeclarationId, FunctionDecl,
    HalsteadCounts, ImportRecord, Parameter, ParameterKind, RawMetrics,
};

static CONSTANT_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Z0-9_]*$").unwrap());

const MAX_CONSTANT_VALUE_LEN: usize = 120;

/// Everything extracted from one file.
#[derive(Clone, Debug, Default)]
pub struct ExtractedFile {
    pub declarations: Vec<Declaration>,
    pub imports: Vec<ImportRecord>,
    pub constants: Vec<ConstantBinding>,
    pub metrics: RawMetrics,
    pub halstead: HalsteadCounts,
    pub module_decisions: u32,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn is_definition(kind: &str) -> bool {
    matches!(
        kind,
        "function_definition" | "class_definition" | "decorated_definition"
    )
}

/// Strip string prefixes and quotes, then dedent.
pub fn clean_docstring(raw: &str) -> String {
    let start = raw.find(['"', '\'']).unwrap_or(0);
    let body = &raw[start..];
    let quote = if body.starts_with("\"\"\"") || body.starts_with("'''") {
        3
    } else {
        1
    };
    let inner = if body.len() >= quote * 2 {
        &body[quote..body.len() - quote]
    } else {
        ""
    };
    inner
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Docstring of a module or block: a bare string as its first statement.
fn block_docstring(block: Node<'_>, source: &str) -> Option<String> {
    let mut cursor = block.walk();
    let first = block
        .named_children(&mut cursor)
        .find(|n| n.kind() != "comment")?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let expr = first.named_child(0)?;
    if expr.kind() != "string" {
        return None;
    }
    let doc = clean_docstring(node_text(expr, source));
    if doc.is_empty() {
        None
    } else {
        Some(doc)
    }
}

fn param_from_node(node: Node<'_>, source: &str) -> Option<Parameter> {
    let text = |n: Node<'_>| node_text(n, source).to_string();
    match node.kind() {
        "identifier" => Some(Parameter {
            name: text(node),
            annotation: None,
            has_default: false,
            kind: ParameterKind::Regular,
        }),
        "list_splat_pattern" | "dictionary_splat_pattern" => {
            let kind = if node.kind() == "list_splat_pattern" {
                ParameterKind::VarPositional
            } else {
                ParameterKind::VarKeyword
            };
            let name = node
                .named_child(0)
                .map(text)
                .unwrap_or_else(|| text(node).trim_start_matches('*').to_string());
            Some(Parameter {
                name,
                annotation: None,
                has_default: false,
                kind,
            })
        }
        "typed_parameter" => {
            let inner = node.named_child(0)?;
            let mut param = param_from_node(inner, source)?;
            param.annotation = node.child_by_field_name("type").map(text);
            Some(param)
        }
        "default_parameter" | "typed_default_parameter" => Some(Parameter {
            name: node.child_by_field_name("name").map(text)?,
            annotation: node.child_by_field_name("type").map(text),
            has_default: true,
            kind: ParameterKind::Regular,
        }),
        _ => None,
    }
}

fn extract_parameters(params: Option<Node<'_>>, source: &str) -> Vec<Parameter> {
    let Some(params) = params else {
        return Vec::new();
    };
    let mut cursor = params.walk();
    params
        .named_children(&mut cursor)
        .filter_map(|child| param_from_node(child, source))
        .collect()
}

fn decorator_texts(decorated: Node<'_>, source: &str) -> Vec<String> {
    let mut cursor = decorated.walk();
    decorated
        .named_children(&mut cursor)
        .filter(|n| n.kind() == "decorator")
        .map(|n| node_text(n, source).trim_start_matches('@').trim().to_string())
        .collect()
}

fn is_wildcard_case(case: Node<'_>, source: &str) -> bool {
    if case.child_by_field_name("guard").is_some() {
        return false;
    }
    let mut cursor = case.walk();
    let patterns: Vec<Node<'_>> = case
        .named_children(&mut cursor)
        .filter(|n| n.kind() == "case_pattern")
        .collect();
    patterns.len() == 1 && node_text(patterns[0], source).trim() == "_"
}

// ---------------------------------------------------------------------------
// Control-flow shape
// ---------------------------------------------------------------------------

/// Count decision points below `node`, not descending into nested
/// functions or classes.
pub fn control_flow_shape(node: Node<'_>, source: &str) -> ControlFlowShape {
    let mut shape = ControlFlowShape::default();
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
    for child in children {
        accumulate_shape(child, source, &mut shape);
    }
    shape
}

fn accumulate_shape(node: Node<'_>, source: &str, shape: &mut ControlFlowShape) {
    let kind = node.kind();
    if is_definition(kind) {
        return;
    }
    match kind {
        "if_statement" | "elif_clause" | "conditional_expression" => shape.branches += 1,
        "for_statement" | "while_statement" => {
            shape.loops += 1;
            if node.child_by_field_name("alternative").is_some() {
                shape.loop_else += 1;
            }
        }
        "except_clause" | "except_group_clause" => shape.handlers += 1,
        "try_statement" => {
            let mut cursor = node.walk();
            if node
                .children(&mut cursor)
                .any(|c| c.kind() == "else_clause")
            {
                shape.try_else += 1;
            }
        }
        "boolean_operator" => shape.bool_terms += 1,
        "for_in_clause" => shape.comprehensions += 1,
        // A case guard is also an `if_clause`.
        "if_clause" if node.parent().is_some_and(|p| p.kind() != "case_clause") => {
            shape.comprehension_ifs += 1
        }
        "case_clause" if !is_wildcard_case(node, source) => shape.branches += 1,
        _ => {}
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        accumulate_shape(child, source, shape);
    }
}

// ---------------------------------------------------------------------------
// Declarations and constants
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum Scope {
    Module,
    Class { index: usize, qualified: String },
    Function { qualified: String },
}

impl Scope {
    fn qualify(&self, name: &str) -> String {
        match self {
            Scope::Module => name.to_string(),
            Scope::Class { qualified, .. } | Scope::Function { qualified } => {
                format!("{qualified}.{name}")
            }
        }
    }
}

struct DeclarationCollector<'a> {
    source: &'a str,
    declarations: Vec<Declaration>,
    constants: Vec<ConstantBinding>,
}

impl<'a> DeclarationCollector<'a> {
    fn visit(&mut self, node: Node<'_>, scope: &Scope) {
        match node.kind() {
            "function_definition" => self.function(node, Vec::new(), scope),
            "class_definition" => self.class(node, Vec::new(), scope),
            "decorated_definition" => {
                let decorators = decorator_texts(node, self.source);
                if let Some(definition) = node.child_by_field_name("definition") {
                    match definition.kind() {
                        "function_definition" => self.function(definition, decorators, scope),
                        "class_definition" => self.class(definition, decorators, scope),
                        _ => {}
                    }
                }
            }
            "expression_statement" if matches!(scope, Scope::Module) => {
                self.constant(node);
            }
            _ => {
                let mut cursor = node.walk();
                let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
                for child in children {
                    self.visit(child, scope);
                }
            }
        }
    }

    fn constant(&mut self, statement: Node<'_>) {
        let Some(assignment) = statement.named_child(0) else {
            return;
        };
        if assignment.kind() != "assignment" {
            return;
        }
        let (Some(left), Some(right)) = (
            assignment.child_by_field_name("left"),
            assignment.child_by_field_name("right"),
        ) else {
            return;
        };
        if left.kind() != "identifier" {
            return;
        }
        let name = node_text(left, self.source);
        if !CONSTANT_NAME_RE.is_match(name) {
            return;
        }
        let mut value = node_text(right, self.source).trim().to_string();
        if value.len() > MAX_CONSTANT_VALUE_LEN {
            let mut end = MAX_CONSTANT_VALUE_LEN;
            while !value.is_char_boundary(end) {
                end -= 1;
            }
            value.truncate(end);
            value.push_str("...");
        }
        self.constants.push(ConstantBinding {
            name: name.to_string(),
            line: start_line(statement),
            value,
        });
    }

    fn function(&mut self, node: Node<'_>, decorators: Vec<String>, scope: &Scope) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, self.source).to_string();
        let qualified_name = scope.qualify(&name);
        let is_async = node.child(0).is_some_and(|c| c.kind() == "async");
        let body = node.child_by_field_name("body");
        let docstring = body.and_then(|b| block_docstring(b, self.source));
        let shape = body
            .map(|b| control_flow_shape(b, self.source))
            .unwrap_or_default();

        let id = DeclarationId(self.declarations.len());
        self.declarations.push(Declaration::Function(FunctionDecl {
            name,
            qualified_name: qualified_name.clone(),
            is_async,
            is_method: matches!(scope, Scope::Class { .. }),
            decorators,
            params: extract_parameters(node.child_by_field_name("parameters"), self.source),
            return_annotation: node
                .child_by_field_name("return_type")
                .map(|n| node_text(n, self.source).to_string()),
            docstring,
            start_line: start_line(node),
            end_line: end_line(node),
            shape,
        }));

        if let Scope::Class { index, .. } = scope {
            if let Some(Declaration::Class(class)) = self.declarations.get_mut(*index) {
                class.methods.push(id);
            }
        }

        if let Some(body) = body {
            let inner = Scope::Function {
                qualified: qualified_name,
            };
            self.visit(body, &inner);
        }
    }

    fn class(&mut self, node: Node<'_>, decorators: Vec<String>, scope: &Scope) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, self.source).to_string();
        let qualified_name = scope.qualify(&name);
        let bases = node
            .child_by_field_name("superclasses")
            .map(|args| {
                let mut cursor = args.walk();
                args.named_children(&mut cursor)
                    .filter(|n| n.kind() != "comment")
                    .map(|n| node_text(n, self.source).to_string())
                    .collect()
            })
            .unwrap_or_default();
        let body = node.child_by_field_name("body");

        let index = self.declarations.len();
        self.declarations.push(Declaration::Class(ClassDecl {
            name,
            qualified_name: qualified_name.clone(),
            bases,
            decorators,
            methods: Vec::new(),
            docstring: body.and_then(|b| block_docstring(b, self.source)),
            start_line: start_line(node),
            end_line: end_line(node),
        }));

        if let Some(body) = body {
            let inner = Scope::Class {
                index,
                qualified: qualified_name,
            };
            self.visit(body, &inner);
        }
    }
}

// ---------------------------------------------------------------------------
// Imports
// ---------------------------------------------------------------------------

fn imported_name(node: Node<'_>, source: &str) -> String {
    match node.kind() {
        "aliased_import" => node
            .child_by_field_name("name")
            .map(|n| node_text(n, source).to_string())
            .unwrap_or_default(),
        _ => node_text(node, source).to_string(),
    }
}

fn collect_imports(node: Node<'_>, source: &str, imports: &mut Vec<ImportRecord>) {
    match node.kind() {
        "import_statement" => {
            let mut cursor = node.walk();
            for child in node.children_by_field_name("name", &mut cursor) {
                let module = imported_name(child, source);
                if module.is_empty() {
                    continue;
                }
                imports.push(ImportRecord {
                    module,
                    level: 0,
                    names: Vec::new(),
                    is_from: false,
                    line: start_line(node),
                });
            }
            return;
        }
        "import_from_statement" => {
            let Some(module_node) = node.child_by_field_name("module_name") else {
                return;
            };
            let (module, level) = if module_node.kind() == "relative_import" {
                let mut cursor = module_node.walk();
                let mut level = 0u32;
                let mut module = String::new();
                for part in module_node.named_children(&mut cursor) {
                    match part.kind() {
                        "import_prefix" => {
                            level = node_text(part, source).matches('.').count() as u32
                        }
                        "dotted_name" => module = node_text(part, source).to_string(),
                        _ => {}
                    }
                }
                (module, level)
            } else {
                (node_text(module_node, source).to_string(), 0)
            };

            let mut names = Vec::new();
            let mut cursor = node.walk();
            for child in node.children_by_field_name("name", &mut cursor) {
                let name = imported_name(child, source);
                if !name.is_empty() {
                    names.push(name);
                }
            }
            let mut cursor = node.walk();
            if node
                .named_children(&mut cursor)
                .any(|c| c.kind() == "wildcard_import")
            {
                names.push("*".to_string());
            }

            imports.push(ImportRecord {
                module,
                level,
                names,
                is_from: true,
                line: start_line(node),
            });
            return;
        }
        // `from __future__ import ...` is a compiler directive, not a dependency.
        "future_import_statement" => return,
        _ => {}
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        collect_imports(child, source, imports);
    }
}

// ---------------------------------------------------------------------------
// Raw metrics and Halstead counts
// ---------------------------------------------------------------------------

fn is_logical_line(kind: &str) -> bool {
    (kind.ends_with("_statement") && kind != "expression_statement")
        || matches!(
            kind,
            "expression_statement"
                | "function_definition"
                | "class_definition"
                | "decorator"
                | "elif_clause"
                | "else_clause"
                | "except_clause"
                | "finally_clause"
                | "case_clause"
        )
}

struct MetricWalk {
    comment_lines: BTreeSet<u32>,
    docstring_lines: BTreeSet<u32>,
    lloc: u32,
    operators: HashSet<String>,
    operands: HashSet<String>,
    total_operators: u32,
    total_operands: u32,
}

impl MetricWalk {
    fn operator(&mut self, op: &str) {
        self.operators.insert(op.to_string());
        self.total_operators += 1;
    }

    fn operand(&mut self, node: Option<Node<'_>>, source: &str) {
        if let Some(node) = node {
            self.operands.insert(node_text(node, source).to_string());
            self.total_operands += 1;
        }
    }

    fn walk(&mut self, node: Node<'_>, source: &str) {
        let kind = node.kind();
        if is_logical_line(kind) {
            self.lloc += 1;
        }
        match kind {
            "comment" => {
                self.comment_lines.insert(start_line(node));
            }
            "expression_statement" => {
                if let Some(expr) = node.named_child(0) {
                    if node.named_child_count() == 1 && expr.kind() == "string" {
                        for line in start_line(expr)..=end_line(expr) {
                            self.docstring_lines.insert(line);
                        }
                    }
                }
            }
            "binary_operator" | "boolean_operator" | "augmented_assignment" => {
                if let Some(op) = node.child_by_field_name("operator") {
                    self.operator(node_text(op, source));
                }
                self.operand(node.child_by_field_name("left"), source);
                self.operand(node.child_by_field_name("right"), source);
            }
            "unary_operator" => {
                if let Some(op) = node.child_by_field_name("operator") {
                    self.operator(node_text(op, source));
                }
                self.operand(node.child_by_field_name("argument"), source);
            }
            "not_operator" => {
                self.operator("not");
                self.operand(node.child_by_field_name("argument"), source);
            }
            "comparison_operator" => {
                let mut cursor = node.walk();
                let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
                for child in children {
                    if child.is_named() {
                        self.operand(Some(child), source);
                    } else {
                        self.operator(child.kind());
                    }
                }
            }
            _ => {}
        }
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
        for child in children {
            self.walk(child, source);
        }
    }
}

fn raw_metrics(source: &str, walk: &MetricWalk) -> RawMetrics {
    let mut metrics = RawMetrics {
        lloc: walk.lloc,
        ..RawMetrics::default()
    };
    for (index, line) in source.lines().enumerate() {
        let number = index as u32 + 1;
        metrics.lines += 1;
        let trimmed = line.trim();
        if walk.docstring_lines.contains(&number) {
            metrics.multi += 1;
        } else if trimmed.is_empty() {
            metrics.blank += 1;
        } else if trimmed.starts_with('#') {
            metrics.comments += 1;
        } else {
            metrics.sloc += 1;
            if walk.comment_lines.contains(&number) {
                metrics.comments += 1;
            }
        }
    }
    metrics
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Extract declarations, imports, constants and metrics from a parsed file.
pub fn extract_file(unit: &ParsedUnit, module_name: &str) -> ExtractedFile {
    let source = unit.source.as_str();
    let root = unit.tree.root_node();

    let mut collector = DeclarationCollector {
        source,
        declarations: vec![Declaration::Module {
            name: module_name.to_string(),
            docstring: block_docstring(root, source),
        }],
        constants: Vec::new(),
    };
    collector.visit(root, &Scope::Module);

    let mut imports = Vec::new();
    collect_imports(root, source, &mut imports);

    let mut walk = MetricWalk {
        comment_lines: BTreeSet::new(),
        docstring_lines: BTreeSet::new(),
        lloc: 0,
        operators: HashSet::new(),
        operands: HashSet::new(),
        total_operators: 0,
        total_operands: 0,
    };
    walk.walk(root, source);

    let halstead = HalsteadCounts {
        distinct_operators: walk.operators.len() as u32,
        distinct_operands: walk.operands.len() as u32,
        total_operators: walk.total_operators,
        total_operands: walk.total_operands,
    };

    ExtractedFile {
        declarations: collector.declarations,
        imports,
        constants: collector.constants,
        metrics: raw_metrics(source, &walk),
        halstead,
        module_decisions: control_flow_shape(root, source).decision_points(),
    }
}
