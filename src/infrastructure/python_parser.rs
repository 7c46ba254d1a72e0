//! Tree-sitter backed module parser for Python sources.
//!
//! Produces declaration-level descriptions only: module-scope functions,
//! classes with their methods, and import statements.

use std::fs;
use std::path::Path;

use tree_sitter::{Node, Parser};

use crate::domain::ast::{ClassInfo, FunctionInfo, ImportInfo, ModuleInfo};
use crate::error::ParseError;
use crate::ports::SourceParser;

/// Node kinds that add a decision point to a function's complexity.
const DECISION_KINDS: &[&str] = &[
    "if_statement",
    "elif_clause",
    "for_statement",
    "while_statement",
    "except_clause",
    "conditional_expression",
    "boolean_operator",
    "for_in_clause",
    "if_clause",
    "case_clause",
];

#[derive(Debug, Default, Clone, Copy)]
pub struct PythonModuleParser;

impl SourceParser for PythonModuleParser {
    fn parse_module(&self, module_name: &str, path: &Path) -> Result<ModuleInfo, ParseError> {
        let source = fs::read_to_string(path).map_err(|source| ParseError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.parse_source(module_name, path, &source)
    }
}

impl PythonModuleParser {
    pub fn parse_source(
        &self,
        module_name: &str,
        path: &Path,
        source: &str,
    ) -> Result<ModuleInfo, ParseError> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::language())
            .map_err(|e| ParseError::Grammar(e.to_string()))?;

        let tree = parser.parse(source, None).ok_or_else(|| ParseError::Syntax {
            path: path.to_path_buf(),
        })?;
        let root = tree.root_node();
        if root.has_error() {
            return Err(ParseError::Syntax {
                path: path.to_path_buf(),
            });
        }

        let src = source.as_bytes();
        let mut module = ModuleInfo::new(module_name, path);

        for child in named_children(root) {
            let definition = unwrap_decorated(child);
            match definition.kind() {
                "function_definition" => {
                    if let Some(func) = function_info(definition, src, false) {
                        module.functions.push(func);
                    }
                }
                "class_definition" => {
                    if let Some(class) = class_info(definition, src) {
                        module.classes.push(class);
                    }
                }
                _ => {}
            }
        }

        module.imports = collect_imports(root, src);
        Ok(module)
    }
}

fn named_children(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    let children: Vec<Node> = node.named_children(&mut cursor).collect();
    children
}

fn unwrap_decorated(node: Node) -> Node {
    if node.kind() == "decorated_definition" {
        node.child_by_field_name("definition").unwrap_or(node)
    } else {
        node
    }
}

fn text<'s>(node: Node, src: &'s [u8]) -> &'s str {
    node.utf8_text(src).unwrap_or_default()
}

fn function_info(node: Node, src: &[u8], is_method: bool) -> Option<FunctionInfo> {
    let name = text(node.child_by_field_name("name")?, src).to_string();
    let parameters = node
        .child_by_field_name("parameters")
        .map(|params| parameter_names(params, src))
        .unwrap_or_default();
    let is_async = node.child(0).is_some_and(|first| first.kind() == "async");
    let complexity = node
        .child_by_field_name("body")
        .map(|body| 1 + decision_points(body))
        .unwrap_or(1);

    Some(FunctionInfo {
        name,
        line_number: node.start_position().row + 1,
        parameters,
        complexity,
        is_async,
        is_method,
    })
}

fn parameter_names(params: Node, src: &[u8]) -> Vec<String> {
    named_children(params)
        .into_iter()
        .filter_map(|param| match param.kind() {
            "identifier" | "list_splat_pattern" | "dictionary_splat_pattern" => {
                Some(text(param, src).to_string())
            }
            "default_parameter" | "typed_default_parameter" => param
                .child_by_field_name("name")
                .map(|n| text(n, src).to_string()),
            "typed_parameter" => param.named_child(0).map(|n| text(n, src).to_string()),
            _ => None,
        })
        .collect()
}

/// Decision points in `body`, not counting nested functions or classes.
fn decision_points(body: Node) -> u32 {
    let mut count = 0;
    let mut stack = vec![body];
    while let Some(node) = stack.pop() {
        if DECISION_KINDS.contains(&node.kind()) {
            count += 1;
        }
        for child in named_children(node) {
            if !matches!(child.kind(), "function_definition" | "class_definition") {
                stack.push(child);
            }
        }
    }
    count
}

fn class_info(node: Node, src: &[u8]) -> Option<ClassInfo> {
    let name = text(node.child_by_field_name("name")?, src).to_string();
    let bases = node
        .child_by_field_name("superclasses")
        .map(|args| {
            named_children(args)
                .into_iter()
                .filter(|arg| matches!(arg.kind(), "identifier" | "attribute"))
                .map(|arg| text(arg, src).to_string())
                .collect()
        })
        .unwrap_or_default();

    let methods = node
        .child_by_field_name("body")
        .map(|body| {
            named_children(body)
                .into_iter()
                .map(unwrap_decorated)
                .filter(|n| n.kind() == "function_definition")
                .filter_map(|n| function_info(n, src, true))
                .collect()
        })
        .unwrap_or_default();

    Some(ClassInfo {
        name,
        line_number: node.start_position().row + 1,
        methods,
        bases,
    })
}

/// Every import statement in the module, in source order.
fn collect_imports(root: Node, src: &[u8]) -> Vec<ImportInfo> {
    let mut imports = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        match node.kind() {
            "import_statement" => imports.extend(plain_imports(node, src)),
            "import_from_statement" => imports.extend(from_import(node, src)),
            _ => {
                let mut children = named_children(node);
                children.reverse();
                stack.extend(children);
            }
        }
    }
    imports
}

fn plain_imports(node: Node, src: &[u8]) -> Vec<ImportInfo> {
    let mut cursor = node.walk();
    let names: Vec<Node> = node.children_by_field_name("name", &mut cursor).collect();
    names
        .into_iter()
        .filter_map(|name| {
            let (module, alias) = match name.kind() {
                "dotted_name" => (text(name, src).to_string(), None),
                "aliased_import" => (
                    text(name.child_by_field_name("name")?, src).to_string(),
                    name.child_by_field_name("alias")
                        .map(|a| text(a, src).to_string()),
                ),
                _ => return None,
            };
            Some(ImportInfo {
                module,
                alias,
                is_from: false,
                names: Vec::new(),
            })
        })
        .collect()
}

fn from_import(node: Node, src: &[u8]) -> Option<ImportInfo> {
    let module = text(node.child_by_field_name("module_name")?, src).to_string();

    let mut cursor = node.walk();
    let mut names: Vec<String> = node
        .children_by_field_name("name", &mut cursor)
        .filter_map(|name| match name.kind() {
            "dotted_name" => Some(text(name, src).to_string()),
            "aliased_import" => name
                .child_by_field_name("name")
                .map(|n| text(n, src).to_string()),
            _ => None,
        })
        .collect();

    let mut cursor = node.walk();
    let wildcard = node
        .named_children(&mut cursor)
        .any(|child| child.kind() == "wildcard_import");
    if wildcard {
        names.push("*".to_string());
    }

    Some(ImportInfo {
        module,
        alias: None,
        is_from: true,
        names,
    })
}
