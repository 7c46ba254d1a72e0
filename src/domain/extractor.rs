//! Call extraction for a single module.
//!
//! Walks the module's syntax tree, tracking import aliases, the enclosing
//! class and the stack of enclosing functions, and emits one [`RawCall`] per
//! call-site whose target resolves against the shared [`FunctionRegistry`].
//! Duplicates are kept; the builder folds them into edges.

use std::collections::HashMap;

use tree_sitter::{Node, Parser};

use crate::domain::index::{qualify, FunctionRegistry};
use crate::error::ExtractError;

/// A resolved call-site: `caller` calls `callee` at `line` (1-based).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawCall {
    pub caller: String,
    pub callee: String,
    pub line: usize,
}

/// Create a parser loaded with the Python grammar.
pub fn python_parser() -> Result<Parser, ExtractError> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::language())
        .map_err(|e| ExtractError::Grammar(e.to_string()))?;
    Ok(parser)
}

/// Extract resolved calls from `source`, the text of module `module`.
/// `is_package` marks a package's `__init__` module, which relative imports
/// resolve against directly.
///
/// A module whose tree contains syntax errors yields [`ExtractError::Syntax`]
/// and contributes nothing.
pub fn extract_calls(
    parser: &mut Parser,
    module: &str,
    is_package: bool,
    source: &str,
    registry: &FunctionRegistry,
) -> Result<Vec<RawCall>, ExtractError> {
    let tree = parser.parse(source, None).ok_or_else(|| ExtractError::NoTree {
        module: module.to_string(),
    })?;
    let root = tree.root_node();
    if root.has_error() {
        return Err(ExtractError::Syntax {
            module: module.to_string(),
        });
    }

    let mut extractor = CallExtractor::new(module, is_package, source.as_bytes(), registry);
    extractor.visit(root);
    Ok(extractor.calls)
}

/// The node kinds the walk cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyntaxKind {
    Module,
    Class,
    Function,
    Call,
    Import,
    ImportFrom,
    Other,
}

impl SyntaxKind {
    fn of(node: &Node) -> Self {
        match node.kind() {
            "module" => SyntaxKind::Module,
            "class_definition" => SyntaxKind::Class,
            "function_definition" => SyntaxKind::Function,
            "call" => SyntaxKind::Call,
            "import_statement" => SyntaxKind::Import,
            "import_from_statement" => SyntaxKind::ImportFrom,
            _ => SyntaxKind::Other,
        }
    }
}

/// Shape of the callee expression of a call.
#[derive(Debug, PartialEq, Eq)]
enum CallTarget<'s> {
    /// `f(...)`
    Name(&'s str),
    /// `object.attr(...)`, where `object` may itself be dotted (`a.b`).
    Attribute { object: &'s str, attr: &'s str },
    /// Subscripts, call chains, lambdas and anything else we cannot see through.
    Opaque,
}

struct CallExtractor<'a> {
    module: &'a str,
    is_package: bool,
    source: &'a [u8],
    registry: &'a FunctionRegistry,
    /// alias -> canonical dotted name
    imports: HashMap<String, String>,
    /// Enclosing function ids, innermost last.
    context: Vec<String>,
    /// Qualified id of the innermost enclosing class.
    current_class: Option<String>,
    calls: Vec<RawCall>,
}

impl<'a> CallExtractor<'a> {
    fn new(
        module: &'a str,
        is_package: bool,
        source: &'a [u8],
        registry: &'a FunctionRegistry,
    ) -> Self {
        Self {
            module,
            is_package,
            source,
            registry,
            imports: HashMap::new(),
            context: Vec::new(),
            current_class: None,
            calls: Vec::new(),
        }
    }

    fn visit(&mut self, node: Node) {
        match SyntaxKind::of(&node) {
            SyntaxKind::Class => self.visit_class(node),
            SyntaxKind::Function => self.visit_function(node),
            SyntaxKind::Call => {
                self.record_call(node);
                self.visit_children(node);
            }
            SyntaxKind::Import => self.record_import(node),
            SyntaxKind::ImportFrom => self.record_import_from(node),
            SyntaxKind::Module | SyntaxKind::Other => self.visit_children(node),
        }
    }

    fn visit_children(&mut self, node: Node) {
        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        for child in children {
            self.visit(child);
        }
    }

    fn visit_class(&mut self, node: Node) {
        let Some(name) = self.field_text(node, "name") else {
            return;
        };
        if let Some(bases) = node.child_by_field_name("superclasses") {
            self.visit(bases);
        }

        // Classes nested in a function or another class get a qualified id
        // that is never registered, so they cannot shadow a top-level class.
        let id = match (self.context.last(), &self.current_class) {
            (Some(parent), _) => qualify(&[parent.as_str(), name]),
            (None, Some(outer)) => qualify(&[outer.as_str(), name]),
            (None, None) => qualify(&[self.module, name]),
        };
        let previous = self.current_class.replace(id);
        // The class body is its own scope; calls made directly in it belong
        // to no function.
        let enclosing = std::mem::take(&mut self.context);
        if let Some(body) = node.child_by_field_name("body") {
            self.visit(body);
        }
        self.context = enclosing;
        self.current_class = previous;
    }

    fn visit_function(&mut self, node: Node) {
        let Some(name) = self.field_text(node, "name") else {
            return;
        };

        // Default values are evaluated in the enclosing scope.
        if let Some(params) = node.child_by_field_name("parameters") {
            self.visit(params);
        }

        // Nested functions are qualified under their parent and are never
        // registered, so calls inside them are not attributed to anyone.
        let id = match (self.context.last(), &self.current_class) {
            (Some(parent), _) => qualify(&[parent.as_str(), name]),
            (None, Some(class)) => qualify(&[class.as_str(), name]),
            (None, None) => qualify(&[self.module, name]),
        };

        self.context.push(id);
        if let Some(body) = node.child_by_field_name("body") {
            self.visit(body);
        }
        self.context.pop();
    }

    fn record_call(&mut self, node: Node) {
        let Some(caller) = self.context.last().cloned() else {
            return;
        };
        if !self.registry.contains(&caller) {
            return;
        }
        let Some(function) = node.child_by_field_name("function") else {
            return;
        };
        if let Some(callee) = self.resolve(self.classify(function)) {
            self.calls.push(RawCall {
                caller,
                callee,
                line: node.start_position().row + 1,
            });
        }
    }

    fn classify(&self, function: Node) -> CallTarget<'a> {
        match function.kind() {
            "identifier" => CallTarget::Name(self.text(function)),
            "attribute" => {
                let object = function.child_by_field_name("object");
                let attr = function.child_by_field_name("attribute");
                match (object, attr) {
                    (Some(object), Some(attr))
                        if matches!(object.kind(), "identifier" | "attribute") =>
                    {
                        CallTarget::Attribute {
                            object: self.text(object),
                            attr: self.text(attr),
                        }
                    }
                    _ => CallTarget::Opaque,
                }
            }
            _ => CallTarget::Opaque,
        }
    }

    fn resolve(&self, target: CallTarget) -> Option<String> {
        match target {
            CallTarget::Name(name) => {
                let local = qualify(&[self.module, name]);
                if self.registry.contains(&local) {
                    return Some(local);
                }
                self.imports
                    .get(name)
                    .filter(|canonical| self.registry.contains(canonical))
                    .cloned()
            }
            CallTarget::Attribute { object: "self", attr } => {
                let class = self.current_class.as_deref()?;
                let id = qualify(&[class, attr]);
                self.registry.contains(&id).then_some(id)
            }
            CallTarget::Attribute { object, attr } => {
                if let Some(canonical) = self.imports.get(object) {
                    let id = qualify(&[canonical.as_str(), attr]);
                    return self.registry.contains(&id).then_some(id);
                }
                // `Class.method()` on a class declared in this module.
                let id = qualify(&[self.module, object, attr]);
                self.registry.contains(&id).then_some(id)
            }
            CallTarget::Opaque => None,
        }
    }

    fn record_import(&mut self, node: Node) {
        let mut cursor = node.walk();
        let names: Vec<Node> = node.children_by_field_name("name", &mut cursor).collect();
        for name in names {
            match name.kind() {
                "dotted_name" => {
                    let module = self.text(name).to_string();
                    self.imports.insert(module.clone(), module);
                }
                "aliased_import" => {
                    if let (Some(module), Some(alias)) =
                        (self.field_text(name, "name"), self.field_text(name, "alias"))
                    {
                        self.imports.insert(alias.to_string(), module.to_string());
                    }
                }
                _ => {}
            }
        }
    }

    fn record_import_from(&mut self, node: Node) {
        let Some(source_module) = self.field_text(node, "module_name") else {
            return;
        };
        let base = self.absolute_module(source_module);

        let mut cursor = node.walk();
        let names: Vec<Node> = node.children_by_field_name("name", &mut cursor).collect();
        for name in names {
            let (imported, bound) = match name.kind() {
                "dotted_name" => {
                    let imported = self.text(name);
                    (imported, imported)
                }
                "aliased_import" => {
                    match (self.field_text(name, "name"), self.field_text(name, "alias")) {
                        (Some(imported), Some(alias)) => (imported, alias),
                        _ => continue,
                    }
                }
                _ => continue,
            };
            let canonical = if base.is_empty() {
                imported.to_string()
            } else {
                qualify(&[base.as_str(), imported])
            };
            self.imports.insert(bound.to_string(), canonical);
        }
    }

    /// Resolve `.sibling` / `..parent.mod` against this module's package.
    fn absolute_module(&self, raw: &str) -> String {
        let level = raw.chars().take_while(|c| *c == '.').count();
        if level == 0 {
            return raw.to_string();
        }
        let rest = &raw[level..];
        let parts: Vec<&str> = self.module.split('.').collect();
        // An `__init__` module is its own package; any other module's package
        // is its parent.
        let package_len = if self.is_package {
            parts.len()
        } else {
            parts.len().saturating_sub(1)
        };
        let keep = package_len.saturating_sub(level - 1);
        let mut segments: Vec<&str> = parts[..keep].to_vec();
        if !rest.is_empty() {
            segments.push(rest);
        }
        segments.join(".")
    }

    fn field_text(&self, node: Node, field: &str) -> Option<&'a str> {
        node.child_by_field_name(field).map(|n| self.text(n))
    }

    fn text(&self, node: Node) -> &'a str {
        node.utf8_text(self.source).unwrap_or_default()
    }
}
