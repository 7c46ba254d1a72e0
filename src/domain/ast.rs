// Module description types for callscope.
// These are produced by a source parser and consumed by the call graph builder.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One parsed source module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleInfo {
    /// Dotted module name, e.g. `pkg.utils`.
    pub name: String,
    /// Absolute path of the module's source file.
    pub path: PathBuf,
    /// Functions declared at module scope, in declaration order.
    pub functions: Vec<FunctionInfo>,
    pub classes: Vec<ClassInfo>,
    pub imports: Vec<ImportInfo>,
}

impl ModuleInfo {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            functions: Vec::new(),
            classes: Vec::new(),
            imports: Vec::new(),
        }
    }

    /// Whether this is a package's `__init__` module.
    pub fn is_package(&self) -> bool {
        self.path.file_name().is_some_and(|f| f == "__init__.py")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub name: String,
    pub line_number: usize,
    pub parameters: Vec<String>,
    pub complexity: u32,
    pub is_async: bool,
    pub is_method: bool,
}

impl FunctionInfo {
    /// A plain synchronous function with complexity 1 and no parameters.
    pub fn new(name: impl Into<String>, line_number: usize) -> Self {
        Self {
            name: name.into(),
            line_number,
            parameters: Vec::new(),
            complexity: 1,
            is_async: false,
            is_method: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassInfo {
    pub name: String,
    pub line_number: usize,
    pub methods: Vec<FunctionInfo>,
    pub bases: Vec<String>,
}

/// `import module [as alias]` or `from module import names`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportInfo {
    pub module: String,
    pub alias: Option<String>,
    pub is_from: bool,
    pub names: Vec<String>,
}
