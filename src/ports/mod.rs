use std::path::Path;

use crate::domain::ast::ModuleInfo;
use crate::error::ParseError;

/// Turns one source file into a module description for the graph builder.
pub trait SourceParser: Send + Sync {
    fn parse_module(&self, module_name: &str, path: &Path) -> Result<ModuleInfo, ParseError>;
}
