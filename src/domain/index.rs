use std::collections::HashMap;

use crate::domain::ast::{FunctionInfo, ModuleInfo};
use crate::domain::callgraph::FunctionNode;

/// Registry of every declared function and method, keyed by qualified id.
///
/// Built once per analysis run, then only read. Extraction workers share it
/// by reference, so the parallel phase needs no locking.
#[derive(Debug, Default, Clone)]
pub struct FunctionRegistry {
    functions: HashMap<String, FunctionNode>,
}

impl FunctionRegistry {
    /// Register module-scope functions as `module.name` and class methods as
    /// `module.Class.method`. On id collision the later declaration wins.
    pub fn register(modules: &[ModuleInfo]) -> Self {
        let mut functions = HashMap::new();

        for module in modules {
            for func in &module.functions {
                let id = qualify(&[&module.name, &func.name]);
                functions.insert(id.clone(), to_node(id, &module.name, func));
            }
            for class in &module.classes {
                for method in &class.methods {
                    let id = qualify(&[&module.name, &class.name, &method.name]);
                    functions.insert(id.clone(), to_node(id, &module.name, method));
                }
            }
        }

        Self { functions }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.functions.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&FunctionNode> {
        self.functions.get(id)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// All nodes, sorted by id.
    pub fn nodes(&self) -> Vec<FunctionNode> {
        let mut nodes: Vec<FunctionNode> = self.functions.values().cloned().collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        nodes
    }
}

/// Join path segments into a dotted identifier.
pub fn qualify(parts: &[&str]) -> String {
    parts.join(".")
}

fn to_node(id: String, module: &str, func: &FunctionInfo) -> FunctionNode {
    FunctionNode {
        id,
        name: func.name.clone(),
        module: module.to_string(),
        complexity: func.complexity,
        line_number: func.line_number,
        parameters: func.parameters.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ast::ClassInfo;

    fn module_with(name: &str, funcs: &[&str]) -> ModuleInfo {
        let mut module = ModuleInfo::new(name, format!("/src/{}.py", name));
        for (i, f) in funcs.iter().enumerate() {
            module.functions.push(FunctionInfo::new(*f, i + 1));
        }
        module
    }

    #[test]
    fn test_same_name_in_two_modules() {
        let registry = FunctionRegistry::register(&[
            module_with("alpha", &["run"]),
            module_with("beta", &["run"]),
        ]);

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("alpha.run"));
        assert!(registry.contains("beta.run"));
    }

    #[test]
    fn test_method_id_contains_class_and_method() {
        let mut module = module_with("shop", &[]);
        let mut checkout = FunctionInfo::new("checkout", 4);
        checkout.is_method = true;
        checkout.parameters = vec!["self".to_string(), "cart".to_string()];
        module.classes.push(ClassInfo {
            name: "Cart".to_string(),
            line_number: 2,
            methods: vec![checkout],
            bases: vec![],
        });

        let registry = FunctionRegistry::register(&[module]);
        let node = registry.get("shop.Cart.checkout").unwrap();
        assert_eq!(node.name, "checkout");
        assert_eq!(node.module, "shop");
        assert_eq!(node.parameters, vec!["self", "cart"]);
    }

    #[test]
    fn test_later_registration_wins() {
        let mut first = module_with("dup", &["f"]);
        first.functions[0].line_number = 10;
        let mut second = module_with("dup", &["f"]);
        second.functions[0].line_number = 20;

        let registry = FunctionRegistry::register(&[first, second]);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("dup.f").unwrap().line_number, 20);
    }

    #[test]
    fn test_nodes_sorted() {
        let registry = FunctionRegistry::register(&[module_with("m", &["zeta", "alpha", "mid"])]);
        let ids: Vec<String> = registry.nodes().into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec!["m.alpha", "m.mid", "m.zeta"]);
    }
}
