//! Scope and declaration analysis over the syntax tree.
use crate::ast::{AstNode, DataType, NodeKind};

use super::error::*;
use super::symbol::*;

pub struct SemanticResult {
    pub symbol_table: SymbolTable,
    pub errors: Vec<SemanticError>,
    pub warnings: Vec<String>,
}

/// Builds the symbol table for a program and collects declaration and type
/// diagnostics. Analysis never aborts: every error is recorded and the walk
/// continues, so downstream stages always receive a table.
pub fn analyze(ast: &AstNode) -> SemanticResult {
    let mut analyzer = Analyzer::new();
    analyzer.visit(ast);
    analyzer.finish()
}

struct Analyzer {
    scopes: Vec<SymbolTable>,
    errors: Vec<SemanticError>,
    warnings: Vec<String>,
}

impl Analyzer {
    fn new() -> Self {
        Self {
            scopes: vec![SymbolTable::default()],
            errors: vec![],
            warnings: vec![],
        }
    }

    fn finish(mut self) -> SemanticResult {
        while self.scopes.len() > 1 {
            self.exit_scope();
        }
        let symbol_table = self.scopes.pop().unwrap_or_default();
        collect_unused(&symbol_table, &mut self.warnings);
        SemanticResult {
            symbol_table,
            errors: self.errors,
            warnings: self.warnings,
        }
    }

    fn visit(&mut self, node: &AstNode) {
        match node.kind {
            NodeKind::Program | NodeKind::Block => self.visit_children(node),
            NodeKind::FunctionDeclaration => self.visit_function(node),
            NodeKind::VariableDeclaration => self.visit_declaration(node),
            NodeKind::Assignment => self.visit_assignment(node),
            NodeKind::IfStatement | NodeKind::WhileStatement => {
                if let Some(condition) = node.children.first() {
                    self.visit_expression(condition);
                }
                for child in node.children.iter().skip(1) {
                    self.visit(child);
                }
            }
            NodeKind::PrintStatement | NodeKind::ReturnStatement => {
                for child in &node.children {
                    self.visit_expression(child);
                }
            }
            _ => self.visit_children(node),
        }
    }

    fn visit_children(&mut self, node: &AstNode) {
        for child in &node.children {
            self.visit(child);
        }
    }

    fn visit_function(&mut self, node: &AstNode) {
        let name = node.value.clone().unwrap_or_else(|| "anon".to_string());
        let line = node.line.unwrap_or(0);
        self.declare(Symbol {
            name: name.clone(),
            symbol_type: SymbolKind::Function,
            data_type: node.data_type.unwrap_or(DataType::Void),
            scope: self.scope_name(),
            line,
            initialized: true,
            used: false,
        });
        self.enter_scope(name);
        self.visit_children(node);
        self.exit_scope();
    }

    fn visit_declaration(&mut self, node: &AstNode) {
        let Some(target) = node.children.first() else {
            return;
        };
        let Some(name) = target.value.clone() else {
            return;
        };
        let line = node.line.unwrap_or(0);
        let data_type = node.data_type.unwrap_or(DataType::Int);
        let initializer = node.children.get(1).filter(|c| c.kind != NodeKind::Empty);

        self.declare(Symbol {
            name: name.clone(),
            symbol_type: SymbolKind::Variable,
            data_type,
            scope: self.scope_name(),
            line,
            initialized: initializer.is_some(),
            used: false,
        });

        if let Some(initializer) = initializer {
            self.visit_expression(initializer);
            self.check_literal(&name, data_type, initializer);
        }
    }

    fn visit_assignment(&mut self, node: &AstNode) {
        let Some(name) = node.children.first().and_then(|t| t.value.clone()) else {
            return;
        };
        let line = node.line.unwrap_or(0);
        let declared = match self.lookup_mut(&name) {
            Some(symbol) => {
                symbol.initialized = true;
                Some(symbol.data_type)
            }
            None => {
                self.errors.push(SemanticError::new(
                    SemanticErrorKind::UndeclaredAssignment(name.clone()),
                    line,
                ));
                None
            }
        };
        if let Some(value) = node.children.get(1) {
            self.visit_expression(value);
            if let Some(data_type) = declared {
                self.check_literal(&name, data_type, value);
            }
        }
    }

    fn visit_expression(&mut self, node: &AstNode) {
        match node.kind {
            NodeKind::Identifier => {
                let Some(name) = node.value.clone() else {
                    return;
                };
                if let Some(symbol) = self.lookup_mut(&name) {
                    symbol.used = true;
                } else {
                    self.errors.push(SemanticError::new(
                        SemanticErrorKind::Undeclared(name),
                        node.line.unwrap_or(0),
                    ));
                }
            }
            NodeKind::Literal | NodeKind::StringLiteral => {}
            _ => {
                for child in &node.children {
                    self.visit_expression(child);
                }
            }
        }
    }

    /// Checks a literal initializer or right-hand side against the declared
    /// type. Mixing int and float is tolerated with a warning; other
    /// mismatches are errors. Compound expressions are not typed here.
    fn check_literal(&mut self, name: &str, declared: DataType, value: &AstNode) {
        let found = match value.kind {
            NodeKind::Literal | NodeKind::StringLiteral => value.data_type,
            _ => None,
        };
        let Some(found) = found else {
            return;
        };
        if found == declared {
            return;
        }
        match (declared, found) {
            (DataType::Int, DataType::Float) | (DataType::Float, DataType::Int) => {
                self.warnings.push(format!(
                    "implicit conversion from {} to {} in '{}' at line {}",
                    found,
                    declared,
                    name,
                    value.line.unwrap_or(0)
                ));
            }
            _ => {
                self.errors.push(SemanticError::new(
                    SemanticErrorKind::TypeMismatch(name.to_string(), declared, found),
                    value.line.unwrap_or(0),
                ));
            }
        }
    }

    fn declare(&mut self, symbol: Symbol) {
        let Some(scope) = self.scopes.last_mut() else {
            return;
        };
        if scope.symbols.contains_key(&symbol.name) {
            self.errors.push(SemanticError::new(
                SemanticErrorKind::Redeclaration(symbol.name.clone()),
                symbol.line,
            ));
            return;
        }
        scope.symbols.insert(symbol.name.clone(), symbol);
    }

    fn lookup_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        self.scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.symbols.get_mut(name))
    }

    fn scope_name(&self) -> String {
        self.scopes
            .last()
            .map(|scope| scope.scope_name.clone())
            .unwrap_or_else(|| "global".to_string())
    }

    fn enter_scope(&mut self, name: String) {
        let level = self.scopes.len() as u32;
        self.scopes.push(SymbolTable::new(name, level));
    }

    fn exit_scope(&mut self) {
        if let Some(scope) = self.scopes.pop() {
            if let Some(parent) = self.scopes.last_mut() {
                parent.children.push(scope);
            } else {
                self.scopes.push(scope);
            }
        }
    }
}

fn collect_unused(table: &SymbolTable, warnings: &mut Vec<String>) {
    for symbol in table.symbols.values() {
        if symbol.symbol_type == SymbolKind::Variable && !symbol.used {
            warnings.push(format!(
                "variable '{}' declared at line {} is never used",
                symbol.name, symbol.line
            ));
        }
    }
    for child in &table.children {
        collect_unused(child, warnings);
    }
}

#[cfg(test)]
mod tests {
    use crate::lexer::lex;
    use crate::parser::parse;

    use super::*;

    fn analyze_source(source: &str) -> SemanticResult {
        let (tokens, _) = lex(source);
        let (ast, _) = parse(&tokens);
        analyze(&ast.unwrap())
    }

    #[test]
    fn declarations_land_in_function_scope() {
        let result = analyze_source("function main() { int x = 1; print(x); }");
        assert!(result.errors.is_empty());
        let main = &result.symbol_table.children[0];
        assert_eq!("main", main.scope_name);
        assert!(main.symbols.contains_key("x"));
        assert!(result.symbol_table.symbols.contains_key("main"));
    }

    #[test]
    fn undeclared_identifier_is_an_error() {
        let result = analyze_source("print(x);");
        assert_eq!(1, result.errors.len());
        assert!(result.errors[0].to_string().contains("undeclared"));
    }

    #[test]
    fn assignment_to_undeclared_variable_is_an_error() {
        let result = analyze_source("x = 1;");
        assert!(matches!(
            result.errors[0].kind,
            SemanticErrorKind::UndeclaredAssignment(_)
        ));
    }

    #[test]
    fn redeclaration_is_an_error() {
        let result = analyze_source("int x; int x;");
        assert!(matches!(
            result.errors[0].kind,
            SemanticErrorKind::Redeclaration(_)
        ));
    }

    #[test]
    fn unused_variable_produces_a_warning() {
        let result = analyze_source("int x = 1;");
        assert!(result.errors.is_empty());
        assert!(result.warnings.iter().any(|w| w.contains("never used")));
    }

    #[test]
    fn string_initializer_for_int_is_a_type_error() {
        let result = analyze_source("int x = \"hola\";");
        assert!(matches!(
            result.errors[0].kind,
            SemanticErrorKind::TypeMismatch(..)
        ));
    }

    #[test]
    fn int_to_float_conversion_is_a_warning() {
        let result = analyze_source("float f = 1; print(f);");
        assert!(result.errors.is_empty());
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("implicit conversion")));
    }

    #[test]
    fn errors_carry_the_source_line() {
        let result = analyze_source("int a = 1;\nprint(b);");
        assert!(result.errors[0].to_string().contains("line 2"));
    }
}
