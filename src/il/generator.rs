//! Lowering of the syntax tree into a quadruple stream.
use log::debug;

use crate::ast::{AstNode, DataType, NodeKind};
use crate::semantic::SymbolTable;

use super::quad::*;

/// Value reference returned by constructs that produce no value.
pub const VOID: &str = "void";
/// Value reference substituted for a missing child node.
pub const NULL: &str = "null";
/// Value reference substituted when a node is too malformed to lower. The
/// sentinel flows through the parent's emission like any other reference, so
/// a degraded subtree never stops its siblings from being lowered.
pub const ERROR: &str = "error_gen";

/// Lowers a syntax tree into three-address code. The symbol table is only
/// consulted for declared return types and may be empty; no validation gates
/// generation, so a stream is produced even for semantically broken input.
pub fn generate(ast: &AstNode, symbols: &SymbolTable) -> IntermediateCode {
    let mut generator = Generator::new(symbols);
    generator.visit(ast);
    debug!(
        "generated {} quadruples ({} temporaries, {} labels)",
        generator.code.quadruples.len(),
        generator.code.temporal_counter,
        generator.code.label_counter
    );
    generator.code
}

struct Generator<'a> {
    symbols: &'a SymbolTable,
    code: IntermediateCode,
}

impl<'a> Generator<'a> {
    fn new(symbols: &'a SymbolTable) -> Self {
        Self {
            symbols,
            code: IntermediateCode::default(),
        }
    }

    /// Visits a node and returns the reference naming its value.
    fn visit(&mut self, node: &AstNode) -> String {
        match node.kind {
            NodeKind::Program | NodeKind::Block => self.visit_children(node),
            NodeKind::FunctionDeclaration => self.visit_function(node),
            NodeKind::VariableDeclaration => self.visit_declaration(node),
            NodeKind::Assignment => self.visit_assignment(node),
            NodeKind::BinaryExpression => self.visit_binary(node),
            NodeKind::Identifier => node
                .value
                .clone()
                .unwrap_or_else(|| "unknown_id".to_string()),
            NodeKind::Literal => node.value.clone().unwrap_or_else(|| "0".to_string()),
            NodeKind::StringLiteral => {
                format!("\"{}\"", node.value.as_deref().unwrap_or(""))
            }
            NodeKind::IfStatement => self.visit_if(node),
            NodeKind::WhileStatement => self.visit_while(node),
            NodeKind::PrintStatement => self.visit_print(node),
            NodeKind::ReturnStatement => self.visit_return(node),
            // Kinds with no lowering rule of their own: visit the children,
            // yield no value.
            NodeKind::Empty => self.visit_children(node),
        }
    }

    fn visit_children(&mut self, node: &AstNode) -> String {
        for child in &node.children {
            self.visit(child);
        }
        VOID.to_string()
    }

    fn visit_child(&mut self, child: Option<&AstNode>) -> String {
        match child {
            Some(child) => self.visit(child),
            None => NULL.to_string(),
        }
    }

    fn visit_function(&mut self, node: &AstNode) -> String {
        let name = node.value.as_deref().unwrap_or("anon").to_string();
        let label = format!("{}{}", FUNCTION_LABEL_PREFIX, name);
        self.emit(QuadrupleKind::Label, "label", None, None, Some(label), node.line);

        if let Some(body) = node.children.first() {
            self.visit(body);
        }

        // Safety-net return for main and for functions declared void.
        if name == "main" || self.returns_void(node, &name) {
            self.emit(
                QuadrupleKind::Return,
                "return",
                None,
                None,
                Some("0".to_string()),
                node.line,
            );
        }
        VOID.to_string()
    }

    fn returns_void(&self, node: &AstNode, name: &str) -> bool {
        if node.data_type == Some(DataType::Void) {
            return true;
        }
        self.symbols
            .find(name)
            .map_or(false, |symbol| symbol.data_type == DataType::Void)
    }

    fn visit_declaration(&mut self, node: &AstNode) -> String {
        let Some(target) = node.children.first() else {
            return VOID.to_string();
        };
        let Some(name) = target.value.clone() else {
            return ERROR.to_string();
        };

        if let Some(initializer) = node.children.get(1) {
            if initializer.kind != NodeKind::Empty {
                let value = self.visit(initializer);
                self.emit(
                    QuadrupleKind::Assignment,
                    "=",
                    Some(value),
                    None,
                    Some(name.clone()),
                    node.line,
                );
            }
        }
        name
    }

    fn visit_assignment(&mut self, node: &AstNode) -> String {
        let Some(target) = node.children.first() else {
            return VOID.to_string();
        };
        let Some(name) = target.value.clone() else {
            return ERROR.to_string();
        };

        if node.children.len() > 1 {
            let value = self.visit(&node.children[1]);
            self.emit(
                QuadrupleKind::Assignment,
                "=",
                Some(value),
                None,
                Some(name.clone()),
                node.line,
            );
            return name;
        }
        VOID.to_string()
    }

    fn visit_binary(&mut self, node: &AstNode) -> String {
        let lhs = self.visit_child(node.children.first());
        let rhs = self.visit_child(node.children.get(1));
        let operator = node.value.clone().unwrap_or_default();

        // Anything that is not a comparison counts as arithmetic, including
        // operators this stage does not recognize.
        let kind = match operator.as_str() {
            ">" | "<" | ">=" | "<=" | "==" | "!=" => QuadrupleKind::Comparison,
            _ => QuadrupleKind::Arithmetic,
        };

        let temporal = self.next_temporal();
        self.emit(
            kind,
            &operator,
            Some(lhs),
            Some(rhs),
            Some(temporal.clone()),
            node.line,
        );
        temporal
    }

    fn visit_if(&mut self, node: &AstNode) -> String {
        if node.children.is_empty() {
            return VOID.to_string();
        }
        let condition = self.visit(&node.children[0]);
        let else_label = self.next_label("else");
        self.emit(
            QuadrupleKind::Jump,
            "if_false",
            Some(condition),
            None,
            Some(else_label.clone()),
            node.line,
        );

        if let Some(then_branch) = node.children.get(1) {
            self.visit(then_branch);
        }

        let has_else = node.children.len() > 2;
        let mut end_label = None;
        if has_else {
            let label = self.next_label("end_if");
            self.emit(
                QuadrupleKind::Jump,
                "goto",
                None,
                None,
                Some(label.clone()),
                node.line,
            );
            end_label = Some(label);
        }

        self.emit(QuadrupleKind::Label, "label", None, None, Some(else_label), node.line);

        if has_else {
            self.visit(&node.children[2]);
            self.emit(QuadrupleKind::Label, "label", None, None, end_label, node.line);
        }
        VOID.to_string()
    }

    fn visit_while(&mut self, node: &AstNode) -> String {
        let start_label = self.next_label("while_start");
        self.emit(
            QuadrupleKind::Label,
            "label",
            None,
            None,
            Some(start_label.clone()),
            node.line,
        );

        if !node.children.is_empty() {
            let condition = self.visit(&node.children[0]);
            let end_label = self.next_label("while_end");
            self.emit(
                QuadrupleKind::Jump,
                "if_false",
                Some(condition),
                None,
                Some(end_label.clone()),
                node.line,
            );

            if let Some(body) = node.children.get(1) {
                self.visit(body);
            }

            self.emit(
                QuadrupleKind::Jump,
                "goto",
                None,
                None,
                Some(start_label),
                node.line,
            );
            self.emit(QuadrupleKind::Label, "label", None, None, Some(end_label), node.line);
        }
        VOID.to_string()
    }

    fn visit_print(&mut self, node: &AstNode) -> String {
        if let Some(argument) = node.children.first() {
            let value = self.visit(argument);
            self.emit(QuadrupleKind::Write, "write", Some(value), None, None, node.line);
        }
        VOID.to_string()
    }

    fn visit_return(&mut self, node: &AstNode) -> String {
        let value = match node.children.first() {
            Some(child) => self.visit(child),
            None => "0".to_string(),
        };
        self.emit(
            QuadrupleKind::Return,
            "return",
            Some(value),
            None,
            None,
            node.line,
        );
        VOID.to_string()
    }

    fn emit(
        &mut self,
        kind: QuadrupleKind,
        operator: &str,
        arg1: Option<String>,
        arg2: Option<String>,
        result: Option<String>,
        line: Option<u32>,
    ) {
        let index = self.code.quadruples.len();
        self.code.quadruples.push(Quadruple {
            index,
            operator: operator.to_string(),
            arg1,
            arg2,
            result,
            quadruple_type: kind,
            line,
        });
    }

    fn next_temporal(&mut self) -> String {
        let temporal = format!("{}{}", TEMP_PREFIX, self.code.temporal_counter);
        self.code.temporal_counter += 1;
        temporal
    }

    fn next_label(&mut self, prefix: &str) -> String {
        let label = format!("{}_{}", prefix, self.code.label_counter);
        self.code.label_counter += 1;
        label
    }
}

#[cfg(test)]
mod tests {
    use crate::lexer::lex;
    use crate::parser::parse;

    use super::*;

    fn generate_source(source: &str) -> IntermediateCode {
        let (tokens, _) = lex(source);
        let (ast, errors) = parse(&tokens);
        assert!(errors.is_empty(), "parse errors: {:?}", errors);
        generate(&ast.unwrap(), &SymbolTable::default())
    }

    macro_rules! assert_generates {
        ($source:expr, $il:expr) => {{
            let code = generate_source($source);
            let lines: Vec<_> = code.quadruples.iter().map(|q| q.to_string()).collect();
            assert_eq!(&$il[..], lines);
        }};
    }

    #[test]
    fn declaration_and_print_generate_tac() {
        assert_generates!(
            "int x = 2 + 3;\nprint(x);",
            ["t0 = 2 + 3", "x = t0", "write x"]
        );
    }

    #[test]
    fn generation_is_deterministic() {
        let (tokens, _) = lex("int a = 1 + 2;\nint b = a * 3;");
        let (ast, _) = parse(&tokens);
        let ast = ast.unwrap();
        let first = generate(&ast, &SymbolTable::default());
        let second = generate(&ast, &SymbolTable::default());
        assert_eq!(first.quadruples, second.quadruples);
        assert_eq!(first.temporal_counter, second.temporal_counter);
    }

    #[test]
    fn indices_match_positions() {
        let code = generate_source("int x = 1 + 2;\nprint(x);");
        for (position, quad) in code.quadruples.iter().enumerate() {
            assert_eq!(position, quad.index);
        }
    }

    #[test]
    fn comparison_operators_get_comparison_kind() {
        let code = generate_source("int x = 1;\nint y = 2;\nint z = 0;\nz = x;\nif (x < y) { print(x); }");
        let comparison = code
            .quadruples
            .iter()
            .find(|q| q.quadruple_type == QuadrupleKind::Comparison)
            .unwrap();
        assert_eq!("<", comparison.operator);
    }

    #[test]
    fn unrecognized_operator_defaults_to_arithmetic() {
        let code = generate_source("bool a = true;\nbool b = false;\nbool c = a && b;");
        let quad = code
            .quadruples
            .iter()
            .find(|q| q.operator == "&&")
            .unwrap();
        assert_eq!(QuadrupleKind::Arithmetic, quad.quadruple_type);
    }

    #[test]
    fn if_without_else_joins_at_else_label() {
        assert_generates!(
            "int x = 1;\nif (x) { print(x); }",
            [
                "x = 1",
                "if_false x goto else_0",
                "write x",
                "else_0:"
            ]
        );
    }

    #[test]
    fn if_with_else_emits_end_label() {
        assert_generates!(
            "int x = 1;\nif (x) { print(1); } else { print(2); }",
            [
                "x = 1",
                "if_false x goto else_0",
                "write 1",
                "goto end_if_1",
                "else_0:",
                "write 2",
                "end_if_1:"
            ]
        );
    }

    #[test]
    fn while_loop_jumps_back_to_start() {
        assert_generates!(
            "int i = 0;\nwhile (i < 3) { i = i + 1; }",
            [
                "i = 0",
                "while_start_0:",
                "t0 = i < 3",
                "if_false t0 goto while_end_1",
                "t1 = i + 1",
                "i = t1",
                "goto while_start_0",
                "while_end_1:"
            ]
        );
    }

    #[test]
    fn main_gets_entry_label_and_implicit_return() {
        assert_generates!(
            "function main() { print(1); }",
            ["func_main:", "write 1", "return 0"]
        );
    }

    #[test]
    fn non_main_function_gets_no_implicit_return_without_void_type() {
        assert_generates!(
            "function helper() { print(1); }",
            ["func_helper:", "write 1"]
        );
    }

    #[test]
    fn void_function_in_symbol_table_gets_implicit_return() {
        use crate::semantic::analyze;
        let (tokens, _) = lex("function helper() { print(1); }");
        let (ast, _) = parse(&tokens);
        let ast = ast.unwrap();
        // The analyzer records functions as void by default.
        let table = analyze(&ast).symbol_table;
        let code = generate(&ast, &table);
        let lines: Vec<_> = code.quadruples.iter().map(|q| q.to_string()).collect();
        assert_eq!(vec!["func_helper:", "write 1", "return 0"], lines);
    }

    #[test]
    fn string_literals_are_quoted() {
        assert_generates!("print(\"hola\");", ["write \"hola\""]);
    }

    #[test]
    fn return_without_value_defaults_to_zero() {
        assert_generates!("return;", ["return 0"]);
    }

    #[test]
    fn label_numbering_is_shared_across_purposes() {
        let code = generate_source(
            "int x = 1;\nif (x) { print(1); }\nwhile (x) { print(2); }",
        );
        let labels: Vec<_> = code
            .quadruples
            .iter()
            .filter(|q| q.quadruple_type == QuadrupleKind::Label)
            .map(|q| q.result.clone().unwrap())
            .collect();
        assert_eq!(vec!["else_0", "while_start_1", "while_end_2"], labels);
    }

    #[test]
    fn malformed_subtree_does_not_stop_siblings() {
        // An assignment whose target has no name cannot be lowered; the
        // sibling print statement must still produce its quadruple.
        let mut program = AstNode::new(NodeKind::Program);
        let mut broken = AstNode::new(NodeKind::Assignment);
        broken.add_child(AstNode::new(NodeKind::Identifier));
        broken.add_child(AstNode::with_value(NodeKind::Literal, "1"));
        program.add_child(broken);
        let mut print = AstNode::new(NodeKind::PrintStatement);
        print.add_child(AstNode::with_value(NodeKind::Literal, "7"));
        program.add_child(print);

        let code = generate(&program, &SymbolTable::default());
        let lines: Vec<_> = code.quadruples.iter().map(|q| q.to_string()).collect();
        assert_eq!(vec!["write 7"], lines);
    }

    #[test]
    fn degraded_child_flows_through_parent_emission() {
        // A binary expression over a nameless identifier still emits, with
        // the sentinel as its operand.
        let mut binary = AstNode::with_value(NodeKind::BinaryExpression, "+");
        let mut broken = AstNode::new(NodeKind::Assignment);
        broken.add_child(AstNode::new(NodeKind::Identifier));
        broken.add_child(AstNode::with_value(NodeKind::Literal, "1"));
        binary.add_child(broken);
        binary.add_child(AstNode::with_value(NodeKind::Literal, "2"));

        let code = generate(&binary, &SymbolTable::default());
        assert_eq!(Some(ERROR.to_string()), code.quadruples[0].arg1);
        assert_eq!(Some("2".to_string()), code.quadruples[0].arg2);
    }

    #[test]
    fn binary_expression_with_missing_operand_uses_null() {
        let mut binary = AstNode::with_value(NodeKind::BinaryExpression, "+");
        binary.add_child(AstNode::with_value(NodeKind::Literal, "1"));

        let code = generate(&binary, &SymbolTable::default());
        assert_eq!(Some("1".to_string()), code.quadruples[0].arg1);
        assert_eq!(Some(NULL.to_string()), code.quadruples[0].arg2);
    }
}
