//! Object-code emission from the optimised quadruple stream.
//!
//! The output is a flat pseudo-assembly text: a data section declaring every
//! variable the program mentions, followed by one instruction per quadruple.
//! No instruction selection or register allocation happens here.
use std::fmt::Write;

use crate::il::{Quadruple, QuadrupleKind};
use crate::semantic::{SymbolKind, SymbolTable};

/// Renders the quadruple stream as object code. The symbol table supplies
/// the declared variables for the data section and may be empty.
pub fn emit(quadruples: &[Quadruple], symbols: &SymbolTable) -> String {
    let mut output = String::new();

    let variables = declared_variables(symbols);
    if !variables.is_empty() {
        output.push_str(".data\n");
        for name in variables {
            let _ = writeln!(output, "    {}: 0", name);
        }
    }

    output.push_str(".code\n");
    for quad in quadruples {
        let line = instruction(quad);
        if quad.quadruple_type == QuadrupleKind::Label {
            let _ = writeln!(output, "{}", line);
        } else {
            let _ = writeln!(output, "    {}", line);
        }
    }
    output.push_str("    HALT\n");
    output
}

fn declared_variables(table: &SymbolTable) -> Vec<String> {
    let mut variables: Vec<String> = vec![];
    collect_variables(table, &mut variables);
    variables
}

fn collect_variables(table: &SymbolTable, variables: &mut Vec<String>) {
    for symbol in table.symbols.values() {
        if symbol.symbol_type == SymbolKind::Variable {
            variables.push(symbol.name.clone());
        }
    }
    for child in &table.children {
        collect_variables(child, variables);
    }
}

fn instruction(quad: &Quadruple) -> String {
    let arg1 = quad.arg1.as_deref().unwrap_or("0");
    let arg2 = quad.arg2.as_deref().unwrap_or("0");
    let result = quad.result.as_deref().unwrap_or("_");
    match quad.quadruple_type {
        QuadrupleKind::Assignment => format!("MOV {}, {}", result, arg1),
        QuadrupleKind::Arithmetic => {
            format!("{} {}, {}, {}", arithmetic_mnemonic(&quad.operator), result, arg1, arg2)
        }
        QuadrupleKind::Comparison => {
            format!("{} {}, {}, {}", comparison_mnemonic(&quad.operator), result, arg1, arg2)
        }
        QuadrupleKind::Jump if quad.is_conditional_jump() => {
            format!("JZ {}, {}", arg1, result)
        }
        QuadrupleKind::Jump => format!("JMP {}", result),
        QuadrupleKind::Label => format!("{}:", result),
        QuadrupleKind::Param => format!("PUSH {}", arg1),
        QuadrupleKind::Call => format!("CALL {}", arg1),
        QuadrupleKind::Return => format!("RET {}", quad.arg1.as_deref().unwrap_or(result)),
        QuadrupleKind::Read => format!("IN {}", result),
        QuadrupleKind::Write => format!("OUT {}", arg1),
    }
}

fn arithmetic_mnemonic(operator: &str) -> &'static str {
    match operator {
        "+" => "ADD",
        "-" => "SUB",
        "*" => "MUL",
        "/" => "DIV",
        _ => "OP",
    }
}

fn comparison_mnemonic(operator: &str) -> &'static str {
    match operator {
        ">" => "CGT",
        "<" => "CLT",
        ">=" => "CGE",
        "<=" => "CLE",
        "==" => "CEQ",
        "!=" => "CNE",
        _ => "CMP",
    }
}

#[cfg(test)]
mod tests {
    use crate::il::generate;
    use crate::lexer::lex;
    use crate::parser::parse;
    use crate::semantic::analyze;

    use super::*;

    fn emit_source(source: &str) -> String {
        let (tokens, _) = lex(source);
        let (ast, _) = parse(&tokens);
        let ast = ast.unwrap();
        let table = analyze(&ast).symbol_table;
        let code = generate(&ast, &table);
        emit(&code.quadruples, &table)
    }

    #[test]
    fn assignment_becomes_mov() {
        let object = emit_source("int x = 1;\nprint(x);");
        assert!(object.contains("MOV x, 1"));
        assert!(object.contains("OUT x"));
    }

    #[test]
    fn variables_are_declared_in_the_data_section() {
        let object = emit_source("int x = 1;\nprint(x);");
        assert!(object.contains(".data\n    x: 0"));
    }

    #[test]
    fn labels_are_flush_with_the_margin() {
        let object = emit_source("function main() { print(1); }");
        assert!(object.contains("\nfunc_main:\n"));
        assert!(object.contains("RET 0"));
    }

    #[test]
    fn conditional_jump_becomes_jz() {
        let object = emit_source("int x = 1;\nif (x) { print(x); }");
        assert!(object.contains("JZ x, else_0"));
    }

    #[test]
    fn program_ends_with_halt() {
        let object = emit_source("print(1);");
        assert!(object.trim_end().ends_with("HALT"));
    }
}
