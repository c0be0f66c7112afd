//! Recursive-descent parsing into the generic syntax tree.
use crate::ast::{AstNode, DataType, NodeKind};
use crate::lexer::{Token, TokenKind};

use super::error::*;

type ParseResult<T> = Result<T, ParseError>;

/// Parses a token stream into a syntax tree. Errors are recovered at
/// statement boundaries, so a partial tree is returned alongside whatever
/// errors were found.
pub fn parse(tokens: &[Token]) -> (Option<AstNode>, Vec<ParseError>) {
    Parser::new(tokens).run()
}

struct Parser<'t> {
    tokens: &'t [Token],
    position: usize,
    errors: Vec<ParseError>,
}

impl<'t> Parser<'t> {
    fn new(tokens: &'t [Token]) -> Self {
        Self {
            tokens,
            position: 0,
            errors: vec![],
        }
    }

    fn run(mut self) -> (Option<AstNode>, Vec<ParseError>) {
        let mut program = AstNode::new(NodeKind::Program).at_line(1);
        while !self.finished() {
            match self.item() {
                Ok(node) => program.add_child(node),
                Err(error) => {
                    self.errors.push(error);
                    self.synchronize();
                }
            }
        }
        (Some(program), self.errors)
    }

    fn item(&mut self) -> ParseResult<AstNode> {
        if self.peek().map_or(false, |t| t.is_keyword("function")) {
            self.function_declaration()
        } else {
            self.statement()
        }
    }

    fn function_declaration(&mut self) -> ParseResult<AstNode> {
        let line = self.current_line();
        self.expect_keyword("function")?;
        let name = self.expect_identifier()?;
        self.expect_delimiter("(")?;
        self.expect_delimiter(")")?;
        let body = self.block()?;

        let mut node = AstNode::with_value(NodeKind::FunctionDeclaration, name).at_line(line);
        node.add_child(body);
        Ok(node)
    }

    fn statement(&mut self) -> ParseResult<AstNode> {
        let token = self.peek().ok_or_else(|| self.end_of_input())?;
        match token.kind {
            TokenKind::Keyword => match token.value.as_str() {
                "int" | "float" | "bool" | "string" | "char" => self.variable_declaration(),
                "if" => self.if_statement(),
                "while" => self.while_statement(),
                "print" => self.print_statement(),
                "return" => self.return_statement(),
                _ => Err(self.unexpected(token)),
            },
            TokenKind::Identifier => self.assignment(),
            TokenKind::Delimiter if token.value == "{" => self.block(),
            _ => Err(self.unexpected(token)),
        }
    }

    fn variable_declaration(&mut self) -> ParseResult<AstNode> {
        let line = self.current_line();
        let type_token = self.advance().ok_or_else(|| self.end_of_input())?;
        let data_type = DataType::from_keyword(&type_token.value).unwrap_or(DataType::Int);
        let name = self.expect_identifier()?;

        let mut node = AstNode::with_value(NodeKind::VariableDeclaration, type_token.value.clone())
            .at_line(line)
            .typed(data_type);
        node.add_child(AstNode::with_value(NodeKind::Identifier, name).at_line(line));

        if self.peek().map_or(false, |t| t.is_operator("=")) {
            self.advance();
            node.add_child(self.expression()?);
        } else {
            node.add_child(AstNode::new(NodeKind::Empty).at_line(line));
        }
        self.expect_delimiter(";")?;
        Ok(node)
    }

    fn assignment(&mut self) -> ParseResult<AstNode> {
        let line = self.current_line();
        let name = self.expect_identifier()?;
        self.expect_operator("=")?;
        let value = self.expression()?;
        self.expect_delimiter(";")?;

        let mut node = AstNode::new(NodeKind::Assignment).at_line(line);
        node.add_child(AstNode::with_value(NodeKind::Identifier, name).at_line(line));
        node.add_child(value);
        Ok(node)
    }

    fn if_statement(&mut self) -> ParseResult<AstNode> {
        let line = self.current_line();
        self.expect_keyword("if")?;
        self.expect_delimiter("(")?;
        let condition = self.expression()?;
        self.expect_delimiter(")")?;
        let then_block = self.block()?;

        let mut node = AstNode::new(NodeKind::IfStatement).at_line(line);
        node.add_child(condition);
        node.add_child(then_block);
        if self.peek().map_or(false, |t| t.is_keyword("else")) {
            self.advance();
            node.add_child(self.block()?);
        }
        Ok(node)
    }

    fn while_statement(&mut self) -> ParseResult<AstNode> {
        let line = self.current_line();
        self.expect_keyword("while")?;
        self.expect_delimiter("(")?;
        let condition = self.expression()?;
        self.expect_delimiter(")")?;
        let body = self.block()?;

        let mut node = AstNode::new(NodeKind::WhileStatement).at_line(line);
        node.add_child(condition);
        node.add_child(body);
        Ok(node)
    }

    fn print_statement(&mut self) -> ParseResult<AstNode> {
        let line = self.current_line();
        self.expect_keyword("print")?;
        self.expect_delimiter("(")?;
        let argument = self.expression()?;
        self.expect_delimiter(")")?;
        self.expect_delimiter(";")?;

        let mut node = AstNode::new(NodeKind::PrintStatement).at_line(line);
        node.add_child(argument);
        Ok(node)
    }

    fn return_statement(&mut self) -> ParseResult<AstNode> {
        let line = self.current_line();
        self.expect_keyword("return")?;
        let mut node = AstNode::new(NodeKind::ReturnStatement).at_line(line);
        if !self.peek().map_or(true, |t| t.is_delimiter(";")) {
            node.add_child(self.expression()?);
        }
        self.expect_delimiter(";")?;
        Ok(node)
    }

    fn block(&mut self) -> ParseResult<AstNode> {
        let line = self.current_line();
        self.expect_delimiter("{")?;
        let mut node = AstNode::new(NodeKind::Block).at_line(line);
        while !self.peek().map_or(true, |t| t.is_delimiter("}")) {
            match self.statement() {
                Ok(statement) => node.add_child(statement),
                Err(error) => {
                    self.errors.push(error);
                    self.synchronize();
                    if self.finished() {
                        break;
                    }
                }
            }
        }
        self.expect_delimiter("}")?;
        Ok(node)
    }

    /// Parses an expression by precedence climbing. All binary operators are
    /// left-associative.
    fn expression(&mut self) -> ParseResult<AstNode> {
        self.binary_expression(0)
    }

    fn binary_expression(&mut self, min_precedence: u8) -> ParseResult<AstNode> {
        let mut lhs = self.primary()?;
        loop {
            let Some(operator) = self.peek_binary_operator() else {
                break;
            };
            let Some(precedence) = binding_power(&operator) else {
                break;
            };
            if precedence < min_precedence {
                break;
            }
            let line = self.current_line();
            self.advance();
            let rhs = self.binary_expression(precedence + 1)?;

            let mut node =
                AstNode::with_value(NodeKind::BinaryExpression, operator).at_line(line);
            node.add_child(lhs);
            node.add_child(rhs);
            lhs = node;
        }
        Ok(lhs)
    }

    fn primary(&mut self) -> ParseResult<AstNode> {
        let token = self.advance().ok_or_else(|| self.end_of_input())?.clone();
        let line = token.line;
        match token.kind {
            TokenKind::Integer => Ok(AstNode::with_value(NodeKind::Literal, token.value)
                .at_line(line)
                .typed(DataType::Int)),
            TokenKind::Float => Ok(AstNode::with_value(NodeKind::Literal, token.value)
                .at_line(line)
                .typed(DataType::Float)),
            TokenKind::String | TokenKind::Char => {
                Ok(AstNode::with_value(NodeKind::StringLiteral, token.value)
                    .at_line(line)
                    .typed(DataType::String))
            }
            TokenKind::Keyword if token.value == "true" || token.value == "false" => {
                Ok(AstNode::with_value(NodeKind::Literal, token.value)
                    .at_line(line)
                    .typed(DataType::Bool))
            }
            TokenKind::Identifier => {
                Ok(AstNode::with_value(NodeKind::Identifier, token.value).at_line(line))
            }
            TokenKind::Operator if token.value == "-" => self.negative_literal(line),
            TokenKind::Delimiter if token.value == "(" => {
                let inner = self.expression()?;
                self.expect_delimiter(")")?;
                Ok(inner)
            }
            _ => Err(self.unexpected(&token)),
        }
    }

    /// A minus sign directly before a numeric literal folds into the literal.
    fn negative_literal(&mut self, line: u32) -> ParseResult<AstNode> {
        let token = self.advance().ok_or_else(|| self.end_of_input())?.clone();
        match token.kind {
            TokenKind::Integer => Ok(AstNode::with_value(
                NodeKind::Literal,
                format!("-{}", token.value),
            )
            .at_line(line)
            .typed(DataType::Int)),
            TokenKind::Float => Ok(AstNode::with_value(
                NodeKind::Literal,
                format!("-{}", token.value),
            )
            .at_line(line)
            .typed(DataType::Float)),
            _ => Err(self.unexpected(&token)),
        }
    }

    /// Skips ahead to the next statement boundary after an error.
    fn synchronize(&mut self) {
        while let Some(token) = self.peek() {
            if token.is_delimiter("}") {
                return;
            }
            let at_boundary = token.is_delimiter(";");
            self.position += 1;
            if at_boundary {
                return;
            }
        }
    }

    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.position)
    }

    fn peek_binary_operator(&self) -> Option<String> {
        let token = self.peek()?;
        if token.kind == TokenKind::Operator && token.value != "=" {
            Some(token.value.clone())
        } else {
            None
        }
    }

    fn advance(&mut self) -> Option<&'t Token> {
        let token = self.tokens.get(self.position)?;
        self.position += 1;
        Some(token)
    }

    fn finished(&self) -> bool {
        self.position >= self.tokens.len()
    }

    fn current_line(&self) -> u32 {
        self.peek()
            .map(|t| t.line)
            .or_else(|| self.tokens.last().map(|t| t.line))
            .unwrap_or(0)
    }

    fn expect_identifier(&mut self) -> ParseResult<String> {
        match self.peek() {
            Some(token) if token.kind == TokenKind::Identifier => {
                let name = token.value.clone();
                self.advance();
                Ok(name)
            }
            Some(token) => Err(self.expected("an identifier", token)),
            None => Err(self.end_of_input()),
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> ParseResult<()> {
        match self.peek() {
            Some(token) if token.is_keyword(keyword) => {
                self.advance();
                Ok(())
            }
            Some(token) => Err(self.expected(&format!("'{}'", keyword), token)),
            None => Err(self.end_of_input()),
        }
    }

    fn expect_operator(&mut self, operator: &str) -> ParseResult<()> {
        match self.peek() {
            Some(token) if token.is_operator(operator) => {
                self.advance();
                Ok(())
            }
            Some(token) => Err(self.expected(&format!("'{}'", operator), token)),
            None => Err(self.end_of_input()),
        }
    }

    fn expect_delimiter(&mut self, delimiter: &str) -> ParseResult<()> {
        match self.peek() {
            Some(token) if token.is_delimiter(delimiter) => {
                self.advance();
                Ok(())
            }
            Some(token) => Err(self.expected(&format!("'{}'", delimiter), token)),
            None => Err(self.end_of_input()),
        }
    }

    fn expected(&self, expected: &str, found: &Token) -> ParseError {
        ParseError::new(
            ParseErrorKind::Expected {
                expected: expected.to_string(),
                found: found.value.clone(),
            },
            found.line,
        )
    }

    fn unexpected(&self, token: &Token) -> ParseError {
        ParseError::new(ParseErrorKind::UnexpectedToken(token.value.clone()), token.line)
    }

    fn end_of_input(&self) -> ParseError {
        let line = self.tokens.last().map(|t| t.line).unwrap_or(0);
        ParseError::new(ParseErrorKind::UnexpectedEnd, line)
    }
}

/// Binding powers for the binary operators; higher binds tighter.
fn binding_power(operator: &str) -> Option<u8> {
    let precedence = match operator {
        "||" => 1,
        "&&" => 2,
        "==" | "!=" => 3,
        "<" | ">" | "<=" | ">=" => 4,
        "+" | "-" => 5,
        "*" | "/" => 6,
        _ => return None,
    };
    Some(precedence)
}

#[cfg(test)]
mod tests {
    use crate::lexer::lex;

    use super::*;

    fn parse_source(source: &str) -> (AstNode, Vec<ParseError>) {
        let (tokens, lex_errors) = lex(source);
        assert!(lex_errors.is_empty());
        let (ast, errors) = parse(&tokens);
        (ast.unwrap(), errors)
    }

    #[test]
    fn declaration_with_initializer() {
        let (program, errors) = parse_source("int x = 2 + 3;");
        assert!(errors.is_empty());
        let decl = &program.children[0];
        assert_eq!(NodeKind::VariableDeclaration, decl.kind);
        assert_eq!(Some(DataType::Int), decl.data_type);
        assert_eq!(NodeKind::Identifier, decl.children[0].kind);
        assert_eq!(NodeKind::BinaryExpression, decl.children[1].kind);
        assert_eq!(Some("+".to_string()), decl.children[1].value);
    }

    #[test]
    fn declaration_without_initializer_has_empty_child() {
        let (program, _) = parse_source("int x;");
        assert_eq!(NodeKind::Empty, program.children[0].children[1].kind);
    }

    #[test]
    fn precedence_groups_multiplication_first() {
        let (program, _) = parse_source("int x = 1 + 2 * 3;");
        let sum = &program.children[0].children[1];
        assert_eq!(Some("+".to_string()), sum.value);
        assert_eq!(Some("*".to_string()), sum.children[1].value);
    }

    #[test]
    fn if_with_else_has_three_children() {
        let (program, errors) =
            parse_source("if (x > 0) { print(x); } else { print(0); }");
        assert!(errors.is_empty());
        let if_stmt = &program.children[0];
        assert_eq!(NodeKind::IfStatement, if_stmt.kind);
        assert_eq!(3, if_stmt.children.len());
    }

    #[test]
    fn while_loop_has_condition_and_body() {
        let (program, _) = parse_source("while (i < 10) { i = i + 1; }");
        let while_stmt = &program.children[0];
        assert_eq!(NodeKind::WhileStatement, while_stmt.kind);
        assert_eq!(2, while_stmt.children.len());
        assert_eq!(NodeKind::Block, while_stmt.children[1].kind);
    }

    #[test]
    fn function_declaration_wraps_body_block() {
        let (program, errors) = parse_source("function main() { return 0; }");
        assert!(errors.is_empty());
        let function = &program.children[0];
        assert_eq!(NodeKind::FunctionDeclaration, function.kind);
        assert_eq!(Some("main".to_string()), function.value);
        assert_eq!(NodeKind::Block, function.children[0].kind);
    }

    #[test]
    fn negative_literal_folds_into_one_node() {
        let (program, _) = parse_source("int x = -5;");
        let literal = &program.children[0].children[1];
        assert_eq!(NodeKind::Literal, literal.kind);
        assert_eq!(Some("-5".to_string()), literal.value);
    }

    #[test]
    fn error_recovery_keeps_sibling_statements() {
        let (program, errors) = parse_source("int = 1;\nprint(2);");
        assert!(!errors.is_empty());
        assert!(program
            .children
            .iter()
            .any(|c| c.kind == NodeKind::PrintStatement));
    }

    #[test]
    fn statement_lines_are_recorded() {
        let (program, _) = parse_source("int x;\nprint(1);");
        assert_eq!(Some(2), program.children[1].line);
    }
}
