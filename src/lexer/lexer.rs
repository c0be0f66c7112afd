//! A hand-written character scanner for the source language.
use super::{error::*, tokens::*};

/// Scans the source text into a token stream. Errors do not stop the scan;
/// both the tokens and the errors that were encountered are returned.
pub fn lex(source: &str) -> (Vec<Token>, Vec<LexError>) {
    Lexer::new(source).run()
}

struct Lexer {
    chars: Vec<char>,
    position: usize,
    line: u32,
    column: u32,
    tokens: Vec<Token>,
    errors: Vec<LexError>,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
            tokens: vec![],
            errors: vec![],
        }
    }

    fn run(mut self) -> (Vec<Token>, Vec<LexError>) {
        while let Some(ch) = self.peek() {
            match ch {
                ' ' | '\t' | '\r' | '\n' => {
                    self.advance();
                }
                '/' if self.peek_at(1) == Some('/') => self.skip_comment(),
                '"' => self.string(),
                '\'' => self.char_literal(),
                _ if ch.is_ascii_digit() => self.number(),
                _ if ch.is_alphabetic() || ch == '_' => self.word(),
                '(' | ')' | '{' | '}' | ';' | ',' => {
                    let (line, column) = (self.line, self.column);
                    self.advance();
                    self.push(TokenKind::Delimiter, ch.to_string(), line, column);
                }
                _ => self.operator(ch),
            }
        }
        (self.tokens, self.errors)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.position).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.position + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.position += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn push(&mut self, kind: TokenKind, value: String, line: u32, column: u32) {
        self.tokens.push(Token::new(kind, value, line, column));
    }

    fn skip_comment(&mut self) {
        while let Some(ch) = self.peek() {
            if ch == '\n' {
                break;
            }
            self.advance();
        }
    }

    /// Reads a keyword or identifier.
    fn word(&mut self) {
        let (line, column) = (self.line, self.column);
        let mut word = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                word.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        let kind = if is_keyword(&word) {
            TokenKind::Keyword
        } else {
            TokenKind::Identifier
        };
        self.push(kind, word, line, column);
    }

    /// Reads an integer or decimal literal. A trailing dot only counts as a
    /// decimal point when a digit follows it.
    fn number(&mut self) {
        let (line, column) = (self.line, self.column);
        let mut number = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                number.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        let mut kind = TokenKind::Integer;
        if self.peek() == Some('.') && self.peek_at(1).map_or(false, |c| c.is_ascii_digit()) {
            kind = TokenKind::Float;
            number.push('.');
            self.advance();
            while let Some(ch) = self.peek() {
                if ch.is_ascii_digit() {
                    number.push(ch);
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.push(kind, number, line, column);
    }

    /// Reads a double-quoted string literal. The quotes are not part of the
    /// token value.
    fn string(&mut self) {
        let (line, column) = (self.line, self.column);
        self.advance();
        let mut text = String::new();
        loop {
            match self.peek() {
                Some('"') => {
                    self.advance();
                    self.push(TokenKind::String, text, line, column);
                    return;
                }
                Some('\n') | None => {
                    self.errors
                        .push(LexError::new(LexErrorKind::UnterminatedString, line));
                    return;
                }
                Some(ch) => {
                    text.push(ch);
                    self.advance();
                }
            }
        }
    }

    fn char_literal(&mut self) {
        let (line, column) = (self.line, self.column);
        self.advance();
        let mut text = String::new();
        loop {
            match self.peek() {
                Some('\'') => {
                    self.advance();
                    self.push(TokenKind::Char, text, line, column);
                    return;
                }
                Some('\n') | None => {
                    self.errors
                        .push(LexError::new(LexErrorKind::UnterminatedChar, line));
                    return;
                }
                Some(ch) => {
                    text.push(ch);
                    self.advance();
                }
            }
        }
    }

    fn operator(&mut self, first: char) {
        let (line, column) = (self.line, self.column);
        let two = self
            .peek_at(1)
            .map(|second| format!("{}{}", first, second));
        if let Some(two) = two {
            if matches!(two.as_str(), "==" | "!=" | "<=" | ">=" | "&&" | "||") {
                self.advance();
                self.advance();
                self.push(TokenKind::Operator, two, line, column);
                return;
            }
        }
        if matches!(first, '+' | '-' | '*' | '/' | '=' | '<' | '>' | '!') {
            self.advance();
            self.push(TokenKind::Operator, first.to_string(), line, column);
        } else {
            self.advance();
            self.errors
                .push(LexError::new(LexErrorKind::UnknownCharacter(first), line));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let (tokens, errors) = lex(source);
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn declaration_produces_expected_kinds() {
        assert_eq!(
            vec![
                TokenKind::Keyword,
                TokenKind::Identifier,
                TokenKind::Operator,
                TokenKind::Integer,
                TokenKind::Operator,
                TokenKind::Integer,
                TokenKind::Delimiter,
            ],
            kinds("int x = 2 + 3;")
        );
    }

    #[test]
    fn float_and_string_literals_are_recognized() {
        let (tokens, _) = lex("float pi = 3.1416; string s = \"hola\";");
        assert_eq!(TokenKind::Float, tokens[3].kind);
        assert_eq!("3.1416", tokens[3].value);
        let text = tokens.iter().find(|t| t.kind == TokenKind::String).unwrap();
        assert_eq!("hola", text.value);
    }

    #[test]
    fn line_and_column_are_tracked() {
        let (tokens, _) = lex("int x;\nx = 1;");
        let assign = tokens.iter().find(|t| t.is_operator("=")).unwrap();
        assert_eq!(2, assign.line);
        assert_eq!(3, assign.column);
    }

    #[test]
    fn comments_are_skipped() {
        let (tokens, _) = lex("// nothing here\nint x;");
        assert_eq!("int", tokens[0].value);
        assert_eq!(2, tokens[0].line);
    }

    #[test]
    fn unknown_character_is_reported_and_scanning_continues() {
        let (tokens, errors) = lex("int @x = 1;");
        assert_eq!(1, errors.len());
        assert!(errors[0].to_string().contains("line 1"));
        assert!(tokens.iter().any(|t| t.value == "x"));
    }

    #[test]
    fn unterminated_string_is_reported() {
        let (_, errors) = lex("string s = \"abierta;\n");
        assert!(matches!(
            errors[0].kind,
            LexErrorKind::UnterminatedString
        ));
    }

    #[test]
    fn two_character_operators_are_single_tokens() {
        let (tokens, _) = lex("a <= b == c && d");
        let operators: Vec<_> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Operator)
            .map(|t| t.value.clone())
            .collect();
        assert_eq!(vec!["<=", "==", "&&"], operators);
    }
}
