use std::fmt::{self, Display};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseErrorKind {
    #[error("unexpected token '{0}'")]
    UnexpectedToken(String),
    #[error("expected {expected}, found '{found}'")]
    Expected { expected: String, found: String },
    #[error("unexpected end of input")]
    UnexpectedEnd,
}

#[derive(Debug, Error)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub line: u32,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, line: u32) -> Self {
        Self { kind, line }
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} at line {}", self.kind, self.line)
    }
}
