use std::fmt::{self, Display};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LexErrorKind {
    #[error("unknown character '{0}'")]
    UnknownCharacter(char),
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unterminated character literal")]
    UnterminatedChar,
}

/// An error produced while scanning. Rendered messages name the source line
/// so the orchestrator can serialize them with a location.
#[derive(Debug, Error)]
pub struct LexError {
    pub kind: LexErrorKind,
    pub line: u32,
}

impl LexError {
    pub fn new(kind: LexErrorKind, line: u32) -> Self {
        Self { kind, line }
    }
}

impl Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} at line {}", self.kind, self.line)
    }
}
