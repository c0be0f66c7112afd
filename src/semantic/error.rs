use std::fmt::{self, Display};

use thiserror::Error;

use crate::ast::DataType;

#[derive(Debug, Error)]
pub enum SemanticErrorKind {
    #[error("'{0}' is already declared in this scope")]
    Redeclaration(String),
    #[error("use of undeclared identifier '{0}'")]
    Undeclared(String),
    #[error("assignment to undeclared variable '{0}'")]
    UndeclaredAssignment(String),
    #[error("cannot initialize '{0}' of type '{1}' with a '{2}' literal")]
    TypeMismatch(String, DataType, DataType),
}

#[derive(Debug, Error)]
pub struct SemanticError {
    pub kind: SemanticErrorKind,
    pub line: u32,
}

impl SemanticError {
    pub fn new(kind: SemanticErrorKind, line: u32) -> Self {
        Self { kind, line }
    }
}

impl Display for SemanticError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} at line {}", self.kind, self.line)
    }
}
