//! Abstract Syntax Tree definitions
use std::fmt::{self, Display};

use serde::Serialize;

/// A node in the syntax tree.
///
/// The tree is uniform: every construct is a tagged node with an optional
/// textual value and an ordered list of children. This keeps the whole tree
/// serializable as part of a [`crate::response::CompileResponse`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AstNode {
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<AstNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_type: Option<DataType>,
}

impl AstNode {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            value: None,
            children: vec![],
            line: None,
            data_type: None,
        }
    }

    pub fn with_value<S: Into<String>>(kind: NodeKind, value: S) -> Self {
        let mut node = Self::new(kind);
        node.value = Some(value.into());
        node
    }

    pub fn at_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    pub fn typed(mut self, data_type: DataType) -> Self {
        self.data_type = Some(data_type);
        self
    }

    pub fn add_child(&mut self, child: AstNode) {
        self.children.push(child);
    }

    /// Counts this node and all nodes below it.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(AstNode::count).sum::<usize>()
    }
}

impl Display for AstNode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}({})", self.kind, value),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// The closed set of node tags. Kinds without a dedicated lowering rule take
/// the default path: visit children, yield no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NodeKind {
    Program,
    FunctionDeclaration,
    Block,
    VariableDeclaration,
    Assignment,
    BinaryExpression,
    Identifier,
    Literal,
    StringLiteral,
    IfStatement,
    WhileStatement,
    PrintStatement,
    ReturnStatement,
    Empty,
}

impl Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Int,
    Float,
    Bool,
    String,
    Void,
}

impl DataType {
    /// Maps a type keyword to its data type, if the keyword names one.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "int" => Some(Self::Int),
            "float" => Some(Self::Float),
            "bool" => Some(Self::Bool),
            "string" => Some(Self::String),
            "void" => Some(Self::Void),
            _ => None,
        }
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::String => "string",
            Self::Void => "void",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_includes_all_descendants() {
        let mut program = AstNode::new(NodeKind::Program);
        let mut decl = AstNode::new(NodeKind::VariableDeclaration);
        decl.add_child(AstNode::with_value(NodeKind::Identifier, "x"));
        decl.add_child(AstNode::with_value(NodeKind::Literal, "1"));
        program.add_child(decl);

        assert_eq!(4, program.count());
    }

    #[test]
    fn node_kind_serializes_as_tag_name() {
        let json = serde_json::to_value(NodeKind::VariableDeclaration).unwrap();
        assert_eq!("VariableDeclaration", json);
    }
}
