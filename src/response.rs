//! The request/response model of a compilation run.
use serde::{Deserialize, Serialize};

use crate::ast::AstNode;
use crate::il::Quadruple;
use crate::lexer::Token;
use crate::semantic::SymbolTable;

#[derive(Debug, Clone, Deserialize)]
pub struct CompileRequest {
    pub code: String,
}

/// Everything a compilation run produced. Every field is always present;
/// stages that could not run contribute empty collections, so a consumer can
/// always render partial results.
#[derive(Debug, Serialize)]
pub struct CompileResponse {
    pub success: bool,
    pub tokens: Vec<Token>,
    pub ast: Option<AstNode>,
    pub symbol_table: Option<SymbolTable>,
    pub intermediate_code: Vec<Quadruple>,
    pub optimized_code: Vec<Quadruple>,
    pub optimization_log: Vec<String>,
    pub object_code: String,
    /// Serialized as `"<Stage>|<line>|<message>"`.
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub metrics: Metrics,
}

#[derive(Debug, Default, Serialize)]
pub struct Metrics {
    pub compilation_time: f64,
    pub tokens_count: usize,
    pub ast_nodes_count: usize,
    pub symbols_count: usize,
    pub quadruples_count: usize,
    pub temporals_count: usize,
    pub errors_count: usize,
    pub warnings_count: usize,
    pub optimization_reduction: f64,
}
