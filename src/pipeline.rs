//! The compilation pipeline.
//!
//! Stages run in a fixed order and each one is gated only on the minimum
//! artifact it needs: tokens for the parser, a tree for the analyzer and the
//! generator, a non-empty stream for the optimiser and the emitter. A failed
//! stage contributes its diagnostics and empty output; it never aborts the
//! stages behind it.
use std::time::Instant;

use log::debug;
use regex::Regex;

use crate::response::{CompileResponse, Metrics};
use crate::semantic::SymbolTable;
use crate::{codegen, il, lexer, parser, semantic};

/// Stage names used when serializing errors.
const STAGE_LEXICAL: &str = "Lexical";
const STAGE_SYNTACTIC: &str = "Syntactic";
const STAGE_SEMANTIC: &str = "Semantic";
const STAGE_GENERATION: &str = "Generation";

/// Matches "line N" in a rendered error message, in either of the two
/// spellings diagnostics have historically used.
const LINE_PATTERN: &str = r"(?i)(?:l[ií]nea|line)\s*:?\s*(\d+)";

/// Compiles a source text through every stage.
pub fn compile(source: &str) -> CompileResponse {
    compile_with(source, true)
}

/// Compiles a source text, optionally skipping the optimiser.
pub fn compile_with(source: &str, optimise: bool) -> CompileResponse {
    let started = Instant::now();
    let mut warnings: Vec<String> = vec![];

    let (tokens, lex_errors) = lexer::lex(source);
    debug!("lexical analysis produced {} tokens", tokens.len());

    let (ast, parse_errors) = if tokens.is_empty() {
        (None, vec![])
    } else {
        parser::parse(&tokens)
    };

    let mut semantic_errors = vec![];
    let mut symbol_table = None;
    if let Some(ast) = &ast {
        let result = semantic::analyze(ast);
        semantic_errors = result.errors;
        warnings.extend(result.warnings);
        symbol_table = Some(result.symbol_table);
    }

    // Generation runs whenever a tree exists, even a semantically broken
    // one: partial feedback beats a silent stage.
    let empty_table = SymbolTable::default();
    let intermediate = match &ast {
        Some(ast) => il::generate(ast, symbol_table.as_ref().unwrap_or(&empty_table)),
        None => Default::default(),
    };

    let mut optimization_reduction = 0.0;
    let (optimized, optimization_log) = if intermediate.quadruples.is_empty() {
        (vec![], vec![])
    } else if optimise {
        let (optimized, log) = il::optimise(&intermediate.quadruples);
        let original = intermediate.quadruples.len();
        if original > 0 {
            optimization_reduction =
                (original - optimized.len()) as f64 / original as f64 * 100.0;
        }
        (optimized, log)
    } else {
        debug!("optimisation disabled; passing the stream through unchanged");
        (intermediate.quadruples.clone(), vec![])
    };

    // A handler that could not lower its node leaves the error sentinel in
    // the stream; report each occurrence instead of hiding it.
    let generation_errors: Vec<String> = intermediate
        .quadruples
        .iter()
        .filter(|quad| {
            [&quad.arg1, &quad.arg2, &quad.result]
                .into_iter()
                .any(|operand| operand.as_deref() == Some(il::ERROR))
        })
        .map(|quad| {
            format!(
                "could not lower a malformed node at line {}; quadruple {} carries the error sentinel",
                quad.line.unwrap_or(0),
                quad.index
            )
        })
        .collect();
    let object_code = if optimized.is_empty() && intermediate.quadruples.is_empty() {
        String::new()
    } else {
        let stream = if optimized.is_empty() {
            &intermediate.quadruples
        } else {
            &optimized
        };
        codegen::emit(stream, symbol_table.as_ref().unwrap_or(&empty_table))
    };

    let mut errors = vec![];
    let line_pattern = Regex::new(LINE_PATTERN).ok();
    serialize_errors(
        &mut errors,
        line_pattern.as_ref(),
        lex_errors.iter().map(ToString::to_string),
        STAGE_LEXICAL,
    );
    serialize_errors(
        &mut errors,
        line_pattern.as_ref(),
        parse_errors.iter().map(ToString::to_string),
        STAGE_SYNTACTIC,
    );
    serialize_errors(
        &mut errors,
        line_pattern.as_ref(),
        semantic_errors.iter().map(ToString::to_string),
        STAGE_SEMANTIC,
    );
    serialize_errors(
        &mut errors,
        line_pattern.as_ref(),
        generation_errors.into_iter(),
        STAGE_GENERATION,
    );

    let metrics = Metrics {
        compilation_time: started.elapsed().as_secs_f64() * 1000.0,
        tokens_count: tokens.len(),
        ast_nodes_count: ast.as_ref().map_or(0, |ast| ast.count()),
        symbols_count: symbol_table.as_ref().map_or(0, |table| table.count()),
        quadruples_count: intermediate.quadruples.len(),
        temporals_count: intermediate.temporal_counter,
        errors_count: errors.len(),
        warnings_count: warnings.len(),
        optimization_reduction,
    };

    CompileResponse {
        success: errors.is_empty(),
        tokens,
        ast,
        symbol_table,
        intermediate_code: intermediate.quadruples,
        optimized_code: optimized,
        optimization_log,
        object_code,
        errors,
        warnings,
        metrics,
    }
}

/// Serializes raw stage errors as `"<Stage>|<line>|<message>"`, scanning
/// each message for a line reference. Messages without one get line 0.
fn serialize_errors(
    serialized: &mut Vec<String>,
    line_pattern: Option<&Regex>,
    messages: impl Iterator<Item = String>,
    stage: &str,
) {
    for message in messages {
        let line = extract_line(line_pattern, &message);
        serialized.push(format!("{}|{}|{}", stage, line, message));
    }
}

fn extract_line(pattern: Option<&Regex>, message: &str) -> u32 {
    pattern
        .and_then(|pattern| pattern.captures(message))
        .and_then(|captures| captures.get(1))
        .and_then(|group| group.as_str().parse().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_to_end_constant_program_reduces_to_assignment_and_write() {
        let response = compile("int x = 2 + 3;\nprint(x);");
        assert!(response.success, "errors: {:?}", response.errors);

        let lines: Vec<_> = response
            .optimized_code
            .iter()
            .map(|q| q.to_string())
            .collect();
        assert_eq!(vec!["x = 5", "write 5"], lines);
        assert_eq!(3, response.intermediate_code.len());
        assert!(response.metrics.optimization_reduction > 0.0);
    }

    #[test]
    fn empty_source_compiles_to_empty_response() {
        let response = compile("");
        assert!(response.success);
        assert!(response.tokens.is_empty());
        assert!(response.intermediate_code.is_empty());
        assert!(response.optimized_code.is_empty());
        assert!(response.object_code.is_empty());
        assert_eq!(0, response.metrics.quadruples_count);
    }

    #[test]
    fn lexical_errors_are_serialized_with_stage_and_line() {
        let response = compile("int x = 1;\nint @y = 2;");
        assert!(!response.success);
        let error = response
            .errors
            .iter()
            .find(|e| e.starts_with("Lexical|"))
            .unwrap();
        assert!(error.starts_with("Lexical|2|"), "got {}", error);
    }

    #[test]
    fn semantic_errors_do_not_stop_code_generation() {
        // `y` is undeclared, still the stream and the object code exist.
        let response = compile("print(y);");
        assert!(!response.success);
        assert!(response.errors.iter().any(|e| e.starts_with("Semantic|")));
        assert_eq!(1, response.intermediate_code.len());
        assert!(!response.object_code.is_empty());
    }

    #[test]
    fn metrics_count_stage_outputs() {
        let response = compile("int x = 2 + 3;\nprint(x);");
        assert_eq!(response.tokens.len(), response.metrics.tokens_count);
        assert_eq!(1, response.metrics.temporals_count);
        assert_eq!(1, response.metrics.symbols_count);
        assert!(response.metrics.ast_nodes_count > 0);
        assert!(response.metrics.compilation_time >= 0.0);
    }

    #[test]
    fn disabling_optimisation_passes_the_stream_through() {
        let response = compile_with("int x = 2 + 3;\nprint(x);", false);
        assert_eq!(response.intermediate_code, response.optimized_code);
        assert!(response.optimization_log.is_empty());
        assert_eq!(0.0, response.metrics.optimization_reduction);
    }

    #[test]
    fn line_extraction_accepts_both_spellings() {
        let pattern = Regex::new(LINE_PATTERN).ok();
        assert_eq!(
            3,
            extract_line(pattern.as_ref(), "unexpected token ';' at line 3")
        );
        assert_eq!(
            7,
            extract_line(pattern.as_ref(), "error de sintaxis en línea 7")
        );
        assert_eq!(4, extract_line(pattern.as_ref(), "Linea: 4 problema"));
        assert_eq!(0, extract_line(pattern.as_ref(), "no location at all"));
    }

    #[test]
    fn warnings_are_separate_from_errors() {
        let response = compile("int x = 1;");
        assert!(response.success);
        assert!(response.warnings.iter().any(|w| w.contains("never used")));
        assert_eq!(
            response.warnings.len(),
            response.metrics.warnings_count
        );
    }

    #[test]
    fn parse_errors_keep_downstream_stages_running_on_the_partial_tree() {
        let response = compile("int = 5;\nprint(3);");
        assert!(response
            .errors
            .iter()
            .any(|e| e.starts_with("Syntactic|1|")));
        let lines: Vec<_> = response
            .optimized_code
            .iter()
            .map(|q| q.to_string())
            .collect();
        assert_eq!(vec!["write 3"], lines);
    }

    #[test]
    fn response_serializes_with_all_fields_present() {
        let response = compile("print(1);");
        let json = serde_json::to_value(&response).unwrap();
        for field in [
            "success",
            "tokens",
            "ast",
            "symbol_table",
            "intermediate_code",
            "optimized_code",
            "optimization_log",
            "object_code",
            "errors",
            "warnings",
            "metrics",
        ] {
            assert!(json.get(field).is_some(), "missing field {}", field);
        }
        assert_eq!("write", json["optimized_code"][0]["operator"]);
        assert_eq!("write", json["optimized_code"][0]["quadruple_type"]);
    }
}
