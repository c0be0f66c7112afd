use std::fs;
use std::io::{self, Read};

use anyhow::Result;
use clap::Parser;

mod ast;
mod codegen;
mod commandline;
mod il;
mod lexer;
mod parser;
mod pipeline;
mod response;
mod semantic;

use commandline::{Operation, Options, OutputOptions};
use response::{CompileRequest, CompileResponse};

fn main() -> Result<()> {
    let options = Options::parse();
    stderrlog::new()
        .verbosity(options.verbose)
        .init()?;

    match options.operation {
        Operation::Check { file } => check(&file),
        Operation::Compile { file, output } => compile(&file, &output),
        Operation::Request => request(),
    }
}

/// The stdin/stdout analogue of a compile endpoint: one request in, one
/// response out.
fn request() -> Result<()> {
    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;
    let request: CompileRequest = serde_json::from_str(&input)?;
    let response = pipeline::compile(&request.code);
    println!("{}", serde_json::to_string(&response)?);
    Ok(())
}

fn check(file: &str) -> Result<()> {
    let source = fs::read_to_string(file)?;
    let response = pipeline::compile(&source);
    print_diagnostics(&response);
    if response.success {
        println!("no errors found");
    }
    Ok(())
}

fn compile(file: &str, output: &OutputOptions) -> Result<()> {
    let source = fs::read_to_string(file)?;
    let response = pipeline::compile_with(&source, output.optimise());

    if output.json() {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    print_diagnostics(&response);

    println!("intermediate code ({} quadruples):", response.intermediate_code.len());
    for quad in &response.intermediate_code {
        println!("    {}", quad);
    }

    println!("optimized code ({} quadruples):", response.optimized_code.len());
    for quad in &response.optimized_code {
        println!("    {}", quad);
    }

    if !response.optimization_log.is_empty() {
        println!("optimizations:");
        for entry in &response.optimization_log {
            println!("    {}", entry);
        }
    }

    println!("object code:");
    print!("{}", response.object_code);
    Ok(())
}

fn print_diagnostics(response: &CompileResponse) {
    for error in &response.errors {
        // Errors are serialized as "<Stage>|<line>|<message>".
        match error.splitn(3, '|').collect::<Vec<_>>().as_slice() {
            [stage, line, message] => println!("{} error (line {}): {}", stage, line, message),
            _ => println!("{}", error),
        }
    }
    for warning in &response.warnings {
        println!("warning: {}", warning);
    }
}
