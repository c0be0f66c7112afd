use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[clap(about = "A compiler for a small imperative language")]
pub struct Options {
    #[clap(subcommand)]
    pub operation: Operation,
    #[clap(short, long, default_value_t = 1)]
    pub verbose: usize,
}

#[derive(Debug, Subcommand)]
pub enum Operation {
    /// Check a program for errors
    Check { file: String },
    /// Compile a program and print every stage's output
    Compile {
        file: String,
        #[clap(flatten)]
        output: OutputOptions,
    },
    /// Read a JSON request ({"code": "..."}) from stdin and write the
    /// response JSON to stdout
    Request,
}

#[derive(Debug, Args)]
pub struct OutputOptions {
    /// Print the full compilation response as JSON
    #[clap(short, long)]
    json: bool,
    /// Do not optimise the generated code
    #[clap(short, long)]
    no_optimise: bool,
}

impl OutputOptions {
    pub fn json(&self) -> bool {
        self.json
    }

    pub fn optimise(&self) -> bool {
        !self.no_optimise
    }
}
