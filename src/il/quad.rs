//! Three-address code as a stream of quadruples.
use std::fmt::{self, Display, Formatter};

use serde::Serialize;

/// Prefix of generated temporaries (`t0`, `t1`, ...).
pub const TEMP_PREFIX: &str = "t";
/// Prefix reserved for function-entry labels. These labels mark linkage
/// points and are never removed by dead-label elimination.
pub const FUNCTION_LABEL_PREFIX: &str = "func_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QuadrupleKind {
    Arithmetic,
    Assignment,
    Comparison,
    Jump,
    Label,
    Param,
    Call,
    Return,
    Read,
    Write,
}

/// A single three-address instruction. All operands are opaque string
/// references to variables, temporaries, literals or labels; `index` always
/// equals the instruction's position in the owning stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quadruple {
    pub index: usize,
    pub operator: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arg1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arg2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    pub quadruple_type: QuadrupleKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl Quadruple {
    pub fn is_conditional_jump(&self) -> bool {
        self.quadruple_type == QuadrupleKind::Jump && self.operator == "if_false"
    }
}

impl Display for Quadruple {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let arg1 = self.arg1.as_deref().unwrap_or("_");
        let arg2 = self.arg2.as_deref().unwrap_or("_");
        let result = self.result.as_deref().unwrap_or("_");
        match self.quadruple_type {
            QuadrupleKind::Assignment => write!(f, "{} = {}", result, arg1),
            QuadrupleKind::Arithmetic | QuadrupleKind::Comparison => {
                write!(f, "{} = {} {} {}", result, arg1, self.operator, arg2)
            }
            QuadrupleKind::Jump if self.is_conditional_jump() => {
                write!(f, "if_false {} goto {}", arg1, result)
            }
            QuadrupleKind::Jump => write!(f, "goto {}", result),
            QuadrupleKind::Label => write!(f, "{}:", result),
            QuadrupleKind::Param => write!(f, "param {}", arg1),
            QuadrupleKind::Call => write!(f, "call {}", arg1),
            QuadrupleKind::Read => write!(f, "read {}", result),
            QuadrupleKind::Write => write!(f, "write {}", arg1),
            QuadrupleKind::Return => {
                write!(f, "return {}", self.arg1.as_deref().unwrap_or(result))
            }
        }
    }
}

/// The generated stream plus the counters that produced it. The counters are
/// generation-run state, reported alongside the stream for metrics.
#[derive(Debug, Default, Serialize)]
pub struct IntermediateCode {
    pub quadruples: Vec<Quadruple>,
    pub temporal_counter: usize,
    pub label_counter: usize,
}

impl Display for IntermediateCode {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        for quad in &self.quadruples {
            if quad.quadruple_type == QuadrupleKind::Label {
                writeln!(f, "{}", quad)?;
            } else {
                writeln!(f, "    {}", quad)?;
            }
        }
        Ok(())
    }
}
