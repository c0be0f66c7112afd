//! Fixpoint optimisation of a quadruple stream.
//!
//! Five linear rewrites run in a fixed order, over and over, until a full
//! round leaves the stream unchanged or the round cap is reached. The passes
//! are local single-scan rewrites over the instruction sequence; no
//! control-flow graph is built.
use std::collections::{HashMap, HashSet};

use log::{debug, warn};

use super::quad::*;

/// Upper bound on optimisation rounds. Convergence is usually reached within
/// a handful of rounds; the cap keeps pathological inputs from looping.
const MAX_PASSES: usize = 10;

/// Optimises a quadruple stream, returning the rewritten stream and a
/// deduplicated, human-readable log of the transformations that were
/// applied. An empty input yields an empty output and an empty log.
pub fn optimise(quadruples: &[Quadruple]) -> (Vec<Quadruple>, Vec<String>) {
    if quadruples.is_empty() {
        return (vec![], vec![]);
    }
    let mut optimiser = Optimiser::new();
    let optimised = optimiser.run(quadruples.to_vec());
    (optimised, optimiser.applied)
}

struct Optimiser {
    applied: Vec<String>,
}

impl Optimiser {
    fn new() -> Self {
        Self { applied: vec![] }
    }

    fn run(&mut self, mut current: Vec<Quadruple>) -> Vec<Quadruple> {
        let mut converged = false;
        for pass in 1..=MAX_PASSES {
            let next = self.run_round(current.clone());
            if next == current {
                debug!("optimisation converged after {} rounds", pass);
                self.log(format!("fixpoint reached after pass {}", pass));
                converged = true;
                break;
            }
            current = next;
        }
        if !converged {
            warn!("optimisation did not converge within {} rounds", MAX_PASSES);
        }

        for (index, quad) in current.iter_mut().enumerate() {
            quad.index = index;
        }
        current
    }

    /// One full round: every pass consumes the previous pass's output.
    fn run_round(&mut self, quadruples: Vec<Quadruple>) -> Vec<Quadruple> {
        let quadruples = self.constant_propagation(quadruples);
        let quadruples = self.constant_folding(quadruples);
        let quadruples = self.jump_optimisation(quadruples);
        let quadruples = self.redundant_assignment_elimination(quadruples);
        self.dead_code_elimination(quadruples)
    }

    /// Substitutes references to variables whose value is a known constant.
    ///
    /// The binding map survives labels and jumps, so a constant can travel
    /// across a loop back-edge or a branch join even when the variable is
    /// rewritten on another path.
    fn constant_propagation(&mut self, quadruples: Vec<Quadruple>) -> Vec<Quadruple> {
        let mut constants: HashMap<String, String> = HashMap::new();
        let mut optimised = Vec::with_capacity(quadruples.len());

        for mut quad in quadruples {
            if let Some(arg1) = &quad.arg1 {
                if let Some(value) = constants.get(arg1) {
                    self.log(format!("propagated constant: {} -> {}", arg1, value));
                    quad.arg1 = Some(value.clone());
                }
            }
            if let Some(arg2) = &quad.arg2 {
                if let Some(value) = constants.get(arg2) {
                    self.log(format!("propagated constant: {} -> {}", arg2, value));
                    quad.arg2 = Some(value.clone());
                }
            }

            if quad.quadruple_type == QuadrupleKind::Assignment {
                match (&quad.arg1, &quad.result) {
                    (Some(arg1), Some(result)) if is_constant(arg1) => {
                        constants.insert(result.clone(), arg1.clone());
                    }
                    (_, Some(result)) => {
                        constants.remove(result);
                    }
                    _ => {}
                }
            } else if let Some(result) = &quad.result {
                constants.remove(result);
            }

            optimised.push(quad);
        }
        optimised
    }

    /// Replaces an arithmetic or comparison over two constants with an
    /// assignment of the evaluated result.
    fn constant_folding(&mut self, quadruples: Vec<Quadruple>) -> Vec<Quadruple> {
        let mut optimised = Vec::with_capacity(quadruples.len());

        for quad in quadruples {
            let foldable = matches!(
                quad.quadruple_type,
                QuadrupleKind::Arithmetic | QuadrupleKind::Comparison
            );
            if foldable {
                if let (Some(arg1), Some(arg2)) = (&quad.arg1, &quad.arg2) {
                    if is_constant(arg1) && is_constant(arg2) {
                        if let Some(folded) = evaluate(arg1, arg2, &quad.operator) {
                            self.log(format!(
                                "folded constant expression: {} {} {} -> {}",
                                arg1, quad.operator, arg2, folded
                            ));
                            optimised.push(Quadruple {
                                index: quad.index,
                                operator: "=".to_string(),
                                arg1: Some(folded),
                                arg2: None,
                                result: quad.result.clone(),
                                quadruple_type: QuadrupleKind::Assignment,
                                line: quad.line,
                            });
                            continue;
                        }
                    }
                }
            }
            optimised.push(quad);
        }
        optimised
    }

    /// Removes statically decided conditional jumps and jumps to the
    /// directly following label.
    fn jump_optimisation(&mut self, quadruples: Vec<Quadruple>) -> Vec<Quadruple> {
        let mut optimised = Vec::with_capacity(quadruples.len());

        for position in 0..quadruples.len() {
            let quad = &quadruples[position];

            if quad.is_conditional_jump() {
                if let Some(arg1) = &quad.arg1 {
                    if is_numeric_constant(arg1) {
                        if let Ok(value) = arg1.parse::<f64>() {
                            if value != 0.0 {
                                self.log(format!("removed dead branch (if_false {})", arg1));
                            } else {
                                self.log(
                                    "replaced constant condition with unconditional jump"
                                        .to_string(),
                                );
                                optimised.push(Quadruple {
                                    index: quad.index,
                                    operator: "goto".to_string(),
                                    arg1: None,
                                    arg2: None,
                                    result: quad.result.clone(),
                                    quadruple_type: QuadrupleKind::Jump,
                                    line: quad.line,
                                });
                            }
                            continue;
                        }
                    }
                }
            }

            if quad.quadruple_type == QuadrupleKind::Jump && !quad.is_conditional_jump() {
                if let Some(next) = quadruples.get(position + 1) {
                    if next.quadruple_type == QuadrupleKind::Label && quad.result == next.result {
                        self.log(format!(
                            "removed jump to next instruction ({})",
                            quad.result.as_deref().unwrap_or("_")
                        ));
                        continue;
                    }
                }
            }

            optimised.push(quad.clone());
        }
        optimised
    }

    /// Drops assignments that rewrite a variable with the value it already
    /// holds. Labels, jumps, calls and returns invalidate everything that is
    /// being tracked; other writes invalidate their own target.
    fn redundant_assignment_elimination(&mut self, quadruples: Vec<Quadruple>) -> Vec<Quadruple> {
        let mut values: HashMap<String, Option<String>> = HashMap::new();
        let mut optimised = Vec::with_capacity(quadruples.len());

        for quad in quadruples {
            match quad.quadruple_type {
                QuadrupleKind::Label
                | QuadrupleKind::Jump
                | QuadrupleKind::Call
                | QuadrupleKind::Return => {
                    values.clear();
                    optimised.push(quad);
                }
                QuadrupleKind::Assignment => {
                    if let Some(result) = &quad.result {
                        if values.get(result) == Some(&quad.arg1) {
                            self.log(format!(
                                "removed redundant assignment: {} = {}",
                                result,
                                quad.arg1.as_deref().unwrap_or("_")
                            ));
                            continue;
                        }
                        values.insert(result.clone(), quad.arg1.clone());
                    }
                    optimised.push(quad);
                }
                _ => {
                    if let Some(result) = &quad.result {
                        values.remove(result);
                    }
                    optimised.push(quad);
                }
            }
        }
        optimised
    }

    /// Drops assignments to temporaries that no instruction reads, and
    /// labels that no jump targets. Function-entry labels are exempt: they
    /// mark linkage points that stay live regardless of local references.
    ///
    /// The used-set is computed over the whole stream, not in flow order,
    /// and the temporary test is a name-prefix test.
    fn dead_code_elimination(&mut self, quadruples: Vec<Quadruple>) -> Vec<Quadruple> {
        let mut used: HashSet<&str> = HashSet::new();
        let mut referenced_labels: HashSet<&str> = HashSet::new();
        for quad in &quadruples {
            if let Some(arg1) = &quad.arg1 {
                used.insert(arg1);
            }
            if let Some(arg2) = &quad.arg2 {
                used.insert(arg2);
            }
            if quad.quadruple_type == QuadrupleKind::Jump {
                if let Some(result) = &quad.result {
                    referenced_labels.insert(result);
                }
            }
        }

        let mut removed: Vec<String> = vec![];
        let mut keep = Vec::with_capacity(quadruples.len());
        for quad in &quadruples {
            let removable_write = matches!(
                quad.quadruple_type,
                QuadrupleKind::Assignment | QuadrupleKind::Arithmetic
            );
            if removable_write {
                if let Some(result) = &quad.result {
                    if result.starts_with(TEMP_PREFIX) && !used.contains(result.as_str()) {
                        removed.push(format!("removed dead code: {}", result));
                        continue;
                    }
                }
            }
            if quad.quadruple_type == QuadrupleKind::Label {
                if let Some(result) = &quad.result {
                    if !result.starts_with(FUNCTION_LABEL_PREFIX)
                        && !referenced_labels.contains(result.as_str())
                    {
                        removed.push(format!("removed unreferenced label: {}", result));
                        continue;
                    }
                }
            }
            keep.push(quad.clone());
        }
        for message in removed {
            self.log(message);
        }
        keep
    }

    fn log(&mut self, message: String) {
        if !self.applied.contains(&message) {
            self.applied.push(message);
        }
    }
}

/// A constant is a numeric literal or a quoted string.
fn is_constant(value: &str) -> bool {
    is_numeric_constant(value) || (value.starts_with('"') && value.ends_with('"'))
}

/// Matches an optionally negated integer or decimal literal.
fn is_numeric_constant(value: &str) -> bool {
    let digits = value.strip_prefix('-').unwrap_or(value);
    let (integral, fraction) = match digits.split_once('.') {
        Some((integral, fraction)) => (integral, Some(fraction)),
        None => (digits, None),
    };
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    all_digits(integral) && fraction.map_or(true, all_digits)
}

/// Evaluates a binary operation over two numeric constants. Comparison
/// results are rendered as `1`/`0`; division by a zero operand yields `0`.
/// Operators outside the folded set yield `None` and the quadruple is kept.
fn evaluate(arg1: &str, arg2: &str, operator: &str) -> Option<String> {
    let lhs: f64 = arg1.parse().ok()?;
    let rhs: f64 = arg2.parse().ok()?;
    let value = match operator {
        "+" => lhs + rhs,
        "-" => lhs - rhs,
        "*" => lhs * rhs,
        "/" => {
            if rhs == 0.0 {
                0.0
            } else {
                lhs / rhs
            }
        }
        ">" => (lhs > rhs) as i64 as f64,
        "<" => (lhs < rhs) as i64 as f64,
        "==" => (lhs == rhs) as i64 as f64,
        _ => return None,
    };
    Some(format_number(value))
}

/// Integral results are rendered without a fractional part.
fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}
