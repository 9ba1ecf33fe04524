//! Solution files: objective value plus nonzero variable values in the original space.

use super::fmt_num;
use super::parse_num;
use crate::model::Problem;
use crate::primal::Solution;
use crate::results::Error;
use crate::results::GourdResult;

/// Renders a solution over the given (original) problem. Zeros are omitted.
pub fn write(problem: &Problem, sol: &Solution) -> String {
    let mut out = String::new();
    out.push_str(&format!("objective value: {}\n", fmt_num(sol.obj)));
    for var in problem.vars.keys() {
        if problem.vars[var].deleted {
            continue;
        }
        let value = sol.val(problem, var);
        if value != 0.0 {
            out.push_str(&format!(
                "{:<32} {}\n",
                problem.vars[var].name,
                fmt_num(value)
            ));
        }
    }
    out
}

/// Parses a solution file into `(objective, name/value pairs)`.
pub fn read(content: &str) -> GourdResult<(f64, Vec<(String, f64)>)> {
    let mut obj = f64::NAN;
    let mut values = Vec::new();
    for (lineno, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(value) = line.strip_prefix("objective value:") {
            obj = parse_num(value)
                .ok_or_else(|| Error::ReadError(format!("line {}: bad objective", lineno + 1)))?;
            continue;
        }
        let mut parts = line.split_whitespace();
        let (Some(name), Some(value)) = (parts.next(), parts.next()) else {
            return Err(Error::ReadError(format!(
                "line {}: expected 'name value'",
                lineno + 1
            )));
        };
        let value = parse_num(value)
            .ok_or_else(|| Error::ReadError(format!("line {}: bad value", lineno + 1)))?;
        values.push((name.to_owned(), value));
    }
    Ok((obj, values))
}
