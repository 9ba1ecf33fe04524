//! The CIP problem format: a readable, round-trippable rendering of a problem.
//!
//! Writing a problem and reading the result reconstructs an equivalent problem whose
//! rendering is byte-identical to the first one.

use super::fmt_num;
use super::parse_num;
use crate::model::Cons;
use crate::model::ConsFlags;
use crate::model::ObjSense;
use crate::model::Problem;
use crate::model::VarType;
use crate::model::Variable;
use crate::plugins::builtin::linear::LinearConsData;
use crate::results::Error;
use crate::results::GourdResult;

fn var_type_name(var_type: VarType) -> &'static str {
    match var_type {
        VarType::Binary => "binary",
        VarType::Integer => "integer",
        VarType::ImplInt => "implint",
        VarType::Continuous => "continuous",
    }
}

fn parse_var_type(text: &str) -> Option<VarType> {
    match text {
        "binary" => Some(VarType::Binary),
        "integer" => Some(VarType::Integer),
        "implint" => Some(VarType::ImplInt),
        "continuous" => Some(VarType::Continuous),
        _ => None,
    }
}

/// Renders the problem in CIP format.
pub fn write(problem: &Problem) -> String {
    let mut out = String::new();
    out.push_str("STATISTICS\n");
    out.push_str(&format!("  Problem name     : {}\n", problem.name));
    out.push_str("OBJECTIVE\n");
    let sense = match problem.objsense {
        ObjSense::Minimize => "minimize",
        ObjSense::Maximize => "maximize",
    };
    out.push_str(&format!("  Sense            : {sense}\n"));
    out.push_str(&format!("  Offset           : {}\n", fmt_num(problem.obj_offset)));
    out.push_str("VARIABLES\n");
    for var in problem.vars.iter().filter(|var| !var.deleted) {
        out.push_str(&format!(
            "  [{}] <{}>: obj={}, bounds=[{},{}]\n",
            var_type_name(var.var_type),
            var.name,
            fmt_num(var.obj),
            fmt_num(var.lb_global),
            fmt_num(var.ub_global),
        ));
    }
    out.push_str("CONSTRAINTS\n");
    for cons in problem.conss.iter().filter(|cons| !cons.deleted) {
        if let Some(data) = cons.data.downcast_ref::<LinearConsData>() {
            let mut line = format!("  [linear] <{}>:", cons.name);
            for &(var, coef) in &data.terms {
                let sign = if coef >= 0.0 { "+" } else { "-" };
                line.push_str(&format!(
                    " {sign}{} <{}>",
                    fmt_num(coef.abs()),
                    problem.vars[var].name
                ));
            }
            line.push_str(&format!(
                " in [{},{}]\n",
                fmt_num(data.lhs),
                fmt_num(data.rhs)
            ));
            out.push_str(&line);
        }
    }
    out.push_str("END\n");
    out
}

enum Section {
    None,
    Statistics,
    Objective,
    Variables,
    Constraints,
}

/// Parses a problem from CIP format contents.
pub fn read(content: &str) -> GourdResult<Problem> {
    let mut problem = Problem::new("", false);
    let mut section = Section::None;
    for (lineno, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match line {
            "STATISTICS" => {
                section = Section::Statistics;
                continue;
            }
            "OBJECTIVE" => {
                section = Section::Objective;
                continue;
            }
            "VARIABLES" => {
                section = Section::Variables;
                continue;
            }
            "CONSTRAINTS" => {
                section = Section::Constraints;
                continue;
            }
            "END" => break,
            _ => {}
        }
        let fail = |what: &str| {
            Error::ReadError(format!("line {}: {what}: '{line}'", lineno + 1))
        };
        match section {
            Section::None => return Err(fail("content outside any section")),
            Section::Statistics => {
                if let Some(name) = line.strip_prefix("Problem name") {
                    problem.name = name.trim_start_matches([' ', ':']).to_owned();
                }
            }
            Section::Objective => {
                if let Some(sense) = line.strip_prefix("Sense") {
                    problem.objsense = match sense.trim_start_matches([' ', ':']) {
                        "minimize" => ObjSense::Minimize,
                        "maximize" => ObjSense::Maximize,
                        _ => return Err(fail("unknown objective sense")),
                    };
                } else if let Some(offset) = line.strip_prefix("Offset") {
                    problem.obj_offset = parse_num(offset.trim_start_matches([' ', ':']))
                        .ok_or_else(|| fail("bad objective offset"))?;
                }
            }
            Section::Variables => {
                let (var_type, rest) = parse_bracketed(line).ok_or_else(|| fail("bad variable"))?;
                let var_type = parse_var_type(var_type).ok_or_else(|| fail("bad variable type"))?;
                let (name, rest) = parse_angled(rest).ok_or_else(|| fail("bad variable name"))?;
                let rest = rest.trim_start_matches(':').trim();
                let mut obj = 0.0;
                let mut lb = f64::NEG_INFINITY;
                let mut ub = f64::INFINITY;
                for part in rest.split(',').map(str::trim) {
                    if let Some(value) = part.strip_prefix("obj=") {
                        obj = parse_num(value).ok_or_else(|| fail("bad objective"))?;
                    } else if let Some(value) = part.strip_prefix("bounds=[") {
                        lb = parse_num(value).ok_or_else(|| fail("bad lower bound"))?;
                    } else if let Some(value) = part.strip_suffix(']') {
                        ub = parse_num(value).ok_or_else(|| fail("bad upper bound"))?;
                    }
                }
                let _ = problem.add_var(Variable::new(name, lb, ub, obj, var_type));
            }
            Section::Constraints => {
                let (hdlr, rest) = parse_bracketed(line).ok_or_else(|| fail("bad constraint"))?;
                if hdlr != "linear" {
                    return Err(fail("unknown constraint class"));
                }
                let (name, rest) = parse_angled(rest).ok_or_else(|| fail("bad constraint name"))?;
                let body = rest.trim_start_matches(':').trim();
                let (terms_text, sides) = body
                    .rsplit_once(" in [")
                    .ok_or_else(|| fail("constraint without sides"))?;
                let sides = sides.trim_end_matches(']');
                let (lhs, rhs) = sides.split_once(',').ok_or_else(|| fail("bad sides"))?;
                let lhs = parse_num(lhs).ok_or_else(|| fail("bad left-hand side"))?;
                let rhs = parse_num(rhs).ok_or_else(|| fail("bad right-hand side"))?;

                let mut terms = Vec::new();
                for token in terms_text.split_whitespace().collect::<Vec<_>>().chunks(2) {
                    let [coef_text, var_text] = token else {
                        return Err(fail("dangling term"));
                    };
                    let coef =
                        parse_num(coef_text).ok_or_else(|| fail("bad term coefficient"))?;
                    let (var_name, _) =
                        parse_angled(var_text).ok_or_else(|| fail("bad term variable"))?;
                    let var = problem
                        .find_var(var_name)
                        .ok_or_else(|| fail("term references unknown variable"))?;
                    terms.push((var, coef));
                }
                let name = name.to_owned();
                let _ = problem.add_cons(Cons::new(
                    &name,
                    "linear",
                    ConsFlags::default(),
                    Box::new(LinearConsData { terms, lhs, rhs }),
                ))?;
            }
        }
    }
    Ok(problem)
}

/// Splits `"[head] tail"` into `("head", "tail")`.
fn parse_bracketed(text: &str) -> Option<(&str, &str)> {
    let rest = text.strip_prefix('[')?;
    let end = rest.find(']')?;
    Some((&rest[..end], rest[end + 1..].trim_start()))
}

/// Splits `"<head> tail"` into `("head", "tail")`.
fn parse_angled(text: &str) -> Option<(&str, &str)> {
    let rest = text.strip_prefix('<')?;
    let end = rest.find('>')?;
    Some((&rest[..end], rest[end + 1..].trim_start()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Problem {
        let mut problem = Problem::new("sample", false);
        let x = problem.add_var(Variable::new("x", 0.0, 10.0, 1.0, VarType::Integer));
        let y = problem.add_var(Variable::new("y", 0.0, f64::INFINITY, 2.5, VarType::Continuous));
        let _ = problem
            .add_cons(Cons::new(
                "cover",
                "linear",
                ConsFlags::default(),
                Box::new(LinearConsData {
                    terms: vec![(x, 1.0), (y, -2.0)],
                    lhs: 3.0,
                    rhs: f64::INFINITY,
                }),
            ))
            .unwrap();
        problem
    }

    #[test]
    fn write_read_write_is_byte_identical() {
        let problem = sample();
        let first = write(&problem);
        let reread = read(&first).unwrap();
        let second = write(&reread);
        assert_eq!(first, second);
    }

    #[test]
    fn read_reconstructs_the_data() {
        let problem = read(&write(&sample())).unwrap();
        assert_eq!("sample", problem.name);
        assert_eq!(2, problem.n_vars());
        assert_eq!(1, problem.n_conss());

        let x = problem.find_var("x").unwrap();
        assert_eq!(VarType::Integer, problem.vars[x].var_type);
        assert_eq!(10.0, problem.vars[x].ub_global);

        let cons = problem.find_cons("cover").unwrap();
        let data = problem.conss[cons]
            .data
            .downcast_ref::<LinearConsData>()
            .unwrap();
        assert_eq!(3.0, data.lhs);
        assert!(data.rhs.is_infinite());
        assert_eq!(vec![(x, 1.0), (problem.find_var("y").unwrap(), -2.0)], data.terms);
    }

    #[test]
    fn malformed_lines_are_reported_with_position() {
        let err = read("VARIABLES\n  [sparkly] <x>: obj=1, bounds=[0,1]\nEND\n").unwrap_err();
        assert!(matches!(err, Error::ReadError(message) if message.contains("line 2")));
    }

    #[test]
    fn maximization_and_offset_survive() {
        let mut problem = sample();
        problem.objsense = ObjSense::Maximize;
        problem.obj_offset = -1.5;
        let reread = read(&write(&problem)).unwrap();
        assert_eq!(ObjSense::Maximize, reread.objsense);
        assert_eq!(-1.5, reread.obj_offset);
    }
}
