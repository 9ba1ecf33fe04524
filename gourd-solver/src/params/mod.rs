//! Typed, named, bounded, fixable parameters with change callbacks and emphasis presets.
//!
//! Parameter names are dotted-with-slashes hierarchical strings (`limits/nodes`,
//! `separating/minefficacy`). Every parameter carries a default, optional bounds, an advanced
//! flag, and a fixed flag; a fixed parameter keeps its value until it is unfixed again.

mod emphasis;

use std::fmt::Write as _;
use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Write;
use std::path::Path;

use fnv::FnvHashMap;
use log::warn;

pub use emphasis::Emphasis;
pub use emphasis::PluginEmphasis;

use crate::results::Error;
use crate::results::GourdResult;

/// The value of a parameter; one variant per supported parameter type.
#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    Bool(bool),
    Int(i32),
    Long(i64),
    Real(f64),
    Char(char),
    String(String),
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamValue::Bool(value) => write!(f, "{value}"),
            ParamValue::Int(value) => write!(f, "{value}"),
            ParamValue::Long(value) => write!(f, "{value}"),
            ParamValue::Real(value) => write!(f, "{value}"),
            ParamValue::Char(value) => write!(f, "{value}"),
            ParamValue::String(value) => write!(f, "{value}"),
        }
    }
}

impl ParamValue {
    fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Bool(_) => "bool",
            ParamValue::Int(_) => "int",
            ParamValue::Long(_) => "long",
            ParamValue::Real(_) => "real",
            ParamValue::Char(_) => "char",
            ParamValue::String(_) => "string",
        }
    }
}

/// Callback invoked synchronously after a parameter value changed; an error rolls the change
/// back.
pub type ParamChangeCallback = Box<dyn Fn(&ParamValue) -> GourdResult<()>>;

struct Param {
    name: String,
    desc: String,
    value: ParamValue,
    default: ParamValue,
    /// Inclusive numeric bounds; only meaningful for int/long/real parameters.
    min: Option<f64>,
    max: Option<f64>,
    advanced: bool,
    fixed: bool,
    on_change: Option<ParamChangeCallback>,
}

impl std::fmt::Debug for Param {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Param")
            .field("name", &self.name)
            .field("value", &self.value)
            .field("fixed", &self.fixed)
            .finish()
    }
}

impl Param {
    fn check_range(&self, value: &ParamValue) -> GourdResult<()> {
        let numeric = match value {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Long(v) => Some(*v as f64),
            ParamValue::Real(v) => Some(*v),
            _ => None,
        };
        if let Some(v) = numeric {
            if v.is_nan()
                || self.min.is_some_and(|min| v < min)
                || self.max.is_some_and(|max| v > max)
            {
                return Err(Error::ParameterWrongVal {
                    name: self.name.clone(),
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// The parameter registry of a solver instance.
#[derive(Debug, Default)]
pub struct ParamSet {
    params: Vec<Param>,
    index: FnvHashMap<String, usize>,
}

impl ParamSet {
    fn add(
        &mut self,
        name: &str,
        desc: &str,
        default: ParamValue,
        min: Option<f64>,
        max: Option<f64>,
        advanced: bool,
    ) -> GourdResult<()> {
        if self.index.contains_key(name) {
            return Err(Error::KeyAlreadyExisting(name.into()));
        }
        let param = Param {
            name: name.into(),
            desc: desc.into(),
            value: default.clone(),
            default,
            min,
            max,
            advanced,
            fixed: false,
            on_change: None,
        };
        param.check_range(&param.value)?;
        let _ = self.index.insert(name.into(), self.params.len());
        self.params.push(param);
        Ok(())
    }

    pub fn add_bool(&mut self, name: &str, desc: &str, default: bool) -> GourdResult<()> {
        self.add(name, desc, ParamValue::Bool(default), None, None, false)
    }

    pub fn add_int(
        &mut self,
        name: &str,
        desc: &str,
        default: i32,
        min: i32,
        max: i32,
    ) -> GourdResult<()> {
        self.add(
            name,
            desc,
            ParamValue::Int(default),
            Some(min as f64),
            Some(max as f64),
            false,
        )
    }

    pub fn add_long(
        &mut self,
        name: &str,
        desc: &str,
        default: i64,
        min: i64,
        max: i64,
    ) -> GourdResult<()> {
        self.add(
            name,
            desc,
            ParamValue::Long(default),
            Some(min as f64),
            Some(max as f64),
            false,
        )
    }

    pub fn add_real(
        &mut self,
        name: &str,
        desc: &str,
        default: f64,
        min: f64,
        max: f64,
    ) -> GourdResult<()> {
        self.add(
            name,
            desc,
            ParamValue::Real(default),
            Some(min),
            Some(max),
            false,
        )
    }

    pub fn add_char(&mut self, name: &str, desc: &str, default: char) -> GourdResult<()> {
        self.add(name, desc, ParamValue::Char(default), None, None, false)
    }

    pub fn add_string(&mut self, name: &str, desc: &str, default: &str) -> GourdResult<()> {
        self.add(
            name,
            desc,
            ParamValue::String(default.into()),
            None,
            None,
            false,
        )
    }

    /// Installs a change callback on an existing parameter, replacing any previous one.
    pub fn set_change_callback(
        &mut self,
        name: &str,
        callback: ParamChangeCallback,
    ) -> GourdResult<()> {
        let param = self.lookup_mut(name)?;
        param.on_change = Some(callback);
        Ok(())
    }

    fn lookup(&self, name: &str) -> GourdResult<&Param> {
        self.index
            .get(name)
            .map(|&pos| &self.params[pos])
            .ok_or_else(|| Error::ParameterUnknown(name.into()))
    }

    fn lookup_mut(&mut self, name: &str) -> GourdResult<&mut Param> {
        let pos = *self
            .index
            .get(name)
            .ok_or_else(|| Error::ParameterUnknown(name.to_owned()))?;
        Ok(&mut self.params[pos])
    }

    pub fn get(&self, name: &str) -> GourdResult<ParamValue> {
        Ok(self.lookup(name)?.value.clone())
    }

    pub fn get_bool(&self, name: &str) -> GourdResult<bool> {
        match self.lookup(name)?.value {
            ParamValue::Bool(value) => Ok(value),
            _ => Err(Error::ParameterWrongType(name.into())),
        }
    }

    pub fn get_int(&self, name: &str) -> GourdResult<i32> {
        match self.lookup(name)?.value {
            ParamValue::Int(value) => Ok(value),
            _ => Err(Error::ParameterWrongType(name.into())),
        }
    }

    pub fn get_long(&self, name: &str) -> GourdResult<i64> {
        match self.lookup(name)?.value {
            ParamValue::Long(value) => Ok(value),
            _ => Err(Error::ParameterWrongType(name.into())),
        }
    }

    pub fn get_real(&self, name: &str) -> GourdResult<f64> {
        match self.lookup(name)?.value {
            ParamValue::Real(value) => Ok(value),
            _ => Err(Error::ParameterWrongType(name.into())),
        }
    }

    pub fn get_char(&self, name: &str) -> GourdResult<char> {
        match self.lookup(name)?.value {
            ParamValue::Char(value) => Ok(value),
            _ => Err(Error::ParameterWrongType(name.into())),
        }
    }

    pub fn get_string(&self, name: &str) -> GourdResult<String> {
        match &self.lookup(name)?.value {
            ParamValue::String(value) => Ok(value.clone()),
            _ => Err(Error::ParameterWrongType(name.into())),
        }
    }

    /// Sets the value of a parameter.
    ///
    /// The change callback (if any) runs synchronously after the store is updated; if it fails,
    /// the old value is restored and the error is propagated.
    pub fn set(&mut self, name: &str, value: ParamValue) -> GourdResult<()> {
        let param = self.lookup_mut(name)?;
        if param.value.type_name() != value.type_name() {
            return Err(Error::ParameterWrongType(name.into()));
        }
        if param.fixed {
            return Err(Error::InvalidData(format!("parameter '{name}' is fixed")));
        }
        param.check_range(&value)?;

        let old = std::mem::replace(&mut param.value, value);
        if let Some(callback) = param.on_change.take() {
            let outcome = callback(&param.value);
            let param = self.lookup_mut(name)?;
            param.on_change = Some(callback);
            if let Err(error) = outcome {
                param.value = old;
                return Err(error);
            }
        }
        Ok(())
    }

    pub fn set_bool(&mut self, name: &str, value: bool) -> GourdResult<()> {
        self.set(name, ParamValue::Bool(value))
    }

    pub fn set_int(&mut self, name: &str, value: i32) -> GourdResult<()> {
        self.set(name, ParamValue::Int(value))
    }

    pub fn set_long(&mut self, name: &str, value: i64) -> GourdResult<()> {
        self.set(name, ParamValue::Long(value))
    }

    pub fn set_real(&mut self, name: &str, value: f64) -> GourdResult<()> {
        self.set(name, ParamValue::Real(value))
    }

    pub fn set_char(&mut self, name: &str, value: char) -> GourdResult<()> {
        self.set(name, ParamValue::Char(value))
    }

    pub fn set_string(&mut self, name: &str, value: &str) -> GourdResult<()> {
        self.set(name, ParamValue::String(value.into()))
    }

    /// Fixes the parameter at its current value; subsequent sets fail and presets skip it.
    pub fn fix(&mut self, name: &str) -> GourdResult<()> {
        self.lookup_mut(name)?.fixed = true;
        Ok(())
    }

    pub fn unfix(&mut self, name: &str) -> GourdResult<()> {
        self.lookup_mut(name)?.fixed = false;
        Ok(())
    }

    pub fn is_fixed(&self, name: &str) -> GourdResult<bool> {
        Ok(self.lookup(name)?.fixed)
    }

    /// Resets the parameter to its default (also when fixed; the fixing is kept).
    pub fn reset(&mut self, name: &str) -> GourdResult<()> {
        let param = self.lookup_mut(name)?;
        param.value = param.default.clone();
        Ok(())
    }

    pub fn reset_all(&mut self) {
        for param in &mut self.params {
            param.value = param.default.clone();
        }
    }

    /// Used by the emphasis presets: sets the value, silently skipping fixed or unknown
    /// parameters.
    pub(crate) fn set_if_possible(&mut self, name: &str, value: ParamValue) {
        match self.lookup(name) {
            Ok(param) if param.fixed => {}
            Ok(_) => {
                if let Err(error) = self.set(name, value) {
                    warn!("emphasis preset skipped parameter '{name}': {error}");
                }
            }
            Err(_) => {}
        }
    }

    /// Reads a settings file of `name = value` lines; unknown names produce warnings, not
    /// errors.
    pub fn read_file(&mut self, path: &Path) -> GourdResult<()> {
        let file = File::open(path).map_err(|_| Error::NoFile(path.display().to_string()))?;
        let reader = BufReader::new(file);

        for (lineno, line) in reader.lines().enumerate() {
            let line = line.map_err(|error| Error::ReadError(error.to_string()))?;
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let Some((name, raw_value)) = line.split_once('=') else {
                return Err(Error::ReadError(format!(
                    "{}:{}: expected 'name = value'",
                    path.display(),
                    lineno + 1
                )));
            };
            let name = name.trim();
            let raw_value = raw_value.trim();

            let parsed = match self.lookup(name) {
                Ok(param) => Self::parse_value(&param.value, raw_value),
                Err(_) => {
                    warn!("ignoring unknown parameter '{name}' in {}", path.display());
                    continue;
                }
            };
            match parsed {
                Some(value) => self.set(name, value)?,
                None => {
                    return Err(Error::ReadError(format!(
                        "{}:{}: cannot parse value '{raw_value}' for parameter '{name}'",
                        path.display(),
                        lineno + 1
                    )));
                }
            }
        }
        Ok(())
    }

    fn parse_value(template: &ParamValue, raw: &str) -> Option<ParamValue> {
        match template {
            ParamValue::Bool(_) => raw.parse().ok().map(ParamValue::Bool),
            ParamValue::Int(_) => raw.parse().ok().map(ParamValue::Int),
            ParamValue::Long(_) => raw.parse().ok().map(ParamValue::Long),
            ParamValue::Real(_) => raw.parse().ok().map(ParamValue::Real),
            ParamValue::Char(_) => {
                let mut chars = raw.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(ParamValue::Char(c)),
                    _ => None,
                }
            }
            ParamValue::String(_) => Some(ParamValue::String(raw.into())),
        }
    }

    /// Renders the settings in the file format; `only_changed` restricts the output to
    /// parameters that differ from their default, `with_comments` adds the description and
    /// default as comment lines.
    pub fn render(&self, only_changed: bool, with_comments: bool) -> String {
        let mut out = String::new();
        for param in &self.params {
            if only_changed && param.value == param.default {
                continue;
            }
            if with_comments {
                let _ = writeln!(out, "# {}", param.desc);
                let _ = writeln!(
                    out,
                    "# [type: {}, default: {}]",
                    param.value.type_name(),
                    param.default
                );
            }
            let _ = writeln!(out, "{} = {}", param.name, param.value);
        }
        out
    }

    pub fn write_file(
        &self,
        path: &Path,
        only_changed: bool,
        with_comments: bool,
    ) -> GourdResult<()> {
        let mut file =
            File::create(path).map_err(|_| Error::FileCreateError(path.display().to_string()))?;
        file.write_all(self.render(only_changed, with_comments).as_bytes())
            .map_err(|error| Error::WriteError(error.to_string()))
    }

    /// Copies every parameter value present in both sets into `target`.
    ///
    /// Used by the instance-copy operation; parameters declared only on one side are skipped.
    pub(crate) fn copy_values_to(&self, target: &mut ParamSet) {
        for param in &self.params {
            if target.index.contains_key(&param.name) {
                target.set_if_possible(&param.name, param.value.clone());
            }
        }
    }

    /// Whether the parameter is declared as an advanced parameter.
    pub fn is_advanced(&self, name: &str) -> GourdResult<bool> {
        Ok(self.lookup(name)?.advanced)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|param| param.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    fn params() -> ParamSet {
        let mut params = ParamSet::default();
        params
            .add_long("limits/nodes", "maximal number of nodes", -1, -1, i64::MAX)
            .unwrap();
        params
            .add_real("separating/minefficacy", "minimal cut efficacy", 0.05, 0.0, 1e20)
            .unwrap();
        params.add_bool("conflict/enable", "use conflict analysis", true).unwrap();
        params
    }

    #[test]
    fn reading_an_undeclared_name_is_an_error() {
        let params = params();
        assert!(matches!(
            params.get_bool("no/such/param"),
            Err(Error::ParameterUnknown(_))
        ));
    }

    #[test]
    fn out_of_range_values_are_rejected_and_value_kept() {
        let mut params = params();
        assert!(matches!(
            params.set_real("separating/minefficacy", -1.0),
            Err(Error::ParameterWrongVal { .. })
        ));
        assert_eq!(0.05, params.get_real("separating/minefficacy").unwrap());
    }

    #[test]
    fn wrong_type_access_is_rejected() {
        let mut params = params();
        assert!(matches!(
            params.set_int("limits/nodes", 5),
            Err(Error::ParameterWrongType(_))
        ));
        assert!(matches!(
            params.get_real("conflict/enable"),
            Err(Error::ParameterWrongType(_))
        ));
    }

    #[test]
    fn failing_change_callback_rolls_back() {
        let mut params = params();
        params
            .set_change_callback(
                "limits/nodes",
                Box::new(|value| match value {
                    ParamValue::Long(v) if *v > 100 => {
                        Err(Error::InvalidData("too many nodes".into()))
                    }
                    _ => Ok(()),
                }),
            )
            .unwrap();

        params.set_long("limits/nodes", 50).unwrap();
        assert_eq!(50, params.get_long("limits/nodes").unwrap());

        assert!(params.set_long("limits/nodes", 500).is_err());
        assert_eq!(50, params.get_long("limits/nodes").unwrap());
    }

    #[test]
    fn change_callback_sees_updated_store() {
        let seen = Rc::new(Cell::new(0));
        let seen_in_callback = Rc::clone(&seen);

        let mut params = params();
        params
            .set_change_callback(
                "limits/nodes",
                Box::new(move |value| {
                    if let ParamValue::Long(v) = value {
                        seen_in_callback.set(*v);
                    }
                    Ok(())
                }),
            )
            .unwrap();

        params.set_long("limits/nodes", 7).unwrap();
        assert_eq!(7, seen.get());
    }

    #[test]
    fn fixed_parameters_reject_sets_until_unfixed() {
        let mut params = params();
        params.fix("conflict/enable").unwrap();
        assert!(params.set_bool("conflict/enable", false).is_err());
        assert!(params.get_bool("conflict/enable").unwrap());

        params.unfix("conflict/enable").unwrap();
        params.set_bool("conflict/enable", false).unwrap();
        assert!(!params.get_bool("conflict/enable").unwrap());
    }

    #[test]
    fn render_only_changed_lists_modified_parameters() {
        let mut params = params();
        params.set_long("limits/nodes", 42).unwrap();

        let rendered = params.render(true, false);
        assert_eq!("limits/nodes = 42\n", rendered);
    }

    #[test]
    fn reset_restores_defaults() {
        let mut params = params();
        params.set_bool("conflict/enable", false).unwrap();
        params.set_long("limits/nodes", 3).unwrap();

        params.reset("conflict/enable").unwrap();
        assert!(params.get_bool("conflict/enable").unwrap());

        params.reset_all();
        assert_eq!(-1, params.get_long("limits/nodes").unwrap());
    }
}
