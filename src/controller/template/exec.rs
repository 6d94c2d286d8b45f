//! Evaluates parsed templates against an [`ObjectRecord`].

use super::parse::{Binding, Command, Control, Keyword, Pipeline, Segment, Term};
use crate::controller::record::ObjectRecord;
use std::collections::BTreeMap;
use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Value {
    Str(String),
    Int(i64),
    Bool(bool),
    List(Vec<String>),
    Map(BTreeMap<String, String>),
    /// The record itself, or its metadata
    Record,
}

impl Value {
    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            Self::Str(_) => "string",
            Self::Int(_) => "int",
            Self::Bool(_) => "bool",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Record => "record",
        }
    }

    /// Empty strings, collections, zero and `false` are false.
    pub(crate) fn is_truthy(&self) -> bool {
        match self {
            Self::Str(s) => !s.is_empty(),
            Self::Int(n) => *n != 0,
            Self::Bool(b) => *b,
            Self::List(items) => !items.is_empty(),
            Self::Map(map) => !map.is_empty(),
            Self::Record => true,
        }
    }

    fn print(&self, out: &mut String) -> Result<(), String> {
        match self {
            Self::Str(s) => out.push_str(s),
            Self::Int(n) => {
                let _ = write!(out, "{n}");
            }
            Self::Bool(b) => {
                let _ = write!(out, "{b}");
            }
            Self::List(items) => {
                let _ = write!(out, "[{}]", items.join(" "));
            }
            Self::Map(map) => {
                let pairs: Vec<String> = map.iter().map(|(k, v)| format!("{k}:{v}")).collect();
                let _ = write!(out, "map[{}]", pairs.join(" "));
            }
            Self::Record => return Err("cannot print a whole record, select a field".to_string()),
        }
        Ok(())
    }

    /// `(index or key, element)` pairs visited by `range`, maps in key order.
    fn entries(self) -> Result<Vec<(Value, Value)>, String> {
        match self {
            Self::List(items) => Ok(items
                .into_iter()
                .enumerate()
                .map(|(i, item)| (Value::Int(i as i64), Value::Str(item)))
                .collect()),
            Self::Map(map) => Ok(map
                .into_iter()
                .map(|(k, v)| (Value::Str(k), Value::Str(v)))
                .collect()),
            Self::Int(n) => Ok((0..n.max(0)).map(|i| (Value::Int(i), Value::Int(i))).collect()),
            other => Err(format!("range can't iterate over {}", other.type_name())),
        }
    }
}

/// Variables in scope, innermost last. `$` is always the first entry.
type Vars = Vec<(String, Value)>;

pub(crate) struct Scope<'a> {
    record: &'a ObjectRecord,
    /// Text view of `data`, built only when the template reads it
    string_data: Option<BTreeMap<String, String>>,
}

impl<'a> Scope<'a> {
    pub(crate) fn new(record: &'a ObjectRecord, needs_data: bool) -> Self {
        Self {
            record,
            string_data: needs_data.then(|| record.string_data()),
        }
    }

    pub(crate) fn render(&self, segments: &[Segment]) -> Result<String, String> {
        let mut out = String::new();
        let mut vars = vec![(String::new(), Value::Record)];
        self.walk(segments, &Value::Record, &mut vars, &mut out)?;
        Ok(out)
    }

    fn walk(&self, segments: &[Segment], dot: &Value, vars: &mut Vars, out: &mut String) -> Result<(), String> {
        for segment in segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Action(pipeline) => {
                    let value = self.pipeline(pipeline, dot, vars)?;
                    // Declarations and assignments print nothing
                    if pipeline.binding.is_none() {
                        value.print(out)?;
                    }
                }
                Segment::Control(control) => self.control(control, dot, vars, out)?,
            }
        }
        Ok(())
    }

    fn control(&self, control: &Control, dot: &Value, vars: &mut Vars, out: &mut String) -> Result<(), String> {
        let mark = vars.len();
        match control.keyword {
            Keyword::If => {
                let value = self.pipeline(&control.pipeline, dot, vars)?;
                let branch = if value.is_truthy() {
                    &control.body
                } else {
                    &control.otherwise
                };
                self.walk(branch, dot, vars, out)?;
            }
            Keyword::With => {
                let value = self.pipeline(&control.pipeline, dot, vars)?;
                if value.is_truthy() {
                    self.walk(&control.body, &value, vars, out)?;
                } else {
                    self.walk(&control.otherwise, dot, vars, out)?;
                }
            }
            Keyword::Range => {
                let entries = self.eval(&control.pipeline, dot, vars)?.entries()?;
                if entries.is_empty() {
                    self.walk(&control.otherwise, dot, vars, out)?;
                }
                for (key, element) in entries {
                    let iteration = vars.len();
                    if let Some(binding) = &control.pipeline.binding {
                        bind(binding, &[key, element.clone()], vars)?;
                    }
                    self.walk(&control.body, &element, vars, out)?;
                    vars.truncate(iteration);
                }
            }
        }
        vars.truncate(mark);
        Ok(())
    }

    /// Evaluates the commands and applies the pipeline's binding, if any.
    fn pipeline(&self, pipeline: &Pipeline, dot: &Value, vars: &mut Vars) -> Result<Value, String> {
        let value = self.eval(pipeline, dot, vars)?;
        if let Some(binding) = &pipeline.binding {
            bind(binding, std::slice::from_ref(&value), vars)?;
        }
        Ok(value)
    }

    fn eval(&self, pipeline: &Pipeline, dot: &Value, vars: &[(String, Value)]) -> Result<Value, String> {
        let mut piped: Option<Value> = None;
        for command in &pipeline.commands {
            piped = Some(self.command(command, piped.take(), dot, vars)?);
        }
        piped.ok_or_else(|| "empty pipeline".to_string())
    }

    fn command(
        &self,
        command: &Command,
        piped: Option<Value>,
        dot: &Value,
        vars: &[(String, Value)],
    ) -> Result<Value, String> {
        match command {
            Command::Call { function, args } => {
                let mut values = args
                    .iter()
                    .map(|arg| self.term(arg, dot, vars))
                    .collect::<Result<Vec<_>, _>>()?;
                values.extend(piped);
                function.call(values)
            }
            Command::Operand(term) => {
                if piped.is_some() {
                    return Err("can't give argument to non-function".to_string());
                }
                self.term(term, dot, vars)
            }
        }
    }

    fn term(&self, term: &Term, dot: &Value, vars: &[(String, Value)]) -> Result<Value, String> {
        match term {
            Term::Dot => Ok(dot.clone()),
            Term::Field(path) => self.field(dot.clone(), path),
            Term::Variable { name, path } => {
                let value = vars
                    .iter()
                    .rev()
                    .find(|(declared, _)| declared == name)
                    .map(|(_, value)| value.clone())
                    .ok_or_else(|| format!("undefined variable \"${name}\""))?;
                self.field(value, path)
            }
            Term::Str(s) => Ok(Value::Str(s.clone())),
            Term::Int(n) => Ok(Value::Int(*n)),
            Term::Nested(pipeline) => self.eval(pipeline, dot, vars),
        }
    }

    /// Follows `path` from `base`; the record resolves its own fields, maps are keyed.
    fn field(&self, base: Value, path: &[String]) -> Result<Value, String> {
        let (mut value, rest) = match base {
            Value::Record => self.record_field(path)?,
            other => (other, path),
        };

        for key in rest {
            value = match value {
                Value::Map(mut map) => map
                    .remove(key)
                    .map(Value::Str)
                    .ok_or_else(|| format!("map has no entry for key {key:?}"))?,
                other => {
                    return Err(format!(
                        "can't evaluate field {key} in type {}",
                        other.type_name()
                    ))
                }
            };
        }
        Ok(value)
    }

    /// Resolves the first record field of `path`, returning it with the unread remainder.
    fn record_field<'p>(&self, path: &'p [String]) -> Result<(Value, &'p [String]), String> {
        let (in_meta, path) = match path.split_first() {
            Some((first, rest)) if first == "ObjectMeta" => (true, rest),
            _ => (false, path),
        };
        let Some((head, rest)) = path.split_first() else {
            return Ok((Value::Record, path));
        };

        let value = match head.as_str() {
            "Name" => Value::Str(self.record.name.clone()),
            "Namespace" => Value::Str(self.record.namespace.clone()),
            "Labels" => Value::Map(self.record.labels.clone()),
            "Annotations" => Value::Map(self.record.annotations.clone()),
            "Data" | "StringData" if !in_meta => {
                Value::Map(self.string_data.clone().unwrap_or_else(|| self.record.string_data()))
            }
            other => return Err(format!("can't evaluate field {other}")),
        };
        Ok((value, rest))
    }
}

/// `values` holds one value for plain pipelines and `[key, element]` inside `range`.
fn bind(binding: &Binding, values: &[Value], vars: &mut Vars) -> Result<(), String> {
    let Some(last) = values.last() else {
        return Ok(());
    };
    match binding {
        Binding::Declare(names) if names.len() == 1 => {
            vars.push((names[0].clone(), last.clone()));
        }
        Binding::Declare(names) => {
            vars.extend(names.iter().cloned().zip(values.iter().cloned()));
        }
        Binding::Assign(name) => {
            let slot = vars
                .iter_mut()
                .rev()
                .find(|(declared, _)| declared == name)
                .ok_or_else(|| format!("undefined variable \"${name}\""))?;
            slot.1 = last.clone();
        }
    }
    Ok(())
}
