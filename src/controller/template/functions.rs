//! Built-in functions available inside template actions.

use super::exec::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Function {
    Split,
    SplitN,
    Index,
    Len,
    Lower,
    Upper,
    Trim,
    Eq,
    Ne,
    Not,
}

impl Function {
    pub(crate) fn lookup(name: &str) -> Option<Self> {
        match name {
            "split" => Some(Self::Split),
            "splitN" => Some(Self::SplitN),
            "index" => Some(Self::Index),
            "len" => Some(Self::Len),
            "lower" => Some(Self::Lower),
            "upper" => Some(Self::Upper),
            "trim" => Some(Self::Trim),
            "eq" => Some(Self::Eq),
            "ne" => Some(Self::Ne),
            "not" => Some(Self::Not),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Split => "split",
            Self::SplitN => "splitN",
            Self::Index => "index",
            Self::Len => "len",
            Self::Lower => "lower",
            Self::Upper => "upper",
            Self::Trim => "trim",
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Not => "not",
        }
    }

    pub(crate) fn call(self, args: Vec<Value>) -> Result<Value, String> {
        match self {
            Self::Split => {
                let [s, sep] = self.arity::<2>(args)?;
                let (s, sep) = (s.into_str(self)?, sep.into_str(self)?);
                Ok(Value::List(s.split(sep.as_str()).map(str::to_string).collect()))
            }
            Self::SplitN => {
                let [s, sep, n] = self.arity::<3>(args)?;
                let (s, sep, n) = (s.into_str(self)?, sep.into_str(self)?, n.into_int(self)?);
                Ok(Value::List(split_n(&s, &sep, n)))
            }
            Self::Index => {
                let mut args = args.into_iter();
                let mut current = args
                    .next()
                    .ok_or_else(|| format!("wrong number of args for {}: want at least 1 got 0", self.name()))?;
                for key in args {
                    current = index(current, key)?;
                }
                Ok(current)
            }
            Self::Len => {
                let [value] = self.arity::<1>(args)?;
                let len = match value {
                    Value::Str(s) => s.len(),
                    Value::List(items) => items.len(),
                    Value::Map(map) => map.len(),
                    other => return Err(format!("len of {}", other.type_name())),
                };
                Ok(Value::Int(len as i64))
            }
            Self::Lower => {
                let [value] = self.arity::<1>(args)?;
                Ok(Value::Str(value.into_str(self)?.to_lowercase()))
            }
            Self::Upper => {
                let [value] = self.arity::<1>(args)?;
                Ok(Value::Str(value.into_str(self)?.to_uppercase()))
            }
            Self::Trim => {
                let [value] = self.arity::<1>(args)?;
                Ok(Value::Str(value.into_str(self)?.trim().to_string()))
            }
            // `eq a b c` is true when `a` equals any of the others
            Self::Eq => {
                let mut args = args.into_iter();
                let (Some(first), Some(second)) = (args.next(), args.next()) else {
                    return Err(format!("wrong number of args for {}: want at least 2", self.name()));
                };
                let mut found = false;
                for other in std::iter::once(second).chain(args) {
                    found |= equals(self, &first, &other)?;
                }
                Ok(Value::Bool(found))
            }
            Self::Ne => {
                let [a, b] = self.arity::<2>(args)?;
                Ok(Value::Bool(!equals(self, &a, &b)?))
            }
            Self::Not => {
                let [value] = self.arity::<1>(args)?;
                Ok(Value::Bool(!value.is_truthy()))
            }
        }
    }

    fn arity<const N: usize>(self, args: Vec<Value>) -> Result<[Value; N], String> {
        let got = args.len();
        args.try_into()
            .map_err(|_| format!("wrong number of args for {}: want {N} got {got}", self.name()))
    }
}

impl Value {
    fn into_str(self, function: Function) -> Result<String, String> {
        match self {
            Value::Str(s) => Ok(s),
            other => Err(format!(
                "{} expects a string, got {}",
                function.name(),
                other.type_name()
            )),
        }
    }

    fn into_int(self, function: Function) -> Result<i64, String> {
        match self {
            Value::Int(n) => Ok(n),
            other => Err(format!(
                "{} expects an integer, got {}",
                function.name(),
                other.type_name()
            )),
        }
    }
}

/// `n < 0` means no limit, `n == 0` yields nothing.
fn split_n(s: &str, sep: &str, n: i64) -> Vec<String> {
    match n {
        0 => Vec::new(),
        n if n < 0 => s.split(sep).map(str::to_string).collect(),
        n => s
            .splitn(usize::try_from(n).unwrap_or(usize::MAX), sep)
            .map(str::to_string)
            .collect(),
    }
}

/// Only scalars of the same type compare.
fn equals(function: Function, a: &Value, b: &Value) -> Result<bool, String> {
    match (a, b) {
        (Value::Str(a), Value::Str(b)) => Ok(a == b),
        (Value::Int(a), Value::Int(b)) => Ok(a == b),
        (Value::Bool(a), Value::Bool(b)) => Ok(a == b),
        (a, b) => Err(format!(
            "incompatible types for comparison in {}: {} and {}",
            function.name(),
            a.type_name(),
            b.type_name()
        )),
    }
}

fn index(collection: Value, key: Value) -> Result<Value, String> {
    match (collection, key) {
        (Value::List(items), Value::Int(i)) => usize::try_from(i)
            .ok()
            .and_then(|i| items.get(i).cloned())
            .map(Value::Str)
            .ok_or_else(|| format!("index out of range: {i}")),
        (Value::Map(map), Value::Str(key)) => map
            .get(&key)
            .cloned()
            .map(Value::Str)
            .ok_or_else(|| format!("map has no entry for key {key:?}")),
        (collection, key) => Err(format!(
            "cannot index {} with {}",
            collection.type_name(),
            key.type_name()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn s(value: &str) -> Value {
        Value::Str(value.to_string())
    }

    #[test]
    fn test_split_n_limits() {
        assert_eq!(split_n("secret-3-4-5", "-", 3), vec!["secret", "3", "4-5"]);
        assert_eq!(split_n("a-b", "-", -1), vec!["a", "b"]);
        assert!(split_n("a-b", "-", 0).is_empty());
    }

    #[test]
    fn test_index_list_and_map() {
        let list = Value::List(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(Function::Index.call(vec![list.clone(), Value::Int(1)]).unwrap(), s("b"));
        assert!(Function::Index.call(vec![list, Value::Int(5)]).is_err());

        let map = Value::Map(BTreeMap::from([("k".to_string(), "v".to_string())]));
        assert_eq!(Function::Index.call(vec![map.clone(), s("k")]).unwrap(), s("v"));
        assert!(Function::Index.call(vec![map, s("missing")]).is_err());
    }

    #[test]
    fn test_string_functions() {
        assert_eq!(Function::Upper.call(vec![s("acme")]).unwrap(), s("ACME"));
        assert_eq!(Function::Lower.call(vec![s("ACME")]).unwrap(), s("acme"));
        assert_eq!(Function::Trim.call(vec![s("  x ")]).unwrap(), s("x"));
        assert_eq!(Function::Len.call(vec![s("four")]).unwrap(), Value::Int(4));
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(Function::Eq.call(vec![s("a"), s("b"), s("a")]).unwrap(), Value::Bool(true));
        assert_eq!(Function::Eq.call(vec![Value::Int(1), Value::Int(2)]).unwrap(), Value::Bool(false));
        assert_eq!(Function::Ne.call(vec![s("a"), s("b")]).unwrap(), Value::Bool(true));
        assert_eq!(Function::Not.call(vec![s("")]).unwrap(), Value::Bool(true));
        assert!(Function::Eq.call(vec![s("1"), Value::Int(1)]).is_err());
        assert!(Function::Eq.call(vec![s("a")]).is_err());
    }

    #[test]
    fn test_wrong_arity_and_types() {
        assert!(Function::Upper.call(vec![]).is_err());
        assert!(Function::Split.call(vec![s("a")]).is_err());
        assert!(Function::SplitN.call(vec![s("a"), s("-"), s("2")]).is_err());
        assert!(Function::Upper.call(vec![Value::Int(3)]).is_err());
    }
}
