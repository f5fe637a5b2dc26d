//! Runtime values.
//!
//! A `Value<'a>` borrows from the item being evaluated wherever it can:
//! strings are `Cow`s, records are `&dyn Record`, and stat tables served from
//! a partition cache are borrowed. Only computed results (concatenations,
//! filtered subsets, ad-hoc sums) own their data.

use crate::error::EvalError;
use crate::schema::Record;
use crate::stats::{ModList, StatTable};
use std::borrow::Cow;
use std::fmt;
use std::rc::Rc;

/// How two strings are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaseMode {
    #[default]
    Ordinal,
    IgnoreCase,
}

impl CaseMode {
    pub fn equals(self, a: &str, b: &str) -> bool {
        match self {
            CaseMode::Ordinal => a == b,
            CaseMode::IgnoreCase => a.to_lowercase() == b.to_lowercase(),
        }
    }

    pub fn contains(self, haystack: &str, needle: &str) -> bool {
        match self {
            CaseMode::Ordinal => haystack.contains(needle),
            CaseMode::IgnoreCase => haystack.to_lowercase().contains(&needle.to_lowercase()),
        }
    }

    pub fn starts_with(self, haystack: &str, needle: &str) -> bool {
        match self {
            CaseMode::Ordinal => haystack.starts_with(needle),
            CaseMode::IgnoreCase => haystack.to_lowercase().starts_with(&needle.to_lowercase()),
        }
    }

    pub fn ends_with(self, haystack: &str, needle: &str) -> bool {
        match self {
            CaseMode::Ordinal => haystack.ends_with(needle),
            CaseMode::IgnoreCase => haystack.to_lowercase().ends_with(&needle.to_lowercase()),
        }
    }
}

/// A boolean function of one element, built from a rule lambda.
#[derive(Clone)]
pub struct Callable<'a>(Rc<dyn Fn(Value<'a>) -> Result<bool, EvalError> + 'a>);

impl<'a> Callable<'a> {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Value<'a>) -> Result<bool, EvalError> + 'a,
    {
        Callable(Rc::new(f))
    }

    pub fn call(&self, arg: Value<'a>) -> Result<bool, EvalError> {
        (self.0)(arg)
    }
}

/// A value produced while evaluating a rule.
#[derive(Clone)]
pub enum Value<'a> {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Cow<'a, str>),
    List(Vec<Value<'a>>),
    Record(&'a dyn Record),
    Mods(ModList<'a>),
    IntStats(Cow<'a, StatTable<i64>>),
    FloatStats(Cow<'a, StatTable<f64>>),
    Comparison(CaseMode),
    Predicate(Callable<'a>),
}

fn mismatch(expected: &str, found: &Value<'_>) -> EvalError {
    EvalError::TypeMismatch(format!("expected {}, found {}", expected, found.kind()))
}

impl<'a> Value<'a> {
    /// Borrowed string value.
    pub fn str(s: &'a str) -> Self {
        Value::Str(Cow::Borrowed(s))
    }

    /// List of borrowed strings.
    pub fn str_list<S: AsRef<str>>(items: &'a [S]) -> Self {
        Value::List(items.iter().map(|s| Value::str(s.as_ref())).collect())
    }

    /// List of records.
    pub fn records<R, I>(items: I) -> Self
    where
        R: Record + 'a,
        I: IntoIterator<Item = &'a R>,
    {
        Value::List(
            items
                .into_iter()
                .map(|r| Value::Record(r as &'a dyn Record))
                .collect(),
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Bool(_) => "Boolean",
            Value::Int(_) => "Int64",
            Value::Float(_) => "Double",
            Value::Str(_) => "String",
            Value::List(_) => "List",
            Value::Record(r) => r.type_name(),
            Value::Mods(_) => "ItemMod[]",
            Value::IntStats(_) => "StatTable<Int64>",
            Value::FloatStats(_) => "StatTable<Double>",
            Value::Comparison(_) => "StringComparison",
            Value::Predicate(_) => "Func",
        }
    }

    pub fn as_bool(&self) -> Result<bool, EvalError> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(mismatch("Boolean", other)),
        }
    }

    pub fn as_int(&self) -> Result<i64, EvalError> {
        match self {
            Value::Int(i) => Ok(*i),
            other => Err(mismatch("Int64", other)),
        }
    }

    /// Numeric value as a float; integers widen.
    pub fn as_f64(&self) -> Result<f64, EvalError> {
        match self {
            Value::Int(i) => Ok(*i as f64),
            Value::Float(f) => Ok(*f),
            other => Err(mismatch("Double", other)),
        }
    }

    pub fn as_str(&self) -> Result<&str, EvalError> {
        match self {
            Value::Str(s) => Ok(s),
            other => Err(mismatch("String", other)),
        }
    }

    pub fn as_record(&self) -> Result<&'a dyn Record, EvalError> {
        match self {
            Value::Record(r) => Ok(*r),
            other => Err(mismatch("record", other)),
        }
    }

    pub fn into_list(self) -> Result<Vec<Value<'a>>, EvalError> {
        match self {
            Value::List(items) => Ok(items),
            other => Err(mismatch("List", &other)),
        }
    }

    pub fn into_mods(self) -> Result<ModList<'a>, EvalError> {
        match self {
            Value::Mods(mods) => Ok(mods),
            other => Err(mismatch("ItemMod[]", &other)),
        }
    }

    pub fn into_predicate(self) -> Result<Callable<'a>, EvalError> {
        match self {
            Value::Predicate(f) => Ok(f),
            other => Err(mismatch("Func", &other)),
        }
    }

    pub fn into_string(self) -> Result<Cow<'a, str>, EvalError> {
        match self {
            Value::Str(s) => Ok(s),
            other => Err(mismatch("String", &other)),
        }
    }

    /// Elements of a list of strings.
    pub fn into_strings(self) -> Result<Vec<Cow<'a, str>>, EvalError> {
        self.into_list()?.into_iter().map(Value::into_string).collect()
    }

    /// Structural equality used by `Contains` and `==` on mixed operands.
    pub fn loosely_equals(&self, other: &Value<'_>) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                matches!((self.as_f64(), other.as_f64()), (Ok(a), Ok(b)) if a == b)
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loosely_equals(y))
            }
            (Value::Record(a), Value::Record(b)) => std::ptr::addr_eq(*a, *b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::List(items) => f.debug_list().entries(items).finish(),
            Value::Record(r) => write!(f, "<{}>", r.type_name()),
            Value::Mods(mods) => write!(f, "<{} mods>", mods.len()),
            Value::IntStats(t) => write!(f, "<{} stats>", t.len()),
            Value::FloatStats(t) => write!(f, "<{} stats>", t.len()),
            Value::Comparison(mode) => write!(f, "{:?}", mode),
            Value::Predicate(_) => write!(f, "<lambda>"),
        }
    }
}

/// Positional access to a helper's evaluated arguments.
///
/// Compiled helper calls are type-checked, so a mismatch here is a bug in
/// the helper table and surfaces as `EvalError::TypeMismatch`.
pub struct Args<'a> {
    inner: std::vec::IntoIter<Value<'a>>,
}

impl<'a> Args<'a> {
    pub fn new(args: Vec<Value<'a>>) -> Self {
        Self {
            inner: args.into_iter(),
        }
    }

    pub fn next(&mut self) -> Result<Value<'a>, EvalError> {
        self.inner
            .next()
            .ok_or_else(|| EvalError::TypeMismatch("missing argument".to_string()))
    }

    pub fn bool(&mut self) -> Result<bool, EvalError> {
        self.next()?.as_bool()
    }

    pub fn str(&mut self) -> Result<Cow<'a, str>, EvalError> {
        self.next()?.into_string()
    }

    pub fn strings(&mut self) -> Result<Vec<Cow<'a, str>>, EvalError> {
        self.next()?.into_strings()
    }

    pub fn floats(&mut self) -> Result<Vec<f64>, EvalError> {
        self.next()?.into_list()?.iter().map(Value::as_f64).collect()
    }

    pub fn list(&mut self) -> Result<Vec<Value<'a>>, EvalError> {
        self.next()?.into_list()
    }

    pub fn mods(&mut self) -> Result<ModList<'a>, EvalError> {
        self.next()?.into_mods()
    }

    pub fn predicate(&mut self) -> Result<Callable<'a>, EvalError> {
        self.next()?.into_predicate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_modes() {
        assert!(CaseMode::IgnoreCase.contains("Chaos Orb", "chaos"));
        assert!(!CaseMode::Ordinal.contains("Chaos Orb", "chaos"));
        assert!(CaseMode::IgnoreCase.equals("ABC", "abc"));
        assert!(CaseMode::Ordinal.starts_with("Vaal Orb", "Vaal"));
        assert!(CaseMode::IgnoreCase.ends_with("Vaal Orb", "ORB"));
    }

    #[test]
    fn test_numeric_widening() {
        assert_eq!(Value::Int(3).as_f64().unwrap(), 3.0);
        assert!(Value::Float(3.0).as_int().is_err());
        assert!(Value::Int(3).loosely_equals(&Value::Float(3.0)));
    }

    #[test]
    fn test_callable() {
        let positive = Callable::new(|v: Value<'_>| Ok(v.as_int()? > 0));
        assert!(positive.call(Value::Int(1)).unwrap());
        assert!(!positive.call(Value::Int(-1)).unwrap());
        assert!(positive.call(Value::str("x")).is_err());
    }

    #[test]
    fn test_args() {
        let names = vec!["a".to_string(), "b".to_string()];
        let mut args = Args::new(vec![Value::str_list(&names), Value::Bool(true)]);
        assert_eq!(args.strings().unwrap(), vec!["a", "b"]);
        assert!(args.bool().unwrap());
        assert!(args.next().is_err());
    }
}
