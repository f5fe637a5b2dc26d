//! Tree-walking interpreter for compiled rules.
//!
//! Every runtime failure is an `EvalError`; nothing here panics on bad
//! input. Lambda parameters live in `Frame::locals`, indexed by the slot the
//! compiler assigned.

use crate::compiler::{ArithOp, CmpOp, Lambda, Literal, Node, Operands, StrMap, StrTest};
use crate::error::EvalError;
use crate::schema::{Record, Schema};
use crate::stats::ModList;
use crate::value::{Callable, CaseMode, Value};
use std::borrow::Cow;
use std::cmp::Ordering;

struct Frame<'a, S> {
    root: &'a S,
    locals: Vec<Value<'a>>,
}

/// Evaluate a boolean tree against `item`.
pub(crate) fn run<'a, S: Schema>(node: &'a Node, item: &'a S) -> Result<bool, EvalError> {
    let mut frame = Frame {
        root: item,
        locals: Vec::new(),
    };
    eval(node, &mut frame)?.as_bool()
}

impl CmpOp {
    fn holds(self, ordering: Option<Ordering>) -> bool {
        match (self, ordering) {
            (CmpOp::Ne, None) => true,
            (_, None) => false,
            (CmpOp::Eq, Some(o)) => o == Ordering::Equal,
            (CmpOp::Ne, Some(o)) => o != Ordering::Equal,
            (CmpOp::Lt, Some(o)) => o == Ordering::Less,
            (CmpOp::Le, Some(o)) => o != Ordering::Greater,
            (CmpOp::Gt, Some(o)) => o == Ordering::Greater,
            (CmpOp::Ge, Some(o)) => o != Ordering::Less,
        }
    }
}

fn display(value: &Value<'_>) -> Result<String, EvalError> {
    Ok(match value {
        Value::Str(s) => s.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        other => return Err(EvalError::TypeMismatch(format!("cannot concatenate {}", other.kind()))),
    })
}

/// Elements of a list or modifier collection.
fn elements(value: Value<'_>) -> Result<Vec<Value<'_>>, EvalError> {
    match value {
        Value::List(items) => Ok(items),
        Value::Mods(mods) => Ok(mods.iter().map(|m| Value::Record(m as &dyn Record)).collect()),
        other => Err(EvalError::TypeMismatch(format!("{} is not a sequence", other.kind()))),
    }
}

fn with_local<'a, S, T>(
    frame: &mut Frame<'a, S>,
    value: Value<'a>,
    f: impl FnOnce(&mut Frame<'a, S>) -> Result<T, EvalError>,
) -> Result<T, EvalError> {
    frame.locals.push(value);
    let result = f(frame);
    frame.locals.pop();
    result
}

fn test<'a, S: Schema>(lambda: &'a Lambda, frame: &mut Frame<'a, S>, value: Value<'a>) -> Result<bool, EvalError> {
    with_local(frame, value, |frame| eval(&lambda.body, frame)?.as_bool())
}

fn apply<'a, S: Schema>(lambda: &'a Lambda, frame: &mut Frame<'a, S>, value: Value<'a>) -> Result<Value<'a>, EvalError> {
    with_local(frame, value, |frame| eval(&lambda.body, frame))
}

fn int_arith(op: ArithOp, l: i64, r: i64) -> Result<i64, EvalError> {
    Ok(match op {
        ArithOp::Add => l.wrapping_add(r),
        ArithOp::Sub => l.wrapping_sub(r),
        ArithOp::Mul => l.wrapping_mul(r),
        ArithOp::Div if r == 0 => return Err(EvalError::DivideByZero),
        ArithOp::Div => l.wrapping_div(r),
        ArithOp::Rem if r == 0 => return Err(EvalError::DivideByZero),
        ArithOp::Rem => l.wrapping_rem(r),
    })
}

fn float_arith(op: ArithOp, l: f64, r: f64) -> f64 {
    match op {
        ArithOp::Add => l + r,
        ArithOp::Sub => l - r,
        ArithOp::Mul => l * r,
        ArithOp::Div => l / r,
        ArithOp::Rem => l % r,
    }
}

/// Dispatch on the node kind. Anything beyond a few lines lives in its own
/// function, so one level of the tree costs one small stack frame.
fn eval<'a, S: Schema>(node: &'a Node, frame: &mut Frame<'a, S>) -> Result<Value<'a>, EvalError> {
    match node {
        Node::Const(literal) => Ok(constant(literal)),
        Node::Root => Ok(Value::Record(frame.root)),
        Node::Local(slot) => frame
            .locals
            .get(*slot)
            .cloned()
            .ok_or_else(|| EvalError::TypeMismatch(format!("unbound local {}", slot))),
        Node::Field { target, index } => field(target, *index, frame),
        Node::ToFloat(inner) => Ok(Value::Float(eval(inner, frame)?.as_f64()?)),
        Node::Not(inner) => Ok(Value::Bool(!eval(inner, frame)?.as_bool()?)),
        Node::Neg { operand, float } => negate(operand, *float, frame),
        Node::AllOf(operands) => all_of(operands, frame),
        Node::AnyOf(operands) => any_of(operands, frame),
        Node::Compare {
            op,
            operands,
            lhs,
            rhs,
        } => compare(*op, *operands, lhs, rhs, frame),
        Node::Arith { op, float, lhs, rhs } => arith(*op, *float, lhs, rhs, frame),
        Node::Concat(lhs, rhs) => concat(lhs, rhs, frame),
        Node::Conditional {
            cond,
            then,
            otherwise,
        } => {
            if eval(cond, frame)?.as_bool()? {
                eval(then, frame)
            } else {
                eval(otherwise, frame)
            }
        }
        Node::Array(items) => Ok(Value::List(eval_all(items, frame)?)),
        Node::Index { target, index } => index_list(target, index, frame),
        Node::StatIndex { target, key } => stat_index(target, key, frame),
        Node::StrLen(inner) => Ok(Value::Int(eval(inner, frame)?.as_str()?.chars().count() as i64)),
        Node::StrTest {
            test: kind,
            target,
            arg,
            mode,
        } => str_test(*kind, target, arg, mode.as_deref(), frame),
        Node::StrMap { map, target } => str_map(*map, target, frame),
        Node::Count { target, filter } => count(target, filter.as_ref(), frame),
        Node::Any { target, filter } => any(target, filter.as_ref(), frame),
        Node::All { target, filter } => all(target, filter, frame),
        Node::Contains { target, item } => contains(target, item, frame),
        Node::Where { target, filter } => filter_where(target, filter, frame),
        Node::Select { target, map } => select(target, map, frame),
        Node::Sum { target, map, float } => sum(target, map.as_ref(), *float, frame),
        Node::First { target, filter } => first(target, filter.as_ref(), frame),
        Node::GetStats(target) => Ok(Value::IntStats(eval(target, frame)?.into_mods()?.stats())),
        Node::StatsCount(target) => stats_count(target, frame),
        Node::ContainsKey { target, key } => contains_key(target, key, frame),
        Node::Helper { index, args } => call_helper(*index, args, frame),
        Node::Closure(lambda) => Ok(closure(lambda, frame)),
    }
}

fn constant(literal: &Literal) -> Value<'_> {
    match literal {
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Int(i) => Value::Int(*i),
        Literal::Float(f) => Value::Float(*f),
        Literal::Str(s) => Value::str(s),
        Literal::Comparison(mode) => Value::Comparison(*mode),
    }
}

fn eval_all<'a, S: Schema>(nodes: &'a [Node], frame: &mut Frame<'a, S>) -> Result<Vec<Value<'a>>, EvalError> {
    nodes.iter().map(|node| eval(node, frame)).collect()
}

fn field<'a, S: Schema>(target: &'a Node, index: usize, frame: &mut Frame<'a, S>) -> Result<Value<'a>, EvalError> {
    let record = eval(target, frame)?.as_record()?;
    record
        .field(index)
        .ok_or_else(|| EvalError::TypeMismatch(format!("{} has no field #{}", record.type_name(), index)))
}

fn negate<'a, S: Schema>(operand: &'a Node, float: bool, frame: &mut Frame<'a, S>) -> Result<Value<'a>, EvalError> {
    let v = eval(operand, frame)?;
    Ok(if float {
        Value::Float(-v.as_f64()?)
    } else {
        Value::Int(v.as_int()?.wrapping_neg())
    })
}

fn all_of<'a, S: Schema>(operands: &'a [Node], frame: &mut Frame<'a, S>) -> Result<Value<'a>, EvalError> {
    for operand in operands {
        if !eval(operand, frame)?.as_bool()? {
            return Ok(Value::Bool(false));
        }
    }
    Ok(Value::Bool(true))
}

fn any_of<'a, S: Schema>(operands: &'a [Node], frame: &mut Frame<'a, S>) -> Result<Value<'a>, EvalError> {
    for operand in operands {
        if eval(operand, frame)?.as_bool()? {
            return Ok(Value::Bool(true));
        }
    }
    Ok(Value::Bool(false))
}

fn compare<'a, S: Schema>(
    op: CmpOp,
    operands: Operands,
    lhs: &'a Node,
    rhs: &'a Node,
    frame: &mut Frame<'a, S>,
) -> Result<Value<'a>, EvalError> {
    let l = eval(lhs, frame)?;
    let r = eval(rhs, frame)?;
    let ordering = match operands {
        Operands::Int => Some(l.as_int()?.cmp(&r.as_int()?)),
        Operands::Float => l.as_f64()?.partial_cmp(&r.as_f64()?),
        Operands::Str => Some(l.as_str()?.cmp(r.as_str()?)),
        Operands::Bool => Some(l.as_bool()?.cmp(&r.as_bool()?)),
    };
    Ok(Value::Bool(op.holds(ordering)))
}

fn arith<'a, S: Schema>(
    op: ArithOp,
    float: bool,
    lhs: &'a Node,
    rhs: &'a Node,
    frame: &mut Frame<'a, S>,
) -> Result<Value<'a>, EvalError> {
    let l = eval(lhs, frame)?;
    let r = eval(rhs, frame)?;
    Ok(if float {
        Value::Float(float_arith(op, l.as_f64()?, r.as_f64()?))
    } else {
        Value::Int(int_arith(op, l.as_int()?, r.as_int()?)?)
    })
}

fn concat<'a, S: Schema>(lhs: &'a Node, rhs: &'a Node, frame: &mut Frame<'a, S>) -> Result<Value<'a>, EvalError> {
    let l = eval(lhs, frame)?;
    let r = eval(rhs, frame)?;
    Ok(Value::Str(Cow::Owned(display(&l)? + &display(&r)?)))
}

fn index_list<'a, S: Schema>(target: &'a Node, index: &'a Node, frame: &mut Frame<'a, S>) -> Result<Value<'a>, EvalError> {
    let items = elements(eval(target, frame)?)?;
    let i = eval(index, frame)?.as_int()?;
    let len = items.len();
    usize::try_from(i)
        .ok()
        .and_then(|i| items.into_iter().nth(i))
        .ok_or(EvalError::IndexOutOfRange { index: i, len })
}

fn not_stats(other: &Value<'_>) -> EvalError {
    EvalError::TypeMismatch(format!("{} is not a stat table", other.kind()))
}

fn stat_index<'a, S: Schema>(target: &'a Node, key: &'a Node, frame: &mut Frame<'a, S>) -> Result<Value<'a>, EvalError> {
    let table = eval(target, frame)?;
    let key = eval(key, frame)?;
    let key = key.as_str()?;
    match table {
        Value::IntStats(t) => Ok(Value::Int(t.get(key))),
        Value::FloatStats(t) => Ok(Value::Float(t.get(key))),
        other => Err(not_stats(&other)),
    }
}

fn stats_count<'a, S: Schema>(target: &'a Node, frame: &mut Frame<'a, S>) -> Result<Value<'a>, EvalError> {
    match eval(target, frame)? {
        Value::IntStats(t) => Ok(Value::Int(t.len() as i64)),
        Value::FloatStats(t) => Ok(Value::Int(t.len() as i64)),
        other => Err(not_stats(&other)),
    }
}

fn contains_key<'a, S: Schema>(target: &'a Node, key: &'a Node, frame: &mut Frame<'a, S>) -> Result<Value<'a>, EvalError> {
    let table = eval(target, frame)?;
    let key = eval(key, frame)?;
    let key = key.as_str()?;
    match table {
        Value::IntStats(t) => Ok(Value::Bool(t.contains_key(key))),
        Value::FloatStats(t) => Ok(Value::Bool(t.contains_key(key))),
        other => Err(not_stats(&other)),
    }
}

fn str_test<'a, S: Schema>(
    kind: StrTest,
    target: &'a Node,
    arg: &'a Node,
    mode: Option<&'a Node>,
    frame: &mut Frame<'a, S>,
) -> Result<Value<'a>, EvalError> {
    let haystack = eval(target, frame)?;
    let needle = eval(arg, frame)?;
    let mode = match mode {
        Some(mode) => match eval(mode, frame)? {
            Value::Comparison(mode) => mode,
            other => return Err(EvalError::TypeMismatch(format!("{} is not a StringComparison", other.kind()))),
        },
        None => CaseMode::Ordinal,
    };
    let (h, n) = (haystack.as_str()?, needle.as_str()?);
    Ok(Value::Bool(match kind {
        StrTest::Contains => mode.contains(h, n),
        StrTest::StartsWith => mode.starts_with(h, n),
        StrTest::EndsWith => mode.ends_with(h, n),
        StrTest::Equals => mode.equals(h, n),
    }))
}

fn str_map<'a, S: Schema>(map: StrMap, target: &'a Node, frame: &mut Frame<'a, S>) -> Result<Value<'a>, EvalError> {
    let s = eval(target, frame)?.into_string()?;
    Ok(Value::Str(match map {
        StrMap::ToLower => Cow::Owned(s.to_lowercase()),
        StrMap::ToUpper => Cow::Owned(s.to_uppercase()),
        StrMap::Trim => match s {
            Cow::Borrowed(b) => Cow::Borrowed(b.trim()),
            Cow::Owned(o) => Cow::Owned(o.trim().to_string()),
        },
    }))
}

fn count<'a, S: Schema>(target: &'a Node, filter: Option<&'a Lambda>, frame: &mut Frame<'a, S>) -> Result<Value<'a>, EvalError> {
    let target = eval(target, frame)?;
    let Some(filter) = filter else {
        let len = match target {
            Value::Mods(mods) => mods.len(),
            other => elements(other)?.len(),
        };
        return Ok(Value::Int(len as i64));
    };
    let mut count = 0;
    for item in elements(target)? {
        if test(filter, frame, item)? {
            count += 1;
        }
    }
    Ok(Value::Int(count))
}

fn any<'a, S: Schema>(target: &'a Node, filter: Option<&'a Lambda>, frame: &mut Frame<'a, S>) -> Result<Value<'a>, EvalError> {
    let items = elements(eval(target, frame)?)?;
    let Some(filter) = filter else {
        return Ok(Value::Bool(!items.is_empty()));
    };
    for item in items {
        if test(filter, frame, item)? {
            return Ok(Value::Bool(true));
        }
    }
    Ok(Value::Bool(false))
}

fn all<'a, S: Schema>(target: &'a Node, filter: &'a Lambda, frame: &mut Frame<'a, S>) -> Result<Value<'a>, EvalError> {
    for item in elements(eval(target, frame)?)? {
        if !test(filter, frame, item)? {
            return Ok(Value::Bool(false));
        }
    }
    Ok(Value::Bool(true))
}

fn contains<'a, S: Schema>(target: &'a Node, item: &'a Node, frame: &mut Frame<'a, S>) -> Result<Value<'a>, EvalError> {
    let items = elements(eval(target, frame)?)?;
    let wanted = eval(item, frame)?;
    Ok(Value::Bool(items.iter().any(|v| v.loosely_equals(&wanted))))
}

fn filter_where<'a, S: Schema>(target: &'a Node, filter: &'a Lambda, frame: &mut Frame<'a, S>) -> Result<Value<'a>, EvalError> {
    match eval(target, frame)? {
        Value::Mods(mods) => {
            let mut picked = Vec::new();
            for m in mods.iter() {
                if test(filter, frame, Value::Record(m))? {
                    picked.push(m);
                }
            }
            Ok(Value::Mods(ModList::Subset(picked)))
        }
        other => {
            let mut kept = Vec::new();
            for item in elements(other)? {
                if test(filter, frame, item.clone())? {
                    kept.push(item);
                }
            }
            Ok(Value::List(kept))
        }
    }
}

fn select<'a, S: Schema>(target: &'a Node, map: &'a Lambda, frame: &mut Frame<'a, S>) -> Result<Value<'a>, EvalError> {
    let mut mapped = Vec::new();
    for item in elements(eval(target, frame)?)? {
        mapped.push(apply(map, frame, item)?);
    }
    Ok(Value::List(mapped))
}

fn sum<'a, S: Schema>(
    target: &'a Node,
    map: Option<&'a Lambda>,
    float: bool,
    frame: &mut Frame<'a, S>,
) -> Result<Value<'a>, EvalError> {
    let mut int_sum: i64 = 0;
    let mut float_sum = 0.0;
    for item in elements(eval(target, frame)?)? {
        let v = match map {
            Some(map) => apply(map, frame, item)?,
            None => item,
        };
        if float {
            float_sum += v.as_f64()?;
        } else {
            int_sum = int_sum.wrapping_add(v.as_int()?);
        }
    }
    Ok(if float {
        Value::Float(float_sum)
    } else {
        Value::Int(int_sum)
    })
}

fn first<'a, S: Schema>(target: &'a Node, filter: Option<&'a Lambda>, frame: &mut Frame<'a, S>) -> Result<Value<'a>, EvalError> {
    for item in elements(eval(target, frame)?)? {
        let keep = match filter {
            Some(filter) => test(filter, frame, item.clone())?,
            None => true,
        };
        if keep {
            return Ok(item);
        }
    }
    Err(EvalError::EmptySequence)
}

fn call_helper<'a, S: Schema>(index: usize, args: &'a [Node], frame: &mut Frame<'a, S>) -> Result<Value<'a>, EvalError> {
    let helper = S::helpers()
        .get(index)
        .ok_or_else(|| EvalError::TypeMismatch(format!("unknown helper #{}", index)))?;
    let args = eval_all(args, frame)?;
    (helper.call)(frame.root, args)
}

fn closure<'a, S: Schema>(lambda: &'a Lambda, frame: &Frame<'a, S>) -> Value<'a> {
    let root = frame.root;
    let mut captured = frame.locals.clone();
    captured.truncate(lambda.slot);
    let body: &'a Node = &lambda.body;
    Value::Predicate(Callable::new(move |arg| {
        let mut inner = Frame {
            root,
            locals: captured.clone(),
        };
        inner.locals.push(arg);
        eval(body, &mut inner)?.as_bool()
    }))
}

#[cfg(test)]
mod tests {
    use crate::compiler::compile;
    use crate::error::EvalError;
    use crate::item::{ItemAttributes, ItemRarity, ItemSnapshot};

    fn item() -> ItemSnapshot {
        ItemSnapshot::new(ItemAttributes {
            base_name: "Vaal Regalia".into(),
            class_name: "Body Armour".into(),
            rarity: ItemRarity::Rare,
            item_level: 86,
            width: 2,
            height: 3,
            tags: vec!["body_armour".into(), "int_armour".into()],
            ..Default::default()
        })
    }

    fn check(text: &str) -> Result<bool, EvalError> {
        compile::<ItemSnapshot>(text).unwrap().evaluate(&item())
    }

    #[test]
    fn test_arithmetic() {
        assert!(check("Width * Height == 6").unwrap());
        assert!(check("7 / 2 == 3").unwrap());
        assert!(check("7 % 4 == 3").unwrap());
        assert!(check("7.0 / 2 == 3.5").unwrap());
        assert!(check("-ItemLevel < 0").unwrap());
    }

    #[test]
    fn test_divide_by_zero_faults() {
        assert_eq!(check("ItemLevel / 0 > 1"), Err(EvalError::DivideByZero));
        assert_eq!(check("ItemLevel % 0 > 1"), Err(EvalError::DivideByZero));
    }

    #[test]
    fn test_short_circuit() {
        assert!(!check("false && ItemLevel / 0 > 1").unwrap());
        assert!(check("true || ItemLevel / 0 > 1").unwrap());
        assert!(check("IsCorrupted || Width == 2 || ItemLevel / 0 > 1").unwrap());
        assert!(!check("Width == 2 && IsCorrupted && ItemLevel / 0 > 1").unwrap());
        assert_eq!(check("IsCorrupted || ItemLevel / 0 > 1 || true"), Err(EvalError::DivideByZero));
    }

    #[test]
    fn test_long_alternatives() {
        let mut alternatives = vec!["ItemLevel == 1"; 4000];
        assert!(!check(&alternatives.join(" || ")).unwrap());
        alternatives.push("ItemLevel == 86");
        assert!(check(&alternatives.join(" || ")).unwrap());
        assert!(check(&vec!["Width == 2"; 4000].join(" && ")).unwrap());
    }

    #[test]
    fn test_strings() {
        assert!(check("BaseName.Contains(\"Regalia\")").unwrap());
        assert!(!check("BaseName.Contains(\"regalia\")").unwrap());
        assert!(check("BaseName.Contains(\"regalia\", StringComparison.OrdinalIgnoreCase)").unwrap());
        assert!(check("BaseName.ToLower().StartsWith(\"vaal\")").unwrap());
        assert!(check("BaseName.Length == 12").unwrap());
        assert!(check("BaseName + \" \" + ItemLevel == \"Vaal Regalia 86\"").unwrap());
    }

    #[test]
    fn test_sequences() {
        assert!(check("Tags.Count == 2").unwrap());
        assert!(check("Tags.Any(it == \"int_armour\")").unwrap());
        assert!(check("Tags.All(t => t.EndsWith(\"armour\"))").unwrap());
        assert!(check("Tags.Contains(\"body_armour\")").unwrap());
        assert!(check("Tags.Where(t => t.StartsWith(\"int\")).Count() == 1").unwrap());
        assert!(check("Tags.Select(t => t.Length).Sum() == 21").unwrap());
        assert!(check("Tags.First() == \"body_armour\"").unwrap());
        assert!(check("new[] { 1, 2, 3 }.Sum() == 6").unwrap());
    }

    #[test]
    fn test_sequence_faults() {
        assert_eq!(
            check("Tags[5] == \"x\""),
            Err(EvalError::IndexOutOfRange { index: 5, len: 2 })
        );
        assert_eq!(check("Tags.First(t => t == \"x\") == \"x\""), Err(EvalError::EmptySequence));
    }

    #[test]
    fn test_conditional_widens() {
        assert!(check("(IsCorrupted ? 1 : 2.5) == 2.5").unwrap());
        assert!(check("iif(Rarity == ItemRarity.Rare, 1, 0) == 1").unwrap());
    }

    #[test]
    fn test_nested_lambdas_see_outer_parameters() {
        assert!(check("Tags.Any(a => Tags.Any(b => a != b && a.Length > b.Length))").unwrap());
    }
}
