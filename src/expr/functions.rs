//! The procedure registry: the standard-library surface from spec §6, split
//! into aggregating (`count`, `sum`, `avg`, `min`, `max`, `collect`) and
//! non-aggregating functions (spec §9 design note — the split is structural,
//! not a runtime flag). Grounded in the teacher's `eval_function`, with the
//! missing numeric/string/temporal functions it never implemented added.

use std::collections::HashMap;

use crate::expr::ExecutionContext;
use crate::model::{IsoDuration, Value};
use crate::{Error, Result};

const AGGREGATING: &[&str] = &["count", "sum", "avg", "min", "max", "collect"];

const NON_AGGREGATING: &[&str] = &[
    "size", "length", "head", "last", "tail", "range", "reverse",
    "tolower", "toupper", "trim", "ltrim", "rtrim", "substring", "replace", "split", "left", "right",
    "abs", "ceil", "floor", "round", "sign", "sqrt", "log", "log10", "exp",
    "sin", "cos", "tan", "asin", "acos", "atan", "atan2", "pi", "e", "rand",
    "exists", "coalesce",
    "tointeger", "toint", "tofloat", "tostring", "toboolean",
    "id", "elementid", "labels", "type", "properties", "keys", "nodes", "relationships", "rels",
    "date", "datetime", "time", "duration",
];

/// Whether a function name is one of the aggregating five (plus `collect`),
/// by name alone — used by the planner to decide whether a RETURN/WITH
/// projection needs an `Aggregation` operator instead of a plain `Project`.
pub fn is_aggregating_name(name: &str) -> bool {
    AGGREGATING.contains(&name.to_ascii_lowercase().as_str())
}

struct ProcedureSpec {
    aggregating: bool,
}

/// Dispatch table for built-in Cypher functions.
pub struct ProcedureRegistry {
    specs: HashMap<&'static str, ProcedureSpec>,
}

impl ProcedureRegistry {
    pub fn standard() -> Self {
        let mut specs = HashMap::new();
        for name in AGGREGATING {
            specs.insert(*name, ProcedureSpec { aggregating: true });
        }
        for name in NON_AGGREGATING {
            specs.insert(*name, ProcedureSpec { aggregating: false });
        }
        Self { specs }
    }

    pub fn is_aggregating(&self, name: &str) -> bool {
        self.specs
            .get(name.to_ascii_lowercase().as_str())
            .map(|s| s.aggregating)
            .unwrap_or(false)
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.specs.contains_key(name.to_ascii_lowercase().as_str())
    }

    pub fn call(&self, name: &str, args: Vec<Value>, ctx: &ExecutionContext) -> Result<Value> {
        let lower = name.to_ascii_lowercase();
        if !self.specs.contains_key(lower.as_str()) {
            return Err(Error::UnknownProcedure(name.to_string()));
        }
        dispatch(&lower, args, ctx)
    }
}

fn dispatch(name: &str, args: Vec<Value>, ctx: &ExecutionContext) -> Result<Value> {
    let _ = ctx;
    match name {
        "count" => Ok(Value::Int(count_non_null(&args)?)),
        "sum" => sum_values(&args),
        "avg" => avg_values(&args),
        "min" => reduce_extreme(&args, std::cmp::Ordering::Less),
        "max" => reduce_extreme(&args, std::cmp::Ordering::Greater),
        "collect" => Ok(Value::List(list_arg(&args)?.into_iter().filter(|v| !v.is_null()).collect())),

        "size" | "length" => match one(&args)? {
            Value::String(s) => Ok(Value::Int(s.chars().count() as i64)),
            Value::List(l) => Ok(Value::Int(l.len() as i64)),
            Value::Path(p) => Ok(Value::Int(p.len() as i64)),
            Value::Null => Ok(Value::Null),
            other => type_err("String, List, or Path", &other),
        },
        "head" => match one(&args)? {
            Value::List(l) => Ok(l.into_iter().next().unwrap_or(Value::Null)),
            Value::Null => Ok(Value::Null),
            other => type_err("List", &other),
        },
        "last" => match one(&args)? {
            Value::List(l) => Ok(l.into_iter().next_back().unwrap_or(Value::Null)),
            Value::Null => Ok(Value::Null),
            other => type_err("List", &other),
        },
        "tail" => match one(&args)? {
            Value::List(mut l) => {
                if !l.is_empty() {
                    l.remove(0);
                }
                Ok(Value::List(l))
            }
            Value::Null => Ok(Value::Null),
            other => type_err("List", &other),
        },
        "reverse" => match one(&args)? {
            Value::List(mut l) => {
                l.reverse();
                Ok(Value::List(l))
            }
            Value::String(s) => Ok(Value::String(s.chars().rev().collect())),
            Value::Null => Ok(Value::Null),
            other => type_err("List or String", &other),
        },
        "range" => range_fn(&args),

        "tolower" => string_fn(&args, |s| s.to_lowercase()),
        "toupper" => string_fn(&args, |s| s.to_uppercase()),
        "trim" => string_fn(&args, |s| s.trim().to_string()),
        "ltrim" => string_fn(&args, |s| s.trim_start().to_string()),
        "rtrim" => string_fn(&args, |s| s.trim_end().to_string()),
        "substring" => substring_fn(&args),
        "replace" => replace_fn(&args),
        "split" => split_fn(&args),
        "left" => left_right_fn(&args, true),
        "right" => left_right_fn(&args, false),

        "abs" => numeric_fn(&args, f64::abs, i64::wrapping_abs),
        "ceil" => float_fn(&args, f64::ceil),
        "floor" => float_fn(&args, f64::floor),
        "round" => float_fn(&args, f64::round),
        "sign" => numeric_fn(&args, f64::signum, i64::signum),
        "sqrt" => float_fn(&args, f64::sqrt),
        "log" => float_fn(&args, f64::ln),
        "log10" => float_fn(&args, f64::log10),
        "exp" => float_fn(&args, f64::exp),
        "sin" => float_fn(&args, f64::sin),
        "cos" => float_fn(&args, f64::cos),
        "tan" => float_fn(&args, f64::tan),
        "asin" => float_fn(&args, f64::asin),
        "acos" => float_fn(&args, f64::acos),
        "atan" => float_fn(&args, f64::atan),
        "atan2" => atan2_fn(&args),
        "pi" => Ok(Value::Float(std::f64::consts::PI)),
        "e" => Ok(Value::Float(std::f64::consts::E)),
        "rand" => Ok(Value::Float(pseudo_rand())),

        "exists" => Ok(Value::Bool(args.first().map(|v| !v.is_null()).unwrap_or(false))),
        "coalesce" => Ok(args.into_iter().find(|v| !v.is_null()).unwrap_or(Value::Null)),

        "tointeger" | "toint" => match one(&args)? {
            Value::Int(i) => Ok(Value::Int(i)),
            Value::Float(f) => Ok(Value::Int(f as i64)),
            Value::String(s) => Ok(s
                .trim()
                .parse::<i64>()
                .ok()
                .or_else(|| s.trim().parse::<f64>().ok().map(|f| f as i64))
                .map(Value::Int)
                .unwrap_or(Value::Null)),
            Value::Null => Ok(Value::Null),
            other => type_err("a value convertible to Integer", &other),
        },
        "tofloat" => match one(&args)? {
            Value::Float(f) => Ok(Value::Float(f)),
            Value::Int(i) => Ok(Value::Float(i as f64)),
            Value::String(s) => Ok(s.trim().parse::<f64>().map(Value::Float).unwrap_or(Value::Null)),
            Value::Null => Ok(Value::Null),
            other => type_err("a value convertible to Float", &other),
        },
        "tostring" => match one(&args)? {
            Value::Null => Ok(Value::Null),
            Value::String(s) => Ok(Value::String(s)),
            other => Ok(Value::String(format!("{other}"))),
        },
        "toboolean" => match one(&args)? {
            Value::Bool(b) => Ok(Value::Bool(b)),
            Value::String(s) => Ok(match s.to_ascii_lowercase().as_str() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => Value::Null,
            }),
            Value::Null => Ok(Value::Null),
            other => type_err("a value convertible to Boolean", &other),
        },

        "id" => match one(&args)? {
            Value::Node(n) => Ok(Value::Int(n.id.0 as i64)),
            Value::Relationship(r) => Ok(Value::Int(r.id.0 as i64)),
            other => type_err("Node or Relationship", &other),
        },
        "elementid" => match one(&args)? {
            Value::Node(n) => Ok(Value::String(n.element_id.clone().unwrap_or_else(|| n.id.to_string()))),
            Value::Relationship(r) => Ok(Value::String(r.element_id.clone().unwrap_or_else(|| r.id.to_string()))),
            other => type_err("Node or Relationship", &other),
        },
        "labels" => match one(&args)? {
            Value::Node(n) => Ok(Value::List(n.labels.iter().cloned().map(Value::String).collect())),
            Value::Null => Ok(Value::Null),
            other => type_err("Node", &other),
        },
        "type" => match one(&args)? {
            Value::Relationship(r) => Ok(Value::String(r.rel_type.clone())),
            Value::Null => Ok(Value::Null),
            other => type_err("Relationship", &other),
        },
        "properties" => match one(&args)? {
            Value::Node(n) => Ok(Value::Map(n.properties.clone())),
            Value::Relationship(r) => Ok(Value::Map(r.properties.clone())),
            other => type_err("Node or Relationship", &other),
        },
        "keys" => match one(&args)? {
            Value::Node(n) => Ok(Value::List(n.properties.keys().cloned().map(Value::String).collect())),
            Value::Relationship(r) => Ok(Value::List(r.properties.keys().cloned().map(Value::String).collect())),
            Value::Map(m) => Ok(Value::List(m.keys().cloned().map(Value::String).collect())),
            other => type_err("Node, Relationship, or Map", &other),
        },
        "nodes" => match one(&args)? {
            Value::Path(p) => Ok(Value::List(p.nodes.into_iter().map(|n| Value::Node(Box::new(n))).collect())),
            other => type_err("Path", &other),
        },
        "relationships" | "rels" => match one(&args)? {
            Value::Path(p) => Ok(Value::List(p.relationships.into_iter().map(|r| Value::Relationship(Box::new(r))).collect())),
            other => type_err("Path", &other),
        },

        "date" | "datetime" | "time" | "duration" => temporal_constructor(name, &args),

        _ => Err(Error::UnknownProcedure(name.to_string())),
    }
}

fn list_arg(args: &[Value]) -> Result<Vec<Value>> {
    match args.first() {
        Some(Value::List(l)) => Ok(l.clone()),
        Some(other) => Err(Error::TypeMismatch { expected: "List".into(), got: other.type_name().into() }),
        None => Ok(Vec::new()),
    }
}

fn count_non_null(args: &[Value]) -> Result<i64> {
    Ok(list_arg(args)?.iter().filter(|v| !v.is_null()).count() as i64)
}

fn sum_values(args: &[Value]) -> Result<Value> {
    let mut int_sum: i64 = 0;
    let mut float_sum: f64 = 0.0;
    let mut has_float = false;
    for v in list_arg(args)? {
        match v {
            Value::Int(i) => int_sum = int_sum.wrapping_add(i),
            Value::Float(f) => {
                has_float = true;
                float_sum += f;
            }
            Value::Null => {}
            other => return type_err("Integer or Float", &other),
        }
    }
    if has_float {
        Ok(Value::Float(int_sum as f64 + float_sum))
    } else {
        Ok(Value::Int(int_sum))
    }
}

fn avg_values(args: &[Value]) -> Result<Value> {
    let items: Vec<f64> = list_arg(args)?
        .into_iter()
        .filter(|v| !v.is_null())
        .map(|v| v.as_float().ok_or_else(|| Error::TypeMismatch { expected: "Integer or Float".into(), got: v.type_name().into() }))
        .collect::<Result<_>>()?;
    if items.is_empty() {
        return Ok(Value::Null);
    }
    Ok(Value::Float(items.iter().sum::<f64>() / items.len() as f64))
}

fn reduce_extreme(args: &[Value], want: std::cmp::Ordering) -> Result<Value> {
    let items: Vec<Value> = list_arg(args)?.into_iter().filter(|v| !v.is_null()).collect();
    Ok(items
        .into_iter()
        .reduce(|a, b| if a.neo4j_cmp(&b) == Some(want) { a } else { b })
        .unwrap_or(Value::Null))
}

fn one(args: &[Value]) -> Result<Value> {
    args.first()
        .cloned()
        .ok_or_else(|| Error::ProcedureArity { name: "<function>".into(), expected: 1, got: 0 })
}

fn type_err<T>(expected: &str, got: &Value) -> Result<T> {
    Err(Error::TypeMismatch { expected: expected.into(), got: got.type_name().into() })
}

fn string_fn(args: &[Value], f: impl Fn(&str) -> String) -> Result<Value> {
    match one(args)? {
        Value::String(s) => Ok(Value::String(f(&s))),
        Value::Null => Ok(Value::Null),
        other => type_err("String", &other),
    }
}

fn substring_fn(args: &[Value]) -> Result<Value> {
    let s = match args.first() {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => return Ok(Value::Null),
        Some(other) => return type_err("String", other),
    };
    let start = args.get(1).and_then(|v| v.as_int()).unwrap_or(0).max(0) as usize;
    let chars: Vec<char> = s.chars().collect();
    if start >= chars.len() {
        return Ok(Value::String(String::new()));
    }
    let len = args
        .get(2)
        .and_then(|v| v.as_int())
        .map(|l| l.max(0) as usize)
        .unwrap_or(chars.len() - start);
    let end = (start + len).min(chars.len());
    Ok(Value::String(chars[start..end].iter().collect()))
}

fn replace_fn(args: &[Value]) -> Result<Value> {
    match (args.first(), args.get(1), args.get(2)) {
        (Some(Value::String(orig)), Some(Value::String(search)), Some(Value::String(repl))) => {
            Ok(Value::String(orig.replace(search.as_str(), repl)))
        }
        (Some(Value::Null), ..) | (None, ..) => Ok(Value::Null),
        _ => Err(Error::InvalidArgument("replace() expects three String arguments".into())),
    }
}

fn split_fn(args: &[Value]) -> Result<Value> {
    match (args.first(), args.get(1)) {
        (Some(Value::String(s)), Some(Value::String(d))) => {
            Ok(Value::List(s.split(d.as_str()).map(|p| Value::String(p.to_string())).collect()))
        }
        (Some(Value::Null), _) | (None, _) => Ok(Value::Null),
        _ => Err(Error::InvalidArgument("split() expects two String arguments".into())),
    }
}

fn left_right_fn(args: &[Value], is_left: bool) -> Result<Value> {
    let s = match args.first() {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => return Ok(Value::Null),
        Some(other) => return type_err("String", other),
    };
    let chars: Vec<char> = s.chars().collect();
    let n = args.get(1).and_then(|v| v.as_int()).unwrap_or(0).max(0) as usize;
    let n = n.min(chars.len());
    let slice = if is_left { &chars[..n] } else { &chars[chars.len() - n..] };
    Ok(Value::String(slice.iter().collect()))
}

fn numeric_fn(args: &[Value], f_float: impl Fn(f64) -> f64, f_int: impl Fn(i64) -> i64) -> Result<Value> {
    match one(args)? {
        Value::Int(i) => Ok(Value::Int(f_int(i))),
        Value::Float(f) => Ok(Value::Float(f_float(f))),
        Value::Null => Ok(Value::Null),
        other => type_err("Numeric", &other),
    }
}

fn float_fn(args: &[Value], f: impl Fn(f64) -> f64) -> Result<Value> {
    match one(args)? {
        Value::Int(i) => Ok(Value::Float(f(i as f64))),
        Value::Float(v) => Ok(Value::Float(f(v))),
        Value::Null => Ok(Value::Null),
        other => type_err("Numeric", &other),
    }
}

fn atan2_fn(args: &[Value]) -> Result<Value> {
    match (args.first().and_then(|v| v.as_float()), args.get(1).and_then(|v| v.as_float())) {
        (Some(y), Some(x)) => Ok(Value::Float(y.atan2(x))),
        _ => Ok(Value::Null),
    }
}

fn range_fn(args: &[Value]) -> Result<Value> {
    let start = args
        .first()
        .and_then(|v| v.as_int())
        .ok_or_else(|| Error::InvalidArgument("range() requires integer bounds".into()))?;
    let end = args
        .get(1)
        .and_then(|v| v.as_int())
        .ok_or_else(|| Error::InvalidArgument("range() requires integer bounds".into()))?;
    let step = args.get(2).and_then(|v| v.as_int()).unwrap_or(1);
    if step == 0 {
        return Err(Error::InvalidArgument("range() step must not be zero".into()));
    }
    let mut list = Vec::new();
    let mut i = start;
    while (step > 0 && i <= end) || (step < 0 && i >= end) {
        list.push(Value::Int(i));
        i += step;
    }
    Ok(Value::List(list))
}

fn pseudo_rand() -> f64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.subsec_nanos()).unwrap_or(0);
    (nanos as f64 / u32::MAX as f64).fract()
}

fn temporal_constructor(name: &str, args: &[Value]) -> Result<Value> {
    match name {
        "date" => match args.first() {
            None => Ok(Value::Date(chrono::Utc::now().date_naive())),
            Some(Value::String(s)) => chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(Value::Date)
                .map_err(|_| Error::InvalidArgument(format!("invalid date string '{s}'"))),
            Some(other) => type_err("String", other),
        },
        "time" => match args.first() {
            None => Ok(Value::Time(chrono::Utc::now().time())),
            Some(Value::String(s)) => chrono::NaiveTime::parse_from_str(s, "%H:%M:%S")
                .map(Value::Time)
                .map_err(|_| Error::InvalidArgument(format!("invalid time string '{s}'"))),
            Some(other) => type_err("String", other),
        },
        "datetime" => match args.first() {
            None => Ok(Value::DateTime(chrono::Utc::now())),
            Some(Value::String(s)) => chrono::DateTime::parse_from_rfc3339(s)
                .map(|dt| Value::DateTime(dt.with_timezone(&chrono::Utc)))
                .map_err(|_| Error::InvalidArgument(format!("invalid datetime string '{s}'"))),
            Some(other) => type_err("String", other),
        },
        "duration" => match args.first() {
            Some(Value::String(s)) => parse_iso_duration(s),
            Some(other) => type_err("String", other),
            None => Err(Error::ProcedureArity { name: "duration".into(), expected: 1, got: 0 }),
        },
        _ => unreachable!(),
    }
}

/// Minimal `PnYnMnDTnHnMnS` parser — the subset of ISO-8601 durations Cypher
/// string literals use.
fn parse_iso_duration(s: &str) -> Result<Value> {
    let bail = || Error::InvalidArgument(format!("invalid ISO-8601 duration '{s}'"));
    let rest = s.strip_prefix('P').ok_or_else(bail)?;
    let (date_part, time_part) = rest.split_once('T').unwrap_or((rest, ""));

    let mut months = 0i64;
    let mut days = 0i64;
    let mut num = String::new();
    for c in date_part.chars() {
        if c.is_ascii_digit() {
            num.push(c);
            continue;
        }
        let n: i64 = num.parse().map_err(|_| bail())?;
        num.clear();
        match c {
            'Y' => months += n * 12,
            'M' => months += n,
            'W' => days += n * 7,
            'D' => days += n,
            _ => return Err(bail()),
        }
    }

    let mut seconds = 0i64;
    num.clear();
    for c in time_part.chars() {
        if c.is_ascii_digit() {
            num.push(c);
            continue;
        }
        let n: i64 = num.parse().map_err(|_| bail())?;
        num.clear();
        match c {
            'H' => seconds += n * 3600,
            'M' => seconds += n * 60,
            'S' => seconds += n,
            _ => return Err(bail()),
        }
    }

    Ok(Value::Duration(IsoDuration { months, days, seconds, nanoseconds: 0 }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_ignores_nulls() {
        let args = vec![Value::List(vec![Value::Int(1), Value::Null, Value::Int(2)])];
        assert_eq!(count_non_null(&args).unwrap(), 2);
    }

    #[test]
    fn test_sum_promotes_to_float_when_mixed() {
        let args = vec![Value::List(vec![Value::Int(1), Value::Float(2.5)])];
        assert_eq!(sum_values(&args).unwrap(), Value::Float(3.5));
    }

    #[test]
    fn test_range_descending_step() {
        let args = vec![Value::Int(5), Value::Int(1), Value::Int(-2)];
        assert_eq!(range_fn(&args).unwrap(), Value::List(vec![Value::Int(5), Value::Int(3), Value::Int(1)]));
    }

    #[test]
    fn test_substring_out_of_bounds_returns_empty() {
        let args = vec![Value::String("hi".into()), Value::Int(10)];
        assert_eq!(substring_fn(&args).unwrap(), Value::String(String::new()));
    }

    #[test]
    fn test_duration_parses_months_days_seconds() {
        let result = parse_iso_duration("P1Y2M10DT5H30M").unwrap();
        assert_eq!(
            result,
            Value::Duration(IsoDuration { months: 14, days: 10, seconds: 5 * 3600 + 30 * 60, nanoseconds: 0 })
        );
    }

    #[test]
    fn test_tointeger_from_string() {
        let graph = crate::storage::MemoryGraphModel::new();
        let ctx = crate::expr::ExecutionContext::new(crate::model::PropertyMap::new(), &graph, crate::tx::TxMode::ReadWrite).unwrap();
        let args = vec![Value::String(" 42 ".into())];
        assert_eq!(dispatch("tointeger", args, &ctx).unwrap(), Value::Int(42));
    }
}
