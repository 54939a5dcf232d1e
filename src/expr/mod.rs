//! Expression evaluation (spec §4.2): `eval`, `typeOf`, `aggregateEval`.
//!
//! Ported from the teacher's `execution::eval_expr`/`eval_binary_op` family,
//! restructured around an explicit `ExpressionContext` (per-row bindings) and
//! `ExecutionContext` (per-query parameters, graph handle, procedure
//! registry, regex cache, write journal) rather than one recursive function
//! threading a `Row`/`PropertyMap` pair through every call. Three-valued
//! logic is first-class throughout: `AND`/`OR`/`XOR` use proper Kleene
//! semantics instead of the teacher's truthiness short-circuit; `IN`
//! propagates `Null` per Kleene semantics, while the string predicates
//! (`STARTS WITH`/`ENDS WITH`/`CONTAINS`/`=~`) instead degrade a `Null`
//! operand to `Bool(false)`, matching the source's observed behavior.

pub mod functions;

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Datelike, Timelike};
use parking_lot::Mutex;

use crate::cypher::ast::{BinaryOp, Expr, Literal, StringOp, UnaryOp};
use crate::graph_model::{GraphModel, WriteJournal};
use crate::model::{LynxType, PropertyMap, Value};
use crate::tx::TxMode;
use crate::{Error, Result};
use functions::ProcedureRegistry;

/// Per-row variable bindings. Shared verbatim with the physical operator
/// tree — a plan node's output batch is `Vec<Bindings>`.
pub type Bindings = HashMap<String, Value>;

/// Per-query immutable state plus the single write journal for the run.
pub struct ExecutionContext<'a> {
    pub params: PropertyMap,
    pub graph: &'a dyn GraphModel,
    pub procedures: Arc<ProcedureRegistry>,
    regex_cache: Mutex<HashMap<String, Arc<regex::Regex>>>,
    pub write: Mutex<WriteJournal<'a>>,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(params: PropertyMap, graph: &'a dyn GraphModel, mode: TxMode) -> Result<Self> {
        Ok(Self {
            params,
            graph,
            procedures: Arc::new(ProcedureRegistry::standard()),
            regex_cache: Mutex::new(HashMap::new()),
            write: Mutex::new(WriteJournal::begin(graph, mode)?),
        })
    }

    /// Compiles `pattern` once and caches it by its source text (spec §9
    /// design note): repeated `=~` calls against the same literal pattern
    /// across rows reuse the same `Regex`.
    pub fn compiled_regex(&self, pattern: &str) -> Result<Arc<regex::Regex>> {
        let mut cache = self.regex_cache.lock();
        if let Some(re) = cache.get(pattern) {
            return Ok(re.clone());
        }
        let re = Arc::new(
            regex::Regex::new(pattern)
                .map_err(|e| Error::InvalidArgument(format!("invalid regular expression '{pattern}': {e}")))?,
        );
        cache.insert(pattern.to_string(), re.clone());
        Ok(re)
    }

    /// Consumes the context, handing the write journal back to the runner
    /// for the single commit/rollback decision per `run()`.
    pub fn into_write_journal(self) -> WriteJournal<'a> {
        self.write.into_inner()
    }
}

/// Per-row evaluation context: the enclosing query state plus this row's
/// variable bindings.
pub struct ExpressionContext<'a, 'b> {
    pub exec: &'b ExecutionContext<'a>,
    pub vars: Bindings,
}

impl<'a, 'b> ExpressionContext<'a, 'b> {
    pub fn new(exec: &'b ExecutionContext<'a>, vars: Bindings) -> Self {
        Self { exec, vars }
    }

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.exec.params.get(name)
    }
}

/// Evaluates `expr` against one row's bindings (spec §4.2).
pub fn eval(expr: &Expr, ctx: &ExpressionContext) -> Result<Value> {
    match expr {
        Expr::Literal(lit) => Ok(literal_value(lit)),
        Expr::Variable(name) => ctx
            .vars
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnboundVariable(name.clone())),
        Expr::Parameter(name) => ctx
            .param(name)
            .cloned()
            .ok_or_else(|| Error::UnknownParameter(name.clone())),
        Expr::Property { expr: inner, key } => eval_property(inner, key, ctx),
        Expr::FunctionCall { name, args, distinct } => eval_function_call(name, args, *distinct, ctx),
        Expr::BinaryOp { left, op, right } => eval_binary(left, *op, right, ctx),
        Expr::UnaryOp { op, expr: inner } => eval_unary(*op, inner, ctx),
        Expr::List(items) => Ok(Value::List(items.iter().map(|e| eval(e, ctx)).collect::<Result<_>>()?)),
        Expr::MapLiteral(entries) => {
            let mut map = HashMap::new();
            for (k, v) in entries {
                map.insert(k.clone(), eval(v, ctx)?);
            }
            Ok(Value::Map(map))
        }
        Expr::IsNull { expr: inner, negated } => {
            let is_null = eval(inner, ctx)?.is_null();
            Ok(Value::Bool(if *negated { !is_null } else { is_null }))
        }
        Expr::In { expr: item, list } => eval_in(item, list, ctx),
        Expr::HasLabel { expr: inner, label } => match eval(inner, ctx)? {
            Value::Null => Ok(Value::Null),
            Value::Node(n) => Ok(Value::Bool(n.has_label(label))),
            other => Err(Error::TypeMismatch { expected: "Node".into(), got: other.type_name().into() }),
        },
        Expr::StringOp { left, op, right } => eval_string_op(left, *op, right, ctx),
        Expr::ContainerIndex { expr: inner, index } => eval_container_index(inner, index, ctx),
        Expr::CountStar => Err(Error::PlanError(
            "count(*) may only appear directly inside an aggregation".into(),
        )),
        Expr::Star => Ok(Value::Null),
        Expr::Case { operand, whens, else_expr } => eval_case(operand, whens, else_expr, ctx),
        Expr::Exists(_) => Err(Error::PlanError(
            "EXISTS subqueries are expanded by the planner, not evaluated inline".into(),
        )),
    }
}

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Null => Value::Null,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Int(i) => Value::Int(*i),
        Literal::Float(f) => Value::Float(*f),
        Literal::String(s) => Value::String(s.clone()),
    }
}

fn eval_property(inner: &Expr, key: &str, ctx: &ExpressionContext) -> Result<Value> {
    let val = eval(inner, ctx)?;
    match val {
        Value::Null => Ok(Value::Null),
        Value::Node(ref n) => Ok(n.get(key).cloned().unwrap_or(Value::Null)),
        Value::Relationship(ref r) => Ok(r.properties.get(key).cloned().unwrap_or(Value::Null)),
        Value::Map(ref m) => Ok(m.get(key).cloned().unwrap_or(Value::Null)),
        Value::DateTime(_) | Value::LocalDateTime(_) | Value::Date(_) | Value::Time(_) => {
            temporal_property(&val, key)
        }
        other => Err(Error::TypeMismatch {
            expected: "Node, Relationship, Map, or temporal value".into(),
            got: other.type_name().into(),
        }),
    }
}

fn temporal_property(value: &Value, key: &str) -> Result<Value> {
    let (date_opt, time_opt) = match value {
        Value::DateTime(dt) => (Some(dt.naive_utc().date()), Some(dt.naive_utc().time())),
        Value::LocalDateTime(dt) => (Some(dt.date()), Some(dt.time())),
        Value::Date(d) => (Some(*d), None),
        Value::Time(t) => (None, Some(*t)),
        _ => unreachable!("temporal_property called with non-temporal value"),
    };
    let lower = key.to_ascii_lowercase();
    let result = match lower.as_str() {
        "year" => date_opt.map(|d| Value::Int(d.year() as i64)),
        "quarter" => date_opt.map(|d| Value::Int(d.month0() as i64 / 3 + 1)),
        "month" => date_opt.map(|d| Value::Int(d.month() as i64)),
        "week" => date_opt.map(|d| Value::Int(d.iso_week().week() as i64)),
        "day" | "dayofmonth" => date_opt.map(|d| Value::Int(d.day() as i64)),
        "dayofyear" => date_opt.map(|d| Value::Int(d.ordinal() as i64)),
        "dayofweek" => date_opt.map(|d| Value::Int(d.weekday().number_from_monday() as i64)),
        "hour" => time_opt.map(|t| Value::Int(t.hour() as i64)),
        "minute" => time_opt.map(|t| Value::Int(t.minute() as i64)),
        "second" => time_opt.map(|t| Value::Int(t.second() as i64)),
        "millisecond" => time_opt.map(|t| Value::Int((t.nanosecond() / 1_000_000) as i64)),
        "microsecond" => time_opt.map(|t| Value::Int((t.nanosecond() / 1_000) as i64)),
        "nanosecond" => time_opt.map(|t| Value::Int(t.nanosecond() as i64)),
        "offset" => matches!(value, Value::DateTime(_)).then(|| Value::String("Z".to_string())),
        "epochseconds" => match value {
            Value::DateTime(dt) => Some(Value::Int(dt.timestamp())),
            _ => None,
        },
        "epochmillis" => match value {
            Value::DateTime(dt) => Some(Value::Int(dt.timestamp_millis())),
            _ => None,
        },
        _ => return Err(Error::UnsupportedTemporalAccessor(key.to_string())),
    };
    result.ok_or_else(|| Error::UnsupportedTemporalAccessor(key.to_string()))
}

fn truthy3(v: &Value) -> Option<bool> {
    match v {
        Value::Bool(b) => Some(*b),
        _ => None,
    }
}

fn kleene_and(a: &Value, b: &Value) -> Value {
    match (truthy3(a), truthy3(b)) {
        (Some(false), _) | (_, Some(false)) => Value::Bool(false),
        (Some(true), Some(true)) => Value::Bool(true),
        _ => Value::Null,
    }
}

fn kleene_or(a: &Value, b: &Value) -> Value {
    match (truthy3(a), truthy3(b)) {
        (Some(true), _) | (_, Some(true)) => Value::Bool(true),
        (Some(false), Some(false)) => Value::Bool(false),
        _ => Value::Null,
    }
}

fn eval_binary(left: &Expr, op: BinaryOp, right: &Expr, ctx: &ExpressionContext) -> Result<Value> {
    match op {
        BinaryOp::And => {
            let lv = eval(left, ctx)?;
            if let Value::Bool(false) = lv {
                return Ok(Value::Bool(false));
            }
            let rv = eval(right, ctx)?;
            Ok(kleene_and(&lv, &rv))
        }
        BinaryOp::Or => {
            let lv = eval(left, ctx)?;
            if let Value::Bool(true) = lv {
                return Ok(Value::Bool(true));
            }
            let rv = eval(right, ctx)?;
            Ok(kleene_or(&lv, &rv))
        }
        BinaryOp::Xor => {
            let lv = eval(left, ctx)?;
            let rv = eval(right, ctx)?;
            match (truthy3(&lv), truthy3(&rv)) {
                (Some(a), Some(b)) => Ok(Value::Bool(a ^ b)),
                _ => Ok(Value::Null),
            }
        }
        BinaryOp::RegexMatch => {
            let lv = eval(left, ctx)?;
            let rv = eval(right, ctx)?;
            // Same Null-to-false rule as the other string predicates below.
            if lv.is_null() || rv.is_null() {
                return Ok(Value::Bool(false));
            }
            match (&lv, &rv) {
                (Value::String(s), Value::String(pattern)) => {
                    let re = ctx.exec.compiled_regex(pattern)?;
                    Ok(Value::Bool(re.is_match(s)))
                }
                _ => Err(Error::TypeMismatch {
                    expected: "String".into(),
                    got: format!("{}, {}", lv.type_name(), rv.type_name()),
                }),
            }
        }
        _ => {
            let lv = eval(left, ctx)?;
            let rv = eval(right, ctx)?;
            eval_binary_values(&lv, op, &rv)
        }
    }
}

fn three_valued(b: Option<bool>) -> Value {
    match b {
        Some(x) => Value::Bool(x),
        None => Value::Null,
    }
}

fn eval_binary_values(left: &Value, op: BinaryOp, right: &Value) -> Result<Value> {
    match op {
        BinaryOp::Eq => Ok(three_valued(left.value_eq(right))),
        BinaryOp::Neq => Ok(three_valued(left.value_eq(right).map(|b| !b))),
        BinaryOp::Gt => Ok(three_valued(left.neo4j_cmp(right).map(|o| o == Ordering::Greater))),
        BinaryOp::Gte => Ok(three_valued(left.neo4j_cmp(right).map(|o| o != Ordering::Less))),
        // LessThan(a, b) := GreaterThan(b, a); likewise for <=.
        BinaryOp::Lt => eval_binary_values(right, BinaryOp::Gt, left),
        BinaryOp::Lte => eval_binary_values(right, BinaryOp::Gte, left),
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod | BinaryOp::Pow => {
            if left.is_null() || right.is_null() {
                return Ok(Value::Null);
            }
            eval_arithmetic(left, op, right)
        }
        BinaryOp::And | BinaryOp::Or | BinaryOp::Xor | BinaryOp::RegexMatch => {
            unreachable!("handled in eval_binary before values are evaluated")
        }
    }
}

fn eval_arithmetic(left: &Value, op: BinaryOp, right: &Value) -> Result<Value> {
    match (left, right) {
        (Value::String(a), Value::String(b)) if op == BinaryOp::Add => Ok(Value::String(format!("{a}{b}"))),
        (Value::List(a), Value::List(b)) if op == BinaryOp::Add => {
            let mut out = a.clone();
            out.extend(b.clone());
            Ok(Value::List(out))
        }
        // Integer overflow wraps rather than panicking or promoting to Float.
        (Value::Int(a), Value::Int(b)) => {
            let result = match op {
                BinaryOp::Add => a.wrapping_add(*b),
                BinaryOp::Sub => a.wrapping_sub(*b),
                BinaryOp::Mul => a.wrapping_mul(*b),
                BinaryOp::Div => {
                    if *b == 0 {
                        return Err(Error::InvalidArgument("division by zero".into()));
                    }
                    a.wrapping_div(*b)
                }
                BinaryOp::Mod => {
                    if *b == 0 {
                        return Err(Error::InvalidArgument("modulo by zero".into()));
                    }
                    a.wrapping_rem(*b)
                }
                BinaryOp::Pow => return Ok(Value::Float((*a as f64).powf(*b as f64))),
                _ => unreachable!(),
            };
            Ok(Value::Int(result))
        }
        (a, b) if a.is_numeric() && b.is_numeric() => {
            let af = a.as_float().expect("numeric Value always converts to f64");
            let bf = b.as_float().expect("numeric Value always converts to f64");
            let result = match op {
                BinaryOp::Add => af + bf,
                BinaryOp::Sub => af - bf,
                BinaryOp::Mul => af * bf,
                BinaryOp::Div => af / bf,
                BinaryOp::Mod => af % bf,
                BinaryOp::Pow => af.powf(bf),
                _ => unreachable!(),
            };
            Ok(Value::Float(result))
        }
        _ => Err(Error::TypeMismatch {
            expected: "numeric, string, or list operands".into(),
            got: format!("{:?} between {} and {}", op, left.type_name(), right.type_name()),
        }),
    }
}

fn eval_unary(op: UnaryOp, inner: &Expr, ctx: &ExpressionContext) -> Result<Value> {
    let val = eval(inner, ctx)?;
    match op {
        UnaryOp::Not => match val {
            Value::Null => Ok(Value::Null),
            Value::Bool(b) => Ok(Value::Bool(!b)),
            other => Err(Error::TypeMismatch { expected: "Boolean".into(), got: other.type_name().into() }),
        },
        UnaryOp::Negate => match val {
            Value::Null => Ok(Value::Null),
            Value::Int(i) => Ok(Value::Int(i.wrapping_neg())),
            Value::Float(f) => Ok(Value::Float(-f)),
            other => Err(Error::TypeMismatch { expected: "Numeric".into(), got: other.type_name().into() }),
        },
    }
}

fn eval_in(item: &Expr, list: &Expr, ctx: &ExpressionContext) -> Result<Value> {
    let item_val = eval(item, ctx)?;
    let list_val = eval(list, ctx)?;
    let items = match list_val {
        Value::Null => return Ok(Value::Null),
        Value::List(items) => items,
        other => return Err(Error::TypeMismatch { expected: "List".into(), got: other.type_name().into() }),
    };
    if item_val.is_null() {
        return Ok(Value::Null);
    }
    let mut saw_null = false;
    for candidate in &items {
        match item_val.value_eq(candidate) {
            Some(true) => return Ok(Value::Bool(true)),
            Some(false) => {}
            None => saw_null = true,
        }
    }
    Ok(if saw_null { Value::Null } else { Value::Bool(false) })
}

/// `StartsWith`/`EndsWith`/`Contains`: a `Null` operand on either side
/// yields `Bool(false)` rather than propagating `Null`.
fn eval_string_op(left: &Expr, op: StringOp, right: &Expr, ctx: &ExpressionContext) -> Result<Value> {
    let lv = eval(left, ctx)?;
    let rv = eval(right, ctx)?;
    // A Null operand yields Bool(false) here rather than propagating Null —
    // observed source behavior (`"foo" STARTS WITH null` is `false`), unlike
    // every other null-propagating operator in this module.
    if lv.is_null() || rv.is_null() {
        return Ok(Value::Bool(false));
    }
    match (&lv, &rv) {
        (Value::String(a), Value::String(b)) => {
            let result = match op {
                StringOp::StartsWith => a.starts_with(b.as_str()),
                StringOp::EndsWith => a.ends_with(b.as_str()),
                StringOp::Contains => a.contains(b.as_str()),
            };
            Ok(Value::Bool(result))
        }
        _ => Err(Error::TypeMismatch {
            expected: "String".into(),
            got: format!("{}, {}", lv.type_name(), rv.type_name()),
        }),
    }
}

fn eval_container_index(inner: &Expr, index: &Expr, ctx: &ExpressionContext) -> Result<Value> {
    let container = eval(inner, ctx)?;
    let idx = eval(index, ctx)?;
    match (&container, &idx) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::Node(n), Value::String(key)) => Ok(n.get(key).cloned().unwrap_or(Value::Null)),
        (Value::Relationship(r), Value::String(key)) => Ok(r.properties.get(key).cloned().unwrap_or(Value::Null)),
        (Value::Map(m), Value::String(key)) => Ok(m.get(key).cloned().unwrap_or(Value::Null)),
        (Value::List(items), Value::Int(i)) => {
            let idx = if *i < 0 { items.len() as i64 + i } else { *i };
            if idx < 0 {
                return Ok(Value::Null);
            }
            Ok(items.get(idx as usize).cloned().unwrap_or(Value::Null))
        }
        (other, idx) => Err(Error::TypeMismatch {
            expected: "List/Map/Node/Relationship indexed by Integer/String".into(),
            got: format!("{}[{}]", other.type_name(), idx.type_name()),
        }),
    }
}

fn eval_case(
    operand: &Option<Box<Expr>>,
    whens: &[(Expr, Expr)],
    else_expr: &Option<Box<Expr>>,
    ctx: &ExpressionContext,
) -> Result<Value> {
    if let Some(op) = operand {
        let op_val = eval(op, ctx)?;
        if !op_val.is_null() {
            for (when_expr, then_expr) in whens {
                let when_val = eval(when_expr, ctx)?;
                let matched = match &when_val {
                    Value::Bool(b) => *b,
                    _ => op_val.value_eq(&when_val) == Some(true),
                };
                if matched {
                    return eval(then_expr, ctx);
                }
            }
        }
    } else {
        for (when_expr, then_expr) in whens {
            if let Value::Bool(true) = eval(when_expr, ctx)? {
                return eval(then_expr, ctx);
            }
        }
    }
    match else_expr {
        Some(e) => eval(e, ctx),
        None => Ok(Value::Null),
    }
}

fn eval_function_call(name: &str, args: &[Expr], distinct: bool, ctx: &ExpressionContext) -> Result<Value> {
    let _ = distinct;
    if ctx.exec.procedures.is_aggregating(name) {
        // A bare `eval` of an aggregating call (i.e. not reached through
        // `aggregate_eval`) only happens when the planner projects it
        // outside an Aggregation operator, which is itself a plan error the
        // physical layer rejects before execution reaches here. Fall back to
        // evaluating this row's argument so a defensive caller still gets a
        // value rather than a panic.
        return match args.first() {
            Some(a) => eval(a, ctx),
            None => Ok(Value::Null),
        };
    }
    let arg_vals: Vec<Value> = args.iter().map(|a| eval(a, ctx)).collect::<Result<_>>()?;
    ctx.exec.procedures.call(name, arg_vals, ctx.exec)
}

/// Static type inference used to build operator schemas (spec §4.2).
pub fn type_of(expr: &Expr, env: &HashMap<String, LynxType>) -> LynxType {
    match expr {
        Expr::Literal(Literal::Bool(_)) => LynxType::Boolean,
        Expr::Literal(Literal::String(_)) => LynxType::String,
        Expr::Literal(Literal::Int(_)) => LynxType::Integer,
        Expr::Literal(Literal::Float(_)) => LynxType::Float,
        Expr::Literal(Literal::Null) => LynxType::Null,
        Expr::CountStar => LynxType::Integer,
        Expr::FunctionCall { name, args, .. } => match name.to_ascii_lowercase().as_str() {
            "collect" => LynxType::List(Box::new(args.first().map(|a| type_of(a, env)).unwrap_or(LynxType::Any))),
            "count" | "id" => LynxType::Integer,
            "sum" | "avg" => LynxType::Number,
            "tostring" => LynxType::String,
            "toboolean" => LynxType::Boolean,
            "labels" | "keys" | "nodes" | "relationships" | "rels" | "range" => LynxType::List(Box::new(LynxType::Any)),
            _ => LynxType::Any,
        },
        Expr::ContainerIndex { expr: inner, .. } => match type_of(inner, env) {
            LynxType::List(elem) => *elem,
            _ => LynxType::Any,
        },
        Expr::List(items) => LynxType::List(Box::new(items.first().map(|e| type_of(e, env)).unwrap_or(LynxType::Any))),
        Expr::Variable(name) => env.get(name).cloned().unwrap_or(LynxType::Any),
        Expr::IsNull { .. } | Expr::HasLabel { .. } | Expr::StringOp { .. } => LynxType::Boolean,
        Expr::BinaryOp { op, .. } if matches!(op, BinaryOp::Eq | BinaryOp::Neq | BinaryOp::Lt | BinaryOp::Lte | BinaryOp::Gt | BinaryOp::Gte | BinaryOp::And | BinaryOp::Or | BinaryOp::Xor | BinaryOp::RegexMatch) => {
            LynxType::Boolean
        }
        _ => LynxType::Any,
    }
}

/// Folds `expr` (an aggregating function call, or `count(*)`) over a group
/// of bound rows (spec §4.2). A non-aggregating expression reaching this
/// function is a planner bug — it must be fatal, unlike the teacher's
/// lenient first-row fallback.
pub fn aggregate_eval(expr: &Expr, group: &[Bindings], ctx: &ExecutionContext) -> Result<Value> {
    match expr {
        Expr::CountStar => Ok(Value::Int(group.len() as i64)),
        Expr::FunctionCall { name, args, distinct } => {
            if !ctx.procedures.is_aggregating(name) {
                return Err(Error::NonAggregatingInAggregateContext(name.clone()));
            }
            let arg = args
                .first()
                .ok_or_else(|| Error::ProcedureArity { name: name.clone(), expected: 1, got: 0 })?;
            let mut values = Vec::with_capacity(group.len());
            for vars in group {
                let ectx = ExpressionContext::new(ctx, vars.clone());
                values.push(eval(arg, &ectx)?);
            }
            if *distinct {
                let mut deduped: Vec<Value> = Vec::new();
                for v in values {
                    if !deduped.iter().any(|d| d.value_eq(&v) == Some(true)) {
                        deduped.push(v);
                    }
                }
                values = deduped;
            }
            ctx.procedures.call(name, vec![Value::List(values)], ctx)
        }
        other => Err(Error::NonAggregatingInAggregateContext(format!("{other:?}"))),
    }
}
