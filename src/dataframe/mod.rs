//! Schema + restartable row-batch abstraction (spec §4.3).
//!
//! The physical operator tree works over name-keyed variable bindings
//! (`expr::Bindings`) internally, the same representation the teacher's
//! execution engine used; `DataFrame` is the schema-disciplined, positional
//! view of a result set used at the runner/result boundary and by callers
//! who want the generic `project`/`filter`/`groupBy`/... algebra directly.

use std::collections::HashMap;
use std::cmp::Ordering;

use crate::cypher::ast::Expr;
use crate::expr::{self, Bindings, ExecutionContext, ExpressionContext};
use crate::model::{LynxType, Value};
use crate::{Error, Result};

/// An ordered, named, immutable column list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema(Vec<(String, LynxType)>);

impl Schema {
    pub fn new(fields: Vec<(String, LynxType)>) -> Self {
        Self(fields)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn fields(&self) -> &[(String, LynxType)] {
        &self.0
    }

    pub fn names(&self) -> Vec<String> {
        self.0.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|(n, _)| n == name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A fixed-length tuple of values matching a `Schema` positionally.
#[derive(Debug, Clone, PartialEq)]
pub struct Row(pub Vec<Value>);

impl Row {
    pub fn get<'a>(&'a self, schema: &Schema, name: &str) -> Option<&'a Value> {
        schema.index_of(name).and_then(|i| self.0.get(i))
    }

    pub fn to_bindings(&self, schema: &Schema) -> Bindings {
        schema.names().into_iter().zip(self.0.iter().cloned()).collect()
    }

    pub fn from_bindings(schema: &Schema, bindings: &Bindings) -> Self {
        Row(schema.names().iter().map(|n| bindings.get(n).cloned().unwrap_or(Value::Null)).collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    LeftOuter,
}

/// A schema plus a restartable sequence of rows (spec §4.3).
#[derive(Debug, Clone)]
pub struct DataFrame {
    schema: Schema,
    rows: Vec<Row>,
}

impl DataFrame {
    pub fn new(schema: Schema, rows: Vec<Row>) -> Self {
        Self { schema, rows }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn project(&self, items: &[(Expr, String)], ctx: &ExecutionContext) -> Result<DataFrame> {
        let env: HashMap<String, LynxType> = self.schema.fields().iter().cloned().collect();
        let fields = items.iter().map(|(e, alias)| (alias.clone(), expr::type_of(e, &env))).collect();
        let new_schema = Schema::new(fields);

        let mut rows = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let ectx = ExpressionContext::new(ctx, row.to_bindings(&self.schema));
            let mut values = Vec::with_capacity(items.len());
            for (e, _) in items {
                values.push(expr::eval(e, &ectx)?);
            }
            rows.push(Row(values));
        }
        Ok(DataFrame::new(new_schema, rows))
    }

    pub fn filter(&self, pred: &Expr, ctx: &ExecutionContext) -> Result<DataFrame> {
        let mut rows = Vec::new();
        for row in &self.rows {
            let ectx = ExpressionContext::new(ctx, row.to_bindings(&self.schema));
            if let Value::Bool(true) = expr::eval(pred, &ectx)? {
                rows.push(row.clone());
            }
        }
        Ok(DataFrame::new(self.schema.clone(), rows))
    }

    pub fn group_by(
        &self,
        groupings: &[(Expr, String)],
        aggregations: &[(Expr, String)],
        ctx: &ExecutionContext,
    ) -> Result<DataFrame> {
        let env: HashMap<String, LynxType> = self.schema.fields().iter().cloned().collect();
        let mut fields = Vec::new();
        for (_, alias) in groupings {
            fields.push((alias.clone(), LynxType::Any));
        }
        for (e, alias) in aggregations {
            fields.push((alias.clone(), expr::type_of(e, &env)));
        }
        let schema = Schema::new(fields);

        if groupings.is_empty() && self.rows.is_empty() {
            let mut values = Vec::with_capacity(aggregations.len());
            for (e, _) in aggregations {
                values.push(expr::aggregate_eval(e, &[], ctx)?);
            }
            return Ok(DataFrame::new(schema, vec![Row(values)]));
        }

        let mut groups: Vec<(Vec<Value>, Vec<Bindings>)> = Vec::new();
        for row in &self.rows {
            let vars = row.to_bindings(&self.schema);
            let ectx = ExpressionContext::new(ctx, vars.clone());
            let mut key = Vec::with_capacity(groupings.len());
            for (e, _) in groupings {
                key.push(expr::eval(e, &ectx)?);
            }
            if let Some(group) = groups.iter_mut().find(|(k, _)| *k == key) {
                group.1.push(vars);
            } else {
                groups.push((key, vec![vars]));
            }
        }

        let mut rows = Vec::with_capacity(groups.len());
        for (key, members) in &groups {
            let mut values = key.clone();
            for (e, _) in aggregations {
                values.push(expr::aggregate_eval(e, members, ctx)?);
            }
            rows.push(Row(values));
        }
        Ok(DataFrame::new(schema, rows))
    }

    pub fn order_by(&self, keys: &[(Expr, bool)], ctx: &ExecutionContext) -> Result<DataFrame> {
        let mut indexed: Vec<(usize, Row)> = self.rows.iter().cloned().enumerate().collect();
        let mut key_vals: Vec<Vec<Value>> = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let ectx = ExpressionContext::new(ctx, row.to_bindings(&self.schema));
            let mut vals = Vec::with_capacity(keys.len());
            for (e, _) in keys {
                vals.push(expr::eval(e, &ectx)?);
            }
            key_vals.push(vals);
        }
        indexed.sort_by(|(ia, _), (ib, _)| {
            for (ki, (_, asc)) in keys.iter().enumerate() {
                let ord = cypher_order(&key_vals[*ia][ki], &key_vals[*ib][ki], *asc);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
        Ok(DataFrame::new(self.schema.clone(), indexed.into_iter().map(|(_, r)| r).collect()))
    }

    pub fn skip(&self, n: i64) -> Result<DataFrame> {
        if n < 0 {
            return Err(Error::InvalidArgument("SKIP requires a non-negative integer".into()));
        }
        Ok(DataFrame::new(self.schema.clone(), self.rows.iter().skip(n as usize).cloned().collect()))
    }

    pub fn take(&self, n: i64) -> Result<DataFrame> {
        if n < 0 {
            return Err(Error::InvalidArgument("LIMIT requires a non-negative integer".into()));
        }
        Ok(DataFrame::new(self.schema.clone(), self.rows.iter().take(n as usize).cloned().collect()))
    }

    pub fn distinct(&self) -> DataFrame {
        let mut seen: Vec<Row> = Vec::new();
        let mut rows = Vec::new();
        for row in &self.rows {
            if !seen.contains(row) {
                seen.push(row.clone());
                rows.push(row.clone());
            }
        }
        DataFrame::new(self.schema.clone(), rows)
    }

    pub fn join(&self, other: &DataFrame, columns: &[(String, String)], kind: JoinKind) -> Result<DataFrame> {
        let mut fields = self.schema.fields().to_vec();
        for (name, ty) in other.schema.fields() {
            if !fields.iter().any(|(n, _)| n == name) {
                fields.push((name.clone(), ty.clone()));
            }
        }
        let schema = Schema::new(fields);

        let mut rows = Vec::new();
        for lrow in &self.rows {
            let lvars = lrow.to_bindings(&self.schema);
            let mut matched = false;
            for rrow in &other.rows {
                let rvars = rrow.to_bindings(&other.schema);
                let eq = columns.is_empty()
                    || columns.iter().all(|(lc, rc)| {
                        let lv = lvars.get(lc).unwrap_or(&Value::Null);
                        let rv = rvars.get(rc).unwrap_or(&Value::Null);
                        lv.value_eq(rv) == Some(true)
                    });
                if eq {
                    matched = true;
                    let mut merged = lvars.clone();
                    merged.extend(rvars);
                    rows.push(Row::from_bindings(&schema, &merged));
                }
            }
            if !matched && kind == JoinKind::LeftOuter {
                rows.push(Row::from_bindings(&schema, &lvars));
            }
        }
        Ok(DataFrame::new(schema, rows))
    }
}

/// Total order per spec §4.1: mixed-family comparisons fall back to `Equal`
/// (neither value is promoted ahead of the other); `Null` sorts last
/// ascending, first descending, regardless of the `asc` flag's effect on
/// comparable values.
pub(crate) fn cypher_order(a: &Value, b: &Value, ascending: bool) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return if ascending { Ordering::Greater } else { Ordering::Less },
        (false, true) => return if ascending { Ordering::Less } else { Ordering::Greater },
        (false, false) => {}
    }
    let ord = a.neo4j_cmp(b).unwrap_or(Ordering::Equal);
    if ascending {
        ord
    } else {
        ord.reverse()
    }
}
