use std::cmp::Ordering;
use std::collections::HashMap;

use crate::cypher::ast::Expr;
use crate::dataframe::{cypher_order, Schema};
use crate::expr::{self, Bindings, ExecutionContext, ExpressionContext};
use crate::model::{LynxType, Value};
use crate::physical::{Buffered, Operator, OperatorState, RowBatch};
use crate::Result;

/// WITH (spec §4.4): a pipeline boundary — `Project` plus optional
/// `Distinct`, `OrderBy`, and `Skip`/`Limit`, all in that order. Only the
/// projected aliases survive past this point; everything else the child
/// bound is dropped.
pub struct With {
    child: Box<dyn Operator>,
    items: Vec<(Expr, String)>,
    distinct: bool,
    order_by: Vec<(Expr, bool)>,
    skip: Option<i64>,
    limit: Option<i64>,
    schema: Schema,
    buf: Buffered,
}

impl With {
    pub fn new(
        child: Box<dyn Operator>,
        items: Vec<(Expr, String)>,
        distinct: bool,
        order_by: Vec<(Expr, bool)>,
        skip: Option<i64>,
        limit: Option<i64>,
    ) -> Self {
        let env: HashMap<String, LynxType> = child.schema().fields().iter().cloned().collect();
        let fields = items.iter().map(|(e, alias)| (alias.clone(), expr::type_of(e, &env))).collect();
        Self { child, items, distinct, order_by, skip, limit, schema: Schema::new(fields), buf: Buffered::new() }
    }
}

impl Operator for With {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn state(&self) -> OperatorState {
        self.buf.state
    }

    fn open(&mut self, ctx: &ExecutionContext) -> Result<()> {
        let rows = self.child.collect(ctx)?;

        let mut projected = Vec::with_capacity(rows.len());
        for row in rows {
            let ectx = ExpressionContext::new(ctx, row);
            let mut new_row = Bindings::new();
            for (e, alias) in &self.items {
                new_row.insert(alias.clone(), expr::eval(e, &ectx)?);
            }
            projected.push(new_row);
        }

        if self.distinct {
            let mut seen: Vec<Bindings> = Vec::new();
            projected.retain(|row| {
                if seen.contains(row) {
                    false
                } else {
                    seen.push(row.clone());
                    true
                }
            });
        }

        if !self.order_by.is_empty() {
            let mut key_vals: Vec<Vec<Value>> = Vec::with_capacity(projected.len());
            for row in &projected {
                let ectx = ExpressionContext::new(ctx, row.clone());
                let mut vals = Vec::with_capacity(self.order_by.len());
                for (e, _) in &self.order_by {
                    vals.push(expr::eval(e, &ectx)?);
                }
                key_vals.push(vals);
            }
            let mut indexed: Vec<usize> = (0..projected.len()).collect();
            indexed.sort_by(|&ia, &ib| {
                for (ki, (_, asc)) in self.order_by.iter().enumerate() {
                    let ord = cypher_order(&key_vals[ia][ki], &key_vals[ib][ki], *asc);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
            projected = indexed.into_iter().map(|i| projected[i].clone()).collect();
        }

        let mut iter: Box<dyn Iterator<Item = Bindings>> = Box::new(projected.into_iter());
        if let Some(n) = self.skip {
            iter = Box::new(iter.skip(n.max(0) as usize));
        }
        if let Some(n) = self.limit {
            iter = Box::new(iter.take(n.max(0) as usize));
        }

        self.buf.fill(iter.collect());
        Ok(())
    }

    fn next_batch(&mut self, ctx: &ExecutionContext) -> Result<Option<RowBatch>> {
        if self.buf.state == OperatorState::Unopened {
            self.open(ctx)?;
        }
        Ok(self.buf.next_batch())
    }

    fn close(&mut self) -> Result<()> {
        self.buf.close();
        self.child.close()
    }
}
