use std::cmp::Ordering;

use crate::cypher::ast::Expr;
use crate::dataframe::{cypher_order, Schema};
use crate::expr::{self, Bindings, ExecutionContext, ExpressionContext};
use crate::model::Value;
use crate::physical::{Buffered, Operator, OperatorState, RowBatch};
use crate::Result;

/// Sorts the fully-consumed child output by `keys` (spec §4.1, §4.4) — one
/// of the operators that must finish `Draining` its child before it can
/// emit anything.
pub struct OrderBy {
    child: Box<dyn Operator>,
    keys: Vec<(Expr, bool)>,
    buf: Buffered,
}

impl OrderBy {
    pub fn new(child: Box<dyn Operator>, keys: Vec<(Expr, bool)>) -> Self {
        Self { child, keys, buf: Buffered::new() }
    }
}

impl Operator for OrderBy {
    fn schema(&self) -> &Schema {
        self.child.schema()
    }

    fn state(&self) -> OperatorState {
        self.buf.state
    }

    fn open(&mut self, ctx: &ExecutionContext) -> Result<()> {
        let rows = self.child.collect(ctx)?;
        let mut indexed: Vec<(usize, Bindings)> = rows.into_iter().enumerate().collect();
        let mut key_vals: Vec<Vec<Value>> = Vec::with_capacity(indexed.len());
        for (_, row) in &indexed {
            let ectx = ExpressionContext::new(ctx, row.clone());
            let mut vals = Vec::with_capacity(self.keys.len());
            for (e, _) in &self.keys {
                vals.push(expr::eval(e, &ectx)?);
            }
            key_vals.push(vals);
        }
        indexed.sort_by(|(ia, _), (ib, _)| {
            for (ki, (_, asc)) in self.keys.iter().enumerate() {
                let ord = cypher_order(&key_vals[*ia][ki], &key_vals[*ib][ki], *asc);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
        self.buf.fill(indexed.into_iter().map(|(_, r)| r).collect());
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
