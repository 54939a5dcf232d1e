use crate::cypher::ast::Expr;
use crate::dataframe::Schema;
use crate::expr::{self, ExecutionContext, ExpressionContext};
use crate::model::Value;
use crate::physical::{Buffered, Operator, OperatorState, RowBatch};
use crate::Result;

/// Keeps only rows whose predicate evaluates to `Bool(true)` — `Null` and
/// `Bool(false)` both drop the row (spec §4.4).
pub struct Filter {
    child: Box<dyn Operator>,
    predicate: Expr,
    buf: Buffered,
}

impl Filter {
    pub fn new(child: Box<dyn Operator>, predicate: Expr) -> Self {
        Self { child, predicate, buf: Buffered::new() }
    }
}

impl Operator for Filter {
    fn schema(&self) -> &Schema {
        self.child.schema()
    }

    fn state(&self) -> OperatorState {
        self.buf.state
    }

    fn open(&mut self, ctx: &ExecutionContext) -> Result<()> {
        let rows = self.child.collect(ctx)?;
        let mut kept = Vec::with_capacity(rows.len());
        for row in rows {
            let ectx = ExpressionContext::new(ctx, row.clone());
            if let Value::Bool(true) = expr::eval(&self.predicate, &ectx)? {
                kept.push(row);
            }
        }
        self.buf.fill(kept);
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
