use crate::cypher::ast::Expr;
use crate::dataframe::Schema;
use crate::expr::{self, ExecutionContext, ExpressionContext};
use crate::model::{LynxType, Value};
use crate::physical::{Buffered, Operator, OperatorState, RowBatch};
use crate::Result;

/// UNWIND expr AS alias (spec §4.4): expands a list-valued expression into
/// one row per element, binding `alias`. `Null` yields zero rows; a
/// non-list, non-null value passes through as a single one-element row,
/// matching openCypher's UNWIND semantics for scalars.
pub struct Unwind {
    child: Box<dyn Operator>,
    expr: Expr,
    alias: String,
    schema: Schema,
    buf: Buffered,
}

impl Unwind {
    pub fn new(child: Box<dyn Operator>, expr: Expr, alias: String) -> Self {
        let mut fields = child.schema().fields().to_vec();
        if !fields.iter().any(|(n, _)| n == &alias) {
            fields.push((alias.clone(), LynxType::Any));
        }
        Self { child, expr, alias, schema: Schema::new(fields), buf: Buffered::new() }
    }
}

impl Operator for Unwind {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn state(&self) -> OperatorState {
        self.buf.state
    }

    fn open(&mut self, ctx: &ExecutionContext) -> Result<()> {
        let rows = self.child.collect(ctx)?;
        let mut out = Vec::new();
        for row in rows {
            let ectx = ExpressionContext::new(ctx, row.clone());
            let value = expr::eval(&self.expr, &ectx)?;
            match value {
                Value::Null => {}
                Value::List(items) => {
                    for item in items {
                        let mut new_row = row.clone();
                        new_row.insert(self.alias.clone(), item);
                        out.push(new_row);
                    }
                }
                other => {
                    let mut new_row = row.clone();
                    new_row.insert(self.alias.clone(), other);
                    out.push(new_row);
                }
            }
        }
        self.buf.fill(out);
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
