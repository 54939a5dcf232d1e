use std::collections::HashMap;

use crate::cypher::ast::Expr;
use crate::dataframe::Schema;
use crate::expr::{self, Bindings, ExecutionContext, ExpressionContext};
use crate::model::LynxType;
use crate::physical::{Buffered, Operator, OperatorState, RowBatch};
use crate::Result;

/// Computes a fixed list of expressions per row, discarding every binding
/// not named in `items` (spec §4.4) — the projection boundary `RETURN`
/// plans onto.
pub struct Project {
    child: Box<dyn Operator>,
    items: Vec<(Expr, String)>,
    schema: Schema,
    buf: Buffered,
}

impl Project {
    pub fn new(child: Box<dyn Operator>, items: Vec<(Expr, String)>) -> Self {
        let env: HashMap<String, LynxType> = child.schema().fields().iter().cloned().collect();
        let fields = items.iter().map(|(e, alias)| (alias.clone(), expr::type_of(e, &env))).collect();
        Self { child, items, schema: Schema::new(fields), buf: Buffered::new() }
    }
}

impl Operator for Project {
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
        self.buf.fill(projected);
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
