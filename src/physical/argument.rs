use crate::dataframe::Schema;
use crate::expr::{Bindings, ExecutionContext};
use crate::physical::{Buffered, Operator, OperatorState, RowBatch};
use crate::Result;

/// The empty leaf: emits exactly one row. Seeds a pattern that starts a
/// MATCH/CREATE pipeline; `with_row` seeds it with bindings already known
/// from an outer correlated row (used when a pattern's first node is
/// already bound by a preceding clause).
pub struct Argument {
    schema: Schema,
    seed: Bindings,
    buf: Buffered,
}

impl Argument {
    pub fn new() -> Self {
        Self { schema: Schema::empty(), seed: Bindings::new(), buf: Buffered::new() }
    }

    pub fn with_row(row: Bindings) -> Self {
        Self { schema: Schema::empty(), seed: row, buf: Buffered::new() }
    }
}

impl Default for Argument {
    fn default() -> Self {
        Self::new()
    }
}

impl Operator for Argument {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn state(&self) -> OperatorState {
        self.buf.state
    }

    fn open(&mut self, _ctx: &ExecutionContext) -> Result<()> {
        self.buf.fill(vec![self.seed.clone()]);
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
        Ok(())
    }
}
