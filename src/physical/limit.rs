use crate::dataframe::Schema;
use crate::expr::{Bindings, ExecutionContext};
use crate::physical::{Buffered, Operator, OperatorState, RowBatch};
use crate::{Error, Result};

/// Drops the first `count` rows of the child (spec §4.4).
pub struct Skip {
    child: Box<dyn Operator>,
    count: i64,
    buf: Buffered,
}

impl Skip {
    pub fn new(child: Box<dyn Operator>, count: i64) -> Self {
        Self { child, count, buf: Buffered::new() }
    }
}

impl Operator for Skip {
    fn schema(&self) -> &Schema {
        self.child.schema()
    }

    fn state(&self) -> OperatorState {
        self.buf.state
    }

    fn open(&mut self, ctx: &ExecutionContext) -> Result<()> {
        if self.count < 0 {
            return Err(Error::InvalidArgument("SKIP requires a non-negative integer".into()));
        }
        let rows = self.child.collect(ctx)?;
        self.buf.fill(rows.into_iter().skip(self.count as usize).collect());
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

/// Caps the child to its first `count` rows (spec §4.4).
pub struct Limit {
    child: Box<dyn Operator>,
    count: i64,
    buf: Buffered,
}

impl Limit {
    pub fn new(child: Box<dyn Operator>, count: i64) -> Self {
        Self { child, count, buf: Buffered::new() }
    }
}

impl Operator for Limit {
    fn schema(&self) -> &Schema {
        self.child.schema()
    }

    fn state(&self) -> OperatorState {
        self.buf.state
    }

    fn open(&mut self, ctx: &ExecutionContext) -> Result<()> {
        if self.count < 0 {
            return Err(Error::InvalidArgument("LIMIT requires a non-negative integer".into()));
        }
        let rows = self.child.collect(ctx)?;
        self.buf.fill(rows.into_iter().take(self.count as usize).collect());
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

/// Deduplicates rows by structural equality, preserving first-seen order
/// (spec §4.4). `Null == Null` for dedup purposes, matching Cypher's
/// row-identity semantics rather than the three-valued `=` operator.
pub struct Distinct {
    child: Box<dyn Operator>,
    buf: Buffered,
}

impl Distinct {
    pub fn new(child: Box<dyn Operator>) -> Self {
        Self { child, buf: Buffered::new() }
    }
}

impl Operator for Distinct {
    fn schema(&self) -> &Schema {
        self.child.schema()
    }

    fn state(&self) -> OperatorState {
        self.buf.state
    }

    fn open(&mut self, ctx: &ExecutionContext) -> Result<()> {
        let rows = self.child.collect(ctx)?;
        let mut seen: Vec<Bindings> = Vec::new();
        let mut out = Vec::new();
        for row in rows {
            if !seen.contains(&row) {
                seen.push(row.clone());
                out.push(row);
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
