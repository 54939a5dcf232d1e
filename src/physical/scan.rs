use crate::dataframe::Schema;
use crate::expr::{Bindings, ExecutionContext};
use crate::model::{LynxType, Value};
use crate::physical::{Buffered, Operator, OperatorState, RowBatch};
use crate::Result;

/// Scans every node carrying every label in `labels` (AND semantics).
pub struct NodeScan {
    variable: String,
    labels: Vec<String>,
    schema: Schema,
    buf: Buffered,
}

impl NodeScan {
    pub fn new(variable: impl Into<String>, labels: Vec<String>) -> Self {
        let variable = variable.into();
        let schema = Schema::new(vec![(variable.clone(), LynxType::Node)]);
        Self { variable, labels, schema, buf: Buffered::new() }
    }
}

impl Operator for NodeScan {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn state(&self) -> OperatorState {
        self.buf.state
    }

    fn open(&mut self, ctx: &ExecutionContext) -> Result<()> {
        let nodes = ctx.graph.scan_nodes(&self.labels)?;
        let rows = nodes
            .into_iter()
            .map(|n| {
                let mut row = Bindings::new();
                row.insert(self.variable.clone(), Value::Node(Box::new(n)));
                row
            })
            .collect();
        self.buf.fill(rows);
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

/// `NodeScan` with no label filter — kept as a distinct plan-facing type
/// per spec naming, even though the memory backend treats `&[]` identically.
pub struct AllNodesScan(NodeScan);

impl AllNodesScan {
    pub fn new(variable: impl Into<String>) -> Self {
        Self(NodeScan::new(variable, vec![]))
    }
}

impl Operator for AllNodesScan {
    fn schema(&self) -> &Schema {
        self.0.schema()
    }

    fn state(&self) -> OperatorState {
        self.0.state()
    }

    fn open(&mut self, ctx: &ExecutionContext) -> Result<()> {
        self.0.open(ctx)
    }

    fn next_batch(&mut self, ctx: &ExecutionContext) -> Result<Option<RowBatch>> {
        self.0.next_batch(ctx)
    }

    fn close(&mut self) -> Result<()> {
        self.0.close()
    }
}
