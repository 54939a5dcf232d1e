//! Pull-based physical operator tree (spec §4.4).
//!
//! Every operator walks `Unopened -> Opened -> Draining -> Closed` exactly
//! once; `open` may be invoked implicitly by the first `next_batch`, and
//! `close` is idempotent. Grounded in the teacher's `execution::execute_plan`
//! recursive match, restructured into trait objects so each plan node owns
//! its own state machine instead of one function owning all of them.
//!
//! Most operators here buffer their entire output on `open` and drain it
//! `BATCH_SIZE` rows at a time — the same eager-materialization strategy the
//! teacher used against an in-memory graph, just packaged behind the
//! `Operator` trait rather than a flat recursive function.

pub mod aggregate;
pub mod apply;
pub mod argument;
pub mod expand;
pub mod filter;
pub mod limit;
pub mod mutate;
pub mod order;
pub mod project;
pub mod scan;
pub mod union;
pub mod unwind;
pub mod with;

pub use aggregate::Aggregation;
pub use apply::Apply;
pub use argument::Argument;
pub use expand::Expand;
pub use filter::Filter;
pub use limit::{Distinct, Limit, Skip};
pub use mutate::{Create, CreateStep, DeleteEntities, Merge, MergeStep, RemoveItems, RemoveStep, SetProperties, SetStep};
pub use order::OrderBy;
pub use project::Project;
pub use scan::{AllNodesScan, NodeScan};
pub use union::Union;
pub use unwind::Unwind;
pub use with::With;

use crate::dataframe::Schema;
use crate::expr::{Bindings, ExecutionContext};
use crate::Result;

/// A batch of bound rows pulled from an operator.
pub type RowBatch = Vec<Bindings>;

/// Lifecycle state every operator walks through exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorState {
    Unopened,
    Opened,
    Draining,
    Closed,
}

/// Rows drained per `next_batch` call once an operator has buffered its output.
pub const BATCH_SIZE: usize = 256;

/// A node of the physical plan (spec §4.4).
pub trait Operator {
    fn schema(&self) -> &Schema;
    fn state(&self) -> OperatorState;
    fn open(&mut self, ctx: &ExecutionContext) -> Result<()>;
    fn next_batch(&mut self, ctx: &ExecutionContext) -> Result<Option<RowBatch>>;
    fn close(&mut self) -> Result<()>;

    /// The concrete operator's type name, for plan-debugging accessors
    /// (`runner::QueryResult::physical_plan_description`). The default
    /// resolves per-`impl` through monomorphization, so it names the real
    /// operator even when called through a `Box<dyn Operator>`.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Pulls and concatenates every remaining batch, implicitly opening and
    /// closing this operator.
    fn collect(&mut self, ctx: &ExecutionContext) -> Result<RowBatch> {
        if self.state() == OperatorState::Unopened {
            self.open(ctx)?;
        }
        let mut all = Vec::new();
        while let Some(mut batch) = self.next_batch(ctx)? {
            all.append(&mut batch);
        }
        self.close()?;
        Ok(all)
    }
}

/// Buffers a fully materialized row set and drains it `BATCH_SIZE` rows at a
/// time. Shared by operators that cannot emit before consuming their child
/// in full (`Aggregation`, `OrderBy`, `Distinct`) as well as the ones ported
/// directly from the teacher's eager recursive evaluator, where per-row
/// streaming offers no benefit over an in-memory graph model.
pub(crate) struct Buffered {
    pub rows: Vec<Bindings>,
    pub cursor: usize,
    pub state: OperatorState,
}

impl Buffered {
    pub fn new() -> Self {
        Self { rows: Vec::new(), cursor: 0, state: OperatorState::Unopened }
    }

    pub fn fill(&mut self, rows: Vec<Bindings>) {
        self.rows = rows;
        self.cursor = 0;
        self.state = OperatorState::Opened;
    }

    pub fn next_batch(&mut self) -> Option<RowBatch> {
        if self.cursor >= self.rows.len() {
            self.state = OperatorState::Closed;
            return None;
        }
        self.state = OperatorState::Draining;
        let end = (self.cursor + BATCH_SIZE).min(self.rows.len());
        let batch = self.rows[self.cursor..end].to_vec();
        self.cursor = end;
        Some(batch)
    }

    pub fn close(&mut self) {
        self.rows.clear();
        self.state = OperatorState::Closed;
    }
}
