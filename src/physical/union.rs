use crate::dataframe::Schema;
use crate::expr::{Bindings, ExecutionContext};
use crate::physical::{Buffered, Operator, OperatorState, RowBatch};
use crate::{Error, Result};

/// UNION / UNION ALL (spec §4.4): concatenates two branches whose schemas
/// must name the same columns (order need not match, Cypher resolves by
/// name), deduplicating rows unless `all` is set.
pub struct Union {
    lhs: Box<dyn Operator>,
    rhs: Box<dyn Operator>,
    all: bool,
    schema: Schema,
    buf: Buffered,
}

impl Union {
    pub fn new(lhs: Box<dyn Operator>, rhs: Box<dyn Operator>, all: bool) -> Result<Self> {
        let mut lhs_names: Vec<&str> = lhs.schema().names().iter().map(String::as_str).collect();
        let mut rhs_names: Vec<&str> = rhs.schema().names().iter().map(String::as_str).collect();
        lhs_names.sort_unstable();
        rhs_names.sort_unstable();
        if lhs_names != rhs_names {
            return Err(Error::PlanError(
                "UNION branches must return the same set of column names".into(),
            ));
        }
        let schema = lhs.schema().clone();
        Ok(Self { lhs, rhs, all, schema, buf: Buffered::new() })
    }
}

impl Operator for Union {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn state(&self) -> OperatorState {
        self.buf.state
    }

    fn open(&mut self, ctx: &ExecutionContext) -> Result<()> {
        let lhs_rows = self.lhs.collect(ctx)?;
        let rhs_rows = self.rhs.collect(ctx)?;
        let names = self.schema.names();

        let realign = |row: Bindings| -> Bindings {
            names.iter().map(|n| (n.clone(), row.get(n).cloned().unwrap_or(crate::model::Value::Null))).collect()
        };

        let mut all_rows: Vec<Bindings> = lhs_rows.into_iter().map(realign).chain(rhs_rows.into_iter().map(realign)).collect();

        if !self.all {
            let mut seen: Vec<Bindings> = Vec::new();
            all_rows.retain(|row| {
                if seen.contains(row) {
                    false
                } else {
                    seen.push(row.clone());
                    true
                }
            });
        }

        self.buf.fill(all_rows);
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
        self.lhs.close()?;
        self.rhs.close()
    }
}
