use crate::dataframe::Schema;
use crate::expr::{Bindings, ExecutionContext};
use crate::model::{LynxType, Value};
use crate::physical::{Buffered, Operator, OperatorState, RowBatch};
use crate::Result;

/// Correlated nested-loop join (spec §4.4): for every outer row, builds and
/// drains a fresh inner operator seeded with that row's bindings. Grounds
/// `OPTIONAL MATCH` and pattern-comprehension style subqueries the teacher's
/// flat recursive evaluator handled inline.
///
/// When `preserve_outer_on_empty` is set (OPTIONAL MATCH), an outer row whose
/// inner side produces nothing still survives once, with every column the
/// inner side would have added bound to `Null`.
pub struct Apply {
    outer: Box<dyn Operator>,
    inner_factory: Box<dyn FnMut(&Bindings) -> Box<dyn Operator>>,
    preserve_outer_on_empty: bool,
    schema: Schema,
    buf: Buffered,
}

impl Apply {
    pub fn new(
        outer: Box<dyn Operator>,
        inner_schema_fields: Vec<(String, LynxType)>,
        inner_factory: Box<dyn FnMut(&Bindings) -> Box<dyn Operator>>,
        preserve_outer_on_empty: bool,
    ) -> Self {
        let mut fields = outer.schema().fields().to_vec();
        for (name, ty) in inner_schema_fields {
            if !fields.iter().any(|(n, _)| n == &name) {
                fields.push((name, ty));
            }
        }
        Self { outer, inner_factory, preserve_outer_on_empty, schema: Schema::new(fields), buf: Buffered::new() }
    }
}

impl Operator for Apply {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn state(&self) -> OperatorState {
        self.buf.state
    }

    fn open(&mut self, ctx: &ExecutionContext) -> Result<()> {
        let outer_rows = self.outer.collect(ctx)?;
        let added: Vec<String> = self
            .schema
            .names()
            .into_iter()
            .filter(|n| !outer_rows.first().map(|r| r.contains_key(n)).unwrap_or(false))
            .collect();

        let mut out = Vec::new();
        for outer_row in outer_rows {
            let mut inner_op = (self.inner_factory)(&outer_row);
            let inner_rows = inner_op.collect(ctx)?;
            if inner_rows.is_empty() {
                if self.preserve_outer_on_empty {
                    let mut row = outer_row.clone();
                    for name in &added {
                        row.entry(name.clone()).or_insert(Value::Null);
                    }
                    out.push(row);
                }
                continue;
            }
            for inner_row in inner_rows {
                let mut row = outer_row.clone();
                row.extend(inner_row);
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
        self.outer.close()
    }
}
