use crate::dataframe::Schema;
use crate::expr::ExecutionContext;
use crate::graph_model::ExpandDepth;
use crate::model::{Direction, LynxType, Value};
use crate::physical::{Buffered, Operator, OperatorState, RowBatch};
use crate::{Error, Result};

/// Single- or variable-length relationship traversal from a bound node.
pub struct Expand {
    child: Box<dyn Operator>,
    from: String,
    to: String,
    rel_alias: Option<String>,
    direction: Direction,
    rel_types: Vec<String>,
    depth: ExpandDepth,
    schema: Schema,
    buf: Buffered,
}

impl Expand {
    pub fn new(
        child: Box<dyn Operator>,
        from: impl Into<String>,
        to: impl Into<String>,
        rel_alias: Option<String>,
        direction: Direction,
        rel_types: Vec<String>,
        depth: ExpandDepth,
    ) -> Self {
        let from = from.into();
        let to = to.into();
        let mut fields = child.schema().fields().to_vec();
        if !fields.iter().any(|(n, _)| n == &to) {
            fields.push((to.clone(), LynxType::Node));
        }
        if let Some(ra) = &rel_alias {
            if !fields.iter().any(|(n, _)| n == ra) {
                fields.push((ra.clone(), LynxType::Relationship));
            }
        }
        Self { child, from, to, rel_alias, direction, rel_types, depth, schema: Schema::new(fields), buf: Buffered::new() }
    }
}

impl Operator for Expand {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn state(&self) -> OperatorState {
        self.buf.state
    }

    fn open(&mut self, ctx: &ExecutionContext) -> Result<()> {
        let input_rows = self.child.collect(ctx)?;
        let mut rows = Vec::new();
        for input_row in input_rows {
            let from_id = match input_row.get(&self.from) {
                Some(Value::Node(n)) => n.id,
                Some(Value::Null) | None => continue,
                Some(other) => {
                    return Err(Error::TypeMismatch { expected: "Node".into(), got: other.type_name().into() })
                }
            };
            let paths = ctx.graph.expand(from_id, self.direction, &self.rel_types, self.depth)?;
            for path in paths {
                let mut row = input_row.clone();
                let end_node = match path.nodes.last() {
                    Some(n) => n.clone(),
                    None => continue,
                };
                row.insert(self.to.clone(), Value::Node(Box::new(end_node)));
                if let Some(ra) = &self.rel_alias {
                    let rel_value = if path.relationships.len() == 1 {
                        Value::Relationship(Box::new(path.relationships[0].clone()))
                    } else {
                        Value::List(path.relationships.iter().cloned().map(|r| Value::Relationship(Box::new(r))).collect())
                    };
                    row.insert(ra.clone(), rel_value);
                }
                rows.push(row);
            }
        }
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
        self.child.close()
    }
}
