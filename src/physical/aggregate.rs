use std::collections::HashMap;

use crate::cypher::ast::Expr;
use crate::dataframe::Schema;
use crate::expr::{self, Bindings, ExecutionContext, ExpressionContext};
use crate::model::{LynxType, Value};
use crate::physical::{Buffered, Operator, OperatorState, RowBatch};
use crate::Result;

/// Groups child rows by `group_by` and folds `aggregations` over each group
/// (spec §4.4). With an empty `group_by` and an empty input, still emits a
/// single row so `count(*)` over zero rows yields `Int(0)` rather than no
/// result at all.
pub struct Aggregation {
    child: Box<dyn Operator>,
    group_by: Vec<(Expr, String)>,
    aggregations: Vec<(Expr, String)>,
    schema: Schema,
    buf: Buffered,
}

impl Aggregation {
    pub fn new(child: Box<dyn Operator>, group_by: Vec<(Expr, String)>, aggregations: Vec<(Expr, String)>) -> Self {
        let env: HashMap<String, LynxType> = child.schema().fields().iter().cloned().collect();
        let mut fields = Vec::new();
        for (_, alias) in &group_by {
            fields.push((alias.clone(), LynxType::Any));
        }
        for (e, alias) in &aggregations {
            fields.push((alias.clone(), expr::type_of(e, &env)));
        }
        Self { child, group_by, aggregations, schema: Schema::new(fields), buf: Buffered::new() }
    }
}

impl Operator for Aggregation {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn state(&self) -> OperatorState {
        self.buf.state
    }

    fn open(&mut self, ctx: &ExecutionContext) -> Result<()> {
        let rows = self.child.collect(ctx)?;

        if self.group_by.is_empty() && rows.is_empty() {
            let mut row = Bindings::new();
            for (e, alias) in &self.aggregations {
                row.insert(alias.clone(), expr::aggregate_eval(e, &[], ctx)?);
            }
            self.buf.fill(vec![row]);
            return Ok(());
        }

        let mut groups: Vec<(Vec<Value>, Vec<Bindings>)> = Vec::new();
        for row in rows {
            let ectx = ExpressionContext::new(ctx, row.clone());
            let mut key = Vec::with_capacity(self.group_by.len());
            for (e, _) in &self.group_by {
                key.push(expr::eval(e, &ectx)?);
            }
            if let Some(group) = groups.iter_mut().find(|(k, _)| *k == key) {
                group.1.push(row);
            } else {
                groups.push((key, vec![row]));
            }
        }

        let mut out = Vec::with_capacity(groups.len());
        for (key, members) in &groups {
            let mut row = Bindings::new();
            for (i, (_, alias)) in self.group_by.iter().enumerate() {
                row.insert(alias.clone(), key[i].clone());
            }
            for (e, alias) in &self.aggregations {
                row.insert(alias.clone(), expr::aggregate_eval(e, members, ctx)?);
            }
            out.push(row);
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
