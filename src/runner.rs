//! The `Runner` (spec §4.5): parse → logical plan → optimize → physical plan
//! → execute, with the single write-journal commit/rollback decision that
//! makes a run atomic from the graph model's perspective.

use std::collections::HashMap;

use crate::cypher::ast::Statement;
use crate::expr::{Bindings, ExecutionContext};
use crate::graph_model::GraphModel;
use crate::model::{Node, Path, PropertyMap, Relationship, Value};
use crate::physical::Operator;
use crate::planner::{self, LogicalPlan};
use crate::tx::TxMode;
use crate::{Error, Result};

/// A single row, preserving the root operator's column order.
#[derive(Debug, Clone)]
pub struct ResultRow {
    values: Vec<(String, Value)>,
}

impl ResultRow {
    fn from_bindings(columns: &[String], row: &Bindings) -> Self {
        let values = columns.iter().map(|c| (c.clone(), row.get(c).cloned().unwrap_or(Value::Null))).collect();
        Self { values }
    }

    /// Typed access to a column by name, per the `FromValue` conversions below.
    pub fn get<T: FromValue>(&self, key: &str) -> Result<T> {
        let val = self.values.iter().find(|(k, _)| k == key).map(|(_, v)| v).ok_or_else(|| Error::NotFound(format!("column '{key}'")))?;
        T::from_value(val)
    }

    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.values.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// The row as an ordered name→value map, matching spec's `records()` contract.
    pub fn to_map(&self) -> HashMap<String, Value> {
        self.values.iter().cloned().collect()
    }
}

/// Converts a column's `Value` to a concrete Rust type, grounded in the
/// teacher's `execution::FromValue` but updated to the current error taxonomy.
pub trait FromValue: Sized {
    fn from_value(val: &Value) -> Result<Self>;
}

fn type_mismatch(expected: &str, val: &Value) -> Error {
    Error::TypeMismatch { expected: expected.to_string(), got: val.type_name().to_string() }
}

impl FromValue for Value {
    fn from_value(val: &Value) -> Result<Self> {
        Ok(val.clone())
    }
}

impl FromValue for Node {
    fn from_value(val: &Value) -> Result<Self> {
        match val {
            Value::Node(n) => Ok((**n).clone()),
            _ => Err(type_mismatch("Node", val)),
        }
    }
}

impl FromValue for Relationship {
    fn from_value(val: &Value) -> Result<Self> {
        match val {
            Value::Relationship(r) => Ok((**r).clone()),
            _ => Err(type_mismatch("Relationship", val)),
        }
    }
}

impl FromValue for Path {
    fn from_value(val: &Value) -> Result<Self> {
        match val {
            Value::Path(p) => Ok((**p).clone()),
            _ => Err(type_mismatch("Path", val)),
        }
    }
}

impl FromValue for String {
    fn from_value(val: &Value) -> Result<Self> {
        match val {
            Value::String(s) => Ok(s.clone()),
            _ => Err(type_mismatch("String", val)),
        }
    }
}

impl FromValue for bool {
    fn from_value(val: &Value) -> Result<Self> {
        match val {
            Value::Bool(b) => Ok(*b),
            _ => Err(type_mismatch("Bool", val)),
        }
    }
}

impl FromValue for i64 {
    fn from_value(val: &Value) -> Result<Self> {
        val.as_int().ok_or_else(|| type_mismatch("Integer", val))
    }
}

impl FromValue for f64 {
    fn from_value(val: &Value) -> Result<Self> {
        val.as_float().ok_or_else(|| type_mismatch("Float", val))
    }
}

impl FromValue for Vec<Value> {
    fn from_value(val: &Value) -> Result<Self> {
        match val {
            Value::List(l) => Ok(l.clone()),
            _ => Err(type_mismatch("List", val)),
        }
    }
}

impl FromValue for HashMap<String, Value> {
    fn from_value(val: &Value) -> Result<Self> {
        match val {
            Value::Map(m) => Ok(m.clone()),
            _ => Err(type_mismatch("Map", val)),
        }
    }
}

/// The result of one `Runner::run` (spec §4.5/§6).
///
/// The engine's operators already materialize eagerly (see `physical::Buffered`),
/// so there is no lazy streaming state to protect here; `cache()` is the
/// identity operation, kept because callers write code against the contract
/// spec describes (a hypothetical lazier engine's `records()` would consume a
/// single-pass stream that `cache()` would need to capture first).
pub struct QueryResult {
    columns: Vec<String>,
    rows: Vec<ResultRow>,
    ast: Statement,
    logical: LogicalPlan,
    optimized: LogicalPlan,
    physical_description: String,
}

impl QueryResult {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// A single-pass view over the rows as ordered name→value maps.
    pub fn records(&self) -> impl Iterator<Item = HashMap<String, Value>> + '_ {
        self.rows.iter().map(ResultRow::to_map)
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    /// Materializes and returns `self` unchanged — rows are already buffered
    /// in full, so every `QueryResult` is repeatedly traversable already.
    pub fn cache(self) -> Self {
        self
    }

    /// Tabular rendering of up to `limit` rows, in the style of a `psql`/
    /// `cypher-shell` result dump.
    pub fn show(&self, limit: usize) -> String {
        let mut out = String::new();
        out.push_str(&self.columns.join(" | "));
        out.push('\n');
        for row in self.rows.iter().take(limit) {
            let cells: Vec<String> = self.columns.iter().map(|c| match row.get_value(c) {
                Some(v) => format!("{v}"),
                None => "null".to_string(),
            }).collect();
            out.push_str(&cells.join(" | "));
            out.push('\n');
        }
        if self.rows.len() > limit {
            out.push_str(&format!("... ({} more rows)\n", self.rows.len() - limit));
        }
        out
    }

    pub fn ast(&self) -> &Statement {
        &self.ast
    }

    pub fn logical_plan(&self) -> &LogicalPlan {
        &self.logical
    }

    pub fn optimized_plan(&self) -> &LogicalPlan {
        &self.optimized
    }

    /// The root physical operator's type name. The operator tree itself is
    /// not retained past `run()` (spec's Lifecycles note: operators are
    /// "discarded after the result iterator is exhausted or cached"), so
    /// this is a debugging breadcrumb rather than an inspectable tree.
    pub fn physical_plan_description(&self) -> &str {
        &self.physical_description
    }
}

/// Orchestrates one query end-to-end against a `GraphModel` (spec §4.5).
pub struct Runner<'g> {
    graph: &'g dyn GraphModel,
}

impl<'g> Runner<'g> {
    pub fn new(graph: &'g dyn GraphModel) -> Self {
        Self { graph }
    }

    /// Parses, plans, optimizes, and executes `query`. Read-only statements
    /// run under `TxMode::ReadOnly`; anything that can mutate the graph
    /// (CREATE/MERGE/SET/REMOVE/DELETE/schema commands) runs under
    /// `TxMode::ReadWrite`. Exactly one commit happens on success; any error
    /// rolls the write journal back, per the single-commit-per-run design.
    pub fn run(&self, query: &str, params: PropertyMap) -> Result<QueryResult> {
        let ast = crate::cypher::parse(query)?;
        let logical = planner::plan(&ast, &params)?;
        let optimized = planner::optimize(logical.clone())?;

        if let LogicalPlan::Schema(cmd) = &optimized {
            self.run_schema(cmd)?;
            return Ok(QueryResult {
                columns: Vec::new(),
                rows: Vec::new(),
                ast,
                logical,
                optimized,
                physical_description: "Schema".to_string(),
            });
        }

        let mode = if is_write_plan(&optimized) { TxMode::ReadWrite } else { TxMode::ReadOnly };
        let ctx = ExecutionContext::new(params, self.graph, mode)?;

        let mut op = planner::build_physical(&optimized, &ctx.params)?;
        let physical_description = op.type_name().to_string();
        let columns = op.schema().names();

        match op.collect(&ctx) {
            Ok(batches) => {
                let rows = batches.iter().map(|r| ResultRow::from_bindings(&columns, r)).collect();
                ctx.into_write_journal().commit()?;
                Ok(QueryResult { columns, rows, ast, logical, optimized, physical_description })
            }
            Err(e) => {
                let _ = ctx.into_write_journal().rollback();
                Err(e)
            }
        }
    }

    fn run_schema(&self, cmd: &crate::cypher::ast::SchemaCommand) -> Result<()> {
        use crate::cypher::ast::SchemaCommand::*;
        match cmd {
            CreateIndex { label, property, .. } => self.graph.create_index(label, property),
            DropIndex { label, property } => self.graph.drop_index(label, property),
            CreateConstraint { label, property, constraint_type } => {
                self.graph.create_constraint(label, property, parse_constraint_type(constraint_type))
            }
            DropConstraint { label, property } => self.graph.drop_constraint(label, property),
        }
    }
}

fn parse_constraint_type(s: &str) -> crate::graph_model::ConstraintType {
    if s.eq_ignore_ascii_case("EXISTS") {
        crate::graph_model::ConstraintType::Exists
    } else {
        crate::graph_model::ConstraintType::Unique
    }
}

fn is_write_plan(plan: &LogicalPlan) -> bool {
    matches!(
        plan,
        LogicalPlan::Create(_) | LogicalPlan::Merge(_) | LogicalPlan::Delete(_) | LogicalPlan::Set(_) | LogicalPlan::Remove(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryGraphModel;

    #[test]
    fn test_create_then_match_round_trip() {
        let graph = MemoryGraphModel::new();
        let runner = Runner::new(&graph);

        let created = runner.run("CREATE (n:Person {name: 'Ada'}) RETURN n", PropertyMap::new()).unwrap();
        assert_eq!(created.columns(), &["n"]);
        assert_eq!(created.rows().len(), 1);

        let matched = runner.run("MATCH (n:Person) RETURN n.name AS name", PropertyMap::new()).unwrap();
        assert_eq!(matched.rows().len(), 1);
        assert_eq!(matched.rows()[0].get::<String>("name").unwrap(), "Ada");
    }

    #[test]
    fn test_failed_write_rolls_back() {
        let graph = MemoryGraphModel::new();
        let runner = Runner::new(&graph);

        runner.run("CREATE (n:Person {name: 'Ada'}) RETURN n", PropertyMap::new()).unwrap();
        // Division by zero-typed mismatch mid-pipeline aborts the query;
        // the preceding CREATE in this statement must not be visible after.
        let _ = runner.run("CREATE (m:Person {name: 'Bob'}) SET m.age = m.name + 1 RETURN m", PropertyMap::new());

        let count = runner.run("MATCH (n:Person) RETURN n", PropertyMap::new()).unwrap();
        assert_eq!(count.rows().len(), 1);
    }

    #[test]
    fn test_show_renders_header_and_rows() {
        let graph = MemoryGraphModel::new();
        let runner = Runner::new(&graph);
        let result = runner.run("RETURN 1 AS one", PropertyMap::new()).unwrap();
        let rendered = result.show(10);
        assert!(rendered.starts_with("one\n"));
        assert!(rendered.contains('1'));
    }
}
