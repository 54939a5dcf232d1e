use crate::cypher::ast::Expr;
use crate::dataframe::Schema;
use crate::expr::{self, Bindings, ExecutionContext, ExpressionContext};
use crate::model::{LynxType, NodeId, PropertyMap, Value};
use crate::physical::{Buffered, Operator, OperatorState, RowBatch};
use crate::{Error, Result};

fn node_id(row: &Bindings, variable: &str) -> Result<NodeId> {
    match row.get(variable) {
        Some(Value::Node(n)) => Ok(n.id),
        Some(other) => Err(Error::TypeMismatch { expected: "Node".into(), got: other.type_name().into() }),
        None => Err(Error::UnboundVariable(variable.to_string())),
    }
}

/// One element of a CREATE pattern, already resolved by the planner into
/// concrete src/dst aliases (direction has already been folded in).
#[derive(Debug, Clone)]
pub enum CreateStep {
    Node { alias: Option<String>, labels: Vec<String>, properties: Vec<(String, Expr)> },
    Relationship { alias: Option<String>, from: String, to: String, rel_type: String, properties: Vec<(String, Expr)> },
}

/// CREATE (spec §4.4): materializes a pattern once per input row (once, for
/// a bare `CREATE` with no preceding `MATCH`), writing through the journal
/// and binding every step's alias into the emitted row.
pub struct Create {
    child: Box<dyn Operator>,
    steps: Vec<CreateStep>,
    schema: Schema,
    buf: Buffered,
}

impl Create {
    pub fn new(child: Box<dyn Operator>, steps: Vec<CreateStep>) -> Self {
        let mut fields = child.schema().fields().to_vec();
        for step in &steps {
            match step {
                CreateStep::Node { alias: Some(a), .. } => {
                    if !fields.iter().any(|(n, _)| n == a) {
                        fields.push((a.clone(), LynxType::Node));
                    }
                }
                CreateStep::Relationship { alias: Some(a), .. } => {
                    if !fields.iter().any(|(n, _)| n == a) {
                        fields.push((a.clone(), LynxType::Relationship));
                    }
                }
                _ => {}
            }
        }
        Self { child, steps, schema: Schema::new(fields), buf: Buffered::new() }
    }
}

impl Operator for Create {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn state(&self) -> OperatorState {
        self.buf.state
    }

    fn open(&mut self, ctx: &ExecutionContext) -> Result<()> {
        let rows = self.child.collect(ctx)?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let mut vars = row;
            for step in &self.steps {
                match step {
                    CreateStep::Node { alias, labels, properties } => {
                        let ectx = ExpressionContext::new(ctx, vars.clone());
                        let mut props = PropertyMap::new();
                        for (k, e) in properties {
                            props.insert(k.clone(), expr::eval(e, &ectx)?);
                        }
                        let node = ctx.write.lock().create_node(labels.clone(), props)?;
                        if let Some(a) = alias {
                            vars.insert(a.clone(), Value::Node(Box::new(node)));
                        }
                    }
                    CreateStep::Relationship { alias, from, to, rel_type, properties } => {
                        let src = node_id(&vars, from)?;
                        let dst = node_id(&vars, to)?;
                        let ectx = ExpressionContext::new(ctx, vars.clone());
                        let mut props = PropertyMap::new();
                        for (k, e) in properties {
                            props.insert(k.clone(), expr::eval(e, &ectx)?);
                        }
                        let rel = ctx.write.lock().create_relationship(src, dst, rel_type, props)?;
                        if let Some(a) = alias {
                            vars.insert(a.clone(), Value::Relationship(Box::new(rel)));
                        }
                    }
                }
            }
            out.push(vars);
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

/// One SET item (spec §4.4), mirroring `cypher::ast::SetItem` one-to-one.
#[derive(Debug, Clone)]
pub enum SetStep {
    Property { variable: String, key: String, value: Expr },
    AllProperties { variable: String, value: Expr },
    MergeProperties { variable: String, value: Expr },
    Label { variable: String, label: String },
}

fn set_property(row: &mut Bindings, variable: &str, key: &str, value: Value, ctx: &ExecutionContext) -> Result<()> {
    match row.get(variable) {
        Some(Value::Node(n)) => {
            let id = n.id;
            if value.is_null() {
                ctx.write.lock().remove_node_property(id, key)?;
            } else {
                ctx.write.lock().set_node_property(id, key, value.clone())?;
            }
            if let Some(Value::Node(n)) = row.get_mut(variable) {
                if value.is_null() {
                    n.properties.remove(key);
                } else {
                    n.properties.insert(key.to_string(), value);
                }
            }
            Ok(())
        }
        Some(Value::Relationship(r)) => {
            let id = r.id;
            if value.is_null() {
                ctx.write.lock().remove_relationship_property(id, key)?;
            } else {
                ctx.write.lock().set_relationship_property(id, key, value.clone())?;
            }
            if let Some(Value::Relationship(r)) = row.get_mut(variable) {
                if value.is_null() {
                    r.properties.remove(key);
                } else {
                    r.properties.insert(key.to_string(), value);
                }
            }
            Ok(())
        }
        Some(other) => Err(Error::TypeMismatch { expected: "Node or Relationship".into(), got: other.type_name().into() }),
        None => Err(Error::UnboundVariable(variable.to_string())),
    }
}

fn replace_properties(row: &mut Bindings, variable: &str, new_props: PropertyMap, ctx: &ExecutionContext) -> Result<()> {
    let old_keys: Vec<String> = match row.get(variable) {
        Some(Value::Node(n)) => n.properties.keys().cloned().collect(),
        Some(Value::Relationship(r)) => r.properties.keys().cloned().collect(),
        Some(other) => return Err(Error::TypeMismatch { expected: "Node or Relationship".into(), got: other.type_name().into() }),
        None => return Err(Error::UnboundVariable(variable.to_string())),
    };
    for k in &old_keys {
        if !new_props.contains_key(k) {
            set_property(row, variable, k, Value::Null, ctx)?;
        }
    }
    for (k, v) in new_props {
        set_property(row, variable, &k, v, ctx)?;
    }
    Ok(())
}

fn apply_set_step(step: &SetStep, row: &mut Bindings, ctx: &ExecutionContext) -> Result<()> {
    match step {
        SetStep::Property { variable, key, value } => {
            let ectx = ExpressionContext::new(ctx, row.clone());
            let v = expr::eval(value, &ectx)?;
            set_property(row, variable, key, v, ctx)
        }
        SetStep::AllProperties { variable, value } => {
            let ectx = ExpressionContext::new(ctx, row.clone());
            let new_props = match expr::eval(value, &ectx)? {
                Value::Map(m) => m,
                other => return Err(Error::TypeMismatch { expected: "Map".into(), got: other.type_name().into() }),
            };
            replace_properties(row, variable, new_props, ctx)
        }
        SetStep::MergeProperties { variable, value } => {
            let ectx = ExpressionContext::new(ctx, row.clone());
            let new_props = match expr::eval(value, &ectx)? {
                Value::Map(m) => m,
                other => return Err(Error::TypeMismatch { expected: "Map".into(), got: other.type_name().into() }),
            };
            for (k, v) in new_props {
                set_property(row, variable, &k, v, ctx)?;
            }
            Ok(())
        }
        SetStep::Label { variable, label } => {
            let id = node_id(row, variable)?;
            ctx.write.lock().add_label(id, label)?;
            if let Some(Value::Node(n)) = row.get_mut(variable) {
                if !n.labels.iter().any(|l| l == label) {
                    n.labels.push(label.clone());
                }
            }
            Ok(())
        }
    }
}

/// SET (spec §4.4): applies each item to every input row in turn, emitting
/// rows with their bound entities' local snapshots updated in place so
/// downstream operators in the same run see the new values.
pub struct SetProperties {
    child: Box<dyn Operator>,
    items: Vec<SetStep>,
    buf: Buffered,
}

impl SetProperties {
    pub fn new(child: Box<dyn Operator>, items: Vec<SetStep>) -> Self {
        Self { child, items, buf: Buffered::new() }
    }
}

impl Operator for SetProperties {
    fn schema(&self) -> &Schema {
        self.child.schema()
    }

    fn state(&self) -> OperatorState {
        self.buf.state
    }

    fn open(&mut self, ctx: &ExecutionContext) -> Result<()> {
        let rows = self.child.collect(ctx)?;
        let mut out = Vec::with_capacity(rows.len());
        for mut row in rows {
            for item in &self.items {
                apply_set_step(item, &mut row, ctx)?;
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

/// One REMOVE item (spec §4.4), mirroring `cypher::ast::RemoveItem`.
#[derive(Debug, Clone)]
pub enum RemoveStep {
    Property { variable: String, key: String },
    Label { variable: String, label: String },
}

/// REMOVE (spec §4.4): `REMOVE n.prop` is sugar for setting it to `Null`;
/// `REMOVE n:Label` drops the label from both the journal and the local
/// binding.
pub struct RemoveItems {
    child: Box<dyn Operator>,
    items: Vec<RemoveStep>,
    buf: Buffered,
}

impl RemoveItems {
    pub fn new(child: Box<dyn Operator>, items: Vec<RemoveStep>) -> Self {
        Self { child, items, buf: Buffered::new() }
    }
}

impl Operator for RemoveItems {
    fn schema(&self) -> &Schema {
        self.child.schema()
    }

    fn state(&self) -> OperatorState {
        self.buf.state
    }

    fn open(&mut self, ctx: &ExecutionContext) -> Result<()> {
        let rows = self.child.collect(ctx)?;
        let mut out = Vec::with_capacity(rows.len());
        for mut row in rows {
            for item in &self.items {
                match item {
                    RemoveStep::Property { variable, key } => {
                        set_property(&mut row, variable, key, Value::Null, ctx)?;
                    }
                    RemoveStep::Label { variable, label } => {
                        let id = node_id(&row, variable)?;
                        ctx.write.lock().remove_label(id, label)?;
                        if let Some(Value::Node(n)) = row.get_mut(variable) {
                            n.labels.retain(|l| l != label);
                        }
                    }
                }
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

/// DELETE / DETACH DELETE (spec §4.4): deletes the bound node or
/// relationship for each named variable; rows pass through unchanged since
/// the entities they reference are gone once the write journal commits.
pub struct DeleteEntities {
    child: Box<dyn Operator>,
    variables: Vec<String>,
    detach: bool,
    buf: Buffered,
}

impl DeleteEntities {
    pub fn new(child: Box<dyn Operator>, variables: Vec<String>, detach: bool) -> Self {
        Self { child, variables, detach, buf: Buffered::new() }
    }
}

impl Operator for DeleteEntities {
    fn schema(&self) -> &Schema {
        self.child.schema()
    }

    fn state(&self) -> OperatorState {
        self.buf.state
    }

    fn open(&mut self, ctx: &ExecutionContext) -> Result<()> {
        let rows = self.child.collect(ctx)?;
        for row in &rows {
            for variable in &self.variables {
                match row.get(variable) {
                    Some(Value::Node(n)) => {
                        ctx.write.lock().delete_node(n.id, self.detach)?;
                    }
                    Some(Value::Relationship(r)) => {
                        ctx.write.lock().delete_relationship(r.id)?;
                    }
                    Some(Value::Null) | None => {}
                    Some(other) => {
                        return Err(Error::TypeMismatch { expected: "Node or Relationship".into(), got: other.type_name().into() })
                    }
                }
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

/// One step of a MERGE pattern, same shape as `CreateStep` but matched
/// against the graph before falling back to creation (spec §4.4).
#[derive(Debug, Clone)]
pub enum MergeStep {
    Node { alias: String, labels: Vec<String>, properties: Vec<(String, Expr)> },
    Relationship { alias: Option<String>, from: String, to: String, rel_type: String, properties: Vec<(String, Expr)> },
}

/// MERGE (spec §4.4): upserts each step of the pattern against the graph
/// model via exact property equality, creating whatever step is missing.
/// `on_create` fires if any step of the pattern had to be created;
/// `on_match` fires only when every step was already present — a documented
/// simplification of Neo4j's whole-pattern existence check, applied
/// per-step instead of as one atomic lookup.
pub struct Merge {
    child: Box<dyn Operator>,
    steps: Vec<MergeStep>,
    on_create: Vec<SetStep>,
    on_match: Vec<SetStep>,
    schema: Schema,
    buf: Buffered,
}

impl Merge {
    pub fn new(child: Box<dyn Operator>, steps: Vec<MergeStep>, on_create: Vec<SetStep>, on_match: Vec<SetStep>) -> Self {
        let mut fields = child.schema().fields().to_vec();
        for step in &steps {
            match step {
                MergeStep::Node { alias, .. } => {
                    if !fields.iter().any(|(n, _)| n == alias) {
                        fields.push((alias.clone(), LynxType::Node));
                    }
                }
                MergeStep::Relationship { alias: Some(a), .. } => {
                    if !fields.iter().any(|(n, _)| n == a) {
                        fields.push((a.clone(), LynxType::Relationship));
                    }
                }
                MergeStep::Relationship { alias: None, .. } => {}
            }
        }
        Self { child, steps, on_create, on_match, schema: Schema::new(fields), buf: Buffered::new() }
    }

    fn find_node(ctx: &ExecutionContext, labels: &[String], props: &PropertyMap) -> Result<Option<crate::model::Node>> {
        let candidates = ctx.graph.scan_nodes(labels)?;
        Ok(candidates.into_iter().find(|n| props.iter().all(|(k, v)| n.get(k).map(|nv| nv == v).unwrap_or(false))))
    }

    fn find_relationship(
        ctx: &ExecutionContext,
        src: NodeId,
        rel_type: &str,
        props: &PropertyMap,
    ) -> Result<Option<crate::model::Relationship>> {
        let rel_types = vec![rel_type.to_string()];
        let candidates = ctx.graph.relationships_of(src, crate::model::Direction::Outgoing, &rel_types)?;
        Ok(candidates.into_iter().find(|r| props.iter().all(|(k, v)| r.properties.get(k).map(|rv| rv == v).unwrap_or(false))))
    }
}

impl Operator for Merge {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn state(&self) -> OperatorState {
        self.buf.state
    }

    fn open(&mut self, ctx: &ExecutionContext) -> Result<()> {
        let rows = self.child.collect(ctx)?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let mut vars = row;
            let mut any_created = false;
            for step in &self.steps {
                match step {
                    MergeStep::Node { alias, labels, properties } => {
                        let ectx = ExpressionContext::new(ctx, vars.clone());
                        let mut props = PropertyMap::new();
                        for (k, e) in properties {
                            props.insert(k.clone(), expr::eval(e, &ectx)?);
                        }
                        let found = Self::find_node(ctx, labels, &props)?;
                        let node = match found {
                            Some(n) => n,
                            None => {
                                any_created = true;
                                ctx.write.lock().create_node(labels.clone(), props)?
                            }
                        };
                        vars.insert(alias.clone(), Value::Node(Box::new(node)));
                    }
                    MergeStep::Relationship { alias, from, to, rel_type, properties } => {
                        let src = node_id(&vars, from)?;
                        let dst = node_id(&vars, to)?;
                        let ectx = ExpressionContext::new(ctx, vars.clone());
                        let mut props = PropertyMap::new();
                        for (k, e) in properties {
                            props.insert(k.clone(), expr::eval(e, &ectx)?);
                        }
                        let found = Self::find_relationship(ctx, src, rel_type, &props)?.filter(|r| r.dst == dst);
                        let rel = match found {
                            Some(r) => r,
                            None => {
                                any_created = true;
                                ctx.write.lock().create_relationship(src, dst, rel_type, props)?
                            }
                        };
                        if let Some(a) = alias {
                            vars.insert(a.clone(), Value::Relationship(Box::new(rel)));
                        }
                    }
                }
            }
            let set_steps = if any_created { &self.on_create } else { &self.on_match };
            for step in set_steps {
                apply_set_step(step, &mut vars, ctx)?;
            }
            out.push(vars);
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
