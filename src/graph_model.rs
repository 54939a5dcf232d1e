//! The `GraphModel` trait: the external graph-store collaborator.
//!
//! Synchronous by design — the engine is a single-threaded, pull-based
//! executor (see `physical`), so there is no benefit to an async storage
//! contract and every await point would just be a lock acquisition anyway.

use std::collections::HashMap;

use crate::model::{Node, NodeId, PropertyMap, RelId, Relationship, Value};
use crate::tx::{Transaction, TxId, TxMode};
use crate::Result;

/// How far an `Expand` should traverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpandDepth {
    Exact(usize),
    Range { min: usize, max: usize },
    Unbounded,
}

/// Constraint kinds a backend may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintType {
    Unique,
    Exists,
}

/// What a backend can do, so the planner can avoid asking for the
/// impossible without a cost model.
#[derive(Debug, Clone, Default)]
pub struct BackendCapabilities {
    pub supports_procedures: bool,
    pub supports_batch_writes: bool,
    pub max_batch_size: Option<usize>,
    pub supported_procedures: Vec<String>,
}

/// Result of a backend-native procedure call (`CALL db.labels()` etc.).
#[derive(Debug, Clone, Default)]
pub struct ProcedureResult {
    pub columns: Vec<String>,
    pub rows: Vec<HashMap<String, Value>>,
}

/// One path segment returned by `expand`.
#[derive(Debug, Clone)]
pub struct ExpandedPath {
    pub nodes: Vec<Node>,
    pub relationships: Vec<Relationship>,
}

/// The graph-store contract the physical operators are written against.
///
/// A `GraphModel` owns no query semantics — it is a thin synchronous
/// key/value + adjacency surface. All Cypher-level behavior (NULL
/// propagation, three-valued logic, aggregation) lives in `expr`/`physical`.
pub trait GraphModel: Send + Sync {
    fn begin_tx(&self, mode: TxMode) -> Result<Box<dyn Transaction>>;
    fn commit_tx(&self, tx: Box<dyn Transaction>) -> Result<()>;
    fn rollback_tx(&self, tx: Box<dyn Transaction>) -> Result<()>;

    fn create_node(
        &self,
        tx: &mut dyn Transaction,
        labels: Vec<String>,
        properties: PropertyMap,
    ) -> Result<Node>;
    fn get_node(&self, id: NodeId) -> Result<Option<Node>>;
    fn delete_node(&self, tx: &mut dyn Transaction, id: NodeId, detach: bool) -> Result<bool>;
    fn set_node_property(
        &self,
        tx: &mut dyn Transaction,
        id: NodeId,
        key: &str,
        value: Value,
    ) -> Result<()>;
    fn remove_node_property(&self, tx: &mut dyn Transaction, id: NodeId, key: &str) -> Result<()>;
    fn add_label(&self, tx: &mut dyn Transaction, id: NodeId, label: &str) -> Result<()>;
    fn remove_label(&self, tx: &mut dyn Transaction, id: NodeId, label: &str) -> Result<()>;

    fn create_relationship(
        &self,
        tx: &mut dyn Transaction,
        src: NodeId,
        dst: NodeId,
        rel_type: &str,
        properties: PropertyMap,
    ) -> Result<Relationship>;
    fn get_relationship(&self, id: RelId) -> Result<Option<Relationship>>;
    fn delete_relationship(&self, tx: &mut dyn Transaction, id: RelId) -> Result<bool>;
    fn set_relationship_property(
        &self,
        tx: &mut dyn Transaction,
        id: RelId,
        key: &str,
        value: Value,
    ) -> Result<()>;
    fn remove_relationship_property(
        &self,
        tx: &mut dyn Transaction,
        id: RelId,
        key: &str,
    ) -> Result<()>;

    /// All nodes carrying every label in `labels` (AND semantics); `&[]` means all nodes.
    fn scan_nodes(&self, labels: &[String]) -> Result<Vec<Node>>;

    /// BFS/DFS expansion from `start`, honoring direction/rel-type filter and depth.
    fn expand(
        &self,
        start: NodeId,
        direction: crate::model::Direction,
        rel_types: &[String],
        depth: ExpandDepth,
    ) -> Result<Vec<ExpandedPath>>;

    fn relationships_of(
        &self,
        node: NodeId,
        direction: crate::model::Direction,
        rel_types: &[String],
    ) -> Result<Vec<Relationship>>;

    fn node_count(&self) -> Result<usize>;
    fn relationship_count(&self) -> Result<usize>;

    fn create_index(&self, label: &str, property: &str) -> Result<()>;
    fn drop_index(&self, label: &str, property: &str) -> Result<()>;
    fn create_constraint(&self, label: &str, property: &str, kind: ConstraintType) -> Result<()>;
    fn drop_constraint(&self, label: &str, property: &str) -> Result<()>;

    fn call_procedure(&self, name: &str, args: &[Value]) -> Result<ProcedureResult> {
        let _ = args;
        Err(crate::Error::UnknownProcedure(name.to_string()))
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities::default()
    }
}

/// Buffers the mutations of one `Runner::run` and commits them as a single
/// transaction, so a mid-query failure never leaves a partial write behind.
///
/// Per the single-commit-per-run design: mutation operators call through
/// `WriteJournal` rather than touching the backend's transaction directly,
/// so the commit/rollback decision stays centralized in the runner.
pub struct WriteJournal<'g> {
    graph: &'g dyn GraphModel,
    tx: Option<Box<dyn Transaction>>,
}

impl<'g> WriteJournal<'g> {
    pub fn begin(graph: &'g dyn GraphModel, mode: TxMode) -> Result<Self> {
        let tx = graph.begin_tx(mode)?;
        Ok(Self { graph, tx: Some(tx) })
    }

    fn tx_mut(&mut self) -> &mut dyn Transaction {
        self.tx.as_deref_mut().expect("write journal used after commit/rollback")
    }

    pub fn tx_id(&self) -> TxId {
        self.tx.as_ref().expect("write journal used after commit/rollback").id()
    }

    pub fn create_node(&mut self, labels: Vec<String>, properties: PropertyMap) -> Result<Node> {
        let tx = self.tx_mut();
        self.graph.create_node(tx, labels, properties)
    }

    pub fn create_relationship(
        &mut self,
        src: NodeId,
        dst: NodeId,
        rel_type: &str,
        properties: PropertyMap,
    ) -> Result<Relationship> {
        let tx = self.tx_mut();
        self.graph.create_relationship(tx, src, dst, rel_type, properties)
    }

    pub fn set_node_property(&mut self, id: NodeId, key: &str, value: Value) -> Result<()> {
        let tx = self.tx_mut();
        self.graph.set_node_property(tx, id, key, value)
    }

    pub fn remove_node_property(&mut self, id: NodeId, key: &str) -> Result<()> {
        let tx = self.tx_mut();
        self.graph.remove_node_property(tx, id, key)
    }

    pub fn add_label(&mut self, id: NodeId, label: &str) -> Result<()> {
        let tx = self.tx_mut();
        self.graph.add_label(tx, id, label)
    }

    pub fn remove_label(&mut self, id: NodeId, label: &str) -> Result<()> {
        let tx = self.tx_mut();
        self.graph.remove_label(tx, id, label)
    }

    pub fn delete_node(&mut self, id: NodeId, detach: bool) -> Result<bool> {
        let tx = self.tx_mut();
        self.graph.delete_node(tx, id, detach)
    }

    pub fn delete_relationship(&mut self, id: RelId) -> Result<bool> {
        let tx = self.tx_mut();
        self.graph.delete_relationship(tx, id)
    }

    pub fn set_relationship_property(&mut self, id: RelId, key: &str, value: Value) -> Result<()> {
        let tx = self.tx_mut();
        self.graph.set_relationship_property(tx, id, key, value)
    }

    pub fn remove_relationship_property(&mut self, id: RelId, key: &str) -> Result<()> {
        let tx = self.tx_mut();
        self.graph.remove_relationship_property(tx, id, key)
    }

    /// Commit all buffered writes as a single transaction.
    pub fn commit(mut self) -> Result<()> {
        let tx = self.tx.take().expect("write journal used after commit/rollback");
        tracing::debug!(tx = ?tx.id(), "committing write journal");
        self.graph.commit_tx(tx)
    }

    /// Discard all buffered writes — used when a query fails mid-execution.
    pub fn rollback(mut self) -> Result<()> {
        let tx = self.tx.take().expect("write journal used after commit/rollback");
        tracing::debug!(tx = ?tx.id(), "rolling back write journal");
        self.graph.rollback_tx(tx)
    }
}

impl Drop for WriteJournal<'_> {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            tracing::trace!(tx = ?tx.id(), "write journal dropped without explicit commit/rollback; rolling back");
            let _ = self.graph.rollback_tx(tx);
        }
    }
}
