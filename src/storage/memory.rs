//! In-memory storage backend.
//!
//! This is the reference implementation of `GraphModel`. It uses simple
//! HashMaps protected by `parking_lot` locks.
//!
//! ## Limitations
//!
//! - **No real MVCC**: `commit_tx()`/`rollback_tx()` on the transaction
//!   object only gate the write journal (see `graph_model::WriteJournal`);
//!   mutations are applied to the maps as each journal call happens.
//! - **No property indexes**: `create_index()` is a no-op. All property
//!   lookups do a full scan.
//!
//! Use this backend for:
//! - Testing the Cypher parser, planner, and execution engine
//! - Embedding the engine in applications that don't need persistence

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::graph_model::{ConstraintType, ExpandDepth, ExpandedPath, GraphModel};
use crate::model::*;
use crate::tx::{Transaction, TxId, TxMode};
use crate::{Error, Result};

/// In-memory property graph storage.
#[derive(Clone)]
pub struct MemoryGraphModel {
    inner: Arc<MemoryInner>,
}

impl Default for MemoryGraphModel {
    fn default() -> Self {
        Self::new()
    }
}

struct MemoryInner {
    nodes: RwLock<HashMap<NodeId, Node>>,
    relationships: RwLock<HashMap<RelId, Relationship>>,
    /// node_id -> list of relationship IDs
    adjacency: RwLock<HashMap<NodeId, Vec<RelId>>>,
    /// label -> set of node IDs (poor man's label index)
    label_index: RwLock<HashMap<String, Vec<NodeId>>>,
    next_node_id: AtomicU64,
    next_rel_id: AtomicU64,
    next_tx_id: AtomicU64,
}

impl MemoryGraphModel {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                nodes: RwLock::new(HashMap::new()),
                relationships: RwLock::new(HashMap::new()),
                adjacency: RwLock::new(HashMap::new()),
                label_index: RwLock::new(HashMap::new()),
                next_node_id: AtomicU64::new(1),
                next_rel_id: AtomicU64::new(1),
                next_tx_id: AtomicU64::new(1),
            }),
        }
    }

    fn relationships_of_locked(
        &self,
        node: NodeId,
        dir: Direction,
        rel_type: Option<&str>,
    ) -> Vec<Relationship> {
        let adj = self.inner.adjacency.read();
        let rels = self.inner.relationships.read();
        let rel_ids = adj.get(&node).cloned().unwrap_or_default();
        let mut result = Vec::new();
        for rid in rel_ids {
            if let Some(rel) = rels.get(&rid) {
                let matches_dir = match dir {
                    Direction::Outgoing => rel.src == node,
                    Direction::Incoming => rel.dst == node,
                    Direction::Both => true,
                };
                let matches_type = rel_type.map_or(true, |t| rel.rel_type == t);
                if matches_dir && matches_type {
                    result.push(rel.clone());
                }
            }
        }
        result
    }
}

/// In-memory transaction — a marker carrying the journal's mode/id.
pub struct MemoryTx {
    id: TxId,
    mode: TxMode,
}

impl Transaction for MemoryTx {
    fn mode(&self) -> TxMode {
        self.mode
    }
    fn id(&self) -> TxId {
        self.id
    }
}

impl GraphModel for MemoryGraphModel {
    fn begin_tx(&self, mode: TxMode) -> Result<Box<dyn Transaction>> {
        let id = TxId(self.inner.next_tx_id.fetch_add(1, Ordering::Relaxed));
        Ok(Box::new(MemoryTx { id, mode }))
    }

    /// No-op: the memory backend applies writes immediately, not on commit.
    fn commit_tx(&self, _tx: Box<dyn Transaction>) -> Result<()> {
        Ok(())
    }

    /// Mutations already applied during this transaction are NOT reverted;
    /// the memory backend has no write-ahead log to replay from.
    fn rollback_tx(&self, _tx: Box<dyn Transaction>) -> Result<()> {
        Ok(())
    }

    fn create_node(
        &self,
        _tx: &mut dyn Transaction,
        labels: Vec<String>,
        properties: PropertyMap,
    ) -> Result<Node> {
        let id = NodeId(self.inner.next_node_id.fetch_add(1, Ordering::Relaxed));
        let node = Node { id, element_id: None, labels, properties };

        {
            let mut idx = self.inner.label_index.write();
            for label in &node.labels {
                idx.entry(label.clone()).or_default().push(id);
            }
        }

        self.inner.nodes.write().insert(id, node.clone());
        self.inner.adjacency.write().insert(id, Vec::new());
        Ok(node)
    }

    fn get_node(&self, id: NodeId) -> Result<Option<Node>> {
        Ok(self.inner.nodes.read().get(&id).cloned())
    }

    fn delete_node(&self, _tx: &mut dyn Transaction, id: NodeId, detach: bool) -> Result<bool> {
        if detach {
            let rel_ids: Vec<RelId> = self
                .inner
                .adjacency
                .read()
                .get(&id)
                .cloned()
                .unwrap_or_default();
            for rid in rel_ids {
                self.delete_relationship_inner(rid);
            }
        } else {
            let adj = self.inner.adjacency.read();
            if let Some(rels) = adj.get(&id) {
                if !rels.is_empty() {
                    return Err(Error::ConstraintViolation(format!(
                        "cannot delete node {id} with {} relationships; use DETACH DELETE",
                        rels.len()
                    )));
                }
            }
        }

        let removed = self.inner.nodes.write().remove(&id);
        self.inner.adjacency.write().remove(&id);
        if let Some(node) = &removed {
            let mut idx = self.inner.label_index.write();
            for label in &node.labels {
                if let Some(ids) = idx.get_mut(label) {
                    ids.retain(|nid| *nid != id);
                }
            }
        }
        Ok(removed.is_some())
    }

    fn set_node_property(
        &self,
        _tx: &mut dyn Transaction,
        id: NodeId,
        key: &str,
        value: Value,
    ) -> Result<()> {
        let mut nodes = self.inner.nodes.write();
        let node = nodes.get_mut(&id).ok_or_else(|| Error::NotFound(format!("node {id}")))?;
        node.properties.insert(key.to_string(), value);
        Ok(())
    }

    fn remove_node_property(&self, _tx: &mut dyn Transaction, id: NodeId, key: &str) -> Result<()> {
        let mut nodes = self.inner.nodes.write();
        let node = nodes.get_mut(&id).ok_or_else(|| Error::NotFound(format!("node {id}")))?;
        node.properties.remove(key);
        Ok(())
    }

    fn add_label(&self, _tx: &mut dyn Transaction, id: NodeId, label: &str) -> Result<()> {
        let mut nodes = self.inner.nodes.write();
        let node = nodes.get_mut(&id).ok_or_else(|| Error::NotFound(format!("node {id}")))?;
        if !node.labels.iter().any(|l| l == label) {
            node.labels.push(label.to_string());
            drop(nodes);
            self.inner.label_index.write().entry(label.to_string()).or_default().push(id);
        }
        Ok(())
    }

    fn remove_label(&self, _tx: &mut dyn Transaction, id: NodeId, label: &str) -> Result<()> {
        let mut nodes = self.inner.nodes.write();
        let node = nodes.get_mut(&id).ok_or_else(|| Error::NotFound(format!("node {id}")))?;
        node.labels.retain(|l| l != label);
        drop(nodes);
        if let Some(ids) = self.inner.label_index.write().get_mut(label) {
            ids.retain(|nid| *nid != id);
        }
        Ok(())
    }

    fn create_relationship(
        &self,
        _tx: &mut dyn Transaction,
        src: NodeId,
        dst: NodeId,
        rel_type: &str,
        properties: PropertyMap,
    ) -> Result<Relationship> {
        {
            let nodes = self.inner.nodes.read();
            if !nodes.contains_key(&src) {
                return Err(Error::NotFound(format!("source node {src}")));
            }
            if !nodes.contains_key(&dst) {
                return Err(Error::NotFound(format!("target node {dst}")));
            }
        }

        let id = RelId(self.inner.next_rel_id.fetch_add(1, Ordering::Relaxed));
        let rel = Relationship {
            id,
            element_id: None,
            src,
            dst,
            rel_type: rel_type.to_string(),
            properties,
        };

        self.inner.relationships.write().insert(id, rel.clone());
        let mut adj = self.inner.adjacency.write();
        adj.entry(src).or_default().push(id);
        if src != dst {
            adj.entry(dst).or_default().push(id);
        }
        Ok(rel)
    }

    fn get_relationship(&self, id: RelId) -> Result<Option<Relationship>> {
        Ok(self.inner.relationships.read().get(&id).cloned())
    }

    fn delete_relationship(&self, _tx: &mut dyn Transaction, id: RelId) -> Result<bool> {
        Ok(self.delete_relationship_inner(id))
    }

    fn set_relationship_property(
        &self,
        _tx: &mut dyn Transaction,
        id: RelId,
        key: &str,
        value: Value,
    ) -> Result<()> {
        let mut rels = self.inner.relationships.write();
        let rel = rels.get_mut(&id).ok_or_else(|| Error::NotFound(format!("relationship {id}")))?;
        rel.properties.insert(key.to_string(), value);
        Ok(())
    }

    fn remove_relationship_property(
        &self,
        _tx: &mut dyn Transaction,
        id: RelId,
        key: &str,
    ) -> Result<()> {
        let mut rels = self.inner.relationships.write();
        let rel = rels.get_mut(&id).ok_or_else(|| Error::NotFound(format!("relationship {id}")))?;
        rel.properties.remove(key);
        Ok(())
    }

    fn scan_nodes(&self, labels: &[String]) -> Result<Vec<Node>> {
        if labels.is_empty() {
            return Ok(self.inner.nodes.read().values().cloned().collect());
        }
        let idx = self.inner.label_index.read();
        let nodes = self.inner.nodes.read();
        let candidates = idx.get(&labels[0]).cloned().unwrap_or_default();
        Ok(candidates
            .into_iter()
            .filter_map(|id| nodes.get(&id).cloned())
            .filter(|n| labels.iter().all(|l| n.has_label(l)))
            .collect())
    }

    fn expand(
        &self,
        start: NodeId,
        direction: Direction,
        rel_types: &[String],
        depth: ExpandDepth,
    ) -> Result<Vec<ExpandedPath>> {
        let (min_depth, max_depth) = match depth {
            ExpandDepth::Exact(d) => (d, d),
            ExpandDepth::Range { min, max } => (min, max),
            ExpandDepth::Unbounded => (1, 100),
        };

        let start_node = self
            .get_node(start)?
            .ok_or_else(|| Error::NotFound(format!("node {start}")))?;

        let mut results = Vec::new();
        let mut queue: Vec<Path> = vec![Path::single(start_node)];

        for current_depth in 0..max_depth {
            let mut next_queue = Vec::new();
            for path in &queue {
                let tip = path.end();
                let rels = self.relationships_of_locked(tip.id, direction, None);

                for rel in rels {
                    if !rel_types.is_empty() && !rel_types.iter().any(|t| t == &rel.rel_type) {
                        continue;
                    }
                    let next_id = rel.other_node(tip.id).unwrap_or(rel.dst);
                    if path.nodes.iter().any(|n| n.id == next_id) {
                        continue;
                    }
                    if let Some(next_node) = self.get_node(next_id)? {
                        let mut new_path = path.clone();
                        new_path.append(rel, next_node);

                        if current_depth + 1 >= min_depth {
                            results.push(ExpandedPath {
                                nodes: new_path.nodes.clone(),
                                relationships: new_path.relationships.clone(),
                            });
                        }
                        if current_depth + 1 < max_depth {
                            next_queue.push(new_path);
                        }
                    }
                }
            }
            queue = next_queue;
            if queue.is_empty() {
                break;
            }
        }

        Ok(results)
    }

    fn relationships_of(
        &self,
        node: NodeId,
        direction: Direction,
        rel_types: &[String],
    ) -> Result<Vec<Relationship>> {
        let all = self.relationships_of_locked(node, direction, None);
        if rel_types.is_empty() {
            return Ok(all);
        }
        Ok(all.into_iter().filter(|r| rel_types.iter().any(|t| t == &r.rel_type)).collect())
    }

    fn node_count(&self) -> Result<usize> {
        Ok(self.inner.nodes.read().len())
    }

    fn relationship_count(&self) -> Result<usize> {
        Ok(self.inner.relationships.read().len())
    }

    fn create_index(&self, _label: &str, _property: &str) -> Result<()> {
        // No-op: memory backend always full-scans; no real indexes maintained.
        Ok(())
    }

    fn drop_index(&self, _label: &str, _property: &str) -> Result<()> {
        Ok(())
    }

    fn create_constraint(&self, _label: &str, _property: &str, _kind: ConstraintType) -> Result<()> {
        Err(Error::GraphIOError("constraints not supported by the memory backend".into()))
    }

    fn drop_constraint(&self, _label: &str, _property: &str) -> Result<()> {
        Err(Error::GraphIOError("constraints not supported by the memory backend".into()))
    }
}

impl MemoryGraphModel {
    fn delete_relationship_inner(&self, id: RelId) -> bool {
        let removed = self.inner.relationships.write().remove(&id);
        if let Some(rel) = &removed {
            let mut adj = self.inner.adjacency.write();
            if let Some(rels) = adj.get_mut(&rel.src) {
                rels.retain(|rid| *rid != id);
            }
            if rel.src != rel.dst {
                if let Some(rels) = adj.get_mut(&rel.dst) {
                    rels.retain(|rid| *rid != id);
                }
            }
        }
        removed.is_some()
    }
}
