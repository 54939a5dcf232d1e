//! # lynx_cypher — embeddable Cypher query execution engine
//!
//! A synchronous, single-threaded Cypher execution core: lexer/parser →
//! logical plan → pull-based physical operator tree → runner, evaluated
//! against an in-memory reference `GraphModel`.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `GraphModel` is the contract between the operator
//!    tree and whatever stores the graph.
//! 2. **Clean DTOs**: `Node`, `Relationship`, `Value` cross every boundary.
//! 3. **Parser owns nothing**: Cypher → AST is a pure function.
//! 4. **No cost-based planner**: `planner::plan`/`optimize` is a rule-free
//!    translation plus one optimization (dropping `WHERE true`); the
//!    operator tree does the real work.
//!
//! ## Quick Start
//!
//! ```rust
//! use lynx_cypher::{Graph, Value, PropertyMap};
//!
//! # fn example() -> lynx_cypher::Result<()> {
//! let graph = Graph::open_memory();
//!
//! let mut params = PropertyMap::new();
//! params.insert("name".into(), Value::from("Ada"));
//! let result = graph.mutate("CREATE (n:Person {name: $name}) RETURN n", params)?;
//! assert_eq!(result.rows().len(), 1);
//!
//! let found = graph.execute("MATCH (n:Person) RETURN n.name AS name", PropertyMap::new())?;
//! for row in found.rows() {
//!     println!("{:?}", row.get_value("name"));
//! }
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cypher;
pub mod dataframe;
pub mod error;
pub mod expr;
pub mod graph_model;
pub mod index;
pub mod model;
pub mod physical;
pub mod planner;
pub mod runner;
pub mod storage;
pub mod tx;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{Direction, Node, NodeId, Path, PropertyMap, RelId, Relationship, Value};

// ============================================================================
// Re-exports: Graph model
// ============================================================================

pub use graph_model::{BackendCapabilities, ConstraintType, GraphModel, ProcedureResult};

// ============================================================================
// Re-exports: Transactions
// ============================================================================

pub use tx::{Transaction, TxId, TxMode};

// ============================================================================
// Re-exports: Errors
// ============================================================================

pub use error::{Error, Result};

// ============================================================================
// Re-exports: Runner / results
// ============================================================================

pub use runner::{FromValue, QueryResult, ResultRow, Runner};

// ============================================================================
// Top-level Graph handle
// ============================================================================

/// The primary entry point: a `GraphModel` plus the Cypher runner over it.
pub struct Graph<G: GraphModel> {
    backend: G,
}

impl<G: GraphModel> Graph<G> {
    /// Wraps an existing `GraphModel` backend.
    pub fn with_backend(backend: G) -> Self {
        Self { backend }
    }

    fn runner(&self) -> Runner<'_> {
        Runner::new(&self.backend)
    }

    /// Executes a Cypher statement. Read or write — the runner picks
    /// `TxMode` from the statement's logical plan, so `execute` and
    /// `mutate` are the same operation under two names kept for call-site
    /// clarity.
    pub fn execute<P>(&self, query: &str, params: P) -> Result<QueryResult>
    where
        P: Into<PropertyMap>,
    {
        self.runner().run(query, params.into())
    }

    /// Alias for `execute`, for call sites that want to signal intent to
    /// mutate the graph.
    pub fn mutate<P>(&self, query: &str, params: P) -> Result<QueryResult>
    where
        P: Into<PropertyMap>,
    {
        self.runner().run(query, params.into())
    }

    /// Access the underlying backend (for advanced use, e.g. direct schema
    /// introspection that bypasses Cypher).
    pub fn backend(&self) -> &G {
        &self.backend
    }
}

/// In-memory graph for testing and embedding.
impl Graph<storage::MemoryGraphModel> {
    pub fn open_memory() -> Self {
        Self::with_backend(storage::MemoryGraphModel::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_execute_and_mutate_round_trip() {
        let graph = Graph::open_memory();
        graph.mutate("CREATE (n:Person {name: 'Ada'}) RETURN n", PropertyMap::new()).unwrap();
        let result = graph.execute("MATCH (n:Person) RETURN n.name AS name", PropertyMap::new()).unwrap();
        assert_eq!(result.rows().len(), 1);
        assert_eq!(result.rows()[0].get::<String>("name").unwrap(), "Ada");
    }
}
