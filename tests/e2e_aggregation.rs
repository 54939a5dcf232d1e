//! End-to-end integration tests for aggregation, grouping, and result ordering.
//!
//! Tests count, sum, collect, DISTINCT, ORDER BY, SKIP, LIMIT, and grouped aggregation.
//! Each test exercises: parse -> plan -> optimize -> execute against MemoryGraphModel.

use lynx_cypher::{storage::MemoryGraphModel, Graph, Value};
use lynx_cypher::PropertyMap;

// ============================================================================
// Helper: create a set of Person nodes with names and ages.
// ============================================================================

fn setup_people() -> Graph<MemoryGraphModel> {
    let graph = Graph::open_memory();

    let people = [("Alice", 25), ("Bob", 30), ("Charlie", 35), ("Diana", 28), ("Eve", 22)];

    for (name, age) in &people {
        graph.mutate(&format!("CREATE (n:Person {{name: '{name}', age: {age}}})"), PropertyMap::new()).unwrap();
    }

    graph
}

// ============================================================================
// 1. count(n) — count all nodes
// ============================================================================

#[test]
fn test_count_all() {
    let graph = setup_people();

    let result = graph.execute("MATCH (n:Person) RETURN count(n) AS count", PropertyMap::new()).unwrap();

    assert_eq!(result.rows().len(), 1);
    let count: i64 = result.rows()[0].get("count").unwrap();
    assert_eq!(count, 5);
}

// ============================================================================
// 2. count with WHERE filter
// ============================================================================

#[test]
fn test_count_with_filter() {
    let graph = setup_people();

    let result = graph.execute("MATCH (n:Person) WHERE n.age > 27 RETURN count(n) AS count", PropertyMap::new()).unwrap();

    assert_eq!(result.rows().len(), 1);
    let count: i64 = result.rows()[0].get("count").unwrap();
    // Bob(30), Charlie(35), Diana(28) = 3 people over 27
    assert_eq!(count, 3);
}

// ============================================================================
// 3. sum() aggregate
// ============================================================================

#[test]
fn test_sum_aggregate() {
    let graph = Graph::open_memory();

    let items = [("Widget", 10), ("Gadget", 25), ("Doohickey", 15)];

    for (name, price) in &items {
        graph.mutate(&format!("CREATE (n:Item {{name: '{name}', price: {price}}})"), PropertyMap::new()).unwrap();
    }

    let result = graph.execute("MATCH (n:Item) RETURN sum(n.price) AS total", PropertyMap::new()).unwrap();

    assert_eq!(result.rows().len(), 1);
    let total: i64 = result.rows()[0].get("total").unwrap();
    assert_eq!(total, 50); // 10 + 25 + 15
}

// ============================================================================
// 4. RETURN DISTINCT values
// ============================================================================

#[test]
fn test_distinct_values() {
    let graph = Graph::open_memory();

    // Create nodes with duplicate names
    graph.mutate("CREATE (n:Person {name: 'Alice'})", PropertyMap::new()).unwrap();
    graph.mutate("CREATE (n:Person {name: 'Alice'})", PropertyMap::new()).unwrap();
    graph.mutate("CREATE (n:Person {name: 'Bob'})", PropertyMap::new()).unwrap();
    graph.mutate("CREATE (n:Person {name: 'Bob'})", PropertyMap::new()).unwrap();
    graph.mutate("CREATE (n:Person {name: 'Charlie'})", PropertyMap::new()).unwrap();

    let result = graph.execute("MATCH (n:Person) RETURN DISTINCT n.name", PropertyMap::new()).unwrap();

    // Should have 3 distinct names, not 5
    let names: Vec<String> = result.rows().iter().map(|row| row.get::<String>("n.name").unwrap()).collect();

    assert_eq!(names.len(), 3, "Expected 3 distinct names, got {names:?}");
    assert!(names.contains(&"Alice".to_string()));
    assert!(names.contains(&"Bob".to_string()));
    assert!(names.contains(&"Charlie".to_string()));
}

// ============================================================================
// 5. ORDER BY ascending (default)
// ============================================================================

#[test]
fn test_order_by_ascending() {
    let graph = setup_people();

    let result = graph.execute("MATCH (n:Person) RETURN n.name ORDER BY n.name", PropertyMap::new()).unwrap();

    let names: Vec<String> = result.rows().iter().map(|row| row.get::<String>("n.name").unwrap()).collect();

    assert_eq!(names.len(), 5);
    assert_eq!(names, vec!["Alice", "Bob", "Charlie", "Diana", "Eve"]);
}

// ============================================================================
// 6. ORDER BY descending
// ============================================================================

#[test]
fn test_order_by_descending() {
    let graph = setup_people();

    let result = graph.execute("MATCH (n:Person) RETURN n.name ORDER BY n.name DESC", PropertyMap::new()).unwrap();

    let names: Vec<String> = result.rows().iter().map(|row| row.get::<String>("n.name").unwrap()).collect();

    assert_eq!(names.len(), 5);
    assert_eq!(names, vec!["Eve", "Diana", "Charlie", "Bob", "Alice"]);
}

// ============================================================================
// 7. ORDER BY numeric field
// ============================================================================

#[test]
fn test_order_by_numeric() {
    let graph = setup_people();

    let result = graph.execute("MATCH (n:Person) RETURN n.name, n.age ORDER BY n.age", PropertyMap::new()).unwrap();

    let ages: Vec<i64> = result.rows().iter().map(|row| row.get::<i64>("n.age").unwrap()).collect();

    assert_eq!(ages, vec![22, 25, 28, 30, 35]);
}

// ============================================================================
// 8. SKIP and LIMIT combined
// ============================================================================

#[test]
fn test_skip_and_limit() {
    let graph = setup_people();

    let result = graph.execute("MATCH (n:Person) RETURN n.name ORDER BY n.name SKIP 2 LIMIT 2", PropertyMap::new()).unwrap();

    assert_eq!(result.rows().len(), 2, "SKIP 2 LIMIT 2 on 5 rows should return exactly 2 rows");

    let names: Vec<String> = result.rows().iter().map(|row| row.get::<String>("n.name").unwrap()).collect();
    assert_eq!(names, vec!["Charlie", "Diana"]);
}

// ============================================================================
// 9. LIMIT alone
// ============================================================================

#[test]
fn test_limit_alone() {
    let graph = setup_people();

    let result = graph.execute("MATCH (n:Person) RETURN n LIMIT 3", PropertyMap::new()).unwrap();

    assert_eq!(result.rows().len(), 3);
}

// ============================================================================
// 10. SKIP alone
// ============================================================================

#[test]
fn test_skip_alone() {
    let graph = setup_people();

    let result = graph.execute("MATCH (n:Person) RETURN n SKIP 3", PropertyMap::new()).unwrap();

    assert_eq!(result.rows().len(), 2, "5 total - 3 skipped = 2 remaining");
}

// ============================================================================
// 11. collect() aggregate
// ============================================================================

#[test]
fn test_collect_aggregate() {
    let graph = Graph::open_memory();

    graph.mutate("CREATE (n:Person {name: 'Alice'})", PropertyMap::new()).unwrap();
    graph.mutate("CREATE (n:Person {name: 'Bob'})", PropertyMap::new()).unwrap();
    graph.mutate("CREATE (n:Person {name: 'Charlie'})", PropertyMap::new()).unwrap();

    let result = graph.execute("MATCH (n:Person) RETURN collect(n.name) AS names", PropertyMap::new()).unwrap();

    assert_eq!(result.rows().len(), 1);

    let collected: Vec<Value> = result.rows()[0].get("names").unwrap();
    assert_eq!(collected.len(), 3);

    let collected_strings: Vec<&str> = collected.iter().filter_map(|v| v.as_str()).collect();

    assert!(collected_strings.contains(&"Alice"));
    assert!(collected_strings.contains(&"Bob"));
    assert!(collected_strings.contains(&"Charlie"));
}

// ============================================================================
// 12. min() and max() aggregates
// ============================================================================

#[test]
fn test_min_aggregate() {
    let graph = setup_people();

    let result = graph.execute("MATCH (n:Person) RETURN min(n.age) AS youngest", PropertyMap::new()).unwrap();

    assert_eq!(result.rows().len(), 1);
    let min_age: i64 = result.rows()[0].get("youngest").unwrap();
    assert_eq!(min_age, 22); // Eve is youngest
}

#[test]
fn test_max_aggregate() {
    let graph = setup_people();

    let result = graph.execute("MATCH (n:Person) RETURN max(n.age) AS oldest", PropertyMap::new()).unwrap();

    assert_eq!(result.rows().len(), 1);
    let max_age: i64 = result.rows()[0].get("oldest").unwrap();
    assert_eq!(max_age, 35); // Charlie is oldest
}

// ============================================================================
// 13. avg() aggregate
// ============================================================================

#[test]
fn test_avg_aggregate() {
    let graph = setup_people();

    let result = graph.execute("MATCH (n:Person) RETURN avg(n.age) AS average", PropertyMap::new()).unwrap();

    assert_eq!(result.rows().len(), 1);
    let avg_age: f64 = result.rows()[0].get("average").unwrap();
    // (25 + 30 + 35 + 28 + 22) / 5 = 140 / 5 = 28.0
    assert!((avg_age - 28.0).abs() < 0.001, "Expected avg 28.0, got {avg_age}");
}

// ============================================================================
// 14. count on empty result set
// ============================================================================

#[test]
fn test_count_empty_result() {
    let graph = Graph::open_memory();

    // No nodes exist at all
    let result = graph.execute("MATCH (n:Person) RETURN count(n) AS count", PropertyMap::new()).unwrap();

    assert_eq!(result.rows().len(), 1, "count() on empty set should return 1 row");
    let count: i64 = result.rows()[0].get("count").unwrap();
    assert_eq!(count, 0, "count() on empty set should be 0");
}

// ============================================================================
// 15. Multiple aggregates in single query
// ============================================================================

#[test]
fn test_multiple_aggregates() {
    let graph = setup_people();

    let result = graph
        .execute("MATCH (n:Person) RETURN count(n) AS count, min(n.age) AS youngest, max(n.age) AS oldest", PropertyMap::new())
        .unwrap();

    assert_eq!(result.rows().len(), 1);

    let count: i64 = result.rows()[0].get("count").unwrap();
    assert_eq!(count, 5);

    let min_age: i64 = result.rows()[0].get("youngest").unwrap();
    assert_eq!(min_age, 22);

    let max_age: i64 = result.rows()[0].get("oldest").unwrap();
    assert_eq!(max_age, 35);
}

// ============================================================================
// 16. ORDER BY with LIMIT (top-N query)
// ============================================================================

#[test]
fn test_order_by_with_limit() {
    let graph = setup_people();

    // Get the 2 oldest people
    let result = graph
        .execute("MATCH (n:Person) RETURN n.name, n.age ORDER BY n.age DESC LIMIT 2", PropertyMap::new())
        .unwrap();

    assert_eq!(result.rows().len(), 2);

    let first_name: String = result.rows()[0].get("n.name").unwrap();
    let first_age: i64 = result.rows()[0].get("n.age").unwrap();
    assert_eq!(first_name, "Charlie");
    assert_eq!(first_age, 35);

    let second_name: String = result.rows()[1].get("n.name").unwrap();
    let second_age: i64 = result.rows()[1].get("n.age").unwrap();
    assert_eq!(second_name, "Bob");
    assert_eq!(second_age, 30);
}

// ============================================================================
// 17. DISTINCT with count (should count distinct values)
// ============================================================================

#[test]
fn test_count_distinct() {
    let graph = Graph::open_memory();

    // Create people in departments with duplicates
    graph.mutate("CREATE (n:Person {name: 'Alice', dept: 'Eng'})", PropertyMap::new()).unwrap();
    graph.mutate("CREATE (n:Person {name: 'Bob', dept: 'Eng'})", PropertyMap::new()).unwrap();
    graph.mutate("CREATE (n:Person {name: 'Charlie', dept: 'Sales'})", PropertyMap::new()).unwrap();

    // count(DISTINCT n.dept) should give 2 (Eng, Sales)
    let result = graph.execute("MATCH (n:Person) RETURN count(DISTINCT n.dept) AS count", PropertyMap::new()).unwrap();

    assert_eq!(result.rows().len(), 1);
    let count: i64 = result.rows()[0].get("count").unwrap();
    assert_eq!(count, 2, "There should be 2 distinct departments");
}

// ============================================================================
// 18. sum() on empty result set
// ============================================================================

#[test]
fn test_sum_empty_result() {
    let graph = Graph::open_memory();

    let result = graph.execute("MATCH (n:Item) RETURN sum(n.price) AS total", PropertyMap::new()).unwrap();

    assert_eq!(result.rows().len(), 1, "sum() on empty set should return 1 row");
    let total: i64 = result.rows()[0].get("total").unwrap();
    assert_eq!(total, 0, "sum() on empty set should be 0");
}
