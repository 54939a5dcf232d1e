//! Query planner — transforms Cypher AST into a logical plan, then into the
//! physical operator tree `physical::Operator` executes (spec §4.5).
//!
//! Per the design note accompanying this module, there is no cost model and
//! no alternative physical-plan search: `plan` is a rule-free translation of
//! the AST into a slightly more structured tree, `optimize` applies the one
//! rule this engine bothers with (dropping a literal `WHERE true`), and
//! `build_physical` lowers the result into `physical::Operator`s one-to-one.

use std::collections::HashMap;

use crate::cypher::ast::{
    Clause, CreateClause, DeleteClause, Expr, Literal, MatchClause, MergeClause, OrderExpr, Pattern, PatternDirection,
    PatternElement, RemoveClause, RemoveItem, ReturnClause, SchemaCommand, SetClause, SetItem, Statement, UnionClause,
    WithClause,
};
use crate::expr::Bindings;
use crate::graph_model::ExpandDepth;
use crate::model::{Direction, LynxType, PropertyMap, Value};
use crate::physical::{
    Aggregation, AllNodesScan, Apply, Argument, Create, CreateStep, DeleteEntities, Distinct, Expand, Filter, Limit, Merge,
    MergeStep, NodeScan, Operator, OrderBy, Project, RemoveItems, RemoveStep, SetProperties, SetStep, Skip, Union, Unwind,
    With,
};
use crate::{Error, Result};

/// The result of `plan`: a thin, validated mirror of the parsed statement.
/// Kept as its own type (rather than reusing `Statement` directly) so the
/// planner has a seam for the one optimization rule it applies, and so the
/// runner's plan-inspection accessors have a stable name distinct from the
/// raw AST.
#[derive(Debug, Clone)]
pub enum LogicalPlan {
    Query(crate::cypher::ast::Query),
    Create(CreateClause),
    Merge(MergeClause),
    Delete(DeleteClause),
    Set(SetClause),
    Remove(RemoveClause),
    Schema(SchemaCommand),
    Union(UnionClause),
}

/// Create a logical plan from a parsed AST. Purely structural — no
/// semantic validation beyond what parsing already guarantees.
pub fn plan(ast: &Statement, _params: &PropertyMap) -> Result<LogicalPlan> {
    Ok(match ast {
        Statement::Query(q) => LogicalPlan::Query(q.clone()),
        Statement::Create(c) => LogicalPlan::Create(c.clone()),
        Statement::Merge(m) => LogicalPlan::Merge(m.clone()),
        Statement::Delete(d) => LogicalPlan::Delete(d.clone()),
        Statement::Set(s) => LogicalPlan::Set(s.clone()),
        Statement::Remove(r) => LogicalPlan::Remove(r.clone()),
        Statement::Schema(s) => LogicalPlan::Schema(s.clone()),
        Statement::Union(u) => LogicalPlan::Union(u.clone()),
    })
}

fn is_literal_true(expr: &Expr) -> bool {
    matches!(expr, Expr::Literal(Literal::Bool(true)))
}

fn strip_trivial_where(where_clause: Option<Expr>) -> Option<Expr> {
    where_clause.filter(|e| !is_literal_true(e))
}

/// Applies the one optimization this engine performs: dropping a `WHERE
/// true` that survived parsing (e.g. from parameter substitution upstream).
/// No cost-based rewrites, no join reordering, no index selection — out of
/// scope per the planner's design note.
pub fn optimize(plan: LogicalPlan) -> Result<LogicalPlan> {
    Ok(match plan {
        LogicalPlan::Query(mut q) => {
            q.where_clause = strip_trivial_where(q.where_clause);
            for w in &mut q.with_clauses {
                w.where_clause = strip_trivial_where(w.where_clause.take());
            }
            for clause in &mut q.clauses {
                if let Clause::With(w) = clause {
                    w.where_clause = strip_trivial_where(w.where_clause.take());
                }
            }
            LogicalPlan::Query(q)
        }
        LogicalPlan::Delete(mut d) => {
            d.where_clause = strip_trivial_where(d.where_clause);
            LogicalPlan::Delete(d)
        }
        LogicalPlan::Set(mut s) => {
            s.where_clause = strip_trivial_where(s.where_clause);
            LogicalPlan::Set(s)
        }
        LogicalPlan::Remove(mut r) => {
            r.where_clause = strip_trivial_where(r.where_clause);
            LogicalPlan::Remove(r)
        }
        LogicalPlan::Union(u) => {
            let first = optimize_query(u.first);
            let rest = u.rest.into_iter().map(|(all, q)| (all, optimize_query(q))).collect();
            LogicalPlan::Union(UnionClause { first, rest })
        }
        other => other,
    })
}

fn optimize_query(mut q: crate::cypher::ast::Query) -> crate::cypher::ast::Query {
    q.where_clause = strip_trivial_where(q.where_clause);
    for w in &mut q.with_clauses {
        w.where_clause = strip_trivial_where(w.where_clause.take());
    }
    for clause in &mut q.clauses {
        if let Clause::With(w) = clause {
            w.where_clause = strip_trivial_where(w.where_clause.take());
        }
    }
    q
}

// ============================================================================
// Shared pattern → operator lowering
// ============================================================================

fn convert_direction(dir: PatternDirection) -> Direction {
    match dir {
        PatternDirection::Right => Direction::Outgoing,
        PatternDirection::Left => Direction::Incoming,
        PatternDirection::Both => Direction::Both,
    }
}

fn expand_depth(var_length: &Option<crate::cypher::ast::VarLength>) -> ExpandDepth {
    match var_length {
        None => ExpandDepth::Exact(1),
        Some(vl) => match (vl.min, vl.max) {
            (None, None) => ExpandDepth::Unbounded,
            (min, max) => ExpandDepth::Range { min: min.unwrap_or(1), max: max.unwrap_or(usize::MAX) },
        },
    }
}

fn property_eq_filter(root: Box<dyn Operator>, alias: &str, properties: &HashMap<String, Expr>) -> Box<dyn Operator> {
    let mut root = root;
    for (key, value_expr) in properties {
        let predicate = Expr::BinaryOp {
            left: Box::new(Expr::Property { expr: Box::new(Expr::Variable(alias.to_string())), key: key.clone() }),
            op: crate::cypher::ast::BinaryOp::Eq,
            right: Box::new(value_expr.clone()),
        };
        root = Box::new(Filter::new(root, predicate));
    }
    root
}

fn label_filter(root: Box<dyn Operator>, alias: &str, labels: &[String]) -> Box<dyn Operator> {
    let mut root = root;
    for label in labels {
        let predicate = Expr::HasLabel { expr: Box::new(Expr::Variable(alias.to_string())), label: label.clone() };
        root = Box::new(Filter::new(root, predicate));
    }
    root
}

/// Builds the operator chain for one pattern, given the bindings already
/// known from whatever correlated this pattern (an outer MATCH, or an
/// earlier pattern in the same comma-separated list). A node alias already
/// present in `outer` is reused rather than rescanned; variables introduced
/// fresh are scanned or expanded.
fn build_pattern_operator(pattern: &Pattern, outer: &Bindings) -> Box<dyn Operator> {
    let mut elements = pattern.elements.iter();
    let first = match elements.next() {
        Some(PatternElement::Node(n)) => n,
        _ => return Box::new(Argument::with_row(outer.clone())),
    };

    let first_alias = first.alias.clone().unwrap_or_else(|| "__anon_n0".to_string());
    let mut root: Box<dyn Operator> = if outer.contains_key(&first_alias) {
        Box::new(Argument::with_row(outer.clone()))
    } else if first.labels.is_empty() {
        Box::new(AllNodesScan::new(first_alias.clone()))
    } else {
        Box::new(NodeScan::new(first_alias.clone(), first.labels.clone()))
    };
    root = property_eq_filter(root, &first_alias, &first.properties);

    let mut prev_alias = first_alias;
    let mut anon_counter = 1;
    let rest: Vec<&PatternElement> = elements.collect();
    let mut i = 0;
    while i + 1 < rest.len() {
        let rel = match rest[i] {
            PatternElement::Relationship(r) => r,
            _ => break,
        };
        let node = match rest[i + 1] {
            PatternElement::Node(n) => n,
            _ => break,
        };
        let to_alias = node.alias.clone().unwrap_or_else(|| {
            let name = format!("__anon_n{anon_counter}");
            anon_counter += 1;
            name
        });
        let direction = convert_direction(rel.direction);
        let depth = expand_depth(&rel.var_length);
        root = Box::new(Expand::new(root, prev_alias.clone(), to_alias.clone(), rel.alias.clone(), direction, rel.rel_types.clone(), depth));
        if let Some(rel_alias) = &rel.alias {
            root = property_eq_filter(root, rel_alias, &rel.properties);
        }
        root = label_filter(root, &to_alias, &node.labels);
        root = property_eq_filter(root, &to_alias, &node.properties);
        prev_alias = to_alias;
        i += 2;
    }
    root
}

fn pattern_schema_fields(pattern: &Pattern) -> Vec<(String, LynxType)> {
    pattern
        .elements
        .iter()
        .filter_map(|el| match el {
            PatternElement::Node(n) => n.alias.clone().map(|a| (a, LynxType::Node)),
            PatternElement::Relationship(r) => r.alias.clone().map(|a| (a, LynxType::Relationship)),
        })
        .collect()
}

/// Builds the combined chain for every comma-separated pattern in one MATCH
/// (or MERGE/CREATE) clause, correlating each against the growing set of
/// bindings the previous patterns introduced.
fn build_match_patterns(patterns: &[Pattern], outer: &Bindings) -> Box<dyn Operator> {
    let mut root: Box<dyn Operator> = Box::new(Argument::with_row(outer.clone()));
    for pattern in patterns {
        let fields = pattern_schema_fields(pattern);
        let pattern = pattern.clone();
        root = Box::new(Apply::new(root, fields, Box::new(move |row: &Bindings| build_pattern_operator(&pattern, row)), false));
    }
    root
}

fn apply_match_clause(prior: Box<dyn Operator>, m: &MatchClause) -> Box<dyn Operator> {
    let patterns = m.patterns.clone();
    let fields: Vec<(String, LynxType)> = m.patterns.iter().flat_map(pattern_schema_fields).collect();
    let optional = m.optional;
    Box::new(Apply::new(prior, fields, Box::new(move |row: &Bindings| build_match_patterns(&patterns, row)), optional))
}

// ============================================================================
// RETURN / WITH projection
// ============================================================================

/// Column name Cypher assigns a projected expression with no explicit `AS`.
fn default_alias(expr: &Expr) -> String {
    match expr {
        Expr::Variable(name) => name.clone(),
        Expr::Property { expr, key } => format!("{}.{key}", default_alias(expr)),
        Expr::Parameter(name) => format!("${name}"),
        Expr::FunctionCall { name, args, .. } => {
            let arg_names: Vec<String> = args.iter().map(default_alias).collect();
            format!("{name}({})", arg_names.join(", "))
        }
        Expr::CountStar => "count(*)".to_string(),
        Expr::Literal(Literal::String(s)) => format!("\"{s}\""),
        Expr::Literal(Literal::Int(n)) => n.to_string(),
        Expr::Literal(Literal::Float(f)) => f.to_string(),
        Expr::Literal(Literal::Bool(b)) => b.to_string(),
        Expr::Literal(Literal::Null) => "null".to_string(),
        _ => "expr".to_string(),
    }
}

fn expand_star(items: &[(Expr, Option<String>)], child: &dyn Operator) -> Vec<(Expr, String)> {
    let mut out = Vec::new();
    for (expr, alias) in items {
        if matches!(expr, Expr::Star) {
            for name in child.schema().names() {
                out.push((Expr::Variable(name.clone()), name));
            }
        } else {
            let name = alias.clone().unwrap_or_else(|| default_alias(expr));
            out.push((expr.clone(), name));
        }
    }
    out
}

fn build_return(child: Box<dyn Operator>, rc: &ReturnClause) -> Box<dyn Operator> {
    build_return_with_order(child, rc, None).0
}

/// Builds the RETURN projection (and, for an aggregating query, the implicit
/// `GROUP BY`), plus the `ORDER BY` keys the caller still needs to apply.
///
/// `Project`/`Aggregation` emit only the declared output columns, so an
/// `ORDER BY` key that refers to a variable bound before the projection (e.g.
/// `RETURN n.name ORDER BY n.age`) can't be evaluated once it sits above
/// them — real Cypher still has that variable in scope for ORDER BY, even
/// though RETURN didn't project it. For a non-aggregating query this
/// function projects a superset that also computes each such key under a
/// hidden alias, sorts by those hidden columns immediately, then projects
/// back down to the declared output columns — so the returned order-key list
/// is empty and the caller has nothing left to apply. An aggregating query's
/// ORDER BY can only see the aggregation's own output (real Cypher's "not
/// possible to access variables declared before WITH/RETURN" rule once an
/// aggregation or DISTINCT has collapsed rows), so its keys pass through
/// unchanged for the caller to apply after this projection.
fn build_return_with_order(
    child: Box<dyn Operator>,
    rc: &ReturnClause,
    order_by: Option<&[OrderExpr]>,
) -> (Box<dyn Operator>, Vec<(Expr, bool)>) {
    let pairs: Vec<(Expr, Option<String>)> = rc.items.iter().map(|i| (i.expr.clone(), i.alias.clone())).collect();
    let items = expand_star(&pairs, child.as_ref());
    let has_aggregation = items.iter().any(|(e, _)| contains_aggregate(e));

    let mut hidden_items: Vec<(Expr, String)> = Vec::new();
    let mut keys: Vec<(Expr, bool)> = Vec::new();
    if let Some(order) = order_by {
        if has_aggregation {
            keys = order_keys(order);
        } else {
            for (i, o) in order.iter().enumerate() {
                let alias = format!("__order_by_{i}");
                hidden_items.push((o.expr.clone(), alias.clone()));
                keys.push((Expr::Variable(alias), o.ascending));
            }
        }
    }

    let mut all_items = items.clone();
    all_items.extend(hidden_items.iter().cloned());

    let mut root: Box<dyn Operator> = if has_aggregation {
        // Cypher's implicit GROUP BY: any projected item that isn't itself
        // an aggregate becomes a grouping key.
        let (group_by, aggregations): (Vec<_>, Vec<_>) = all_items.into_iter().partition(|(e, _)| !contains_aggregate(e));
        Box::new(Aggregation::new(child, group_by, aggregations))
    } else {
        Box::new(Project::new(child, all_items))
    };

    let remaining_keys = if hidden_items.is_empty() {
        keys
    } else {
        root = Box::new(OrderBy::new(root, keys));
        let visible: Vec<(Expr, String)> = items.iter().map(|(_, alias)| (Expr::Variable(alias.clone()), alias.clone())).collect();
        root = Box::new(Project::new(root, visible));
        Vec::new()
    };

    if rc.distinct {
        root = Box::new(Distinct::new(root));
    }
    (root, remaining_keys)
}

fn contains_aggregate(expr: &Expr) -> bool {
    match expr {
        Expr::CountStar => true,
        Expr::FunctionCall { name, args, .. } => {
            crate::expr::functions::is_aggregating_name(name) || args.iter().any(contains_aggregate)
        }
        Expr::BinaryOp { left, right, .. } => contains_aggregate(left) || contains_aggregate(right),
        Expr::UnaryOp { expr, .. } => contains_aggregate(expr),
        Expr::Property { expr, .. } => contains_aggregate(expr),
        Expr::Case { operand, whens, else_expr } => {
            operand.as_deref().map(contains_aggregate).unwrap_or(false)
                || whens.iter().any(|(w, t)| contains_aggregate(w) || contains_aggregate(t))
                || else_expr.as_deref().map(contains_aggregate).unwrap_or(false)
        }
        _ => false,
    }
}

fn eval_constant_int(expr: &Expr, params: &PropertyMap) -> Result<i64> {
    match expr {
        Expr::Literal(Literal::Int(n)) => Ok(*n),
        Expr::Parameter(name) => match params.get(name) {
            Some(Value::Int(n)) => Ok(*n),
            Some(other) => Err(Error::TypeMismatch { expected: "Integer".into(), got: other.type_name().into() }),
            None => Err(Error::UnknownParameter(name.clone())),
        },
        _ => Err(Error::PlanError("SKIP/LIMIT must be a literal integer or parameter".into())),
    }
}

fn order_keys(order_by: &[OrderExpr]) -> Vec<(Expr, bool)> {
    order_by.iter().map(|o| (o.expr.clone(), o.ascending)).collect()
}

fn build_with_clause(prior: Box<dyn Operator>, w: &WithClause) -> Result<Box<dyn Operator>> {
    let pairs: Vec<(Expr, Option<String>)> = w.items.iter().map(|i| (i.expr.clone(), i.alias.clone())).collect();
    let items = expand_star(&pairs, prior.as_ref());
    let order = w.order_by.as_deref().map(order_keys).unwrap_or_default();
    let skip = w.skip.as_ref().map(|e| eval_constant_int(e, &PropertyMap::new())).transpose()?;
    let limit = w.limit.as_ref().map(|e| eval_constant_int(e, &PropertyMap::new())).transpose()?;
    let with_op: Box<dyn Operator> = Box::new(With::new(prior, items, w.distinct, order, skip, limit));
    Ok(match &w.where_clause {
        Some(pred) => Box::new(Filter::new(with_op, pred.clone())),
        None => with_op,
    })
}

// ============================================================================
// MATCH-driven pipelines for DELETE / SET / REMOVE
// ============================================================================

fn build_matches(matches: &[MatchClause], where_clause: &Option<Expr>) -> Box<dyn Operator> {
    let mut root: Box<dyn Operator> = Box::new(Argument::new());
    for m in matches {
        root = apply_match_clause(root, m);
    }
    if let Some(pred) = where_clause {
        root = Box::new(Filter::new(root, pred.clone()));
    }
    root
}

fn convert_set_items(items: &[SetItem]) -> Vec<SetStep> {
    items
        .iter()
        .map(|i| match i {
            SetItem::Property { variable, key, value } => {
                SetStep::Property { variable: variable.clone(), key: key.clone(), value: value.clone() }
            }
            SetItem::AllProperties { variable, value } => SetStep::AllProperties { variable: variable.clone(), value: value.clone() },
            SetItem::MergeProperties { variable, value } => {
                SetStep::MergeProperties { variable: variable.clone(), value: value.clone() }
            }
            SetItem::Label { variable, label } => SetStep::Label { variable: variable.clone(), label: label.clone() },
        })
        .collect()
}

fn convert_remove_items(items: &[RemoveItem]) -> Vec<RemoveStep> {
    items
        .iter()
        .map(|i| match i {
            RemoveItem::Property { variable, key } => RemoveStep::Property { variable: variable.clone(), key: key.clone() },
            RemoveItem::Label { variable, label } => RemoveStep::Label { variable: variable.clone(), label: label.clone() },
        })
        .collect()
}

// ============================================================================
// CREATE / MERGE pattern lowering
// ============================================================================

/// Lowers comma-separated CREATE patterns into a flat step list. A node
/// mentioned with no labels and no properties, whose alias was already
/// declared by an earlier pattern or element in the same CREATE, is treated
/// as a reference to the node just created rather than a second node —
/// this is what lets `CREATE (a:A), (b:B), (a)-[:R]->(b)` wire up a
/// relationship between two already-created nodes.
fn build_create_steps(patterns: &[Pattern]) -> Vec<CreateStep> {
    let mut steps = Vec::new();
    let mut declared: std::collections::HashSet<String> = std::collections::HashSet::new();
    let mut anon_counter = 0;

    let mut push_node = |steps: &mut Vec<CreateStep>, declared: &mut std::collections::HashSet<String>, node: &crate::cypher::ast::NodePattern, anon_counter: &mut usize| -> String {
        let alias = node.alias.clone().unwrap_or_else(|| {
            let name = format!("__anon_n{anon_counter}");
            *anon_counter += 1;
            name
        });
        let already_bound = node.alias.as_deref().is_some_and(|a| declared.contains(a));
        let bare_reference = already_bound && node.labels.is_empty() && node.properties.is_empty();
        if !bare_reference {
            steps.push(CreateStep::Node {
                alias: Some(alias.clone()),
                labels: node.labels.clone(),
                properties: node.properties.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            });
            declared.insert(alias.clone());
        }
        alias
    };

    for pattern in patterns {
        let mut elements = pattern.elements.iter();
        let first = match elements.next() {
            Some(PatternElement::Node(n)) => n,
            _ => continue,
        };
        let mut prev_alias = push_node(&mut steps, &mut declared, first, &mut anon_counter);

        let rest: Vec<&PatternElement> = elements.collect();
        let mut i = 0;
        while i + 1 < rest.len() {
            let rel = match rest[i] {
                PatternElement::Relationship(r) => r,
                _ => break,
            };
            let node = match rest[i + 1] {
                PatternElement::Node(n) => n,
                _ => break,
            };
            let to_alias = push_node(&mut steps, &mut declared, node, &mut anon_counter);
            steps.push(CreateStep::Relationship {
                alias: rel.alias.clone(),
                from: prev_alias.clone(),
                to: to_alias.clone(),
                rel_type: rel.rel_types.first().cloned().unwrap_or_default(),
                properties: rel.properties.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            });
            prev_alias = to_alias;
            i += 2;
        }
    }
    steps
}

fn build_merge_steps(pattern: &Pattern) -> Vec<MergeStep> {
    let mut steps = Vec::new();
    let mut elements = pattern.elements.iter();
    let first = match elements.next() {
        Some(PatternElement::Node(n)) => n,
        _ => return steps,
    };
    let first_alias = first.alias.clone().unwrap_or_else(|| "__anon_n0".to_string());
    steps.push(MergeStep::Node {
        alias: first_alias.clone(),
        labels: first.labels.clone(),
        properties: first.properties.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
    });
    let mut prev_alias = first_alias;
    let mut anon_counter = 1;
    let rest: Vec<&PatternElement> = elements.collect();
    let mut i = 0;
    while i + 1 < rest.len() {
        let rel = match rest[i] {
            PatternElement::Relationship(r) => r,
            _ => break,
        };
        let node = match rest[i + 1] {
            PatternElement::Node(n) => n,
            _ => break,
        };
        let to_alias = node.alias.clone().unwrap_or_else(|| {
            let name = format!("__anon_n{anon_counter}");
            anon_counter += 1;
            name
        });
        steps.push(MergeStep::Node {
            alias: to_alias.clone(),
            labels: node.labels.clone(),
            properties: node.properties.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        });
        steps.push(MergeStep::Relationship {
            alias: rel.alias.clone(),
            from: prev_alias.clone(),
            to: to_alias.clone(),
            rel_type: rel.rel_types.first().cloned().unwrap_or_default(),
            properties: rel.properties.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        });
        prev_alias = to_alias;
        i += 2;
    }
    steps
}

// ============================================================================
// Top-level query pipeline
// ============================================================================

fn build_query(q: &crate::cypher::ast::Query, params: &PropertyMap) -> Result<Box<dyn Operator>> {
    let mut root: Box<dyn Operator> = Box::new(Argument::new());
    let mut where_applied = q.where_clause.is_none();

    if !q.clauses.is_empty() {
        for clause in &q.clauses {
            match clause {
                Clause::Match(m) => root = apply_match_clause(root, m),
                Clause::Unwind(u) => {
                    if !where_applied {
                        if let Some(pred) = &q.where_clause {
                            root = Box::new(Filter::new(root, pred.clone()));
                        }
                        where_applied = true;
                    }
                    root = Box::new(Unwind::new(root, u.expr.clone(), u.alias.clone()));
                }
                Clause::With(w) => {
                    if !where_applied {
                        if let Some(pred) = &q.where_clause {
                            root = Box::new(Filter::new(root, pred.clone()));
                        }
                        where_applied = true;
                    }
                    root = build_with_clause(root, w)?;
                }
            }
        }
    } else {
        for m in &q.matches {
            root = apply_match_clause(root, m);
        }
        for w in &q.with_clauses {
            if !where_applied {
                if let Some(pred) = &q.where_clause {
                    root = Box::new(Filter::new(root, pred.clone()));
                }
                where_applied = true;
            }
            root = build_with_clause(root, w)?;
        }
    }

    if !where_applied {
        if let Some(pred) = &q.where_clause {
            root = Box::new(Filter::new(root, pred.clone()));
        }
    }

    let (returned, remaining_order_keys) = build_return_with_order(root, &q.return_clause, q.order_by.as_deref());
    root = returned;
    if !remaining_order_keys.is_empty() {
        root = Box::new(OrderBy::new(root, remaining_order_keys));
    }
    if let Some(skip) = &q.skip {
        root = Box::new(Skip::new(root, eval_constant_int(skip, params)?));
    }
    if let Some(limit) = &q.limit {
        root = Box::new(Limit::new(root, eval_constant_int(limit, params)?));
    }

    Ok(root)
}

/// Lowers an optimized logical plan into the physical operator tree.
/// `SchemaCommand`s carry no rows and are executed directly by the runner
/// against the graph model, so this just returns an inert leaf for them.
pub fn build_physical(plan: &LogicalPlan, params: &PropertyMap) -> Result<Box<dyn Operator>> {
    match plan {
        LogicalPlan::Query(q) => build_query(q, params),
        LogicalPlan::Create(c) => {
            let steps = build_create_steps(&c.patterns);
            let mut root: Box<dyn Operator> = Box::new(Create::new(Box::new(Argument::new()), steps));
            if let Some(rc) = &c.return_clause {
                root = build_return(root, rc);
            }
            Ok(root)
        }
        LogicalPlan::Merge(m) => {
            let steps = build_merge_steps(&m.pattern);
            let on_create = convert_set_items(&m.on_create);
            let on_match = convert_set_items(&m.on_match);
            let mut root: Box<dyn Operator> = Box::new(Merge::new(Box::new(Argument::new()), steps, on_create, on_match));
            if let Some(rc) = &m.return_clause {
                root = build_return(root, rc);
            }
            Ok(root)
        }
        LogicalPlan::Delete(d) => {
            let root = build_matches(&d.matches, &d.where_clause);
            Ok(Box::new(DeleteEntities::new(root, d.variables.clone(), d.detach)))
        }
        LogicalPlan::Set(s) => {
            let root = build_matches(&s.matches, &s.where_clause);
            let mut root: Box<dyn Operator> = Box::new(SetProperties::new(root, convert_set_items(&s.items)));
            if let Some(rc) = &s.return_clause {
                root = build_return(root, rc);
            }
            Ok(root)
        }
        LogicalPlan::Remove(r) => {
            let root = build_matches(&r.matches, &r.where_clause);
            let mut root: Box<dyn Operator> = Box::new(RemoveItems::new(root, convert_remove_items(&r.items)));
            if let Some(rc) = &r.return_clause {
                root = build_return(root, rc);
            }
            Ok(root)
        }
        LogicalPlan::Schema(_) => Ok(Box::new(Argument::new())),
        LogicalPlan::Union(u) => build_union(u, params),
    }
}

/// Builds a left-associative UNION chain: each branch's `all` flag governs
/// whether it is deduplicated against everything accumulated so far.
fn build_union(u: &UnionClause, params: &PropertyMap) -> Result<Box<dyn Operator>> {
    let mut acc = build_query(&u.first, params)?;
    for (all, branch) in &u.rest {
        let rhs = build_query(branch, params)?;
        acc = Box::new(Union::new(acc, rhs, *all)?);
    }
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cypher::ast::{Literal as Lit, ReturnItem};
    use crate::expr::ExecutionContext;
    use crate::storage::MemoryGraphModel;
    use crate::tx::TxMode;

    fn empty_query() -> crate::cypher::ast::Query {
        crate::cypher::ast::Query {
            matches: Vec::new(),
            where_clause: None,
            with_clauses: Vec::new(),
            clauses: Vec::new(),
            return_clause: ReturnClause { distinct: false, items: vec![ReturnItem { expr: Expr::Literal(Lit::Int(1)), alias: Some("one".into()) }] },
            order_by: None,
            skip: None,
            limit: None,
        }
    }

    #[test]
    fn test_plan_then_build_literal_return() {
        let graph = MemoryGraphModel::new();
        let ctx = ExecutionContext::new(PropertyMap::new(), &graph, TxMode::ReadOnly).unwrap();
        let stmt = Statement::Query(empty_query());
        let logical = plan(&stmt, &PropertyMap::new()).unwrap();
        let logical = optimize(logical).unwrap();
        let mut op = build_physical(&logical, &PropertyMap::new()).unwrap();
        let rows = op.collect(&ctx).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("one"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_union_all_preserves_duplicates() {
        let graph = MemoryGraphModel::new();
        let ctx = ExecutionContext::new(PropertyMap::new(), &graph, TxMode::ReadOnly).unwrap();
        let stmt = crate::cypher::parser::parse_statement(
            &crate::cypher::lexer::tokenize("RETURN 1 AS one UNION ALL RETURN 1 AS one").unwrap(),
        )
        .unwrap();
        let logical = optimize(plan(&stmt, &PropertyMap::new()).unwrap()).unwrap();
        let mut op = build_physical(&logical, &PropertyMap::new()).unwrap();
        let rows = op.collect(&ctx).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_order_by_resolves_pre_projection_variable() {
        let graph = MemoryGraphModel::new();
        let runner = crate::runner::Runner::new(&graph);
        runner.run("CREATE (:Person {name: 'Bob', age: 40})", PropertyMap::new()).unwrap();
        runner.run("CREATE (:Person {name: 'Ada', age: 20})", PropertyMap::new()).unwrap();
        let result = runner.run("MATCH (n:Person) RETURN n.name ORDER BY n.age", PropertyMap::new()).unwrap();
        let names: Vec<String> = result.rows().iter().map(|r| r.get::<String>("n.name").unwrap()).collect();
        assert_eq!(names, vec!["Ada", "Bob"]);
    }

    #[test]
    fn test_union_dedups_without_all() {
        let graph = MemoryGraphModel::new();
        let ctx = ExecutionContext::new(PropertyMap::new(), &graph, TxMode::ReadOnly).unwrap();
        let stmt = crate::cypher::parser::parse_statement(
            &crate::cypher::lexer::tokenize("RETURN 1 AS one UNION RETURN 1 AS one").unwrap(),
        )
        .unwrap();
        let logical = optimize(plan(&stmt, &PropertyMap::new()).unwrap()).unwrap();
        let mut op = build_physical(&logical, &PropertyMap::new()).unwrap();
        let rows = op.collect(&ctx).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_optimize_strips_trivial_where() {
        let mut q = empty_query();
        q.where_clause = Some(Expr::Literal(Lit::Bool(true)));
        let logical = optimize(LogicalPlan::Query(q)).unwrap();
        match logical {
            LogicalPlan::Query(q) => assert!(q.where_clause.is_none()),
            _ => panic!("expected Query"),
        }
    }

    #[test]
    fn test_default_alias_for_property_access() {
        let expr = Expr::Property { expr: Box::new(Expr::Variable("n".into())), key: "name".into() };
        assert_eq!(default_alias(&expr), "n.name");
    }
}
