//! Factoring of derived tables used more than once into common table expressions
//!
//! Derived tables are compared with [`Graph::equals`], the body of a view counts as an
//! occurrence of the table it views. A body is only searched once for nested
//! occurrences.

use itertools::Itertools;

use crate::{
    expr::{Graph, Node, NodeId},
    statement::{Query, SubqueryKind},
};

/// A derived table found at least twice
#[derive(Clone, Debug)]
pub struct Group {
    pub body: NodeId,
    /// The FROM leaves standing for it
    pub occurrences: Vec<NodeId>,
    /// The compiled body, from its first occurrence
    pub query: Query,
}

/// Find the shared derived tables and mark their occurrences
pub fn factor(graph: &Graph, query: &mut Query) -> Vec<Group> {
    let mut candidates: Vec<(NodeId, Vec<NodeId>)> = vec![];
    collect(graph, query, &mut candidates);
    let shared: Vec<(NodeId, Vec<NodeId>)> = candidates
        .into_iter()
        .filter(|(_, occurrences)| occurrences.len() > 1)
        .collect();
    if shared.is_empty() {
        return vec![];
    }
    for (body, occurrences) in &shared {
        log::debug!(
            "promoting {} to a common table expression, read by {}",
            graph.display(*body),
            occurrences.iter().join(", ")
        );
    }
    mark(query, &shared);
    shared
        .into_iter()
        .filter_map(|(body, occurrences)| {
            let query = occurrences
                .first()
                .and_then(|first| find(query, *first))?
                .clone();
            Some(Group {
                body,
                occurrences,
                query,
            })
        })
        .collect()
}

fn body(graph: &Graph, leaf: NodeId) -> NodeId {
    match graph.node(leaf) {
        Node::View(v) => v.table,
        _ => leaf,
    }
}

fn collect(graph: &Graph, query: &Query, candidates: &mut Vec<(NodeId, Vec<NodeId>)>) {
    match query {
        Query::Union { left, right, .. } => {
            collect(graph, left, candidates);
            collect(graph, right, candidates);
        }
        Query::Select(select) => {
            for leaf in select.leaves() {
                let Some(derived) = select.derived(leaf) else {
                    continue;
                };
                let body = body(graph, leaf);
                match candidates
                    .iter_mut()
                    .find(|(candidate, _)| graph.equals(*candidate, body))
                {
                    Some((_, occurrences)) => occurrences.push(leaf),
                    None => {
                        candidates.push((body, vec![leaf]));
                        collect(graph, &derived.query, candidates);
                    }
                }
            }
            for subquery in &select.subqueries {
                if subquery.kind != SubqueryKind::Table {
                    collect(graph, &subquery.query, candidates);
                }
            }
        }
    }
}

fn mark(query: &mut Query, shared: &[(NodeId, Vec<NodeId>)]) {
    match query {
        Query::Union { left, right, .. } => {
            mark(left, shared);
            mark(right, shared);
        }
        Query::Select(select) => {
            for subquery in select.subqueries.iter_mut() {
                if subquery.kind == SubqueryKind::Table {
                    subquery.cte = shared
                        .iter()
                        .position(|(_, occurrences)| occurrences.contains(&subquery.node));
                }
                mark(&mut subquery.query, shared);
            }
        }
    }
}

fn find(query: &Query, leaf: NodeId) -> Option<&Query> {
    match query {
        Query::Union { left, right, .. } => find(left, leaf).or_else(|| find(right, leaf)),
        Query::Select(select) => select.subqueries.iter().find_map(|subquery| {
            if subquery.kind == SubqueryKind::Table && subquery.node == leaf {
                Some(&subquery.query)
            } else {
                find(&subquery.query, leaf)
            }
        }),
    }
}
