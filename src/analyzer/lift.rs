//! # Lifting
//!
//! Once several operators are folded into one SELECT block, the values of the block
//! still refer to the intermediate tables. Lifting rewrites them so that every column
//! refers to a table that is actually named in the FROM clause: columns of a filter,
//! sort, limit or distinct refer to its input, columns of a join to the side providing
//! the field, columns of a projection or aggregation are replaced by their definition.
//!
//! The graph only grows, so a value with nothing to rewrite keeps its handle.

use std::collections::{HashMap, HashSet};

use crate::expr::{Column, Graph, Node, NodeId};

/// What to do with columns of the folded operators
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Substitute definitions all the way down to the leaves
    Substitute,
    /// Like `Substitute`, but columns of the block outputs stay as they are, for ORDER BY
    Output,
    /// Only see through projections
    Projections,
}

/// The operators folded into a block
#[derive(Clone, Debug, Default)]
pub struct Scope {
    pub fused: HashSet<NodeId>,
    pub outputs: HashSet<NodeId>,
    /// The rebuilt join standing for every folded join
    pub join: Option<NodeId>,
}

impl Scope {
    pub fn new<I: IntoIterator<Item = NodeId>>(fused: I) -> Self {
        Scope {
            fused: fused.into_iter().collect(),
            ..Scope::default()
        }
    }

    pub fn contains(&self, table: NodeId) -> bool {
        self.fused.contains(&table)
    }

    /// The table a `*` over `table` stands for
    pub fn star(&self, graph: &Graph, table: NodeId) -> NodeId {
        if !self.contains(table) {
            return table;
        }
        match graph.node(table) {
            Node::Selection(s) => self.star(graph, s.table),
            Node::Sort(s) => self.star(graph, s.table),
            Node::Limit(l) => self.star(graph, l.table),
            Node::Distinct(d) => self.star(graph, d.table),
            Node::Join(_) => self.join.unwrap_or(table),
            _ => table,
        }
    }
}

/// A memoized rewriting pass over a [`Scope`]
#[derive(Debug)]
pub struct Lift<'s> {
    scope: &'s Scope,
    mode: Mode,
    memo: HashMap<NodeId, NodeId>,
}

impl<'s> Lift<'s> {
    pub fn new(scope: &'s Scope, mode: Mode) -> Self {
        Lift {
            scope,
            mode,
            memo: HashMap::new(),
        }
    }

    pub fn value(&mut self, graph: &mut Graph, id: NodeId) -> NodeId {
        if let Some(lifted) = self.memo.get(&id) {
            return *lifted;
        }
        let node = graph.node(id).clone();
        let lifted = match &node {
            Node::Column(c) => self.column(graph, Some(id), c.table, &c.name),
            Node::CountStar(_) => id,
            node if node.is_relation() => id,
            node => {
                let children = node.children();
                let mapping: HashMap<NodeId, NodeId> = children
                    .iter()
                    .map(|child| (*child, self.value(graph, *child)))
                    .collect();
                if mapping.iter().all(|(child, lifted)| child == lifted) {
                    id
                } else {
                    graph.push(node.map_children(|child| mapping.get(&child).copied().unwrap_or(child)))
                }
            }
        };
        self.memo.insert(id, lifted);
        lifted
    }

    /// Lift a value and keep the output name it had
    pub fn named(&mut self, graph: &mut Graph, item: NodeId) -> NodeId {
        let inner = graph.unaliased(item);
        let lifted = self.value(graph, inner);
        if lifted == inner {
            return item;
        }
        match graph.name(item).map(str::to_string) {
            Some(name) => {
                if matches!(graph.node(lifted), Node::Column(c) if c.name == name) {
                    lifted
                } else {
                    graph.alias(lifted, name)
                }
            }
            None => lifted,
        }
    }

    fn column(
        &mut self,
        graph: &mut Graph,
        original: Option<NodeId>,
        table: NodeId,
        name: &str,
    ) -> NodeId {
        let keep = |graph: &mut Graph| {
            original.unwrap_or_else(|| {
                graph.insert(Column {
                    table,
                    name: name.to_string(),
                })
            })
        };
        if !self.scope.contains(table)
            || (self.mode == Mode::Output && self.scope.outputs.contains(&table))
        {
            return keep(graph);
        }
        let through_projections = self.mode == Mode::Projections;
        match graph.node(table).clone() {
            Node::Selection(s) if !through_projections => self.column(graph, None, s.table, name),
            Node::Sort(s) if !through_projections => self.column(graph, None, s.table, name),
            Node::Limit(l) if !through_projections => self.column(graph, None, l.table, name),
            Node::Distinct(d) if !through_projections => self.column(graph, None, d.table, name),
            Node::Join(j) if !through_projections => {
                let side = if graph.has_field(j.left, name) {
                    j.left
                } else {
                    j.right
                };
                self.column(graph, None, side, name)
            }
            Node::Projection(p) => {
                for item in p.selections {
                    if graph.is_relation(item) {
                        if graph.has_field(item, name) {
                            return self.column(graph, None, item, name);
                        }
                    } else if graph.name(item) == Some(name) {
                        let definition = graph.unaliased(item);
                        return self.value(graph, definition);
                    }
                }
                keep(graph)
            }
            Node::Aggregation(a) if !through_projections => {
                match a
                    .by
                    .iter()
                    .chain(&a.metrics)
                    .find(|item| graph.name(**item) == Some(name))
                {
                    Some(item) => {
                        let definition = graph.unaliased(*item);
                        self.value(graph, definition)
                    }
                    None => keep(graph),
                }
            }
            _ => keep(graph),
        }
    }
}

/// The tables a value reads from
pub fn tables(graph: &Graph, id: NodeId) -> Vec<NodeId> {
    let mut found: Vec<NodeId> = vec![];
    for column in graph.columns(id) {
        if let Node::Column(c) = graph.node(column) {
            if !found.contains(&c.table) {
                found.push(c.table)
            }
        }
    }
    found
}

/// Whether the predicates read the folded operators only through unchanged columns,
/// so that they can be evaluated against the folded operators' input
pub fn pushable(graph: &mut Graph, scope: &Scope, predicates: &[NodeId]) -> bool {
    let mut lift = Lift::new(scope, Mode::Substitute);
    predicates.iter().all(|predicate| {
        graph.columns(*predicate).into_iter().all(|column| {
            let (table, name) = match graph.node(column) {
                Node::Column(c) => (c.table, c.name.clone()),
                _ => return true,
            };
            if !scope.contains(table) {
                return true;
            }
            let lifted = lift.value(graph, column);
            matches!(graph.node(lifted), Node::Column(c) if c.name == name)
        })
    })
}
