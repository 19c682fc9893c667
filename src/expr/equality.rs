//! Structural equality of expressions
//!
//! Two handles are equal when they denote the same computation: same operator, same
//! parameters, equal children. Physical tables compare by name and schema, a view only
//! equals itself.

use std::{cell::RefCell, collections::HashMap};

use super::{Graph, Node, NodeId};

/// Memoizes pairwise comparisons over one graph
#[derive(Debug)]
pub struct Equality<'a> {
    graph: &'a Graph,
    memo: RefCell<HashMap<(NodeId, NodeId), bool>>,
}

impl<'a> Equality<'a> {
    pub fn new(graph: &'a Graph) -> Self {
        Equality {
            graph,
            memo: RefCell::new(HashMap::new()),
        }
    }

    pub fn equals(&self, left: NodeId, right: NodeId) -> bool {
        if left == right {
            return true;
        }
        let key = if left < right { (left, right) } else { (right, left) };
        if let Some(result) = self.memo.borrow().get(&key) {
            return *result;
        }
        let result = self.compare(left, right);
        self.memo.borrow_mut().insert(key, result);
        result
    }

    fn compare(&self, left: NodeId, right: NodeId) -> bool {
        match (self.graph.node(left), self.graph.node(right)) {
            (Node::View(_), _) | (_, Node::View(_)) => false,
            (Node::Table(l), Node::Table(r)) => l == r,
            (l, r) => {
                // Same operator and parameters once children are blanked out
                let blank = |_| NodeId(0);
                l.map_children(blank) == r.map_children(blank)
                    && l
                        .children()
                        .into_iter()
                        .zip(r.children())
                        .all(|(lc, rc)| self.equals(lc, rc))
            }
        }
    }
}

impl Graph {
    /// Whether two expressions denote the same computation
    pub fn equals(&self, left: NodeId, right: NodeId) -> bool {
        Equality::new(self).equals(left, right)
    }
}
