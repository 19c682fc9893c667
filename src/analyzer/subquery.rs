//! Extraction of the subqueries a WHERE clause needs
//!
//! * a value whose columns are all under reductions becomes a scalar subquery,
//! * `any(predicate)` becomes `EXISTS`, over the tables the predicate reads that are not
//!   already in scope,
//! * membership in a column of another table becomes `IN (SELECT ...)`.
//!
//! A subquery reading tables of an enclosing block is correlated: both blocks then
//! qualify all their columns.

use super::{lift, Analyzer};
use crate::{
    error::{Error, Result},
    expr::{schema::DEFAULT_NAME, BinaryOp, Graph, Node, NodeId, Options},
    statement::{Query, Select, Subquery, SubqueryKind},
};

impl<'g> Analyzer<'g> {
    pub(super) fn extract_subqueries(&mut self, select: &mut Select) -> Result<()> {
        if select.predicates.is_empty() {
            return Ok(());
        }
        self.enclosing.push(select.leaves());
        let result = select
            .predicates
            .clone()
            .into_iter()
            .try_for_each(|predicate| self.visit(select, predicate));
        self.enclosing.pop();
        result?;
        let correlated = select.subqueries.iter().any(|subquery| {
            subquery.kind != SubqueryKind::Table && is_correlated(self.graph, &subquery.query)
        });
        if correlated {
            select.force_aliases = true;
            for subquery in select.subqueries.iter_mut() {
                if subquery.kind != SubqueryKind::Table && is_correlated(self.graph, &subquery.query) {
                    if let Query::Select(child) = &mut subquery.query {
                        child.force_aliases = true;
                    }
                }
            }
        }
        Ok(())
    }

    fn visit(&mut self, select: &mut Select, id: NodeId) -> Result<()> {
        if select.subquery(id).is_some() {
            return Ok(());
        }
        match self.graph.node(id).clone() {
            Node::Any(any) => {
                let child = self.exists(any.predicate)?;
                self.push(select, id, SubqueryKind::Exists, child)
            }
            Node::Contains(contains) => match contains.options {
                Options::Column(column) => {
                    let Node::Column(c) = self.graph.node(column).clone() else {
                        return Err(Error::invalid_expression("IN over a value that is not a column"));
                    };
                    let child = self.graph.projection(c.table, vec![column]);
                    self.push(select, id, SubqueryKind::In, child)?;
                    self.visit(select, contains.arg)
                }
                Options::List(values) => std::iter::once(contains.arg)
                    .chain(values)
                    .try_for_each(|value| self.visit(select, value)),
            },
            Node::Column(_) | Node::CountStar(_) => Ok(()),
            node if node.is_relation() => Ok(()),
            _ if is_scalar(self.graph, id) => {
                let table = self
                    .graph
                    .base_table(id)
                    .ok_or_else(|| Error::invalid_expression("reduction without a table"))?;
                let value = self.graph.alias(id, DEFAULT_NAME);
                let child = self.graph.aggregate(table, vec![], vec![value]);
                self.push(select, id, SubqueryKind::Scalar, child)
            }
            node => node
                .children()
                .into_iter()
                .try_for_each(|child| self.visit(select, child)),
        }
    }

    fn push(&mut self, select: &mut Select, id: NodeId, kind: SubqueryKind, child: NodeId) -> Result<()> {
        log::debug!("{:?} subquery for {}", kind, self.graph.display(id));
        let query = self.query(child)?;
        select.subqueries.push(Subquery {
            node: id,
            kind,
            query,
            cte: None,
        });
        Ok(())
    }

    /// `SELECT 1 FROM <tables not in scope> WHERE <conjuncts>`
    fn exists(&mut self, predicate: NodeId) -> Result<NodeId> {
        let tables: Vec<NodeId> = lift::tables(self.graph, predicate)
            .into_iter()
            .filter(|table| !self.enclosing.iter().any(|leaves| leaves.contains(table)))
            .collect();
        let mut tables = tables.into_iter();
        let first = tables
            .next()
            .ok_or_else(|| Error::invalid_expression("EXISTS over no table"))?;
        let table = tables.fold(first, |left, right| self.graph.cross_join(left, right));
        let conjuncts = conjuncts(self.graph, predicate);
        let filtered = self.graph.filter(table, conjuncts);
        let one = self.graph.literal(1);
        Ok(self.graph.projection(filtered, vec![one]))
    }
}

/// A value only reading columns under reductions
fn is_scalar(graph: &Graph, id: NodeId) -> bool {
    graph.has_reduction(id) && !graph.reads_outside_reductions(id)
}

fn conjuncts(graph: &Graph, predicate: NodeId) -> Vec<NodeId> {
    match graph.node(predicate) {
        Node::Binary(b) if b.op == BinaryOp::And => {
            let mut result = conjuncts(graph, b.left);
            result.extend(conjuncts(graph, b.right));
            result
        }
        _ => vec![predicate],
    }
}

/// Whether a block reads tables it does not define itself
fn is_correlated(graph: &Graph, query: &Query) -> bool {
    let Query::Select(select) = query else {
        return false;
    };
    let leaves = select.leaves();
    select
        .select_set
        .iter()
        .chain(&select.predicates)
        .chain(&select.having)
        .filter(|value| !graph.is_relation(**value))
        .flat_map(|value| outer_tables(graph, select, *value))
        .any(|table| !leaves.contains(&table) && !select.outputs.contains(&table))
}

/// Tables read by a value, not counting the ones read by its own subqueries
fn outer_tables(graph: &Graph, select: &Select, id: NodeId) -> Vec<NodeId> {
    if select.subquery(id).is_some() {
        return vec![];
    }
    match graph.node(id) {
        Node::Column(c) => vec![c.table],
        node if node.is_relation() => vec![],
        node => node
            .children()
            .into_iter()
            .flat_map(|child| outer_tables(graph, select, child))
            .collect(),
    }
}
