//! # Query analysis
//!
//! Turns an expression graph into a [`Statement`]: the chain of relational operators
//! above each table is folded into as few SELECT blocks as possible, joins are
//! flattened, subqueries are extracted from WHERE clauses, repeated derived tables are
//! factored into common table expressions and every block is bound to an alias
//! [`Context`].
//!
//! The input graph is never modified, the statement owns an extended copy of it.
//!

pub mod cte;
pub mod lift;
pub mod subquery;

use std::rc::Rc;

use crate::{
    context::Context,
    error::{Error, Result},
    expr::{schema::DEFAULT_NAME, Graph, Join, JoinKind, Node, NodeId, SortKey},
    statement::{
        Cte, Handler, JoinClause, LimitClause, Query, Select, Statement, Subquery, SubqueryKind,
        TableSet,
    },
};
use lift::{Lift, Mode, Scope};

/// Name of the ranking metric of a top-k filter
pub const TOPK_METRIC: &str = "__tmp__";

/// Analyze the expression rooted at `root`
pub fn build_ast(graph: &Graph, root: NodeId) -> Result<Statement> {
    let mut graph = graph.clone();
    let (root, handler) = adapt(&mut graph, root)?;
    let mut analyzer = Analyzer::new(&mut graph);
    let mut query = match root {
        Root::Relation(node) => analyzer.query(node)?,
        Root::Values(values) => Query::Select(Box::new(analyzer.constant(values))),
    };
    let groups = cte::factor(&graph, &mut query);
    let ctes = bind(&graph, &mut query, groups);
    log::debug!("analyzed {} with {} common table expressions", root_name(&query), ctes.len());
    Ok(Statement::new(graph, query, ctes, handler))
}

/// Compile the expression rooted at `root` to Impala SQL
pub fn to_sql(graph: &Graph, root: NodeId) -> Result<String> {
    build_ast(graph, root)?.compile()
}

fn root_name(query: &Query) -> String {
    match query {
        Query::Select(select) => format!("a block over {}", select.node),
        Query::Union { .. } => "a union".to_string(),
    }
}

enum Root {
    Relation(NodeId),
    /// Values computed without any table
    Values(Vec<NodeId>),
}

/// Turn a root that is not a table into one, and record how to read its result back
fn adapt(graph: &mut Graph, root: NodeId) -> Result<(Root, Handler)> {
    let node = graph.node(root).clone();
    if node.is_relation() {
        return Ok((Root::Relation(root), Handler::Table));
    }
    match node {
        Node::Column(c) if matches!(graph.node(c.table), Node::Aggregation(_)) => {
            Ok((Root::Relation(c.table), Handler::Column(c.name)))
        }
        Node::ExprList(list) => {
            let values: Vec<NodeId> = list.exprs.iter().map(|e| named(graph, *e)).collect();
            match graph.base_table(root) {
                Some(table) => Ok((
                    Root::Relation(graph.projection(table, values)),
                    Handler::Table,
                )),
                None => Ok((Root::Values(values), Handler::Table)),
            }
        }
        Node::TopK(_) | Node::Any(_) | Node::Interval(_) => Err(Error::invalid_expression(
            format!("{} cannot be computed on its own", graph.display(root)),
        )),
        _ => {
            let value = named(graph, root);
            match graph.base_table(root) {
                None => Ok((Root::Values(vec![value]), Handler::Scalar)),
                Some(table) if graph.has_reduction(root) => Ok((
                    Root::Relation(graph.aggregate(table, vec![], vec![value])),
                    Handler::Scalar,
                )),
                Some(table) => {
                    let name = graph.name(value).unwrap_or(DEFAULT_NAME).to_string();
                    Ok((
                        Root::Relation(graph.projection(table, vec![value])),
                        Handler::Column(name),
                    ))
                }
            }
        }
    }
}

fn named(graph: &mut Graph, value: NodeId) -> NodeId {
    match graph.name(value) {
        Some(_) => value,
        None => graph.alias(value, DEFAULT_NAME),
    }
}

/// Split a chain of filters into the filtered table, the filters and their predicates,
/// innermost first
fn peel(graph: &Graph, node: NodeId) -> (NodeId, Vec<NodeId>, Vec<NodeId>) {
    let mut chain = vec![];
    let mut layers = vec![];
    let mut current = node;
    while let Node::Selection(s) = graph.node(current) {
        chain.push(current);
        layers.push(s.predicates.clone());
        current = s.table;
    }
    (current, chain, layers.into_iter().rev().flatten().collect())
}

/// A projection folded with the projection below it
#[derive(Clone, Debug)]
struct Fused {
    node: NodeId,
    absorbed: Vec<NodeId>,
}

/// Fold a projection selecting `*` from another projection, possibly filtered, into a
/// single projection over the inner input
pub fn fuse(graph: &mut Graph, projection: NodeId) -> Option<NodeId> {
    fuse_projection(graph, projection).map(|fused| fused.node)
}

fn fuse_projection(graph: &mut Graph, projection: NodeId) -> Option<Fused> {
    let Node::Projection(outer) = graph.node(projection).clone() else {
        return None;
    };
    let (inner, chain, predicates) = peel(graph, outer.table);
    let Node::Projection(inner_projection) = graph.node(inner).clone() else {
        return None;
    };
    let absorbed: Vec<NodeId> = chain.into_iter().chain([inner]).collect();
    if !outer.selections.iter().any(|item| absorbed.contains(item)) {
        return None;
    }
    let scope = Scope::new(absorbed.iter().copied());
    if !lift::pushable(graph, &scope, &predicates) {
        return None;
    }
    let mut lift = Lift::new(&scope, Mode::Substitute);
    let mut selections = vec![];
    for item in outer.selections {
        if absorbed.contains(&item) {
            selections.extend(inner_projection.selections.iter().copied())
        } else if graph.is_relation(item) {
            selections.push(item)
        } else {
            selections.push(lift.named(graph, item))
        }
    }
    let table = if predicates.is_empty() {
        inner_projection.table
    } else {
        let predicates = predicates
            .into_iter()
            .map(|predicate| lift.value(graph, predicate))
            .collect();
        graph.filter(inner_projection.table, predicates)
    };
    Some(Fused {
        node: graph.projection(table, selections),
        absorbed,
    })
}

/// A block under construction
#[derive(Debug)]
struct Block {
    select: Select,
    scope: Scope,
    aggregate: bool,
}

impl Block {
    fn new(node: NodeId) -> Self {
        Block {
            select: Select::new(node),
            scope: Scope::default(),
            aggregate: false,
        }
    }

    fn fold(&mut self, node: NodeId) {
        self.scope.fused.insert(node);
    }

    fn output(&mut self, node: NodeId) {
        self.scope.fused.insert(node);
        self.scope.outputs.insert(node);
        self.select.outputs.push(node);
    }
}

pub struct Analyzer<'g> {
    graph: &'g mut Graph,
    /// Leaves of the blocks being built, innermost last
    enclosing: Vec<Vec<NodeId>>,
}

impl<'g> Analyzer<'g> {
    pub fn new(graph: &'g mut Graph) -> Self {
        Analyzer {
            graph,
            enclosing: vec![],
        }
    }

    pub fn query(&mut self, node: NodeId) -> Result<Query> {
        match self.graph.node(node).clone() {
            Node::Union(u) => Ok(Query::Union {
                left: Box::new(self.query(u.left)?),
                right: Box::new(self.query(u.right)?),
                distinct: u.distinct,
            }),
            _ => Ok(Query::Select(Box::new(self.select(node)?))),
        }
    }

    /// A block without FROM clause
    pub fn constant(&mut self, values: Vec<NodeId>) -> Select {
        let mut select = Select::new(values.first().copied().unwrap_or_else(|| self.graph.null()));
        select.select_set = values;
        select
    }

    pub fn select(&mut self, node: NodeId) -> Result<Select> {
        let mut block = Block::new(node);
        let mut current = node;
        while let Node::Limit(l) = self.graph.node(current) {
            if block.select.limit.is_none() {
                block.select.limit = Some(LimitClause {
                    n: l.n,
                    offset: l.offset,
                });
            }
            block.fold(current);
            current = l.table;
        }
        if let Node::Sort(s) = self.graph.node(current) {
            block.select.order_by = s.keys.clone();
            block.fold(current);
            current = s.table;
            // The outer ordering wins
            while let Node::Sort(s) = self.graph.node(current) {
                block.fold(current);
                current = s.table;
            }
        }
        if let Node::Distinct(d) = self.graph.node(current) {
            block.select.distinct = true;
            block.fold(current);
            current = d.table;
        }
        self.core(&mut block, current)?;
        self.finish(block)
    }

    fn core(&mut self, block: &mut Block, node: NodeId) -> Result<()> {
        match self.graph.node(node).clone() {
            Node::Projection(_) => return self.projection(block, node, vec![]),
            Node::Aggregation(_) => return self.aggregation(block, node, vec![]),
            Node::Selection(_) => {}
            other if other.is_relation() => {
                block.select.select_set = vec![node];
                block.select.predicates = self.from_source(block, node)?;
                return Ok(());
            }
            _ => {
                return Err(Error::invalid_expression(format!(
                    "{} is not a table",
                    self.graph.display(node)
                )))
            }
        }
        let (remainder, chain, predicates) = peel(self.graph, node);
        let remainder_node = self.graph.node(remainder).clone();
        chain.iter().for_each(|s| block.fold(*s));
        match remainder_node {
            Node::Projection(_) if self.pushable(remainder, &chain, &predicates) => {
                self.projection(block, remainder, predicates)
            }
            // Filters over an aggregation are HAVING clauses
            Node::Aggregation(_) => self.aggregation(block, remainder, predicates),
            _ => {
                block.select.select_set = vec![remainder];
                let mut filters = self.from_source(block, remainder)?;
                filters.extend(predicates);
                block.select.predicates = filters;
                Ok(())
            }
        }
    }

    fn pushable(&mut self, projection: NodeId, chain: &[NodeId], predicates: &[NodeId]) -> bool {
        let scope = Scope::new(chain.iter().copied().chain([projection]));
        lift::pushable(self.graph, &scope, predicates)
    }

    fn projection(&mut self, block: &mut Block, node: NodeId, extra: Vec<NodeId>) -> Result<()> {
        block.output(node);
        let mut core = node;
        while let Some(fused) = fuse_projection(self.graph, core) {
            log::debug!("fused {} into {}", core, fused.node);
            fused.absorbed.into_iter().for_each(|n| block.fold(n));
            core = fused.node;
            block.output(core);
        }
        let Node::Projection(projection) = self.graph.node(core).clone() else {
            return Err(Error::invalid_expression(format!("{} is not a projection", core)));
        };
        block.select.select_set = projection.selections;
        let source = self.ordered_source(block, projection.table);
        let mut filters = self.from_source(block, source)?;
        filters.extend(extra);
        block.select.predicates = filters;
        Ok(())
    }

    /// Fold the sorts right under a projection into the ordering of the block
    fn ordered_source(&mut self, block: &mut Block, node: NodeId) -> NodeId {
        let mut current = node;
        while let Node::Sort(s) = self.graph.node(current) {
            if block.select.order_by.is_empty() {
                log::debug!("ordering {} by the sort {}", block.select.node, current);
                block.select.order_by = s.keys.clone();
            }
            block.fold(current);
            current = s.table;
        }
        current
    }

    fn aggregation(&mut self, block: &mut Block, node: NodeId, having: Vec<NodeId>) -> Result<()> {
        let Node::Aggregation(aggregation) = self.graph.node(node).clone() else {
            return Err(Error::invalid_expression(format!("{} is not an aggregation", node)));
        };
        block.output(node);
        block.aggregate = true;
        block.select.group_by = (0..aggregation.by.len()).collect();
        block.select.select_set = aggregation
            .by
            .iter()
            .chain(&aggregation.metrics)
            .copied()
            .collect();
        block.select.having = aggregation.having.into_iter().chain(having).collect();
        block.select.predicates = self.from_source(block, aggregation.table)?;
        Ok(())
    }

    /// Set the FROM clause of the block from `node`, returning the filters peeled off
    fn from_source(&mut self, block: &mut Block, node: NodeId) -> Result<Vec<NodeId>> {
        match self.graph.node(node).clone() {
            Node::Selection(_) => {
                let (remainder, chain, predicates) = peel(self.graph, node);
                if matches!(self.graph.node(remainder), Node::Projection(_))
                    && self.pushable(remainder, &chain, &predicates)
                {
                    let leaf = self.leaf(block, node)?;
                    block.select.table_set = Some(TableSet::leaf(leaf));
                    return Ok(vec![]);
                }
                chain.into_iter().for_each(|s| block.fold(s));
                let mut filters = self.from_source(block, remainder)?;
                filters.extend(predicates);
                Ok(filters)
            }
            Node::Join(_) => {
                let (table_set, hoisted) = self.join_tree(block, node)?;
                block.select.table_set = Some(table_set);
                Ok(hoisted)
            }
            _ => {
                let leaf = self.leaf(block, node)?;
                block.select.table_set = Some(TableSet::leaf(leaf));
                Ok(vec![])
            }
        }
    }

    /// Register a table of the FROM clause, compiling it when it is not physical
    fn leaf(&mut self, block: &mut Block, node: NodeId) -> Result<NodeId> {
        let body = match self.graph.node(node) {
            Node::View(v) => v.table,
            _ => node,
        };
        match self.graph.node(body).clone() {
            Node::Table(t) if t.name.is_none() => Err(Error::relation(
                "a table without a name cannot be referenced in SQL",
            )),
            Node::Table(_) => Ok(node),
            other if !other.is_relation() => Err(Error::relation(format!(
                "{} is not a table",
                self.graph.display(body)
            ))),
            _ => {
                if block.select.derived(node).is_none() {
                    let query = self.query(body)?;
                    block.select.subqueries.push(Subquery {
                        node,
                        kind: SubqueryKind::Table,
                        query,
                        cte: None,
                    });
                }
                Ok(node)
            }
        }
    }

    /// Flatten a left-deep join, hoisting the filters of its operands when the join
    /// kind allows it
    fn join_tree(&mut self, block: &mut Block, node: NodeId) -> Result<(TableSet, Vec<NodeId>)> {
        let Node::Join(join) = self.graph.node(node).clone() else {
            return Err(Error::relation(format!("{} is not a join", node)));
        };
        block.fold(node);
        let (left, mut hoisted) = self.operand(block, join.left, join.kind.preserves_filters(true), true);
        let mut table_set = if matches!(self.graph.node(left), Node::Join(_)) {
            let (table_set, inner) = self.join_tree(block, left)?;
            hoisted = inner.into_iter().chain(hoisted).collect();
            table_set
        } else {
            TableSet::leaf(self.leaf(block, left)?)
        };
        let (right, filters) =
            self.operand(block, join.right, join.kind.preserves_filters(false), false);
        hoisted.extend(filters);
        let right = self.leaf(block, right)?;
        table_set.joins.push(JoinClause {
            kind: if join.predicates.is_empty() {
                JoinKind::Cross
            } else {
                join.kind
            },
            table: right,
            predicates: join.predicates,
        });
        Ok((table_set, hoisted))
    }

    fn operand(&mut self, block: &mut Block, node: NodeId, hoist: bool, left: bool) -> (NodeId, Vec<NodeId>) {
        if !hoist || !matches!(self.graph.node(node), Node::Selection(_)) {
            return (node, vec![]);
        }
        let (remainder, chain, predicates) = peel(self.graph, node);
        match self.graph.node(remainder).clone() {
            Node::Projection(_) if self.pushable(remainder, &chain, &predicates) => (node, vec![]),
            Node::Join(_) if !left => (node, vec![]),
            _ => {
                chain.into_iter().for_each(|s| block.fold(s));
                (remainder, predicates)
            }
        }
    }

    /// Lift everything to the leaves and extract subqueries
    fn finish(&mut self, mut block: Block) -> Result<Select> {
        self.rebuild_joins(&mut block)?;
        let (topks, predicates): (Vec<NodeId>, Vec<NodeId>) = block
            .select
            .predicates
            .iter()
            .copied()
            .partition(|p| matches!(self.graph.node(*p), Node::TopK(_)));
        block.select.predicates = predicates;
        for topk in topks {
            self.topk(&mut block, topk)?;
        }
        {
            let graph = &mut *self.graph;
            let select = &mut block.select;
            let scope = &block.scope;
            let mut lift = Lift::new(scope, Mode::Substitute);
            select.select_set = select
                .select_set
                .iter()
                .map(|item| {
                    if graph.is_relation(*item) {
                        scope.star(graph, *item)
                    } else {
                        lift.named(graph, *item)
                    }
                })
                .collect();
            select.predicates = select
                .predicates
                .iter()
                .map(|p| lift.value(graph, *p))
                .collect();
            select.having = select.having.iter().map(|p| lift.value(graph, *p)).collect();
            let mut lift = Lift::new(scope, Mode::Output);
            select.order_by = select
                .order_by
                .iter()
                .map(|key| SortKey {
                    expr: lift.value(graph, key.expr),
                    ascending: key.ascending,
                })
                .collect();
        }
        self.extract_subqueries(&mut block.select)?;
        if block.aggregate && !block.select.predicates.is_empty() {
            if let Some(table_set) = &block.select.table_set {
                if table_set.joins.is_empty() && block.select.derived(table_set.first).is_some() {
                    block.select.force_aliases = true;
                }
            }
        }
        Ok(block.select)
    }

    fn rebuild_joins(&mut self, block: &mut Block) -> Result<()> {
        let Some(mut table_set) = block.select.table_set.take() else {
            return Ok(());
        };
        let leaves = table_set.leaves();
        let mut node = table_set.first;
        {
            let mut lift = Lift::new(&block.scope, Mode::Substitute);
            for clause in table_set.joins.iter_mut() {
                clause.predicates = clause
                    .predicates
                    .iter()
                    .map(|p| lift.value(self.graph, *p))
                    .collect();
                for predicate in &clause.predicates {
                    if lift::tables(self.graph, *predicate)
                        .iter()
                        .any(|table| !leaves.contains(table))
                    {
                        return Err(Error::relation(format!(
                            "the join predicate {} refers to a table outside of the join",
                            self.graph.display(*predicate)
                        )));
                    }
                }
                node = self.graph.insert(Join {
                    kind: clause.kind,
                    left: node,
                    right: clause.table,
                    predicates: clause.predicates.clone(),
                });
            }
        }
        table_set.node = node;
        if !table_set.joins.is_empty() {
            block.scope.join = Some(node);
        }
        block.select.table_set = Some(table_set);
        Ok(())
    }

    /// Replace a top-k filter by a semi join with the ranked values
    fn topk(&mut self, block: &mut Block, id: NodeId) -> Result<()> {
        let Node::TopK(topk) = self.graph.node(id).clone() else {
            return Ok(());
        };
        let arg_name = match self.graph.node(topk.arg) {
            Node::Column(c) => c.name.clone(),
            _ => {
                return Err(Error::invalid_expression(
                    "top-k is only supported on columns",
                ))
            }
        };
        let by = match topk.by {
            Some(by) => by,
            None => self.graph.count(topk.arg),
        };
        let (arg_projected, by_projected) = {
            let mut lift = Lift::new(&block.scope, Mode::Projections);
            (lift.value(self.graph, topk.arg), lift.value(self.graph, by))
        };
        let (arg_lifted, by_lifted) = {
            let mut lift = Lift::new(&block.scope, Mode::Substitute);
            (lift.value(self.graph, topk.arg), lift.value(self.graph, by))
        };
        let arg_table = lift::tables(self.graph, arg_projected)
            .first()
            .copied()
            .ok_or_else(|| Error::invalid_expression("top-k over a value without table"))?;
        let by_table = lift::tables(self.graph, by_projected)
            .first()
            .copied()
            .unwrap_or(arg_table);
        let aggregation = if arg_table == by_table {
            let metric = self.graph.alias(by_projected, TOPK_METRIC);
            self.graph.aggregate(arg_table, vec![arg_projected], vec![metric])
        } else {
            let table = block
                .select
                .table_set
                .as_ref()
                .map(|table_set| table_set.node)
                .ok_or_else(|| Error::relation("top-k filter without a table"))?;
            let metric = self.graph.alias(by_lifted, TOPK_METRIC);
            self.graph.aggregate(table, vec![arg_lifted], vec![metric])
        };
        let metric = self.graph.column(aggregation, TOPK_METRIC)?;
        let sorted = self.graph.sort_by(aggregation, vec![SortKey::desc(metric)]);
        let rank = self.graph.limit(sorted, topk.k, 0);
        let key = self.graph.column(rank, &arg_name)?;
        let predicate = self.graph.eq(arg_lifted, key);
        let rank = self.leaf(block, rank)?;
        let table_set = block
            .select
            .table_set
            .as_mut()
            .ok_or_else(|| Error::relation("top-k filter without a table"))?;
        table_set.node = self.graph.insert(Join {
            kind: JoinKind::Semi,
            left: table_set.node,
            right: rank,
            predicates: vec![predicate],
        });
        table_set.joins.push(JoinClause {
            kind: JoinKind::Semi,
            table: rank,
            predicates: vec![predicate],
        });
        block.scope.join = Some(table_set.node);
        Ok(())
    }
}

/// Bind every block to an alias context and name the common table expressions
fn bind(graph: &Graph, query: &mut Query, groups: Vec<cte::Group>) -> Vec<Cte> {
    let mut root = Context::new();
    let mut names = vec![];
    if let Query::Select(select) = query {
        assign(&mut root, select);
        let leaves = select.leaves();
        for group in &groups {
            let occurrence = group
                .occurrences
                .iter()
                .copied()
                .find(|occurrence| leaves.contains(occurrence));
            names.push(root.register_cte(occurrence));
        }
    } else {
        for _ in &groups {
            names.push(root.register_cte(None));
        }
    }
    let root = Rc::new(root);
    match query {
        Query::Select(select) => {
            bind_children(graph, select, &root);
            select.context = Rc::clone(&root);
        }
        Query::Union { left, right, .. } => {
            bind_query(graph, left, &root);
            bind_query(graph, right, &root);
        }
    }
    groups
        .into_iter()
        .zip(names)
        .map(|(group, name)| {
            let mut query = group.query;
            bind_query(graph, &mut query, &root);
            Cte {
                name,
                node: group.body,
                query,
            }
        })
        .collect()
}

fn assign(context: &mut Context, select: &Select) {
    for leaf in select.leaves() {
        context.assign(leaf);
    }
    if select.force_aliases {
        context.set_always_alias();
    }
}

fn bind_query(graph: &Graph, query: &mut Query, parent: &Rc<Context>) {
    match query {
        Query::Select(select) => {
            let mut context = Context::child_context(parent);
            assign(&mut context, select);
            let context = Rc::new(context);
            bind_children(graph, select, &context);
            select.context = context;
        }
        Query::Union { left, right, .. } => {
            bind_query(graph, left, parent);
            bind_query(graph, right, parent);
        }
    }
}

fn bind_children(graph: &Graph, select: &mut Select, context: &Rc<Context>) {
    for subquery in select.subqueries.iter_mut() {
        bind_query(graph, &mut subquery.query, context);
    }
}
