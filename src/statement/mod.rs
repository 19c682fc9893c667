//! # Statement AST
//!
//! The analyzed form of a query: a tree of [`Select`] blocks and set operations, each
//! block bound to its [`Context`]. A [`Statement`] owns the graph the blocks point into,
//! the factored common table expressions and the handler mapping raw results back to
//! the requested shape.
//!

pub mod result;

use std::rc::Rc;

use crate::{
    context::Context,
    error::Result,
    expr::{Graph, JoinKind, NodeId, SortKey},
    format::{self, Options},
};

pub use result::{Handler, Output, ResultSet};

/// `LIMIT n [OFFSET offset]`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LimitClause {
    pub n: u64,
    pub offset: u64,
}

/// One step of a left-deep join chain
#[derive(Clone, Debug, PartialEq)]
pub struct JoinClause {
    /// The rendered kind, `Cross` when there is no predicate
    pub kind: JoinKind,
    pub table: NodeId,
    pub predicates: Vec<NodeId>,
}

/// The FROM clause of a block
#[derive(Clone, Debug, PartialEq)]
pub struct TableSet {
    /// The rebuilt join over the leaves, or the single leaf
    pub node: NodeId,
    pub first: NodeId,
    pub joins: Vec<JoinClause>,
}

impl TableSet {
    pub fn leaf(node: NodeId) -> Self {
        TableSet {
            node,
            first: node,
            joins: vec![],
        }
    }

    /// The aliased tables, in join order
    pub fn leaves(&self) -> Vec<NodeId> {
        std::iter::once(self.first)
            .chain(self.joins.iter().map(|join| join.table))
            .collect()
    }
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum SubqueryKind {
    /// A derived table in FROM
    Table,
    /// A single value compared in WHERE
    Scalar,
    Exists,
    In,
}

/// A nested query, keyed by the graph node it stands for
#[derive(Clone, Debug)]
pub struct Subquery {
    pub node: NodeId,
    pub kind: SubqueryKind,
    pub query: Query,
    /// Index of the common table expression this derived table was factored into
    pub cte: Option<usize>,
}

/// A single SELECT
#[derive(Clone, Debug)]
pub struct Select {
    /// The node this block was built from
    pub node: NodeId,
    /// Blocks whose columns render as bare output names
    pub outputs: Vec<NodeId>,
    pub select_set: Vec<NodeId>,
    pub table_set: Option<TableSet>,
    /// The WHERE clause
    pub predicates: Vec<NodeId>,
    /// Indices into `select_set`
    pub group_by: Vec<usize>,
    pub having: Vec<NodeId>,
    pub order_by: Vec<SortKey>,
    pub limit: Option<LimitClause>,
    pub distinct: bool,
    pub subqueries: Vec<Subquery>,
    /// Qualify columns even with a single table
    pub force_aliases: bool,
    pub context: Rc<Context>,
}

impl Select {
    pub fn new(node: NodeId) -> Self {
        Select {
            node,
            outputs: vec![],
            select_set: vec![],
            table_set: None,
            predicates: vec![],
            group_by: vec![],
            having: vec![],
            order_by: vec![],
            limit: None,
            distinct: false,
            subqueries: vec![],
            force_aliases: false,
            context: Rc::new(Context::new()),
        }
    }

    pub fn leaves(&self) -> Vec<NodeId> {
        self.table_set
            .as_ref()
            .map(TableSet::leaves)
            .unwrap_or_default()
    }

    pub fn subquery(&self, node: NodeId) -> Option<&Subquery> {
        self.subqueries.iter().find(|subquery| subquery.node == node)
    }

    /// The FROM subquery standing for `node`, when it is a derived leaf
    pub fn derived(&self, node: NodeId) -> Option<&Subquery> {
        self.subqueries
            .iter()
            .find(|subquery| subquery.node == node && subquery.kind == SubqueryKind::Table)
    }
}

/// A block or a set operation over blocks
#[derive(Clone, Debug)]
pub enum Query {
    Select(Box<Select>),
    Union {
        left: Box<Query>,
        right: Box<Query>,
        distinct: bool,
    },
}

impl Query {
    /// The first block, the one a CTAS or INSERT takes its columns from
    pub fn first_select(&self) -> &Select {
        match self {
            Query::Select(select) => select,
            Query::Union { left, .. } => left.first_select(),
        }
    }

    /// All blocks reachable from this query, nested ones included, depth first
    pub fn selects(&self) -> Vec<&Select> {
        let mut selects = vec![];
        self.collect_selects(&mut selects);
        selects
    }

    fn collect_selects<'a>(&'a self, selects: &mut Vec<&'a Select>) {
        match self {
            Query::Select(select) => {
                selects.push(select);
                for subquery in &select.subqueries {
                    subquery.query.collect_selects(selects);
                }
            }
            Query::Union { left, right, .. } => {
                left.collect_selects(selects);
                right.collect_selects(selects);
            }
        }
    }
}

/// A factored derived table, rendered in the WITH clause
#[derive(Clone, Debug)]
pub struct Cte {
    pub name: String,
    pub node: NodeId,
    pub query: Query,
}

/// A compiled query, ready to be rendered
#[derive(Clone, Debug)]
pub struct Statement {
    graph: Graph,
    query: Query,
    ctes: Vec<Cte>,
    handler: Handler,
}

impl Statement {
    pub fn new(graph: Graph, query: Query, ctes: Vec<Cte>, handler: Handler) -> Self {
        Statement {
            graph,
            query,
            ctes,
            handler,
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn ctes(&self) -> &[Cte] {
        &self.ctes
    }

    /// The top block
    pub fn select(&self) -> &Select {
        self.query.first_select()
    }

    /// The alias scope of the top block
    pub fn context(&self) -> &Context {
        &self.select().context
    }

    pub fn result_handler(&self) -> &Handler {
        &self.handler
    }

    /// Render with the default options
    pub fn compile(&self) -> Result<String> {
        self.compile_with(&Options::default())
    }

    pub fn compile_with(&self, options: &Options) -> Result<String> {
        format::Formatter::new(&self.graph, options).statement(self)
    }
}
