//! # Expression graph
//!
//! Relational and scalar operators live side by side in a [`Graph`] arena and refer to
//! each other through [`NodeId`] handles. The graph only grows: rewrites push new nodes
//! and leave existing ones untouched, so subtrees can be shared freely.
//!
//! Identity is the handle. Structural equality is provided by [`Graph::equals`], under
//! which a [`View`] is only ever equal to itself.
//!

pub mod builder;
pub mod display;
pub mod equality;
pub mod schema;

use std::{error, fmt, ops::Index, result};

use itertools::Itertools;

use crate::{
    data_type::{self, DataType, Value},
    visitor::{Acceptor, Dependencies, Visited, Visitor},
};

pub use builder::{AggregationBuilder, JoinBuilder, TableBuilder};
pub use schema::{Field, Schema};

// Error management

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    InvalidName(String),
    InvalidExpression(String),
    /// A name both sides of a join provide
    AmbiguousReference(String),
    Other(String),
}

impl Error {
    pub fn invalid_name(name: impl fmt::Display) -> Error {
        Error::InvalidName(format!("{} is invalid", name))
    }
    pub fn invalid_expression(expr: impl fmt::Display) -> Error {
        Error::InvalidExpression(format!("{} is invalid", expr))
    }
    pub fn ambiguous_reference(name: impl fmt::Display, table: impl fmt::Display) -> Error {
        Error::AmbiguousReference(format!("{} is provided by both sides of {}", name, table))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidName(desc) => writeln!(f, "InvalidName: {}", desc),
            Error::InvalidExpression(desc) => writeln!(f, "InvalidExpression: {}", desc),
            Error::AmbiguousReference(desc) => writeln!(f, "AmbiguousReference: {}", desc),
            Error::Other(err) => writeln!(f, "{}", err),
        }
    }
}

impl error::Error for Error {}

impl From<data_type::Error> for Error {
    fn from(err: data_type::Error) -> Self {
        Error::Other(err.to_string())
    }
}

pub type Result<T> = result::Result<T, Error>;

/// A handle on a node of a [`Graph`]
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/*
Relational operators
 */

/// A physical table, or a literal table when it has no name
#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    pub name: Option<String>,
    pub database: Option<String>,
    pub schema: Schema,
}

/// A second, logically distinct, use of a table
#[derive(Clone, Debug, PartialEq)]
pub struct View {
    pub table: NodeId,
}

/// A list of named values, or whole tables standing for `*`
#[derive(Clone, Debug, PartialEq)]
pub struct Projection {
    pub table: NodeId,
    pub selections: Vec<NodeId>,
}

/// Predicates are AND-ed
#[derive(Clone, Debug, PartialEq)]
pub struct Selection {
    pub table: NodeId,
    pub predicates: Vec<NodeId>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Aggregation {
    pub table: NodeId,
    pub by: Vec<NodeId>,
    pub metrics: Vec<NodeId>,
    pub having: Vec<NodeId>,
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Outer,
    Semi,
    Anti,
    Cross,
}

impl JoinKind {
    /// Whether filtering this operand before or after the join yields the same rows
    pub fn preserves_filters(&self, left: bool) -> bool {
        match self {
            JoinKind::Inner | JoinKind::Cross => true,
            JoinKind::Left | JoinKind::Semi | JoinKind::Anti => left,
            JoinKind::Right => !left,
            JoinKind::Outer => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub left: NodeId,
    pub right: NodeId,
    pub predicates: Vec<NodeId>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SortKey {
    pub expr: NodeId,
    pub ascending: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Sort {
    pub table: NodeId,
    pub keys: Vec<SortKey>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Limit {
    pub table: NodeId,
    pub n: u64,
    pub offset: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Distinct {
    pub table: NodeId,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Union {
    pub left: NodeId,
    pub right: NodeId,
    pub distinct: bool,
}

/*
Value expressions
 */

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum TimeUnit {
    Year,
    Month,
    Week,
    Day,
    Hour,
    Minute,
    Second,
    Millisecond,
}

impl TimeUnit {
    pub fn name(&self) -> &'static str {
        match self {
            TimeUnit::Year => "year",
            TimeUnit::Month => "month",
            TimeUnit::Week => "week",
            TimeUnit::Day => "day",
            TimeUnit::Hour => "hour",
            TimeUnit::Minute => "minute",
            TimeUnit::Second => "second",
            TimeUnit::Millisecond => "millisecond",
        }
    }
}

/// A duration literal, only meaningful as the right operand of `+` or `-`
#[derive(Clone, Debug, PartialEq)]
pub struct Interval {
    pub unit: TimeUnit,
    pub value: i64,
}

/// A field of a table, resolved against that table
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub table: NodeId,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Alias {
    pub arg: NodeId,
    pub name: String,
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
    IsNull,
    NotNull,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Unary {
    pub op: UnaryOp,
    pub arg: NodeId,
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl BinaryOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::Lt
                | BinaryOp::LtEq
                | BinaryOp::Gt
                | BinaryOp::GtEq
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Binary {
    pub op: BinaryOp,
    pub left: NodeId,
    pub right: NodeId,
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum Function {
    Ln,
    Log10,
    Exp,
    Sqrt,
    Abs,
    Ceil,
    Floor,
    Lower,
    Upper,
    Length,
    Coalesce,
    Now,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Call {
    pub function: Function,
    pub arguments: Vec<NodeId>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Cast {
    pub arg: NodeId,
    pub to: DataType,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Extract {
    pub arg: NodeId,
    pub unit: TimeUnit,
}

/// `CASE [base] WHEN .. THEN .. [ELSE ..] END`
#[derive(Clone, Debug, PartialEq)]
pub struct Case {
    pub base: Option<NodeId>,
    pub whens: Vec<(NodeId, NodeId)>,
    pub default: Option<NodeId>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Between {
    pub arg: NodeId,
    pub low: NodeId,
    pub high: NodeId,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Options {
    List(Vec<NodeId>),
    /// The values of a column of another table
    Column(NodeId),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Contains {
    pub arg: NodeId,
    pub options: Options,
    pub negated: bool,
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum Aggregate {
    Sum,
    Mean,
    Min,
    Max,
    Count,
    CountDistinct,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Reduction {
    pub aggregate: Aggregate,
    pub arg: NodeId,
}

/// `count(*)` over a table
#[derive(Clone, Debug, PartialEq)]
pub struct CountStar {
    pub table: NodeId,
}

/// Membership in the `k` top values of `arg` ranked by `by` (`count(arg)` by default)
#[derive(Clone, Debug, PartialEq)]
pub struct TopK {
    pub arg: NodeId,
    pub k: u64,
    pub by: Option<NodeId>,
}

/// True when the predicate holds for at least one row
#[derive(Clone, Debug, PartialEq)]
pub struct Any {
    pub predicate: NodeId,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExprList {
    pub exprs: Vec<NodeId>,
}

/// A node of the expression graph
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Table(Table),
    View(View),
    Projection(Projection),
    Selection(Selection),
    Aggregation(Aggregation),
    Join(Join),
    Sort(Sort),
    Limit(Limit),
    Distinct(Distinct),
    Union(Union),
    Literal(Value),
    Interval(Interval),
    Column(Column),
    Alias(Alias),
    Unary(Unary),
    Binary(Binary),
    Call(Call),
    Cast(Cast),
    Extract(Extract),
    Case(Case),
    Between(Between),
    Contains(Contains),
    Reduction(Reduction),
    CountStar(CountStar),
    TopK(TopK),
    Any(Any),
    ExprList(ExprList),
}

impl Node {
    /// Whether the node denotes a table
    pub fn is_relation(&self) -> bool {
        matches!(
            self,
            Node::Table(_)
                | Node::View(_)
                | Node::Projection(_)
                | Node::Selection(_)
                | Node::Aggregation(_)
                | Node::Join(_)
                | Node::Sort(_)
                | Node::Limit(_)
                | Node::Distinct(_)
                | Node::Union(_)
        )
    }

    /// Whether the node aggregates rows into one value
    pub fn is_reduction(&self) -> bool {
        matches!(self, Node::Reduction(_) | Node::CountStar(_))
    }

    /// The nodes this node refers to, in a fixed order
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            Node::Table(_) | Node::Literal(_) | Node::Interval(_) => vec![],
            Node::View(v) => vec![v.table],
            Node::Projection(p) => std::iter::once(p.table)
                .chain(p.selections.iter().copied())
                .collect(),
            Node::Selection(s) => std::iter::once(s.table)
                .chain(s.predicates.iter().copied())
                .collect(),
            Node::Aggregation(a) => std::iter::once(a.table)
                .chain(a.by.iter().copied())
                .chain(a.metrics.iter().copied())
                .chain(a.having.iter().copied())
                .collect(),
            Node::Join(j) => [j.left, j.right]
                .into_iter()
                .chain(j.predicates.iter().copied())
                .collect(),
            Node::Sort(s) => std::iter::once(s.table)
                .chain(s.keys.iter().map(|k| k.expr))
                .collect(),
            Node::Limit(l) => vec![l.table],
            Node::Distinct(d) => vec![d.table],
            Node::Union(u) => vec![u.left, u.right],
            Node::Column(c) => vec![c.table],
            Node::Alias(a) => vec![a.arg],
            Node::Unary(u) => vec![u.arg],
            Node::Binary(b) => vec![b.left, b.right],
            Node::Call(c) => c.arguments.clone(),
            Node::Cast(c) => vec![c.arg],
            Node::Extract(e) => vec![e.arg],
            Node::Case(c) => c
                .base
                .iter()
                .copied()
                .chain(c.whens.iter().flat_map(|(w, t)| [*w, *t]))
                .chain(c.default.iter().copied())
                .collect(),
            Node::Between(b) => vec![b.arg, b.low, b.high],
            Node::Contains(c) => match &c.options {
                Options::List(values) => std::iter::once(c.arg)
                    .chain(values.iter().copied())
                    .collect(),
                Options::Column(column) => vec![c.arg, *column],
            },
            Node::Reduction(r) => vec![r.arg],
            Node::CountStar(c) => vec![c.table],
            Node::TopK(t) => std::iter::once(t.arg).chain(t.by).collect(),
            Node::Any(a) => vec![a.predicate],
            Node::ExprList(l) => l.exprs.clone(),
        }
    }

    /// A copy of the node where each child handle went through `f`, in [`Node::children`] order
    pub fn map_children<F: FnMut(NodeId) -> NodeId>(&self, mut f: F) -> Node {
        let mut all = |ids: &[NodeId], f: &mut F| ids.iter().map(|id| f(*id)).collect::<Vec<_>>();
        match self {
            Node::Table(_) | Node::Literal(_) | Node::Interval(_) => self.clone(),
            Node::View(v) => Node::View(View { table: f(v.table) }),
            Node::Projection(p) => Node::Projection(Projection {
                table: f(p.table),
                selections: all(&p.selections, &mut f),
            }),
            Node::Selection(s) => Node::Selection(Selection {
                table: f(s.table),
                predicates: all(&s.predicates, &mut f),
            }),
            Node::Aggregation(a) => Node::Aggregation(Aggregation {
                table: f(a.table),
                by: all(&a.by, &mut f),
                metrics: all(&a.metrics, &mut f),
                having: all(&a.having, &mut f),
            }),
            Node::Join(j) => Node::Join(Join {
                kind: j.kind,
                left: f(j.left),
                right: f(j.right),
                predicates: all(&j.predicates, &mut f),
            }),
            Node::Sort(s) => Node::Sort(Sort {
                table: f(s.table),
                keys: s
                    .keys
                    .iter()
                    .map(|k| SortKey {
                        expr: f(k.expr),
                        ascending: k.ascending,
                    })
                    .collect(),
            }),
            Node::Limit(l) => Node::Limit(Limit {
                table: f(l.table),
                n: l.n,
                offset: l.offset,
            }),
            Node::Distinct(d) => Node::Distinct(Distinct { table: f(d.table) }),
            Node::Union(u) => Node::Union(Union {
                left: f(u.left),
                right: f(u.right),
                distinct: u.distinct,
            }),
            Node::Column(c) => Node::Column(Column {
                table: f(c.table),
                name: c.name.clone(),
            }),
            Node::Alias(a) => Node::Alias(Alias {
                arg: f(a.arg),
                name: a.name.clone(),
            }),
            Node::Unary(u) => Node::Unary(Unary { op: u.op, arg: f(u.arg) }),
            Node::Binary(b) => Node::Binary(Binary {
                op: b.op,
                left: f(b.left),
                right: f(b.right),
            }),
            Node::Call(c) => Node::Call(Call {
                function: c.function,
                arguments: all(&c.arguments, &mut f),
            }),
            Node::Cast(c) => Node::Cast(Cast { arg: f(c.arg), to: c.to }),
            Node::Extract(e) => Node::Extract(Extract { arg: f(e.arg), unit: e.unit }),
            Node::Case(c) => Node::Case(Case {
                base: c.base.map(&mut f),
                whens: c.whens.iter().map(|(w, t)| (f(*w), f(*t))).collect(),
                default: c.default.map(&mut f),
            }),
            Node::Between(b) => Node::Between(Between {
                arg: f(b.arg),
                low: f(b.low),
                high: f(b.high),
            }),
            Node::Contains(c) => Node::Contains(Contains {
                arg: f(c.arg),
                options: match &c.options {
                    Options::List(values) => Options::List(all(values, &mut f)),
                    Options::Column(column) => Options::Column(f(*column)),
                },
                negated: c.negated,
            }),
            Node::Reduction(r) => Node::Reduction(Reduction {
                aggregate: r.aggregate,
                arg: f(r.arg),
            }),
            Node::CountStar(c) => Node::CountStar(CountStar { table: f(c.table) }),
            Node::TopK(t) => Node::TopK(TopK {
                arg: f(t.arg),
                k: t.k,
                by: t.by.map(&mut f),
            }),
            Node::Any(a) => Node::Any(Any { predicate: f(a.predicate) }),
            Node::ExprList(l) => Node::ExprList(ExprList { exprs: all(&l.exprs, &mut f) }),
        }
    }
}

/// The arena holding every node of an expression graph
#[derive(Clone, Debug, Default)]
pub struct Graph {
    nodes: Vec<Node>,
}

impl Graph {
    pub fn new() -> Self {
        Graph::default()
    }

    /// Add a node and return its handle
    pub fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn is_relation(&self, id: NodeId) -> bool {
        self.node(id).is_relation()
    }

    /// A handle usable with the [`crate::visitor`] machinery
    pub fn handle(&self, id: NodeId) -> Handle<'_> {
        Handle { graph: self, id }
    }

    /// The explicit output name of a value: its alias or its column name
    pub fn name(&self, id: NodeId) -> Option<&str> {
        match self.node(id) {
            Node::Alias(a) => Some(&a.name),
            Node::Column(c) => Some(&c.name),
            _ => None,
        }
    }

    /// Strip any alias
    pub fn unaliased(&self, id: NodeId) -> NodeId {
        match self.node(id) {
            Node::Alias(a) => self.unaliased(a.arg),
            _ => id,
        }
    }

    /// The schema of a relational node
    pub fn schema(&self, id: NodeId) -> Result<Schema> {
        Ok(match self.node(id) {
            Node::Table(t) => t.schema.clone(),
            Node::View(View { table })
            | Node::Selection(Selection { table, .. })
            | Node::Sort(Sort { table, .. })
            | Node::Limit(Limit { table, .. })
            | Node::Distinct(Distinct { table }) => self.schema(*table)?,
            Node::Union(u) => self.schema(u.left)?,
            Node::Projection(p) => {
                let mut fields = vec![];
                for selection in &p.selections {
                    if self.is_relation(*selection) {
                        fields.extend(self.schema(*selection)?);
                    } else {
                        fields.push(self.output_field(*selection)?);
                    }
                }
                Schema::new(fields)
            }
            Node::Aggregation(a) => a
                .by
                .iter()
                .chain(&a.metrics)
                .map(|value| self.output_field(*value))
                .collect::<Result<Schema>>()?,
            Node::Join(j) => {
                let left = self.schema(j.left)?;
                match j.kind {
                    JoinKind::Semi | JoinKind::Anti => left,
                    _ => left.merge(self.schema(j.right)?),
                }
            }
            _ => return Err(Error::invalid_expression(format!("{} is not a table", id))),
        })
    }

    fn output_field(&self, value: NodeId) -> Result<Field> {
        let name = self.name(value).unwrap_or(schema::DEFAULT_NAME);
        Ok(Field::new(name, self.data_type(value)?))
    }

    /// Whether the relation exposes a field with this name
    pub fn has_field(&self, table: NodeId, name: &str) -> bool {
        self.schema(table)
            .map(|schema| schema.field(name).is_ok())
            .unwrap_or(false)
    }

    /// Whether `name` resolves to fields of both sides of a join under `table`
    pub fn is_ambiguous(&self, table: NodeId, name: &str) -> bool {
        match self.node(table) {
            Node::Selection(s) => self.is_ambiguous(s.table, name),
            Node::Sort(s) => self.is_ambiguous(s.table, name),
            Node::Limit(l) => self.is_ambiguous(l.table, name),
            Node::Distinct(d) => self.is_ambiguous(d.table, name),
            Node::Projection(p) => p
                .selections
                .iter()
                .find(|item| {
                    (self.is_relation(**item) && self.has_field(**item, name))
                        || self.name(**item) == Some(name)
                })
                .map_or(false, |item| self.is_relation(*item) && self.is_ambiguous(*item, name)),
            Node::Join(j) if matches!(j.kind, JoinKind::Semi | JoinKind::Anti) => {
                self.is_ambiguous(j.left, name)
            }
            Node::Join(j) => match (self.has_field(j.left, name), self.has_field(j.right, name)) {
                (true, true) => true,
                (true, false) => self.is_ambiguous(j.left, name),
                (false, true) => self.is_ambiguous(j.right, name),
                (false, false) => false,
            },
            _ => false,
        }
    }

    /// The type of a value expression
    pub fn data_type(&self, id: NodeId) -> Result<DataType> {
        Ok(match self.node(id) {
            Node::Literal(value) => value.data_type(),
            Node::Interval(_) => DataType::Int64,
            Node::Column(c) => self
                .schema(c.table)?
                .field(&c.name)
                .map_err(|_| Error::invalid_name(&c.name))?
                .data_type(),
            Node::Alias(a) => self.data_type(a.arg)?,
            Node::Unary(u) => match u.op {
                UnaryOp::Negate => self.data_type(u.arg)?,
                _ => DataType::Boolean,
            },
            Node::Binary(b) => {
                if b.op.is_comparison() || b.op.is_logical() {
                    DataType::Boolean
                } else if matches!(self.node(b.right), Node::Interval(_)) {
                    self.data_type(b.left)?
                } else if b.op == BinaryOp::Div || b.op == BinaryOp::Pow {
                    DataType::Double
                } else {
                    self.data_type(b.left)?.promote(&self.data_type(b.right)?)
                }
            }
            Node::Call(c) => match c.function {
                Function::Now => DataType::Timestamp,
                Function::Lower | Function::Upper => DataType::String,
                Function::Length => DataType::Int32,
                Function::Abs | Function::Coalesce => match c.arguments.first() {
                    Some(arg) => self.data_type(*arg)?,
                    None => DataType::Null,
                },
                Function::Ceil | Function::Floor => DataType::Int64,
                Function::Ln | Function::Log10 | Function::Exp | Function::Sqrt => {
                    DataType::Double
                }
            },
            Node::Cast(c) => c.to,
            Node::Extract(_) => DataType::Int32,
            Node::Case(c) => c
                .whens
                .iter()
                .map(|(_, then)| *then)
                .chain(c.default)
                .map(|result| self.data_type(result))
                .collect::<Result<Vec<_>>>()?
                .into_iter()
                .find(|t| *t != DataType::Null)
                .unwrap_or(DataType::Null),
            Node::Between(_) | Node::Contains(_) | Node::TopK(_) | Node::Any(_) => {
                DataType::Boolean
            }
            Node::Reduction(r) => match r.aggregate {
                Aggregate::Count | Aggregate::CountDistinct => DataType::Int64,
                Aggregate::Mean => DataType::Double,
                Aggregate::Sum => {
                    let arg = self.data_type(r.arg)?;
                    if arg.is_integer() || arg == DataType::Boolean {
                        DataType::Int64
                    } else {
                        arg
                    }
                }
                Aggregate::Min | Aggregate::Max => self.data_type(r.arg)?,
            },
            Node::CountStar(_) => DataType::Int64,
            _ => return Err(Error::invalid_expression(format!("{} is not a value", id))),
        })
    }

    /// All the nodes reachable from `id`, dependencies first
    pub fn reachable(&self, id: NodeId) -> Vec<NodeId> {
        self.handle(id).iter().map(|handle| handle.id()).collect()
    }

    /// Whether some reduction is reachable from this value without crossing a table
    pub fn has_reduction(&self, id: NodeId) -> bool {
        self.handle(id).accept(HasReduction)
    }

    /// Whether this value reads a column outside of any reduction
    pub fn reads_outside_reductions(&self, id: NodeId) -> bool {
        self.handle(id).accept(ReadsOutsideReductions)
    }

    /// The columns a value reads, without looking into tables, first read first
    pub fn columns(&self, id: NodeId) -> Vec<NodeId> {
        self.handle(id).accept(Columns)
    }

    /// The first table a value reads from, through a column or a `count(*)`
    pub fn base_table(&self, id: NodeId) -> Option<NodeId> {
        self.handle(id).accept(BaseTable)
    }
}

impl Index<NodeId> for Graph {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Self::Output {
        self.node(id)
    }
}

/// A node seen through its graph, for visitors
#[derive(Clone, Copy, Debug)]
pub struct Handle<'a> {
    graph: &'a Graph,
    id: NodeId,
}

impl<'a> Handle<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn node(&self) -> &'a Node {
        self.graph.node(self.id)
    }

    pub fn graph(&self) -> &'a Graph {
        self.graph
    }
}

impl<'a> PartialEq for Handle<'a> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && std::ptr::eq(self.graph, other.graph)
    }
}

impl<'a> Eq for Handle<'a> {}

impl<'a> std::hash::Hash for Handle<'a> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}

impl<'a> Acceptor for Handle<'a> {
    fn dependencies(&self) -> Dependencies<Self> {
        self.node()
            .children()
            .into_iter()
            .map(|id| self.graph.handle(id))
            .collect()
    }
}

impl<'a> Handle<'a> {
    /// The dependencies of a value, stopping at the tables it reads
    pub fn value_dependencies(&self) -> Dependencies<Self> {
        match self.node() {
            Node::Column(_) | Node::CountStar(_) => Dependencies::empty(),
            node if node.is_relation() => Dependencies::empty(),
            _ => self.dependencies(),
        }
    }
}

struct HasReduction;

impl<'a> Visitor<Handle<'a>, bool> for HasReduction {
    fn visit(&self, acceptor: Handle<'a>, dependencies: Visited<Handle<'a>, bool>) -> bool {
        acceptor.node().is_reduction() || dependencies.iter().any(|(_, reduces)| *reduces)
    }

    fn dependencies(&self, acceptor: Handle<'a>) -> Dependencies<Handle<'a>> {
        acceptor.value_dependencies()
    }
}

/// Columns under a reduction do not count
struct ReadsOutsideReductions;

impl<'a> Visitor<Handle<'a>, bool> for ReadsOutsideReductions {
    fn visit(&self, acceptor: Handle<'a>, dependencies: Visited<Handle<'a>, bool>) -> bool {
        matches!(acceptor.node(), Node::Column(_)) || dependencies.iter().any(|(_, reads)| *reads)
    }

    fn dependencies(&self, acceptor: Handle<'a>) -> Dependencies<Handle<'a>> {
        if acceptor.node().is_reduction() {
            Dependencies::empty()
        } else {
            acceptor.value_dependencies()
        }
    }
}

struct Columns;

impl<'a> Visitor<Handle<'a>, Vec<NodeId>> for Columns {
    fn visit(&self, acceptor: Handle<'a>, dependencies: Visited<Handle<'a>, Vec<NodeId>>) -> Vec<NodeId> {
        match acceptor.node() {
            Node::Column(_) => vec![acceptor.id()],
            _ => dependencies
                .into_iter()
                .flat_map(|(_, columns)| columns)
                .unique()
                .collect(),
        }
    }

    fn dependencies(&self, acceptor: Handle<'a>) -> Dependencies<Handle<'a>> {
        acceptor.value_dependencies()
    }
}

struct BaseTable;

impl<'a> Visitor<Handle<'a>, Option<NodeId>> for BaseTable {
    fn visit(&self, acceptor: Handle<'a>, dependencies: Visited<Handle<'a>, Option<NodeId>>) -> Option<NodeId> {
        match acceptor.node() {
            Node::Column(c) => Some(c.table),
            Node::CountStar(c) => Some(c.table),
            _ => dependencies.iter().find_map(|(_, table)| *table),
        }
    }

    fn dependencies(&self, acceptor: Handle<'a>) -> Dependencies<Handle<'a>> {
        acceptor.value_dependencies()
    }
}
