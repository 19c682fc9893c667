//! Constructors for the nodes of a [`Graph`]
//!
//! Scalar operators get one method per operator, relational operators with many
//! parts (tables, joins, aggregations) get a typestate builder.

use paste::paste;

use super::{
    Aggregate, Aggregation, Alias, Any, Between, Binary, BinaryOp, Call, Case, Cast, Column,
    Contains, CountStar, Distinct, Error, Extract, ExprList, Function, Graph, Interval, Join,
    JoinKind, Limit, Node, NodeId, Options, Projection, Reduction, Result, Schema, Selection,
    Sort, SortKey, Table, TimeUnit, TopK, Unary, UnaryOp, Union, View,
};
use crate::{
    builder::{Ready, With},
    data_type::{DataType, Value},
};

macro_rules! node_conversions {
    ($($Variant:ident),*) => {
        $(
            impl From<$Variant> for Node {
                fn from(node: $Variant) -> Self {
                    Node::$Variant(node)
                }
            }
        )*
    };
}

node_conversions!(
    Table, View, Projection, Selection, Aggregation, Join, Sort, Limit, Distinct, Union,
    Interval, Column, Alias, Unary, Binary, Call, Cast, Extract, Case, Between, Contains,
    Reduction, CountStar, TopK, Any, ExprList
);

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        Node::Literal(value)
    }
}

macro_rules! binary_constructors {
    ($($Op:ident),*) => {
        paste! {
            impl Graph {
                $(
                    pub fn [< $Op:snake >](&mut self, left: NodeId, right: NodeId) -> NodeId {
                        self.binary(BinaryOp::$Op, left, right)
                    }
                )*
            }
        }
    };
}

binary_constructors!(Add, Sub, Mul, Div, Pow, Eq, NotEq, Lt, LtEq, Gt, GtEq, And, Or);

macro_rules! unary_constructors {
    ($($Op:ident),*) => {
        paste! {
            impl Graph {
                $(
                    pub fn [< $Op:snake >](&mut self, arg: NodeId) -> NodeId {
                        self.insert(Unary { op: UnaryOp::$Op, arg })
                    }
                )*
            }
        }
    };
}

unary_constructors!(Not, Negate, IsNull, NotNull);

macro_rules! reduction_constructors {
    ($($Aggregate:ident),*) => {
        paste! {
            impl Graph {
                $(
                    pub fn [< $Aggregate:snake >](&mut self, arg: NodeId) -> NodeId {
                        self.insert(Reduction { aggregate: Aggregate::$Aggregate, arg })
                    }
                )*
            }
        }
    };
}

reduction_constructors!(Sum, Mean, Min, Max, Count, CountDistinct);

macro_rules! function_constructors {
    ([$($Unary:ident),*], [$($Nullary:ident),*]) => {
        paste! {
            impl Graph {
                $(
                    pub fn [< $Unary:snake >](&mut self, arg: NodeId) -> NodeId {
                        self.call(Function::$Unary, vec![arg])
                    }
                )*
                $(
                    pub fn [< $Nullary:snake >](&mut self) -> NodeId {
                        self.call(Function::$Nullary, vec![])
                    }
                )*
            }
        }
    };
}

function_constructors!(
    [Ln, Log10, Exp, Sqrt, Abs, Ceil, Floor, Lower, Upper, Length],
    [Now]
);

macro_rules! join_constructors {
    ($($Kind:ident),*) => {
        paste! {
            impl Graph {
                $(
                    pub fn [< $Kind:snake _join >](
                        &mut self,
                        left: NodeId,
                        right: NodeId,
                        predicates: Vec<NodeId>,
                    ) -> NodeId {
                        self.insert(Join { kind: JoinKind::$Kind, left, right, predicates })
                    }
                )*
            }
        }
    };
}

join_constructors!(Inner, Left, Right, Outer, Semi, Anti);

impl Graph {
    pub fn insert<N: Into<Node>>(&mut self, node: N) -> NodeId {
        self.push(node.into())
    }

    /*
    Values
     */

    pub fn literal<V: Into<Value>>(&mut self, value: V) -> NodeId {
        self.insert(value.into())
    }

    pub fn null(&mut self) -> NodeId {
        self.insert(Value::Null)
    }

    pub fn interval(&mut self, unit: TimeUnit, value: i64) -> NodeId {
        self.insert(Interval { unit, value })
    }

    /// A column of `table`, the name must be a field of the table provided by one side
    /// only of the joins below it
    pub fn column(&mut self, table: NodeId, name: &str) -> Result<NodeId> {
        if !self.is_relation(table) {
            return Err(Error::invalid_expression(format!("{} is not a table", table)));
        }
        self.schema(table)?.field(name)?;
        if self.is_ambiguous(table, name) {
            return Err(Error::ambiguous_reference(name, table));
        }
        Ok(self.insert(Column {
            table,
            name: name.to_string(),
        }))
    }

    pub fn alias<S: Into<String>>(&mut self, arg: NodeId, name: S) -> NodeId {
        self.insert(Alias {
            arg,
            name: name.into(),
        })
    }

    pub fn binary(&mut self, op: BinaryOp, left: NodeId, right: NodeId) -> NodeId {
        self.insert(Binary { op, left, right })
    }

    /// `%`, not generated because `mod` is a keyword
    pub fn modulo(&mut self, left: NodeId, right: NodeId) -> NodeId {
        self.binary(BinaryOp::Mod, left, right)
    }

    pub fn call(&mut self, function: Function, arguments: Vec<NodeId>) -> NodeId {
        self.insert(Call {
            function,
            arguments,
        })
    }

    pub fn coalesce(&mut self, arguments: Vec<NodeId>) -> NodeId {
        self.call(Function::Coalesce, arguments)
    }

    pub fn cast(&mut self, arg: NodeId, to: DataType) -> NodeId {
        self.insert(Cast { arg, to })
    }

    pub fn extract(&mut self, arg: NodeId, unit: TimeUnit) -> NodeId {
        self.insert(Extract { arg, unit })
    }

    /// A searched (`base` is `None`) or simple case, the default is `NULL` when absent
    pub fn case(
        &mut self,
        base: Option<NodeId>,
        whens: Vec<(NodeId, NodeId)>,
        default: Option<NodeId>,
    ) -> Result<NodeId> {
        if whens.is_empty() {
            return Err(Error::invalid_expression("CASE without WHEN"));
        }
        let default = match default {
            Some(default) => default,
            None => self.null(),
        };
        Ok(self.insert(Case {
            base,
            whens,
            default: Some(default),
        }))
    }

    /// `condition ? then : otherwise`
    pub fn if_else(&mut self, condition: NodeId, then: NodeId, otherwise: NodeId) -> NodeId {
        self.insert(Case {
            base: None,
            whens: vec![(condition, then)],
            default: Some(otherwise),
        })
    }

    pub fn between(&mut self, arg: NodeId, low: NodeId, high: NodeId) -> NodeId {
        self.insert(Between { arg, low, high })
    }

    pub fn isin(&mut self, arg: NodeId, values: Vec<NodeId>) -> NodeId {
        self.insert(Contains {
            arg,
            options: Options::List(values),
            negated: false,
        })
    }

    pub fn notin(&mut self, arg: NodeId, values: Vec<NodeId>) -> NodeId {
        self.insert(Contains {
            arg,
            options: Options::List(values),
            negated: true,
        })
    }

    /// Membership in the values of a column of another table
    pub fn isin_column(&mut self, arg: NodeId, column: NodeId) -> Result<NodeId> {
        if !matches!(self.node(column), Node::Column(_)) {
            return Err(Error::invalid_expression(format!("{} is not a column", column)));
        }
        Ok(self.insert(Contains {
            arg,
            options: Options::Column(column),
            negated: false,
        }))
    }

    pub fn count_star(&mut self, table: NodeId) -> NodeId {
        self.insert(CountStar { table })
    }

    pub fn topk(&mut self, arg: NodeId, k: u64, by: Option<NodeId>) -> NodeId {
        self.insert(TopK { arg, k, by })
    }

    /// `EXISTS` over the rows satisfying `predicate`
    pub fn any(&mut self, predicate: NodeId) -> NodeId {
        self.insert(Any { predicate })
    }

    pub fn expr_list(&mut self, exprs: Vec<NodeId>) -> NodeId {
        self.insert(ExprList { exprs })
    }

    /*
    Tables
     */

    pub fn table<S: Into<String>>(&mut self, name: S, schema: Schema) -> NodeId {
        TableBuilder::new().name(name).schema(schema).build_in(self)
    }

    pub fn view(&mut self, table: NodeId) -> NodeId {
        self.insert(View { table })
    }

    /// Select values, a table in `selections` stands for all its columns
    pub fn projection(&mut self, table: NodeId, selections: Vec<NodeId>) -> NodeId {
        self.insert(Projection { table, selections })
    }

    pub fn filter(&mut self, table: NodeId, predicates: Vec<NodeId>) -> NodeId {
        self.insert(Selection { table, predicates })
    }

    pub fn aggregate(&mut self, table: NodeId, by: Vec<NodeId>, metrics: Vec<NodeId>) -> NodeId {
        self.insert(Aggregation {
            table,
            by,
            metrics,
            having: vec![],
        })
    }

    pub fn cross_join(&mut self, left: NodeId, right: NodeId) -> NodeId {
        self.insert(Join {
            kind: JoinKind::Cross,
            left,
            right,
            predicates: vec![],
        })
    }

    pub fn sort_by(&mut self, table: NodeId, keys: Vec<SortKey>) -> NodeId {
        self.insert(Sort { table, keys })
    }

    pub fn limit(&mut self, table: NodeId, n: u64, offset: u64) -> NodeId {
        self.insert(Limit { table, n, offset })
    }

    pub fn distinct(&mut self, table: NodeId) -> NodeId {
        self.insert(Distinct { table })
    }

    pub fn union(&mut self, left: NodeId, right: NodeId, distinct: bool) -> NodeId {
        self.insert(Union {
            left,
            right,
            distinct,
        })
    }
}

impl SortKey {
    pub fn asc(expr: NodeId) -> SortKey {
        SortKey {
            expr,
            ascending: true,
        }
    }

    pub fn desc(expr: NodeId) -> SortKey {
        SortKey {
            expr,
            ascending: false,
        }
    }
}

impl From<NodeId> for SortKey {
    fn from(expr: NodeId) -> Self {
        SortKey::asc(expr)
    }
}

/*
Table builder
 */

#[derive(Debug, Default)]
pub struct WithoutSchema;
#[derive(Debug)]
pub struct WithSchema(Schema);

/// A table builder
#[derive(Debug, Default)]
pub struct TableBuilder<RequireSchema> {
    name: Option<String>,
    database: Option<String>,
    schema: RequireSchema,
}

impl TableBuilder<WithoutSchema> {
    pub fn new() -> Self {
        TableBuilder::default()
    }
}

impl<RequireSchema> TableBuilder<RequireSchema> {
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn database<S: Into<String>>(mut self, database: S) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn schema<S: Into<Schema>>(self, schema: S) -> TableBuilder<WithSchema> {
        TableBuilder {
            name: self.name,
            database: self.database,
            schema: WithSchema(schema.into()),
        }
    }
}

impl TableBuilder<WithSchema> {
    /// Build the table and add it to the graph
    pub fn build_in(self, graph: &mut Graph) -> NodeId {
        graph.insert(Table {
            name: self.name,
            database: self.database,
            schema: self.schema.0,
        })
    }
}

impl Ready<Table> for TableBuilder<WithSchema> {
    type Error = Error;

    fn try_build(self) -> Result<Table> {
        if self.schema.0.is_empty() {
            return Err(Error::invalid_expression("a table needs at least one column"));
        }
        Ok(Table {
            name: self.name,
            database: self.database,
            schema: self.schema.0,
        })
    }
}

/*
Join builder
 */

#[derive(Debug, Default)]
pub struct WithoutInput;
#[derive(Debug)]
pub struct WithInput(NodeId);

/// A join builder, both operands are required
#[derive(Debug)]
pub struct JoinBuilder<RequireLeft, RequireRight> {
    kind: JoinKind,
    left: RequireLeft,
    right: RequireRight,
    predicates: Vec<NodeId>,
}

impl JoinBuilder<WithoutInput, WithoutInput> {
    pub fn new() -> Self {
        JoinBuilder {
            kind: JoinKind::Inner,
            left: WithoutInput,
            right: WithoutInput,
            predicates: vec![],
        }
    }
}

impl Default for JoinBuilder<WithoutInput, WithoutInput> {
    fn default() -> Self {
        JoinBuilder::new()
    }
}

impl<RequireLeft, RequireRight> JoinBuilder<RequireLeft, RequireRight> {
    pub fn kind(mut self, kind: JoinKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn on(mut self, predicate: NodeId) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn left(self, left: NodeId) -> JoinBuilder<WithInput, RequireRight> {
        JoinBuilder {
            kind: self.kind,
            left: WithInput(left),
            right: self.right,
            predicates: self.predicates,
        }
    }

    pub fn right(self, right: NodeId) -> JoinBuilder<RequireLeft, WithInput> {
        JoinBuilder {
            kind: self.kind,
            left: self.left,
            right: WithInput(right),
            predicates: self.predicates,
        }
    }
}

impl<RequireLeft, RequireRight> With<NodeId> for JoinBuilder<RequireLeft, RequireRight> {
    fn with(self, predicate: NodeId) -> Self {
        self.on(predicate)
    }
}

impl JoinBuilder<WithInput, WithInput> {
    pub fn try_build_in(self, graph: &mut Graph) -> Result<NodeId> {
        let join = self.try_build()?;
        Ok(graph.insert(join))
    }
}

impl Ready<Join> for JoinBuilder<WithInput, WithInput> {
    type Error = Error;

    fn try_build(self) -> Result<Join> {
        if self.kind == JoinKind::Cross && !self.predicates.is_empty() {
            return Err(Error::invalid_expression("a cross join takes no predicate"));
        }
        Ok(Join {
            kind: self.kind,
            left: self.left.0,
            right: self.right.0,
            predicates: self.predicates,
        })
    }
}

/*
Aggregation builder
 */

/// An aggregation builder: `group_by(..).aggregate(..).having(..)`
#[derive(Debug, Default)]
pub struct AggregationBuilder<RequireInput> {
    by: Vec<NodeId>,
    metrics: Vec<NodeId>,
    having: Vec<NodeId>,
    input: RequireInput,
}

impl AggregationBuilder<WithoutInput> {
    pub fn new() -> Self {
        AggregationBuilder::default()
    }
}

impl<RequireInput> AggregationBuilder<RequireInput> {
    pub fn group_by(mut self, key: NodeId) -> Self {
        self.by.push(key);
        self
    }

    pub fn metric(mut self, metric: NodeId) -> Self {
        self.metrics.push(metric);
        self
    }

    pub fn having(mut self, predicate: NodeId) -> Self {
        self.having.push(predicate);
        self
    }

    pub fn input(self, table: NodeId) -> AggregationBuilder<WithInput> {
        AggregationBuilder {
            by: self.by,
            metrics: self.metrics,
            having: self.having,
            input: WithInput(table),
        }
    }
}

impl AggregationBuilder<WithInput> {
    pub fn try_build_in(self, graph: &mut Graph) -> Result<NodeId> {
        let aggregation = self.try_build()?;
        Ok(graph.insert(aggregation))
    }
}

impl Ready<Aggregation> for AggregationBuilder<WithInput> {
    type Error = Error;

    fn try_build(self) -> Result<Aggregation> {
        if self.by.is_empty() && self.metrics.is_empty() {
            return Err(Error::invalid_expression("an aggregation needs keys or metrics"));
        }
        Ok(Aggregation {
            table: self.input.0,
            by: self.by,
            metrics: self.metrics,
            having: self.having,
        })
    }
}
