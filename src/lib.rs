//! # Impala SQL compiler
//! Compiles relational expression graphs into Impala SQL text.
//!
//! ## Expression graphs
//! Tables, projections, filters, aggregations, joins, sorts, limits and unions are nodes of
//! an arena [`Graph`](expr::Graph), addressed by [`NodeId`](expr::NodeId) handles. A
//! self-join goes through a [`View`](expr::View), a new handle over the same table.
//!
//! ## Compilation
//! The [`analyzer`] folds chains of operators into SELECT blocks, wraps what cannot be
//! folded into derived tables, extracts scalar, `EXISTS` and `IN` subqueries and factors
//! derived tables used twice into common table expressions. The result is a
//! [`Statement`](statement::Statement) whose aliases come from a per-compilation
//! [`Context`](context::Context). The [`format`] module renders it.
//!
//! ```
//! use impala_compiler::{data_type::DataType, expr::{Graph, Schema}, to_sql};
//! let mut graph = Graph::new();
//! let table = graph.table("star1", Schema::from([("f", DataType::Double)]));
//! let limited = graph.limit(table, 10, 5);
//! assert_eq!(to_sql(&graph, limited).unwrap(), "SELECT *\nFROM star1\nLIMIT 10 OFFSET 5");
//! ```
//!
//! ## DDL
//! Table and function statements of the [`ddl`] module are rendered directly.
//!

#![recursion_limit = "1024"]
pub mod data_type;
pub mod setup;
pub mod expr;
pub mod analyzer;
pub mod builder;
pub mod context;
pub mod ddl;
pub mod error;
pub mod format;
pub mod statement;
pub mod visitor;

pub use analyzer::{build_ast, to_sql};
pub use builder::{Ready, With, WithContext, WithIterator, WithoutContext};
pub use data_type::{value::Value, DataType};
pub use error::{Error, Result};
pub use expr::{Graph, NodeId};
pub use statement::Statement;
