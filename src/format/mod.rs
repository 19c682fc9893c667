//! # Formatting
//!
//! Renders an analyzed [`Statement`] as Impala SQL text. Clauses go on their own lines,
//! nested queries are indented, long select lists are wrapped.
//!

pub mod identifier;
pub mod value;

use itertools::Itertools;

use crate::{
    error::{Error, Result},
    expr::{Graph, JoinKind, Node, NodeId},
    statement::{Query, Select, Statement, TableSet},
};
use identifier::{quoted, table_name};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Options {
    pub indent: usize,
    /// Select lists wrap past this width
    pub max_line_length: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            indent: 2,
            max_line_length: 70,
        }
    }
}

/// Prefix every line with `spaces` spaces
pub fn indent(text: &str, spaces: usize) -> String {
    let prefix = " ".repeat(spaces);
    text.split('\n').map(|line| format!("{}{}", prefix, line)).join("\n")
}

fn join_keyword(kind: JoinKind) -> &'static str {
    match kind {
        JoinKind::Inner => "INNER JOIN",
        JoinKind::Left => "LEFT OUTER JOIN",
        JoinKind::Right => "RIGHT OUTER JOIN",
        JoinKind::Outer => "FULL OUTER JOIN",
        JoinKind::Semi => "LEFT SEMI JOIN",
        JoinKind::Anti => "LEFT ANTI JOIN",
        JoinKind::Cross => "CROSS JOIN",
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Formatter<'a> {
    graph: &'a Graph,
    options: &'a Options,
}

impl<'a> Formatter<'a> {
    pub fn new(graph: &'a Graph, options: &'a Options) -> Self {
        Formatter { graph, options }
    }

    pub fn statement(&self, statement: &Statement) -> Result<String> {
        let body = self.query(statement.query())?;
        log::debug!(
            "rendering a statement with {} common table expressions",
            statement.ctes().len()
        );
        if statement.ctes().is_empty() {
            return Ok(body);
        }
        let ctes = statement
            .ctes()
            .iter()
            .map(|cte| {
                Ok(format!(
                    "{} AS (\n{}\n)",
                    cte.name,
                    indent(&self.query(&cte.query)?, self.options.indent)
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(format!("WITH {}\n{}", ctes.join(",\n"), body))
    }

    pub fn query(&self, query: &Query) -> Result<String> {
        match query {
            Query::Select(select) => self.select(select),
            Query::Union {
                left,
                right,
                distinct,
            } => Ok(format!(
                "{}\n{}\n{}",
                self.query(left)?,
                if *distinct { "UNION" } else { "UNION ALL" },
                self.query(right)?
            )),
        }
    }

    pub fn select(&self, select: &Select) -> Result<String> {
        log::trace!("rendering the block over {}", select.node);
        let mut clauses = vec![self.select_list(select)?];
        if let Some(table_set) = &select.table_set {
            clauses.push(format!("FROM {}", self.table_set(select, table_set)?));
        }
        if !select.predicates.is_empty() {
            let predicates = select
                .predicates
                .iter()
                .map(|predicate| self.predicate(select, *predicate))
                .collect::<Result<Vec<_>>>()?;
            clauses.push(format!("WHERE {}", predicates.join(" AND\n      ")));
        }
        if !select.group_by.is_empty() {
            clauses.push(format!(
                "GROUP BY {}",
                select.group_by.iter().map(|index| index + 1).join(", ")
            ));
        }
        if !select.having.is_empty() {
            let having = select
                .having
                .iter()
                .map(|predicate| self.predicate(select, *predicate))
                .collect::<Result<Vec<_>>>()?;
            clauses.push(format!("HAVING {}", having.join(" AND\n       ")));
        }
        if !select.order_by.is_empty() {
            let keys = select
                .order_by
                .iter()
                .map(|key| {
                    Ok(format!(
                        "{}{}",
                        self.value(select, key.expr)?,
                        if key.ascending { "" } else { " DESC" }
                    ))
                })
                .collect::<Result<Vec<_>>>()?;
            clauses.push(format!("ORDER BY {}", keys.join(", ")));
        }
        if let Some(limit) = select.limit {
            clauses.push(if limit.offset > 0 {
                format!("LIMIT {} OFFSET {}", limit.n, limit.offset)
            } else {
                format!("LIMIT {}", limit.n)
            });
        }
        Ok(clauses.join("\n"))
    }

    fn predicate(&self, select: &Select, id: NodeId) -> Result<String> {
        let rendered = self.value(select, id)?;
        Ok(match self.graph.node(self.graph.unaliased(id)) {
            Node::Binary(b) if b.op == crate::expr::BinaryOp::Or => format!("({})", rendered),
            _ => rendered,
        })
    }

    fn select_item(&self, select: &Select, id: NodeId) -> Result<String> {
        match self.graph.node(id) {
            Node::Join(_) => Ok("*".to_string()),
            node if node.is_relation() => {
                if select.context.needs_aliases() {
                    match select.context.alias_for(id) {
                        Some(alias) => Ok(format!("{}.*", alias)),
                        None => Ok("*".to_string()),
                    }
                } else {
                    Ok("*".to_string())
                }
            }
            Node::Alias(a) => Ok(format!("{} AS {}", self.value(select, a.arg)?, quoted(&a.name))),
            _ => self.value(select, id),
        }
    }

    /// `SELECT` and the select list, wrapped past the maximum line length
    fn select_list(&self, select: &Select) -> Result<String> {
        let items = select
            .select_set
            .iter()
            .map(|item| self.select_item(select, *item))
            .collect::<Result<Vec<_>>>()?;
        let mut buffer = String::new();
        let mut line_length = 0;
        let mut tokens = 0;
        for (i, item) in items.iter().enumerate() {
            if item.contains('\n') {
                if i > 0 {
                    buffer.push(',');
                }
                buffer.push('\n');
                let indented = indent(item, self.options.indent);
                line_length = indented.split('\n').last().map_or(0, str::len);
                buffer.push_str(&indented);
                tokens = 1;
            } else if tokens > 0 && line_length > 0 && item.len() + line_length > self.options.max_line_length {
                buffer.push_str(if i > 0 { ",\n       " } else { "\n" });
                buffer.push_str(item);
                line_length = item.len() + 7;
                tokens = 1;
            } else {
                if i > 0 {
                    buffer.push(',');
                }
                buffer.push(' ');
                buffer.push_str(item);
                tokens += 1;
                line_length += item.len() + 2;
            }
        }
        Ok(format!(
            "{}{}",
            if select.distinct { "SELECT DISTINCT" } else { "SELECT" },
            buffer
        ))
    }

    fn table_set(&self, select: &Select, table_set: &TableSet) -> Result<String> {
        let mut result = self.table(select, table_set.first)?;
        for join in &table_set.joins {
            let mut clause = format!("{} {}", join_keyword(join.kind), self.table(select, join.table)?);
            if !join.predicates.is_empty() {
                let predicates = join
                    .predicates
                    .iter()
                    .map(|predicate| self.value(select, *predicate))
                    .collect::<Result<Vec<_>>>()?;
                clause = format!(
                    "{}\n{}",
                    clause,
                    indent(&format!("ON {}", predicates.join(" AND\n   ")), self.options.indent)
                );
            }
            result = format!("{}\n{}", result, indent(&clause, self.options.indent));
        }
        Ok(result)
    }

    /// A table of the FROM clause, with its alias when needed
    fn table(&self, select: &Select, leaf: NodeId) -> Result<String> {
        let context = &select.context;
        let alias = context
            .alias_for(leaf)
            .ok_or_else(|| Error::relation(format!("{} has no alias", leaf)))?;
        if let Some(derived) = select.derived(leaf) {
            if let Some(index) = derived.cte {
                let name = context
                    .cte_name(index)
                    .ok_or_else(|| Error::relation(format!("unnamed common table expression {}", index)))?;
                return Ok(if name == alias {
                    name.to_string()
                } else {
                    format!("{} {}", name, alias)
                });
            }
            return Ok(format!(
                "(\n{}\n) {}",
                indent(&self.query(&derived.query)?, self.options.indent),
                alias
            ));
        }
        let physical = match self.graph.node(leaf) {
            Node::View(v) => v.table,
            _ => leaf,
        };
        let name = match self.graph.node(physical) {
            Node::Table(table) => match &table.name {
                Some(name) => table_name(table.database.as_deref(), name, false),
                None => return Err(Error::relation("a table without a name cannot be referenced in SQL")),
            },
            _ => return Err(Error::relation(format!("{} is not a physical table", leaf))),
        };
        Ok(if context.needs_aliases() {
            format!("{} {}", name, alias)
        } else {
            name
        })
    }
}
