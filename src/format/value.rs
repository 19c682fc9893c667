//! Rendering of value expressions
use itertools::Itertools;

use super::{identifier::quoted, indent, Formatter};
use crate::{
    data_type::Value,
    error::{Error, Result},
    expr::{Aggregate, BinaryOp, Function, Node, NodeId, Options, TimeUnit, UnaryOp},
    statement::{Select, SubqueryKind},
};

/// A literal, as Impala reads it
pub fn literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Boolean(true) => "TRUE".to_string(),
        Value::Boolean(false) => "FALSE".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Float(x) if x.is_nan() => "CAST('nan' AS double)".to_string(),
        Value::Float(x) if x.is_infinite() => format!(
            "CAST('{}inf' AS double)",
            if x.is_sign_negative() { "-" } else { "" }
        ),
        Value::Float(x) => format!("{:?}", x),
        Value::Decimal(d) => d.to_string(),
        Value::String(s) => string_literal(s),
        Value::Timestamp(t) => format!("'{}'", t.format("%Y-%m-%d %H:%M:%S")),
        Value::Date(d) => format!("'{}'", d.format("%Y-%m-%d")),
    }
}

pub fn string_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "\\'"))
}

fn function_name(function: Function) -> &'static str {
    match function {
        Function::Ln => "ln",
        Function::Log10 => "log10",
        Function::Exp => "exp",
        Function::Sqrt => "sqrt",
        Function::Abs => "abs",
        Function::Ceil => "ceil",
        Function::Floor => "floor",
        Function::Lower => "lower",
        Function::Upper => "upper",
        Function::Length => "length",
        Function::Coalesce => "coalesce",
        Function::Now => "now",
    }
}

fn symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Mod => "%",
        BinaryOp::Pow => "pow",
        BinaryOp::Eq => "=",
        BinaryOp::NotEq => "!=",
        BinaryOp::Lt => "<",
        BinaryOp::LtEq => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::GtEq => ">=",
        BinaryOp::And => "AND",
        BinaryOp::Or => "OR",
    }
}

/// `months_add`, `days_sub`, ...
fn interval_function(unit: TimeUnit, op: BinaryOp) -> String {
    format!(
        "{}s_{}",
        unit.name(),
        if op == BinaryOp::Sub { "sub" } else { "add" }
    )
}

impl<'a> Formatter<'a> {
    /// A value in the scope of `select`
    pub fn value(&self, select: &Select, id: NodeId) -> Result<String> {
        if let Some(subquery) = select.subquery(id) {
            let body = format!("(\n{}\n)", indent(&self.query(&subquery.query)?, self.options.indent));
            match subquery.kind {
                SubqueryKind::Scalar => return Ok(body),
                SubqueryKind::Exists => return Ok(format!("EXISTS {}", body)),
                SubqueryKind::In => {
                    if let Node::Contains(contains) = self.graph.node(id) {
                        return Ok(format!(
                            "{} {}IN {}",
                            self.operand(select, contains.arg)?,
                            if contains.negated { "NOT " } else { "" },
                            body
                        ));
                    }
                }
                SubqueryKind::Table => {}
            }
        }
        let value = |id: NodeId| self.value(select, id);
        Ok(match self.graph.node(id) {
            Node::Literal(v) => literal(v),
            Node::Column(c) => {
                if select.outputs.contains(&c.table) {
                    quoted(&c.name)
                } else {
                    let alias = select.context.alias_for(c.table).ok_or_else(|| {
                        Error::ambiguous_reference(format!(
                            "{} does not refer to a table in scope",
                            c.name
                        ))
                    })?;
                    if select.context.needs_aliases() {
                        format!("{}.{}", alias, quoted(&c.name))
                    } else {
                        quoted(&c.name)
                    }
                }
            }
            Node::Alias(a) => value(a.arg)?,
            Node::Unary(u) => match u.op {
                UnaryOp::Not => format!("NOT {}", self.operand(select, u.arg)?),
                UnaryOp::Negate => format!("-{}", self.operand(select, u.arg)?),
                UnaryOp::IsNull => format!("{} IS NULL", self.operand(select, u.arg)?),
                UnaryOp::NotNull => format!("{} IS NOT NULL", self.operand(select, u.arg)?),
            },
            Node::Binary(b) => match (b.op, self.graph.node(b.right)) {
                (BinaryOp::Add | BinaryOp::Sub, Node::Interval(interval)) => format!(
                    "{}({}, {})",
                    interval_function(interval.unit, b.op),
                    value(b.left)?,
                    interval.value
                ),
                (BinaryOp::Pow, _) => format!("pow({}, {})", value(b.left)?, value(b.right)?),
                (op, _) => format!(
                    "{} {} {}",
                    self.operand(select, b.left)?,
                    symbol(op),
                    self.operand(select, b.right)?
                ),
            },
            Node::Call(c) => format!(
                "{}({})",
                function_name(c.function),
                c.arguments.iter().map(|arg| value(*arg)).collect::<Result<Vec<_>>>()?.join(", ")
            ),
            Node::Cast(c) => format!("CAST({} AS {})", value(c.arg)?, c.to.sql_name()),
            Node::Extract(e) => format!("extract({}, '{}')", value(e.arg)?, e.unit.name()),
            Node::Case(c) => {
                let whens = c
                    .whens
                    .iter()
                    .map(|(when, then)| Ok(format!("WHEN {} THEN {}", value(*when)?, value(*then)?)))
                    .collect::<Result<Vec<_>>>()?;
                let mut parts = vec![];
                if let Some(base) = c.base {
                    parts.push(value(base)?);
                }
                let default = c.default.map(|d| value(d)).transpose()?;
                if whens.len() > 1 {
                    let mut lines = whens;
                    if let Some(default) = default {
                        lines.push(format!("ELSE {}", default));
                    }
                    let head = std::iter::once("CASE").chain(parts.iter().map(String::as_str)).join(" ");
                    format!("{}\n{}\nEND", head, indent(&lines.join("\n"), 2))
                } else {
                    parts.extend(whens);
                    if let Some(default) = default {
                        parts.push(format!("ELSE {}", default));
                    }
                    format!("CASE {} END", parts.join(" "))
                }
            }
            Node::Between(b) => format!(
                "{} BETWEEN {} AND {}",
                self.operand(select, b.arg)?,
                value(b.low)?,
                value(b.high)?
            ),
            Node::Contains(c) => match &c.options {
                Options::List(values) => format!(
                    "{} {}IN ({})",
                    self.operand(select, c.arg)?,
                    if c.negated { "NOT " } else { "" },
                    values.iter().map(|v| value(*v)).collect::<Result<Vec<_>>>()?.join(", ")
                ),
                Options::Column(_) => {
                    return Err(Error::invalid_expression("IN over a column without subquery"))
                }
            },
            Node::Reduction(r) => match r.aggregate {
                Aggregate::Sum => format!("sum({})", value(r.arg)?),
                Aggregate::Mean => format!("avg({})", value(r.arg)?),
                Aggregate::Min => format!("min({})", value(r.arg)?),
                Aggregate::Max => format!("max({})", value(r.arg)?),
                Aggregate::Count => format!("count({})", value(r.arg)?),
                Aggregate::CountDistinct => format!("COUNT(DISTINCT {})", value(r.arg)?),
            },
            Node::CountStar(_) => "count(*)".to_string(),
            Node::Interval(_) | Node::TopK(_) | Node::Any(_) | Node::ExprList(_) => {
                return Err(Error::invalid_expression(format!(
                    "{} cannot be rendered here",
                    self.graph.display(id)
                )))
            }
            _ => {
                return Err(Error::invalid_expression(format!(
                    "{} is a table, not a value",
                    self.graph.display(id)
                )))
            }
        })
    }

    /// An operand of an infix operator, parenthesized when it is itself infix
    fn operand(&self, select: &Select, id: NodeId) -> Result<String> {
        let id = self.graph.unaliased(id);
        let rendered = self.value(select, id)?;
        if select.subquery(id).is_some() {
            return Ok(rendered);
        }
        let infix = match self.graph.node(id) {
            Node::Binary(b) => {
                b.op != BinaryOp::Pow && !matches!(self.graph.node(b.right), Node::Interval(_))
            }
            Node::Unary(u) => u.op == UnaryOp::Negate,
            _ => false,
        };
        Ok(if infix {
            format!("({})", rendered)
        } else {
            rendered
        })
    }
}
