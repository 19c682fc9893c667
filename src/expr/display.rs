//! Human readable, colored, rendering of expressions for logs and tests

use colored::Colorize;
use itertools::Itertools;
use std::fmt;

use super::{Graph, Node, NodeId, Options};
use crate::builder::{WithContext, WithoutContext};

impl WithoutContext for NodeId {}

impl Graph {
    /// A displayable view of the expression rooted at `id`
    pub fn display(&self, id: NodeId) -> WithContext<NodeId, &Graph> {
        id.with(self)
    }

    fn render(&self, id: NodeId) -> String {
        let list = |ids: &[NodeId]| ids.iter().map(|id| self.render(*id)).join(", ");
        match self.node(id) {
            Node::Table(t) => {
                let name = t.name.as_deref().unwrap_or("?");
                match &t.database {
                    Some(database) => format!("{}.{}", database, name).bold().red().to_string(),
                    None => name.bold().red().to_string(),
                }
            }
            Node::View(v) => format!("{}({})", "View".blue(), self.render(v.table)),
            Node::Projection(p) => format!(
                "{}[{}]({})",
                "Projection".blue(),
                list(&p.selections),
                self.render(p.table)
            ),
            Node::Selection(s) => format!(
                "{}[{}]({})",
                "Selection".blue(),
                list(&s.predicates),
                self.render(s.table)
            ),
            Node::Aggregation(a) => format!(
                "{}[by: {}; metrics: {}; having: {}]({})",
                "Aggregation".blue(),
                list(&a.by),
                list(&a.metrics),
                list(&a.having),
                self.render(a.table)
            ),
            Node::Join(j) => format!(
                "{}{:?}[{}]({}, {})",
                "Join".blue(),
                j.kind,
                list(&j.predicates),
                self.render(j.left),
                self.render(j.right)
            ),
            Node::Sort(s) => format!(
                "{}[{}]({})",
                "Sort".blue(),
                s.keys
                    .iter()
                    .map(|k| format!(
                        "{} {}",
                        self.render(k.expr),
                        if k.ascending { "asc" } else { "desc" }
                    ))
                    .join(", "),
                self.render(s.table)
            ),
            Node::Limit(l) => format!(
                "{}[{}, {}]({})",
                "Limit".blue(),
                l.n,
                l.offset,
                self.render(l.table)
            ),
            Node::Distinct(d) => format!("{}({})", "Distinct".blue(), self.render(d.table)),
            Node::Union(u) => format!(
                "{}{}({}, {})",
                "Union".blue(),
                if u.distinct { "Distinct" } else { "All" },
                self.render(u.left),
                self.render(u.right)
            ),
            Node::Literal(value) => format!("{}", value).yellow().to_string(),
            Node::Interval(i) => format!("interval({} {})", i.value, i.unit.name()),
            Node::Column(c) => format!("{}", c.name).green().to_string(),
            Node::Alias(a) => format!("{} as {}", self.render(a.arg), a.name.green()),
            Node::Unary(u) => format!("{:?}({})", u.op, self.render(u.arg)),
            Node::Binary(b) => format!(
                "({} {:?} {})",
                self.render(b.left),
                b.op,
                self.render(b.right)
            ),
            Node::Call(c) => format!("{:?}({})", c.function, list(&c.arguments)),
            Node::Cast(c) => format!("cast({}, {})", self.render(c.arg), c.to),
            Node::Extract(e) => format!("extract({}, {})", self.render(e.arg), e.unit.name()),
            Node::Case(c) => format!(
                "case({}; {}; {})",
                c.base.map(|b| self.render(b)).unwrap_or_default(),
                c.whens
                    .iter()
                    .map(|(w, t)| format!("{} => {}", self.render(*w), self.render(*t)))
                    .join(", "),
                c.default.map(|d| self.render(d)).unwrap_or_default()
            ),
            Node::Between(b) => format!(
                "between({}, {}, {})",
                self.render(b.arg),
                self.render(b.low),
                self.render(b.high)
            ),
            Node::Contains(c) => format!(
                "{}({}, {})",
                if c.negated { "notin" } else { "isin" },
                self.render(c.arg),
                match &c.options {
                    Options::List(values) => format!("[{}]", list(values)),
                    Options::Column(column) => self.render(*column),
                }
            ),
            Node::Reduction(r) => format!("{:?}({})", r.aggregate, self.render(r.arg)),
            Node::CountStar(c) => format!("count(*)({})", self.render(c.table)),
            Node::TopK(t) => format!(
                "topk({}, {}{})",
                self.render(t.arg),
                t.k,
                t.by.map(|by| format!(", by: {}", self.render(by)))
                    .unwrap_or_default()
            ),
            Node::Any(a) => format!("any({})", self.render(a.predicate)),
            Node::ExprList(l) => format!("[{}]", list(&l.exprs)),
        }
    }
}

impl<'a> fmt::Display for WithContext<NodeId, &'a Graph> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.context.render(self.object))
    }
}
