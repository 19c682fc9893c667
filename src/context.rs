//! # Alias scopes
//!
//! Every SELECT block gets a [`Context`] mapping the tables it reads from to short
//! aliases `t0`, `t1`, ... Contexts nest: a subquery sees the aliases of all its
//! ancestors, reuses them for the same tables and numbers fresh tables from where its
//! parent stood, without advancing the parent. The root context also names the common
//! table expressions.
//!

use colored::Colorize;
use itertools::Itertools;
use std::{fmt, rc::Rc};

use crate::expr::NodeId;

pub const ALIAS_PREFIX: &str = "t";

#[derive(Clone, Debug, Default)]
pub struct Context {
    parent: Option<Rc<Context>>,
    aliases: Vec<(NodeId, String)>,
    counter: usize,
    always_alias: bool,
    ctes: Vec<String>,
}

impl Context {
    pub fn new() -> Self {
        Context::default()
    }

    /// A nested scope numbering fresh aliases after the parent's
    pub fn child_context(parent: &Rc<Context>) -> Self {
        Context {
            parent: Some(Rc::clone(parent)),
            counter: parent.counter,
            ..Context::default()
        }
    }

    pub fn parent(&self) -> Option<&Context> {
        self.parent.as_deref()
    }

    pub fn root(&self) -> &Context {
        match &self.parent {
            Some(parent) => parent.root(),
            None => self,
        }
    }

    /// The alias of a table in this scope or an enclosing one
    pub fn alias_for(&self, table: NodeId) -> Option<&str> {
        self.local_alias(table)
            .or_else(|| self.parent.as_ref().and_then(|parent| parent.alias_for(table)))
    }

    pub fn local_alias(&self, table: NodeId) -> Option<&str> {
        self.aliases
            .iter()
            .find(|(node, _)| *node == table)
            .map(|(_, alias)| alias.as_str())
    }

    /// Bind a table of this scope, reusing the alias an ancestor gave it
    pub fn assign(&mut self, table: NodeId) -> String {
        if let Some(alias) = self.local_alias(table) {
            return alias.to_string();
        }
        let alias = match self.parent.as_ref().and_then(|parent| parent.alias_for(table)) {
            Some(alias) => alias.to_string(),
            None => self.fresh(),
        };
        self.aliases.push((table, alias.clone()));
        alias
    }

    fn fresh(&mut self) -> String {
        let alias = format!("{}{}", ALIAS_PREFIX, self.counter);
        self.counter += 1;
        alias
    }

    /// The number of aliases handed out so far, counting ancestors
    pub fn count(&self) -> usize {
        self.counter
    }

    pub fn aliases(&self) -> &[(NodeId, String)] {
        &self.aliases
    }

    pub fn set_always_alias(&mut self) {
        self.always_alias = true;
    }

    /// Whether columns must be qualified
    pub fn needs_aliases(&self) -> bool {
        self.always_alias || self.aliases.len() > 1
    }

    /// Name a common table expression after one of its occurrences, or freshly
    pub fn register_cte(&mut self, occurrence: Option<NodeId>) -> String {
        let name = match occurrence.and_then(|table| self.local_alias(table)) {
            Some(alias) => alias.to_string(),
            None => self.fresh(),
        };
        self.ctes.push(name.clone());
        name
    }

    /// The name of a common table expression, looked up at the root
    pub fn cte_name(&self, index: usize) -> Option<&str> {
        self.root().ctes.get(index).map(String::as_str)
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Context{}\n{}",
            if self.always_alias { " (always alias)" } else { "" },
            self.aliases
                .iter()
                .map(|(node, alias)| format!("{} -> {}", node, alias.bold()))
                .join("\n")
        )
    }
}
