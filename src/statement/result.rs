//! Shaping raw results into what the compiled expression denotes
use serde::{Deserialize, Serialize};

use crate::{
    data_type::Value,
    error::{Error, Result},
};

/// Rows as returned by the engine
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        ResultSet { columns, rows }
    }

    pub fn column(&self, name: &str) -> Result<Vec<Value>> {
        let index = self
            .columns
            .iter()
            .position(|column| column == name)
            .ok_or_else(|| Error::other(format!("no column named {} in the result", name)))?;
        self.rows
            .iter()
            .map(|row| {
                row.get(index)
                    .cloned()
                    .ok_or_else(|| Error::other("row shorter than the header"))
            })
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Output {
    Scalar(Value),
    Column(Vec<Value>),
    Table(ResultSet),
}

/// How to turn a [`ResultSet`] into an [`Output`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Handler {
    Table,
    Column(String),
    Scalar,
}

impl Handler {
    pub fn handle(&self, result: ResultSet) -> Result<Output> {
        match self {
            Handler::Table => Ok(Output::Table(result)),
            Handler::Column(name) => Ok(Output::Column(result.column(name)?)),
            Handler::Scalar => result
                .rows
                .into_iter()
                .next()
                .and_then(|row| row.into_iter().next())
                .map(Output::Scalar)
                .ok_or_else(|| Error::other("empty result for a scalar expression")),
        }
    }
}
