//! Errors raised while compiling expressions and statements
use std::{error, fmt, result};

use crate::{data_type, expr};

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// A FROM target that cannot be named, or a join predicate over unreachable tables
    Relation(String),
    /// A storage format outside of `parquet`, `avro` and `text`
    UnsupportedFormat(String),
    /// A column name that no table in scope, or both sides of a join, resolve
    AmbiguousReference(String),
    InvalidExpression(String),
    Other(String),
}

impl Error {
    pub fn relation(desc: impl fmt::Display) -> Error {
        Error::Relation(desc.to_string())
    }
    pub fn unsupported_format(format: impl fmt::Display) -> Error {
        Error::UnsupportedFormat(format!("{} is not a supported format", format))
    }
    pub fn ambiguous_reference(desc: impl fmt::Display) -> Error {
        Error::AmbiguousReference(desc.to_string())
    }
    pub fn invalid_expression(desc: impl fmt::Display) -> Error {
        Error::InvalidExpression(desc.to_string())
    }
    pub fn other(desc: impl fmt::Display) -> Error {
        Error::Other(desc.to_string())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Relation(desc) => writeln!(f, "RelationError: {}", desc),
            Error::UnsupportedFormat(desc) => writeln!(f, "UnsupportedFormatError: {}", desc),
            Error::AmbiguousReference(desc) => writeln!(f, "AmbiguousReferenceError: {}", desc),
            Error::InvalidExpression(desc) => writeln!(f, "InvalidExpression: {}", desc),
            Error::Other(err) => writeln!(f, "{}", err),
        }
    }
}

impl error::Error for Error {}

impl From<expr::Error> for Error {
    fn from(err: expr::Error) -> Self {
        match err {
            expr::Error::InvalidName(desc) | expr::Error::InvalidExpression(desc) => {
                Error::InvalidExpression(desc)
            }
            expr::Error::AmbiguousReference(desc) => Error::AmbiguousReference(desc),
            expr::Error::Other(desc) => Error::Other(desc),
        }
    }
}

impl From<data_type::Error> for Error {
    fn from(err: data_type::Error) -> Self {
        Error::InvalidExpression(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Other(err.to_string())
    }
}

pub type Result<T> = result::Result<T, Error>;
