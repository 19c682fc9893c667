//! # Semantic data types
//!
//! The column types attached to table schemas, cast targets and UDF signatures,
//! with their Impala spellings.
//!

pub mod value;

use std::{error, fmt, result, str::FromStr};

use serde::{Deserialize, Serialize};

pub use value::Value;

// Error management

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    InvalidType(String),
    Other(String),
}

impl Error {
    pub fn invalid_type(data_type: impl fmt::Display) -> Error {
        Error::InvalidType(format!("{} is not a supported type", data_type))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidType(desc) => writeln!(f, "InvalidType: {}", desc),
            Error::Other(err) => writeln!(f, "{}", err),
        }
    }
}

impl error::Error for Error {}

pub type Result<T> = result::Result<T, Error>;

/// A column type
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Null,
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    Float,
    Double,
    String,
    Timestamp,
    Date,
    Decimal { precision: u8, scale: u8 },
}

impl DataType {
    pub fn decimal(precision: u8, scale: u8) -> DataType {
        DataType::Decimal { precision, scale }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64
        )
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer()
            || matches!(
                self,
                DataType::Float | DataType::Double | DataType::Decimal { .. }
            )
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, DataType::Timestamp | DataType::Date)
    }

    /// The type name used in casts and function signatures
    pub fn sql_name(&self) -> String {
        match self {
            DataType::Null => "null".to_string(),
            DataType::Boolean => "boolean".to_string(),
            DataType::Int8 => "tinyint".to_string(),
            DataType::Int16 => "smallint".to_string(),
            DataType::Int32 => "int".to_string(),
            DataType::Int64 => "bigint".to_string(),
            DataType::Float => "float".to_string(),
            DataType::Double => "double".to_string(),
            DataType::String => "string".to_string(),
            DataType::Timestamp => "timestamp".to_string(),
            DataType::Date => "date".to_string(),
            DataType::Decimal { precision, scale } => format!("decimal({},{})", precision, scale),
        }
    }

    /// The type name used in column definitions
    pub fn ddl_name(&self) -> String {
        self.sql_name().to_uppercase()
    }

    /// The smallest type holding both operands of an arithmetic operation
    pub fn promote(&self, other: &DataType) -> DataType {
        fn rank(data_type: &DataType) -> u8 {
            match data_type {
                DataType::Boolean => 1,
                DataType::Int8 => 2,
                DataType::Int16 => 3,
                DataType::Int32 => 4,
                DataType::Int64 => 5,
                DataType::Decimal { .. } => 6,
                DataType::Float => 7,
                DataType::Double => 8,
                _ => 0,
            }
        }
        if rank(other) > rank(self) {
            *other
        } else {
            *self
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Null => write!(f, "null"),
            DataType::Boolean => write!(f, "boolean"),
            DataType::Int8 => write!(f, "int8"),
            DataType::Int16 => write!(f, "int16"),
            DataType::Int32 => write!(f, "int32"),
            DataType::Int64 => write!(f, "int64"),
            DataType::Float => write!(f, "float"),
            DataType::Double => write!(f, "double"),
            DataType::String => write!(f, "string"),
            DataType::Timestamp => write!(f, "timestamp"),
            DataType::Date => write!(f, "date"),
            DataType::Decimal { precision, scale } => write!(f, "decimal({},{})", precision, scale),
        }
    }
}

impl FromStr for DataType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().to_lowercase();
        Ok(match name.as_str() {
            "null" => DataType::Null,
            "boolean" | "bool" => DataType::Boolean,
            "int8" | "tinyint" => DataType::Int8,
            "int16" | "smallint" => DataType::Int16,
            "int32" | "int" => DataType::Int32,
            "int64" | "bigint" => DataType::Int64,
            "float" => DataType::Float,
            "double" => DataType::Double,
            "string" => DataType::String,
            "timestamp" => DataType::Timestamp,
            "date" => DataType::Date,
            _ => {
                let arguments = name
                    .strip_prefix("decimal(")
                    .and_then(|rest| rest.strip_suffix(')'))
                    .ok_or_else(|| Error::invalid_type(s))?;
                let (precision, scale) = arguments
                    .split_once(',')
                    .ok_or_else(|| Error::invalid_type(s))?;
                DataType::Decimal {
                    precision: precision.trim().parse().map_err(|_| Error::invalid_type(s))?,
                    scale: scale.trim().parse().map_err(|_| Error::invalid_type(s))?,
                }
            }
        })
    }
}

impl TryFrom<&str> for DataType {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        value.parse()
    }
}
