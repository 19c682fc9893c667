use itertools::Itertools;
use std::{
    collections::HashSet,
    fmt,
    ops::{BitAnd, Deref, Index},
};

use super::{Error, Result};
use crate::{
    builder::{Ready, With},
    data_type::DataType,
};

/// The output name of an unnamed value expression
pub const DEFAULT_NAME: &str = "tmp";

/// A named and typed column
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct Field {
    name: String,
    data_type: DataType,
}

impl Field {
    pub fn new<S: Into<String>>(name: S, data_type: DataType) -> Field {
        Field {
            name: name.into(),
            data_type,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn with_name<S: Into<String>>(self, name: S) -> Field {
        Field::new(name, self.data_type)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.data_type)
    }
}

impl<S: Into<String>> From<(S, DataType)> for Field {
    fn from((name, data_type): (S, DataType)) -> Self {
        Field::new(name, data_type)
    }
}

/// An ordered list of fields with distinct names
#[derive(Clone, Debug, Hash, PartialEq, Eq, Default)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    /// Build a schema, a name seen twice keeps its first field
    pub fn new(fields: Vec<Field>) -> Self {
        let mut names = HashSet::new();
        Schema {
            fields: fields
                .into_iter()
                .filter(|field| names.insert(field.name.clone()))
                .collect(),
        }
    }

    /// Build a schema, failing on name collisions
    pub fn try_new(fields: Vec<Field>) -> Result<Self> {
        let mut names = HashSet::new();
        if let Some(field) = fields.iter().find(|field| !names.insert(field.name())) {
            return Err(Error::invalid_name(format!(
                "{} (ambiguous column name)",
                field.name()
            )));
        }
        Ok(Schema { fields })
    }

    pub fn empty() -> Self {
        Schema::default()
    }

    pub fn with<F: Into<Field>>(self, field: F) -> Self {
        let mut fields = self.fields;
        fields.push(field.into());
        Schema::new(fields)
    }

    /// The fields of `self` followed by the fields of `other` not already present
    pub fn merge(self, other: Schema) -> Self {
        let mut fields = self.fields;
        fields.extend(other.fields);
        Schema::new(fields)
    }

    pub fn builder() -> Builder {
        Builder::new()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Access a field by name
    pub fn field(&self, name: &str) -> Result<&Field> {
        self.fields
            .iter()
            .find(|f| f.name() == name)
            .ok_or_else(|| Error::invalid_name(name))
    }

    pub fn index_from_name(&self, name: &str) -> Result<usize> {
        self.fields
            .iter()
            .position(|f| f.name() == name)
            .ok_or_else(|| Error::invalid_name(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.iter().map(|field| format!("{field}")).join(", "))
    }
}

impl Deref for Schema {
    type Target = [Field];

    fn deref(&self) -> &Self::Target {
        self.fields.deref()
    }
}

impl Index<&str> for Schema {
    type Output = Field;

    fn index(&self, name: &str) -> &Self::Output {
        self.field(name)
            .unwrap_or_else(|_| panic!("no field named {}", name))
    }
}

impl<F: Into<Field>> BitAnd<F> for Schema {
    type Output = Schema;

    fn bitand(self, rhs: F) -> Self::Output {
        self.with(rhs)
    }
}

impl<F: Into<Field>, const N: usize> From<[F; N]> for Schema {
    fn from(fields: [F; N]) -> Self {
        fields.into_iter().collect()
    }
}

impl<F: Into<Field>> FromIterator<F> for Schema {
    fn from_iter<T: IntoIterator<Item = F>>(iter: T) -> Self {
        Schema::new(iter.into_iter().map(|field| field.into()).collect())
    }
}

impl IntoIterator for Schema {
    type Item = Field;
    type IntoIter = <Vec<Field> as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

/// Collects fields and checks them once, at build time
#[derive(Debug, Default)]
pub struct Builder {
    fields: Vec<Field>,
}

impl Builder {
    pub fn new() -> Builder {
        Builder::default()
    }
}

impl<S: Into<String>> With<(S, DataType)> for Builder {
    fn with(mut self, name_data_type: (S, DataType)) -> Self {
        self.fields.push(name_data_type.into());
        self
    }
}

impl<S: Into<String>> With<(S, &str)> for Builder {
    fn with(mut self, (name, data_type): (S, &str)) -> Self {
        // Unknown type names are reported by `try_build`
        let data_type = data_type.parse().unwrap_or(DataType::Null);
        self.fields.push(Field::new(name, data_type));
        self
    }
}

impl Ready<Schema> for Builder {
    type Error = Error;

    fn try_build(self) -> Result<Schema> {
        Schema::try_new(self.fields)
    }
}
