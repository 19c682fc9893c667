//! User-defined functions: creation from a shared library, removal and listing
use itertools::Itertools;

use super::Ddl;
use crate::{data_type::DataType, error::Result, format::value::string_literal};

/// `name(type, ...)` with the database prefix when there is one
fn signature(database: Option<&str>, name: &str, inputs: &[DataType]) -> String {
    format!(
        "{}{}({})",
        database.map(|db| format!("{}.", db)).unwrap_or_default(),
        name,
        inputs.iter().map(DataType::sql_name).join(", ")
    )
}

/// A scalar UDF
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateFunction {
    name: String,
    database: Option<String>,
    inputs: Vec<DataType>,
    output: DataType,
    library: String,
    symbol: String,
}

impl CreateFunction {
    pub fn new<N, L, S>(name: N, inputs: Vec<DataType>, output: DataType, library: L, symbol: S) -> Self
    where
        N: Into<String>,
        L: Into<String>,
        S: Into<String>,
    {
        CreateFunction {
            name: name.into(),
            database: None,
            inputs,
            output,
            library: library.into(),
            symbol: symbol.into(),
        }
    }

    pub fn database<S: Into<String>>(mut self, database: S) -> Self {
        self.database = Some(database.into());
        self
    }
}

impl Ddl for CreateFunction {
    fn compile(&self) -> Result<String> {
        Ok(format!(
            "CREATE FUNCTION {} returns {} location {} symbol={}",
            signature(self.database.as_deref(), &self.name, &self.inputs),
            self.output.sql_name(),
            string_literal(&self.library),
            string_literal(&self.symbol)
        ))
    }
}

/// A UDA, given by the symbols of its steps
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateAggregateFunction {
    name: String,
    database: Option<String>,
    inputs: Vec<DataType>,
    output: DataType,
    library: String,
    init: Option<String>,
    update: Option<String>,
    merge: Option<String>,
    serialize: Option<String>,
    finalize: Option<String>,
}

impl CreateAggregateFunction {
    pub fn new<N: Into<String>, L: Into<String>>(
        name: N,
        inputs: Vec<DataType>,
        output: DataType,
        library: L,
    ) -> Self {
        CreateAggregateFunction {
            name: name.into(),
            database: None,
            inputs,
            output,
            library: library.into(),
            init: None,
            update: None,
            merge: None,
            serialize: None,
            finalize: None,
        }
    }

    pub fn database<S: Into<String>>(mut self, database: S) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn init<S: Into<String>>(mut self, symbol: S) -> Self {
        self.init = Some(symbol.into());
        self
    }

    pub fn update<S: Into<String>>(mut self, symbol: S) -> Self {
        self.update = Some(symbol.into());
        self
    }

    pub fn merge<S: Into<String>>(mut self, symbol: S) -> Self {
        self.merge = Some(symbol.into());
        self
    }

    pub fn serialize<S: Into<String>>(mut self, symbol: S) -> Self {
        self.serialize = Some(symbol.into());
        self
    }

    pub fn finalize<S: Into<String>>(mut self, symbol: S) -> Self {
        self.finalize = Some(symbol.into());
        self
    }
}

impl Ddl for CreateAggregateFunction {
    fn compile(&self) -> Result<String> {
        let steps = [
            ("init_fn", &self.init),
            ("update_fn", &self.update),
            ("merge_fn", &self.merge),
            ("serialize_fn", &self.serialize),
            ("finalize_fn", &self.finalize),
        ];
        let head = format!(
            "CREATE AGGREGATE FUNCTION {} returns {} location {}",
            signature(self.database.as_deref(), &self.name, &self.inputs),
            self.output.sql_name(),
            string_literal(&self.library)
        );
        Ok(std::iter::once(head)
            .chain(steps.iter().filter_map(|(step, symbol)| {
                symbol
                    .as_ref()
                    .map(|symbol| format!("{}={}", step, string_literal(symbol)))
            }))
            .join(" "))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DropFunction {
    name: String,
    database: Option<String>,
    inputs: Vec<DataType>,
    aggregate: bool,
    must_exist: bool,
}

impl DropFunction {
    pub fn new<S: Into<String>>(name: S, inputs: Vec<DataType>) -> Self {
        DropFunction {
            name: name.into(),
            database: None,
            inputs,
            aggregate: false,
            must_exist: true,
        }
    }

    pub fn database<S: Into<String>>(mut self, database: S) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn aggregate(mut self) -> Self {
        self.aggregate = true;
        self
    }

    pub fn if_exists(mut self) -> Self {
        self.must_exist = false;
        self
    }
}

impl Ddl for DropFunction {
    fn compile(&self) -> Result<String> {
        Ok(format!(
            "DROP {}FUNCTION {}{}",
            if self.aggregate { "AGGREGATE " } else { "" },
            if self.must_exist { "" } else { "IF EXISTS " },
            signature(self.database.as_deref(), &self.name, &self.inputs)
        ))
    }
}

/// `SHOW FUNCTIONS IN database [LIKE pattern]`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListFunction {
    database: String,
    like: Option<String>,
    aggregate: bool,
}

impl ListFunction {
    pub fn new<S: Into<String>>(database: S) -> Self {
        ListFunction {
            database: database.into(),
            like: None,
            aggregate: false,
        }
    }

    pub fn like<S: Into<String>>(mut self, pattern: S) -> Self {
        self.like = Some(pattern.into());
        self
    }

    pub fn aggregate(mut self) -> Self {
        self.aggregate = true;
        self
    }
}

impl Ddl for ListFunction {
    fn compile(&self) -> Result<String> {
        Ok(format!(
            "SHOW {}FUNCTIONS IN {}{}",
            if self.aggregate { "AGGREGATE " } else { "" },
            self.database,
            self.like
                .as_ref()
                .map(|pattern| format!(" LIKE {}", string_literal(pattern)))
                .unwrap_or_default()
        ))
    }
}
