//! # DDL statements
//!
//! Table creation, removal, insertion and caching statements. They are rendered directly
//! from their fields, only the SELECT they embed goes through the analyzer.
//!
//! ```
//! use impala_compiler::ddl::{Ddl, DropTable};
//! let drop = DropTable::new("foo").database("bar").if_exists();
//! assert_eq!(drop.compile().unwrap(), "DROP TABLE IF EXISTS bar.`foo`");
//! ```

pub mod function;

use std::{fmt, str::FromStr};

use itertools::Itertools;
use serde_json::Value as Json;

use crate::{
    builder::Ready,
    error::{Error, Result},
    expr::Schema,
    format::{
        identifier::quoted,
        value::string_literal,
    },
    statement::Statement,
};

pub use function::{CreateAggregateFunction, CreateFunction, DropFunction, ListFunction};

/// A statement rendered without analysis
pub trait Ddl {
    fn compile(&self) -> Result<String>;
}

/// A storage format Impala can write
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum Format {
    Parquet,
    Avro,
    Text,
}

impl Format {
    pub fn keyword(&self) -> &'static str {
        match self {
            Format::Parquet => "PARQUET",
            Format::Avro => "AVRO",
            Format::Text => "TEXTFILE",
        }
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "parquet" => Ok(Format::Parquet),
            "avro" => Ok(Format::Avro),
            "text" => Ok(Format::Text),
            _ => Err(Error::unsupported_format(s)),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.keyword())
    }
}

/// `database.`name``, the name is backquoted even without a database
pub fn scoped_name(database: Option<&str>, name: &str) -> String {
    match database {
        Some(database) => format!("{}.{}", database, quoted(name)),
        None => quoted(name),
    }
}

fn create_line(external: bool, if_not_exists: bool, name: &str) -> String {
    format!(
        "CREATE {}TABLE {}{}",
        if external { "EXTERNAL " } else { "" },
        if if_not_exists { "IF NOT EXISTS " } else { "" },
        name
    )
}

fn location(path: Option<&str>) -> String {
    path.map(|path| format!("\nLOCATION {}", string_literal(path)))
        .unwrap_or_default()
}

/// The parenthesized column definitions of a schema
pub fn columns(schema: &Schema) -> String {
    format!(
        "({})",
        schema
            .iter()
            .map(|field| format!("{} {}", quoted(field.name()), field.data_type().ddl_name()))
            .join(",\n ")
    )
}

/// `DROP TABLE [IF EXISTS] name`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DropTable {
    name: String,
    database: Option<String>,
    must_exist: bool,
}

impl DropTable {
    pub fn new<S: Into<String>>(name: S) -> Self {
        DropTable {
            name: name.into(),
            database: None,
            must_exist: true,
        }
    }

    pub fn database<S: Into<String>>(mut self, database: S) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn if_exists(mut self) -> Self {
        self.must_exist = false;
        self
    }
}

impl Ddl for DropTable {
    fn compile(&self) -> Result<String> {
        Ok(format!(
            "DROP TABLE {}{}",
            if self.must_exist { "" } else { "IF EXISTS " },
            scoped_name(self.database.as_deref(), &self.name)
        ))
    }
}

/// `INSERT INTO|OVERWRITE name` followed by a query
pub struct InsertSelect {
    name: String,
    database: Option<String>,
    select: Statement,
    overwrite: bool,
}

impl InsertSelect {
    pub fn new<S: Into<String>>(name: S, select: Statement) -> Self {
        InsertSelect {
            name: name.into(),
            database: None,
            select,
            overwrite: false,
        }
    }

    pub fn database<S: Into<String>>(mut self, database: S) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn overwrite(mut self) -> Self {
        self.overwrite = true;
        self
    }
}

impl Ddl for InsertSelect {
    fn compile(&self) -> Result<String> {
        Ok(format!(
            "INSERT {} {}\n{}",
            if self.overwrite { "OVERWRITE" } else { "INTO" },
            scoped_name(self.database.as_deref(), &self.name),
            self.select.compile()?
        ))
    }
}

/// Pins a table in an HDFS cache pool
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheTable {
    name: String,
    database: Option<String>,
    pool: String,
}

impl CacheTable {
    pub fn new<S: Into<String>>(name: S) -> Self {
        CacheTable {
            name: name.into(),
            database: None,
            pool: "default".to_string(),
        }
    }

    pub fn database<S: Into<String>>(mut self, database: S) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn pool<S: Into<String>>(mut self, pool: S) -> Self {
        self.pool = pool.into();
        self
    }
}

impl Ddl for CacheTable {
    fn compile(&self) -> Result<String> {
        Ok(format!(
            "ALTER TABLE {} SET CACHED IN {}",
            scoped_name(self.database.as_deref(), &self.name),
            string_literal(&self.pool)
        ))
    }
}

/// `CREATE TABLE ... AS SELECT`
pub struct CreateTableAs {
    name: String,
    database: Option<String>,
    select: Statement,
    external: bool,
    if_not_exists: bool,
    format: Format,
    path: Option<String>,
}

impl CreateTableAs {
    pub fn builder<S: Into<String>>(name: S, select: Statement) -> CreateTableAsBuilder {
        CreateTableAsBuilder {
            name: name.into(),
            database: None,
            select,
            external: false,
            if_not_exists: false,
            format: "parquet".to_string(),
            path: None,
        }
    }

    pub fn format(&self) -> Format {
        self.format
    }
}

impl Ddl for CreateTableAs {
    fn compile(&self) -> Result<String> {
        Ok(format!(
            "{}\nSTORED AS {}{}\nAS\n{}",
            create_line(
                self.external,
                self.if_not_exists,
                &scoped_name(self.database.as_deref(), &self.name)
            ),
            self.format,
            location(self.path.as_deref()),
            self.select.compile()?
        ))
    }
}

/// Collects the options of a [`CreateTableAs`], the format tag is checked on build
pub struct CreateTableAsBuilder {
    name: String,
    database: Option<String>,
    select: Statement,
    external: bool,
    if_not_exists: bool,
    format: String,
    path: Option<String>,
}

impl CreateTableAsBuilder {
    pub fn database<S: Into<String>>(mut self, database: S) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn external(mut self) -> Self {
        self.external = true;
        self
    }

    pub fn if_not_exists(mut self) -> Self {
        self.if_not_exists = true;
        self
    }

    pub fn format<S: Into<String>>(mut self, format: S) -> Self {
        self.format = format.into();
        self
    }

    pub fn path<S: Into<String>>(mut self, path: S) -> Self {
        self.path = Some(path.into());
        self
    }
}

impl Ready<CreateTableAs> for CreateTableAsBuilder {
    type Error = Error;

    fn try_build(self) -> Result<CreateTableAs> {
        let format = self.format.parse()?;
        log::debug!("create table {} stored as {}", self.name, format);
        Ok(CreateTableAs {
            name: self.name,
            database: self.database,
            select: self.select,
            external: self.external,
            if_not_exists: self.if_not_exists,
            format,
            path: self.path,
        })
    }
}

/// `CREATE TABLE name (columns...)`
#[derive(Clone, Debug, PartialEq)]
pub struct CreateTableWithSchema {
    name: String,
    database: Option<String>,
    schema: Schema,
    external: bool,
    if_not_exists: bool,
    path: Option<String>,
}

impl CreateTableWithSchema {
    pub fn new<S: Into<String>>(name: S, schema: Schema) -> Self {
        CreateTableWithSchema {
            name: name.into(),
            database: None,
            schema,
            external: false,
            if_not_exists: false,
            path: None,
        }
    }

    pub fn database<S: Into<String>>(mut self, database: S) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn external(mut self) -> Self {
        self.external = true;
        self
    }

    pub fn if_not_exists(mut self) -> Self {
        self.if_not_exists = true;
        self
    }

    pub fn path<S: Into<String>>(mut self, path: S) -> Self {
        self.path = Some(path.into());
        self
    }
}

impl Ddl for CreateTableWithSchema {
    fn compile(&self) -> Result<String> {
        Ok(format!(
            "{}\n{}{}",
            create_line(
                self.external,
                self.if_not_exists,
                &scoped_name(self.database.as_deref(), &self.name)
            ),
            columns(&self.schema),
            location(self.path.as_deref())
        ))
    }
}

/// Where a Parquet table takes its columns from
#[derive(Clone, Debug, PartialEq)]
pub enum ParquetSource {
    /// An existing Parquet file
    File(String),
    /// An existing table
    Table {
        name: String,
        database: Option<String>,
    },
    Schema(Schema),
}

/// An external Parquet table over existing files
#[derive(Clone, Debug, PartialEq)]
pub struct CreateTableParquet {
    name: String,
    database: Option<String>,
    path: String,
    source: ParquetSource,
    external: bool,
    if_not_exists: bool,
}

impl CreateTableParquet {
    pub fn new<S: Into<String>, P: Into<String>>(name: S, path: P, source: ParquetSource) -> Self {
        CreateTableParquet {
            name: name.into(),
            database: None,
            path: path.into(),
            source,
            external: true,
            if_not_exists: false,
        }
    }

    pub fn database<S: Into<String>>(mut self, database: S) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn managed(mut self) -> Self {
        self.external = false;
        self
    }

    pub fn if_not_exists(mut self) -> Self {
        self.if_not_exists = true;
        self
    }
}

impl Ddl for CreateTableParquet {
    fn compile(&self) -> Result<String> {
        let source = match &self.source {
            ParquetSource::File(file) => format!("LIKE PARQUET {}", string_literal(file)),
            ParquetSource::Table { name, database } => {
                format!("LIKE {}", scoped_name(database.as_deref(), name))
            }
            ParquetSource::Schema(schema) => columns(schema),
        };
        Ok(format!(
            "{}\n{}\nSTORED AS {}{}",
            create_line(
                self.external,
                self.if_not_exists,
                &scoped_name(self.database.as_deref(), &self.name)
            ),
            source,
            Format::Parquet,
            location(Some(&self.path))
        ))
    }
}

/// An external table over delimited text files
#[derive(Clone, Debug, PartialEq)]
pub struct CreateTableDelimited {
    name: String,
    database: Option<String>,
    path: String,
    schema: Schema,
    delimiter: String,
    escape: Option<String>,
    line_terminator: Option<String>,
    external: bool,
    if_not_exists: bool,
}

impl CreateTableDelimited {
    pub fn new<S: Into<String>, P: Into<String>>(name: S, path: P, schema: Schema) -> Self {
        CreateTableDelimited {
            name: name.into(),
            database: None,
            path: path.into(),
            schema,
            delimiter: ",".to_string(),
            escape: None,
            line_terminator: None,
            external: true,
            if_not_exists: false,
        }
    }

    pub fn database<S: Into<String>>(mut self, database: S) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn delimiter<S: Into<String>>(mut self, delimiter: S) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    pub fn escape<S: Into<String>>(mut self, escape: S) -> Self {
        self.escape = Some(escape.into());
        self
    }

    pub fn line_terminator<S: Into<String>>(mut self, line_terminator: S) -> Self {
        self.line_terminator = Some(line_terminator.into());
        self
    }

    pub fn if_not_exists(mut self) -> Self {
        self.if_not_exists = true;
        self
    }
}

impl Ddl for CreateTableDelimited {
    fn compile(&self) -> Result<String> {
        let mut lines = vec![
            create_line(
                self.external,
                self.if_not_exists,
                &scoped_name(self.database.as_deref(), &self.name),
            ),
            columns(&self.schema),
            "ROW FORMAT DELIMITED".to_string(),
            format!("FIELDS TERMINATED BY '{}'", self.delimiter),
        ];
        // terminators are written verbatim
        if let Some(escape) = &self.escape {
            lines.push(format!("ESCAPED BY '{}'", escape));
        }
        if let Some(line_terminator) = &self.line_terminator {
            lines.push(format!("LINES TERMINATED BY '{}'", line_terminator));
        }
        lines.push(format!("LOCATION {}", string_literal(&self.path)));
        Ok(lines.join("\n"))
    }
}

/// An external table over Avro files, described by their Avro schema
#[derive(Clone, Debug, PartialEq)]
pub struct CreateTableAvro {
    name: String,
    database: Option<String>,
    path: String,
    avro_schema: Json,
    external: bool,
    if_not_exists: bool,
}

impl CreateTableAvro {
    pub fn new<S: Into<String>, P: Into<String>>(name: S, path: P, avro_schema: Json) -> Self {
        CreateTableAvro {
            name: name.into(),
            database: None,
            path: path.into(),
            avro_schema,
            external: true,
            if_not_exists: false,
        }
    }

    pub fn database<S: Into<String>>(mut self, database: S) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn if_not_exists(mut self) -> Self {
        self.if_not_exists = true;
        self
    }
}

impl Ddl for CreateTableAvro {
    fn compile(&self) -> Result<String> {
        // object keys come out sorted
        let literal = serde_json::to_string_pretty(&self.avro_schema)?;
        Ok(format!(
            "{}\nSTORED AS {}{}\nTBLPROPERTIES ('avro.schema.literal'='{}')",
            create_line(
                self.external,
                self.if_not_exists,
                &scoped_name(self.database.as_deref(), &self.name)
            ),
            Format::Avro,
            location(Some(&self.path)),
            literal
        ))
    }
}
