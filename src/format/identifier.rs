//! Identifier quoting
//!
//! Column names are always back-quoted, table names only when Impala would read them as
//! a keyword or when they contain a space.
use sqlparser::ast::Ident;

pub const QUOTE: char = '`';

/// Words Impala reserves
pub const RESERVED: &[&str] = &[
    "add", "aggregate", "all", "alter", "and", "api_version", "as", "asc", "avro", "between",
    "bigint", "binary", "boolean", "by", "cached", "case", "cast", "change", "char", "class",
    "close_fn", "column", "columns", "comment", "compute", "create", "cross", "data",
    "database", "databases", "date", "datetime", "decimal", "delimited", "desc", "describe",
    "distinct", "div", "double", "drop", "else", "end", "escaped", "exists", "explain",
    "external", "false", "fields", "fileformat", "finalize_fn", "first", "float", "format",
    "formatted", "from", "full", "function", "functions", "group", "having", "if", "in",
    "incremental", "init_fn", "inner", "inpath", "insert", "int", "integer", "intermediate",
    "interval", "into", "invalidate", "is", "join", "last", "left", "like", "limit", "lines",
    "load", "location", "merge_fn", "metadata", "not", "null", "nulls", "offset", "on", "or",
    "order", "outer", "overwrite", "parquet", "parquetfile", "partition", "partitioned",
    "partitions", "prepare_fn", "produced", "rcfile", "real", "refresh", "regexp", "rename",
    "replace", "returns", "right", "rlike", "row", "schema", "schemas", "select", "semi",
    "sequencefile", "serdeproperties", "serialize_fn", "set", "show", "smallint", "stats",
    "stored", "straight_join", "string", "symbol", "table", "tables", "tblproperties",
    "terminated", "textfile", "then", "timestamp", "tinyint", "to", "true", "uncached",
    "union", "update_fn", "use", "using", "values", "view", "when", "where", "with",
];

pub fn is_reserved(name: &str) -> bool {
    RESERVED.contains(&name.to_lowercase().as_str())
}

pub fn quoted(name: &str) -> String {
    Ident::with_quote(QUOTE, name).to_string()
}

/// Quote when forced, when the name is a keyword or when it holds a space
pub fn quote_identifier(name: &str, force: bool) -> String {
    if force || name.contains(' ') || is_reserved(name) {
        quoted(name)
    } else {
        name.to_string()
    }
}

/// `database.name`, the name quoted as needed
pub fn table_name(database: Option<&str>, name: &str, force: bool) -> String {
    match database {
        Some(database) => format!("{}.{}", database, quote_identifier(name, force)),
        None => quote_identifier(name, force),
    }
}
