use chrono::NaiveDate;
use colored::Colorize;
use impala_compiler::{
    build_ast,
    ddl::{CreateTableAs, Ddl, InsertSelect},
    expr::{
        builder::TableBuilder,
        schema::Schema,
        SortKey, TimeUnit,
    },
    setup,
    statement::result::{Handler, Output, ResultSet},
    to_sql, DataType, Error, Graph, NodeId, Ready, Value,
};

fn star1(graph: &mut Graph) -> NodeId {
    graph.table(
        "star1",
        Schema::from([
            ("c", DataType::Int32),
            ("f", DataType::Double),
            ("foo_id", DataType::String),
            ("bar_id", DataType::String),
        ]),
    )
}

fn star2(graph: &mut Graph) -> NodeId {
    graph.table(
        "star2",
        Schema::from([
            ("foo_id", DataType::String),
            ("value1", DataType::Double),
            ("value3", DataType::Double),
        ]),
    )
}

fn star3(graph: &mut Graph) -> NodeId {
    graph.table(
        "star3",
        Schema::from([("bar_id", DataType::String), ("value2", DataType::Double)]),
    )
}

fn alltypes(graph: &mut Graph) -> NodeId {
    graph.table(
        "alltypes",
        Schema::from([
            ("a", DataType::Int8),
            ("b", DataType::Int16),
            ("c", DataType::Int32),
            ("d", DataType::Int64),
            ("e", DataType::Float),
            ("f", DataType::Double),
            ("g", DataType::String),
            ("h", DataType::Boolean),
        ]),
    )
}

fn functional_alltypes(graph: &mut Graph) -> NodeId {
    graph.table(
        "functional_alltypes",
        Schema::from([
            ("id", DataType::Int32),
            ("bool_col", DataType::Boolean),
            ("smallint_col", DataType::Int16),
            ("int_col", DataType::Int32),
            ("bigint_col", DataType::Int64),
            ("float_col", DataType::Float),
            ("double_col", DataType::Double),
            ("string_col", DataType::String),
            ("timestamp_col", DataType::Timestamp),
        ]),
    )
}

fn assert_sql(graph: &Graph, root: NodeId, expected: &str) {
    setup::init_test();
    let sql = to_sql(graph, root).unwrap();
    println!("{}\n{}", "Compiled".green(), sql.yellow());
    assert_eq!(sql, expected);
}

#[test]
fn test_sort_by() {
    let mut graph = Graph::new();
    let table = star1(&mut graph);
    let f = graph.column(table, "f").unwrap();
    let c = graph.column(table, "c").unwrap();
    let ascending = graph.sort_by(table, vec![SortKey::asc(f)]);
    assert_sql(&graph, ascending, "SELECT *\nFROM star1\nORDER BY `f`");
    let descending = graph.sort_by(table, vec![SortKey::desc(f)]);
    assert_sql(&graph, descending, "SELECT *\nFROM star1\nORDER BY `f` DESC");
    let both = graph.sort_by(table, vec![SortKey::asc(c), SortKey::desc(f)]);
    assert_sql(&graph, both, "SELECT *\nFROM star1\nORDER BY `c`, `f` DESC");
}

#[test]
fn test_projection_of_sorted_table() {
    let mut graph = Graph::new();
    let table = star1(&mut graph);
    let f = graph.column(table, "f").unwrap();
    let c = graph.column(table, "c").unwrap();
    let sorted = graph.sort_by(table, vec![SortKey::asc(f)]);
    let projection = graph.projection(sorted, vec![c, f]);
    assert_sql(&graph, projection, "SELECT `c`, `f`\nFROM star1\nORDER BY `f`");

    // Columns taken from the sorted table itself
    let sorted_c = graph.column(sorted, "c").unwrap();
    let projection = graph.projection(sorted, vec![sorted_c]);
    assert_sql(&graph, projection, "SELECT `c`\nFROM star1\nORDER BY `f`");

    let limited = graph.limit(projection, 10, 0);
    assert_sql(
        &graph,
        limited,
        "SELECT `c`\nFROM star1\nORDER BY `f`\nLIMIT 10",
    );

    // The outer ordering wins
    let resorted = graph.sort_by(projection, vec![SortKey::desc(c)]);
    assert_sql(&graph, resorted, "SELECT `c`\nFROM star1\nORDER BY `c` DESC");
}

#[test]
fn test_limit() {
    let mut graph = Graph::new();
    let table = star1(&mut graph);
    let limited = graph.limit(table, 10, 0);
    assert_sql(&graph, limited, "SELECT *\nFROM star1\nLIMIT 10");
    let offset = graph.limit(table, 10, 5);
    assert_sql(&graph, offset, "SELECT *\nFROM star1\nLIMIT 10 OFFSET 5");
    let inner = graph.limit(table, 20, 0);
    let twice = graph.limit(inner, 10, 0);
    assert_sql(&graph, twice, "SELECT *\nFROM star1\nLIMIT 10");
}

#[test]
fn test_limit_and_filter() {
    let mut graph = Graph::new();
    let table = star1(&mut graph);
    let f = graph.column(table, "f").unwrap();
    let zero = graph.literal(0);
    let positive = graph.gt(f, zero);
    let filtered = graph.filter(table, vec![positive]);
    let filter_then_limit = graph.limit(filtered, 10, 0);
    assert_sql(
        &graph,
        filter_then_limit,
        "SELECT *\nFROM star1\nWHERE `f` > 0\nLIMIT 10",
    );

    let limited = graph.limit(table, 10, 0);
    let f = graph.column(limited, "f").unwrap();
    let positive = graph.gt(f, zero);
    let limit_then_filter = graph.filter(limited, vec![positive]);
    assert_sql(
        &graph,
        limit_then_filter,
        "SELECT *\nFROM (\n  SELECT *\n  FROM star1\n  LIMIT 10\n) t0\nWHERE `f` > 0",
    );
}

#[test]
fn test_joins() {
    let mut graph = Graph::new();
    let left = star1(&mut graph);
    let right = star2(&mut graph);
    let left_key = graph.column(left, "foo_id").unwrap();
    let right_key = graph.column(right, "foo_id").unwrap();
    let predicate = graph.eq(left_key, right_key);
    let on = "FROM star1 t0\n  {} star2 t1\n    ON t0.`foo_id` = t1.`foo_id`";
    for (keyword, join) in [
        ("INNER JOIN", graph.inner_join(left, right, vec![predicate])),
        ("LEFT OUTER JOIN", graph.left_join(left, right, vec![predicate])),
        ("LEFT SEMI JOIN", graph.semi_join(left, right, vec![predicate])),
        ("LEFT ANTI JOIN", graph.anti_join(left, right, vec![predicate])),
    ] {
        let projection = graph.projection(join, vec![left]);
        assert_sql(
            &graph,
            projection,
            &format!("SELECT t0.*\n{}", on.replace("{}", keyword)),
        );
    }
    let cross = graph.cross_join(left, right);
    let projection = graph.projection(cross, vec![left]);
    assert_sql(
        &graph,
        projection,
        "SELECT t0.*\nFROM star1 t0\n  CROSS JOIN star2 t1",
    );
    // Any join without predicates is a cross join
    for join in [
        graph.inner_join(left, right, vec![]),
        graph.left_join(left, right, vec![]),
        graph.outer_join(left, right, vec![]),
    ] {
        let projection = graph.projection(join, vec![left]);
        assert_sql(
            &graph,
            projection,
            "SELECT t0.*\nFROM star1 t0\n  CROSS JOIN star2 t1",
        );
    }
}

#[test]
fn test_ambiguous_join_column() {
    let mut graph = Graph::new();
    let left = star1(&mut graph);
    let right = star2(&mut graph);
    let joined = graph.left_join(left, right, vec![]);
    let err = Error::from(graph.column(joined, "foo_id").unwrap_err());
    println!("{}", err);
    assert!(matches!(err, Error::AmbiguousReference(_)));
    // Qualifying through the side is fine
    let foo_id = graph.column(left, "foo_id").unwrap();
    let value1 = graph.column(joined, "value1").unwrap();
    let projection = graph.projection(joined, vec![foo_id, value1]);
    assert_sql(
        &graph,
        projection,
        "SELECT t0.`foo_id`, t1.`value1`\nFROM star1 t0\n  CROSS JOIN star2 t1",
    );
}

#[test]
fn test_filtered_join_operand_is_hoisted() {
    let mut graph = Graph::new();
    let table = star1(&mut graph);
    let other = star2(&mut graph);
    let f = graph.column(table, "f").unwrap();
    let zero = graph.literal(0);
    let positive = graph.gt(f, zero);
    let filtered = graph.filter(table, vec![positive]);
    let left_key = graph.column(filtered, "foo_id").unwrap();
    let right_key = graph.column(other, "foo_id").unwrap();
    let predicate = graph.eq(left_key, right_key);
    let joined = graph.inner_join(filtered, other, vec![predicate]);
    let value1 = graph.column(other, "value1").unwrap();
    let projection = graph.projection(joined, vec![filtered, value1]);

    let statement = build_ast(&graph, projection).unwrap();
    let select = statement.select();
    assert_eq!(select.select_set.len(), 2);
    assert_eq!(select.predicates.len(), 1);
    // The filter is the one of the operand, unchanged
    assert!(statement.graph().equals(select.predicates[0], positive));
    assert_eq!(select.predicates[0], positive);
    assert_sql(
        &graph,
        projection,
        "SELECT t0.*, t1.`value1`
FROM star1 t0
  INNER JOIN star2 t1
    ON t0.`foo_id` = t1.`foo_id`
WHERE t0.`f` > 0",
    );

    let f = graph.column(filtered, "f").unwrap();
    let sum = graph.sum(f);
    let total = graph.alias(sum, "total");
    let aggregation = graph.aggregate(joined, vec![left_key], vec![total]);
    let statement = build_ast(&graph, aggregation).unwrap();
    let select = statement.select();
    assert_eq!(select.predicates.len(), 1);
    assert!(statement.graph().equals(select.predicates[0], positive));
    assert_sql(
        &graph,
        aggregation,
        "SELECT t0.`foo_id`, sum(t0.`f`) AS `total`
FROM star1 t0
  INNER JOIN star2 t1
    ON t0.`foo_id` = t1.`foo_id`
WHERE t0.`f` > 0
GROUP BY 1",
    );
}

#[test]
fn test_multiple_joins() {
    let mut graph = Graph::new();
    let t1 = star1(&mut graph);
    let t2 = star2(&mut graph);
    let t3 = star3(&mut graph);
    let a = graph.column(t1, "foo_id").unwrap();
    let b = graph.column(t2, "foo_id").unwrap();
    let pred_a = graph.eq(a, b);
    let a = graph.column(t1, "bar_id").unwrap();
    let b = graph.column(t3, "bar_id").unwrap();
    let pred_b = graph.eq(a, b);
    let left = graph.left_join(t1, t2, vec![pred_a]);
    let joined = graph.inner_join(left, t3, vec![pred_b]);
    let value1 = graph.column(t2, "value1").unwrap();
    let value2 = graph.column(t3, "value2").unwrap();
    let projection = graph.projection(joined, vec![t1, value1, value2]);
    assert_sql(
        &graph,
        projection,
        "SELECT t0.*, t1.`value1`, t2.`value2`
FROM star1 t0
  LEFT OUTER JOIN star2 t1
    ON t0.`foo_id` = t1.`foo_id`
  INNER JOIN star3 t2
    ON t0.`bar_id` = t2.`bar_id`",
    );
}

#[test]
fn test_join_with_limited_table() {
    let mut graph = Graph::new();
    let t1 = star1(&mut graph);
    let t2 = star2(&mut graph);
    let limited = graph.limit(t1, 100, 0);
    let a = graph.column(limited, "foo_id").unwrap();
    let b = graph.column(t2, "foo_id").unwrap();
    let predicate = graph.eq(a, b);
    let joined = graph.inner_join(limited, t2, vec![predicate]);
    let projection = graph.projection(joined, vec![limited]);
    assert_sql(
        &graph,
        projection,
        "SELECT t0.*
FROM (
  SELECT *
  FROM star1
  LIMIT 100
) t0
  INNER JOIN star2 t1
    ON t0.`foo_id` = t1.`foo_id`",
    );
}

#[test]
fn test_where_with_join() {
    let mut graph = Graph::new();
    let t1 = star1(&mut graph);
    let t2 = star2(&mut graph);
    let a = graph.column(t1, "foo_id").unwrap();
    let b = graph.column(t2, "foo_id").unwrap();
    let predicate = graph.eq(a, b);
    let joined = graph.inner_join(t1, t2, vec![predicate]);
    let value1 = graph.column(t2, "value1").unwrap();
    let value3 = graph.column(t2, "value3").unwrap();
    let projection = graph.projection(joined, vec![t1, value1, value3]);
    let f = graph.column(t1, "f").unwrap();
    let zero = graph.literal(0);
    let positive = graph.gt(f, zero);
    let thousand = graph.literal(1000);
    let small = graph.lt(value3, thousand);
    let filtered = graph.filter(projection, vec![positive, small]);
    assert_sql(
        &graph,
        filtered,
        "SELECT t0.*, t1.`value1`, t1.`value3`
FROM star1 t0
  INNER JOIN star2 t1
    ON t0.`foo_id` = t1.`foo_id`
WHERE t0.`f` > 0 AND
      t1.`value3` < 1000",
    );
}

#[test]
fn test_scalar_roots() {
    let mut graph = Graph::new();
    let table = alltypes(&mut graph);
    let c = graph.column(table, "c").unwrap();
    let zero = graph.literal(0);
    let positive = graph.gt(c, zero);
    let filtered = graph.filter(table, vec![positive]);
    let f = graph.column(filtered, "f").unwrap();
    let total = graph.sum(f);
    assert_sql(
        &graph,
        total,
        "SELECT sum(`f`) AS `tmp`\nFROM alltypes\nWHERE `c` > 0",
    );
    assert_eq!(build_ast(&graph, total).unwrap().result_handler(), &Handler::Scalar);

    let now = graph.now();
    assert_sql(&graph, now, "SELECT now() AS `tmp`");
    let one = graph.literal(1);
    let two = graph.literal(2);
    let sum = graph.add(one, two);
    assert_sql(&graph, sum, "SELECT 1 + 2 AS `tmp`");

    let a = graph.alias(one, "a");
    let b = graph.alias(now, "b");
    let ln = graph.ln(two);
    let c = graph.alias(ln, "c");
    let list = graph.expr_list(vec![a, b, c]);
    assert_sql(&graph, list, "SELECT 1 AS `a`, now() AS `b`, ln(2) AS `c`");
}

#[test]
fn test_aggregate_with_having() {
    let mut graph = Graph::new();
    let table = star1(&mut graph);
    let key = graph.column(table, "foo_id").unwrap();
    let f = graph.column(table, "f").unwrap();
    let sum = graph.sum(f);
    let total = graph.alias(sum, "total");
    let aggregation = graph.aggregate(table, vec![key], vec![total]);
    assert_sql(
        &graph,
        aggregation,
        "SELECT `foo_id`, sum(`f`) AS `total`\nFROM star1\nGROUP BY 1",
    );
    let column = graph.column(aggregation, "total").unwrap();
    let ten = graph.literal(10);
    let large = graph.gt(column, ten);
    let having = graph.filter(aggregation, vec![large]);
    assert_sql(
        &graph,
        having,
        "SELECT `foo_id`, sum(`f`) AS `total`\nFROM star1\nGROUP BY 1\nHAVING sum(`f`) > 10",
    );
    let count = graph.count_star(table);
    assert_sql(&graph, count, "SELECT count(*) AS `tmp`\nFROM star1");
}

#[test]
fn test_where_clauses() {
    let mut graph = Graph::new();
    let table = star1(&mut graph);
    let f = graph.column(table, "f").unwrap();
    let c = graph.column(table, "c").unwrap();
    let zero = graph.literal(0);
    let two = graph.literal(2);
    let positive = graph.gt(f, zero);
    let double = graph.mul(f, two);
    let smaller = graph.lt(c, double);
    let filtered = graph.filter(table, vec![positive, smaller]);
    assert_sql(
        &graph,
        filtered,
        "SELECT *\nFROM star1\nWHERE `f` > 0 AND\n      `c` < (`f` * 2)",
    );

    let one = graph.literal(1);
    let between = graph.between(f, zero, one);
    let filtered = graph.filter(table, vec![between]);
    assert_sql(
        &graph,
        filtered,
        "SELECT *\nFROM star1\nWHERE `f` BETWEEN 0 AND 1",
    );
}

#[test]
fn test_timestamp_arithmetic() {
    let mut graph = Graph::new();
    let table = functional_alltypes(&mut graph);
    let timestamp = graph.column(table, "timestamp_col").unwrap();
    let start = NaiveDate::from_ymd_opt(2010, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let start = graph.literal(start);
    let months = graph.interval(TimeUnit::Month, 3);
    let later = graph.add(start, months);
    let before = graph.lt(timestamp, later);
    let now = graph.now();
    let days = graph.interval(TimeUnit::Day, 10);
    let soon = graph.add(now, days);
    let before_soon = graph.lt(timestamp, soon);
    let filtered = graph.filter(table, vec![before, before_soon]);
    let count = graph.count_star(filtered);
    assert_sql(
        &graph,
        count,
        "SELECT count(*) AS `tmp`
FROM functional_alltypes
WHERE `timestamp_col` < months_add('2010-01-01 00:00:00', 3) AND
      `timestamp_col` < days_add(now(), 10)",
    );
}

#[test]
fn test_projection_fusion() {
    let mut graph = Graph::new();
    let table = alltypes(&mut graph);
    let f = graph.column(table, "f").unwrap();
    let zero = graph.literal(0);
    let positive = graph.gt(f, zero);
    let filtered = graph.filter(table, vec![positive]);
    let a = graph.column(table, "a").unwrap();
    let b = graph.column(table, "b").unwrap();
    let sum = graph.add(a, b);
    let foo = graph.alias(sum, "foo");
    let projection = graph.projection(filtered, vec![table, foo]);

    let g = graph.column(projection, "g").unwrap();
    let bar = graph.literal("bar");
    let is_bar = graph.eq(g, bar);
    let pushed = graph.filter(projection, vec![is_bar]);
    assert_sql(
        &graph,
        pushed,
        "SELECT *, `a` + `b` AS `foo`
FROM alltypes
WHERE `f` > 0 AND
      `g` = 'bar'",
    );

    let g = graph.column(pushed, "g").unwrap();
    let foo = graph.column(pushed, "foo").unwrap();
    let total = graph.sum(foo);
    let total = graph.alias(total, "foo total");
    let aggregation = graph.aggregate(pushed, vec![g], vec![total]);
    assert_sql(
        &graph,
        aggregation,
        "SELECT `g`, sum(`foo`) AS `foo total`
FROM (
  SELECT *, `a` + `b` AS `foo`
  FROM alltypes
  WHERE `f` > 0 AND
        `g` = 'bar'
) t0
GROUP BY 1",
    );
}

#[test]
fn test_filter_on_computed_column_is_not_pushed() {
    let mut graph = Graph::new();
    let table = alltypes(&mut graph);
    let f = graph.column(table, "f").unwrap();
    let zero = graph.literal(0);
    let positive = graph.gt(f, zero);
    let filtered = graph.filter(table, vec![positive]);
    let a = graph.column(table, "a").unwrap();
    let b = graph.column(table, "b").unwrap();
    let sum = graph.add(a, b);
    let foo = graph.alias(sum, "foo");
    let projection = graph.projection(filtered, vec![table, foo]);

    let foo = graph.column(projection, "foo").unwrap();
    let ten = graph.literal(10);
    let small = graph.lt(foo, ten);
    let refiltered = graph.filter(projection, vec![small]);
    let g = graph.column(refiltered, "g").unwrap();
    let foo = graph.column(refiltered, "foo").unwrap();
    let total = graph.sum(foo);
    let total = graph.alias(total, "foo total");
    let aggregation = graph.aggregate(refiltered, vec![g], vec![total]);
    assert_sql(
        &graph,
        aggregation,
        "SELECT t0.`g`, sum(t0.`foo`) AS `foo total`
FROM (
  SELECT *, `a` + `b` AS `foo`
  FROM alltypes
  WHERE `f` > 0
) t0
WHERE t0.`foo` < 10
GROUP BY 1",
    );
}

#[test]
fn test_double_nested_aggregation() {
    let mut graph = Graph::new();
    let table = graph.table(
        "foo_table",
        Schema::from([
            ("key1", DataType::String),
            ("key2", DataType::String),
            ("key3", DataType::String),
            ("value", DataType::Double),
        ]),
    );
    let aggregate = |graph: &mut Graph, input: NodeId, keys: &[&str], value: &str| {
        let by = keys
            .iter()
            .map(|key| graph.column(input, key).unwrap())
            .collect();
        let column = graph.column(input, value).unwrap();
        let sum = graph.sum(column);
        let total = graph.alias(sum, "total");
        graph.aggregate(input, by, vec![total])
    };
    let first = aggregate(&mut graph, table, &["key1", "key2", "key3"], "value");
    let second = aggregate(&mut graph, first, &["key1", "key2"], "total");
    let third = aggregate(&mut graph, second, &["key1"], "total");
    assert_sql(
        &graph,
        third,
        "SELECT `key1`, sum(`total`) AS `total`
FROM (
  SELECT `key1`, `key2`, sum(`total`) AS `total`
  FROM (
    SELECT `key1`, `key2`, `key3`, sum(`value`) AS `total`
    FROM foo_table
    GROUP BY 1, 2, 3
  ) t1
  GROUP BY 1, 2
) t0
GROUP BY 1",
    );
}

#[test]
fn test_sort_over_limited_aggregation() {
    let mut graph = Graph::new();
    let table = functional_alltypes(&mut graph);
    let key = graph.column(table, "string_col").unwrap();
    let count = graph.count_star(table);
    let nrows = graph.alias(count, "nrows");
    let aggregation = graph.aggregate(table, vec![key], vec![nrows]);
    let limited = graph.limit(aggregation, 5, 0);
    let key = graph.column(limited, "string_col").unwrap();
    let sorted = graph.sort_by(limited, vec![SortKey::asc(key)]);
    assert_sql(
        &graph,
        sorted,
        "SELECT *
FROM (
  SELECT `string_col`, count(*) AS `nrows`
  FROM functional_alltypes
  GROUP BY 1
  LIMIT 5
) t0
ORDER BY `string_col`",
    );
}

#[test]
fn test_self_join_becomes_cte() {
    let mut graph = Graph::new();
    let table = alltypes(&mut graph);
    let by = ["g", "a", "b"]
        .iter()
        .map(|key| graph.column(table, key).unwrap())
        .collect();
    let f = graph.column(table, "f").unwrap();
    let sum = graph.sum(f);
    let total = graph.alias(sum, "total");
    let aggregation = graph.aggregate(table, by, vec![total]);
    let view = graph.view(aggregation);

    let a = graph.column(aggregation, "a").unwrap();
    let b = graph.column(view, "b").unwrap();
    let predicate = graph.eq(a, b);
    let joined = graph.inner_join(aggregation, view, vec![predicate]);
    let left_total = graph.column(aggregation, "total").unwrap();
    let right_total = graph.column(view, "total").unwrap();
    let difference = graph.sub(left_total, right_total);
    let max = graph.max(difference);
    let metric = graph.alias(max, "metric");
    let g = graph.column(aggregation, "g").unwrap();
    let reaggregated = graph.aggregate(joined, vec![g], vec![metric]);
    let statement = build_ast(&graph, reaggregated).unwrap();
    assert_eq!(statement.ctes().len(), 1);
    let sql = statement.compile().unwrap();
    println!("{}", sql.yellow());
    assert_eq!(
        sql,
        "WITH t0 AS (
  SELECT `g`, `a`, `b`, sum(`f`) AS `total`
  FROM alltypes
  GROUP BY 1, 2, 3
)
SELECT t0.`g`, max(t0.`total` - t1.`total`) AS `metric`
FROM t0
  INNER JOIN t0 t1
    ON t0.`a` = t1.`b`
GROUP BY 1"
    );
}

/// Orders above the mean amount of their region, over a four way join
fn regional_outliers(graph: &mut Graph) -> NodeId {
    let region = graph.table(
        "tpch_region",
        Schema::from([("r_regionkey", DataType::Int32), ("r_name", DataType::String)]),
    );
    let nation = graph.table(
        "tpch_nation",
        Schema::from([("n_nationkey", DataType::Int32), ("n_regionkey", DataType::Int32)]),
    );
    let customer = graph.table(
        "tpch_customer",
        Schema::from([
            ("c_custkey", DataType::Int64),
            ("c_name", DataType::String),
            ("c_nationkey", DataType::Int32),
        ]),
    );
    let orders = graph.table(
        "tpch_orders",
        Schema::from([
            ("o_custkey", DataType::Int64),
            ("o_totalprice", DataType::Double),
        ]),
    );
    let a = graph.column(region, "r_regionkey").unwrap();
    let b = graph.column(nation, "n_regionkey").unwrap();
    let on = graph.eq(a, b);
    let joined = graph.inner_join(region, nation, vec![on]);
    let a = graph.column(customer, "c_nationkey").unwrap();
    let b = graph.column(nation, "n_nationkey").unwrap();
    let on = graph.eq(a, b);
    let joined = graph.inner_join(joined, customer, vec![on]);
    let a = graph.column(orders, "o_custkey").unwrap();
    let b = graph.column(customer, "c_custkey").unwrap();
    let on = graph.eq(a, b);
    let joined = graph.inner_join(joined, orders, vec![on]);
    let r_name = graph.column(region, "r_name").unwrap();
    let region_name = graph.alias(r_name, "region");
    let price = graph.column(orders, "o_totalprice").unwrap();
    let amount = graph.alias(price, "amount");
    let tpch = graph.projection(joined, vec![customer, region_name, amount]);

    let t2 = graph.view(tpch);
    let inner_region = graph.column(t2, "region").unwrap();
    let outer_region = graph.column(tpch, "region").unwrap();
    let same_region = graph.eq(inner_region, outer_region);
    let neighbours = graph.filter(t2, vec![same_region]);
    let neighbour_amount = graph.column(neighbours, "amount").unwrap();
    let mean = graph.mean(neighbour_amount);
    let amount = graph.column(tpch, "amount").unwrap();
    let above = graph.gt(amount, mean);
    let filtered = graph.filter(tpch, vec![above]);
    graph.limit(filtered, 10, 0)
}

#[test]
fn test_correlated_subquery_over_cte() {
    setup::init_test();
    let mut graph = Graph::new();
    let root = regional_outliers(&mut graph);
    let statement = build_ast(&graph, root).unwrap();
    assert_eq!(statement.ctes().len(), 1);
    let sql = statement.compile().unwrap();
    println!("{}", sql.yellow());
    assert!(sql.starts_with("WITH t0 AS (\n  SELECT "));
    assert!(sql.contains("\n  FROM tpch_region t"));
    assert!(sql.contains("\n    INNER JOIN tpch_orders t"));
    assert!(sql.contains("\n)\nSELECT t0.*\nFROM t0\nWHERE t0.`amount` > (\n  SELECT avg(t"));
    assert!(sql.contains("\n  FROM t0 t"));
    assert!(sql.ends_with(".`region` = t0.`region`\n)\nLIMIT 10"));
    // The shared body is written once
    assert_eq!(sql.matches("tpch_orders").count(), 1);
}

#[test]
fn test_compilation_is_deterministic() {
    let mut graph = Graph::new();
    let root = regional_outliers(&mut graph);
    let first = to_sql(&graph, root).unwrap();
    for _ in 0..5 {
        assert_eq!(to_sql(&graph, root).unwrap(), first);
    }
    let mut rebuilt = Graph::new();
    let root = regional_outliers(&mut rebuilt);
    assert_eq!(to_sql(&rebuilt, root).unwrap(), first);
}

#[test]
fn test_topk() {
    let mut graph = Graph::new();
    let table = graph.table(
        "tbl",
        Schema::from([
            ("city", DataType::String),
            ("v1", DataType::Double),
            ("v2", DataType::Double),
        ]),
    );
    let city = graph.column(table, "city").unwrap();
    let v2 = graph.column(table, "v2").unwrap();
    let mean = graph.mean(v2);
    let topk = graph.topk(city, 10, Some(mean));
    let filtered = graph.filter(table, vec![topk]);
    assert_sql(
        &graph,
        filtered,
        "SELECT t0.*
FROM tbl t0
  LEFT SEMI JOIN (
    SELECT `city`, avg(`v2`) AS `__tmp__`
    FROM tbl
    GROUP BY 1
    ORDER BY `__tmp__` DESC
    LIMIT 10
  ) t1
    ON t0.`city` = t1.`city`",
    );
}

#[test]
fn test_scalar_and_in_subqueries() {
    let mut graph = Graph::new();
    let table = star1(&mut graph);
    let f = graph.column(table, "f").unwrap();
    let mean = graph.mean(f);
    let above = graph.gt(f, mean);
    let filtered = graph.filter(table, vec![above]);
    assert_sql(
        &graph,
        filtered,
        "SELECT *\nFROM star1\nWHERE `f` > (\n  SELECT avg(`f`) AS `tmp`\n  FROM star1\n)",
    );

    let foo = graph.table(
        "foo",
        Schema::from([("job", DataType::String), ("y", DataType::Double)]),
    );
    let bar = graph.table("bar", Schema::from([("job", DataType::String)]));
    let job = graph.column(foo, "job").unwrap();
    let jobs = graph.column(bar, "job").unwrap();
    let isin = graph.isin_column(job, jobs).unwrap();
    let filtered = graph.filter(foo, vec![isin]);
    assert_sql(
        &graph,
        filtered,
        "SELECT *\nFROM foo\nWHERE `job` IN (\n  SELECT `job`\n  FROM bar\n)",
    );
}

#[test]
fn test_correlated_subquery() {
    let mut graph = Graph::new();
    let t1 = graph.table(
        "foo",
        Schema::from([("dept_id", DataType::String), ("y", DataType::Double)]),
    );
    let t2 = graph.view(t1);
    let outer = graph.column(t1, "dept_id").unwrap();
    let inner = graph.column(t2, "dept_id").unwrap();
    let same_dept = graph.eq(outer, inner);
    let colleagues = graph.filter(t2, vec![same_dept]);
    let y = graph.column(colleagues, "y").unwrap();
    let mean = graph.mean(y);
    let y = graph.column(t1, "y").unwrap();
    let above = graph.gt(y, mean);
    let filtered = graph.filter(t1, vec![above]);
    assert_sql(
        &graph,
        filtered,
        "SELECT t0.*
FROM foo t0
WHERE t0.`y` > (
  SELECT avg(t1.`y`) AS `tmp`
  FROM foo t1
  WHERE t0.`dept_id` = t1.`dept_id`
)",
    );
}

#[test]
fn test_exists() {
    let mut graph = Graph::new();
    let foo = graph.table(
        "foo",
        Schema::from([("key1", DataType::String), ("value", DataType::Double)]),
    );
    let bar = graph.table("bar", Schema::from([("key1", DataType::String)]));
    let left = graph.column(foo, "key1").unwrap();
    let right = graph.column(bar, "key1").unwrap();
    let matching = graph.eq(left, right);
    let any = graph.any(matching);
    let filtered = graph.filter(foo, vec![any]);
    assert_sql(
        &graph,
        filtered,
        "SELECT t0.*
FROM foo t0
WHERE EXISTS (
  SELECT 1
  FROM bar t1
  WHERE t0.`key1` = t1.`key1`
)",
    );
    let none = graph.not(any);
    let filtered = graph.filter(foo, vec![none]);
    let sql = to_sql(&graph, filtered).unwrap();
    println!("{}", sql.yellow());
    assert!(sql.contains("WHERE NOT EXISTS (\n"));
}

#[test]
fn test_union() {
    let mut graph = Graph::new();
    let table = functional_alltypes(&mut graph);
    let int_col = graph.column(table, "int_col").unwrap();
    let zero = graph.literal(0);
    let positive = graph.gt(int_col, zero);
    let non_positive = graph.lt_eq(int_col, zero);
    let string_col = graph.column(table, "string_col").unwrap();
    let key = graph.alias(string_col, "key");
    let float_col = graph.column(table, "float_col").unwrap();
    let cast = graph.cast(float_col, DataType::Double);
    let value = graph.alias(cast, "value");
    let filtered = graph.filter(table, vec![positive]);
    let left = graph.projection(filtered, vec![key, value]);
    let double_col = graph.column(table, "double_col").unwrap();
    let value = graph.alias(double_col, "value");
    let filtered = graph.filter(table, vec![non_positive]);
    let right = graph.projection(filtered, vec![key, value]);

    let left_sql = "SELECT `string_col` AS `key`, CAST(`float_col` AS double) AS `value`
FROM functional_alltypes
WHERE `int_col` > 0";
    let right_sql = "SELECT `string_col` AS `key`, `double_col` AS `value`
FROM functional_alltypes
WHERE `int_col` <= 0";
    let all = graph.union(left, right, false);
    assert_sql(&graph, all, &format!("{}\nUNION ALL\n{}", left_sql, right_sql));
    let distinct = graph.union(left, right, true);
    assert_sql(&graph, distinct, &format!("{}\nUNION\n{}", left_sql, right_sql));
}

#[test]
fn test_distinct() {
    let mut graph = Graph::new();
    let table = functional_alltypes(&mut graph);
    let string_col = graph.column(table, "string_col").unwrap();
    let int_col = graph.column(table, "int_col").unwrap();
    let projection = graph.projection(table, vec![string_col, int_col]);
    let distinct = graph.distinct(projection);
    assert_sql(
        &graph,
        distinct,
        "SELECT DISTINCT `string_col`, `int_col`\nFROM functional_alltypes",
    );

    let smallint_col = graph.column(table, "smallint_col").unwrap();
    let int_card = graph.count_distinct(int_col);
    let int_card = graph.alias(int_card, "int_card");
    let smallint_card = graph.count_distinct(smallint_col);
    let smallint_card = graph.alias(smallint_card, "smallint_card");
    let aggregation = graph.aggregate(table, vec![string_col], vec![int_card, smallint_card]);
    assert_sql(
        &graph,
        aggregation,
        "SELECT `string_col`, COUNT(DISTINCT `int_col`) AS `int_card`,
       COUNT(DISTINCT `smallint_col`) AS `smallint_card`
FROM functional_alltypes
GROUP BY 1",
    );
}

#[test]
fn test_multiline_case() {
    let mut graph = Graph::new();
    let table = alltypes(&mut graph);
    let g = graph.column(table, "g").unwrap();
    let [foo, bar, baz, qux, default] =
        ["foo", "bar", "baz", "qux", "default"].map(|s| graph.literal(s));
    let simple = graph
        .case(Some(g), vec![(foo, bar), (baz, qux)], Some(default))
        .unwrap();
    let col1 = graph.alias(simple, "col1");
    let is_foo = graph.eq(g, foo);
    let is_baz = graph.eq(g, baz);
    let searched = graph.case(None, vec![(is_foo, bar), (is_baz, g)], None).unwrap();
    let col2 = graph.alias(searched, "col2");
    let projection = graph.projection(table, vec![col1, col2, table]);
    assert_sql(
        &graph,
        projection,
        "SELECT
  CASE `g`
    WHEN 'foo' THEN 'bar'
    WHEN 'baz' THEN 'qux'
    ELSE 'default'
  END AS `col1`,
  CASE
    WHEN `g` = 'foo' THEN 'bar'
    WHEN `g` = 'baz' THEN `g`
    ELSE NULL
  END AS `col2`, *
FROM alltypes",
    );
}

#[test]
fn test_reserved_identifiers() {
    let mut graph = Graph::new();
    let table = graph.table(
        "table",
        Schema::from([("date", DataType::Date), ("explain", DataType::String)]),
    );
    let date = graph.column(table, "date").unwrap();
    let explain = graph.column(table, "explain").unwrap();
    let otherwise = graph.alias(date, "else");
    let join = graph.alias(explain, "join");
    let projection = graph.projection(table, vec![otherwise, join]);
    assert_sql(
        &graph,
        projection,
        "SELECT `date` AS `else`, `explain` AS `join`\nFROM `table`",
    );
}

#[test]
fn test_unnamed_table() {
    let mut graph = Graph::new();
    let table = TableBuilder::new()
        .schema(Schema::from([("x", DataType::Int64)]))
        .build_in(&mut graph);
    let limited = graph.limit(table, 10, 0);
    let error = to_sql(&graph, limited).unwrap_err();
    println!("{}", error.to_string().red());
    assert!(matches!(error, Error::Relation(_)));
}

#[test]
fn test_result_handlers() {
    let mut graph = Graph::new();
    let table = star1(&mut graph);
    let f = graph.column(table, "f").unwrap();
    let total = graph.sum(f);
    let statement = build_ast(&graph, total).unwrap();
    let result = ResultSet::new(vec!["tmp".to_string()], vec![vec![Value::from(4.5)]]);
    assert_eq!(
        statement.result_handler().handle(result.clone()).unwrap(),
        Output::Scalar(Value::from(4.5))
    );
    let statement = build_ast(&graph, table).unwrap();
    assert_eq!(
        statement.result_handler().handle(result.clone()).unwrap(),
        Output::Table(result)
    );
}

#[test]
fn test_ddl_statements() {
    let mut graph = Graph::new();
    let table = functional_alltypes(&mut graph);
    let limited = graph.limit(table, 10, 0);
    let insert = InsertSelect::new("testing123456", build_ast(&graph, limited).unwrap()).database("foo");
    assert_eq!(
        insert.compile().unwrap(),
        "INSERT INTO foo.`testing123456`\nSELECT *\nFROM functional_alltypes\nLIMIT 10"
    );

    let overwrite = InsertSelect::new("testing123456", build_ast(&graph, limited).unwrap())
        .database("foo")
        .overwrite();
    assert_eq!(
        overwrite.compile().unwrap(),
        "INSERT OVERWRITE foo.`testing123456`\nSELECT *\nFROM functional_alltypes\nLIMIT 10"
    );

    let bigint_col = graph.column(table, "bigint_col").unwrap();
    let zero = graph.literal(0);
    let positive = graph.gt(bigint_col, zero);
    let filtered = graph.filter(table, vec![positive]);
    let create = CreateTableAs::builder("some_table", build_ast(&graph, filtered).unwrap())
        .database("bar")
        .try_build()
        .unwrap();
    assert_eq!(
        create.compile().unwrap(),
        "CREATE TABLE bar.`some_table`
STORED AS PARQUET
AS
SELECT *
FROM functional_alltypes
WHERE `bigint_col` > 0"
    );

    let create = CreateTableAs::builder("tname", build_ast(&graph, filtered).unwrap())
        .if_not_exists()
        .try_build()
        .unwrap();
    assert_eq!(
        create.compile().unwrap(),
        "CREATE TABLE IF NOT EXISTS `tname`
STORED AS PARQUET
AS
SELECT *
FROM functional_alltypes
WHERE `bigint_col` > 0"
    );

    let avro = CreateTableAs::builder("tname", build_ast(&graph, table).unwrap())
        .if_not_exists()
        .format("avro")
        .try_build()
        .unwrap();
    assert_eq!(
        avro.compile().unwrap(),
        "CREATE TABLE IF NOT EXISTS `tname`\nSTORED AS AVRO\nAS\nSELECT *\nFROM functional_alltypes"
    );

    let test1 = graph.table("test1", Schema::from([("c", DataType::Int32)]));
    let external = CreateTableAs::builder("another_table", build_ast(&graph, test1).unwrap())
        .database("foo")
        .external()
        .path("/path/to/table")
        .try_build()
        .unwrap();
    assert_eq!(
        external.compile().unwrap(),
        "CREATE EXTERNAL TABLE foo.`another_table`
STORED AS PARQUET
LOCATION '/path/to/table'
AS
SELECT *
FROM test1"
    );

    let unsupported = CreateTableAs::builder("some_table", build_ast(&graph, filtered).unwrap())
        .format("foo")
        .try_build();
    assert!(matches!(unsupported, Err(Error::UnsupportedFormat(_))));
}
