// SQL dialect helpers for the lakehouse engine

/// Inferred type of a seed (CSV) column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedType {
    Text,
    /// `has_decimals` when any value carries a fractional part
    Number { has_decimals: bool },
    Date,
    Time,
    DateTime,
    Boolean,
}

pub fn quote(identifier: &str) -> String {
    format!("`{}`", identifier)
}

pub fn date_function() -> &'static str {
    "current_timestamp()"
}

/// Engine column type for a seed column
pub fn convert_type(seed_type: SeedType) -> &'static str {
    match seed_type {
        SeedType::Text => "string",
        SeedType::Number { has_decimals: true } => "double",
        SeedType::Number { has_decimals: false } => "bigint",
        SeedType::Date => "date",
        SeedType::Time => "time",
        SeedType::DateTime => "timestamp",
        SeedType::Boolean => "boolean",
    }
}

/// Query returning one row: the row-count difference between two relations
/// and the number of rows present in only one of them.
///
/// Uses `cross join` rather than `from a, b` and keeps a constant `id` on
/// both sides so the engine does not reject the join as trivial.
pub fn rows_different_sql(relation_a: &str, relation_b: &str, column_names: &[String]) -> String {
    let mut names: Vec<String> = column_names.iter().map(|n| quote(n)).collect();
    names.sort();
    let columns = names.join(", ");

    format!(
        "with diff_count as (
    SELECT
        1 as id,
        COUNT(*) as num_missing FROM (
            (SELECT {columns} FROM {a} EXCEPT
             SELECT {columns} FROM {b})
             UNION ALL
            (SELECT {columns} FROM {b} EXCEPT
             SELECT {columns} FROM {a})
        ) as a
), table_a as (
    SELECT COUNT(*) as num_rows FROM {a}
), table_b as (
    SELECT COUNT(*) as num_rows FROM {b}
), row_count_diff as (
    select
        1 as id,
        table_a.num_rows - table_b.num_rows as difference
    from table_a
    cross join table_b
)
select
    row_count_diff.difference as row_count_difference,
    diff_count.num_missing as num_mismatched
from row_count_diff
cross join diff_count",
        columns = columns,
        a = relation_a,
        b = relation_b,
    )
}
