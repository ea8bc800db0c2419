//! SQL text for the warehouse and staging source
//!
//! Identifiers come from validated configuration and are always quoted.

use crate::config::{CalendarConfig, DimensionConfig, DimensionStagingConfig, FactConfig, FactStagingConfig};

/// Measure columns of every fact table, in insert order
pub const FACT_MEASURE_COLUMNS: [&str; 7] = [
    "transaction_date",
    "quantity",
    "unit_price",
    "discount",
    "sales_amount",
    "cost_amount",
    "profit_amount",
];

/// Derived calendar columns, in insert order after the key and date columns
pub const CALENDAR_COLUMNS: [&str; 9] = [
    "year",
    "quarter",
    "month",
    "month_name",
    "week_of_year",
    "day_of_month",
    "day_of_week",
    "day_name",
    "is_weekend",
];

/// Quotes an identifier, keeping an optional `schema.` prefix separate
pub fn quote_ident(name: &str) -> String {
    name.split('.')
        .map(|part| format!("\"{}\"", part.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(".")
}

/// Selects versions in the layout [`super::models::version_from_row`] decodes
pub fn select_versions(dimension: &DimensionConfig, filter: VersionFilter) -> String {
    let mut sql = format!(
        "SELECT {sk}::bigint, {bk}::text, {ver}::integer, {eff}::date, {exp}::date, {cur}",
        sk = quote_ident(&dimension.surrogate_key_column),
        bk = quote_ident(&dimension.business_key_column),
        ver = quote_ident(&dimension.version_column),
        eff = quote_ident(&dimension.effective_date_column),
        exp = quote_ident(&dimension.expiry_date_column),
        cur = quote_ident(&dimension.is_current_column),
    );
    for attribute in dimension.attribute_columns() {
        sql.push_str(&format!(", to_jsonb({})", quote_ident(attribute)));
    }
    sql.push_str(&format!(" FROM {}", quote_ident(&dimension.table)));

    match filter {
        VersionFilter::All => {}
        VersionFilter::Current => sql.push_str(&format!(
            " WHERE {} = TRUE",
            quote_ident(&dimension.is_current_column)
        )),
        VersionFilter::BusinessKey => sql.push_str(&format!(
            " WHERE {}::text = $1",
            quote_ident(&dimension.business_key_column)
        )),
    }

    sql.push_str(&format!(
        " ORDER BY {}::text, {}",
        quote_ident(&dimension.business_key_column),
        quote_ident(&dimension.version_column)
    ));
    sql
}

/// Row filter for [`select_versions`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionFilter {
    All,
    Current,
    /// `$1` is the business key as text
    BusinessKey,
}

/// Business keys with history but no current version
pub fn select_keys_without_current(dimension: &DimensionConfig) -> String {
    format!(
        "SELECT {bk}::text FROM {table} GROUP BY {bk} HAVING NOT bool_or({cur}) ORDER BY 1",
        bk = quote_ident(&dimension.business_key_column),
        cur = quote_ident(&dimension.is_current_column),
        table = quote_ident(&dimension.table),
    )
}

/// Closes the current version; `$1` business key, `$2` expiry date
pub fn close_current_version(dimension: &DimensionConfig) -> String {
    format!(
        "UPDATE {table} SET {cur} = FALSE, {exp} = $2::date WHERE {bk}::text = $1 AND {cur} = TRUE",
        table = quote_ident(&dimension.table),
        cur = quote_ident(&dimension.is_current_column),
        exp = quote_ident(&dimension.expiry_date_column),
        bk = quote_ident(&dimension.business_key_column),
    )
}

/// Inserts a current version and returns its surrogate key
///
/// `$1` business key, `$2` version, `$3` effective date, `$4` expiry date,
/// then one parameter per attribute.
pub fn insert_version(dimension: &DimensionConfig) -> String {
    let mut columns = vec![
        quote_ident(&dimension.business_key_column),
        quote_ident(&dimension.version_column),
        quote_ident(&dimension.effective_date_column),
        quote_ident(&dimension.expiry_date_column),
        quote_ident(&dimension.is_current_column),
    ];
    let mut values = vec![
        "$1".to_string(),
        "$2::integer".to_string(),
        "$3::date".to_string(),
        "$4::date".to_string(),
        "TRUE".to_string(),
    ];
    for (index, attribute) in dimension.attribute_columns().enumerate() {
        columns.push(quote_ident(attribute));
        values.push(format!("${}", index + 5));
    }

    format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}::bigint",
        quote_ident(&dimension.table),
        columns.join(", "),
        values.join(", "),
        quote_ident(&dimension.surrogate_key_column)
    )
}

/// Natural keys already loaded; `$1` is a `text[]` of candidate keys
pub fn select_existing_transaction_keys(fact: &FactConfig) -> String {
    format!(
        "SELECT {nk}::text FROM {table} WHERE {nk}::text = ANY($1::text[])",
        nk = quote_ident(&fact.natural_key_column),
        table = quote_ident(&fact.table),
    )
}

/// Number of parameters per fact row
pub fn fact_row_width(fact: &FactConfig) -> usize {
    // natural key + foreign keys + date key + measures
    1 + fact.dimensions.len() + 1 + FACT_MEASURE_COLUMNS.len()
}

/// Multi-row fact insert for `rows` rows
///
/// Per row: natural key, one `bigint` per dimension reference in
/// configuration order, the `integer` date key, then [`FACT_MEASURE_COLUMNS`].
pub fn insert_facts(fact: &FactConfig, rows: usize) -> String {
    let mut columns = vec![quote_ident(&fact.natural_key_column)];
    let mut casts = vec![""];
    for reference in &fact.dimensions {
        columns.push(quote_ident(&reference.foreign_key_column()));
        casts.push("::bigint");
    }
    columns.push(quote_ident(&fact.date_key_column));
    casts.push("::integer");
    for (column, cast) in FACT_MEASURE_COLUMNS.iter().zip([
        "::date", "::bigint", "::float8", "::float8", "::float8", "::float8", "::float8",
    ]) {
        columns.push(quote_ident(column));
        casts.push(cast);
    }

    let width = casts.len();
    let tuples: Vec<String> = (0..rows)
        .map(|row| {
            let placeholders: Vec<String> = casts
                .iter()
                .enumerate()
                .map(|(col, cast)| format!("${}{}", row * width + col + 1, cast))
                .collect();
            format!("({})", placeholders.join(", "))
        })
        .collect();

    format!(
        "INSERT INTO {} ({}) VALUES {}",
        quote_ident(&fact.table),
        columns.join(", "),
        tuples.join(", ")
    )
}

/// Calendar dates present in `[$1, $2]`
pub fn select_calendar_dates(calendar: &CalendarConfig) -> String {
    format!(
        "SELECT {date}::date FROM {table} WHERE {date} BETWEEN $1::date AND $2::date",
        date = quote_ident(&calendar.date_column),
        table = quote_ident(&calendar.table),
    )
}

/// Number of parameters per calendar row
pub const CALENDAR_ROW_WIDTH: usize = 2 + CALENDAR_COLUMNS.len();

/// Multi-row calendar insert for `rows` rows
pub fn insert_calendar_days(calendar: &CalendarConfig, rows: usize) -> String {
    let mut columns = vec![
        quote_ident(&calendar.date_key_column),
        quote_ident(&calendar.date_column),
    ];
    columns.extend(CALENDAR_COLUMNS.iter().map(|c| quote_ident(c)));

    let casts = [
        "::integer", "::date", "::integer", "::integer", "::integer", "::text", "::integer",
        "::integer", "::integer", "::text", "::boolean",
    ];
    let tuples: Vec<String> = (0..rows)
        .map(|row| {
            let placeholders: Vec<String> = casts
                .iter()
                .enumerate()
                .map(|(col, cast)| format!("${}{}", row * CALENDAR_ROW_WIDTH + col + 1, cast))
                .collect();
            format!("({})", placeholders.join(", "))
        })
        .collect();

    format!(
        "INSERT INTO {} ({}) VALUES {}",
        quote_ident(&calendar.table),
        columns.join(", "),
        tuples.join(", ")
    )
}

/// Total and current row counts of a dimension table
pub fn count_dimension_rows(dimension: &DimensionConfig) -> String {
    format!(
        "SELECT count(*)::bigint, (count(*) FILTER (WHERE {cur}))::bigint FROM {table}",
        cur = quote_ident(&dimension.is_current_column),
        table = quote_ident(&dimension.table),
    )
}

/// Total row count of a table
pub fn count_rows(table: &str) -> String {
    format!("SELECT count(*)::bigint FROM {}", quote_ident(table))
}

/// Staging snapshot: business key, as-of date (or NULL), then `to_jsonb` per attribute
pub fn select_staged_entities(dimension: &DimensionConfig, staging: &DimensionStagingConfig) -> String {
    let as_of = staging
        .as_of_column
        .as_ref()
        .map(|c| format!("{}::date", quote_ident(c)))
        .unwrap_or_else(|| "NULL::date".to_string());

    let mut sql = format!(
        "SELECT {}::text, {}",
        quote_ident(&staging.business_key_column),
        as_of
    );
    for attribute in dimension.attribute_columns() {
        sql.push_str(&format!(", to_jsonb({})", quote_ident(attribute)));
    }
    sql.push_str(&format!(
        " FROM {} ORDER BY 1",
        quote_ident(&staging.table)
    ));
    sql
}

/// Pending staging lines: natural key, one text business key per reference,
/// quantity, unit price, discount, transaction date
pub fn select_staged_transactions(fact: &FactConfig, staging: &FactStagingConfig) -> String {
    let mut columns = vec![format!("{}::text", quote_ident(&staging.natural_key_column))];
    for reference in &fact.dimensions {
        columns.push(format!("{}::text", quote_ident(&reference.source_column())));
    }
    columns.push(format!("{}::bigint", quote_ident(&staging.quantity_column)));
    columns.push(format!("{}::float8", quote_ident(&staging.unit_price_column)));
    columns.push(
        staging
            .discount_column
            .as_ref()
            .map(|c| format!("COALESCE({}, 0)::float8", quote_ident(c)))
            .unwrap_or_else(|| "0::float8".to_string()),
    );
    columns.push(format!(
        "{}::date",
        quote_ident(&staging.transaction_date_column)
    ));

    format!(
        "SELECT {} FROM {} ORDER BY 1",
        columns.join(", "),
        quote_ident(&staging.table)
    )
}
