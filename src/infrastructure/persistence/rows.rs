//! Backend-independent row decoding.

use chrono::NaiveDateTime;
use sqlx::{ColumnIndex, Database, Decode, Type};

use crate::domain::repositories::{Row, SqlValue};

/// Decodes every column of `row` into a [`SqlValue`].
///
/// Integers are tried first, then text, then timestamps. SQLite keeps
/// timestamps as text, so on that backend they come back as [`SqlValue::Text`].
pub(crate) fn decode_row<'r, R>(row: &'r R) -> Row
where
    R: sqlx::Row,
    usize: ColumnIndex<R>,
    i64: Decode<'r, R::Database> + Type<R::Database>,
    String: Decode<'r, R::Database> + Type<R::Database>,
    NaiveDateTime: Decode<'r, R::Database> + Type<R::Database>,
{
    (0..row.len()).map(|i| decode_value(row, i)).collect()
}

fn decode_value<'r, R, DB>(row: &'r R, index: usize) -> SqlValue
where
    R: sqlx::Row<Database = DB>,
    DB: Database,
    usize: ColumnIndex<R>,
    i64: Decode<'r, DB> + Type<DB>,
    String: Decode<'r, DB> + Type<DB>,
    NaiveDateTime: Decode<'r, DB> + Type<DB>,
{
    if let Ok(value) = row.try_get::<Option<i64>, _>(index) {
        return value.map_or(SqlValue::Null, |v| SqlValue::Int(Some(v)));
    }
    if let Ok(value) = row.try_get::<Option<String>, _>(index) {
        return value.map_or(SqlValue::Null, |v| SqlValue::Text(Some(v)));
    }
    if let Ok(value) = row.try_get::<Option<NaiveDateTime>, _>(index) {
        return value.map_or(SqlValue::Null, |v| SqlValue::Timestamp(Some(v)));
    }
    SqlValue::Null
}
