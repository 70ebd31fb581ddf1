//! Driver-neutral SQL values: what the coercer produces for binding and what row decoding yields.

use sqlx::encode::{Encode, IsNull};
use sqlx::error::BoxDynError;
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::sqlite::{Sqlite, SqliteTypeInfo};
use sqlx::{Database, Type};

/// A value that can be bound to a PostgreSQL or SQLite statement.
#[derive(Clone, Debug, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    /// Decimal digits kept as received so the database does the rounding, not us.
    Numeric(String),
    Text(String),
}

impl<'q> Encode<'q, Postgres> for SqlValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, BoxDynError> {
        match self {
            SqlValue::Null => <Option<String> as Encode<Postgres>>::encode_by_ref(&None, buf),
            SqlValue::Bool(b) => <bool as Encode<Postgres>>::encode_by_ref(b, buf),
            SqlValue::Integer(n) => <i64 as Encode<Postgres>>::encode_by_ref(n, buf),
            SqlValue::Real(n) => <f64 as Encode<Postgres>>::encode_by_ref(n, buf),
            SqlValue::Numeric(s) | SqlValue::Text(s) => <String as Encode<Postgres>>::encode_by_ref(s, buf),
        }
    }

    fn produces(&self) -> Option<PgTypeInfo> {
        Some(match self {
            SqlValue::Bool(_) => <bool as Type<Postgres>>::type_info(),
            SqlValue::Integer(_) => <i64 as Type<Postgres>>::type_info(),
            SqlValue::Real(_) => <f64 as Type<Postgres>>::type_info(),
            SqlValue::Null | SqlValue::Numeric(_) | SqlValue::Text(_) => <String as Type<Postgres>>::type_info(),
        })
    }
}

impl Type<Postgres> for SqlValue {
    fn type_info() -> PgTypeInfo {
        <String as Type<Postgres>>::type_info()
    }
}

impl<'q> Encode<'q, Sqlite> for SqlValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Sqlite as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, BoxDynError> {
        match self {
            SqlValue::Null => Ok(IsNull::Yes),
            // stored as 0/1 INTEGER
            SqlValue::Bool(b) => <i64 as Encode<Sqlite>>::encode_by_ref(&i64::from(*b), buf),
            SqlValue::Integer(n) => <i64 as Encode<Sqlite>>::encode_by_ref(n, buf),
            SqlValue::Real(n) => <f64 as Encode<Sqlite>>::encode_by_ref(n, buf),
            SqlValue::Numeric(s) => match s.parse::<f64>() {
                Ok(n) => <f64 as Encode<Sqlite>>::encode_by_ref(&n, buf),
                Err(_) => <String as Encode<Sqlite>>::encode_by_ref(s, buf),
            },
            SqlValue::Text(s) => <String as Encode<Sqlite>>::encode_by_ref(s, buf),
        }
    }
}

impl Type<Sqlite> for SqlValue {
    fn type_info() -> SqliteTypeInfo {
        <String as Type<Sqlite>>::type_info()
    }

    fn compatible(_ty: &SqliteTypeInfo) -> bool {
        true
    }
}
