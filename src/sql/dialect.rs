//! Everything that differs between SQLite and PostgreSQL: quoting, placeholders, type names.

use crate::schema::{ColumnKind, ColumnModel};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Sqlite,
    Postgres,
}

/// Quote an identifier taken from the catalog.
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

impl Dialect {
    /// Pick the dialect from a connection string scheme.
    pub fn from_url(url: &str) -> Option<Dialect> {
        let scheme = url.split(':').next()?.to_ascii_lowercase();
        match scheme.as_str() {
            "sqlite" => Some(Dialect::Sqlite),
            "postgres" | "postgresql" => Some(Dialect::Postgres),
            _ => None,
        }
    }

    /// Placeholder for the `n`th (1-based) bound argument, cast to the column type when one is given.
    pub fn placeholder(self, n: usize, column: Option<&ColumnModel>) -> String {
        match self {
            Dialect::Sqlite => "?".to_string(),
            Dialect::Postgres => match column {
                Some(c) => format!("${}::{}", n, quoted(&c.declared_type)),
                None => format!("${}", n),
            },
        }
    }

    /// Column as it appears in a select list.
    ///
    /// PostgreSQL hands numeric, timestamp and json values back as text so precision and formatting
    /// survive the driver; the coercer turns them back into JSON.
    pub fn select_expr(self, column: &ColumnModel) -> String {
        let q = quoted(&column.name);
        match (self, column.kind) {
            (Dialect::Postgres, ColumnKind::Integer | ColumnKind::Boolean) => q,
            (Dialect::Postgres, _) => format!("{}::text AS {}", q, q),
            (Dialect::Sqlite, _) => q,
        }
    }

    /// Left-hand side of a comparison against a text argument (LIKE, json equality).
    pub fn text_expr(self, column: &ColumnModel) -> String {
        match self {
            Dialect::Postgres => format!("{}::text", quoted(&column.name)),
            Dialect::Sqlite => quoted(&column.name),
        }
    }

    /// Whether the generated key comes back through `RETURNING` rather than last-insert-id.
    pub fn returns_generated_key(self) -> bool {
        matches!(self, Dialect::Postgres)
    }

    /// Bounds of a narrow integer column. `None` when the column holds any 64-bit integer, which is
    /// always the case on SQLite.
    pub fn integer_range(self, declared: &str) -> Option<(i64, i64)> {
        if self != Dialect::Postgres {
            return None;
        }
        match base_type_name(declared).as_str() {
            "INT2" | "SMALLINT" | "SMALLSERIAL" | "SERIAL2" => Some((i16::MIN.into(), i16::MAX.into())),
            "INT4" | "INT" | "INTEGER" | "SERIAL" | "SERIAL4" => Some((i32::MIN.into(), i32::MAX.into())),
            _ => None,
        }
    }

    /// Whether bound JSON text is parsed by the database, so malformed text is refused there.
    pub fn parses_json(self) -> bool {
        matches!(self, Dialect::Postgres)
    }

    /// Whether a datetime column is zone-aware and so needs an explicit offset on bound values.
    pub fn zoned_datetime(self, declared: &str) -> bool {
        self == Dialect::Postgres
            && matches!(base_type_name(declared).as_str(), "TIMESTAMPTZ" | "TIMESTAMP WITH TIME ZONE")
    }

    /// Normalize a declared SQL type into a column kind. `None` means the type is unknown.
    pub fn column_kind(self, declared: &str) -> Option<ColumnKind> {
        let base = base_type_name(declared);
        if let Some(kind) = common_kind(&base) {
            return Some(kind);
        }
        match self {
            Dialect::Sqlite => sqlite_affinity(&base),
            Dialect::Postgres => postgres_kind(&base),
        }
    }
}

/// Upper-cased type name with any `(p,s)` modifier and array suffix removed.
fn base_type_name(declared: &str) -> String {
    static MODIFIER: OnceLock<Regex> = OnceLock::new();
    let re = MODIFIER.get_or_init(|| Regex::new(r"\s*\([^)]*\)").expect("static regex"));
    let stripped = re.replace_all(declared.trim(), "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_uppercase()
}

fn common_kind(base: &str) -> Option<ColumnKind> {
    Some(match base {
        "INT" | "INTEGER" | "TINYINT" | "SMALLINT" | "MEDIUMINT" | "BIGINT" | "UNSIGNED BIG INT" | "INT2"
        | "INT4" | "INT8" => ColumnKind::Integer,
        "REAL" | "DOUBLE" | "DOUBLE PRECISION" | "FLOAT" | "FLOAT4" | "FLOAT8" | "NUMERIC" | "DECIMAL" => {
            ColumnKind::Real
        }
        "TEXT" | "CHAR" | "CHARACTER" | "VARCHAR" | "CHARACTER VARYING" | "NCHAR" | "NVARCHAR"
        | "NATIVE CHARACTER" | "VARYING CHARACTER" | "CLOB" | "DATE" | "UUID" => ColumnKind::Text,
        "BOOL" | "BOOLEAN" => ColumnKind::Boolean,
        "DATETIME" | "TIMESTAMP" | "TIMESTAMP WITHOUT TIME ZONE" | "TIMESTAMP WITH TIME ZONE" | "TIMESTAMPTZ" => {
            ColumnKind::DateTime
        }
        "JSON" | "JSONB" => ColumnKind::Json,
        _ => return None,
    })
}

/// SQLite's own affinity rules for names outside the lookup table.
fn sqlite_affinity(base: &str) -> Option<ColumnKind> {
    if base.contains("INT") {
        Some(ColumnKind::Integer)
    } else if base.contains("CHAR") || base.contains("CLOB") || base.contains("TEXT") {
        Some(ColumnKind::Text)
    } else if base.contains("REAL") || base.contains("FLOA") || base.contains("DOUB") {
        Some(ColumnKind::Real)
    } else {
        None
    }
}

/// PostgreSQL `udt_name` values not covered by the shared table.
fn postgres_kind(base: &str) -> Option<ColumnKind> {
    Some(match base {
        "SERIAL" | "BIGSERIAL" | "SMALLSERIAL" | "SERIAL4" | "SERIAL8" | "SERIAL2" => ColumnKind::Integer,
        "MONEY" => ColumnKind::Real,
        "BPCHAR" | "NAME" | "CITEXT" => ColumnKind::Text,
        _ => return None,
    })
}
