//! Turns raw HTTP inputs (method, path, query string, body) into a [`ParsedRequest`].
//!
//! Purely syntactic: no table model is consulted here. Field names are checked against the
//! table when the query is built.

use crate::error::AppError;
use axum::http::Method;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Upper bound on rows in one bulk create.
pub const BULK_LIMIT: usize = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intent {
    List,
    GetOne,
    Create,
    Update,
    Delete,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    In,
}

impl FilterOp {
    fn parse(s: &str) -> Option<FilterOp> {
        Some(match s {
            "eq" => FilterOp::Eq,
            "ne" => FilterOp::Ne,
            "gt" => FilterOp::Gt,
            "gte" => FilterOp::Gte,
            "lt" => FilterOp::Lt,
            "lte" => FilterOp::Lte,
            "like" => FilterOp::Like,
            "in" => FilterOp::In,
            _ => return None,
        })
    }

    /// SQL comparison operator for the scalar operators.
    pub fn sql(self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Ne => "<>",
            FilterOp::Gt => ">",
            FilterOp::Gte => ">=",
            FilterOp::Lt => "<",
            FilterOp::Lte => "<=",
            FilterOp::Like => "LIKE",
            FilterOp::In => "IN",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    /// Raw query-string values; more than one only for `in`.
    pub values: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Page {
    pub offset: u64,
    /// `None` means all rows.
    pub limit: Option<u64>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    One(Map<String, Value>),
    Many(Vec<Map<String, Value>>),
}

impl Payload {
    pub fn rows(&self) -> &[Map<String, Value>] {
        match self {
            Payload::One(row) => std::slice::from_ref(row),
            Payload::Many(rows) => rows,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ParsedRequest {
    pub intent: Intent,
    pub table: String,
    pub id: Option<String>,
    pub filters: Vec<Filter>,
    pub sort: Vec<SortKey>,
    pub page: Page,
    pub body: Option<Payload>,
}

/// Parse one request. `id` is the second path segment when present.
pub fn translate(
    method: &Method,
    table: &str,
    id: Option<&str>,
    query: &[(String, String)],
    body: &[u8],
) -> Result<ParsedRequest, AppError> {
    let intent = match (method.as_str(), id.is_some()) {
        ("GET", false) => Intent::List,
        ("POST", false) => Intent::Create,
        ("GET", true) => Intent::GetOne,
        ("PUT" | "PATCH", true) => Intent::Update,
        ("DELETE", true) => Intent::Delete,
        (m, _) => return Err(AppError::BadRequest(format!("{} not supported on this path", m))),
    };
    if table.is_empty() {
        return Err(AppError::BadRequest("missing table name".into()));
    }

    let mut req = ParsedRequest {
        intent,
        table: table.to_string(),
        id: id.map(str::to_string),
        filters: Vec::new(),
        sort: Vec::new(),
        page: Page::default(),
        body: None,
    };
    if intent == Intent::List {
        parse_query(query, &mut req)?;
    }
    match intent {
        Intent::Create => req.body = Some(parse_body(body, true)?),
        Intent::Update => req.body = Some(parse_body(body, false)?),
        _ => {}
    }
    Ok(req)
}

fn parse_query(query: &[(String, String)], req: &mut ParsedRequest) -> Result<(), AppError> {
    for (key, value) in query {
        match key.as_str() {
            "_sort" => req.sort = parse_sort(value)?,
            "_limit" => req.page.limit = Some(parse_count("_limit", value)?),
            "_offset" => req.page.offset = parse_count("_offset", value)?,
            _ => req.filters.push(parse_filter(key, value)?),
        }
    }
    Ok(())
}

fn parse_sort(value: &str) -> Result<Vec<SortKey>, AppError> {
    value
        .split(',')
        .map(str::trim)
        .map(|part| {
            let (field, descending) = match part.strip_prefix('-') {
                Some(rest) => (rest, true),
                None => (part, false),
            };
            if field.is_empty() {
                return Err(AppError::BadRequest(format!("malformed _sort value '{}'", value)));
            }
            Ok(SortKey {
                field: field.to_string(),
                descending,
            })
        })
        .collect()
}

fn parse_count(key: &str, value: &str) -> Result<u64, AppError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| AppError::BadRequest(format!("{} must be a non-negative integer, got '{}'", key, value)))
}

fn parse_filter(key: &str, value: &str) -> Result<Filter, AppError> {
    static FILTER_KEY: OnceLock<Regex> = OnceLock::new();
    let re = FILTER_KEY.get_or_init(|| Regex::new(r"^([^\[\]]+)(?:\[([A-Za-z]+)\])?$").expect("static regex"));
    let caps = re
        .captures(key)
        .ok_or_else(|| AppError::BadRequest(format!("malformed filter key '{}'", key)))?;
    let field = caps[1].to_string();
    let op = match caps.get(2) {
        Some(m) => FilterOp::parse(&m.as_str().to_ascii_lowercase())
            .ok_or_else(|| AppError::BadRequest(format!("unknown filter operator '{}'", m.as_str())))?,
        None => FilterOp::Eq,
    };
    let values = if op == FilterOp::In {
        let items: Vec<String> = value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if items.is_empty() {
            return Err(AppError::BadRequest(format!("'{}' needs at least one value", key)));
        }
        items
    } else {
        vec![value.to_string()]
    };
    Ok(Filter { field, op, values })
}

fn parse_body(body: &[u8], allow_array: bool) -> Result<Payload, AppError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| AppError::BadRequest(format!("malformed JSON body: {}", e)))?;
    match value {
        Value::Object(row) => Ok(Payload::One(row)),
        Value::Array(items) if allow_array => {
            if items.is_empty() {
                return Err(AppError::BadRequest("body array is empty".into()));
            }
            if items.len() > BULK_LIMIT {
                return Err(AppError::BadRequest(format!("bulk create limited to {} items", BULK_LIMIT)));
            }
            items
                .into_iter()
                .map(|item| match item {
                    Value::Object(row) => Ok(row),
                    _ => Err(AppError::BadRequest("every array element must be a JSON object".into())),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Payload::Many)
        }
        Value::Array(_) => Err(AppError::BadRequest("body must be a JSON object".into())),
        _ => Err(AppError::BadRequest("body must be a JSON object or array of objects".into())),
    }
}
