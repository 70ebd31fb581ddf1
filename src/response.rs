//! Standard response envelope: `{"success", "data", "error"}` plus optional list metadata.

use axum::{http::StatusCode, Json};
use serde::Serialize;
use serde_json::Value;

#[derive(Serialize, Debug)]
pub struct Envelope {
    pub success: bool,
    pub data: Option<Value>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ListMeta>,
}

#[derive(Serialize, Debug)]
pub struct ListMeta {
    pub count: u64,
    pub total: u64,
}

impl Envelope {
    pub fn failure(message: String) -> Self {
        Envelope {
            success: false,
            data: None,
            error: Some(message),
            meta: None,
        }
    }

    fn data(data: Value) -> Self {
        Envelope {
            success: true,
            data: Some(data),
            error: None,
            meta: None,
        }
    }
}

pub fn success_one(data: Value) -> (StatusCode, Json<Envelope>) {
    (StatusCode::OK, Json(Envelope::data(data)))
}

pub fn created(data: Value) -> (StatusCode, Json<Envelope>) {
    (StatusCode::CREATED, Json(Envelope::data(data)))
}

pub fn success_many(rows: Vec<Value>, total: u64) -> (StatusCode, Json<Envelope>) {
    let count = rows.len() as u64;
    let mut env = Envelope::data(Value::Array(rows));
    env.meta = Some(ListMeta { count, total });
    (StatusCode::OK, Json(env))
}
