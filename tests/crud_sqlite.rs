use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use schema_rest::{introspect, AppState, Database, Dialect};
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt; // for `oneshot`

const SCHEMA: &str = r#"
CREATE TABLE customers (
    CustomerId INTEGER PRIMARY KEY AUTOINCREMENT,
    FirstName NVARCHAR(40) NOT NULL,
    LastName NVARCHAR(20) NOT NULL,
    Email NVARCHAR(60) NOT NULL,
    Active BOOL NOT NULL DEFAULT 1
);
CREATE TABLE invoices (
    InvoiceId INTEGER PRIMARY KEY AUTOINCREMENT,
    CustomerId INTEGER NOT NULL REFERENCES customers (CustomerId),
    InvoiceDate DATETIME NOT NULL,
    BillingAddress NVARCHAR(70),
    Total NUMERIC(10,2) NOT NULL,
    Data JSON
);
CREATE TABLE audit_log (message TEXT);
"#;

async fn app_at(base_path: &str) -> Router {
    app_with(base_path, 1 << 20).await
}

async fn app_with(base_path: &str, body_limit: usize) -> Router {
    let db = Database::connect(Dialect::Sqlite, "sqlite::memory:", 1).await.unwrap();
    let Database::Sqlite(pool) = &db else {
        unreachable!("sqlite url")
    };
    sqlx::raw_sql(SCHEMA).execute(pool).await.unwrap();
    let registry = introspect(db.catalog().as_ref()).await.unwrap();
    schema_rest::app(AppState::new(db, registry, Duration::from_secs(5)), base_path, body_limit)
}

async fn app() -> Router {
    app_at("").await
}

async fn send_raw(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
    let body = match body {
        Some(v) => Body::from(serde_json::to_vec(&v).unwrap()),
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("Content-Type", "application/json")
                .body(body)
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let (status, bytes) = send_raw(app, method, uri, body).await;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn customer(first: &str) -> Value {
    json!({
        "CustomerId": 1,
        "FirstName": first,
        "LastName": "last_name",
        "Email": "a@b.com",
        "Active": true
    })
}

fn invoice(id: i64, customer: i64, total: f64) -> Value {
    json!({
        "InvoiceID": id,
        "CustomerId": customer,
        "InvoiceDate": "2023-01-02T10:00:00Z",
        "BillingAddress": "Theodor-Heuss-Straße 34",
        "Total": total,
        "Data": "{\"Country\":\"Germany\",\"PostalCode\":1234}"
    })
}

/// One customer and two invoices for it.
async fn seeded() -> Router {
    let app = app().await;
    let (status, _) = send(&app, "POST", "/customers", Some(customer("first name"))).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = send(
        &app,
        "POST",
        "/invoices",
        Some(json!([invoice(1, 1, 3.1415926), invoice(2, 1, 1.5)])),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    app
}

#[tokio::test]
async fn create_customer_returns_key_and_json_boolean() {
    let app = app().await;
    let (status, body) = send(&app, "POST", "/customers", Some(customer("first name"))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["error"], Value::Null);
    assert_eq!(body["data"]["CustomerId"], json!(1));
    assert_eq!(body["data"]["Active"], json!(true));
    assert_eq!(body["data"]["FirstName"], json!("first name"));
}

#[tokio::test]
async fn bulk_create_with_encoded_json_column() {
    let app = app().await;
    send(&app, "POST", "/customers", Some(customer("a"))).await;
    let (status, body) = send(
        &app,
        "POST",
        "/invoices",
        Some(json!([invoice(1, 1, 3.1415926), invoice(2, 1, 1.5)])),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let rows = body["data"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["InvoiceId"], json!(1));
    assert_eq!(rows[1]["InvoiceId"], json!(2));
    assert_eq!(rows[1]["Total"], json!(1.5));

    let (status, body) = send(&app, "GET", "/invoices/1", None).await;
    assert_eq!(status, StatusCode::OK);
    let row = &body["data"];
    assert_eq!(row["Data"], json!({"Country": "Germany", "PostalCode": 1234}));
    assert_eq!(row["InvoiceDate"], json!("2023-01-02 10:00:00"));
    assert_eq!(row["Total"], json!(3.1415926));
    let keys: Vec<&str> = row.as_object().unwrap().keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        vec!["InvoiceId", "CustomerId", "InvoiceDate", "BillingAddress", "Total", "Data"]
    );
}

#[tokio::test]
async fn bulk_create_is_all_or_nothing() {
    let app = app().await;
    send(&app, "POST", "/customers", Some(customer("a"))).await;
    let (status, body) = send(
        &app,
        "POST",
        "/invoices",
        Some(json!([invoice(1, 1, 1.0), invoice(2, 999, 2.0)])),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], json!(false));

    let (_, body) = send(&app, "GET", "/invoices", None).await;
    assert_eq!(body["data"], json!([]));
    assert_eq!(body["meta"]["total"], json!(0));
}

#[tokio::test]
async fn sort_and_limit_pick_highest_total() {
    let app = seeded().await;
    let (status, body) = send(&app, "GET", "/invoices?CustomerId=1&_sort=-Total&_limit=1", None).await;
    assert_eq!(status, StatusCode::OK);
    let rows = body["data"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["Total"], json!(3.1415926));
    assert_eq!(body["meta"], json!({"count": 1, "total": 2}));
}

#[tokio::test]
async fn filters_are_conjunctive() {
    let app = seeded().await;
    send(&app, "POST", "/customers", Some(customer("second"))).await;
    send(&app, "POST", "/invoices", Some(invoice(0, 2, 9.0))).await;

    let (status, body) = send(&app, "GET", "/invoices?CustomerId=1&Total[gt]=2", None).await;
    assert_eq!(status, StatusCode::OK);
    let rows = body["data"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["InvoiceId"], json!(1));

    let (_, body) = send(&app, "GET", "/invoices?Total[gte]=1.5&_sort=InvoiceId", None).await;
    let ids: Vec<i64> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["InvoiceId"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 2, 3]);

    let (_, body) = send(&app, "GET", "/invoices?InvoiceId[in]=1,3", None).await;
    assert_eq!(body["meta"]["count"], json!(2));

    let (_, body) = send(&app, "GET", "/customers?FirstName[like]=sec%25", None).await;
    assert_eq!(body["data"][0]["FirstName"], json!("second"));
}

#[tokio::test]
async fn offset_pages_through_rows() {
    let app = seeded().await;
    let (_, body) = send(&app, "GET", "/invoices?_offset=1", None).await;
    let rows = body["data"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["InvoiceId"], json!(2));
    assert_eq!(body["meta"]["total"], json!(2));
}

#[tokio::test]
async fn repeated_reads_are_byte_identical() {
    let app = seeded().await;
    let (s1, first) = send_raw(&app, "GET", "/invoices/1", None).await;
    let (s2, second) = send_raw(&app, "GET", "/invoices/1", None).await;
    assert_eq!(s1, StatusCode::OK);
    assert_eq!(s2, StatusCode::OK);
    assert_eq!(first, second);
}

#[tokio::test]
async fn delete_of_missing_row_is_not_found() {
    let app = app().await;
    let (status, body) = send(&app, "DELETE", "/customers/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["data"], Value::Null);
    assert!(body["error"].as_str().unwrap().contains("customers/999"));
}

#[tokio::test]
async fn unknown_table_and_unknown_field() {
    let app = seeded().await;
    let (status, body) = send(&app, "GET", "/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], json!(false));

    // tables without a primary key are not served
    let (status, _) = send(&app, "GET", "/audit_log", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // the table is resolved before the query string is parsed
    let (status, body) = send(&app, "GET", "/nope?_limit=abc", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], json!(false));

    let (status, body) = send(&app, "GET", "/invoices?Nope=1", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));

    let (status, _) = send(&app, "GET", "/invoices?_sort=Nope", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", "/invoices?Total[between]=1", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "POST", "/customers", Some(json!({"FirstName": "a", "Nope": 1}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn invalid_values_are_rejected() {
    let app = app().await;
    let mut bad = customer("a");
    bad["Active"] = json!("maybe");
    let (status, body) = send(&app, "POST", "/customers", Some(bad)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));

    let (status, _) = send(&app, "GET", "/customers/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", "/customers?_limit=-1", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // NOT NULL column missing from the payload
    let (status, body) = send(&app, "POST", "/customers", Some(json!({"FirstName": "a"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!body["error"].as_str().unwrap().contains("NOT NULL"));

    let rows: Vec<Value> = (0..101).map(|_| customer("x")).collect();
    let (status, _) = send(&app, "POST", "/customers", Some(Value::Array(rows))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn foreign_key_violation_is_conflict() {
    let app = app().await;
    let (status, body) = send(&app, "POST", "/invoices", Some(invoice(1, 42, 1.0))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], json!(false));
    assert!(!body["error"].as_str().unwrap().contains("FOREIGN KEY"));
}

#[tokio::test]
async fn update_and_delete_flow() {
    let app = seeded().await;
    send(&app, "POST", "/customers", Some(customer("spare"))).await;

    let (status, body) = send(&app, "PATCH", "/customers/2", Some(json!({"Email": "new@b.com", "Active": false}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["Email"], json!("new@b.com"));
    assert_eq!(body["data"]["Active"], json!(false));
    assert_eq!(body["data"]["FirstName"], json!("spare"));

    let (status, body) = send(&app, "PUT", "/customers/2", Some(json!({"LastName": "put"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["LastName"], json!("put"));

    let (status, _) = send(&app, "PUT", "/customers/2", Some(json!({"CustomerId": 2}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "PATCH", "/customers/999", Some(json!({"Email": "x"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // still referenced by invoices
    let (status, _) = send(&app, "DELETE", "/customers/1", None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(&app, "DELETE", "/customers/2", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, _) = send(&app, "GET", "/customers/2", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn ancillary_routes() {
    let app = seeded().await;
    let (status, body) = send(&app, "GET", "/_health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));

    let (status, body) = send(&app, "GET", "/_ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], json!("ok"));
    assert_eq!(body["tables"], json!(2));

    let (status, body) = send(&app, "GET", "/_version", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], json!("schema-rest"));

    let (status, body) = send(&app, "GET", "/_schema", None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["customers", "invoices"]);

    let (status, body) = send(&app, "GET", "/_schema/invoices", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"]["foreign_keys"],
        json!([{"column": "CustomerId", "references_table": "customers", "references_column": "CustomerId"}])
    );
    assert_eq!(body["data"]["columns"][4]["kind"], json!("real"));

    let (status, _) = send(&app, "GET", "/_schema/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn base_path_nests_table_routes() {
    let app = app_at("/api").await;
    let (status, _) = send(&app, "POST", "/api/customers", Some(customer("a"))).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = send(&app, "GET", "/api/customers/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["CustomerId"], json!(1));

    let (status, body) = send(&app, "GET", "/customers/1/extra", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], json!(false));

    let (status, _) = send(&app, "GET", "/_health", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn rejections_keep_the_envelope() {
    let app = app_with("", 256).await;
    let (status, body) = send(&app, "POST", "/customers/1", Some(customer("a"))).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body, json!({"success": false, "data": null, "error": "method not allowed"}));

    let (status, body) = send(&app, "DELETE", "/_schema", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["success"], json!(false));

    let rows: Vec<Value> = (0..10).map(|_| customer("a fairly long first name")).collect();
    let (status, body) = send(&app, "POST", "/customers", Some(Value::Array(rows))).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body, json!({"success": false, "data": null, "error": "request body too large"}));
}

#[tokio::test]
async fn numeric_digits_survive_the_request_body() {
    let app = app().await;
    send(&app, "POST", "/customers", Some(customer("a"))).await;
    let mut row = invoice(1, 1, 0.0);
    row["Total"] = serde_json::from_str("2.125").unwrap();
    let (status, body) = send(&app, "POST", "/invoices", Some(row)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["Total"].to_string(), "2.125");
}
