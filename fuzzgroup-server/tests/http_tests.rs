//! End-to-end HTTP tests against an in-memory store

use bytes::Bytes;
use fuzzgroup_core::GroupingEngine;
use fuzzgroup_server::{CorsPolicy, FuzzService, HandlerContext};
use fuzzgroup_sqlite::SqliteRowStore;
use http::{header, Request, StatusCode};
use http_body_util::{BodyExt, Full};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

const CLIENTS: &str = "name,city\n\
Ivan Petrov,Omsk\n\
ivanpetrov,Tomsk\n\
Maria Ivanova,Kazan\n";

fn service() -> FuzzService {
    let store = SqliteRowStore::in_memory("fuzzy").unwrap();
    FuzzService::new(
        HandlerContext::new(store, GroupingEngine::new()),
        "",
        CorsPolicy::default(),
        1024 * 1024,
    )
}

async fn call(svc: &FuzzService, req: Request<Full<Bytes>>) -> (StatusCode, Value) {
    let response = svc.handle(req).await;
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

fn upload_csv(csv: &str) -> Request<Full<Bytes>> {
    Request::post("/generate")
        .header(header::CONTENT_TYPE, "text/csv")
        .body(Full::new(Bytes::from(csv.to_string())))
        .unwrap()
}

fn get(uri: &str) -> Request<Full<Bytes>> {
    Request::get(uri).body(Full::new(Bytes::new())).unwrap()
}

#[tokio::test]
async fn test_generate_then_headers() {
    let svc = service();

    let (status, body) = call(&svc, upload_csv(CLIENTS)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"message": "Database has been successfully generated", "rows": 3})
    );

    let (status, body) = call(&svc, get("/headers")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["headers"], json!(["name", "city"]));
    assert_eq!(body["columns"][0], json!({"name": "name", "type": "text"}));
}

#[tokio::test]
async fn test_generate_multipart_appends() {
    let svc = service();
    let body = "--BOUNDARY\r\n\
Content-Disposition: form-data; name=\"files\"; filename=\"one.csv\"\r\n\
Content-Type: text/csv\r\n\r\n\
name\nIvan Petrov\r\n\
--BOUNDARY\r\n\
Content-Disposition: form-data; name=\"files\"; filename=\"two.csv\"\r\n\
Content-Type: text/csv\r\n\r\n\
name\nivanpetrov\nMaria Ivanova\r\n\
--BOUNDARY--\r\n";

    let req = Request::post("/generate")
        .header(header::CONTENT_TYPE, "multipart/form-data; boundary=BOUNDARY")
        .body(Full::new(Bytes::from(body)))
        .unwrap();
    let (status, body) = call(&svc, req).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rows"], 3);
}

#[tokio::test]
async fn test_groups_scenario() {
    let svc = service();
    call(&svc, upload_csv(CLIENTS)).await;

    let (status, body) = call(&svc, get("/groups?reference_columns=name")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["groups"], 2);
    assert_eq!(body["offset"], 0);
    assert_eq!(body["limit"], 100);

    let items = body["items"].as_array().unwrap();
    let groups: Vec<&Value> = items.iter().map(|i| &i["group_id"]).collect();
    assert_eq!(groups, vec![&json!(1), &json!(1), &json!(2)]);
    assert_eq!(
        items[1],
        json!({
            "client_id": 2,
            "group_id": 1,
            "representative_id": 1,
            "representative": {"name": "Ivan Petrov"},
            "values": {"name": "ivanpetrov", "city": "Tomsk"},
        })
    );
}

#[tokio::test]
async fn test_groups_with_json_body() {
    let svc = service();
    call(&svc, upload_csv(CLIENTS)).await;

    let req = Request::get("/groups")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from_static(br#"["name", "city"]"#)))
        .unwrap();
    let (status, body) = call(&svc, req).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_unknown_column_is_422() {
    let svc = service();
    call(&svc, upload_csv(CLIENTS)).await;

    let (status, body) = call(&svc, get("/groups?reference_columns=surname")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body, json!({"detail": "Unprocessable Entity"}));
}

#[tokio::test]
async fn test_groups_before_generate_is_422() {
    let svc = service();
    let (status, _) = call(&svc, get("/groups?reference_columns=name")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = call(&svc, get("/headers")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_bad_upload_is_422() {
    let svc = service();
    let (status, body) = call(&svc, upload_csv("name,city\nIvan,Omsk,extra\n")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body, json!({"detail": "Unprocessable Entity"}));

    let (status, _) = call(&svc, upload_csv("")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let svc = service();
    let (status, body) = call(&svc, get("/nothing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"detail": "Not Found"}));
}

#[tokio::test]
async fn test_cors_on_error_responses() {
    let svc = service();
    let req = Request::get("/nothing")
        .header(header::ORIGIN, "https://app.example")
        .body(Full::new(Bytes::new()))
        .unwrap();
    let response = svc.handle(req).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "https://app.example"
    );
}

#[tokio::test]
async fn test_file_backed_database_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("database.sqlite");

    {
        let store = SqliteRowStore::open(&path, "fuzzy").unwrap();
        let svc = FuzzService::new(
            HandlerContext::new(store, GroupingEngine::new()),
            "",
            CorsPolicy::default(),
            1024 * 1024,
        );
        call(&svc, upload_csv(CLIENTS)).await;
        call(&svc, get("/groups?reference_columns=name")).await;
    }

    let store = SqliteRowStore::open(&path, "fuzzy").unwrap();
    let svc = FuzzService::new(
        HandlerContext::new(store, GroupingEngine::new()),
        "",
        CorsPolicy::default(),
        1024 * 1024,
    );
    let (status, body) = call(&svc, get("/headers")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["headers"], json!(["name", "city"]));
}
