use std::path::PathBuf;

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use employee_server::{AppConfig, AppState, build_router};
use http_body_util::BodyExt;
use products_hr::StoreSettings;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    path: PathBuf,
    _dir: TempDir,
}

impl TestApp {
    async fn new() -> Self {
        Self::with_config(|config| config).await
    }

    async fn with_config(tweak: impl FnOnce(AppConfig) -> AppConfig) -> Self {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("employees.json");
        std::fs::write(&path, "[]").unwrap();
        Self::build(dir, path, tweak)
    }

    async fn without_document() -> Self {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.json");
        Self::build(dir, path, |config| config)
    }

    fn build(dir: TempDir, path: PathBuf, tweak: impl FnOnce(AppConfig) -> AppConfig) -> Self {
        let config = tweak(AppConfig {
            store: StoreSettings::new(&path),
            ..AppConfig::default()
        });
        let router = build_router(AppState::new(config));
        Self {
            router,
            path,
            _dir: dir,
        }
    }

    async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> Reply {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::ORIGIN, "http://localhost:4200");
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send_request(request).await
    }

    async fn send_raw(&self, method: Method, uri: &str, body: &'static str) -> Reply {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap();
        self.send_request(request).await
    }

    async fn send_request(&self, request: Request<Body>) -> Reply {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        Reply {
            status,
            headers,
            body,
            text,
        }
    }

    fn stored(&self) -> Value {
        serde_json::from_str(&std::fs::read_to_string(&self.path).unwrap()).unwrap()
    }
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
    text: String,
}

fn employee(emp_id: i64, name: &str) -> Value {
    json!({
        "empId": emp_id,
        "empName": name,
        "ErpEmployeeSkills": [],
        "ErmEmpExperiences": []
    })
}

#[tokio::test]
async fn create_replace_delete_round_trip() {
    let app = TestApp::new().await;

    let created = app.send(Method::POST, "/employees", Some(employee(1, "A"))).await;
    assert_eq!(created.status, StatusCode::OK);
    assert_eq!(created.body, employee(1, "A"));

    let listed = app.send(Method::GET, "/employees", None).await;
    assert_eq!(listed.body, json!([employee(1, "A")]));

    let replaced = app.send(Method::PUT, "/employees", Some(employee(1, "B"))).await;
    assert_eq!(replaced.status, StatusCode::OK);
    assert_eq!(replaced.body, employee(1, "B"));
    assert_eq!(
        app.send(Method::GET, "/employees", None).await.body,
        json!([employee(1, "B")])
    );

    let deleted = app
        .send(Method::DELETE, "/employees", Some(json!({"empId": 1})))
        .await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(deleted.body, json!({"status": "Deleted"}));
    assert_eq!(app.send(Method::GET, "/employees", None).await.body, json!([]));
    assert_eq!(app.stored(), json!([]));
}

#[tokio::test]
async fn nested_rows_round_trip_through_the_api() {
    let app = TestApp::new().await;
    let payload = json!({
        "empId": 9,
        "empName": "Nested",
        "roleId": 2,
        "empExpTotalYear": 4,
        "ErpEmployeeSkills": [
            {"empSkillId": 1, "empId": 9, "skill": "Rust", "totalYearExp": 3, "lastVersionUsed": "1.80"},
            {"empSkillId": 2, "empId": 9, "skill": "SQL", "totalYearExp": 1.5, "lastVersionUsed": "16"}
        ],
        "ErmEmpExperiences": [
            {"empExpId": 1, "empId": 9, "companyName": "Acme", "startDate": "2020-01-01",
             "endDate": "2022-01-01", "designation": "Dev", "projectsWorkedOn": "Billing"}
        ]
    });
    app.send(Method::POST, "/employees", Some(payload.clone())).await;
    let fetched = app.send(Method::GET, "/employees/9", None).await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.body, payload);
}

#[tokio::test]
async fn profile_fields_keep_their_json_type_byte_for_byte() {
    let app = TestApp::new().await;
    // Keys follow the record's field order so the echo is byte-identical.
    let payload = concat!(
        r#"{"empId":1,"roleId":"1","empContactNo":5551234,"empAltContactNo":null,"#,
        r#""empExpTotalYear":"3","empPinCode":90210,"#,
        r#""ErpEmployeeSkills":[{"empSkillId":"7","empId":"1","skill":"Rust","totalYearExp":"three","lastVersionUsed":null}],"#,
        r#""ErmEmpExperiences":[{"empExpId":1,"startDate":20200101,"endDate":null}]}"#
    );

    let created = app.send_raw(Method::POST, "/employees", payload).await;
    assert_eq!(created.status, StatusCode::OK);
    assert_eq!(created.text, payload);

    let listed = app.send(Method::GET, "/employees", None).await;
    assert_eq!(listed.text, format!("[{payload}]"));
    assert_eq!(
        std::fs::read_to_string(&app.path).unwrap(),
        format!("[{payload}]")
    );

    let fetched = app.send(Method::GET, "/employees/1", None).await;
    assert_eq!(fetched.text, payload);
}

#[tokio::test]
async fn explicit_nulls_survive_replace() {
    let app = TestApp::new().await;
    app.send(Method::POST, "/employees", Some(employee(3, "N"))).await;
    let update = json!({
        "empId": 3,
        "empName": null,
        "empAltContactNo": null,
        "ErpEmployeeSkills": [],
        "ErmEmpExperiences": []
    });
    let replaced = app.send(Method::PUT, "/employees/3", Some(update.clone())).await;
    assert_eq!(replaced.body, update);
    assert_eq!(app.stored(), json!([update]));
    assert!(app.stored()[0].as_object().unwrap().contains_key("empAltContactNo"));
}

#[tokio::test]
async fn missing_document_short_circuits_every_method() {
    let app = TestApp::without_document().await;
    let cases = [
        (Method::GET, None),
        (Method::POST, Some(employee(1, "A"))),
        (Method::PUT, Some(employee(1, "A"))),
        (Method::DELETE, Some(json!({"empId": 1}))),
        (Method::PATCH, None),
    ];
    for (method, body) in cases {
        let reply = app.send(method.clone(), "/employees", body).await;
        assert_eq!(reply.status, StatusCode::SERVICE_UNAVAILABLE, "{method}");
        assert_eq!(reply.body, json!({"error": "File not found"}), "{method}");
    }
    assert!(!app.path.exists());
}

#[tokio::test]
async fn missing_document_wins_over_malformed_body() {
    let app = TestApp::without_document().await;
    let reply = app.send_raw(Method::POST, "/employees", "{oops").await;
    assert_eq!(reply.body, json!({"error": "File not found"}));
}

#[tokio::test]
async fn unsupported_method_is_reported_as_json() {
    let app = TestApp::new().await;
    let reply = app.send(Method::PATCH, "/employees", None).await;
    assert_eq!(reply.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(reply.body, json!({"error": "Unsupported request method"}));

    let reply = app.send(Method::PATCH, "/employees/1", None).await;
    assert_eq!(reply.body, json!({"error": "Unsupported request method"}));
}

#[tokio::test]
async fn preflight_returns_empty_body_with_cors_headers() {
    let app = TestApp::new().await;
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/employees")
        .header(header::ORIGIN, "http://localhost:4200")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "PUT")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap();
    let reply = app.send_request(request).await;
    assert!(reply.status.is_success());
    assert_eq!(reply.body, Value::Null);
    assert_eq!(reply.headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    let methods = reply.headers[header::ACCESS_CONTROL_ALLOW_METHODS]
        .to_str()
        .unwrap()
        .to_string();
    for method in ["GET", "POST", "PUT", "DELETE", "OPTIONS"] {
        assert!(methods.contains(method), "{methods}");
    }
    assert_eq!(reply.headers[header::CONTENT_TYPE], "application/json");
}

#[tokio::test]
async fn responses_are_json_with_permissive_cors_and_request_id() {
    let app = TestApp::new().await;
    for (method, body) in [
        (Method::GET, None),
        (Method::POST, Some(employee(2, "C"))),
        (Method::PATCH, None),
    ] {
        let reply = app.send(method, "/employees", body).await;
        assert_eq!(reply.headers[header::CONTENT_TYPE], "application/json");
        assert_eq!(reply.headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(reply.headers.contains_key("x-request-id"));
    }
}

#[tokio::test]
async fn malformed_bodies_are_rejected() {
    let app = TestApp::new().await;

    let reply = app.send_raw(Method::POST, "/employees", "{not json").await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    let message = reply.body["error"].as_str().unwrap();
    assert!(message.starts_with("Invalid request body"), "{message}");

    let reply = app.send_raw(Method::PUT, "/employees", "").await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = app
        .send(Method::DELETE, "/employees", Some(json!({"id": 1})))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = app
        .send(Method::POST, "/employees", Some(json!({"empName": "no key"})))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.stored(), json!([]));
}

#[tokio::test]
async fn duplicate_create_conflicts() {
    let app = TestApp::new().await;
    app.send(Method::POST, "/employees", Some(employee(3, "first"))).await;
    let reply = app
        .send(Method::POST, "/employees", Some(employee(3, "second")))
        .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert_eq!(reply.body, json!({"error": "Employee 3 already exists"}));
    assert_eq!(app.stored(), json!([employee(3, "first")]));
}

#[tokio::test]
async fn duplicates_are_appended_when_uniqueness_is_off() {
    let app = TestApp::with_config(|mut config| {
        config.store.unique_ids = false;
        config
    })
    .await;
    app.send(Method::POST, "/employees", Some(employee(3, "first"))).await;
    let reply = app
        .send(Method::POST, "/employees", Some(employee(3, "second")))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(
        app.stored(),
        json!([employee(3, "first"), employee(3, "second")])
    );
}

#[tokio::test]
async fn replace_of_unknown_id_is_not_found_when_strict() {
    let app = TestApp::new().await;
    let reply = app.send(Method::PUT, "/employees", Some(employee(77, "ghost"))).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.body, json!({"error": "Employee 77 not found"}));
    assert_eq!(app.stored(), json!([]));
}

#[tokio::test]
async fn replace_of_unknown_id_echoes_when_lenient() {
    let app = TestApp::with_config(|mut config| {
        config.strict_replace = false;
        config
    })
    .await;
    let reply = app.send(Method::PUT, "/employees", Some(employee(77, "ghost"))).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, employee(77, "ghost"));
    assert_eq!(app.stored(), json!([]));
}

#[tokio::test]
async fn delete_is_idempotent_over_http() {
    let app = TestApp::new().await;
    app.send(Method::POST, "/employees", Some(employee(1, "A"))).await;
    app.send(Method::POST, "/employees", Some(employee(2, "B"))).await;

    for _ in 0..2 {
        let reply = app
            .send(Method::DELETE, "/employees", Some(json!({"empId": 1})))
            .await;
        assert_eq!(reply.body, json!({"status": "Deleted"}));
        assert_eq!(app.stored(), json!([employee(2, "B")]));
    }

    let reply = app
        .send(Method::DELETE, "/employees", Some(json!({"empId": 404})))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(app.stored(), json!([employee(2, "B")]));
}

#[tokio::test]
async fn path_keyed_routes() {
    let app = TestApp::new().await;
    app.send(Method::POST, "/employees", Some(employee(5, "E"))).await;

    let found = app.send(Method::GET, "/employees/5", None).await;
    assert_eq!(found.body, employee(5, "E"));

    let missing = app.send(Method::GET, "/employees/6", None).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.body, json!({"error": "Employee 6 not found"}));

    let bad_id = app.send(Method::GET, "/employees/five", None).await;
    assert_eq!(bad_id.status, StatusCode::BAD_REQUEST);

    let mismatch = app
        .send(Method::PUT, "/employees/5", Some(employee(6, "F")))
        .await;
    assert_eq!(mismatch.status, StatusCode::BAD_REQUEST);

    let updated = app
        .send(Method::PUT, "/employees/5", Some(employee(5, "E2")))
        .await;
    assert_eq!(updated.body, employee(5, "E2"));

    let deleted = app.send(Method::DELETE, "/employees/5", None).await;
    assert_eq!(deleted.body, json!({"status": "Deleted"}));
    assert_eq!(app.stored(), json!([]));
}

#[tokio::test]
async fn health_reports_storage() {
    let app = TestApp::new().await;
    let reply = app.send(Method::GET, "/health", None).await;
    assert_eq!(reply.body["ok"], json!(true));
    assert_eq!(reply.body["storage_ok"], json!(true));

    let app = TestApp::without_document().await;
    let reply = app.send(Method::GET, "/health", None).await;
    assert_eq!(reply.body["storage_ok"], json!(false));
}
