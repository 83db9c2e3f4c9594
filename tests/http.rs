use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use basics::{
    app_state::AppState,
    config::{Config, DatabaseConfig, ServerConfig},
    routes::create_router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn app() -> Router {
    let config = Config {
        database: DatabaseConfig {
            url: "sqlite::memory:".to_string(),
        },
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
    };
    create_router(AppState::new(config).await.unwrap())
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn create_user(app: &Router, username: &str) -> i64 {
    let (status, user) = call(
        app,
        Method::POST,
        "/api/users",
        Some(json!({ "username": username, "password": "pw" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(user.get("password").is_none());
    user["id"].as_i64().unwrap()
}

#[tokio::test]
async fn page_crud_and_cascade() {
    let app = app().await;
    let id = create_user(&app, "ada").await;

    let (status, page) = call(
        &app,
        Method::POST,
        "/api/pages",
        Some(json!({ "user": id, "page_name": "Ada", "page_info": "hello", "date": "2021-06-01" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(page["user"], json!(id));

    let (status, page) = call(
        &app,
        Method::PATCH,
        &format!("/api/pages/{}", id),
        Some(json!({ "page_info": "updated" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["page_info"], json!("updated"));
    assert_eq!(page["page_name"], json!("Ada"));

    let (status, _) = call(&app, Method::DELETE, &format!("/api/pages/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(&app, Method::GET, &format!("/api/users/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn validation_and_conflicts_map_to_statuses() {
    let app = app().await;
    let id = create_user(&app, "ada").await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/pages",
        Some(json!({ "user": id, "page_name": "x".repeat(101), "page_info": "", "date": "2021-06-01" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], json!(400));

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/users",
        Some(json!({ "username": "ada", "password": "pw" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call(&app, Method::DELETE, "/api/likes/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_changelists_use_list_display() {
    let app = app().await;
    let ada = create_user(&app, "ada").await;
    let bob = create_user(&app, "bob").await;

    call(
        &app,
        Method::POST,
        "/api/pages",
        Some(json!({ "user": ada, "page_name": "Ada", "page_info": "plain", "date": "2021-06-01" })),
    )
    .await;
    let (status, _) = call(
        &app,
        Method::POST,
        "/api/likes",
        Some(json!({ "user": bob, "page_name": "Bob", "page_info": "liked", "date": "2021-06-02", "likes": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, index) = call(&app, Method::GET, "/admin", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(index["models"][0]["model"], json!("page"));
    assert_eq!(index["models"][1]["model"], json!("like"));

    let (_, pages) = call(&app, Method::GET, "/admin/page", None).await;
    assert_eq!(pages["columns"], json!(["page_name", "page_info", "date", "user"]));
    // A like is also a page
    assert_eq!(pages["rows"].as_array().unwrap().len(), 2);
    assert_eq!(pages["rows"][0], json!(["Ada", "plain", "2021-06-01", ada]));

    let (_, likes) = call(&app, Method::GET, "/admin/like", None).await;
    assert_eq!(
        likes["columns"],
        json!(["page_in", "page_name", "page_info", "date", "user", "likes"])
    );
    assert_eq!(
        likes["rows"],
        json!([[bob, "Bob", "liked", "2021-06-02", bob, 3]])
    );

    let (status, _) = call(&app, Method::GET, "/admin/user", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_delete_fires_the_cascade() {
    let app = app().await;
    let bob = create_user(&app, "bob").await;
    call(
        &app,
        Method::POST,
        "/api/likes",
        Some(json!({ "user": bob, "page_name": "Bob", "page_info": "liked", "date": "2021-06-02" })),
    )
    .await;

    let (status, detail) = call(&app, Method::GET, &format!("/admin/like/{}", bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["likes"], json!(0));

    let (status, _) = call(&app, Method::DELETE, &format!("/admin/like/{}", bob), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, users) = call(&app, Method::GET, "/api/users", None).await;
    assert_eq!(users, json!([]));

    let (_, health) = call(&app, Method::GET, "/health", None).await;
    assert_eq!(health["tables"], json!({ "users": 0, "pages": 0, "likes": 0 }));
}

#[tokio::test]
async fn malformed_requests_get_json_errors() {
    let app = app().await;
    let id = create_user(&app, "ada").await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/pages",
        Some(json!({ "user": id, "page_name": "Ada", "date": "2021-06-01" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], json!(400));
    assert!(body["error"].as_str().unwrap().contains("page_info"));

    let (status, body) = call(&app, Method::GET, "/api/pages/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], json!(400));

    let (status, body) = call(&app, Method::DELETE, "/admin/page/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}
