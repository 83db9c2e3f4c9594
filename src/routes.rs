// HTTP surface: model CRUD under /api, admin list views under /admin

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tracing::info;

use crate::{
    app_state::AppState,
    error::{AppError, AppResult},
    extract::{ApiJson, ApiPath},
    models::{LikeUpdate, NewLike, NewPage, NewUser, PageUpdate},
};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        // Users
        .route("/api/users", get(list_users_handler).post(create_user_handler))
        .route("/api/users/{id}", get(get_user_handler).delete(delete_user_handler))
        // Pages
        .route("/api/pages", get(list_pages_handler).post(create_page_handler))
        .route(
            "/api/pages/{id}",
            get(get_page_handler)
                .patch(update_page_handler)
                .delete(delete_page_handler),
        )
        // Likes
        .route("/api/likes", get(list_likes_handler).post(create_like_handler))
        .route(
            "/api/likes/{id}",
            get(get_like_handler)
                .patch(update_like_handler)
                .delete(delete_like_handler),
        )
        // Admin
        .route("/admin", get(admin_index_handler))
        .route("/admin/{model}", get(admin_changelist_handler))
        .route(
            "/admin/{model}/{id}",
            get(admin_detail_handler).delete(admin_delete_handler),
        )
        .with_state(state)
}

fn deleted(found: bool, what: String) -> AppResult<Json<Value>> {
    if !found {
        return Err(AppError::NotFound(format!("{} not found", what)));
    }
    Ok(Json(json!({ "deleted": true })))
}

pub async fn health_handler(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let counts = state.orm.table_counts().await?;
    let tables: serde_json::Map<String, Value> = counts
        .into_iter()
        .map(|(table, n)| (table.to_string(), json!(n)))
        .collect();
    Ok(Json(json!({ "status": "ok", "tables": tables })))
}

// Users

pub async fn create_user_handler(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<NewUser>,
) -> AppResult<impl IntoResponse> {
    info!("Creating user: {}", req.username);
    let user = state.orm.create_user(req).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn list_users_handler(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    Ok(Json(state.orm.list_users().await?))
}

pub async fn get_user_handler(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.orm.get_user(id).await?))
}

pub async fn delete_user_handler(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<Value>> {
    deleted(state.orm.delete_user(id).await?, format!("User {}", id))
}

// Pages

pub async fn create_page_handler(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<NewPage>,
) -> AppResult<impl IntoResponse> {
    info!("Creating page {} for user {}", req.page_name, req.user);
    let page = state.orm.create_page(req).await?;
    Ok((StatusCode::CREATED, Json(page)))
}

pub async fn list_pages_handler(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    Ok(Json(state.orm.list_pages().await?))
}

pub async fn get_page_handler(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.orm.get_page(id).await?))
}

pub async fn update_page_handler(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<PageUpdate>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.orm.update_page(id, req).await?))
}

pub async fn delete_page_handler(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<Value>> {
    deleted(state.orm.delete_page(id).await?, format!("Page {}", id))
}

// Likes

pub async fn create_like_handler(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<NewLike>,
) -> AppResult<impl IntoResponse> {
    info!("Creating like page {} for user {}", req.page.page_name, req.page.user);
    let like = state.orm.create_like(req).await?;
    Ok((StatusCode::CREATED, Json(like)))
}

pub async fn list_likes_handler(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    Ok(Json(state.orm.list_likes().await?))
}

pub async fn get_like_handler(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.orm.get_like(id).await?))
}

pub async fn update_like_handler(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<LikeUpdate>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.orm.update_like(id, req).await?))
}

pub async fn delete_like_handler(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<Value>> {
    deleted(state.orm.delete_like(id).await?, format!("Like {}", id))
}

// Admin

pub async fn admin_index_handler(State(state): State<AppState>) -> Json<Value> {
    let models: Vec<Value> = state
        .admin
        .registered_models()
        .into_iter()
        .map(|model| {
            json!({
                "model": model,
                "url": format!("/admin/{}", model),
            })
        })
        .collect();
    Json(json!({ "models": models }))
}

pub async fn admin_changelist_handler(
    State(state): State<AppState>,
    ApiPath(model): ApiPath<String>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.admin.changelist(&state.orm, &model).await?))
}

pub async fn admin_detail_handler(
    State(state): State<AppState>,
    ApiPath((model, id)): ApiPath<(String, i64)>,
) -> AppResult<Json<Value>> {
    Ok(Json(state.admin.detail(&state.orm, &model, id).await?))
}

pub async fn admin_delete_handler(
    State(state): State<AppState>,
    ApiPath((model, id)): ApiPath<(String, i64)>,
) -> AppResult<Json<Value>> {
    info!("Admin delete {} {}", model, id);
    let found = state.admin.delete(&state.orm, &model, id).await?;
    deleted(found, format!("{} {}", model, id))
}
