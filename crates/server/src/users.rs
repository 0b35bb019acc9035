use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::errors::ApiError;
use crate::routes::ServerState;
use models::user;
use service::{
    pagination::Pagination,
    user_service::{self, UpdateUser, UserFilter},
};

#[derive(Debug, Deserialize)]
pub struct CreateUserInput {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateUserInput {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub name: Option<String>,
    pub email: Option<String>,
}

// Path ids are parsed by hand so a malformed id reports as a validation
// failure in the standard envelope instead of axum's plain-text rejection.
fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::validation(format!("invalid user id: {raw}")))
}

// Bodies that fail to deserialize would otherwise surface as axum's
// plain-text rejection; fold them into the same envelope.
fn bad_body(rej: JsonRejection) -> ApiError {
    ApiError::validation(format!("invalid request body: {}", rej.body_text()))
}

pub async fn create(
    State(state): State<ServerState>,
    payload: Result<Json<CreateUserInput>, JsonRejection>,
) -> Result<(StatusCode, Json<user::Model>), ApiError> {
    let Json(input) = payload.map_err(bad_body)?;
    let created = user_service::create_user(&state.db, &input.name, &input.email).await?;
    info!(id = %created.id, email = %created.email, "created user");
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<Json<user::Model>, ApiError> {
    let id = parse_id(&id)?;
    let found = user_service::get_user(&state.db, id).await?;
    Ok(Json(found))
}

pub async fn list(
    State(state): State<ServerState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<Vec<user::Model>>, ApiError> {
    let mut opts = Pagination::default();
    if let Some(page) = q.page {
        opts.page = page;
    }
    if let Some(per_page) = q.per_page {
        opts.per_page = per_page;
    }
    let filter = UserFilter { name: q.name, email: q.email };
    let rows = user_service::list_users(&state.db, filter, opts).await?;
    info!(count = rows.len(), "list users");
    Ok(Json(rows))
}

pub async fn update(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateUserInput>, JsonRejection>,
) -> Result<Json<user::Model>, ApiError> {
    let id = parse_id(&id)?;
    let Json(input) = payload.map_err(bad_body)?;
    let changes = UpdateUser { name: input.name, email: input.email };
    let updated = user_service::update_user(&state.db, id, changes).await?;
    info!(id = %updated.id, "updated user");
    Ok(Json(updated))
}

pub async fn delete(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    user_service::delete_user(&state.db, id).await?;
    info!(%id, "deleted user");
    Ok(StatusCode::NO_CONTENT)
}
