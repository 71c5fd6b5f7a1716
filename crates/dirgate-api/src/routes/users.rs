//! User endpoints

use axum::{
    extract::Path,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use dirgate_core::types::Entry;
use serde_json::json;

use super::{content_range, ApiJson, ListParams};
use crate::error::ApiResult;
use crate::middleware::AuthenticatedSession;

/// GET /api/users
pub async fn list_users(
    AuthenticatedSession(mut session): AuthenticatedSession,
    ListParams(query): ListParams,
) -> ApiResult<impl IntoResponse> {
    let page = session.list_users(&query).await?;
    session.close().await?;

    Ok((content_range(&page.range), Json(page.entries)))
}

/// POST /api/users
pub async fn create_user(
    AuthenticatedSession(mut session): AuthenticatedSession,
    ApiJson(entry): ApiJson<Entry>,
) -> ApiResult<impl IntoResponse> {
    let created = session.create_user(&entry).await?;
    session.close().await?;

    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/users/{id}
pub async fn get_user(
    AuthenticatedSession(mut session): AuthenticatedSession,
    Path(dn): Path<String>,
    ListParams(query): ListParams,
) -> ApiResult<Json<Entry>> {
    let user = session.get_user(&dn, &query.attributes).await?;
    session.close().await?;

    Ok(Json(user))
}

/// PUT /api/users/{id}
pub async fn update_user(
    AuthenticatedSession(mut session): AuthenticatedSession,
    Path(dn): Path<String>,
    ApiJson(entry): ApiJson<Entry>,
) -> ApiResult<Json<Entry>> {
    let updated = session.update_user(&dn, &entry).await?;
    session.close().await?;

    Ok(Json(updated))
}

/// DELETE /api/users/{id}
pub async fn delete_user(
    AuthenticatedSession(mut session): AuthenticatedSession,
    Path(dn): Path<String>,
) -> ApiResult<impl IntoResponse> {
    session.delete_user(&dn).await?;
    session.close().await?;

    Ok(Json(json!({ "id": dn, "dn": dn })))
}

/// PUT /api/users/password
///
/// Changes the caller's own password from `options.password`.
pub async fn change_password(
    AuthenticatedSession(mut session): AuthenticatedSession,
    ApiJson(entry): ApiJson<Entry>,
) -> ApiResult<StatusCode> {
    session.change_own_password(&entry).await?;
    session.close().await?;

    Ok(StatusCode::NO_CONTENT)
}
