//! Group endpoints

use axum::{extract::Path, http::StatusCode, response::IntoResponse, Json};
use dirgate_core::types::Entry;
use serde_json::json;

use super::{content_range, ApiJson, ListParams};
use crate::error::ApiResult;
use crate::middleware::AuthenticatedSession;

pub async fn list_groups(
    AuthenticatedSession(mut session): AuthenticatedSession,
    ListParams(query): ListParams,
) -> ApiResult<impl IntoResponse> {
    let page = session.list_groups(&query).await?;
    session.close().await?;

    Ok((content_range(&page.range), Json(page.entries)))
}

pub async fn create_group(
    AuthenticatedSession(mut session): AuthenticatedSession,
    ApiJson(entry): ApiJson<Entry>,
) -> ApiResult<impl IntoResponse> {
    let created = session.create_group(&entry).await?;
    session.close().await?;

    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_group(
    AuthenticatedSession(mut session): AuthenticatedSession,
    Path(dn): Path<String>,
    ListParams(query): ListParams,
) -> ApiResult<Json<Entry>> {
    let group = session.get_group(&dn, &query.attributes).await?;
    session.close().await?;

    Ok(Json(group))
}

pub async fn update_group(
    AuthenticatedSession(mut session): AuthenticatedSession,
    Path(dn): Path<String>,
    ApiJson(entry): ApiJson<Entry>,
) -> ApiResult<Json<Entry>> {
    let updated = session.update_group(&dn, &entry).await?;
    session.close().await?;

    Ok(Json(updated))
}

pub async fn delete_group(
    AuthenticatedSession(mut session): AuthenticatedSession,
    Path(dn): Path<String>,
) -> ApiResult<impl IntoResponse> {
    session.delete_group(&dn).await?;
    session.close().await?;

    Ok(Json(json!({ "id": dn, "dn": dn })))
}
