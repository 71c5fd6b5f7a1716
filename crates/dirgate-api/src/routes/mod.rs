//! Admin API routes
//!
//! Users and groups are addressed by DN. Lists accept the react-admin query
//! parameters `filter`, `sort`, `range` and repeated `attr`, and answer with a
//! `Content-Range` header.

use axum::{
    extract::{FromRequest, FromRequestParts},
    http::{header, request::Parts, HeaderMap, HeaderValue},
    routing::{get, put},
    Router,
};
use dirgate_core::query::{ListQuery, PageRange};
use dirgate_core::CONTENT_RANGE_UNIT;

use crate::error::ApiError;
use crate::server::AppState;

pub mod groups;
pub mod health;
pub mod login;
pub mod users;

/// Build the `/api` router
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(login::login))
        .route("/health", get(health::health))
        // Users
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/password", put(users::change_password))
        .route(
            "/users/{id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        // Groups
        .route("/groups", get(groups::list_groups).post(groups::create_group))
        .route(
            "/groups/{id}",
            get(groups::get_group)
                .put(groups::update_group)
                .delete(groups::delete_group),
        )
}

/// List parameters decoded from the query string
pub struct ListParams(pub ListQuery);

impl<S: Send + Sync> FromRequestParts<S> for ListParams {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let query = match parts.uri.query() {
            Some(raw) => ListQuery::from_pairs(url::form_urlencoded::parse(raw.as_bytes()))?,
            None => ListQuery::default(),
        };
        Ok(ListParams(query))
    }
}

/// JSON body whose rejections use the API error format
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `Content-Range` header for a served page
pub fn content_range(range: &PageRange) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&range.content_range(CONTENT_RANGE_UNIT)) {
        headers.insert(header::CONTENT_RANGE, value);
    }
    headers
}
