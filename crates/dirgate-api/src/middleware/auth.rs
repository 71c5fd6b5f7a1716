//! Basic authentication for the admin API
//!
//! Every protected handler takes an [`AuthenticatedSession`]: the caller's
//! Basic credentials are checked by binding to the directory as that caller,
//! and the bound connection serves the rest of the request.

use axum::{extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use dirgate_core::Error;
use dirgate_directory::Session;

use crate::error::ApiError;
use crate::server::AppState;

/// A directory session bound as the requesting user
pub struct AuthenticatedSession(pub Session);

impl FromRequestParts<AppState> for AuthenticatedSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| Error::Authentication("Unauthenticated".into()))?;

        let (username, password) = parse_basic(header)?;

        let session = Session::open(
            state.connector.as_ref(),
            state.config.clone(),
            &username,
            &password,
        )
        .await?;

        Ok(AuthenticatedSession(session))
    }
}

/// Split `Basic base64(username:password)` into its parts
pub fn parse_basic(header: &str) -> Result<(String, String), Error> {
    let encoded = header
        .strip_prefix("Basic ")
        .ok_or_else(|| Error::Authentication("Unauthenticated".into()))?;

    let decoded = BASE64
        .decode(encoded.trim())
        .map_err(|_| Error::Authentication("malformed credentials".into()))?;
    let credentials = String::from_utf8(decoded)
        .map_err(|_| Error::Authentication("malformed credentials".into()))?;

    let mut parts = credentials.splitn(2, ':');
    let username = parts.next().unwrap_or_default();
    let password = parts
        .next()
        .ok_or_else(|| Error::Authentication("malformed credentials".into()))?;

    Ok((username.to_string(), password.to_string()))
}
