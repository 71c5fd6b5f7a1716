use axum::Json;
use dirgate_directory::Profile;

use crate::error::ApiResult;
use crate::middleware::AuthenticatedSession;

/// GET /api/login
///
/// Checks the caller's credentials and returns who they are.
pub async fn login(AuthenticatedSession(session): AuthenticatedSession) -> ApiResult<Json<Profile>> {
    let profile = session.profile().clone();
    session.close().await?;

    Ok(Json(profile))
}
