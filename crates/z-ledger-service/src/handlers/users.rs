//! User directory sync, called by the platform's user service.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use z_ledger_core::{Role, UserId, UserProfile};
use z_ledger_store::Directory;

use super::parse_id;
use crate::audit::AuditAction;
use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Upsert request.
#[derive(Debug, Deserialize)]
pub struct SyncUserRequest {
    /// Unique username.
    pub username: String,
    /// Platform role (default `user`).
    #[serde(default)]
    pub role: Option<String>,
}

/// A directory profile.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    /// User ID.
    pub user_id: String,
    /// Username.
    pub username: String,
    /// Role.
    pub role: String,
    /// Has a transfer PIN been set?
    pub has_pin: bool,
}

impl From<&UserProfile> for UserView {
    fn from(profile: &UserProfile) -> Self {
        Self {
            user_id: profile.user_id.to_string(),
            username: profile.username.clone(),
            role: profile.role.to_string(),
            has_pin: profile.pin_hash.is_some(),
        }
    }
}

/// Create or update a user's username and role.
pub async fn sync_user(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Path(user_id): Path<String>,
    Json(body): Json<SyncUserRequest>,
) -> Result<Json<UserView>, ApiError> {
    let payload = json!({ "username": body.username, "role": body.role });

    let result = parse_id::<UserId>(&user_id).and_then(|id| {
        let role = body
            .role
            .as_deref()
            .map_or(Ok(Role::User), str::parse::<Role>)?;
        state
            .store
            .sync_user(&id, &body.username, role)
            .map_err(ApiError::from)
    });
    let profile = state.auditor.record(
        AuditAction {
            actor: &auth.service_name,
            action: "users.sync",
            resource: "user",
        },
        Some(user_id.clone()),
        &payload,
        result,
    )?;

    Ok(Json(UserView::from(&profile)))
}
