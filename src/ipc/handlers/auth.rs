use crate::auth::{self, AuthUser};
use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::helpers::{get_required_str, require_db};
use crate::ipc::types::{AppState, Request};
use crate::roster::{self, UserSummary};
use serde_json::json;

fn session_json(state: &AppState, user: &UserSummary) -> Result<serde_json::Value, HandlerErr> {
    let token = state
        .tokens
        .issue(&AuthUser {
            id: user.id.clone(),
            name: user.name.clone(),
        })
        .map_err(|e| HandlerErr::new("token_issue_failed", e.to_string()))?;
    Ok(json!({ "token": token, "user": user }))
}

fn auth_register(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_str(&req.params, "name")?;
    let email = get_required_str(&req.params, "email")?.to_ascii_lowercase();
    let password = req
        .params
        .get("password")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::bad_params("missing password"))?;
    let conn = require_db(&state.db)?;

    if roster::find_user_by_email(conn, &email)?.is_some() {
        return Err(HandlerErr::bad_params("user already exists"));
    }
    let hash = auth::hash_password(password)
        .map_err(|e| HandlerErr::new("hash_failed", e.to_string()))?;
    let user = roster::create_user(conn, &name, &email, Some(&hash))?;
    tracing::info!(user_id = %user.id, "user registered");
    session_json(state, &user)
}

fn auth_login(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let email = get_required_str(&req.params, "email")?.to_ascii_lowercase();
    let password = req
        .params
        .get("password")
        .and_then(|v| v.as_str())
        .ok_or_else(|| HandlerErr::bad_params("missing password"))?;
    let conn = require_db(&state.db)?;

    let Some(row) = roster::find_user_by_email(conn, &email)? else {
        return Err(HandlerErr::new("not_found", "user not found"));
    };
    // Placeholder roster entries have no hash and cannot log in.
    let valid = row
        .password_hash
        .as_deref()
        .is_some_and(|h| auth::verify_password(password, h));
    if !valid {
        return Err(HandlerErr::new("unauthorized", "invalid credentials"));
    }
    session_json(state, &row.summary)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "auth.register" => auth_register(state, req),
        "auth.login" => auth_login(state, req),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
