use crate::auth::{AuthUser, TokenSigner};
use crate::cache::TtlCache;
use crate::ipc::error::HandlerErr;
use crate::ipc::types::Request;
use crate::model::AttendanceSheet;
use crate::notify::{Notifier, SubscriptionHub};
use crate::store::{AttendanceStore, SqliteAttendanceStore};
use rusqlite::Connection;

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_optional_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn require_db(db: &Option<Connection>) -> Result<&Connection, HandlerErr> {
    db.as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

pub fn authenticate(tokens: &TokenSigner, req: &Request) -> Result<AuthUser, HandlerErr> {
    let Some(token) = req.token.as_deref() else {
        return Err(HandlerErr::new("unauthorized", "missing bearer token"));
    };
    let token = token.strip_prefix("Bearer ").unwrap_or(token);
    Ok(tokens.verify(token)?)
}

/// Newest-first history for the group, served from the cache when fresh.
pub fn load_history(
    conn: &Connection,
    cache: &mut TtlCache<Vec<AttendanceSheet>>,
    group_id: &str,
) -> Result<Vec<AttendanceSheet>, HandlerErr> {
    if let Some(hit) = cache.get(group_id) {
        return Ok(hit);
    }
    let sheets = SqliteAttendanceStore::new(conn).find_all_sheets(group_id)?;
    cache.insert(group_id, sheets.clone());
    Ok(sheets)
}

/// Roster or attendance for the group changed: drop cached history and tell observers.
pub fn group_changed(hub: &SubscriptionHub, cache: &mut TtlCache<Vec<AttendanceSheet>>, group_id: &str) {
    cache.invalidate(group_id);
    hub.notify_group_changed(group_id);
}
