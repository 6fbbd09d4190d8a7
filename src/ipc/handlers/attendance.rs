use crate::bulk::{apply_bulk_updates, parse_bulk_updates};
use crate::error::AttendanceError;
use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::helpers::{authenticate, get_required_str, load_history, require_db};
use crate::ipc::types::{AppState, Request};
use crate::roster;
use crate::stats::compute_stats;
use crate::store::SqliteAttendanceStore;
use serde_json::json;

fn attendance_bulk_update(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let user = authenticate(&state.tokens, req)?;
    let group_id = get_required_str(&req.params, "groupId")?;
    let updates = parse_bulk_updates(req.params.get("updates"))?;
    let conn = require_db(&state.db)?;

    roster::require_admin(conn, &group_id, &user.id)?;
    let roster_ids = roster::roster_student_ids(conn, &group_id)?;
    let mut unknown: Vec<&str> = updates
        .iter()
        .map(|u| u.student_id.as_str())
        .filter(|id| !roster_ids.contains(*id))
        .collect();
    if !unknown.is_empty() {
        unknown.sort_unstable();
        unknown.dedup();
        return Err(HandlerErr {
            code: "bad_params",
            message: "updates reference students outside the group".to_string(),
            details: Some(json!({ "studentIds": unknown })),
        });
    }

    let store = SqliteAttendanceStore::new(conn);
    let result = apply_bulk_updates(&store, &state.hub, &group_id, &updates);

    // Anything committed makes cached history stale, even on partial failure.
    let any_committed = match &result {
        Ok(outcome) => !outcome.committed.is_empty(),
        Err(AttendanceError::PartialApplication { committed, .. }) => !committed.is_empty(),
        Err(_) => false,
    };
    if any_committed {
        state.history_cache.invalidate(&group_id);
    }

    let outcome = result?;
    Ok(json!({
        "message": "Attendance saved",
        "committed": outcome.committed,
        "applied": outcome.applied,
    }))
}

fn attendance_history(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let user = authenticate(&state.tokens, req)?;
    let group_id = get_required_str(&req.params, "groupId")?;
    let conn = require_db(&state.db)?;

    roster::require_member(conn, &group_id, &user.id)?;
    let sheets = load_history(conn, &mut state.history_cache, &group_id)?;
    Ok(json!({
        "sheets": sheets.iter().map(|s| s.to_json()).collect::<Vec<_>>()
    }))
}

fn attendance_student_stats(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let user = authenticate(&state.tokens, req)?;
    let group_id = get_required_str(&req.params, "groupId")?;
    let student_id = get_required_str(&req.params, "studentId")?;
    let conn = require_db(&state.db)?;

    roster::require_member(conn, &group_id, &user.id)?;
    let sheets = load_history(conn, &mut state.history_cache, &group_id)?;
    let stats = compute_stats(&student_id, &sheets);
    Ok(json!({
        "studentId": student_id,
        "present": stats.present,
        "total": stats.total,
        "percentage": stats.percentage,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "attendance.bulkUpdate" => attendance_bulk_update(state, req),
        "attendance.history" => attendance_history(state, req),
        "attendance.studentStats" => attendance_student_stats(state, req),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => {
            if e.code == "partial_failure" || e.code == "db_update_failed" {
                tracing::warn!(method = %req.method, code = e.code, "{}", e.message);
            }
            e.response(&req.id)
        }
    })
}
