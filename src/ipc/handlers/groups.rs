use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::helpers::{
    authenticate, get_optional_str, get_required_str, group_changed, load_history, require_db,
};
use crate::ipc::types::{AppState, Request};
use crate::roster;
use crate::stats::{compute_group_stats, StudentStats};
use serde_json::json;

fn groups_create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let user = authenticate(&state.tokens, req)?;
    let name = get_required_str(&req.params, "name")
        .map_err(|_| HandlerErr::bad_params("name must not be empty"))?;
    let description = get_optional_str(&req.params, "description");
    let conn = require_db(&state.db)?;

    let group = roster::create_group(conn, &name, description.as_deref(), &user.id)?;
    tracing::info!(group_id = %group.id, admin = %user.id, "group created");
    let admins = roster::group_admins(conn, &group.id)?;
    Ok(json!({ "group": group, "admins": admins, "students": [] }))
}

fn groups_list(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let user = authenticate(&state.tokens, req)?;
    let conn = require_db(&state.db)?;

    let mut out = Vec::new();
    for group in roster::list_groups_for_user(conn, &user.id)? {
        let admins = roster::group_admins(conn, &group.id)?;
        let is_admin = admins.iter().any(|a| a.id == user.id);
        out.push(json!({
            "group": group,
            "admins": admins,
            "isAdmin": is_admin,
        }));
    }
    Ok(json!({ "groups": out }))
}

fn groups_open(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let user = authenticate(&state.tokens, req)?;
    let group_id = get_required_str(&req.params, "groupId")?;
    let conn = require_db(&state.db)?;

    let group = roster::require_member(conn, &group_id, &user.id)?;
    let admins = roster::group_admins(conn, &group_id)?;
    let students = roster::group_students(conn, &group_id)?;
    let history = load_history(conn, &mut state.history_cache, &group_id)?;
    let stats = compute_group_stats(&history);

    let students_json: Vec<serde_json::Value> = students
        .iter()
        .map(|s| {
            let st = stats.get(&s.id).copied().unwrap_or_default();
            student_json(s, st)
        })
        .collect();

    Ok(json!({
        "group": group,
        "admins": admins,
        "isAdmin": admins.iter().any(|a| a.id == user.id),
        "students": students_json,
    }))
}

fn student_json(s: &roster::UserSummary, st: StudentStats) -> serde_json::Value {
    json!({
        "id": s.id,
        "name": s.name,
        "email": s.email,
        "present": st.present,
        "total": st.total,
        "percentage": st.percentage,
    })
}

fn groups_add_student(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let user = authenticate(&state.tokens, req)?;
    let group_id = get_required_str(&req.params, "groupId")?;
    let name = get_required_str(&req.params, "name")
        .map_err(|_| HandlerErr::bad_params("name is required"))?;
    let conn = require_db(&state.db)?;

    roster::require_admin(conn, &group_id, &user.id)?;
    let student = roster::create_placeholder_student(conn, &name)?;
    roster::add_student(conn, &group_id, &student.id)?;
    tracing::info!(group_id = %group_id, student_id = %student.id, "student added");
    group_changed(&state.hub, &mut state.history_cache, &group_id);
    Ok(json!({ "message": "Student added", "student": student }))
}

fn groups_remove_student(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let user = authenticate(&state.tokens, req)?;
    let group_id = get_required_str(&req.params, "groupId")?;
    let student_id = get_required_str(&req.params, "studentId")?;
    let conn = require_db(&state.db)?;

    roster::require_admin(conn, &group_id, &user.id)?;
    let removed = roster::remove_student(conn, &group_id, &student_id)?;
    if !removed {
        return Err(HandlerErr::new("not_found", "student not in group"));
    }
    tracing::info!(group_id = %group_id, student_id = %student_id, "student removed");
    group_changed(&state.hub, &mut state.history_cache, &group_id);
    Ok(json!({ "message": "Student removed successfully" }))
}

fn groups_add_admin(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let user = authenticate(&state.tokens, req)?;
    let group_id = get_required_str(&req.params, "groupId")?;
    let email = get_required_str(&req.params, "email")?.to_ascii_lowercase();
    let conn = require_db(&state.db)?;

    roster::require_admin(conn, &group_id, &user.id)?;
    let Some(target) = roster::find_user_by_email(conn, &email)? else {
        return Err(HandlerErr::new("not_found", "user not found"));
    };
    roster::add_admin(conn, &group_id, &target.summary.id)?;
    Ok(json!({ "message": "Admin added", "admin": target.summary }))
}

fn groups_remove_admin(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let user = authenticate(&state.tokens, req)?;
    let group_id = get_required_str(&req.params, "groupId")?;
    let target_id = get_required_str(&req.params, "userId")?;
    let conn = require_db(&state.db)?;

    roster::require_admin(conn, &group_id, &user.id)?;
    if !roster::remove_admin(conn, &group_id, &target_id)? {
        return Err(HandlerErr::new("not_found", "user is not an admin of this group"));
    }
    Ok(json!({ "message": "Admin removed successfully" }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "groups.create" => groups_create(state, req),
        "groups.list" => groups_list(state, req),
        "groups.open" => groups_open(state, req),
        "groups.addStudent" => groups_add_student(state, req),
        "groups.removeStudent" => groups_remove_student(state, req),
        "groups.addAdmin" => groups_add_admin(state, req),
        "groups.removeAdmin" => groups_remove_admin(state, req),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
