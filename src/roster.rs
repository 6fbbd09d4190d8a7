use crate::db::now_rfc3339;
use crate::error::{AttendanceError, AttendanceResult, StoreError};
use crate::store::StoreResult;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use std::collections::HashSet;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct UserRow {
    pub summary: UserSummary,
    pub password_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: String,
}

pub fn create_user(
    conn: &Connection,
    name: &str,
    email: &str,
    password_hash: Option<&str>,
) -> StoreResult<UserSummary> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO users(id, name, email, password_hash, created_at) VALUES(?, ?, ?, ?, ?)",
        (&id, name, email, password_hash, now_rfc3339()),
    )?;
    Ok(UserSummary {
        id,
        name: name.to_string(),
        email: email.to_string(),
    })
}

pub fn find_user_by_email(conn: &Connection, email: &str) -> StoreResult<Option<UserRow>> {
    Ok(conn
        .query_row(
            "SELECT id, name, email, password_hash FROM users WHERE email = ?",
            [email],
            |r| {
                Ok(UserRow {
                    summary: UserSummary {
                        id: r.get(0)?,
                        name: r.get(1)?,
                        email: r.get(2)?,
                    },
                    password_hash: r.get(3)?,
                })
            },
        )
        .optional()?)
}

/// Roster entries are login-less users with a unique placeholder email.
pub fn create_placeholder_student(conn: &Connection, name: &str) -> StoreResult<UserSummary> {
    let email = format!("student_{}@placeholder.local", Uuid::new_v4().simple());
    create_user(conn, name, &email, None)
}

pub fn create_group(
    conn: &Connection,
    name: &str,
    description: Option<&str>,
    admin_id: &str,
) -> StoreResult<GroupRow> {
    let group = GroupRow {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        description: description.map(|s| s.to_string()),
        created_at: now_rfc3339(),
    };
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO class_groups(id, name, description, created_at) VALUES(?, ?, ?, ?)",
        (&group.id, &group.name, &group.description, &group.created_at),
    )?;
    tx.execute(
        "INSERT INTO group_admins(group_id, user_id) VALUES(?, ?)",
        (&group.id, admin_id),
    )?;
    tx.commit()?;
    Ok(group)
}

pub fn find_group(conn: &Connection, group_id: &str) -> StoreResult<Option<GroupRow>> {
    Ok(conn
        .query_row(
            "SELECT id, name, description, created_at FROM class_groups WHERE id = ?",
            [group_id],
            group_from_row,
        )
        .optional()?)
}

fn group_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<GroupRow> {
    Ok(GroupRow {
        id: r.get(0)?,
        name: r.get(1)?,
        description: r.get(2)?,
        created_at: r.get(3)?,
    })
}

/// Groups where the user is an admin or on the roster.
pub fn list_groups_for_user(conn: &Connection, user_id: &str) -> StoreResult<Vec<GroupRow>> {
    let mut stmt = conn.prepare(
        "SELECT g.id, g.name, g.description, g.created_at
         FROM class_groups g
         WHERE EXISTS (SELECT 1 FROM group_admins a WHERE a.group_id = g.id AND a.user_id = ?1)
            OR EXISTS (SELECT 1 FROM group_students s WHERE s.group_id = g.id AND s.user_id = ?1)
         ORDER BY g.name, g.id",
    )?;
    let rows = stmt
        .query_map([user_id], group_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn group_admins(conn: &Connection, group_id: &str) -> StoreResult<Vec<UserSummary>> {
    let mut stmt = conn.prepare(
        "SELECT u.id, u.name, u.email
         FROM group_admins a
         JOIN users u ON u.id = a.user_id
         WHERE a.group_id = ?
         ORDER BY u.name, u.id",
    )?;
    let rows = stmt
        .query_map([group_id], user_summary_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn group_students(conn: &Connection, group_id: &str) -> StoreResult<Vec<UserSummary>> {
    let mut stmt = conn.prepare(
        "SELECT u.id, u.name, u.email
         FROM group_students s
         JOIN users u ON u.id = s.user_id
         WHERE s.group_id = ?
         ORDER BY s.sort_order",
    )?;
    let rows = stmt
        .query_map([group_id], user_summary_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn user_summary_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<UserSummary> {
    Ok(UserSummary {
        id: r.get(0)?,
        name: r.get(1)?,
        email: r.get(2)?,
    })
}

pub fn roster_student_ids(conn: &Connection, group_id: &str) -> StoreResult<HashSet<String>> {
    let mut stmt = conn.prepare("SELECT user_id FROM group_students WHERE group_id = ?")?;
    let ids = stmt
        .query_map([group_id], |r| r.get::<_, String>(0))?
        .collect::<Result<HashSet<_>, _>>()?;
    Ok(ids)
}

fn exists(conn: &Connection, sql: &str, group_id: &str, user_id: &str) -> StoreResult<bool> {
    Ok(conn
        .query_row(sql, (group_id, user_id), |r| r.get::<_, i64>(0))
        .optional()?
        .is_some())
}

pub fn is_admin(conn: &Connection, group_id: &str, user_id: &str) -> StoreResult<bool> {
    exists(
        conn,
        "SELECT 1 FROM group_admins WHERE group_id = ? AND user_id = ?",
        group_id,
        user_id,
    )
}

pub fn is_student(conn: &Connection, group_id: &str, user_id: &str) -> StoreResult<bool> {
    exists(
        conn,
        "SELECT 1 FROM group_students WHERE group_id = ? AND user_id = ?",
        group_id,
        user_id,
    )
}

/// Loads the group, failing with NotFound, then checks admin rights.
pub fn require_admin(conn: &Connection, group_id: &str, user_id: &str) -> AttendanceResult<GroupRow> {
    let group = find_group(conn, group_id)?
        .ok_or_else(|| AttendanceError::NotFound("group not found".to_string()))?;
    if !is_admin(conn, group_id, user_id)? {
        return Err(AttendanceError::Forbidden(
            "only group admins can do this".to_string(),
        ));
    }
    Ok(group)
}

/// Loads the group, failing with NotFound, then checks the user is an admin
/// or a student of it.
pub fn require_member(conn: &Connection, group_id: &str, user_id: &str) -> AttendanceResult<GroupRow> {
    let group = find_group(conn, group_id)?
        .ok_or_else(|| AttendanceError::NotFound("group not found".to_string()))?;
    if !is_admin(conn, group_id, user_id)? && !is_student(conn, group_id, user_id)? {
        return Err(AttendanceError::Forbidden(
            "not a member of this group".to_string(),
        ));
    }
    Ok(group)
}

/// Set semantics: adding an existing member is a no-op.
pub fn add_student(conn: &Connection, group_id: &str, user_id: &str) -> StoreResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO group_students(group_id, user_id, sort_order)
         VALUES(?1, ?2, (SELECT COALESCE(MAX(sort_order), -1) + 1 FROM group_students WHERE group_id = ?1))",
        (group_id, user_id),
    )?;
    Ok(())
}

/// Returns whether the student was on the roster. Attendance history is kept.
pub fn remove_student(conn: &Connection, group_id: &str, user_id: &str) -> StoreResult<bool> {
    let n = conn.execute(
        "DELETE FROM group_students WHERE group_id = ? AND user_id = ?",
        (group_id, user_id),
    )?;
    Ok(n > 0)
}

pub fn add_admin(conn: &Connection, group_id: &str, user_id: &str) -> StoreResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO group_admins(group_id, user_id) VALUES(?, ?)",
        (group_id, user_id),
    )?;
    Ok(())
}

/// Refuses to leave a group without admins.
pub fn remove_admin(conn: &Connection, group_id: &str, user_id: &str) -> AttendanceResult<bool> {
    let tx = conn.unchecked_transaction().map_err(StoreError::from)?;
    let count: i64 = tx
        .query_row(
            "SELECT COUNT(*) FROM group_admins WHERE group_id = ?",
            [group_id],
            |r| r.get(0),
        )
        .map_err(StoreError::from)?;
    if count <= 1 {
        return Err(AttendanceError::Validation(
            "cannot remove the last admin".to_string(),
        ));
    }
    let n = tx
        .execute(
            "DELETE FROM group_admins WHERE group_id = ? AND user_id = ?",
            (group_id, user_id),
        )
        .map_err(StoreError::from)?;
    tx.commit().map_err(StoreError::from)?;
    Ok(n > 0)
}
