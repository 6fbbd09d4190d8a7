use rusqlite::Connection;
use std::path::Path;

pub const DB_FILE_NAME: &str = "rollcall.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    // Concurrent writers on the same file wait instead of failing immediately.
    conn.busy_timeout(std::time::Duration::from_secs(5))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS class_groups(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS group_admins(
            group_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            PRIMARY KEY(group_id, user_id),
            FOREIGN KEY(group_id) REFERENCES class_groups(id),
            FOREIGN KEY(user_id) REFERENCES users(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_group_admins_user ON group_admins(user_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS group_students(
            group_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            PRIMARY KEY(group_id, user_id),
            FOREIGN KEY(group_id) REFERENCES class_groups(id),
            FOREIGN KEY(user_id) REFERENCES users(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_group_students_user ON group_students(user_id)",
        [],
    )?;

    // One sheet per (group, calendar date). The unique key is what keeps
    // concurrent first writers for the same day from creating two sheets.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance_sheets(
            id TEXT PRIMARY KEY,
            group_id TEXT NOT NULL,
            date_key TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(group_id, date_key),
            FOREIGN KEY(group_id) REFERENCES class_groups(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_sheets_group_date
         ON attendance_sheets(group_id, date_key DESC)",
        [],
    )?;

    // No foreign key on student_id: history outlives roster membership.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance_records(
            sheet_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            status TEXT NOT NULL CHECK(status IN ('Present', 'Absent')),
            position INTEGER NOT NULL,
            PRIMARY KEY(sheet_id, student_id),
            FOREIGN KEY(sheet_id) REFERENCES attendance_sheets(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_records_student
         ON attendance_records(student_id)",
        [],
    )?;

    Ok(conn)
}

pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[cfg(test)]
pub fn temp_workspace() -> std::path::PathBuf {
    std::env::temp_dir().join(format!("rollcall-unit-{}", uuid::Uuid::new_v4()))
}

#[cfg(test)]
pub fn open_temp_db() -> Connection {
    open_db(&temp_workspace()).expect("open test db")
}
