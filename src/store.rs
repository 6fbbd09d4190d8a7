use crate::db::now_rfc3339;
use crate::error::StoreError;
use crate::model::{format_date_key, parse_date_key, AttendanceRecord, AttendanceSheet, AttendanceStatus};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::collections::HashMap;
use uuid::Uuid;

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence contract for attendance sheets. At most one sheet exists per
/// (group, date); implementations enforce that themselves.
pub trait AttendanceStore {
    fn find_sheet(&self, group_id: &str, date: NaiveDate) -> StoreResult<Option<AttendanceSheet>>;

    /// All sheets for the group, newest date first.
    fn find_all_sheets(&self, group_id: &str) -> StoreResult<Vec<AttendanceSheet>>;

    /// Creates the sheet for (group, date) if absent, otherwise replaces the
    /// records of the existing one. Returns the stored sheet.
    fn upsert_sheet(&self, sheet: &AttendanceSheet) -> StoreResult<AttendanceSheet>;

    /// Read-merge-write of a single (group, date) sheet. Implementations that
    /// can be shared between writers must serialize the whole sequence.
    fn update_sheet(
        &self,
        group_id: &str,
        date: NaiveDate,
        edit: &mut dyn FnMut(&mut AttendanceSheet),
    ) -> StoreResult<AttendanceSheet> {
        let mut sheet = self
            .find_sheet(group_id, date)?
            .unwrap_or_else(|| AttendanceSheet::empty(group_id, date));
        edit(&mut sheet);
        self.upsert_sheet(&sheet)
    }
}

pub struct SqliteAttendanceStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteAttendanceStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        SqliteAttendanceStore { conn }
    }
}

impl AttendanceStore for SqliteAttendanceStore<'_> {
    fn find_sheet(&self, group_id: &str, date: NaiveDate) -> StoreResult<Option<AttendanceSheet>> {
        find_sheet(self.conn, group_id, date)
    }

    fn find_all_sheets(&self, group_id: &str) -> StoreResult<Vec<AttendanceSheet>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, group_id, date_key, created_at, updated_at
             FROM attendance_sheets
             WHERE group_id = ?
             ORDER BY date_key DESC",
        )?;
        let mut sheets = stmt
            .query_map([group_id], sheet_header_from_row)?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|(header, date_key)| header_into_sheet(header, &date_key))
            .collect::<StoreResult<Vec<_>>>()?;

        let mut rec_stmt = self.conn.prepare(
            "SELECT r.sheet_id, r.student_id, r.status
             FROM attendance_records r
             JOIN attendance_sheets s ON s.id = r.sheet_id
             WHERE s.group_id = ?
             ORDER BY r.sheet_id, r.position",
        )?;
        let rows = rec_stmt
            .query_map([group_id], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut by_sheet: HashMap<String, Vec<AttendanceRecord>> = HashMap::new();
        for (sheet_id, student_id, status) in rows {
            if let Some(record) = decode_record(&sheet_id, student_id, &status) {
                by_sheet.entry(sheet_id).or_default().push(record);
            }
        }
        for sheet in &mut sheets {
            sheet.records = by_sheet.remove(&sheet.id).unwrap_or_default();
        }
        Ok(sheets)
    }

    fn upsert_sheet(&self, sheet: &AttendanceSheet) -> StoreResult<AttendanceSheet> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let stored = write_sheet(&tx, sheet)?;
        tx.commit()?;
        Ok(stored)
    }

    fn update_sheet(
        &self,
        group_id: &str,
        date: NaiveDate,
        edit: &mut dyn FnMut(&mut AttendanceSheet),
    ) -> StoreResult<AttendanceSheet> {
        // IMMEDIATE takes the write lock up front, so no other connection can
        // slip a write in between our read and our write.
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let mut sheet =
            find_sheet(&tx, group_id, date)?.unwrap_or_else(|| AttendanceSheet::empty(group_id, date));
        edit(&mut sheet);
        let stored = write_sheet(&tx, &sheet)?;
        tx.commit()?;
        Ok(stored)
    }
}

struct SheetHeader {
    id: String,
    group_id: String,
    created_at: String,
    updated_at: String,
}

fn sheet_header_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<(SheetHeader, String)> {
    Ok((
        SheetHeader {
            id: r.get(0)?,
            group_id: r.get(1)?,
            created_at: r.get(3)?,
            updated_at: r.get(4)?,
        },
        r.get(2)?,
    ))
}

fn header_into_sheet(header: SheetHeader, date_key: &str) -> StoreResult<AttendanceSheet> {
    let date = parse_date_key(date_key)
        .ok_or_else(|| StoreError::Corrupt(format!("sheet {} has date_key {:?}", header.id, date_key)))?;
    Ok(AttendanceSheet {
        id: header.id,
        group_id: header.group_id,
        date,
        records: Vec::new(),
        created_at: header.created_at,
        updated_at: header.updated_at,
    })
}

fn decode_record(sheet_id: &str, student_id: String, status: &str) -> Option<AttendanceRecord> {
    match AttendanceStatus::from_stored(status) {
        Some(status) => Some(AttendanceRecord { student_id, status }),
        None => {
            tracing::warn!(sheet_id, student_id = %student_id, status, "skipping record with non-canonical status");
            None
        }
    }
}

fn find_sheet(conn: &Connection, group_id: &str, date: NaiveDate) -> StoreResult<Option<AttendanceSheet>> {
    let date_key = format_date_key(date);
    let header = conn
        .query_row(
            "SELECT id, group_id, date_key, created_at, updated_at
             FROM attendance_sheets
             WHERE group_id = ? AND date_key = ?",
            (group_id, &date_key),
            sheet_header_from_row,
        )
        .optional()?;
    let Some((header, date_key)) = header else {
        return Ok(None);
    };
    let mut sheet = header_into_sheet(header, &date_key)?;
    sheet.records = load_records(conn, &sheet.id)?;
    Ok(Some(sheet))
}

fn load_records(conn: &Connection, sheet_id: &str) -> StoreResult<Vec<AttendanceRecord>> {
    let mut stmt = conn.prepare(
        "SELECT student_id, status
         FROM attendance_records
         WHERE sheet_id = ?
         ORDER BY position",
    )?;
    let rows = stmt
        .query_map([sheet_id], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows
        .into_iter()
        .filter_map(|(student_id, status)| decode_record(sheet_id, student_id, &status))
        .collect())
}

/// Caller owns the transaction.
fn write_sheet(conn: &Connection, sheet: &AttendanceSheet) -> StoreResult<AttendanceSheet> {
    let date_key = format_date_key(sheet.date);
    let now = now_rfc3339();
    conn.execute(
        "INSERT INTO attendance_sheets(id, group_id, date_key, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?)
         ON CONFLICT(group_id, date_key) DO UPDATE SET
           updated_at = excluded.updated_at",
        (
            Uuid::new_v4().to_string(),
            &sheet.group_id,
            &date_key,
            &now,
            &now,
        ),
    )?;
    let (header, _) = conn.query_row(
        "SELECT id, group_id, date_key, created_at, updated_at
         FROM attendance_sheets
         WHERE group_id = ? AND date_key = ?",
        (&sheet.group_id, &date_key),
        sheet_header_from_row,
    )?;

    conn.execute("DELETE FROM attendance_records WHERE sheet_id = ?", [&header.id])?;
    let mut insert = conn.prepare(
        "INSERT INTO attendance_records(sheet_id, student_id, status, position)
         VALUES(?, ?, ?, ?)",
    )?;
    for (i, record) in sheet.records.iter().enumerate() {
        insert.execute((&header.id, &record.student_id, record.status.as_str(), i as i64))?;
    }

    Ok(AttendanceSheet {
        id: header.id,
        group_id: header.group_id,
        date: sheet.date,
        records: sheet.records.clone(),
        created_at: header.created_at,
        updated_at: header.updated_at,
    })
}
