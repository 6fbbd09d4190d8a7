use crate::error::{AttendanceError, AttendanceResult, PartitionFailure};
use crate::model::{
    date_key_from_value, format_date_key, AttendanceSheet, AttendanceStatus, PendingUpdate, StatusInput,
};
use crate::notify::Notifier;
use crate::store::AttendanceStore;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkOutcome {
    /// Date keys whose sheet was written, ascending.
    pub committed: Vec<String>,
    /// Distinct (student, date) pairs after last-write-wins reduction.
    pub applied: usize,
}

/// Parses the raw `updates` array into canonical pending updates. Rejects the
/// whole batch on the first malformed entry so nothing is written.
pub fn parse_bulk_updates(raw: Option<&serde_json::Value>) -> AttendanceResult<Vec<PendingUpdate>> {
    let Some(items) = raw.and_then(|v| v.as_array()) else {
        return Err(AttendanceError::Validation("updates must be an array".to_string()));
    };
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        if !item.is_object() {
            return Err(AttendanceError::Validation(format!("updates[{}] must be an object", i)));
        }
        let student_id = item
            .get("studentId")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AttendanceError::Validation(format!("updates[{}]: missing studentId", i)))?;
        let date = item
            .get("date")
            .and_then(date_key_from_value)
            .ok_or_else(|| {
                AttendanceError::Validation(format!("updates[{}]: date must be YYYY-MM-DD or a timestamp", i))
            })?;
        out.push(PendingUpdate {
            student_id: student_id.to_string(),
            date,
            status: StatusInput::normalize(item.get("status")),
        });
    }
    Ok(out)
}

/// Groups updates by calendar date and collapses repeats of the same student
/// within a date to the last one submitted. Students keep first-seen order.
pub fn partition_by_date(updates: &[PendingUpdate]) -> BTreeMap<NaiveDate, Vec<(&str, AttendanceStatus)>> {
    let mut partitions: BTreeMap<NaiveDate, Vec<(&str, AttendanceStatus)>> = BTreeMap::new();
    let mut slots: HashMap<(NaiveDate, &str), usize> = HashMap::new();
    for u in updates {
        let day = partitions.entry(u.date).or_default();
        match slots.get(&(u.date, u.student_id.as_str())) {
            Some(&idx) => day[idx].1 = u.status,
            None => {
                slots.insert((u.date, u.student_id.as_str()), day.len());
                day.push((u.student_id.as_str(), u.status));
            }
        }
    }
    partitions
}

/// Merges a batch of updates into the group's day sheets.
///
/// Each date is read, merged and written as one unit through
/// [`AttendanceStore::update_sheet`]. A failing date does not stop the
/// others; dates already written stay written. Observers are notified once
/// if anything was committed.
pub fn apply_bulk_updates<S>(
    store: &S,
    notifier: &dyn Notifier,
    group_id: &str,
    updates: &[PendingUpdate],
) -> AttendanceResult<BulkOutcome>
where
    S: AttendanceStore + ?Sized,
{
    let span = tracing::info_span!("bulk_update", group_id, updates = updates.len());
    let _enter = span.enter();

    let partitions = partition_by_date(updates);
    let applied: usize = partitions.values().map(Vec::len).sum();
    let mut committed = Vec::new();
    let mut failed = Vec::new();

    for (date, changes) in &partitions {
        let date_key = format_date_key(*date);
        let result = store.update_sheet(group_id, *date, &mut |sheet: &mut AttendanceSheet| {
            for (student_id, status) in changes {
                sheet.set_status(student_id, *status);
            }
        });
        match result {
            Ok(sheet) => {
                tracing::debug!(date = %date_key, records = sheet.records.len(), "sheet saved");
                committed.push(date_key);
            }
            Err(e) => {
                tracing::warn!(date = %date_key, error = %e, "sheet save failed");
                failed.push(PartitionFailure {
                    date: date_key,
                    message: e.to_string(),
                });
            }
        }
    }

    if !committed.is_empty() {
        notifier.notify_group_changed(group_id);
    }
    if !failed.is_empty() {
        return Err(AttendanceError::PartialApplication { committed, failed });
    }
    tracing::info!(dates = committed.len(), applied, "attendance saved");
    Ok(BulkOutcome { committed, applied })
}
