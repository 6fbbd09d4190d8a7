use crate::model::{AttendanceSheet, AttendanceStatus};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StudentStats {
    pub present: u32,
    pub total: u32,
    pub percentage: u32,
}

impl StudentStats {
    fn count(&mut self, status: AttendanceStatus) {
        self.total += 1;
        if status == AttendanceStatus::Present {
            self.present += 1;
        }
        self.percentage = percentage(self.present, self.total);
    }
}

/// `round(100 * present / total)` with halves rounded up, in integer math.
/// Zero when nothing has been marked.
pub fn percentage(present: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let (present, total) = (u64::from(present.min(total)), u64::from(total));
    ((200 * present + total) / (2 * total)) as u32
}

/// Present/total for one student across any set of sheets. Sheet order and
/// sheets without a record for the student do not affect the result.
pub fn compute_stats(student_id: &str, sheets: &[AttendanceSheet]) -> StudentStats {
    let mut stats = StudentStats::default();
    for sheet in sheets {
        if let Some(record) = sheet.record_for(student_id) {
            stats.count(record.status);
        }
    }
    stats
}

/// Same numbers as [`compute_stats`] for every student seen in the history,
/// computed in one pass.
pub fn compute_group_stats(sheets: &[AttendanceSheet]) -> HashMap<String, StudentStats> {
    let mut out: HashMap<String, StudentStats> = HashMap::new();
    for sheet in sheets {
        for record in &sheet.records {
            out.entry(record.student_id.clone())
                .or_default()
                .count(record.status);
        }
    }
    out
}
