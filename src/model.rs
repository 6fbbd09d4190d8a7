use chrono::{DateTime, Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// The two canonical attendance literals. Nothing else is ever persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttendanceStatus {
    Present,
    Absent,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "Present",
            AttendanceStatus::Absent => "Absent",
        }
    }

    /// Strict parse of a stored literal. Returns `None` for anything that is
    /// not exactly one of the canonical values.
    pub fn from_stored(raw: &str) -> Option<Self> {
        match raw {
            "Present" => Some(AttendanceStatus::Present),
            "Absent" => Some(AttendanceStatus::Absent),
            _ => None,
        }
    }
}

/// Loosely-typed status as it arrives over the wire.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum StatusInput {
    Flag(bool),
    Number(f64),
    Text(String),
    Other(serde_json::Value),
}

impl From<StatusInput> for AttendanceStatus {
    fn from(input: StatusInput) -> Self {
        let present = match input {
            StatusInput::Flag(b) => b,
            StatusInput::Number(n) => n == 1.0,
            StatusInput::Text(s) => s.trim().eq_ignore_ascii_case("present"),
            StatusInput::Other(_) => false,
        };
        if present {
            AttendanceStatus::Present
        } else {
            AttendanceStatus::Absent
        }
    }
}

impl StatusInput {
    /// Normalizes a raw JSON value; missing or null statuses default to Absent.
    pub fn normalize(v: Option<&serde_json::Value>) -> AttendanceStatus {
        let Some(v) = v else {
            return AttendanceStatus::Absent;
        };
        serde_json::from_value::<StatusInput>(v.clone())
            .map(AttendanceStatus::from)
            .unwrap_or(AttendanceStatus::Absent)
    }
}

/// Extracts the calendar date from a date-like value, discarding time of day
/// and offset. Strings must start with `YYYY-MM-DD`; numbers are epoch millis.
/// Dates whose year does not fit in four digits are rejected, since their
/// keys could not be read back.
pub fn date_key_from_value(v: &serde_json::Value) -> Option<NaiveDate> {
    if let Some(s) = v.as_str() {
        return parse_date_key(s);
    }
    let millis = v.as_i64().or_else(|| v.as_f64().map(|f| f as i64))?;
    DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.date_naive())
        .filter(|d| fits_date_key(*d))
}

fn fits_date_key(date: NaiveDate) -> bool {
    (0..=9999).contains(&date.year())
}

pub fn parse_date_key(raw: &str) -> Option<NaiveDate> {
    let t = raw.trim();
    let head = t.get(..10)?;
    let rest = &t[10..];
    if !(rest.is_empty() || rest.starts_with('T') || rest.starts_with(' ')) {
        return None;
    }
    NaiveDate::parse_from_str(head, "%Y-%m-%d")
        .ok()
        .filter(|d| fits_date_key(*d))
}

pub fn format_date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceRecord {
    pub student_id: String,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceSheet {
    pub id: String,
    pub group_id: String,
    pub date: NaiveDate,
    pub records: Vec<AttendanceRecord>,
    pub created_at: String,
    pub updated_at: String,
}

impl AttendanceSheet {
    /// A sheet that has not been persisted yet. The store assigns id and timestamps.
    pub fn empty(group_id: &str, date: NaiveDate) -> Self {
        AttendanceSheet {
            id: String::new(),
            group_id: group_id.to_string(),
            date,
            records: Vec::new(),
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    pub fn record_for(&self, student_id: &str) -> Option<&AttendanceRecord> {
        self.records.iter().find(|r| r.student_id == student_id)
    }

    /// Overwrites the student's status in place, or appends a new record.
    pub fn set_status(&mut self, student_id: &str, status: AttendanceStatus) {
        match self.records.iter_mut().find(|r| r.student_id == student_id) {
            Some(existing) => existing.status = status,
            None => self.records.push(AttendanceRecord {
                student_id: student_id.to_string(),
                status,
            }),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "groupId": self.group_id,
            "date": format_date_key(self.date),
            "records": self.records.iter().map(|r| serde_json::json!({
                "studentId": r.student_id,
                "status": r.status.as_str(),
            })).collect::<Vec<_>>(),
            "createdAt": self.created_at,
            "updatedAt": self.updated_at,
        })
    }
}

/// One entry of a bulk request after boundary normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpdate {
    pub student_id: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn loose_statuses_normalize_to_canonical() {
        assert_eq!(StatusInput::normalize(Some(&json!(1))), AttendanceStatus::Present);
        assert_eq!(StatusInput::normalize(Some(&json!(0))), AttendanceStatus::Absent);
        assert_eq!(StatusInput::normalize(Some(&json!(true))), AttendanceStatus::Present);
        assert_eq!(StatusInput::normalize(Some(&json!(false))), AttendanceStatus::Absent);
        assert_eq!(StatusInput::normalize(Some(&json!("Present"))), AttendanceStatus::Present);
        assert_eq!(StatusInput::normalize(Some(&json!(" present "))), AttendanceStatus::Present);
        assert_eq!(StatusInput::normalize(Some(&json!("Absent"))), AttendanceStatus::Absent);
        assert_eq!(StatusInput::normalize(Some(&json!("late"))), AttendanceStatus::Absent);
        assert_eq!(StatusInput::normalize(Some(&json!(2))), AttendanceStatus::Absent);
        assert_eq!(StatusInput::normalize(Some(&json!(null))), AttendanceStatus::Absent);
        assert_eq!(StatusInput::normalize(Some(&json!({"v": 1}))), AttendanceStatus::Absent);
        assert_eq!(StatusInput::normalize(None), AttendanceStatus::Absent);
    }

    #[test]
    fn date_key_drops_time_and_offset() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(date_key_from_value(&json!("2024-03-05T10:00:00Z")), Some(d));
        assert_eq!(date_key_from_value(&json!("2024-03-05T23:00:00-05:00")), Some(d));
        assert_eq!(date_key_from_value(&json!("2024-03-05")), Some(d));
        assert_eq!(date_key_from_value(&json!("2024-03-05 08:15")), Some(d));
        // 2024-03-05T12:00:00Z
        assert_eq!(date_key_from_value(&json!(1_709_640_000_000_i64)), Some(d));
    }

    #[test]
    fn date_key_rejects_garbage() {
        assert_eq!(date_key_from_value(&json!("yesterday")), None);
        assert_eq!(date_key_from_value(&json!("2024-13-01")), None);
        assert_eq!(date_key_from_value(&json!("2024-03-051")), None);
        assert_eq!(date_key_from_value(&json!(null)), None);
        assert_eq!(date_key_from_value(&json!("")), None);
    }

    #[test]
    fn date_key_rejects_years_beyond_four_digits() {
        // 10000-01-01T00:00:00Z
        assert_eq!(date_key_from_value(&json!(253_402_300_800_000_i64)), None);
        // 0000-01-01T00:00:00Z minus one day
        assert_eq!(date_key_from_value(&json!(-62_167_305_600_000_i64)), None);
        let last = NaiveDate::from_ymd_opt(9999, 12, 31).unwrap();
        assert_eq!(date_key_from_value(&json!(253_402_214_400_000_i64)), Some(last));
        assert_eq!(parse_date_key(&format_date_key(last)), Some(last));
    }

    #[test]
    fn stored_status_parse_is_strict() {
        assert_eq!(AttendanceStatus::from_stored("Present"), Some(AttendanceStatus::Present));
        assert_eq!(AttendanceStatus::from_stored("present"), None);
        assert_eq!(AttendanceStatus::from_stored("1"), None);
    }

    #[test]
    fn set_status_overwrites_in_place() {
        let mut sheet = AttendanceSheet::empty("g", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        sheet.set_status("s1", AttendanceStatus::Present);
        sheet.set_status("s2", AttendanceStatus::Present);
        sheet.set_status("s1", AttendanceStatus::Absent);
        assert_eq!(sheet.records.len(), 2);
        assert_eq!(sheet.records[0].student_id, "s1");
        assert_eq!(sheet.records[0].status, AttendanceStatus::Absent);
    }
}
