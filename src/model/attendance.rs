use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumString};

/// Attendance-derived day status as reported by the attendance collaborator.
/// How each status feeds worked/leave/absent units is this engine's policy
/// (see `engine::payable`), not the collaborator's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Worked,
    OnLeave,
    UnpaidLeave,
    Absent,
    NoShow,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AttendanceRecord {
    pub id: u64,
    pub organization_id: u64,
    pub staff_id: u64,
    pub date: NaiveDate,
    pub status: String,
    /// Hours actually worked that day; absent on older records, which then
    /// count as a nominal 8-hour day.
    pub total_hours: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_collaborator_strings() {
        assert_eq!("present".parse::<AttendanceStatus>().unwrap(), AttendanceStatus::Present);
        assert_eq!("on_leave".parse::<AttendanceStatus>().unwrap(), AttendanceStatus::OnLeave);
        assert_eq!("no_show".parse::<AttendanceStatus>().unwrap(), AttendanceStatus::NoShow);
        assert!("vacationing".parse::<AttendanceStatus>().is_err());
    }
}
