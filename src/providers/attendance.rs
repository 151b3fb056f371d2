use chrono::NaiveDate;
use sqlx::MySqlPool;

use crate::model::attendance::AttendanceRecord;

/// Attendance records for one staff member inside a date window, both ends
/// inclusive.
pub async fn records_between(
    pool: &MySqlPool,
    organization_id: u64,
    staff_id: u64,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<Vec<AttendanceRecord>, sqlx::Error> {
    sqlx::query_as::<_, AttendanceRecord>(
        "SELECT id, organization_id, staff_id, date, status, total_hours \
         FROM attendance_records \
         WHERE organization_id = ? AND staff_id = ? AND date BETWEEN ? AND ? \
         ORDER BY date",
    )
    .bind(organization_id)
    .bind(staff_id)
    .bind(start_date)
    .bind(end_date)
    .fetch_all(pool)
    .await
}
