use sqlx::MySqlPool;

use crate::model::staff::StaffProfile;

const STAFF_COLUMNS: &str = "id, organization_id, full_name, status, pay_method, \
     monthly_salary_cents, hourly_rate_cents, shift_rate_cents, daily_rate_cents";

/// All active staff for an organization, in id order so batch runs are
/// deterministic.
pub async fn active_staff(
    pool: &MySqlPool,
    organization_id: u64,
) -> Result<Vec<StaffProfile>, sqlx::Error> {
    let query = format!(
        "SELECT {STAFF_COLUMNS} FROM staff WHERE organization_id = ? AND status = 'active' \
         ORDER BY id"
    );
    sqlx::query_as::<_, StaffProfile>(&query)
        .bind(organization_id)
        .fetch_all(pool)
        .await
}

pub async fn staff_by_id(
    pool: &MySqlPool,
    organization_id: u64,
    staff_id: u64,
) -> Result<Option<StaffProfile>, sqlx::Error> {
    let query = format!("SELECT {STAFF_COLUMNS} FROM staff WHERE id = ? AND organization_id = ?");
    sqlx::query_as::<_, StaffProfile>(&query)
        .bind(staff_id)
        .bind(organization_id)
        .fetch_optional(pool)
        .await
}

/// Display names for an organization's staff, used when building exports.
pub async fn names_by_id(
    pool: &MySqlPool,
    organization_id: u64,
) -> Result<Vec<(u64, String)>, sqlx::Error> {
    sqlx::query_as::<_, (u64, String)>(
        "SELECT id, full_name FROM staff WHERE organization_id = ?",
    )
    .bind(organization_id)
    .fetch_all(pool)
    .await
}
