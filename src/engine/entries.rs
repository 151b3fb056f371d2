//! Reads and mutations for individual payroll entries: recompute on edit,
//! and the paid/unpaid toggle, which stays open until the period is archived.

use chrono::Utc;
use serde_json::json;
use sqlx::MySqlPool;

use crate::audit::{self, AuditEvent};
use crate::engine::error::PayrollError;
use crate::engine::generator;
use crate::engine::lifecycle;
use crate::engine::payable::WorkedUnits;
use crate::model::payroll_entry::PayrollEntry;
use crate::model::staff::PayMethod;
use crate::providers;
use crate::rules;

const ENTRY_COLUMNS: &str = "id, organization_id, payroll_period_id, staff_id, \
     base_salary_cents, pay_method, worked_units, paid_leave_units, unpaid_leave_units, \
     absent_units, payable_base_cents, allowances_total_cents, deductions_total_cents, \
     deduction_details, gross_pay_cents, net_pay_cents, is_paid, paid_at, payment_reference";

pub async fn fetch_entry(
    pool: &MySqlPool,
    organization_id: u64,
    entry_id: u64,
) -> Result<PayrollEntry, PayrollError> {
    let query = format!(
        "SELECT {ENTRY_COLUMNS} FROM payroll_entries WHERE id = ? AND organization_id = ?"
    );
    sqlx::query_as::<_, PayrollEntry>(&query)
        .bind(entry_id)
        .bind(organization_id)
        .fetch_optional(pool)
        .await?
        .ok_or(PayrollError::NotFound("payroll entry"))
}

/// All entries in a period, in staff order so listings and exports line up.
pub async fn list_entries(
    pool: &MySqlPool,
    organization_id: u64,
    period_id: u64,
) -> Result<Vec<PayrollEntry>, PayrollError> {
    let query = format!(
        "SELECT {ENTRY_COLUMNS} FROM payroll_entries \
         WHERE payroll_period_id = ? AND organization_id = ? ORDER BY staff_id"
    );
    Ok(sqlx::query_as::<_, PayrollEntry>(&query)
        .bind(period_id)
        .bind(organization_id)
        .fetch_all(pool)
        .await?)
}

/// One page of entries for a period, in staff order.
pub async fn list_entries_page(
    pool: &MySqlPool,
    organization_id: u64,
    period_id: u64,
    limit: i64,
    offset: i64,
) -> Result<Vec<PayrollEntry>, PayrollError> {
    let query = format!(
        "SELECT {ENTRY_COLUMNS} FROM payroll_entries \
         WHERE payroll_period_id = ? AND organization_id = ? \
         ORDER BY staff_id LIMIT ? OFFSET ?"
    );
    Ok(sqlx::query_as::<_, PayrollEntry>(&query)
        .bind(period_id)
        .bind(organization_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?)
}

pub async fn count_entries(
    pool: &MySqlPool,
    organization_id: u64,
    period_id: u64,
) -> Result<i64, PayrollError> {
    Ok(sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM payroll_entries \
         WHERE payroll_period_id = ? AND organization_id = ?",
    )
    .bind(period_id)
    .bind(organization_id)
    .fetch_one(pool)
    .await?)
}

pub async fn entry_for_staff(
    pool: &MySqlPool,
    organization_id: u64,
    period_id: u64,
    staff_id: u64,
) -> Result<PayrollEntry, PayrollError> {
    let query = format!(
        "SELECT {ENTRY_COLUMNS} FROM payroll_entries \
         WHERE payroll_period_id = ? AND staff_id = ? AND organization_id = ?"
    );
    sqlx::query_as::<_, PayrollEntry>(&query)
        .bind(period_id)
        .bind(staff_id)
        .bind(organization_id)
        .fetch_optional(pool)
        .await?
        .ok_or(PayrollError::NotFound("payroll entry"))
}

/// Pay units as they were captured at generation time. Edits recompute from
/// these, never from live attendance, so a correction does not silently pick
/// up attendance changes made after the run.
fn stored_units(entry: &PayrollEntry) -> WorkedUnits {
    WorkedUnits {
        worked_hours: entry.worked_units,
        paid_leave_days: entry.paid_leave_units,
        unpaid_leave_days: entry.unpaid_leave_units,
        absent_days: entry.absent_units,
    }
}

fn resolved_method(
    stored: &str,
    requested: Option<PayMethod>,
) -> Result<PayMethod, PayrollError> {
    match requested {
        Some(method) => Ok(method),
        None => stored.parse::<PayMethod>().map_err(|_| {
            PayrollError::Internal(format!("stored pay method '{stored}' is unreadable"))
        }),
    }
}

/// Re-prices an entry in a draft period. Worked units stay as stored; the pay
/// method and allowances may change, and rates plus statutory rules are taken
/// as of now.
pub async fn update_entry(
    pool: &MySqlPool,
    organization_id: u64,
    entry_id: u64,
    jurisdiction: &str,
    pay_method: Option<PayMethod>,
    allowances_cents: Option<i64>,
    actor_user_id: u64,
) -> Result<PayrollEntry, PayrollError> {
    let before = fetch_entry(pool, organization_id, entry_id).await?;
    let period = lifecycle::fetch_period(pool, organization_id, before.payroll_period_id).await?;
    lifecycle::ensure_open_for_edits(&period)?;

    let method = resolved_method(&before.pay_method, pay_method)?;
    let allowances = allowances_cents.unwrap_or(before.allowances_total_cents);
    if allowances < 0 {
        return Err(PayrollError::Validation("allowances_cents must be non-negative".to_string()));
    }

    let staff = providers::staff::staff_by_id(pool, organization_id, before.staff_id)
        .await?
        .ok_or(PayrollError::NotFound("staff member"))?;
    let rules = rules::active_rules(pool, jurisdiction).await?;

    let units = stored_units(&before);
    let figures = generator::compute_figures(
        method,
        staff.rate_for(method),
        &units,
        period.total_days,
        allowances,
        &rules,
    );
    let details = serde_json::to_string(&figures.breakdown)
        .map_err(|e| PayrollError::Internal(format!("failed to serialize deductions: {e}")))?;

    sqlx::query(
        "UPDATE payroll_entries SET base_salary_cents = ?, pay_method = ?, \
         payable_base_cents = ?, allowances_total_cents = ?, deductions_total_cents = ?, \
         deduction_details = ?, gross_pay_cents = ?, net_pay_cents = ? \
         WHERE id = ? AND organization_id = ?",
    )
    .bind(staff.monthly_salary_cents)
    .bind(method.as_ref())
    .bind(figures.payable_base_cents)
    .bind(allowances)
    .bind(figures.breakdown.total_deductions)
    .bind(&details)
    .bind(figures.gross_pay_cents)
    .bind(figures.breakdown.net_pay)
    .bind(entry_id)
    .bind(organization_id)
    .execute(pool)
    .await?;

    let after = fetch_entry(pool, organization_id, entry_id).await?;
    tracing::info!(entry_id, staff_id = after.staff_id, "Payroll entry repriced");
    audit::record(
        pool,
        organization_id,
        Some(actor_user_id),
        AuditEvent::EntryUpdated,
        json!({ "before": before, "after": after }),
    )
    .await;
    Ok(after)
}

/// Marks an entry paid. Allowed on draft and finalized periods but not on
/// archived ones, and refuses a double mark so a payment reference is never
/// silently overwritten.
pub async fn mark_entry_paid(
    pool: &MySqlPool,
    organization_id: u64,
    entry_id: u64,
    payment_reference: Option<String>,
    actor_user_id: u64,
) -> Result<PayrollEntry, PayrollError> {
    if let Some(reference) = payment_reference.as_deref() {
        if reference.len() > 120 {
            return Err(PayrollError::Validation(
                "payment_reference must be at most 120 characters".to_string(),
            ));
        }
    }

    let before = fetch_entry(pool, organization_id, entry_id).await?;
    let period = lifecycle::fetch_period(pool, organization_id, before.payroll_period_id).await?;
    lifecycle::ensure_payable(&period)?;

    let result = sqlx::query(
        "UPDATE payroll_entries SET is_paid = TRUE, paid_at = ?, payment_reference = ? \
         WHERE id = ? AND organization_id = ? AND is_paid = FALSE",
    )
    .bind(Utc::now())
    .bind(&payment_reference)
    .bind(entry_id)
    .bind(organization_id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(PayrollError::Validation(
            "payroll entry is already marked as paid".to_string(),
        ));
    }

    let after = fetch_entry(pool, organization_id, entry_id).await?;
    tracing::info!(entry_id, staff_id = after.staff_id, "Payroll entry marked paid");
    audit::record(
        pool,
        organization_id,
        Some(actor_user_id),
        AuditEvent::EntryMarkedPaid,
        json!({ "before": before, "after": after }),
    )
    .await;
    Ok(after)
}

/// Reverts a mistaken payment mark, clearing the timestamp and reference.
pub async fn unmark_entry_paid(
    pool: &MySqlPool,
    organization_id: u64,
    entry_id: u64,
    actor_user_id: u64,
) -> Result<PayrollEntry, PayrollError> {
    let before = fetch_entry(pool, organization_id, entry_id).await?;
    let period = lifecycle::fetch_period(pool, organization_id, before.payroll_period_id).await?;
    lifecycle::ensure_payable(&period)?;

    let result = sqlx::query(
        "UPDATE payroll_entries SET is_paid = FALSE, paid_at = NULL, payment_reference = NULL \
         WHERE id = ? AND organization_id = ? AND is_paid = TRUE",
    )
    .bind(entry_id)
    .bind(organization_id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(PayrollError::Validation(
            "payroll entry is not marked as paid".to_string(),
        ));
    }

    let after = fetch_entry(pool, organization_id, entry_id).await?;
    tracing::info!(entry_id, staff_id = after.staff_id, "Payroll entry payment reverted");
    audit::record(
        pool,
        organization_id,
        Some(actor_user_id),
        AuditEvent::EntryUnmarkedPaid,
        json!({ "before": before, "after": after }),
    )
    .await;
    Ok(after)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> PayrollEntry {
        PayrollEntry {
            id: 1,
            organization_id: 1,
            payroll_period_id: 12,
            staff_id: 1001,
            base_salary_cents: 5_000_000,
            pay_method: "prorated".to_string(),
            worked_units: 160.0,
            paid_leave_units: 2,
            unpaid_leave_units: 1,
            absent_units: 0,
            payable_base_cents: 3_225_806,
            allowances_total_cents: 0,
            deductions_total_cents: 0,
            deduction_details: None,
            gross_pay_cents: 3_225_806,
            net_pay_cents: 3_225_806,
            is_paid: false,
            paid_at: None,
            payment_reference: None,
        }
    }

    #[test]
    fn stored_units_round_trip_the_row() {
        let units = stored_units(&entry());
        assert_eq!(units.worked_hours, 160.0);
        assert_eq!(units.paid_leave_days, 2);
        assert_eq!(units.unpaid_leave_days, 1);
        assert_eq!(units.absent_days, 0);
    }

    #[test]
    fn method_defaults_to_stored_value() {
        assert_eq!(resolved_method("prorated", None).unwrap(), PayMethod::Prorated);
        assert_eq!(
            resolved_method("prorated", Some(PayMethod::Hourly)).unwrap(),
            PayMethod::Hourly
        );
        assert!(matches!(
            resolved_method("weekly", None),
            Err(PayrollError::Internal(_))
        ));
    }
}
