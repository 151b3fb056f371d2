//! Batch payroll generation: one computed entry per active staff member in a
//! draft period. Staff are processed concurrently with a bounded fan-out and
//! one failure never aborts the batch; the report says exactly who was
//! created, skipped, or failed and why.

use std::collections::HashSet;
use std::sync::Arc;

use futures::stream;
use futures_util::StreamExt;
use serde::Serialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::instrument;
use utoipa::ToSchema;

use crate::audit::{self, AuditEvent};
use crate::engine::deductions::{calculate_deductions, DeductionBreakdown};
use crate::engine::error::{is_duplicate_key, PayrollError};
use crate::engine::lifecycle;
use crate::engine::payable::{self, WorkedUnits};
use crate::model::attendance::AttendanceRecord;
use crate::model::payroll_entry::PayrollEntry;
use crate::model::payroll_period::PayrollPeriod;
use crate::model::staff::{PayMethod, StaffProfile};
use crate::model::statutory_rules::RuleSet;
use crate::providers;
use crate::rules;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GenerationFailure {
    #[schema(example = 1007)]
    pub staff_id: u64,
    #[schema(example = "staff 1007 has unknown pay method 'weekly'")]
    pub reason: String,
}

/// Outcome of one generation run. `skipped_existing` counts staff who already
/// had an entry in the period, whether seen up front or lost to a concurrent
/// insert mid-run.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GenerationReport {
    #[schema(example = 12)]
    pub payroll_period_id: u64,
    #[schema(example = 1)]
    pub rule_version: u32,
    #[schema(example = 42)]
    pub staff_considered: usize,
    #[schema(example = 40)]
    pub created: usize,
    #[schema(example = 2)]
    pub skipped_existing: usize,
    pub failed: Vec<GenerationFailure>,
    pub entry_ids: Vec<u64>,
}

/// Figures derived for one staff member before they become a row.
#[derive(Debug)]
pub(crate) struct ComputedFigures {
    pub payable_base_cents: i64,
    pub gross_pay_cents: i64,
    pub breakdown: DeductionBreakdown,
}

/// Gross-to-net for one staff member from already-classified pay units. The
/// entry-update path reuses this with units read back from the stored row.
pub(crate) fn compute_figures(
    method: PayMethod,
    rate_cents: i64,
    units: &WorkedUnits,
    total_days: u32,
    allowances_cents: i64,
    rules: &RuleSet,
) -> ComputedFigures {
    let payable_base_cents =
        payable::resolve_payable_base(method, rate_cents, units.worked_hours, total_days);
    let breakdown = calculate_deductions(payable_base_cents, allowances_cents, rules);
    let gross_pay_cents = payable_base_cents.max(0) + allowances_cents.max(0);
    ComputedFigures { payable_base_cents, gross_pay_cents, breakdown }
}

#[derive(Debug)]
pub(crate) struct ComputedEntry {
    pub staff_id: u64,
    pub base_salary_cents: i64,
    pub pay_method: PayMethod,
    pub units: WorkedUnits,
    pub allowances_total_cents: i64,
    pub figures: ComputedFigures,
}

/// Classifies a staff member's attendance over the period and computes the
/// full set of figures. Fails only on bad pay configuration.
pub(crate) fn compute_entry(
    period: &PayrollPeriod,
    staff: &StaffProfile,
    records: &[AttendanceRecord],
    rules: &RuleSet,
    allowances_cents: i64,
) -> Result<ComputedEntry, PayrollError> {
    let method = staff.pay_method().map_err(PayrollError::Validation)?;
    let units = payable::classify_attendance(records);
    let figures = compute_figures(
        method,
        staff.rate_for(method),
        &units,
        period.total_days,
        allowances_cents,
        rules,
    );
    Ok(ComputedEntry {
        staff_id: staff.id,
        base_salary_cents: staff.monthly_salary_cents,
        pay_method: method,
        units,
        allowances_total_cents: allowances_cents,
        figures,
    })
}

pub(crate) async fn insert_entry(
    pool: &MySqlPool,
    period: &PayrollPeriod,
    entry: &ComputedEntry,
) -> Result<u64, PayrollError> {
    let details = serde_json::to_string(&entry.figures.breakdown)
        .map_err(|e| PayrollError::Internal(format!("failed to serialize deductions: {e}")))?;

    let result = sqlx::query(
        "INSERT INTO payroll_entries (organization_id, payroll_period_id, staff_id, \
         base_salary_cents, pay_method, worked_units, paid_leave_units, unpaid_leave_units, \
         absent_units, payable_base_cents, allowances_total_cents, deductions_total_cents, \
         deduction_details, gross_pay_cents, net_pay_cents) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(period.organization_id)
    .bind(period.id)
    .bind(entry.staff_id)
    .bind(entry.base_salary_cents)
    .bind(entry.pay_method.as_ref())
    .bind(entry.units.worked_hours)
    .bind(entry.units.paid_leave_days)
    .bind(entry.units.unpaid_leave_days)
    .bind(entry.units.absent_days)
    .bind(entry.figures.payable_base_cents)
    .bind(entry.allowances_total_cents)
    .bind(entry.figures.breakdown.total_deductions)
    .bind(&details)
    .bind(entry.figures.gross_pay_cents)
    .bind(entry.figures.breakdown.net_pay)
    .execute(pool)
    .await
    .map_err(|err| {
        if is_duplicate_key(&err) {
            PayrollError::DuplicateEntry { staff_id: entry.staff_id }
        } else {
            PayrollError::Database(err)
        }
    })?;

    Ok(result.last_insert_id())
}

/// Drops staff who already have an entry in the period. Returns the remaining
/// staff and how many were dropped.
pub(crate) fn staff_pending(
    staff: Vec<StaffProfile>,
    existing: &HashSet<u64>,
) -> (Vec<StaffProfile>, usize) {
    let before = staff.len();
    let pending: Vec<StaffProfile> =
        staff.into_iter().filter(|s| !existing.contains(&s.id)).collect();
    let skipped = before - pending.len();
    (pending, skipped)
}

enum StaffOutcome {
    Created { staff_id: u64, entry_id: u64 },
    SkippedDuplicate,
    Failed { staff_id: u64, reason: String },
}

async fn process_one(
    pool: &MySqlPool,
    period: &PayrollPeriod,
    rules: &RuleSet,
    staff: StaffProfile,
) -> StaffOutcome {
    let staff_id = staff.id;
    let records = match providers::attendance::records_between(
        pool,
        period.organization_id,
        staff_id,
        period.start_date,
        period.end_date,
    )
    .await
    {
        Ok(records) => records,
        Err(e) => {
            return StaffOutcome::Failed {
                staff_id,
                reason: format!("attendance lookup failed: {e}"),
            };
        }
    };

    let computed = match compute_entry(period, &staff, &records, rules, 0) {
        Ok(computed) => computed,
        Err(e) => return StaffOutcome::Failed { staff_id, reason: e.to_string() },
    };

    match insert_entry(pool, period, &computed).await {
        Ok(entry_id) => StaffOutcome::Created { staff_id, entry_id },
        // concurrent run or add-staff call got there first
        Err(PayrollError::DuplicateEntry { .. }) => StaffOutcome::SkippedDuplicate,
        Err(e) => StaffOutcome::Failed { staff_id, reason: e.to_string() },
    }
}

/// Generates entries for every active staff member without one. Idempotent:
/// rerunning on the same period only fills gaps. The period must still be a
/// draft.
#[instrument(name = "generate_payroll", skip(pool))]
pub async fn generate_entries(
    pool: &MySqlPool,
    organization_id: u64,
    period_id: u64,
    jurisdiction: &str,
    concurrency: usize,
    actor_user_id: u64,
) -> Result<GenerationReport, PayrollError> {
    let period = lifecycle::fetch_period(pool, organization_id, period_id).await?;
    lifecycle::ensure_open_for_edits(&period)?;

    // One rule resolution per batch so every entry carries the same version.
    let rules = rules::active_rules(pool, jurisdiction).await?;

    let staff = providers::staff::active_staff(pool, organization_id).await?;
    let staff_considered = staff.len();

    let existing: HashSet<u64> = sqlx::query_scalar::<_, u64>(
        "SELECT staff_id FROM payroll_entries WHERE payroll_period_id = ? AND organization_id = ?",
    )
    .bind(period_id)
    .bind(organization_id)
    .fetch_all(pool)
    .await?
    .into_iter()
    .collect();

    let (pending, mut skipped_existing) = staff_pending(staff, &existing);

    let outcomes: Vec<StaffOutcome> = stream::iter(pending.into_iter().map(|staff| {
        let pool = pool.clone();
        let period = period.clone();
        let rules = Arc::clone(&rules);
        async move { process_one(&pool, &period, &rules, staff).await }
    }))
    .buffer_unordered(concurrency.max(1))
    .collect()
    .await;

    let mut created: Vec<(u64, u64)> = Vec::new();
    let mut failed: Vec<GenerationFailure> = Vec::new();
    for outcome in outcomes {
        match outcome {
            StaffOutcome::Created { staff_id, entry_id } => created.push((staff_id, entry_id)),
            StaffOutcome::SkippedDuplicate => skipped_existing += 1,
            StaffOutcome::Failed { staff_id, reason } => {
                tracing::error!(staff_id, reason = %reason, "Payroll entry not generated");
                failed.push(GenerationFailure { staff_id, reason });
            }
        }
    }
    // completion order is nondeterministic; report in staff order
    created.sort_unstable();
    failed.sort_by_key(|f| f.staff_id);

    let report = GenerationReport {
        payroll_period_id: period_id,
        rule_version: rules.version,
        staff_considered,
        created: created.len(),
        skipped_existing,
        entry_ids: created.into_iter().map(|(_, entry_id)| entry_id).collect(),
        failed,
    };

    tracing::info!(
        period_id,
        organization_id,
        rule_version = report.rule_version,
        created = report.created,
        skipped_existing = report.skipped_existing,
        failed = report.failed.len(),
        "Payroll generation finished"
    );
    audit::record(
        pool,
        organization_id,
        Some(actor_user_id),
        AuditEvent::PayrollGenerated,
        json!({
            "payroll_period_id": period_id,
            "rule_version": report.rule_version,
            "staff_considered": report.staff_considered,
            "created": report.created,
            "skipped_existing": report.skipped_existing,
            "failed": report.failed,
        }),
    )
    .await;

    Ok(report)
}

/// Adds a single staff member to a draft period, for example someone hired or
/// reactivated after the batch ran. Same computation path as the batch.
pub async fn add_staff_to_payroll(
    pool: &MySqlPool,
    organization_id: u64,
    period_id: u64,
    staff_id: u64,
    jurisdiction: &str,
    actor_user_id: u64,
) -> Result<PayrollEntry, PayrollError> {
    let period = lifecycle::fetch_period(pool, organization_id, period_id).await?;
    lifecycle::ensure_open_for_edits(&period)?;

    let staff = providers::staff::staff_by_id(pool, organization_id, staff_id)
        .await?
        .ok_or(PayrollError::NotFound("staff member"))?;

    let already: Option<u64> = sqlx::query_scalar::<_, u64>(
        "SELECT id FROM payroll_entries WHERE payroll_period_id = ? AND staff_id = ?",
    )
    .bind(period_id)
    .bind(staff_id)
    .fetch_optional(pool)
    .await?;
    if already.is_some() {
        return Err(PayrollError::DuplicateEntry { staff_id });
    }

    let rules = rules::active_rules(pool, jurisdiction).await?;
    let records = providers::attendance::records_between(
        pool,
        organization_id,
        staff_id,
        period.start_date,
        period.end_date,
    )
    .await?;
    let computed = compute_entry(&period, &staff, &records, &rules, 0)?;
    let entry_id = insert_entry(pool, &period, &computed).await?;

    let entry = super::entries::fetch_entry(pool, organization_id, entry_id).await?;
    tracing::info!(period_id, staff_id, entry_id, "Staff added to payroll");
    audit::record(
        pool,
        organization_id,
        Some(actor_user_id),
        AuditEvent::EntryAdded,
        json!({ "after": entry }),
    )
    .await;
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn full_month_units() -> WorkedUnits {
        // 31 days at 8 hours
        WorkedUnits { worked_hours: 248.0, paid_leave_days: 0, unpaid_leave_days: 0, absent_days: 0 }
    }

    #[test]
    fn pending_filter_drops_existing_staff() {
        let staff = vec![
            profile(1, "fixed", 100),
            profile(2, "fixed", 100),
            profile(3, "fixed", 100),
        ];
        let existing: HashSet<u64> = [2].into_iter().collect();
        let (pending, skipped) = staff_pending(staff, &existing);
        assert_eq!(skipped, 1);
        assert_eq!(pending.iter().map(|s| s.id).collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn full_attendance_prorated_gets_whole_salary() {
        let rules = crate::rules::default_rules("KE", Utc::now());
        let figures = compute_figures(
            PayMethod::Prorated,
            5_000_000,
            &full_month_units(),
            31,
            0,
            &rules,
        );
        assert_eq!(figures.payable_base_cents, 5_000_000);
        assert_eq!(figures.gross_pay_cents, 5_000_000);
        // known gross-to-net under the built-in defaults
        assert_eq!(figures.breakdown.net_pay, 3_973_565);
        assert!(figures.breakdown.validation.is_valid);
    }

    #[test]
    fn half_attendance_prorated_gets_half_salary() {
        let rules = crate::rules::default_rules("KE", Utc::now());
        let units =
            WorkedUnits { worked_hours: 124.0, paid_leave_days: 0, unpaid_leave_days: 0, absent_days: 15 };
        let figures = compute_figures(PayMethod::Prorated, 5_000_000, &units, 31, 0, &rules);
        assert_eq!(figures.payable_base_cents, 2_500_000);
    }

    #[test]
    fn unknown_pay_method_fails_that_staff_only() {
        let rules = crate::rules::default_rules("KE", Utc::now());
        let period = PayrollPeriod {
            id: 1,
            organization_id: 1,
            name: "January 2026".to_string(),
            start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(),
            total_days: 31,
            is_finalized: false,
            is_archived: false,
            finalized_at: None,
            finalized_by: None,
            archived_at: None,
            archived_by: None,
        };
        let staff = profile(9, "weekly", 5_000_000);
        let err = compute_entry(&period, &staff, &[], &rules, 0).unwrap_err();
        assert!(matches!(err, PayrollError::Validation(_)));
        assert!(err.to_string().contains("unknown pay method"));
    }

    #[test]
    fn allowances_raise_gross_but_not_payable_base() {
        let rules = crate::rules::default_rules("KE", Utc::now());
        let figures =
            compute_figures(PayMethod::Fixed, 5_000_000, &full_month_units(), 31, 250_000, &rules);
        assert_eq!(figures.payable_base_cents, 5_000_000);
        assert_eq!(figures.gross_pay_cents, 5_250_000);
    }

    fn profile(id: u64, method: &str, monthly: i64) -> StaffProfile {
        StaffProfile {
            id,
            organization_id: 1,
            full_name: format!("Staff {id}"),
            status: "active".to_string(),
            pay_method: method.to_string(),
            monthly_salary_cents: monthly,
            hourly_rate_cents: 0,
            shift_rate_cents: 0,
            daily_rate_cents: 0,
        }
    }
}
