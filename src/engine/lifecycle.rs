//! Payroll period lifecycle: creation and the Draft -> Finalized -> Archived
//! state machine. Transitions are serialized through conditional UPDATEs so two
//! concurrent requests cannot both move the same period.

use chrono::{NaiveDate, Utc};
use serde_json::json;
use sqlx::MySqlPool;

use crate::audit::{self, AuditEvent};
use crate::engine::error::PayrollError;
use crate::model::payroll_period::{PayrollPeriod, PeriodState};

const PERIOD_COLUMNS: &str = "id, organization_id, name, start_date, end_date, total_days, \
     is_finalized, is_archived, finalized_at, finalized_by, archived_at, archived_by";

/// Inclusive day count for a period. Rejects inverted ranges.
pub fn inclusive_day_count(start_date: NaiveDate, end_date: NaiveDate) -> Result<u32, PayrollError> {
    if start_date > end_date {
        return Err(PayrollError::Validation(
            "start_date must not be after end_date".to_string(),
        ));
    }
    Ok(((end_date - start_date).num_days() + 1) as u32)
}

pub async fn fetch_period(
    pool: &MySqlPool,
    organization_id: u64,
    period_id: u64,
) -> Result<PayrollPeriod, PayrollError> {
    let query = format!(
        "SELECT {PERIOD_COLUMNS} FROM payroll_periods WHERE id = ? AND organization_id = ?"
    );
    sqlx::query_as::<_, PayrollPeriod>(&query)
        .bind(period_id)
        .bind(organization_id)
        .fetch_optional(pool)
        .await?
        .ok_or(PayrollError::NotFound("payroll period"))
}

pub async fn create_period(
    pool: &MySqlPool,
    organization_id: u64,
    name: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
    actor_user_id: u64,
) -> Result<PayrollPeriod, PayrollError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(PayrollError::Validation("period name must not be empty".to_string()));
    }
    let total_days = inclusive_day_count(start_date, end_date)?;

    let result = sqlx::query(
        "INSERT INTO payroll_periods (organization_id, name, start_date, end_date, total_days) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(organization_id)
    .bind(name)
    .bind(start_date)
    .bind(end_date)
    .bind(total_days)
    .execute(pool)
    .await?;

    let period = fetch_period(pool, organization_id, result.last_insert_id()).await?;
    audit::record(
        pool,
        organization_id,
        Some(actor_user_id),
        AuditEvent::PeriodCreated,
        json!({ "after": period }),
    )
    .await;
    Ok(period)
}

/// New entries and entry edits are only allowed while the period is a draft.
pub fn ensure_open_for_edits(period: &PayrollPeriod) -> Result<(), PayrollError> {
    match period.state() {
        PeriodState::Draft => Ok(()),
        PeriodState::Finalized => Err(PayrollError::PeriodFinalized),
        PeriodState::Archived => Err(PayrollError::PeriodArchived),
    }
}

/// Payment status may change while the period is a draft or after it is
/// finalized as a correction path, but never on an archived period.
pub fn ensure_payable(period: &PayrollPeriod) -> Result<(), PayrollError> {
    match period.state() {
        PeriodState::Draft | PeriodState::Finalized => Ok(()),
        PeriodState::Archived => Err(PayrollError::PeriodArchived),
    }
}

fn ensure_can_finalize(state: PeriodState) -> Result<(), PayrollError> {
    match state {
        PeriodState::Draft => Ok(()),
        PeriodState::Finalized => Err(PayrollError::PeriodFinalized),
        PeriodState::Archived => Err(PayrollError::PeriodArchived),
    }
}

fn ensure_can_unfinalize(state: PeriodState) -> Result<(), PayrollError> {
    match state {
        PeriodState::Finalized => Ok(()),
        PeriodState::Draft => Err(PayrollError::NotFinalized),
        PeriodState::Archived => Err(PayrollError::PeriodArchived),
    }
}

fn ensure_can_archive(state: PeriodState) -> Result<(), PayrollError> {
    match state {
        PeriodState::Finalized => Ok(()),
        PeriodState::Draft => Err(PayrollError::NotFinalized),
        PeriodState::Archived => Err(PayrollError::PeriodArchived),
    }
}

fn ensure_can_unarchive(state: PeriodState) -> Result<(), PayrollError> {
    match state {
        PeriodState::Archived => Ok(()),
        PeriodState::Draft | PeriodState::Finalized => Err(PayrollError::NotArchived),
    }
}

pub async fn finalize_period(
    pool: &MySqlPool,
    organization_id: u64,
    period_id: u64,
    actor_user_id: u64,
) -> Result<PayrollPeriod, PayrollError> {
    let before = fetch_period(pool, organization_id, period_id).await?;
    ensure_can_finalize(before.state())?;

    let result = sqlx::query(
        "UPDATE payroll_periods SET is_finalized = TRUE, finalized_at = ?, finalized_by = ? \
         WHERE id = ? AND organization_id = ? AND is_finalized = FALSE AND is_archived = FALSE",
    )
    .bind(Utc::now())
    .bind(actor_user_id)
    .bind(period_id)
    .bind(organization_id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        // Lost the race: someone else finalized between the read and the update.
        return Err(PayrollError::PeriodFinalized);
    }

    let after = fetch_period(pool, organization_id, period_id).await?;
    tracing::info!(period_id, organization_id, "Payroll period finalized");
    audit::record(
        pool,
        organization_id,
        Some(actor_user_id),
        AuditEvent::PeriodFinalized,
        json!({ "before": before, "after": after }),
    )
    .await;
    Ok(after)
}

pub async fn unfinalize_period(
    pool: &MySqlPool,
    organization_id: u64,
    period_id: u64,
    actor_user_id: u64,
) -> Result<PayrollPeriod, PayrollError> {
    let before = fetch_period(pool, organization_id, period_id).await?;
    ensure_can_unfinalize(before.state())?;

    let result = sqlx::query(
        "UPDATE payroll_periods SET is_finalized = FALSE, finalized_at = NULL, finalized_by = NULL \
         WHERE id = ? AND organization_id = ? AND is_finalized = TRUE AND is_archived = FALSE",
    )
    .bind(period_id)
    .bind(organization_id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(PayrollError::NotFinalized);
    }

    let after = fetch_period(pool, organization_id, period_id).await?;
    tracing::info!(period_id, organization_id, "Payroll period reopened for edits");
    audit::record(
        pool,
        organization_id,
        Some(actor_user_id),
        AuditEvent::PeriodUnfinalized,
        json!({ "before": before, "after": after }),
    )
    .await;
    Ok(after)
}

pub async fn archive_period(
    pool: &MySqlPool,
    organization_id: u64,
    period_id: u64,
    actor_user_id: u64,
) -> Result<PayrollPeriod, PayrollError> {
    let before = fetch_period(pool, organization_id, period_id).await?;
    ensure_can_archive(before.state())?;

    let result = sqlx::query(
        "UPDATE payroll_periods SET is_archived = TRUE, archived_at = ?, archived_by = ? \
         WHERE id = ? AND organization_id = ? AND is_finalized = TRUE AND is_archived = FALSE",
    )
    .bind(Utc::now())
    .bind(actor_user_id)
    .bind(period_id)
    .bind(organization_id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(PayrollError::NotFinalized);
    }

    let after = fetch_period(pool, organization_id, period_id).await?;
    tracing::info!(period_id, organization_id, "Payroll period archived");
    audit::record(
        pool,
        organization_id,
        Some(actor_user_id),
        AuditEvent::PeriodArchived,
        json!({ "before": before, "after": after }),
    )
    .await;
    Ok(after)
}

pub async fn unarchive_period(
    pool: &MySqlPool,
    organization_id: u64,
    period_id: u64,
    actor_user_id: u64,
) -> Result<PayrollPeriod, PayrollError> {
    let before = fetch_period(pool, organization_id, period_id).await?;
    ensure_can_unarchive(before.state())?;

    let result = sqlx::query(
        "UPDATE payroll_periods SET is_archived = FALSE, archived_at = NULL, archived_by = NULL \
         WHERE id = ? AND organization_id = ? AND is_archived = TRUE",
    )
    .bind(period_id)
    .bind(organization_id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(PayrollError::NotArchived);
    }

    let after = fetch_period(pool, organization_id, period_id).await?;
    tracing::info!(period_id, organization_id, "Payroll period unarchived");
    audit::record(
        pool,
        organization_id,
        Some(actor_user_id),
        AuditEvent::PeriodUnarchived,
        json!({ "before": before, "after": after }),
    )
    .await;
    Ok(after)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn period_in(state: PeriodState) -> PayrollPeriod {
        let (is_finalized, is_archived) = match state {
            PeriodState::Draft => (false, false),
            PeriodState::Finalized => (true, false),
            PeriodState::Archived => (true, true),
        };
        PayrollPeriod {
            id: 1,
            organization_id: 1,
            name: "January 2026".to_string(),
            start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(),
            total_days: 31,
            is_finalized,
            is_archived,
            finalized_at: None,
            finalized_by: None,
            archived_at: None,
            archived_by: None,
        }
    }

    #[test]
    fn day_count_is_inclusive() {
        let jan_1 = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let jan_31 = NaiveDate::from_ymd_opt(2026, 1, 31).unwrap();
        assert_eq!(inclusive_day_count(jan_1, jan_31).unwrap(), 31);
        assert_eq!(inclusive_day_count(jan_1, jan_1).unwrap(), 1);
    }

    #[test]
    fn inverted_range_is_rejected() {
        let jan_1 = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let jan_31 = NaiveDate::from_ymd_opt(2026, 1, 31).unwrap();
        assert!(matches!(
            inclusive_day_count(jan_31, jan_1),
            Err(PayrollError::Validation(_))
        ));
    }

    #[test]
    fn finalize_only_from_draft() {
        assert!(ensure_can_finalize(PeriodState::Draft).is_ok());
        assert!(matches!(
            ensure_can_finalize(PeriodState::Finalized),
            Err(PayrollError::PeriodFinalized)
        ));
        assert!(matches!(
            ensure_can_finalize(PeriodState::Archived),
            Err(PayrollError::PeriodArchived)
        ));
    }

    #[test]
    fn unfinalize_only_from_finalized() {
        assert!(ensure_can_unfinalize(PeriodState::Finalized).is_ok());
        assert!(matches!(
            ensure_can_unfinalize(PeriodState::Draft),
            Err(PayrollError::NotFinalized)
        ));
        assert!(matches!(
            ensure_can_unfinalize(PeriodState::Archived),
            Err(PayrollError::PeriodArchived)
        ));
    }

    #[test]
    fn draft_cannot_be_archived_directly() {
        assert!(matches!(
            ensure_can_archive(PeriodState::Draft),
            Err(PayrollError::NotFinalized)
        ));
        assert!(ensure_can_archive(PeriodState::Finalized).is_ok());
        assert!(matches!(
            ensure_can_archive(PeriodState::Archived),
            Err(PayrollError::PeriodArchived)
        ));
    }

    #[test]
    fn unarchive_only_from_archived() {
        assert!(ensure_can_unarchive(PeriodState::Archived).is_ok());
        assert!(matches!(
            ensure_can_unarchive(PeriodState::Draft),
            Err(PayrollError::NotArchived)
        ));
        assert!(matches!(
            ensure_can_unarchive(PeriodState::Finalized),
            Err(PayrollError::NotArchived)
        ));
    }

    #[test]
    fn edits_blocked_outside_draft() {
        assert!(ensure_open_for_edits(&period_in(PeriodState::Draft)).is_ok());
        assert!(matches!(
            ensure_open_for_edits(&period_in(PeriodState::Finalized)),
            Err(PayrollError::PeriodFinalized)
        ));
        assert!(matches!(
            ensure_open_for_edits(&period_in(PeriodState::Archived)),
            Err(PayrollError::PeriodArchived)
        ));
    }

    #[test]
    fn payment_toggles_allowed_until_archive() {
        assert!(ensure_payable(&period_in(PeriodState::Draft)).is_ok());
        assert!(ensure_payable(&period_in(PeriodState::Finalized)).is_ok());
        assert!(matches!(
            ensure_payable(&period_in(PeriodState::Archived)),
            Err(PayrollError::PeriodArchived)
        ));
    }
}
