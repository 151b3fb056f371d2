use anyhow::Result;
use sqlx::MySqlPool;
use strum_macros::AsRefStr;
use uuid::Uuid;

/// Event types written to the audit trail. Stored as snake_case strings so the
/// table stays queryable without a lookup join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum AuditEvent {
    PeriodCreated,
    PeriodFinalized,
    PeriodUnfinalized,
    PeriodArchived,
    PeriodUnarchived,
    PayrollGenerated,
    EntryAdded,
    EntryUpdated,
    EntryMarkedPaid,
    EntryUnmarkedPaid,
    RulesPublished,
    RulesSeeded,
}

/// Records an audit event. The trail is best-effort: a failed write is logged
/// and dropped so it can never fail the operation it describes.
pub async fn record(
    pool: &MySqlPool,
    organization_id: u64,
    actor_user_id: Option<u64>,
    event: AuditEvent,
    payload: serde_json::Value,
) {
    if let Err(err) = insert_event(pool, organization_id, actor_user_id, event, &payload).await {
        tracing::warn!(
            event_type = event.as_ref(),
            organization_id,
            error = %err,
            "Failed to record audit event; dropping it"
        );
    }
}

async fn insert_event(
    pool: &MySqlPool,
    organization_id: u64,
    actor_user_id: Option<u64>,
    event: AuditEvent,
    payload: &serde_json::Value,
) -> Result<()> {
    let event_id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO audit_events (event_id, organization_id, actor_user_id, event_type, payload) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&event_id)
    .bind(organization_id)
    .bind(actor_user_id)
    .bind(event.as_ref())
    .bind(payload.to_string())
    .execute(pool)
    .await?;

    tracing::debug!(
        event_id = %event_id,
        event_type = event.as_ref(),
        organization_id,
        "Audit event recorded"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_types_serialize_as_snake_case() {
        assert_eq!(AuditEvent::PeriodCreated.as_ref(), "period_created");
        assert_eq!(AuditEvent::PayrollGenerated.as_ref(), "payroll_generated");
        assert_eq!(AuditEvent::EntryMarkedPaid.as_ref(), "entry_marked_paid");
        assert_eq!(AuditEvent::RulesPublished.as_ref(), "rules_published");
    }
}
