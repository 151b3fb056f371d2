//! Statutory rule-set storage: versioned, append-only rows per jurisdiction
//! with exactly one active version at a time. Reads go through an in-process
//! cache; publishing archives the current version and invalidates it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::MySqlPool;

use crate::audit::{self, AuditEvent};
use crate::engine::error::{is_duplicate_key, PayrollError};
use crate::model::statutory_rules::{PayeBand, RuleSet, RuleSetDraft, StatutoryRulesRow};
use crate::utils::rules_cache;

const RULES_COLUMNS: &str = "id, jurisdiction, version, effective_from, effective_until, \
     is_active, paye_bands, personal_relief_cents, nssf_tier_one_cap_cents, \
     nssf_tier_two_cap_cents, nssf_rate_bps, nssf_tier_one_fixed_cents, health_levy_bps, \
     housing_levy_bps";

/// Built-in first version, published automatically when a jurisdiction has no
/// rows at all. Figures follow the Kenyan 2024 statutory tables: PAYE 10/25/30
/// percent bands, KES 2,400 personal relief, NSSF tier caps at KES 6,000 and
/// 18,000 with a 6 percent rate, SHIF 2.75 percent, housing levy 1.5 percent.
pub fn default_rules(jurisdiction: &str, effective_from: DateTime<Utc>) -> RuleSet {
    RuleSet {
        version: 1,
        jurisdiction: jurisdiction.to_string(),
        paye_bands: vec![
            PayeBand { width_cents: Some(2_400_000), rate_bps: 1_000 },
            PayeBand { width_cents: Some(833_300), rate_bps: 2_500 },
            PayeBand { width_cents: None, rate_bps: 3_000 },
        ],
        personal_relief_cents: 240_000,
        nssf_tier_one_cap_cents: 600_000,
        nssf_tier_two_cap_cents: 1_800_000,
        nssf_rate_bps: 600,
        nssf_tier_one_fixed_cents: None,
        health_levy_bps: 275,
        housing_levy_bps: 150,
        effective_from,
        effective_until: None,
    }
}

/// Active rules for a jurisdiction, cached. Every payroll computation resolves
/// its rule set through here. A jurisdiction with no rows at all gets the
/// built-in default seeded on first use.
pub async fn active_rules(
    pool: &MySqlPool,
    jurisdiction: &str,
) -> Result<Arc<RuleSet>, PayrollError> {
    if let Some(cached) = rules_cache::get(jurisdiction).await {
        return Ok(cached);
    }
    let rules = match fetch_active(pool, jurisdiction, Utc::now()).await {
        Ok(rules) => rules,
        Err(PayrollError::NotFound(_)) => {
            ensure_seeded(pool, jurisdiction)
                .await
                .map_err(|e| PayrollError::Internal(e.to_string()))?;
            fetch_active(pool, jurisdiction, Utc::now()).await?
        }
        Err(err) => return Err(err),
    };
    rules_cache::store(&rules).await;
    Ok(Arc::new(rules))
}

/// Uncached lookup of the version in force at a given instant.
pub async fn fetch_active(
    pool: &MySqlPool,
    jurisdiction: &str,
    as_of: DateTime<Utc>,
) -> Result<RuleSet, PayrollError> {
    let query = format!(
        "SELECT {RULES_COLUMNS} FROM statutory_rules \
         WHERE jurisdiction = ? AND is_active = TRUE AND effective_from <= ? \
           AND (effective_until IS NULL OR effective_until > ?) \
         ORDER BY version DESC LIMIT 1"
    );
    let row = sqlx::query_as::<_, StatutoryRulesRow>(&query)
        .bind(jurisdiction)
        .bind(as_of)
        .bind(as_of)
        .fetch_optional(pool)
        .await?
        .ok_or(PayrollError::NotFound("active statutory rules"))?;
    row.into_rule_set().map_err(PayrollError::Internal)
}

/// Full version history for a jurisdiction, newest first.
pub async fn list_rules(
    pool: &MySqlPool,
    jurisdiction: &str,
) -> Result<Vec<RuleSet>, PayrollError> {
    let query = format!(
        "SELECT {RULES_COLUMNS} FROM statutory_rules WHERE jurisdiction = ? ORDER BY version DESC"
    );
    let rows = sqlx::query_as::<_, StatutoryRulesRow>(&query)
        .bind(jurisdiction)
        .fetch_all(pool)
        .await?;
    rows.into_iter()
        .map(|row| row.into_rule_set().map_err(PayrollError::Internal))
        .collect()
}

/// Publishes a new version: validates, archives the current active version
/// with `effective_until` set to now, and inserts `max(version) + 1`. The
/// whole step runs in one transaction with the jurisdiction's version range
/// locked, so two publishers cannot both produce the same version number.
pub async fn publish_rules(
    pool: &MySqlPool,
    organization_id: u64,
    actor_user_id: u64,
    draft: RuleSetDraft,
) -> Result<RuleSet, PayrollError> {
    let jurisdiction = draft.jurisdiction.trim().to_uppercase();
    if jurisdiction.is_empty() || jurisdiction.len() > 8 {
        return Err(PayrollError::Validation(
            "jurisdiction must be 1 to 8 characters".to_string(),
        ));
    }

    let now = Utc::now();
    let mut candidate = draft;
    candidate.jurisdiction = jurisdiction.clone();
    let candidate = candidate.into_rule_set(0, now);
    if let Err(errors) = candidate.validate() {
        return Err(PayrollError::Validation(errors.join("; ")));
    }

    let mut tx = pool.begin().await?;

    let (max_version,): (i64,) = sqlx::query_as(
        "SELECT CAST(COALESCE(MAX(version), 0) AS SIGNED) FROM statutory_rules \
         WHERE jurisdiction = ? FOR UPDATE",
    )
    .bind(&jurisdiction)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        "UPDATE statutory_rules SET is_active = FALSE, effective_until = ? \
         WHERE jurisdiction = ? AND is_active = TRUE",
    )
    .bind(now)
    .bind(&jurisdiction)
    .execute(&mut *tx)
    .await?;

    let published = RuleSet { version: (max_version + 1) as u32, ..candidate };
    insert_rule_set(&mut *tx, &published).await?;

    tx.commit().await?;

    rules_cache::invalidate(&jurisdiction).await;
    rules_cache::store(&published).await;

    tracing::info!(
        jurisdiction = %jurisdiction,
        version = published.version,
        "Published statutory rule set"
    );
    audit::record(
        pool,
        organization_id,
        Some(actor_user_id),
        AuditEvent::RulesPublished,
        json!({ "after": published }),
    )
    .await;
    Ok(published)
}

/// Startup guard: publishes the built-in default as version 1 when the
/// jurisdiction has no rows at all. A concurrent instance doing the same loses
/// on the `(jurisdiction, version)` unique key, which is fine.
pub async fn ensure_seeded(pool: &MySqlPool, jurisdiction: &str) -> anyhow::Result<()> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM statutory_rules WHERE jurisdiction = ?")
            .bind(jurisdiction)
            .fetch_one(pool)
            .await?;
    if count > 0 {
        return Ok(());
    }

    let defaults = default_rules(jurisdiction, Utc::now());
    match insert_rule_set(pool, &defaults).await {
        Ok(()) => {
            log::info!("Seeded default statutory rules for jurisdiction {}", jurisdiction);
            audit::record(pool, 0, None, AuditEvent::RulesSeeded, json!({ "after": defaults }))
                .await;
            Ok(())
        }
        Err(PayrollError::Database(err)) if is_duplicate_key(&err) => {
            log::info!(
                "Statutory rules for {} already seeded by another instance",
                jurisdiction
            );
            Ok(())
        }
        Err(err) => Err(anyhow::anyhow!(err)),
    }
}

async fn insert_rule_set<'e, E>(executor: E, rules: &RuleSet) -> Result<(), PayrollError>
where
    E: sqlx::Executor<'e, Database = sqlx::MySql>,
{
    let bands_json = serde_json::to_string(&rules.paye_bands)
        .map_err(|e| PayrollError::Internal(format!("failed to serialize paye bands: {e}")))?;
    sqlx::query(
        "INSERT INTO statutory_rules (jurisdiction, version, effective_from, effective_until, \
         is_active, paye_bands, personal_relief_cents, nssf_tier_one_cap_cents, \
         nssf_tier_two_cap_cents, nssf_rate_bps, nssf_tier_one_fixed_cents, health_levy_bps, \
         housing_levy_bps) \
         VALUES (?, ?, ?, ?, TRUE, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&rules.jurisdiction)
    .bind(rules.version)
    .bind(rules.effective_from)
    .bind(rules.effective_until)
    .bind(&bands_json)
    .bind(rules.personal_relief_cents)
    .bind(rules.nssf_tier_one_cap_cents)
    .bind(rules.nssf_tier_two_cap_cents)
    .bind(rules.nssf_rate_bps)
    .bind(rules.nssf_tier_one_fixed_cents)
    .bind(rules.health_levy_bps)
    .bind(rules.housing_levy_bps)
    .execute(executor)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_defaults_pass_validation() {
        let rules = default_rules("KE", Utc::now());
        assert!(rules.validate().is_ok());
        assert_eq!(rules.version, 1);
        assert_eq!(rules.paye_bands.len(), 3);
        assert!(rules.paye_bands.last().unwrap().width_cents.is_none());
    }

    #[test]
    fn draft_versioning_is_service_assigned() {
        let draft = RuleSetDraft {
            jurisdiction: "KE".to_string(),
            paye_bands: default_rules("KE", Utc::now()).paye_bands,
            personal_relief_cents: 240_000,
            nssf_tier_one_cap_cents: 600_000,
            nssf_tier_two_cap_cents: 1_800_000,
            nssf_rate_bps: 600,
            nssf_tier_one_fixed_cents: None,
            health_levy_bps: 275,
            housing_levy_bps: 150,
        };
        let at = Utc::now();
        let rules = draft.into_rule_set(4, at);
        assert_eq!(rules.version, 4);
        assert_eq!(rules.effective_from, at);
        assert!(rules.effective_until.is_none());
    }
}
