use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One PAYE band. Bands are cumulative width increments consumed in order,
/// not absolute thresholds; `width_cents = None` marks the final unbounded
/// band. Rates are basis points (1000 = 10%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PayeBand {
    #[schema(example = 2400000, nullable = true)]
    pub width_cents: Option<i64>,

    #[schema(example = 1000)]
    pub rate_bps: i64,
}

/// A fully-typed statutory rule bundle. Immutable once published: updates
/// archive the active version and insert a new one, so entries computed under
/// version N stay reproducible.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RuleSet {
    #[schema(example = 1)]
    pub version: u32,

    #[schema(example = "KE")]
    pub jurisdiction: String,

    pub paye_bands: Vec<PayeBand>,

    #[schema(example = 240000)]
    pub personal_relief_cents: i64,

    #[schema(example = 600000)]
    pub nssf_tier_one_cap_cents: i64,

    #[schema(example = 1800000)]
    pub nssf_tier_two_cap_cents: i64,

    #[schema(example = 600)]
    pub nssf_rate_bps: i64,

    /// Legacy flat tier-one figure. When present it replaces the rate-based
    /// tier-one contribution; the rate-based capped formula is canonical.
    #[schema(example = json!(null), nullable = true)]
    pub nssf_tier_one_fixed_cents: Option<i64>,

    #[schema(example = 275)]
    pub health_levy_bps: i64,

    #[schema(example = 150)]
    pub housing_levy_bps: i64,

    #[schema(example = "2026-01-01T00:00:00Z", format = "date-time", value_type = String)]
    pub effective_from: DateTime<Utc>,

    #[schema(example = json!(null), format = "date-time", value_type = Option<String>)]
    pub effective_until: Option<DateTime<Utc>>,
}

impl RuleSet {
    /// Rejects malformed bundles before they can reach the calculator.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.paye_bands.is_empty() {
            errors.push("paye_bands must not be empty".to_string());
        }
        for (i, band) in self.paye_bands.iter().enumerate() {
            let is_last = i + 1 == self.paye_bands.len();
            match band.width_cents {
                Some(w) if w <= 0 => {
                    errors.push(format!("paye band {} has non-positive width", i));
                }
                None if !is_last => {
                    errors.push(format!("paye band {} is unbounded but not final", i));
                }
                _ => {}
            }
            if is_last && band.width_cents.is_some() {
                errors.push("final paye band must be unbounded".to_string());
            }
            if !(0..=10_000).contains(&band.rate_bps) {
                errors.push(format!("paye band {} rate out of range", i));
            }
        }

        if self.personal_relief_cents < 0 {
            errors.push("personal_relief_cents must be non-negative".to_string());
        }
        if self.nssf_tier_one_cap_cents < 0 || self.nssf_tier_two_cap_cents < 0 {
            errors.push("nssf caps must be non-negative".to_string());
        }
        if self.nssf_tier_one_cap_cents > self.nssf_tier_two_cap_cents {
            errors.push("nssf tier one cap exceeds tier two cap".to_string());
        }
        if !(0..=10_000).contains(&self.nssf_rate_bps) {
            errors.push("nssf_rate_bps out of range".to_string());
        }
        if let Some(fixed) = self.nssf_tier_one_fixed_cents {
            if fixed < 0 {
                errors.push("nssf_tier_one_fixed_cents must be non-negative".to_string());
            }
        }
        if !(0..=10_000).contains(&self.health_levy_bps) {
            errors.push("health_levy_bps out of range".to_string());
        }
        if !(0..=10_000).contains(&self.housing_levy_bps) {
            errors.push("housing_levy_bps out of range".to_string());
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Raw `statutory_rules` row; `paye_bands` is the serialized band list.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct StatutoryRulesRow {
    pub id: u64,
    pub jurisdiction: String,
    pub version: u32,
    pub effective_from: DateTime<Utc>,
    pub effective_until: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub paye_bands: String,
    pub personal_relief_cents: i64,
    pub nssf_tier_one_cap_cents: i64,
    pub nssf_tier_two_cap_cents: i64,
    pub nssf_rate_bps: i64,
    pub nssf_tier_one_fixed_cents: Option<i64>,
    pub health_levy_bps: i64,
    pub housing_levy_bps: i64,
}

impl StatutoryRulesRow {
    pub fn into_rule_set(self) -> Result<RuleSet, String> {
        let paye_bands: Vec<PayeBand> = serde_json::from_str(&self.paye_bands)
            .map_err(|e| format!("stored paye_bands are unreadable: {}", e))?;

        Ok(RuleSet {
            version: self.version,
            jurisdiction: self.jurisdiction,
            paye_bands,
            personal_relief_cents: self.personal_relief_cents,
            nssf_tier_one_cap_cents: self.nssf_tier_one_cap_cents,
            nssf_tier_two_cap_cents: self.nssf_tier_two_cap_cents,
            nssf_rate_bps: self.nssf_rate_bps,
            nssf_tier_one_fixed_cents: self.nssf_tier_one_fixed_cents,
            health_levy_bps: self.health_levy_bps,
            housing_levy_bps: self.housing_levy_bps,
            effective_from: self.effective_from,
            effective_until: self.effective_until,
        })
    }
}

/// Payload for publishing a new rule-set version. The version number and
/// effective window are assigned at publish time, never by the caller.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(
    example = json!({
        "jurisdiction": "KE",
        "paye_bands": [
            { "width_cents": 2400000, "rate_bps": 1000 },
            { "width_cents": 833300, "rate_bps": 2500 },
            { "width_cents": null, "rate_bps": 3000 }
        ],
        "personal_relief_cents": 240000,
        "nssf_tier_one_cap_cents": 600000,
        "nssf_tier_two_cap_cents": 1800000,
        "nssf_rate_bps": 600,
        "nssf_tier_one_fixed_cents": null,
        "health_levy_bps": 275,
        "housing_levy_bps": 150
    })
)]
pub struct RuleSetDraft {
    pub jurisdiction: String,
    pub paye_bands: Vec<PayeBand>,
    pub personal_relief_cents: i64,
    pub nssf_tier_one_cap_cents: i64,
    pub nssf_tier_two_cap_cents: i64,
    pub nssf_rate_bps: i64,
    pub nssf_tier_one_fixed_cents: Option<i64>,
    pub health_levy_bps: i64,
    pub housing_levy_bps: i64,
}

impl RuleSetDraft {
    pub fn into_rule_set(self, version: u32, effective_from: DateTime<Utc>) -> RuleSet {
        RuleSet {
            version,
            jurisdiction: self.jurisdiction,
            paye_bands: self.paye_bands,
            personal_relief_cents: self.personal_relief_cents,
            nssf_tier_one_cap_cents: self.nssf_tier_one_cap_cents,
            nssf_tier_two_cap_cents: self.nssf_tier_two_cap_cents,
            nssf_rate_bps: self.nssf_rate_bps,
            nssf_tier_one_fixed_cents: self.nssf_tier_one_fixed_cents,
            health_levy_bps: self.health_levy_bps,
            housing_levy_bps: self.housing_levy_bps,
            effective_from,
            effective_until: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample() -> RuleSet {
        RuleSet {
            version: 1,
            jurisdiction: "KE".to_string(),
            paye_bands: vec![
                PayeBand { width_cents: Some(24_000), rate_bps: 1_000 },
                PayeBand { width_cents: Some(8_333), rate_bps: 2_500 },
                PayeBand { width_cents: None, rate_bps: 3_000 },
            ],
            personal_relief_cents: 2_400,
            nssf_tier_one_cap_cents: 6_000,
            nssf_tier_two_cap_cents: 18_000,
            nssf_rate_bps: 600,
            nssf_tier_one_fixed_cents: None,
            health_levy_bps: 275,
            housing_levy_bps: 150,
            effective_from: Utc::now(),
            effective_until: None,
        }
    }

    #[test]
    fn well_formed_bundle_passes() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn bounded_final_band_is_rejected() {
        let mut rules = sample();
        rules.paye_bands[2].width_cents = Some(1_000_000);
        let errors = rules.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("final paye band")));
    }

    #[test]
    fn unbounded_middle_band_is_rejected() {
        let mut rules = sample();
        rules.paye_bands[0].width_cents = None;
        let errors = rules.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("unbounded but not final")));
    }

    #[test]
    fn out_of_range_rates_are_rejected() {
        let mut rules = sample();
        rules.paye_bands[0].rate_bps = 10_001;
        rules.health_levy_bps = -1;
        let errors = rules.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn inverted_caps_are_rejected() {
        let mut rules = sample();
        rules.nssf_tier_one_cap_cents = 20_000;
        let errors = rules.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("tier one cap")));
    }

    #[test]
    fn row_round_trips_through_serialized_bands() {
        let rules = sample();
        let row = StatutoryRulesRow {
            id: 1,
            jurisdiction: rules.jurisdiction.clone(),
            version: rules.version,
            effective_from: rules.effective_from,
            effective_until: None,
            is_active: true,
            paye_bands: serde_json::to_string(&rules.paye_bands).unwrap(),
            personal_relief_cents: rules.personal_relief_cents,
            nssf_tier_one_cap_cents: rules.nssf_tier_one_cap_cents,
            nssf_tier_two_cap_cents: rules.nssf_tier_two_cap_cents,
            nssf_rate_bps: rules.nssf_rate_bps,
            nssf_tier_one_fixed_cents: None,
            health_levy_bps: rules.health_levy_bps,
            housing_levy_bps: rules.housing_levy_bps,
        };
        let parsed = row.into_rule_set().unwrap();
        assert_eq!(parsed.paye_bands, rules.paye_bands);
        assert_eq!(parsed.version, 1);
    }
}
