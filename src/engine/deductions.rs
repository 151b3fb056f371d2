//! Gross-to-net statutory deduction calculation.
//!
//! Pure: no I/O, no side effects, never panics on hostile input. Out-of-range
//! results are flagged in the returned `validation` block instead of being
//! thrown, so batch generation can finish and leave flagged entries for
//! review. Ordering is load-bearing: NSSF comes off gross before PAYE because
//! it is a pre-tax deduction.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::engine::money::{BPS_SCALE, apply_rate_bps, round_div};
use crate::model::statutory_rules::RuleSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct NssfBreakdown {
    #[schema(example = 360)]
    pub tier_one: i64,
    #[schema(example = 720)]
    pub tier_two: i64,
    #[schema(example = 1080)]
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CalculationValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

/// Itemized result of one gross-to-net run. Persisted verbatim on the entry
/// so exported figures never need recomputation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DeductionBreakdown {
    /// Rule-set version the figures were computed under.
    #[schema(example = 1)]
    pub rule_version: u32,
    pub nssf: NssfBreakdown,
    #[schema(example = 7059)]
    pub paye: i64,
    #[schema(example = 1375)]
    pub health_levy: i64,
    #[schema(example = 750)]
    pub housing_levy: i64,
    #[schema(example = 10264)]
    pub total_deductions: i64,
    #[schema(example = 39736)]
    pub net_pay: i64,
    #[schema(example = 48920)]
    pub taxable_pay: i64,
    pub validation: CalculationValidation,
}

/// Compute the full deduction breakdown for `basic_pay + allowances`.
///
/// All figures are integer cents. Each published figure is rounded once,
/// half away from zero; PAYE accumulates across bands in a single `i128`
/// accumulator so no intermediate band is rounded separately.
pub fn calculate_deductions(
    basic_pay_cents: i64,
    allowances_cents: i64,
    rules: &RuleSet,
) -> DeductionBreakdown {
    let mut errors = Vec::new();

    if basic_pay_cents < 0 {
        errors.push(format!("basic pay is negative ({} cents)", basic_pay_cents));
    }
    if allowances_cents < 0 {
        errors.push(format!("allowances are negative ({} cents)", allowances_cents));
    }
    let gross = basic_pay_cents.max(0) + allowances_cents.max(0);

    // NSSF: two pensionable-pay tiers under one contribution rate. Tier one
    // may instead be a flat legacy figure carried by old rule versions.
    let tier_one_base = gross.min(rules.nssf_tier_one_cap_cents);
    let tier_two_base = (gross.min(rules.nssf_tier_two_cap_cents) - rules.nssf_tier_one_cap_cents)
        .max(0);

    let nssf = match rules.nssf_tier_one_fixed_cents {
        Some(fixed) => {
            let tier_two = apply_rate_bps(tier_two_base, rules.nssf_rate_bps);
            NssfBreakdown { tier_one: fixed, tier_two, total: fixed + tier_two }
        }
        None => {
            let tier_one_acc = tier_one_base as i128 * rules.nssf_rate_bps as i128;
            let tier_two_acc = tier_two_base as i128 * rules.nssf_rate_bps as i128;
            // total is rounded once from the exact sum; tier two takes the
            // remainder so the itemization always adds up to the total
            let total = round_div(tier_one_acc + tier_two_acc, BPS_SCALE);
            let tier_one = round_div(tier_one_acc, BPS_SCALE);
            NssfBreakdown { tier_one, tier_two: total - tier_one, total }
        }
    };

    // NSSF is a pre-tax deduction
    let taxable_pay = (gross - nssf.total).max(0);

    // PAYE: consume taxable pay band by band; the final unbounded band takes
    // whatever remains.
    let mut remaining = taxable_pay;
    let mut tax_acc: i128 = 0;
    for band in &rules.paye_bands {
        if remaining <= 0 {
            break;
        }
        let taxable_in_band = match band.width_cents {
            Some(width) => remaining.min(width),
            None => remaining,
        };
        tax_acc += taxable_in_band as i128 * band.rate_bps as i128;
        remaining -= taxable_in_band;
    }
    if remaining > 0 {
        errors.push(format!(
            "paye bands do not cover taxable pay; {} cents left untaxed",
            remaining
        ));
    }
    let band_tax = round_div(tax_acc, BPS_SCALE);
    let paye = (band_tax - rules.personal_relief_cents).max(0);

    let health_levy = apply_rate_bps(gross, rules.health_levy_bps);
    let housing_levy = apply_rate_bps(gross, rules.housing_levy_bps);

    let total_deductions = nssf.total + paye + health_levy + housing_levy;
    let mut net_pay = gross - total_deductions;
    if net_pay < 0 {
        // floored, but never silently: the flag is what reviewers act on
        errors.push(format!("net pay would be negative ({} cents)", net_pay));
        net_pay = 0;
    }

    DeductionBreakdown {
        rule_version: rules.version,
        nssf,
        paye,
        health_levy,
        housing_levy,
        total_deductions,
        net_pay,
        taxable_pay,
        validation: CalculationValidation { is_valid: errors.is_empty(), errors },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::statutory_rules::PayeBand;
    use chrono::Utc;

    /// Rule set from the canonical regression trace, amounts taken as cents.
    fn fixture_rules() -> RuleSet {
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
    fn canonical_trace_for_gross_50000() {
        let b = calculate_deductions(50_000, 0, &fixture_rules());

        assert_eq!(b.nssf.tier_one, 360);
        assert_eq!(b.nssf.tier_two, 720);
        assert_eq!(b.nssf.total, 1_080);
        assert_eq!(b.taxable_pay, 48_920);
        // bands: 24_000 @ 10% + 8_333 @ 25% + 16_587 @ 30% = 9_459.35,
        // rounded once, minus 2_400 relief
        assert_eq!(b.paye, 7_059);
        assert_eq!(b.health_levy, 1_375);
        assert_eq!(b.housing_levy, 750);
        assert_eq!(b.total_deductions, 10_264);
        assert_eq!(b.net_pay, 39_736);
        assert!(b.validation.is_valid);
    }

    #[test]
    fn allowances_fold_into_gross_before_anything_else() {
        let with_allowance = calculate_deductions(40_000, 10_000, &fixture_rules());
        let flat = calculate_deductions(50_000, 0, &fixture_rules());
        assert_eq!(with_allowance, flat);
    }

    #[test]
    fn net_plus_deductions_reconstructs_gross_exactly() {
        let rules = fixture_rules();
        for gross in [0, 1, 999, 6_000, 6_001, 18_000, 24_000, 32_333, 50_000, 1_234_567] {
            let b = calculate_deductions(gross, 0, &rules);
            assert!(b.validation.is_valid, "gross {} unexpectedly flagged", gross);
            assert_eq!(
                b.net_pay + b.nssf.total + b.paye + b.health_levy + b.housing_levy,
                gross,
                "residual cent at gross {}",
                gross
            );
            assert_eq!(b.nssf.tier_one + b.nssf.tier_two, b.nssf.total);
        }
    }

    #[test]
    fn tier_two_is_zero_at_or_below_tier_one_cap() {
        let rules = fixture_rules();
        for gross in [0, 1_000, 5_999, 6_000] {
            let b = calculate_deductions(gross, 0, &rules);
            assert_eq!(b.nssf.tier_two, 0, "gross {}", gross);
        }
        assert!(calculate_deductions(6_017, 0, &rules).nssf.tier_two > 0);
    }

    #[test]
    fn paye_is_monotone_and_has_no_band_jumps() {
        let rules = fixture_rules();
        let mut prev = calculate_deductions(0, 0, &rules).paye;
        for gross in 1..=40_000 {
            let cur = calculate_deductions(gross, 0, &rules).paye;
            assert!(cur >= prev, "paye dropped at gross {}", gross);
            // one extra cent of gross can add at most one cent of tax
            assert!(cur - prev <= 1, "paye jumped by {} at gross {}", cur - prev, gross);
            prev = cur;
        }
    }

    #[test]
    fn relief_floors_paye_at_zero() {
        let b = calculate_deductions(10_000, 0, &fixture_rules());
        // band tax on ~9_400 taxable is under the 2_400 relief
        assert_eq!(b.paye, 0);
        assert!(b.validation.is_valid);
    }

    #[test]
    fn legacy_fixed_tier_one_overrides_the_rate() {
        let mut rules = fixture_rules();
        rules.nssf_tier_one_fixed_cents = Some(200);
        let b = calculate_deductions(50_000, 0, &rules);
        assert_eq!(b.nssf.tier_one, 200);
        assert_eq!(b.nssf.tier_two, 720); // tier two stays rate-based
        assert_eq!(b.nssf.total, 920);
        assert_eq!(b.taxable_pay, 49_080);
    }

    #[test]
    fn negative_inputs_are_flagged_not_thrown() {
        let b = calculate_deductions(-5_000, 0, &fixture_rules());
        assert!(!b.validation.is_valid);
        assert!(b.validation.errors[0].contains("basic pay is negative"));
        assert_eq!(b.net_pay, 0);
    }

    #[test]
    fn negative_net_is_floored_and_flagged() {
        let mut rules = fixture_rules();
        rules.nssf_tier_one_fixed_cents = Some(10_000);
        let b = calculate_deductions(5_000, 0, &rules);
        assert_eq!(b.net_pay, 0);
        assert!(!b.validation.is_valid);
        assert!(b.validation.errors.iter().any(|e| e.contains("net pay would be negative")));
    }

    #[test]
    fn uncovered_taxable_pay_is_flagged() {
        let mut rules = fixture_rules();
        // malformed on purpose: every band bounded
        rules.paye_bands = vec![
            PayeBand { width_cents: Some(24_000), rate_bps: 1_000 },
            PayeBand { width_cents: Some(8_333), rate_bps: 2_500 },
        ];
        let b = calculate_deductions(50_000, 0, &rules);
        assert!(!b.validation.is_valid);
        assert!(b.validation.errors.iter().any(|e| e.contains("left untaxed")));
    }

    #[test]
    fn scaled_kes_salary_reproduces_the_trace_times_one_hundred() {
        // 50_000.00 KES in cents against the same rule set scaled to cents
        let mut rules = fixture_rules();
        for band in &mut rules.paye_bands {
            band.width_cents = band.width_cents.map(|w| w * 100);
        }
        rules.personal_relief_cents *= 100;
        rules.nssf_tier_one_cap_cents *= 100;
        rules.nssf_tier_two_cap_cents *= 100;

        let b = calculate_deductions(5_000_000, 0, &rules);
        assert_eq!(b.nssf.total, 108_000);
        assert_eq!(b.taxable_pay, 4_892_000);
        assert_eq!(b.paye, 705_935);
        assert_eq!(b.health_levy, 137_500);
        assert_eq!(b.housing_levy, 75_000);
        assert_eq!(b.net_pay, 3_973_565);
    }
}
