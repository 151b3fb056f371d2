//! Integer-cents arithmetic helpers.
//!
//! Every monetary figure in this service is an `i64` amount of minor units
//! (cents). Percentage rates travel as basis points (1 bps = 0.01%), so a
//! rate application is a pure integer multiply followed by a single division.
//! Rounding is half away from zero and happens exactly once per published
//! figure; intermediate accumulation stays in `i128`.

/// One hundred percent, in basis points.
pub const BPS_SCALE: i128 = 10_000;

/// Divide with round-half-away-from-zero. `den` must be positive.
pub fn round_div(num: i128, den: i128) -> i64 {
    debug_assert!(den > 0);
    let half = den / 2;
    let rounded = if num >= 0 {
        (num + half) / den
    } else {
        -((-num + half) / den)
    };
    rounded as i64
}

/// Apply a basis-point rate to an amount of cents, rounding once.
pub fn apply_rate_bps(amount_cents: i64, rate_bps: i64) -> i64 {
    round_div(amount_cents as i128 * rate_bps as i128, BPS_SCALE)
}

/// Render cents as a decimal string, e.g. `12345` -> `"123.45"`.
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_div_rounds_half_away_from_zero() {
        assert_eq!(round_div(5_000, 10_000), 1); // 0.5 -> 1
        assert_eq!(round_div(4_999, 10_000), 0);
        assert_eq!(round_div(-5_000, 10_000), -1); // -0.5 -> -1
        assert_eq!(round_div(-4_999, 10_000), 0);
        assert_eq!(round_div(94_593_500, 10_000), 9459); // 9459.35 -> 9459
        assert_eq!(round_div(94_595_000, 10_000), 9460); // 9459.50 -> 9460
    }

    #[test]
    fn apply_rate_matches_hand_computed_levies() {
        // 2.75% of 50_000 cents
        assert_eq!(apply_rate_bps(50_000, 275), 1_375);
        // 1.5% of 50_000 cents
        assert_eq!(apply_rate_bps(50_000, 150), 750);
        // 6% of 6_000 cents
        assert_eq!(apply_rate_bps(6_000, 600), 360);
        assert_eq!(apply_rate_bps(0, 600), 0);
    }

    #[test]
    fn apply_rate_survives_large_amounts() {
        // 35% of ten billion cents, no overflow through the i128 path
        assert_eq!(apply_rate_bps(1_000_000_000_000, 3_500), 350_000_000_000);
    }

    #[test]
    fn format_cents_renders_major_minor() {
        assert_eq!(format_cents(0), "0.00");
        assert_eq!(format_cents(5), "0.05");
        assert_eq!(format_cents(12_345), "123.45");
        assert_eq!(format_cents(-12_345), "-123.45");
        assert_eq!(format_cents(3_973_565), "39735.65");
    }
}
