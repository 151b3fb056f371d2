//! Pre-deduction payable amount for one staff member in one period.
//!
//! Classification of raw attendance records into worked/leave/absent units is
//! a pay policy and therefore lives here, not with the attendance
//! collaborator. Monetary math converts worked hours to whole minutes once
//! and stays in integer cents from there.

use serde::Serialize;

use crate::engine::money::round_div;
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::model::staff::PayMethod;

/// Nominal workday used as the proration and shift denominator.
pub const NOMINAL_DAY_MINUTES: i64 = 8 * 60;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct WorkedUnits {
    pub worked_hours: f64,
    pub paid_leave_days: u32,
    pub unpaid_leave_days: u32,
    pub absent_days: u32,
}

/// Fold attendance records into pay units. Unrecognized statuses are logged
/// and skipped rather than guessed into a pay-affecting bucket.
pub fn classify_attendance(records: &[AttendanceRecord]) -> WorkedUnits {
    let mut units = WorkedUnits::default();
    for record in records {
        match record.status.parse::<AttendanceStatus>() {
            Ok(AttendanceStatus::Present | AttendanceStatus::Worked) => {
                // older records carry no hours; count a nominal day
                units.worked_hours += record.total_hours.unwrap_or(8.0);
            }
            Ok(AttendanceStatus::OnLeave) => units.paid_leave_days += 1,
            Ok(AttendanceStatus::UnpaidLeave) => units.unpaid_leave_days += 1,
            Ok(AttendanceStatus::Absent | AttendanceStatus::NoShow) => units.absent_days += 1,
            Err(_) => {
                tracing::warn!(
                    staff_id = record.staff_id,
                    date = %record.date,
                    status = %record.status,
                    "Unrecognized attendance status; record skipped"
                );
            }
        }
    }
    units
}

fn worked_minutes(worked_hours: f64) -> i64 {
    (worked_hours * 60.0).round() as i64
}

/// Resolve the payable base in cents for the given pay method and rate.
///
/// `rate_cents` is the configured rate backing the method (monthly salary for
/// `Fixed`/`Prorated`, hourly rate for `Hourly`, shift rate for `PerShift`).
/// Rounding is half away from zero, once per figure; the deduction
/// calculator downstream flags anything out of range.
pub fn resolve_payable_base(
    method: PayMethod,
    rate_cents: i64,
    worked_hours: f64,
    total_days: u32,
) -> i64 {
    let minutes = worked_minutes(worked_hours).max(0);
    match method {
        PayMethod::Fixed => rate_cents,
        PayMethod::Prorated => {
            let nominal_minutes = total_days as i128 * NOMINAL_DAY_MINUTES as i128;
            if nominal_minutes == 0 {
                return 0;
            }
            round_div(rate_cents as i128 * minutes as i128, nominal_minutes)
        }
        PayMethod::Hourly => round_div(rate_cents as i128 * minutes as i128, 60),
        PayMethod::PerShift => {
            round_div(rate_cents as i128 * minutes as i128, NOMINAL_DAY_MINUTES as i128)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(status: &str, hours: Option<f64>) -> AttendanceRecord {
        AttendanceRecord {
            id: 1,
            organization_id: 1,
            staff_id: 42,
            date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            status: status.to_string(),
            total_hours: hours,
        }
    }

    #[test]
    fn classification_buckets_each_status() {
        let records = vec![
            record("present", Some(7.5)),
            record("worked", None), // nominal 8h
            record("on_leave", None),
            record("unpaid_leave", None),
            record("absent", None),
            record("no_show", None),
            record("vacationing", Some(8.0)), // unknown: skipped
        ];
        let units = classify_attendance(&records);
        assert_eq!(units.worked_hours, 15.5);
        assert_eq!(units.paid_leave_days, 1);
        assert_eq!(units.unpaid_leave_days, 1);
        assert_eq!(units.absent_days, 2);
    }

    #[test]
    fn fixed_ignores_attendance_entirely() {
        assert_eq!(resolve_payable_base(PayMethod::Fixed, 300_000, 0.0, 30), 300_000);
        assert_eq!(resolve_payable_base(PayMethod::Fixed, 300_000, 240.0, 30), 300_000);
        assert_eq!(resolve_payable_base(PayMethod::Fixed, 300_000, 999.0, 30), 300_000);
    }

    #[test]
    fn prorated_scales_by_worked_share_of_nominal_hours() {
        // half the nominal 30 * 8 hours
        assert_eq!(resolve_payable_base(PayMethod::Prorated, 300_000, 120.0, 30), 150_000);
        // full attendance pays the full salary
        assert_eq!(resolve_payable_base(PayMethod::Prorated, 300_000, 240.0, 30), 300_000);
        assert_eq!(resolve_payable_base(PayMethod::Prorated, 300_000, 0.0, 30), 0);
    }

    #[test]
    fn prorated_rounds_half_away_from_zero_once() {
        // 100_000 * 6000min / 14_880min = 40_322.58..
        assert_eq!(resolve_payable_base(PayMethod::Prorated, 100_000, 100.0, 31), 40_323);
    }

    #[test]
    fn prorated_with_zero_days_pays_nothing() {
        assert_eq!(resolve_payable_base(PayMethod::Prorated, 300_000, 100.0, 0), 0);
    }

    #[test]
    fn hourly_handles_fractional_hours() {
        assert_eq!(resolve_payable_base(PayMethod::Hourly, 1_500, 7.5, 30), 11_250);
        assert_eq!(resolve_payable_base(PayMethod::Hourly, 1_500, 0.0, 30), 0);
    }

    #[test]
    fn per_shift_pays_per_eight_hour_unit() {
        assert_eq!(resolve_payable_base(PayMethod::PerShift, 8_000, 12.0, 30), 12_000);
        assert_eq!(resolve_payable_base(PayMethod::PerShift, 8_000, 4.0, 30), 4_000);
        assert_eq!(resolve_payable_base(PayMethod::PerShift, 8_000, 8.0, 30), 8_000);
    }

    #[test]
    fn negative_hours_clamp_to_zero_pay() {
        assert_eq!(resolve_payable_base(PayMethod::Hourly, 1_500, -4.0, 30), 0);
    }
}
