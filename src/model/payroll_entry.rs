use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One staff member's line in a payroll period. The `(payroll_period_id,
/// staff_id)` pair is unique; `base_salary_cents` and the computed figures
/// are snapshots, never live references. All monetary columns are integer
/// cents.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PayrollEntry {
    pub id: u64,
    pub organization_id: u64,
    pub payroll_period_id: u64,
    pub staff_id: u64,
    pub base_salary_cents: i64,
    pub pay_method: String,
    pub worked_units: f64,
    pub paid_leave_units: u32,
    pub unpaid_leave_units: u32,
    pub absent_units: u32,
    pub payable_base_cents: i64,
    pub allowances_total_cents: i64,
    pub deductions_total_cents: i64,
    /// Serialized [`engine::deductions::DeductionBreakdown`], including the
    /// rule version used and any calculation validation flags.
    pub deduction_details: Option<String>,
    pub gross_pay_cents: i64,
    pub net_pay_cents: i64,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_reference: Option<String>,
}
