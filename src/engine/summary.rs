//! Period roll-ups: aggregate totals for dashboards and a flat CSV export of
//! the stored figures. Exports never recompute; they read what the entries
//! already carry.

use std::collections::HashMap;

use serde::Serialize;
use utoipa::ToSchema;

use crate::engine::money::format_cents;
use crate::model::payroll_entry::PayrollEntry;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PeriodSummary {
    #[schema(example = 12)]
    pub payroll_period_id: u64,
    #[schema(example = 42)]
    pub entry_count: usize,
    #[schema(example = 210000000)]
    pub total_gross_cents: i64,
    #[schema(example = 43110270)]
    pub total_deductions_cents: i64,
    #[schema(example = 166889730)]
    pub total_net_cents: i64,
    #[schema(example = 40)]
    pub paid_count: usize,
    #[schema(example = 2)]
    pub pending_count: usize,
}

pub fn summarize(payroll_period_id: u64, entries: &[PayrollEntry]) -> PeriodSummary {
    let mut summary = PeriodSummary {
        payroll_period_id,
        entry_count: entries.len(),
        total_gross_cents: 0,
        total_deductions_cents: 0,
        total_net_cents: 0,
        paid_count: 0,
        pending_count: 0,
    };
    for entry in entries {
        summary.total_gross_cents += entry.gross_pay_cents;
        summary.total_deductions_cents += entry.deductions_total_cents;
        summary.total_net_cents += entry.net_pay_cents;
        if entry.is_paid {
            summary.paid_count += 1;
        } else {
            summary.pending_count += 1;
        }
    }
    summary
}

const CSV_HEADER: &str = "staff_id,staff_name,pay_method,base_salary,worked_hours,\
paid_leave_days,unpaid_leave_days,absent_days,payable_base,allowances,gross_pay,\
total_deductions,net_pay,payment_status,payment_reference";

/// RFC 4180: quote a field when it contains a comma, quote, or line break
/// (either kind), and double any quotes inside it.
fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Renders a period's entries as CSV, sorted by staff name then entry id so
/// the same period always exports byte-identically.
pub fn render_csv(entries: &[PayrollEntry], names: &HashMap<u64, String>) -> String {
    let mut rows: Vec<&PayrollEntry> = entries.iter().collect();
    rows.sort_by(|a, b| {
        let name_a = names.get(&a.staff_id).map(String::as_str).unwrap_or("");
        let name_b = names.get(&b.staff_id).map(String::as_str).unwrap_or("");
        name_a.cmp(name_b).then(a.id.cmp(&b.id))
    });

    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for entry in rows {
        let name = names.get(&entry.staff_id).map(String::as_str).unwrap_or("");
        let line = [
            entry.staff_id.to_string(),
            csv_field(name),
            entry.pay_method.clone(),
            format_cents(entry.base_salary_cents),
            format!("{:.2}", entry.worked_units),
            entry.paid_leave_units.to_string(),
            entry.unpaid_leave_units.to_string(),
            entry.absent_units.to_string(),
            format_cents(entry.payable_base_cents),
            format_cents(entry.allowances_total_cents),
            format_cents(entry.gross_pay_cents),
            format_cents(entry.deductions_total_cents),
            format_cents(entry.net_pay_cents),
            if entry.is_paid { "paid" } else { "pending" }.to_string(),
            csv_field(entry.payment_reference.as_deref().unwrap_or("")),
        ]
        .join(",");
        out.push_str(&line);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(staff_id: u64, gross: i64, deductions: i64, paid: bool) -> PayrollEntry {
        PayrollEntry {
            id: staff_id,
            organization_id: 1,
            payroll_period_id: 12,
            staff_id,
            base_salary_cents: gross,
            pay_method: "fixed".to_string(),
            worked_units: 168.0,
            paid_leave_units: 0,
            unpaid_leave_units: 0,
            absent_units: 0,
            payable_base_cents: gross,
            allowances_total_cents: 0,
            deductions_total_cents: deductions,
            deduction_details: None,
            gross_pay_cents: gross,
            net_pay_cents: gross - deductions,
            is_paid: paid,
            paid_at: None,
            payment_reference: if paid { Some("TXN-1".to_string()) } else { None },
        }
    }

    #[test]
    fn totals_add_up_across_entries() {
        let entries = vec![
            entry(1, 5_000_000, 1_026_435, true),
            entry(2, 3_000_000, 500_000, false),
            entry(3, 1_000_000, 100_000, true),
        ];
        let summary = summarize(12, &entries);
        assert_eq!(summary.entry_count, 3);
        assert_eq!(summary.total_gross_cents, 9_000_000);
        assert_eq!(summary.total_deductions_cents, 1_626_435);
        assert_eq!(summary.total_net_cents, 7_373_565);
        assert_eq!(summary.paid_count, 2);
        assert_eq!(summary.pending_count, 1);
    }

    #[test]
    fn empty_period_summarizes_to_zero() {
        let summary = summarize(12, &[]);
        assert_eq!(summary.entry_count, 0);
        assert_eq!(summary.total_net_cents, 0);
        assert_eq!(summary.pending_count, 0);
    }

    #[test]
    fn csv_sorts_by_name_then_id() {
        let entries = vec![entry(3, 100, 0, false), entry(1, 100, 0, false), entry(2, 100, 0, false)];
        let names: HashMap<u64, String> = [
            (1, "Wanjiku".to_string()),
            (2, "Achieng".to_string()),
            (3, "Achieng".to_string()),
        ]
        .into_iter()
        .collect();
        let csv = render_csv(&entries, &names);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("2,Achieng"));
        assert!(lines[2].starts_with("3,Achieng"));
        assert!(lines[3].starts_with("1,Wanjiku"));
    }

    #[test]
    fn csv_escapes_embedded_commas_and_quotes() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("Otieno, Jr."), "\"Otieno, Jr.\"");
        assert_eq!(csv_field("the \"boss\""), "\"the \"\"boss\"\"\"");
    }

    #[test]
    fn csv_quotes_fields_with_line_breaks() {
        assert_eq!(csv_field("two\nlines"), "\"two\nlines\"");
        assert_eq!(csv_field("bare\rreturn"), "\"bare\rreturn\"");
        assert_eq!(csv_field("crlf\r\npair"), "\"crlf\r\npair\"");
    }

    #[test]
    fn csv_renders_money_as_decimal_units() {
        let entries = vec![entry(1, 5_000_000, 1_026_435, true)];
        let names: HashMap<u64, String> = [(1, "Achieng".to_string())].into_iter().collect();
        let csv = render_csv(&entries, &names);
        let row = csv.lines().nth(1).unwrap();
        assert!(row.contains("50000.00"));
        assert!(row.contains("10264.35"));
        assert!(row.contains("39735.65"));
        assert!(row.ends_with("paid,TXN-1"));
    }
}
