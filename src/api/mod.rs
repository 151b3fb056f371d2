pub mod payroll_entry;
pub mod payroll_period;
pub mod statutory_rules;
