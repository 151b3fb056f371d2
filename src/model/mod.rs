pub mod attendance;
pub mod payroll_entry;
pub mod payroll_period;
pub mod role;
pub mod staff;
pub mod statutory_rules;
