//! The payroll computation engine: integer-cents money math, attendance
//! classification, gross-to-net deductions, period lifecycle, and batch
//! generation. Everything here is deterministic for a given rule version.

pub mod deductions;
pub mod entries;
pub mod error;
pub mod generator;
pub mod lifecycle;
pub mod money;
pub mod payable;
pub mod summary;
