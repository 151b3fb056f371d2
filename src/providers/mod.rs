//! Read-side access to data owned by collaborating services. This service
//! never writes these tables.

pub mod attendance;
pub mod staff;
