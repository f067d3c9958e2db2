//! Background maintenance scheduler (spec §4.13): periodic size monitoring,
//! VACUUM, and off-chain cleanup on a dedicated thread pool.

pub mod scheduler;

pub use scheduler::{MaintenanceConfig, MaintenanceScheduler};
