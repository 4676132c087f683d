//! Scheduler configuration.

pub mod scheduler;

pub use scheduler::SchedulerConfig;
