//! Notifier data models — transient, scoped to a single invocation.

pub mod commit;
pub mod message;
pub mod suite;
