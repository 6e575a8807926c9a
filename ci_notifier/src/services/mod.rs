//! Notifier services — the event pipeline and its external collaborators.

pub mod filter_service;
pub mod github_service;
pub mod message_service;
pub mod notify_service;
pub mod slack_service;
pub mod store;
pub mod suite_service;
