//! Settings cache and requeueable job core.
//!
//! [`cache::SettingsCache`] fronts a durable [`application::repos::ConfigStore`]
//! with a read-through / write-through cache addressed by dotted paths.
//! [`application::jobs::JobExecutor`] gives queue-driven jobs argument checks,
//! failure classification and bounded retry with exponential backoff.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
