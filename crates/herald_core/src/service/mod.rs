//! Use-case services over the notification stores.
//!
//! # Responsibility
//! - Turn emitted events into persisted notifications.
//! - Provide maintenance operations such as age-based cleanup.
//! - Keep API/CLI layers decoupled from storage details.

pub mod maintenance_service;
pub mod notify_service;
