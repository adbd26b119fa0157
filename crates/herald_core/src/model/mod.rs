//! Notification domain model.
//!
//! # Responsibility
//! - Define the notification record, its severity level and the tagged
//!   references used for actor/target/action_object.
//! - Provide single-row state transitions and human-readable rendering.
//!
//! # Invariants
//! - A notification is identified by a storage-assigned `NotificationId` and
//!   never changes identity after insert.
//! - `unread`, `emailed`, `public` and `deleted` are independent flags.

pub mod notification;
pub mod timesince;
