//! Repository layer abstractions and SQLite implementations.
//!
//! # Responsibility
//! - Define the storage contracts the query engine and notifier consume.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Write paths validate drafts before SQL mutations.
//! - Bulk mutations are single set-based statements, never fetch-and-save
//!   loops.
//! - Read paths reject undecodable rows instead of masking them.

pub mod directory_repo;
pub mod notification_repo;
