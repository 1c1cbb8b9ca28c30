//! Core types and sync engine for the rentcal ecosystem.
//!
//! This crate provides everything the binary needs that is independent of
//! transport and presentation:
//! - booking, unit and feed-source types
//! - the fault-tolerant iCal feed parser
//! - reconciliation of parsed events against stored bookings
//! - persistence contracts and the bundled store implementations

pub mod booking;
pub mod error;
pub mod event;
pub mod ics;
pub mod reconcile;
pub mod source;
pub mod stats;
pub mod store;
pub mod unit;

pub use booking::Booking;
pub use error::{SyncError, SyncResult};
pub use event::ParsedEvent;
pub use source::{FeedSource, SyncStatus};
pub use stats::{BatchSummary, SyncStats};
pub use unit::Unit;
