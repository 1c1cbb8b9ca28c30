//! Rentable units.

use serde::{Deserialize, Serialize};

/// A rentable entity (apartment, room, house). Owns zero or more feed
/// sources and is the parent of bookings. Read-only from the sync
/// subsystem's perspective.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub id: String,
    pub name: String,
}

impl Unit {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Unit {
            id: id.into(),
            name: name.into(),
        }
    }
}
