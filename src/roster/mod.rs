//! Roster state and persistence
//!
//! The roster is created once at startup, mutated only through
//! [`RosterStore`], and persisted after every accepted change.

pub mod player;
pub mod store;

pub use player::{default_roster, Player};
pub use store::RosterStore;
