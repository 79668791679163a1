//! # Domain Services
//!
//! Domain services encapsulate business rules that don't naturally belong to
//! a single entity.
//!
//! - **delivery**: recipient, delivery and read sets of an outgoing message

mod delivery;

pub use delivery::*;
