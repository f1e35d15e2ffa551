//! Entity state: what the hub knows about each addressable thing.
//!
//! An entity is identified by a `domain.object_id` [`Identifier`](crate::id::Identifier)
//! and its current value is held in a [`State`] record.

mod attribute_value;
mod state;

pub use attribute_value::{AttributeValue, Attributes};
pub use state::{ATTR_FRIENDLY_NAME, State, StateBuilder};
