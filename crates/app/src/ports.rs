//! Port definitions: traits that adapters implement.
//!
//! Ports are the boundaries between the hub core and the outside world.
//! They are defined here (in `app`) so that adapters can depend on the core
//! without the core knowing about any adapter.

pub mod integration;

pub use integration::Integration;
