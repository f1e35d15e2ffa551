//! # homecore-domain
//!
//! Pure domain model for the homecore hub runtime.
//!
//! ## Responsibilities
//! - Foundational types: `domain.object_id` identifiers, error conventions, timestamps
//! - Define **States** (last-known value of an entity, with change/update timestamps)
//! - Define **Events** (typed payloads, origin, `state_changed` snapshots)
//! - Define **Service calls** (`domain`, `service`, parameters)
//! - Define the **process config** (location, units, paths)
//! - Contain the state-diffing rule that decides when a write is observable
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or threading code.

pub mod error;
pub mod id;
pub mod time;

pub mod config;
pub mod entity;
pub mod event;
pub mod service;
