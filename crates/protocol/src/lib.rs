//! Data types exchanged between the session host and a protection backend.
//!
//! This crate contains the serde-serializable shapes that describe what the
//! host asks of a backend (context configuration, capabilities, engine
//! identity) and what a backend reports back (labels, applied label state).
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond serialization and small accessors
//! * Backend-neutral: Nothing here knows how a backend is implemented
//! * Stable: Changes only when the backend contract changes
//!
//! Lifecycle and authentication behavior is built on top of these types in `mip-rs`.

pub mod claims;
pub mod label;
pub mod types;

pub use claims::*;
pub use label::*;
pub use types::*;
