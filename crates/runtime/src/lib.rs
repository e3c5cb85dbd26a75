//! Runtime support for the synchronous session surface.
//!
//! Backend operations are asynchronous; the session host exposes a blocking
//! contract. [`Blocking`] drives a backend future to completion on a
//! dedicated runtime so no pending operation ever escapes to the caller.

pub mod blocking;

pub use blocking::{Blocking, RuntimeError};
