//! RavenHost server library
//!
//! Front-end implementation and startup helpers used by the `ravenhost`
//! binary.

pub mod frontend;
pub mod startup;
