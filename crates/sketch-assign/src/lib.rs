//! # sketch-assign
//!
//! Binds retrieved assets onto scene graph elements.
//!
//! The merger walks shots in order and, for each eligible element, picks the
//! shot's matches round-robin. The hero element is never given an asset and
//! ineligible elements always end unbound. Given the same scene and match
//! batch the output is identical on every run, including repeated runs over
//! its own output.

pub mod merger;

pub use merger::{AssetAssigner, AssignmentPolicy, AssignmentStats};
