//! Access-control policy
//!
//! A policy is an ordered list of `<ACTION> <METHOD> <PATH-GLOB>` rules read
//! from a text file. Every incoming request is evaluated against the whole
//! list and the last matching rule decides; a request matched by no rule is
//! denied.

pub mod decision;
pub mod loader;
pub mod rule;

pub use decision::{Decision, DecisionReason, RequestDescriptor};
pub use loader::{PolicyError, PolicySet};
pub use rule::{Action, PathPattern, Rule};
