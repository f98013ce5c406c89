//! Access evaluation over the permission matrix.
//!
//! Effective access to a node requires both:
//! - the node is visible in navigation for the role
//! - the action is granted on the node
//!
//! Grants on hidden nodes are kept but never take effect.

mod evaluator;

pub use evaluator::{AccessEvaluator, Decision, DefaultAccessEvaluator};
