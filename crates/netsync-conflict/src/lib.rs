//! netsync Conflict - Conflict rules and transfer gating
//!
//! Provides:
//! - Ordered, glob-based conflict rules (first match wins)
//! - The transfer gate combining a rule's action, the sync direction and the
//!   default conflict resolution

pub mod error;
pub mod policy;

pub use error::ConflictError;
pub use policy::{is_transfer_allowed, resolve_action, ConflictRule, ConflictRules};
