//! Server-side feature flag evaluation.
//!
//! Given a snapshot of flag definitions, segment memberships and a user, [Evaluator]
//! decides which variation of every flag the user receives. Flags may depend on each
//! other through prerequisites and FEATURE_FLAG clauses; they are evaluated in dependency
//! order so that a flag always sees the variations of the flags it reads.

mod archivability;
mod clock;
mod config;
mod error;
mod eval;
mod flag;
mod graph;
mod identity;
mod incremental;
mod migration;
mod rule;
mod segment;
mod strategy;
mod test_common;
mod user;
mod validation;
mod variation;

pub use archivability::*;
pub use clock::*;
pub use config::*;
pub use error::{Error, Result};
pub use eval::*;
pub use flag::*;
pub use graph::*;
pub use identity::*;
pub use incremental::*;
pub use migration::*;
pub use rule::*;
pub use segment::*;
pub use strategy::*;
pub use user::*;
pub use validation::*;
pub use variation::*;
