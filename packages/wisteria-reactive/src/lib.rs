//! The reactive dependency graph, scheduler, and lifecycle/ownership tree underlying wisteria.
//!
//! A single-threaded [`Root`] owns an arena of [`node`](node::NodeId)s — signals, memos, effects,
//! and root/owner contexts all live in the same arena so the scheduler can treat dependency
//! tracking and dirty propagation uniformly regardless of node kind. See [`root`] for the
//! scheduler and lifecycle mechanics, [`signals`] for the read-tracking/write-notifying cell,
//! [`memos`] for cached derivations, and [`effects`] for side effects.

#![warn(missing_docs)]

pub mod config;
pub mod context;
pub mod effects;
pub mod error;
pub mod maybe_dyn;
pub mod memos;
pub mod node;
pub mod root;
pub mod signals;
pub mod store;
pub mod transitions;
pub mod utils;
pub mod versioned;

pub use config::*;
pub use context::*;
pub use effects::*;
pub use error::*;
pub use maybe_dyn::*;
pub use memos::*;
pub use node::{NodeHandle, NodeId};
pub use root::*;
pub use signals::*;
pub use store::*;
pub use transitions::*;
pub use utils::*;
pub use versioned::*;
