//! Tree-host-agnostic core: the [`GenericNode`] abstraction, [`View`], the reactive binding
//! layer, array/fragment reconciliation, and the keyed-list reconciler.
//!
//! Everything here is generic over `G: GenericNode` and has no notion of a DOM, a browser, or a
//! server. A host crate (such as `wisteria-web`) supplies a concrete `GenericNode` impl and the
//! rest of this crate works unmodified on top of it.

#![deny(missing_debug_implementations)]
#![warn(missing_docs)]

pub mod bindings;
pub mod generic_node;
pub mod keyed;
pub mod noderef;
pub mod render;
pub mod view;

#[cfg(test)]
mod test_support;

pub use bindings::*;
pub use generic_node::*;
pub use keyed::*;
pub use noderef::*;
pub use render::*;
pub use view::*;
