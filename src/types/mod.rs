//! Strongly-typed identifiers and pointer types.

mod ids;
mod pointer;

pub use ids::{ChainId, Position};
pub use pointer::{ChainPtr, ChainSafe};
