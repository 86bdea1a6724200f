//! Convenience re-exports of the commonly used types.

pub use crate::chain::Manager;
pub use crate::error::{ChainError, Result};
pub use crate::root::RootHandle;
pub use crate::types::{ChainId, ChainPtr, ChainSafe, Position};
