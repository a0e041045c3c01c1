//! Swap Routing Adapter
//!
//! Jupiter-backed implementation of the swap routing port.

mod jupiter;

pub use jupiter::{JupiterConfig, JupiterRouter};
