//! Remuxer client
//!
//! Provides the host-facing side of the crate:
//! - [`Remuxer`]: `feed` raw chunks, receive segments through a sink
//! - [`FlushTask`]: the periodic release/eviction cycle on a tokio runtime

pub mod remuxer;
pub mod task;

pub use remuxer::{Chunk, Remuxer, SharedRemuxer};
pub use task::FlushTask;
