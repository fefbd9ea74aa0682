//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the workspace.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Data Model
//! - A [`Chunk`] is an immutable byte buffer plus an [`Encoding`] hint
//! - A [`ChunkSink`] is any destination the fork operator can write chunks to
//!   and mirror lifecycle signals onto

mod chunk;
mod config;
mod error;
mod sink;

pub use chunk::*;
pub use config::*;
pub use error::*;
pub use sink::*;
