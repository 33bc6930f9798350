//! Marionette Core
//!
//! Shared plumbing for the animation runtime:
//!
//! - [`errors`]: the crate-wide error type and `Result` alias
//! - [`hash`]: 64-bit name hashes used for clip and parameter lookup
//! - [`memory`]: sizing helpers for exact-capacity arenas
//! - [`document`]: read-only structured document access (JSON)
//! - [`vfs`]: virtual file sources for asset loading

pub mod document;
pub mod errors;
pub mod hash;
pub mod memory;
pub mod vfs;

pub use document::{DocumentNode, JsonDocument, JsonNode};
pub use errors::{MarionetteError, Result};
pub use hash::NameHash;
pub use vfs::{DiskFileSource, FileSource, MemoryFileSource, VirtualFile};
