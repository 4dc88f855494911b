//! Providers module
//!
//! Collaborator interfaces (file access, playback transport, region layer)
//! and the local file system implementation.

pub mod local;
pub mod traits;

pub use local::LocalFileAccess;
pub use traits::{FileAccess, PlaybackTransport, RegionLayer};

#[cfg(test)]
pub(crate) mod testing;
