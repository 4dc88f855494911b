//! Collaborator traits
//!
//! The session engine never touches the file system, the audio transport
//! or the waveform widget directly. Hosts plug them in through these traits.

use anyhow::Result;
use async_trait::async_trait;
use std::hash::Hash;
use std::path::{Path, PathBuf};

// ============================================================================
// File Access
// ============================================================================

/// Directory listing and whole-file session storage
#[async_trait]
pub trait FileAccess: Send + Sync {
    /// Audio files directly inside `dir`, sorted by name
    async fn list_audio_files(&self, dir: &Path) -> Result<Vec<PathBuf>>;

    /// Read a text file
    ///
    /// # Returns
    /// `Ok(None)` when the file does not exist
    async fn read_file(&self, path: &Path) -> Result<Option<String>>;

    /// Replace the whole file
    async fn write_file(&self, path: &Path, contents: &str) -> Result<()>;

    /// Create an empty file (and its directory) if it does not exist yet
    async fn create_file(&self, path: &Path) -> Result<()>;

    /// Total duration of an audio file in seconds
    async fn audio_duration(&self, path: &Path) -> Result<f64>;
}

// ============================================================================
// Playback Transport
// ============================================================================

/// Audio playback surface (waveform player)
pub trait PlaybackTransport {
    /// Current playhead position in seconds
    fn current_time(&self) -> f64;

    /// Move the playhead
    fn seek(&mut self, time: f64);

    /// Total duration, once decoded
    fn duration(&self) -> Option<f64>;
}

// ============================================================================
// Region Visual Layer
// ============================================================================

/// Visual regions drawn over the waveform
///
/// Handles are opaque to the engine; the region store stays the source of
/// truth.
pub trait RegionLayer {
    type Handle: Clone + Eq + Hash;

    /// Draw a region and return its handle
    fn create_visual_region(&mut self, start: f64, end: f64) -> Self::Handle;

    /// Remove a drawn region
    fn remove_visual_region(&mut self, handle: &Self::Handle);
}
