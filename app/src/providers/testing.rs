//! In-memory collaborators for tests

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use super::traits::{FileAccess, PlaybackTransport, RegionLayer};

/// File access over a map, with switches for failures and held reads
#[derive(Default)]
pub struct MemoryFileAccess {
    files: Mutex<HashMap<PathBuf, String>>,
    durations: Mutex<HashMap<PathBuf, f64>>,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
    read_gate: Mutex<Option<Arc<Semaphore>>>,
    pending_reads: AtomicUsize,
}

/// Releases reads held by `MemoryFileAccess::hold_reads`
pub struct ReadGate(Arc<Semaphore>);

impl ReadGate {
    pub fn release(&self) {
        self.0.close();
    }
}

impl MemoryFileAccess {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_audio(&self, path: &str, duration: f64) {
        self.durations.lock().insert(PathBuf::from(path), duration);
    }

    pub fn put(&self, path: &str, contents: &str) {
        self.files
            .lock()
            .insert(PathBuf::from(path), contents.to_string());
    }

    pub fn contents(&self, path: &str) -> Option<String> {
        self.files.lock().get(Path::new(path)).cloned()
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Hold every read until the gate is released
    pub fn hold_reads(&self) -> ReadGate {
        let semaphore = Arc::new(Semaphore::new(0));
        *self.read_gate.lock() = Some(semaphore.clone());
        ReadGate(semaphore)
    }

    pub async fn wait_for_pending_read(&self) {
        self.wait_for_pending_reads(1).await;
    }

    pub async fn wait_for_pending_reads(&self, count: usize) {
        while self.pending_reads.load(Ordering::SeqCst) < count {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }
}

#[async_trait]
impl FileAccess for MemoryFileAccess {
    async fn list_audio_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = self
            .durations
            .lock()
            .keys()
            .filter(|p| p.parent() == Some(dir))
            .cloned()
            .collect();
        files.sort();
        Ok(files)
    }

    async fn read_file(&self, path: &Path) -> Result<Option<String>> {
        let gate = self.read_gate.lock().clone();
        if let Some(gate) = gate {
            self.pending_reads.fetch_add(1, Ordering::SeqCst);
            // Closed gate: acquire fails and the read proceeds
            let _ = gate.acquire().await;
        }
        Ok(self.files.lock().get(path).cloned())
    }

    async fn write_file(&self, path: &Path, contents: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            anyhow::bail!("disk full");
        }
        self.files
            .lock()
            .insert(path.to_path_buf(), contents.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn create_file(&self, path: &Path) -> Result<()> {
        self.files.lock().entry(path.to_path_buf()).or_default();
        Ok(())
    }

    async fn audio_duration(&self, path: &Path) -> Result<f64> {
        self.durations
            .lock()
            .get(path)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("no such audio file: {}", path.display()))
    }
}

/// Transport with a fixed playhead that records seeks
pub struct ScriptedTransport {
    pub time: f64,
    pub duration: Option<f64>,
    pub seeks: Vec<f64>,
}

impl ScriptedTransport {
    pub fn new(time: f64, duration: Option<f64>) -> Self {
        Self {
            time,
            duration,
            seeks: Vec::new(),
        }
    }
}

impl PlaybackTransport for ScriptedTransport {
    fn current_time(&self) -> f64 {
        self.time
    }

    fn seek(&mut self, time: f64) {
        self.time = time;
        self.seeks.push(time);
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }
}

/// Region layer that keeps drawn regions in a map
#[derive(Default)]
pub struct FakeLayer {
    next: u32,
    pub drawn: HashMap<u32, (f64, f64)>,
}

impl RegionLayer for FakeLayer {
    type Handle = u32;

    fn create_visual_region(&mut self, start: f64, end: f64) -> u32 {
        self.next += 1;
        self.drawn.insert(self.next, (start, end));
        self.next
    }

    fn remove_visual_region(&mut self, handle: &u32) {
        self.drawn.remove(handle);
    }
}
