//! Application state management
//!
//! Wraps the labeling workspace for the host. Session edits are synchronous
//! and happen under a short write lock; loading the session file, probing
//! the audio duration and writing the session file are asynchronous and
//! re-enter the workspace when they complete.

pub mod regions;

use anyhow::Result;
use labeler_core::{LabelVocabulary, LoadOutcome, Removal, Session, StoredSession, Workspace};
use labeler_types::{
    Annotation, Channel, DisplayRow, LabelDraft, LabelTarget, Notification, Party, PartyRole,
    Region, Settings,
};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;

use crate::providers::{FileAccess, LocalFileAccess, PlaybackTransport};

pub use regions::RegionBridge;

/// Main application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Session bound to the selected audio file
    workspace: RwLock<Workspace>,

    /// Application settings
    settings: RwLock<Settings>,

    /// File system collaborator
    files: Arc<dyn FileAccess>,

    /// Broadcast channel for operator notifications
    notification_tx: broadcast::Sender<Notification>,

    /// Cancels the pending debounced save
    autosave_cancel: RwLock<Option<CancellationToken>>,

    /// Serializes session file writes
    write_gate: Mutex<()>,
}

impl AppState {
    /// Create new application state
    pub fn new(settings: Settings, files: Arc<dyn FileAccess>) -> Self {
        let (notification_tx, _) = broadcast::channel(64);

        let vocabulary = LabelVocabulary::from_settings(&settings);
        tracing::info!(
            "Loaded settings: {} label types, auto_save={}, debounce={}ms, loop={}",
            vocabulary.len(),
            settings.auto_save,
            settings.auto_save_debounce_ms,
            settings.loop_regions
        );
        let session = Session::new(vocabulary, settings.loop_regions);
        let workspace = Workspace::new(session, settings.auto_save);

        Self {
            inner: Arc::new(AppStateInner {
                workspace: RwLock::new(workspace),
                settings: RwLock::new(settings),
                files,
                notification_tx,
                autosave_cancel: RwLock::new(None),
                write_gate: Mutex::new(()),
            }),
        }
    }

    /// State backed by the local file system
    pub fn local(settings: Settings) -> Self {
        Self::new(settings, Arc::new(LocalFileAccess::new()))
    }

    pub fn settings(&self) -> Settings {
        self.inner.settings.read().clone()
    }

    pub fn set_auto_save(&self, enabled: bool) {
        self.inner.settings.write().auto_save = enabled;
        self.inner.workspace.write().set_auto_save(enabled);
        if enabled {
            self.schedule_persist();
        } else {
            self.cancel_pending_save();
        }
    }

    /// Subscribe to operator notifications
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.inner.notification_tx.subscribe()
    }

    fn notify(&self, notification: Notification) {
        tracing::debug!("Notification: {:?}", notification);
        // No receivers is fine
        let _ = self.inner.notification_tx.send(notification);
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn generation(&self) -> u64 {
        self.inner.workspace.read().generation()
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.workspace.read().is_loaded()
    }

    pub fn session_path(&self) -> Option<PathBuf> {
        self.inner
            .workspace
            .read()
            .session_path()
            .map(Path::to_path_buf)
    }

    pub fn regions(&self) -> Vec<Region> {
        self.inner.workspace.read().session().store().regions().to_vec()
    }

    pub fn annotations(&self) -> Vec<Annotation> {
        self.inner
            .workspace
            .read()
            .session()
            .store()
            .annotations()
            .to_vec()
    }

    pub fn active_region(&self) -> Option<Region> {
        self.inner.workspace.read().session().active_region().cloned()
    }

    pub fn parties(&self) -> Vec<Party> {
        self.inner.workspace.read().session().parties().to_vec()
    }

    pub fn duration(&self) -> Option<f64> {
        self.inner.workspace.read().session().duration()
    }

    /// Display rows, recomputed only when the session changed
    pub fn rows(&self) -> Vec<DisplayRow> {
        self.inner.workspace.write().session_mut().rows().to_vec()
    }

    /// Label types offered by the type selector
    pub fn label_types(&self) -> Vec<String> {
        self.inner
            .workspace
            .read()
            .session()
            .vocabulary()
            .iter()
            .map(str::to_string)
            .collect()
    }

    /// Prefill for the label form of a region
    pub fn label_draft(&self, region_id: &str) -> LabelDraft {
        self.inner.workspace.read().session().label_draft(region_id)
    }

    // ========================================================================
    // Files
    // ========================================================================

    pub async fn list_audio_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        self.inner.files.list_audio_files(dir).await
    }

    /// Switch to an audio file and load its session file
    ///
    /// The previous session is cleared before anything is awaited. If another
    /// file is opened while this load is in flight, the result is discarded.
    pub async fn open_audio(&self, path: &Path) -> Result<LoadOutcome> {
        self.cancel_pending_save();
        let ticket = self.inner.workspace.write().switch_source(path);
        let session_path = ticket.session_path.display().to_string();

        let duration = match self.inner.files.audio_duration(path).await {
            Ok(duration) => Some(duration),
            Err(e) => {
                tracing::warn!("Could not determine duration of {}: {:#}", path.display(), e);
                None
            }
        };

        let stored = match self.inner.files.read_file(&ticket.session_path).await {
            Ok(Some(text)) => StoredSession::Contents(text),
            Ok(None) => StoredSession::Missing,
            Err(e) => StoredSession::Unreadable(format!("{:#}", e)),
        };

        let outcome = self
            .inner
            .workspace
            .write()
            .finish_load(&ticket, duration, stored);

        match &outcome {
            LoadOutcome::Applied(report) => self.notify(Notification::SessionLoaded {
                path: session_path,
                regions: report.regions,
                annotations: report.annotations,
            }),
            LoadOutcome::Initialized => {
                if self.settings().auto_save {
                    if let Err(e) = self.inner.files.create_file(&ticket.session_path).await {
                        tracing::warn!("Failed to create {}: {:#}", session_path, e);
                    }
                }
                self.notify(Notification::SessionInitialized { path: session_path });
            }
            LoadOutcome::Recovered { reason } => self.notify(Notification::SessionRecovered {
                path: session_path,
                reason: reason.clone(),
            }),
            LoadOutcome::Unreadable { message } => {
                self.notify(Notification::PersistenceFailed {
                    path: session_path,
                    message: message.clone(),
                })
            }
            LoadOutcome::Stale => {
                self.notify(Notification::StaleLoadDiscarded { path: session_path });
                return Ok(outcome);
            }
        }

        // Fresh, recovered or duration-updated sessions are written right away
        self.persist_now().await?;
        Ok(outcome)
    }

    /// Write the session to an arbitrary path, regardless of auto-save
    pub async fn export(&self, path: &Path) -> Result<()> {
        let job = self.inner.workspace.read().export_job(path)?;
        self.inner.files.write_file(&job.path, &job.contents).await?;
        tracing::info!("Exported session to {}", job.path.display());
        Ok(())
    }

    // ========================================================================
    // Editing
    // ========================================================================

    /// Run an edit on the session, then schedule persistence
    fn edit<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        let result = f(self.inner.workspace.write().session_mut());
        self.schedule_persist();
        result
    }

    pub fn create_region(&self, start: f64, end: f64) -> labeler_core::Result<Region> {
        self.edit(|s| s.create_region(start, end))
    }

    /// Region of the configured default length at the playhead
    pub fn add_region_at(&self, time: f64) -> labeler_core::Result<Region> {
        let length = self.inner.settings.read().default_region_length;
        self.edit(|s| s.add_region_at(time, length))
    }

    pub fn update_region(&self, id: &str, start: f64, end: f64) -> labeler_core::Result<usize> {
        self.edit(|s| s.update_region(id, start, end))
    }

    pub fn select_region(&self, id: &str) -> Option<Region> {
        self.inner
            .workspace
            .write()
            .session_mut()
            .select_region(id)
            .cloned()
    }

    pub fn delete_region(&self, id: &str) -> Removal {
        self.edit(|s| s.delete_region(id))
    }

    pub fn delete_active_region(&self) -> Removal {
        self.edit(|s| s.delete_active_region())
    }

    pub fn set_label(
        &self,
        region_id: &str,
        label_type: &str,
        value: &str,
        target: LabelTarget,
    ) -> labeler_core::Result<Vec<Annotation>> {
        self.edit(|s| s.set_label(region_id, label_type, value, target))
    }

    pub fn delete_annotation(&self, id: &str) -> Removal {
        self.edit(|s| s.delete_annotation(id))
    }

    pub fn delete_row(&self, annotation_ids: &[String]) -> Removal {
        self.edit(|s| s.delete_row(annotation_ids))
    }

    pub fn clear_all(&self) {
        self.edit(|s| s.clear_all())
    }

    pub fn set_party(
        &self,
        channel: Channel,
        name: Option<String>,
        role: PartyRole,
        uri: Option<String>,
    ) {
        self.edit(|s| s.set_party(channel, name, role, uri))
    }

    pub fn replace_parties(&self, left: Party, right: Party) {
        self.edit(|s| s.replace_parties(left, right))
    }

    // ========================================================================
    // Playback
    // ========================================================================

    /// Takes effect at the next play
    pub fn set_looping(&self, enabled: bool) {
        self.inner.workspace.write().session_mut().set_looping(enabled);
    }

    /// Playback started; returns the region that will loop, if any
    pub fn on_play<T: PlaybackTransport + ?Sized>(&self, transport: &T) -> Option<Region> {
        if let Some(duration) = transport.duration() {
            if self.duration().is_none() {
                self.edit(|s| s.set_duration(duration));
            }
        }
        self.inner
            .workspace
            .write()
            .session_mut()
            .play(transport.current_time())
    }

    pub fn on_pause(&self) {
        self.inner.workspace.write().session_mut().pause();
    }

    /// Playback position changed; seeks the transport back when looping
    pub fn on_time_update<T: PlaybackTransport + ?Sized>(
        &self,
        time: f64,
        transport: &mut T,
    ) -> Option<f64> {
        let target = self.inner.workspace.write().session_mut().time_update(time);
        if let Some(target) = target {
            transport.seek(target);
        }
        target
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    fn cancel_pending_save(&self) {
        if let Some(token) = self.inner.autosave_cancel.write().take() {
            token.cancel();
        }
    }

    /// Debounced write-through of the session file
    ///
    /// Every call restarts the debounce window. Without a tokio runtime the
    /// save is left to the next `flush`.
    pub fn schedule_persist(&self) {
        let (auto_save, debounce_ms) = {
            let settings = self.inner.settings.read();
            (settings.auto_save, settings.auto_save_debounce_ms)
        };
        if !auto_save {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("No async runtime, auto-save deferred");
            return;
        };

        let token = CancellationToken::new();
        if let Some(previous) = self.inner.autosave_cancel.write().replace(token.clone()) {
            previous.cancel();
        }

        let state = self.clone();
        handle.spawn(async move {
            if debounce_ms > 0 {
                tokio::select! {
                    _ = token.cancelled() => {
                        tracing::trace!("Auto-save superseded");
                        return;
                    }
                    _ = tokio::time::sleep(Duration::from_millis(debounce_ms)) => {}
                }
            } else if token.is_cancelled() {
                return;
            }
            if let Err(e) = state.persist_now().await {
                tracing::warn!("Auto-save failed: {:#}", e);
            }
        });
    }

    /// Write the session file now if the persistence policy calls for it
    ///
    /// # Returns
    /// Whether a file was written. Write failures are reported through a
    /// notification and leave the in-memory session untouched.
    pub async fn persist_now(&self) -> Result<bool> {
        let _gate = self.inner.write_gate.lock().await;

        let job = self.inner.workspace.write().persist_job()?;
        let Some(job) = job else {
            return Ok(false);
        };

        match self.inner.files.write_file(&job.path, &job.contents).await {
            Ok(()) => {
                tracing::info!("Saved session to {}", job.path.display());
                Ok(true)
            }
            Err(e) => {
                tracing::warn!("Failed to save session to {}: {:#}", job.path.display(), e);
                {
                    let mut workspace = self.inner.workspace.write();
                    if workspace.generation() == job.generation {
                        workspace.persistence_failed();
                    }
                }
                self.notify(Notification::PersistenceFailed {
                    path: job.path.display().to_string(),
                    message: format!("{:#}", e),
                });
                Ok(false)
            }
        }
    }

    /// Drop the pending debounce and write immediately
    pub async fn flush(&self) -> Result<bool> {
        self.cancel_pending_save();
        self.persist_now().await
    }
}
