//! Workspace: the session bound to the selected audio source
//!
//! Owns the source switch, the load handshake and the persistence policy.
//! File access itself is left to the host; the workspace hands out tickets
//! and write jobs and decides what to do with the results.
//!
//! A monotonic generation is bumped on every switch. A load started under
//! an older generation is discarded when it completes.

use std::path::{Path, PathBuf};

use crate::codec::{self, MediaInfo, RestoreReport};
use crate::error::{LabelerError, Result};
use crate::session::Session;
use crate::time::millis_key;

/// Session file bound to an audio file: `dir/name.ext` -> `dir/name-vcon.json`
pub fn session_file_for(audio: &Path) -> PathBuf {
    let stem = audio
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("session");
    audio.with_file_name(format!("{}-vcon.json", stem))
}

/// Handle for one in-flight load
#[derive(Debug, Clone, PartialEq)]
pub struct LoadTicket {
    pub generation: u64,
    pub audio_path: PathBuf,
    pub session_path: PathBuf,
}

/// What the host found at the session path
#[derive(Debug, Clone, PartialEq)]
pub enum StoredSession {
    Missing,
    Contents(String),
    /// Reading failed for a reason other than absence
    Unreadable(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// The stored session was reconstructed
    Applied(RestoreReport),
    /// No file existed; the session starts empty
    Initialized,
    /// The stored file was malformed; the session starts empty
    Recovered { reason: String },
    /// The file could not be read, or the audio duration is unknown; editing
    /// continues in memory
    Unreadable { message: String },
    /// The operator switched sources while this load was in flight
    Stale,
}

/// A whole-file write the host should carry out
#[derive(Debug, Clone, PartialEq)]
pub struct PersistJob {
    pub path: PathBuf,
    pub contents: String,
    pub generation: u64,
}

pub struct Workspace {
    session: Session,
    generation: u64,
    audio_path: Option<PathBuf>,
    session_path: Option<PathBuf>,
    /// Set once the stored session (or its absence) has been applied
    loaded: bool,
    auto_save: bool,
    /// Content revision last handed out for writing
    persisted_revision: Option<u64>,
}

impl Workspace {
    pub fn new(session: Session, auto_save: bool) -> Self {
        Self {
            session,
            generation: 0,
            audio_path: None,
            session_path: None,
            loaded: false,
            auto_save,
            persisted_revision: None,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn audio_path(&self) -> Option<&Path> {
        self.audio_path.as_deref()
    }

    pub fn session_path(&self) -> Option<&Path> {
        self.session_path.as_deref()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn auto_save(&self) -> bool {
        self.auto_save
    }

    pub fn set_auto_save(&mut self, enabled: bool) {
        self.auto_save = enabled;
    }

    /// Switch to a new audio source
    ///
    /// Regions, annotations, parties and loop state are cleared in one step.
    /// Nothing is persisted until the returned ticket's load completes.
    pub fn switch_source(&mut self, audio: &Path) -> LoadTicket {
        self.generation += 1;
        self.session.reset(MediaInfo::from_path(audio));
        self.loaded = false;
        self.persisted_revision = None;

        let session_path = session_file_for(audio);
        self.audio_path = Some(audio.to_path_buf());
        self.session_path = Some(session_path.clone());

        tracing::info!(
            "Switched to {} (generation {}), session file {}",
            audio.display(),
            self.generation,
            session_path.display()
        );
        LoadTicket {
            generation: self.generation,
            audio_path: audio.to_path_buf(),
            session_path,
        }
    }

    pub fn is_current(&self, ticket: &LoadTicket) -> bool {
        ticket.generation == self.generation
    }

    /// Apply a completed load
    ///
    /// The duration is set before reconstruction. A stale ticket leaves the
    /// workspace untouched.
    pub fn finish_load(
        &mut self,
        ticket: &LoadTicket,
        duration: Option<f64>,
        stored: StoredSession,
    ) -> LoadOutcome {
        if !self.is_current(ticket) {
            tracing::info!(
                "Discarding load of {} (generation {}, current {})",
                ticket.session_path.display(),
                ticket.generation,
                self.generation
            );
            return LoadOutcome::Stale;
        }

        if let Some(duration) = duration {
            self.session.set_duration(duration);
        }

        // Bounds are clamped against the duration, so a stored session is
        // only rebuilt once it is known. The file stays untouched meanwhile.
        if self.session.duration().is_none() {
            if let StoredSession::Contents(_) = stored {
                tracing::warn!(
                    "Duration of {} unknown, not restoring {}",
                    ticket.audio_path.display(),
                    ticket.session_path.display()
                );
                self.persisted_revision = None;
                return LoadOutcome::Unreadable {
                    message: "audio duration unknown, stored session left untouched".to_string(),
                };
            }
        }
        self.loaded = true;

        let outcome = match stored {
            StoredSession::Missing => {
                self.persisted_revision = None;
                LoadOutcome::Initialized
            }
            StoredSession::Unreadable(message) => {
                // Keep the unreadable file until the operator edits something
                self.persisted_revision = Some(self.session.content_revision());
                LoadOutcome::Unreadable { message }
            }
            StoredSession::Contents(text) => match codec::decode(&text) {
                Ok(doc) => {
                    let report = self.session.restore(&doc);
                    let stored_duration = doc.media.first().map(|m| m.duration);
                    let in_sync = match (stored_duration, self.session.duration()) {
                        (Some(stored), Some(known)) => millis_key(stored) == millis_key(known),
                        _ => true,
                    };
                    self.persisted_revision = in_sync.then(|| self.session.content_revision());
                    LoadOutcome::Applied(report)
                }
                Err(e) => {
                    tracing::warn!(
                        "Session file {} is malformed, starting fresh: {}",
                        ticket.session_path.display(),
                        e
                    );
                    self.persisted_revision = None;
                    LoadOutcome::Recovered {
                        reason: e.to_string(),
                    }
                }
            },
        };

        tracing::info!(
            "Loaded session {} -> {:?}",
            ticket.session_path.display(),
            outcome
        );
        outcome
    }

    /// Write job for the current state, if the persistence policy calls for one
    ///
    /// Requires a bound, loaded session with auto-save on and unsaved changes.
    pub fn persist_job(&mut self) -> Result<Option<PersistJob>> {
        if !self.loaded || !self.auto_save {
            return Ok(None);
        }
        let Some(path) = self.session_path.clone() else {
            return Ok(None);
        };
        let revision = self.session.content_revision();
        if self.persisted_revision == Some(revision) {
            return Ok(None);
        }

        let contents = self.session.to_json()?;
        self.persisted_revision = Some(revision);
        Ok(Some(PersistJob {
            path,
            contents,
            generation: self.generation,
        }))
    }

    /// Write job for an explicit export, independent of auto-save
    pub fn export_job(&self, path: &Path) -> Result<PersistJob> {
        if path.as_os_str().is_empty() {
            return Err(LabelerError::Persistence {
                path: String::new(),
                message: "export path is empty".to_string(),
            });
        }
        Ok(PersistJob {
            path: path.to_path_buf(),
            contents: self.session.to_json()?,
            generation: self.generation,
        })
    }

    /// Forget what was written so the next change (or call) writes again
    pub fn persistence_failed(&mut self) {
        self.persisted_revision = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labeler_types::LabelTarget;

    fn workspace() -> Workspace {
        Workspace::new(Session::default(), true)
    }

    fn stored_session_text() -> String {
        let mut session = Session::default();
        session.set_duration(30.0);
        let region = session.create_region(1.0, 3.5).unwrap();
        session
            .set_label(&region.id, "topic", "billing", LabelTarget::Both)
            .unwrap();
        session.to_json().unwrap()
    }

    #[test]
    fn test_session_file_naming() {
        assert_eq!(
            session_file_for(Path::new("/data/calls/call-01.wav")),
            PathBuf::from("/data/calls/call-01-vcon.json")
        );
        assert_eq!(
            session_file_for(Path::new("noext")),
            PathBuf::from("noext-vcon.json")
        );
    }

    #[test]
    fn test_stale_load_is_discarded() {
        let mut ws = workspace();
        let first = ws.switch_source(Path::new("/calls/a.wav"));
        let second = ws.switch_source(Path::new("/calls/b.wav"));

        let outcome = ws.finish_load(&first, Some(30.0), StoredSession::Contents(stored_session_text()));
        assert_eq!(outcome, LoadOutcome::Stale);
        assert!(ws.session().store().is_empty());
        assert!(!ws.is_loaded());
        assert_eq!(ws.session().duration(), None);
        assert_eq!(ws.session_path(), Some(Path::new("/calls/b-vcon.json")));

        let outcome = ws.finish_load(&second, Some(12.0), StoredSession::Missing);
        assert_eq!(outcome, LoadOutcome::Initialized);
        assert!(ws.session().store().is_empty());
    }

    #[test]
    fn test_applied_load_rebuilds_session() {
        let mut ws = workspace();
        let ticket = ws.switch_source(Path::new("/calls/a.wav"));

        let outcome = ws.finish_load(&ticket, Some(30.0), StoredSession::Contents(stored_session_text()));

        match outcome {
            LoadOutcome::Applied(report) => {
                assert_eq!(report.regions, 1);
                assert_eq!(report.annotations, 2);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        // Nothing changed since the load, so nothing to write
        assert_eq!(ws.persist_job().unwrap(), None);
    }

    #[test]
    fn test_duration_change_triggers_write_after_load() {
        let mut ws = workspace();
        let ticket = ws.switch_source(Path::new("/calls/a.wav"));
        ws.finish_load(&ticket, Some(31.25), StoredSession::Contents(stored_session_text()));

        let job = ws.persist_job().unwrap().expect("duration differs from the stored one");
        assert!(job.contents.contains("31.25"));
    }

    #[test]
    fn test_malformed_file_recovers_with_fresh_write() {
        let mut ws = workspace();
        let ticket = ws.switch_source(Path::new("/calls/a.wav"));

        let outcome = ws.finish_load(&ticket, Some(5.0), StoredSession::Contents("{ nope".to_string()));

        assert!(matches!(outcome, LoadOutcome::Recovered { .. }));
        let job = ws.persist_job().unwrap().expect("fresh file");
        assert_eq!(job.path, PathBuf::from("/calls/a-vcon.json"));
        assert!(job.contents.contains("\"vcon\": \"0.9.0\""));
        assert_eq!(ws.persist_job().unwrap(), None);
    }

    #[test]
    fn test_nothing_persisted_before_load_or_without_auto_save() {
        let mut ws = workspace();
        assert_eq!(ws.persist_job().unwrap(), None);

        let ticket = ws.switch_source(Path::new("/calls/a.wav"));
        ws.session_mut().create_region(0.0, 1.0).unwrap();
        assert_eq!(ws.persist_job().unwrap(), None);

        ws.finish_load(&ticket, None, StoredSession::Missing);
        ws.set_auto_save(false);
        assert_eq!(ws.persist_job().unwrap(), None);

        ws.set_auto_save(true);
        assert!(ws.persist_job().unwrap().is_some());
    }

    #[test]
    fn test_edits_after_load_produce_one_job_each() {
        let mut ws = workspace();
        let ticket = ws.switch_source(Path::new("/calls/a.wav"));
        ws.finish_load(&ticket, Some(10.0), StoredSession::Missing);
        ws.persist_job().unwrap();

        let region = ws.session_mut().create_region(1.0, 2.0).unwrap();
        ws.session_mut()
            .set_label(&region.id, "topic", "x", LabelTarget::Left)
            .unwrap();
        let job = ws.persist_job().unwrap().expect("changes pending");
        assert_eq!(job.generation, ticket.generation);
        assert_eq!(ws.persist_job().unwrap(), None);

        ws.persistence_failed();
        assert!(ws.persist_job().unwrap().is_some());
    }

    #[test]
    fn test_unreadable_file_keeps_editing_in_memory() {
        let mut ws = workspace();
        let ticket = ws.switch_source(Path::new("/calls/a.wav"));

        let outcome = ws.finish_load(&ticket, Some(10.0), StoredSession::Unreadable("denied".to_string()));

        assert!(matches!(outcome, LoadOutcome::Unreadable { .. }));
        assert!(ws.is_loaded());
        assert_eq!(ws.persist_job().unwrap(), None);
        ws.session_mut().create_region(1.0, 2.0).unwrap();
        assert!(ws.persist_job().unwrap().is_some());
    }

    #[test]
    fn test_unknown_duration_defers_restore() {
        let mut ws = workspace();
        let ticket = ws.switch_source(Path::new("/calls/a.wav"));

        let outcome = ws.finish_load(&ticket, None, StoredSession::Contents(stored_session_text()));

        assert!(matches!(outcome, LoadOutcome::Unreadable { .. }));
        assert!(ws.session().store().is_empty());
        assert!(!ws.is_loaded());
        ws.session_mut().create_region(0.0, 1.0).unwrap();
        assert_eq!(ws.persist_job().unwrap(), None);
    }

    #[test]
    fn test_export_ignores_auto_save() {
        let mut ws = Workspace::new(Session::default(), false);
        ws.switch_source(Path::new("/calls/a.wav"));
        let job = ws.export_job(Path::new("/tmp/out.json")).unwrap();
        assert!(job.contents.contains("file:a.wav"));
        assert!(ws.export_job(Path::new("")).is_err());
    }
}
