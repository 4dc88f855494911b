//! Session codec
//!
//! Serializes a session into the vCon exchange format and rebuilds the
//! region/annotation store from a stored document.
//!
//! Region links are not part of the wire format. On load, annotations are
//! grouped by their `(start, end)` pair and every distinct pair becomes one
//! fresh region. Two regions that had identical bounds before saving come
//! back as a single region.

use std::path::Path;

use labeler_types::{
    AnalysisEntry, Annotation, DocumentMetadata, MediaDescriptor, VconDocument,
    CHANNEL_COUNT, GENERATOR, VCON_VERSION,
};
use uuid::Uuid;

use crate::error::{LabelerError, Result};
use crate::party::PartyRegistry;
use crate::store::SessionStore;
use crate::time::{millis_key, round3};

/// Media information of the current audio source
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MediaInfo {
    /// Content type, e.g. "audio/wav"
    pub content_type: Option<String>,
    /// Logical reference, e.g. "file:call.wav"
    pub uri: Option<String>,
    /// Total duration in seconds, once known
    pub duration: Option<f64>,
}

impl MediaInfo {
    /// Infer content type and logical reference from a file path
    pub fn from_path(path: &Path) -> Self {
        let content_type = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| content_type_for_extension(&ext.to_ascii_lowercase()).to_string());
        let uri = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| format!("file:{}", name));

        Self {
            content_type,
            uri,
            duration: None,
        }
    }

    fn descriptor(&self) -> MediaDescriptor {
        MediaDescriptor {
            content_type: self
                .content_type
                .clone()
                .unwrap_or_else(|| "audio".to_string()),
            uri: self.uri.clone(),
            channels: CHANNEL_COUNT,
            duration: self.duration.unwrap_or(0.0),
        }
    }
}

/// MIME type for an audio file extension (lowercase, without the dot)
pub fn content_type_for_extension(ext: &str) -> &'static str {
    match ext {
        "wav" | "wave" => "audio/wav",
        "mp3" => "audio/mpeg",
        "flac" => "audio/flac",
        "ogg" | "oga" | "opus" => "audio/ogg",
        "m4a" | "mp4" | "aac" => "audio/mp4",
        _ => "audio",
    }
}

/// Summary of a reconstruction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestoreReport {
    pub regions: usize,
    pub annotations: usize,
    /// Entries dropped because their bounds were unusable
    pub skipped: usize,
    /// Whether the stored parties replaced the registry
    pub parties_replaced: bool,
}

/// Build the document for the current session
///
/// A fresh document uuid and creation timestamp are minted on every call.
pub fn encode(store: &SessionStore, parties: &PartyRegistry, media: &MediaInfo) -> VconDocument {
    let created_at = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);

    VconDocument {
        vcon: VCON_VERSION.to_string(),
        uuid: Uuid::new_v4().to_string(),
        parties: parties.to_vec(),
        media: vec![media.descriptor()],
        analysis: store.annotations().iter().map(to_entry).collect(),
        metadata: Some(DocumentMetadata {
            created_at,
            generator: GENERATOR.to_string(),
        }),
    }
}

/// Serialize the current session to pretty-printed JSON
pub fn to_json(store: &SessionStore, parties: &PartyRegistry, media: &MediaInfo) -> Result<String> {
    serde_json::to_string_pretty(&encode(store, parties, media))
        .map_err(|e| LabelerError::MalformedSession(format!("failed to serialize: {}", e)))
}

/// Parse and validate a stored session file
pub fn decode(text: &str) -> Result<VconDocument> {
    if text.trim().is_empty() {
        return Err(LabelerError::MalformedSession("file is empty".to_string()));
    }
    let doc: VconDocument =
        serde_json::from_str(text).map_err(|e| LabelerError::MalformedSession(e.to_string()))?;

    if doc.vcon.trim().is_empty() {
        return Err(LabelerError::MalformedSession(
            "missing vcon version".to_string(),
        ));
    }
    if !doc.parties.is_empty() && doc.parties.len() != 2 {
        return Err(LabelerError::MalformedSession(format!(
            "expected 2 parties, found {}",
            doc.parties.len()
        )));
    }
    if doc.vcon != VCON_VERSION {
        tracing::warn!(
            "decode: session file has vcon version {}, expected {}",
            doc.vcon,
            VCON_VERSION
        );
    }
    Ok(doc)
}

/// Rebuild the store (and parties, when present) from a document
///
/// The store is cleared first. Groups keep the order of their first
/// appearance in `analysis`.
pub fn restore(
    doc: &VconDocument,
    store: &mut SessionStore,
    parties: &mut PartyRegistry,
) -> RestoreReport {
    store.clear_all();
    let mut report = RestoreReport::default();

    if let [left, right] = doc.parties.as_slice() {
        parties.replace(left.clone(), right.clone());
        report.parties_replaced = true;
    }

    let mut groups: Vec<((i64, i64), Vec<&AnalysisEntry>)> = Vec::new();
    for entry in &doc.analysis {
        if !entry.start.is_finite() || !entry.end.is_finite() || round3(entry.end) <= round3(entry.start)
        {
            tracing::warn!(
                "restore: skipping annotation {} with bounds [{}, {}]",
                entry.id,
                entry.start,
                entry.end
            );
            report.skipped += 1;
            continue;
        }
        let key = (millis_key(entry.start), millis_key(entry.end));
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(entry),
            None => groups.push((key, vec![entry])),
        }
    }

    for (_, members) in groups {
        let first = members[0];
        let region = match store.create_region(first.start, first.end) {
            Ok(region) => region,
            Err(e) => {
                tracing::warn!("restore: could not recreate region: {}", e);
                report.skipped += members.len();
                continue;
            }
        };
        report.regions += 1;

        for entry in members {
            match store.attach(from_entry(entry), &region.id) {
                Ok(_) => report.annotations += 1,
                Err(e) => {
                    tracing::warn!("restore: could not attach {}: {}", entry.id, e);
                    report.skipped += 1;
                }
            }
        }
    }

    tracing::debug!(
        "restore: {} regions, {} annotations, {} skipped",
        report.regions,
        report.annotations,
        report.skipped
    );
    report
}

fn to_entry(ann: &Annotation) -> AnalysisEntry {
    AnalysisEntry {
        id: ann.id.clone(),
        label_type: ann.label_type.clone(),
        start: round3(ann.start),
        end: round3(ann.end),
        value: ann.value.clone(),
        target: ann.target.clone(),
        channel: ann.channel,
    }
}

fn from_entry(entry: &AnalysisEntry) -> Annotation {
    Annotation {
        id: entry.id.clone(),
        label_type: entry.label_type.clone(),
        value: entry.value.clone(),
        start: entry.start,
        end: entry.end,
        target: entry.target.clone(),
        channel: entry.channel,
        region_id: None,
    }
}
