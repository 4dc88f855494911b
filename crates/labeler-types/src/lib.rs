//! Shared types for the vCon labeler
//!
//! This crate contains the data structures shared between the session
//! engine, the host application and the external UI.
//!
//! Types are annotated with `#[ts(export)]` for TypeScript generation via ts-rs.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// vCon format version written into every session file
pub const VCON_VERSION: &str = "0.9.0";

/// Generator tag written into session metadata
pub const GENERATOR: &str = "VConAudioLabeler";

/// Number of channels of every labeled recording
pub const CHANNEL_COUNT: u8 = 2;

// ============================================================================
// Party Types
// ============================================================================

/// Role of a conversation party
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PartyRole {
    Agent,
    Customer,
    #[default]
    Unknown,
}

impl std::fmt::Display for PartyRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PartyRole::Agent => write!(f, "agent"),
            PartyRole::Customer => write!(f, "customer"),
            PartyRole::Unknown => write!(f, "unknown"),
        }
    }
}

/// Identity bound to one audio channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export)]
pub struct Party {
    pub id: String,
    pub role: PartyRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

// ============================================================================
// Channel & Target Types
// ============================================================================

/// Audio channel of a stereo recording (0 = left, 1 = right on the wire)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "u8", into = "u8")]
pub enum Channel {
    Left,
    Right,
}

impl Channel {
    /// Wire index of the channel
    pub fn index(self) -> u8 {
        match self {
            Channel::Left => 0,
            Channel::Right => 1,
        }
    }

    /// The other channel of the pair
    pub fn opposite(self) -> Channel {
        match self {
            Channel::Left => Channel::Right,
            Channel::Right => Channel::Left,
        }
    }
}

impl From<Channel> for u8 {
    fn from(channel: Channel) -> Self {
        channel.index()
    }
}

impl TryFrom<u8> for Channel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Channel::Left),
            1 => Ok(Channel::Right),
            other => Err(format!("channel must be 0 or 1, got {}", other)),
        }
    }
}

/// Which channel(s) a label is committed to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum LabelTarget {
    #[default]
    Left,
    Right,
    Both,
}

impl LabelTarget {
    /// Channels a label with this target is written to
    pub fn channels(self) -> &'static [Channel] {
        match self {
            LabelTarget::Left => &[Channel::Left],
            LabelTarget::Right => &[Channel::Right],
            LabelTarget::Both => &[Channel::Left, Channel::Right],
        }
    }
}

// ============================================================================
// Region & Annotation Types
// ============================================================================

/// Operator-drawn time interval, in seconds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export)]
pub struct Region {
    pub id: String,
    pub start: f64,
    pub end: f64,
}

impl Region {
    /// Length of the region in seconds
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Whether `time` lies inside the region (bounds inclusive)
    pub fn contains(&self, time: f64) -> bool {
        self.start <= time && time <= self.end
    }

    /// Whether `other` lies entirely inside this region
    pub fn encloses(&self, other: &Region) -> bool {
        other.start >= self.start && other.end <= self.end
    }
}

/// Typed label bound to a channel and denormalized to its region's bounds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: String,
    #[serde(rename = "type")]
    pub label_type: String,
    pub value: String,
    pub start: f64,
    pub end: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(type = "0 | 1 | null")]
    pub channel: Option<Channel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region_id: Option<String>,
}

// ============================================================================
// vCon Document Types
// ============================================================================

/// Media descriptor of the labeled recording
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export)]
pub struct MediaDescriptor {
    /// Content type (e.g., "audio/wav")
    #[serde(rename = "type")]
    pub content_type: String,
    /// Logical reference (e.g., "file:call.wav")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    pub channels: u8,
    /// Total duration in seconds
    #[serde(default)]
    pub duration: f64,
}

/// One flattened annotation as persisted in `analysis`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export)]
pub struct AnalysisEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub label_type: String,
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(type = "0 | 1 | null")]
    pub channel: Option<Channel>,
}

/// Document metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export)]
pub struct DocumentMetadata {
    /// ISO-8601 creation timestamp
    pub created_at: String,
    pub generator: String,
}

/// Persisted session file (vCon exchange format)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export)]
pub struct VconDocument {
    pub vcon: String,
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub parties: Vec<Party>,
    #[serde(default)]
    pub media: Vec<MediaDescriptor>,
    #[serde(default)]
    pub analysis: Vec<AnalysisEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<DocumentMetadata>,
}

// ============================================================================
// Display Types
// ============================================================================

/// Channel column of a display row
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum DisplayChannel {
    Left,
    Right,
    Both,
    /// Legacy annotation without a channel
    Unassigned,
}

impl DisplayChannel {
    pub fn from_channel(channel: Option<Channel>) -> Self {
        match channel {
            Some(Channel::Left) => DisplayChannel::Left,
            Some(Channel::Right) => DisplayChannel::Right,
            None => DisplayChannel::Unassigned,
        }
    }
}

/// One row of the labels table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DisplayRow {
    /// Stable row key (id of the first source annotation)
    pub key: String,
    pub start: f64,
    pub end: f64,
    /// Start formatted to milliseconds, e.g. "1.500"
    pub start_display: String,
    /// End formatted to milliseconds
    pub end_display: String,
    #[serde(rename = "type")]
    pub label_type: String,
    pub value: String,
    pub channel: DisplayChannel,
    /// Human-readable party column
    pub party_label: String,
    /// Party ids the row's annotations target
    pub targets: Vec<String>,
    /// Source annotations; deleting the row deletes all of them
    pub annotation_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region_id: Option<String>,
}

/// Prefilled values for the label editor of a region
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct LabelDraft {
    #[serde(rename = "type")]
    pub label_type: String,
    pub value: String,
    pub target: LabelTarget,
}

// ============================================================================
// Settings Types
// ============================================================================

/// Application settings (config.json)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Label-type vocabulary offered by the type selector
    #[serde(default = "default_label_types")]
    pub label_types: Vec<String>,
    /// Write the session file after every change
    #[serde(default = "default_auto_save")]
    pub auto_save: bool,
    /// Debounce window for auto-save writes (0 = write through)
    #[serde(default = "default_auto_save_debounce_ms")]
    pub auto_save_debounce_ms: u64,
    /// Initial state of the loop-region toggle
    #[serde(default)]
    pub loop_regions: bool,
    /// Length of regions added at the playhead, in seconds
    #[serde(default = "default_region_length")]
    pub default_region_length: f64,
    /// Directory for rolling log files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,
}

/// Built-in label-type vocabulary
pub fn default_label_types() -> Vec<String> {
    ["sentiment", "intent", "topic", "emotion"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_auto_save() -> bool {
    true
}

fn default_auto_save_debounce_ms() -> u64 {
    500
}

fn default_region_length() -> f64 {
    2.0
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            label_types: default_label_types(),
            auto_save: default_auto_save(),
            auto_save_debounce_ms: default_auto_save_debounce_ms(),
            loop_regions: false,
            default_region_length: default_region_length(),
            log_dir: None,
        }
    }
}

// ============================================================================
// Event Types
// ============================================================================

/// Non-blocking notifications surfaced to the operator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Notification {
    /// A stored session was reconstructed
    SessionLoaded {
        path: String,
        regions: usize,
        annotations: usize,
    },
    /// No session file existed; a fresh one was created
    SessionInitialized { path: String },
    /// The stored file was malformed; a fresh session replaced it
    SessionRecovered { path: String, reason: String },
    /// A load finished after the operator switched sources and was dropped
    StaleLoadDiscarded { path: String },
    /// Writing the session file failed; in-memory state is kept
    PersistenceFailed { path: String, message: String },
}

// ============================================================================
// Worker IPC Types
// ============================================================================

/// Command for the headless JSON-lines loop
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WorkerCommand {
    /// List audio files in a directory
    ListAudioFiles { dir: String },
    /// Switch to an audio source and load its session file
    OpenAudio { path: String },
    CreateRegion { start: f64, end: f64 },
    /// Add a region of default length at the playhead
    AddRegionAt { time: f64 },
    UpdateRegion { id: String, start: f64, end: f64 },
    DeleteRegion { id: String },
    #[serde(rename_all = "camelCase")]
    SetLabel {
        region_id: String,
        #[serde(rename = "labelType")]
        label_type: String,
        value: String,
        target: LabelTarget,
    },
    #[serde(rename_all = "camelCase")]
    LabelDraft { region_id: String },
    DeleteAnnotation { id: String },
    /// Delete every annotation of a display row
    #[serde(rename_all = "camelCase")]
    DeleteRow { annotation_ids: Vec<String> },
    ClearAll,
    SetParty {
        channel: Channel,
        #[serde(default)]
        name: Option<String>,
        role: PartyRole,
        #[serde(default)]
        uri: Option<String>,
    },
    SetLooping { enabled: bool },
    Play { time: f64 },
    Pause,
    TimeUpdate { time: f64 },
    Rows,
    /// Configured label-type vocabulary
    LabelTypes,
    Export { path: String },
    /// Shutdown worker
    Shutdown,
}

/// Response for the headless JSON-lines loop
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WorkerResponse {
    AudioFiles { files: Vec<String> },
    Region { region: Region },
    Annotations { annotations: Vec<Annotation> },
    Draft { draft: LabelDraft },
    Rows { rows: Vec<DisplayRow> },
    #[serde(rename_all = "camelCase")]
    LabelTypes { label_types: Vec<String> },
    /// Playback should seek (loop back) to `time`
    Seek { time: f64 },
    /// Loop region selected at play start
    Looping { region: Option<Region> },
    Notification { notification: Notification },
    /// Error
    Error { message: String },
    /// Acknowledgement
    Ok,
}
