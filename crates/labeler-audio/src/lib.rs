//! Audio file support for the VCon Labeler
//!
//! Lists audio files in a directory and probes their duration and channel
//! layout. Playback and waveform rendering belong to the host.
//!
//! # Formats
//! - **WAV** via hound (header only)
//! - **MP3, FLAC, OGG, M4A** via symphonia

pub mod file_io;

pub use file_io::{
    is_audio_file, list_audio_files, probe_audio, probe_duration, AudioInfo, AUDIO_EXTENSIONS,
};
