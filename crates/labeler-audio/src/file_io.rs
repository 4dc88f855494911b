//! Audio file discovery and probing

use anyhow::{Context, Result};
use hound::WavReader;
use std::path::{Path, PathBuf};

/// Extensions offered in the file list
pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "wave", "mp3", "flac", "ogg", "oga", "opus", "m4a"];

/// Basic stream facts needed by the labeler
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioInfo {
    /// Total duration in seconds
    pub duration: f64,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Whether the path looks like a supported audio file
pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| AUDIO_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Audio files directly inside `dir`, sorted by file name
pub fn list_audio_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory {}", dir.display()))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_audio_file(path))
        .collect();
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    tracing::debug!("Found {} audio files in {}", files.len(), dir.display());
    Ok(files)
}

/// Read duration, sample rate and channel count without decoding the audio
pub fn probe_audio(path: &Path) -> Result<AudioInfo> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let info = match ext.as_str() {
        "wav" | "wave" => probe_wav(path)?,
        _ => probe_with_symphonia(path, &ext)?,
    };

    if info.channels != 2 {
        tracing::warn!(
            "{} has {} channel(s); left/right labels assume a stereo recording",
            path.display(),
            info.channels
        );
    }
    Ok(info)
}

/// Duration in seconds
pub fn probe_duration(path: &Path) -> Result<f64> {
    probe_audio(path).map(|info| info.duration)
}

/// Probe WAV header using hound
fn probe_wav(path: &Path) -> Result<AudioInfo> {
    let reader = WavReader::open(path).context("Failed to open WAV file")?;
    let spec = reader.spec();
    anyhow::ensure!(spec.sample_rate > 0, "WAV file has a zero sample rate");

    // duration() counts frames (samples per channel)
    let frames = reader.duration();
    Ok(AudioInfo {
        duration: frames as f64 / spec.sample_rate as f64,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

/// Probe other formats using symphonia (mp3, m4a, ogg, flac)
///
/// Uses the frame count from the container when present, otherwise walks
/// the packets and sums their durations.
fn probe_with_symphonia(path: &Path, ext: &str) -> Result<AudioInfo> {
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;

    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if !ext.is_empty() {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .context("Unsupported or corrupt audio file")?;
    let mut format = probed.format;

    let track = format.default_track().context("No audio track found")?;
    let track_id = track.id;
    let params = track.codec_params.clone();

    let sample_rate = params.sample_rate.context("Unknown sample rate")?;
    let channels = params.channels.map(|c| c.count() as u16).unwrap_or(0);

    let duration = match params.n_frames {
        Some(frames) => frames as f64 / sample_rate as f64,
        None => {
            let mut total: u64 = 0;
            while let Ok(packet) = format.next_packet() {
                if packet.track_id() == track_id {
                    total += packet.dur();
                }
            }
            match params.time_base {
                Some(tb) => {
                    let time = tb.calc_time(total);
                    time.seconds as f64 + time.frac
                }
                None => total as f64 / sample_rate as f64,
            }
        }
    };

    Ok(AudioInfo {
        duration,
        sample_rate,
        channels,
    })
}
