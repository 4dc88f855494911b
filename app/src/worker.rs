//! Headless JSON-lines loop
//!
//! One `WorkerCommand` per line on stdin, one `WorkerResponse` per line on
//! stdout. Notifications raised while a command runs are written before its
//! response. Logs go to stderr.

use anyhow::Result;
use labeler_types::{Notification, WorkerCommand, WorkerResponse};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::broadcast;

use crate::providers::PlaybackTransport;
use crate::state::AppState;

/// Playback transport driven by `play`/`timeUpdate` commands
///
/// Seeks are not applied to any player; they are reported back as
/// `seek` responses.
#[derive(Debug, Default)]
pub struct LineTransport {
    time: f64,
    duration: Option<f64>,
    pending_seek: Option<f64>,
}

impl LineTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_time(&mut self, time: f64) {
        self.time = time;
    }

    pub fn set_duration(&mut self, duration: Option<f64>) {
        self.duration = duration;
    }

    pub fn take_seek(&mut self) -> Option<f64> {
        self.pending_seek.take()
    }
}

impl PlaybackTransport for LineTransport {
    fn current_time(&self) -> f64 {
        self.time
    }

    fn seek(&mut self, time: f64) {
        self.time = time;
        self.pending_seek = Some(time);
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }
}

/// Execute one command against the state
pub async fn handle_command(
    state: &AppState,
    command: WorkerCommand,
    transport: &mut LineTransport,
) -> WorkerResponse {
    match execute(state, command, transport).await {
        Ok(response) => response,
        Err(e) => match e.downcast_ref::<labeler_core::LabelerError>() {
            // The target was already removed (e.g. by a cascade): nothing to do
            Some(err) if err.is_benign() => {
                tracing::debug!("Ignored: {}", err);
                WorkerResponse::Ok
            }
            _ => {
                tracing::warn!("Command failed: {:#}", e);
                WorkerResponse::Error {
                    message: format!("{:#}", e),
                }
            }
        },
    }
}

async fn execute(
    state: &AppState,
    command: WorkerCommand,
    transport: &mut LineTransport,
) -> Result<WorkerResponse> {
    let response = match command {
        WorkerCommand::ListAudioFiles { dir } => {
            let files = state.list_audio_files(Path::new(&dir)).await?;
            WorkerResponse::AudioFiles {
                files: files.iter().map(|p| p.display().to_string()).collect(),
            }
        }

        WorkerCommand::OpenAudio { path } => {
            state.open_audio(Path::new(&path)).await?;
            transport.set_time(0.0);
            transport.set_duration(state.duration());
            WorkerResponse::Ok
        }

        WorkerCommand::CreateRegion { start, end } => WorkerResponse::Region {
            region: state.create_region(start, end)?,
        },

        WorkerCommand::AddRegionAt { time } => WorkerResponse::Region {
            region: state.add_region_at(time)?,
        },

        WorkerCommand::UpdateRegion { id, start, end } => {
            state.update_region(&id, start, end)?;
            WorkerResponse::Ok
        }

        WorkerCommand::DeleteRegion { id } => {
            state.delete_region(&id);
            WorkerResponse::Ok
        }

        WorkerCommand::SetLabel {
            region_id,
            label_type,
            value,
            target,
        } => WorkerResponse::Annotations {
            annotations: state.set_label(&region_id, &label_type, &value, target)?,
        },

        WorkerCommand::LabelDraft { region_id } => {
            state
                .select_region(&region_id)
                .ok_or_else(|| labeler_core::LabelerError::region_not_found(&region_id))?;
            WorkerResponse::Draft {
                draft: state.label_draft(&region_id),
            }
        }

        WorkerCommand::DeleteAnnotation { id } => {
            state.delete_annotation(&id);
            WorkerResponse::Ok
        }

        WorkerCommand::DeleteRow { annotation_ids } => {
            state.delete_row(&annotation_ids);
            WorkerResponse::Ok
        }

        WorkerCommand::ClearAll => {
            state.clear_all();
            WorkerResponse::Ok
        }

        WorkerCommand::SetParty {
            channel,
            name,
            role,
            uri,
        } => {
            state.set_party(channel, name, role, uri);
            WorkerResponse::Ok
        }

        WorkerCommand::SetLooping { enabled } => {
            state.set_looping(enabled);
            WorkerResponse::Ok
        }

        WorkerCommand::Play { time } => {
            transport.set_time(time);
            WorkerResponse::Looping {
                region: state.on_play(&*transport),
            }
        }

        WorkerCommand::Pause => {
            state.on_pause();
            WorkerResponse::Ok
        }

        WorkerCommand::TimeUpdate { time } => {
            transport.set_time(time);
            state.on_time_update(time, transport);
            match transport.take_seek() {
                Some(time) => WorkerResponse::Seek { time },
                None => WorkerResponse::Ok,
            }
        }

        WorkerCommand::Rows => WorkerResponse::Rows { rows: state.rows() },

        WorkerCommand::LabelTypes => WorkerResponse::LabelTypes {
            label_types: state.label_types(),
        },

        WorkerCommand::Export { path } => {
            state.export(Path::new(&path)).await?;
            WorkerResponse::Ok
        }

        WorkerCommand::Shutdown => {
            state.flush().await?;
            WorkerResponse::Ok
        }
    };
    Ok(response)
}

async fn write_line<W: AsyncWrite + Unpin>(out: &mut W, response: &WorkerResponse) -> Result<()> {
    let mut line = serde_json::to_string(response)?;
    line.push('\n');
    out.write_all(line.as_bytes()).await?;
    out.flush().await?;
    Ok(())
}

fn drain(rx: &mut broadcast::Receiver<Notification>) -> Vec<Notification> {
    let mut pending = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(notification) => pending.push(notification),
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                tracing::warn!("Dropped {} notifications", skipped);
            }
            Err(_) => break,
        }
    }
    pending
}

/// Run the loop on stdin/stdout until `shutdown` or end of input
pub async fn run_worker(state: AppState) -> Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    serve(state, stdin, &mut stdout).await
}

/// Run the loop over arbitrary streams
pub async fn serve<R, W>(state: AppState, input: R, out: &mut W) -> Result<()>
where
    R: tokio::io::AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut notifications = state.subscribe();
    let mut transport = LineTransport::new();
    let mut lines = input.lines();

    tracing::info!("Labeler ready, listening for commands");

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let command: WorkerCommand = match serde_json::from_str(&line) {
            Ok(cmd) => cmd,
            Err(e) => {
                let response = WorkerResponse::Error {
                    message: format!("Invalid command: {}", e),
                };
                write_line(out, &response).await?;
                continue;
            }
        };

        let shutdown = matches!(command, WorkerCommand::Shutdown);
        let response = handle_command(&state, command, &mut transport).await;

        for notification in drain(&mut notifications) {
            write_line(out, &WorkerResponse::Notification { notification }).await?;
        }
        write_line(out, &response).await?;

        if shutdown {
            tracing::info!("Shutdown command received");
            return Ok(());
        }
    }

    // End of input: make sure pending edits reach the disk
    state.flush().await?;
    for notification in drain(&mut notifications) {
        write_line(out, &WorkerResponse::Notification { notification }).await?;
    }
    tracing::info!("Labeler shutting down");
    Ok(())
}
