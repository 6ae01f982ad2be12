//! Debounced offline previews for waveform display

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use pulsegrid_core::{EngineConfig, Genre, Track, TrackId, base_params};
use tracing::{debug, trace, warn};

use crate::commands::EngineEvent;
use crate::synthesis::{OfflineBuffer, SynthLibrary};

/// Render `seconds` of one dry hit of `track`, starting at sample zero.
/// Skips the channel strip entirely.
pub fn render_preview(
    library: &SynthLibrary,
    track: &Track,
    genre: Genre,
    seconds: f64,
    sample_rate: u32,
) -> Vec<f32> {
    let params = base_params(track, track.pattern());
    let mut buffer = OfflineBuffer::new(seconds, sample_rate as f32);
    library.trigger_track(track, &params, genre, 0.0, &mut buffer);
    buffer.into_samples()
}

enum PreviewJob {
    Render { track: Track, genre: Genre },
    Cancel(TrackId),
}

struct Pending {
    track: Track,
    genre: Genre,
    due: Instant,
}

/// Front end of the preview worker. Requests for the same track restart its
/// debounce and replace the queued snapshot; a request or cancel arriving
/// while a render runs discards that render's result.
pub struct PreviewRenderer {
    jobs: Sender<PreviewJob>,
}

impl PreviewRenderer {
    pub fn new(config: &EngineConfig, library: Arc<SynthLibrary>, events: Sender<EngineEvent>) -> Self {
        let (jobs, rx) = unbounded();
        let worker = PreviewWorker {
            library,
            events,
            jobs: rx,
            sample_rate: config.sample_rate,
            seconds: config.preview_secs,
            debounce: Duration::from_millis(config.preview_debounce_ms),
            pending: HashMap::new(),
        };
        let spawned = thread::Builder::new()
            .name("pulsegrid-preview".into())
            .spawn(move || worker.run());
        if let Err(e) = spawned {
            warn!("Failed to spawn preview worker: {}", e);
        }
        Self { jobs }
    }

    /// Schedule a preview after the debounce delay, superseding any pending
    /// or running render for the same track
    pub fn request(&mut self, track: &Track, genre: Genre) {
        let _ = self.jobs.send(PreviewJob::Render { track: track.clone(), genre });
    }

    /// Drop whatever is in flight for `track`
    pub fn cancel(&mut self, track: TrackId) {
        let _ = self.jobs.send(PreviewJob::Cancel(track));
    }
}

struct PreviewWorker {
    library: Arc<SynthLibrary>,
    events: Sender<EngineEvent>,
    jobs: Receiver<PreviewJob>,
    sample_rate: u32,
    seconds: f64,
    debounce: Duration,
    pending: HashMap<TrackId, Pending>,
}

impl PreviewWorker {
    /// Runs until the renderer is dropped
    fn run(mut self) {
        loop {
            let next_due = self.pending.values().map(|p| p.due).min();
            let job = match next_due {
                None => self.jobs.recv().map_err(|_| RecvTimeoutError::Disconnected),
                Some(due) => self.jobs.recv_timeout(due.saturating_duration_since(Instant::now())),
            };
            match job {
                Ok(job) => {
                    self.accept(job);
                }
                Err(RecvTimeoutError::Timeout) => self.render_due(),
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        debug!("Preview worker stopped");
    }

    /// Queue or drop work; returns the track the job touched
    fn accept(&mut self, job: PreviewJob) -> TrackId {
        match job {
            PreviewJob::Render { track, genre } => {
                let id = track.id;
                let due = Instant::now() + self.debounce;
                self.pending.insert(id, Pending { track, genre, due });
                id
            }
            PreviewJob::Cancel(id) => {
                self.pending.remove(&id);
                id
            }
        }
    }

    fn render_due(&mut self) {
        let now = Instant::now();
        let due: Vec<TrackId> = self
            .pending
            .iter()
            .filter(|(_, p)| p.due <= now)
            .map(|(id, _)| *id)
            .collect();

        for id in due {
            let Some(job) = self.pending.remove(&id) else {
                continue;
            };
            let samples =
                render_preview(&self.library, &job.track, job.genre, self.seconds, self.sample_rate);

            // Anything that arrived meanwhile is newer than this render
            let mut superseded = false;
            while let Ok(next) = self.jobs.try_recv() {
                superseded |= self.accept(next) == id;
            }
            if superseded {
                trace!(track = id.0, "Preview superseded during render");
                continue;
            }
            let _ = self.events.send(EngineEvent::PreviewReady {
                track: id,
                samples: samples.into(),
                sample_rate: self.sample_rate,
            });
        }
    }
}
