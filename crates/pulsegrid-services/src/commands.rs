//! Messages between the control thread and the audio thread

use std::sync::Arc;

use crossbeam_channel::Sender;
use pulsegrid_core::TrackId;

use crate::channel_strip::StripParams;
use crate::synthesis::{Destination, Voice};

/// Work staged for the mixer. Times are absolute audio-clock seconds.
#[derive(Debug)]
pub enum EngineCommand {
    /// Retarget a track's strip (creates the strip on first use)
    Strip { track: TrackId, time: f64, params: StripParams },
    /// Start a voice on a track's strip input
    Voice { track: TrackId, time: f64, voice: Voice },
    /// Start a voice straight on the master bus
    MasterVoice { time: f64, voice: Voice },
    /// Tear down the strip of a deleted track
    RemoveTrack(TrackId),
    Tempo { time: f64, bpm: f64 },
}

impl EngineCommand {
    /// Audio-clock time the command applies at; `None` means immediately
    pub fn time(&self) -> Option<f64> {
        match self {
            Self::Strip { time, .. }
            | Self::Voice { time, .. }
            | Self::MasterVoice { time, .. }
            | Self::Tempo { time, .. } => Some(*time),
            Self::RemoveTrack(_) => None,
        }
    }
}

/// Anything the scheduler can stage commands into
pub trait CommandSink {
    fn push(&mut self, command: EngineCommand);
}

impl CommandSink for Sender<EngineCommand> {
    fn push(&mut self, command: EngineCommand) {
        // Only fails once the mixer is gone, at which point nothing can sound
        let _ = self.send(command);
    }
}

impl CommandSink for Vec<EngineCommand> {
    fn push(&mut self, command: EngineCommand) {
        Vec::push(self, command);
    }
}

/// Live destination: the input of one track's channel strip
pub struct TrackInput<'a> {
    pub track: TrackId,
    pub sample_rate: f32,
    pub sink: &'a mut dyn CommandSink,
}

impl Destination for TrackInput<'_> {
    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    fn connect(&mut self, time: f64, voice: Voice) {
        self.sink.push(EngineCommand::Voice { track: self.track, time, voice });
    }
}

/// One fired step, reported when it becomes audible
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub step: usize,
    pub time: f64,
    /// Tracks that sounded, with their resolved variation
    pub triggered: Vec<(TrackId, usize)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    /// Output not unlocked or not present; sound is deferred
    AudioUnavailable,
    /// Recording device missing or access denied
    DeviceFailure,
    /// A sample could not be decoded; the track was left as is
    DecodeFailure,
}

/// Notifications for the presentation layer
#[derive(Debug, Clone)]
pub enum EngineEvent {
    StepReached(StepReport),
    PreviewReady { track: TrackId, samples: Arc<[f32]>, sample_rate: u32 },
    Status { kind: StatusKind, message: String },
}
