//! pulsegrid-services: Scheduling, synthesis and the audio graph

pub mod audio_engine;
pub mod audio_input;
pub mod audio_io;
pub mod buses;
pub mod channel_strip;
pub mod clock;
pub mod commands;
pub mod machine;
pub mod macro_fx;
pub mod mixer;
pub mod noise_bank;
pub mod preview;
pub mod samples;
pub mod scheduler;
pub mod synthesis;

pub use audio_engine::{AudioEngine, AudioEngineError};
pub use audio_input::SampleRecorder;
pub use audio_io::{AudioOutputError, OutputDeviceInfo, RealtimeOutputStream, default_output_info};
pub use buses::{DelayBus, MasterBus, ReverbBus};
pub use channel_strip::{ChannelStrip, StripParams};
pub use clock::AudioClock;
pub use commands::{CommandSink, EngineCommand, EngineEvent, StatusKind, StepReport, TrackInput};
pub use machine::DrumMachine;
pub use macro_fx::{EffectParam, MacroEffects};
pub use mixer::Mixer;
pub use noise_bank::{Curve, NoiseBank, NoiseColor};
pub use preview::{PreviewRenderer, render_preview};
pub use samples::{SampleError, decode_wav, resample};
pub use scheduler::Scheduler;
pub use synthesis::{Destination, OfflineBuffer, SynthLibrary, Voice};
