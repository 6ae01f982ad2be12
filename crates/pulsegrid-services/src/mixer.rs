//! Audio-thread mixer
//!
//! Commands are applied at their exact frame: each block is split at event
//! boundaries and the sub-blocks rendered in between. At equal frames commands
//! apply in arrival order, so a strip update staged before a trigger is heard
//! by that trigger.

use std::collections::HashMap;
use std::sync::Arc;

use crossbeam_channel::Receiver;
use pulsegrid_core::{EngineConfig, TrackId};
use tracing::{debug, trace};

use crate::buses::{DelayBus, MasterBus, ReverbBus};
use crate::channel_strip::ChannelStrip;
use crate::clock::AudioClock;
use crate::commands::EngineCommand;
use crate::macro_fx::MacroEffects;
use crate::noise_bank::NoiseBank;
use crate::synthesis::Voice;

/// Largest sub-block rendered in one pass
pub const MAX_BLOCK: usize = 256;

struct TrackBus {
    strip: ChannelStrip,
    voices: Vec<Voice>,
}

struct Pending {
    frame: u64,
    seq: u64,
    command: EngineCommand,
}

pub struct Mixer {
    config: EngineConfig,
    bank: Arc<NoiseBank>,
    clock: Arc<AudioClock>,
    commands: Option<Receiver<EngineCommand>>,
    pending: Vec<Pending>,
    seq: u64,
    tracks: HashMap<TrackId, TrackBus>,
    master_voices: Vec<Voice>,
    reverb: ReverbBus,
    delay: DelayBus,
    master: MasterBus,
    macro_fx: Option<Box<dyn MacroEffects>>,
    bpm: f64,
    input: [f32; MAX_BLOCK],
    left: [f32; MAX_BLOCK],
    right: [f32; MAX_BLOCK],
    reverb_send: [f32; MAX_BLOCK],
    delay_send: [f32; MAX_BLOCK],
}

impl std::fmt::Debug for Mixer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mixer")
            .field("sample_rate", &self.clock.sample_rate())
            .field("tracks", &self.tracks.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl Mixer {
    pub fn new(config: &EngineConfig, bank: Arc<NoiseBank>, clock: Arc<AudioClock>) -> Self {
        let sample_rate = clock.sample_rate() as f32;
        let bpm = config.default_bpm;
        Self {
            reverb: ReverbBus::new(&bank.impulse(), &config.reverb),
            delay: DelayBus::new(sample_rate, bpm, &config.delay),
            master: MasterBus::new(sample_rate, config.ramp_secs as f32, &config.master),
            config: config.clone(),
            bank,
            clock,
            commands: None,
            pending: Vec::with_capacity(256),
            seq: 0,
            tracks: HashMap::new(),
            master_voices: Vec::with_capacity(16),
            macro_fx: None,
            bpm,
            input: [0.0; MAX_BLOCK],
            left: [0.0; MAX_BLOCK],
            right: [0.0; MAX_BLOCK],
            reverb_send: [0.0; MAX_BLOCK],
            delay_send: [0.0; MAX_BLOCK],
        }
    }

    /// Feed from a command channel; drained at the start of every render
    pub fn with_commands(mut self, commands: Receiver<EngineCommand>) -> Self {
        self.commands = Some(commands);
        self
    }

    pub fn clock(&self) -> &Arc<AudioClock> {
        &self.clock
    }

    pub fn sample_rate(&self) -> u32 {
        self.clock.sample_rate()
    }

    /// Rebuild every rate-dependent stage. Drops strips, voices and pending work.
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        debug!(sample_rate, "Mixer sample rate changed");
        self.clock.set_sample_rate(sample_rate);
        let sr = sample_rate as f32;
        self.bank = Arc::new(NoiseBank::new(sample_rate, self.config.reverb.seconds));
        self.reverb = ReverbBus::new(&self.bank.impulse(), &self.config.reverb);
        self.delay = DelayBus::new(sr, self.bpm, &self.config.delay);
        self.master = MasterBus::new(sr, self.config.ramp_secs as f32, &self.config.master);
        if let Some(fx) = &mut self.macro_fx {
            fx.set_sample_rate(sr);
        }
        self.tracks.clear();
        self.master_voices.clear();
        self.pending.clear();
    }

    pub fn set_macro_effects(&mut self, effects: Option<Box<dyn MacroEffects>>) {
        self.macro_fx = effects;
        let sr = self.clock.sample_rate() as f32;
        if let Some(fx) = &mut self.macro_fx {
            fx.set_sample_rate(sr);
        }
    }

    pub fn macro_effects(&mut self) -> Option<&mut (dyn MacroEffects + 'static)> {
        self.macro_fx.as_deref_mut()
    }

    pub fn strip(&self, track: TrackId) -> Option<&ChannelStrip> {
        self.tracks.get(&track).map(|bus| &bus.strip)
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn active_voices(&self) -> usize {
        self.tracks.values().map(|t| t.voices.len()).sum::<usize>() + self.master_voices.len()
    }

    /// Stage a command directly, bypassing the channel
    pub fn queue(&mut self, command: EngineCommand) {
        let now = self.clock.frames();
        let frame = command.time().map_or(now, |t| self.clock.frame_at(t));
        self.pending.push(Pending { frame, seq: self.seq, command });
        self.seq += 1;
    }

    fn drain(&mut self) {
        let Some(rx) = self.commands.take() else {
            return;
        };
        for command in rx.try_iter() {
            self.queue(command);
        }
        self.commands = Some(rx);
    }

    fn apply(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::Strip { track, params, .. } => {
                self.track_bus(track).strip.apply(&params);
            }
            EngineCommand::Voice { track, voice, .. } => {
                self.track_bus(track).voices.push(voice);
            }
            EngineCommand::MasterVoice { voice, .. } => self.master_voices.push(voice),
            EngineCommand::RemoveTrack(track) => {
                if self.tracks.remove(&track).is_some() {
                    debug!(track = track.0, "Channel strip removed");
                }
            }
            EngineCommand::Tempo { bpm, .. } => {
                self.bpm = bpm;
                self.delay.set_bpm(bpm);
            }
        }
    }

    fn track_bus(&mut self, track: TrackId) -> &mut TrackBus {
        let sample_rate = self.clock.sample_rate() as f32;
        let ramp = self.config.ramp_secs as f32;
        let curve = self.bank.crush_curve();
        self.tracks.entry(track).or_insert_with(|| {
            trace!(track = track.0, "Channel strip created");
            TrackBus {
                strip: ChannelStrip::new(sample_rate, ramp, curve.clone()),
                voices: Vec::with_capacity(8),
            }
        })
    }

    /// Render `n <= MAX_BLOCK` frames into the scratch stereo buffers
    fn render_segment(&mut self, n: usize) {
        self.left[..n].fill(0.0);
        self.right[..n].fill(0.0);
        self.reverb_send[..n].fill(0.0);
        self.delay_send[..n].fill(0.0);

        for bus in self.tracks.values_mut() {
            let input = &mut self.input[..n];
            input.fill(0.0);
            bus.voices.retain_mut(|voice| voice.render_add(input));
            bus.strip.process(
                input,
                &mut self.left[..n],
                &mut self.right[..n],
                &mut self.reverb_send[..n],
                &mut self.delay_send[..n],
            );
        }

        let input = &mut self.input[..n];
        input.fill(0.0);
        self.master_voices.retain_mut(|voice| voice.render_add(input));

        let (left, right) = (&mut self.left[..n], &mut self.right[..n]);
        for ((l, r), s) in left.iter_mut().zip(right.iter_mut()).zip(input.iter()) {
            *l += s;
            *r += s;
        }

        self.reverb.process(&self.reverb_send[..n], left, right);
        self.delay.process(&self.delay_send[..n], left, right);
        if let Some(fx) = &mut self.macro_fx {
            fx.process(left, right);
        }
        self.master.process(left, right);
    }

    /// Fill an interleaved output buffer and advance the clock
    pub fn render(&mut self, out: &mut [f32], channels: u16) {
        self.drain();
        if !self.pending.is_empty() {
            self.pending.sort_by_key(|p| (p.frame, p.seq));
        }

        let channels = channels.max(1) as usize;
        let mut frames_left = out.len() / channels;
        let mut written = 0;

        while frames_left > 0 {
            let now = self.clock.frames();

            while self.pending.first().is_some_and(|p| p.frame <= now) {
                let due = self.pending.remove(0);
                self.apply(due.command);
            }

            let mut n = frames_left.min(MAX_BLOCK);
            if let Some(next) = self.pending.first() {
                n = n.min((next.frame - now) as usize);
            }

            self.render_segment(n);

            let dest = &mut out[written * channels..(written + n) * channels];
            for (i, frame) in dest.chunks_mut(channels).enumerate() {
                match frame {
                    [mono] => *mono = 0.5 * (self.left[i] + self.right[i]),
                    [l, r, rest @ ..] => {
                        *l = self.left[i];
                        *r = self.right[i];
                        rest.fill(0.0);
                    }
                    [] => {}
                }
            }

            self.clock.advance(n as u64);
            written += n;
            frames_left -= n;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel_strip::StripParams;
    use crate::macro_fx::tests::RecordingMacro;
    use crate::synthesis::{AmpEnv, FreqEnv, Layer, Waveform};
    use crossbeam_channel::unbounded;

    const SR: u32 = 8_000;

    fn mixer() -> Mixer {
        let mut config = EngineConfig::default();
        config.reverb.return_gain = 0.0;
        config.delay.return_gain = 0.0;
        config.master.gain = 1.0;
        let bank = Arc::new(NoiseBank::new(SR, 0.05));
        Mixer::new(&config, bank, Arc::new(AudioClock::new(SR)))
    }

    fn blip() -> Voice {
        Voice::new(SR as f32).with(
            Layer::osc(Waveform::Square, FreqEnv::fixed(400.0)).env(AmpEnv::new(0.0, 0.01, 0.001)),
        )
    }

    fn first_sound(out: &[f32]) -> Option<usize> {
        out.chunks(2).position(|f| f[0].abs() > 1e-4)
    }

    #[test]
    fn test_voice_starts_on_exact_frame() {
        let onset = |time: f64| {
            let mut mixer = mixer();
            mixer.queue(EngineCommand::Voice { track: TrackId(1), time, voice: blip() });
            let mut out = vec![0.0; 2 * 2_000];
            mixer.render(&mut out, 2);
            assert_eq!(mixer.clock().frames(), 2_000);
            first_sound(&out)
        };
        let reference = onset(0.0).unwrap_or(0);
        assert_eq!(onset(0.1), Some(reference + 800));
    }

    #[test]
    fn test_unmute_at_trigger_is_heard() {
        let mut mixer = mixer();
        let muted = StripParams { gain: 0.0, ..StripParams::default() };
        mixer.queue(EngineCommand::Strip { track: TrackId(1), time: 0.0, params: muted });
        let mut out = vec![0.0; 2 * 800];
        mixer.render(&mut out, 2);

        mixer.queue(EngineCommand::Strip {
            track: TrackId(1),
            time: 0.1,
            params: StripParams::default(),
        });
        mixer.queue(EngineCommand::Voice { track: TrackId(1), time: 0.1, voice: blip() });
        let mut out = vec![0.0; 2 * 400];
        mixer.render(&mut out, 2);
        assert!(out.iter().any(|s| s.abs() > 1e-3), "unmute ramp should be audible");
    }

    #[test]
    fn test_strips_created_lazily_and_removed() {
        let (tx, rx) = unbounded();
        let mut mixer = mixer().with_commands(rx);
        assert_eq!(mixer.track_count(), 0);
        tx.send(EngineCommand::Strip {
            track: TrackId(4),
            time: 0.0,
            params: StripParams::default(),
        })
        .unwrap();
        let mut out = vec![0.0; 64];
        mixer.render(&mut out, 2);
        assert!(mixer.strip(TrackId(4)).is_some());

        tx.send(EngineCommand::RemoveTrack(TrackId(4))).unwrap();
        mixer.render(&mut out, 2);
        assert_eq!(mixer.track_count(), 0);
    }

    #[test]
    fn test_finished_voices_are_dropped() {
        let mut mixer = mixer();
        mixer.queue(EngineCommand::MasterVoice { time: 0.0, voice: blip() });
        let mut out = vec![0.0; 2 * 16];
        mixer.render(&mut out, 2);
        assert_eq!(mixer.active_voices(), 1);
        let mut out = vec![0.0; 2 * 4_000];
        mixer.render(&mut out, 2);
        assert_eq!(mixer.active_voices(), 0);
    }

    #[test]
    fn test_mono_and_multichannel_layouts() {
        let mut mixer = mixer();
        mixer.queue(EngineCommand::MasterVoice { time: 0.0, voice: blip() });
        let mut mono = vec![0.0; 64];
        mixer.render(&mut mono, 1);
        assert!(mono.iter().any(|s| s.abs() > 1e-3));

        let mut quad = vec![0.0; 4 * 64];
        mixer.render(&mut quad, 4);
        assert!(quad.chunks(4).all(|f| f[2] == 0.0 && f[3] == 0.0));
    }

    #[test]
    fn test_macro_effects_run_on_master() {
        let mut mixer = mixer();
        let unit = RecordingMacro::default();
        let calls = unit.calls.clone();
        mixer.set_macro_effects(Some(Box::new(unit)));
        if let Some(fx) = mixer.macro_effects() {
            fx.apply(&["duck".to_string()]);
        }

        mixer.queue(EngineCommand::MasterVoice { time: 0.0, voice: blip() });
        let mut ducked = vec![0.0; 2 * 200];
        mixer.render(&mut ducked, 2);

        let mut plain = super::tests::mixer();
        plain.queue(EngineCommand::MasterVoice { time: 0.0, voice: blip() });
        let mut dry = vec![0.0; 2 * 200];
        plain.render(&mut dry, 2);

        let energy = |b: &[f32]| b.iter().map(|s| s.abs()).sum::<f32>();
        let ratio = energy(&ducked) / energy(&dry);
        assert!((ratio - 0.5).abs() < 0.05, "ratio {ratio}");
        assert_eq!(calls.lock().unwrap().as_slice(), ["apply:duck"]);
    }
}
