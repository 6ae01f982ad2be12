//! Built-in "legendary" patterns in step-string notation

use crate::error::{PulseGridError, Result};
use crate::genre::{Genre, InstrumentRole};
use crate::pattern::parse_step_string;
use crate::session::SessionState;

/// A named groove: genre, tempo and one step string per role
#[derive(Debug, Clone, Copy)]
pub struct PresetPattern {
    pub name: &'static str,
    pub genre: Genre,
    pub bpm: f64,
    pub lanes: &'static [(InstrumentRole, &'static str)],
}

pub const PRESETS: &[PresetPattern] = &[
    PresetPattern {
        name: "Four on the Floor",
        genre: Genre::Tr909,
        bpm: 124.0,
        lanes: &[
            (InstrumentRole::Kick, "x...x...x...x..."),
            (InstrumentRole::Clap, "....x.......x..."),
            (InstrumentRole::ClosedHat, "x.x.x.x.x.x.x.x."),
            (InstrumentRole::OpenHat, "..x...x...x...x."),
        ],
    },
    PresetPattern {
        name: "Planet Rock",
        genre: Genre::Tr808,
        bpm: 127.0,
        lanes: &[
            (InstrumentRole::Kick, "x.....x.x.....x."),
            (InstrumentRole::Snare, "....x.......x..."),
            (InstrumentRole::ClosedHat, "xxxxxxxxxxxxxxxx"),
            (InstrumentRole::Cowbell, "x..x..x...x..x.."),
        ],
    },
    PresetPattern {
        name: "Boom Bap",
        genre: Genre::Tr808,
        bpm: 90.0,
        lanes: &[
            (InstrumentRole::Kick, "x......x..x....."),
            (InstrumentRole::Snare, "....x.......x..."),
            (InstrumentRole::ClosedHat, "x.x.x.x.x.x.x.xx"),
        ],
    },
    PresetPattern {
        name: "Amen",
        genre: Genre::Rave,
        bpm: 170.0,
        lanes: &[
            (InstrumentRole::Kick, "x.x.......xx...."),
            (InstrumentRole::Snare, "....x..x.x..x..x"),
            (InstrumentRole::ClosedHat, "x.x.x.x.x.x.x.x."),
            (InstrumentRole::Bass, "x.....x...x....."),
        ],
    },
    PresetPattern {
        name: "Rock Beat",
        genre: Genre::Cr78,
        bpm: 110.0,
        lanes: &[
            (InstrumentRole::Kick, "x.......x.x....."),
            (InstrumentRole::Snare, "....x.......x..."),
            (InstrumentRole::ClosedHat, "x.x.x.x.x.x.x.x."),
        ],
    },
    PresetPattern {
        name: "Acid House",
        genre: Genre::Tr909,
        bpm: 126.0,
        lanes: &[
            (InstrumentRole::Kick, "x...x...x...x..."),
            (InstrumentRole::ClosedHat, "..x...x...x...x."),
            (InstrumentRole::Bass, "x..x..x...x.x..x"),
        ],
    },
    PresetPattern {
        name: "Electro Funk",
        genre: Genre::Tr707,
        bpm: 112.0,
        lanes: &[
            (InstrumentRole::Kick, "x..x......x..x.."),
            (InstrumentRole::Snare, "....x.......x..."),
            (InstrumentRole::ClosedHat, "x.xxx.xxx.xxx.xx"),
            (InstrumentRole::Tom, "..............xx"),
        ],
    },
];

/// Look up a preset by name (case-insensitive)
pub fn find_preset(name: &str) -> Result<&'static PresetPattern> {
    PRESETS
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case(name.trim()))
        .ok_or_else(|| PulseGridError::UnknownPreset(name.to_string()))
}

/// Load a preset into the active pattern of every track. Tracks whose role the
/// preset does not mention get an empty grid. Returns the number of tracks
/// that received steps.
pub fn apply_preset(state: &mut SessionState, preset: &PresetPattern) -> usize {
    state.genre = preset.genre;
    state.set_bpm(preset.bpm);

    let mut loaded = 0;
    for track in &mut state.tracks {
        let lane = preset.lanes.iter().find(|(role, _)| *role == track.role);
        let steps = match lane {
            Some((_, steps)) => {
                loaded += 1;
                parse_step_string(steps)
            }
            None => Default::default(),
        };
        track.pattern_mut().steps = steps;
    }
    loaded
}
