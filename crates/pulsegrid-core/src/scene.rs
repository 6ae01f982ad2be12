//! Scenes: switchable snapshots of genre, tempo and every track

use serde::{Deserialize, Serialize};

use crate::error::{PulseGridError, Result};
use crate::genre::Genre;
use crate::track::Track;

pub const DEFAULT_SCENE_COUNT: usize = 4;

/// Full performance state of the machine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    pub genre: Genre,
    pub bpm: f64,
    pub tracks: Vec<Track>,
}

/// Scene slots. Exactly one is live; the live one is edited through the
/// session, the others are at-rest snapshots restored verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneBank {
    scenes: Vec<Scene>,
    live: usize,
}

impl SceneBank {
    /// `count` slots, each a copy of `initial`
    pub fn new(count: usize, initial: &Scene) -> Self {
        Self {
            scenes: vec![initial.clone(); count.max(1)],
            live: 0,
        }
    }

    pub fn live_index(&self) -> usize {
        self.live
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Scene> {
        self.scenes.get(index)
    }

    /// Overwrite the live slot with the current state
    pub fn capture(&mut self, live: &Scene) {
        self.scenes[self.live] = live.clone();
    }

    /// Park the live state in its slot and return the selected scene
    pub fn select(&mut self, index: usize, live: &Scene) -> Result<Scene> {
        if index >= self.scenes.len() {
            return Err(PulseGridError::SceneOutOfRange(index));
        }
        self.capture(live);
        self.live = index;
        Ok(self.scenes[index].clone())
    }
}
