//! Authoritative session state handed to the scheduler every tick

use serde::{Deserialize, Serialize};

use crate::error::{PulseGridError, Result};
use crate::genre::{Genre, InstrumentRole};
use crate::scene::Scene;
use crate::track::{Track, TrackId};
use crate::transport::{DEFAULT_BPM, sanitize_bpm};

/// Roles of the kit a new session starts with
pub const DEFAULT_KIT: [InstrumentRole; 8] = [
    InstrumentRole::Kick,
    InstrumentRole::Snare,
    InstrumentRole::Clap,
    InstrumentRole::ClosedHat,
    InstrumentRole::OpenHat,
    InstrumentRole::Tom,
    InstrumentRole::Cowbell,
    InstrumentRole::Bass,
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub genre: Genre,
    bpm: f64,
    pub tracks: Vec<Track>,
    /// Click on every beat while playing
    pub metronome: bool,
    next_track_id: u64,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::with_kit(Genre::default(), DEFAULT_BPM)
    }
}

impl SessionState {
    /// Session with the default eight-track kit
    pub fn with_kit(genre: Genre, bpm: f64) -> Self {
        let mut state = Self {
            genre,
            bpm: sanitize_bpm(bpm),
            tracks: Vec::new(),
            metronome: false,
            next_track_id: 1,
        };
        for role in DEFAULT_KIT {
            state.add_track(role);
        }
        state
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Clamped into the supported tempo range
    pub fn set_bpm(&mut self, bpm: f64) {
        self.bpm = sanitize_bpm(bpm);
    }

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn track_mut(&mut self, id: TrackId) -> Result<&mut Track> {
        self.tracks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(PulseGridError::TrackNotFound(id.0))
    }

    /// Replace a track with an edited copy
    pub fn update_track<F>(&mut self, id: TrackId, edit: F) -> Result<()>
    where
        F: FnOnce(&mut Track),
    {
        let slot = self.track_mut(id)?;
        let mut next = slot.clone();
        edit(&mut next);
        next.id = id;
        *slot = next;
        Ok(())
    }

    pub fn add_track(&mut self, role: InstrumentRole) -> TrackId {
        let id = TrackId(self.next_track_id);
        self.next_track_id += 1;
        self.tracks.push(Track::new(id, role, role.name()));
        id
    }

    pub fn remove_track(&mut self, id: TrackId) -> Result<Track> {
        let pos = self
            .tracks
            .iter()
            .position(|t| t.id == id)
            .ok_or(PulseGridError::TrackNotFound(id.0))?;
        Ok(self.tracks.remove(pos))
    }

    /// First track playing the given role
    pub fn track_for_role(&self, role: InstrumentRole) -> Option<&Track> {
        self.tracks.iter().find(|t| t.role == role)
    }

    pub fn track_ids(&self) -> Vec<TrackId> {
        self.tracks.iter().map(|t| t.id).collect()
    }

    /// Snapshot of the live state as a scene
    pub fn scene(&self) -> Scene {
        Scene {
            genre: self.genre,
            bpm: self.bpm,
            tracks: self.tracks.clone(),
        }
    }

    /// Restore a scene verbatim
    pub fn restore_scene(&mut self, scene: Scene) {
        self.genre = scene.genre;
        self.bpm = sanitize_bpm(scene.bpm);
        self.tracks = scene.tracks;
        let max_id = self.tracks.iter().map(|t| t.id.0).max().unwrap_or(0);
        self.next_track_id = self.next_track_id.max(max_id + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_kit() {
        let state = SessionState::default();
        assert_eq!(state.tracks.len(), DEFAULT_KIT.len());
        assert_eq!(state.bpm(), DEFAULT_BPM);
        let ids = state.track_ids();
        let mut unique = ids.clone();
        unique.dedup();
        assert_eq!(ids, unique);
    }

    #[test]
    fn test_update_track_replaces_in_place() {
        let mut state = SessionState::default();
        let id = state.tracks[2].id;
        state.update_track(id, |t| t.muted = true).unwrap();
        assert!(state.tracks[2].muted);
        assert!(state.update_track(TrackId(999), |_| {}).is_err());
    }

    #[test]
    fn test_add_remove_track() {
        let mut state = SessionState::default();
        let id = state.add_track(InstrumentRole::Cymbal);
        assert_eq!(state.track(id).map(|t| t.role), Some(InstrumentRole::Cymbal));
        let removed = state.remove_track(id).unwrap();
        assert_eq!(removed.id, id);
        assert!(state.track(id).is_none());
    }

    #[test]
    fn test_scene_restore_keeps_ids_unique() {
        let mut state = SessionState::default();
        let scene = state.scene();
        state.tracks.clear();
        state.set_bpm(90.0);
        state.restore_scene(scene);
        assert_eq!(state.tracks.len(), DEFAULT_KIT.len());
        assert_eq!(state.bpm(), DEFAULT_BPM);
        let id = state.add_track(InstrumentRole::Rim);
        assert_eq!(state.tracks.iter().filter(|t| t.id == id).count(), 1);
    }
}
