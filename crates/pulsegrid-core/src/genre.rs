//! Emulated drum machines and the instrument roles they voice

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PulseGridError, Result};

/// Drum-machine character used to pick a family of synthesis recipes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Genre {
    #[default]
    Tr808,
    Tr909,
    Tr707,
    Cr78,
    Rave,
}

impl Genre {
    pub const ALL: [Genre; 5] = [Genre::Tr808, Genre::Tr909, Genre::Tr707, Genre::Cr78, Genre::Rave];

    /// Display name, also accepted by `from_name`
    pub fn name(self) -> &'static str {
        match self {
            Self::Tr808 => "808",
            Self::Tr909 => "909",
            Self::Tr707 => "707",
            Self::Cr78 => "CR-78",
            Self::Rave => "Rave",
        }
    }

    /// Parse a genre name. Case, spaces, dashes and a leading "tr" are ignored,
    /// so "808", "TR-808" and "tr 808" all resolve to `Tr808`.
    pub fn from_name(name: &str) -> Result<Self> {
        let wanted = normalize(name);
        Self::ALL
            .into_iter()
            .find(|g| normalize(g.name()) == wanted)
            .ok_or_else(|| PulseGridError::UnknownGenre(name.to_string()))
    }
}

fn normalize(name: &str) -> String {
    let compact: String = name
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect();
    match compact.strip_prefix("tr") {
        Some(rest) if !rest.is_empty() => rest.to_string(),
        _ => compact,
    }
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Genre {
    type Err = PulseGridError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
    }
}

/// What a track plays inside a kit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstrumentRole {
    Kick,
    Snare,
    Clap,
    ClosedHat,
    OpenHat,
    Tom,
    Rim,
    Cowbell,
    Cymbal,
    Bass,
}

impl InstrumentRole {
    pub const ALL: [InstrumentRole; 10] = [
        InstrumentRole::Kick,
        InstrumentRole::Snare,
        InstrumentRole::Clap,
        InstrumentRole::ClosedHat,
        InstrumentRole::OpenHat,
        InstrumentRole::Tom,
        InstrumentRole::Rim,
        InstrumentRole::Cowbell,
        InstrumentRole::Cymbal,
        InstrumentRole::Bass,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Kick => "Kick",
            Self::Snare => "Snare",
            Self::Clap => "Clap",
            Self::ClosedHat => "Closed Hat",
            Self::OpenHat => "Open Hat",
            Self::Tom => "Tom",
            Self::Rim => "Rim",
            Self::Cowbell => "Cowbell",
            Self::Cymbal => "Cymbal",
            Self::Bass => "Bass",
        }
    }

    /// Melodic roles scale pitch by `2^pitch`; percussion shifts frequency additively.
    pub fn is_melodic(self) -> bool {
        matches!(self, Self::Bass)
    }

    /// Default pad color (0xRRGGBB)
    pub fn color(self) -> u32 {
        match self {
            Self::Kick => 0xE8_4A_3C,
            Self::Snare => 0xF2_A1_2E,
            Self::Clap => 0xF5_D0_3B,
            Self::ClosedHat => 0x6B_D1_6F,
            Self::OpenHat => 0x3F_B8_A9,
            Self::Tom => 0x4A_90_E2,
            Self::Rim => 0x8E_6B_E8,
            Self::Cowbell => 0xD9_6B_C9,
            Self::Cymbal => 0xB8_C4_D0,
            Self::Bass => 0xFF_6F_91,
        }
    }
}

impl fmt::Display for InstrumentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Timbre variant (0-3) that perturbs a recipe without changing its identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Variant(u8);

impl Variant {
    pub const COUNT: usize = 4;

    /// Out-of-range indices clamp to the last variant
    pub fn new(index: usize) -> Self {
        Self(index.min(Self::COUNT - 1) as u8)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genre_names_round_trip() {
        for genre in Genre::ALL {
            assert_eq!(Genre::from_name(genre.name()).unwrap(), genre);
        }
    }

    #[test]
    fn test_genre_name_is_forgiving() {
        assert_eq!(Genre::from_name("TR-808").unwrap(), Genre::Tr808);
        assert_eq!(Genre::from_name("tr 909").unwrap(), Genre::Tr909);
        assert_eq!(Genre::from_name("cr78").unwrap(), Genre::Cr78);
        assert_eq!("rave".parse::<Genre>().unwrap(), Genre::Rave);
        assert!(matches!(Genre::from_name("polka"), Err(PulseGridError::UnknownGenre(_))));
        assert!(Genre::from_name("tr").is_err());
    }

    #[test]
    fn test_variant_clamps() {
        assert_eq!(Variant::new(2).index(), 2);
        assert_eq!(Variant::new(9).index(), 3);
    }
}
