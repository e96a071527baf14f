use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// 24-bit RGB colour, written `#RRGGBB` in config files.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Colour {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Colour {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Components scaled to 0..=1, as shaders want them.
    pub fn to_f32(self) -> [f32; 3] {
        [self.r, self.g, self.b].map(|c| c as f32 / 255.0)
    }
}

impl FromStr for Colour {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, ConfigError> {
        let bad = || ConfigError::Colour {
            field: "skin",
            value: s.to_string(),
        };
        let hex = s.strip_prefix('#').ok_or_else(bad)?;
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(bad());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| bad());
        Ok(Self::rgb(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl TryFrom<String> for Colour {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, ConfigError> {
        value.parse()
    }
}

impl From<Colour> for String {
    fn from(c: Colour) -> String {
        c.to_string()
    }
}

impl fmt::Display for Colour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteShape {
    #[default]
    Arrow,
    Circle,
    Bar,
}

/// Visual theme for whatever draws the playfield. The engine validates it
/// once when a session is created and otherwise only hands it back out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skin {
    /// Left, up, down, right
    #[serde(default = "default_lane_colours")]
    pub lane_colours: [Colour; 4],
    #[serde(default = "default_background")]
    pub background: Colour,
    #[serde(default = "default_judge_line")]
    pub judge_line: Colour,
    #[serde(default = "default_perfect")]
    pub perfect: Colour,
    #[serde(default = "default_good")]
    pub good: Colour,
    #[serde(default = "default_miss")]
    pub miss: Colour,
    #[serde(default)]
    pub note_shape: NoteShape,
    /// Multiplier on the configured note size when drawn
    #[serde(default = "default_note_scale")]
    pub note_scale: f64,
}

impl Default for Skin {
    fn default() -> Self {
        Self {
            lane_colours: default_lane_colours(),
            background: default_background(),
            judge_line: default_judge_line(),
            perfect: default_perfect(),
            good: default_good(),
            miss: default_miss(),
            note_shape: NoteShape::default(),
            note_scale: default_note_scale(),
        }
    }
}

fn default_lane_colours() -> [Colour; 4] {
    [
        Colour::rgb(0xC2, 0x4C, 0xF6),
        Colour::rgb(0x00, 0xB4, 0xFF),
        Colour::rgb(0x3D, 0xDC, 0x84),
        Colour::rgb(0xFF, 0x3B, 0x5C),
    ]
}
fn default_background() -> Colour { Colour::rgb(0x10, 0x10, 0x18) }
fn default_judge_line() -> Colour { Colour::rgb(0xFF, 0xFF, 0xFF) }
fn default_perfect() -> Colour { Colour::rgb(0xFF, 0xD7, 0x00) }
fn default_good() -> Colour { Colour::rgb(0x7C, 0xFC, 0x00) }
fn default_miss() -> Colour { Colour::rgb(0xFF, 0x45, 0x00) }
fn default_note_scale() -> f64 { 1.0 }

impl Skin {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.note_scale.is_finite() && (0.25..=4.0).contains(&self.note_scale)) {
            return Err(ConfigError::invalid(
                "skin.note_scale",
                format!("{} outside 0.25..=4.0", self.note_scale),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_colours() {
        assert_eq!("#FF8000".parse::<Colour>().unwrap(), Colour::rgb(255, 128, 0));
        assert_eq!("#0a0B0c".parse::<Colour>().unwrap(), Colour::rgb(10, 11, 12));
        assert!("FF8000".parse::<Colour>().is_err());
        assert!("#FF80".parse::<Colour>().is_err());
        assert!("#GG0000".parse::<Colour>().is_err());
        assert!("#ÿÿÿ".parse::<Colour>().is_err());
    }

    #[test]
    fn colour_display_round_trips() {
        let c = Colour::rgb(1, 0xAB, 0xFF);
        assert_eq!(c.to_string(), "#01ABFF");
        assert_eq!(c.to_string().parse::<Colour>().unwrap(), c);
    }

    #[test]
    fn skin_from_toml_with_defaults() {
        let skin: Skin = toml::from_str(
            "lane_colours = [\"#000000\", \"#111111\", \"#222222\", \"#333333\"]\nnote_shape = \"circle\"\n",
        )
        .unwrap();
        assert_eq!(skin.lane_colours[3], Colour::rgb(0x33, 0x33, 0x33));
        assert_eq!(skin.note_shape, NoteShape::Circle);
        assert_eq!(skin.background, default_background());
        assert!(skin.validate().is_ok());
    }

    #[test]
    fn bad_colour_fails_to_load() {
        assert!(toml::from_str::<Skin>("background = \"red\"\n").is_err());
    }

    #[test]
    fn note_scale_range() {
        let skin = Skin {
            note_scale: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            skin.validate(),
            Err(ConfigError::Invalid { field: "skin.note_scale", .. })
        ));
    }
}
