use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Straight (non-premultiplied) 8-bit colour with alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const WHITE: Rgba = Rgba::rgb(0xff, 0xff, 0xff);
    pub const BLACK: Rgba = Rgba::rgb(0x00, 0x00, 0x00);
    pub const TRANSPARENT: Rgba = Rgba {
        r: 0,
        g: 0,
        b: 0,
        a: 0,
    };

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xff }
    }

    /// Returns the colour with its alpha multiplied by `opacity`.
    pub fn with_opacity(self, opacity: f32) -> Self {
        let opacity = if opacity.is_finite() {
            opacity.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            a: (self.a as f32 * opacity).round() as u8,
            ..self
        }
    }

    /// Multiplies the colour channels by `factor`, saturating at white.
    pub fn brighten(self, factor: f32) -> Self {
        let scale = |c: u8| (c as f32 * factor.max(0.0)).round().min(255.0) as u8;
        Self {
            r: scale(self.r),
            g: scale(self.g),
            b: scale(self.b),
            a: self.a,
        }
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// The six named moods. Declaration order is the auto-mode cycle order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Palette {
    Neon,
    Cyber,
    Sunset,
    Poison,
    Ocean,
    Fire,
}

impl Palette {
    pub const ALL: [Palette; 6] = [
        Palette::Neon,
        Palette::Cyber,
        Palette::Sunset,
        Palette::Poison,
        Palette::Ocean,
        Palette::Fire,
    ];

    /// Position of the palette in [`Palette::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// Palette at `index`, wrapping around the table.
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % Self::ALL.len()]
    }

    pub fn name(self) -> &'static str {
        match self {
            Palette::Neon => "neon",
            Palette::Cyber => "cyber",
            Palette::Sunset => "sunset",
            Palette::Poison => "poison",
            Palette::Ocean => "ocean",
            Palette::Fire => "fire",
        }
    }

    /// Calm palettes are left alone by the low-energy cool-down.
    pub fn is_calm(self) -> bool {
        matches!(self, Palette::Neon | Palette::Ocean)
    }

    /// Looks up the colour table entry for this palette.
    pub fn colors(self) -> &'static PaletteColors {
        &PALETTE_TABLE[self.index()]
    }
}

impl fmt::Display for Palette {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Palette {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Palette::ALL
            .into_iter()
            .find(|palette| palette.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown palette `{s}`"))
    }
}

/// Ordered colour set shared by background, particles and style renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaletteColors {
    pub glow: Rgba,
    pub bars: Rgba,
    pub core: Rgba,
    pub text: Rgba,
    pub bg_start: Rgba,
    pub bg_end: Rgba,
}

impl PaletteColors {
    /// The three colours particles are drawn from.
    pub fn primaries(&self) -> [Rgba; 3] {
        [self.glow, self.bars, self.core]
    }

    pub fn as_array(&self) -> [Rgba; 6] {
        [
            self.glow,
            self.bars,
            self.core,
            self.text,
            self.bg_start,
            self.bg_end,
        ]
    }
}

const fn palette(colors: [u32; 6]) -> PaletteColors {
    const fn hex(value: u32) -> Rgba {
        Rgba::rgb((value >> 16) as u8, (value >> 8) as u8, value as u8)
    }
    PaletteColors {
        glow: hex(colors[0]),
        bars: hex(colors[1]),
        core: hex(colors[2]),
        text: hex(colors[3]),
        bg_start: hex(colors[4]),
        bg_end: hex(colors[5]),
    }
}

static PALETTE_TABLE: [PaletteColors; 6] = [
    palette([0xff00ff, 0x00ffff, 0xffffff, 0xffffff, 0x240024, 0x000000]),
    palette([0x00ff99, 0x0066ff, 0xccff00, 0xffffff, 0x001a1a, 0x000000]),
    palette([0xff3366, 0xffcc00, 0xff9900, 0xffffff, 0x2b0a1a, 0x1a0500]),
    palette([0x9900ff, 0x00ff00, 0xcc00ff, 0xffffff, 0x1a0033, 0x000000]),
    palette([0x00ffff, 0x0099ff, 0xffffff, 0xffffff, 0x001133, 0x000511]),
    palette([0xff0000, 0xffaa00, 0xffff00, 0xffffff, 0x330000, 0x110000]),
];

/// Either mood-driven palette selection or a palette pinned by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ColorMode {
    #[default]
    Auto,
    Fixed(Palette),
}

impl ColorMode {
    /// Steps through `auto` followed by every palette in table order.
    pub fn next(self) -> Self {
        match self {
            ColorMode::Auto => ColorMode::Fixed(Palette::Neon),
            ColorMode::Fixed(Palette::Fire) => ColorMode::Auto,
            ColorMode::Fixed(palette) => ColorMode::Fixed(Palette::from_index(palette.index() + 1)),
        }
    }
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorMode::Auto => f.write_str("auto"),
            ColorMode::Fixed(palette) => fmt::Display::fmt(palette, f),
        }
    }
}

impl FromStr for ColorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("auto") {
            Ok(ColorMode::Auto)
        } else {
            s.parse().map(ColorMode::Fixed)
        }
    }
}

impl TryFrom<String> for ColorMode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ColorMode> for String {
    fn from(value: ColorMode) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_matches_palette_order() {
        assert_eq!(Palette::Neon.colors().glow.to_string(), "#ff00ff");
        assert_eq!(Palette::Cyber.colors().bars.to_string(), "#0066ff");
        assert_eq!(Palette::Sunset.colors().bg_start.to_string(), "#2b0a1a");
        assert_eq!(Palette::Fire.colors().core.to_string(), "#ffff00");
        assert_eq!(Palette::Ocean.colors().bg_end.to_string(), "#000511");
    }

    #[test]
    fn color_mode_parses_auto_and_palettes() {
        assert_eq!("auto".parse::<ColorMode>().unwrap(), ColorMode::Auto);
        assert_eq!(
            "Poison".parse::<ColorMode>().unwrap(),
            ColorMode::Fixed(Palette::Poison)
        );
        assert!("plaid".parse::<ColorMode>().is_err());
    }

    #[test]
    fn color_mode_cycle_visits_everything_once() {
        let mut mode = ColorMode::Auto;
        let mut seen = Vec::new();
        for _ in 0..7 {
            mode = mode.next();
            seen.push(mode);
        }
        assert_eq!(seen.last(), Some(&ColorMode::Auto));
        assert_eq!(seen[0], ColorMode::Fixed(Palette::Neon));
        assert_eq!(seen[5], ColorMode::Fixed(Palette::Fire));
    }

    #[test]
    fn color_mode_serialises_as_plain_string() {
        let json = serde_json::to_string(&ColorMode::Fixed(Palette::Ocean)).unwrap();
        assert_eq!(json, "\"ocean\"");
        let back: ColorMode = serde_json::from_str("\"auto\"").unwrap();
        assert_eq!(back, ColorMode::Auto);
    }

    #[test]
    fn brighten_saturates() {
        let color = Rgba::rgb(200, 100, 0).brighten(1.5);
        assert_eq!(color, Rgba::rgb(255, 150, 0));
    }
}
