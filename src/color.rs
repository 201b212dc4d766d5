use std::str::FromStr;

use crate::error::{FolioError, FolioResult};

/// Canonical RGBA color used for fills, strokes and replacement matching.
///
/// Two color strings denote the same color iff they resolve to the same
/// `Rgba` value, regardless of their textual form (`red`, `#f00`,
/// `rgb(255,0,0)` all canonicalize identically).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba {
        r: 0,
        g: 0,
        b: 0,
        a: 255,
    };

    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// RGB channels normalized to `0.0..=1.0`.
    pub fn to_rgb_f32(self) -> [f32; 3] {
        [
            f32::from(self.r) / 255.0,
            f32::from(self.g) / 255.0,
            f32::from(self.b) / 255.0,
        ]
    }
}

/// Parse a color string (named, `#rgb`/`#rrggbb`/`#rrggbbaa`, `rgb()`,
/// `rgba()`) into its canonical RGBA value.
///
/// Unparseable input is an error; any fallback-to-black policy lives with
/// the caller, not here.
pub fn resolve(color: &str) -> FolioResult<Rgba> {
    let trimmed = color.trim();
    if trimmed.is_empty() {
        return Err(FolioError::invalid_color(color));
    }
    let parsed = svgtypes::Color::from_str(trimmed)
        .map_err(|_| FolioError::invalid_color(trimmed))?;
    Ok(Rgba {
        r: parsed.red,
        g: parsed.green,
        b: parsed.blue,
        a: parsed.alpha,
    })
}

/// `Some(color)` when the string resolves, `None` otherwise. Used where a
/// non-color value (`none`, gradients, url refs) simply means "no match".
pub fn try_resolve(color: &str) -> Option<Rgba> {
    resolve(color).ok()
}
