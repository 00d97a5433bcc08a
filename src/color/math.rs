//! Relative luminance and contrast ratio.
//!
//! All functions here are pure and deterministic. Channel values are on the
//! `0..=255` scale; fractional values are accepted as-is.

use crate::error::ColorError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Linear-light threshold of the sRGB transfer function.
const SRGB_LINEAR_THRESHOLD: f64 = 0.03928;

/// Channel weights for relative luminance.
const LUMINANCE_WEIGHTS: [f64; 3] = [0.2126, 0.7152, 0.0722];

/// A validated RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 3]", into = "[f64; 3]")]
pub struct Rgb {
    r: f64,
    g: f64,
    b: f64,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };
    pub const WHITE: Rgb = Rgb {
        r: 255.0,
        g: 255.0,
        b: 255.0,
    };

    /// Build a color, rejecting channels outside `0..=255`.
    pub fn new(r: f64, g: f64, b: f64) -> Result<Self, ColorError> {
        Ok(Self {
            r: check_channel("red", r)?,
            g: check_channel("green", g)?,
            b: check_channel("blue", b)?,
        })
    }

    pub fn r(&self) -> f64 {
        self.r
    }

    pub fn g(&self) -> f64 {
        self.g
    }

    pub fn b(&self) -> f64 {
        self.b
    }

    pub fn channels(&self) -> [f64; 3] {
        [self.r, self.g, self.b]
    }

    /// Parse a CSS color: `#rgb`, `#rrggbb`, `rgb(r, g, b)` or `rgba(r, g, b, a)`.
    ///
    /// The alpha channel of `rgba()` is ignored.
    pub fn parse(input: &str) -> Result<Self, ColorError> {
        let s = input.trim().to_ascii_lowercase();

        if let Some(hex) = s.strip_prefix('#') {
            return parse_hex(hex).ok_or_else(|| ColorError::Unparseable(input.to_string()));
        }

        let body = s
            .strip_prefix("rgba(")
            .or_else(|| s.strip_prefix("rgb("))
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(|| ColorError::Unparseable(input.to_string()))?;

        let parts: Vec<&str> = body.split(',').map(str::trim).collect();
        if parts.len() != 3 && parts.len() != 4 {
            return Err(ColorError::Unparseable(input.to_string()));
        }

        let mut channels = [0.0; 3];
        for (slot, part) in channels.iter_mut().zip(&parts) {
            *slot = part
                .parse::<f64>()
                .map_err(|_| ColorError::Unparseable(input.to_string()))?;
        }

        Self::new(channels[0], channels[1], channels[2])
    }

    /// Linear blend towards `target`; `amount` of 0 keeps `self`, 1 yields `target`.
    pub fn mix(&self, target: Rgb, amount: f64) -> Rgb {
        let t = amount.clamp(0.0, 1.0);
        let lerp = |a: f64, b: f64| a + (b - a) * t;
        Rgb {
            r: lerp(self.r, target.r),
            g: lerp(self.g, target.g),
            b: lerp(self.b, target.b),
        }
    }

    /// Lowercase `#rrggbb` form, channels rounded.
    pub fn to_hex(&self) -> String {
        format!(
            "#{:02x}{:02x}{:02x}",
            self.r.round() as u8,
            self.g.round() as u8,
            self.b.round() as u8
        )
    }
}

impl TryFrom<[f64; 3]> for Rgb {
    type Error = ColorError;

    fn try_from(value: [f64; 3]) -> Result<Self, Self::Error> {
        Rgb::new(value[0], value[1], value[2])
    }
}

impl From<Rgb> for [f64; 3] {
    fn from(value: Rgb) -> Self {
        value.channels()
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

fn check_channel(channel: &'static str, value: f64) -> Result<f64, ColorError> {
    if value.is_finite() && (0.0..=255.0).contains(&value) {
        Ok(value)
    } else {
        Err(ColorError::OutOfRange { channel, value })
    }
}

fn parse_hex(hex: &str) -> Option<Rgb> {
    let expanded: String = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect(),
        6 => hex.to_string(),
        _ => return None,
    };

    let channel = |i: usize| u8::from_str_radix(&expanded[i..i + 2], 16).ok();
    Some(Rgb {
        r: channel(0)? as f64,
        g: channel(2)? as f64,
        b: channel(4)? as f64,
    })
}

/// Relative luminance of a color, in `0.0..=1.0`.
pub fn relative_luminance(rgb: Rgb) -> f64 {
    rgb.channels()
        .iter()
        .zip(LUMINANCE_WEIGHTS)
        .map(|(&channel, weight)| linearize(channel / 255.0) * weight)
        .sum()
}

fn linearize(v: f64) -> f64 {
    if v <= SRGB_LINEAR_THRESHOLD {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

/// Contrast ratio between two colors; symmetric and always `>= 1.0`.
pub fn contrast_ratio(a: Rgb, b: Rgb) -> f64 {
    let la = relative_luminance(a);
    let lb = relative_luminance(b);
    let (lighter, darker) = if la >= lb { (la, lb) } else { (lb, la) };
    (lighter + 0.05) / (darker + 0.05)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb(r: f64, g: f64, b: f64) -> Rgb {
        Rgb::new(r, g, b).unwrap()
    }

    #[test]
    fn test_black_white_contrast() {
        let ratio = contrast_ratio(Rgb::BLACK, Rgb::WHITE);
        assert!((ratio - 21.0).abs() < 0.05, "got {}", ratio);
    }

    #[test]
    fn test_contrast_symmetry() {
        let samples = [
            rgb(0.0, 0.0, 0.0),
            rgb(255.0, 255.0, 255.0),
            rgb(119.0, 119.0, 119.0),
            rgb(255.0, 0.0, 0.0),
            rgb(12.5, 200.0, 33.0),
            rgb(0.0, 0.0, 128.0),
        ];
        for a in samples {
            for b in samples {
                assert_eq!(contrast_ratio(a, b), contrast_ratio(b, a));
            }
        }
    }

    #[test]
    fn test_contrast_identity() {
        for color in [Rgb::BLACK, Rgb::WHITE, rgb(64.0, 128.0, 192.0)] {
            assert_eq!(contrast_ratio(color, color), 1.0);
        }
    }

    #[test]
    fn test_known_gray_ratio() {
        // #777777 on white sits just under the 4.5 threshold.
        let ratio = contrast_ratio(rgb(119.0, 119.0, 119.0), Rgb::WHITE);
        assert!(ratio > 4.4 && ratio < 4.5, "got {}", ratio);
    }

    #[test]
    fn test_luminance_bounds() {
        assert_eq!(relative_luminance(Rgb::BLACK), 0.0);
        assert!((relative_luminance(Rgb::WHITE) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_out_of_range_channel_rejected() {
        assert!(matches!(
            Rgb::new(256.0, 0.0, 0.0),
            Err(ColorError::OutOfRange { channel: "red", .. })
        ));
        assert!(Rgb::new(0.0, -1.0, 0.0).is_err());
        assert!(Rgb::new(0.0, 0.0, f64::NAN).is_err());
        // Edge values are legitimate.
        assert!(Rgb::new(0.0, 255.0, 0.0).is_ok());
    }

    #[test]
    fn test_parse_css_colors() {
        assert_eq!(Rgb::parse("#fff").unwrap(), Rgb::WHITE);
        assert_eq!(Rgb::parse("#000000").unwrap(), Rgb::BLACK);
        assert_eq!(Rgb::parse("rgb(255, 0, 0)").unwrap(), rgb(255.0, 0.0, 0.0));
        assert_eq!(
            Rgb::parse("rgba(10, 20, 30, 0.5)").unwrap(),
            rgb(10.0, 20.0, 30.0)
        );
        assert!(Rgb::parse("rgb(300, 0, 0)").is_err());
        assert!(Rgb::parse("#12345").is_err());
        assert!(Rgb::parse("papayawhip").is_err());
    }

    #[test]
    fn test_serde_rejects_out_of_range() {
        let parsed: Result<Rgb, _> = serde_json::from_str("[0, 0, 400]");
        assert!(parsed.is_err());
        let parsed: Rgb = serde_json::from_str("[0, 0, 255]").unwrap();
        assert_eq!(parsed.b(), 255.0);
    }

    #[test]
    fn test_mix_and_hex() {
        assert_eq!(Rgb::BLACK.mix(Rgb::WHITE, 1.0), Rgb::WHITE);
        assert_eq!(Rgb::WHITE.mix(Rgb::BLACK, 0.0), Rgb::WHITE);
        assert_eq!(rgb(255.0, 128.0, 0.0).to_hex(), "#ff8000");
    }
}
