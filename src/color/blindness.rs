//! Color-blindness simulation.
//!
//! Each deficiency is a fixed 3x3 linear transform over RGB channels.
//! Achromatopsia collapses every channel onto perceived brightness.

use super::math::Rgb;
use serde::{Deserialize, Serialize};
use std::fmt;

type Matrix = [[f64; 3]; 3];

const PROTANOPIA: Matrix = [
    [0.567, 0.433, 0.0],
    [0.558, 0.442, 0.0],
    [0.0, 0.242, 0.758],
];
const PROTANOMALY: Matrix = [
    [0.817, 0.183, 0.0],
    [0.333, 0.667, 0.0],
    [0.0, 0.125, 0.875],
];
const DEUTERANOPIA: Matrix = [[0.625, 0.375, 0.0], [0.7, 0.3, 0.0], [0.0, 0.3, 0.7]];
const DEUTERANOMALY: Matrix = [
    [0.8, 0.2, 0.0],
    [0.258, 0.742, 0.0],
    [0.0, 0.142, 0.858],
];
const TRITANOPIA: Matrix = [
    [0.95, 0.05, 0.0],
    [0.0, 0.433, 0.567],
    [0.0, 0.475, 0.525],
];
const TRITANOMALY: Matrix = [
    [0.967, 0.033, 0.0],
    [0.0, 0.733, 0.267],
    [0.0, 0.183, 0.817],
];
const ACHROMATOPSIA: Matrix = [
    [0.299, 0.587, 0.114],
    [0.299, 0.587, 0.114],
    [0.299, 0.587, 0.114],
];

/// Kinds of color vision deficiency that can be simulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Deficiency {
    Protanopia,
    Protanomaly,
    Deuteranopia,
    Deuteranomaly,
    Tritanopia,
    Tritanomaly,
    Achromatopsia,
}

impl Deficiency {
    pub const ALL: [Deficiency; 7] = [
        Deficiency::Protanopia,
        Deficiency::Protanomaly,
        Deficiency::Deuteranopia,
        Deficiency::Deuteranomaly,
        Deficiency::Tritanopia,
        Deficiency::Tritanomaly,
        Deficiency::Achromatopsia,
    ];

    fn matrix(&self) -> &'static Matrix {
        match self {
            Deficiency::Protanopia => &PROTANOPIA,
            Deficiency::Protanomaly => &PROTANOMALY,
            Deficiency::Deuteranopia => &DEUTERANOPIA,
            Deficiency::Deuteranomaly => &DEUTERANOMALY,
            Deficiency::Tritanopia => &TRITANOPIA,
            Deficiency::Tritanomaly => &TRITANOMALY,
            Deficiency::Achromatopsia => &ACHROMATOPSIA,
        }
    }

    /// Partial ("anomaly") variants keep some of the affected cone response.
    pub fn is_partial(&self) -> bool {
        matches!(
            self,
            Deficiency::Protanomaly | Deficiency::Deuteranomaly | Deficiency::Tritanomaly
        )
    }
}

impl fmt::Display for Deficiency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Deficiency::Protanopia => "protanopia",
            Deficiency::Protanomaly => "protanomaly",
            Deficiency::Deuteranopia => "deuteranopia",
            Deficiency::Deuteranomaly => "deuteranomaly",
            Deficiency::Tritanopia => "tritanopia",
            Deficiency::Tritanomaly => "tritanomaly",
            Deficiency::Achromatopsia => "achromatopsia",
        };
        write!(f, "{}", name)
    }
}

/// Apply the deficiency transform to a color.
pub fn simulate_color_blindness(rgb: Rgb, deficiency: Deficiency) -> Rgb {
    let input = rgb.channels();
    let mut out = [0.0; 3];
    for (slot, row) in out.iter_mut().zip(deficiency.matrix()) {
        let value: f64 = row.iter().zip(input).map(|(w, c)| w * c).sum();
        // Rows sum to 1, so only float noise can leave the range.
        *slot = value.clamp(0.0, 255.0);
    }

    Rgb::new(out[0], out[1], out[2]).unwrap_or(rgb)
}
