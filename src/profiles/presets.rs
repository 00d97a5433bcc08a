//! Built-in, read-only profiles.

use super::{
    Profile, ProfileCategory, ProfileSettings, ProfileUsage, SettingValue, COLOR_CONTRAST,
    MOTION_REDUCTION, REDUCE_ANIMATIONS, TEXT_SCALING,
};
use chrono::{DateTime, Utc};

pub const VISUAL_IMPAIRMENT: &str = "visual-impairment";
pub const HEARING_IMPAIRMENT: &str = "hearing-impairment";
pub const MOTOR_IMPAIRMENT: &str = "motor-impairment";
pub const COGNITIVE_SUPPORT: &str = "cognitive-support";

fn settings(entries: &[(&str, SettingValue)]) -> ProfileSettings {
    entries
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

fn choice(value: &str) -> SettingValue {
    SettingValue::Choice(value.to_string())
}

fn preset(
    id: &str,
    name: &str,
    description: &str,
    category: ProfileCategory,
    settings: ProfileSettings,
) -> Profile {
    Profile {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        category,
        settings,
        is_preset: true,
        created_at: DateTime::<Utc>::UNIX_EPOCH,
        modified_at: DateTime::<Utc>::UNIX_EPOCH,
        usage: ProfileUsage::default(),
    }
}

/// The four presets, in display order.
pub fn preset_profiles() -> Vec<Profile> {
    use SettingValue::{Flag, Number};

    vec![
        preset(
            VISUAL_IMPAIRMENT,
            "Visual impairment",
            "Larger text, high contrast and reduced motion for low vision",
            ProfileCategory::Visual,
            settings(&[
                (TEXT_SCALING, Number(1.5)),
                (COLOR_CONTRAST, choice("high")),
                ("focus_indicators", Flag(true)),
                ("screen_reader_support", Flag(true)),
                ("keyboard_navigation", Flag(true)),
                ("audio_feedback", Flag(true)),
                (MOTION_REDUCTION, choice("reduced")),
            ]),
        ),
        preset(
            HEARING_IMPAIRMENT,
            "Hearing impairment",
            "Captions and visual alerts in place of sound",
            ProfileCategory::Audio,
            settings(&[
                ("visual_feedback", Flag(true)),
                ("show_captions", Flag(true)),
                ("caption_size", Number(1.2)),
                ("vibration", Flag(true)),
                ("flashing_alerts", Flag(true)),
                ("sound_visualization", Flag(true)),
                ("background_music", Flag(false)),
            ]),
        ),
        preset(
            MOTOR_IMPAIRMENT,
            "Motor impairment",
            "Alternative input and relaxed timing",
            ProfileCategory::Motor,
            settings(&[
                ("alternative_input", Flag(true)),
                ("sticky_keys", Flag(true)),
                ("slow_keys", Flag(true)),
                ("key_repeat_delay_ms", Number(800.0)),
                ("mouse_sensitivity", Number(0.5)),
                ("dwell_time_ms", Number(1000.0)),
                ("timing_adjustments", choice("extended")),
                ("one_handed_mode", Flag(true)),
            ]),
        ),
        preset(
            COGNITIVE_SUPPORT,
            "Cognitive support",
            "Simplified interface with contextual help",
            ProfileCategory::Cognitive,
            settings(&[
                ("ui_simplification", choice("essential")),
                ("contextual_help", Flag(true)),
                (REDUCE_ANIMATIONS, Flag(true)),
                ("reading_mode", Flag(true)),
                ("focus_mode", Flag(true)),
                ("memory_aids", Flag(true)),
                ("task_breakdown", Flag(true)),
                ("error_recovery", Flag(true)),
            ]),
        ),
    ]
}
