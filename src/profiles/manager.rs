//! Profile lifecycle: create, edit, activate, rate, exchange and merge.

use super::presets::preset_profiles;
use super::{
    MergeStrategy, NewProfile, Profile, ProfileExport, ProfileSettings, ProfileUpdate,
    ProfileUsage, TEXT_SCALING,
};
use crate::error::ProfileError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const DEFAULT_MAX_PROFILES: usize = 10;
pub const DEFAULT_SATISFACTION_WEIGHT: f64 = 0.2;

/// Version tag written into every export bundle.
pub const EXPORT_VERSION: &str = "1.0";

const TEXT_SCALING_RANGE: (f64, f64) = (0.5, 3.0);

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileManagerConfig {
    /// Upper bound on user-defined profiles
    pub max_profiles: usize,
    /// Weight of a new sample in the satisfaction moving average
    pub satisfaction_weight: f64,
}

impl Default for ProfileManagerConfig {
    fn default() -> Self {
        Self {
            max_profiles: DEFAULT_MAX_PROFILES,
            satisfaction_weight: DEFAULT_SATISFACTION_WEIGHT,
        }
    }
}

/// Persisted form of the profile state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredProfiles {
    pub profiles: Vec<Profile>,
    /// Usage of presets, whose definitions are never stored
    #[serde(default)]
    pub preset_usage: BTreeMap<String, ProfileUsage>,
}

#[derive(Debug, Clone)]
struct ActiveSession {
    profile_id: String,
    started_at: DateTime<Utc>,
}

pub struct ProfileManager {
    config: ProfileManagerConfig,
    presets: Vec<Profile>,
    users: BTreeMap<String, Profile>,
    active: Option<ActiveSession>,
    previous: Option<String>,
}

impl ProfileManager {
    pub fn new(config: ProfileManagerConfig) -> Self {
        Self {
            config,
            presets: preset_profiles(),
            users: BTreeMap::new(),
            active: None,
            previous: None,
        }
    }

    /// Replace state with persisted profiles and re-enter the last active one.
    pub fn restore(&mut self, stored: StoredProfiles, active_id: Option<String>, now: DateTime<Utc>) {
        for preset in &mut self.presets {
            if let Some(usage) = stored.preset_usage.get(&preset.id) {
                preset.usage = usage.clone();
            }
        }

        self.users.clear();
        for mut profile in stored.profiles {
            if self.is_preset_id(&profile.id) {
                warn!("Ignoring stored profile that shadows preset '{}'", profile.id);
                continue;
            }
            profile.is_preset = false;
            self.users.insert(profile.id.clone(), profile);
        }

        self.active = active_id
            .filter(|id| self.get(id).is_some())
            .map(|profile_id| ActiveSession {
                profile_id,
                started_at: now,
            });
        debug!(
            "Restored {} user profiles (active: {:?})",
            self.users.len(),
            self.active_id()
        );
    }

    pub fn to_stored(&self) -> StoredProfiles {
        StoredProfiles {
            profiles: self.users.values().cloned().collect(),
            preset_usage: self
                .presets
                .iter()
                .filter(|p| p.usage != ProfileUsage::default())
                .map(|p| (p.id.clone(), p.usage.clone()))
                .collect(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Profile> {
        self.users
            .get(id)
            .or_else(|| self.presets.iter().find(|p| p.id == id))
    }

    /// Presets first, then user profiles by id.
    pub fn all(&self) -> Vec<&Profile> {
        self.presets.iter().chain(self.users.values()).collect()
    }

    pub fn user_profile_count(&self) -> usize {
        self.users.len()
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active.as_ref().map(|s| s.profile_id.as_str())
    }

    pub fn active(&self) -> Option<&Profile> {
        self.active_id().and_then(|id| self.get(id))
    }

    pub fn previous_id(&self) -> Option<&str> {
        self.previous.as_deref()
    }

    pub fn create(&mut self, new: NewProfile, now: DateTime<Utc>) -> Result<Profile, ProfileError> {
        if self.users.len() >= self.config.max_profiles {
            return Err(ProfileError::LimitReached(self.config.max_profiles));
        }
        validate(&new.name, &new.settings)?;

        let profile = Profile {
            id: Uuid::new_v4().to_string(),
            name: new.name.trim().to_string(),
            description: new.description,
            category: new.category,
            settings: new.settings,
            is_preset: false,
            created_at: now,
            modified_at: now,
            usage: ProfileUsage::default(),
        };
        info!("Created profile '{}' ({})", profile.name, profile.id);
        self.users.insert(profile.id.clone(), profile.clone());
        Ok(profile)
    }

    pub fn update(
        &mut self,
        id: &str,
        update: ProfileUpdate,
        now: DateTime<Utc>,
    ) -> Result<Profile, ProfileError> {
        let profile = self.user_mut(id)?;

        let name = update.name.unwrap_or_else(|| profile.name.clone());
        let mut settings = profile.settings.clone();
        settings.extend(update.settings);
        validate(&name, &settings)?;

        profile.name = name.trim().to_string();
        if let Some(description) = update.description {
            profile.description = description;
        }
        profile.settings = settings;
        profile.modified_at = now;
        Ok(profile.clone())
    }

    pub fn delete(&mut self, id: &str, now: DateTime<Utc>) -> Result<(), ProfileError> {
        self.user_mut(id)?;
        if self.active_id() == Some(id) {
            self.deactivate(now);
        }
        self.users.remove(id);
        info!("Deleted profile {}", id);
        Ok(())
    }

    /// Activate a profile, ending the current session first.
    pub fn activate(&mut self, id: &str, now: DateTime<Utc>) -> Result<&Profile, ProfileError> {
        if self.get(id).is_none() {
            return Err(ProfileError::NotFound(id.to_string()));
        }
        if self.active_id() != Some(id) {
            self.deactivate(now);

            let profile = self.profile_mut(id)?;
            profile.usage.usage_count += 1;
            profile.usage.last_used_at = Some(now);
            self.active = Some(ActiveSession {
                profile_id: id.to_string(),
                started_at: now,
            });
            info!("Activated profile {}", id);
        }
        self.get(id).ok_or_else(|| ProfileError::NotFound(id.to_string()))
    }

    /// End the active session, folding its length into the running average.
    pub fn deactivate(&mut self, now: DateTime<Utc>) -> Option<String> {
        let session = self.active.take()?;
        let seconds = (now - session.started_at).num_milliseconds().max(0) as f64 / 1000.0;

        if let Ok(profile) = self.profile_mut(&session.profile_id) {
            let sessions = profile.usage.usage_count.max(1) as f64;
            let usage = &mut profile.usage;
            usage.average_session_secs =
                (usage.average_session_secs * (sessions - 1.0) + seconds) / sessions;
            debug!(
                "Session on {} lasted {:.1}s (average {:.1}s)",
                session.profile_id, seconds, usage.average_session_secs
            );
        }

        self.previous = Some(session.profile_id.clone());
        Some(session.profile_id)
    }

    /// Record a satisfaction sample in `0..=100` and return the new score.
    pub fn record_satisfaction(&mut self, id: &str, sample: f64) -> Result<f64, ProfileError> {
        if !sample.is_finite() {
            return Err(ProfileError::Invalid(format!(
                "satisfaction sample {} is not a number",
                sample
            )));
        }
        let sample = sample.clamp(0.0, 100.0);
        let weight = self.config.satisfaction_weight;
        let profile = self.profile_mut(id)?;

        let score = match profile.usage.satisfaction_score {
            Some(previous) => previous * (1.0 - weight) + sample * weight,
            None => sample,
        }
        .clamp(0.0, 100.0);
        profile.usage.satisfaction_score = Some(score);
        Ok(score)
    }

    pub fn export(&self, id: &str, now: DateTime<Utc>) -> Result<ProfileExport, ProfileError> {
        let profile = self
            .get(id)
            .ok_or_else(|| ProfileError::NotFound(id.to_string()))?
            .clone();
        let checksum = checksum(&profile)?;
        Ok(ProfileExport {
            version: EXPORT_VERSION.to_string(),
            profile,
            exported_at: now,
            checksum,
        })
    }

    /// Import an exported bundle as a user profile.
    ///
    /// The checksum and version must match. An id that is already taken gets
    /// a fresh id unless `overwrite` is set; presets are never overwritten.
    pub fn import(
        &mut self,
        bundle: ProfileExport,
        overwrite: bool,
        now: DateTime<Utc>,
    ) -> Result<Profile, ProfileError> {
        if bundle.version != EXPORT_VERSION {
            return Err(ProfileError::InvalidImport(format!(
                "unsupported version {}",
                bundle.version
            )));
        }
        if checksum(&bundle.profile)? != bundle.checksum {
            return Err(ProfileError::InvalidImport("checksum mismatch".to_string()));
        }

        let mut profile = bundle.profile;
        validate(&profile.name, &profile.settings)?;

        let taken = self.get(&profile.id).is_some();
        let replaces = taken && overwrite && !self.is_preset_id(&profile.id);
        if taken && !replaces {
            profile.id = Uuid::new_v4().to_string();
            profile.name = format!("{} (imported)", profile.name);
        }
        if !replaces && self.users.len() >= self.config.max_profiles {
            return Err(ProfileError::LimitReached(self.config.max_profiles));
        }

        profile.is_preset = false;
        profile.created_at = now;
        profile.modified_at = now;
        profile.usage = ProfileUsage::default();

        info!("Imported profile '{}' ({})", profile.name, profile.id);
        self.users.insert(profile.id.clone(), profile.clone());
        Ok(profile)
    }

    /// Copy settings from `source_id` into the user profile `target_id`.
    pub fn merge(
        &mut self,
        source_id: &str,
        target_id: &str,
        strategy: &MergeStrategy,
        now: DateTime<Utc>,
    ) -> Result<Profile, ProfileError> {
        let source = self
            .get(source_id)
            .ok_or_else(|| ProfileError::NotFound(source_id.to_string()))?
            .settings
            .clone();
        let target = self.user_mut(target_id)?;

        let merged: ProfileSettings = match strategy {
            MergeStrategy::Override => source,
            MergeStrategy::Merge => {
                let mut settings = target.settings.clone();
                settings.extend(source);
                settings
            }
            MergeStrategy::Selective(names) => {
                let mut settings = target.settings.clone();
                for name in names {
                    if let Some(value) = source.get(name) {
                        settings.insert(name.clone(), value.clone());
                    }
                }
                settings
            }
        };
        validate(&target.name, &merged)?;

        target.settings = merged;
        target.modified_at = now;
        Ok(target.clone())
    }

    fn is_preset_id(&self, id: &str) -> bool {
        self.presets.iter().any(|p| p.id == id)
    }

    /// A user profile, or the reason it cannot be edited.
    fn user_mut(&mut self, id: &str) -> Result<&mut Profile, ProfileError> {
        if self.is_preset_id(id) {
            return Err(ProfileError::Immutable(id.to_string()));
        }
        self.users
            .get_mut(id)
            .ok_or_else(|| ProfileError::NotFound(id.to_string()))
    }

    /// Any profile, for usage bookkeeping.
    fn profile_mut(&mut self, id: &str) -> Result<&mut Profile, ProfileError> {
        if let Some(profile) = self.users.get_mut(id) {
            return Ok(profile);
        }
        self.presets
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| ProfileError::NotFound(id.to_string()))
    }
}

fn validate(name: &str, settings: &ProfileSettings) -> Result<(), ProfileError> {
    if name.trim().is_empty() {
        return Err(ProfileError::Invalid("profile name is required".to_string()));
    }
    if let Some(value) = settings.get(TEXT_SCALING) {
        let (min, max) = TEXT_SCALING_RANGE;
        match value.as_f64() {
            Some(scaling) if (min..=max).contains(&scaling) => {}
            _ => {
                return Err(ProfileError::Invalid(format!(
                    "{} must be a number between {} and {}",
                    TEXT_SCALING, min, max
                )))
            }
        }
    }
    Ok(())
}

fn checksum(profile: &Profile) -> Result<String, ProfileError> {
    let bytes = serde_json::to_vec(profile)
        .map_err(|e| ProfileError::InvalidImport(format!("cannot encode profile: {}", e)))?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}
