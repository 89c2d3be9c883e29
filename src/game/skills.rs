// Skills: ability definitions and runtime activation records
//
// A character's skill registry owns one canonical `Skill` per definition;
// activation may fork an independent instance when the profile demands
// per-activation isolation. Concrete activation effects form a closed set
// (`SkillEffect`) applied by the game world, not a class hierarchy.

use anyhow::Context;
use serde::Deserialize;

use super::characters::profile::CharacterProfile;

/// Broad skill classification (also the registry bucket key).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillType {
    Melee,
    Magic,
}

pub const SKILL_TYPE_COUNT: usize = 2;

impl SkillType {
    pub fn index(self) -> usize {
        match self {
            Self::Melee => 0,
            Self::Magic => 1,
        }
    }
}

/// Closed set of concrete activation effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillEffect {
    /// Forward rush: velocity burst, no gravity for the opening quarter of
    /// the effect window, invincible and phasing until it ends.
    ForwardSlash,
    /// Defensive ward: invincible while toggled on.
    Ward,
    /// Pure resource/stat skill with no physical side effect.
    None,
}

/// Immutable-at-load description of one ability.
#[derive(Debug, Clone, Deserialize)]
pub struct SkillProfile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub desc: String,
    pub skill_type: SkillType,
    pub effect: SkillEffect,

    #[serde(default)]
    pub is_toggleable: bool,
    /// Fork a fresh instance per activation so simultaneous casts track
    /// their effect windows independently.
    #[serde(default)]
    pub should_fork_instance: bool,

    /// Resource deltas applied on activation (negative = cost).
    #[serde(default)]
    pub delta_health: i32,
    #[serde(default)]
    pub delta_magicka: i32,
    #[serde(default)]
    pub delta_stamina: i32,

    /// Damage contributed while the skill is active.
    #[serde(default)]
    pub physical_damage: i32,
    #[serde(default)]
    pub magical_damage: i32,
    #[serde(default = "default_num_hits")]
    pub num_hits: i32,
    #[serde(default)]
    pub hit_interval: f32,

    /// Seconds the character is locked in the cast / effect window.
    pub duration: f32,

    /// Cast animation frames name, looked up against character states.
    #[serde(default)]
    pub cast_animation: Option<String>,
    #[serde(default)]
    pub sfx_activate: Option<String>,
}

fn default_num_hits() -> i32 {
    1
}

impl SkillProfile {
    /// Parse a profile from its JSON definition.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("failed to parse skill profile")
    }

    /// Load a profile from a JSON file on disk.
    pub fn load_file(path: &str) -> anyhow::Result<Self> {
        Ok(crate::core::resource::load_json(path)?)
    }
}

/// Canonical registry entry for one ability definition.
#[derive(Debug, Clone)]
pub struct Skill {
    pub profile: SkillProfile,
}

impl Skill {
    pub fn new(profile: SkillProfile) -> Self {
        Self { profile }
    }

    pub fn id(&self) -> &str {
        &self.profile.id
    }

    /// Whether the character can afford this skill's resource deltas.
    pub fn can_activate(&self, user: &CharacterProfile) -> bool {
        user.health + self.profile.delta_health > 0
            && user.stamina + self.profile.delta_stamina >= 0
            && user.magicka + self.profile.delta_magicka >= 0
    }
}

/// Runtime activation record; a forked copy when the profile requests
/// per-activation isolation, otherwise a snapshot of the registry entry.
#[derive(Debug, Clone)]
pub struct ActiveSkill {
    /// Distinguishes simultaneously active instances of the same skill.
    pub instance_id: u64,
    pub profile: SkillProfile,
    pub forked: bool,
}

impl ActiveSkill {
    pub fn skill_id(&self) -> &str {
        &self.profile.id
    }
}
