// Character profiles: human-authored JSON definitions of starting stats,
// animation frame timings, sound assets, and default skills/inventory.

use std::collections::HashMap;

use anyhow::Context;
use serde::Deserialize;

/// Default frame interval used when a profile omits an animation entry.
/// Missing content falls back rather than failing the operation.
pub const FALLBACK_FRAME_INTERVAL: f32 = 0.1;

/// Frame timing of one named animation.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AnimationSpec {
    pub frame_count: usize,
    pub frame_interval: f32,
}

impl AnimationSpec {
    pub fn duration(&self) -> f32 {
        self.frame_count as f32 * self.frame_interval
    }
}

/// Named character sound effects looked up from the profile's sfx table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacterSfx {
    Intro,
    Hurt,
    Killed,
    Jump,
    AttackUnarmed,
}

impl CharacterSfx {
    pub fn key(self) -> &'static str {
        match self {
            Self::Intro => "intro",
            Self::Hurt => "hurt",
            Self::Killed => "killed",
            Self::Jump => "jump",
            Self::AttackUnarmed => "attack_unarmed",
        }
    }
}

/// Immutable-at-load description of a character's starting state.
#[derive(Debug, Clone, Deserialize)]
pub struct CharacterProfile {
    pub id: String,
    pub name: String,
    pub level: i32,
    #[serde(default)]
    pub exp: i32,

    pub full_health: i32,
    pub full_stamina: i32,
    pub full_magicka: i32,
    pub health: i32,
    pub stamina: i32,
    pub magicka: i32,

    pub strength: i32,
    pub dexterity: i32,
    pub intelligence: i32,
    pub luck: i32,

    pub base_melee_damage: i32,

    // Body and movement
    pub body_width: f32,
    pub body_height: f32,
    pub move_speed: f32,
    pub jump_height: f32,
    #[serde(default)]
    pub can_double_jump: bool,

    // Combat timings
    pub attack_force: f32,
    pub attack_time: f32,
    pub attack_range: f32,
    pub attack_delay: f32,
    #[serde(default = "default_forward_attack_hits")]
    pub forward_attack_hits: i32,

    /// Frame timings keyed by animation name ("idle", "attacking", ...).
    #[serde(default)]
    pub animations: HashMap<String, AnimationSpec>,

    /// Sound asset paths keyed by sfx name ("hurt", "killed", ...).
    #[serde(default)]
    pub sfx: HashMap<String, String>,

    /// Skill profile resources granted at creation.
    #[serde(default)]
    pub default_skills: Vec<String>,

    /// Item definition resources granted at creation, with amounts.
    #[serde(default)]
    pub default_inventory: HashMap<String, i32>,
}

fn default_forward_attack_hits() -> i32 {
    1
}

impl CharacterProfile {
    /// Parse a profile from its JSON definition.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("failed to parse character profile")
    }

    /// Load a profile from a JSON file on disk.
    pub fn load_file(path: &str) -> anyhow::Result<Self> {
        Ok(crate::core::resource::load_json(path)?)
    }

    /// Sound asset path for a named sfx, if the profile declares one.
    pub fn sfx_path(&self, sfx: CharacterSfx) -> Option<&str> {
        self.sfx.get(sfx.key()).map(String::as_str)
    }
}

#[cfg(test)]
pub(crate) mod test_profiles {
    use super::*;

    /// A plain fighter used across the character/combat tests.
    pub fn fighter(id: &str) -> CharacterProfile {
        let mut animations = HashMap::new();
        for name in [
            "idle",
            "running",
            "running_stop",
            "jumping",
            "falling",
            "falling_getup",
            "crouching",
            "attacking",
            "attacking_midair",
            "blocking",
            "blocking_hit",
            "take_damage",
            "killed",
            "dodging_backward",
            "dodging_forward",
        ] {
            animations.insert(
                name.to_string(),
                AnimationSpec {
                    frame_count: 4,
                    frame_interval: 0.1,
                },
            );
        }

        CharacterProfile {
            id: id.to_string(),
            name: id.to_string(),
            level: 1,
            exp: 0,
            full_health: 100,
            full_stamina: 100,
            full_magicka: 100,
            health: 100,
            stamina: 100,
            magicka: 100,
            strength: 5,
            dexterity: 5,
            intelligence: 5,
            luck: 5,
            base_melee_damage: 20,
            body_width: 1.0,
            body_height: 2.0,
            move_speed: 0.25,
            jump_height: 3.0,
            can_double_jump: false,
            attack_force: 1.2,
            attack_time: 0.4,
            attack_range: 0.6,
            attack_delay: 0.2,
            forward_attack_hits: 1,
            animations,
            sfx: HashMap::new(),
            default_skills: Vec::new(),
            default_inventory: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_from_json() {
        let json = r#"{
            "id": "bandit",
            "name": "Bandit",
            "level": 3,
            "full_health": 80, "full_stamina": 50, "full_magicka": 10,
            "health": 80, "stamina": 50, "magicka": 10,
            "strength": 4, "dexterity": 6, "intelligence": 1, "luck": 3,
            "base_melee_damage": 12,
            "body_width": 1.0, "body_height": 1.8,
            "move_speed": 0.2, "jump_height": 2.5,
            "attack_force": 1.0, "attack_time": 0.3,
            "attack_range": 0.5, "attack_delay": 0.15,
            "animations": {
                "idle": { "frame_count": 6, "frame_interval": 0.1 }
            },
            "sfx": { "hurt": "sfx/bandit_hurt.ogg" },
            "default_inventory": { "gold_coin": 25 }
        }"#;

        let profile = CharacterProfile::from_json(json).unwrap();
        assert_eq!(profile.name, "Bandit");
        assert_eq!(profile.forward_attack_hits, 1);
        assert!(!profile.can_double_jump);
        assert_eq!(profile.sfx_path(CharacterSfx::Hurt), Some("sfx/bandit_hurt.ogg"));
        assert_eq!(profile.sfx_path(CharacterSfx::Killed), None);
        assert_eq!(profile.default_inventory.get("gold_coin"), Some(&25));
    }

    #[test]
    fn test_animation_spec_duration() {
        let spec = AnimationSpec {
            frame_count: 5,
            frame_interval: 0.2,
        };
        assert!((spec.duration() - 1.0).abs() < 1e-6);
    }
}
