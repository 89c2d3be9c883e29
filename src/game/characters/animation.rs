// Animation clip set built from profile frame data
//
// Actual sprite playback is the host's job (AnimationDriver); the core only
// needs names, loop policy, and durations to time attacks, dodges, and
// death resolution.

use std::collections::HashMap;

use super::profile::{AnimationSpec, CharacterProfile, FALLBACK_FRAME_INTERVAL};

/// A single named animation clip.
#[derive(Debug, Clone, Copy)]
pub struct AnimationClip {
    pub frame_count: usize,
    pub frame_interval: f32,
    /// Whether the clip is a dedicated entry in the profile, as opposed to
    /// the fallback stand-in. Some behaviors (unarmed attacks, fall getup)
    /// only trigger when a dedicated clip exists.
    pub dedicated: bool,
}

impl AnimationClip {
    pub fn duration(&self) -> f32 {
        self.frame_count as f32 * self.frame_interval
    }
}

/// All clips a character can play, with a fallback for missing entries.
#[derive(Debug, Clone)]
pub struct AnimationSet {
    clips: HashMap<String, AnimationClip>,
    fallback: AnimationClip,
}

impl AnimationSet {
    /// Build the clip set from a profile's animation table. Entries the
    /// profile omits resolve to a one-frame fallback clip.
    pub fn from_profile(profile: &CharacterProfile) -> Self {
        let clips = profile
            .animations
            .iter()
            .map(|(name, spec)| {
                (
                    name.clone(),
                    AnimationClip {
                        frame_count: spec.frame_count,
                        frame_interval: spec.frame_interval,
                        dedicated: true,
                    },
                )
            })
            .collect();

        Self {
            clips,
            fallback: AnimationClip {
                frame_count: 1,
                frame_interval: FALLBACK_FRAME_INTERVAL,
                dedicated: false,
            },
        }
    }

    /// Clip for a named animation, falling back when missing.
    pub fn clip(&self, name: &str) -> AnimationClip {
        self.clips.get(name).copied().unwrap_or(self.fallback)
    }

    /// Duration in seconds of a named animation (fallback duration when the
    /// profile has no entry).
    pub fn duration(&self, name: &str) -> f32 {
        self.clip(name).duration()
    }

    /// Whether the profile declares a dedicated clip under this name.
    pub fn has_dedicated(&self, name: &str) -> bool {
        self.clips.contains_key(name)
    }

    /// Register a skill cast clip discovered at activation time.
    pub fn insert(&mut self, name: &str, spec: AnimationSpec) {
        self.clips.insert(
            name.to_string(),
            AnimationClip {
                frame_count: spec.frame_count,
                frame_interval: spec.frame_interval,
                dedicated: true,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::characters::profile::test_profiles;

    #[test]
    fn test_dedicated_clip_duration() {
        let set = AnimationSet::from_profile(&test_profiles::fighter("hero"));
        // 4 frames at 0.1s
        assert!((set.duration("attacking") - 0.4).abs() < 1e-6);
        assert!(set.has_dedicated("attacking"));
    }

    #[test]
    fn test_missing_clip_falls_back() {
        let set = AnimationSet::from_profile(&test_profiles::fighter("hero"));
        assert!(!set.has_dedicated("attacking_unarmed"));
        assert!((set.duration("attacking_unarmed") - FALLBACK_FRAME_INTERVAL).abs() < 1e-6);
    }

    #[test]
    fn test_insert_skill_clip() {
        let mut set = AnimationSet::from_profile(&test_profiles::fighter("hero"));
        set.insert(
            "spellcast",
            AnimationSpec {
                frame_count: 8,
                frame_interval: 0.05,
            },
        );
        assert!(set.has_dedicated("spellcast"));
        assert!((set.duration("spellcast") - 0.4).abs() < 1e-6);
    }
}
