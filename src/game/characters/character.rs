// Character entity: profile, behavioral flags, state resolution, and the
// parts of the simulation that never touch physics or timers directly.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use log::warn;

use crate::core::math::clamp;
use crate::engine::scheduler::CallbackId;
use crate::engine::services::ActorId;
use crate::game::interactable::InteractableId;
use crate::game::items::{EquipmentType, Inventory, Item};
use crate::game::skills::{ActiveSkill, Skill, SKILL_TYPE_COUNT};

use super::animation::AnimationSet;
use super::fixtures::{BodyGeometry, CharacterBody};
use super::profile::CharacterProfile;
use super::state::{
    CharacterState, FALLING_VELOCITY_THRESHOLD, RUNNING_VELOCITY_THRESHOLD,
};

/// Unique identifier for a character
pub type CharacterId = ActorId;

/// Seconds between passive resource regeneration pulses.
pub const REGEN_PERIOD: f32 = 5.0;

/// Seconds a character is locked in the take-damage state per hit.
pub const TAKE_DAMAGE_DURATION: f32 = 0.2;

/// Experience required to advance past the given level.
pub fn next_level_exp(level: i32) -> i32 {
    100 * level.max(1)
}

/// A player- or AI-controlled actor in the simulation.
pub struct Character {
    pub id: CharacterId,
    pub profile: CharacterProfile,
    pub animations: AnimationSet,
    pub body: CharacterBody,

    // Behavioral flags, highest-priority first in state resolution.
    pub is_set_to_kill: bool,
    pub is_killed: bool,
    pub is_running_intro: bool,
    pub is_stunned: bool,
    pub is_taking_damage: bool,
    pub is_taking_damage_from_traps: bool,
    pub is_getting_up_from_falling: bool,
    pub is_blocking: bool,
    pub is_hit_while_blocking: bool,
    pub is_attacking: bool,
    pub is_using_skill: bool,
    pub is_dodging_backward: bool,
    pub is_dodging_forward: bool,
    pub is_invincible: bool,
    pub is_jumping: bool,
    pub is_double_jumping: bool,
    pub is_jumping_disallowed: bool,
    pub is_crouching: bool,
    pub is_start_running: bool,
    pub is_stop_running: bool,
    pub is_alerted: bool,
    pub is_facing_right: bool,
    pub is_on_ground: bool,
    pub is_on_platform: bool,
    pub is_shown_on_map: bool,

    pub current_state: CharacterState,
    pub previous_state: CharacterState,
    /// Pins a non-default attack variant across ticks (midair attacks).
    pub overriding_attack_state: Option<CharacterState>,
    /// Forces an animation re-dispatch even without a state change (set
    /// when a skill's cast window ends).
    pub force_state_refresh: bool,

    pub previous_velocity: (f32, f32),
    /// Facing at the end of the previous tick, for flip detection.
    pub(crate) last_facing_right: bool,

    // Weak references into the world: ids only, no ownership.
    pub in_range_targets: HashSet<CharacterId>,
    pub in_range_interactables: HashSet<InteractableId>,
    pub locked_on_target: Option<CharacterId>,
    pub allies: HashSet<CharacterId>,

    pub inventory: Inventory,

    // Skill registry: canonical instances plus per-type buckets of ids.
    skills: HashMap<String, Skill>,
    skill_book: [HashSet<String>; SKILL_TYPE_COUNT],
    pub active_skills: Vec<ActiveSkill>,
    /// Id of the skill currently locking the character in a cast.
    pub current_skill: Option<String>,

    // Pending callback ids for the in-flight attack sequence. Guarded by
    // mutexes because cancellation (on taking damage) and firing (from the
    // scheduler) can race when the host integrates threaded timers.
    pub attack_callbacks: Mutex<HashSet<CallbackId>>,
    pub inflict_damage_callbacks: Mutex<HashSet<CallbackId>>,

    pub(crate) regen_timer: f32,
    pub regen_delta_health: i32,
    pub regen_delta_magicka: i32,
    pub regen_delta_stamina: i32,
}

impl Character {
    pub fn new(id: CharacterId, profile: CharacterProfile) -> Self {
        let animations = AnimationSet::from_profile(&profile);
        Self {
            id,
            animations,
            body: CharacterBody::new(),
            is_set_to_kill: false,
            is_killed: false,
            is_running_intro: false,
            is_stunned: false,
            is_taking_damage: false,
            is_taking_damage_from_traps: false,
            is_getting_up_from_falling: false,
            is_blocking: false,
            is_hit_while_blocking: false,
            is_attacking: false,
            is_using_skill: false,
            is_dodging_backward: false,
            is_dodging_forward: false,
            is_invincible: false,
            is_jumping: false,
            is_double_jumping: false,
            is_jumping_disallowed: false,
            is_crouching: false,
            is_start_running: false,
            is_stop_running: false,
            is_alerted: false,
            is_facing_right: true,
            is_on_ground: false,
            is_on_platform: false,
            is_shown_on_map: false,
            current_state: CharacterState::Idle,
            previous_state: CharacterState::Idle,
            overriding_attack_state: None,
            force_state_refresh: false,
            previous_velocity: (0.0, 0.0),
            last_facing_right: true,
            in_range_targets: HashSet::new(),
            in_range_interactables: HashSet::new(),
            locked_on_target: None,
            allies: HashSet::new(),
            inventory: Inventory::new(),
            skills: HashMap::new(),
            skill_book: Default::default(),
            active_skills: Vec::new(),
            current_skill: None,
            attack_callbacks: Mutex::new(HashSet::new()),
            inflict_damage_callbacks: Mutex::new(HashSet::new()),
            regen_timer: 0.0,
            regen_delta_health: 5,
            regen_delta_magicka: 5,
            regen_delta_stamina: 5,
            profile,
        }
    }

    /// Current fixture-geometry inputs.
    pub fn geometry(&self) -> BodyGeometry {
        BodyGeometry {
            body_width: self.profile.body_width,
            body_height: self.profile.body_height,
            attack_range: self.profile.attack_range,
            facing_right: self.is_facing_right,
            crouching: self.is_crouching,
        }
    }

    // ------------------------------------------------------------------
    // Action gating

    pub fn is_attack_in_progress(&self) -> bool {
        self.is_attacking || self.overriding_attack_state.is_some()
    }

    pub fn is_movement_disallowed(&self) -> bool {
        self.is_crouching || self.is_jumping_down_disallowed()
    }

    pub fn is_jumping_down_disallowed(&self) -> bool {
        self.is_attack_in_progress()
            || self.is_getting_up_from_falling
            || self.is_stunned
            || self.is_blocking
            || self.is_running_intro
            || (self.is_taking_damage && !self.is_taking_damage_from_traps)
    }

    pub fn is_attacking_disallowed(&self) -> bool {
        self.is_attack_in_progress()
            || self.is_using_skill
            || self.is_getting_up_from_falling
            || self.is_stunned
            || self.is_taking_damage
            || self.is_blocking
            || self.is_running_intro
    }

    pub fn is_skill_activation_disallowed(&self) -> bool {
        self.is_attack_in_progress()
            || self.is_using_skill
            || self.is_getting_up_from_falling
            || self.is_stunned
            || self.is_blocking
            || self.is_running_intro
    }

    pub fn is_dodging(&self) -> bool {
        self.is_dodging_backward || self.is_dodging_forward
    }

    // ------------------------------------------------------------------
    // State resolution

    /// Resolve this tick's state from flags and velocity, highest priority
    /// first. `velocity` is the physics body's current linear velocity.
    pub fn determine_state(&self, velocity: (f32, f32)) -> CharacterState {
        if self.is_set_to_kill {
            CharacterState::Killed
        } else if self.is_running_intro {
            CharacterState::Intro
        } else if self.is_stunned {
            CharacterState::Stunned
        } else if self.is_taking_damage {
            CharacterState::TakeDamage
        } else if self.is_getting_up_from_falling {
            CharacterState::FallingGetup
        } else if self.is_hit_while_blocking {
            CharacterState::BlockingHit
        } else if self.is_blocking {
            CharacterState::Blocking
        } else if self.is_attacking {
            self.determine_attack_state()
        } else if self.is_dodging_backward {
            CharacterState::DodgingBackward
        } else if self.is_dodging_forward {
            CharacterState::DodgingForward
        } else if velocity.1 < FALLING_VELOCITY_THRESHOLD {
            CharacterState::Falling
        } else if self.is_jumping {
            CharacterState::Jumping
        } else if self.is_crouching {
            CharacterState::Crouching
        } else if self.is_start_running {
            CharacterState::RunningStart
        } else if self.is_stop_running {
            CharacterState::RunningStop
        } else if velocity.0.abs() > RUNNING_VELOCITY_THRESHOLD
            || self.previous_velocity.0.abs() > RUNNING_VELOCITY_THRESHOLD
        {
            CharacterState::Running
        } else {
            CharacterState::Idle
        }
    }

    /// Choose among the attack variants for the current armed/crouch/air
    /// combination, honoring a pinned override.
    pub fn determine_attack_state(&self) -> CharacterState {
        if let Some(state) = self.overriding_attack_state {
            return state;
        }

        let unarmed = self.equipped_weapon().is_none() && self.has_unarmed_attack_animation();
        if self.is_crouching {
            return if unarmed {
                CharacterState::AttackingUnarmedCrouch
            } else {
                CharacterState::AttackingCrouch
            };
        }
        if self.is_jumping {
            return if unarmed {
                CharacterState::AttackingUnarmedMidair
            } else {
                CharacterState::AttackingMidair
            };
        }
        if unarmed {
            CharacterState::AttackingUnarmed
        } else {
            CharacterState::Attacking
        }
    }

    /// Keep a midair attack animation stable: once ATTACKING_MIDAIR, a
    /// collapse to plain ATTACKING while airborne reads as flicker.
    pub fn maybe_override_with_attacking_midair(&mut self) {
        if self.previous_state == CharacterState::AttackingMidair
            && self.current_state == CharacterState::Attacking
        {
            self.current_state = CharacterState::AttackingMidair;
        }
    }

    /// Whether the horizontal velocity just crossed below the running
    /// threshold while still moving in the facing direction (and not
    /// being flung), which should trigger the stop-running transition.
    pub fn should_stop_running(&self, velocity: (f32, f32)) -> bool {
        if velocity.0.abs() >= self.profile.move_speed * 4.0 {
            return false;
        }

        let moving_forward = (self.is_facing_right && velocity.0 > 0.0)
            || (!self.is_facing_right && velocity.0 < 0.0);
        self.previous_velocity.0.abs() >= RUNNING_VELOCITY_THRESHOLD
            && velocity.0.abs() < RUNNING_VELOCITY_THRESHOLD
            && moving_forward
    }

    pub fn has_unarmed_attack_animation(&self) -> bool {
        self.animations
            .has_dedicated(CharacterState::AttackingUnarmed.animation_name())
    }

    pub fn has_getup_animation(&self) -> bool {
        self.animations
            .has_dedicated(CharacterState::FallingGetup.animation_name())
    }

    // ------------------------------------------------------------------
    // Resources

    /// Advance the regen timer; returns true when a 5-second pulse fires
    /// and pools were replenished.
    pub fn tick_regen(&mut self, delta: f32) -> bool {
        self.regen_timer += delta;
        if self.regen_timer < REGEN_PERIOD {
            return false;
        }
        self.regen_timer = 0.0;
        self.regen_health(self.regen_delta_health);
        self.regen_magicka(self.regen_delta_magicka);
        self.regen_stamina(self.regen_delta_stamina);
        true
    }

    pub fn regen_health(&mut self, delta: i32) {
        self.profile.health = clamp(self.profile.health + delta, 0, self.profile.full_health);
    }

    pub fn regen_magicka(&mut self, delta: i32) {
        self.profile.magicka = clamp(self.profile.magicka + delta, 0, self.profile.full_magicka);
    }

    pub fn regen_stamina(&mut self, delta: i32) {
        self.profile.stamina = clamp(self.profile.stamina + delta, 0, self.profile.full_stamina);
    }

    /// Grant experience, looping level-ups against the exp table.
    pub fn add_exp(&mut self, exp: i32) {
        self.profile.exp += exp;
        while self.profile.exp >= next_level_exp(self.profile.level) {
            self.profile.exp -= next_level_exp(self.profile.level);
            self.profile.level += 1;
        }
    }

    // ------------------------------------------------------------------
    // Inventory and equipment

    pub fn equipped_weapon(&self) -> Option<&Item> {
        self.inventory.equipped(EquipmentType::Weapon)
    }

    /// Consume one unit of a consumable: restore pools (clamped), apply
    /// permanent stat bonuses, remove the unit from the ledger.
    pub fn use_item(&mut self, item_id: &str) -> bool {
        let Some(effect) = self
            .inventory
            .get(item_id)
            .and_then(|item| item.consumable_effect())
            .cloned()
        else {
            warn!("Failed to use item [{item_id}], not a held consumable.");
            return false;
        };

        self.regen_health(effect.restore_health);
        self.regen_magicka(effect.restore_magicka);
        self.regen_stamina(effect.restore_stamina);

        self.profile.base_melee_damage += effect.bonus_physical_damage;
        self.profile.strength += effect.bonus_str;
        self.profile.dexterity += effect.bonus_dex;
        self.profile.intelligence += effect.bonus_int;
        self.profile.luck += effect.bonus_luk;
        self.profile.move_speed += effect.bonus_move_speed;
        self.profile.jump_height += effect.bonus_jump_height;

        self.inventory.remove_item(item_id, 1)
    }

    pub fn gold_balance(&self) -> i32 {
        self.inventory.amount_of(crate::game::items::GOLD_ITEM_ID)
    }

    // ------------------------------------------------------------------
    // Skill registry

    pub fn add_skill(&mut self, skill: Skill) -> bool {
        let id = skill.id().to_string();
        if self.skills.contains_key(&id) {
            warn!(
                "Failed to add skill [{id}] to [{}], already added.",
                self.profile.name
            );
            return false;
        }

        self.skill_book[skill.profile.skill_type.index()].insert(id.clone());
        self.skills.insert(id, skill);
        true
    }

    pub fn remove_skill(&mut self, skill_id: &str) -> bool {
        let Some(skill) = self.skills.remove(skill_id) else {
            warn!(
                "Failed to remove skill [{skill_id}] from [{}], already removed.",
                self.profile.name
            );
            return false;
        };

        self.skill_book[skill.profile.skill_type.index()].remove(skill_id);
        true
    }

    pub fn get_skill(&self, skill_id: &str) -> Option<&Skill> {
        self.skills.get(skill_id)
    }

    /// The active instance for a skill id, if one is registered.
    pub fn active_skill_instance(&self, skill_id: &str) -> Option<&ActiveSkill> {
        self.active_skills
            .iter()
            .find(|active| active.skill_id() == skill_id)
    }

    pub fn remove_active_skill_instance(&mut self, instance_id: u64) {
        self.active_skills
            .retain(|active| active.instance_id != instance_id);
    }

    /// Mark a hostile target for alert/AI response.
    pub fn lock_on(&mut self, target: CharacterId) {
        self.is_alerted = true;
        self.locked_on_target = Some(target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::characters::profile::test_profiles;
    use crate::game::items::test_profiles as item_profiles;
    use crate::game::skills::test_profiles as skill_profiles;

    fn character() -> Character {
        Character::new(1, test_profiles::fighter("hero"))
    }

    #[test]
    fn test_default_state_is_idle() {
        let ch = character();
        assert_eq!(ch.determine_state((0.0, 0.0)), CharacterState::Idle);
    }

    #[test]
    fn test_priority_killed_wins_over_everything() {
        let mut ch = character();
        ch.is_set_to_kill = true;
        ch.is_stunned = true;
        ch.is_attacking = true;
        assert_eq!(ch.determine_state((5.0, -5.0)), CharacterState::Killed);
    }

    #[test]
    fn test_falling_beats_jumping() {
        let mut ch = character();
        ch.is_jumping = true;
        assert_eq!(ch.determine_state((0.0, -3.0)), CharacterState::Falling);
        assert_eq!(ch.determine_state((0.0, 1.0)), CharacterState::Jumping);
    }

    #[test]
    fn test_running_uses_previous_velocity_too() {
        let mut ch = character();
        ch.previous_velocity = (0.5, 0.0);
        assert_eq!(ch.determine_state((0.0, 0.0)), CharacterState::Running);
    }

    #[test]
    fn test_attack_state_armed_vs_unarmed() {
        let mut ch = character();
        ch.is_attacking = true;
        // Fighter profile has no dedicated unarmed animation.
        assert_eq!(ch.determine_attack_state(), CharacterState::Attacking);

        ch.is_jumping = true;
        assert_eq!(ch.determine_attack_state(), CharacterState::AttackingMidair);

        ch.is_jumping = false;
        ch.is_crouching = true;
        assert_eq!(ch.determine_attack_state(), CharacterState::AttackingCrouch);
    }

    #[test]
    fn test_attack_override_pins_state() {
        let mut ch = character();
        ch.is_attacking = true;
        ch.overriding_attack_state = Some(CharacterState::AttackingUpward);
        assert_eq!(ch.determine_attack_state(), CharacterState::AttackingUpward);
    }

    #[test]
    fn test_midair_attack_flicker_suppression() {
        let mut ch = character();
        ch.previous_state = CharacterState::AttackingMidair;
        ch.current_state = CharacterState::Attacking;
        ch.maybe_override_with_attacking_midair();
        assert_eq!(ch.current_state, CharacterState::AttackingMidair);
    }

    #[test]
    fn test_stop_running_detection() {
        let mut ch = character();
        ch.is_facing_right = true;
        ch.previous_velocity = (0.5, 0.0);
        assert!(ch.should_stop_running((0.005, 0.0)));

        // Moving against facing: no stop-running transition.
        assert!(!ch.should_stop_running((-0.005, 0.0)));

        // Flung past 4x move speed: no transition either.
        assert!(!ch.should_stop_running((ch.profile.move_speed * 5.0, 0.0)));
    }

    #[test]
    fn test_regen_pulse_clamps_at_full() {
        let mut ch = character();
        ch.profile.health = 98;
        assert!(!ch.tick_regen(REGEN_PERIOD - 0.1));
        assert!(ch.tick_regen(0.1));
        assert_eq!(ch.profile.health, ch.profile.full_health);
    }

    #[test]
    fn test_add_exp_levels_up() {
        let mut ch = character();
        ch.add_exp(250);
        // 100 to reach level 2, 200 to reach level 3.
        assert_eq!(ch.profile.level, 2);
        assert_eq!(ch.profile.exp, 150);
    }

    #[test]
    fn test_use_consumable_restores_and_removes() {
        let mut ch = character();
        ch.profile.health = 50;
        ch.inventory
            .add_item(Item::new(item_profiles::potion()), 2);

        assert!(ch.use_item("small_potion"));
        assert_eq!(ch.profile.health, 80);
        assert_eq!(ch.inventory.amount_of("small_potion"), 1);
    }

    #[test]
    fn test_use_item_rejects_non_consumable() {
        let mut ch = character();
        ch.inventory.add_item(Item::new(item_profiles::sword(5)), 1);
        assert!(!ch.use_item("rusty_sword"));
    }

    #[test]
    fn test_skill_registry_rejects_duplicates() {
        let mut ch = character();
        assert!(ch.add_skill(Skill::new(skill_profiles::forward_slash())));
        assert!(!ch.add_skill(Skill::new(skill_profiles::forward_slash())));
        assert!(ch.remove_skill("forward_slash"));
        assert!(!ch.remove_skill("forward_slash"));
    }

    #[test]
    fn test_attacking_disallowed_when_blocked() {
        let mut ch = character();
        assert!(!ch.is_attacking_disallowed());
        ch.is_blocking = true;
        assert!(ch.is_attacking_disallowed());

        let mut ch = character();
        ch.is_using_skill = true;
        assert!(ch.is_attacking_disallowed());
    }
}
