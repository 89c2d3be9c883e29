// Simulation root: owns the physics world, the scheduler, and every actor.
//
// All deferred effects are value payloads (`Deferred`) applied here when
// they come due, so cancellation by id can never leave a dangling capture.

use std::collections::HashMap;

use log::warn;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rapier2d::prelude::*;

use crate::engine::physics::body::presets;
use crate::engine::physics::collision::{mask_of, Category, ContactEvent};
use crate::engine::physics::PhysicsWorld;
use crate::engine::scheduler::{CallbackId, Scheduler};
use crate::engine::services::Services;
use crate::game::characters::profile::{CharacterProfile, CharacterSfx};
use crate::game::characters::{Character, CharacterId, CharacterState};
use crate::game::interactable::{Interactable, InteractableId};
use crate::game::items::{Item, ItemId, ItemProfile};
use crate::game::skills::{ActiveSkill, Skill, SkillEffect, SkillProfile};

/// Seconds jumping stays locked out after a jump starts.
const JUMP_LOCKOUT_DURATION: f32 = 0.2;
/// Seconds the feet fixture stays non-solid while dropping through a platform.
const JUMP_DOWN_DURATION: f32 = 0.25;
/// Seconds of invincibility granted by a dodge.
const DODGE_INVINCIBLE_DURATION: f32 = 0.2;
/// Linear damping applied during a dodge so the burst dies off quickly.
const DODGE_DAMPING: f32 = 4.0;
const DODGE_BACKWARD_IMPULSE: (f32, f32) = (1.8, 1.0);
const DODGE_FORWARD_IMPULSE: (f32, f32) = (2.4, 1.0);
/// Downward velocity at landing beyond which the character must get up.
const FALL_RECOVERY_VELOCITY: f32 = -8.0;
/// Horizontal rush velocity of the forward-slash skill.
const FORWARD_SLASH_VELOCITY: f32 = 6.0;

/// Combat numbers that are tunable rather than contractual.
#[derive(Debug, Clone, Copy)]
pub struct CombatTuning {
    /// Symmetric random jitter added to every damage output.
    pub damage_jitter: i32,
    /// Damage dealt when an enemy body bumps into the player.
    pub body_contact_damage: i32,
}

impl Default for CombatTuning {
    fn default() -> Self {
        Self {
            damage_jitter: 5,
            body_contact_damage: 10,
        }
    }
}

/// Deferred effect applied when its scheduler entry comes due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deferred {
    ClearAttacking(CharacterId),
    ApplyHit {
        attacker: CharacterId,
        target: CharacterId,
        damage: i32,
    },
    ClearTakingDamage(CharacterId),
    ClearTrapDamageFlag(CharacterId),
    ClearBlockingHit(CharacterId),
    ClearSkillUse(CharacterId),
    EndSkillEffect {
        character: CharacterId,
        instance_id: u64,
    },
    RestoreGravity(CharacterId),
    ClearStopRunning(CharacterId),
    ClearGettingUp(CharacterId),
    ClearInvincible(CharacterId),
    EndDodge(CharacterId),
    ClearJumpLock(CharacterId),
    ClearIntro(CharacterId),
    RestoreFeetSolid(CharacterId),
    FinishKill(CharacterId),
}

struct PlacedInteractable {
    interactable: Interactable,
    body: RigidBodyHandle,
}

/// The whole simulation: physics, timers, characters, and map objects.
pub struct GameWorld {
    pub physics: PhysicsWorld,
    pub services: Services,
    pub tuning: CombatTuning,

    pub(crate) scheduler: Scheduler<Deferred>,
    pub(crate) rng: StdRng,

    pub(crate) characters: HashMap<CharacterId, Character>,
    next_character_id: CharacterId,

    interactables: HashMap<InteractableId, PlacedInteractable>,
    next_interactable_id: InteractableId,

    item_library: HashMap<ItemId, ItemProfile>,
    skill_library: HashMap<String, SkillProfile>,
    next_skill_instance_id: u64,
}

impl Default for GameWorld {
    fn default() -> Self {
        Self::new(Services::default())
    }
}

impl GameWorld {
    pub fn new(services: Services) -> Self {
        Self {
            physics: PhysicsWorld::new(),
            services,
            tuning: CombatTuning::default(),
            scheduler: Scheduler::new(),
            rng: StdRng::from_entropy(),
            characters: HashMap::new(),
            next_character_id: 1,
            interactables: HashMap::new(),
            next_interactable_id: 1,
            item_library: HashMap::new(),
            skill_library: HashMap::new(),
            next_skill_instance_id: 1,
        }
    }

    // ------------------------------------------------------------------
    // Content libraries

    pub fn register_item_profile(&mut self, profile: ItemProfile) {
        self.item_library.insert(profile.id.clone(), profile);
    }

    pub fn register_skill_profile(&mut self, profile: SkillProfile) {
        self.skill_library.insert(profile.id.clone(), profile);
    }

    pub fn item_profile(&self, id: &str) -> Option<&ItemProfile> {
        self.item_library.get(id)
    }

    // ------------------------------------------------------------------
    // Actors

    pub fn character(&self, id: CharacterId) -> Option<&Character> {
        self.characters.get(&id)
    }

    pub fn character_mut(&mut self, id: CharacterId) -> Option<&mut Character> {
        self.characters.get_mut(&id)
    }

    /// Create a character from its profile and place it on the map with a
    /// defined body and fixtures.
    pub fn spawn_character(
        &mut self,
        profile: CharacterProfile,
        x: f32,
        y: f32,
        category: Category,
    ) -> CharacterId {
        let id = self.next_character_id;
        self.next_character_id += 1;

        let mut ch = Character::new(id, profile);
        let (body_mask, feet_mask, weapon_mask) = character_masks(category);
        let geometry = ch.geometry();
        ch.body.define(
            &mut self.physics,
            x,
            y,
            &geometry,
            category,
            body_mask,
            feet_mask,
            weapon_mask,
            id as u64,
        );
        ch.is_shown_on_map = true;

        for (item_id, amount) in ch.profile.default_inventory.clone() {
            match self.item_library.get(&item_id).cloned() {
                Some(p) => {
                    ch.inventory.add_item(Item::new(p), amount);
                }
                None => warn!("Unknown default item [{item_id}] for [{}].", ch.profile.name),
            }
        }
        for skill_id in ch.profile.default_skills.clone() {
            match self.skill_library.get(&skill_id).cloned() {
                Some(p) => {
                    ch.add_skill(Skill::new(p));
                }
                None => warn!("Unknown default skill [{skill_id}] for [{}].", ch.profile.name),
            }
        }

        self.services
            .animation
            .play(id, CharacterState::Idle.animation_name(), true);
        self.characters.insert(id, ch);
        id
    }

    /// Remove a character from the map, destroying its body and erasing all
    /// references other actors hold to it.
    pub fn remove_character(&mut self, id: CharacterId) {
        self.cancel_attack(id);
        if let Some(mut ch) = self.characters.remove(&id) {
            ch.body.destroy(&mut self.physics);
        }
        for other in self.characters.values_mut() {
            other.in_range_targets.remove(&id);
            other.allies.remove(&id);
            if other.locked_on_target == Some(id) {
                other.locked_on_target = None;
            }
        }
    }

    // ------------------------------------------------------------------
    // Map geometry and interactables

    /// Add a static ground strip.
    pub fn add_ground(&mut self, x: f32, y: f32, width: f32, height: f32) {
        let body = self.physics.add_rigid_body(presets::ground_body(x, y));
        self.physics
            .add_collider(presets::ground_collider(width, height), body);
    }

    /// Place an interactable sensor zone on the map.
    pub fn add_interactable(
        &mut self,
        interactable: Interactable,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) -> InteractableId {
        let id = self.next_interactable_id;
        self.next_interactable_id += 1;

        let body = self.physics.add_rigid_body(presets::ground_body(x, y));
        let mut collider = presets::trap_sensor_collider(width, height);
        collider.user_data = id as u128;
        self.physics.add_collider(collider, body);

        self.interactables
            .insert(id, PlacedInteractable { interactable, body });
        id
    }

    pub fn remove_interactable(&mut self, id: InteractableId) {
        if let Some(placed) = self.interactables.remove(&id) {
            self.physics.remove_rigid_body(placed.body);
        }
        for ch in self.characters.values_mut() {
            ch.in_range_interactables.remove(&id);
        }
    }

    pub fn interactable(&self, id: InteractableId) -> Option<&Interactable> {
        self.interactables.get(&id).map(|p| &p.interactable)
    }

    /// Collect every dropped item the character currently overlaps into its
    /// inventory. Returns the number of stacks picked up.
    pub fn pick_up_items(&mut self, id: CharacterId) -> usize {
        let in_range: Vec<InteractableId> = match self.characters.get(&id) {
            Some(ch) => ch.in_range_interactables.iter().copied().collect(),
            None => return 0,
        };

        let mut picked = 0;
        for iid in in_range {
            let Some(Interactable::DroppedItem { item_id, amount }) =
                self.interactables.get(&iid).map(|p| p.interactable.clone())
            else {
                continue;
            };
            let Some(profile) = self.item_library.get(&item_id).cloned() else {
                warn!("Dropped item [{item_id}] has no registered profile.");
                continue;
            };
            if let Some(ch) = self.characters.get_mut(&id) {
                ch.inventory.add_item(Item::new(profile), amount);
            }
            self.remove_interactable(iid);
            picked += 1;
        }
        picked
    }

    // ------------------------------------------------------------------
    // Tick driver

    /// Advance the whole simulation by `delta` seconds: physics step,
    /// contact routing, per-character state resolution, then due timers.
    pub fn update(&mut self, delta: f32) {
        self.physics.set_timestep(delta);
        self.physics.step();
        self.route_contact_events();

        let ids: Vec<CharacterId> = self.characters.keys().copied().collect();
        for id in ids {
            self.update_character(id, delta);
        }

        let due = self.scheduler.advance(delta);
        for (cb, deferred) in due {
            self.apply_deferred(cb, deferred);
        }
    }

    /// Fire every pending timer by fast-forwarding virtual time. Called by
    /// the map-transition coordinator before tearing a map down, instead of
    /// spin-waiting on a helper thread.
    pub fn drain_deferred(&mut self) {
        while let Some(remaining) = self.scheduler.time_until_idle() {
            let due = self.scheduler.advance(remaining + 1e-4);
            for (cb, deferred) in due {
                self.apply_deferred(cb, deferred);
            }
        }
    }

    pub fn pending_deferred(&self) -> usize {
        self.scheduler.pending()
    }

    fn update_character(&mut self, id: CharacterId, delta: f32) {
        // Trap damage first: it needs `&mut self`, so it cannot run while a
        // character borrow is held below.
        let trap_hits: Vec<i32> = match self.characters.get(&id) {
            Some(ch) if ch.is_shown_on_map && !ch.is_killed => ch
                .in_range_interactables
                .iter()
                .filter_map(|iid| self.interactables.get(iid))
                .filter_map(|p| p.interactable.passive_damage())
                .collect(),
            _ => return,
        };
        for damage in trap_hits {
            self.receive_trap_damage(id, damage);
        }

        let Some(ch) = self.characters.get_mut(&id) else {
            return;
        };
        let Some(handle) = ch.body.handle() else {
            return;
        };
        let velocity = match self.physics.get_rigid_body(handle) {
            Some(body) => (body.linvel().x, body.linvel().y),
            None => return,
        };

        // Resting characters stop costing solver time.
        if ch.is_on_ground && velocity.0.abs() < 0.001 && velocity.1.abs() < 0.001 {
            if let Some(body) = self.physics.get_rigid_body_mut(handle) {
                body.sleep();
            }
        }

        // A facing flip moves the weapon sensor to the other side.
        if ch.is_facing_right != ch.last_facing_right {
            let geometry = ch.geometry();
            ch.body
                .redefine_weapon_fixture(&mut self.physics, &geometry, None);
            ch.last_facing_right = ch.is_facing_right;
        }

        if ch.tick_regen(delta) {
            self.services.hud.update_status_bars();
        }

        // The state machine is frozen for the whole cast window.
        if ch.is_using_skill {
            ch.previous_velocity = velocity;
            return;
        }

        if ch.is_on_ground && !ch.is_stop_running && ch.should_stop_running(velocity) {
            ch.is_stop_running = true;
            let duration = ch
                .animations
                .duration(CharacterState::RunningStop.animation_name());
            self.scheduler.schedule(duration, Deferred::ClearStopRunning(id));
        }

        ch.previous_state = ch.current_state;
        ch.current_state = ch.determine_state(velocity);
        ch.maybe_override_with_attacking_midair();

        if ch.current_state != ch.previous_state || ch.force_state_refresh {
            ch.force_state_refresh = false;
            let state = ch.current_state;
            self.services
                .animation
                .play(id, state.animation_name(), state.loops());

            if state == CharacterState::Killed {
                let duration = ch.animations.duration(state.animation_name());
                self.scheduler.schedule(duration, Deferred::FinishKill(id));
                if let Some(path) = ch.profile.sfx_path(CharacterSfx::Killed) {
                    let path = path.to_string();
                    self.services.audio.play_sfx(&path, false);
                }
            }
        }

        ch.previous_velocity = velocity;
    }

    // ------------------------------------------------------------------
    // Contact routing

    fn route_contact_events(&mut self) {
        for event in self.physics.get_contact_events() {
            match event {
                ContactEvent::Started { collider1, collider2 } => {
                    self.on_contact_ordered(collider1, collider2, true);
                    self.on_contact_ordered(collider2, collider1, true);
                }
                ContactEvent::Stopped { collider1, collider2 } => {
                    self.on_contact_ordered(collider1, collider2, false);
                    self.on_contact_ordered(collider2, collider1, false);
                }
            }
        }
    }

    fn collider_info(&self, handle: ColliderHandle) -> Option<(Group, u128)> {
        self.physics
            .get_collider(handle)
            .map(|c| (c.collision_groups().memberships, c.user_data))
    }

    fn on_contact_ordered(&mut self, a: ColliderHandle, b: ColliderHandle, started: bool) {
        let Some((cat_a, data_a)) = self.collider_info(a) else {
            return;
        };
        let Some((cat_b, data_b)) = self.collider_info(b) else {
            return;
        };

        // Feet touching ground or platform.
        if cat_a == Category::Feet.group()
            && (cat_b == Category::Ground.group() || cat_b == Category::Platform.group())
        {
            let id = data_a as CharacterId;
            if started {
                self.on_landed(id, cat_b == Category::Platform.group());
            } else if let Some(ch) = self.characters.get_mut(&id) {
                ch.is_on_ground = false;
                ch.is_on_platform = false;
            }
            return;
        }

        // Weapon sensor overlapping another character's body.
        if cat_a == Category::MeleeWeapon.group() && is_character_category(cat_b) {
            let attacker = data_a as CharacterId;
            let target = data_b as CharacterId;
            if attacker == target {
                return;
            }
            if let Some(ch) = self.characters.get_mut(&attacker) {
                if started {
                    ch.in_range_targets.insert(target);
                } else {
                    ch.in_range_targets.remove(&target);
                }
            }
            return;
        }

        // Character body overlapping an interactable zone.
        if is_character_category(cat_a) && cat_b == Category::Interactable.group() {
            let id = data_a as CharacterId;
            let interactable = data_b as InteractableId;
            if let Some(ch) = self.characters.get_mut(&id) {
                if started {
                    ch.in_range_interactables.insert(interactable);
                } else {
                    ch.in_range_interactables.remove(&interactable);
                }
            }
            return;
        }

        // An enemy body bumping into the player hurts on contact.
        if started && cat_a == Category::Enemy.group() && cat_b == Category::Player.group() {
            self.on_body_contact(data_a as CharacterId, data_b as CharacterId);
        }
    }

    fn on_landed(&mut self, id: CharacterId, on_platform: bool) {
        let Some(ch) = self.characters.get_mut(&id) else {
            return;
        };
        ch.is_on_ground = true;
        ch.is_on_platform = on_platform;
        ch.is_jumping = false;
        ch.is_double_jumping = false;

        let hard_landing = ch.previous_velocity.1 < FALL_RECOVERY_VELOCITY;
        if (hard_landing || ch.is_taking_damage) && ch.has_getup_animation() {
            ch.is_getting_up_from_falling = true;
            let duration = ch
                .animations
                .duration(CharacterState::FallingGetup.animation_name());
            self.scheduler.schedule(duration, Deferred::ClearGettingUp(id));
        }
    }

    fn on_body_contact(&mut self, enemy: CharacterId, player: CharacterId) {
        let force = match self.characters.get(&enemy) {
            Some(e) if !e.is_set_to_kill => e.profile.attack_force,
            _ => return,
        };
        let knock_right = match (self.characters.get(&enemy), self.characters.get(&player)) {
            (Some(e), Some(_)) => e.is_facing_right,
            _ => return,
        };

        let damage = self.tuning.body_contact_damage;
        if self.receive_damage(Some(enemy), player, damage) {
            let sign = if knock_right { 1.0 } else { -1.0 };
            self.knock_back(player, sign * force, force);
        }
    }

    // ------------------------------------------------------------------
    // Movement commands

    pub fn move_left(&mut self, id: CharacterId) -> bool {
        self.move_toward(id, false)
    }

    pub fn move_right(&mut self, id: CharacterId) -> bool {
        self.move_toward(id, true)
    }

    fn move_toward(&mut self, id: CharacterId, facing_right: bool) -> bool {
        let Some(ch) = self.characters.get_mut(&id) else {
            return false;
        };
        if ch.is_set_to_kill || ch.is_movement_disallowed() {
            return false;
        }
        ch.is_facing_right = facing_right;

        let Some(handle) = ch.body.handle() else {
            return false;
        };
        let move_speed = ch.profile.move_speed;
        if let Some(body) = self.physics.get_rigid_body_mut(handle) {
            // Cap the drive so repeated commands cannot wind up the body.
            if body.linvel().x.abs() <= move_speed * 2.0 {
                let sign = if facing_right { 1.0 } else { -1.0 };
                let impulse = vector![sign * move_speed * body.mass(), 0.0];
                body.apply_impulse(impulse, true);
            }
        }
        true
    }

    pub fn jump(&mut self, id: CharacterId) -> bool {
        let Some(ch) = self.characters.get_mut(&id) else {
            return false;
        };
        if ch.is_jumping_disallowed || ch.is_movement_disallowed() {
            return false;
        }
        if ch.is_double_jumping || (ch.is_jumping && !ch.profile.can_double_jump) {
            return false;
        }

        if ch.is_jumping {
            ch.is_double_jumping = true;
        } else {
            ch.is_jumping = true;
        }
        ch.is_jumping_disallowed = true;
        self.scheduler
            .schedule(JUMP_LOCKOUT_DURATION, Deferred::ClearJumpLock(id));

        if let Some(body) = ch.body.handle().and_then(|h| self.physics.get_rigid_body_mut(h)) {
            let impulse = vector![0.0, ch.profile.jump_height * body.mass()];
            body.apply_impulse(impulse, true);
        }
        if let Some(path) = ch.profile.sfx_path(CharacterSfx::Jump) {
            let path = path.to_string();
            self.services.audio.play_sfx(&path, false);
        }
        true
    }

    /// Drop through the platform underfoot by making the feet non-solid for
    /// a short window.
    pub fn jump_down(&mut self, id: CharacterId) -> bool {
        let Some(ch) = self.characters.get_mut(&id) else {
            return false;
        };
        if !ch.is_on_platform || ch.is_jumping_down_disallowed() {
            return false;
        }
        ch.body.set_feet_sensor(&mut self.physics, true);
        self.scheduler
            .schedule(JUMP_DOWN_DURATION, Deferred::RestoreFeetSolid(id));
        true
    }

    pub fn crouch(&mut self, id: CharacterId) -> bool {
        let Some(ch) = self.characters.get_mut(&id) else {
            return false;
        };
        if ch.is_crouching || ch.is_jumping || ch.is_taking_damage {
            return false;
        }
        ch.is_crouching = true;
        let geometry = ch.geometry();
        ch.body
            .redefine_body_fixture(&mut self.physics, &geometry, None);
        ch.body
            .redefine_weapon_fixture(&mut self.physics, &geometry, None);
        true
    }

    pub fn get_up(&mut self, id: CharacterId) -> bool {
        let Some(ch) = self.characters.get_mut(&id) else {
            return false;
        };
        if !ch.is_crouching {
            return false;
        }
        ch.is_crouching = false;
        let geometry = ch.geometry();
        ch.body
            .redefine_body_fixture(&mut self.physics, &geometry, None);
        ch.body
            .redefine_weapon_fixture(&mut self.physics, &geometry, None);
        true
    }

    pub fn dodge_backward(&mut self, id: CharacterId) -> bool {
        self.dodge(id, false)
    }

    pub fn dodge_forward(&mut self, id: CharacterId) -> bool {
        self.dodge(id, true)
    }

    fn dodge(&mut self, id: CharacterId, forward: bool) -> bool {
        let Some(ch) = self.characters.get_mut(&id) else {
            return false;
        };
        if ch.is_dodging() || !ch.is_on_ground || ch.is_using_skill || ch.is_set_to_kill {
            return false;
        }
        if ch.is_movement_disallowed() {
            return false;
        }

        if forward {
            ch.is_dodging_forward = true;
        } else {
            ch.is_dodging_backward = true;
        }
        ch.is_invincible = true;

        let (magnitude, state) = if forward {
            (DODGE_FORWARD_IMPULSE, CharacterState::DodgingForward)
        } else {
            (DODGE_BACKWARD_IMPULSE, CharacterState::DodgingBackward)
        };
        // Backward dodge travels against facing; forward travels with it.
        let sign = match (forward, ch.is_facing_right) {
            (true, true) | (false, false) => 1.0,
            _ => -1.0,
        };

        if let Some(body) = ch.body.handle().and_then(|h| self.physics.get_rigid_body_mut(h)) {
            body.set_linear_damping(DODGE_DAMPING);
            let impulse = vector![sign * magnitude.0 * body.mass(), magnitude.1 * body.mass()];
            body.apply_impulse(impulse, true);
        }

        let duration = ch.animations.duration(state.animation_name());
        self.scheduler.schedule(duration, Deferred::EndDodge(id));
        self.scheduler
            .schedule(DODGE_INVINCIBLE_DURATION, Deferred::ClearInvincible(id));
        true
    }

    /// Zero the body's velocity and let it sleep (stand on slopes).
    pub fn stop_motion(&mut self, id: CharacterId) {
        let Some(ch) = self.characters.get(&id) else {
            return;
        };
        if let Some(body) = ch.body.handle().and_then(|h| self.physics.get_rigid_body_mut(h)) {
            body.set_linvel(vector![0.0, 0.0], true);
            body.sleep();
        }
    }

    pub fn teleport(&mut self, id: CharacterId, x: f32, y: f32) {
        let Some(ch) = self.characters.get(&id) else {
            return;
        };
        if let Some(body) = ch.body.handle().and_then(|h| self.physics.get_rigid_body_mut(h)) {
            body.set_translation(vector![x, y], true);
        }
    }

    /// Play the character's entrance animation, gating other actions until
    /// it completes.
    pub fn run_intro(&mut self, id: CharacterId) -> bool {
        let Some(ch) = self.characters.get_mut(&id) else {
            return false;
        };
        if ch.is_running_intro {
            return false;
        }
        ch.is_running_intro = true;
        let duration = ch.animations.duration(CharacterState::Intro.animation_name());
        self.scheduler.schedule(duration, Deferred::ClearIntro(id));
        if let Some(path) = ch.profile.sfx_path(CharacterSfx::Intro) {
            let path = path.to_string();
            self.services.audio.play_sfx(&path, false);
        }
        true
    }

    // ------------------------------------------------------------------
    // Skills

    /// Activate (or toggle off) a skill the character has learned.
    pub fn activate_skill(&mut self, user: CharacterId, skill_id: &str) -> bool {
        let profile = {
            let Some(ch) = self.characters.get(&user) else {
                return false;
            };
            let Some(skill) = ch.get_skill(skill_id) else {
                warn!("Failed to activate [{skill_id}], not learned by [{}].", ch.profile.name);
                return false;
            };

            // Toggling an active skill off is still an activation attempt
            // and obeys the same gating.
            if ch.is_skill_activation_disallowed() {
                return false;
            }

            let toggled_on = skill.profile.is_toggleable
                && ch.active_skill_instance(skill_id).is_some();
            if toggled_on {
                let instance_id = ch
                    .active_skill_instance(skill_id)
                    .map(|a| a.instance_id)
                    .unwrap_or(0);
                self.deactivate_skill(user, instance_id);
                return true;
            }

            if !skill.can_activate(&ch.profile) {
                return false;
            }
            skill.profile.clone()
        };

        let instance_id = self.next_skill_instance_id;
        self.next_skill_instance_id += 1;

        {
            let Some(ch) = self.characters.get_mut(&user) else {
                return false;
            };
            ch.regen_health(profile.delta_health);
            ch.regen_magicka(profile.delta_magicka);
            ch.regen_stamina(profile.delta_stamina);

            ch.is_using_skill = true;
            ch.current_skill = Some(profile.id.clone());
            ch.active_skills.push(ActiveSkill {
                instance_id,
                profile: profile.clone(),
                forked: profile.should_fork_instance,
            });

            if let Some(animation) = &profile.cast_animation {
                self.services.animation.play(user, animation, false);
            }
            if let Some(sfx) = &profile.sfx_activate {
                self.services.audio.play_sfx(sfx, false);
            }
        }

        self.scheduler
            .schedule(profile.duration, Deferred::ClearSkillUse(user));
        self.apply_skill_effect(user, instance_id, &profile);
        self.services.hud.update_status_bars();
        true
    }

    fn apply_skill_effect(&mut self, user: CharacterId, instance_id: u64, profile: &SkillProfile) {
        match profile.effect {
            SkillEffect::ForwardSlash => {
                let Some(ch) = self.characters.get_mut(&user) else {
                    return;
                };
                ch.is_invincible = true;
                ch.body.set_body_sensor(&mut self.physics, true);
                let sign = if ch.is_facing_right { 1.0 } else { -1.0 };
                if let Some(body) =
                    ch.body.handle().and_then(|h| self.physics.get_rigid_body_mut(h))
                {
                    body.set_gravity_scale(0.0, true);
                    body.set_linvel(vector![sign * FORWARD_SLASH_VELOCITY, 0.0], true);
                }
                self.scheduler.schedule(
                    profile.duration / 4.0,
                    Deferred::RestoreGravity(user),
                );
                self.scheduler.schedule(
                    profile.duration,
                    Deferred::EndSkillEffect {
                        character: user,
                        instance_id,
                    },
                );
            }
            SkillEffect::Ward => {
                if let Some(ch) = self.characters.get_mut(&user) {
                    ch.is_invincible = true;
                }
                if !profile.is_toggleable {
                    self.scheduler.schedule(
                        profile.duration,
                        Deferred::EndSkillEffect {
                            character: user,
                            instance_id,
                        },
                    );
                }
            }
            SkillEffect::None => {
                self.scheduler.schedule(
                    profile.duration,
                    Deferred::EndSkillEffect {
                        character: user,
                        instance_id,
                    },
                );
            }
        }
    }

    fn deactivate_skill(&mut self, user: CharacterId, instance_id: u64) {
        self.end_skill_effect(user, instance_id);
        if let Some(ch) = self.characters.get_mut(&user) {
            ch.is_using_skill = false;
            ch.current_skill = None;
            ch.force_state_refresh = true;
        }
    }

    fn end_skill_effect(&mut self, user: CharacterId, instance_id: u64) {
        let Some(ch) = self.characters.get_mut(&user) else {
            return;
        };
        let Some(active) = ch
            .active_skills
            .iter()
            .find(|a| a.instance_id == instance_id)
            .cloned()
        else {
            return;
        };

        match active.profile.effect {
            SkillEffect::ForwardSlash => {
                ch.is_invincible = false;
                ch.body.set_body_sensor(&mut self.physics, false);
                if let Some(body) =
                    ch.body.handle().and_then(|h| self.physics.get_rigid_body_mut(h))
                {
                    body.set_gravity_scale(1.0, true);
                }
            }
            SkillEffect::Ward => {
                ch.is_invincible = false;
            }
            SkillEffect::None => {}
        }
        ch.remove_active_skill_instance(instance_id);
    }

    // ------------------------------------------------------------------
    // Deferred application

    pub(crate) fn apply_deferred(&mut self, cb: CallbackId, deferred: Deferred) {
        match deferred {
            Deferred::ClearAttacking(id) => {
                if let Some(ch) = self.characters.get_mut(&id) {
                    if let Ok(mut set) = ch.attack_callbacks.lock() {
                        set.remove(&cb);
                    }
                    ch.is_attacking = false;
                    ch.overriding_attack_state = None;
                }
            }
            Deferred::ApplyHit {
                attacker,
                target,
                damage,
            } => self.apply_hit(cb, attacker, target, damage),
            Deferred::ClearTakingDamage(id) => {
                if let Some(ch) = self.characters.get_mut(&id) {
                    ch.is_taking_damage = false;
                }
            }
            Deferred::ClearTrapDamageFlag(id) => {
                if let Some(ch) = self.characters.get_mut(&id) {
                    ch.is_taking_damage_from_traps = false;
                }
            }
            Deferred::ClearBlockingHit(id) => {
                if let Some(ch) = self.characters.get_mut(&id) {
                    ch.is_hit_while_blocking = false;
                }
            }
            Deferred::ClearSkillUse(id) => {
                if let Some(ch) = self.characters.get_mut(&id) {
                    ch.is_using_skill = false;
                    ch.current_skill = None;
                    // The frozen state machine must re-dispatch even when the
                    // resolved state did not change during the cast.
                    ch.force_state_refresh = true;
                }
            }
            Deferred::EndSkillEffect {
                character,
                instance_id,
            } => self.end_skill_effect(character, instance_id),
            Deferred::RestoreGravity(id) => {
                if let Some(ch) = self.characters.get(&id) {
                    if let Some(body) =
                        ch.body.handle().and_then(|h| self.physics.get_rigid_body_mut(h))
                    {
                        body.set_gravity_scale(1.0, true);
                    }
                }
            }
            Deferred::ClearStopRunning(id) => {
                if let Some(ch) = self.characters.get_mut(&id) {
                    ch.is_stop_running = false;
                }
            }
            Deferred::ClearGettingUp(id) => {
                if let Some(ch) = self.characters.get_mut(&id) {
                    ch.is_getting_up_from_falling = false;
                }
            }
            Deferred::ClearInvincible(id) => {
                if let Some(ch) = self.characters.get_mut(&id) {
                    ch.is_invincible = false;
                }
            }
            Deferred::EndDodge(id) => {
                if let Some(ch) = self.characters.get_mut(&id) {
                    ch.is_dodging_backward = false;
                    ch.is_dodging_forward = false;
                    if let Some(body) =
                        ch.body.handle().and_then(|h| self.physics.get_rigid_body_mut(h))
                    {
                        body.set_linear_damping(0.0);
                    }
                }
            }
            Deferred::ClearJumpLock(id) => {
                if let Some(ch) = self.characters.get_mut(&id) {
                    ch.is_jumping_disallowed = false;
                }
            }
            Deferred::ClearIntro(id) => {
                if let Some(ch) = self.characters.get_mut(&id) {
                    ch.is_running_intro = false;
                }
            }
            Deferred::RestoreFeetSolid(id) => {
                if let Some(ch) = self.characters.get(&id) {
                    ch.body.set_feet_sensor(&mut self.physics, false);
                }
            }
            Deferred::FinishKill(id) => {
                if let Some(ch) = self.characters.get_mut(&id) {
                    ch.is_killed = true;
                    ch.body.destroy(&mut self.physics);
                }
            }
        }
    }
}

fn is_character_category(group: Group) -> bool {
    group == Category::Player.group()
        || group == Category::Enemy.group()
        || group == Category::Npc.group()
}

/// Collision masks for a character's body, feet, and weapon fixtures,
/// depending on which side of the fight it is on.
fn character_masks(category: Category) -> (Group, Group, Group) {
    match category {
        Category::Player => (
            mask_of(&[
                Category::Enemy,
                Category::MeleeWeapon,
                Category::Item,
                Category::Portal,
                Category::Interactable,
            ]),
            mask_of(&[Category::Ground, Category::Platform, Category::Wall]),
            mask_of(&[Category::Enemy]),
        ),
        Category::Enemy => (
            mask_of(&[
                Category::Player,
                Category::MeleeWeapon,
                Category::Interactable,
            ]),
            mask_of(&[Category::Ground, Category::Platform, Category::Wall]),
            mask_of(&[Category::Player]),
        ),
        _ => (
            mask_of(&[Category::Interactable, Category::Portal]),
            mask_of(&[Category::Ground, Category::Platform, Category::Wall]),
            Group::NONE,
        ),
    }
}
