// Combat resolution: attack initiation, deferred multi-hit scheduling,
// damage application, death, and lock-on propagation.

use log::warn;
use rand::Rng;
use rapier2d::prelude::vector;

use crate::engine::physics::collision::Category;
use crate::engine::scheduler::CallbackId;
use crate::game::characters::character::TAKE_DAMAGE_DURATION;
use crate::game::characters::profile::CharacterSfx;
use crate::game::characters::{CharacterId, CharacterState};
use crate::game::skills::SkillType;
use crate::game::world::{Deferred, GameWorld};

/// Default interval between the hits of a multi-hit attack.
pub const DEFAULT_HIT_INTERVAL: f32 = 0.1;

impl GameWorld {
    /// Damage one swing of this character deals right now: base melee
    /// damage, plus the equipped weapon's bonus, plus any active melee
    /// skill's contribution, plus a symmetric random jitter.
    pub fn damage_output(&mut self, attacker: CharacterId) -> i32 {
        let Some(ch) = self.character(attacker) else {
            return 0;
        };

        let weapon_bonus = ch
            .equipped_weapon()
            .and_then(|w| w.equipment_stats())
            .map_or(0, |stats| stats.bonus_physical_damage);
        let skill_bonus: i32 = ch
            .active_skills
            .iter()
            .filter(|a| a.profile.skill_type == SkillType::Melee)
            .map(|a| a.profile.physical_damage)
            .sum();
        let base = ch.profile.base_melee_damage + weapon_bonus + skill_bonus;

        let jitter = self.tuning.damage_jitter;
        if jitter > 0 {
            base + self.rng.gen_range(-jitter..=jitter)
        } else {
            base
        }
    }

    /// Swing at every target currently in melee range. Returns true when at
    /// least one damage sequence was scheduled; a swing with nobody in range
    /// still plays out but reports false.
    pub fn attack(
        &mut self,
        attacker: CharacterId,
        requested: CharacterState,
        hit_count: i32,
        hit_interval: f32,
    ) -> bool {
        if !requested.is_attack() {
            warn!("Failed to attack, [{requested:?}] is not an attack state.");
            return false;
        }

        let targets = {
            let Some(ch) = self.characters.get_mut(&attacker) else {
                return false;
            };
            if ch.is_attacking_disallowed() {
                return false;
            }

            ch.is_attacking = true;
            if requested != CharacterState::Attacking {
                ch.overriding_attack_state = Some(requested);
            }
            let resolved = ch.determine_attack_state();
            let duration = ch.animations.duration(resolved.animation_name());
            let cb = self
                .scheduler
                .schedule(duration, Deferred::ClearAttacking(attacker));
            if let Ok(mut set) = ch.attack_callbacks.lock() {
                set.insert(cb);
            }

            let swing_sfx = ch
                .equipped_weapon()
                .and_then(|w| w.equipment_stats())
                .and_then(|stats| stats.sfx_swing.clone())
                .or_else(|| {
                    ch.profile
                        .sfx_path(CharacterSfx::AttackUnarmed)
                        .map(str::to_string)
                });
            if let Some(path) = swing_sfx {
                self.services.audio.play_sfx(&path, false);
            }

            ch.in_range_targets.iter().copied().collect::<Vec<_>>()
        };

        let mut any_scheduled = false;
        for target in targets {
            let valid = self
                .character(target)
                .is_some_and(|t| !t.is_invincible && !t.is_set_to_kill);
            if !valid {
                continue;
            }
            let damage = self.damage_output(attacker);
            any_scheduled |= self.inflict_damage(attacker, target, damage, hit_count, hit_interval);
        }
        any_scheduled
    }

    /// Swing with the profile's default forward-attack parameters.
    pub fn attack_default(&mut self, attacker: CharacterId) -> bool {
        let (state, hits) = match self.character(attacker) {
            Some(ch) => (ch.determine_attack_state(), ch.profile.forward_attack_hits),
            None => return false,
        };
        self.attack(attacker, state, hits, DEFAULT_HIT_INTERVAL)
    }

    /// Schedule `hit_count` deferred damage applications against one target,
    /// the i-th firing `attack_delay + hit_interval * i` seconds from now.
    pub fn inflict_damage(
        &mut self,
        attacker: CharacterId,
        target: CharacterId,
        damage: i32,
        hit_count: i32,
        hit_interval: f32,
    ) -> bool {
        if hit_count <= 0 {
            warn!("Failed to inflict damage, hit count: [{hit_count}].");
            return false;
        }
        let Some(ch) = self.characters.get(&attacker) else {
            return false;
        };

        let delay = ch.profile.attack_delay;
        for i in 0..hit_count {
            let cb = self.scheduler.schedule(
                delay + hit_interval * i as f32,
                Deferred::ApplyHit {
                    attacker,
                    target,
                    damage,
                },
            );
            if let Ok(mut set) = ch.inflict_damage_callbacks.lock() {
                set.insert(cb);
            }
        }
        true
    }

    /// One deferred hit coming due. Skipped when the attacker is reeling
    /// from damage or the target slipped out of melee range.
    pub(crate) fn apply_hit(
        &mut self,
        cb: CallbackId,
        attacker: CharacterId,
        target: CharacterId,
        damage: i32,
    ) {
        let skip = {
            let Some(att) = self.character(attacker) else {
                return;
            };
            if let Ok(mut set) = att.inflict_damage_callbacks.lock() {
                set.remove(&cb);
            }
            att.is_taking_damage || !att.in_range_targets.contains(&target)
        };
        if skip {
            return;
        }

        let (force, facing_right, hit_sfx) = match self.character(attacker) {
            Some(att) => (
                att.profile.attack_force,
                att.is_facing_right,
                att.equipped_weapon()
                    .and_then(|w| w.equipment_stats())
                    .and_then(|stats| stats.sfx_hit.clone()),
            ),
            None => return,
        };

        if self.receive_damage(Some(attacker), target, damage) {
            let sign = if facing_right { 1.0 } else { -1.0 };
            self.knock_back(target, sign * force, force);
            if let Some(path) = hit_sfx {
                self.services.audio.play_sfx(&path, false);
            }
        }
    }

    /// Apply incoming damage to a character. Returns false when the hit is
    /// rejected outright (dying/invincible target, dead source); returns
    /// true for a registered hit, including one absorbed by a block.
    pub fn receive_damage(
        &mut self,
        source: Option<CharacterId>,
        target: CharacterId,
        damage: i32,
    ) -> bool {
        self.receive_damage_with_duration(source, target, damage, TAKE_DAMAGE_DURATION)
    }

    /// Like [`GameWorld::receive_damage`] with an explicit stun window: the
    /// target stays in the take-damage state for `stun_duration` seconds.
    pub fn receive_damage_with_duration(
        &mut self,
        source: Option<CharacterId>,
        target: CharacterId,
        damage: i32,
        stun_duration: f32,
    ) -> bool {
        self.receive_damage_impl(source, target, damage, stun_duration, false)
    }

    /// Untyped environmental damage (traps). Sets a distinct flag with its
    /// own landing-recovery rules.
    pub fn receive_trap_damage(&mut self, target: CharacterId, damage: i32) -> bool {
        self.receive_damage_impl(None, target, damage, TAKE_DAMAGE_DURATION, true)
    }

    fn receive_damage_impl(
        &mut self,
        source: Option<CharacterId>,
        target: CharacterId,
        damage: i32,
        stun_duration: f32,
        from_trap: bool,
    ) -> bool {
        if let Some(src) = source {
            match self.character(src) {
                Some(s) if !s.is_set_to_kill && !s.is_killed => {}
                _ => return false,
            }
        }

        let lethal;
        let hurt_sfx;
        {
            let Some(ch) = self.characters.get_mut(&target) else {
                warn!("Failed to receive damage, unknown target [{target}].");
                return false;
            };
            if ch.is_set_to_kill || ch.is_invincible {
                return false;
            }

            // A block absorbs the hit entirely for the block-hit window.
            if ch.is_blocking && !from_trap {
                ch.is_hit_while_blocking = true;
                let duration = ch
                    .animations
                    .duration(CharacterState::BlockingHit.animation_name());
                self.scheduler
                    .schedule(duration, Deferred::ClearBlockingHit(target));
                self.services.fx.create_hit_fx(target);
                self.services.floating_damage.show(target, 0);
                return true;
            }

            ch.profile.health = (ch.profile.health - damage).max(0);
            lethal = ch.profile.health == 0;

            if from_trap {
                ch.is_taking_damage_from_traps = true;
                self.scheduler
                    .schedule(stun_duration, Deferred::ClearTrapDamageFlag(target));
            } else {
                ch.is_taking_damage = true;
                self.scheduler
                    .schedule(stun_duration, Deferred::ClearTakingDamage(target));
                if let Some(src) = source {
                    ch.lock_on(src);
                }
            }

            if lethal {
                ch.is_set_to_kill = true;
                // Dying bodies stop registering weapon contact.
                ch.body.set_body_category(&mut self.physics, Category::Destroyed);
            }
            hurt_sfx = if lethal {
                None
            } else {
                ch.profile.sfx_path(CharacterSfx::Hurt).map(str::to_string)
            };
        }

        // A registered hit interrupts whatever attack the target had in
        // flight, cancelling its not-yet-fired damage callbacks.
        self.cancel_attack(target);

        if let Some(src) = source {
            let target_allies: Vec<CharacterId> = self
                .character(target)
                .map(|c| c.allies.iter().copied().collect())
                .unwrap_or_default();
            for ally in target_allies {
                if let Some(c) = self.character_mut(ally) {
                    c.lock_on(src);
                }
            }

            let source_allies: Vec<CharacterId> = self
                .character(src)
                .map(|c| c.allies.iter().copied().collect())
                .unwrap_or_default();
            for ally in &source_allies {
                if let Some(c) = self.character_mut(*ally) {
                    c.lock_on(target);
                }
            }

            // Nobody keeps hunting a dying character.
            if lethal {
                for cid in source_allies.into_iter().chain([src]) {
                    if let Some(c) = self.character_mut(cid) {
                        if c.locked_on_target == Some(target) {
                            c.locked_on_target = None;
                        }
                        c.in_range_targets.remove(&target);
                    }
                }
            }
        }

        if let Some(path) = hurt_sfx {
            self.services.audio.play_sfx(&path, false);
        }
        self.services.fx.create_hit_fx(target);
        self.services.floating_damage.show(target, damage);
        self.services.hud.update_status_bars();
        true
    }

    /// Cancel an in-flight attack: the duration callback and every pending
    /// damage callback, atomically with respect to their tracking sets.
    pub fn cancel_attack(&mut self, id: CharacterId) {
        let (attack_ids, damage_ids) = {
            let Some(ch) = self.character_mut(id) else {
                return;
            };
            ch.is_attacking = false;
            ch.overriding_attack_state = None;

            let attack_ids: Vec<CallbackId> = ch
                .attack_callbacks
                .lock()
                .map(|mut set| set.drain().collect())
                .unwrap_or_default();
            let damage_ids: Vec<CallbackId> = ch
                .inflict_damage_callbacks
                .lock()
                .map(|mut set| set.drain().collect())
                .unwrap_or_default();
            (attack_ids, damage_ids)
        };

        for cb in attack_ids.into_iter().chain(damage_ids) {
            self.scheduler.cancel(cb);
        }
    }

    /// Shove a character away from a hit.
    pub fn knock_back(&mut self, target: CharacterId, force_x: f32, force_y: f32) {
        let Some(ch) = self.characters.get(&target) else {
            return;
        };
        if let Some(body) = ch
            .body
            .handle()
            .and_then(|h| self.physics.get_rigid_body_mut(h))
        {
            let impulse = vector![force_x * body.mass(), force_y * body.mass()];
            body.apply_impulse(impulse, true);
        }
    }
}
