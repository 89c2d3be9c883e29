// Physics body adapter: one rigid body + three fixtures per character
//
// Fixture geometry is a function of profile dimensions, facing, and crouch
// state, so fixtures are destroyed and rebuilt whenever any of those change.
// Category/mask bits survive a rebuild unless the caller supplies new ones.

use rapier2d::prelude::{Group, InteractionGroups};

use crate::engine::physics::collision::{interaction_groups, Category};
use crate::engine::physics::{ColliderBuilder2D, ColliderHandle, PhysicsWorld, RigidBodyHandle};
use crate::engine::physics::body::presets;

/// The three collision-geometry attachments of a character body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureKind {
    /// Main hull; sensor used for body-vs-body contact.
    Body,
    /// Solid circle at the feet for ground/platform contact.
    Feet,
    /// Melee reach sensor in front of the character.
    Weapon,
}

pub const FIXTURE_COUNT: usize = 3;

impl FixtureKind {
    pub fn index(self) -> usize {
        match self {
            Self::Body => 0,
            Self::Feet => 1,
            Self::Weapon => 2,
        }
    }
}

/// Inputs that determine fixture geometry.
#[derive(Debug, Clone, Copy)]
pub struct BodyGeometry {
    pub body_width: f32,
    pub body_height: f32,
    pub attack_range: f32,
    pub facing_right: bool,
    pub crouching: bool,
}

/// A character's rigid body and fixture handles.
#[derive(Debug, Default)]
pub struct CharacterBody {
    body: Option<RigidBodyHandle>,
    fixtures: [Option<ColliderHandle>; FIXTURE_COUNT],
    actor_id: u64,
}

impl CharacterBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_defined(&self) -> bool {
        self.body.is_some()
    }

    pub fn handle(&self) -> Option<RigidBodyHandle> {
        self.body
    }

    pub fn fixture(&self, kind: FixtureKind) -> Option<ColliderHandle> {
        self.fixtures[kind.index()]
    }

    /// Create the rigid body and all three fixtures at a spawn position.
    #[allow(clippy::too_many_arguments)]
    pub fn define(
        &mut self,
        physics: &mut PhysicsWorld,
        x: f32,
        y: f32,
        geometry: &BodyGeometry,
        body_category: Category,
        body_mask: Group,
        feet_mask: Group,
        weapon_mask: Group,
        actor_id: u64,
    ) {
        debug_assert!(self.body.is_none(), "body defined twice");

        let handle = physics.add_rigid_body(presets::character_body(x, y));
        physics.set_actor_mapping(handle, actor_id);
        self.body = Some(handle);
        self.actor_id = actor_id;

        self.redefine_body_fixture(
            physics,
            geometry,
            Some(interaction_groups(body_category, body_mask)),
        );
        self.redefine_feet_fixture(physics, geometry, Some(feet_mask));
        self.redefine_weapon_fixture(physics, geometry, Some(weapon_mask));
    }

    /// Rebuild the body hull fixture. When `groups` is `None` the replaced
    /// fixture's category and mask bits are reused.
    pub fn redefine_body_fixture(
        &mut self,
        physics: &mut PhysicsWorld,
        geometry: &BodyGeometry,
        groups: Option<InteractionGroups>,
    ) {
        let Some(body) = self.body else {
            return;
        };
        let groups = self
            .take_fixture(physics, FixtureKind::Body, groups)
            .unwrap_or_else(InteractionGroups::all);

        let hw = geometry.body_width / 2.0;
        let hh = geometry.body_height / 2.0;
        let top = if geometry.crouching { 0.0 } else { hh };

        let Some(builder) =
            ColliderBuilder2D::quad([[-hw, top], [hw, top], [-hw, -hh], [hw, -hh]])
        else {
            return;
        };
        let collider = builder
            .groups(groups)
            .sensor(true)
            .user_data(self.actor_id as u128)
            .build();
        self.fixtures[FixtureKind::Body.index()] = Some(physics.add_collider(collider, body));
    }

    /// Rebuild the feet fixture, preserving its mask when none is supplied.
    /// Destroys the feet slot, not the body slot.
    pub fn redefine_feet_fixture(
        &mut self,
        physics: &mut PhysicsWorld,
        geometry: &BodyGeometry,
        mask: Option<Group>,
    ) {
        let Some(body) = self.body else {
            return;
        };
        let mask = self
            .take_fixture(physics, FixtureKind::Feet, mask.map(|m| interaction_groups(Category::Feet, m)))
            .map(|g| g.filter)
            .unwrap_or(Group::ALL);

        let hw = geometry.body_width / 2.0;
        let hh = geometry.body_height / 2.0;

        let collider = ColliderBuilder2D::circle(hw)
            .groups(interaction_groups(Category::Feet, mask))
            .density(1.0)
            // Offset to the bottom of the hull.
            .translation(0.0, -hh + hw)
            .user_data(self.actor_id as u128)
            .build();
        self.fixtures[FixtureKind::Feet.index()] = Some(physics.add_collider(collider, body));
    }

    /// Rebuild the weapon reach sensor for the current facing and crouch
    /// state, preserving its mask when none is supplied.
    pub fn redefine_weapon_fixture(
        &mut self,
        physics: &mut PhysicsWorld,
        geometry: &BodyGeometry,
        mask: Option<Group>,
    ) {
        let Some(body) = self.body else {
            return;
        };
        let mask = self
            .take_fixture(
                physics,
                FixtureKind::Weapon,
                mask.map(|m| interaction_groups(Category::MeleeWeapon, m)),
            )
            .map(|g| g.filter)
            .unwrap_or(Group::ALL);

        let hw = geometry.body_width / 2.0;
        let hh = geometry.body_height / 2.0;
        let sign = if geometry.facing_right { 1.0 } else { -1.0 };
        let near_x = sign * hw;
        let far_x = sign * (hw + geometry.attack_range);
        let top = if geometry.crouching { hh / 2.0 } else { hh };

        let Some(builder) = ColliderBuilder2D::quad([
            [near_x, top],
            [far_x, top],
            [near_x, -hh],
            [far_x, -hh],
        ]) else {
            return;
        };
        let collider = builder
            .groups(interaction_groups(Category::MeleeWeapon, mask))
            .sensor(true)
            .user_data(self.actor_id as u128)
            .build();
        self.fixtures[FixtureKind::Weapon.index()] = Some(physics.add_collider(collider, body));
    }

    /// Remove the fixture in a slot, returning the groups to reuse: the
    /// explicitly supplied ones, or the replaced fixture's remembered bits.
    fn take_fixture(
        &mut self,
        physics: &mut PhysicsWorld,
        kind: FixtureKind,
        explicit: Option<InteractionGroups>,
    ) -> Option<InteractionGroups> {
        let previous = self.fixtures[kind.index()].take();
        let remembered = previous.and_then(|h| physics.get_collider(h).map(|c| c.collision_groups()));
        if let Some(handle) = previous {
            physics.remove_collider(handle);
        }
        explicit.or(remembered)
    }

    /// Toggle the feet fixture between solid and sensor (jump-down through
    /// platforms).
    pub fn set_feet_sensor(&self, physics: &mut PhysicsWorld, sensor: bool) {
        if let Some(collider) = self
            .fixture(FixtureKind::Feet)
            .and_then(|h| physics.get_collider_mut(h))
        {
            collider.set_sensor(sensor);
        }
    }

    /// Toggle the body hull's solidity (phasing dash skills).
    pub fn set_body_sensor(&self, physics: &mut PhysicsWorld, sensor: bool) {
        if let Some(collider) = self
            .fixture(FixtureKind::Body)
            .and_then(|h| physics.get_collider_mut(h))
        {
            collider.set_sensor(sensor);
        }
    }

    /// Recategorize the body hull (e.g. `Destroyed` once set to kill).
    pub fn set_body_category(&self, physics: &mut PhysicsWorld, category: Category) {
        if let Some(collider) = self
            .fixture(FixtureKind::Body)
            .and_then(|h| physics.get_collider_mut(h))
        {
            let mask = collider.collision_groups().filter;
            collider.set_collision_groups(interaction_groups(category, mask));
        }
    }

    /// Destroy the rigid body and all fixtures. Idempotent: the body is
    /// destroyed exactly once across death and map removal.
    pub fn destroy(&mut self, physics: &mut PhysicsWorld) -> bool {
        let Some(handle) = self.body.take() else {
            return false;
        };
        physics.remove_rigid_body(handle);
        self.fixtures = [None; FIXTURE_COUNT];
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::physics::collision::mask_of;

    fn geometry(facing_right: bool, crouching: bool) -> BodyGeometry {
        BodyGeometry {
            body_width: 1.0,
            body_height: 2.0,
            attack_range: 0.6,
            facing_right,
            crouching,
        }
    }

    fn define_body(physics: &mut PhysicsWorld) -> CharacterBody {
        let mut body = CharacterBody::new();
        body.define(
            physics,
            0.0,
            5.0,
            &geometry(true, false),
            Category::Player,
            mask_of(&[Category::Enemy, Category::MeleeWeapon]),
            mask_of(&[Category::Ground, Category::Platform]),
            mask_of(&[Category::Enemy]),
            7,
        );
        body
    }

    #[test]
    fn test_define_creates_body_and_three_fixtures() {
        let mut physics = PhysicsWorld::new();
        let body = define_body(&mut physics);

        assert!(body.is_defined());
        assert!(body.fixture(FixtureKind::Body).is_some());
        assert!(body.fixture(FixtureKind::Feet).is_some());
        assert!(body.fixture(FixtureKind::Weapon).is_some());
        assert_eq!(physics.get_actor_id(body.handle().unwrap()), Some(7));
    }

    #[test]
    fn test_redefine_replaces_fixture_not_stacks() {
        let mut physics = PhysicsWorld::new();
        let mut body = define_body(&mut physics);

        let old = body.fixture(FixtureKind::Weapon).unwrap();
        body.redefine_weapon_fixture(&mut physics, &geometry(false, false), None);
        let new = body.fixture(FixtureKind::Weapon).unwrap();

        assert_ne!(old, new);
        assert!(physics.get_collider(old).is_none());
        assert!(physics.get_collider(new).is_some());
    }

    #[test]
    fn test_rebuild_remembers_mask_bits() {
        let mut physics = PhysicsWorld::new();
        let mut body = define_body(&mut physics);

        body.redefine_weapon_fixture(&mut physics, &geometry(false, true), None);

        let collider = physics
            .get_collider(body.fixture(FixtureKind::Weapon).unwrap())
            .unwrap();
        let groups = collider.collision_groups();
        assert_eq!(groups.memberships, Category::MeleeWeapon.group());
        assert!(groups.filter.contains(Category::Enemy.group()));
        assert!(!groups.filter.contains(Category::Ground.group()));
    }

    #[test]
    fn test_redefine_feet_destroys_feet_slot() {
        let mut physics = PhysicsWorld::new();
        let mut body = define_body(&mut physics);

        let body_fixture = body.fixture(FixtureKind::Body).unwrap();
        let old_feet = body.fixture(FixtureKind::Feet).unwrap();
        body.redefine_feet_fixture(&mut physics, &geometry(true, false), None);

        // The body hull must survive a feet rebuild untouched.
        assert_eq!(body.fixture(FixtureKind::Body), Some(body_fixture));
        assert!(physics.get_collider(body_fixture).is_some());
        assert!(physics.get_collider(old_feet).is_none());
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let mut physics = PhysicsWorld::new();
        let mut body = define_body(&mut physics);
        let handle = body.handle().unwrap();

        assert!(body.destroy(&mut physics));
        assert!(!body.destroy(&mut physics));
        assert!(physics.get_rigid_body(handle).is_none());
        assert!(!body.is_defined());
    }

    #[test]
    fn test_set_body_category_keeps_mask() {
        let mut physics = PhysicsWorld::new();
        let body = define_body(&mut physics);

        body.set_body_category(&mut physics, Category::Destroyed);
        let collider = physics
            .get_collider(body.fixture(FixtureKind::Body).unwrap())
            .unwrap();
        assert_eq!(
            collider.collision_groups().memberships,
            Category::Destroyed.group()
        );
        assert!(collider
            .collision_groups()
            .filter
            .contains(Category::Enemy.group()));
    }
}
