use rapier2d::prelude::*;

pub use rapier2d::prelude::{ColliderHandle, RigidBodyHandle};

/// Builder for creating rigid bodies with common configurations
pub struct BodyBuilder {
    body_type: RigidBodyType,
    position: Isometry<Real>,
    linvel: Vector<Real>,
    gravity_scale: Real,
    linear_damping: Real,
    can_sleep: bool,
    locked_axes: LockedAxes,
}

impl BodyBuilder {
    /// Create a new dynamic body (affected by forces and collisions)
    pub fn new_dynamic() -> Self {
        Self {
            body_type: RigidBodyType::Dynamic,
            position: Isometry::identity(),
            linvel: Vector::zeros(),
            gravity_scale: 1.0,
            linear_damping: 0.0,
            can_sleep: true,
            locked_axes: LockedAxes::empty(),
        }
    }

    /// Create a new fixed (static) body (completely immovable)
    pub fn new_fixed() -> Self {
        Self {
            body_type: RigidBodyType::Fixed,
            position: Isometry::identity(),
            linvel: Vector::zeros(),
            gravity_scale: 0.0,
            linear_damping: 0.0,
            can_sleep: false,
            locked_axes: LockedAxes::empty(),
        }
    }

    /// Set the initial position of the body
    pub fn position(mut self, x: Real, y: Real) -> Self {
        self.position = Isometry::translation(x, y);
        self
    }

    /// Set the initial linear velocity
    pub fn linvel(mut self, x: Real, y: Real) -> Self {
        self.linvel = vector![x, y];
        self
    }

    /// Set the gravity scale (1.0 = normal gravity, 0.0 = no gravity)
    pub fn gravity_scale(mut self, scale: Real) -> Self {
        self.gravity_scale = scale;
        self
    }

    /// Set linear damping (air resistance)
    pub fn linear_damping(mut self, damping: Real) -> Self {
        self.linear_damping = damping;
        self
    }

    /// Set whether the body can sleep when inactive
    pub fn can_sleep(mut self, can_sleep: bool) -> Self {
        self.can_sleep = can_sleep;
        self
    }

    /// Lock rotation (characters never tumble)
    pub fn lock_rotation(mut self) -> Self {
        self.locked_axes = LockedAxes::ROTATION_LOCKED;
        self
    }

    /// Build the rigid body
    pub fn build(self) -> RigidBody {
        RigidBodyBuilder::new(self.body_type)
            .position(self.position)
            .linvel(self.linvel)
            .gravity_scale(self.gravity_scale)
            .linear_damping(self.linear_damping)
            .can_sleep(self.can_sleep)
            .locked_axes(self.locked_axes)
            .build()
    }
}

/// Builder for creating colliders with common configurations
pub struct ColliderBuilder2D {
    shape: SharedShape,
    groups: InteractionGroups,
    is_sensor: bool,
    friction: Real,
    restitution: Real,
    density: Real,
    translation: Vector<Real>,
    user_data: u128,
    active_events: ActiveEvents,
}

impl ColliderBuilder2D {
    fn with_shape(shape: SharedShape) -> Self {
        Self {
            shape,
            groups: InteractionGroups::all(),
            is_sensor: false,
            friction: 0.5,
            restitution: 0.0,
            density: 1.0,
            translation: Vector::zeros(),
            user_data: 0,
            active_events: ActiveEvents::COLLISION_EVENTS,
        }
    }

    /// Create a box-shaped collider
    pub fn box_shape(half_width: Real, half_height: Real) -> Self {
        Self::with_shape(SharedShape::cuboid(half_width, half_height))
    }

    /// Create a circle-shaped collider
    pub fn circle(radius: Real) -> Self {
        Self::with_shape(SharedShape::ball(radius))
    }

    /// Create a collider from a convex quad (body and weapon fixtures)
    pub fn quad(vertices: [[Real; 2]; 4]) -> Option<Self> {
        let points: Vec<_> = vertices.iter().map(|p| point![p[0], p[1]]).collect();
        SharedShape::convex_hull(&points).map(Self::with_shape)
    }

    /// Set category/mask interaction groups for filtering
    pub fn groups(mut self, groups: InteractionGroups) -> Self {
        self.groups = groups;
        self
    }

    /// Make this a sensor (detects contact but doesn't cause physical response)
    pub fn sensor(mut self, is_sensor: bool) -> Self {
        self.is_sensor = is_sensor;
        self
    }

    /// Set friction coefficient (0.0 = no friction, 1.0 = high friction)
    pub fn friction(mut self, friction: Real) -> Self {
        self.friction = friction;
        self
    }

    /// Set restitution/bounciness (0.0 = no bounce, 1.0 = perfect bounce)
    pub fn restitution(mut self, restitution: Real) -> Self {
        self.restitution = restitution;
        self
    }

    /// Set density (mass is derived from shape area)
    pub fn density(mut self, density: Real) -> Self {
        self.density = density;
        self
    }

    /// Offset the collider from its parent body's origin
    pub fn translation(mut self, x: Real, y: Real) -> Self {
        self.translation = vector![x, y];
        self
    }

    /// Tag the collider with the owning actor's id
    pub fn user_data(mut self, user_data: u128) -> Self {
        self.user_data = user_data;
        self
    }

    /// Build the collider
    pub fn build(self) -> Collider {
        rapier2d::prelude::ColliderBuilder::new(self.shape)
            .collision_groups(self.groups)
            .sensor(self.is_sensor)
            .friction(self.friction)
            .restitution(self.restitution)
            .density(self.density)
            .translation(self.translation)
            .user_data(self.user_data)
            .active_events(self.active_events)
            .build()
    }
}

/// Common rigid body configurations for game objects
pub mod presets {
    use super::*;
    use crate::engine::physics::collision::{interaction_groups, mask_of, Category};

    /// Create a character body (dynamic, rotation locked; may sleep when at
    /// rest so idle characters stop costing solver time)
    pub fn character_body(x: Real, y: Real) -> RigidBody {
        BodyBuilder::new_dynamic()
            .position(x, y)
            .lock_rotation()
            .gravity_scale(1.0)
            .can_sleep(true)
            .build()
    }

    /// Create a ground/platform body (fixed/static)
    pub fn ground_body(x: Real, y: Real) -> RigidBody {
        BodyBuilder::new_fixed().position(x, y).build()
    }

    /// Create a ground collider (box shape)
    pub fn ground_collider(width: Real, height: Real) -> Collider {
        ColliderBuilder2D::box_shape(width / 2.0, height / 2.0)
            .groups(interaction_groups(
                Category::Ground,
                mask_of(&[Category::Feet, Category::Item]),
            ))
            .friction(0.3)
            .build()
    }

    /// Create a trap/trigger sensor collider
    pub fn trap_sensor_collider(width: Real, height: Real) -> Collider {
        ColliderBuilder2D::box_shape(width / 2.0, height / 2.0)
            .groups(interaction_groups(
                Category::Interactable,
                mask_of(&[Category::Player, Category::Enemy, Category::Npc]),
            ))
            .sensor(true)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_builder_dynamic() {
        let body = BodyBuilder::new_dynamic()
            .position(10.0, 20.0)
            .linvel(5.0, 0.0)
            .build();

        assert_eq!(body.body_type(), RigidBodyType::Dynamic);
        assert_eq!(body.translation().x, 10.0);
        assert_eq!(body.translation().y, 20.0);
    }

    #[test]
    fn test_character_preset_locks_rotation() {
        let body = presets::character_body(0.0, 0.0);
        assert_eq!(body.body_type(), RigidBodyType::Dynamic);
        assert!(body.is_rotation_locked());
    }

    #[test]
    fn test_quad_collider_builds() {
        let collider = ColliderBuilder2D::quad([[-0.5, 0.5], [0.5, 0.5], [-0.5, -0.5], [0.5, -0.5]])
            .expect("convex quad")
            .sensor(true)
            .build();
        assert!(collider.is_sensor());
    }

    #[test]
    fn test_trap_sensor_preset() {
        let collider = presets::trap_sensor_collider(1.0, 1.0);
        assert!(collider.is_sensor());
    }
}
