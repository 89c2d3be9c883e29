use rapier2d::prelude::*;
use std::collections::HashMap;

use super::collision::{ContactEvent, ContactEventQueue};

/// Handle to identify rigid bodies
pub type RigidBodyHandle = rapier2d::prelude::RigidBodyHandle;

/// Handle to identify colliders
pub type ColliderHandle = rapier2d::prelude::ColliderHandle;

/// Physics world that manages all physics simulation
pub struct PhysicsWorld {
    /// Gravity vector (default: -9.81 m/s² in y-axis)
    gravity: Vector<Real>,

    integration_parameters: IntegrationParameters,
    physics_pipeline: PhysicsPipeline,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    impulse_joint_set: ImpulseJointSet,
    multibody_joint_set: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,
    rigid_body_set: RigidBodySet,
    collider_set: ColliderSet,

    /// Contact begin/end events collected during `step`
    contact_event_queue: ContactEventQueue,

    /// Mapping from body handles to game actor ids
    body_to_actor: HashMap<RigidBodyHandle, u64>,
}

impl PhysicsWorld {
    /// Create a new physics world with default settings
    pub fn new() -> Self {
        Self::with_gravity(vector![0.0, -9.81])
    }

    /// Create a new physics world with custom gravity
    pub fn with_gravity(gravity: Vector<Real>) -> Self {
        let mut integration_parameters = IntegrationParameters::default();
        // Fixed timestep of 1/60 seconds (60 FPS)
        integration_parameters.dt = 1.0 / 60.0;

        Self {
            gravity,
            integration_parameters,
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            contact_event_queue: ContactEventQueue::new(),
            body_to_actor: HashMap::new(),
        }
    }

    /// Step the physics simulation forward by one timestep
    pub fn step(&mut self) {
        self.contact_event_queue.clear();
        let event_handler = &self.contact_event_queue;

        self.physics_pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            event_handler,
        );
    }

    /// Add a rigid body to the physics world
    pub fn add_rigid_body(&mut self, body: RigidBody) -> RigidBodyHandle {
        self.rigid_body_set.insert(body)
    }

    /// Add a collider attached to a rigid body
    pub fn add_collider(
        &mut self,
        collider: Collider,
        parent_handle: RigidBodyHandle,
    ) -> ColliderHandle {
        self.collider_set
            .insert_with_parent(collider, parent_handle, &mut self.rigid_body_set)
    }

    /// Remove a rigid body and all its attached colliders
    pub fn remove_rigid_body(&mut self, handle: RigidBodyHandle) {
        self.rigid_body_set.remove(
            handle,
            &mut self.island_manager,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            true, // remove attached colliders
        );
        self.body_to_actor.remove(&handle);
    }

    /// Remove a collider from the physics world
    pub fn remove_collider(&mut self, handle: ColliderHandle) {
        self.collider_set.remove(
            handle,
            &mut self.island_manager,
            &mut self.rigid_body_set,
            true, // wake up attached body
        );
    }

    /// Get a reference to a rigid body
    pub fn get_rigid_body(&self, handle: RigidBodyHandle) -> Option<&RigidBody> {
        self.rigid_body_set.get(handle)
    }

    /// Get a mutable reference to a rigid body
    pub fn get_rigid_body_mut(&mut self, handle: RigidBodyHandle) -> Option<&mut RigidBody> {
        self.rigid_body_set.get_mut(handle)
    }

    /// Get a reference to a collider
    pub fn get_collider(&self, handle: ColliderHandle) -> Option<&Collider> {
        self.collider_set.get(handle)
    }

    /// Get a mutable reference to a collider
    pub fn get_collider_mut(&mut self, handle: ColliderHandle) -> Option<&mut Collider> {
        self.collider_set.get_mut(handle)
    }

    /// Associate a game actor id with a rigid body
    pub fn set_actor_mapping(&mut self, body_handle: RigidBodyHandle, actor_id: u64) {
        self.body_to_actor.insert(body_handle, actor_id);
    }

    /// Get the actor id associated with a rigid body
    pub fn get_actor_id(&self, body_handle: RigidBodyHandle) -> Option<u64> {
        self.body_to_actor.get(&body_handle).copied()
    }

    /// Cast a ray and return the first hit
    pub fn raycast(
        &self,
        ray_origin: Vector<Real>,
        ray_dir: Vector<Real>,
        max_toi: Real,
        solid: bool,
        filter: QueryFilter,
    ) -> Option<(ColliderHandle, Real)> {
        let ray = Ray::new(point![ray_origin.x, ray_origin.y], ray_dir);
        self.query_pipeline.cast_ray(
            &self.rigid_body_set,
            &self.collider_set,
            &ray,
            max_toi,
            solid,
            filter,
        )
    }

    /// Get all contact events from this frame
    pub fn get_contact_events(&self) -> Vec<ContactEvent> {
        self.contact_event_queue.events()
    }

    /// Set gravity for the physics world
    pub fn set_gravity(&mut self, gravity: Vector<Real>) {
        self.gravity = gravity;
    }

    /// Get current gravity
    pub fn gravity(&self) -> Vector<Real> {
        self.gravity
    }

    /// Set the timestep for physics simulation
    pub fn set_timestep(&mut self, dt: Real) {
        self.integration_parameters.dt = dt;
    }

    /// Get the current timestep
    pub fn timestep(&self) -> Real {
        self.integration_parameters.dt
    }
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::physics::body::presets;

    #[test]
    fn test_add_and_remove_body() {
        let mut world = PhysicsWorld::new();
        let handle = world.add_rigid_body(presets::character_body(0.0, 5.0));
        assert!(world.get_rigid_body(handle).is_some());

        world.remove_rigid_body(handle);
        assert!(world.get_rigid_body(handle).is_none());
    }

    #[test]
    fn test_actor_mapping_cleared_on_removal() {
        let mut world = PhysicsWorld::new();
        let handle = world.add_rigid_body(presets::character_body(0.0, 5.0));
        world.set_actor_mapping(handle, 42);
        assert_eq!(world.get_actor_id(handle), Some(42));

        world.remove_rigid_body(handle);
        assert_eq!(world.get_actor_id(handle), None);
    }

    #[test]
    fn test_gravity_pulls_body_down() {
        let mut world = PhysicsWorld::new();
        let handle = world.add_rigid_body(presets::character_body(0.0, 10.0));
        let collider = crate::engine::physics::body::ColliderBuilder2D::circle(0.5).build();
        world.add_collider(collider, handle);

        for _ in 0..10 {
            world.step();
        }

        let body = world.get_rigid_body(handle).unwrap();
        assert!(body.translation().y < 10.0);
    }
}
