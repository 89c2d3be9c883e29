// Engine modules: physics, timers, external collaborators

pub mod physics;
pub mod scheduler;
pub mod services;
