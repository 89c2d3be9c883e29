pub mod math;
pub mod resource;
