// Math utilities and helper functions

/// Clamp a value between min and max
pub fn clamp<T: PartialOrd>(value: T, min: T, max: T) -> T {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}

/// Rotate a 2D vector counter-clockwise by `angle` radians.
///
/// Used to project movement impulses along sloped ground.
pub fn rotate_counter_clockwise(v: (f32, f32), angle: f32) -> (f32, f32) {
    let (sin, cos) = angle.sin_cos();
    (v.0 * cos - v.1 * sin, v.0 * sin + v.1 * cos)
}

/// Check if two f32 values are approximately equal
#[allow(dead_code)]
pub fn approx_equal(a: f32, b: f32, epsilon: f32) -> bool {
    (a - b).abs() < epsilon
}
