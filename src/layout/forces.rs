use glam::Vec3;

/// Below this squared distance two nodes count as coincident.
const COINCIDENT_DISTANCE_SQ: f32 = 1e-6;

/// Keeps only finite force contributions. A NaN integrated into a position
/// can never be recovered.
#[inline]
pub(super) fn finite_or_zero(force: Vec3) -> Vec3 {
    if force.is_finite() { force } else { Vec3::ZERO }
}

pub(super) fn gravity(position: Vec3, strength: f32) -> Vec3 {
    finite_or_zero(-position * strength)
}

/// Direction used when two nodes sit on top of each other. Stable for a given
/// pair so the split does not jitter from frame to frame.
fn separation_axis(i: usize, j: usize) -> Vec3 {
    let theta = ((i as f32) * 0.618_034 + (j as f32) * 0.414_214) * std::f32::consts::TAU;
    let phi = ((i as f32) * 0.302_775 + (j as f32) * 0.723_607) * std::f32::consts::PI;
    Vec3::new(phi.sin() * theta.cos(), phi.cos(), phi.sin() * theta.sin())
}

/// Repulsion felt by node `i` from node `j`; node `j` feels the negation.
pub(super) fn repulsion_between(
    point_i: Vec3,
    point_j: Vec3,
    i: usize,
    j: usize,
    strength: f32,
    max_force: f32,
) -> Vec3 {
    let delta = point_i - point_j;
    let distance_sq = delta.length_squared();
    if !distance_sq.is_finite() {
        return Vec3::ZERO;
    }

    if distance_sq < COINCIDENT_DISTANCE_SQ {
        return separation_axis(i, j) * max_force;
    }

    let magnitude = (strength / distance_sq).min(max_force);
    let direction = delta / distance_sq.sqrt();
    finite_or_zero(direction * magnitude)
}

/// Spring force on endpoint `a`; endpoint `b` feels the negation.
pub(super) fn spring_between(point_a: Vec3, point_b: Vec3, rest_length: f32, stiffness: f32) -> Vec3 {
    let delta = point_b - point_a;
    let distance_sq = delta.length_squared();
    if !(COINCIDENT_DISTANCE_SQ..f32::INFINITY).contains(&distance_sq) {
        return Vec3::ZERO;
    }

    let distance = distance_sq.sqrt();
    let displacement = distance - rest_length;
    finite_or_zero(delta / distance * (displacement * stiffness))
}
