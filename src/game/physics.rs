//! Actor movement and stage constraints

use super::math::{sin_cos, Fixed, Vec2};

/// Stage width in world units, centred on the origin
pub const STAGE_WIDTH: i32 = 1920;
/// Stage height in world units, centred on the origin
pub const STAGE_HEIGHT: i32 = 1280;
/// Actor movement speed (units per second)
pub const ACTOR_SPEED: i32 = 100;
/// Actor body radius used for actor-actor separation
pub const ACTOR_RADIUS: i32 = 20;
/// Respawn ring: distance from centre is `MIN + draw * SPAN`
pub const SPAWN_RADIUS_MIN: f64 = 320.0;
pub const SPAWN_RADIUS_SPAN: f64 = 320.0;

/// Physics system for moving actors on the stage
pub struct PhysicsSystem;

impl PhysicsSystem {
    pub fn half_extents() -> (Fixed, Fixed) {
        (
            Fixed::from_raw(Fixed::from_int(STAGE_WIDTH).raw() / 2),
            Fixed::from_raw(Fixed::from_int(STAGE_HEIGHT).raw() / 2),
        )
    }

    /// Pin a point to the stage rectangle
    pub fn clamp_to_stage(position: Vec2) -> Vec2 {
        let (half_w, half_h) = Self::half_extents();
        Vec2::new(
            position.x.clamp(-half_w, half_w),
            position.y.clamp(-half_h, half_h),
        )
    }

    /// Edges count as on stage
    pub fn is_on_stage(position: Vec2) -> bool {
        let (half_w, half_h) = Self::half_extents();
        position.x >= -half_w && position.x <= half_w && position.y >= -half_h && position.y <= half_h
    }

    /// Next actor position for a move input, before collision
    pub fn integrate(position: Vec2, direction: Vec2, dt: Fixed) -> Vec2 {
        Self::clamp_to_stage(position.advanced(direction, dt, ACTOR_SPEED))
    }

    /// Check whether two actor bodies overlap
    pub fn check_actor_collision(a: Vec2, b: Vec2) -> bool {
        a.within(b, Fixed::from_int(2 * ACTOR_RADIUS))
    }

    /// Push `mover` out of `other` along the line between their centres by
    /// the penetration depth. `other` stays put. Coincident centres separate
    /// along +x.
    pub fn resolve_actor_collision(mover: Vec2, other: Vec2) -> Vec2 {
        if !Self::check_actor_collision(mover, other) {
            return mover;
        }

        let (mx, my) = mover.to_f64();
        let (ox, oy) = other.to_f64();
        let dx = mx - ox;
        let dy = my - oy;
        let dist = (dx * dx + dy * dy).sqrt();

        let (nx, ny) = if dist < 1e-9 {
            (1.0, 0.0)
        } else {
            (dx / dist, dy / dist)
        };
        let depth = 2.0 * ACTOR_RADIUS as f64 - dist;

        Vec2::round_f64(mx + nx * depth, my + ny * depth)
    }

    /// Point on the spawn ring at `angle` radians and `radius` units, plus a
    /// facing that looks back at the centre
    pub fn ring_spawn(angle: f64, radius: f64) -> (Vec2, Vec2) {
        let (sin, cos) = sin_cos(angle);
        let position = Self::clamp_to_stage(Vec2::round_f64(cos * radius, sin * radius));
        let facing = Vec2::round_f64(-cos, -sin);
        (position, facing)
    }
}
