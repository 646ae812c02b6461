//! Combat system - bullets, damage, hit detection

use super::math::{Fixed, SeededRng, Vec2};
use super::state::Bullet;

/// Bullet speed (units per second)
pub const BULLET_SPEED: i32 = 600;
/// A bullet closer than this to a live actor hits it
pub const HIT_RADIUS: i32 = 35;
/// Damage per non-critical hit
pub const BULLET_DAMAGE: u32 = 5;
/// Probability that a hit is critical (doubled damage)
pub const CRIT_CHANCE: f64 = 0.2;
/// Health of a fresh or respawned actor
pub const MAX_HP: u32 = 100;
/// Seconds a dead actor waits before respawning
pub const REBIRTH_TIME: Fixed = Fixed::from_int(5);

impl Bullet {
    /// Fly forward for `dt` seconds
    pub fn advance(&mut self, dt: Fixed) {
        self.position = self.position.advanced(self.direction, dt, BULLET_SPEED);
    }

    /// Check collision with a target centre
    pub fn check_hit(&self, target: Vec2) -> bool {
        self.position.within(target, Fixed::from_int(HIT_RADIUS))
    }
}

/// Combat rules shared by every bullet
pub struct CombatSystem;

impl CombatSystem {
    /// Draw once from the generator to decide a crit.
    /// Returns (damage, is_critical).
    pub fn roll_damage(rng: &mut SeededRng) -> (u32, bool) {
        let critical = rng.next_f64() < CRIT_CHANCE;
        let damage = if critical {
            BULLET_DAMAGE * 2
        } else {
            BULLET_DAMAGE
        };
        (damage, critical)
    }

    /// Apply damage to health, returns (new_health, is_dead)
    pub fn apply_damage(current_hp: u32, damage: u32) -> (u32, bool) {
        let hp = current_hp.saturating_sub(damage).min(MAX_HP);
        (hp, hp == 0)
    }
}

/// Hit result from bullet resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HitResult {
    pub shooter_id: u32,
    pub target_id: u32,
    pub damage: u32,
    pub critical: bool,
    pub position: Vec2,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn damage_floors_at_zero() {
        assert_eq!(CombatSystem::apply_damage(100, 5), (95, false));
        assert_eq!(CombatSystem::apply_damage(5, 10), (0, true));
        assert_eq!(CombatSystem::apply_damage(0, 5), (0, true));
    }

    #[test]
    fn crit_roll_consumes_exactly_one_draw() {
        let mut rng = SeededRng::new(7);
        let mut reference = SeededRng::new(7);
        let (damage, critical) = CombatSystem::roll_damage(&mut rng);
        let draw = reference.next_f64();

        assert_eq!(rng, reference);
        assert_eq!(critical, draw < CRIT_CHANCE);
        assert_eq!(damage, if critical { 10 } else { 5 });
    }
}
