use crate::constants::{
    PHASER_MIN_DISTANCE, QUADRANT_SIZE, SHIELD_FACINGS, SUBSYSTEM_DAMAGE_FACTOR,
    SUBSYSTEM_HIT_ROLL, TORPEDO_STEP,
};
use crate::physics::{direction, Quadrant, Vector3};
use crate::ship::{ShipState, System, POWER_WEAPONS};
use rand::Rng;

/// How an incoming hit was split across the six shield facings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShieldReport {
    pub absorbed: [i32; SHIELD_FACINGS],
    /// Damage no facing could soak up.
    pub bleed: i32,
}

impl ShieldReport {
    pub fn total(&self) -> i32 {
        self.absorbed.iter().sum::<i32>() + self.bleed
    }
}

/// Splits `damage` evenly across the facings in F, R, T, B, L, RI order.
/// The remainder of the division lands on the first facings so nothing is
/// lost: absorbed plus bleed always equals the incoming damage.
pub fn distribute_damage(shields: &mut [i32; SHIELD_FACINGS], damage: i32) -> ShieldReport {
    let damage = damage.max(0);
    let share = damage / SHIELD_FACINGS as i32;
    let remainder = (damage % SHIELD_FACINGS as i32) as usize;

    let mut report = ShieldReport::default();
    for (facing, charge) in shields.iter_mut().enumerate() {
        let incoming = share + i32::from(facing < remainder);
        let absorbed = incoming.min((*charge).max(0));
        *charge -= absorbed;
        report.absorbed[facing] = absorbed;
        report.bleed += incoming - absorbed;
    }
    report
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageReport {
    pub shields: ShieldReport,
    pub damaged_system: Option<System>,
    pub destroyed: bool,
}

/// Applies a hit to a captain's ship. Bleed-through drains energy and may
/// knock out a random subsystem.
pub fn apply_ship_damage<R: Rng>(ship: &mut ShipState, damage: i32, rng: &mut R) -> DamageReport {
    let shields = distribute_damage(&mut ship.shields, damage);
    let mut damaged_system = None;

    if shields.bleed > 0 {
        ship.energy -= shields.bleed;
        if rng.gen_range(0..100) > SUBSYSTEM_HIT_ROLL {
            let system = System::ALL[rng.gen_range(0..System::ALL.len())];
            let amount = (shields.bleed as f32 * SUBSYSTEM_DAMAGE_FACTOR).min(100.0);
            ship.damage_system(system, amount);
            damaged_system = Some(system);
        }
    }

    DamageReport {
        shields,
        damaged_system,
        destroyed: ship.energy <= 0,
    }
}

/// Phaser output at the target. Committed energy falls off with distance
/// and scales with the weapons share of the power distribution.
pub fn phaser_damage(energy: i32, distance: f64, weapons_power: f32) -> i32 {
    let distance = distance.max(PHASER_MIN_DISTANCE);
    ((energy as f64 / distance) * (0.5 + weapons_power as f64)) as i32
}

pub fn ship_phaser_damage(ship: &ShipState, energy: i32, distance: f64) -> i32 {
    phaser_damage(energy, distance, ship.power[POWER_WEAPONS])
}

/// A photon torpedo in flight. It lives in the quadrant it was fired in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Torpedo {
    pub quadrant: Quadrant,
    pub position: Vector3,
    pub direction: Vector3,
}

impl Torpedo {
    pub fn launch(quadrant: Quadrant, position: Vector3, heading: f64, mark: f64) -> Self {
        Self {
            quadrant,
            position,
            direction: direction(heading, mark),
        }
    }

    /// Moves one tick along the track. Returns false once the torpedo has
    /// left the sector cube and should be discarded.
    pub fn step(&mut self) -> bool {
        self.position = self.position.add(&self.direction.scale(TORPEDO_STEP));
        let inside = |v: f64| (0.0..=QUADRANT_SIZE).contains(&v);
        inside(self.position.x) && inside(self.position.y) && inside(self.position.z)
    }

    pub fn hits(&self, target: Vector3, radius: f64) -> bool {
        self.position.distance_sq(&target) < radius * radius
    }
}
