//! Hostile vessel behaviour: a patrol/chase/flee state machine plus an
//! independent fire-control timer.
//!
//! Hostiles only think while a captain shares their quadrant. Everywhere
//! else the fleet sits still, which keeps the per-tick cost proportional to
//! the number of occupied quadrants rather than the size of the galaxy.

use crate::combat::apply_ship_damage;
use crate::constants::{
    NPC_CHASE_SPEED, NPC_FIRE_COOLDOWN_MAX, NPC_FIRE_COOLDOWN_MIN, NPC_FIRE_RANGE,
    NPC_FLEE_ENERGY, NPC_FLEE_SPEED, NPC_PATROL_SPEED, NPC_PATROL_TICKS_MAX,
    NPC_PATROL_TICKS_MIN, NPC_PHASER_POWER, NPC_SECTOR_MAX, NPC_SECTOR_MIN, NPC_SENSOR_RANGE,
    NPC_STANDOFF, PHASER_MIN_DISTANCE,
};
use crate::game::GameState;
use crate::galaxy::{AiState, Hostile};
use crate::physics::{heading_mark, Quadrant, Vector3};
use log::debug;
use rand::Rng;

/// A captain picked up by a hostile's sensors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub slot: usize,
    pub position: Vector3,
    pub distance: f64,
}

/// Picks the behaviour for this tick. Survival beats aggression.
pub fn choose_state(energy: i32, contact: Option<&Contact>) -> AiState {
    if energy < NPC_FLEE_ENERGY {
        AiState::Flee
    } else if let Some(contact) = contact {
        AiState::Chase {
            target: contact.slot,
        }
    } else {
        AiState::Patrol
    }
}

/// Velocity that closes on `target` but never inside the standoff distance.
pub fn chase_velocity(position: Vector3, target: Vector3, standoff: f64) -> Vector3 {
    let offset = target.sub(&position);
    if offset.magnitude() <= standoff {
        Vector3::default()
    } else {
        offset.normalize().scale(NPC_CHASE_SPEED)
    }
}

/// Velocity pointing straight away from `threat`.
pub fn flee_velocity(position: Vector3, threat: Vector3) -> Vector3 {
    position.sub(&threat).normalize().scale(NPC_FLEE_SPEED)
}

/// A fresh random drift for patrolling hostiles.
pub fn patrol_velocity<R: Rng>(rng: &mut R) -> Vector3 {
    let drift = Vector3::new(
        rng.gen_range(-1.0..1.0),
        rng.gen_range(-1.0..1.0),
        rng.gen_range(-1.0..1.0),
    );
    drift.normalize().scale(NPC_PATROL_SPEED)
}

/// Keeps a hostile inside the padded sector cube, flipping the velocity
/// component that carried it out.
pub fn bounce(position: &mut Vector3, velocity: &mut Vector3) {
    fn axis(p: &mut f64, v: &mut f64) {
        if *p < NPC_SECTOR_MIN {
            *p = NPC_SECTOR_MIN;
            *v = v.abs();
        } else if *p > NPC_SECTOR_MAX {
            *p = NPC_SECTOR_MAX;
            *v = -v.abs();
        }
    }
    axis(&mut position.x, &mut velocity.x);
    axis(&mut position.y, &mut velocity.y);
    axis(&mut position.z, &mut velocity.z);
}

/// Moves one hostile for one tick according to its current state.
fn steer<R: Rng>(hostile: &mut Hostile, contact: Option<&Contact>, rng: &mut R) {
    let previous = hostile.ai;
    hostile.ai = choose_state(hostile.energy, contact);

    match hostile.ai {
        AiState::Patrol => {
            if previous != AiState::Patrol {
                hostile.nav_timer = 0;
            }
            if hostile.nav_timer == 0 {
                hostile.velocity = patrol_velocity(rng);
                hostile.nav_timer = rng.gen_range(NPC_PATROL_TICKS_MIN..=NPC_PATROL_TICKS_MAX);
            } else {
                hostile.nav_timer -= 1;
            }
        }
        AiState::Chase { .. } => {
            if let Some(contact) = contact {
                hostile.velocity = chase_velocity(hostile.position, contact.position, NPC_STANDOFF);
            }
        }
        AiState::Flee => {
            hostile.velocity = match contact {
                Some(threat) => flee_velocity(hostile.position, threat.position),
                None => hostile.velocity.normalize().scale(NPC_FLEE_SPEED),
            };
        }
    }

    hostile.position = hostile.position.add(&hostile.velocity);
    bounce(&mut hostile.position, &mut hostile.velocity);

    if hostile.velocity.magnitude_sq() > 0.0 {
        let (heading, mark) = heading_mark(hostile.velocity);
        hostile.heading = heading;
        hostile.mark = mark;
    }
}

impl GameState {
    /// Nearest visible captain within sensor range of a point.
    fn sense(&self, quadrant: Quadrant, position: Vector3) -> Option<Contact> {
        self.clients
            .iter_active()
            .filter(|(_, c)| c.ship.quadrant == quadrant && !c.ship.cloaked)
            .map(|(slot, c)| Contact {
                slot,
                position: c.ship.sector,
                distance: c.ship.sector.distance(&position),
            })
            .filter(|c| c.distance < NPC_SENSOR_RANGE)
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }

    /// Runs sensing, steering and fire control for every hostile that
    /// shares a quadrant with at least one connected captain.
    pub(crate) fn update_hostiles(&mut self) {
        let mut occupied: Vec<Quadrant> = self
            .clients
            .iter_active()
            .map(|(_, c)| c.ship.quadrant)
            .collect();
        occupied.sort_by_key(|q| q.as_array());
        occupied.dedup();
        if occupied.is_empty() {
            return;
        }

        for index in 0..self.galaxy.hostiles.len() {
            let (quadrant, position) = match self.galaxy.hostiles.get(index) {
                Some(h) if h.active && occupied.contains(&h.quadrant) => (h.quadrant, h.position),
                _ => continue,
            };

            let contact = self.sense(quadrant, position);
            if let Some(hostile) = self.galaxy.hostiles.get_mut(index) {
                steer(hostile, contact.as_ref(), &mut self.rng);
            }

            self.fire_control(index);
        }
    }

    /// Counts down the fire timer and shoots the nearest captain in range.
    fn fire_control(&mut self, index: usize) {
        let Some(hostile) = self.galaxy.hostiles.get_mut(index) else {
            return;
        };
        hostile.fire_cooldown = hostile.fire_cooldown.saturating_sub(1);
        if hostile.fire_cooldown > 0 {
            return;
        }

        let (quadrant, origin, species) = (hostile.quadrant, hostile.position, hostile.species);
        let Some(target) = self
            .sense(quadrant, origin)
            .filter(|c| c.distance < NPC_FIRE_RANGE)
        else {
            return;
        };

        let cooldown = self
            .rng
            .gen_range(NPC_FIRE_COOLDOWN_MIN..=NPC_FIRE_COOLDOWN_MAX);
        if let Some(hostile) = self.galaxy.hostiles.get_mut(index) {
            hostile.fire_cooldown = cooldown;
        }

        let damage = (NPC_PHASER_POWER / target.distance.max(PHASER_MIN_DISTANCE)) as i32;
        self.add_beam(quadrant, origin, target.position);

        let Some(captain) = self.clients.active_mut(target.slot) else {
            return;
        };
        let report = apply_ship_damage(&mut captain.ship, damage, &mut self.rng);
        let name = captain.name.clone();
        debug!(
            "{} hostile {} fired on {} for {} damage",
            species.name(),
            index,
            name,
            damage
        );

        self.clients.notify(
            target.slot,
            "WARNING",
            format!("Incoming phaser fire! {} vessel attacking.", species.name()),
        );
        if report.damaged_system.is_some() {
            self.clients
                .notify(target.slot, "DAMAGE CONTROL", "Direct hit! System damage reported.");
        }
        if report.destroyed {
            self.destroy_captain(
                target.slot,
                "Ship destroyed by hostile fire",
                format!("Vessel {} was destroyed by a {} warship.", name, species.name()),
            );
        }
    }
}
