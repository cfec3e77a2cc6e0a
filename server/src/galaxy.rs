//! The static and semi-static contents of the galaxy: stars, black holes,
//! planets, starbases and the hostile fleet.
//!
//! Every object is anchored to a quadrant and holds a continuous sector
//! position. Tables are append-only; an object that leaves play is marked
//! inactive so that its slot, and therefore its network id, stays stable.

use crate::constants::{
    GALAXY_QUADRANTS, MAX_BASES, MAX_BLACK_HOLES, MAX_NPC, MAX_PLANETS, MAX_STARS,
    NPC_FIRE_COOLDOWN_MAX, NPC_FIRE_COOLDOWN_MIN, NPC_START_ENERGY,
};
use crate::entity::EntityRef;
use crate::physics::{Quadrant, Vector3};
use log::info;
use rand::Rng;
use serde::{Deserialize, Serialize};
use shared::{GalaxySnapshot, QuadrantCounts, Species};

pub const STARBASE_HEALTH: i32 = 5000;
pub const PLANET_RESERVES: i32 = 1000;

pub const RESOURCE_NAMES: [&str; 7] = [
    "-",
    "Dilithium",
    "Tritanium",
    "Verterium",
    "Monotanium",
    "Isolinear",
    "Gases",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Star {
    pub quadrant: Quadrant,
    pub position: Vector3,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlackHole {
    pub quadrant: Quadrant,
    pub position: Vector3,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Planet {
    pub quadrant: Quadrant,
    pub position: Vector3,
    /// Mineral type, 1-6. See [`RESOURCE_NAMES`].
    pub resource: u8,
    pub amount: i32,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Starbase {
    pub quadrant: Quadrant,
    pub position: Vector3,
    pub health: i32,
    pub active: bool,
}

/// Behaviour currently driving a hostile vessel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AiState {
    Patrol,
    /// Pursuing the captain in the given registry slot.
    Chase { target: usize },
    Flee,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hostile {
    pub quadrant: Quadrant,
    pub position: Vector3,
    pub species: Species,
    pub energy: i32,
    pub ai: AiState,
    pub fire_cooldown: u32,
    pub velocity: Vector3,
    /// Ticks left before the patrol drift is re-rolled.
    pub nav_timer: u32,
    pub heading: f64,
    pub mark: f64,
    pub active: bool,
}

impl Hostile {
    pub fn new(quadrant: Quadrant, position: Vector3, species: Species) -> Self {
        Self {
            quadrant,
            position,
            species,
            energy: NPC_START_ENERGY,
            ai: AiState::Patrol,
            fire_cooldown: 0,
            velocity: Vector3::default(),
            nav_timer: 0,
            heading: 0.0,
            mark: 0.0,
            active: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Galaxy {
    pub stars: Vec<Star>,
    pub black_holes: Vec<BlackHole>,
    pub planets: Vec<Planet>,
    pub bases: Vec<Starbase>,
    pub hostiles: Vec<Hostile>,
}

fn random_sector<R: Rng>(rng: &mut R) -> Vector3 {
    Vector3::new(
        rng.gen_range(0..100) as f64 / 10.0,
        rng.gen_range(0..100) as f64 / 10.0,
        rng.gen_range(0..100) as f64 / 10.0,
    )
}

fn counts_mut(snapshot: &mut GalaxySnapshot, q: Quadrant) -> Option<&mut QuadrantCounts> {
    GalaxySnapshot::index(q.x, q.y, q.z).and_then(move |i| snapshot.quadrants.get_mut(i))
}

impl Galaxy {
    /// Populates all 1000 quadrants.
    ///
    /// Each quadrant independently rolls for hostiles (up to three), a
    /// starbase, planets, stars and a black hole. Tables stop growing once
    /// their cap is reached.
    pub fn generate<R: Rng>(rng: &mut R) -> Self {
        let mut galaxy = Galaxy::default();

        for x in 1..=GALAXY_QUADRANTS {
            for y in 1..=GALAXY_QUADRANTS {
                for z in 1..=GALAXY_QUADRANTS {
                    let quadrant = Quadrant::new(x, y, z);

                    let r = rng.gen_range(0..100);
                    let hostiles = match r {
                        97..=99 => 3,
                        93..=96 => 2,
                        86..=92 => 1,
                        _ => 0,
                    };
                    let bases = usize::from(rng.gen_range(0..100) > 98);
                    let planets = if rng.gen_range(0..100) > 90 {
                        rng.gen_range(1..=2)
                    } else {
                        0
                    };
                    let stars = if rng.gen_range(0..100) < 40 {
                        rng.gen_range(1..=3)
                    } else {
                        0
                    };
                    let black_holes = usize::from(rng.gen_range(0..100) < 5);

                    for _ in 0..hostiles {
                        if galaxy.hostiles.len() >= MAX_NPC {
                            break;
                        }
                        let species = Species::ALL[rng.gen_range(0..Species::ALL.len())];
                        let position = random_sector(rng);
                        // Same interval fire control uses after a shot
                        let mut hostile = Hostile::new(quadrant, position, species);
                        hostile.fire_cooldown =
                            rng.gen_range(NPC_FIRE_COOLDOWN_MIN..=NPC_FIRE_COOLDOWN_MAX);
                        galaxy.hostiles.push(hostile);
                    }
                    for _ in 0..bases {
                        if galaxy.bases.len() >= MAX_BASES {
                            break;
                        }
                        galaxy.bases.push(Starbase {
                            quadrant,
                            position: random_sector(rng),
                            health: STARBASE_HEALTH,
                            active: true,
                        });
                    }
                    for _ in 0..planets {
                        if galaxy.planets.len() >= MAX_PLANETS {
                            break;
                        }
                        let position = random_sector(rng);
                        galaxy.planets.push(Planet {
                            quadrant,
                            position,
                            resource: rng.gen_range(1..=6),
                            amount: PLANET_RESERVES,
                            active: true,
                        });
                    }
                    for _ in 0..stars {
                        if galaxy.stars.len() >= MAX_STARS {
                            break;
                        }
                        galaxy.stars.push(Star {
                            quadrant,
                            position: random_sector(rng),
                            active: true,
                        });
                    }
                    for _ in 0..black_holes {
                        if galaxy.black_holes.len() >= MAX_BLACK_HOLES {
                            break;
                        }
                        galaxy.black_holes.push(BlackHole {
                            quadrant,
                            position: random_sector(rng),
                            active: true,
                        });
                    }
                }
            }
        }

        info!(
            "Galaxy generated: {} hostiles, {} stars, {} planets, {} bases, {} black holes",
            galaxy.hostiles.len(),
            galaxy.stars.len(),
            galaxy.planets.len(),
            galaxy.bases.len(),
            galaxy.black_holes.len()
        );
        galaxy
    }

    pub fn stars_in(&self, quadrant: Quadrant) -> impl Iterator<Item = (usize, &Star)> {
        self.stars
            .iter()
            .enumerate()
            .filter(move |(_, s)| s.active && s.quadrant == quadrant)
    }

    pub fn black_holes_in(&self, quadrant: Quadrant) -> impl Iterator<Item = (usize, &BlackHole)> {
        self.black_holes
            .iter()
            .enumerate()
            .filter(move |(_, b)| b.active && b.quadrant == quadrant)
    }

    pub fn planets_in(&self, quadrant: Quadrant) -> impl Iterator<Item = (usize, &Planet)> {
        self.planets
            .iter()
            .enumerate()
            .filter(move |(_, p)| p.active && p.quadrant == quadrant)
    }

    pub fn bases_in(&self, quadrant: Quadrant) -> impl Iterator<Item = (usize, &Starbase)> {
        self.bases
            .iter()
            .enumerate()
            .filter(move |(_, b)| b.active && b.quadrant == quadrant)
    }

    pub fn hostiles_in(&self, quadrant: Quadrant) -> impl Iterator<Item = (usize, &Hostile)> {
        self.hostiles
            .iter()
            .enumerate()
            .filter(move |(_, h)| h.active && h.quadrant == quadrant)
    }

    /// Quadrant and sector of an active non-player entity.
    pub fn locate(&self, entity: EntityRef) -> Option<(Quadrant, Vector3)> {
        match entity {
            EntityRef::Player(_) => None,
            EntityRef::Npc(i) => self
                .hostiles
                .get(i)
                .filter(|h| h.active)
                .map(|h| (h.quadrant, h.position)),
            EntityRef::Base(i) => self
                .bases
                .get(i)
                .filter(|b| b.active)
                .map(|b| (b.quadrant, b.position)),
            EntityRef::Planet(i) => self
                .planets
                .get(i)
                .filter(|p| p.active)
                .map(|p| (p.quadrant, p.position)),
            EntityRef::Star(i) => self
                .stars
                .get(i)
                .filter(|s| s.active)
                .map(|s| (s.quadrant, s.position)),
            EntityRef::BlackHole(i) => self
                .black_holes
                .get(i)
                .filter(|b| b.active)
                .map(|b| (b.quadrant, b.position)),
        }
    }

    pub fn quadrant_counts(&self, quadrant: Quadrant) -> QuadrantCounts {
        let clamp = |n: usize| n.min(u8::MAX as usize) as u8;
        QuadrantCounts {
            black_holes: clamp(self.black_holes_in(quadrant).count()),
            planets: clamp(self.planets_in(quadrant).count()),
            hostiles: clamp(self.hostiles_in(quadrant).count()),
            bases: clamp(self.bases_in(quadrant).count()),
            stars: clamp(self.stars_in(quadrant).count()),
        }
    }

    /// Builds the per-quadrant master record in a single pass over every table.
    pub fn master_record(&self) -> GalaxySnapshot {
        let mut snapshot = GalaxySnapshot::empty();

        for b in self.black_holes.iter().filter(|b| b.active) {
            if let Some(c) = counts_mut(&mut snapshot, b.quadrant) {
                c.black_holes = c.black_holes.saturating_add(1);
            }
        }
        for p in self.planets.iter().filter(|p| p.active) {
            if let Some(c) = counts_mut(&mut snapshot, p.quadrant) {
                c.planets = c.planets.saturating_add(1);
            }
        }
        for h in self.hostiles.iter().filter(|h| h.active) {
            if let Some(c) = counts_mut(&mut snapshot, h.quadrant) {
                c.hostiles = c.hostiles.saturating_add(1);
            }
        }
        for b in self.bases.iter().filter(|b| b.active) {
            if let Some(c) = counts_mut(&mut snapshot, b.quadrant) {
                c.bases = c.bases.saturating_add(1);
            }
        }
        for s in self.stars.iter().filter(|s| s.active) {
            if let Some(c) = counts_mut(&mut snapshot, s.quadrant) {
                c.stars = c.stars.saturating_add(1);
            }
        }

        snapshot.hostiles = self.hostile_count();
        snapshot.bases = self.base_count();
        snapshot
    }

    pub fn hostile_count(&self) -> u32 {
        self.hostiles.iter().filter(|h| h.active).count() as u32
    }

    pub fn base_count(&self) -> u32 {
        self.bases.iter().filter(|b| b.active).count() as u32
    }
}
