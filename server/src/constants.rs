//! Tunable rules of the simulation. Timers are expressed in ticks at
//! [`TICK_RATE`].

pub const TICK_RATE: u32 = 30;

// Galaxy geometry
pub const QUADRANT_SIZE: f64 = 10.0;
pub const GALAXY_QUADRANTS: i32 = 10;
/// Largest legal galactic coordinate on any axis; the galaxy spans [0, 100).
pub const GALAXY_EDGE: f64 = 99.999;

// Entity caps, sized so that every id stays inside its offset range
pub const MAX_NPC: usize = 400;
pub const MAX_BASES: usize = 100;
pub const MAX_PLANETS: usize = 400;
pub const MAX_STARS: usize = 1000;
pub const MAX_BLACK_HOLES: usize = 100;

// Ship
pub const MAX_ENERGY: i32 = 5000;
pub const START_ENERGY: i32 = 3000;
pub const START_TORPEDOES: i32 = 10;
pub const MAX_TORPEDOES: i32 = 20;
pub const SHIELD_FACINGS: usize = 6;
pub const SYSTEM_COUNT: usize = 8;
pub const MINERAL_TYPES: usize = 6;
pub const SYSTEM_OFFLINE_THRESHOLD: f32 = 10.0;
pub const TRANSPORTER_MIN_HEALTH: f32 = 50.0;

// Navigation
pub const ALIGN_TICKS: u32 = 2 * TICK_RATE;
pub const REALIGN_TICKS: u32 = 2 * TICK_RATE;
/// Three seconds of warp per quadrant width travelled.
pub const WARP_TICKS_PER_QUADRANT: f64 = 3.0 * TICK_RATE as f64;
pub const MIN_WARP_TICKS: u32 = TICK_RATE;
pub const STAR_INTERLOCK_RADIUS: f64 = 1.2;
pub const BLACK_HOLE_INTERLOCK_RADIUS: f64 = 1.5;
pub const MAX_IMPULSE_PER_TICK: f64 = 0.1;
pub const IMPULSE_ENERGY_PER_TICK: i32 = 1;

// Environmental hazards
pub const STAR_COLLISION_RADIUS: f64 = 0.8;
pub const EVENT_HORIZON_RADIUS: f64 = 1.0;
pub const STAR_COLLISION_ENERGY: i32 = 1000;

// Upkeep, every two seconds
pub const UPKEEP_INTERVAL: u64 = 2 * TICK_RATE as u64;
pub const CLOAK_DRAIN: i32 = 50;
pub const ENERGY_REGEN: i32 = 10;
pub const ENERGY_REGEN_CEILING: i32 = 3000;
pub const SHIELD_REGEN_BASE: f64 = 15.0;
pub const SHIELD_REGEN_CEILING: i32 = 1000;
pub const SHIELD_REGEN_MIN_ENERGY: i32 = 20;
pub const SYSTEM_REPAIR_RATE: f32 = 0.1;

// NPC behaviour
pub const NPC_START_ENERGY: i32 = 1000;
pub const NPC_SENSOR_RANGE: f64 = 10.0;
pub const NPC_FIRE_RANGE: f64 = 6.0;
pub const NPC_FLEE_ENERGY: i32 = 200;
pub const NPC_STANDOFF: f64 = 1.5;
pub const NPC_PATROL_SPEED: f64 = 0.01;
pub const NPC_CHASE_SPEED: f64 = 0.03;
pub const NPC_FLEE_SPEED: f64 = 0.05;
pub const NPC_PATROL_TICKS_MIN: u32 = 100;
pub const NPC_PATROL_TICKS_MAX: u32 = 300;
pub const NPC_FIRE_COOLDOWN_MIN: u32 = 60;
pub const NPC_FIRE_COOLDOWN_MAX: u32 = 300;
pub const NPC_PHASER_POWER: f64 = 300.0;
pub const NPC_SECTOR_MIN: f64 = 0.5;
pub const NPC_SECTOR_MAX: f64 = 9.5;

// Weapons
pub const PHASER_MIN_DISTANCE: f64 = 0.1;
pub const PHASER_RANGE: f64 = 10.0;
/// How far an unaimed phaser beam is drawn along the heading.
pub const PHASER_MANUAL_REACH: f64 = 5.0;
pub const TORPEDO_STEP: f64 = 0.8;
pub const TORPEDO_PLAYER_RADIUS: f64 = 0.5;
pub const TORPEDO_NPC_RADIUS: f64 = 0.6;
pub const TORPEDO_DAMAGE_MIN: i32 = 500;
pub const TORPEDO_DAMAGE_MAX: i32 = 1000;
pub const TORPEDO_NPC_DAMAGE: i32 = 800;
/// A d100 roll above this damages a subsystem when damage bleeds through.
pub const SUBSYSTEM_HIT_ROLL: u32 = 80;
pub const SUBSYSTEM_DAMAGE_FACTOR: f32 = 0.1;

// Shipboard operations
pub const INTERACTION_RANGE: f64 = 2.0;
pub const BOARDING_RANGE: f64 = 1.0;
pub const MINING_YIELD: i32 = 100;
pub const PROBE_COST: i32 = 500;
pub const JETTISON_RADIUS: f64 = 3.0;
pub const JETTISON_DAMAGE: i32 = 500;
pub const SCOOP_ENERGY: i32 = 500;
pub const SCOOP_SHIELD_STRESS: i32 = 100;
pub const HARVEST_DILITHIUM: i32 = 50;
pub const HARVEST_SHIELD_STRESS: i32 = 300;
pub const STRUCTURAL_REPAIR_COST: i32 = 50;
pub const ELECTRONIC_REPAIR_COST: i32 = 30;
