use crate::constants::{
    MAX_ENERGY, MINERAL_TYPES, SHIELD_FACINGS, START_ENERGY, START_TORPEDOES, SYSTEM_COUNT,
    SYSTEM_OFFLINE_THRESHOLD,
};
use crate::physics::{to_galactic, Quadrant, Vector3};
use serde::{Deserialize, Serialize};

pub const SHIELD_LABELS: [&str; SHIELD_FACINGS] = ["F", "R", "T", "B", "L", "RI"];

/// Shipboard subsystems, indexed as reported by `dam` and repaired by `rep`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum System {
    Warp,
    Impulse,
    Sensors,
    Transporters,
    Phasers,
    Torpedoes,
    Computer,
    LifeSupport,
}

impl System {
    pub const ALL: [System; SYSTEM_COUNT] = [
        System::Warp,
        System::Impulse,
        System::Sensors,
        System::Transporters,
        System::Phasers,
        System::Torpedoes,
        System::Computer,
        System::LifeSupport,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            System::Warp => "Warp",
            System::Impulse => "Impulse",
            System::Sensors => "Sensors",
            System::Transporters => "Transp",
            System::Phasers => "Phasers",
            System::Torpedoes => "Torps",
            System::Computer => "Computer",
            System::LifeSupport => "Life",
        }
    }

    /// Hull and propulsion systems are patched with Monotanium, electronics with Isolinear.
    pub fn is_structural(self) -> bool {
        matches!(
            self,
            System::Warp | System::Impulse | System::Torpedoes | System::LifeSupport
        )
    }
}

/// Index into the power distribution triple.
pub const POWER_ENGINES: usize = 0;
pub const POWER_SHIELDS: usize = 1;
pub const POWER_WEAPONS: usize = 2;

/// Everything about a captain's vessel that survives a reconnect or a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipState {
    pub quadrant: Quadrant,
    pub sector: Vector3,
    pub heading: f64,
    pub mark: f64,
    pub energy: i32,
    pub torpedoes: i32,
    pub shields: [i32; SHIELD_FACINGS],
    pub system_health: [f32; SYSTEM_COUNT],
    /// Cargo hold indexed by mineral type; slot 0 is unused.
    pub inventory: [i32; MINERAL_TYPES + 1],
    pub lock_target: u32,
    pub cloaked: bool,
    /// Engines, shields, weapons. Always sums to 1.0.
    pub power: [f32; 3],
}

impl ShipState {
    pub fn new(quadrant: Quadrant) -> Self {
        Self {
            quadrant,
            sector: Vector3::new(5.0, 5.0, 5.0),
            heading: 0.0,
            mark: 0.0,
            energy: START_ENERGY,
            torpedoes: START_TORPEDOES,
            shields: [0; SHIELD_FACINGS],
            system_health: [100.0; SYSTEM_COUNT],
            inventory: [0; MINERAL_TYPES + 1],
            lock_target: 0,
            cloaked: false,
            power: [0.33, 0.33, 0.34],
        }
    }

    pub fn galactic(&self) -> Vector3 {
        to_galactic(self.quadrant, self.sector)
    }

    pub fn health(&self, system: System) -> f32 {
        self.system_health[system.index()]
    }

    pub fn is_online(&self, system: System) -> bool {
        self.health(system) >= SYSTEM_OFFLINE_THRESHOLD
    }

    pub fn add_energy(&mut self, amount: i32) {
        self.energy = self.energy.saturating_add(amount).min(MAX_ENERGY);
    }

    pub fn damage_system(&mut self, system: System, amount: f32) {
        let health = &mut self.system_health[system.index()];
        *health = (*health - amount).clamp(0.0, 100.0);
    }

    pub fn repair_system(&mut self, system: System, amount: f32) {
        let health = &mut self.system_health[system.index()];
        *health = (*health + amount).clamp(0.0, 100.0);
    }

    pub fn total_shields(&self) -> i32 {
        self.shields.iter().sum()
    }

    /// Rough hull condition for renderers, 0-100.
    pub fn condition_pct(&self) -> u8 {
        (self.energy.max(0) * 100 / START_ENERGY).clamp(0, 100) as u8
    }
}
