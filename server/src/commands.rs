//! Bridge command surface: parsing free-text command lines and applying
//! them to the issuing captain's ship on the tick owner.
//!
//! Parsing is pure and validates argument ranges up front. Execution never
//! fails as far as Rust is concerned; every refusal is reported to the
//! captain as a station message and leaves state untouched.

use crate::combat::{apply_ship_damage, ship_phaser_damage, Torpedo};
use crate::constants::{
    BOARDING_RANGE, ELECTRONIC_REPAIR_COST, HARVEST_DILITHIUM, HARVEST_SHIELD_STRESS,
    INTERACTION_RANGE, JETTISON_DAMAGE, JETTISON_RADIUS, MAX_ENERGY, MAX_TORPEDOES, MINING_YIELD,
    PHASER_MANUAL_REACH, PHASER_RANGE, PROBE_COST, SCOOP_ENERGY, SCOOP_SHIELD_STRESS,
    SHIELD_FACINGS, START_ENERGY, START_TORPEDOES, STRUCTURAL_REPAIR_COST,
    TRANSPORTER_MIN_HEALTH,
};
use crate::entity::EntityRef;
use crate::galaxy::RESOURCE_NAMES;
use crate::game::GameState;
use crate::navigation::{engage_impulse, plot_approach, plot_course};
use crate::physics::{direction, heading_mark, to_galactic, Quadrant, Vector3};
use crate::reports;
use crate::ship::System;
use log::{debug, info};
use rand::Rng;
use shared::{MessageScope, NetDismantle, ObjectKind, Packet};
use std::str::FromStr;
use thiserror::Error;

/// A parsed bridge command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Navigate { heading: f64, mark: f64, warp: f64 },
    Impulse { heading: f64, mark: f64, speed: f64 },
    ShortRangeScan,
    LongRangeScan,
    Phasers { energy: i32 },
    Torpedo { aim: Option<(f64, f64)> },
    Shields([i32; SHIELD_FACINGS]),
    Lock(u32),
    Power([f32; 3]),
    PsychologicalWarfare,
    Jettison,
    Probe(Quadrant),
    Computer,
    Board,
    Mine,
    Repair(System),
    Inventory,
    Convert { resource: usize, amount: i32 },
    Dock,
    Scoop,
    Harvest,
    Status,
    Damage,
    Approach { target: u32, distance: f64 },
    Calculate(Quadrant),
    Who,
    Cloak,
    SelfDestruct,
}

/// Why a command line was refused before it reached the ship. The display
/// text is what the captain reads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Command unknown or pending implementation.")]
    Unknown,
    #[error("Usage: {0}")]
    Usage(&'static str),
    #[error("{0}")]
    OutOfRange(String),
}

fn args<T: FromStr>(parts: &[&str], count: usize, usage: &'static str) -> Result<Vec<T>, CommandError> {
    if parts.len() != count {
        return Err(CommandError::Usage(usage));
    }
    parts
        .iter()
        .map(|p| p.parse::<T>().map_err(|_| CommandError::Usage(usage)))
        .collect()
}

fn check_course(heading: f64, mark: f64) -> Result<(), CommandError> {
    if !(0.0..360.0).contains(&heading) {
        return Err(CommandError::OutOfRange("Heading must be between 0 and 359.9.".into()));
    }
    if !(-90.0..=90.0).contains(&mark) {
        return Err(CommandError::OutOfRange("Mark must be between -90 and +90.".into()));
    }
    Ok(())
}

fn quadrant_arg(parts: &[&str], usage: &'static str) -> Result<Quadrant, CommandError> {
    let v = args::<i32>(parts, 3, usage)?;
    let quadrant = Quadrant::new(v[0], v[1], v[2]);
    if quadrant.is_valid() {
        Ok(quadrant)
    } else {
        Err(CommandError::OutOfRange("Invalid quadrant coordinates.".into()))
    }
}

/// Parses one command line. Verbs are case-sensitive.
pub fn parse(line: &str) -> Result<Command, CommandError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let Some((&verb, rest)) = tokens.split_first() else {
        return Err(CommandError::Unknown);
    };

    let no_args = |cmd: Command| {
        if rest.is_empty() {
            Ok(cmd)
        } else {
            Err(CommandError::Unknown)
        }
    };

    match verb {
        "nav" => {
            let v = args::<f64>(rest, 3, "nav H M W")?;
            check_course(v[0], v[1])?;
            if !(v[2] > 0.0 && v[2] <= 20.0) {
                return Err(CommandError::OutOfRange("Warp factor must be above 0 and at most 20.".into()));
            }
            Ok(Command::Navigate {
                heading: v[0],
                mark: v[1],
                warp: v[2],
            })
        }
        "imp" => {
            let v = args::<f64>(rest, 3, "imp H M S")?;
            check_course(v[0], v[1])?;
            if !(0.0..=1.0).contains(&v[2]) {
                return Err(CommandError::OutOfRange("Impulse speed must be between 0.0 and 1.0.".into()));
            }
            Ok(Command::Impulse {
                heading: v[0],
                mark: v[1],
                speed: v[2],
            })
        }
        "srs" => no_args(Command::ShortRangeScan),
        "lrs" => no_args(Command::LongRangeScan),
        "pha" => {
            let v = args::<i32>(rest, 1, "pha E")?;
            if v[0] <= 0 {
                return Err(CommandError::OutOfRange("Phaser energy must be positive.".into()));
            }
            Ok(Command::Phasers { energy: v[0] })
        }
        "tor" => {
            if rest.is_empty() {
                return Ok(Command::Torpedo { aim: None });
            }
            let v = args::<f64>(rest, 2, "tor [H M]")?;
            check_course(v[0], v[1])?;
            Ok(Command::Torpedo {
                aim: Some((v[0], v[1])),
            })
        }
        "she" => {
            let v = args::<i32>(rest, SHIELD_FACINGS, "she F R T B L RI")?;
            if v.iter().any(|s| *s < 0) {
                return Err(CommandError::OutOfRange("Shield values cannot be negative.".into()));
            }
            if v.iter().any(|s| *s > MAX_ENERGY) {
                return Err(CommandError::OutOfRange(format!(
                    "Shield values cannot exceed {} per facing.",
                    MAX_ENERGY
                )));
            }
            let mut shields = [0; SHIELD_FACINGS];
            shields.copy_from_slice(&v);
            Ok(Command::Shields(shields))
        }
        "lock" => match rest {
            [] => Ok(Command::Lock(0)),
            _ => Ok(Command::Lock(args::<u32>(rest, 1, "lock [ID]")?[0])),
        },
        "pow" => {
            let v = args::<f64>(rest, 3, "pow E S W")?;
            let total: f64 = v.iter().sum();
            if v.iter().any(|p| *p < 0.0) || !(total > 0.0 && total.is_finite()) {
                return Err(CommandError::OutOfRange(
                    "Power allocation must be non-negative with a positive total.".into(),
                ));
            }
            let share = |p: f64| (p / total) as f32;
            Ok(Command::Power([share(v[0]), share(v[1]), share(v[2])]))
        }
        "psy" => no_args(Command::PsychologicalWarfare),
        "aux" => match rest.split_first() {
            Some((&"jettison", [])) => Ok(Command::Jettison),
            Some((&"computer", [])) => Ok(Command::Computer),
            Some((&"probe", coords)) => Ok(Command::Probe(quadrant_arg(coords, "aux probe QX QY QZ")?)),
            _ => Err(CommandError::Usage("aux jettison|probe QX QY QZ|computer")),
        },
        "bor" => no_args(Command::Board),
        "min" => no_args(Command::Mine),
        "rep" => {
            let v = args::<usize>(rest, 1, "rep ID")?;
            System::from_index(v[0])
                .map(Command::Repair)
                .ok_or_else(|| CommandError::OutOfRange("System ID must be 0-7.".into()))
        }
        "inv" => no_args(Command::Inventory),
        "con" => {
            let v = args::<i32>(rest, 2, "con T A")?;
            if !(1..=6).contains(&v[0]) {
                return Err(CommandError::OutOfRange("Resource type must be 1-6.".into()));
            }
            if v[1] <= 0 {
                return Err(CommandError::OutOfRange("Amount must be positive.".into()));
            }
            Ok(Command::Convert {
                resource: v[0] as usize,
                amount: v[1],
            })
        }
        "doc" => no_args(Command::Dock),
        "sco" => no_args(Command::Scoop),
        "har" => no_args(Command::Harvest),
        "sta" => no_args(Command::Status),
        "dam" => no_args(Command::Damage),
        "apr" => {
            if rest.len() != 2 {
                return Err(CommandError::Usage("apr ID DIST"));
            }
            let target = rest[0].parse::<u32>().map_err(|_| CommandError::Usage("apr ID DIST"))?;
            let distance = rest[1].parse::<f64>().map_err(|_| CommandError::Usage("apr ID DIST"))?;
            if !(distance >= 0.0 && distance.is_finite()) {
                return Err(CommandError::OutOfRange("Approach distance cannot be negative.".into()));
            }
            Ok(Command::Approach { target, distance })
        }
        "cal" => Ok(Command::Calculate(quadrant_arg(rest, "cal QX QY QZ")?)),
        "who" => no_args(Command::Who),
        "clo" => no_args(Command::Cloak),
        "xxx" => no_args(Command::SelfDestruct),
        _ => Err(CommandError::Unknown),
    }
}

fn gate(command: &Command) -> Option<System> {
    match command {
        Command::Navigate { .. } | Command::Approach { .. } => Some(System::Warp),
        Command::Impulse { .. } => Some(System::Impulse),
        Command::ShortRangeScan | Command::LongRangeScan => Some(System::Sensors),
        Command::Phasers { .. } => Some(System::Phasers),
        Command::Torpedo { .. } => Some(System::Torpedoes),
        _ => None,
    }
}

impl GameState {
    /// Parses and runs one queued command line for a captain.
    pub(crate) fn run_command(&mut self, slot: usize, line: &str) {
        match parse(line) {
            Ok(command) => self.execute(slot, command),
            Err(e) => {
                debug!("Rejected command {:?} from slot {}: {}", line, slot, e);
                self.clients.notify(slot, "COMPUTER", e.to_string());
            }
        }
    }

    pub fn execute(&mut self, slot: usize, command: Command) {
        let Some(captain) = self.clients.active(slot) else {
            return;
        };
        if let Some(system) = gate(&command) {
            if !captain.ship.is_online(system) {
                self.clients.notify(
                    slot,
                    "ENGINEERING",
                    format!("{} offline. Repairs required.", system.name()),
                );
                return;
            }
        }

        match command {
            Command::Navigate { heading, mark, warp } => {
                if let Some(c) = self.clients.active_mut(slot) {
                    c.nav = plot_course(&c.ship, heading, mark, warp);
                }
                self.clients.notify(slot, "HELMSMAN", "Course plotted. Aligning ship.");
            }
            Command::Impulse { heading, mark, speed } => {
                if let Some(c) = self.clients.active_mut(slot) {
                    c.nav = engage_impulse(&mut c.ship, heading, mark, speed);
                }
                let text = if speed > 0.0 {
                    format!("Impulse engines engaged at {:.0}%.", speed * 100.0)
                } else {
                    "Impulse engines disengaged. All stop.".to_string()
                };
                self.clients.notify(slot, "HELMSMAN", text);
            }
            Command::ShortRangeScan => {
                if let Some(report) = reports::short_range_scan(&self.galaxy, &self.clients, slot) {
                    self.clients.notify(slot, "COMPUTER", report);
                }
            }
            Command::LongRangeScan => {
                if let Some(report) = reports::long_range_scan(&self.galaxy, &self.clients, slot) {
                    self.clients.notify(slot, "SCIENCE", report);
                }
            }
            Command::Phasers { energy } => self.fire_phasers(slot, energy),
            Command::Torpedo { aim } => self.fire_torpedo(slot, aim),
            Command::Shields(values) => self.set_shields(slot, values),
            Command::Lock(id) => self.lock_on(slot, id),
            Command::Power(power) => {
                if let Some(c) = self.clients.active_mut(slot) {
                    c.ship.power = power;
                }
                self.clients.notify(
                    slot,
                    "ENGINEERING",
                    format!(
                        "Power set. Engines {:.0}% Shields {:.0}% Weapons {:.0}%",
                        power[0] * 100.0,
                        power[1] * 100.0,
                        power[2] * 100.0
                    ),
                );
            }
            Command::PsychologicalWarfare => self.corbomite_bluff(slot),
            Command::Jettison => self.jettison_core(slot),
            Command::Probe(quadrant) => self.launch_probe(slot, quadrant),
            Command::Computer => {
                let report = reports::central_computer(self.hostiles_remaining(), self.galaxy.base_count());
                self.clients.notify(slot, "COMPUTER", report);
            }
            Command::Board => self.board(slot),
            Command::Mine => self.mine(slot),
            Command::Repair(system) => self.repair(slot, system),
            Command::Inventory => {
                if let Some(c) = self.clients.active(slot) {
                    let text = reports::inventory(c);
                    self.clients.notify(slot, "LOGISTICS", text);
                }
            }
            Command::Convert { resource, amount } => self.convert(slot, resource, amount),
            Command::Dock => self.dock(slot),
            Command::Scoop => self.scoop(slot),
            Command::Harvest => self.harvest(slot),
            Command::Status => {
                if let Some(c) = self.clients.active(slot) {
                    let text = reports::status(c);
                    self.clients.notify(slot, "COMPUTER", text);
                }
            }
            Command::Damage => {
                if let Some(c) = self.clients.active(slot) {
                    let text = reports::damage_report(c);
                    self.clients.notify(slot, "ENGINEERING", text);
                }
            }
            Command::Approach { target, distance } => self.approach(slot, target, distance),
            Command::Calculate(quadrant) => {
                if let Some(c) = self.clients.active(slot) {
                    let text = reports::course_to(c.ship.quadrant, quadrant);
                    self.clients.notify(slot, "COMPUTER", text);
                }
            }
            Command::Who => {
                let text = reports::who(&self.clients, slot);
                self.clients.notify(slot, "COMPUTER", text);
            }
            Command::Cloak => {
                let mut cloaked = false;
                if let Some(c) = self.clients.active_mut(slot) {
                    c.ship.cloaked = !c.ship.cloaked;
                    cloaked = c.ship.cloaked;
                }
                let text = if cloaked { "Cloak active." } else { "Cloak offline." };
                self.clients.notify(slot, "ENGINEERING", text);
            }
            Command::SelfDestruct => self.self_destruct(slot),
        }
    }

    /// The captain's lock-on target if it is still in their quadrant.
    fn locked_target(&self, slot: usize) -> Option<(EntityRef, Vector3)> {
        let ship = &self.clients.active(slot)?.ship;
        let entity = EntityRef::from_id(ship.lock_target)?;
        if entity == EntityRef::Player(slot) {
            return None;
        }
        let (quadrant, position) = self.locate(entity)?;
        (quadrant == ship.quadrant).then_some((entity, position))
    }

    fn fire_phasers(&mut self, slot: usize, energy: i32) {
        let Some(captain) = self.clients.active(slot) else {
            return;
        };
        let ship = &captain.ship;
        if ship.energy < energy {
            self.clients.notify(slot, "TACTICAL", "Insufficient energy for phaser fire.");
            return;
        }

        let (quadrant, origin) = (ship.quadrant, ship.sector);
        let locked = self
            .locked_target(slot)
            .filter(|(_, p)| p.distance(&origin) <= PHASER_RANGE);
        let (target, aim) = match locked {
            Some((entity, position)) => (Some(entity), position),
            None => (
                None,
                origin.add(&direction(ship.heading, ship.mark).scale(PHASER_MANUAL_REACH)),
            ),
        };
        let hit = ship_phaser_damage(ship, energy, aim.distance(&origin));

        if let Some(c) = self.clients.active_mut(slot) {
            c.ship.energy -= energy;
        }
        self.add_beam(quadrant, origin, aim);
        self.clients.notify(slot, "TACTICAL", "Phasers fired.");

        match target {
            Some(EntityRef::Player(victim)) => {
                let Some(c) = self.clients.active_mut(victim) else {
                    return;
                };
                let report = apply_ship_damage(&mut c.ship, hit, &mut self.rng);
                let name = c.name.clone();
                self.clients.notify(victim, "BRIDGE", "Under phaser fire!");
                if report.damaged_system.is_some() {
                    self.clients
                        .notify(victim, "DAMAGE CONTROL", "Direct hit! System damage reported.");
                }
                if report.destroyed {
                    let attacker = self.clients.active(slot).map(|c| c.name.clone()).unwrap_or_default();
                    self.destroy_captain(
                        victim,
                        "Ship destroyed by phaser fire",
                        format!("Vessel {} was destroyed by {}.", name, attacker),
                    );
                }
            }
            Some(EntityRef::Npc(index)) => {
                let Some(hostile) = self.galaxy.hostiles.get_mut(index) else {
                    return;
                };
                hostile.energy -= hit;
                let (energy, position, species) = (hostile.energy, hostile.position, hostile.species);
                if energy <= 0 {
                    self.latch_explosion(quadrant, position);
                    self.destroy_hostile(index);
                    self.clients.notify(
                        slot,
                        "TACTICAL",
                        format!(
                            "{} vessel destroyed at [{:.1}, {:.1}, {:.1}].",
                            species.name(),
                            position.x,
                            position.y,
                            position.z
                        ),
                    );
                }
            }
            _ => {}
        }
    }

    fn fire_torpedo(&mut self, slot: usize, aim: Option<(f64, f64)>) {
        let Some(captain) = self.clients.active(slot) else {
            return;
        };
        if captain.torpedo.is_some() {
            self.clients.notify(slot, "TACTICAL", "Torpedo tube not ready. Torpedo already in flight.");
            return;
        }
        if captain.ship.torpedoes <= 0 {
            self.clients.notify(slot, "TACTICAL", "Torpedo magazine empty.");
            return;
        }

        let origin = captain.ship.sector;
        let (heading, mark, text) = match (self.locked_target(slot), aim) {
            (Some((_, position)), _) => {
                let (h, m) = heading_mark(position.sub(&origin));
                (h, m, "Torpedo away (Lock-on).")
            }
            (None, Some((h, m))) => (h, m, "Torpedo away (Manual)."),
            (None, None) => {
                self.clients
                    .notify(slot, "TACTICAL", "No lock-on. Specify heading and mark: tor H M");
                return;
            }
        };

        if let Some(c) = self.clients.active_mut(slot) {
            c.ship.torpedoes -= 1;
            c.torpedo = Some(Torpedo::launch(c.ship.quadrant, origin, heading, mark));
        }
        self.clients.notify(slot, "TACTICAL", text);
    }

    /// Raising shields draws from the energy pool; lowering them returns it.
    fn set_shields(&mut self, slot: usize, values: [i32; SHIELD_FACINGS]) {
        let Some(c) = self.clients.active_mut(slot) else {
            return;
        };
        let requested: i64 = values.iter().map(|v| i64::from(*v)).sum();
        let current: i64 = c.ship.shields.iter().map(|v| i64::from(*v)).sum();
        let delta = requested - current;
        if delta > i64::from(c.ship.energy) {
            self.clients
                .notify(slot, "ENGINEERING", "Insufficient energy for shield configuration.");
            return;
        }
        c.ship.shields = values;
        let energy = (i64::from(c.ship.energy) - delta).min(i64::from(MAX_ENERGY));
        c.ship.energy = i32::try_from(energy).unwrap_or(MAX_ENERGY);
        self.clients.notify(slot, "ENGINEERING", "Shields updated (6-axis).");
    }

    fn lock_on(&mut self, slot: usize, id: u32) {
        if id == 0 {
            if let Some(c) = self.clients.active_mut(slot) {
                c.ship.lock_target = 0;
            }
            self.clients.notify(slot, "TACTICAL", "Lock released.");
            return;
        }

        let Some(quadrant) = self.clients.active(slot).map(|c| c.ship.quadrant) else {
            return;
        };
        let text = match EntityRef::from_id(id) {
            Some(EntityRef::Player(other)) if other == slot => "Cannot lock onto own vessel.",
            Some(entity) => match self.locate(entity) {
                Some((q, _)) if q == quadrant => {
                    if let Some(c) = self.clients.active_mut(slot) {
                        c.ship.lock_target = id;
                    }
                    "Target locked."
                }
                Some(_) => "Target not in this quadrant.",
                None => "Target ID not found.",
            },
            None => "Target ID not found.",
        };
        self.clients.notify(slot, "TACTICAL", text);
    }

    fn corbomite_bluff(&mut self, slot: usize) {
        let Some(captain) = self.clients.active(slot) else {
            return;
        };
        let (name, faction, quadrant) = (captain.name.clone(), captain.faction, captain.ship.quadrant);
        let hostiles: Vec<usize> = self.galaxy.hostiles_in(quadrant).map(|(i, _)| i).collect();
        if hostiles.is_empty() {
            self.clients
                .notify(slot, "COMMUNICATIONS", "No hostile vessels in range to bluff.");
            return;
        }

        if self.rng.gen_range(0..100) > 60 {
            for index in hostiles {
                if let Some(h) = self.galaxy.hostiles.get(index) {
                    let dismantle = NetDismantle {
                        position: h.position.to_net(),
                        kind: ObjectKind::Hostile(h.species),
                    };
                    self.latch_dismantle(quadrant, dismantle, None);
                }
                self.destroy_hostile(index);
            }
            info!("Captain {} bluffed the hostiles in {} into surrender", name, quadrant);
            self.clients.notify(
                slot,
                "COMMUNICATIONS",
                "Enemy vessel has surrendered after Corbomite bluff.",
            );
        } else {
            self.clients.broadcast(Packet::Message {
                from: name,
                faction: faction.code(),
                scope: MessageScope::Global,
                target_id: 0,
                text: "Corbomite device armed. Surrender now!".to_string(),
            });
            self.clients
                .notify(slot, "COMMUNICATIONS", "Bluff failed. Enemies remain hostile.");
        }
    }

    fn jettison_core(&mut self, slot: usize) {
        let Some(captain) = self.clients.active(slot) else {
            return;
        };
        let (name, quadrant, position) = (captain.name.clone(), captain.ship.quadrant, captain.ship.sector);
        self.clients.notify(
            slot,
            "ENGINEERING",
            "WARP CORE JETTISONED! Mass energy release!",
        );

        let caught: Vec<usize> = self
            .galaxy
            .hostiles_in(quadrant)
            .filter(|(_, h)| h.position.distance(&position) < JETTISON_RADIUS)
            .map(|(i, _)| i)
            .collect();
        for index in caught {
            let destroyed = match self.galaxy.hostiles.get_mut(index) {
                Some(h) => {
                    h.energy -= JETTISON_DAMAGE;
                    h.energy <= 0
                }
                None => false,
            };
            if destroyed {
                self.destroy_hostile(index);
            }
        }

        self.latch_explosion(quadrant, position);
        self.destroy_captain(
            slot,
            "Warp core jettisoned",
            format!("Vessel {} was lost in a warp core breach.", name),
        );
    }

    fn launch_probe(&mut self, slot: usize, quadrant: Quadrant) {
        let Some(c) = self.clients.active_mut(slot) else {
            return;
        };
        if c.ship.energy < PROBE_COST {
            self.clients
                .notify(slot, "SCIENCE", "Insufficient energy to launch a probe.");
            return;
        }
        c.ship.energy -= PROBE_COST;
        let counts = self.galaxy.quadrant_counts(quadrant);
        self.clients
            .notify(slot, "SCIENCE", reports::probe_report(quadrant, &counts));
    }

    fn board(&mut self, slot: usize) {
        let Some(captain) = self.clients.active(slot) else {
            return;
        };
        let (lock, origin, quadrant) = (captain.ship.lock_target, captain.ship.sector, captain.ship.quadrant);
        if lock == 0 {
            self.clients.notify(slot, "COMPUTER", "No lock-on for boarding.");
            return;
        }
        if captain.ship.health(System::Transporters) < TRANSPORTER_MIN_HEALTH {
            self.clients
                .notify(slot, "COMPUTER", "Transporters offline or damaged.");
            return;
        }
        let Some((EntityRef::Npc(index), position)) = self.locked_target(slot) else {
            self.clients
                .notify(slot, "COMPUTER", "Boarding requires a hostile vessel lock-on.");
            return;
        };
        if position.distance(&origin) >= BOARDING_RANGE {
            self.clients
                .notify(slot, "COMPUTER", "Target too far for transporters.");
            return;
        }

        if self.rng.gen_range(0..100) > 40 {
            let species = self.galaxy.hostiles.get(index).map(|h| h.species);
            if let Some(c) = self.clients.active_mut(slot) {
                c.ship.add_energy(1000);
                c.ship.inventory[1] += 100;
            }
            if let Some(species) = species {
                let dismantle = NetDismantle {
                    position: position.to_net(),
                    kind: ObjectKind::Hostile(species),
                };
                self.latch_dismantle(quadrant, dismantle, None);
            }
            self.destroy_hostile(index);
            self.clients
                .notify(slot, "SECURITY", "Boarding successful! Enemy vessel captured.");
        } else {
            self.clients
                .notify(slot, "SECURITY", "Boarding party repelled. Heavy casualties.");
        }
    }

    fn mine(&mut self, slot: usize) {
        let Some(c) = self.clients.active_mut(slot) else {
            return;
        };
        let planet = self
            .galaxy
            .planets
            .iter_mut()
            .filter(|p| p.active && p.quadrant == c.ship.quadrant)
            .find(|p| p.position.distance(&c.ship.sector) < INTERACTION_RANGE);

        let text = match planet {
            None => {
                self.clients.notify(slot, "COMPUTER", "No planet in range.");
                return;
            }
            Some(p) if p.amount <= 0 => "Planetary deposits exhausted.".to_string(),
            Some(p) => {
                let extracted = p.amount.min(MINING_YIELD);
                p.amount -= extracted;
                c.ship.inventory[p.resource as usize] += extracted;
                format!(
                    "Mining successful. {} units of {} extracted.",
                    extracted, RESOURCE_NAMES[p.resource as usize]
                )
            }
        };
        self.clients.notify(slot, "GEOLOGY", text);
    }

    fn repair(&mut self, slot: usize, system: System) {
        let Some(c) = self.clients.active_mut(slot) else {
            return;
        };
        let (mineral, cost, shortfall) = if system.is_structural() {
            (4, STRUCTURAL_REPAIR_COST, "Insufficient Monotanium for structural repairs.")
        } else {
            (5, ELECTRONIC_REPAIR_COST, "Insufficient Isolinear Crystals for electronic repairs.")
        };
        if c.ship.inventory[mineral] < cost {
            self.clients.notify(slot, "ENGINEERING", shortfall);
            return;
        }
        c.ship.inventory[mineral] -= cost;
        c.ship.repair_system(system, 100.0);
        self.clients
            .notify(slot, "ENGINEERING", "Repairs complete using onboard resources.");
    }

    fn convert(&mut self, slot: usize, resource: usize, amount: i32) {
        let Some(c) = self.clients.active_mut(slot) else {
            return;
        };
        let name = RESOURCE_NAMES[resource];
        if resource == 4 || resource == 5 {
            self.clients.notify(
                slot,
                "ENGINEERING",
                format!("{} is reserved for repairs.", name),
            );
            return;
        }
        if c.ship.inventory[resource] < amount {
            self.clients
                .notify(slot, "ENGINEERING", format!("Insufficient {} in cargo hold.", name));
            return;
        }

        c.ship.inventory[resource] -= amount;
        match resource {
            1 => c.ship.add_energy(amount.saturating_mul(10)),
            2 => c.ship.add_energy(amount.saturating_mul(2)),
            3 => c.ship.torpedoes = (c.ship.torpedoes + amount / 20).min(MAX_TORPEDOES),
            _ => c.ship.add_energy(amount.saturating_mul(5)),
        }
        self.clients
            .notify(slot, "ENGINEERING", "Resource conversion complete.");
    }

    /// Whether a body of the given kind lies within interaction range.
    fn nearby(&self, slot: usize, kind: ObjectKind) -> bool {
        let Some(c) = self.clients.active(slot) else {
            return false;
        };
        let (q, here) = (c.ship.quadrant, c.ship.sector);
        let close = |p: &Vector3| p.distance(&here) < INTERACTION_RANGE;
        match kind {
            ObjectKind::Starbase => self.galaxy.bases_in(q).any(|(_, b)| close(&b.position)),
            ObjectKind::Star => self.galaxy.stars_in(q).any(|(_, s)| close(&s.position)),
            ObjectKind::BlackHole => self.galaxy.black_holes_in(q).any(|(_, b)| close(&b.position)),
            _ => false,
        }
    }

    fn dock(&mut self, slot: usize) {
        if !self.nearby(slot, ObjectKind::Starbase) {
            self.clients.notify(slot, "COMPUTER", "No starbase in range.");
            return;
        }
        if let Some(c) = self.clients.active_mut(slot) {
            c.ship.energy = START_ENERGY;
            c.ship.torpedoes = START_TORPEDOES;
            for system in System::ALL {
                c.ship.repair_system(system, 100.0);
            }
            c.ship.shields = [0; SHIELD_FACINGS];
        }
        self.clients.notify(
            slot,
            "STARBASE",
            "Docking complete. Systems restored. Shields lowered.",
        );
    }

    fn stress_random_facing(&mut self, slot: usize, amount: i32) {
        let facing = self.rng.gen_range(0..SHIELD_FACINGS);
        if let Some(c) = self.clients.active_mut(slot) {
            c.ship.shields[facing] = (c.ship.shields[facing] - amount).max(0);
        }
    }

    fn scoop(&mut self, slot: usize) {
        if !self.nearby(slot, ObjectKind::Star) {
            self.clients
                .notify(slot, "COMPUTER", "No star in range for solar scooping.");
            return;
        }
        if let Some(c) = self.clients.active_mut(slot) {
            c.ship.add_energy(SCOOP_ENERGY);
        }
        self.stress_random_facing(slot, SCOOP_SHIELD_STRESS);
        self.clients.notify(
            slot,
            "ENGINEERING",
            "Solar scooping successful. Energy harvested, thermal stress on shields.",
        );
    }

    fn harvest(&mut self, slot: usize) {
        if !self.nearby(slot, ObjectKind::BlackHole) {
            self.clients.notify(slot, "COMPUTER", "No black hole in range.");
            return;
        }
        if let Some(c) = self.clients.active_mut(slot) {
            c.ship.inventory[1] += HARVEST_DILITHIUM;
        }
        self.stress_random_facing(slot, HARVEST_SHIELD_STRESS);
        self.clients.notify(
            slot,
            "ENGINEERING",
            "Antimatter harvest successful. High gravitational stress recorded.",
        );
    }

    fn approach(&mut self, slot: usize, target: u32, distance: f64) {
        let destination = EntityRef::from_id(target)
            .filter(|e| *e != EntityRef::Player(slot))
            .and_then(|e| self.locate(e))
            .map(|(q, p)| to_galactic(q, p));
        let Some(destination) = destination else {
            self.clients.notify(slot, "COMPUTER", "Target ID not found.");
            return;
        };

        let Some(c) = self.clients.active_mut(slot) else {
            return;
        };
        match plot_approach(&c.ship, destination, distance) {
            Some(course) => {
                c.nav = course;
                self.clients
                    .notify(slot, "HELMSMAN", "Autopilot engaged. Approaching target.");
            }
            None => self
                .clients
                .notify(slot, "COMPUTER", "Already at or within target distance."),
        }
    }

    fn self_destruct(&mut self, slot: usize) {
        let Some(captain) = self.clients.active(slot) else {
            return;
        };
        let (name, quadrant, position) = (captain.name.clone(), captain.ship.quadrant, captain.ship.sector);
        self.clients.notify(
            slot,
            "SERVER",
            "Self-destruct sequence initiated. Goodbye, Captain.",
        );
        let dismantle = NetDismantle {
            position: position.to_net(),
            kind: ObjectKind::Player,
        };
        self.latch_dismantle(quadrant, dismantle, Some(slot));
        self.destroy_captain(
            slot,
            "Self-destruct",
            format!("Massive explosion detected: Vessel {} has self-destructed.", name),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client_manager::Outgoing;
    use crate::config::ServerConfig;
    use crate::galaxy::{BlackHole, Galaxy, Hostile, Planet, Star, Starbase, STARBASE_HEALTH};
    use crate::ship::ShipState;
    use assert_approx_eq::assert_approx_eq;
    use shared::{Faction, ShipClass, Species};

    const Q: Quadrant = Quadrant::new(3, 3, 3);
    const HERE: Vector3 = Vector3::new(5.0, 5.0, 5.0);

    /// One captain on conn 1, parked at the centre of `Q`.
    fn bridge(galaxy: Galaxy) -> (GameState, usize) {
        let config = ServerConfig {
            seed: Some(2024),
            ..Default::default()
        };
        let mut state = GameState::new(galaxy, &config);
        state.login(1, "Janeway", Faction::Federation, ShipClass::Intrepid);
        let slot = state.clients.slot_for_connection(1).unwrap();
        let c = state.clients.active_mut(slot).unwrap();
        c.ship.quadrant = Q;
        c.ship.sector = HERE;
        state.drain_outbox();
        (state, slot)
    }

    fn ship(state: &GameState, slot: usize) -> &ShipState {
        &state.clients.active(slot).unwrap().ship
    }

    fn ship_mut(state: &mut GameState, slot: usize) -> &mut ShipState {
        &mut state.clients.active_mut(slot).unwrap().ship
    }

    fn texts_for(outbox: &[Outgoing], conn: u64) -> Vec<String> {
        outbox
            .iter()
            .filter_map(|o| match o {
                Outgoing::Packet {
                    conn: c,
                    packet: Packet::Message { text, .. },
                } if *c == conn => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    fn run(state: &mut GameState, slot: usize, line: &str) -> Vec<String> {
        state.run_command(slot, line);
        texts_for(&state.drain_outbox(), 1)
    }

    fn hostile_at(quadrant: Quadrant, position: Vector3, energy: i32) -> Hostile {
        let mut hostile = Hostile::new(quadrant, position, Species::Romulan);
        hostile.energy = energy;
        hostile
    }

    #[test]
    fn test_parse_navigation() {
        assert_eq!(
            parse("nav 90 0 1.5"),
            Ok(Command::Navigate {
                heading: 90.0,
                mark: 0.0,
                warp: 1.5
            })
        );
        assert_eq!(parse("nav 90 0"), Err(CommandError::Usage("nav H M W")));
        assert!(matches!(parse("nav 360 0 1"), Err(CommandError::OutOfRange(_))));
        assert!(matches!(parse("nav 10 95 1"), Err(CommandError::OutOfRange(_))));
        assert!(matches!(parse("nav 10 0 0"), Err(CommandError::OutOfRange(_))));
        assert!(matches!(parse("imp 0 0 1.5"), Err(CommandError::OutOfRange(_))));
        assert!(matches!(parse("imp 0 0 0"), Ok(Command::Impulse { .. })));
    }

    #[test]
    fn test_parse_weapons() {
        assert_eq!(parse("pha 500"), Ok(Command::Phasers { energy: 500 }));
        assert!(parse("pha -5").is_err());
        assert_eq!(parse("tor"), Ok(Command::Torpedo { aim: None }));
        assert_eq!(
            parse("tor 45 10"),
            Ok(Command::Torpedo {
                aim: Some((45.0, 10.0))
            })
        );
        assert_eq!(
            parse("she 100 100 50 50 0 0"),
            Ok(Command::Shields([100, 100, 50, 50, 0, 0]))
        );
        assert!(parse("she 1 2 3").is_err());
    }

    #[test]
    fn test_parse_lock() {
        assert_eq!(parse("lock"), Ok(Command::Lock(0)));
        assert_eq!(parse("lock 0"), Ok(Command::Lock(0)));
        assert_eq!(parse("lock 104"), Ok(Command::Lock(104)));
        assert_eq!(parse("lock abc"), Err(CommandError::Usage("lock [ID]")));
    }

    #[test]
    fn test_parse_power_normalizes() {
        match parse("pow 1 1 2") {
            Ok(Command::Power(p)) => assert_eq!(p, [0.25, 0.25, 0.5]),
            other => panic!("Unexpected parse result: {:?}", other),
        }
        assert!(parse("pow 0 0 0").is_err());
        assert!(parse("pow -1 1 1").is_err());
    }

    #[test]
    fn test_parse_auxiliary() {
        assert_eq!(parse("aux jettison"), Ok(Command::Jettison));
        assert_eq!(parse("aux computer"), Ok(Command::Computer));
        assert_eq!(
            parse("aux probe 1 2 3"),
            Ok(Command::Probe(Quadrant::new(1, 2, 3)))
        );
        assert_eq!(
            parse("aux probe 0 2 3"),
            Err(CommandError::OutOfRange("Invalid quadrant coordinates.".into()))
        );
        assert!(parse("aux warp").is_err());
    }

    #[test]
    fn test_parse_logistics() {
        assert_eq!(parse("rep 3"), Ok(Command::Repair(System::Transporters)));
        assert!(parse("rep 8").is_err());
        assert_eq!(
            parse("con 1 50"),
            Ok(Command::Convert {
                resource: 1,
                amount: 50
            })
        );
        assert!(parse("con 7 50").is_err());
        assert_eq!(
            parse("apr 500 2.5"),
            Ok(Command::Approach {
                target: 500,
                distance: 2.5
            })
        );
        assert_eq!(parse("cal 7 5 5"), Ok(Command::Calculate(Quadrant::new(7, 5, 5))));
    }

    #[test]
    fn test_unknown_commands() {
        assert_eq!(parse("warp 9"), Err(CommandError::Unknown));
        assert_eq!(parse("SRS"), Err(CommandError::Unknown));
        assert_eq!(parse(""), Err(CommandError::Unknown));
        assert_eq!(parse("srs now"), Err(CommandError::Unknown));
        assert_eq!(
            CommandError::Unknown.to_string(),
            "Command unknown or pending implementation."
        );
    }

    #[test]
    fn test_shield_values_beyond_energy_bound_are_refused() {
        assert!(matches!(
            parse("she 2147483647 2147483647 0 0 0 0"),
            Err(CommandError::OutOfRange(_))
        ));
        assert!(parse("she 5000 5000 5000 5000 5000 5000").is_ok());

        let (mut state, slot) = bridge(Galaxy::default());
        let texts = run(&mut state, slot, "she 2147483647 2147483647 0 0 0 0");
        assert_eq!(texts, vec!["Shield values cannot exceed 5000 per facing."]);
        assert_eq!(ship(&state, slot).shields, [0; 6]);
        assert_eq!(ship(&state, slot).energy, START_ENERGY);

        // Sums that do not fit in an i32 are still just unaffordable
        state.execute(slot, Command::Shields([i32::MAX, i32::MAX, 0, 0, 0, 0]));
        let texts = texts_for(&state.drain_outbox(), 1);
        assert_eq!(texts, vec!["Insufficient energy for shield configuration."]);
        assert_eq!(ship(&state, slot).shields, [0; 6]);
        assert_eq!(ship(&state, slot).energy, START_ENERGY);
    }

    #[test]
    fn test_shield_energy_accounting() {
        let (mut state, slot) = bridge(Galaxy::default());

        assert_eq!(run(&mut state, slot, "she 500 500 250 250 0 0"), vec!["Shields updated (6-axis)."]);
        assert_eq!(ship(&state, slot).shields, [500, 500, 250, 250, 0, 0]);
        assert_eq!(ship(&state, slot).energy, 1500);

        run(&mut state, slot, "she 0 0 0 0 0 0");
        assert_eq!(ship(&state, slot).energy, 3000);

        let texts = run(&mut state, slot, "she 1000 1000 1000 1000 0 0");
        assert_eq!(texts, vec!["Insufficient energy for shield configuration."]);
        assert_eq!(ship(&state, slot).shields, [0; 6]);
    }

    #[test]
    fn test_power_shares_survive_huge_inputs() {
        match parse("pow 3e38 3e38 3e38") {
            Ok(Command::Power(p)) => {
                let total: f32 = p.iter().sum();
                assert_approx_eq!(total as f64, 1.0, 1e-6);
                assert_approx_eq!(p[2] as f64, 1.0 / 3.0, 1e-6);
            }
            other => panic!("Unexpected parse result: {:?}", other),
        }
        assert!(parse("pow inf 1 1").is_err());
        assert!(parse("pow NaN 1 1").is_err());

        let (mut state, slot) = bridge(Galaxy::default());
        run(&mut state, slot, "pow 1e300 1e300 2e300");
        let power = ship(&state, slot).power;
        assert_approx_eq!(power[0] as f64, 0.25, 1e-6);
        assert_approx_eq!(power[2] as f64, 0.5, 1e-6);
    }

    #[test]
    fn test_offline_system_blocks_command() {
        let (mut state, slot) = bridge(Galaxy::default());
        ship_mut(&mut state, slot).damage_system(System::Warp, 95.0);
        ship_mut(&mut state, slot).damage_system(System::Phasers, 92.0);

        assert_eq!(run(&mut state, slot, "nav 90 0 1"), vec!["Warp offline. Repairs required."]);
        assert!(state.clients.active(slot).unwrap().nav.is_idle());

        assert_eq!(run(&mut state, slot, "pha 100"), vec!["Phasers offline. Repairs required."]);
        assert_eq!(ship(&state, slot).energy, START_ENERGY);

        // Ungated commands still run
        assert_eq!(run(&mut state, slot, "clo"), vec!["Cloak active."]);
    }

    #[test]
    fn test_mining_depletes_planet() {
        let mut galaxy = Galaxy::default();
        galaxy.planets.push(Planet {
            quadrant: Q,
            position: Vector3::new(6.0, 5.0, 5.0),
            resource: 2,
            amount: 150,
            active: true,
        });
        let (mut state, slot) = bridge(galaxy);

        let texts = run(&mut state, slot, "min");
        assert_eq!(texts, vec!["Mining successful. 100 units of Tritanium extracted."]);
        assert_eq!(ship(&state, slot).inventory[2], 100);
        assert_eq!(state.galaxy.planets[0].amount, 50);

        run(&mut state, slot, "min");
        assert_eq!(ship(&state, slot).inventory[2], 150);
        assert_eq!(state.galaxy.planets[0].amount, 0);

        assert_eq!(run(&mut state, slot, "min"), vec!["Planetary deposits exhausted."]);
        assert_eq!(ship(&state, slot).inventory[2], 150);

        ship_mut(&mut state, slot).sector = Vector3::new(9.0, 9.0, 9.0);
        assert_eq!(run(&mut state, slot, "min"), vec!["No planet in range."]);
    }

    #[test]
    fn test_resource_conversion_rates() {
        let (mut state, slot) = bridge(Galaxy::default());
        {
            let ship = ship_mut(&mut state, slot);
            ship.energy = 1000;
            ship.inventory = [0, 10, 10, 60, 100, 100, 10];
        }

        run(&mut state, slot, "con 1 10");
        assert_eq!(ship(&state, slot).energy, 1100);
        run(&mut state, slot, "con 2 10");
        assert_eq!(ship(&state, slot).energy, 1120);
        run(&mut state, slot, "con 6 10");
        assert_eq!(ship(&state, slot).energy, 1170);
        run(&mut state, slot, "con 3 60");
        assert_eq!(ship(&state, slot).torpedoes, START_TORPEDOES + 3);
        assert_eq!(ship(&state, slot).inventory, [0, 0, 0, 0, 100, 100, 0]);

        assert_eq!(run(&mut state, slot, "con 4 10"), vec!["Monotanium is reserved for repairs."]);
        assert_eq!(run(&mut state, slot, "con 5 10"), vec!["Isolinear is reserved for repairs."]);
        assert_eq!(ship(&state, slot).inventory[4], 100);

        assert_eq!(run(&mut state, slot, "con 1 5"), vec!["Insufficient Dilithium in cargo hold."]);
        assert_eq!(ship(&state, slot).energy, 1170);

        {
            let ship = ship_mut(&mut state, slot);
            ship.torpedoes = 19;
            ship.inventory[3] = 100;
        }
        run(&mut state, slot, "con 3 100");
        assert_eq!(ship(&state, slot).torpedoes, MAX_TORPEDOES);
    }

    #[test]
    fn test_repairs_consume_materials() {
        let (mut state, slot) = bridge(Galaxy::default());
        {
            let ship = ship_mut(&mut state, slot);
            ship.damage_system(System::Warp, 60.0);
            ship.damage_system(System::Sensors, 60.0);
            ship.inventory[4] = 50;
            ship.inventory[5] = 40;
        }

        assert_eq!(run(&mut state, slot, "rep 0"), vec!["Repairs complete using onboard resources."]);
        assert_approx_eq!(ship(&state, slot).health(System::Warp) as f64, 100.0, 1e-6);
        assert_eq!(ship(&state, slot).inventory[4], 0);

        run(&mut state, slot, "rep 2");
        assert_approx_eq!(ship(&state, slot).health(System::Sensors) as f64, 100.0, 1e-6);
        assert_eq!(ship(&state, slot).inventory[5], 10);

        ship_mut(&mut state, slot).damage_system(System::Torpedoes, 30.0);
        assert_eq!(
            run(&mut state, slot, "rep 5"),
            vec!["Insufficient Monotanium for structural repairs."]
        );
        assert_eq!(
            run(&mut state, slot, "rep 6"),
            vec!["Insufficient Isolinear Crystals for electronic repairs."]
        );
        assert_approx_eq!(ship(&state, slot).health(System::Torpedoes) as f64, 70.0, 1e-6);
    }

    #[test]
    fn test_docking_restores_ship() {
        let mut galaxy = Galaxy::default();
        galaxy.bases.push(Starbase {
            quadrant: Q,
            position: Vector3::new(6.0, 5.0, 5.0),
            health: STARBASE_HEALTH,
            active: true,
        });
        let (mut state, slot) = bridge(galaxy);
        {
            let ship = ship_mut(&mut state, slot);
            ship.energy = 100;
            ship.torpedoes = 2;
            ship.shields = [50; 6];
            ship.damage_system(System::Computer, 80.0);
        }

        run(&mut state, slot, "doc");
        let docked = ship(&state, slot);
        assert_eq!(docked.energy, START_ENERGY);
        assert_eq!(docked.torpedoes, START_TORPEDOES);
        assert_eq!(docked.shields, [0; 6]);
        assert_approx_eq!(docked.health(System::Computer) as f64, 100.0, 1e-6);

        ship_mut(&mut state, slot).sector = Vector3::new(1.0, 1.0, 1.0);
        assert_eq!(run(&mut state, slot, "doc"), vec!["No starbase in range."]);
    }

    #[test]
    fn test_scooping_and_harvesting_stress_shields() {
        let mut galaxy = Galaxy::default();
        galaxy.stars.push(Star {
            quadrant: Q,
            position: Vector3::new(6.5, 5.0, 5.0),
            active: true,
        });
        let (mut state, slot) = bridge(galaxy);
        {
            let ship = ship_mut(&mut state, slot);
            ship.energy = 4800;
            ship.shields = [200; 6];
        }

        run(&mut state, slot, "sco");
        assert_eq!(ship(&state, slot).energy, 5000);
        assert_eq!(ship(&state, slot).total_shields(), 1100);
        assert_eq!(run(&mut state, slot, "har"), vec!["No black hole in range."]);

        state.galaxy.stars.clear();
        state.galaxy.black_holes.push(BlackHole {
            quadrant: Q,
            position: Vector3::new(5.0, 6.5, 5.0),
            active: true,
        });
        ship_mut(&mut state, slot).shields = [200; 6];
        run(&mut state, slot, "har");
        assert_eq!(ship(&state, slot).inventory[1], 50);
        assert_eq!(ship(&state, slot).total_shields(), 1000);
        assert!(ship(&state, slot).shields.contains(&0));
        assert_eq!(
            run(&mut state, slot, "sco"),
            vec!["No star in range for solar scooping."]
        );
    }

    #[test]
    fn test_boarding_gates() {
        let mut galaxy = Galaxy::default();
        galaxy.hostiles.push(hostile_at(Q, Vector3::new(6.5, 5.0, 5.0), 1000));
        let (mut state, slot) = bridge(galaxy);

        assert_eq!(run(&mut state, slot, "bor"), vec!["No lock-on for boarding."]);

        ship_mut(&mut state, slot).lock_target = 100;
        assert_eq!(run(&mut state, slot, "bor"), vec!["Target too far for transporters."]);

        state.galaxy.hostiles[0].position = Vector3::new(5.5, 5.0, 5.0);
        ship_mut(&mut state, slot).damage_system(System::Transporters, 60.0);
        assert_eq!(run(&mut state, slot, "bor"), vec!["Transporters offline or damaged."]);
        assert!(state.galaxy.hostiles[0].active);
    }

    #[test]
    fn test_boarding_captures_last_hostile() {
        let mut galaxy = Galaxy::default();
        galaxy.hostiles.push(hostile_at(Q, Vector3::new(5.5, 5.0, 5.0), 1000));
        let (mut state, slot) = bridge(galaxy);
        ship_mut(&mut state, slot).lock_target = 100;
        assert_eq!(state.hostiles_remaining(), 1);

        let mut attempts = 0;
        while state.galaxy.hostiles[0].active && attempts < 50 {
            state.run_command(slot, "bor");
            attempts += 1;
        }
        let texts = texts_for(&state.drain_outbox(), 1);

        assert!(!state.galaxy.hostiles[0].active);
        assert_eq!(state.hostiles_remaining(), 0);
        let captain = state.clients.active(slot).unwrap();
        assert_eq!(captain.ship.energy, START_ENERGY + 1000);
        assert_eq!(captain.ship.inventory[1], 100);
        assert_eq!(captain.ship.lock_target, 0);
        assert!(matches!(
            captain.events.dismantle,
            Some(NetDismantle {
                kind: ObjectKind::Hostile(Species::Romulan),
                ..
            })
        ));
        assert!(texts.contains(&"Boarding successful! Enemy vessel captured.".to_string()));
        assert!(texts.iter().any(|t| t.starts_with("MISSION COMPLETE")));
    }

    #[test]
    fn test_corbomite_bluff() {
        let (mut state, slot) = bridge(Galaxy::default());
        assert_eq!(
            run(&mut state, slot, "psy"),
            vec!["No hostile vessels in range to bluff."]
        );

        let mut galaxy = Galaxy::default();
        galaxy.hostiles.push(hostile_at(Q, Vector3::new(1.0, 1.0, 1.0), 1000));
        galaxy.hostiles.push(hostile_at(Q, Vector3::new(8.0, 8.0, 8.0), 1000));
        galaxy
            .hostiles
            .push(hostile_at(Quadrant::new(1, 1, 1), Vector3::new(5.0, 5.0, 5.0), 1000));
        let (mut state, slot) = bridge(galaxy);

        let mut attempts = 0;
        while state.galaxy.hostiles[0].active && attempts < 50 {
            state.run_command(slot, "psy");
            attempts += 1;
        }
        let texts = texts_for(&state.drain_outbox(), 1);

        assert!(!state.galaxy.hostiles[0].active);
        assert!(!state.galaxy.hostiles[1].active);
        assert!(state.galaxy.hostiles[2].active);
        assert_eq!(state.hostiles_remaining(), 1);
        assert!(texts.contains(&"Enemy vessel has surrendered after Corbomite bluff.".to_string()));

        let failures = texts.iter().filter(|t| *t == "Bluff failed. Enemies remain hostile.").count();
        let threats = texts
            .iter()
            .filter(|t| *t == "Corbomite device armed. Surrender now!")
            .count();
        assert_eq!(failures, attempts - 1);
        assert_eq!(threats, failures);
    }

    #[test]
    fn test_probe_costs_energy() {
        let (mut state, slot) = bridge(Galaxy::default());
        let texts = run(&mut state, slot, "aux probe 7 7 7");
        assert_eq!(texts.len(), 1);
        assert_eq!(ship(&state, slot).energy, START_ENERGY - PROBE_COST);

        ship_mut(&mut state, slot).energy = 400;
        assert_eq!(
            run(&mut state, slot, "aux probe 7 7 7"),
            vec!["Insufficient energy to launch a probe."]
        );
        assert_eq!(ship(&state, slot).energy, 400);
    }

    #[test]
    fn test_jettison_damages_nearby_hostiles_and_loses_ship() {
        let mut galaxy = Galaxy::default();
        galaxy.hostiles.push(hostile_at(Q, Vector3::new(6.0, 5.0, 5.0), 400));
        galaxy.hostiles.push(hostile_at(Q, Vector3::new(5.0, 7.0, 5.0), 1000));
        galaxy.hostiles.push(hostile_at(Q, Vector3::new(5.0, 5.0, 9.0), 1000));
        let (mut state, slot) = bridge(galaxy);

        state.run_command(slot, "aux jettison");
        let outbox = state.drain_outbox();

        assert!(!state.galaxy.hostiles[0].active);
        assert!(state.galaxy.hostiles[1].active);
        assert_eq!(state.galaxy.hostiles[1].energy, 500);
        assert_eq!(state.galaxy.hostiles[2].energy, 1000);
        assert_eq!(state.hostiles_remaining(), 2);

        assert!(state.clients.get(slot).is_none());
        assert!(outbox.contains(&Outgoing::Close { conn: 1 }));
        assert!(texts_for(&outbox, 1)
            .contains(&"Vessel Janeway was lost in a warp core breach.".to_string()));
    }

    #[test]
    fn test_self_destruct() {
        let (mut state, a) = bridge(Galaxy::default());
        state.login(2, "Chakotay", Faction::Federation, ShipClass::Akira);
        let b = state.clients.slot_for_connection(2).unwrap();
        {
            let ship = ship_mut(&mut state, b);
            ship.quadrant = Q;
            ship.sector = Vector3::new(7.0, 5.0, 5.0);
        }
        state.drain_outbox();

        state.run_command(a, "xxx");
        let outbox = state.drain_outbox();

        assert!(state.clients.get(a).is_none());
        assert_eq!(state.clients.find_by_name("Janeway"), None);
        assert!(outbox.contains(&Outgoing::Close { conn: 1 }));
        assert!(texts_for(&outbox, 2)
            .contains(&"Massive explosion detected: Vessel Janeway has self-destructed.".to_string()));

        let witness = state.clients.active(b).unwrap();
        assert!(matches!(
            witness.events.dismantle,
            Some(NetDismantle {
                kind: ObjectKind::Player,
                ..
            })
        ));
    }
}
