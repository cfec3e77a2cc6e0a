//! The tick owner. `GameState` holds the galaxy and the captain registry and
//! is the only place either is mutated.

use crate::client_manager::{ClientManager, ConnectionId, LoginError, LoginOutcome, Outgoing};
use crate::combat::apply_ship_damage;
use crate::config::ServerConfig;
use crate::constants::{
    CLOAK_DRAIN, ENERGY_REGEN, ENERGY_REGEN_CEILING, EVENT_HORIZON_RADIUS, GALAXY_QUADRANTS,
    SHIELD_REGEN_BASE, SHIELD_REGEN_CEILING, SHIELD_REGEN_MIN_ENERGY, STAR_COLLISION_ENERGY,
    STAR_COLLISION_RADIUS, SYSTEM_REPAIR_RATE, TORPEDO_DAMAGE_MAX, TORPEDO_DAMAGE_MIN,
    TORPEDO_NPC_DAMAGE, TORPEDO_NPC_RADIUS, TORPEDO_PLAYER_RADIUS, UPKEEP_INTERVAL,
};
use crate::entity::EntityRef;
use crate::galaxy::{Galaxy, PLANET_RESERVES, STARBASE_HEALTH};
use crate::navigation::advance;
use crate::physics::{Quadrant, Vector3};
use crate::ship::{ShipState, System, POWER_SHIELDS};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{
    Faction, MessageScope, NetBeam, NetDismantle, NetObject, ObjectKind, Packet, ShipClass,
    UpdateFrame, MAX_CLIENTS, MAX_NET_BEAMS, MAX_NET_OBJECTS,
};

/// Ticks between diagnostic log lines.
const DIAGNOSTIC_INTERVAL: u64 = 300;

/// What periodic upkeep did to a ship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpkeepReport {
    pub cloak_failed: bool,
}

/// Two-second housekeeping: cloak drain or energy regeneration, shield
/// recharge paid from the energy pool and slow self-repair.
pub fn upkeep(ship: &mut ShipState) -> UpkeepReport {
    let mut report = UpkeepReport::default();

    if ship.cloaked {
        if ship.energy >= CLOAK_DRAIN {
            ship.energy -= CLOAK_DRAIN;
        } else {
            ship.cloaked = false;
            report.cloak_failed = true;
        }
    } else if ship.energy < ENERGY_REGEN_CEILING {
        ship.energy += ENERGY_REGEN;
    }

    let recharge = (SHIELD_REGEN_BASE * ship.power[POWER_SHIELDS] as f64).floor() as i32;
    for facing in ship.shields.iter_mut() {
        if *facing < SHIELD_REGEN_CEILING && ship.energy > SHIELD_REGEN_MIN_ENERGY {
            *facing += recharge;
            ship.energy -= recharge / 2;
        }
    }

    for system in System::ALL {
        if ship.health(system) < 100.0 {
            ship.repair_system(system, SYSTEM_REPAIR_RATE);
        }
    }
    report
}

/// Authoritative world state advanced once per tick
pub struct GameState {
    pub galaxy: Galaxy,
    pub clients: ClientManager,
    pub tick: u64,
    pub(crate) rng: StdRng,
    /// Beams fired during the current tick, tagged with their quadrant.
    beams: Vec<(Quadrant, NetBeam)>,
    hostiles_remaining: u32,
    victory_announced: bool,
}

impl GameState {
    pub fn new(galaxy: Galaxy, config: &ServerConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let hostiles_remaining = galaxy.hostile_count();
        Self {
            galaxy,
            clients: ClientManager::new(config.max_clients, config.command_queue),
            tick: 0,
            rng,
            beams: Vec::new(),
            hostiles_remaining,
            victory_announced: hostiles_remaining == 0,
        }
    }

    /// Builds a fresh galaxy from the configured seed.
    pub fn generate(config: &ServerConfig) -> Self {
        let mut state = Self::new(Galaxy::default(), config);
        state.galaxy = Galaxy::generate(&mut state.rng);
        state.hostiles_remaining = state.galaxy.hostile_count();
        state.victory_announced = state.hostiles_remaining == 0;
        state
    }

    pub fn hostiles_remaining(&self) -> u32 {
        self.hostiles_remaining
    }

    pub fn drain_outbox(&mut self) -> Vec<Outgoing> {
        self.clients.drain_outbox()
    }

    /// Quadrant and sector of any addressable entity, captains included.
    pub fn locate(&self, entity: EntityRef) -> Option<(Quadrant, Vector3)> {
        match entity {
            EntityRef::Player(slot) => self
                .clients
                .active(slot)
                .map(|c| (c.ship.quadrant, c.ship.sector)),
            other => self.galaxy.locate(other),
        }
    }

    fn random_quadrant(&mut self) -> Quadrant {
        Quadrant::new(
            self.rng.gen_range(1..=GALAXY_QUADRANTS),
            self.rng.gen_range(1..=GALAXY_QUADRANTS),
            self.rng.gen_range(1..=GALAXY_QUADRANTS),
        )
    }

    /// Attaches a connection to a captain and sends the opening packets.
    pub fn login(&mut self, conn: ConnectionId, name: &str, faction: Faction, class: ShipClass) {
        let spawn = self.random_quadrant();
        match self.clients.login(conn, name, faction, class, spawn) {
            Ok(outcome) => {
                let slot = outcome.slot();
                self.clients.send(slot, Packet::Galaxy(self.galaxy.master_record()));
                let greeting = match outcome {
                    LoginOutcome::Created(_) => "Welcome aboard.".to_string(),
                    LoginOutcome::Resumed(_) => {
                        format!("Welcome back, Captain {}. Command resumed.", name)
                    }
                };
                self.clients.notify(slot, "SERVER", greeting);
            }
            Err(LoginError::AlreadyLoggedIn) => {
                warn!("Connection {} sent a second login", conn);
                self.clients.send_to_connection(
                    conn,
                    Packet::system_message("SERVER", "Already logged in."),
                );
            }
            Err(e) => {
                info!("Login for {} refused: {}", name, e);
                self.clients.send_to_connection(
                    conn,
                    Packet::Disconnected {
                        reason: e.to_string(),
                    },
                );
                self.clients.close_connection(conn);
            }
        }
    }

    /// Applies one decoded packet from a connection.
    pub fn handle_packet(&mut self, conn: ConnectionId, packet: Packet) {
        if let Err(e) = packet.validate() {
            warn!("Invalid packet from connection {}: {}", conn, e);
            match (&packet, self.clients.slot_for_connection(conn)) {
                (Packet::Login { .. }, None) => {
                    self.clients.send_to_connection(
                        conn,
                        Packet::Disconnected {
                            reason: format!("Login rejected: {}", e),
                        },
                    );
                    self.clients.close_connection(conn);
                }
                (_, Some(slot)) => self.clients.notify(slot, "COMPUTER", e.to_string()),
                (_, None) => {}
            }
            return;
        }

        match packet {
            Packet::Login {
                name,
                faction,
                ship_class,
            } => {
                let (Some(faction), Some(class)) =
                    (Faction::from_code(faction), ShipClass::from_code(ship_class))
                else {
                    return;
                };
                self.login(conn, name.trim(), faction, class);
            }
            Packet::Command { cmd } => {
                let Some(slot) = self.clients.slot_for_connection(conn) else {
                    debug!("Command from connection {} before login ignored", conn);
                    return;
                };
                let line = cmd.trim();
                if line.is_empty() {
                    return;
                }
                if !self.clients.queue_command(slot, line.to_string()) {
                    self.clients
                        .notify(slot, "COMPUTER", "Command queue full. Command discarded.");
                }
            }
            Packet::Message {
                scope,
                target_id,
                text,
                ..
            } => {
                let Some(slot) = self.clients.slot_for_connection(conn) else {
                    return;
                };
                if !self.clients.route_message(slot, scope, target_id, text) {
                    self.clients
                        .notify(slot, "COMMUNICATIONS", "Recipient not found.");
                }
            }
            Packet::Logout => {
                self.clients.disconnect(conn);
                self.clients.close_connection(conn);
            }
            Packet::Galaxy(_) | Packet::Update(_) | Packet::Disconnected { .. } => {
                warn!("Connection {} sent a server-only packet", conn);
            }
        }
    }

    /// A connection went away on its own. The captain stays dormant.
    pub fn disconnect(&mut self, conn: ConnectionId) {
        self.clients.disconnect(conn);
    }

    pub(crate) fn add_beam(&mut self, quadrant: Quadrant, origin: Vector3, target: Vector3) {
        self.beams.push((
            quadrant,
            NetBeam {
                origin: origin.to_net(),
                target: target.to_net(),
            },
        ));
    }

    /// Latches an explosion for every captain in the quadrant.
    pub(crate) fn latch_explosion(&mut self, quadrant: Quadrant, position: Vector3) {
        for slot in self.clients.active_slots() {
            if let Some(c) = self.clients.active_mut(slot) {
                if c.ship.quadrant == quadrant {
                    c.events.explosion = Some(position.to_net());
                }
            }
        }
    }

    pub(crate) fn latch_dismantle(
        &mut self,
        quadrant: Quadrant,
        dismantle: NetDismantle,
        except: Option<usize>,
    ) {
        for slot in self.clients.active_slots() {
            if Some(slot) == except {
                continue;
            }
            if let Some(c) = self.clients.active_mut(slot) {
                if c.ship.quadrant == quadrant {
                    c.events.dismantle = Some(dismantle);
                }
            }
        }
    }

    /// Clears every lock pointing at `id`, telling connected captains.
    fn release_locks(&mut self, id: u32) {
        for slot in 0..MAX_CLIENTS {
            let Some(c) = self.clients.get_mut(slot) else {
                continue;
            };
            if c.ship.lock_target != id {
                continue;
            }
            c.ship.lock_target = 0;
            self.clients
                .notify(slot, "TACTICAL", "Target destroyed. Lock released.");
        }
    }

    /// Takes a hostile out of play and updates victory bookkeeping.
    pub(crate) fn destroy_hostile(&mut self, index: usize) {
        let Some(hostile) = self.galaxy.hostiles.get_mut(index) else {
            return;
        };
        if !hostile.active {
            return;
        }
        hostile.active = false;
        hostile.velocity = Vector3::default();
        info!(
            "{} hostile {} destroyed in {}",
            hostile.species.name(),
            index,
            hostile.quadrant
        );

        self.release_locks(EntityRef::Npc(index).id());
        self.hostiles_remaining = self.galaxy.hostile_count();

        if self.hostiles_remaining == 0 && !self.victory_announced {
            self.victory_announced = true;
            info!("All hostiles destroyed at tick {}", self.tick);
            self.clients.broadcast(Packet::Message {
                from: "STARFLEET".to_string(),
                faction: Faction::Federation.code(),
                scope: MessageScope::Global,
                target_id: 0,
                text: "MISSION COMPLETE: All hostile entities neutralized. The galaxy is safe."
                    .to_string(),
            });
        }
    }

    /// Erases a captain whose ship was lost and tells the galaxy.
    pub(crate) fn destroy_captain(&mut self, slot: usize, reason: &str, announcement: String) {
        if self.clients.get(slot).is_none() {
            return;
        }
        self.clients.broadcast(Packet::Message {
            from: "COMMUNICATIONS".to_string(),
            faction: Faction::Federation.code(),
            scope: MessageScope::Global,
            target_id: 0,
            text: announcement,
        });
        self.release_locks(EntityRef::Player(slot).id());
        if let Some(captain) = self.clients.remove(slot, reason) {
            info!("Captain {} lost: {}", captain.name, reason);
        }
    }

    /// Advances the simulation by one tick
    ///
    /// Order within a tick: one queued command per captain, helm, hazards,
    /// upkeep, hostile AI, torpedoes, then one update per captain. Captains
    /// are visited in slot order, which decides simultaneous outcomes.
    pub fn tick(&mut self) {
        self.tick += 1;
        self.beams.clear();

        for slot in self.clients.active_slots() {
            if let Some(line) = self.clients.pop_command(slot) {
                self.run_command(slot, &line);
            }
        }

        self.update_navigation();
        self.check_hazards();

        if self.tick % UPKEEP_INTERVAL == 0 {
            self.run_upkeep();
        }

        self.update_hostiles();
        self.update_torpedoes();

        for slot in self.clients.active_slots() {
            if let Some(frame) = self.build_update(slot) {
                self.clients.send(slot, Packet::Update(Box::new(frame)));
            }
        }

        if self.tick % DIAGNOSTIC_INTERVAL == 0 {
            debug!(
                "Tick {}: {} captains, {} hostiles remaining, {} beams",
                self.tick,
                self.clients.len(),
                self.hostiles_remaining,
                self.beams.len()
            );
        }
    }

    fn update_navigation(&mut self) {
        for slot in self.clients.active_slots() {
            let Some(c) = self.clients.active_mut(slot) else {
                continue;
            };
            if let Some(event) = advance(&mut c.nav, &mut c.ship, &self.galaxy) {
                self.clients.notify(slot, event.station(), event.message());
            }
        }
    }

    fn check_hazards(&mut self) {
        for slot in self.clients.active_slots() {
            let Some(c) = self.clients.active(slot) else {
                continue;
            };
            let (quadrant, here, name) = (c.ship.quadrant, c.ship.sector, c.name.clone());

            let horizon = self
                .galaxy
                .black_holes_in(quadrant)
                .any(|(_, b)| b.position.distance(&here) < EVENT_HORIZON_RADIUS);
            if horizon {
                self.clients.notify(
                    slot,
                    "BRIDGE",
                    "EVENT HORIZON CROSSED. Structural integrity failing.",
                );
                self.destroy_captain(
                    slot,
                    "Crushed beyond the event horizon",
                    format!("Vessel {} was lost beyond an event horizon.", name),
                );
                continue;
            }

            let collision = self
                .galaxy
                .stars_in(quadrant)
                .any(|(_, s)| s.position.distance(&here) < STAR_COLLISION_RADIUS);
            if !collision {
                continue;
            }
            let mut destroyed = false;
            if let Some(c) = self.clients.active_mut(slot) {
                c.ship.shields = Default::default();
                c.ship.energy -= STAR_COLLISION_ENERGY;
                destroyed = c.ship.energy <= 0;
            }
            self.clients
                .notify(slot, "BRIDGE", "CRITICAL: Solar collision detected!");
            if destroyed {
                self.destroy_captain(
                    slot,
                    "Burned up in a stellar corona",
                    format!("Vessel {} was consumed by a star.", name),
                );
            }
        }
    }

    fn run_upkeep(&mut self) {
        for slot in self.clients.active_slots() {
            let Some(c) = self.clients.active_mut(slot) else {
                continue;
            };
            if upkeep(&mut c.ship).cloak_failed {
                self.clients
                    .notify(slot, "ENGINEERING", "Energy depleted. Cloak disengaged.");
            }
        }
    }

    fn update_torpedoes(&mut self) {
        for slot in self.clients.active_slots() {
            let Some(c) = self.clients.active_mut(slot) else {
                continue;
            };
            let Some(mut torpedo) = c.torpedo.take() else {
                continue;
            };
            if !torpedo.step() {
                continue;
            }
            let shooter = c.name.clone();

            let struck_captain = self
                .clients
                .iter_active()
                .filter(|(other, c)| *other != slot && c.ship.quadrant == torpedo.quadrant)
                .find(|(_, c)| torpedo.hits(c.ship.sector, TORPEDO_PLAYER_RADIUS))
                .map(|(other, _)| other);

            if let Some(victim) = struck_captain {
                self.torpedo_hits_captain(slot, &shooter, victim, torpedo.position, torpedo.quadrant);
                continue;
            }

            let struck_hostile = self
                .galaxy
                .hostiles_in(torpedo.quadrant)
                .find(|(_, h)| torpedo.hits(h.position, TORPEDO_NPC_RADIUS))
                .map(|(i, _)| i);

            if let Some(index) = struck_hostile {
                self.torpedo_hits_hostile(slot, index, torpedo.position, torpedo.quadrant);
                continue;
            }

            if let Some(c) = self.clients.active_mut(slot) {
                c.torpedo = Some(torpedo);
            }
        }
    }

    fn torpedo_hits_captain(
        &mut self,
        shooter_slot: usize,
        shooter: &str,
        victim: usize,
        impact: Vector3,
        quadrant: Quadrant,
    ) {
        let damage = self.rng.gen_range(TORPEDO_DAMAGE_MIN..=TORPEDO_DAMAGE_MAX);
        let Some(c) = self.clients.active_mut(victim) else {
            return;
        };
        let report = apply_ship_damage(&mut c.ship, damage, &mut self.rng);
        let name = c.name.clone();
        debug!("Torpedo from {} hit {} for {}", shooter, name, damage);

        self.latch_explosion(quadrant, impact);
        self.clients
            .notify(shooter_slot, "TACTICAL", "Impact confirmed on player vessel.");
        self.clients.notify(victim, "BRIDGE", "Hull breach! Torpedo impact.");
        if report.damaged_system.is_some() {
            self.clients
                .notify(victim, "DAMAGE CONTROL", "Direct hit! System damage reported.");
        }
        if report.destroyed {
            self.destroy_captain(
                victim,
                "Ship destroyed by torpedo",
                format!("Vessel {} was destroyed by a torpedo from {}.", name, shooter),
            );
        }
    }

    fn torpedo_hits_hostile(
        &mut self,
        shooter_slot: usize,
        index: usize,
        impact: Vector3,
        quadrant: Quadrant,
    ) {
        let Some(hostile) = self.galaxy.hostiles.get_mut(index) else {
            return;
        };
        hostile.energy -= TORPEDO_NPC_DAMAGE;
        let (energy, position, species) = (hostile.energy, hostile.position, hostile.species);

        self.latch_explosion(quadrant, impact);
        if energy <= 0 {
            self.destroy_hostile(index);
            self.clients.notify(
                shooter_slot,
                "TACTICAL",
                format!(
                    "{} vessel destroyed at [{:.1}, {:.1}, {:.1}].",
                    species.name(),
                    position.x,
                    position.y,
                    position.z
                ),
            );
        } else {
            self.clients.notify(shooter_slot, "TACTICAL", "Target hit.");
        }
    }

    /// Assembles one captain's tactical view and clears their latched events.
    fn build_update(&mut self, slot: usize) -> Option<UpdateFrame> {
        let captain = self.clients.active(slot)?;
        let ship = &captain.ship;
        let quadrant = ship.quadrant;

        let mut objects = Vec::new();
        objects.push(NetObject {
            position: ship.sector.to_net(),
            heading: ship.heading as f32,
            mark: ship.mark as f32,
            kind: ObjectKind::Player,
            ship_class: captain.ship_class.code(),
            health_pct: ship.condition_pct(),
            id: EntityRef::Player(slot).id(),
        });

        for (other, c) in self.clients.iter_active() {
            if other == slot || c.ship.quadrant != quadrant || c.ship.cloaked {
                continue;
            }
            objects.push(NetObject {
                position: c.ship.sector.to_net(),
                heading: c.ship.heading as f32,
                mark: c.ship.mark as f32,
                kind: ObjectKind::Player,
                ship_class: c.ship_class.code(),
                health_pct: c.ship.condition_pct(),
                id: EntityRef::Player(other).id(),
            });
        }

        let pct = |value: i32, full: i32| (value.max(0) * 100 / full.max(1)).min(100) as u8;
        let still = |position: Vector3, kind: ObjectKind, health_pct: u8, id: u32| NetObject {
            position: position.to_net(),
            heading: 0.0,
            mark: 0.0,
            kind,
            ship_class: 0,
            health_pct,
            id,
        };

        for (i, h) in self.galaxy.hostiles_in(quadrant) {
            objects.push(NetObject {
                position: h.position.to_net(),
                heading: h.heading as f32,
                mark: h.mark as f32,
                kind: ObjectKind::Hostile(h.species),
                ship_class: 0,
                health_pct: (h.energy.max(0) / 10).min(100) as u8,
                id: EntityRef::Npc(i).id(),
            });
        }
        for (i, b) in self.galaxy.bases_in(quadrant) {
            objects.push(still(
                b.position,
                ObjectKind::Starbase,
                pct(b.health, STARBASE_HEALTH),
                EntityRef::Base(i).id(),
            ));
        }
        for (i, p) in self.galaxy.planets_in(quadrant) {
            objects.push(still(
                p.position,
                ObjectKind::Planet,
                pct(p.amount, PLANET_RESERVES),
                EntityRef::Planet(i).id(),
            ));
        }
        for (i, s) in self.galaxy.stars_in(quadrant) {
            objects.push(still(s.position, ObjectKind::Star, 100, EntityRef::Star(i).id()));
        }
        for (i, b) in self.galaxy.black_holes_in(quadrant) {
            objects.push(still(
                b.position,
                ObjectKind::BlackHole,
                100,
                EntityRef::BlackHole(i).id(),
            ));
        }
        objects.truncate(MAX_NET_OBJECTS);

        let beams = self
            .beams
            .iter()
            .filter(|(q, _)| *q == quadrant)
            .map(|(_, b)| *b)
            .take(MAX_NET_BEAMS)
            .collect();

        let mut frame = UpdateFrame {
            frame: self.tick,
            quadrant: quadrant.as_array(),
            sector: [ship.sector.x, ship.sector.y, ship.sector.z],
            heading: ship.heading,
            mark: ship.mark,
            energy: ship.energy,
            torpedoes: ship.torpedoes,
            shields: ship.shields,
            lock_target: ship.lock_target,
            cloaked: ship.cloaked,
            objects,
            beams,
            torpedo: captain.torpedo.map(|t| t.position.to_net()),
            explosion: None,
            dismantle: None,
        };

        let events = std::mem::take(&mut self.clients.active_mut(slot)?.events);
        frame.explosion = events.explosion;
        frame.dismantle = events.dismantle;
        Some(frame)
    }
}
