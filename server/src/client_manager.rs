//! Captain registry and outbound message routing for the galaxy server
//!
//! This module owns the fixed table of captain slots, including:
//! - Login with identity resumption by name and slot recycling
//! - Dormant captains kept after a disconnect so they can resume later
//! - Bounded per-captain command queues drained one entry per tick
//! - Message fan-out by scope (global, faction, private)
//!
//! Nothing here touches a socket. Outgoing packets are collected in an
//! outbox that the network layer drains after every tick or event.

use crate::combat::Torpedo;
use crate::navigation::NavState;
use crate::physics::Quadrant;
use crate::ship::ShipState;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use shared::{Faction, MessageScope, NetDismantle, NetPoint, Packet, ShipClass, MAX_CLIENTS};
use std::collections::VecDeque;
use thiserror::Error;

/// Identifies one accepted TCP connection for its whole lifetime.
pub type ConnectionId = u64;

/// One-shot visual events waiting for the next update packet.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LatchedEvents {
    pub explosion: Option<NetPoint>,
    pub dismantle: Option<NetDismantle>,
}

/// A registered captain and their vessel
///
/// The identity and ship survive disconnects and restarts. Helm state,
/// the torpedo in flight, queued commands and the connection are runtime
/// only and come back empty after a load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Captain {
    pub name: String,
    pub faction: Faction,
    pub ship_class: ShipClass,
    pub ship: ShipState,
    #[serde(skip)]
    pub nav: NavState,
    #[serde(skip)]
    pub torpedo: Option<Torpedo>,
    #[serde(skip)]
    pub pending: VecDeque<String>,
    #[serde(skip)]
    pub connection: Option<ConnectionId>,
    #[serde(skip)]
    pub events: LatchedEvents,
}

impl Captain {
    pub fn new(name: String, faction: Faction, ship_class: ShipClass, quadrant: Quadrant) -> Self {
        Self {
            name,
            faction,
            ship_class,
            ship: ShipState::new(quadrant),
            nav: NavState::Idle,
            torpedo: None,
            pending: VecDeque::new(),
            connection: None,
            events: LatchedEvents::default(),
        }
    }

    /// True while a connection is attached.
    pub fn is_active(&self) -> bool {
        self.connection.is_some()
    }

    /// Drops everything that only makes sense while connected.
    fn go_dormant(&mut self) {
        self.connection = None;
        self.nav = NavState::Idle;
        self.torpedo = None;
        self.pending.clear();
        self.events = LatchedEvents::default();
    }
}

/// Packets waiting to be written, or connections waiting to be closed.
#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    Packet { conn: ConnectionId, packet: Packet },
    Close { conn: ConnectionId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    Created(usize),
    Resumed(usize),
}

impl LoginOutcome {
    pub fn slot(self) -> usize {
        match self {
            LoginOutcome::Created(slot) | LoginOutcome::Resumed(slot) => slot,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoginError {
    #[error("Captain {0} is already in command of a vessel")]
    NameInUse(String),
    #[error("Server full")]
    ServerFull,
    #[error("Connection already has a captain")]
    AlreadyLoggedIn,
}

/// Manages all captain slots and their outbound traffic
///
/// Slot indices are stable for the lifetime of a captain and map directly
/// to player ids on the wire (slot + 1).
pub struct ClientManager {
    slots: Vec<Option<Captain>>,
    /// Maximum number of concurrently connected captains
    max_clients: usize,
    /// Capacity of each captain's pending command queue
    command_capacity: usize,
    outbox: Vec<Outgoing>,
}

impl ClientManager {
    /// Creates an empty registry
    ///
    /// The table always has room for 32 captains; `max_clients` limits how
    /// many of them may be connected at the same time.
    pub fn new(max_clients: usize, command_capacity: usize) -> Self {
        Self {
            slots: (0..MAX_CLIENTS).map(|_| None).collect(),
            max_clients: max_clients.min(MAX_CLIENTS),
            command_capacity,
            outbox: Vec::new(),
        }
    }

    /// Attaches a connection to a captain
    ///
    /// A dormant captain with the same name is resumed. Otherwise a fresh
    /// captain is placed in an empty slot, or in the first dormant slot when
    /// the table is full. A name that is currently connected is refused.
    pub fn login(
        &mut self,
        conn: ConnectionId,
        name: &str,
        faction: Faction,
        ship_class: ShipClass,
        spawn: Quadrant,
    ) -> Result<LoginOutcome, LoginError> {
        if self.slot_for_connection(conn).is_some() {
            return Err(LoginError::AlreadyLoggedIn);
        }

        let existing = self.find_by_name(name);
        if let Some(slot) = existing {
            if self.slots[slot].as_ref().map_or(false, Captain::is_active) {
                return Err(LoginError::NameInUse(name.to_string()));
            }
        }

        if self.len() >= self.max_clients {
            return Err(LoginError::ServerFull);
        }

        if let Some(slot) = existing {
            if let Some(captain) = self.slots[slot].as_mut() {
                captain.go_dormant();
                captain.connection = Some(conn);
                info!("Captain {} resumed command in slot {}", name, slot);
                return Ok(LoginOutcome::Resumed(slot));
            }
        }

        let slot = self
            .slots
            .iter()
            .position(Option::is_none)
            .or_else(|| {
                self.slots
                    .iter()
                    .position(|s| s.as_ref().map_or(false, |c| !c.is_active()))
            })
            .ok_or(LoginError::ServerFull)?;

        if let Some(old) = &self.slots[slot] {
            info!("Recycling dormant slot {} held by {}", slot, old.name);
        }

        let mut captain = Captain::new(name.to_string(), faction, ship_class, spawn);
        captain.connection = Some(conn);
        self.slots[slot] = Some(captain);
        info!(
            "Captain {} ({}, {}) took command in slot {}",
            name,
            faction.name(),
            ship_class.name(),
            slot
        );
        Ok(LoginOutcome::Created(slot))
    }

    /// Detaches a connection, leaving its captain dormant
    ///
    /// Returns the slot that was attached to the connection, if any.
    pub fn disconnect(&mut self, conn: ConnectionId) -> Option<usize> {
        let slot = self.slot_for_connection(conn)?;
        if let Some(captain) = self.slots[slot].as_mut() {
            captain.go_dormant();
            info!("Captain {} disconnected, slot {} dormant", captain.name, slot);
        }
        Some(slot)
    }

    /// Erases a captain entirely, closing their connection
    ///
    /// Used when a ship is lost. The next login with the same name starts
    /// from a fresh ship.
    pub fn remove(&mut self, slot: usize, reason: &str) -> Option<Captain> {
        let captain = self.slots.get_mut(slot)?.take()?;
        if let Some(conn) = captain.connection {
            self.outbox.push(Outgoing::Packet {
                conn,
                packet: Packet::Disconnected {
                    reason: reason.to_string(),
                },
            });
            self.outbox.push(Outgoing::Close { conn });
        }
        info!("Captain {} removed from slot {}: {}", captain.name, slot, reason);
        Some(captain)
    }

    pub fn find_by_name(&self, name: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.as_ref().map_or(false, |c| c.name == name))
    }

    pub fn slot_for_connection(&self, conn: ConnectionId) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.as_ref().and_then(|c| c.connection) == Some(conn))
    }

    pub fn get(&self, slot: usize) -> Option<&Captain> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut Captain> {
        self.slots.get_mut(slot).and_then(Option::as_mut)
    }

    /// Connected captain in `slot`, if any.
    pub fn active(&self, slot: usize) -> Option<&Captain> {
        self.get(slot).filter(|c| c.is_active())
    }

    pub fn active_mut(&mut self, slot: usize) -> Option<&mut Captain> {
        self.get_mut(slot).filter(|c| c.is_active())
    }

    /// Iterates over connected captains in slot order.
    pub fn iter_active(&self) -> impl Iterator<Item = (usize, &Captain)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().filter(|c| c.is_active()).map(|c| (i, c)))
    }

    pub fn active_slots(&self) -> Vec<usize> {
        self.iter_active().map(|(i, _)| i).collect()
    }

    /// Returns the number of currently connected captains
    pub fn len(&self) -> usize {
        self.iter_active().count()
    }

    /// Returns true if no captains are currently connected
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Buffers a command for the next tick
    ///
    /// Returns false if the captain is not connected or the queue is full.
    pub fn queue_command(&mut self, slot: usize, cmd: String) -> bool {
        let capacity = self.command_capacity;
        match self.active_mut(slot) {
            Some(captain) if captain.pending.len() < capacity => {
                captain.pending.push_back(cmd);
                true
            }
            _ => false,
        }
    }

    pub fn pop_command(&mut self, slot: usize) -> Option<String> {
        self.active_mut(slot)?.pending.pop_front()
    }

    /// Queues a packet for a connected captain. Dormant captains get nothing.
    pub fn send(&mut self, slot: usize, packet: Packet) {
        if let Some(conn) = self.active(slot).and_then(|c| c.connection) {
            self.outbox.push(Outgoing::Packet { conn, packet });
        }
    }

    /// Queues a packet for a connection that may not have a captain yet.
    pub fn send_to_connection(&mut self, conn: ConnectionId, packet: Packet) {
        self.outbox.push(Outgoing::Packet { conn, packet });
    }

    pub fn close_connection(&mut self, conn: ConnectionId) {
        self.outbox.push(Outgoing::Close { conn });
    }

    /// Sends a private message from a shipboard station.
    pub fn notify(&mut self, slot: usize, station: &str, text: impl Into<String>) {
        self.send(slot, Packet::system_message(station, text));
    }

    pub fn broadcast(&mut self, packet: Packet) {
        for slot in self.active_slots() {
            self.send(slot, packet.clone());
        }
    }

    /// Fans a chat message out according to its scope
    ///
    /// The sender's identity always overrides whatever the client claimed.
    /// Private messages are echoed back to the sender. Returns false when a
    /// private recipient is not connected.
    pub fn route_message(
        &mut self,
        sender: usize,
        scope: MessageScope,
        target_id: u32,
        text: String,
    ) -> bool {
        let Some(from) = self.active(sender) else {
            return false;
        };
        let faction = from.faction;
        let packet = Packet::Message {
            from: from.name.clone(),
            faction: faction.code(),
            scope,
            target_id,
            text,
        };

        let recipients: Vec<usize> = match scope {
            MessageScope::Global => self.active_slots(),
            MessageScope::Faction => self
                .iter_active()
                .filter(|(_, c)| c.faction == faction)
                .map(|(i, _)| i)
                .collect(),
            MessageScope::Private => {
                let target = (target_id as usize).checked_sub(1);
                match target.filter(|t| self.active(*t).is_some()) {
                    Some(t) if t == sender => vec![sender],
                    Some(t) => vec![t, sender],
                    None => return false,
                }
            }
        };

        debug!(
            "Routing {:?} message from slot {} to {} recipients",
            scope,
            sender,
            recipients.len()
        );
        for slot in recipients {
            self.send(slot, packet.clone());
        }
        true
    }

    /// Takes every queued outgoing item.
    pub fn drain_outbox(&mut self) -> Vec<Outgoing> {
        std::mem::take(&mut self.outbox)
    }

    /// Copies the whole table for persistence.
    pub fn snapshot(&self) -> Vec<Option<Captain>> {
        self.slots.clone()
    }

    /// Replaces the table with persisted captains, all dormant.
    pub fn restore(&mut self, captains: Vec<Option<Captain>>) {
        let mut slots: Vec<Option<Captain>> = captains.into_iter().take(MAX_CLIENTS).collect();
        slots.resize_with(MAX_CLIENTS, || None);
        for captain in slots.iter_mut().flatten() {
            captain.go_dormant();
        }
        self.slots = slots;
    }
}
