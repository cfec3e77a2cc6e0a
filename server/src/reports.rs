//! Human-readable bridge reports. Each function renders one text block that
//! is sent back to the captain as a system message.

use crate::client_manager::{Captain, ClientManager};
use crate::entity::EntityRef;
use crate::galaxy::{Galaxy, RESOURCE_NAMES};
use crate::physics::{heading_mark, to_galactic, Quadrant, Vector3};
use crate::ship::{System, POWER_ENGINES, POWER_SHIELDS, POWER_WEAPONS};
use shared::QuadrantCounts;
use std::fmt::Write;

const INVENTORY_LABELS: [&str; 7] = ["-", "Dil", "Tri", "Ver", "Mon", "Iso", "Gas"];
const SCAN_RULE: &str =
    "-------------------------------------------------------------------\n";

fn contact_line(
    out: &mut String,
    entity: EntityRef,
    from: Vector3,
    position: Vector3,
    details: &str,
) {
    let offset = position.sub(&from);
    let (heading, mark) = heading_mark(offset);
    let _ = writeln!(
        out,
        "{:<10} {:<5} [{:.1},{:.1},{:.1}] {:<5.1} {:03.0} / {:+03.0}     {}",
        entity.label(),
        entity.id(),
        position.x,
        position.y,
        position.z,
        offset.magnitude(),
        heading,
        mark,
        details
    );
}

/// Sector contacts around a captain: other visible vessels, hostiles and
/// every static body in the quadrant.
pub fn short_range_scan(galaxy: &Galaxy, clients: &ClientManager, slot: usize) -> Option<String> {
    let me = clients.active(slot)?;
    let ship = &me.ship;
    let q = ship.quadrant;
    let here = ship.sector;

    let mut out = String::from("\n--- SHORT RANGE SENSOR ANALYSIS ---\n");
    let _ = writeln!(
        out,
        "QUADRANT: {} | SECTOR: [{:.1},{:.1},{:.1}]",
        q, here.x, here.y, here.z
    );
    let _ = writeln!(
        out,
        "ENERGY: {} | TORPEDOES: {} | STATUS: {}",
        ship.energy,
        ship.torpedoes,
        if ship.cloaked { "CLOAKED" } else { "NORMAL" }
    );
    let s = &ship.shields;
    let _ = writeln!(
        out,
        "DEFLECTORS:  F:{:<4} R:{:<4} T:{:<4} B:{:<4} L:{:<4} RI:{:<4}",
        s[0], s[1], s[2], s[3], s[4], s[5]
    );
    out.push_str("\nTYPE       ID    POSITION      DIST   H / M         DETAILS\n");

    for (other, captain) in clients.iter_active() {
        if other != slot && captain.ship.quadrant == q && !captain.ship.cloaked {
            let details = format!("{} (Player)", captain.name);
            contact_line(&mut out, EntityRef::Player(other), here, captain.ship.sector, &details);
        }
    }
    for (i, h) in galaxy.hostiles_in(q) {
        contact_line(&mut out, EntityRef::Npc(i), here, h.position, h.species.name());
    }
    for (i, b) in galaxy.bases_in(q) {
        contact_line(&mut out, EntityRef::Base(i), here, b.position, "Federation Outpost");
    }
    for (i, p) in galaxy.planets_in(q) {
        let resource = RESOURCE_NAMES.get(p.resource as usize).copied().unwrap_or("-");
        let details = format!("Class-M (Res: {})", resource);
        contact_line(&mut out, EntityRef::Planet(i), here, p.position, &details);
    }
    for (i, s) in galaxy.stars_in(q) {
        contact_line(&mut out, EntityRef::Star(i), here, s.position, "Type-G Main Sequence");
    }
    for (i, b) in galaxy.black_holes_in(q) {
        contact_line(&mut out, EntityRef::BlackHole(i), here, b.position, "WARN: Gravitational Shear");
    }

    out.push_str(SCAN_RULE);
    Some(out)
}

/// Live counts for one quadrant, with connected captains folded into the
/// vessel digit.
pub fn live_counts(galaxy: &Galaxy, clients: &ClientManager, quadrant: Quadrant) -> QuadrantCounts {
    let mut counts = galaxy.quadrant_counts(quadrant);
    let captains = clients
        .iter_active()
        .filter(|(_, c)| c.ship.quadrant == quadrant)
        .count();
    counts.hostiles = counts.hostiles.saturating_add(captains.min(u8::MAX as usize) as u8);
    counts
}

/// The 3x3x3 neighbourhood, one deck per z layer from top to bottom. Each
/// cell carries the encoded counts plus the course needed to reach its centre.
pub fn long_range_scan(galaxy: &Galaxy, clients: &ClientManager, slot: usize) -> Option<String> {
    let ship = &clients.active(slot)?.ship;
    let q = ship.quadrant;
    let origin = ship.galactic();

    let mut out = String::from("\n--- 3D LONG RANGE SENSOR SCAN ---\n");
    for z in (q.z - 1..=q.z + 1).rev() {
        if !(1..=10).contains(&z) {
            continue;
        }
        let _ = writeln!(out, "\n[ DECK Z:{} ]", z);
        out.push_str("         X-1 (West)               X (Center)               X+1 (East)\n");

        for y in q.y - 1..=q.y + 1 {
            out.push_str(match y - q.y {
                -1 => "Y-1 (N) ",
                0 => "Y   (C) ",
                _ => "Y+1 (S) ",
            });

            for x in q.x - 1..=q.x + 1 {
                let cell = Quadrant::new(x, y, z);
                if !cell.is_valid() {
                    out.push_str("[:        ***         ]: ");
                } else if cell == q {
                    out.push_str(":[        YOU         ]: ");
                } else {
                    let centre = to_galactic(cell, Vector3::new(5.0, 5.0, 5.0));
                    let delta = centre.sub(&origin);
                    let (heading, mark) = heading_mark(delta);
                    let _ = write!(
                        out,
                        "[{:05}/H{:03.0}/M{:+03.0}/W{:.1}]: ",
                        live_counts(galaxy, clients, cell).encoded(),
                        heading,
                        mark,
                        delta.magnitude() / 10.0
                    );
                }
            }
            out.push('\n');
        }
    }
    Some(out)
}

pub fn probe_report(quadrant: Quadrant, counts: &QuadrantCounts) -> String {
    format!(
        "Probe Report Q[{},{},{}]: {:05} (B:{} P:{} E:{} S:{} T:{})",
        quadrant.x,
        quadrant.y,
        quadrant.z,
        counts.encoded(),
        counts.black_holes,
        counts.planets,
        counts.hostiles,
        counts.bases,
        counts.stars
    )
}

pub fn status(captain: &Captain) -> String {
    let ship = &captain.ship;
    format!(
        "\n--- MISSION STATUS ---\n\
         Commander: {} | Faction: {} | Class: {}\n\
         Quadrant: {} | Sector: [{:.1},{:.1},{:.1}]\n\
         Energy: {} | Torps: {} | Shields: {}\n\
         Power: E:{:.0}% S:{:.0}% W:{:.0}% | Lock: {} | Cloak: {}",
        captain.name,
        captain.faction.name(),
        captain.ship_class.name(),
        ship.quadrant,
        ship.sector.x,
        ship.sector.y,
        ship.sector.z,
        ship.energy,
        ship.torpedoes,
        ship.total_shields(),
        ship.power[POWER_ENGINES] * 100.0,
        ship.power[POWER_SHIELDS] * 100.0,
        ship.power[POWER_WEAPONS] * 100.0,
        ship.lock_target,
        if ship.cloaked { "ON" } else { "OFF" }
    )
}

pub fn damage_report(captain: &Captain) -> String {
    let systems: Vec<String> = System::ALL
        .iter()
        .map(|s| format!("{}:{:.1}%", s.name(), captain.ship.health(*s)))
        .collect();
    format!("Integrity: {}", systems.join(" "))
}

pub fn inventory(captain: &Captain) -> String {
    let items: Vec<String> = (1..INVENTORY_LABELS.len())
        .map(|i| format!("{}:{}", INVENTORY_LABELS[i], captain.ship.inventory[i]))
        .collect();
    format!("Inv: {}", items.join(" "))
}

/// Connected captains. Cloaked vessels other than the reader's own hide their position.
pub fn who(clients: &ClientManager, reader: usize) -> String {
    let mut out = String::from("\n--- ACTIVE CAPTAINS ---\n");
    for (slot, c) in clients.iter_active() {
        let location = if c.ship.cloaked && slot != reader {
            "[?,?,?]".to_string()
        } else {
            c.ship.quadrant.to_string()
        };
        let _ = writeln!(
            out,
            "{:<3} {:<20} {:<11} {:<13} {}",
            slot + 1,
            c.name,
            c.faction.name(),
            c.ship_class.name(),
            location
        );
    }
    out
}

pub fn central_computer(hostiles: u32, bases: u32) -> String {
    format!(
        "\n--- FEDERATION CENTRAL COMPUTER ---\n\
         Current Mission: Eliminate all hostile entities in the galaxy.\n\
         Hostiles Remaining: {} | Starbases Operational: {}\n\
         Galactic Stability: {:.1}%",
        hostiles,
        bases,
        (1.0 - hostiles as f64 / 200.0) * 100.0
    )
}

/// Course from the captain's quadrant to the centre of another, measured
/// quadrant to quadrant.
pub fn course_to(from: Quadrant, to: Quadrant) -> String {
    let delta = Vector3::new(
        (to.x - from.x) as f64 * 10.0,
        (to.y - from.y) as f64 * 10.0,
        (to.z - from.z) as f64 * 10.0,
    );
    let (heading, mark) = heading_mark(delta);
    format!(
        "Course to Q[{},{},{}]: H:{:.1} M:{:.1} W:{:.2}",
        to.x,
        to.y,
        to.z,
        heading,
        mark,
        delta.magnitude() / 10.0
    )
}
