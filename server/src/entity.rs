use crate::constants::{MAX_BASES, MAX_BLACK_HOLES, MAX_NPC, MAX_PLANETS, MAX_STARS};
use shared::MAX_CLIENTS;

const NPC_OFFSET: u32 = 100;
const BASE_OFFSET: u32 = 500;
const PLANET_OFFSET: u32 = 1000;
const STAR_OFFSET: u32 = 2000;
const BLACK_HOLE_OFFSET: u32 = 3000;

/// Typed reference to anything a captain can target.
///
/// On the wire every entity is a single number partitioned by offset:
/// captains 1-32, hostiles 100+, starbases 500+, planets 1000+, stars 2000+,
/// black holes 3000+. The wrapped index is the slot in the owning table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Player(usize),
    Npc(usize),
    Base(usize),
    Planet(usize),
    Star(usize),
    BlackHole(usize),
}

impl EntityRef {
    pub fn from_id(id: u32) -> Option<Self> {
        let within = |offset: u32, cap: usize| {
            let index = id.checked_sub(offset)? as usize;
            (index < cap).then_some(index)
        };

        match id {
            1..=32 => within(1, MAX_CLIENTS).map(EntityRef::Player),
            100..=499 => within(NPC_OFFSET, MAX_NPC).map(EntityRef::Npc),
            500..=999 => within(BASE_OFFSET, MAX_BASES).map(EntityRef::Base),
            1000..=1999 => within(PLANET_OFFSET, MAX_PLANETS).map(EntityRef::Planet),
            2000..=2999 => within(STAR_OFFSET, MAX_STARS).map(EntityRef::Star),
            3000..=3999 => within(BLACK_HOLE_OFFSET, MAX_BLACK_HOLES).map(EntityRef::BlackHole),
            _ => None,
        }
    }

    pub fn id(self) -> u32 {
        match self {
            EntityRef::Player(i) => i as u32 + 1,
            EntityRef::Npc(i) => i as u32 + NPC_OFFSET,
            EntityRef::Base(i) => i as u32 + BASE_OFFSET,
            EntityRef::Planet(i) => i as u32 + PLANET_OFFSET,
            EntityRef::Star(i) => i as u32 + STAR_OFFSET,
            EntityRef::BlackHole(i) => i as u32 + BLACK_HOLE_OFFSET,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EntityRef::Player(_) | EntityRef::Npc(_) => "Vessel",
            EntityRef::Base(_) => "Starbase",
            EntityRef::Planet(_) => "Planet",
            EntityRef::Star(_) => "Star",
            EntityRef::BlackHole(_) => "B-Hole",
        }
    }
}
