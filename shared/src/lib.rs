//! Wire protocol shared by the galaxy server and its clients.
//!
//! Every frame on the stream is a 4-byte little-endian length followed by a
//! bincode-encoded [`Packet`]. The enum discriminant takes the place of the
//! leading type tag used by older trek servers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod codec;

pub use codec::{decode_frame, encode_frame, read_packet, write_packet, FRAME_HEADER_LEN, MAX_FRAME_LEN};

pub const DEFAULT_PORT: u16 = 5000;
pub const MAX_CLIENTS: usize = 32;
pub const MAX_NET_OBJECTS: usize = 200;
pub const MAX_NET_BEAMS: usize = 10;
pub const MAX_NAME_LEN: usize = 63;
pub const MAX_COMMAND_LEN: usize = 255;
pub const MAX_TEXT_LEN: usize = 4096;
/// Quadrants per galaxy axis.
pub const GALAXY_SIZE: usize = 10;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("frame of {len} bytes exceeds limit of {max}")]
    FrameTooLarge { len: usize, max: usize },

    #[error("invalid field: {0}")]
    InvalidField(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Faction {
    Federation,
    Klingon,
    Romulan,
    Borg,
    Cardassian,
}

impl Faction {
    pub const ALL: [Faction; 5] = [
        Faction::Federation,
        Faction::Klingon,
        Faction::Romulan,
        Faction::Borg,
        Faction::Cardassian,
    ];

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Faction::Federation => "Federation",
            Faction::Klingon => "Klingon",
            Faction::Romulan => "Romulan",
            Faction::Borg => "Borg",
            Faction::Cardassian => "Cardassian",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShipClass {
    Constitution,
    Miranda,
    Excelsior,
    Constellation,
    Defiant,
    Galaxy,
    Sovereign,
    Intrepid,
    Akira,
    Nebula,
    Ambassador,
    Oberth,
    Steamrunner,
    GenericAlien,
}

impl ShipClass {
    pub const ALL: [ShipClass; 14] = [
        ShipClass::Constitution,
        ShipClass::Miranda,
        ShipClass::Excelsior,
        ShipClass::Constellation,
        ShipClass::Defiant,
        ShipClass::Galaxy,
        ShipClass::Sovereign,
        ShipClass::Intrepid,
        ShipClass::Akira,
        ShipClass::Nebula,
        ShipClass::Ambassador,
        ShipClass::Oberth,
        ShipClass::Steamrunner,
        ShipClass::GenericAlien,
    ];

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            ShipClass::Constitution => "Constitution",
            ShipClass::Miranda => "Miranda",
            ShipClass::Excelsior => "Excelsior",
            ShipClass::Constellation => "Constellation",
            ShipClass::Defiant => "Defiant",
            ShipClass::Galaxy => "Galaxy",
            ShipClass::Sovereign => "Sovereign",
            ShipClass::Intrepid => "Intrepid",
            ShipClass::Akira => "Akira",
            ShipClass::Nebula => "Nebula",
            ShipClass::Ambassador => "Ambassador",
            ShipClass::Oberth => "Oberth",
            ShipClass::Steamrunner => "Steamrunner",
            ShipClass::GenericAlien => "Alien",
        }
    }
}

/// Hostile species crewing NPC vessels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Species {
    Klingon,
    Romulan,
    Borg,
    Cardassian,
    JemHadar,
    Tholian,
    Gorn,
    Ferengi,
    Species8472,
    Breen,
    Hirogen,
}

impl Species {
    pub const ALL: [Species; 11] = [
        Species::Klingon,
        Species::Romulan,
        Species::Borg,
        Species::Cardassian,
        Species::JemHadar,
        Species::Tholian,
        Species::Gorn,
        Species::Ferengi,
        Species::Species8472,
        Species::Breen,
        Species::Hirogen,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Species::Klingon => "Klingon",
            Species::Romulan => "Romulan",
            Species::Borg => "Borg",
            Species::Cardassian => "Cardassian",
            Species::JemHadar => "Jem'Hadar",
            Species::Tholian => "Tholian",
            Species::Gorn => "Gorn",
            Species::Ferengi => "Ferengi",
            Species::Species8472 => "Species 8472",
            Species::Breen => "Breen",
            Species::Hirogen => "Hirogen",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageScope {
    Global,
    Faction,
    Private,
}

/// What a renderer should draw for an object in the tactical view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectKind {
    Player,
    Starbase,
    Star,
    Planet,
    BlackHole,
    Hostile(Species),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetPoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl NetPoint {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetObject {
    pub position: NetPoint,
    pub heading: f32,
    pub mark: f32,
    pub kind: ObjectKind,
    pub ship_class: u8,
    pub health_pct: u8,
    pub id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetBeam {
    pub origin: NetPoint,
    pub target: NetPoint,
}

/// A vessel being taken apart: boarded, surrendered or self-destructed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetDismantle {
    pub position: NetPoint,
    pub kind: ObjectKind,
}

/// Contents of one quadrant as shown by long range scans and probes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuadrantCounts {
    pub black_holes: u8,
    pub planets: u8,
    pub hostiles: u8,
    pub bases: u8,
    pub stars: u8,
}

impl QuadrantCounts {
    /// Legacy five-digit display value: black holes, planets, hostiles, bases, stars.
    pub fn encoded(&self) -> u32 {
        let digit = |n: u8| n.min(9) as u32;
        digit(self.black_holes) * 10_000
            + digit(self.planets) * 1_000
            + digit(self.hostiles) * 100
            + digit(self.bases) * 10
            + digit(self.stars)
    }
}

/// Galaxy master record sent once after login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalaxySnapshot {
    pub quadrants: Vec<QuadrantCounts>,
    pub hostiles: u32,
    pub bases: u32,
}

impl GalaxySnapshot {
    pub fn empty() -> Self {
        Self {
            quadrants: vec![QuadrantCounts::default(); GALAXY_SIZE * GALAXY_SIZE * GALAXY_SIZE],
            hostiles: 0,
            bases: 0,
        }
    }

    /// Flat index for 1-based quadrant coordinates.
    pub fn index(x: i32, y: i32, z: i32) -> Option<usize> {
        let size = GALAXY_SIZE as i32;
        let in_range = |v: i32| (1..=size).contains(&v);
        if in_range(x) && in_range(y) && in_range(z) {
            Some((((x - 1) * size + (y - 1)) * size + (z - 1)) as usize)
        } else {
            None
        }
    }

    pub fn quadrant(&self, x: i32, y: i32, z: i32) -> Option<&QuadrantCounts> {
        Self::index(x, y, z).and_then(|i| self.quadrants.get(i))
    }
}

/// Per-tick tactical view of one captain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateFrame {
    pub frame: u64,
    pub quadrant: [i32; 3],
    pub sector: [f64; 3],
    pub heading: f64,
    pub mark: f64,
    pub energy: i32,
    pub torpedoes: i32,
    pub shields: [i32; 6],
    pub lock_target: u32,
    pub cloaked: bool,
    pub objects: Vec<NetObject>,
    pub beams: Vec<NetBeam>,
    pub torpedo: Option<NetPoint>,
    pub explosion: Option<NetPoint>,
    pub dismantle: Option<NetDismantle>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Packet {
    // Client -> server
    Login {
        name: String,
        faction: u8,
        ship_class: u8,
    },
    Command {
        cmd: String,
    },
    Logout,

    // Both directions
    Message {
        from: String,
        faction: u8,
        scope: MessageScope,
        target_id: u32,
        text: String,
    },

    // Server -> client
    Galaxy(GalaxySnapshot),
    Update(Box<UpdateFrame>),
    Disconnected {
        reason: String,
    },
}

impl Packet {
    /// A private message from a named shipboard station such as "HELMSMAN".
    pub fn system_message(from: &str, text: impl Into<String>) -> Self {
        Packet::Message {
            from: from.to_string(),
            faction: Faction::Federation.code(),
            scope: MessageScope::Private,
            target_id: 0,
            text: text.into(),
        }
    }

    /// Checks field limits on packets a client is allowed to send.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            Packet::Login {
                name,
                faction,
                ship_class,
            } => {
                let trimmed = name.trim();
                if trimmed.is_empty() || trimmed.len() > MAX_NAME_LEN {
                    return Err(ProtocolError::InvalidField(format!(
                        "captain name must be 1-{} bytes",
                        MAX_NAME_LEN
                    )));
                }
                if Faction::from_code(*faction).is_none() {
                    return Err(ProtocolError::InvalidField(format!("faction {}", faction)));
                }
                if ShipClass::from_code(*ship_class).is_none() {
                    return Err(ProtocolError::InvalidField(format!("ship class {}", ship_class)));
                }
                Ok(())
            }
            Packet::Command { cmd } if cmd.len() > MAX_COMMAND_LEN => Err(
                ProtocolError::InvalidField(format!("command longer than {} bytes", MAX_COMMAND_LEN)),
            ),
            Packet::Message { text, .. } if text.len() > MAX_TEXT_LEN => Err(
                ProtocolError::InvalidField(format!("message longer than {} bytes", MAX_TEXT_LEN)),
            ),
            _ => Ok(()),
        }
    }
}
