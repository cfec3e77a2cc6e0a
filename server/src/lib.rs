//! # Galaxy Server Library
//!
//! This library provides the authoritative server for a persistent,
//! multi-quadrant 3D galaxy shared by networked captains and autonomous
//! hostile vessels. It owns the canonical world, executes bridge commands,
//! and streams a per-captain tactical view at a fixed tick rate.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Every rule of the galaxy is enforced here: helm motion with warp safety
//! interlocks and galactic boundary clamping, hostile AI, phaser and torpedo
//! resolution against six shield facings, environmental hazards and the
//! periodic upkeep of every ship.
//!
//! ### Captain Management
//! Handles the complete lifecycle of a captain including:
//! - Login, either fresh or resuming a dormant identity by name
//! - Bounded command queues drained one command per tick
//! - Scoped chat fan-out (global, faction, private)
//! - Dormancy on disconnect and erasure when a ship is lost
//!
//! ### Persistence
//! The galaxy and the registry are snapshotted to disk at a fixed tick
//! interval and on shutdown, and restored on the next start.
//!
//! ## Architecture Design
//!
//! ### Single Tick Owner
//! All galaxy and captain state lives in one [`game::GameState`] owned by
//! the server loop. Connection tasks only decode and encode frames; they
//! talk to the loop through bounded channels. No lock guards the world
//! because nothing else can reach it.
//!
//! ### TCP Stream Protocol
//! Packets travel as length-prefixed bincode frames over TCP (see the
//! `shared` crate). Each connection gets a reader task and a writer task.
//! The loop never waits on a writer: when a client falls behind, its
//! packets are dropped rather than stalling the tick.
//!
//! ### Tick Order
//! One queued command per captain, helm, hazards, upkeep, hostile AI,
//! torpedoes, then one update per captain. Captains are visited in slot
//! order, which decides simultaneous outcomes.
//!
//! ## Module Organization
//!
//! - `client_manager`: captain slots, login/resume, outbox and chat routing
//! - `game`: the tick owner, hazards, upkeep, torpedoes, update frames
//! - `navigation`: align/warp/realign and impulse state machine
//! - `ai`: hostile patrol/chase/flee and fire control
//! - `combat`: shield distribution, phaser falloff, torpedo ballistics
//! - `commands`: command parsing and execution
//! - `reports`: scan and status texts
//! - `galaxy`, `entity`, `ship`, `physics`: world model and addressing
//! - `persistence`, `config`, `error`, `constants`: ambient plumbing
//! - `network`: listener, connection tasks and the main loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         port: 5000,
//!         seed: Some(1701),
//!         ..Default::default()
//!     };
//!
//!     // Binds, loads galaxy.sav or generates a galaxy, then ticks at 30Hz
//!     let mut server = Server::new(config).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod ai;
pub mod client_manager;
pub mod combat;
pub mod commands;
pub mod config;
pub mod constants;
pub mod entity;
pub mod error;
pub mod galaxy;
pub mod game;
pub mod navigation;
pub mod network;
pub mod persistence;
pub mod physics;
pub mod reports;
pub mod ship;
