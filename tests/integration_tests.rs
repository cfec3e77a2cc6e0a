//! Integration tests for the galaxy server
//!
//! These tests validate cross-component interactions: whole ticks through
//! `GameState`, persistence, and real TCP sessions against a running server.

use assert_approx_eq::assert_approx_eq;
use server::client_manager::{ConnectionId, Outgoing};
use server::config::ServerConfig;
use server::galaxy::{Galaxy, Hostile};
use server::game::GameState;
use server::network::{Server, ServerMessage};
use server::physics::{Quadrant, Vector3};
use shared::{read_packet, write_packet, Faction, MessageScope, Packet, ShipClass, Species};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};

fn seeded_config() -> ServerConfig {
    ServerConfig {
        seed: Some(1701),
        ..Default::default()
    }
}

/// Logs a captain in and parks them at a known spot.
fn board(state: &mut GameState, conn: ConnectionId, name: &str, quadrant: Quadrant) -> usize {
    state.login(conn, name, Faction::Federation, ShipClass::Constitution);
    let slot = state.clients.slot_for_connection(conn).unwrap();
    let captain = state.clients.active_mut(slot).unwrap();
    captain.ship.quadrant = quadrant;
    captain.ship.sector = Vector3::new(5.0, 5.0, 5.0);
    slot
}

fn command(state: &mut GameState, conn: ConnectionId, line: &str) {
    state.handle_packet(
        conn,
        Packet::Command {
            cmd: line.to_string(),
        },
    );
}

fn texts(outbox: &[Outgoing], conn: ConnectionId) -> Vec<String> {
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

/// WHOLE-TICK SCENARIOS
mod scenario_tests {
    use super::*;

    const Q: Quadrant = Quadrant::new(5, 5, 5);

    fn quiet_hostile(position: Vector3, species: Species) -> Hostile {
        let mut hostile = Hostile::new(Q, position, species);
        hostile.fire_cooldown = 10_000;
        hostile
    }

    /// Phasers against a locked hostile 5 units away with half power to weapons
    #[test]
    fn phaser_hit_on_locked_hostile() {
        let mut state = GameState::new(Galaxy::default(), &seeded_config());
        state
            .galaxy
            .hostiles
            .push(quiet_hostile(Vector3::new(5.0, 0.0, 5.0), Species::Klingon));

        let slot = board(&mut state, 1, "Archer", Q);
        {
            let ship = &mut state.clients.active_mut(slot).unwrap().ship;
            ship.lock_target = 100;
            ship.power = [0.25, 0.25, 0.5];
        }
        command(&mut state, 1, "pha 500");
        state.tick();

        let hostile = &state.galaxy.hostiles[0];
        assert_eq!(hostile.energy, 900);
        assert!(hostile.active);
        assert_eq!(state.clients.active(slot).unwrap().ship.energy, 2500);
        assert!(texts(&state.drain_outbox(), 1).contains(&"Phasers fired.".to_string()));
    }

    /// A crippled hostile runs straight away from the nearest captain
    #[test]
    fn crippled_hostile_flees() {
        let mut state = GameState::new(Galaxy::default(), &seeded_config());
        let mut hostile = quiet_hostile(Vector3::new(7.0, 5.0, 5.0), Species::Cardassian);
        hostile.energy = 150;
        state.galaxy.hostiles.push(hostile);
        board(&mut state, 1, "Pike", Q);

        state.tick();

        let hostile = &state.galaxy.hostiles[0];
        assert_approx_eq!(hostile.velocity.x, 0.05, 1e-9);
        assert_approx_eq!(hostile.velocity.y, 0.0, 1e-9);
        assert_approx_eq!(hostile.velocity.z, 0.0, 1e-9);
        assert_approx_eq!(hostile.position.x, 7.05, 1e-9);
    }

    /// A manually aimed torpedo advances 0.8 units in its first tick
    #[test]
    fn torpedo_first_step() {
        let mut state = GameState::new(Galaxy::default(), &seeded_config());
        let slot = board(&mut state, 1, "Garrett", Q);
        command(&mut state, 1, "tor 90 0");
        state.tick();

        let captain = state.clients.active(slot).unwrap();
        let torpedo = captain.torpedo.expect("torpedo in flight");
        assert_approx_eq!(torpedo.position.x, 5.8, 1e-9);
        assert_approx_eq!(torpedo.position.y, 5.0, 1e-9);
        assert_approx_eq!(torpedo.position.z, 5.0, 1e-9);
        assert_eq!(captain.ship.torpedoes, 9);
        assert!(texts(&state.drain_outbox(), 1).contains(&"Torpedo away (Manual).".to_string()));
    }

    /// One quadrant of warp takes two seconds of alignment plus three of warp
    #[test]
    fn warp_travel_time() {
        let mut state = GameState::new(Galaxy::default(), &seeded_config());
        let slot = board(&mut state, 1, "Sulu", Q);
        command(&mut state, 1, "nav 90 0 1");

        let mut exit_tick = None;
        for _ in 0..400 {
            state.tick();
            let messages = texts(&state.drain_outbox(), 1);
            if messages.iter().any(|t| t == "Exiting Warp. Realigning ship.") {
                exit_tick = Some(state.tick);
                break;
            }
        }

        assert_eq!(exit_tick, Some(150));
        let ship = &state.clients.active(slot).unwrap().ship;
        assert_eq!(ship.quadrant, Quadrant::new(6, 5, 5));
        assert_approx_eq!(ship.sector.x, 5.0, 1e-6);
        assert_approx_eq!(ship.sector.y, 5.0, 1e-6);
    }

    /// Warping east from the galaxy's eastern edge stops at the barrier
    #[test]
    fn warp_clamped_at_galactic_barrier() {
        let mut state = GameState::new(Galaxy::default(), &seeded_config());
        let slot = board(&mut state, 1, "Rand", Quadrant::new(10, 5, 5));
        state.clients.active_mut(slot).unwrap().ship.sector = Vector3::new(9.99, 5.0, 5.0);
        command(&mut state, 1, "nav 90 0 3");

        let mut messages = Vec::new();
        for _ in 0..300 {
            state.tick();
            messages.extend(texts(&state.drain_outbox(), 1));
        }

        assert!(messages.contains(&"Galactic barrier reached. Dropping out of warp.".to_string()));
        let captain = state.clients.active(slot).unwrap();
        assert!(captain.nav.is_idle());
        assert_eq!(captain.ship.quadrant.x, 10);
        assert!(captain.ship.sector.x < 10.0);
    }

    /// Releasing a lock is idempotent
    #[test]
    fn lock_zero_is_idempotent() {
        let mut state = GameState::new(Galaxy::default(), &seeded_config());
        state
            .galaxy
            .hostiles
            .push(quiet_hostile(Vector3::new(2.0, 2.0, 2.0), Species::Gorn));
        let slot = board(&mut state, 1, "Kira", Q);

        command(&mut state, 1, "lock 100");
        state.tick();
        assert_eq!(state.clients.active(slot).unwrap().ship.lock_target, 100);

        for _ in 0..2 {
            command(&mut state, 1, "lock 0");
            state.tick();
            assert_eq!(state.clients.active(slot).unwrap().ship.lock_target, 0);
        }
    }

    /// Captains in the same quadrant see each other unless cloaked
    #[test]
    fn updates_respect_cloak() {
        let mut state = GameState::new(Galaxy::default(), &seeded_config());
        board(&mut state, 1, "Worf", Q);
        board(&mut state, 2, "Martok", Q);
        command(&mut state, 2, "clo");
        state.tick();

        let frames: Vec<_> = state
            .drain_outbox()
            .into_iter()
            .filter_map(|o| match o {
                Outgoing::Packet {
                    conn: 1,
                    packet: Packet::Update(frame),
                } => Some(frame),
                _ => None,
            })
            .collect();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].objects.len(), 1);
        assert_eq!(frames[0].objects[0].id, 1);
    }

    /// Saved worlds reload with identical content and dormant captains
    #[test]
    fn save_and_reload_world() {
        let mut state = GameState::generate(&seeded_config());
        state.login(1, "Troi", Faction::Federation, ShipClass::Galaxy);
        state.galaxy.planets[0].amount = 10;
        for _ in 0..5 {
            state.tick();
        }

        let path = std::env::temp_dir().join(format!("trek-it-{}.sav", std::process::id()));
        state.save_to(&path).unwrap();
        let data = server::persistence::load(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        let loaded = GameState::from_save(data, &seeded_config());

        assert_eq!(loaded.tick, 5);
        assert_eq!(loaded.galaxy.master_record(), state.galaxy.master_record());
        assert_eq!(loaded.galaxy.planets[0].amount, 10);
        assert_eq!(loaded.galaxy.hostiles.len(), state.galaxy.hostiles.len());
        for (a, b) in loaded.galaxy.hostiles.iter().zip(&state.galaxy.hostiles) {
            assert_eq!(a.position, b.position);
            assert_eq!(a.active, b.active);
        }
        assert!(loaded.clients.is_empty());
        assert_eq!(loaded.clients.find_by_name("Troi"), Some(0));
    }
}

/// LIVE SERVER TESTS
mod network_tests {
    use super::*;

    struct TestClient {
        stream: TcpStream,
    }

    impl TestClient {
        async fn connect(addr: std::net::SocketAddr) -> Self {
            let stream = TcpStream::connect(addr).await.unwrap();
            Self { stream }
        }

        async fn send(&mut self, packet: Packet) {
            write_packet(&mut self.stream, &packet).await.unwrap();
        }

        async fn login(&mut self, name: &str, faction: u8) {
            self.send(Packet::Login {
                name: name.to_string(),
                faction,
                ship_class: 0,
            })
            .await;
        }

        async fn command(&mut self, line: &str) {
            self.send(Packet::Command {
                cmd: line.to_string(),
            })
            .await;
        }

        /// Next packet that is not a per-tick update.
        async fn next_event(&mut self) -> Option<Packet> {
            loop {
                let packet = timeout(Duration::from_secs(5), read_packet(&mut self.stream))
                    .await
                    .ok()?
                    .ok()??;
                if !matches!(packet, Packet::Update(_)) {
                    return Some(packet);
                }
            }
        }

        async fn next_text(&mut self) -> Option<String> {
            loop {
                match self.next_event().await? {
                    Packet::Message { text, .. } => return Some(text),
                    _ => continue,
                }
            }
        }
    }

    async fn start_server(name: &str) -> (std::net::SocketAddr, tokio::sync::mpsc::Sender<ServerMessage>) {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            fresh: true,
            seed: Some(42),
            save_interval: 0,
            save_file: std::env::temp_dir().join(format!("trek-{}-{}.sav", name, std::process::id())),
            ..Default::default()
        };
        let mut server = Server::new(config).await.unwrap();
        let addr = server.local_addr();
        let handle = server.handle();
        tokio::spawn(async move { server.run().await });
        (addr, handle)
    }

    /// Login yields the galaxy record and a welcome, then commands round-trip
    #[tokio::test]
    async fn login_and_command_round_trip() {
        let (addr, handle) = start_server("login").await;
        let mut client = TestClient::connect(addr).await;
        client.login("Kirk", 0).await;

        match client.next_event().await {
            Some(Packet::Galaxy(snapshot)) => {
                assert_eq!(snapshot.quadrants.len(), 1000);
                assert!(snapshot.hostiles > 0);
            }
            other => panic!("expected galaxy record, got {:?}", other),
        }
        assert_eq!(client.next_text().await.as_deref(), Some("Welcome aboard."));

        client.command("lock 0").await;
        assert_eq!(client.next_text().await.as_deref(), Some("Lock released."));

        client.command("warp 9").await;
        assert_eq!(
            client.next_text().await.as_deref(),
            Some("Command unknown or pending implementation.")
        );

        handle.send(ServerMessage::Shutdown).await.unwrap();
    }

    /// Faction chat reaches only the same faction; private chat is echoed
    #[tokio::test]
    async fn chat_scopes() {
        let (addr, handle) = start_server("chat").await;
        let mut fed = TestClient::connect(addr).await;
        let mut fed2 = TestClient::connect(addr).await;
        let mut klingon = TestClient::connect(addr).await;

        fed.login("Picard", 0).await;
        assert_eq!(fed.next_text().await.as_deref(), Some("Welcome aboard."));
        fed2.login("Riker", 0).await;
        assert_eq!(fed2.next_text().await.as_deref(), Some("Welcome aboard."));
        klingon.login("Gowron", 1).await;
        assert_eq!(klingon.next_text().await.as_deref(), Some("Welcome aboard."));

        fed.send(Packet::Message {
            from: "spoofed".to_string(),
            faction: 1,
            scope: MessageScope::Faction,
            target_id: 0,
            text: "Red alert".to_string(),
        })
        .await;

        match fed2.next_event().await {
            Some(Packet::Message { from, text, .. }) => {
                assert_eq!(from, "Picard");
                assert_eq!(text, "Red alert");
            }
            other => panic!("expected faction chat, got {:?}", other),
        }

        klingon
            .send(Packet::Message {
                from: "Gowron".to_string(),
                faction: 1,
                scope: MessageScope::Private,
                target_id: 1,
                text: "Today is a good day".to_string(),
            })
            .await;
        assert_eq!(fed.next_text().await.as_deref(), Some("Red alert"));
        assert_eq!(fed.next_text().await.as_deref(), Some("Today is a good day"));
        assert_eq!(
            klingon.next_text().await.as_deref(),
            Some("Today is a good day")
        );

        handle.send(ServerMessage::Shutdown).await.unwrap();
    }

    /// A disconnected captain is resumed by name; an active name is refused
    #[tokio::test]
    async fn resume_and_name_in_use() {
        let (addr, handle) = start_server("resume").await;

        let mut first = TestClient::connect(addr).await;
        first.login("Data", 0).await;
        assert_eq!(first.next_text().await.as_deref(), Some("Welcome aboard."));

        let mut impostor = TestClient::connect(addr).await;
        impostor.login("Data", 0).await;
        match impostor.next_event().await {
            Some(Packet::Disconnected { reason }) => assert!(reason.contains("Data")),
            other => panic!("expected refusal, got {:?}", other),
        }

        drop(first);
        sleep(Duration::from_millis(200)).await;

        let mut second = TestClient::connect(addr).await;
        second.login("Data", 0).await;
        assert_eq!(
            second.next_text().await.as_deref(),
            Some("Welcome back, Captain Data. Command resumed.")
        );

        handle.send(ServerMessage::Shutdown).await.unwrap();
    }

    /// A login that breaks field limits is refused and the socket closed
    #[tokio::test]
    async fn invalid_login_is_refused() {
        let (addr, handle) = start_server("invalid").await;
        let mut client = TestClient::connect(addr).await;
        client.login("Q", 9).await;

        match client.next_event().await {
            Some(Packet::Disconnected { reason }) => assert!(reason.starts_with("Login rejected")),
            other => panic!("expected refusal, got {:?}", other),
        }
        assert!(client.next_event().await.is_none());

        handle.send(ServerMessage::Shutdown).await.unwrap();
    }
}
